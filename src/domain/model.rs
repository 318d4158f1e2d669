use crate::domain::geo::{BBox, Geometry};
use crate::effects::Effects;
use crate::utils::error::{Result, ShError};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ApiType {
    Wms,
    Wmts,
    Processing,
}

impl fmt::Display for ApiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ApiType::Wms => "WMS",
            ApiType::Wmts => "WMTS",
            ApiType::Processing => "PROCESSING",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MimeType {
    #[default]
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/tiff")]
    Tiff,
    #[serde(rename = "application/json")]
    Json,
}

impl MimeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MimeType::Png => "image/png",
            MimeType::Jpeg => "image/jpeg",
            MimeType::Tiff => "image/tiff",
            MimeType::Json => "application/json",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "image/png" | "png" => Ok(MimeType::Png),
            "image/jpeg" | "image/jpg" | "jpeg" | "jpg" => Ok(MimeType::Jpeg),
            "image/tiff" | "tiff" => Ok(MimeType::Tiff),
            "application/json" | "json" => Ok(MimeType::Json),
            other => Err(ShError::validation(format!("Unsupported format: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Interpolator {
    Bilinear,
    Bicubic,
    Lanczos,
    Box,
    Nearest,
}

impl Interpolator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interpolator::Bilinear => "BILINEAR",
            Interpolator::Bicubic => "BICUBIC",
            Interpolator::Lanczos => "LANCZOS",
            Interpolator::Box => "BOX",
            Interpolator::Nearest => "NEAREST",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MosaickingOrder {
    #[serde(rename = "mostRecent")]
    MostRecent,
    #[serde(rename = "leastRecent")]
    LeastRecent,
    #[serde(rename = "leastCC")]
    LeastCc,
}

impl MosaickingOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            MosaickingOrder::MostRecent => "mostRecent",
            MosaickingOrder::LeastRecent => "leastRecent",
            MosaickingOrder::LeastCc => "leastCC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PreviewMode {
    Detail,
    Preview,
    ExtendedPreview,
}

/// WMS `PREVIEW` levels map onto Processing API preview modes; level 3 is
/// accepted by the service but not documented, so it shares level 2's mode.
pub fn preview_mode_from_level(level: u8) -> PreviewMode {
    match level {
        0 => PreviewMode::Detail,
        1 => PreviewMode::Preview,
        _ => PreviewMode::ExtendedPreview,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

#[derive(Debug, Clone)]
pub struct GetMapParams {
    pub bbox: Option<BBox>,
    pub tile_coord: Option<TileCoord>,
    pub from_time: Option<DateTime<Utc>>,
    pub to_time: Option<DateTime<Utc>>,
    pub width: u32,
    pub height: u32,
    pub format: MimeType,
    pub preview: Option<u8>,
    pub upsampling: Option<Interpolator>,
    pub downsampling: Option<Interpolator>,
    /// Deprecated, superseded by `effects.gain`.
    pub gain: Option<f64>,
    /// Deprecated, superseded by `effects.gamma`.
    pub gamma: Option<f64>,
    pub effects: Option<Effects>,
}

impl Default for GetMapParams {
    fn default() -> Self {
        Self {
            bbox: None,
            tile_coord: None,
            from_time: None,
            to_time: None,
            width: 512,
            height: 512,
            format: MimeType::Png,
            preview: None,
            upsampling: None,
            downsampling: None,
            gain: None,
            gamma: None,
            effects: None,
        }
    }
}

impl GetMapParams {
    pub fn new(bbox: BBox, from_time: DateTime<Utc>, to_time: DateTime<Utc>) -> Self {
        Self {
            bbox: Some(bbox),
            from_time: Some(from_time),
            to_time: Some(to_time),
            ..Self::default()
        }
    }

    /// Effects to run client-side: the deprecated `gain`/`gamma` fields are
    /// honoured but anything set in `effects` wins.
    pub fn merged_effects(&self) -> Effects {
        let mut merged = Effects {
            gain: self.gain,
            gamma: self.gamma,
            ..Effects::default()
        };
        if let Some(effects) = &self.effects {
            merged.override_with(effects);
        }
        merged
    }

    /// Copy without any client-side effects.
    pub fn without_effects(&self) -> Self {
        Self {
            gain: None,
            gamma: None,
            effects: None,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LinkType {
    Aws,
    Creodias,
    Preview,
    Scihub,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub target: String,
    #[serde(rename = "type")]
    pub link_type: LinkType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tile {
    pub geometry: serde_json::Value,
    pub sensing_time: DateTime<Utc>,
    pub meta: serde_json::Map<String, serde_json::Value>,
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedTiles {
    pub tiles: Vec<Tile>,
    pub has_more: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Flyover {
    pub tiles: Vec<Tile>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HistogramType {
    Equalfrequency,
    Equidistant,
    Streaming,
}

impl HistogramType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistogramType::Equalfrequency => "EQUALFREQUENCY",
            HistogramType::Equidistant => "EQUIDISTANT",
            HistogramType::Streaming => "STREAMING",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GetStatsParams {
    pub geometry: Option<Geometry>,
    pub from_time: Option<DateTime<Utc>>,
    pub to_time: Option<DateTime<Utc>>,
    /// Meters per pixel.
    pub resolution: Option<f64>,
    pub bins: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasicStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub st_dev: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramBin {
    pub low_edge: f64,
    pub mean: f64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    pub bins: Vec<HistogramBin>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyChannelStats {
    #[serde(deserialize_with = "deserialize_utc")]
    pub date: DateTime<Utc>,
    pub basic_stats: BasicStats,
    #[serde(default)]
    pub histogram: Option<Histogram>,
}

/// Channel name (`C0`, `C1`, ...) to one entry per day.
pub type Stats = BTreeMap<String, Vec<DailyChannelStats>>;

/// `toISOString`-style timestamp: `2020-02-02T18:05:32.000Z`.
pub fn to_iso_string(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Second precision, as the FIS endpoint expects: `2020-02-02T18:05:32Z`.
pub fn to_iso_seconds(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// The service is not consistent about timestamps: RFC 3339, naive
/// timestamps (implicitly UTC) and plain dates all show up.
pub fn parse_utc(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    Err(ShError::processing(format!("Unrecognized timestamp: {}", value)))
}

pub fn deserialize_utc<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_utc(&raw).map_err(serde::de::Error::custom)
}
