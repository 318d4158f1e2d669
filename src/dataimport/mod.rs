//! Third-party data import (TPDI): searching and ordering commercial imagery
//! from Airbus, Planet and Maxar through Sentinel Hub.

pub mod airbus;
pub mod maxar;
pub mod planet;
pub mod provider;
pub mod tpdi;

pub use airbus::AirbusDataProvider;
pub use maxar::MaxarDataProvider;
pub use planet::PlanetDataProvider;
pub use tpdi::{Quota, SearchResult, Tpdi};

use crate::domain::geo::{BBox, Crs, Geometry};
use crate::domain::ports::TpdProvider;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TpdProviderKind {
    Airbus,
    Planet,
    Maxar,
}

impl TpdProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TpdProviderKind::Airbus => "AIRBUS",
            TpdProviderKind::Planet => "PLANET",
            TpdProviderKind::Maxar => "MAXAR",
        }
    }

    pub fn data_provider(&self) -> Box<dyn TpdProvider> {
        match self {
            TpdProviderKind::Airbus => Box::new(AirbusDataProvider),
            TpdProviderKind::Planet => Box::new(PlanetDataProvider),
            TpdProviderKind::Maxar => Box::new(MaxarDataProvider),
        }
    }
}

impl fmt::Display for TpdProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TpdiCollection {
    #[serde(rename = "AIRBUS_PHR")]
    AirbusPleiades,
    #[serde(rename = "AIRBUS_SPOT")]
    AirbusSpot,
    #[serde(rename = "PLANET_SCOPE")]
    PlanetScope,
    #[serde(rename = "MAXAR_WORLDVIEW")]
    MaxarWorldview,
}

impl TpdiCollection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TpdiCollection::AirbusPleiades => "AIRBUS_PHR",
            TpdiCollection::AirbusSpot => "AIRBUS_SPOT",
            TpdiCollection::PlanetScope => "PLANET_SCOPE",
            TpdiCollection::MaxarWorldview => "MAXAR_WORLDVIEW",
        }
    }
}

impl fmt::Display for TpdiCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Only PSScene4Band is orderable through TPDI.
pub const PLANET_ITEM_TYPE: &str = "PSScene4Band";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanetProductBundle {
    Analytic,
    AnalyticUdm2,
    AnalyticSr,
    AnalyticSrUdm2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlanetHarmonizeTo {
    Ps2,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MaxarSensor {
    Wv01,
    Wv02,
    Wv03,
    Wv04,
    Ge01,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AirbusConstellation {
    Phr,
    Spot,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AirbusProcessingLevel {
    Sensor,
    Album,
}

/// Search (and order) parameters shared by all providers; each provider
/// reads the fields it understands.
#[derive(Debug, Clone, Default)]
pub struct TpdiSearchParams {
    pub bbox: Option<BBox>,
    pub geometry: Option<Geometry>,
    /// Required together with `geometry`.
    pub crs: Option<Crs>,
    pub from_time: Option<DateTime<Utc>>,
    pub to_time: Option<DateTime<Utc>>,
    pub max_cloud_coverage: Option<f64>,
    // Planet
    pub product_bundle: Option<PlanetProductBundle>,
    pub planet_api_key: Option<String>,
    pub harmonize_to: Option<PlanetHarmonizeTo>,
    pub native_filter: Option<serde_json::Value>,
    // Maxar
    pub min_off_nadir: Option<f64>,
    pub max_off_nadir: Option<f64>,
    pub min_sun_elevation: Option<f64>,
    pub max_sun_elevation: Option<f64>,
    pub sensor: Option<MaxarSensor>,
    // Airbus
    pub constellation: Option<AirbusConstellation>,
    pub processing_level: Option<AirbusProcessingLevel>,
    pub max_snow_coverage: Option<f64>,
    pub max_incidence_angle: Option<f64>,
}
