//! Layers of the older EO Cloud deployment (service v1/v2), e.g. Landsat 7/8.

use crate::adapters::http::ShClient;
use crate::domain::geo::{find_crs_from_urn, BBox, CRS_EPSG4326};
use crate::domain::model::{
    deserialize_utc, parse_utc, to_iso_seconds, to_iso_string, ApiType, GetMapParams, GetStatsParams,
    HistogramType, Interpolator, MosaickingOrder, PaginatedTiles, Stats, Tile,
};
use crate::domain::ports::Layer;
use crate::layer::dataset::Dataset;
use crate::layer::wms::{encode_evalscript, wms_get_map_url, WmsExtras};
use crate::layer::TileSearchResponse;
use crate::utils::error::{Result, ShError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

const DEFAULT_MAX_COUNT: u32 = 50;
const DEFAULT_STATS_BINS: u32 = 5;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EoCloudTile {
    tile_draw_region_geometry: Value,
    #[serde(deserialize_with = "deserialize_utc")]
    sensing_time: DateTime<Utc>,
    #[serde(default)]
    cloud_cover_percentage: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct EoCloudLayer {
    dataset: Dataset,
    instance_id: String,
    layer_id: String,
    evalscript: Option<String>,
    evalscript_url: Option<String>,
    mosaicking_order: Option<MosaickingOrder>,
    upsampling: Option<Interpolator>,
    downsampling: Option<Interpolator>,
    /// 0-100
    max_cloud_coverage_percent: Option<f64>,
    title: Option<String>,
    description: Option<String>,
}

impl EoCloudLayer {
    pub fn new(dataset: Dataset, instance_id: &str, layer_id: &str) -> Result<Self> {
        if instance_id.trim().is_empty() || layer_id.trim().is_empty() {
            return Err(ShError::validation(
                "Parameters instanceId and layerId must be specified!",
            ));
        }
        Ok(Self {
            dataset,
            instance_id: instance_id.to_string(),
            layer_id: layer_id.to_string(),
            evalscript: None,
            evalscript_url: None,
            mosaicking_order: None,
            upsampling: None,
            downsampling: None,
            max_cloud_coverage_percent: None,
            title: None,
            description: None,
        })
    }

    pub fn landsat7(instance_id: &str, layer_id: &str) -> Result<Self> {
        Self::new(Dataset::eocloud_landsat7(), instance_id, layer_id)
    }

    pub fn landsat8(instance_id: &str, layer_id: &str) -> Result<Self> {
        Self::new(Dataset::eocloud_landsat8(), instance_id, layer_id)
    }

    pub fn with_evalscript(mut self, evalscript: impl Into<String>) -> Self {
        self.evalscript = Some(evalscript.into());
        self
    }

    pub fn with_evalscript_url(mut self, evalscript_url: impl Into<String>) -> Self {
        self.evalscript_url = Some(evalscript_url.into());
        self
    }

    pub fn with_mosaicking_order(mut self, order: MosaickingOrder) -> Self {
        self.mosaicking_order = Some(order);
        self
    }

    pub fn with_upsampling(mut self, interpolator: Interpolator) -> Self {
        self.upsampling = Some(interpolator);
        self
    }

    pub fn with_downsampling(mut self, interpolator: Interpolator) -> Self {
        self.downsampling = Some(interpolator);
        self
    }

    pub fn with_max_cloud_coverage_percent(mut self, percent: f64) -> Self {
        self.max_cloud_coverage_percent = Some(percent);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn set_evalscript(&mut self, evalscript: impl Into<String>) {
        self.evalscript = Some(evalscript.into());
    }

    pub fn set_evalscript_url(&mut self, evalscript_url: impl Into<String>) {
        self.evalscript_url = Some(evalscript_url.into());
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn layer_id(&self) -> &str {
        &self.layer_id
    }

    fn evalsource(&self) -> &str {
        &self.dataset.sh_wms_evalsource
    }

    fn wms_additional_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(order) = self.mosaicking_order {
            params.push(("priority".to_string(), order.as_str().to_string()));
        }
        if let Some(upsampling) = self.upsampling {
            params.push(("upsampling".to_string(), upsampling.as_str().to_string()));
        }
        if let Some(downsampling) = self.downsampling {
            params.push(("downsampling".to_string(), downsampling.as_str().to_string()));
        }
        if let Some(maxcc) = self.max_cloud_coverage_percent {
            params.push(("maxcc".to_string(), maxcc.to_string()));
        }
        params
    }

    /// The index endpoints take the cloud coverage as a 0-1 fraction.
    fn index_maxcc_param(&self) -> Option<(String, String)> {
        self.max_cloud_coverage_percent
            .map(|percent| ("maxcc".to_string(), (percent / 100.0).to_string()))
    }

    fn tile_meta(tile: &EoCloudTile) -> Map<String, Value> {
        let mut meta = Map::new();
        if let Some(cc) = tile.cloud_cover_percentage {
            meta.insert("cloudCoverPercent".to_string(), Value::from(cc));
        }
        meta
    }
}

#[async_trait]
impl Layer for EoCloudLayer {
    fn layer_type(&self) -> &'static str {
        "EoCloudLayer"
    }

    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn dataset(&self) -> Option<&Dataset> {
        Some(&self.dataset)
    }

    fn get_map_url(&self, params: &GetMapParams, api: ApiType) -> Result<String> {
        if api != ApiType::Wms {
            return Err(ShError::unsupported("Only WMS is supported on this layer"));
        }
        let base_url = format!("{}v1/wms/{}", self.dataset.sh_service_hostname, self.instance_id);
        let extras = WmsExtras {
            evalscript: self.evalscript.as_deref(),
            evalscript_url: self.evalscript_url.as_deref(),
            evalsource: Some(self.evalsource()),
            additional: self.wms_additional_params(),
        };
        wms_get_map_url(&base_url, &self.layer_id, params, &extras)
    }

    async fn find_tiles(
        &self,
        client: &ShClient,
        bbox: &BBox,
        from_time: DateTime<Utc>,
        to_time: DateTime<Utc>,
        max_count: Option<u32>,
        offset: Option<u32>,
    ) -> Result<PaginatedTiles> {
        let url = self
            .dataset
            .search_index_url
            .as_deref()
            .ok_or_else(|| ShError::unsupported("This dataset does not support searching for tiles"))?;

        let mut query = vec![
            ("expand".to_string(), "true".to_string()),
            ("timefrom".to_string(), to_iso_string(&from_time)),
            ("timeto".to_string(), to_iso_string(&to_time)),
            ("maxcount".to_string(), max_count.unwrap_or(DEFAULT_MAX_COUNT).to_string()),
            ("offset".to_string(), offset.unwrap_or(0).to_string()),
        ];
        query.extend(self.index_maxcc_param());

        let response: TileSearchResponse<EoCloudTile> = client
            .post_json(
                url,
                &query,
                &bbox.to_geojson(),
                &[("Content-Type", "application/json"), ("Accept-CRS", "EPSG:4326")],
            )
            .await?;

        let tiles = response
            .tiles
            .into_iter()
            .map(|tile| Tile {
                meta: Self::tile_meta(&tile),
                geometry: tile.tile_draw_region_geometry,
                sensing_time: tile.sensing_time,
                links: Vec::new(),
            })
            .collect();

        Ok(PaginatedTiles {
            tiles,
            has_more: response.has_more,
        })
    }

    async fn find_dates_utc(
        &self,
        client: &ShClient,
        bbox: &BBox,
        from_time: DateTime<Utc>,
        to_time: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>> {
        let url = self
            .dataset
            .find_dates_utc_url
            .as_deref()
            .ok_or_else(|| ShError::unsupported("This dataset does not support searching for dates"))?;

        let mut query = vec![
            ("timefrom".to_string(), to_iso_string(&from_time)),
            ("timeto".to_string(), to_iso_string(&to_time)),
        ];
        query.extend(self.index_maxcc_param());

        let dates: Vec<String> = client
            .post_json(url, &query, &bbox.to_geojson(), &[("Content-Type", "application/json")])
            .await?;
        dates.iter().map(|date| parse_utc(date)).collect()
    }

    async fn get_stats(&self, client: &ShClient, params: &GetStatsParams) -> Result<Stats> {
        let geometry = params
            .geometry
            .as_ref()
            .ok_or_else(|| ShError::validation("Parameter \"geometry\" needs to be provided"))?;
        let resolution = params
            .resolution
            .ok_or_else(|| ShError::validation("Parameter \"resolution\" needs to be provided"))?;
        let (from_time, to_time) = match (&params.from_time, &params.to_time) {
            (Some(from), Some(to)) => (from, to),
            _ => {
                return Err(ShError::validation(
                    "Parameters \"fromTime\" and \"toTime\" need to be provided",
                ))
            }
        };

        let crs = match geometry.crs() {
            Some(named) => find_crs_from_urn(&named.properties.name)?,
            None => CRS_EPSG4326,
        };
        // EPSG:4326 needs the "m" suffix to keep the resolution in meters per pixel
        let resolution = if crs == CRS_EPSG4326 {
            format!("{}m", resolution)
        } else {
            resolution.to_string()
        };

        let mut query = vec![
            ("layer".to_string(), self.layer_id.clone()),
            ("crs".to_string(), crs.auth_id()),
            ("geometry".to_string(), geometry.to_wkt()),
            (
                "time".to_string(),
                format!("{}/{}", to_iso_seconds(from_time), to_iso_seconds(to_time)),
            ),
            ("resolution".to_string(), resolution),
            (
                "bins".to_string(),
                params.bins.unwrap_or(DEFAULT_STATS_BINS).to_string(),
            ),
            ("type".to_string(), HistogramType::Equalfrequency.as_str().to_string()),
        ];
        if let Some(maxcc) = self.max_cloud_coverage_percent {
            query.push(("maxcc".to_string(), maxcc.to_string()));
        }
        if let Some(evalscript) = &self.evalscript {
            query.push(("evalscript".to_string(), encode_evalscript(evalscript)));
            query.push(("evalsource".to_string(), self.evalsource().to_string()));
        }

        let url = format!("{}v1/fis/{}", self.dataset.sh_service_hostname, self.instance_id);
        tracing::debug!("📊 FIS request for layer {}", self.layer_id);
        client.get_json(&url, &query).await
    }
}
