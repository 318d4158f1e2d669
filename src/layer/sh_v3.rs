//! Sentinel Hub v3 layers: WMS and Processing API rendering plus the v3
//! search index, parameterised by a per-collection adapter.

use crate::adapters::http::ShClient;
use crate::domain::geo::BBox;
use crate::domain::model::{
    deserialize_utc, parse_utc, to_iso_string, ApiType, GetMapParams, Interpolator, Link, LinkType,
    MosaickingOrder, PaginatedTiles, Tile,
};
use crate::domain::ports::Layer;
use crate::effects::run_effect_functions;
use crate::layer::dataset::Dataset;
use crate::layer::processing::{create_processing_payload, processing_get_map};
use crate::layer::wms::{wms_get_map_url, WmsExtras};
use crate::layer::TileSearchResponse;
use crate::utils::error::{Result, ShError};
use crate::utils::validation::require;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

const DEFAULT_MAX_COUNT: u32 = 50;

/// Raw search index tile; collection specific fields stay in `extra`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct V3Tile {
    pub data_geometry: Value,
    #[serde(deserialize_with = "deserialize_utc")]
    pub sensing_time: DateTime<Utc>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl V3Tile {
    fn str_field(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }
}

/// What differs between the collections served by the same v3 layer logic.
pub trait Collection: Send + Sync {
    fn layer_type(&self) -> &'static str;

    fn default_dataset(&self) -> Dataset;

    /// `datasetParameters` of the search index requests.
    fn search_dataset_parameters(&self) -> Map<String, Value>;

    /// Extra top-level fields of the search index requests.
    fn search_params(&self) -> Map<String, Value> {
        Map::new()
    }

    /// Extra `dataFilter` fields of Processing API requests.
    fn data_filter_params(&self) -> Map<String, Value> {
        Map::new()
    }

    fn wms_params(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    fn tile_meta(&self, _tile: &V3Tile) -> Map<String, Value> {
        Map::new()
    }

    fn tile_links(&self, _tile: &V3Tile) -> Vec<Link> {
        Vec::new()
    }
}

fn aws_link(tile: &V3Tile) -> Vec<Link> {
    tile.str_field("dataUri")
        .map(|uri| {
            vec![Link {
                target: uri.to_string(),
                link_type: LinkType::Aws,
            }]
        })
        .unwrap_or_default()
}

fn cloud_coverage_meta(tile: &V3Tile) -> Map<String, Value> {
    let mut meta = Map::new();
    if let Some(cc) = tile.extra.get("cloudCoverPercentage") {
        meta.insert("cloudCoverPercent".to_string(), cc.clone());
    }
    meta
}

/// Sentinel-2 collections share everything but the processing level.
fn s2_search_params(max_cloud_coverage_percent: Option<f64>) -> Map<String, Value> {
    let mut params = Map::new();
    if let Some(percent) = max_cloud_coverage_percent {
        params.insert("maxCloudCoverage".to_string(), json!(percent / 100.0));
    }
    params
}

fn s2_data_filter_params(max_cloud_coverage_percent: Option<f64>) -> Map<String, Value> {
    let mut params = Map::new();
    if let Some(percent) = max_cloud_coverage_percent {
        params.insert("maxCloudCoverage".to_string(), json!(percent));
    }
    params
}

fn s2_wms_params(max_cloud_coverage_percent: Option<f64>) -> Vec<(String, String)> {
    max_cloud_coverage_percent
        .map(|percent| vec![("maxcc".to_string(), percent.to_string())])
        .unwrap_or_default()
}

#[derive(Debug, Clone, Default)]
pub struct S2L1C {
    pub max_cloud_coverage_percent: Option<f64>,
}

impl Collection for S2L1C {
    fn layer_type(&self) -> &'static str {
        "S2L1CLayer"
    }

    fn default_dataset(&self) -> Dataset {
        Dataset::s2l1c()
    }

    fn search_dataset_parameters(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("type".to_string(), json!("S2"));
        params.insert("processingLevel".to_string(), json!("L1C"));
        params
    }

    fn search_params(&self) -> Map<String, Value> {
        s2_search_params(self.max_cloud_coverage_percent)
    }

    fn data_filter_params(&self) -> Map<String, Value> {
        s2_data_filter_params(self.max_cloud_coverage_percent)
    }

    fn wms_params(&self) -> Vec<(String, String)> {
        s2_wms_params(self.max_cloud_coverage_percent)
    }

    fn tile_meta(&self, tile: &V3Tile) -> Map<String, Value> {
        cloud_coverage_meta(tile)
    }

    fn tile_links(&self, tile: &V3Tile) -> Vec<Link> {
        aws_link(tile)
    }
}

#[derive(Debug, Clone, Default)]
pub struct S2L2A {
    pub max_cloud_coverage_percent: Option<f64>,
}

impl Collection for S2L2A {
    fn layer_type(&self) -> &'static str {
        "S2L2ALayer"
    }

    fn default_dataset(&self) -> Dataset {
        Dataset::s2l2a()
    }

    fn search_dataset_parameters(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("type".to_string(), json!("S2"));
        params.insert("processingLevel".to_string(), json!("L2A"));
        params
    }

    fn search_params(&self) -> Map<String, Value> {
        s2_search_params(self.max_cloud_coverage_percent)
    }

    fn data_filter_params(&self) -> Map<String, Value> {
        s2_data_filter_params(self.max_cloud_coverage_percent)
    }

    fn wms_params(&self) -> Vec<(String, String)> {
        s2_wms_params(self.max_cloud_coverage_percent)
    }

    fn tile_meta(&self, tile: &V3Tile) -> Map<String, Value> {
        cloud_coverage_meta(tile)
    }

    fn tile_links(&self, tile: &V3Tile) -> Vec<Link> {
        aws_link(tile)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AcquisitionMode {
    Iw,
    Ew,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Polarization {
    Dv,
    Dh,
    Sv,
    Sh,
    Hh,
    Hv,
    Vv,
    Vh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Resolution {
    High,
    Medium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrbitDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Default)]
pub struct S1GRD {
    pub acquisition_mode: Option<AcquisitionMode>,
    pub polarization: Option<Polarization>,
    pub resolution: Option<Resolution>,
    pub orbit_direction: Option<OrbitDirection>,
}

impl S1GRD {
    pub fn new(acquisition_mode: AcquisitionMode, polarization: Polarization, resolution: Resolution) -> Self {
        Self {
            acquisition_mode: Some(acquisition_mode),
            polarization: Some(polarization),
            resolution: Some(resolution),
            orbit_direction: None,
        }
    }

    pub fn with_orbit_direction(mut self, orbit_direction: OrbitDirection) -> Self {
        self.orbit_direction = Some(orbit_direction);
        self
    }

    fn filter(&self) -> Map<String, Value> {
        let mut params = Map::new();
        if let Some(mode) = self.acquisition_mode {
            params.insert("acquisitionMode".to_string(), json!(mode));
        }
        if let Some(polarization) = self.polarization {
            params.insert("polarization".to_string(), json!(polarization));
        }
        if let Some(resolution) = self.resolution {
            params.insert("resolution".to_string(), json!(resolution));
        }
        if let Some(direction) = self.orbit_direction {
            params.insert("orbitDirection".to_string(), json!(direction));
        }
        params
    }
}

impl Collection for S1GRD {
    fn layer_type(&self) -> &'static str {
        "S1GRDAWSEULayer"
    }

    fn default_dataset(&self) -> Dataset {
        Dataset::s1grd_aws_eu()
    }

    fn search_dataset_parameters(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("type".to_string(), json!("S1GRD"));
        params.extend(self.filter());
        params
    }

    fn data_filter_params(&self) -> Map<String, Value> {
        self.filter()
    }

    fn tile_meta(&self, tile: &V3Tile) -> Map<String, Value> {
        ["acquisitionMode", "polarization", "resolution", "orbitDirection"]
            .iter()
            .filter_map(|key| tile.extra.get(*key).map(|v| (key.to_string(), v.clone())))
            .collect()
    }

    fn tile_links(&self, tile: &V3Tile) -> Vec<Link> {
        aws_link(tile)
    }
}

#[derive(Debug, Clone, Default)]
pub struct S3OLCI;

impl Collection for S3OLCI {
    fn layer_type(&self) -> &'static str {
        "S3OLCILayer"
    }

    fn default_dataset(&self) -> Dataset {
        Dataset::s3olci()
    }

    fn search_dataset_parameters(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("type".to_string(), json!("S3"));
        params
    }

    fn tile_links(&self, tile: &V3Tile) -> Vec<Link> {
        let (Some(original_id), Some(product_name)) =
            (tile.str_field("originalId"), tile.str_field("productName"))
        else {
            return Vec::new();
        };
        vec![
            Link {
                target: original_id.replacen("EODATA", "/eodata", 1),
                link_type: LinkType::Creodias,
            },
            Link {
                target: format!(
                    "https://finder.creodias.eu/files{}/{}-ql.jpg",
                    original_id.replacen("EODATA", "", 1),
                    product_name.replacen(".SEN3", "", 1)
                ),
                link_type: LinkType::Preview,
            },
        ]
    }
}

#[derive(Debug, Clone, Default)]
pub struct S5PL2 {
    /// e.g. `NO2`, `O3`, `CH4`
    pub product_type: Option<String>,
}

impl Collection for S5PL2 {
    fn layer_type(&self) -> &'static str {
        "S5PL2Layer"
    }

    fn default_dataset(&self) -> Dataset {
        Dataset::s5pl2()
    }

    fn search_dataset_parameters(&self) -> Map<String, Value> {
        let mut params = Map::new();
        params.insert("type".to_string(), json!("S5PL2"));
        if let Some(product_type) = &self.product_type {
            params.insert("productType".to_string(), json!(product_type));
        }
        params
    }

    fn data_filter_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        if let Some(product_type) = &self.product_type {
            params.insert("productType".to_string(), json!(product_type));
        }
        params
    }
}

/// A Sentinel Hub v3 layer. Rendering through WMS needs an instance and a
/// layer id; the Processing API needs an evalscript or a data product.
#[derive(Debug, Clone)]
pub struct ProcessingLayer<C: Collection> {
    collection: C,
    dataset: Dataset,
    instance_id: Option<String>,
    layer_id: Option<String>,
    evalscript: Option<String>,
    evalscript_url: Option<String>,
    data_product: Option<String>,
    mosaicking_order: Option<MosaickingOrder>,
    upsampling: Option<Interpolator>,
    downsampling: Option<Interpolator>,
    title: Option<String>,
    description: Option<String>,
}

pub type S2L1CLayer = ProcessingLayer<S2L1C>;
pub type S2L2ALayer = ProcessingLayer<S2L2A>;
pub type S1GRDAWSEULayer = ProcessingLayer<S1GRD>;
pub type S3OLCILayer = ProcessingLayer<S3OLCI>;
pub type S5PL2Layer = ProcessingLayer<S5PL2>;

impl<C: Collection> ProcessingLayer<C> {
    pub fn new(collection: C) -> Self {
        let dataset = collection.default_dataset();
        Self {
            collection,
            dataset,
            instance_id: None,
            layer_id: None,
            evalscript: None,
            evalscript_url: None,
            data_product: None,
            mosaicking_order: None,
            upsampling: None,
            downsampling: None,
            title: None,
            description: None,
        }
    }

    pub fn with_instance(mut self, instance_id: impl Into<String>, layer_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self.layer_id = Some(layer_id.into());
        self
    }

    /// Serves the dataset from another host (deployment, proxy or test server).
    pub fn with_hostname(mut self, hostname: &str) -> Self {
        self.dataset = self.dataset.with_hostname(hostname);
        self
    }

    pub fn with_evalscript(mut self, evalscript: impl Into<String>) -> Self {
        self.evalscript = Some(evalscript.into());
        self
    }

    pub fn with_evalscript_url(mut self, evalscript_url: impl Into<String>) -> Self {
        self.evalscript_url = Some(evalscript_url.into());
        self
    }

    pub fn with_data_product(mut self, data_product: impl Into<String>) -> Self {
        self.data_product = Some(data_product.into());
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

    pub fn collection(&self) -> &C {
        &self.collection
    }

    pub fn layer_id(&self) -> Option<&str> {
        self.layer_id.as_deref()
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
        params.extend(self.collection.wms_params());
        params
    }

    fn processing_data_filter(&self) -> Map<String, Value> {
        let mut filter = self.collection.data_filter_params();
        if let Some(order) = self.mosaicking_order {
            filter.insert("mosaickingOrder".to_string(), json!(order));
        }
        filter
    }

    async fn processing_map(&self, client: &ShClient, params: &GetMapParams) -> Result<Vec<u8>> {
        let mut params = params.without_effects();
        params.upsampling = params.upsampling.or(self.upsampling);
        params.downsampling = params.downsampling.or(self.downsampling);

        let payload = create_processing_payload(
            &self.dataset,
            &params,
            self.evalscript.as_deref(),
            self.data_product.as_deref(),
            self.processing_data_filter(),
        )?;
        processing_get_map(client, &self.dataset.sh_service_hostname, &payload).await
    }

    fn to_tile(&self, tile: V3Tile) -> Tile {
        Tile {
            meta: self.collection.tile_meta(&tile),
            links: self.collection.tile_links(&tile),
            geometry: tile.data_geometry,
            sensing_time: tile.sensing_time,
        }
    }
}

#[async_trait]
impl<C: Collection> Layer for ProcessingLayer<C> {
    fn layer_type(&self) -> &'static str {
        self.collection.layer_type()
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

    fn supports_api_type(&self, api: ApiType) -> bool {
        matches!(api, ApiType::Wms | ApiType::Processing)
    }

    fn get_map_url(&self, params: &GetMapParams, api: ApiType) -> Result<String> {
        if api != ApiType::Wms {
            return Err(ShError::unsupported("Only WMS is supported in getMapUrl"));
        }
        let instance_id = require("instanceId", &self.instance_id)?;
        let layer_id = require("layerId", &self.layer_id)?;

        let base_url = format!("{}ogc/wms/{}", self.dataset.sh_service_hostname, instance_id);
        let extras = WmsExtras {
            evalscript: self.evalscript.as_deref(),
            evalscript_url: self.evalscript_url.as_deref(),
            evalsource: Some(&self.dataset.sh_wms_evalsource),
            additional: self.wms_additional_params(),
        };
        wms_get_map_url(&base_url, layer_id, params, &extras)
    }

    async fn get_map(&self, client: &ShClient, params: &GetMapParams, api: ApiType) -> Result<Vec<u8>> {
        let image = match api {
            ApiType::Wms => {
                let url = self.get_map_url(&params.without_effects(), api)?;
                client.get_bytes(&url).await?
            }
            ApiType::Processing => self.processing_map(client, params).await?,
            other => {
                return Err(ShError::unsupported(format!(
                    "API type \"{}\" not supported in {}",
                    other,
                    self.layer_type()
                )))
            }
        };
        run_effect_functions(&image, &params.merged_effects())
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

        let mut payload = Map::new();
        payload.insert("clipping".to_string(), bbox.to_geojson());
        payload.insert("maxcount".to_string(), json!(max_count.unwrap_or(DEFAULT_MAX_COUNT)));
        payload.insert("timeFrom".to_string(), json!(to_iso_string(&from_time)));
        payload.insert("timeTo".to_string(), json!(to_iso_string(&to_time)));
        payload.insert("offset".to_string(), json!(offset.unwrap_or(0)));
        payload.extend(self.collection.search_params());
        payload.insert(
            "datasetParameters".to_string(),
            Value::Object(self.collection.search_dataset_parameters()),
        );

        tracing::debug!("🔍 {} findTiles at {}", self.layer_type(), url);
        let response: TileSearchResponse<V3Tile> = client
            .post_json(url, &[], &Value::Object(payload), &[])
            .await?;

        Ok(PaginatedTiles {
            tiles: response.tiles.into_iter().map(|t| self.to_tile(t)).collect(),
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

        let mut payload = Map::new();
        payload.insert("queryArea".to_string(), bbox.to_geojson());
        payload.insert("from".to_string(), json!(to_iso_string(&from_time)));
        payload.insert("to".to_string(), json!(to_iso_string(&to_time)));
        payload.extend(self.collection.search_params());
        payload.insert(
            "datasetParameters".to_string(),
            Value::Object(self.collection.search_dataset_parameters()),
        );

        let dates: Vec<String> = client
            .post_json(url, &[], &Value::Object(payload), &[])
            .await?;
        dates.iter().map(|date| parse_utc(date)).collect()
    }
}
