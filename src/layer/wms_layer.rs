use crate::domain::model::{ApiType, GetMapParams};
use crate::domain::ports::Layer;
use crate::layer::wms::{wms_get_map_url, WmsExtras};
use crate::utils::error::{Result, ShError};
use async_trait::async_trait;

/// A layer of any OGC WMS service.
#[derive(Debug, Clone)]
pub struct WmsLayer {
    base_url: String,
    layer_id: String,
    title: Option<String>,
    description: Option<String>,
}

impl WmsLayer {
    pub fn new(base_url: impl Into<String>, layer_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            layer_id: layer_id.into(),
            title: None,
            description: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn layer_id(&self) -> &str {
        &self.layer_id
    }
}

#[async_trait]
impl Layer for WmsLayer {
    fn layer_type(&self) -> &'static str {
        "WmsLayer"
    }

    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn get_map_url(&self, params: &GetMapParams, api: ApiType) -> Result<String> {
        if api != ApiType::Wms {
            return Err(ShError::unsupported("Only WMS is supported on this layer"));
        }
        wms_get_map_url(&self.base_url, &self.layer_id, params, &WmsExtras::default())
    }
}
