use crate::adapters::http::ShClient;
use crate::core::flyovers::group_tiles_by_flyovers;
use crate::dataimport::{provider, TpdProviderKind, TpdiSearchParams};
use crate::domain::geo::BBox;
use crate::domain::model::{
    ApiType, Flyover, GetMapParams, GetStatsParams, PaginatedTiles, Stats, Tile,
};
use crate::effects::run_effect_functions;
use crate::layer::dataset::Dataset;
use crate::utils::error::{Result, ShError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// A renderable imagery layer of some remote service.
#[async_trait]
pub trait Layer: Send + Sync {
    /// Short type name used in error messages, e.g. `WmtsLayer`.
    fn layer_type(&self) -> &'static str;

    fn title(&self) -> Option<&str>;

    fn description(&self) -> Option<&str>;

    fn dataset(&self) -> Option<&Dataset> {
        None
    }

    fn supports_api_type(&self, api: ApiType) -> bool {
        api == ApiType::Wms
    }

    fn get_map_url(&self, _params: &GetMapParams, _api: ApiType) -> Result<String> {
        Err(ShError::unsupported("Not implemented"))
    }

    async fn get_map(&self, client: &ShClient, params: &GetMapParams, api: ApiType) -> Result<Vec<u8>> {
        match api {
            ApiType::Wms => {
                let url = self.get_map_url(&params.without_effects(), api)?;
                let image = client.get_bytes(&url).await?;
                run_effect_functions(&image, &params.merged_effects())
            }
            other => Err(ShError::unsupported(format!(
                "API type \"{}\" not supported in {}",
                other,
                self.layer_type()
            ))),
        }
    }

    async fn find_tiles(
        &self,
        _client: &ShClient,
        _bbox: &BBox,
        _from_time: DateTime<Utc>,
        _to_time: DateTime<Utc>,
        _max_count: Option<u32>,
        _offset: Option<u32>,
    ) -> Result<PaginatedTiles> {
        Err(ShError::unsupported("Not implemented yet"))
    }

    async fn find_dates_utc(
        &self,
        _client: &ShClient,
        _bbox: &BBox,
        _from_time: DateTime<Utc>,
        _to_time: DateTime<Utc>,
    ) -> Result<Vec<DateTime<Utc>>> {
        Err(ShError::unsupported("Not implemented yet"))
    }

    async fn get_stats(&self, _client: &ShClient, _params: &GetStatsParams) -> Result<Stats> {
        Err(ShError::unsupported("Not implemented yet"))
    }

    /// Tiles must be ordered from the newest to the oldest, as `find_tiles`
    /// returns them.
    fn group_tiles_by_flyovers(&self, tiles: &[Tile]) -> Result<Vec<Flyover>> {
        let orbit_time_ms = self.dataset().and_then(|d| d.orbit_time_ms());
        group_tiles_by_flyovers(tiles, orbit_time_ms)
    }
}

/// A commercial imagery provider reachable through third-party data import.
pub trait TpdProvider: Send + Sync {
    fn provider(&self) -> TpdProviderKind;

    /// Provider specific part of the search input (usually the `data` block).
    fn additional_search_params(&self, params: &TpdiSearchParams) -> Result<Map<String, Value>>;

    /// Adjusts the first `data` entry of an order input for the selected items.
    fn adjust_order_data(&self, data: &mut Map<String, Value>, items: &[String], params: &TpdiSearchParams);

    fn search_payload(&self, params: &TpdiSearchParams) -> Result<Value> {
        let mut payload = Map::new();
        payload.insert("provider".to_string(), Value::String(self.provider().as_str().to_string()));
        payload.insert("bounds".to_string(), provider::bounds(params)?);
        payload.extend(self.additional_search_params(params)?);
        Ok(Value::Object(payload))
    }

    fn order_payload(
        &self,
        name: &str,
        collection_id: Option<&str>,
        items: &[String],
        params: &TpdiSearchParams,
    ) -> Result<Value> {
        let mut input = self.search_payload(params)?;
        if let Some(data) = input
            .get_mut("data")
            .and_then(Value::as_array_mut)
            .and_then(|entries| entries.first_mut())
            .and_then(Value::as_object_mut)
        {
            self.adjust_order_data(data, items, params);
        }
        Ok(provider::order_envelope(name, collection_id, input))
    }

    fn search_pagination(&self, count: u32, viewtoken: Option<&str>) -> Vec<(String, String)> {
        let mut query = vec![("count".to_string(), count.to_string())];
        if let Some(token) = viewtoken {
            query.push(("viewtoken".to_string(), token.to_string()));
        }
        query
    }
}
