use crate::dataimport::provider::{base_data_filter, insert_opt};
use crate::dataimport::{TpdProviderKind, TpdiSearchParams};
use crate::domain::ports::TpdProvider;
use crate::utils::error::Result;
use serde_json::{json, Map, Value};

/// 4-band bundle, the only one TPDI delivers for Maxar.
const MAXAR_PRODUCT_BANDS: &str = "4BB";

#[derive(Debug, Clone, Copy, Default)]
pub struct MaxarDataProvider;

impl TpdProvider for MaxarDataProvider {
    fn provider(&self) -> TpdProviderKind {
        TpdProviderKind::Maxar
    }

    fn additional_search_params(&self, params: &TpdiSearchParams) -> Result<Map<String, Value>> {
        let mut data_filter = base_data_filter(params)?;
        insert_opt(&mut data_filter, "minOffNadir", params.min_off_nadir);
        insert_opt(&mut data_filter, "maxOffNadir", params.max_off_nadir);
        insert_opt(&mut data_filter, "minSunElevation", params.min_sun_elevation);
        insert_opt(&mut data_filter, "maxSunElevation", params.max_sun_elevation);
        if let Some(sensor) = params.sensor {
            data_filter.insert("sensor".to_string(), json!(sensor));
        }

        let mut additional = Map::new();
        additional.insert(
            "data".to_string(),
            json!([{ "productBands": MAXAR_PRODUCT_BANDS, "dataFilter": data_filter }]),
        );
        Ok(additional)
    }

    fn adjust_order_data(&self, data: &mut Map<String, Value>, items: &[String], _params: &TpdiSearchParams) {
        if !items.is_empty() {
            data.insert("selectedImages".to_string(), json!(items));
            data.remove("dataFilter");
        }
    }
}
