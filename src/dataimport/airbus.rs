use crate::dataimport::provider::{base_data_filter, insert_opt};
use crate::dataimport::{TpdProviderKind, TpdiSearchParams};
use crate::domain::ports::TpdProvider;
use crate::utils::error::Result;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct AirbusDataProvider;

impl TpdProvider for AirbusDataProvider {
    fn provider(&self) -> TpdProviderKind {
        TpdProviderKind::Airbus
    }

    fn additional_search_params(&self, params: &TpdiSearchParams) -> Result<Map<String, Value>> {
        let mut data_filter = base_data_filter(params)?;
        insert_opt(&mut data_filter, "maxSnowCoverage", params.max_snow_coverage);
        insert_opt(&mut data_filter, "maxIncidenceAngle", params.max_incidence_angle);
        if let Some(level) = params.processing_level {
            data_filter.insert("processingLevel".to_string(), json!(level));
        }

        let mut data = Map::new();
        if let Some(constellation) = params.constellation {
            data.insert("constellation".to_string(), json!(constellation));
        }
        data.insert("dataFilter".to_string(), Value::Object(data_filter));

        let mut additional = Map::new();
        additional.insert("data".to_string(), json!([data]));
        Ok(additional)
    }

    fn adjust_order_data(&self, data: &mut Map<String, Value>, items: &[String], _params: &TpdiSearchParams) {
        if !items.is_empty() {
            let products: Vec<Value> = items.iter().map(|id| json!({ "id": id })).collect();
            data.insert("products".to_string(), Value::Array(products));
            data.remove("dataFilter");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataimport::{AirbusConstellation, AirbusProcessingLevel};
    use crate::domain::geo::{BBox, CRS_EPSG4326};
    use chrono::{TimeZone, Utc};

    fn params() -> TpdiSearchParams {
        TpdiSearchParams {
            bbox: Some(BBox::new(CRS_EPSG4326, 18.0, 20.0, 20.0, 22.0)),
            from_time: Some(Utc.with_ymd_and_hms(2021, 5, 30, 0, 0, 0).unwrap()),
            to_time: Some(Utc.with_ymd_and_hms(2021, 6, 30, 23, 59, 59).unwrap()),
            constellation: Some(AirbusConstellation::Phr),
            processing_level: Some(AirbusProcessingLevel::Sensor),
            max_snow_coverage: Some(5.0),
            max_incidence_angle: Some(30.0),
            ..TpdiSearchParams::default()
        }
    }

    #[test]
    fn test_search_payload() {
        let payload = AirbusDataProvider.search_payload(&params()).unwrap();
        let data = &payload["data"][0];

        assert_eq!(payload["provider"], "AIRBUS");
        assert_eq!(data["constellation"], "PHR");
        assert_eq!(data["dataFilter"]["processingLevel"], "SENSOR");
        assert_eq!(data["dataFilter"]["maxSnowCoverage"], 5.0);
        assert_eq!(data["dataFilter"]["maxIncidenceAngle"], 30.0);
    }

    #[test]
    fn test_order_products() {
        let items = vec!["DS_PHR1A_1".to_string(), "DS_PHR1B_2".to_string()];
        let order = AirbusDataProvider
            .order_payload("airbus", Some("c"), &items, &params())
            .unwrap();
        let data = &order["input"]["data"][0];

        assert_eq!(data["products"], json!([{ "id": "DS_PHR1A_1" }, { "id": "DS_PHR1B_2" }]));
        assert!(data.get("dataFilter").is_none());
        assert_eq!(data["constellation"], "PHR");
    }
}
