use crate::dataimport::provider::{base_data_filter, insert_opt};
use crate::dataimport::{TpdProviderKind, TpdiSearchParams, PLANET_ITEM_TYPE};
use crate::domain::ports::TpdProvider;
use crate::utils::error::Result;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, Default)]
pub struct PlanetDataProvider;

impl TpdProvider for PlanetDataProvider {
    fn provider(&self) -> TpdProviderKind {
        TpdProviderKind::Planet
    }

    fn additional_search_params(&self, params: &TpdiSearchParams) -> Result<Map<String, Value>> {
        let mut data = Map::new();
        data.insert("itemType".to_string(), json!(PLANET_ITEM_TYPE));
        if let Some(bundle) = params.product_bundle {
            data.insert("productBundle".to_string(), json!(bundle));
        }

        let mut data_filter = base_data_filter(params)?;
        insert_opt(&mut data_filter, "nativeFilter", params.native_filter.clone());
        data.insert("dataFilter".to_string(), Value::Object(data_filter));

        let mut additional = Map::new();
        insert_opt(&mut additional, "planetApiKey", params.planet_api_key.clone());
        additional.insert("data".to_string(), json!([data]));
        Ok(additional)
    }

    fn adjust_order_data(&self, data: &mut Map<String, Value>, items: &[String], params: &TpdiSearchParams) {
        if let Some(harmonize_to) = params.harmonize_to {
            data.insert("harmonizeTo".to_string(), json!(harmonize_to));
        }
        if !items.is_empty() {
            data.insert("itemIds".to_string(), json!(items));
            data.remove("dataFilter");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataimport::{PlanetHarmonizeTo, PlanetProductBundle};
    use crate::domain::geo::{BBox, CRS_EPSG4326};
    use chrono::{TimeZone, Utc};

    fn params() -> TpdiSearchParams {
        TpdiSearchParams {
            bbox: Some(BBox::new(CRS_EPSG4326, 18.0, 20.0, 20.0, 22.0)),
            from_time: Some(Utc.with_ymd_and_hms(2021, 5, 30, 0, 0, 0).unwrap()),
            to_time: Some(Utc.with_ymd_and_hms(2021, 6, 30, 23, 59, 59).unwrap()),
            product_bundle: Some(PlanetProductBundle::AnalyticUdm2),
            planet_api_key: Some("PLANET_KEY".to_string()),
            harmonize_to: Some(PlanetHarmonizeTo::Ps2),
            ..TpdiSearchParams::default()
        }
    }

    #[test]
    fn test_search_payload() {
        let payload = PlanetDataProvider.search_payload(&params()).unwrap();

        assert_eq!(payload["provider"], "PLANET");
        assert_eq!(payload["planetApiKey"], "PLANET_KEY");
        assert_eq!(payload["data"][0]["itemType"], "PSScene4Band");
        assert_eq!(payload["data"][0]["productBundle"], "analytic_udm2");
        assert_eq!(
            payload["data"][0]["dataFilter"]["timeRange"],
            json!({ "from": "2021-05-30T00:00:00.000Z", "to": "2021-06-30T23:59:59.000Z" })
        );
        assert!(payload["data"][0]["dataFilter"].get("maxCloudCoverage").is_none());
    }

    #[test]
    fn test_order_payload_with_items() {
        let items = vec!["20210601_091317_1009".to_string()];
        let order = PlanetDataProvider
            .order_payload("Planet order", Some("coll-1"), &items, &params())
            .unwrap();

        assert_eq!(order["name"], "Planet order");
        assert_eq!(order["collectionId"], "coll-1");
        let data = &order["input"]["data"][0];
        assert_eq!(data["itemIds"], json!(["20210601_091317_1009"]));
        assert_eq!(data["harmonizeTo"], "PS2");
        assert!(data.get("dataFilter").is_none());
    }

    #[test]
    fn test_order_payload_without_items_keeps_filter() {
        let order = PlanetDataProvider.order_payload("by area", None, &[], &params()).unwrap();
        assert!(order.get("collectionId").is_none());
        assert!(order["input"]["data"][0].get("dataFilter").is_some());
    }
}
