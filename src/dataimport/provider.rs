//! Pieces of the TPDI payloads common to every provider.

use crate::dataimport::TpdiSearchParams;
use crate::domain::model::to_iso_string;
use crate::utils::error::{Result, ShError};
use crate::utils::validation::require;
use serde_json::{json, Map, Value};

/// `bounds` of a search: the geometry wins over the bbox, and needs an
/// explicit CRS.
pub fn bounds(params: &TpdiSearchParams) -> Result<Value> {
    if let Some(geometry) = &params.geometry {
        let crs = params
            .crs
            .ok_or_else(|| ShError::validation("Parameter crs must be specified"))?;
        return Ok(json!({
            "geometry": geometry,
            "properties": { "crs": crs.opengis_url() }
        }));
    }
    if let Some(bbox) = &params.bbox {
        return Ok(json!({
            "bbox": bbox.to_array(),
            "properties": { "crs": bbox.crs.opengis_url() }
        }));
    }
    Err(ShError::validation("Parameter bbox and/or geometry must be specified"))
}

/// `dataFilter` with the required time range and the optional cloud coverage.
pub fn base_data_filter(params: &TpdiSearchParams) -> Result<Map<String, Value>> {
    let from_time = require("fromTime", &params.from_time)?;
    let to_time = require("toTime", &params.to_time)?;

    let mut filter = Map::new();
    filter.insert(
        "timeRange".to_string(),
        json!({ "from": to_iso_string(from_time), "to": to_iso_string(to_time) }),
    );
    insert_opt(&mut filter, "maxCloudCoverage", params.max_cloud_coverage);
    Ok(filter)
}

pub fn insert_opt<T: Into<Value>>(map: &mut Map<String, Value>, key: &str, value: Option<T>) {
    if let Some(value) = value {
        map.insert(key.to_string(), value.into());
    }
}

pub fn order_envelope(name: &str, collection_id: Option<&str>, input: Value) -> Value {
    let mut order = Map::new();
    order.insert("name".to_string(), json!(name));
    if let Some(id) = collection_id.filter(|id| !id.is_empty()) {
        order.insert("collectionId".to_string(), json!(id));
    }
    order.insert("input".to_string(), input);
    Value::Object(order)
}
