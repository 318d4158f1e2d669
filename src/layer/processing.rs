//! Processing API (`/api/v1/process`) request payloads.

use crate::adapters::http::ShClient;
use crate::domain::model::{
    preview_mode_from_level, to_iso_string, GetMapParams, Interpolator, MimeType, MosaickingOrder,
    PreviewMode,
};
use crate::layer::dataset::Dataset;
use crate::utils::error::{Result, ShError};
use crate::utils::validation::require;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundsProperties {
    pub crs: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bounds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<[f64; 4]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Value>,
    pub properties: BoundsProperties,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeRange {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataFilter {
    pub time_range: TimeRange,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mosaicking_order: Option<MosaickingOrder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_mode: Option<PreviewMode>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Processing {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upsampling: Option<Interpolator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downsampling: Option<Interpolator>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub data_filter: DataFilter,
    pub processing: Processing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingInput {
    pub bounds: Bounds,
    pub data: Vec<DataEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputFormat {
    #[serde(rename = "type")]
    pub kind: MimeType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputResponse {
    pub identifier: String,
    pub format: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingOutput {
    pub width: u32,
    pub height: u32,
    pub responses: Vec<OutputResponse>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingPayload {
    pub input: ProcessingInput,
    pub output: ProcessingOutput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub evalscript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_product: Option<String>,
}

pub fn create_processing_payload(
    dataset: &Dataset,
    params: &GetMapParams,
    evalscript: Option<&str>,
    data_product: Option<&str>,
    additional_data_filter: Map<String, Value>,
) -> Result<ProcessingPayload> {
    let bbox = require("bbox", &params.bbox)?;
    let from_time = require("fromTime", &params.from_time)?;
    let to_time = require("toTime", &params.to_time)?;

    // an explicit mosaickingOrder replaces the default
    let mosaicking_order = if additional_data_filter.contains_key("mosaickingOrder") {
        None
    } else {
        Some(MosaickingOrder::MostRecent)
    };

    let data_filter = DataFilter {
        time_range: TimeRange {
            from: to_iso_string(from_time),
            to: to_iso_string(to_time),
        },
        mosaicking_order,
        preview_mode: params.preview.map(preview_mode_from_level),
        extra: additional_data_filter,
    };

    // evalscript wins; a data product still needs an (empty) evalscript
    let evalscript = evalscript.filter(|script| !script.is_empty());
    let data_product = data_product.filter(|product| !product.is_empty());
    let (evalscript, data_product) = match (evalscript, data_product) {
        (Some(script), _) => (Some(script.to_string()), None),
        (None, Some(product)) => (Some(String::new()), Some(product.to_string())),
        (None, None) => {
            return Err(ShError::validation(
                "Either evalscript or dataProduct should be defined with Processing API",
            ))
        }
    };

    Ok(ProcessingPayload {
        input: ProcessingInput {
            bounds: Bounds {
                bbox: Some(bbox.to_array()),
                geometry: None,
                properties: BoundsProperties {
                    crs: bbox.crs.opengis_url(),
                },
            },
            data: vec![DataEntry {
                kind: dataset.sh_processing_api_datasource_abbreviation.clone(),
                data_filter,
                processing: Processing {
                    upsampling: params.upsampling,
                    downsampling: params.downsampling,
                },
            }],
        },
        output: ProcessingOutput {
            width: params.width,
            height: params.height,
            responses: vec![OutputResponse {
                identifier: "default".to_string(),
                format: OutputFormat {
                    kind: params.format,
                },
            }],
        },
        evalscript,
        data_product,
    })
}

pub async fn processing_get_map(
    client: &ShClient,
    sh_service_hostname: &str,
    payload: &ProcessingPayload,
) -> Result<Vec<u8>> {
    let token = client.auth_token().ok_or_else(|| ShError::AuthenticationError {
        message: "Must be authenticated to use Processing API".to_string(),
    })?;
    let url = format!("{}api/v1/process", sh_service_hostname);
    tracing::debug!("POST {}", url);

    let response = client
        .send("processingGetMap", |http| {
            http.post(&url)
                .bearer_auth(&token)
                .header("Accept", "*/*")
                .json(payload)
        })
        .await?;
    Ok(response.bytes().await?.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geo::{BBox, CRS_EPSG3857};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn params() -> GetMapParams {
        GetMapParams {
            width: 512,
            height: 256,
            format: MimeType::Jpeg,
            ..GetMapParams::new(
                BBox::new(CRS_EPSG3857, 1.0, 2.0, 3.0, 4.0),
                Utc.with_ymd_and_hms(2020, 5, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2020, 5, 2, 0, 0, 0).unwrap(),
            )
        }
    }

    #[test]
    fn test_payload_shape() {
        let payload =
            create_processing_payload(&Dataset::s2l2a(), &params(), Some("//VERSION=3"), None, Map::new())
                .unwrap();
        let value = serde_json::to_value(&payload).unwrap();

        assert_eq!(
            value["input"]["bounds"],
            json!({
                "bbox": [1.0, 2.0, 3.0, 4.0],
                "properties": { "crs": "http://www.opengis.net/def/crs/EPSG/0/3857" }
            })
        );
        assert_eq!(value["input"]["data"][0]["type"], "S2L2A");
        assert_eq!(
            value["input"]["data"][0]["dataFilter"],
            json!({
                "timeRange": { "from": "2020-05-01T00:00:00.000Z", "to": "2020-05-02T00:00:00.000Z" },
                "mosaickingOrder": "mostRecent"
            })
        );
        assert_eq!(value["input"]["data"][0]["processing"], json!({}));
        assert_eq!(
            value["output"],
            json!({
                "width": 512,
                "height": 256,
                "responses": [{ "identifier": "default", "format": { "type": "image/jpeg" } }]
            })
        );
        assert_eq!(value["evalscript"], "//VERSION=3");
        assert!(value.get("dataProduct").is_none());
    }

    #[test]
    fn test_preview_and_sampling() {
        let mut params = params();
        params.preview = Some(3);
        params.upsampling = Some(Interpolator::Bicubic);

        let payload =
            create_processing_payload(&Dataset::s2l2a(), &params, Some("x"), None, Map::new()).unwrap();
        let value = serde_json::to_value(&payload).unwrap();

        assert_eq!(value["input"]["data"][0]["dataFilter"]["previewMode"], "EXTENDED_PREVIEW");
        assert_eq!(value["input"]["data"][0]["processing"], json!({ "upsampling": "BICUBIC" }));
    }

    #[test]
    fn test_data_product_and_additional_filter() {
        let mut extra = Map::new();
        extra.insert("mosaickingOrder".to_string(), json!("leastCC"));
        extra.insert("maxCloudCoverage".to_string(), json!(30));

        let payload = create_processing_payload(
            &Dataset::s2l2a(),
            &params(),
            None,
            Some("https://services.sentinel-hub.com/api/v1/dataproducts/643"),
            extra,
        )
        .unwrap();
        let value = serde_json::to_value(&payload).unwrap();

        assert_eq!(value["evalscript"], "");
        assert_eq!(
            value["dataProduct"],
            "https://services.sentinel-hub.com/api/v1/dataproducts/643"
        );
        assert_eq!(value["input"]["data"][0]["dataFilter"]["mosaickingOrder"], "leastCC");
        assert_eq!(value["input"]["data"][0]["dataFilter"]["maxCloudCoverage"], 30);
    }

    #[test]
    fn test_requires_evalscript_or_data_product() {
        let err = create_processing_payload(&Dataset::s2l2a(), &params(), None, None, Map::new())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Either evalscript or dataProduct should be defined with Processing API"
        );

        let err = create_processing_payload(&Dataset::s2l2a(), &params(), Some(""), None, Map::new())
            .unwrap_err();
        assert!(matches!(err, ShError::ValidationError { .. }));
    }

    #[test]
    fn test_empty_evalscript_falls_back_to_data_product() {
        let payload = create_processing_payload(
            &Dataset::s2l2a(),
            &params(),
            Some(""),
            Some("https://services.sentinel-hub.com/api/v1/dataproducts/643"),
            Map::new(),
        )
        .unwrap();
        let value = serde_json::to_value(&payload).unwrap();

        assert_eq!(value["evalscript"], "");
        assert_eq!(
            value["dataProduct"],
            "https://services.sentinel-hub.com/api/v1/dataproducts/643"
        );
    }

    #[tokio::test]
    async fn test_processing_get_map_requires_token() {
        let payload =
            create_processing_payload(&Dataset::s2l2a(), &params(), Some("x"), None, Map::new()).unwrap();
        let err = processing_get_map(&ShClient::new(), "http://localhost/", &payload)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Must be authenticated to use Processing API");
    }
}
