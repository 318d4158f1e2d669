use anyhow::Result;
use chrono::{TimeZone, Utc};
use httpmock::prelude::*;
use image::{ImageFormat, Rgba, RgbaImage};
use sentinelhub::domain::model::MosaickingOrder;
use sentinelhub::layer::{ProcessingLayer, S2L2A};
use sentinelhub::{ApiType, BBox, GetMapParams, Layer, ShClient, ShError, CRS_EPSG4326};
use std::io::Cursor;

const EVALSCRIPT: &str = "//VERSION=3\nfunction setup() { return { input: [\"B04\"], output: { bands: 1 } }; }";

fn png(value: u8) -> Vec<u8> {
    let image = RgbaImage::from_pixel(4, 4, Rgba([value, value, value, 255]));
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .expect("encode test png");
    bytes.into_inner()
}

fn params() -> GetMapParams {
    GetMapParams {
        width: 256,
        height: 256,
        ..GetMapParams::new(
            BBox::new(CRS_EPSG4326, 14.4, 45.9, 14.7, 46.1),
            Utc.with_ymd_and_hms(2020, 5, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2020, 5, 31, 23, 59, 59).unwrap(),
        )
    }
}

fn layer(server: &MockServer) -> ProcessingLayer<S2L2A> {
    ProcessingLayer::new(S2L2A {
        max_cloud_coverage_percent: Some(30.0),
    })
    .with_hostname(&server.url("/"))
    .with_evalscript(EVALSCRIPT)
    .with_mosaicking_order(MosaickingOrder::LeastCc)
}

#[tokio::test]
async fn test_processing_get_map_applies_effects() -> Result<()> {
    let server = MockServer::start_async().await;
    let process = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/v1/process")
                .header("Authorization", "Bearer TOKEN111")
                .json_body_includes(
                    r#"{
                        "input": {
                            "bounds": {
                                "bbox": [14.4, 45.9, 14.7, 46.1],
                                "properties": { "crs": "http://www.opengis.net/def/crs/EPSG/0/4326" }
                            },
                            "data": [{
                                "type": "S2L2A",
                                "dataFilter": {
                                    "timeRange": {
                                        "from": "2020-05-01T00:00:00.000Z",
                                        "to": "2020-05-31T23:59:59.000Z"
                                    },
                                    "mosaickingOrder": "leastCC",
                                    "maxCloudCoverage": 30.0
                                }
                            }]
                        },
                        "output": { "width": 256, "height": 256 }
                    }"#,
                )
                .body_includes("//VERSION=3");
            then.status(200)
                .header("content-type", "image/png")
                .body(png(100));
        })
        .await;

    let client = ShClient::new();
    client.set_auth_token(Some("TOKEN111".to_string()));

    let with_gain = GetMapParams {
        gain: Some(2.0),
        ..params()
    };
    let bytes = layer(&server)
        .get_map(&client, &with_gain, ApiType::Processing)
        .await?;

    process.assert_async().await;
    let decoded = image::load_from_memory(&bytes)?.to_rgba8();
    assert_eq!(decoded.dimensions(), (4, 4));
    assert_eq!(decoded.get_pixel(3, 3), &Rgba([200, 200, 200, 255]));
    Ok(())
}

#[tokio::test]
async fn test_processing_requires_authentication() -> Result<()> {
    let server = MockServer::start_async().await;
    let process = server
        .mock_async(|when, then| {
            when.path("/api/v1/process");
            then.status(200);
        })
        .await;

    let err = layer(&server)
        .get_map(&ShClient::new(), &params(), ApiType::Processing)
        .await
        .unwrap_err();

    process.assert_hits_async(0).await;
    assert!(matches!(err, ShError::AuthenticationError { .. }));
    assert_eq!(err.to_string(), "Must be authenticated to use Processing API");
    Ok(())
}

#[tokio::test]
async fn test_wms_get_map_uses_configured_instance() -> Result<()> {
    let server = MockServer::start_async().await;
    let wms = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/ogc/wms/INSTANCE")
                .query_param("LAYERS", "TRUE_COLOR")
                .query_param("maxcc", "30");
            then.status(200)
                .header("content-type", "image/png")
                .body(png(50));
        })
        .await;

    let bytes = layer(&server)
        .with_instance("INSTANCE", "TRUE_COLOR")
        .get_map(&ShClient::new(), &params(), ApiType::Wms)
        .await?;

    wms.assert_async().await;
    // no effects, bytes untouched
    assert_eq!(bytes, png(50));
    Ok(())
}
