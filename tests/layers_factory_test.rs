use anyhow::Result;
use chrono::{TimeZone, Utc};
use httpmock::prelude::*;
use image::{ImageFormat, Rgba, RgbaImage};
use sentinelhub::domain::model::TileCoord;
use sentinelhub::{ApiType, GetMapParams, Layer, LayersFactory, ShClient};
use serde_json::json;
use std::io::Cursor;

fn wmts_capabilities(template_host: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Capabilities xmlns="http://www.opengis.net/wmts/1.0" xmlns:ows="http://www.opengis.net/ows/1.1" version="1.0.0">
  <Contents>
    <Layer>
      <ows:Title>Monthly mosaic January</ows:Title>
      <ows:Identifier>global_monthly_2020_01_mosaic</ows:Identifier>
      <ResourceURL format="image/png" resourceType="tile" template="{}tiles/{{TileMatrix}}/{{TileCol}}/{{TileRow}}.png"/>
    </Layer>
    <Layer>
      <ows:Title>Monthly mosaic February</ows:Title>
      <ows:Identifier>global_monthly_2020_02_mosaic</ows:Identifier>
    </Layer>
  </Contents>
</Capabilities>"#,
        template_host
    )
}

const WMS_CAPABILITIES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<WMS_Capabilities version="1.3.0" xmlns="http://www.opengis.net/wms">
  <Capability>
    <Layer>
      <Title>GeoServer Web Map Service</Title>
      <Layer queryable="1">
        <Name>PROBAV_S1_TOC_1KM</Name>
        <Title>Proba-V S1 TOC 1KM</Title>
      </Layer>
    </Layer>
  </Capability>
</WMS_Capabilities>"#;

fn png(value: u8) -> Vec<u8> {
    let image = RgbaImage::from_pixel(2, 2, Rgba([value, value, value, 255]));
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .expect("encode test png");
    bytes.into_inner()
}

#[tokio::test]
async fn test_sentinel_hub_instance_layers() -> Result<()> {
    let server = MockServer::start_async().await;
    let capabilities = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/ogc/wms/instanceID")
                .query_param("request", "GetCapabilities")
                .query_param("format", "application/json");
            then.status(200).json_body(json!({
                "layers": [
                    { "id": "S2L1C", "name": "s2l1c", "description": "", "dataset": "S2L1C", "legendUrl": "" },
                    { "id": "S5TMP", "name": "s5tmp", "description": "", "dataset": "S5PL2" },
                    { "id": "MYSTERY", "name": "mystery", "dataset": "UNKNOWN" }
                ]
            }));
        })
        .await;

    let client = ShClient::new();
    let base_url = server.url("/ogc/wms/instanceID");
    let layers = LayersFactory::make_layers(&client, &base_url, None).await?;

    capabilities.assert_async().await;
    let types: Vec<&str> = layers.iter().map(|l| l.layer_type()).collect();
    assert_eq!(types, vec!["S2L1CLayer", "S5PL2Layer"]);
    assert_eq!(layers[0].title(), Some("s2l1c"));

    // layers point at the same host and instance
    let params = GetMapParams::new(
        sentinelhub::BBox::new(sentinelhub::CRS_EPSG4326, 19.0, 20.0, 20.0, 21.0),
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2020, 1, 31, 0, 0, 0).unwrap(),
    );
    let url = layers[0].get_map_url(&params, ApiType::Wms)?;
    assert!(url.starts_with(&server.url("/ogc/wms/instanceID?")), "{}", url);
    assert!(url.contains("LAYERS=S2L1C"), "{}", url);
    Ok(())
}

#[tokio::test]
async fn test_filter_by_layer_id() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/ogc/wms/instanceID");
            then.status(200).json_body(json!({
                "layers": [
                    { "id": "TRUE_COLOR", "name": "True color", "dataset": "S2L2A" },
                    { "id": "NDVI", "name": "NDVI", "dataset": "S2L2A" }
                ]
            }));
        })
        .await;

    let filter: &(dyn Fn(&str) -> bool + Send + Sync) = &|id: &str| id == "NDVI";
    let layers = LayersFactory::make_layers(
        &ShClient::new(),
        &server.url("/ogc/wms/instanceID"),
        Some(filter),
    )
    .await?;

    assert_eq!(layers.len(), 1);
    assert_eq!(layers[0].title(), Some("NDVI"));
    assert_eq!(layers[0].layer_type(), "S2L2ALayer");
    Ok(())
}

#[tokio::test]
async fn test_wms_service_layers() -> Result<()> {
    let server = MockServer::start_async().await;
    let capabilities = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/geoserver/ows")
                .query_param("service", "wms")
                .query_param("request", "GetCapabilities");
            then.status(200)
                .header("content-type", "text/xml")
                .body(WMS_CAPABILITIES);
        })
        .await;

    let layers = LayersFactory::make_layers(&ShClient::new(), &server.url("/geoserver/ows"), None).await?;

    capabilities.assert_async().await;
    assert_eq!(layers.len(), 1);
    assert_eq!(layers[0].layer_type(), "WmsLayer");
    assert_eq!(layers[0].title(), Some("Proba-V S1 TOC 1KM"));
    Ok(())
}

#[tokio::test]
async fn test_wmts_service_layers_and_get_map() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/basemaps/v1/mosaics/wmts")
                .query_param("service", "wmts")
                .query_param("request", "GetCapabilities");
            then.status(200).body(wmts_capabilities(&server.url("/")));
        })
        .await;
    let tile = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/tiles/4/8/5.png")
                .header_missing("authorization");
            then.status(200)
                .header("content-type", "image/png")
                .body(png(100));
        })
        .await;

    // third-party hosts never see the Sentinel Hub token
    let client = ShClient::new();
    client.set_auth_token(Some("SH_TOKEN".to_string()));
    let layers =
        LayersFactory::make_layers(&client, &server.url("/basemaps/v1/mosaics/wmts"), None).await?;
    assert_eq!(layers.len(), 2);
    assert!(layers.iter().all(|l| l.layer_type() == "WmtsLayer"));

    let params = GetMapParams {
        tile_coord: Some(TileCoord { x: 8, y: 5, z: 4 }),
        gain: Some(2.0),
        ..GetMapParams::default()
    };
    let bytes = layers[0].get_map(&client, &params, ApiType::Wmts).await?;
    tile.assert_async().await;

    let decoded = image::load_from_memory(&bytes)?.to_rgba8();
    assert_eq!(decoded.get_pixel(0, 0), &Rgba([200, 200, 200, 255]));

    // getMapUrl refuses effects, getMap applies them
    assert!(layers[0].get_map_url(&params, ApiType::Wmts).is_err());
    Ok(())
}

#[tokio::test]
async fn test_wms_service_get_map_sends_no_token() -> Result<()> {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/geoserver/ows")
                .query_param("request", "GetCapabilities");
            then.status(200).body(WMS_CAPABILITIES);
        })
        .await;
    let authorized_map = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/geoserver/ows")
                .query_param("REQUEST", "GetMap")
                .header_exists("authorization");
            then.status(200).body(png(10));
        })
        .await;
    let map = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/geoserver/ows")
                .query_param("REQUEST", "GetMap")
                .query_param("LAYERS", "PROBAV_S1_TOC_1KM")
                .header_missing("authorization");
            then.status(200).body(png(20));
        })
        .await;

    let client = ShClient::new();
    client.set_auth_token(Some("SH_TOKEN".to_string()));
    let layers = LayersFactory::make_layers(&client, &server.url("/geoserver/ows"), None).await?;

    let params = GetMapParams::new(
        sentinelhub::BBox::new(sentinelhub::CRS_EPSG4326, 19.0, 20.0, 20.0, 21.0),
        Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2020, 1, 31, 0, 0, 0).unwrap(),
    );
    let bytes = layers[0].get_map(&client, &params, ApiType::Wms).await?;

    map.assert_async().await;
    authorized_map.assert_hits_async(0).await;
    assert_eq!(bytes, png(20));
    Ok(())
}
