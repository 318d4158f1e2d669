//! WMTS layers and Web Mercator tile arithmetic.

use crate::adapters::http::ShClient;
use crate::domain::geo::{BBox, Crs, CRS_EPSG4326};
use crate::domain::model::{ApiType, GetMapParams, TileCoord};
use crate::domain::ports::Layer;
use crate::effects::run_effect_functions;
use crate::layer::capabilities::{fetch_capabilities_layers, OgcServiceType};
use crate::utils::error::{Result, ShError};
use async_trait::async_trait;
use std::f64::consts::PI;
use std::sync::OnceLock;

const EQUATOR_RADIUS: f64 = 6378137.0;
const MAX_ZOOM: u32 = 22;

/// EPSG:3857 meters to WGS84 degrees (`[lon, lat]`).
pub fn to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / EQUATOR_RADIUS).to_degrees();
    let lat = (PI * 0.5 - 2.0 * (-y / EQUATOR_RADIUS).exp().atan()).to_degrees();
    (lon, lat)
}

/// Global pixel coordinates of a WGS84 point at `zoom`.
pub fn to_pixel(lon: f64, lat: f64, tile_size: u32, zoom: u32) -> (f64, f64) {
    let map_width = tile_size as f64 * 2f64.powi(zoom as i32);
    let sin_lat = lat.to_radians().sin().clamp(-0.9999, 0.9999);
    let pixel_x = ((lon + 180.0) / 360.0 * map_width).round();
    let pixel_y = ((0.5 - ((1.0 + sin_lat) / (1.0 - sin_lat)).ln() / (4.0 * PI)) * map_width).round();
    (pixel_x, pixel_y)
}

fn to_wgs84_bbox(bbox: &BBox) -> BBox {
    match bbox.crs {
        Crs::Epsg3857 => {
            let (min_x, min_y) = to_wgs84(bbox.min_x, bbox.min_y);
            let (max_x, max_y) = to_wgs84(bbox.max_x, bbox.max_y);
            BBox::new(CRS_EPSG4326, min_x, min_y, max_x, max_y)
        }
        Crs::Epsg4326 => *bbox,
    }
}

/// Tile containing the top-left corner of `bbox`.
pub fn bbox_to_xyz(bbox: &BBox, zoom: u32, tile_size: u32) -> TileCoord {
    let bbox = to_wgs84_bbox(bbox);
    let (pixel_x, pixel_y) = to_pixel(bbox.min_x, bbox.max_y, tile_size, zoom);
    TileCoord {
        x: (pixel_x / tile_size as f64).floor().max(0.0) as u32,
        y: (pixel_y / tile_size as f64).floor().max(0.0) as u32,
        z: zoom,
    }
}

/// Zoom level at which `bbox` spans about one tile of `tile_size` pixels.
pub fn zoom_for_bbox(bbox: &BBox, tile_size: u32) -> u32 {
    let bbox = to_wgs84_bbox(bbox);
    let (min_px, _) = to_pixel(bbox.min_x, bbox.max_y, tile_size, 0);
    let (max_px, _) = to_pixel(bbox.max_x, bbox.min_y, tile_size, 0);
    let span = (max_px - min_px).abs();
    if span <= 0.0 {
        return MAX_ZOOM;
    }
    let zoom = (tile_size as f64 / span).log2().round();
    zoom.clamp(0.0, MAX_ZOOM as f64) as u32
}

fn fill_template(template: &str, coord: &TileCoord) -> String {
    template
        .replace("{TileMatrix}", &coord.z.to_string())
        .replace("{TileCol}", &coord.x.to_string())
        .replace("{TileRow}", &coord.y.to_string())
}

#[derive(Debug)]
pub struct WmtsLayer {
    base_url: String,
    layer_id: String,
    title: Option<String>,
    description: Option<String>,
    /// Filled from GetCapabilities on first use when not given.
    resource_url: OnceLock<String>,
}

impl WmtsLayer {
    pub fn new(base_url: impl Into<String>, layer_id: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            layer_id: layer_id.into(),
            title: None,
            description: None,
            resource_url: OnceLock::new(),
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

    pub fn with_resource_url(self, resource_url: impl Into<String>) -> Self {
        // freshly built layer, the cell is still empty
        let _ = self.resource_url.set(resource_url.into());
        self
    }

    pub fn layer_id(&self) -> &str {
        &self.layer_id
    }

    pub fn resource_url(&self) -> Option<&str> {
        self.resource_url.get().map(String::as_str)
    }

    pub async fn update_layer_from_service_if_needed(&self, client: &ShClient) -> Result<()> {
        if self.resource_url.get().is_some() {
            return Ok(());
        }
        let layers = fetch_capabilities_layers(client, &self.base_url, OgcServiceType::Wmts).await?;
        let resource_url = layers
            .into_iter()
            .find(|layer| layer.name == self.layer_id)
            .and_then(|layer| layer.resource_url);
        if let Some(url) = resource_url {
            let _ = self.resource_url.set(url);
        }
        Ok(())
    }
}

#[async_trait]
impl Layer for WmtsLayer {
    fn layer_type(&self) -> &'static str {
        "WmtsLayer"
    }

    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn supports_api_type(&self, api: ApiType) -> bool {
        api == ApiType::Wmts
    }

    fn get_map_url(&self, params: &GetMapParams, api: ApiType) -> Result<String> {
        if api != ApiType::Wmts {
            return Err(ShError::unsupported("Only WMTS is supported on this layer"));
        }
        if params.bbox.is_none() && params.tile_coord.is_none() {
            return Err(ShError::validation("No bbox or x,y coordinates provided"));
        }
        let resource_url = self
            .resource_url()
            .ok_or_else(|| ShError::validation("No resource URL provided"))?;
        for (name, is_set) in [
            ("gain", params.gain.is_some()),
            ("gamma", params.gamma.is_some()),
            ("effects", params.effects.is_some()),
        ] {
            if is_set {
                return Err(ShError::validation(format!(
                    "Parameter {} is not supported in getMapUrl. Use getMap method instead.",
                    name
                )));
            }
        }

        let coord = match (&params.tile_coord, &params.bbox) {
            (Some(coord), _) => *coord,
            (None, Some(bbox)) => bbox_to_xyz(bbox, zoom_for_bbox(bbox, params.width), params.width),
            (None, None) => return Err(ShError::validation("No bbox or x,y coordinates provided")),
        };
        Ok(fill_template(resource_url, &coord))
    }

    async fn get_map(&self, client: &ShClient, params: &GetMapParams, api: ApiType) -> Result<Vec<u8>> {
        self.update_layer_from_service_if_needed(client).await?;
        let url = self.get_map_url(&params.without_effects(), api)?;
        let image = client.get_bytes(&url).await?;
        run_effect_functions(&image, &params.merged_effects())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geo::CRS_EPSG3857;
    use crate::effects::Effects;

    const TEMPLATE: &str = "https://tiles.planet.com/basemaps/v1/planet-tiles/mosaic/gmap/{TileMatrix}/{TileCol}/{TileRow}.png";

    #[test]
    fn test_to_pixel_clamps_poles() {
        assert_eq!(to_pixel(0.0, 0.0, 256, 0), (128.0, 128.0));
        // sin(lat) is clamped, so the poles stay finite
        assert_eq!(to_pixel(0.0, 90.0, 256, 0), (128.0, -74.0));
        assert_eq!(to_pixel(0.0, -90.0, 256, 0), (128.0, 330.0));
    }

    #[test]
    fn test_to_wgs84_round_values() {
        let (lon, lat) = to_wgs84(0.0, 0.0);
        assert!(lon.abs() < 1e-9 && lat.abs() < 1e-9);
        let (lon, _) = to_wgs84(20037508.342789244, 0.0);
        assert!((lon - 180.0).abs() < 1e-6);
    }

    #[test]
    fn test_bbox_to_xyz() {
        // Ljubljana area at zoom 10
        let bbox = BBox::new(CRS_EPSG4326, 14.4, 45.9, 14.7, 46.1);
        let coord = bbox_to_xyz(&bbox, 10, 256);
        assert_eq!(coord, TileCoord { x: 552, y: 363, z: 10 });

        let mercator = BBox::new(CRS_EPSG3857, 0.0, 0.0, 1000.0, 1000.0);
        assert_eq!(bbox_to_xyz(&mercator, 1, 256), TileCoord { x: 1, y: 1, z: 1 });
    }

    #[test]
    fn test_zoom_for_bbox() {
        let world = BBox::new(CRS_EPSG4326, -180.0, -85.0, 180.0, 85.0);
        assert_eq!(zoom_for_bbox(&world, 256), 0);
        let quarter = BBox::new(CRS_EPSG4326, 0.0, 0.0, 90.0, 40.0);
        assert_eq!(zoom_for_bbox(&quarter, 256), 2);
    }

    #[test]
    fn test_get_map_url_with_tile_coord() {
        let layer = WmtsLayer::new("https://api.planet.com/basemaps/v1/mosaics/wmts", "mosaic")
            .with_resource_url(TEMPLATE);
        let params = GetMapParams {
            tile_coord: Some(TileCoord { x: 8, y: 5, z: 4 }),
            ..GetMapParams::default()
        };

        let url = layer.get_map_url(&params, ApiType::Wmts).unwrap();
        assert_eq!(url, "https://tiles.planet.com/basemaps/v1/planet-tiles/mosaic/gmap/4/8/5.png");
    }

    #[test]
    fn test_get_map_url_errors() {
        let bare = WmtsLayer::new("https://x.test/wmts", "mosaic");
        let err = bare.get_map_url(&GetMapParams::default(), ApiType::Wmts).unwrap_err();
        assert_eq!(err.to_string(), "No bbox or x,y coordinates provided");

        let with_coord = GetMapParams {
            tile_coord: Some(TileCoord { x: 0, y: 0, z: 0 }),
            ..GetMapParams::default()
        };
        let err = bare.get_map_url(&with_coord, ApiType::Wmts).unwrap_err();
        assert_eq!(err.to_string(), "No resource URL provided");

        let layer = WmtsLayer::new("https://x.test/wmts", "mosaic").with_resource_url(TEMPLATE);
        let with_gain = GetMapParams {
            gain: Some(2.0),
            ..with_coord.clone()
        };
        let err = layer.get_map_url(&with_gain, ApiType::Wmts).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parameter gain is not supported in getMapUrl. Use getMap method instead."
        );

        let with_effects = GetMapParams {
            effects: Some(Effects::default()),
            ..with_coord.clone()
        };
        let err = layer.get_map_url(&with_effects, ApiType::Wmts).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Parameter effects is not supported in getMapUrl. Use getMap method instead."
        );

        let err = layer.get_map_url(&with_coord, ApiType::Wms).unwrap_err();
        assert_eq!(err.to_string(), "Only WMTS is supported on this layer");
    }
}
