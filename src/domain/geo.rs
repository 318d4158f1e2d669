//! Coordinate reference systems, bounding boxes and the GeoJSON geometries the
//! service accepts.

use crate::utils::error::{Result, ShError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Crs {
    Epsg4326,
    Epsg3857,
}

pub const CRS_EPSG4326: Crs = Crs::Epsg4326;
pub const CRS_EPSG3857: Crs = Crs::Epsg3857;

impl Crs {
    pub fn epsg_code(&self) -> u32 {
        match self {
            Crs::Epsg4326 => 4326,
            Crs::Epsg3857 => 3857,
        }
    }

    /// e.g. `EPSG:4326`
    pub fn auth_id(&self) -> String {
        format!("EPSG:{}", self.epsg_code())
    }

    pub fn opengis_url(&self) -> String {
        format!("http://www.opengis.net/def/crs/EPSG/0/{}", self.epsg_code())
    }

    pub fn urn(&self) -> String {
        format!("urn:ogc:def:crs:EPSG::{}", self.epsg_code())
    }

    fn from_code(code: &str) -> Option<Self> {
        match code.trim() {
            "4326" => Some(Crs::Epsg4326),
            "3857" | "900913" => Some(Crs::Epsg3857),
            _ => None,
        }
    }
}

/// Resolves the CRS names the service and GeoJSON producers use:
/// `urn:ogc:def:crs:EPSG::4326`, `urn:ogc:def:crs:OGC:1.3:CRS84`,
/// `http://www.opengis.net/def/crs/EPSG/0/3857` and `EPSG:3857`.
pub fn find_crs_from_urn(urn: &str) -> Result<Crs> {
    let trimmed = urn.trim();
    if trimmed.ends_with("CRS84") {
        return Ok(Crs::Epsg4326);
    }

    let code = if let Some(rest) = trimmed.strip_prefix("urn:ogc:def:crs:EPSG:") {
        // both "EPSG::4326" and "EPSG:6.6:4326" appear in the wild
        rest.rsplit(':').next()
    } else if let Some(rest) = trimmed.strip_prefix("http://www.opengis.net/def/crs/EPSG/0/") {
        Some(rest)
    } else {
        trimmed.strip_prefix("EPSG:")
    };

    code.and_then(Crs::from_code)
        .ok_or_else(|| ShError::validation(format!("CRS not found: {}", urn)))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BBox {
    pub crs: Crs,
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BBox {
    pub fn new(crs: Crs, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            crs,
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    pub fn to_geojson(&self) -> Value {
        json!({
            "type": "Polygon",
            "crs": {
                "type": "name",
                "properties": { "name": self.crs.urn() }
            },
            "coordinates": [[
                [self.min_x, self.min_y],
                [self.max_x, self.min_y],
                [self.max_x, self.max_y],
                [self.min_x, self.max_y],
                [self.min_x, self.min_y]
            ]]
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedCrsProperties {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedCrs {
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: NamedCrsProperties,
}

impl NamedCrs {
    pub fn from_crs(crs: Crs) -> Self {
        Self {
            kind: "name".to_string(),
            properties: NamedCrsProperties { name: crs.urn() },
        }
    }
}

pub type Ring = Vec<[f64; 2]>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    Polygon {
        coordinates: Vec<Ring>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        crs: Option<NamedCrs>,
    },
    MultiPolygon {
        coordinates: Vec<Vec<Ring>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        crs: Option<NamedCrs>,
    },
}

impl Geometry {
    pub fn polygon(coordinates: Vec<Ring>) -> Self {
        Geometry::Polygon {
            coordinates,
            crs: None,
        }
    }

    pub fn crs(&self) -> Option<&NamedCrs> {
        match self {
            Geometry::Polygon { crs, .. } | Geometry::MultiPolygon { crs, .. } => crs.as_ref(),
        }
    }

    pub fn to_wkt(&self) -> String {
        match self {
            Geometry::Polygon { coordinates, .. } => format!("POLYGON {}", wkt_polygon(coordinates)),
            Geometry::MultiPolygon { coordinates, .. } => {
                let polygons: Vec<String> = coordinates.iter().map(|p| wkt_polygon(p)).collect();
                format!("MULTIPOLYGON ({})", polygons.join(", "))
            }
        }
    }
}

fn wkt_polygon(rings: &[Ring]) -> String {
    let rings: Vec<String> = rings
        .iter()
        .map(|ring| {
            let points: Vec<String> = ring.iter().map(|[x, y]| format!("{} {}", x, y)).collect();
            format!("({})", points.join(", "))
        })
        .collect();
    format!("({})", rings.join(", "))
}
