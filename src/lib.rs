pub mod adapters;
pub mod config;
pub mod core;
pub mod dataimport;
pub mod domain;
pub mod effects;
pub mod layer;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::ClientConfig;

pub use adapters::{RequestConfig, ShClient};
pub use dataimport::{Tpdi, TpdProviderKind, TpdiCollection, TpdiSearchParams};
pub use domain::geo::{BBox, Crs, Geometry, CRS_EPSG3857, CRS_EPSG4326};
pub use domain::model::{ApiType, GetMapParams, GetStatsParams, MimeType, PaginatedTiles, Stats, Tile};
pub use domain::ports::Layer;
pub use effects::Effects;
pub use layer::{LayersFactory, ProcessingLayer, WmsLayer, WmtsLayer};
pub use utils::error::{Result, ShError};
