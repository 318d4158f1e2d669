pub mod capabilities;
pub mod dataset;
pub mod eocloud;
pub mod factory;
pub mod processing;
pub mod sh_v3;
pub mod wms;
pub mod wms_layer;
pub mod wmts;

pub use dataset::Dataset;
pub use eocloud::EoCloudLayer;
pub use factory::LayersFactory;
pub use sh_v3::{Collection, ProcessingLayer, S1GRD, S2L1C, S2L2A, S3OLCI, S5PL2};
pub use wms_layer::WmsLayer;
pub use wmts::WmtsLayer;

use serde::Deserialize;

/// Envelope of every tile search endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TileSearchResponse<T> {
    pub tiles: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
}
