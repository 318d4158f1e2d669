use crate::adapters::http::ShClient;
use crate::domain::ports::Layer;
use crate::layer::capabilities::{fetch_capabilities_layers, OgcServiceType};
use crate::layer::dataset::Dataset;
use crate::layer::eocloud::EoCloudLayer;
use crate::layer::sh_v3::{ProcessingLayer, S1GRD, S2L1C, S2L2A, S3OLCI, S5PL2};
use crate::layer::wms_layer::WmsLayer;
use crate::layer::wmts::WmtsLayer;
use crate::utils::error::Result;
use serde::Deserialize;

const SH_V3_WMS_PATH: &str = "ogc/wms/";
const SH_V1_WMS_PATH: &str = "v1/wms/";

#[derive(Debug, Deserialize)]
struct JsonCapabilities {
    layers: Vec<JsonCapabilitiesLayer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonCapabilitiesLayer {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    dataset: Option<String>,
}

/// Which kind of service a base URL points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceKind {
    /// Sentinel Hub configuration instance; `host` ends with a slash.
    SentinelHub { host: String, instance_id: String },
    Wmts,
    Wms,
}

pub fn classify_service_url(base_url: &str) -> ServiceKind {
    for marker in [SH_V3_WMS_PATH, SH_V1_WMS_PATH] {
        if let Some(pos) = base_url.find(marker) {
            let host = &base_url[..pos];
            if host.ends_with('/') {
                let instance_id = base_url[pos + marker.len()..]
                    .split(['?', '/'])
                    .next()
                    .unwrap_or_default();
                return ServiceKind::SentinelHub {
                    host: host.to_string(),
                    instance_id: instance_id.to_string(),
                };
            }
        }
    }
    if base_url.to_ascii_lowercase().contains("wmts") {
        ServiceKind::Wmts
    } else {
        ServiceKind::Wms
    }
}

pub struct LayersFactory;

impl LayersFactory {
    /// Lists the layers of a service, typed by what the service is.
    /// `filter` receives the layer id.
    pub async fn make_layers(
        client: &ShClient,
        base_url: &str,
        filter: Option<&(dyn Fn(&str) -> bool + Send + Sync)>,
    ) -> Result<Vec<Box<dyn Layer>>> {
        let keep = |id: &str| filter.map_or(true, |f| f(id));

        match classify_service_url(base_url) {
            ServiceKind::SentinelHub { host, instance_id } => {
                let query = [
                    ("request".to_string(), "GetCapabilities".to_string()),
                    ("format".to_string(), "application/json".to_string()),
                ];
                let capabilities: JsonCapabilities = client.get_json(base_url, &query).await?;

                let mut layers = Vec::new();
                for entry in capabilities.layers.into_iter().filter(|l| keep(&l.id)) {
                    if let Some(layer) = Self::make_sh_layer(&host, &instance_id, entry)? {
                        layers.push(layer);
                    }
                }
                tracing::info!("🗂️ {} Sentinel Hub layers in instance {}", layers.len(), instance_id);
                Ok(layers)
            }
            ServiceKind::Wmts => {
                let layers = fetch_capabilities_layers(client, base_url, OgcServiceType::Wmts).await?;
                Ok(layers
                    .into_iter()
                    .filter(|l| keep(&l.name))
                    .map(|l| {
                        let mut layer = WmtsLayer::new(base_url, l.name);
                        if let Some(title) = l.title {
                            layer = layer.with_title(title);
                        }
                        if let Some(description) = l.description {
                            layer = layer.with_description(description);
                        }
                        if let Some(url) = l.resource_url {
                            layer = layer.with_resource_url(url);
                        }
                        Box::new(layer) as Box<dyn Layer>
                    })
                    .collect())
            }
            ServiceKind::Wms => {
                let layers = fetch_capabilities_layers(client, base_url, OgcServiceType::Wms).await?;
                Ok(layers
                    .into_iter()
                    .filter(|l| keep(&l.name))
                    .map(|l| {
                        let mut layer = WmsLayer::new(base_url, l.name);
                        if let Some(title) = l.title {
                            layer = layer.with_title(title);
                        }
                        if let Some(description) = l.description {
                            layer = layer.with_description(description);
                        }
                        Box::new(layer) as Box<dyn Layer>
                    })
                    .collect())
            }
        }
    }

    fn make_sh_layer(
        host: &str,
        instance_id: &str,
        entry: JsonCapabilitiesLayer,
    ) -> Result<Option<Box<dyn Layer>>> {
        let Some(dataset_name) = entry.dataset.as_deref() else {
            tracing::warn!("⚠️ Layer {} has no dataset, skipped", entry.id);
            return Ok(None);
        };
        let Some(dataset) = Dataset::from_capabilities_name(dataset_name) else {
            tracing::warn!("⚠️ Unknown dataset {} of layer {}, skipped", dataset_name, entry.id);
            return Ok(None);
        };

        let title = entry.name.unwrap_or_default();
        let description = entry.description.unwrap_or_default();

        macro_rules! v3_layer {
            ($collection:expr) => {
                Box::new(
                    ProcessingLayer::new($collection)
                        .with_hostname(host)
                        .with_instance(instance_id, entry.id.as_str())
                        .with_title(title)
                        .with_description(description),
                ) as Box<dyn Layer>
            };
        }

        let layer = match dataset_name {
            "S2L1C" => v3_layer!(S2L1C::default()),
            "S2L2A" => v3_layer!(S2L2A::default()),
            "S1GRD" => v3_layer!(S1GRD::default()),
            "S3OLCI" => v3_layer!(S3OLCI),
            "S5PL2" => v3_layer!(S5PL2::default()),
            _ => Box::new(
                EoCloudLayer::new(dataset.with_hostname(host), instance_id, &entry.id)?
                    .with_title(title)
                    .with_description(description),
            ) as Box<dyn Layer>,
        };
        Ok(Some(layer))
    }
}
