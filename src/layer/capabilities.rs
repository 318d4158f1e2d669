//! OGC GetCapabilities (WMS 1.1.1/1.3.0 and WMTS 1.0.0) layer listings.

use crate::adapters::http::ShClient;
use crate::utils::error::Result;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitiesLayer {
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    /// WMTS only: tile URL template with `{TileMatrix}`, `{TileCol}`, `{TileRow}`.
    pub resource_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OgcServiceType {
    Wms,
    Wmts,
}

impl OgcServiceType {
    fn as_str(&self) -> &'static str {
        match self {
            OgcServiceType::Wms => "wms",
            OgcServiceType::Wmts => "wmts",
        }
    }

    /// Element holding the layer name: `Name` in WMS, `ows:Identifier` in WMTS.
    fn name_tag(&self) -> &'static [u8] {
        match self {
            OgcServiceType::Wms => b"Name",
            OgcServiceType::Wmts => b"Identifier",
        }
    }
}

#[derive(Default)]
struct PartialLayer {
    name: Option<String>,
    title: Option<String>,
    description: Option<String>,
    resource_url: Option<String>,
}

fn tile_resource_url(element: &BytesStart<'_>) -> Result<Option<String>> {
    let mut resource_type = None;
    let mut template = None;
    for attr in element.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        match attr.key.local_name().as_ref() {
            b"resourceType" => resource_type = Some(attr.unescape_value()?.into_owned()),
            b"template" => template = Some(attr.unescape_value()?.into_owned()),
            _ => {}
        }
    }
    Ok(match resource_type.as_deref() {
        Some("tile") => template,
        _ => None,
    })
}

/// Lists named layers; group layers without a name are skipped.
pub fn parse_capabilities_layers(xml: &str, service: OgcServiceType) -> Result<Vec<CapabilitiesLayer>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let name_tag = service.name_tag();
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut open_layers: Vec<PartialLayer> = Vec::new();
    let mut layers = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let tag = e.local_name().as_ref().to_vec();
                if tag == b"Layer" {
                    open_layers.push(PartialLayer::default());
                } else if tag == b"ResourceURL" && path.last().map(|p| p.as_slice()) == Some(&b"Layer"[..]) {
                    if let (Some(layer), Some(url)) = (open_layers.last_mut(), tile_resource_url(&e)?) {
                        layer.resource_url.get_or_insert(url);
                    }
                }
                path.push(tag);
            }
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"ResourceURL"
                    && path.last().map(|p| p.as_slice()) == Some(&b"Layer"[..])
                {
                    if let (Some(layer), Some(url)) = (open_layers.last_mut(), tile_resource_url(&e)?) {
                        layer.resource_url.get_or_insert(url);
                    }
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"Layer" {
                    if let Some(layer) = open_layers.pop() {
                        if let Some(name) = layer.name {
                            layers.push(CapabilitiesLayer {
                                name,
                                title: layer.title,
                                description: layer.description,
                                resource_url: layer.resource_url,
                            });
                        }
                    }
                }
                path.pop();
            }
            Event::Text(e) => {
                let text = e.unescape()?.into_owned();
                assign_text(&path, name_tag, open_layers.last_mut(), text);
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                assign_text(&path, name_tag, open_layers.last_mut(), text);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(layers)
}

fn assign_text(path: &[Vec<u8>], name_tag: &[u8], layer: Option<&mut PartialLayer>, text: String) {
    let (Some(layer), [.., parent, tag]) = (layer, path) else {
        return;
    };
    // only direct children of <Layer>; Style and TileMatrixSet carry titles too
    if parent.as_slice() != b"Layer" {
        return;
    }
    match tag.as_slice() {
        t if t == name_tag => layer.name = Some(text),
        b"Title" => layer.title = Some(text),
        b"Abstract" => layer.description = Some(text),
        _ => {}
    }
}

pub async fn fetch_capabilities_layers(
    client: &ShClient,
    base_url: &str,
    service: OgcServiceType,
) -> Result<Vec<CapabilitiesLayer>> {
    let query = [
        ("service".to_string(), service.as_str().to_string()),
        ("request".to_string(), "GetCapabilities".to_string()),
    ];
    let xml = client.get_text(base_url, &query).await?;
    let layers = parse_capabilities_layers(&xml, service)?;
    tracing::debug!("📋 {} layers listed by {}", layers.len(), base_url);
    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WMS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<WMS_Capabilities version="1.3.0" xmlns="http://www.opengis.net/wms">
  <Service><Name>WMS</Name><Title>Proba-V</Title></Service>
  <Capability>
    <Layer>
      <Title>GeoServer Web Map Service</Title>
      <Layer queryable="1">
        <Name>PROBAV_S1_TOC_1KM</Name>
        <Title>Proba-V S1 TOC 1KM</Title>
        <Abstract>Daily &amp; synthesis</Abstract>
        <Style><Name>default</Name><Title>Default style</Title></Style>
      </Layer>
      <Layer queryable="1">
        <Name>PROBAV_S10_TOC_333M</Name>
        <Title><![CDATA[Proba-V S10 TOC 333M]]></Title>
      </Layer>
    </Layer>
  </Capability>
</WMS_Capabilities>"#;

    const WMTS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Capabilities xmlns="http://www.opengis.net/wmts/1.0" xmlns:ows="http://www.opengis.net/ows/1.1" version="1.0.0">
  <Contents>
    <Layer>
      <ows:Title>global_monthly_2020_01_mosaic</ows:Title>
      <ows:Abstract>Monthly mosaic</ows:Abstract>
      <ows:Identifier>global_monthly_2020_01_mosaic</ows:Identifier>
      <Style isDefault="true"><ows:Identifier>default</ows:Identifier></Style>
      <ResourceURL format="image/png" resourceType="tile" template="https://tiles.planet.com/basemaps/v1/planet-tiles/global_monthly_2020_01_mosaic/gmap/{TileMatrix}/{TileCol}/{TileRow}.png"/>
    </Layer>
    <TileMatrixSet><ows:Identifier>GoogleMapsCompatible15</ows:Identifier></TileMatrixSet>
  </Contents>
</Capabilities>"#;

    #[test]
    fn test_parse_wms_layers() {
        let layers = parse_capabilities_layers(WMS_XML, OgcServiceType::Wms).unwrap();

        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0].name, "PROBAV_S1_TOC_1KM");
        assert_eq!(layers[0].title.as_deref(), Some("Proba-V S1 TOC 1KM"));
        assert_eq!(layers[0].description.as_deref(), Some("Daily & synthesis"));
        assert_eq!(layers[1].title.as_deref(), Some("Proba-V S10 TOC 333M"));
        assert!(layers[1].resource_url.is_none());
    }

    #[test]
    fn test_parse_wmts_layers() {
        let layers = parse_capabilities_layers(WMTS_XML, OgcServiceType::Wmts).unwrap();

        assert_eq!(layers.len(), 1);
        assert_eq!(layers[0].name, "global_monthly_2020_01_mosaic");
        assert_eq!(layers[0].description.as_deref(), Some("Monthly mosaic"));
        assert_eq!(
            layers[0].resource_url.as_deref(),
            Some("https://tiles.planet.com/basemaps/v1/planet-tiles/global_monthly_2020_01_mosaic/gmap/{TileMatrix}/{TileCol}/{TileRow}.png")
        );
    }

    #[test]
    fn test_malformed_xml() {
        assert!(parse_capabilities_layers("<Capabilities><Layer></Contents>", OgcServiceType::Wms).is_err());
    }
}
