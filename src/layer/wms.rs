use crate::domain::model::{to_iso_string, GetMapParams};
use crate::utils::error::{Result, ShError};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use url::Url;

pub fn encode_evalscript(evalscript: &str) -> String {
    BASE64.encode(evalscript.as_bytes())
}

/// Optional Sentinel Hub extensions of a GetMap request.
#[derive(Debug, Clone, Default)]
pub struct WmsExtras<'a> {
    pub evalscript: Option<&'a str>,
    pub evalscript_url: Option<&'a str>,
    pub evalsource: Option<&'a str>,
    pub additional: Vec<(String, String)>,
}

/// Builds a WMS 1.1.1 GetMap URL (lon/lat axis order in `BBOX`).
pub fn wms_get_map_url(
    base_url: &str,
    layer_id: &str,
    params: &GetMapParams,
    extras: &WmsExtras<'_>,
) -> Result<String> {
    let bbox = params
        .bbox
        .as_ref()
        .ok_or_else(|| ShError::validation("Parameter bbox must be specified"))?;

    let mut url = Url::parse(base_url)?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("SERVICE", "WMS")
            .append_pair("REQUEST", "GetMap")
            .append_pair("VERSION", "1.1.1")
            .append_pair("LAYERS", layer_id)
            .append_pair("SRS", &bbox.crs.auth_id())
            .append_pair(
                "BBOX",
                &format!("{},{},{},{}", bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y),
            )
            .append_pair("WIDTH", &params.width.to_string())
            .append_pair("HEIGHT", &params.height.to_string())
            .append_pair("FORMAT", params.format.as_str());

        match (&params.from_time, &params.to_time) {
            (Some(from), Some(to)) => {
                query.append_pair("TIME", &format!("{}/{}", to_iso_string(from), to_iso_string(to)));
            }
            (None, Some(to)) => {
                query.append_pair("TIME", &to_iso_string(to));
            }
            _ => {}
        }

        query
            .append_pair("SHOWLOGO", "false")
            .append_pair("TRANSPARENT", "true");

        if let Some(preview) = params.preview {
            query.append_pair("PREVIEW", &preview.to_string());
        }
        if let Some(evalscript) = extras.evalscript {
            query.append_pair("EVALSCRIPT", &encode_evalscript(evalscript));
        }
        if let Some(evalscript_url) = extras.evalscript_url {
            query.append_pair("EVALSCRIPTURL", evalscript_url);
        }
        if extras.evalscript.is_some() || extras.evalscript_url.is_some() {
            if let Some(evalsource) = extras.evalsource {
                query.append_pair("EVALSOURCE", evalsource);
            }
        }
        for (key, value) in &extras.additional {
            query.append_pair(key, value);
        }
    }

    Ok(url.to_string())
}
