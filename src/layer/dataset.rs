pub const SH_SERVICE_HOSTNAME: &str = "https://services.sentinel-hub.com/";
pub const SH_CREODIAS_HOSTNAME: &str = "https://creodias.sentinel-hub.com/";
pub const SH_EOCLOUD_HOSTNAME: &str = "https://eocloud.sentinel-hub.com/";

/// Static description of an imagery collection as the service exposes it.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub id: String,
    /// Dataset name in the JSON GetCapabilities response.
    pub sh_json_get_capabilities_dataset: String,
    pub sh_wms_evalsource: String,
    pub sh_processing_api_datasource_abbreviation: String,
    /// Always ends with a slash.
    pub sh_service_hostname: String,
    pub search_index_url: Option<String>,
    pub find_dates_utc_url: Option<String>,
    pub orbit_time_minutes: Option<f64>,
}

fn v3_index(hostname: &str, collection: &str, endpoint: &str) -> Option<String> {
    Some(format!(
        "{}index/v3/collections/{}/{}",
        hostname, collection, endpoint
    ))
}

impl Dataset {
    fn sh_v3(id: &str, collection: &str, evalsource: &str, hostname: &str, orbit_minutes: f64) -> Self {
        Self {
            id: id.to_string(),
            sh_json_get_capabilities_dataset: collection.to_string(),
            sh_wms_evalsource: evalsource.to_string(),
            sh_processing_api_datasource_abbreviation: collection.to_string(),
            sh_service_hostname: hostname.to_string(),
            search_index_url: v3_index(hostname, collection, "searchIndex"),
            find_dates_utc_url: v3_index(hostname, collection, "findAvailableData"),
            orbit_time_minutes: Some(orbit_minutes),
        }
    }

    fn eocloud(id: &str, name: &str, index: &str, orbit_minutes: f64) -> Self {
        Self {
            id: id.to_string(),
            sh_json_get_capabilities_dataset: name.to_string(),
            sh_wms_evalsource: name.to_string(),
            sh_processing_api_datasource_abbreviation: name.to_string(),
            sh_service_hostname: SH_EOCLOUD_HOSTNAME.to_string(),
            search_index_url: Some(format!("{}index/{}/v2/search", SH_EOCLOUD_HOSTNAME, index)),
            find_dates_utc_url: Some(format!("{}index/{}/v2/dates", SH_EOCLOUD_HOSTNAME, index)),
            orbit_time_minutes: Some(orbit_minutes),
        }
    }

    pub fn s2l1c() -> Self {
        Self::sh_v3("AWS_S2L1C", "S2L1C", "S2", SH_SERVICE_HOSTNAME, 50.3)
    }

    pub fn s2l2a() -> Self {
        Self::sh_v3("AWS_S2L2A", "S2L2A", "S2L2A", SH_SERVICE_HOSTNAME, 50.3)
    }

    pub fn s1grd_aws_eu() -> Self {
        Self::sh_v3("AWSEU_S1GRD", "S1GRD", "S1GRD", SH_SERVICE_HOSTNAME, 49.3)
    }

    pub fn s3olci() -> Self {
        Self::sh_v3("CRE_S3OLCI", "S3OLCI", "S3OLCI", SH_CREODIAS_HOSTNAME, 50.495)
    }

    pub fn s5pl2() -> Self {
        Self::sh_v3("CRE_S5PL2", "S5PL2", "S5P_L2", SH_CREODIAS_HOSTNAME, 101.0)
    }

    pub fn eocloud_landsat7() -> Self {
        Self::eocloud("EOC_L7", "L7", "landsat7", 98.9)
    }

    pub fn eocloud_landsat8() -> Self {
        Self::eocloud("EOC_L8", "L8", "landsat8", 99.0)
    }

    /// Maps the `dataset` field of a JSON GetCapabilities layer entry.
    pub fn from_capabilities_name(name: &str) -> Option<Self> {
        match name {
            "S2L1C" => Some(Self::s2l1c()),
            "S2L2A" => Some(Self::s2l2a()),
            "S1GRD" => Some(Self::s1grd_aws_eu()),
            "S3OLCI" => Some(Self::s3olci()),
            "S5PL2" => Some(Self::s5pl2()),
            "L7" => Some(Self::eocloud_landsat7()),
            "L8" => Some(Self::eocloud_landsat8()),
            _ => None,
        }
    }

    pub fn orbit_time_ms(&self) -> Option<i64> {
        self.orbit_time_minutes
            .map(|minutes| (minutes * 60.0 * 1000.0).round() as i64)
    }

    /// Points every endpoint of the dataset at another host (deployments,
    /// proxies, test servers).
    pub fn with_hostname(mut self, hostname: &str) -> Self {
        let new_host = if hostname.ends_with('/') {
            hostname.to_string()
        } else {
            format!("{}/", hostname)
        };
        let old_host = std::mem::replace(&mut self.sh_service_hostname, new_host.clone());

        let rebase = |url: Option<String>| {
            url.map(|u| match u.strip_prefix(&old_host) {
                Some(rest) => format!("{}{}", new_host, rest),
                None => u,
            })
        };
        self.search_index_url = rebase(self.search_index_url.take());
        self.find_dates_utc_url = rebase(self.find_dates_utc_url.take());
        self
    }
}
