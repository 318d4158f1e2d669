use crate::adapters::http::ShClient;
use crate::core::retry::{RetryPolicy, DEFAULT_MAX_RETRIES};
use crate::layer::dataset::Dataset;
use crate::utils::error::{Result, ShError};
use crate::utils::validation::{
    validate_non_empty_string, validate_positive_number, validate_range, validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Existing token, used instead of the client credentials.
    pub token: Option<String>,
    pub oauth_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub instance_id: Option<String>,
    /// Overrides the default dataset host (test or proxy servers).
    pub hostname: Option<String>,
    pub tpdi_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpConfig {
    pub timeout_seconds: Option<u64>,
    pub retry_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    pub json: Option<bool>,
}

impl ClientConfig {
    /// Loads the configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ShError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// Parses the configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // substitute environment variables
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ShError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` references (e.g. `${SH_CLIENT_ID}`); unset variables are left as-is.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ShError::ConfigError {
            message: format!("Invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    fn check_substituted(field: &str, value: &str) -> Result<()> {
        if value.starts_with("${") {
            return Err(ShError::ConfigValidationError {
                field: field.to_string(),
                message: format!("environment variable {} is not set", value),
            });
        }
        Ok(())
    }

    /// Checks that the configuration values are usable.
    pub fn validate_config(&self) -> Result<()> {
        // client_id and client_secret come as a pair
        match (&self.auth.client_id, &self.auth.client_secret) {
            (Some(id), Some(secret)) => {
                Self::check_substituted("auth.client_id", id)?;
                Self::check_substituted("auth.client_secret", secret)?;
                validate_non_empty_string("auth.client_id", id)?;
            }
            (Some(_), None) => {
                return Err(ShError::MissingConfigError {
                    field: "auth.client_secret".to_string(),
                })
            }
            (None, Some(_)) => {
                return Err(ShError::MissingConfigError {
                    field: "auth.client_id".to_string(),
                })
            }
            (None, None) => {}
        }
        if let Some(token) = &self.auth.token {
            Self::check_substituted("auth.token", token)?;
        }

        // service endpoints
        for (field, url) in [
            ("auth.oauth_url", &self.auth.oauth_url),
            ("service.hostname", &self.service.hostname),
            ("service.tpdi_url", &self.service.tpdi_url),
        ] {
            if let Some(url) = url {
                validate_url(field, url)?;
            }
        }
        if let Some(instance_id) = &self.service.instance_id {
            validate_non_empty_string("service.instance_id", instance_id)?;
        }

        // http
        if let Some(timeout) = self.http.timeout_seconds {
            validate_positive_number("http.timeout_seconds", timeout, 1)?;
        }
        if let Some(retries) = self.http.retry_attempts {
            validate_range("http.retry_attempts", retries, 0, 10)?;
        }

        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        let default = RetryPolicy::default();
        RetryPolicy {
            max_retries: self.http.retry_attempts.unwrap_or(DEFAULT_MAX_RETRIES),
            base_delay: self
                .http
                .retry_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(default.base_delay),
            ..default
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.http.timeout_seconds.map(Duration::from_secs)
    }

    pub fn instance_id(&self) -> Option<&str> {
        self.service.instance_id.as_deref()
    }

    /// Dataset served from the configured host, if one is set.
    pub fn dataset(&self, dataset: Dataset) -> Dataset {
        match &self.service.hostname {
            Some(hostname) => dataset.with_hostname(hostname),
            None => dataset,
        }
    }

    pub fn is_json_logging(&self) -> bool {
        self.logging.json.unwrap_or(false)
    }

    /// Builds a client from the settings, carrying the configured token if any.
    pub fn build_client(&self) -> ShClient {
        let mut client = ShClient::new()
            .with_retry_policy(self.retry_policy())
            .with_timeout(self.timeout());
        if let Some(oauth_url) = &self.auth.oauth_url {
            client = client.with_oauth_url(oauth_url.clone());
        }
        if let Some(tpdi_url) = &self.service.tpdi_url {
            client = client.with_tpdi_url(tpdi_url.clone());
        }
        if let Some(token) = &self.auth.token {
            client.set_auth_token(Some(token.clone()));
        }
        client
    }

    /// Requests a token with the client credentials unless one is already set.
    pub async fn authenticate(&self, client: &ShClient) -> Result<()> {
        if client.auth_token().is_some() {
            return Ok(());
        }
        if let (Some(id), Some(secret)) = (&self.auth.client_id, &self.auth.client_secret) {
            client.request_auth_token(id, secret).await?;
        }
        Ok(())
    }
}

impl Validate for ClientConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
