//! HTTP access to the Sentinel Hub services and to third-party OGC servers.
//!
//! Every request goes through [`ShClient::send`], which bounds the call with
//! the configured timeout and retries transient failures (transport errors,
//! 5xx, 429) according to the [`RetryPolicy`].
//!
//! The bearer token is only attached by a view returned from
//! [`ShClient::authenticated`]; plain requests never carry it.

use crate::core::retry::{ensure_timeout, with_retry, RetryPolicy};
use crate::utils::error::{Result, ShError};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::{Arc, RwLock};
use std::time::Duration;

pub const DEFAULT_OAUTH_URL: &str = "https://services.sentinel-hub.com/oauth/token";
pub const DEFAULT_TPDI_URL: &str = "https://services.sentinel-hub.com/api/v1/dataimport";

/// Per-request overrides of the client defaults.
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    pub auth_token: Option<String>,
    pub timeout: Option<Duration>,
    pub retries: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Cheap to clone: clones share the HTTP connection pool and the auth token.
#[derive(Debug, Clone)]
pub struct ShClient {
    http: Client,
    auth_token: Arc<RwLock<Option<String>>>,
    token_override: Option<String>,
    send_auth: bool,
    retry_policy: RetryPolicy,
    timeout: Option<Duration>,
    oauth_url: String,
    tpdi_url: String,
}

impl Default for ShClient {
    fn default() -> Self {
        Self::new()
    }
}

impl ShClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
            auth_token: Arc::new(RwLock::new(None)),
            token_override: None,
            send_auth: false,
            retry_policy: RetryPolicy::default(),
            timeout: None,
            oauth_url: DEFAULT_OAUTH_URL.to_string(),
            tpdi_url: DEFAULT_TPDI_URL.to_string(),
        }
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_oauth_url(mut self, oauth_url: impl Into<String>) -> Self {
        self.oauth_url = oauth_url.into();
        self
    }

    pub fn with_tpdi_url(mut self, tpdi_url: impl Into<String>) -> Self {
        self.tpdi_url = tpdi_url.into().trim_end_matches('/').to_string();
        self
    }

    /// A client view with the given overrides applied; the shared token of
    /// `self` stays untouched.
    pub fn with_request_config(&self, config: &RequestConfig) -> Self {
        let mut client = self.clone();
        if let Some(token) = &config.auth_token {
            client.token_override = Some(token.clone());
        }
        if let Some(timeout) = config.timeout {
            client.timeout = Some(timeout);
        }
        if let Some(retries) = config.retries {
            client.retry_policy.max_retries = retries;
        }
        client
    }

    pub fn set_auth_token(&self, token: Option<String>) {
        let mut guard = self.auth_token.write().unwrap_or_else(|e| e.into_inner());
        *guard = token;
    }

    pub fn auth_token(&self) -> Option<String> {
        if let Some(token) = &self.token_override {
            return Some(token.clone());
        }
        self.auth_token
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn require_auth_token(&self) -> Result<String> {
        self.auth_token().ok_or_else(|| ShError::AuthenticationError {
            message: "Must be authenticated to perform request".to_string(),
        })
    }

    /// A view that sends the bearer token with every request. Only for
    /// Sentinel Hub hosted endpoints.
    pub fn authenticated(&self) -> Result<Self> {
        self.require_auth_token()?;
        let mut client = self.clone();
        client.send_auth = true;
        Ok(client)
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn tpdi_url(&self) -> &str {
        &self.tpdi_url
    }

    /// OAuth2 client-credentials flow; the token is stored on the client.
    pub async fn request_auth_token(&self, client_id: &str, client_secret: &str) -> Result<String> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ];
        let response = self
            .send("requestAuthToken", |http| http.post(&self.oauth_url).form(&form))
            .await?;
        let token: TokenResponse = response.json().await?;

        tracing::info!("🔑 Obtained auth token (expires in {:?} s)", token.expires_in);
        self.set_auth_token(Some(token.access_token.clone()));
        Ok(token.access_token)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.auth_token() {
            Some(token) if self.send_auth => request.bearer_auth(token),
            _ => request,
        }
    }

    pub async fn send<F>(&self, name: &str, build: F) -> Result<Response>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let attempt = || {
            let request = build(&self.http);
            async move {
                let response = request.send().await?;
                Self::check_status(response).await
            }
        };
        ensure_timeout(self.timeout, with_retry(&self.retry_policy, name, attempt)).await
    }

    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        tracing::debug!("{} {}", status, response.url());
        if status.is_success() {
            return Ok(response);
        }
        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        Err(ShError::HttpStatusError {
            status: status.as_u16(),
            url,
            body,
        })
    }

    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        tracing::debug!("GET {}", url);
        let response = self
            .send("getMap", |http| self.authorize(http.get(url)))
            .await?;
        Ok(response.bytes().await?.to_vec())
    }

    pub async fn get_text(&self, url: &str, query: &[(String, String)]) -> Result<String> {
        tracing::debug!("GET {}", url);
        let response = self
            .send("getText", |http| http.get(url).query(query))
            .await?;
        Ok(response.text().await?)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(String, String)]) -> Result<T> {
        tracing::debug!("GET {} {:?}", url, query);
        let response = self
            .send("getJson", |http| self.authorize(http.get(url).query(query)))
            .await?;
        Ok(response.json().await?)
    }

    pub async fn post_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(String, String)],
        body: &serde_json::Value,
        headers: &[(&str, &str)],
    ) -> Result<T> {
        tracing::debug!("POST {} {:?}", url, query);
        let response = self
            .send("postJson", |http| {
                let mut request = self.authorize(http.post(url).query(query).json(body));
                for (key, value) in headers {
                    request = request.header(*key, *value);
                }
                request
            })
            .await?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn fast_client() -> ShClient {
        ShClient::new().with_retry_policy(RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(1),
            backoff_factor: 1,
        })
    }

    #[test]
    fn test_request_config_overrides_token_only_for_view() {
        let client = ShClient::new();
        client.set_auth_token(Some("shared".to_string()));

        let view = client.with_request_config(&RequestConfig {
            auth_token: Some("override".to_string()),
            timeout: Some(Duration::from_secs(3)),
            retries: Some(0),
        });

        assert_eq!(view.auth_token().as_deref(), Some("override"));
        assert_eq!(view.timeout(), Some(Duration::from_secs(3)));
        assert_eq!(view.retry_policy().max_retries, 0);
        assert_eq!(client.auth_token().as_deref(), Some("shared"));
    }

    #[test]
    fn test_clones_share_token() {
        let client = ShClient::new();
        let clone = client.clone();
        clone.set_auth_token(Some("abc".to_string()));
        assert_eq!(client.auth_token().as_deref(), Some("abc"));

        client.set_auth_token(None);
        let err = clone.require_auth_token().unwrap_err();
        assert_eq!(err.to_string(), "Must be authenticated to perform request");
    }

    #[tokio::test]
    async fn test_request_auth_token_stores_token() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/oauth/token")
                    .body_includes("grant_type=client_credentials")
                    .body_includes("client_id=my-id");
                then.status(200)
                    .header("Content-Type", "application/json")
                    .json_body(serde_json::json!({
                        "access_token": "TOKEN111",
                        "expires_in": 3600,
                        "token_type": "Bearer"
                    }));
            })
            .await;

        let client = fast_client().with_oauth_url(server.url("/oauth/token"));
        let token = client.request_auth_token("my-id", "my-secret").await.unwrap();

        mock.assert_async().await;
        assert_eq!(token, "TOKEN111");
        assert_eq!(client.auth_token().as_deref(), Some("TOKEN111"));
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/wms");
                then.status(503);
            })
            .await;

        let result = fast_client().get_bytes(&server.url("/wms")).await;

        assert!(matches!(result, Err(ShError::HttpStatusError { status: 503, .. })));
        mock.assert_hits_async(3).await;
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/wms");
                then.status(400).body("bad bbox");
            })
            .await;

        let result = fast_client().get_bytes(&server.url("/wms")).await;

        match result {
            Err(ShError::HttpStatusError { status, body, .. }) => {
                assert_eq!(status, 400);
                assert_eq!(body, "bad bbox");
            }
            other => panic!("unexpected result: {:?}", other.map(|b| b.len())),
        }
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_bearer_token_only_on_authenticated_view() {
        let server = MockServer::start_async().await;
        let with_token = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/tile.png")
                    .header("Authorization", "Bearer TOKEN111");
                then.status(200).body(vec![1u8, 2, 3]);
            })
            .await;
        let without_token = server
            .mock_async(|when, then| {
                when.method(GET).path("/tile.png").header_missing("authorization");
                then.status(200).body(vec![4u8]);
            })
            .await;

        let client = fast_client();
        client.set_auth_token(Some("TOKEN111".to_string()));

        let plain = client.get_bytes(&server.url("/tile.png")).await.unwrap();
        assert_eq!(plain, vec![4]);
        without_token.assert_async().await;
        with_token.assert_hits_async(0).await;

        let bytes = client
            .authenticated()
            .unwrap()
            .get_bytes(&server.url("/tile.png"))
            .await
            .unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        with_token.assert_async().await;
    }

    #[test]
    fn test_authenticated_view_requires_token() {
        let err = ShClient::new().authenticated().unwrap_err();
        assert!(matches!(err, ShError::AuthenticationError { .. }));
    }
}
