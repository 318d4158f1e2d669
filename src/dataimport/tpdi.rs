use crate::adapters::http::ShClient;
use crate::dataimport::{TpdProviderKind, TpdiCollection, TpdiSearchParams};
use crate::utils::error::{Result, ShError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_SEARCH_COUNT: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quota {
    #[serde(default)]
    pub id: Option<String>,
    pub collection_id: String,
    /// km²
    pub quota_sqkm: f64,
    #[serde(default)]
    pub quota_used: f64,
}

#[derive(Debug, Deserialize)]
struct QuotaResponse {
    #[serde(default)]
    data: Vec<Quota>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchLinks {
    #[serde(default)]
    pub next_token: Option<String>,
    #[serde(default)]
    pub current_token: Option<String>,
}

/// Provider features are returned as-is; their schema differs per provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub features: Vec<Value>,
    #[serde(default)]
    pub links: Option<SearchLinks>,
}

impl SearchResult {
    pub fn next_viewtoken(&self) -> Option<&str> {
        self.links.as_ref().and_then(|l| l.next_token.as_deref())
    }
}

/// Third-party data import service. All calls need an auth token.
#[derive(Debug, Clone)]
pub struct Tpdi {
    client: ShClient,
}

impl Tpdi {
    pub fn new(client: ShClient) -> Self {
        Self { client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.client.tpdi_url(), path)
    }

    async fn quotas(&self, collection: Option<TpdiCollection>) -> Result<Vec<Quota>> {
        let client = self.client.authenticated()?;
        let query: Vec<(String, String)> = collection
            .map(|c| vec![("collectionId".to_string(), c.as_str().to_string())])
            .unwrap_or_default();
        let response: QuotaResponse = client.get_json(&self.url("quotas"), &query).await?;
        Ok(response.data)
    }

    pub async fn get_quota(&self, collection: TpdiCollection) -> Result<Vec<Quota>> {
        self.quotas(Some(collection)).await
    }

    pub async fn get_quotas(&self) -> Result<Vec<Quota>> {
        self.quotas(None).await
    }

    pub async fn search(
        &self,
        provider: TpdProviderKind,
        params: &TpdiSearchParams,
        count: Option<u32>,
        viewtoken: Option<&str>,
    ) -> Result<SearchResult> {
        let client = self.client.authenticated()?;
        let data_provider = provider.data_provider();
        let payload = data_provider.search_payload(params)?;
        let query = data_provider.search_pagination(count.unwrap_or(DEFAULT_SEARCH_COUNT), viewtoken);

        tracing::debug!("🔍 TPDI search at {}", provider);
        client
            .post_json(&self.url("search"), &query, &payload, &[])
            .await
    }

    pub async fn get_thumbnail(&self, collection: TpdiCollection, product_id: &str) -> Result<Vec<u8>> {
        if product_id.trim().is_empty() {
            return Err(ShError::validation("productId must be provided"));
        }
        let client = self.client.authenticated()?;
        let url = self.url(&format!(
            "collections/{}/products/{}/thumbnail",
            collection.as_str(),
            product_id
        ));
        client.get_bytes(&url).await
    }

    /// Orders `items` (or everything matching `params` when empty).
    pub async fn create_order(
        &self,
        provider: TpdProviderKind,
        name: &str,
        collection_id: Option<&str>,
        items: &[String],
        params: &TpdiSearchParams,
    ) -> Result<Value> {
        let client = self.client.authenticated()?;
        let payload = provider
            .data_provider()
            .order_payload(name, collection_id, items, params)?;

        let order: Value = client
            .post_json(&self.url("order"), &[], &payload, &[])
            .await?;
        tracing::info!("🛒 Created {} order \"{}\"", provider, name);
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_requires_authentication() {
        let tpdi = Tpdi::new(ShClient::new());
        let err = tpdi.get_quotas().await.unwrap_err();
        assert_eq!(err.to_string(), "Must be authenticated to perform request");

        let err = tpdi
            .search(TpdProviderKind::Maxar, &TpdiSearchParams::default(), None, None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Must be authenticated to perform request");
    }

    #[tokio::test]
    async fn test_thumbnail_requires_product_id() {
        let client = ShClient::new();
        client.set_auth_token(Some("TOKEN111".to_string()));
        let err = Tpdi::new(client)
            .get_thumbnail(TpdiCollection::PlanetScope, "")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "productId must be provided");
    }

    #[test]
    fn test_search_result_viewtoken() {
        let result: SearchResult = serde_json::from_value(serde_json::json!({
            "type": "FeatureCollection",
            "features": [{ "id": "x" }],
            "links": { "nextToken": "abc" }
        }))
        .unwrap();
        assert_eq!(result.next_viewtoken(), Some("abc"));
        assert_eq!(result.features.len(), 1);
    }
}
