use async_trait::async_trait;
use icebrg_session::ClientConfig;
use icebrg_session::client::create_client;
use reqwest::header::AUTHORIZATION;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::error::SearchError;
use crate::model::SearchResponse;

#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
}

/// Source of suggestions for the query controller.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// `query` is already trimmed and at least the minimum length.
    async fn search(&self, query: &str, access_token: Option<&str>) -> Result<SearchResponse>;
}

#[derive(Clone, Debug)]
pub struct SearchClient {
    http: reqwest::Client,
    base_url: String,
    min_query_len: usize,
}

impl SearchClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = create_client(config).map_err(|err| SearchError::Http(err.to_string()))?;
        Ok(Self {
            http,
            base_url: config.endpoint("/search"),
            min_query_len: config.min_query_len,
        })
    }
}

#[async_trait]
impl SearchBackend for SearchClient {
    async fn search(&self, query: &str, access_token: Option<&str>) -> Result<SearchResponse> {
        let query = query.trim();
        if query.chars().count() < self.min_query_len {
            return Err(SearchError::InvalidQuery(query.to_string()));
        }

        debug!("POST {} query={query:?}", self.base_url);
        let mut request = self
            .http
            .post(&self.base_url)
            .json(&SearchRequest { query });
        if let Some(token) = access_token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let resp = request
            .send()
            .await
            .map_err(|err| SearchError::SearchFailed(err.to_string()))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SearchError::SearchFailed(format!("{status} - {body}")));
        }
        resp.json()
            .await
            .map_err(|err| SearchError::SearchFailed(err.to_string()))
    }
}
