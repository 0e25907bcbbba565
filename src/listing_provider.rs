use std::time::Duration;

use async_trait::async_trait;
use ureq::Agent;

use crate::db::{DbPool, StoreError};
use crate::filters::FilterState;
use crate::listing_types::{CityCount, Listing, ListingPage};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("upstream request failed: {0}")]
    Upstream(String),
    #[error("upstream returned status {status}{detail}", status = .0, detail = status_detail(.1))]
    UpstreamStatus(u16, Option<String>),
}

fn status_detail(detail: &Option<String>) -> String {
    match detail {
        Some(message) => format!(": {}", message),
        None => String::new(),
    }
}

/// Source of search results. The cache talks to one of these and does
/// not care whether the data is local or served by another node.
#[async_trait]
pub trait ListingProvider: Send + Sync {
    fn provider_tag(&self) -> &'static str;

    async fn search(&self, filters: &FilterState) -> Result<ListingPage, ProviderError>;

    async fn cities(&self) -> Result<Vec<CityCount>, ProviderError>;
}

/// Serves queries straight from the local SQLite store.
pub struct StoreListingProvider {
    pool: DbPool,
}

impl StoreListingProvider {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ListingProvider for StoreListingProvider {
    fn provider_tag(&self) -> &'static str {
        "store"
    }

    async fn search(&self, filters: &FilterState) -> Result<ListingPage, ProviderError> {
        Ok(Listing::search(&self.pool, filters)?)
    }

    async fn cities(&self) -> Result<Vec<CityCount>, ProviderError> {
        Ok(Listing::cities(&self.pool)?)
    }
}

/// Proxies queries to another instance's REST API.
pub struct RemoteListingProvider {
    agent: Agent,
    base_url: String,
}

impl RemoteListingProvider {
    pub fn new(base_url: &str) -> Self {
        let config = Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(10)))
            .http_status_as_error(false)
            .build();
        Self {
            agent: config.new_agent(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn search_url(&self, filters: &FilterState) -> String {
        let query = filters.to_query_string();
        if query.is_empty() {
            format!("{}/api/properties", self.base_url)
        } else {
            format!("{}/api/properties?{}", self.base_url, query)
        }
    }
}

#[async_trait]
impl ListingProvider for RemoteListingProvider {
    fn provider_tag(&self) -> &'static str {
        "remote"
    }

    async fn search(&self, filters: &FilterState) -> Result<ListingPage, ProviderError> {
        let url = self.search_url(filters);
        let agent = self.agent.clone();
        // ureq blocks, so keep it off the async workers.
        tokio::task::spawn_blocking(move || fetch_json::<ListingPage>(&agent, &url))
            .await
            .map_err(|e| ProviderError::Upstream(e.to_string()))?
    }

    async fn cities(&self) -> Result<Vec<CityCount>, ProviderError> {
        let url = format!("{}/api/properties/cities", self.base_url);
        let agent = self.agent.clone();
        tokio::task::spawn_blocking(move || fetch_json::<Vec<CityCount>>(&agent, &url))
            .await
            .map_err(|e| ProviderError::Upstream(e.to_string()))?
    }
}

fn fetch_json<T: serde::de::DeserializeOwned>(agent: &Agent, url: &str) -> Result<T, ProviderError> {
    let mut response = agent
        .get(url)
        .call()
        .map_err(|e| ProviderError::Upstream(e.to_string()))?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        // Error replies carry their human-readable message in the body.
        let detail = response
            .body_mut()
            .read_json::<serde_json::Value>()
            .ok()
            .and_then(|body| body.get("error").and_then(|v| v.as_str()).map(String::from));
        return Err(ProviderError::UpstreamStatus(status, detail));
    }

    response
        .body_mut()
        .read_json()
        .map_err(|e| ProviderError::Upstream(e.to_string()))
}
