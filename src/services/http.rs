//! HTTP implementation of [`SearchBackend`].
//!
//! `GET {base}/{segment}/search?q=<query>` for lookups (404 means the
//! category has no search endpoint) and `GET {base}/{segment}` for the
//! bulk fallback.

use crate::config::{BackendConfig, Config};
use crate::error::{BackendError, BackendResult, Result};
use crate::services::{Dispatcher, SearchBackend};
use crate::types::{Category, Record};
use serde::Deserialize;

/// Response bodies seen in the wild: a bare array or an envelope.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Payload {
    List(Vec<Record>),
    Envelope {
        #[serde(alias = "results", alias = "items")]
        data: Vec<Record>,
    },
}

impl Payload {
    fn into_records(self) -> Vec<Record> {
        match self {
            Self::List(records) | Self::Envelope { data: records } => records,
        }
    }
}

/// Search backend over plain HTTP + JSON.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    config: BackendConfig,
}

impl HttpBackend {
    /// Builds a client with the configured per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Transport` if the HTTP client cannot be built.
    pub fn new(config: BackendConfig) -> BackendResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("typeahead/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }

    fn collection_url(&self, category: Category) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.segment(category)
        )
    }

    fn search_url(&self, category: Category) -> String {
        format!("{}/search", self.collection_url(category))
    }

    async fn decode(response: reqwest::Response, url: &str) -> BackendResult<Vec<Record>> {
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let payload: Payload = response.json().await?;
        Ok(payload.into_records())
    }
}

impl SearchBackend for HttpBackend {
    async fn lookup(&self, category: Category, query: &str) -> BackendResult<Vec<Record>> {
        let url = self.search_url(category);
        tracing::debug!(%category, query, "GET {url}");
        let response = self.client.get(&url).query(&[("q", query)]).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(BackendError::NotFound { category });
        }
        Self::decode(response, &url).await
    }

    async fn bulk_fetch(&self, category: Category) -> BackendResult<Vec<Record>> {
        let url = self.collection_url(category);
        tracing::debug!(%category, "GET {url} (bulk)");
        let response = self.client.get(&url).send().await?;
        Self::decode(response, &url).await
    }
}

impl Dispatcher<HttpBackend> {
    /// Builds a dispatcher over the configured HTTP backend.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the dispatcher settings are invalid, or
    /// `Error::Backend` if the HTTP client cannot be built.
    pub fn connect(config: &Config) -> Result<Self> {
        config.dispatcher.validate()?;
        let backend = HttpBackend::new(config.backend.clone())?;
        Ok(Self::new(backend, &config.dispatcher))
    }
}
