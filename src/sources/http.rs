mod client;
mod error;
mod types;

pub use client::StateApiClient;
pub use error::HttpError;

use async_trait::async_trait;

use super::{JsonAdapter, SourceError, StateSource};
use crate::value::ConfigValue;

/// Environment variable holding the bearer token for [`HttpStateSource`].
pub const TOKEN_ENV: &str = "DRIFTSCAN_API_TOKEN";

/// Observed state served by an HTTP API.
#[derive(Debug, Clone)]
pub struct HttpStateSource {
    client: StateApiClient,
    adapter: JsonAdapter,
}

impl HttpStateSource {
    pub fn new(
        base_url: &str,
        token: Option<String>,
        adapter: JsonAdapter,
    ) -> Result<Self, HttpError> {
        let client = StateApiClient::new(base_url, token.as_deref())?;
        Ok(Self { client, adapter })
    }
}

#[async_trait]
impl StateSource for HttpStateSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn list_resources(&self) -> Result<Vec<String>, SourceError> {
        let ids = self.client.list_resources().await?;
        tracing::debug!(
            count = ids.len(),
            base = self.client.api_base(),
            "listed observed resources"
        );
        Ok(ids)
    }

    async fn fetch(&self, resource_id: &str) -> Result<Option<ConfigValue>, SourceError> {
        let body = self
            .client
            .fetch_resource(resource_id)
            .await
            .map_err(|e| SourceError::Fetch {
                source_name: self.name().to_string(),
                resource_id: resource_id.to_string(),
                message: e.to_string(),
            })?;

        Ok(body.map(|attrs| self.adapter.convert(&attrs)))
    }
}
