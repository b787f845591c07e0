pub mod http;
pub mod json;
pub mod snapshot;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::terraform::StateError;
use crate::value::ConfigValue;

pub use http::{HttpError, HttpStateSource};
pub use json::JsonAdapter;
pub use snapshot::SnapshotSource;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {location}: {source}")]
    Read {
        location: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {location}: {message}")]
    Parse { location: String, message: String },
    #[error("{source_name} failed for {resource_id}: {message}")]
    Fetch {
        source_name: String,
        resource_id: String,
        message: String,
    },
    #[error("http source error: {0}")]
    Http(#[from] HttpError),
    #[error("terraform state error: {0}")]
    Terraform(#[from] StateError),
}

/// Produces canonical configuration values for resources, one side of a
/// comparison at a time.
#[async_trait]
pub trait StateSource: Send + Sync {
    fn name(&self) -> &str;

    /// Identifiers of every resource this source knows about.
    async fn list_resources(&self) -> Result<Vec<String>, SourceError>;

    /// `Ok(None)` means the resource does not exist on this side.
    async fn fetch(&self, resource_id: &str) -> Result<Option<ConfigValue>, SourceError>;
}

/// A source backed by values already in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    name: String,
    resources: BTreeMap<String, ConfigValue>,
}

impl MemorySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resources: BTreeMap::new(),
        }
    }

    pub fn with_resource(mut self, resource_id: impl Into<String>, value: ConfigValue) -> Self {
        self.resources.insert(resource_id.into(), value);
        self
    }
}

#[async_trait]
impl StateSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_resources(&self) -> Result<Vec<String>, SourceError> {
        Ok(self.resources.keys().cloned().collect())
    }

    async fn fetch(&self, resource_id: &str) -> Result<Option<ConfigValue>, SourceError> {
        Ok(self.resources.get(resource_id).cloned())
    }
}

/// Opens an observed-state source: `http(s)://` locations are served by
/// [`HttpStateSource`], anything else is read as a snapshot file.
pub fn open_source(
    location: &str,
    adapter: JsonAdapter,
    token: Option<String>,
) -> Result<Arc<dyn StateSource>, SourceError> {
    if location.starts_with("http://") || location.starts_with("https://") {
        let source = HttpStateSource::new(location, token, adapter)?;
        return Ok(Arc::new(source));
    }
    Ok(Arc::new(SnapshotSource::load(location, &adapter)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_source_fetch_and_list() {
        let source = MemorySource::new("observed")
            .with_resource("i-2", ConfigValue::int(2))
            .with_resource("i-1", ConfigValue::int(1));

        assert_eq!(source.name(), "observed");
        assert_eq!(source.list_resources().await.unwrap(), vec!["i-1", "i-2"]);
        assert_eq!(source.fetch("i-1").await.unwrap(), Some(ConfigValue::int(1)));
        assert_eq!(source.fetch("i-9").await.unwrap(), None);
    }

    #[test]
    fn test_open_source_http_location() {
        let source =
            open_source("https://state.example.com", JsonAdapter::default(), None).unwrap();
        assert_eq!(source.name(), "http");
    }

    #[test]
    fn test_open_source_missing_file() {
        let result = open_source("/nonexistent/observed.json", JsonAdapter::default(), None);
        assert!(matches!(result, Err(SourceError::Read { .. })));
    }

    #[test]
    fn test_fetch_error_display() {
        let err = SourceError::Fetch {
            source_name: "http".to_string(),
            resource_id: "i-1".to_string(),
            message: "connection refused".to_string(),
        };
        assert_eq!(err.to_string(), "http failed for i-1: connection refused");
    }
}
