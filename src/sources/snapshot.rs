use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use super::{JsonAdapter, SourceError, StateSource};
use crate::value::ConfigValue;

#[derive(Debug, Deserialize)]
struct SnapshotFile {
    resources: BTreeMap<String, serde_json::Value>,
}

/// Observed state captured to a file as `{"resources": {"<id>": {...}}}`.
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    resources: BTreeMap<String, ConfigValue>,
}

impl SnapshotSource {
    pub fn load(path: impl AsRef<Path>, adapter: &JsonAdapter) -> Result<Self, SourceError> {
        let path = path.as_ref();
        let location = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|source| SourceError::Read {
            location: location.clone(),
            source,
        })?;
        Self::from_str(&location, &content, adapter)
    }

    pub fn from_str(
        location: &str,
        content: &str,
        adapter: &JsonAdapter,
    ) -> Result<Self, SourceError> {
        let file: SnapshotFile =
            serde_json::from_str(content).map_err(|e| SourceError::Parse {
                location: location.to_string(),
                message: e.to_string(),
            })?;

        let resources = file
            .resources
            .iter()
            .map(|(id, attrs)| (id.clone(), adapter.convert(attrs)))
            .collect::<BTreeMap<_, _>>();

        tracing::debug!(location, count = resources.len(), "loaded snapshot");

        Ok(Self { resources })
    }
}

#[async_trait]
impl StateSource for SnapshotSource {
    fn name(&self) -> &str {
        "snapshot"
    }

    async fn list_resources(&self) -> Result<Vec<String>, SourceError> {
        Ok(self.resources.keys().cloned().collect())
    }

    async fn fetch(&self, resource_id: &str) -> Result<Option<ConfigValue>, SourceError> {
        Ok(self.resources.get(resource_id).cloned())
    }
}
