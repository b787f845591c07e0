use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::sources::{JsonAdapter, SourceError, StateSource};
use crate::value::ConfigValue;

/// The only tfstate format version understood.
pub const SUPPORTED_VERSION: u64 = 4;

const STATE_FILE: &str = "terraform.tfstate";
const WORKSPACE_DIR: &str = "terraform.tfstate.d";

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read state file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse state file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unsupported state format version {0} (expected 4)")]
    UnsupportedVersion(u64),

    #[error("no terraform state file found in {0}")]
    NotFound(PathBuf),
}

#[derive(Debug, Deserialize)]
pub struct StateFile {
    pub version: u64,
    #[serde(default)]
    pub terraform_version: Option<String>,
    #[serde(default)]
    pub serial: u64,
    #[serde(default)]
    pub lineage: Option<String>,
    #[serde(default)]
    pub resources: Vec<StateResource>,
}

#[derive(Debug, Deserialize)]
pub struct StateResource {
    #[serde(default)]
    pub module: Option<String>,
    pub mode: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub name: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub instances: Vec<StateInstance>,
}

#[derive(Debug, Deserialize)]
pub struct StateInstance {
    #[serde(default)]
    pub schema_version: u64,
    #[serde(default)]
    pub index_key: Option<serde_json::Value>,
    #[serde(default)]
    pub attributes: serde_json::Value,
}

impl StateResource {
    /// Address as terraform prints it, e.g. `module.web.aws_instance.app["a"]`.
    pub fn address(&self, index_key: Option<&serde_json::Value>) -> String {
        let mut address = match &self.module {
            Some(module) => format!("{}.{}.{}", module, self.type_, self.name),
            None => format!("{}.{}", self.type_, self.name),
        };
        match index_key {
            Some(serde_json::Value::Number(n)) => address.push_str(&format!("[{}]", n)),
            Some(serde_json::Value::String(s)) => address.push_str(&format!("[{:?}]", s)),
            _ => {}
        }
        address
    }
}

/// One managed resource instance found in a state file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateEntry {
    pub address: String,
    pub resource_type: String,
    pub id: String,
}

/// Declared state read from a tfstate v4 file.
#[derive(Debug, Clone)]
pub struct TerraformStateSource {
    path: PathBuf,
    entries: Vec<StateEntry>,
    resources: BTreeMap<String, ConfigValue>,
}

impl TerraformStateSource {
    /// Opens a state file, or resolves one inside a directory.
    pub fn open(
        path: impl AsRef<Path>,
        adapter: &JsonAdapter,
        resource_type: Option<&str>,
    ) -> Result<Self, StateError> {
        let path = path.as_ref();
        if path.is_dir() {
            Self::from_dir(path, adapter, resource_type)
        } else {
            Self::from_file(path, adapter, resource_type)
        }
    }

    /// Uses `terraform.tfstate` in `dir`, falling back to the most recently
    /// modified file under `terraform.tfstate.d/`.
    pub fn from_dir(
        dir: impl AsRef<Path>,
        adapter: &JsonAdapter,
        resource_type: Option<&str>,
    ) -> Result<Self, StateError> {
        let dir = dir.as_ref();
        let state_path = dir.join(STATE_FILE);
        if state_path.is_file() {
            return Self::from_file(&state_path, adapter, resource_type);
        }

        let newest = newest_file(&dir.join(WORKSPACE_DIR))
            .ok_or_else(|| StateError::NotFound(dir.to_path_buf()))?;
        Self::from_file(&newest, adapter, resource_type)
    }

    pub fn from_file(
        path: impl AsRef<Path>,
        adapter: &JsonAdapter,
        resource_type: Option<&str>,
    ) -> Result<Self, StateError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| StateError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut source = Self::from_str(&content, adapter, resource_type)?;
        source.path = path.to_path_buf();
        Ok(source)
    }

    pub fn from_str(
        content: &str,
        adapter: &JsonAdapter,
        resource_type: Option<&str>,
    ) -> Result<Self, StateError> {
        let state: StateFile = serde_json::from_str(content)?;
        if state.version != SUPPORTED_VERSION {
            return Err(StateError::UnsupportedVersion(state.version));
        }

        let mut entries = Vec::new();
        let mut resources = BTreeMap::new();

        let managed = state
            .resources
            .iter()
            .filter(|r| r.mode == "managed")
            .filter(|r| resource_type.is_none_or(|t| r.type_ == t));

        for resource in managed {
            for instance in &resource.instances {
                let address = resource.address(instance.index_key.as_ref());
                let Some(id) = instance.attributes.get("id").and_then(|v| v.as_str()) else {
                    tracing::warn!(address = %address, "skipping instance without id");
                    continue;
                };

                if resources.contains_key(id) {
                    tracing::warn!(
                        address = %address,
                        resource_id = id,
                        "duplicate resource id in state"
                    );
                    continue;
                }

                resources.insert(id.to_string(), adapter.convert(&instance.attributes));
                entries.push(StateEntry {
                    address,
                    resource_type: resource.type_.clone(),
                    id: id.to_string(),
                });
            }
        }

        tracing::debug!(
            count = entries.len(),
            serial = state.serial,
            terraform_version = state.terraform_version.as_deref().unwrap_or("unknown"),
            "parsed terraform state"
        );

        Ok(Self {
            path: PathBuf::new(),
            entries,
            resources,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `(address, id)` of every managed instance, in state-file order.
    pub fn list(&self) -> &[StateEntry] {
        &self.entries
    }
}

fn newest_file(dir: &Path) -> Option<PathBuf> {
    std::fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let meta = entry.metadata().ok()?;
            if !meta.is_file() {
                return None;
            }
            Some((meta.modified().ok()?, entry.path()))
        })
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, path)| path)
}

#[async_trait]
impl StateSource for TerraformStateSource {
    fn name(&self) -> &str {
        "terraform"
    }

    async fn list_resources(&self) -> Result<Vec<String>, SourceError> {
        Ok(self.entries.iter().map(|e| e.id.clone()).collect())
    }

    async fn fetch(&self, resource_id: &str) -> Result<Option<ConfigValue>, SourceError> {
        Ok(self.resources.get(resource_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATE: &str = r#"{
        "version": 4,
        "terraform_version": "1.6.0",
        "serial": 12,
        "lineage": "3f2a",
        "resources": [
            {
                "mode": "managed",
                "type": "aws_instance",
                "name": "web",
                "provider": "provider[\"registry.terraform.io/hashicorp/aws\"]",
                "instances": [
                    {"schema_version": 1, "attributes": {"id": "i-123", "instance_type": "t2.micro", "tags": {"Name": "web"}}}
                ]
            },
            {
                "mode": "data",
                "type": "aws_ami",
                "name": "ubuntu",
                "instances": [{"attributes": {"id": "ami-1"}}]
            },
            {
                "module": "module.db",
                "mode": "managed",
                "type": "aws_security_group",
                "name": "db",
                "instances": [
                    {"index_key": 0, "attributes": {"id": "sg-1"}},
                    {"index_key": 1, "attributes": {"name": "no-id"}}
                ]
            }
        ]
    }"#;

    #[test]
    fn test_parse_managed_resources_only() {
        let source = TerraformStateSource::from_str(STATE, &JsonAdapter::default(), None).unwrap();
        let ids: Vec<&str> = source.list().iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["i-123", "sg-1"]);
    }

    #[test]
    fn test_addresses() {
        let source = TerraformStateSource::from_str(STATE, &JsonAdapter::default(), None).unwrap();
        let addresses: Vec<&str> = source.list().iter().map(|e| e.address.as_str()).collect();
        assert_eq!(
            addresses,
            vec!["aws_instance.web", "module.db.aws_security_group.db[0]"]
        );
    }

    #[test]
    fn test_resource_type_filter() {
        let source =
            TerraformStateSource::from_str(STATE, &JsonAdapter::default(), Some("aws_instance"))
                .unwrap();
        assert_eq!(source.list().len(), 1);
        assert_eq!(source.list()[0].resource_type, "aws_instance");
    }

    #[test]
    fn test_unsupported_version() {
        let result = TerraformStateSource::from_str(
            r#"{"version": 3, "resources": []}"#,
            &JsonAdapter::default(),
            None,
        );
        assert!(matches!(result, Err(StateError::UnsupportedVersion(3))));
    }

    #[test]
    fn test_invalid_json() {
        let result = TerraformStateSource::from_str("not json", &JsonAdapter::default(), None);
        assert!(matches!(result, Err(StateError::Parse(_))));
    }

    #[tokio::test]
    async fn test_fetch_converts_attributes() {
        let source = TerraformStateSource::from_str(STATE, &JsonAdapter::default(), None).unwrap();
        let value = source.fetch("i-123").await.unwrap().unwrap();
        assert_eq!(
            value.field("instance_type"),
            Some(&ConfigValue::string("t2.micro"))
        );
        assert!(matches!(value.field("tags"), Some(ConfigValue::Keyed(_))));
        assert!(source.fetch("ami-1").await.unwrap().is_none());
    }

    #[test]
    fn test_from_dir_prefers_state_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(STATE_FILE), STATE).unwrap();

        let source = TerraformStateSource::from_dir(dir.path(), &JsonAdapter::default(), None)
            .unwrap();
        assert_eq!(source.path(), dir.path().join(STATE_FILE));
    }

    #[test]
    fn test_from_dir_falls_back_to_workspace_dir() {
        let dir = tempfile::tempdir().unwrap();
        let workspaces = dir.path().join(WORKSPACE_DIR);
        std::fs::create_dir(&workspaces).unwrap();
        std::fs::write(workspaces.join("staging.tfstate"), STATE).unwrap();

        let source = TerraformStateSource::open(dir.path(), &JsonAdapter::default(), None).unwrap();
        assert_eq!(source.path(), workspaces.join("staging.tfstate"));
    }

    #[test]
    fn test_from_dir_without_state() {
        let dir = tempfile::tempdir().unwrap();
        let result = TerraformStateSource::from_dir(dir.path(), &JsonAdapter::default(), None);
        assert!(matches!(result, Err(StateError::NotFound(_))));
    }
}
