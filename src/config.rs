use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::batch::{BatchCoordinator, DEFAULT_MAX_IN_FLIGHT};
use crate::error::DriftError;
use crate::policy::{ComparisonPolicy, IdentityKey};
use crate::sources::JsonAdapter;
use crate::sources::json::DEFAULT_KEYED_FIELDS;

/// Settings loaded from `config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub policy: ComparisonPolicy,
    /// Fields whose object values are compared as keyed maps.
    pub keyed_fields: Vec<String>,
    pub max_in_flight: usize,
    pub timeout_secs: Option<u64>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            policy: ComparisonPolicy::default(),
            keyed_fields: DEFAULT_KEYED_FIELDS.iter().map(|s| s.to_string()).collect(),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            timeout_secs: None,
        }
    }
}

impl DetectorConfig {
    /// `<config_dir>/driftscan/config.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("driftscan").join("config.json"))
    }

    /// Loads `path` when given. Otherwise the default location is used if a
    /// file exists there, and built-in defaults if not.
    pub fn load(path: Option<&Path>) -> Result<Self, DriftError> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path().filter(|p| p.is_file()) {
                Some(path) => Self::from_file(&path),
                None => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, DriftError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DriftError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_json(&content)
            .map_err(|e| DriftError::Config(format!("{}: {}", path.display(), e)))?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self, DriftError> {
        let config: DetectorConfig =
            serde_json::from_str(content).map_err(|e| DriftError::Config(e.to_string()))?;
        if config.max_in_flight == 0 {
            return Err(DriftError::Config(
                "max_in_flight must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }

    pub fn add_ignored(&mut self, patterns: &[String]) {
        let extra = patterns
            .iter()
            .fold(ComparisonPolicy::new(), |policy, p| policy.ignore(p.as_str()));
        self.policy = std::mem::take(&mut self.policy).merge(extra);
    }

    pub fn add_identities(&mut self, identities: &[(String, IdentityKey)]) {
        let extra = identities
            .iter()
            .fold(ComparisonPolicy::new(), |policy, (field, key)| {
                policy.identity(field.as_str(), key.clone())
            });
        self.policy = std::mem::take(&mut self.policy).merge(extra);
    }

    pub fn adapter(&self) -> JsonAdapter {
        JsonAdapter::new(self.keyed_fields.iter().cloned())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn coordinator(&self) -> BatchCoordinator {
        let coordinator =
            BatchCoordinator::new(self.policy.clone()).with_max_in_flight(self.max_in_flight);
        match self.timeout() {
            Some(timeout) => coordinator.with_timeout(timeout),
            None => coordinator,
        }
    }
}

/// Parses `--identity field=key`; `field=@value` identifies by element value.
pub fn parse_identity(spec: &str) -> Result<(String, IdentityKey), String> {
    let (field, key) = spec
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=KEY, got '{}'", spec))?;
    if field.is_empty() || key.is_empty() {
        return Err(format!("expected FIELD=KEY, got '{}'", spec));
    }
    Ok((field.to_string(), IdentityKey::parse(key)))
}
