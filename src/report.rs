use std::fmt;

use serde::Serialize;

use crate::path::Path;
use crate::value::ConfigValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DriftKind {
    /// Present in observed state, absent from declared state.
    Added,
    /// Present in declared state, absent from observed state.
    Removed,
    /// Present on both sides with different values.
    Modified,
}

impl fmt::Display for DriftKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DriftKind::Added => "ADDED",
            DriftKind::Removed => "REMOVED",
            DriftKind::Modified => "MODIFIED",
        };
        f.write_str(s)
    }
}

/// A single discrepancy between observed and declared state.
///
/// Only constructible through [`Drift::added`], [`Drift::removed`] and
/// [`Drift::modified`], which fix which sides carry a value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Drift {
    kind: DriftKind,
    path: Path,
    #[serde(skip_serializing_if = "Option::is_none")]
    observed: Option<ConfigValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    declared: Option<ConfigValue>,
    description: String,
}

impl Drift {
    pub fn added(path: Path, observed: ConfigValue, description: impl Into<String>) -> Self {
        Self {
            kind: DriftKind::Added,
            path,
            observed: Some(observed),
            declared: None,
            description: description.into(),
        }
    }

    pub fn removed(path: Path, declared: ConfigValue, description: impl Into<String>) -> Self {
        Self {
            kind: DriftKind::Removed,
            path,
            observed: None,
            declared: Some(declared),
            description: description.into(),
        }
    }

    /// Callers must only pass unequal values.
    pub fn modified(
        path: Path,
        observed: ConfigValue,
        declared: ConfigValue,
        description: impl Into<String>,
    ) -> Self {
        debug_assert!(observed != declared, "modified drift at {path} with equal values");
        Self {
            kind: DriftKind::Modified,
            path,
            observed: Some(observed),
            declared: Some(declared),
            description: description.into(),
        }
    }

    pub fn kind(&self) -> DriftKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn observed(&self) -> Option<&ConfigValue> {
        self.observed.as_ref()
    }

    pub fn declared(&self) -> Option<&ConfigValue> {
        self.declared.as_ref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// All drifts found for one resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftReport {
    resource_id: String,
    has_drift: bool,
    drifts: Vec<Drift>,
}

impl DriftReport {
    pub(crate) fn new(resource_id: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            has_drift: false,
            drifts: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, drift: Drift) {
        self.drifts.push(drift);
        self.has_drift = !self.drifts.is_empty();
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn has_drift(&self) -> bool {
        self.has_drift
    }

    pub fn drifts(&self) -> &[Drift] {
        &self.drifts
    }

    pub fn count(&self, kind: DriftKind) -> usize {
        self.drifts.iter().filter(|d| d.kind == kind).count()
    }
}
