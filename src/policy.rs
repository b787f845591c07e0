use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::path::{Path, PathPattern, Segment};

/// How elements of an unordered collection are identified across both sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKey {
    /// A field of each record element, e.g. a security group's `id`.
    Field(String),
    /// The scalar element itself, for sets of plain strings or numbers.
    Value,
}

impl IdentityKey {
    /// Parses the CLI form: `@value` or a field name.
    pub fn parse(spec: &str) -> Self {
        match spec {
            "@value" => IdentityKey::Value,
            field => IdentityKey::Field(field.to_string()),
        }
    }
}

/// On-disk form of [`ComparisonPolicy`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
struct PolicyFile {
    ignored_paths: Vec<String>,
    collection_identity_keys: BTreeMap<String, IdentityKey>,
    field_aliases: BTreeMap<String, String>,
    null_is_absent: bool,
}

impl Default for PolicyFile {
    fn default() -> Self {
        Self {
            ignored_paths: Vec::new(),
            collection_identity_keys: BTreeMap::new(),
            field_aliases: BTreeMap::new(),
            null_is_absent: true,
        }
    }
}

/// Options controlling what the diff engine compares and how.
///
/// Ignore patterns are parsed as they are added, so a policy built by serde
/// or by the builder always matches what it lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "PolicyFile", into = "PolicyFile")]
pub struct ComparisonPolicy {
    ignored_paths: Vec<String>,
    pub collection_identity_keys: BTreeMap<String, IdentityKey>,
    /// Alias field name to canonical field name, applied to both sides.
    pub field_aliases: BTreeMap<String, String>,
    pub null_is_absent: bool,
    patterns: Vec<PathPattern>,
}

impl Default for ComparisonPolicy {
    fn default() -> Self {
        PolicyFile::default().into()
    }
}

impl From<PolicyFile> for ComparisonPolicy {
    fn from(file: PolicyFile) -> Self {
        let mut policy = Self {
            ignored_paths: Vec::new(),
            collection_identity_keys: file.collection_identity_keys,
            field_aliases: file.field_aliases,
            null_is_absent: file.null_is_absent,
            patterns: Vec::new(),
        };
        for pattern in file.ignored_paths {
            policy.push_ignored(pattern);
        }
        policy
    }
}

impl From<ComparisonPolicy> for PolicyFile {
    fn from(policy: ComparisonPolicy) -> Self {
        Self {
            ignored_paths: policy.ignored_paths,
            collection_identity_keys: policy.collection_identity_keys,
            field_aliases: policy.field_aliases,
            null_is_absent: policy.null_is_absent,
        }
    }
}

impl ComparisonPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignore(mut self, pattern: impl Into<String>) -> Self {
        self.push_ignored(pattern.into());
        self
    }

    pub fn identity(mut self, collection: impl Into<String>, key: IdentityKey) -> Self {
        self.collection_identity_keys.insert(collection.into(), key);
        self
    }

    pub fn alias(mut self, alias: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.field_aliases.insert(alias.into(), canonical.into());
        self
    }

    pub fn null_is_absent(mut self, yes: bool) -> Self {
        self.null_is_absent = yes;
        self
    }

    pub fn ignored_paths(&self) -> &[String] {
        &self.ignored_paths
    }

    /// Merges `other` on top of `self`; `other` wins on conflicting keys.
    /// Null handling stays with `self`.
    pub fn merge(mut self, other: ComparisonPolicy) -> Self {
        for pattern in other.ignored_paths {
            self.push_ignored(pattern);
        }
        self.collection_identity_keys
            .extend(other.collection_identity_keys);
        self.field_aliases.extend(other.field_aliases);
        self
    }

    fn push_ignored(&mut self, pattern: String) {
        if self.ignored_paths.contains(&pattern) {
            return;
        }
        self.patterns.push(PathPattern::parse(&pattern));
        self.ignored_paths.push(pattern);
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }

    /// Identity key for a collection sitting directly under a named field.
    pub fn identity_for(&self, path: &Path) -> Option<&IdentityKey> {
        match path.segments().last() {
            Some(Segment::Field(name)) => self.collection_identity_keys.get(name),
            _ => None,
        }
    }

    pub fn canonical_field<'a>(&'a self, name: &'a str) -> &'a str {
        self.field_aliases
            .get(name)
            .map(String::as_str)
            .unwrap_or(name)
    }
}
