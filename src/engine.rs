//! Structural comparison of two configuration trees.
//!
//! The walk is depth-first and pre-order on [`Path`]: record fields in
//! declared schema order (observed-only fields after), lists by index, keyed
//! collections by sorted key. Absence is reported at the highest point it
//! occurs and nothing beneath it is visited.

use crate::matcher::{self, Matched, MatchedEntry};
use crate::path::Path;
use crate::policy::ComparisonPolicy;
use crate::report::{Drift, DriftReport};
use crate::value::ConfigValue;

/// Nesting limit for a single comparison. Real resource schemas stay far
/// below this; hitting it means an adapter produced a runaway structure.
pub const MAX_DEPTH: usize = 128;

/// Compares observed against declared state and returns every drift in
/// traversal order.
///
/// # Panics
///
/// Panics if either tree nests deeper than [`MAX_DEPTH`].
pub fn compare(
    observed: &ConfigValue,
    declared: &ConfigValue,
    policy: &ComparisonPolicy,
) -> Vec<Drift> {
    compare_optional(Some(observed), Some(declared), policy)
}

/// Like [`compare`], with either side possibly missing altogether.
pub fn compare_optional(
    observed: Option<&ConfigValue>,
    declared: Option<&ConfigValue>,
    policy: &ComparisonPolicy,
) -> Vec<Drift> {
    let mut walker = Walker {
        policy,
        drifts: Vec::new(),
    };
    walker.walk(&Path::root(), observed, declared, 0);
    walker.drifts
}

/// Compares one resource and wraps the result in a report.
pub fn detect_one(
    resource_id: &str,
    observed: Option<&ConfigValue>,
    declared: Option<&ConfigValue>,
    policy: &ComparisonPolicy,
) -> DriftReport {
    let mut report = DriftReport::new(resource_id);
    for drift in compare_optional(observed, declared, policy) {
        report.push(drift);
    }
    tracing::debug!(
        resource_id,
        drifts = report.drifts().len(),
        "comparison complete"
    );
    report
}

struct Walker<'p> {
    policy: &'p ComparisonPolicy,
    drifts: Vec<Drift>,
}

impl Walker<'_> {
    fn present<'v>(&self, value: Option<&'v ConfigValue>) -> Option<&'v ConfigValue> {
        value.filter(|v| !(self.policy.null_is_absent && v.is_null()))
    }

    fn walk(
        &mut self,
        path: &Path,
        observed: Option<&ConfigValue>,
        declared: Option<&ConfigValue>,
        depth: usize,
    ) {
        assert!(
            depth <= MAX_DEPTH,
            "configuration nests deeper than {MAX_DEPTH} levels at {path}"
        );

        let (observed, declared) = match (self.present(observed), self.present(declared)) {
            (None, None) => return,
            (Some(o), None) => {
                self.drifts.push(Drift::added(
                    path.clone(),
                    o.clone(),
                    format!(
                        "{} is present in observed state but missing from declared state",
                        location(path)
                    ),
                ));
                return;
            }
            (None, Some(d)) => {
                self.drifts.push(Drift::removed(
                    path.clone(),
                    d.clone(),
                    format!(
                        "{} is present in declared state but missing from observed state",
                        location(path)
                    ),
                ));
                return;
            }
            (Some(o), Some(d)) => (o, d),
        };

        let policy = self.policy;
        match (observed, declared) {
            (ConfigValue::Scalar(o), ConfigValue::Scalar(d)) => {
                if o != d {
                    self.drifts.push(Drift::modified(
                        path.clone(),
                        observed.clone(),
                        declared.clone(),
                        format!("{} differs: observed {o}, declared {d}", location(path)),
                    ));
                }
            }
            (ConfigValue::Record(o), ConfigValue::Record(d)) => {
                self.walk_record(path, o, d, depth);
            }
            (ConfigValue::List(o), ConfigValue::List(d)) => match policy.identity_for(path) {
                Some(identity) => {
                    let matched = matcher::match_lists(o, d, identity);
                    self.walk_matched(path, matched, depth);
                }
                None => self.walk_list(path, o, d, depth),
            },
            (ConfigValue::Keyed(o), ConfigValue::Keyed(d)) => {
                self.walk_matched(path, matcher::match_maps(o, d), depth);
            }
            _ => {
                self.drifts.push(Drift::modified(
                    path.clone(),
                    observed.clone(),
                    declared.clone(),
                    format!(
                        "shape mismatch at {}: observed {}, declared {}",
                        location(path),
                        observed.shape(),
                        declared.shape()
                    ),
                ));
            }
        }
    }

    fn walk_record(
        &mut self,
        path: &Path,
        observed: &[(String, ConfigValue)],
        declared: &[(String, ConfigValue)],
        depth: usize,
    ) {
        let policy = self.policy;
        let observed = canonical_fields(policy, observed);
        let declared = canonical_fields(policy, declared);

        let mut names: Vec<&str> = declared.iter().map(|(k, _)| *k).collect();
        names.extend(
            observed
                .iter()
                .map(|(k, _)| *k)
                .filter(|k| lookup(&declared, k).is_none()),
        );

        for name in names {
            let child = path.field(name);
            if self.policy.is_ignored(&child) {
                continue;
            }
            self.walk(
                &child,
                lookup(&observed, name),
                lookup(&declared, name),
                depth + 1,
            );
        }
    }

    fn walk_list(
        &mut self,
        path: &Path,
        observed: &[ConfigValue],
        declared: &[ConfigValue],
        depth: usize,
    ) {
        for i in 0..observed.len().max(declared.len()) {
            let child = path.index(i);
            if self.policy.is_ignored(&child) {
                continue;
            }
            self.walk(&child, observed.get(i), declared.get(i), depth + 1);
        }
    }

    fn walk_matched(&mut self, path: &Path, matched: Matched<'_>, depth: usize) {
        for (key, entry) in matched.into_sorted() {
            let child = key.child_of(path);
            if self.policy.is_ignored(&child) {
                continue;
            }
            let (observed, declared) = match entry {
                MatchedEntry::Both(o, d) => (Some(o), Some(d)),
                MatchedEntry::ObservedOnly(o) => (Some(o), None),
                MatchedEntry::DeclaredOnly(d) => (None, Some(d)),
            };
            self.walk(&child, observed, declared, depth + 1);
        }
    }
}

/// Applies field aliases; when two fields land on the same canonical name
/// the first one wins.
fn canonical_fields<'a>(
    policy: &'a ComparisonPolicy,
    fields: &'a [(String, ConfigValue)],
) -> Vec<(&'a str, &'a ConfigValue)> {
    let mut out: Vec<(&str, &ConfigValue)> = Vec::with_capacity(fields.len());
    for (name, value) in fields {
        let name = policy.canonical_field(name);
        if !out.iter().any(|(n, _)| *n == name) {
            out.push((name, value));
        }
    }
    out
}

fn lookup<'a>(fields: &[(&str, &'a ConfigValue)], name: &str) -> Option<&'a ConfigValue> {
    fields.iter().find(|(k, _)| *k == name).map(|(_, v)| *v)
}

fn location(path: &Path) -> String {
    if path.is_root() {
        "resource".to_string()
    } else {
        format!("`{path}`")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::IdentityKey;
    use crate::report::DriftKind;

    fn sg(id: &str, name: &str) -> ConfigValue {
        ConfigValue::record([
            ("id", ConfigValue::string(id)),
            ("name", ConfigValue::string(name)),
        ])
    }

    fn sg_policy() -> ComparisonPolicy {
        ComparisonPolicy::new().identity("security_groups", IdentityKey::Field("id".to_string()))
    }

    fn paths(drifts: &[Drift]) -> Vec<String> {
        drifts.iter().map(|d| d.path().to_string()).collect()
    }

    #[test]
    fn test_both_absent_is_no_drift() {
        let drifts = compare_optional(None, None, &ComparisonPolicy::default());
        assert!(drifts.is_empty());

        let null = ConfigValue::null();
        let drifts = compare(&null, &null, &ComparisonPolicy::default());
        assert!(drifts.is_empty());
    }

    #[test]
    fn test_absence_reported_at_highest_point() {
        let observed = ConfigValue::record([(
            "metadata_options",
            ConfigValue::record([
                ("http_tokens", ConfigValue::string("required")),
                ("http_endpoint", ConfigValue::string("enabled")),
            ]),
        )]);
        let declared = ConfigValue::record(Vec::<(String, ConfigValue)>::new());

        let drifts = compare(&observed, &declared, &ComparisonPolicy::default());

        assert_eq!(drifts.len(), 1);
        assert_eq!(drifts[0].kind(), DriftKind::Added);
        assert_eq!(drifts[0].path().to_string(), "metadata_options");
        assert_eq!(drifts[0].observed(), observed.field("metadata_options"));
    }

    #[test]
    fn test_explicit_null_equals_missing_by_default() {
        let observed = ConfigValue::record([("key_name", ConfigValue::null())]);
        let declared = ConfigValue::record(Vec::<(String, ConfigValue)>::new());
        assert!(compare(&observed, &declared, &ComparisonPolicy::default()).is_empty());
    }

    #[test]
    fn test_strict_nulls_report_null_vs_missing() {
        let policy = ComparisonPolicy::new().null_is_absent(false);
        let observed = ConfigValue::record([("key_name", ConfigValue::null())]);
        let declared = ConfigValue::record(Vec::<(String, ConfigValue)>::new());

        let drifts = compare(&observed, &declared, &policy);
        assert_eq!(drifts.len(), 1);
        assert_eq!(drifts[0].kind(), DriftKind::Added);
        assert_eq!(drifts[0].observed(), Some(&ConfigValue::null()));

        let declared = ConfigValue::record([("key_name", ConfigValue::string("deployer"))]);
        let drifts = compare(&observed, &declared, &policy);
        assert_eq!(drifts.len(), 1);
        assert_eq!(drifts[0].kind(), DriftKind::Modified);
    }

    #[test]
    fn test_shape_mismatch_stops_recursion() {
        let observed = ConfigValue::record([("tags", ConfigValue::string("Name=x"))]);
        let declared = ConfigValue::record([(
            "tags",
            ConfigValue::keyed([("Name", ConfigValue::string("x"))]),
        )]);

        let drifts = compare(&observed, &declared, &ComparisonPolicy::default());

        assert_eq!(drifts.len(), 1);
        assert_eq!(drifts[0].kind(), DriftKind::Modified);
        assert_eq!(drifts[0].path().to_string(), "tags");
        assert!(drifts[0].description().contains("shape mismatch"));
        assert_eq!(drifts[0].declared(), declared.field("tags"));
    }

    #[test]
    fn test_numeric_normalization() {
        let observed = ConfigValue::record([("root_volume_size", ConfigValue::int(8))]);
        let declared = ConfigValue::record([("root_volume_size", ConfigValue::float(8.0))]);
        assert!(compare(&observed, &declared, &ComparisonPolicy::default()).is_empty());
    }

    #[test]
    fn test_list_length_mismatch_is_per_index() {
        let observed = ConfigValue::record([(
            "ipv6_addresses",
            ConfigValue::List(vec![ConfigValue::string("a"), ConfigValue::string("b")]),
        )]);
        let declared = ConfigValue::record([(
            "ipv6_addresses",
            ConfigValue::List(vec![
                ConfigValue::string("a"),
                ConfigValue::string("x"),
                ConfigValue::string("c"),
            ]),
        )]);

        let drifts = compare(&observed, &declared, &ComparisonPolicy::default());

        assert_eq!(paths(&drifts), vec!["ipv6_addresses[1]", "ipv6_addresses[2]"]);
        assert_eq!(drifts[0].kind(), DriftKind::Modified);
        assert_eq!(drifts[1].kind(), DriftKind::Removed);
        assert_eq!(drifts[1].declared(), Some(&ConfigValue::string("c")));
    }

    #[test]
    fn test_list_without_identity_is_positional() {
        let observed = ConfigValue::record([(
            "security_groups",
            ConfigValue::List(vec![sg("sg-2", "b"), sg("sg-1", "a")]),
        )]);
        let declared = ConfigValue::record([(
            "security_groups",
            ConfigValue::List(vec![sg("sg-1", "a"), sg("sg-2", "b")]),
        )]);

        let drifts = compare(&observed, &declared, &ComparisonPolicy::default());
        assert_eq!(drifts.len(), 4);

        assert!(compare(&observed, &declared, &sg_policy()).is_empty());
    }

    #[test]
    fn test_record_field_order_declared_first() {
        let observed = ConfigValue::record([
            ("zeta", ConfigValue::int(1)),
            ("alpha", ConfigValue::int(1)),
        ]);
        let declared = ConfigValue::record([
            ("beta", ConfigValue::int(2)),
            ("alpha", ConfigValue::int(2)),
        ]);

        let drifts = compare(&observed, &declared, &ComparisonPolicy::default());
        assert_eq!(paths(&drifts), vec!["beta", "alpha", "zeta"]);
    }

    #[test]
    fn test_ignored_paths_are_skipped() {
        let policy = ComparisonPolicy::new()
            .ignore("arn")
            .ignore("tags[aws:cloudformation:stack-id]");
        let observed = ConfigValue::record([
            ("arn", ConfigValue::string("arn:aws:ec2:1")),
            (
                "tags",
                ConfigValue::keyed([("aws:cloudformation:stack-id", ConfigValue::string("s"))]),
            ),
        ]);
        let declared = ConfigValue::record([(
            "tags",
            ConfigValue::keyed(Vec::<(String, ConfigValue)>::new()),
        )]);

        assert!(compare(&observed, &declared, &policy).is_empty());
    }

    #[test]
    fn test_field_aliases_join_case_variants() {
        let observed = ConfigValue::record([("InstanceType", ConfigValue::string("t3.micro"))]);
        let declared = ConfigValue::record([("instance_type", ConfigValue::string("t3.micro"))]);

        let drifts = compare(&observed, &declared, &ComparisonPolicy::default());
        assert_eq!(drifts.len(), 2);
        assert_eq!(drifts[0].kind(), DriftKind::Removed);
        assert_eq!(drifts[1].kind(), DriftKind::Added);

        let policy = ComparisonPolicy::new().alias("InstanceType", "instance_type");
        assert!(compare(&observed, &declared, &policy).is_empty());
    }

    #[test]
    fn test_value_identity_set_of_strings() {
        let policy = ComparisonPolicy::new().identity("vpc_security_group_ids", IdentityKey::Value);
        let observed = ConfigValue::record([(
            "vpc_security_group_ids",
            ConfigValue::List(vec![ConfigValue::string("sg-2"), ConfigValue::string("sg-1")]),
        )]);
        let declared = ConfigValue::record([(
            "vpc_security_group_ids",
            ConfigValue::List(vec![ConfigValue::string("sg-1"), ConfigValue::string("sg-3")]),
        )]);

        let drifts = compare(&observed, &declared, &policy);
        assert_eq!(
            paths(&drifts),
            vec!["vpc_security_group_ids[sg-2]", "vpc_security_group_ids[sg-3]"]
        );
        assert_eq!(drifts[0].kind(), DriftKind::Added);
        assert_eq!(drifts[1].kind(), DriftKind::Removed);
    }

    #[test]
    fn test_records_without_identity_are_reported() {
        let observed = ConfigValue::record([(
            "security_groups",
            ConfigValue::List(vec![ConfigValue::record([("name", ConfigValue::string("orphan"))])]),
        )]);
        let declared = ConfigValue::record([("security_groups", ConfigValue::List(vec![]))]);

        let drifts = compare(&observed, &declared, &sg_policy());
        assert_eq!(paths(&drifts), vec!["security_groups[#0]"]);
        assert_eq!(drifts[0].kind(), DriftKind::Added);
    }

    #[test]
    fn test_unidentified_entry_path_differs_from_identity_key() {
        let observed = ConfigValue::record([(
            "security_groups",
            ConfigValue::List(vec![
                ConfigValue::record([("name", ConfigValue::string("anon"))]),
                ConfigValue::record([("id", ConfigValue::string("0"))]),
            ]),
        )]);
        let declared = ConfigValue::record([("security_groups", ConfigValue::List(vec![]))]);

        let drifts = compare(&observed, &declared, &sg_policy());
        assert_eq!(paths(&drifts), vec!["security_groups[0]", "security_groups[#0]"]);
        assert!(drifts.iter().all(|d| d.kind() == DriftKind::Added));
    }

    #[test]
    fn test_identity_types_are_not_coerced() {
        let policy = ComparisonPolicy::new().identity("ports", IdentityKey::Value);
        let ports =
            |port: ConfigValue| ConfigValue::record([("ports", ConfigValue::List(vec![port]))]);
        let observed = ports(ConfigValue::int(443));
        let declared = ports(ConfigValue::string("443"));

        let drifts = compare(&observed, &declared, &policy);
        assert_eq!(drifts.len(), 2);
        assert_eq!(drifts[0].kind(), DriftKind::Added);
        assert_eq!(drifts[0].observed(), Some(&ConfigValue::int(443)));
        assert_eq!(drifts[1].kind(), DriftKind::Removed);
        assert_eq!(drifts[1].declared(), Some(&ConfigValue::string("443")));
    }

    #[test]
    fn test_root_absence_describes_resource() {
        let observed = ConfigValue::record([("ami", ConfigValue::string("ami-1"))]);
        let drifts = compare_optional(Some(&observed), None, &ComparisonPolicy::default());
        assert_eq!(drifts.len(), 1);
        assert!(drifts[0].path().is_root());
        assert!(drifts[0].description().starts_with("resource is present"));
    }

    #[test]
    fn test_detect_one_wraps_report() {
        let observed = ConfigValue::record([("instance_type", ConfigValue::string("t2.micro"))]);
        let declared = ConfigValue::record([("instance_type", ConfigValue::string("t2.medium"))]);

        let policy = ComparisonPolicy::default();
        let report = detect_one("i-1", Some(&observed), Some(&declared), &policy);
        assert_eq!(report.resource_id(), "i-1");
        assert!(report.has_drift());

        let report = detect_one("i-1", Some(&observed), Some(&observed), &policy);
        assert!(!report.has_drift());
    }

    #[test]
    #[should_panic(expected = "nests deeper")]
    fn test_runaway_nesting_panics() {
        let mut observed = ConfigValue::int(1);
        let mut declared = ConfigValue::int(2);
        for _ in 0..=MAX_DEPTH + 1 {
            observed = ConfigValue::List(vec![observed]);
            declared = ConfigValue::List(vec![declared]);
        }
        compare(&observed, &declared, &ComparisonPolicy::default());
    }

    #[test]
    fn test_depth_at_limit_is_accepted() {
        let mut observed = ConfigValue::int(1);
        let mut declared = ConfigValue::int(2);
        for _ in 0..MAX_DEPTH {
            observed = ConfigValue::List(vec![observed]);
            declared = ConfigValue::List(vec![declared]);
        }
        assert_eq!(compare(&observed, &declared, &ComparisonPolicy::default()).len(), 1);
    }
}
