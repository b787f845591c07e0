use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::path::{Path, Segment};
use crate::policy::IdentityKey;
use crate::value::{self, ConfigValue, Scalar};

/// A typed collection identity.
///
/// Numbers are normalized so `2` and `2.0` name the same entry, but values of
/// different types never do: `443` and `"443"` are distinct identities.
#[derive(Debug, Clone)]
pub enum Identity {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Identity {
    pub fn from_scalar(scalar: &Scalar) -> Option<Self> {
        match scalar {
            Scalar::Null => None,
            Scalar::Bool(b) => Some(Identity::Bool(*b)),
            Scalar::Int(i) => Some(Identity::Int(*i)),
            Scalar::Float(f) => Some(match value::integral(*f) {
                Some(i) => Identity::Int(i),
                None => Identity::Float(*f),
            }),
            Scalar::String(s) => Some(Identity::Text(s.clone())),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Identity::Bool(_) => 0,
            Identity::Int(_) | Identity::Float(_) => 1,
            Identity::Text(_) => 2,
        }
    }
}

impl Ord for Identity {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Identity::Bool(a), Identity::Bool(b)) => a.cmp(b),
            (Identity::Int(a), Identity::Int(b)) => a.cmp(b),
            (Identity::Float(a), Identity::Float(b)) => a.total_cmp(b),
            (Identity::Int(a), Identity::Float(b)) => {
                (*a as f64).total_cmp(b).then(Ordering::Less)
            }
            (Identity::Float(a), Identity::Int(b)) => {
                a.total_cmp(&(*b as f64)).then(Ordering::Greater)
            }
            (Identity::Text(a), Identity::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Identity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Identity {}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Bool(b) => write!(f, "{b}"),
            Identity::Int(i) => write!(f, "{i}"),
            Identity::Float(x) => write!(f, "{x}"),
            Identity::Text(s) => f.write_str(s),
        }
    }
}

/// Identity of one collection entry.
///
/// Entries whose identity cannot be extracted keep their list position so they
/// are still reported instead of dropped. They render as `field[#i]`, apart
/// from any identified entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKey {
    Key(Identity),
    Unidentified(usize),
}

impl EntryKey {
    pub fn child_of(&self, path: &Path) -> Path {
        match self {
            EntryKey::Key(k) => path.child(Segment::Key(k.to_string())),
            EntryKey::Unidentified(i) => path.child(Segment::Unkeyed(*i)),
        }
    }
}

impl Ord for EntryKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (EntryKey::Key(a), EntryKey::Key(b)) => a.cmp(b),
            (EntryKey::Unidentified(a), EntryKey::Unidentified(b)) => a.cmp(b),
            (EntryKey::Key(_), EntryKey::Unidentified(_)) => Ordering::Less,
            (EntryKey::Unidentified(_), EntryKey::Key(_)) => Ordering::Greater,
        }
    }
}

impl PartialOrd for EntryKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// One side's entries, keyed by identity.
pub type Entries<'a> = Vec<(EntryKey, &'a ConfigValue)>;

/// Correspondence between the entries of two collections, each part sorted by key.
#[derive(Debug, Default)]
pub struct Matched<'a> {
    pub paired: Vec<(EntryKey, &'a ConfigValue, &'a ConfigValue)>,
    pub observed_only: Entries<'a>,
    pub declared_only: Entries<'a>,
}

/// A single step of a merged walk over [`Matched`].
#[derive(Debug)]
pub enum MatchedEntry<'a> {
    Both(&'a ConfigValue, &'a ConfigValue),
    ObservedOnly(&'a ConfigValue),
    DeclaredOnly(&'a ConfigValue),
}

impl<'a> Matched<'a> {
    /// Merges the three parts into a single sequence ordered by key.
    pub fn into_sorted(self) -> Vec<(EntryKey, MatchedEntry<'a>)> {
        let len = self.paired.len() + self.observed_only.len() + self.declared_only.len();
        let mut all: Vec<(EntryKey, MatchedEntry<'a>)> = Vec::with_capacity(len);
        all.extend(
            self.paired
                .into_iter()
                .map(|(k, o, d)| (k, MatchedEntry::Both(o, d))),
        );
        all.extend(
            self.observed_only
                .into_iter()
                .map(|(k, o)| (k, MatchedEntry::ObservedOnly(o))),
        );
        all.extend(
            self.declared_only
                .into_iter()
                .map(|(k, d)| (k, MatchedEntry::DeclaredOnly(d))),
        );
        // Stable: an unidentified index present on both sides keeps observed first.
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}

/// Keys the elements of a list by the given identity.
///
/// The first element carrying an identity claims it; later duplicates and
/// elements without one are keyed by position. Identities of different types
/// that render alike (`0` and `"0"`) also count as duplicates, so every
/// reported path stays distinct.
pub fn identify<'a>(items: &'a [ConfigValue], identity: &IdentityKey) -> Entries<'a> {
    let mut seen = BTreeSet::new();
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let key = extract_identity(item, identity)
                .filter(|k| seen.insert(k.to_string()))
                .map(EntryKey::Key)
                .unwrap_or(EntryKey::Unidentified(i));
            (key, item)
        })
        .collect()
}

/// Keys map entries by their map key.
pub fn keyed_entries(map: &BTreeMap<String, ConfigValue>) -> Entries<'_> {
    map.iter()
        .map(|(k, v)| (EntryKey::Key(Identity::Text(k.clone())), v))
        .collect()
}

fn extract_identity(item: &ConfigValue, identity: &IdentityKey) -> Option<Identity> {
    let scalar = match (identity, item) {
        (IdentityKey::Value, ConfigValue::Scalar(s)) => s,
        (IdentityKey::Field(name), record @ ConfigValue::Record(_)) => match record.field(name) {
            Some(ConfigValue::Scalar(s)) => s,
            _ => return None,
        },
        _ => return None,
    };
    Identity::from_scalar(scalar)
}

/// Pairs entries of two collections by identity.
///
/// Unidentified entries only pair with an unidentified entry on the other
/// side that is entirely equal to them, so identical collections stay
/// drift-free while differing anonymous entries are reported on their own side.
pub fn match_entries<'a>(observed: Entries<'a>, declared: Entries<'a>) -> Matched<'a> {
    let mut declared_by_key: BTreeMap<Identity, &'a ConfigValue> = BTreeMap::new();
    let mut declared_anonymous: Vec<Option<(EntryKey, &'a ConfigValue)>> = Vec::new();
    let mut matched = Matched::default();

    for (key, value) in declared {
        match key {
            EntryKey::Key(k) => {
                declared_by_key.insert(k, value);
            }
            unidentified => declared_anonymous.push(Some((unidentified, value))),
        }
    }

    for (key, value) in observed {
        match key {
            EntryKey::Key(k) => match declared_by_key.remove(&k) {
                Some(declared_value) => {
                    matched.paired.push((EntryKey::Key(k), value, declared_value))
                }
                None => matched.observed_only.push((EntryKey::Key(k), value)),
            },
            unidentified => {
                let twin = declared_anonymous
                    .iter_mut()
                    .find(|slot| matches!(slot, Some((_, d)) if *d == value))
                    .and_then(Option::take);
                match twin {
                    Some((_, declared_value)) => {
                        matched.paired.push((unidentified, value, declared_value))
                    }
                    None => matched.observed_only.push((unidentified, value)),
                }
            }
        }
    }

    matched
        .declared_only
        .extend(declared_anonymous.into_iter().flatten());

    matched.declared_only.extend(
        declared_by_key
            .into_iter()
            .map(|(k, v)| (EntryKey::Key(k), v)),
    );

    matched.paired.sort_by(|a, b| a.0.cmp(&b.0));
    matched.observed_only.sort_by(|a, b| a.0.cmp(&b.0));
    matched.declared_only.sort_by(|a, b| a.0.cmp(&b.0));
    matched
}

/// Matches two lists whose elements are identified by `identity`.
pub fn match_lists<'a>(
    observed: &'a [ConfigValue],
    declared: &'a [ConfigValue],
    identity: &IdentityKey,
) -> Matched<'a> {
    match_entries(identify(observed, identity), identify(declared, identity))
}

/// Matches two maps by key.
pub fn match_maps<'a>(
    observed: &'a BTreeMap<String, ConfigValue>,
    declared: &'a BTreeMap<String, ConfigValue>,
) -> Matched<'a> {
    match_entries(keyed_entries(observed), keyed_entries(declared))
}
