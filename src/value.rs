use std::collections::BTreeMap;
use std::fmt;

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// A primitive configuration leaf.
///
/// Numbers keep their integer/float distinction but compare equal when they
/// denote the same value, so `Int(2) == Float(2.0)`.
#[derive(Debug, Clone)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Scalar {
    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }
}

/// The integer a float denotes exactly, if any.
pub(crate) fn integral(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which no i64 can reach.
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64).then_some(f as i64)
}

fn int_eq_float(i: i64, f: f64) -> bool {
    integral(f) == Some(i)
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Scalar::Null, Scalar::Null) => true,
            (Scalar::Bool(a), Scalar::Bool(b)) => a == b,
            (Scalar::Int(a), Scalar::Int(b)) => a == b,
            (Scalar::Float(a), Scalar::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Scalar::Int(i), Scalar::Float(f)) | (Scalar::Float(f), Scalar::Int(i)) => {
                int_eq_float(*i, *f)
            }
            (Scalar::String(a), Scalar::String(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Null => write!(f, "null"),
            Scalar::Bool(b) => write!(f, "{b}"),
            Scalar::Int(i) => write!(f, "{i}"),
            Scalar::Float(x) => write!(f, "{x}"),
            Scalar::String(s) => write!(f, "{s:?}"),
        }
    }
}

/// Canonical, source-independent configuration node.
///
/// Both the observed and the declared side of a resource are converted into
/// this shape before comparison, so the diff engine never sees a provider's
/// native types.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Scalar(Scalar),
    /// Position-significant sequence.
    List(Vec<ConfigValue>),
    /// Unordered map keyed by user data (tags).
    Keyed(BTreeMap<String, ConfigValue>),
    /// Structured node; field order is schema order.
    Record(Vec<(String, ConfigValue)>),
}

/// Which variant a value is, for shape-mismatch reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Scalar,
    List,
    Keyed,
    Record,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Shape::Scalar => "scalar",
            Shape::List => "list",
            Shape::Keyed => "keyed collection",
            Shape::Record => "record",
        };
        f.write_str(name)
    }
}

impl ConfigValue {
    pub fn null() -> Self {
        ConfigValue::Scalar(Scalar::Null)
    }

    pub fn string(s: impl Into<String>) -> Self {
        ConfigValue::Scalar(Scalar::String(s.into()))
    }

    pub fn int(i: i64) -> Self {
        ConfigValue::Scalar(Scalar::Int(i))
    }

    pub fn float(f: f64) -> Self {
        ConfigValue::Scalar(Scalar::Float(f))
    }

    pub fn bool(b: bool) -> Self {
        ConfigValue::Scalar(Scalar::Bool(b))
    }

    pub fn record<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, ConfigValue)>,
    {
        ConfigValue::Record(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn keyed<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, ConfigValue)>,
    {
        ConfigValue::Keyed(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn shape(&self) -> Shape {
        match self {
            ConfigValue::Scalar(_) => Shape::Scalar,
            ConfigValue::List(_) => Shape::List,
            ConfigValue::Keyed(_) => Shape::Keyed,
            ConfigValue::Record(_) => Shape::Record,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Scalar(Scalar::Null))
    }

    /// Looks up a record field by name. Returns `None` for non-records.
    pub fn field(&self, name: &str) -> Option<&ConfigValue> {
        match self {
            ConfigValue::Record(fields) => fields.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Scalar(s) => write!(f, "{s}"),
            _ => match serde_json::to_string(self) {
                Ok(json) => f.write_str(&json),
                Err(_) => Err(fmt::Error),
            },
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::Null => serializer.serialize_none(),
            Scalar::Bool(b) => serializer.serialize_bool(*b),
            Scalar::Int(i) => serializer.serialize_i64(*i),
            Scalar::Float(f) => serializer.serialize_f64(*f),
            Scalar::String(s) => serializer.serialize_str(s),
        }
    }
}

impl Serialize for ConfigValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ConfigValue::Scalar(s) => s.serialize(serializer),
            ConfigValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            ConfigValue::Keyed(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
            ConfigValue::Record(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integral_float_equals_int() {
        assert_eq!(Scalar::Int(8), Scalar::Float(8.0));
        assert_eq!(Scalar::Float(8.0), Scalar::Int(8));
        assert_ne!(Scalar::Int(8), Scalar::Float(8.5));
    }

    #[test]
    fn test_float_beyond_i64_range_is_not_equal() {
        assert_ne!(Scalar::Int(i64::MAX), Scalar::Float(i64::MAX as f64));
    }

    #[test]
    fn test_nan_is_reflexive() {
        let nan = ConfigValue::float(f64::NAN);
        assert_eq!(nan, nan.clone());
    }

    #[test]
    fn test_no_implicit_coercion() {
        assert_ne!(Scalar::String("1".to_string()), Scalar::Int(1));
        assert_ne!(Scalar::String("true".to_string()), Scalar::Bool(true));
        assert_ne!(Scalar::Bool(false), Scalar::Null);
    }

    #[test]
    fn test_record_field_lookup() {
        let value = ConfigValue::record([("id", ConfigValue::string("sg-1"))]);
        assert_eq!(value.field("id"), Some(&ConfigValue::string("sg-1")));
        assert!(value.field("name").is_none());
        assert!(ConfigValue::int(1).field("id").is_none());
    }

    #[test]
    fn test_record_serializes_in_schema_order() {
        let value = ConfigValue::record([
            ("zeta", ConfigValue::int(1)),
            ("alpha", ConfigValue::bool(true)),
        ]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"{"zeta":1,"alpha":true}"#);
    }

    #[test]
    fn test_display_scalar_and_composite() {
        assert_eq!(ConfigValue::string("t2.micro").to_string(), "\"t2.micro\"");
        assert_eq!(ConfigValue::null().to_string(), "null");
        let tags = ConfigValue::keyed([("Name", ConfigValue::string("x"))]);
        assert_eq!(tags.to_string(), r#"{"Name":"x"}"#);
    }
}
