use std::collections::BTreeSet;

use serde_json::Value;

use crate::value::{ConfigValue, Scalar};

/// Fields whose object values are user-keyed maps rather than schema records.
pub const DEFAULT_KEYED_FIELDS: &[&str] = &["tags", "tags_all"];

/// Converts JSON attribute documents into [`ConfigValue`] trees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonAdapter {
    keyed_fields: BTreeSet<String>,
}

impl Default for JsonAdapter {
    fn default() -> Self {
        Self::new(DEFAULT_KEYED_FIELDS.iter().copied())
    }
}

impl JsonAdapter {
    pub fn new<I, S>(keyed_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keyed_fields: keyed_fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_keyed(&self, field: &str) -> bool {
        self.keyed_fields.contains(field)
    }

    pub fn convert(&self, value: &Value) -> ConfigValue {
        self.convert_as(value, false)
    }

    fn convert_as(&self, value: &Value, keyed: bool) -> ConfigValue {
        match value {
            Value::Null => ConfigValue::null(),
            Value::Bool(b) => ConfigValue::bool(*b),
            Value::Number(n) => ConfigValue::Scalar(number(n)),
            Value::String(s) => ConfigValue::string(s.as_str()),
            Value::Array(items) => {
                ConfigValue::List(items.iter().map(|v| self.convert_as(v, false)).collect())
            }
            Value::Object(map) if keyed => ConfigValue::keyed(
                map.iter().map(|(k, v)| (k.as_str(), self.convert_as(v, false))),
            ),
            Value::Object(map) => ConfigValue::record(
                map.iter()
                    .map(|(k, v)| (k.as_str(), self.convert_as(v, self.is_keyed(k)))),
            ),
        }
    }
}

fn number(n: &serde_json::Number) -> Scalar {
    if let Some(i) = n.as_i64() {
        Scalar::Int(i)
    } else {
        Scalar::Float(n.as_f64().unwrap_or(f64::NAN))
    }
}
