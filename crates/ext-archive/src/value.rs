//! Tagged configuration values read from the metadata document.
//!
//! The metadata document is free-form YAML. Everything that is not one of
//! the required fields stays available to the extension through a
//! [`ConfigValue`] map, and typed lookups go through [`FromConfigValue`].

use std::collections::BTreeMap;

/// A single value from the metadata document.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    List(Vec<ConfigValue>),
    Map(BTreeMap<String, ConfigValue>),
}

impl ConfigValue {
    /// Convert a parsed YAML value.
    ///
    /// Returns `None` for `null`, which is treated the same as an absent key.
    /// Null items inside lists and maps are dropped.
    pub fn from_yaml(value: serde_yaml::Value) -> Option<Self> {
        use serde_yaml::Value;

        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Self::Bool(b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Self::Integer(i))
                } else {
                    // u64 beyond i64::MAX and real floats both land here
                    n.as_f64().map(Self::Float)
                }
            }
            Value::String(s) => Some(Self::String(s)),
            Value::Sequence(items) => Some(Self::List(
                items.into_iter().filter_map(Self::from_yaml).collect(),
            )),
            Value::Mapping(mapping) => {
                let mut map = BTreeMap::new();
                for (key, value) in mapping {
                    let Some(key) = yaml_scalar(&key) else {
                        tracing::debug!("Ignoring non-scalar metadata key {:?}", key);
                        continue;
                    };
                    if let Some(value) = Self::from_yaml(value) {
                        map.insert(key, value);
                    }
                }
                Some(Self::Map(map))
            }
            Value::Tagged(tagged) => Self::from_yaml(tagged.value),
        }
    }

    /// Human-readable name of the variant, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Typed conversion, `None` when the variant does not fit `T`.
    pub fn get<T: FromConfigValue>(&self) -> Option<T> {
        T::from_config_value(self)
    }
}

/// Text form of a YAML scalar, `None` for null, sequences and mappings.
pub(crate) fn yaml_scalar(value: &serde_yaml::Value) -> Option<String> {
    use serde_yaml::Value;

    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Tagged(tagged) => yaml_scalar(&tagged.value),
        _ => None,
    }
}

/// Types that can be read out of a [`ConfigValue`].
pub trait FromConfigValue: Sized {
    fn from_config_value(value: &ConfigValue) -> Option<Self>;
}

impl FromConfigValue for ConfigValue {
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromConfigValue for String {
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FromConfigValue for bool {
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl FromConfigValue for i64 {
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Integer(i) => Some(*i),
            _ => None,
        }
    }
}

impl FromConfigValue for i32 {
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Integer(i) => i32::try_from(*i).ok(),
            _ => None,
        }
    }
}

impl FromConfigValue for u64 {
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Integer(i) => u64::try_from(*i).ok(),
            _ => None,
        }
    }
}

impl FromConfigValue for f64 {
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Float(f) => Some(*f),
            ConfigValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl FromConfigValue for Vec<ConfigValue> {
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::List(items) => Some(items.clone()),
            _ => None,
        }
    }
}

impl FromConfigValue for Vec<String> {
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::List(items) => items.iter().map(String::from_config_value).collect(),
            _ => None,
        }
    }
}

impl FromConfigValue for BTreeMap<String, ConfigValue> {
    fn from_config_value(value: &ConfigValue) -> Option<Self> {
        match value {
            ConfigValue::Map(map) => Some(map.clone()),
            _ => None,
        }
    }
}
