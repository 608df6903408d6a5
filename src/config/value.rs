use std::ops::Index;

use serde_yaml::Value as YamlValue;

use super::{ConfigError, Node};

/// Returned by permissive lookups that miss.
pub(crate) static NULL: Value = Value::Scalar(YamlValue::Null);

/// A value stored in a [`Node`].
///
/// Mappings never appear here directly: they are always converted into an
/// owned child [`Node`] before storage.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null, boolean, number or string.
    Scalar(YamlValue),
    Sequence(Vec<Value>),
    Node(Node),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Scalar(YamlValue::Null))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(scalar) => scalar.as_str(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Scalar(scalar) => scalar.as_i64(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Scalar(scalar) => scalar.as_f64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Scalar(scalar) => scalar.as_bool(),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&Node> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_node_mut(&mut self) -> Option<&mut Node> {
        match self {
            Value::Node(node) => Some(node),
            _ => None,
        }
    }

    /// Strict lookup through a value: fails unless this is a node holding `key`.
    pub fn fetch(&self, key: impl AsRef<str>) -> Result<&Value, ConfigError> {
        match self {
            Value::Node(node) => node.fetch(key),
            _ => Err(ConfigError::MissingKey(key.as_ref().to_owned())),
        }
    }

    /// Converts back into a plain decoded value, nodes becoming mappings.
    pub fn to_yaml(&self) -> YamlValue {
        match self {
            Value::Scalar(scalar) => scalar.clone(),
            Value::Sequence(items) => YamlValue::Sequence(items.iter().map(Value::to_yaml).collect()),
            Value::Node(node) => YamlValue::Mapping(node.to_h()),
        }
    }
}

impl From<Value> for YamlValue {
    fn from(value: Value) -> Self {
        value.to_yaml()
    }
}

impl<K: AsRef<str>> Index<K> for Value {
    type Output = Value;

    fn index(&self, key: K) -> &Value {
        match self {
            Value::Node(node) => &node[key],
            _ => &NULL,
        }
    }
}

impl PartialEq<str> for Value {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == Some(other)
    }
}

impl PartialEq<&str> for Value {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_accessors() {
        let value = Value::Scalar(YamlValue::from(42));
        assert_eq!(value.as_i64(), Some(42));
        assert_eq!(value.as_str(), None);
        assert!(!value.is_null());

        let value = Value::Scalar(YamlValue::from("text"));
        assert_eq!(value, "text");
    }

    #[test]
    fn test_index_on_non_node_is_null() {
        let value = Value::Scalar(YamlValue::from("leaf"));
        assert!(value["anything"].is_null());
        assert!(value["anything"]["deeper"].is_null());
    }

    #[test]
    fn test_fetch_on_non_node_is_missing_key() {
        let value = Value::Sequence(vec![]);
        let result = value.fetch("first");
        assert!(matches!(result, Err(ConfigError::MissingKey(k)) if k == "first"));
    }

    #[test]
    fn test_sequence_to_yaml() {
        let value = Value::Sequence(vec![
            Value::Scalar(YamlValue::from("a")),
            Value::Scalar(YamlValue::from(true)),
        ]);
        let expected: YamlValue = serde_yaml::from_str("[a, true]").unwrap();
        assert_eq!(value.to_yaml(), expected);
    }
}
