use serde_yaml::{Mapping, Value as YamlValue};

use super::ConfigError;

/// A plain value destined for a path in the configuration tree.
///
/// An empty `path` addresses the node the entry is applied to; its value is
/// then merged key-wise and must be a mapping.
#[derive(Debug, Clone)]
pub struct ConfigEntry {
    pub path: Vec<String>,
    pub value: YamlValue,
}

impl ConfigEntry {
    pub fn root(mapping: Mapping) -> Self {
        Self {
            path: Vec::new(),
            value: YamlValue::Mapping(mapping),
        }
    }

    pub fn at_path(path: Vec<String>, value: impl Into<YamlValue>) -> Self {
        Self {
            path,
            value: value.into(),
        }
    }
}

/// Anything that can produce configuration entries to apply onto a
/// [`Node`](super::Node).
///
/// Entries are computed in full before any of them is applied, so a failing
/// source never leaves a node half-updated.
pub trait ConfigSource: Send + Sync + std::fmt::Debug {
    fn entries(&self) -> Result<Vec<ConfigEntry>, ConfigError>;
}
