//! File-based configuration source.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_yaml::Value as YamlValue;
use tracing::{debug, trace};

use super::source::{ConfigEntry, ConfigSource};
use super::template::TextPreprocessor;
use super::ConfigError;

/// Options for [`Node::load_yaml_with`](super::Node::load_yaml_with).
#[derive(Debug, Clone)]
#[must_use]
pub struct LoadOptions {
    pub(crate) key: Option<String>,
    pub(crate) ignore_env: bool,
    pub(crate) required: bool,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the file's content under `key` instead of merging it into the node.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Keeps every top-level section even if one is named after the environment.
    pub fn ignore_env(mut self, ignore_env: bool) -> Self {
        self.ignore_env = ignore_env;
        self
    }

    /// If `false`, a file that cannot be found is skipped instead of failing.
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            key: None,
            ignore_env: false,
            required: true,
        }
    }
}

/// Resolves `path` against `root`.
///
/// Absolute paths are used as-is. Otherwise the first existing file among
/// `{root}/config/{path}.yml` (unless `path` already ends in `.yml`),
/// `{root}/config/{path}` and `{root}/{path}` wins.
pub fn find_config_yaml(root: &Path, path: &Path) -> Option<PathBuf> {
    if path.is_absolute() {
        return path.is_file().then(|| path.to_path_buf());
    }

    let config_dir = root.join("config");
    let mut candidates = Vec::with_capacity(3);
    if path.extension().map_or(true, |ext| ext != "yml") {
        let mut with_ext = OsString::from(path.as_os_str());
        with_ext.push(".yml");
        candidates.push(config_dir.join(with_ext));
    }
    candidates.push(config_dir.join(path));
    candidates.push(root.join(path));

    candidates.into_iter().find(|candidate| {
        trace!(candidate = %candidate.display(), "trying config file");
        candidate.is_file()
    })
}

/// A YAML file, run through a [`TextPreprocessor`] and scoped to an environment.
///
/// When the decoded top level is a mapping holding a key equal to the
/// environment, only that section is used unless `ignore_env` is set.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    environment: String,
    options: LoadOptions,
    preprocessor: Arc<dyn TextPreprocessor>,
}

impl FileSource {
    /// Resolves `path` against `root`.
    ///
    /// Returns `Ok(None)` if the file doesn't exist and the options mark it optional.
    pub fn resolve(
        root: &Path,
        path: impl AsRef<Path>,
        environment: impl Into<String>,
        options: LoadOptions,
        preprocessor: Arc<dyn TextPreprocessor>,
    ) -> Result<Option<Self>, ConfigError> {
        let requested = path.as_ref();
        match find_config_yaml(root, requested) {
            Some(path) => Ok(Some(Self {
                path,
                environment: environment.into(),
                options,
                preprocessor,
            })),
            None if options.required => Err(ConfigError::FileNotFound(requested.to_path_buf())),
            None => {
                debug!(path = %requested.display(), "optional config file not found, skipping");
                Ok(None)
            }
        }
    }

    /// The resolved file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads, expands and decodes the file, then applies environment scoping.
    pub fn load(&self) -> Result<YamlValue, ConfigError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::ReadError {
            path: self.path.clone(),
            source: e,
        })?;
        let expanded = self.preprocessor.expand(&raw)?;

        let parse_error = |source: serde_yaml::Error| ConfigError::ParseError {
            path: self.path.clone(),
            source,
        };
        let mut content: YamlValue = serde_yaml::from_str(&expanded).map_err(parse_error)?;
        // Shared sections are pulled in with `<<: *anchor`.
        content.apply_merge().map_err(parse_error)?;

        debug!(path = %self.path.display(), environment = %self.environment, "loaded config file");
        Ok(self.scope(content))
    }

    fn scope(&self, content: YamlValue) -> YamlValue {
        if self.options.ignore_env || self.environment.is_empty() {
            return content;
        }
        match content {
            YamlValue::Mapping(mut mapping) => {
                match mapping.remove(self.environment.as_str()) {
                    Some(section) => section,
                    None => YamlValue::Mapping(mapping),
                }
            }
            other => other,
        }
    }
}

impl ConfigSource for FileSource {
    fn entries(&self) -> Result<Vec<ConfigEntry>, ConfigError> {
        let content = self.load()?;

        if let Some(key) = &self.options.key {
            return Ok(vec![ConfigEntry::at_path(vec![key.clone()], content)]);
        }

        match content {
            YamlValue::Mapping(mapping) => Ok(vec![ConfigEntry::root(mapping)]),
            YamlValue::Null => Ok(vec![]),
            YamlValue::Sequence(_) => Err(ConfigError::MissingKeyForSequence(self.path.clone())),
            _ => Err(ConfigError::UnkeyedScalar(self.path.clone())),
        }
    }
}
