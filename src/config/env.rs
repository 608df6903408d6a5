use super::source::{ConfigEntry, ConfigSource};
use super::ConfigError;

pub const DEFAULT_ENV_PREFIX: &str = "CONFG_";
pub const DEFAULT_ENV_SEPARATOR: &str = "__";

/// Overlays process environment variables onto the configuration tree.
///
/// `{PREFIX}DATABASE__HOST=h` becomes the entry `database.host = "h"`.
/// Segments are lower-cased and a `.` inside one nests further, so
/// `{PREFIX}A.B__C` lands at `a.b.c`. Values stay raw strings.
#[derive(Debug, Clone)]
pub struct EnvSource {
    prefix: String,
    separator: String,
}

impl EnvSource {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            separator: DEFAULT_ENV_SEPARATOR.to_owned(),
        }
    }

    /// Overrides the segment separator.
    ///
    /// An empty separator is ignored, as it would split every character.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        let separator = separator.into();
        if !separator.is_empty() {
            self.separator = separator;
        }
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    fn path_for(&self, name: &str) -> Option<Vec<String>> {
        let rest = name.strip_prefix(&self.prefix)?;
        if rest.is_empty() {
            return None;
        }
        Some(
            rest.split(&self.separator)
                .flat_map(|segment| segment.split('.'))
                .map(str::to_lowercase)
                .collect(),
        )
    }
}

impl Default for EnvSource {
    fn default() -> Self {
        Self::new(DEFAULT_ENV_PREFIX)
    }
}

impl ConfigSource for EnvSource {
    fn entries(&self) -> Result<Vec<ConfigEntry>, ConfigError> {
        let mut vars: Vec<(String, String)> = std::env::vars_os()
            .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
            .filter(|(key, _)| key.starts_with(&self.prefix))
            .collect();
        // Stable order so `A` and `A__B` always resolve the same way.
        vars.sort();

        Ok(vars
            .into_iter()
            .filter_map(|(key, value)| {
                let path = self.path_for(&key)?;
                Some(ConfigEntry::at_path(path, value))
            })
            .collect())
    }
}
