//! Hierarchical configuration tree.
//!
//! Values are loaded from inline assignment, nested mappings, templated YAML
//! files and environment variables into a [`Node`] tree. Root nodes are cached
//! per (environment, root) pair in a [`Namespace`]; the functions at the crate
//! root use the process-wide one.
//!
//! ```no_run
//! let config = confg::configure("production", "/srv/app", |config| {
//!     config.load_yaml("app")?;
//!     config.load_env()
//! })?;
//!
//! let config = config.lock().unwrap();
//! let host = config.fetch("database")?.fetch("host")?;
//! # Ok::<(), confg::Error>(())
//! ```

use std::path::{Path, PathBuf};

pub mod config;
mod error;
pub mod namespace;

pub use config::{
    Attr, ConfigEntry, ConfigError, ConfigSource, EnvSource, FileSource, LoadOptions, Node,
    Template, TemplateFunction, TextPreprocessor, Value,
};
pub use error::Error;
pub use namespace::{Defaults, Namespace, SharedNode};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// See [`Namespace::config`].
pub fn config(environment: impl Into<String>, root: impl AsRef<Path>) -> Result<SharedNode, Error> {
    Namespace::global().config(environment, root)
}

/// See [`Namespace::configure`].
pub fn configure<F>(
    environment: impl Into<String>,
    root: impl AsRef<Path>,
    f: F,
) -> Result<SharedNode, Error>
where
    F: FnOnce(&mut Node) -> Result<(), ConfigError>,
{
    Namespace::global().configure(environment, root, f)
}

pub fn default_config() -> Result<SharedNode, Error> {
    Namespace::global().default_config()
}

pub fn environment() -> Result<String, Error> {
    Namespace::global().environment()
}

pub fn root() -> Result<PathBuf, Error> {
    Namespace::global().root()
}

pub fn template_function<F>(name: impl Into<String>, function: F)
where
    F: Fn(Option<&str>) -> Result<String, String> + Send + Sync + 'static,
{
    Namespace::global().template_function(name, function);
}

/// Clears the process-wide cache and memoized defaults.
pub fn reset() {
    Namespace::global().reset();
}
