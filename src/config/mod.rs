//! The configuration tree and the sources that populate it.

mod env;
mod error;
mod file;
mod node;
mod source;
mod template;
mod value;

pub use env::{EnvSource, DEFAULT_ENV_PREFIX, DEFAULT_ENV_SEPARATOR};
pub use error::ConfigError;
pub use file::{find_config_yaml, FileSource, LoadOptions};
pub use node::{Attr, Node};
pub use source::{ConfigEntry, ConfigSource};
pub use template::{Template, TemplateFunction, TextPreprocessor};
pub use value::Value;
