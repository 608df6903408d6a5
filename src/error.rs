use std::path::PathBuf;

use crate::config::ConfigError;
use thiserror::Error;

/// Top-level error type for the confg library.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot resolve configuration root '{path}': {source}")]
    InvalidRoot {
        path: PathBuf,
        source: std::io::Error,
    },
}
