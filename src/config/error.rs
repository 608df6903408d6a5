use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("unrecognized key `{0}`")]
    MissingKey(String),

    #[error("a key must be provided to load the sequence in file: {0}")]
    MissingKeyForSequence(PathBuf),

    #[error("a key must be provided to load the scalar in file: {0}")]
    UnkeyedScalar(PathBuf),

    #[error("config file could not be found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("failed to deserialize config: {0}")]
    DeserializeError(#[from] serde_yaml::Error),

    #[error("unclosed template expression (missing '}}')")]
    UnclosedExpression,

    #[error("empty template expression")]
    EmptyExpression,

    #[error("unknown template function: {0}")]
    UnknownTemplateFunction(String),

    #[error("template function `{name}` failed: {message}")]
    TemplateFunction { name: String, message: String },
}
