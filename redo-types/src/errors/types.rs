use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SerializationError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum DeserializationError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Empty input")]
    EmptyInput,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file {0:?}: {1}")]
    Read(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
}
