//! Configuration errors. All of these abort a run before analysis starts.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no config found for {name} (looked in {searched})")]
    NotFound { name: String, searched: String },

    #[error("config dependency cycle: {chain}")]
    Cycle { chain: String },

    #[error("invalid config {path}: {message}")]
    Schema { path: PathBuf, message: String },

    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings: {0}")]
    Parse(#[from] toml::de::Error),
}
