//! Error taxonomy for the core crate

use std::path::PathBuf;

use thiserror::Error;

/// The snapshot document as a whole could not be read. Fatal.
#[derive(Error, Debug)]
pub enum SnapshotLoadError {
    #[error("failed to read snapshot {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot stream error: {0}")]
    Stream(#[from] std::io::Error),

    #[error("snapshot is not a valid include analysis document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("snapshot document is empty")]
    Empty,
}

/// Lookups that name a file or path missing from the loaded graph.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TraceError {
    #[error("{0} is not a known file")]
    UnknownFile(String),

    #[error("no transitive include path from {start} to {target}")]
    NotFound { start: String, target: String },
}

/// Diff thresholds are missing or invalid. Fatal for the diff run only.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ThresholdConfigError {
    #[error("diff threshold `{0}` is not configured")]
    Missing(&'static str),

    #[error("diff threshold `{name}` must be non-negative, got {value}")]
    Negative { name: &'static str, value: i64 },
}

/// A change list could not be read.
#[derive(Error, Debug)]
pub enum ChangeListError {
    #[error("failed to read change list: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: expected at least 4 columns, found {found}")]
    Columns { line: usize, found: usize },

    #[error("line {line}: invalid line number `{value}`")]
    LineNumber { line: usize, value: String },

    #[error("line {line}: expected an includer and an included file, found {found} columns")]
    EdgeColumns { line: usize, found: usize },
}

/// The binary snapshot cache could not be written or read.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("cache format version {found} does not match expected {expected}")]
    Version { found: u32, expected: u32 },
}

/// Unknown centrality scorer requested.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("unknown centrality scorer: {0}")]
pub struct UnknownScorer(pub String);
