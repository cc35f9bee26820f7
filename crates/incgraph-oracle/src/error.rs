use std::time::Duration;
use thiserror::Error;

/// Failure analyzing a single file. Never aborts a batch.
#[derive(Error, Debug)]
pub enum OracleFailure {
    #[error("analysis timed out after {0:?}")]
    Timeout(Duration),

    #[error("oracle process failed: {0}")]
    Process(#[from] std::io::Error),

    #[error("oracle exited with status {status}: {stderr}")]
    Exit { status: String, stderr: String },

    #[error("invalid oracle response: {0}")]
    InvalidResponse(#[from] serde_json::Error),

    #[error("no recorded verdict for {0}")]
    NotRecorded(String),

    #[error("analysis task aborted: {0}")]
    Aborted(String),
}
