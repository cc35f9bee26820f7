//! Seam between the orchestrator and whatever backend decides which
//! includes a file uses

use crate::error::OracleFailure;
use incgraph_core::OracleVerdict;
use serde::{Deserialize, Serialize};

/// One per-file analysis request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    /// Path of the file to analyze, as spelled in the snapshot.
    pub file: String,
    /// Include dirs from the file's effective config, nearest owner first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include_dirs: Vec<String>,
}

impl AnalysisRequest {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            include_dirs: Vec::new(),
        }
    }

    pub fn with_include_dirs(mut self, include_dirs: Vec<String>) -> Self {
        self.include_dirs = include_dirs;
        self
    }
}

/// Backend reporting unused and missing includes for one file at a time.
///
/// Implementations are shared across worker tasks and may be called
/// concurrently. A failure is scoped to the requested file.
#[async_trait::async_trait]
pub trait SourceOracle: Send + Sync {
    /// Analyze one file
    async fn analyze(&self, request: &AnalysisRequest) -> Result<OracleVerdict, OracleFailure>;

    /// Get oracle name
    fn name(&self) -> &str;
}
