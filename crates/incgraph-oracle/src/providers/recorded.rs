//! Replays verdicts captured by an earlier run

use crate::bridge::{AnalysisRequest, SourceOracle};
use crate::error::OracleFailure;
use anyhow::{Context, Result};
use incgraph_core::{ChangeKind, ChangeList, OracleVerdict, VerdictEntry};
use std::collections::HashMap;
use std::path::Path;

pub struct RecordedOracle {
    verdicts: HashMap<String, OracleVerdict>,
    /// A change list covers every analyzed file, so an absent file simply
    /// had nothing to change. A JSON map only covers the files it names.
    absent_is_empty: bool,
}

impl RecordedOracle {
    pub fn from_change_list(list: ChangeList) -> Self {
        let mut verdicts: HashMap<String, OracleVerdict> = HashMap::new();
        for change in list.changes {
            let entry = VerdictEntry {
                header: change.edge,
                line: change.line,
            };
            let verdict = verdicts.entry(change.file).or_default();
            match change.kind {
                ChangeKind::Remove => verdict.unused_edges.push(entry),
                ChangeKind::Add => verdict.missing_headers.push(entry),
            }
        }
        Self {
            verdicts,
            absent_is_empty: true,
        }
    }

    /// Parse a JSON object mapping file paths to verdicts.
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        Ok(Self {
            verdicts: serde_json::from_str(text)?,
            absent_is_empty: false,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let is_json = path.extension().is_some_and(|ext| ext == "json");
        let oracle = if is_json {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read verdicts from {}", path.display()))?;
            Self::from_json_str(&text).with_context(|| format!("Invalid verdicts file {}", path.display()))?
        } else {
            let list = ChangeList::from_path(path)
                .with_context(|| format!("Invalid change list {}", path.display()))?;
            if list.skipped > 0 {
                tracing::warn!("Skipped {} change list rows with unknown actions", list.skipped);
            }
            Self::from_change_list(list)
        };
        tracing::info!("Loaded recorded verdicts for {} files", oracle.len());
        Ok(oracle)
    }

    pub fn len(&self) -> usize {
        self.verdicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }
}

#[async_trait::async_trait]
impl SourceOracle for RecordedOracle {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<OracleVerdict, OracleFailure> {
        match self.verdicts.get(&request.file) {
            Some(verdict) => Ok(verdict.clone()),
            None if self.absent_is_empty => Ok(OracleVerdict::default()),
            None => Err(OracleFailure::NotRecorded(request.file.clone())),
        }
    }

    fn name(&self) -> &str {
        "recorded"
    }
}
