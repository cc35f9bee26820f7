//! Batch driver: fans per-file oracle requests out over a bounded worker
//! pool and collects typed results
//!
//! A file that fails or times out yields [`AnalysisOutcome::Failed`]; the
//! batch always runs to completion.

use crate::bridge::{AnalysisRequest, SourceOracle};
use crate::error::OracleFailure;
use incgraph_config::{EffectiveConfig, OracleSettings};
use incgraph_core::{AnalysisOutcome, FileAnalysis, GraphStore};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{self, JoinError, JoinSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorOptions {
    pub workers: usize,
    pub timeout: Duration,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            timeout: Duration::from_secs(300),
        }
    }
}

impl OrchestratorOptions {
    pub fn from_settings(settings: &OracleSettings) -> Self {
        Self {
            workers: settings.workers.unwrap_or_else(default_workers).max(1),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }
}

/// One worker per logical CPU.
fn default_workers() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}

fn build_tooling_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(?:buildtools|build)/").expect("valid regex"))
}

/// Files worth sending to the oracle, in snapshot order.
///
/// Build tooling and textual fragments (`.inc`, `.def`, `.sigs`) are never
/// analyzed, nor are `ignores.skip` paths. `filename_filter` must match at the
/// start of the path.
pub fn select_files(
    store: &GraphStore,
    config: Option<&EffectiveConfig>,
    filename_filter: Option<&Regex>,
) -> Vec<String> {
    store
        .all_files()
        .map(|file| file.path.as_str())
        .filter(|path| !build_tooling_regex().is_match(path))
        .filter(|path| ![".sigs", ".def", ".inc"].iter().any(|ext| path.ends_with(ext)))
        .filter(|path| config.is_none_or(|config| !config.is_skipped(path)))
        .filter(|path| filename_filter.is_none_or(|re| re.find(path).is_some_and(|m| m.start() == 0)))
        .map(str::to_string)
        .collect()
}

pub struct Orchestrator {
    oracle: Arc<dyn SourceOracle>,
    options: OrchestratorOptions,
}

impl Orchestrator {
    pub fn new(oracle: Arc<dyn SourceOracle>, options: OrchestratorOptions) -> Self {
        Self { oracle, options }
    }

    pub fn options(&self) -> OrchestratorOptions {
        self.options
    }

    /// Dispatch every request and stream results back as they complete.
    ///
    /// At most `workers` requests are in flight at once. Results arrive in
    /// completion order. Must be called from within a tokio runtime.
    pub fn run_streaming(&self, requests: Vec<AnalysisRequest>) -> mpsc::Receiver<FileAnalysis> {
        let workers = self.options.workers.max(1);
        let (tx, rx) = mpsc::channel(workers * 2);
        let oracle = Arc::clone(&self.oracle);
        let timeout = self.options.timeout;

        tokio::spawn(async move {
            let semaphore = Arc::new(Semaphore::new(workers));
            let mut tasks = JoinSet::new();
            let mut in_flight = HashMap::new();

            for request in requests {
                let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                    break;
                };
                if tx.is_closed() {
                    break;
                }
                // Reap finished tasks so bookkeeping stays bounded by `workers`.
                while let Some(joined) = tasks.try_join_next_with_id() {
                    settle(joined, &mut in_flight, &tx).await;
                }

                let oracle = Arc::clone(&oracle);
                let tx = tx.clone();
                let file = request.file.clone();
                let handle = tasks.spawn(async move {
                    let analysis = analyze_one(oracle.as_ref(), request, timeout).await;
                    drop(permit);
                    // The receiver may have gone away; nothing left to report to.
                    let _ = tx.send(analysis).await;
                });
                in_flight.insert(handle.id(), file);
            }

            while let Some(joined) = tasks.join_next_with_id().await {
                settle(joined, &mut in_flight, &tx).await;
            }
        });

        rx
    }

    /// Analyze every request and return the results sorted by file.
    pub async fn run(&self, requests: Vec<AnalysisRequest>) -> Vec<FileAnalysis> {
        let total = requests.len();
        tracing::info!(
            "Analyzing {} files with the {} oracle ({} workers)",
            total,
            self.oracle.name(),
            self.options.workers
        );

        let mut rx = self.run_streaming(requests);
        let mut results = Vec::with_capacity(total);
        while let Some(analysis) = rx.recv().await {
            results.push(analysis);
            if results.len() % 1000 == 0 {
                tracing::info!("Analyzed {}/{} files", results.len(), total);
            }
        }

        let failed = results
            .iter()
            .filter(|analysis| matches!(analysis.outcome, AnalysisOutcome::Failed(_)))
            .count();
        tracing::info!("Finished analysis: {} files, {} failed", results.len(), failed);

        results.sort_by(|a, b| a.file.cmp(&b.file));
        results
    }
}

/// Forget a finished task, reporting its file as failed if the task panicked.
async fn settle(
    joined: Result<(task::Id, ()), JoinError>,
    in_flight: &mut HashMap<task::Id, String>,
    tx: &mpsc::Sender<FileAnalysis>,
) {
    match joined {
        Ok((id, ())) => {
            in_flight.remove(&id);
        }
        Err(err) => {
            let file = in_flight.remove(&err.id()).unwrap_or_default();
            tracing::error!("Analysis task for {} aborted: {}", file, err);
            let failure = OracleFailure::Aborted(err.to_string());
            let _ = tx.send(FileAnalysis::failed(file, failure.to_string())).await;
        }
    }
}

async fn analyze_one(oracle: &dyn SourceOracle, request: AnalysisRequest, timeout: Duration) -> FileAnalysis {
    let outcome = match tokio::time::timeout(timeout, oracle.analyze(&request)).await {
        Ok(Ok(verdict)) => Ok(verdict),
        Ok(Err(failure)) => Err(failure),
        Err(_) => Err(OracleFailure::Timeout(timeout)),
    };

    match outcome {
        Ok(verdict) => FileAnalysis::verdict(request.file, verdict),
        Err(failure) => {
            tracing::warn!("Skipping {}: {}", request.file, failure);
            FileAnalysis::failed(request.file, failure.to_string())
        }
    }
}
