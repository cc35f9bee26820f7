//! incgraph core: include graph model, snapshot loading, graph algorithms,
//! snapshot diffing and suggestion reconciliation

pub mod algorithms;
pub mod cache;
pub mod centrality;
pub mod changes;
pub mod cuts;
pub mod diff;
pub mod error;
pub mod graph;
pub mod model;
pub mod normalize;
pub mod reconcile;
pub mod snapshot;


#[cfg(test)]
pub mod test_utils;

pub use algorithms::{
    recalculate_expanded_size, recalculate_expanded_sizes, reachable_roots, trace, transitive_edges,
    transitive_includers, transitive_includers_with, transitive_includes, transitive_includes_with, EdgeOverlay,
    Membership, Reachable, RecalculatedSizes, SizeChange,
};
pub use cache::{cache_info, is_cache_path, load_cache, save_cache, CacheInfo, CACHE_FORMAT_VERSION};
pub use centrality::{create_scorer, CentralityInputs, CentralityScorer, DegreeScorer, PrevalenceScorer};
pub use changes::{edge_pairs_from_path, parse_edge_pairs, render_csv, render_json_lines, ChangeList};
pub use cuts::{
    edges_to_cut, is_cut_candidate, minimum_edge_cut, CutCandidate, CutEdge, EdgesToCut, EdgesToCutOptions,
    MinCutOptions,
};
pub use diff::{diff, removed_entries, DiffRecord, DiffReport, DiffScope, DiffThresholds, RemovedEntry};
pub use error::{CacheError, ChangeListError, SnapshotLoadError, ThresholdConfigError, TraceError, UnknownScorer};
pub use graph::{GraphStats, GraphStore, GraphStoreBuilder, TopIncluded};
pub use model::{
    Centrality, ChangeKind, EdgeId, FileId, FileNode, IncludeEdge, LoadStats, Metric, MetricValue, SnapshotMeta,
    SuggestedChange,
};
pub use normalize::HeaderResolver;
pub use reconcile::{
    group_by_config, rank_changes, reconcile, reconcile_changes_per_file, reconcile_per_file, AnalysisOutcome,
    FileAnalysis, OracleVerdict, ReconcileOptions, ReconcileStats, Reconciler, Reconciliation, VerdictEntry,
};
