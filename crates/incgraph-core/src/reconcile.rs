//! Turning per-file oracle verdicts into a ranked change list
//!
//! Oracle results name files and headers the way the compiler saw them, so
//! every suggestion is checked against the graph and the effective config
//! before weights are attached. Nothing here fails on a single bad entry:
//! unresolvable paths, ignored suggestions and failed files are counted in
//! [`ReconcileStats`] and reported next to the output.

use crate::centrality::CentralityScorer;
use crate::graph::{percentage, GraphStore};
use crate::model::*;
use crate::normalize::HeaderResolver;
use incgraph_config::EffectiveConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::AddAssign;
use std::sync::{Arc, OnceLock};

/// A header named in an oracle verdict, optionally with its include line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawVerdictEntry")]
pub struct VerdictEntry {
    pub header: String,
    pub line: Option<u32>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawVerdictEntry {
    Header(String),
    Detailed {
        header: String,
        #[serde(default)]
        line: Option<u32>,
    },
}

impl From<RawVerdictEntry> for VerdictEntry {
    fn from(raw: RawVerdictEntry) -> Self {
        match raw {
            RawVerdictEntry::Header(header) => VerdictEntry { header, line: None },
            RawVerdictEntry::Detailed { header, line } => VerdictEntry { header, line },
        }
    }
}

impl VerdictEntry {
    pub fn new(header: impl Into<String>) -> Self {
        VerdictEntry {
            header: header.into(),
            line: None,
        }
    }
}

/// What the oracle reported for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OracleVerdict {
    #[serde(alias = "unused_edges")]
    pub unused_edges: Vec<VerdictEntry>,
    #[serde(alias = "missing_headers")]
    pub missing_headers: Vec<VerdictEntry>,
}

impl OracleVerdict {
    pub fn is_empty(&self) -> bool {
        self.unused_edges.is_empty() && self.missing_headers.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Verdict(OracleVerdict),
    /// The oracle failed or timed out. Contributes no suggestions.
    Failed(String),
}

/// Result of analyzing one file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileAnalysis {
    pub file: String,
    pub outcome: AnalysisOutcome,
}

impl FileAnalysis {
    pub fn verdict(file: impl Into<String>, verdict: OracleVerdict) -> Self {
        FileAnalysis {
            file: file.into(),
            outcome: AnalysisOutcome::Verdict(verdict),
        }
    }

    pub fn failed(file: impl Into<String>, reason: impl Into<String>) -> Self {
        FileAnalysis {
            file: file.into(),
            outcome: AnalysisOutcome::Failed(reason.into()),
        }
    }
}

fn generated_file_regex() -> &'static Regex {
    static GENERATED: OnceLock<Regex> = OnceLock::new();
    GENERATED.get_or_init(|| Regex::new(r"^out/\w+/gen/").expect("valid regex"))
}

fn mojom_header_regex() -> &'static Regex {
    static MOJOM: OnceLock<Regex> = OnceLock::new();
    MOJOM.get_or_init(|| Regex::new(r"\.mojom[^.]*\.h$").expect("valid regex"))
}

pub fn is_generated_file(path: &str) -> bool {
    generated_file_regex().is_match(path)
}

pub fn is_mojom_header(path: &str) -> bool {
    mojom_header_regex().is_match(path)
}

/// Third-party code other than Blink, plus V8.
pub fn is_third_party(path: &str) -> bool {
    (path.starts_with("third_party/") && !path.starts_with("third_party/blink/")) || path.starts_with("v8/")
}

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Weight columns to attach. The first one orders the output.
    pub metrics: Vec<Metric>,
    pub filter_generated_files: bool,
    pub filter_mojom_headers: bool,
    pub filter_third_party: bool,
    /// Only keep suggestions of this kind.
    pub change_filter: Option<ChangeKind>,
    pub filename_filter: Option<Regex>,
    pub header_filter: Option<Regex>,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        ReconcileOptions {
            metrics: Vec::new(),
            filter_generated_files: true,
            filter_mojom_headers: true,
            filter_third_party: false,
            change_filter: None,
            filename_filter: None,
            header_filter: None,
        }
    }
}

/// Coverage counts reported alongside a change list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    pub files_total: usize,
    pub files_analyzed: usize,
    pub files_failed: usize,
    pub suggestions: usize,
    /// Dropped by config ignores or the built-in noise filters.
    pub ignored: usize,
    /// Dropped because the kind or a filename/header filter excluded them.
    pub filtered: usize,
    /// Remove suggestions whose includer is not in the graph.
    pub skipped_unresolved: usize,
    /// Add suggestions kept without a graph match for the header.
    pub unverified: usize,
}

impl fmt::Display for ReconcileStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} files analyzed ({} failed); {} suggestions, {} ignored, {} filtered, \
             {} skipped due to unresolved paths, {} with unverified weights",
            self.files_analyzed,
            self.files_total,
            self.files_failed,
            self.suggestions,
            self.ignored,
            self.filtered,
            self.skipped_unresolved,
            self.unverified
        )
    }
}

impl AddAssign for ReconcileStats {
    fn add_assign(&mut self, other: ReconcileStats) {
        self.files_total += other.files_total;
        self.files_analyzed += other.files_analyzed;
        self.files_failed += other.files_failed;
        self.suggestions += other.suggestions;
        self.ignored += other.ignored;
        self.filtered += other.filtered;
        self.skipped_unresolved += other.skipped_unresolved;
        self.unverified += other.unverified;
    }
}

/// Ranked suggestions and the counts needed to judge their coverage.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub changes: Vec<SuggestedChange>,
    pub stats: ReconcileStats,
}

impl Reconciliation {
    /// Combine reconciliations of disjoint file sets into one ranked list.
    pub fn merge(parts: impl IntoIterator<Item = Reconciliation>, options: &ReconcileOptions) -> Reconciliation {
        let mut merged = Reconciliation::default();
        for part in parts {
            merged.changes.extend(part.changes);
            merged.stats += part.stats;
        }
        rank_changes(&mut merged.changes, options);
        merged.stats.suggestions = merged.changes.len();
        merged
    }
}

/// Orders changes by the first configured metric, largest first, with
/// unknown weights ahead of known ones. Ties fall back to paths and kind.
pub fn rank_changes(changes: &mut [SuggestedChange], options: &ReconcileOptions) {
    let primary = options.metrics.first().copied();
    changes.sort_by(|a, b| {
        let by_metric = match primary {
            Some(metric) => {
                let a = a.metric(metric).unwrap_or(MetricValue::Unknown);
                let b = b.metric(metric).unwrap_or(MetricValue::Unknown);
                b.rank_cmp(a)
            }
            None => std::cmp::Ordering::Equal,
        };
        by_metric
            .then_with(|| a.file.cmp(&b.file))
            .then_with(|| a.edge.cmp(&b.edge))
            .then_with(|| a.kind.cmp(&b.kind))
    });
}

/// Splits items into groups that share an effective config, keeping the
/// order in which each group was first seen. Configs are compared by
/// identity, so a resolver that hands out one `Arc` per owner yields one
/// group per owner.
pub fn group_by_config<T, E>(
    items: impl IntoIterator<Item = T>,
    file_of: impl Fn(&T) -> &str,
    mut config_for: impl FnMut(&str) -> Result<Arc<EffectiveConfig>, E>,
) -> Result<Vec<(Arc<EffectiveConfig>, Vec<T>)>, E> {
    let mut groups: Vec<(Arc<EffectiveConfig>, Vec<T>)> = Vec::new();
    let mut index: HashMap<*const EffectiveConfig, usize> = HashMap::new();
    for item in items {
        let config = config_for(file_of(&item))?;
        let slot = *index.entry(Arc::as_ptr(&config)).or_insert_with(|| {
            groups.push((config.clone(), Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(item);
    }
    Ok(groups)
}

pub struct Reconciler<'a> {
    store: &'a GraphStore,
    config: &'a EffectiveConfig,
    scorer: &'a dyn CentralityScorer,
    options: &'a ReconcileOptions,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        store: &'a GraphStore,
        config: &'a EffectiveConfig,
        scorer: &'a dyn CentralityScorer,
        options: &'a ReconcileOptions,
    ) -> Self {
        Reconciler {
            store,
            config,
            scorer,
            options,
        }
    }

    /// Reconcile oracle results for many files.
    pub fn reconcile(&self, results: &[FileAnalysis]) -> Reconciliation {
        let mut stats = ReconcileStats {
            files_total: results.len(),
            ..Default::default()
        };
        let mut raw = Vec::new();

        for result in results {
            match &result.outcome {
                AnalysisOutcome::Failed(reason) => {
                    tracing::warn!("Analysis of {} failed: {}", result.file, reason);
                    stats.files_failed += 1;
                }
                AnalysisOutcome::Verdict(verdict) => {
                    stats.files_analyzed += 1;
                    let removes = verdict
                        .unused_edges
                        .iter()
                        .map(|entry| (ChangeKind::Remove, entry));
                    let adds = verdict
                        .missing_headers
                        .iter()
                        .map(|entry| (ChangeKind::Add, entry));
                    for (kind, entry) in removes.chain(adds) {
                        let mut change = SuggestedChange::new(kind, result.file.clone(), entry.header.clone());
                        change.line = entry.line;
                        raw.push(change);
                    }
                }
            }
        }

        let mut reconciliation = self.reconcile_changes(raw);
        reconciliation.stats = ReconcileStats {
            files_total: stats.files_total,
            files_analyzed: stats.files_analyzed,
            files_failed: stats.files_failed,
            ..reconciliation.stats
        };
        reconciliation
    }

    /// Filter, weigh and rank an existing change list.
    pub fn reconcile_changes(&self, changes: impl IntoIterator<Item = SuggestedChange>) -> Reconciliation {
        let mut stats = ReconcileStats::default();
        let mut kept = Vec::new();

        for change in changes {
            if !self.passes_filters(&change) {
                stats.filtered += 1;
                continue;
            }
            if self.is_noise(&change) {
                stats.ignored += 1;
                continue;
            }
            let change = match change.kind {
                ChangeKind::Remove => self.remove_suggestion(change, &mut stats),
                ChangeKind::Add => self.add_suggestion(change, &mut stats),
            };
            if let Some(change) = change {
                kept.push(change);
            }
        }

        rank_changes(&mut kept, self.options);
        stats.suggestions = kept.len();
        Reconciliation { changes: kept, stats }
    }

    fn passes_filters(&self, change: &SuggestedChange) -> bool {
        let options = self.options;
        options.change_filter.is_none_or(|kind| kind == change.kind)
            && options
                .filename_filter
                .as_ref()
                .is_none_or(|re| re.is_match(&change.file))
            && options
                .header_filter
                .as_ref()
                .is_none_or(|re| re.is_match(&change.edge))
    }

    fn is_noise(&self, change: &SuggestedChange) -> bool {
        let options = self.options;
        (options.filter_generated_files && is_generated_file(&change.file))
            || (options.filter_mojom_headers && is_mojom_header(&change.edge))
            || (options.filter_third_party && (is_third_party(&change.file) || is_third_party(&change.edge)))
    }

    fn remove_suggestion(&self, mut change: SuggestedChange, stats: &mut ReconcileStats) -> Option<SuggestedChange> {
        let Some(includer) = self.store.file_id(&change.file) else {
            tracing::debug!("Skipping removal in unresolved file {}", change.file);
            stats.skipped_unresolved += 1;
            return None;
        };

        let resolver = HeaderResolver::new(self.store);
        let included = resolver.resolve(&change.file, &change.edge, &self.config.include_dirs);
        let canonical = included.map(|id| self.store.path(id));

        let ignored = self.config.remove.matches(&change.file, &change.edge)
            || canonical.is_some_and(|path| self.config.remove.matches(&change.file, path));
        if ignored {
            stats.ignored += 1;
            return None;
        }

        let edge = included.and_then(|included| self.store.edge_by_ids(includer, included));
        change.metrics = self
            .options
            .metrics
            .iter()
            .map(|&metric| (metric, edge.map_or(MetricValue::Unknown, |e| metric.of_edge(e))))
            .collect();
        Some(change)
    }

    fn add_suggestion(&self, mut change: SuggestedChange, stats: &mut ReconcileStats) -> Option<SuggestedChange> {
        let mapped = self.config.map_header(&change.edge).to_string();
        if self.config.add.matches(&change.file, &mapped) {
            stats.ignored += 1;
            return None;
        }

        let resolver = HeaderResolver::new(self.store);
        let includer = self.store.file_id(&change.file);
        let included = resolver.resolve(&change.file, &mapped, &self.config.include_dirs);
        if included.is_none() {
            tracing::debug!("Header {} suggested for {} is not in the graph", mapped, change.file);
            change.unverified = true;
            stats.unverified += 1;
        }
        change.edge = mapped;
        change.metrics = self
            .options
            .metrics
            .iter()
            .map(|&metric| (metric, self.add_metric(metric, includer, included)))
            .collect();
        Some(change)
    }

    /// Weight of an include that does not exist yet.
    fn add_metric(&self, metric: Metric, includer: Option<FileId>, included: Option<FileId>) -> MetricValue {
        if let (Some(includer), Some(included)) = (includer, included) {
            if let Some(edge) = self.store.edge_by_ids(includer, included) {
                return metric.of_edge(edge);
            }
        }

        let includer_file = includer.and_then(|id| self.store.file(id));
        let included_file = included.and_then(|id| self.store.file(id));
        let prevalence = includer_file.map(|f| percentage(f.prevalence, self.store.root_count()));

        match metric {
            Metric::AddedSize => MetricValue::Unknown,
            Metric::ExpandedSize => included_file.map_or(MetricValue::Unknown, |f| MetricValue::Size(f.expanded_size)),
            Metric::Prevalence => prevalence.map_or(MetricValue::Unknown, MetricValue::Percent),
            Metric::IncluderSize => includer_file.map_or(MetricValue::Unknown, |f| MetricValue::Size(f.size)),
            Metric::Centrality => match (includer, included, prevalence) {
                (Some(includer), Some(included), Some(prevalence)) => {
                    let inputs = self.store.centrality_inputs(includer, included, prevalence);
                    MetricValue::Score(self.scorer.score(&inputs))
                }
                _ => MetricValue::Unknown,
            },
        }
    }
}

/// Convenience wrapper over [`Reconciler::reconcile`].
pub fn reconcile(
    results: &[FileAnalysis],
    store: &GraphStore,
    config: &EffectiveConfig,
    scorer: &dyn CentralityScorer,
    options: &ReconcileOptions,
) -> Reconciliation {
    Reconciler::new(store, config, scorer, options).reconcile(results)
}

/// Reconciles each file's results under the config that governs that file.
pub fn reconcile_per_file<E>(
    results: &[FileAnalysis],
    store: &GraphStore,
    scorer: &dyn CentralityScorer,
    options: &ReconcileOptions,
    config_for: impl FnMut(&str) -> Result<Arc<EffectiveConfig>, E>,
) -> Result<Reconciliation, E> {
    let groups = group_by_config(results.iter().cloned(), |r: &FileAnalysis| r.file.as_str(), config_for)?;
    let parts = groups
        .into_iter()
        .map(|(config, group)| Reconciler::new(store, &config, scorer, options).reconcile(&group));
    Ok(Reconciliation::merge(parts, options))
}

/// Like [`reconcile_per_file`] for an existing change list.
pub fn reconcile_changes_per_file<E>(
    changes: impl IntoIterator<Item = SuggestedChange>,
    store: &GraphStore,
    scorer: &dyn CentralityScorer,
    options: &ReconcileOptions,
    config_for: impl FnMut(&str) -> Result<Arc<EffectiveConfig>, E>,
) -> Result<Reconciliation, E> {
    let groups = group_by_config(changes, |c: &SuggestedChange| c.file.as_str(), config_for)?;
    let parts = groups
        .into_iter()
        .map(|(config, group)| Reconciler::new(store, &config, scorer, options).reconcile_changes(group));
    Ok(Reconciliation::merge(parts, options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::centrality::DegreeScorer;
    use crate::test_utils::chain_store;

    fn verdict(unused: &[&str], missing: &[&str]) -> OracleVerdict {
        OracleVerdict {
            unused_edges: unused.iter().map(|h| VerdictEntry::new(*h)).collect(),
            missing_headers: missing.iter().map(|h| VerdictEntry::new(*h)).collect(),
        }
    }

    fn options(metrics: &[Metric]) -> ReconcileOptions {
        ReconcileOptions {
            metrics: metrics.to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn verdicts_accept_strings_and_objects() {
        let verdict: OracleVerdict = serde_json::from_str(
            r#"{"unusedEdges": ["b.h", {"header": "c.h", "line": 7}], "missingHeaders": []}"#,
        )
        .unwrap();
        assert_eq!(verdict.unused_edges[0], VerdictEntry::new("b.h"));
        assert_eq!(verdict.unused_edges[1].line, Some(7));
    }

    #[test]
    fn ignored_edges_are_excluded() {
        let store = chain_store();
        let mut config = EffectiveConfig::default();
        config.remove.insert_edge("a.cc", "b.h");

        let results = vec![
            FileAnalysis::verdict("a.cc", verdict(&["b.h"], &[])),
            FileAnalysis::verdict("b.h", verdict(&["c.h"], &[])),
        ];
        let out = reconcile(&results, &store, &config, &DegreeScorer::default(), &options(&[]));

        assert_eq!(out.changes.len(), 1);
        assert_eq!((out.changes[0].file.as_str(), out.changes[0].edge.as_str()), ("b.h", "c.h"));
        assert_eq!(out.stats.ignored, 1);
    }

    #[test]
    fn header_mappings_apply_before_add_ignores() {
        let store = chain_store();
        let mut config = EffectiveConfig::default();
        config
            .header_mappings
            .insert("__fwd/d.h".to_string(), "d.h".to_string());
        config.add.headers.insert("internal.h".to_string());

        let results = vec![FileAnalysis::verdict("a.cc", verdict(&[], &["__fwd/d.h", "internal.h"]))];
        let out = reconcile(
            &results,
            &store,
            &config,
            &DegreeScorer::default(),
            &options(&[Metric::ExpandedSize]),
        );

        assert_eq!(out.changes.len(), 1);
        let change = &out.changes[0];
        assert_eq!(change.kind, ChangeKind::Add);
        assert_eq!(change.edge, "d.h");
        assert!(!change.unverified);
        assert_eq!(change.metric(Metric::ExpandedSize), Some(MetricValue::Size(40)));
        assert_eq!(out.stats.ignored, 1);
    }

    #[test]
    fn unresolved_paths_are_counted_not_fatal() {
        let store = chain_store();
        let config = EffectiveConfig::default();
        let results = vec![
            FileAnalysis::verdict("missing.cc", verdict(&["b.h"], &[])),
            FileAnalysis::verdict("a.cc", verdict(&[], &["private/impl.h"])),
            FileAnalysis::failed("e.cc", "timed out"),
        ];
        let out = reconcile(
            &results,
            &store,
            &config,
            &DegreeScorer::default(),
            &options(&[Metric::AddedSize, Metric::Centrality]),
        );

        assert_eq!(out.stats.skipped_unresolved, 1);
        assert_eq!(out.stats.unverified, 1);
        assert_eq!(out.stats.files_failed, 1);
        assert_eq!(out.stats.files_analyzed, 2);
        assert_eq!(out.changes.len(), 1);
        assert!(out.changes[0].unverified);
        assert_eq!(out.changes[0].metric(Metric::Centrality), Some(MetricValue::Unknown));
        assert_eq!(
            out.stats.to_string(),
            "2 of 3 files analyzed (1 failed); 1 suggestions, 0 ignored, 0 filtered, \
             1 skipped due to unresolved paths, 1 with unverified weights"
        );
    }

    #[test]
    fn ranks_by_primary_metric_with_unknown_first() {
        let store = chain_store();
        let config = EffectiveConfig::default();
        let results = vec![
            FileAnalysis::verdict("a.cc", verdict(&["b.h"], &[])),
            FileAnalysis::verdict("c.h", verdict(&["d.h"], &[])),
            // Present in the graph as a file but not as an edge.
            FileAnalysis::verdict("b.h", verdict(&["d.h"], &[])),
        ];
        let out = reconcile(
            &results,
            &store,
            &config,
            &DegreeScorer::default(),
            &options(&[Metric::AddedSize]),
        );

        let order: Vec<(&str, &str)> = out
            .changes
            .iter()
            .map(|c| (c.file.as_str(), c.edge.as_str()))
            .collect();
        assert_eq!(order, vec![("b.h", "d.h"), ("c.h", "d.h"), ("a.cc", "b.h")]);
        assert_eq!(out.changes[0].metric(Metric::AddedSize), Some(MetricValue::Unknown));
    }

    #[test]
    fn noise_filters_and_kind_filter() {
        let store = chain_store();
        let config = EffectiveConfig::default();
        let changes = vec![
            SuggestedChange::new(ChangeKind::Remove, "out/Debug/gen/x.cc", "b.h"),
            SuggestedChange::new(ChangeKind::Add, "a.cc", "foo.mojom-shared.h"),
            SuggestedChange::new(ChangeKind::Add, "a.cc", "third_party/zlib/zlib.h"),
            SuggestedChange::new(ChangeKind::Add, "a.cc", "c.h"),
            SuggestedChange::new(ChangeKind::Remove, "a.cc", "b.h"),
        ];
        let options = ReconcileOptions {
            filter_third_party: true,
            change_filter: Some(ChangeKind::Add),
            ..Default::default()
        };
        let out = Reconciler::new(&store, &config, &DegreeScorer::default(), &options).reconcile_changes(changes);

        assert_eq!(out.changes.len(), 1);
        assert_eq!(out.changes[0].edge, "c.h");
        assert_eq!(out.stats.filtered, 2);
        assert_eq!(out.stats.ignored, 2);
    }

    #[test]
    fn each_file_is_reconciled_under_its_own_config() {
        let store = chain_store();
        let mut nested = EffectiveConfig::default();
        nested.remove.insert_edge("a.cc", "b.h");
        nested.header_mappings.insert("fwd.h".to_string(), "d.h".to_string());
        let nested = Arc::new(nested);
        let root = Arc::new(EffectiveConfig::default());

        let results = vec![
            FileAnalysis::verdict("a.cc", verdict(&["b.h"], &["fwd.h"])),
            FileAnalysis::verdict("c.h", verdict(&["d.h"], &["fwd.h"])),
            FileAnalysis::failed("e.cc", "timed out"),
        ];
        let mut lookups = Vec::new();
        let out = reconcile_per_file(
            &results,
            &store,
            &DegreeScorer::default(),
            &options(&[Metric::ExpandedSize]),
            |file| -> Result<_, std::convert::Infallible> {
                lookups.push(file.to_string());
                Ok(if file == "a.cc" { nested.clone() } else { root.clone() })
            },
        )
        .unwrap();

        assert_eq!(lookups, vec!["a.cc", "c.h", "e.cc"]);
        let order: Vec<(&str, &str, bool)> = out
            .changes
            .iter()
            .map(|c| (c.file.as_str(), c.edge.as_str(), c.unverified))
            .collect();
        // Unknown weights rank first, then expanded size descending.
        assert_eq!(
            order,
            vec![("c.h", "fwd.h", true), ("a.cc", "d.h", false), ("c.h", "d.h", false)]
        );
        assert_eq!(out.stats.files_total, 3);
        assert_eq!(out.stats.files_analyzed, 2);
        assert_eq!(out.stats.files_failed, 1);
        assert_eq!(out.stats.ignored, 1);
        assert_eq!(out.stats.unverified, 1);
        assert_eq!(out.stats.suggestions, 3);
    }

    #[test]
    fn grouping_follows_config_identity() {
        let shared = Arc::new(EffectiveConfig::default());
        let other = Arc::new(EffectiveConfig::default());
        let groups = group_by_config(
            vec!["x/1.cc", "y/1.cc", "x/2.cc"],
            |path| *path,
            |file| -> Result<_, std::convert::Infallible> {
                Ok(if file.starts_with("x/") { shared.clone() } else { other.clone() })
            },
        )
        .unwrap();

        assert_eq!(groups.len(), 2);
        assert!(Arc::ptr_eq(&groups[0].0, &shared));
        assert_eq!(groups[0].1, vec!["x/1.cc", "x/2.cc"]);
        assert_eq!(groups[1].1, vec!["y/1.cc"]);
    }
}
