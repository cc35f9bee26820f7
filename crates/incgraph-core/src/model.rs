//! Core data structures for the include graph

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};

/// Stable identifier for a file within one loaded snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct FileId(pub u32);

impl FileId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Stable identifier for an edge within one loaded snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct EdgeId(pub u32);

/// One compiled or included file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileNode {
    /// Canonical, codebase-root-relative path.
    pub path: String,
    /// Bytes contributed when compiled alone.
    pub size: u64,
    /// Size of the file with all of its transitive includes expanded.
    pub expanded_size: u64,
    /// Bytes this file adds to the translation units that pull it in.
    pub added_size: u64,
    /// Number of translation units which transitively include this file.
    pub prevalence: u64,
    /// Whether this file is a translation unit (a root of the graph).
    pub is_root: bool,
    /// Parses without requiring a specific includer context.
    pub self_contained: bool,
}

/// Structural importance of an edge. Totally ordered so rankings are stable.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Centrality(pub f64);

impl Centrality {
    pub fn value(self) -> f64 {
        self.0
    }
}

impl PartialEq for Centrality {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Centrality {}

impl PartialOrd for Centrality {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Centrality {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// A directed includer -> included relation, aggregated across the codebase.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IncludeEdge {
    pub includer: FileId,
    pub included: FileId,
    /// Bytes added to every translation unit that pulls this edge in.
    pub added_size: u64,
    /// Bytes the edge's subtree contributes when fully expanded.
    pub expanded_size: u64,
    /// Percentage (0-100) of translation units that transitively include this edge.
    pub prevalence: f64,
    /// Standalone size of the includer.
    pub includer_size: u64,
    pub centrality: Centrality,
}

/// Revision metadata and path-resolution hints carried by a snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SnapshotMeta {
    pub revision: Option<String>,
    pub date: Option<String>,
    pub sysroot: Option<String>,
    pub sysroot_platform: Option<String>,
    pub gen_prefix: Option<String>,
}

/// Counts of records dropped while loading a snapshot.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoadStats {
    pub files: usize,
    pub edges: usize,
    pub skipped_files: usize,
    pub skipped_edges: usize,
    pub skipped_roots: usize,
}

impl LoadStats {
    pub fn skipped(&self) -> usize {
        self.skipped_files + self.skipped_edges + self.skipped_roots
    }
}

/// Whether a suggestion adds or removes an include.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Add,
    Remove,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Add => "add",
            ChangeKind::Remove => "remove",
        }
    }
}

impl FromStr for ChangeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(ChangeKind::Add),
            "remove" => Ok(ChangeKind::Remove),
            other => Err(format!("unknown change kind: {other}")),
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weight columns a caller can attach to suggestions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    AddedSize,
    ExpandedSize,
    Prevalence,
    IncluderSize,
    Centrality,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::AddedSize,
        Metric::ExpandedSize,
        Metric::Prevalence,
        Metric::IncluderSize,
        Metric::Centrality,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::AddedSize => "added_size",
            Metric::ExpandedSize => "expanded_size",
            Metric::Prevalence => "prevalence",
            Metric::IncluderSize => "includer_size",
            Metric::Centrality => "centrality",
        }
    }

    /// Read this metric off an edge present in the graph.
    pub fn of_edge(self, edge: &IncludeEdge) -> MetricValue {
        match self {
            Metric::AddedSize => MetricValue::Size(edge.added_size),
            Metric::ExpandedSize => MetricValue::Size(edge.expanded_size),
            Metric::Prevalence => MetricValue::Percent(edge.prevalence),
            Metric::IncluderSize => MetricValue::Size(edge.includer_size),
            Metric::Centrality => MetricValue::Score(edge.centrality.value()),
        }
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown metric: {s}"))
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A metric reading. `Unknown` is never conflated with zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Size(u64),
    Percent(f64),
    Score(f64),
    Unknown,
}

impl MetricValue {
    pub fn is_unknown(self) -> bool {
        matches!(self, MetricValue::Unknown)
    }

    fn as_f64(self) -> Option<f64> {
        match self {
            MetricValue::Size(v) => Some(v as f64),
            MetricValue::Percent(v) | MetricValue::Score(v) => Some(v),
            MetricValue::Unknown => None,
        }
    }

    /// Ranking order, ascending. Unknown sorts above every known value.
    pub fn rank_cmp(self, other: Self) -> Ordering {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
        }
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Size(v) => write!(f, "{v}"),
            MetricValue::Percent(v) => write!(f, "{v:.2}"),
            MetricValue::Score(v) => write!(f, "{v:.4}"),
            MetricValue::Unknown => f.write_str("unknown"),
        }
    }
}

impl Serialize for MetricValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MetricValue::Size(v) => serializer.serialize_u64(*v),
            MetricValue::Percent(v) | MetricValue::Score(v) => serializer.serialize_f64(*v),
            MetricValue::Unknown => serializer.serialize_str("unknown"),
        }
    }
}

/// One proposed include change with its requested weight columns.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SuggestedChange {
    pub kind: ChangeKind,
    pub file: String,
    /// Header as it should be spelled in the include directive.
    pub edge: String,
    /// Line of the include directive, when the oracle reported one.
    pub line: Option<u32>,
    /// Set when the header could not be matched to a file in the graph.
    pub unverified: bool,
    pub metrics: Vec<(Metric, MetricValue)>,
}

impl SuggestedChange {
    pub fn new(kind: ChangeKind, file: impl Into<String>, edge: impl Into<String>) -> Self {
        SuggestedChange {
            kind,
            file: file.into(),
            edge: edge.into(),
            line: None,
            unverified: false,
            metrics: Vec::new(),
        }
    }

    pub fn metric(&self, metric: Metric) -> Option<MetricValue> {
        self.metrics
            .iter()
            .find(|(m, _)| *m == metric)
            .map(|(_, value)| *value)
    }
}
