//! Graph store using petgraph::StableDiGraph keyed by canonical file path

use crate::centrality::{CentralityInputs, CentralityScorer};
use crate::model::*;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::Direction;
use std::collections::{BTreeMap, HashMap};

/// The include graph for one loaded snapshot.
///
/// Built once by the snapshot loader (or the binary cache) and read-only
/// afterwards, so it can be shared across threads behind an `Arc`.
pub struct GraphStore {
    inner: StableDiGraph<FileNode, IncludeEdge>,
    by_path: HashMap<String, NodeIndex>,
    roots: Vec<FileId>,
    meta: SnapshotMeta,
    stats: LoadStats,
    extra: BTreeMap<String, serde_json::Value>,
}

impl std::fmt::Debug for GraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStore")
            .field("revision", &self.meta.revision)
            .field("file_count", &self.inner.node_count())
            .field("edge_count", &self.inner.edge_count())
            .finish()
    }
}

fn node(id: FileId) -> NodeIndex {
    NodeIndex::new(id.index())
}

fn file_id(idx: NodeIndex) -> FileId {
    FileId(idx.index() as u32)
}

impl GraphStore {
    /// Get a file by ID.
    pub fn file(&self, id: FileId) -> Option<&FileNode> {
        self.inner.node_weight(node(id))
    }

    /// Path of a file, or an empty string for an ID from another snapshot.
    pub fn path(&self, id: FileId) -> &str {
        self.file(id).map_or("", |f| f.path.as_str())
    }

    /// Exact-string lookup on the canonical path.
    pub fn file_id(&self, path: &str) -> Option<FileId> {
        self.by_path.get(path).map(|&idx| file_id(idx))
    }

    pub fn file_by_path(&self, path: &str) -> Option<&FileNode> {
        self.by_path.get(path).and_then(|&idx| self.inner.node_weight(idx))
    }

    pub fn contains(&self, path: &str) -> bool {
        self.by_path.contains_key(path)
    }

    /// Total number of files.
    pub fn file_count(&self) -> usize {
        self.inner.node_count()
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.inner.edge_count()
    }

    /// Iterate over all files in load order.
    pub fn all_files(&self) -> impl Iterator<Item = &FileNode> {
        self.inner
            .node_indices()
            .filter_map(move |idx| self.inner.node_weight(idx))
    }

    pub fn file_ids(&self) -> impl Iterator<Item = FileId> + '_ {
        self.inner.node_indices().map(file_id)
    }

    /// Iterate over all edges.
    pub fn all_edges(&self) -> impl Iterator<Item = &IncludeEdge> {
        self.inner
            .edge_indices()
            .filter_map(move |idx| self.inner.edge_weight(idx))
    }

    /// Outgoing edges of a file.
    pub fn edges_from_id(&self, id: FileId) -> impl Iterator<Item = &IncludeEdge> {
        self.inner
            .edges_directed(node(id), Direction::Outgoing)
            .map(|edge_ref| edge_ref.weight())
    }

    /// Incoming edges of a file.
    pub fn edges_to_id(&self, id: FileId) -> impl Iterator<Item = &IncludeEdge> {
        self.inner
            .edges_directed(node(id), Direction::Incoming)
            .map(|edge_ref| edge_ref.weight())
    }

    /// Outgoing edges by path. Unknown paths yield nothing.
    pub fn edges_from<'a>(&'a self, path: &str) -> impl Iterator<Item = &'a IncludeEdge> + use<'a> {
        self.file_id(path)
            .into_iter()
            .flat_map(move |id| self.edges_from_id(id))
    }

    /// Incoming edges by path. Unknown paths yield nothing.
    pub fn edges_to<'a>(&'a self, path: &str) -> impl Iterator<Item = &'a IncludeEdge> + use<'a> {
        self.file_id(path)
            .into_iter()
            .flat_map(move |id| self.edges_to_id(id))
    }

    pub fn edge_id(&self, includer: FileId, included: FileId) -> Option<EdgeId> {
        self.inner
            .find_edge(node(includer), node(included))
            .map(|idx| EdgeId(idx.index() as u32))
    }

    pub fn edge_by_ids(&self, includer: FileId, included: FileId) -> Option<&IncludeEdge> {
        self.inner
            .find_edge(node(includer), node(included))
            .and_then(|idx| self.inner.edge_weight(idx))
    }

    /// Look up the edge between two canonical paths.
    pub fn edge(&self, includer: &str, included: &str) -> Option<&IncludeEdge> {
        let includer = self.file_id(includer)?;
        let included = self.file_id(included)?;
        self.edge_by_ids(includer, included)
    }

    pub fn edge_by_id(&self, id: EdgeId) -> Option<&IncludeEdge> {
        self.inner.edge_weight(EdgeIndex::new(id.0 as usize))
    }

    pub fn fan_in(&self, id: FileId) -> usize {
        self.inner.edges_directed(node(id), Direction::Incoming).count()
    }

    pub fn fan_out(&self, id: FileId) -> usize {
        self.inner.edges_directed(node(id), Direction::Outgoing).count()
    }

    /// Translation units of the snapshot.
    pub fn roots(&self) -> &[FileId] {
        &self.roots
    }

    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    pub fn meta(&self) -> &SnapshotMeta {
        &self.meta
    }

    pub fn load_stats(&self) -> LoadStats {
        self.stats
    }

    /// Loaders that rebuild from an already-normalized source keep the original counts.
    pub(crate) fn restore_load_stats(&mut self, stats: LoadStats) {
        self.stats = stats;
    }

    /// Unrecognized top-level snapshot keys, passed through untouched.
    pub fn extra(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.extra
    }

    /// Scoring inputs for a (possibly hypothetical) edge between two files.
    pub fn centrality_inputs(&self, includer: FileId, included: FileId, prevalence: f64) -> CentralityInputs {
        CentralityInputs {
            prevalence,
            includer_fan_in: self.fan_in(includer),
            includer_fan_out: self.fan_out(includer),
            included_fan_in: self.fan_in(included),
            included_fan_out: self.fan_out(included),
            file_count: self.file_count(),
        }
    }

    /// Recompute centrality for every edge in one pass over the edge list.
    pub fn apply_centrality(&mut self, scorer: &dyn CentralityScorer) {
        let file_count = self.inner.node_count();
        let mut fan_in: HashMap<NodeIndex, usize> = HashMap::with_capacity(file_count);
        let mut fan_out: HashMap<NodeIndex, usize> = HashMap::with_capacity(file_count);

        for idx in self.inner.edge_indices() {
            if let Some((source, target)) = self.inner.edge_endpoints(idx) {
                *fan_out.entry(source).or_insert(0) += 1;
                *fan_in.entry(target).or_insert(0) += 1;
            }
        }

        let indices: Vec<EdgeIndex> = self.inner.edge_indices().collect();
        for idx in indices {
            let Some((source, target)) = self.inner.edge_endpoints(idx) else {
                continue;
            };
            let Some(edge) = self.inner.edge_weight_mut(idx) else {
                continue;
            };
            let inputs = CentralityInputs {
                prevalence: edge.prevalence,
                includer_fan_in: fan_in.get(&source).copied().unwrap_or(0),
                includer_fan_out: fan_out.get(&source).copied().unwrap_or(0),
                included_fan_in: fan_in.get(&target).copied().unwrap_or(0),
                included_fan_out: fan_out.get(&target).copied().unwrap_or(0),
                file_count,
            };
            edge.centrality = Centrality(scorer.score(&inputs));
        }

        tracing::debug!(
            "Scored {} edges with the {} centrality scorer",
            self.inner.edge_count(),
            scorer.name()
        );
    }

    /// Edges ordered by descending centrality, ties broken by path.
    pub fn ranked_by_centrality(&self) -> Vec<&IncludeEdge> {
        let mut edges: Vec<&IncludeEdge> = self.all_edges().collect();
        edges.sort_by(|a, b| {
            b.centrality
                .cmp(&a.centrality)
                .then_with(|| self.path(a.includer).cmp(self.path(b.includer)))
                .then_with(|| self.path(a.included).cmp(self.path(b.included)))
        });
        edges
    }

    /// Edge counts and the files most often included directly by roots.
    pub fn stats(&self, top: usize) -> GraphStats {
        let mut edges_from_roots = 0;
        let mut root_includes: HashMap<FileId, usize> = HashMap::new();

        for &root in &self.roots {
            for edge in self.edges_from_id(root) {
                edges_from_roots += 1;
                *root_includes.entry(edge.included).or_insert(0) += 1;
            }
        }

        let root_count = self.root_count();
        let mut top_included: Vec<TopIncluded> = root_includes
            .into_iter()
            .map(|(id, count)| TopIncluded {
                path: self.path(id).to_string(),
                direct_includers: count,
                prevalence: percentage(count as u64, root_count),
            })
            .collect();
        top_included.sort_by(|a, b| {
            b.direct_includers
                .cmp(&a.direct_includers)
                .then_with(|| a.path.cmp(&b.path))
        });
        top_included.truncate(top);

        GraphStats {
            files: self.file_count(),
            roots: root_count,
            edges: self.edge_count(),
            edges_from_roots,
            edges_from_headers: self.edge_count() - edges_from_roots,
            top_included,
        }
    }
}

/// `100 * count / total`, or zero for an empty total.
pub fn percentage(count: u64, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (100.0 * count as f64) / total as f64
    }
}

/// Summary counts over a loaded graph.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphStats {
    pub files: usize,
    pub roots: usize,
    pub edges: usize,
    pub edges_from_roots: usize,
    pub edges_from_headers: usize,
    pub top_included: Vec<TopIncluded>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopIncluded {
    pub path: String,
    pub direct_includers: usize,
    pub prevalence: f64,
}

/// Incrementally assembles a [`GraphStore`]. Only loaders use this.
#[derive(Default)]
pub struct GraphStoreBuilder {
    inner: StableDiGraph<FileNode, IncludeEdge>,
    by_path: HashMap<String, NodeIndex>,
    roots: Vec<FileId>,
    meta: SnapshotMeta,
    stats: LoadStats,
    extra: BTreeMap<String, serde_json::Value>,
}

impl GraphStoreBuilder {
    pub fn new(meta: SnapshotMeta) -> Self {
        GraphStoreBuilder {
            meta,
            ..Default::default()
        }
    }

    /// Add a file. Returns `None` (and counts a skip) for empty or duplicate paths.
    ///
    /// Root membership is only granted through [`mark_root`](Self::mark_root).
    pub fn add_file(&mut self, mut file: FileNode) -> Option<FileId> {
        if file.path.is_empty() || self.by_path.contains_key(&file.path) {
            tracing::debug!("Skipping file record with empty or duplicate path: {:?}", file.path);
            self.stats.skipped_files += 1;
            return None;
        }
        file.is_root = false;
        let path = file.path.clone();
        let idx = self.inner.add_node(file);
        self.by_path.insert(path, idx);
        self.stats.files += 1;
        Some(file_id(idx))
    }

    pub fn file_mut(&mut self, id: FileId) -> Option<&mut FileNode> {
        self.inner.node_weight_mut(node(id))
    }

    /// Returns whether `id` became a root; repeats and unknown IDs do not.
    pub fn mark_root(&mut self, id: FileId) -> bool {
        match self.inner.node_weight_mut(node(id)) {
            Some(file) if !file.is_root => {
                file.is_root = true;
                self.roots.push(id);
                true
            }
            _ => false,
        }
    }

    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Add an edge. Self-includes and duplicates are skipped and counted.
    pub fn add_edge(&mut self, edge: IncludeEdge) -> Option<EdgeId> {
        let (source, target) = (node(edge.includer), node(edge.included));
        let endpoints_known =
            self.inner.contains_node(source) && self.inner.contains_node(target);
        if !endpoints_known || source == target || self.inner.find_edge(source, target).is_some() {
            self.stats.skipped_edges += 1;
            return None;
        }
        let idx = self.inner.add_edge(source, target, edge);
        self.stats.edges += 1;
        Some(EdgeId(idx.index() as u32))
    }

    pub fn skip_edge(&mut self) {
        self.stats.skipped_edges += 1;
    }

    pub fn skip_file(&mut self) {
        self.stats.skipped_files += 1;
    }

    pub fn skip_root(&mut self) {
        self.stats.skipped_roots += 1;
    }

    pub fn set_extra(&mut self, extra: BTreeMap<String, serde_json::Value>) {
        self.extra = extra;
    }

    /// Freeze the graph, scoring every edge once.
    pub fn finish(self, scorer: &dyn CentralityScorer) -> GraphStore {
        let mut store = GraphStore {
            inner: self.inner,
            by_path: self.by_path,
            roots: self.roots,
            meta: self.meta,
            stats: self.stats,
            extra: self.extra,
        };
        store.apply_centrality(scorer);
        store
    }
}
