//! Finding includes worth cutting
//!
//! [`minimum_edge_cut`] answers "which includes separate this file from that
//! header", using unit capacities so the cut counts edges, not bytes.
//! [`edges_to_cut`] looks at the cluster of widely included first-party
//! headers and ranks the edges inside it, once by how prevalent the includer
//! is and once by how many headers only stay in the cluster through that edge.

use crate::algorithms::{closure, require, EdgeOverlay};
use crate::error::TraceError;
use crate::graph::{percentage, GraphStore};
use crate::model::FileId;
use crate::reconcile::is_third_party;
use petgraph::algo::{dominators, ford_fulkerson};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};

/// An include on a cut, with the includer's prevalence percentage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CutEdge {
    pub includer: String,
    pub included: String,
    pub prevalence: f64,
}

#[derive(Debug, Clone, Default)]
pub struct MinCutOptions {
    /// Cut from each file the source includes instead of from the source.
    /// Cuts from every include are merged.
    pub start_from_source_includes: bool,
    /// Drop cut edges whose includer prevalence is below this percentage.
    pub prevalence_threshold: Option<f64>,
}

fn edge_prevalence(store: &GraphStore, includer: FileId, included: FileId) -> f64 {
    match store.edge_by_ids(includer, included) {
        Some(edge) => edge.prevalence,
        None => store
            .file(includer)
            .map_or(0.0, |file| percentage(file.prevalence, store.root_count())),
    }
}

/// Smallest set of includes whose removal leaves no path from `source` to
/// `target`, sorted by includer then included path.
pub fn minimum_edge_cut(
    store: &GraphStore,
    source: &str,
    target: &str,
    overlay: &EdgeOverlay,
    options: &MinCutOptions,
) -> Result<Vec<CutEdge>, TraceError> {
    let source_id = require(store, source)?;
    let target_id = require(store, target)?;

    let sources: Vec<FileId> = if options.start_from_source_includes {
        let mut includes: Vec<FileId> = overlay
            .successors(store, source_id)
            .filter(|&id| id != target_id)
            .collect();
        includes.sort();
        includes.dedup();
        includes
    } else {
        vec![source_id]
    };

    let mut found = false;
    let mut cut: HashSet<(FileId, FileId)> = HashSet::new();
    for start in sources {
        if let Some(edges) = cut_between(store, overlay, start, target_id) {
            found = true;
            cut.extend(edges);
        }
    }
    if !found {
        return Err(TraceError::NotFound {
            start: source.to_string(),
            target: target.to_string(),
        });
    }

    let mut edges: Vec<CutEdge> = cut
        .into_iter()
        .map(|(includer, included)| CutEdge {
            includer: store.path(includer).to_string(),
            included: store.path(included).to_string(),
            prevalence: edge_prevalence(store, includer, included),
        })
        .filter(|edge| {
            options
                .prevalence_threshold
                .is_none_or(|threshold| edge.prevalence >= threshold)
        })
        .collect();
    edges.sort_by(|a, b| a.includer.cmp(&b.includer).then_with(|| a.included.cmp(&b.included)));
    Ok(edges)
}

/// Edges from the source side of a maximum flow to the sink side, or `None`
/// when `target` is unreachable from `source`.
fn cut_between(
    store: &GraphStore,
    overlay: &EdgeOverlay,
    source: FileId,
    target: FileId,
) -> Option<Vec<(FileId, FileId)>> {
    if source == target {
        return None;
    }
    let reachable = closure(source, |id| overlay.successors(store, id));
    if !reachable.contains(target) {
        return None;
    }

    let mut ids: Vec<FileId> = std::iter::once(source)
        .chain(reachable.ids().filter(|&id| id != source))
        .collect();
    ids.sort_by(|a, b| store.path(*a).cmp(store.path(*b)));

    let mut graph: DiGraph<FileId, u64> = DiGraph::with_capacity(ids.len(), 0);
    let index: HashMap<FileId, NodeIndex> = ids.iter().map(|&id| (id, graph.add_node(id))).collect();
    for &id in &ids {
        let mut seen = HashSet::new();
        for next in overlay.successors(store, id) {
            if let (true, Some(&from), Some(&to)) = (seen.insert(next), index.get(&id), index.get(&next)) {
                graph.add_edge(from, to, 1);
            }
        }
    }
    let (Some(&from), Some(&to)) = (index.get(&source), index.get(&target)) else {
        return None;
    };

    let (flow, flows) = ford_fulkerson(&graph, from, to);
    if flow == 0 {
        return None;
    }

    // Residual reachability from the source decides the source side.
    let mut source_side = vec![false; graph.node_count()];
    source_side[from.index()] = true;
    let mut queue = VecDeque::from([from]);
    while let Some(node) = queue.pop_front() {
        for edge in graph.edges_directed(node, Direction::Outgoing) {
            let next = edge.target();
            if flows[edge.id().index()] < *edge.weight() && !source_side[next.index()] {
                source_side[next.index()] = true;
                queue.push_back(next);
            }
        }
        for edge in graph.edges_directed(node, Direction::Incoming) {
            let prev = edge.source();
            if flows[edge.id().index()] > 0 && !source_side[prev.index()] {
                source_side[prev.index()] = true;
                queue.push_back(prev);
            }
        }
    }

    Some(
        graph
            .edge_references()
            .filter(|edge| source_side[edge.source().index()] && !source_side[edge.target().index()])
            .map(|edge| (graph[edge.source()], graph[edge.target()]))
            .collect(),
    )
}

/// Generated, build tooling and third-party files other than Blink are
/// never cut candidates.
pub fn is_cut_candidate(path: &str) -> bool {
    !["out/", "buildtools/", "build/"]
        .iter()
        .any(|prefix| path.starts_with(prefix))
        && !is_third_party(path)
}

#[derive(Debug, Clone)]
pub struct EdgesToCutOptions {
    /// Minimum prevalence percentage for a header to join the cluster.
    pub min_prevalence: f64,
    /// Length of each ranking.
    pub top: usize,
    /// `(includer, included)` pairs left out of the rankings. They still
    /// count as graph edges.
    pub ignores: HashSet<(String, String)>,
}

impl Default for EdgesToCutOptions {
    fn default() -> Self {
        EdgesToCutOptions {
            min_prevalence: 0.0,
            top: 10,
            ignores: HashSet::new(),
        }
    }
}

/// An edge inside the cluster with its two ranking keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CutCandidate {
    pub includer: String,
    pub included: String,
    pub prevalence: f64,
    /// Cluster files that every path from some entry point reaches only
    /// through this edge, summed over entry points.
    pub dominated: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EdgesToCut {
    pub cluster_size: usize,
    /// Cluster files reachable from a root without passing through
    /// another cluster file.
    pub entry_points: Vec<String>,
    pub by_prevalence: Vec<CutCandidate>,
    pub by_dominators: Vec<CutCandidate>,
}

pub fn edges_to_cut(store: &GraphStore, overlay: &EdgeOverlay, options: &EdgesToCutOptions) -> EdgesToCut {
    let root_count = store.root_count();
    let mut cluster: Vec<FileId> = store
        .file_ids()
        .filter(|&id| {
            store.file(id).is_some_and(|file| {
                is_cut_candidate(&file.path) && percentage(file.prevalence, root_count) >= options.min_prevalence
            })
        })
        .collect();
    cluster.sort_by(|a, b| store.path(*a).cmp(store.path(*b)));
    tracing::info!(
        "Cluster size: {} files with >= {:.2}% prevalence",
        cluster.len(),
        options.min_prevalence
    );
    if cluster.is_empty() {
        return EdgesToCut::default();
    }

    let members: HashSet<FileId> = cluster.iter().copied().collect();
    let entry_points = entry_points(store, overlay, &members);
    let mut inner_edges = Vec::new();
    for &includer in &cluster {
        let mut seen = HashSet::new();
        for included in overlay.successors(store, includer) {
            if members.contains(&included) && seen.insert(included) {
                inner_edges.push((includer, included));
            }
        }
    }
    let dominated = dominated_counts(&cluster, &inner_edges, &entry_points);

    let candidates: Vec<CutCandidate> = inner_edges
        .iter()
        .map(|&(includer, included)| CutCandidate {
            includer: store.path(includer).to_string(),
            included: store.path(included).to_string(),
            prevalence: edge_prevalence(store, includer, included),
            dominated: dominated.get(&(includer, included)).copied().unwrap_or(0),
        })
        .filter(|candidate| {
            !options
                .ignores
                .contains(&(candidate.includer.clone(), candidate.included.clone()))
        })
        .collect();

    let by_path = |a: &CutCandidate, b: &CutCandidate| a.includer.cmp(&b.includer).then_with(|| a.included.cmp(&b.included));
    let mut by_prevalence = candidates.clone();
    by_prevalence.sort_by(|a, b| b.prevalence.total_cmp(&a.prevalence).then_with(|| by_path(a, b)));
    by_prevalence.truncate(options.top);
    let mut by_dominators = candidates;
    by_dominators.sort_by(|a, b| b.dominated.cmp(&a.dominated).then_with(|| by_path(a, b)));
    by_dominators.truncate(options.top);

    EdgesToCut {
        cluster_size: cluster.len(),
        entry_points: entry_points.iter().map(|&id| store.path(id).to_string()).collect(),
        by_prevalence,
        by_dominators,
    }
}

/// Cluster files reached from any root by an edge that does not start
/// inside the cluster, sorted by path.
fn entry_points(store: &GraphStore, overlay: &EdgeOverlay, cluster: &HashSet<FileId>) -> Vec<FileId> {
    let mut visited: HashSet<FileId> = store.roots().iter().copied().collect();
    let mut queue: VecDeque<FileId> = store.roots().iter().copied().collect();
    let mut entries = HashSet::new();

    while let Some(current) = queue.pop_front() {
        let inside = cluster.contains(&current);
        for next in overlay.successors(store, current) {
            if inside && cluster.contains(&next) {
                continue;
            }
            if cluster.contains(&next) {
                entries.insert(next);
            }
            if visited.insert(next) {
                queue.push_back(next);
            }
        }
    }

    let mut entries: Vec<FileId> = entries.into_iter().collect();
    entries.sort_by(|a, b| store.path(*a).cmp(store.path(*b)));
    entries
}

/// For every inner edge, how many cluster files it dominates from each
/// entry point. Each edge `a -> b` is split into `a -> (a, b) -> b` so edge
/// dominance becomes node dominance.
fn dominated_counts(
    cluster: &[FileId],
    inner_edges: &[(FileId, FileId)],
    entry_points: &[FileId],
) -> HashMap<(FileId, FileId), u64> {
    let mut graph: DiGraph<Option<(FileId, FileId)>, ()> = DiGraph::new();
    let nodes: HashMap<FileId, NodeIndex> = cluster.iter().map(|&id| (id, graph.add_node(None))).collect();
    for &(includer, included) in inner_edges {
        let (Some(&from), Some(&to)) = (nodes.get(&includer), nodes.get(&included)) else {
            continue;
        };
        let split = graph.add_node(Some((includer, included)));
        graph.add_edge(from, split, ());
        graph.add_edge(split, to, ());
    }

    entry_points
        .par_iter()
        .filter_map(|entry| nodes.get(entry))
        .map(|&root| {
            let doms = dominators::simple_fast(&graph, root);
            let mut counts: HashMap<(FileId, FileId), u64> = HashMap::new();
            for &node in nodes.values() {
                let Some(dominating) = doms.dominators(node) else { continue };
                for dom in dominating {
                    if let Some(edge) = graph[dom] {
                        *counts.entry(edge).or_default() += 1;
                    }
                }
            }
            counts
        })
        .reduce(HashMap::new, |mut total, counts| {
            for (edge, count) in counts {
                *total.entry(edge).or_default() += count;
            }
            total
        })
}
