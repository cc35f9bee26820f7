//! Traversals over a loaded include graph
//!
//! Every function here is a pure read of the [`GraphStore`]. Hypothetical
//! include changes are expressed as an [`EdgeOverlay`] that traversals consult
//! instead of mutating the graph, so one loaded snapshot can serve any number
//! of concurrent queries.

use crate::error::TraceError;
use crate::graph::GraphStore;
use crate::model::*;
use crate::normalize::HeaderResolver;
use rayon::prelude::*;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// Scratch set of edge removals and additions applied during traversal.
#[derive(Debug, Clone, Default)]
pub struct EdgeOverlay {
    removed: HashSet<(FileId, FileId)>,
    added: HashMap<FileId, Vec<FileId>>,
    added_reverse: HashMap<FileId, Vec<FileId>>,
    unresolved: usize,
}

impl EdgeOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn remove_edge(&mut self, includer: FileId, included: FileId) {
        self.removed.insert((includer, included));
    }

    pub fn add_edge(&mut self, includer: FileId, included: FileId) {
        self.removed.remove(&(includer, included));
        self.added.entry(includer).or_default().push(included);
        self.added_reverse.entry(included).or_default().push(includer);
    }

    /// Build an overlay from suggested changes, resolving header spellings
    /// against the store. Changes naming unknown files are counted, not applied.
    pub fn from_changes(
        store: &GraphStore,
        changes: &[SuggestedChange],
        include_dirs: &[String],
        remove_only: bool,
    ) -> Self {
        let resolver = HeaderResolver::new(store);
        let mut overlay = EdgeOverlay::new();

        for change in changes {
            if remove_only && change.kind == ChangeKind::Add {
                continue;
            }
            let includer = store.file_id(&change.file);
            let included = includer.and_then(|_| resolver.resolve(&change.file, &change.edge, include_dirs));
            let (Some(includer), Some(included)) = (includer, included) else {
                tracing::debug!("Change {} {} {} does not resolve", change.kind, change.file, change.edge);
                overlay.unresolved += 1;
                continue;
            };
            match change.kind {
                ChangeKind::Remove => overlay.remove_edge(includer, included),
                ChangeKind::Add => overlay.add_edge(includer, included),
            }
        }
        overlay
    }

    /// Overlay removing each `(includer, included)` pair. Pairs that are not
    /// graph edges are logged and counted as unresolved.
    pub fn removing_pairs(store: &GraphStore, pairs: &[(String, String)]) -> Self {
        let mut overlay = EdgeOverlay::new();
        for (includer, included) in pairs {
            match store.file_id(includer).zip(store.file_id(included)) {
                Some((from, to)) if store.edge_id(from, to).is_some() => overlay.remove_edge(from, to),
                Some(_) => {
                    tracing::warn!("Skip edge {} -> {} not found in include graph", includer, included);
                    overlay.unresolved += 1;
                }
                None => {
                    tracing::warn!("Skip edge {} -> {} names an unknown file", includer, included);
                    overlay.unresolved += 1;
                }
            }
        }
        overlay
    }

    pub fn is_removed(&self, includer: FileId, included: FileId) -> bool {
        self.removed.contains(&(includer, included))
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }

    /// Changes that named files absent from the graph.
    pub fn unresolved(&self) -> usize {
        self.unresolved
    }

    fn added_from(&self, id: FileId) -> &[FileId] {
        self.added.get(&id).map_or(&[], Vec::as_slice)
    }

    fn added_to(&self, id: FileId) -> &[FileId] {
        self.added_reverse.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Files `id` includes with the overlay applied.
    pub fn successors<'a>(&'a self, store: &'a GraphStore, id: FileId) -> impl Iterator<Item = FileId> + 'a {
        store
            .edges_from_id(id)
            .map(|edge| edge.included)
            .filter(move |&included| !self.is_removed(id, included))
            .chain(self.added_from(id).iter().copied())
    }

    /// Files including `id` with the overlay applied.
    pub fn predecessors<'a>(&'a self, store: &'a GraphStore, id: FileId) -> impl Iterator<Item = FileId> + 'a {
        store
            .edges_to_id(id)
            .map(|edge| edge.includer)
            .filter(move |&includer| !self.is_removed(includer, id))
            .chain(self.added_to(id).iter().copied())
    }
}

/// How a file entered a closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    /// One edge away from the start.
    Direct,
    /// Reachable only through other files.
    Transitive,
}

/// Result of a closure query. The start file is a member only when an
/// include cycle leads back to it.
#[derive(Debug, Clone, Default)]
pub struct Reachable {
    members: HashMap<FileId, Membership>,
}

impl Reachable {
    pub fn contains(&self, id: FileId) -> bool {
        self.members.contains_key(&id)
    }

    pub fn membership(&self, id: FileId) -> Option<Membership> {
        self.members.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = FileId> + '_ {
        self.members.keys().copied()
    }

    pub fn direct(&self) -> impl Iterator<Item = FileId> + '_ {
        self.members
            .iter()
            .filter(|(_, m)| **m == Membership::Direct)
            .map(|(&id, _)| id)
    }

    pub fn transitive_only(&self) -> impl Iterator<Item = FileId> + '_ {
        self.members
            .iter()
            .filter(|(_, m)| **m == Membership::Transitive)
            .map(|(&id, _)| id)
    }

    /// Member paths with their membership, sorted by path.
    pub fn sorted<'a>(&self, store: &'a GraphStore) -> Vec<(&'a str, Membership)> {
        let mut entries: Vec<(&str, Membership)> = self
            .members
            .iter()
            .map(|(&id, &m)| (store.path(id), m))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }
}

pub(crate) fn closure<F, I>(start: FileId, mut next: F) -> Reachable
where
    F: FnMut(FileId) -> I,
    I: Iterator<Item = FileId>,
{
    let mut members = HashMap::new();
    let mut queue = VecDeque::new();

    let mut visit = |id: FileId, membership: Membership, queue: &mut VecDeque<FileId>| {
        if let Entry::Vacant(slot) = members.entry(id) {
            slot.insert(membership);
            // The start's own successors are already being expanded.
            if id != start {
                queue.push_back(id);
            }
        }
    };
    for id in next(start) {
        visit(id, Membership::Direct, &mut queue);
    }
    while let Some(current) = queue.pop_front() {
        for id in next(current) {
            visit(id, Membership::Transitive, &mut queue);
        }
    }
    Reachable { members }
}

pub(crate) fn require(store: &GraphStore, path: &str) -> Result<FileId, TraceError> {
    store
        .file_id(path)
        .ok_or_else(|| TraceError::UnknownFile(path.to_string()))
}

/// Everything `start` transitively includes.
pub fn transitive_includes(store: &GraphStore, start: &str) -> Result<Reachable, TraceError> {
    transitive_includes_with(store, start, &EdgeOverlay::default())
}

pub fn transitive_includes_with(
    store: &GraphStore,
    start: &str,
    overlay: &EdgeOverlay,
) -> Result<Reachable, TraceError> {
    let start = require(store, start)?;
    Ok(closure(start, |id| overlay.successors(store, id)))
}

/// Everything that transitively includes `target`.
pub fn transitive_includers(store: &GraphStore, target: &str) -> Result<Reachable, TraceError> {
    transitive_includers_with(store, target, &EdgeOverlay::default())
}

pub fn transitive_includers_with(
    store: &GraphStore,
    target: &str,
    overlay: &EdgeOverlay,
) -> Result<Reachable, TraceError> {
    let target = require(store, target)?;
    Ok(closure(target, |id| overlay.predecessors(store, id)))
}

/// Every graph edge in the subgraph reachable from `start`, including its own
/// outgoing edges.
pub fn transitive_edges<'a>(
    store: &'a GraphStore,
    start: &str,
    overlay: &EdgeOverlay,
) -> Result<Vec<&'a IncludeEdge>, TraceError> {
    let start_id = require(store, start)?;
    let reachable = closure(start_id, |id| overlay.successors(store, id));

    let mut edges: Vec<&IncludeEdge> = std::iter::once(start_id)
        .chain(reachable.ids().filter(|&id| id != start_id))
        .flat_map(|id| store.edges_from_id(id))
        .filter(|edge| !overlay.is_removed(edge.includer, edge.included))
        .collect();
    edges.sort_by(|a, b| {
        store
            .path(a.includer)
            .cmp(store.path(b.includer))
            .then_with(|| store.path(a.included).cmp(store.path(b.included)))
    });
    Ok(edges)
}

/// Shortest includer chain from `start` to `target`, both ends included.
///
/// Agrees with [`transitive_includes`]: a file reaches itself only through an
/// include cycle, in which case the chain starts and ends with it.
pub fn trace<'a>(store: &'a GraphStore, start: &str, target: &str) -> Result<Vec<&'a FileNode>, TraceError> {
    let start_id = require(store, start)?;
    let target_id = require(store, target)?;
    let overlay = EdgeOverlay::default();

    let mut parents: HashMap<FileId, FileId> = HashMap::new();
    let mut visited: HashSet<FileId> = HashSet::from([start_id]);
    let mut queue = VecDeque::from([start_id]);

    // Includer of `target` on the shortest chain.
    let mut last = None;
    'search: while let Some(current) = queue.pop_front() {
        // Deterministic order so equal-length chains resolve the same way every run.
        let mut next: Vec<FileId> = overlay.successors(store, current).collect();
        next.sort_by(|a, b| store.path(*a).cmp(store.path(*b)));
        for id in next {
            if id == target_id {
                last = Some(current);
                break 'search;
            }
            if visited.insert(id) {
                parents.insert(id, current);
                queue.push_back(id);
            }
        }
    }

    let Some(mut current) = last else {
        return Err(TraceError::NotFound {
            start: start.to_string(),
            target: target.to_string(),
        });
    };

    let mut chain = vec![target_id, current];
    while current != start_id {
        let Some(&parent) = parents.get(&current) else { break };
        chain.push(parent);
        current = parent;
    }
    chain.reverse();
    Ok(chain.into_iter().filter_map(|id| store.file(id)).collect())
}

/// Number of translation units that still transitively include `target`.
pub fn reachable_roots(store: &GraphStore, target: &str, overlay: &EdgeOverlay) -> Result<usize, TraceError> {
    let target_id = require(store, target)?;
    let includers = closure(target_id, |id| overlay.predecessors(store, id));
    let is_root = |id: FileId| store.file(id).is_some_and(|f| f.is_root);
    let others = includers
        .ids()
        .filter(|&id| id != target_id && is_root(id))
        .count();
    Ok(others + usize::from(is_root(target_id)))
}

/// Recorded and recomputed expanded size of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeChange {
    pub previous: u64,
    pub current: u64,
}

impl SizeChange {
    pub fn delta(&self) -> i64 {
        self.current as i64 - self.previous as i64
    }
}

/// Expanded size of `id` with the overlay applied: its own size plus the
/// standalone sizes of everything it still reaches. Never exceeds the
/// recorded expanded size.
pub fn recalculate_expanded_size(store: &GraphStore, id: FileId, overlay: &EdgeOverlay) -> Option<SizeChange> {
    let file = store.file(id)?;
    let reachable = closure(id, |current| overlay.successors(store, current));
    let mut current = file.size
        + reachable
            .ids()
            .filter(|&member| member != id)
            .filter_map(|member| store.file(member))
            .map(|member| member.size)
            .sum::<u64>();

    if current > file.expanded_size {
        tracing::warn!(
            "{} unexpectedly increased in size from {} to {}, keeping the recorded size",
            file.path,
            file.expanded_size,
            current
        );
        current = file.expanded_size;
    }
    Some(SizeChange {
        previous: file.expanded_size,
        current,
    })
}

/// Recomputed sizes for a batch of files.
#[derive(Debug, Clone, Default)]
pub struct RecalculatedSizes {
    pub files: BTreeMap<String, SizeChange>,
    /// Changes that could not be applied because a path did not resolve.
    pub unresolved_changes: usize,
}

impl RecalculatedSizes {
    /// New expanded size of an edge, which is the recomputed size of its
    /// included file when that file was part of the batch.
    pub fn edge_expanded_size(&self, included: &str) -> Option<u64> {
        self.files.get(included).map(|size| size.current)
    }

    pub fn total_previous(&self) -> u64 {
        self.files.values().map(|s| s.previous).sum()
    }

    pub fn total_current(&self) -> u64 {
        self.files.values().map(|s| s.current).sum()
    }
}

/// Recompute expanded sizes after applying `changes`, in parallel over
/// `files` (all roots when `None`).
pub fn recalculate_expanded_sizes(
    store: &GraphStore,
    changes: &[SuggestedChange],
    files: Option<&[FileId]>,
    include_dirs: &[String],
    remove_only: bool,
) -> RecalculatedSizes {
    let overlay = EdgeOverlay::from_changes(store, changes, include_dirs, remove_only);
    let targets = files.unwrap_or_else(|| store.roots());

    let files: BTreeMap<String, SizeChange> = targets
        .par_iter()
        .filter_map(|&id| {
            recalculate_expanded_size(store, id, &overlay).map(|size| (store.path(id).to_string(), size))
        })
        .collect();

    tracing::info!(
        "Recalculated expanded sizes for {} files ({} unresolved changes)",
        files.len(),
        overlay.unresolved()
    );
    RecalculatedSizes {
        files,
        unresolved_changes: overlay.unresolved(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{chain_store, cyclic_store, end_to_end_store};

    fn paths(store: &GraphStore, reachable: &Reachable) -> Vec<String> {
        reachable
            .sorted(store)
            .into_iter()
            .map(|(path, _)| path.to_string())
            .collect()
    }

    #[test]
    fn closure_distinguishes_direct_members() {
        let store = chain_store();
        let includes = transitive_includes(&store, "a.cc").unwrap();
        assert_eq!(paths(&store, &includes), vec!["b.h", "c.h", "d.h"]);

        let b = store.file_id("b.h").unwrap();
        let d = store.file_id("d.h").unwrap();
        assert_eq!(includes.membership(b), Some(Membership::Direct));
        assert_eq!(includes.membership(d), Some(Membership::Transitive));
        assert_eq!(includes.direct().count(), 1);
        assert_eq!(includes.transitive_only().count(), 2);

        let includers = transitive_includers(&store, "d.h").unwrap();
        assert_eq!(paths(&store, &includers), vec!["a.cc", "b.h", "c.h", "e.cc"]);
    }

    #[test]
    fn closure_is_idempotent_and_monotonic() {
        let store = chain_store();
        let first = paths(&store, &transitive_includes(&store, "e.cc").unwrap());
        let second = paths(&store, &transitive_includes(&store, "e.cc").unwrap());
        assert_eq!(first, second);

        let mut overlay = EdgeOverlay::new();
        overlay.add_edge(store.file_id("e.cc").unwrap(), store.file_id("b.h").unwrap());
        let grown = transitive_includes_with(&store, "e.cc", &overlay).unwrap();
        for path in &first {
            assert!(grown.contains(store.file_id(path).unwrap()));
        }
        assert!(grown.len() > first.len());
    }

    #[test]
    fn trace_returns_shortest_chain() {
        let store = chain_store();
        let chain: Vec<&str> = trace(&store, "a.cc", "d.h")
            .unwrap()
            .into_iter()
            .map(|f| f.path.as_str())
            .collect();
        assert_eq!(chain, vec!["a.cc", "b.h", "c.h", "d.h"]);

        // No cycle through b.h, so it does not reach itself.
        assert!(matches!(trace(&store, "b.h", "b.h"), Err(TraceError::NotFound { .. })));
    }

    #[test]
    fn trace_reports_missing_paths() {
        let store = chain_store();
        assert_eq!(
            trace(&store, "d.h", "a.cc"),
            Err(TraceError::NotFound {
                start: "d.h".to_string(),
                target: "a.cc".to_string()
            })
        );
        assert_eq!(
            trace(&store, "nope.h", "a.cc"),
            Err(TraceError::UnknownFile("nope.h".to_string()))
        );
    }

    #[test]
    fn cycles_terminate() {
        let store = cyclic_store();
        let includes = transitive_includes(&store, "x.h").unwrap();
        assert_eq!(paths(&store, &includes), vec!["x.h", "y.h", "z.h"]);
        let x = store.file_id("x.h").unwrap();
        assert_eq!(includes.membership(x), Some(Membership::Transitive));

        let cycle: Vec<&str> = trace(&store, "x.h", "x.h").unwrap().iter().map(|f| f.path.as_str()).collect();
        assert_eq!(cycle, vec!["x.h", "y.h", "z.h", "x.h"]);
        assert!(trace(&store, "x.h", "z.h").is_ok());
        assert!(trace(&store, "z.h", "y.h").is_ok());
        assert!(matches!(trace(&store, "x.h", "w.h"), Err(TraceError::NotFound { .. })));
    }

    #[test]
    fn trace_agrees_with_closure() {
        for store in [chain_store(), cyclic_store()] {
            for start in store.all_files() {
                let includes = transitive_includes(&store, &start.path).unwrap();
                for target in store.all_files() {
                    let id = store.file_id(&target.path).unwrap();
                    let found = trace(&store, &start.path, &target.path).is_ok();
                    assert_eq!(found, includes.contains(id), "{} -> {}", start.path, target.path);
                }
            }
        }
    }

    #[test]
    fn transitive_edges_cover_reachable_subgraph() {
        let store = chain_store();
        let edges: Vec<(&str, &str)> = transitive_edges(&store, "b.h", &EdgeOverlay::default())
            .unwrap()
            .into_iter()
            .map(|e| (store.path(e.includer), store.path(e.included)))
            .collect();
        assert_eq!(edges, vec![("b.h", "c.h"), ("c.h", "d.h")]);
    }

    #[test]
    fn cycles_do_not_double_count() {
        let store = cyclic_store();
        let x = store.file_id("x.h").unwrap();
        let size = recalculate_expanded_size(&store, x, &EdgeOverlay::default()).unwrap();
        // x.h (1) + y.h (2) + z.h (3), x.h counted once
        assert_eq!(size.current, 6);

        let edges = transitive_edges(&store, "x.h", &EdgeOverlay::default()).unwrap();
        assert_eq!(edges.len(), 3);
    }

    #[test]
    fn reachable_roots_respects_overlay() {
        let store = chain_store();
        let none = EdgeOverlay::default();
        assert_eq!(reachable_roots(&store, "d.h", &none).unwrap(), 2);
        assert_eq!(reachable_roots(&store, "a.cc", &none).unwrap(), 1);

        let mut overlay = EdgeOverlay::new();
        overlay.remove_edge(store.file_id("e.cc").unwrap(), store.file_id("d.h").unwrap());
        assert_eq!(reachable_roots(&store, "d.h", &overlay).unwrap(), 1);
    }

    #[test]
    fn removing_an_edge_shrinks_expanded_size() {
        let store = end_to_end_store();
        let includes = transitive_includes(&store, "a.cc").unwrap();
        assert_eq!(paths(&store, &includes), vec!["b.h"]);

        let change = SuggestedChange::new(ChangeKind::Remove, "a.cc", "b.h");
        let sizes = recalculate_expanded_sizes(&store, &[change], None, &[], false);
        assert_eq!(sizes.unresolved_changes, 0);
        assert_eq!(sizes.files["a.cc"], SizeChange { previous: 150, current: 100 });
        assert_eq!(sizes.files["a.cc"].delta(), -50);

        // The store itself is untouched.
        assert!(store.edge("a.cc", "b.h").is_some());
        let unchanged = recalculate_expanded_sizes(&store, &[], None, &[], false);
        assert_eq!(unchanged.files["a.cc"].current, 150);
    }

    #[test]
    fn additions_are_clamped_and_remove_only_skips_them() {
        let store = chain_store();
        let change = SuggestedChange::new(ChangeKind::Add, "d.h", "e.cc");
        let d = store.file_id("d.h").unwrap();

        let sizes = recalculate_expanded_sizes(&store, &[change.clone()], Some(&[d]), &[], false);
        assert_eq!(sizes.files["d.h"].current, sizes.files["d.h"].previous);

        let overlay = EdgeOverlay::from_changes(&store, &[change], &[], true);
        assert!(overlay.is_empty());

        let unknown = SuggestedChange::new(ChangeKind::Remove, "missing.cc", "b.h");
        let sizes = recalculate_expanded_sizes(&store, &[unknown], None, &[], false);
        assert_eq!(sizes.unresolved_changes, 1);
    }

    #[test]
    fn removing_pairs_drops_known_edges_only() {
        let store = chain_store();
        let pairs = vec![
            ("b.h".to_string(), "c.h".to_string()),
            ("a.cc".to_string(), "d.h".to_string()),
            ("a.cc".to_string(), "missing.h".to_string()),
        ];
        let overlay = EdgeOverlay::removing_pairs(&store, &pairs);
        assert_eq!(overlay.unresolved(), 2);
        assert_eq!(reachable_roots(&store, "c.h", &overlay).unwrap(), 0);
        assert_eq!(reachable_roots(&store, "d.h", &overlay).unwrap(), 1);
    }
}
