//! Binary cache for normalized snapshots
//!
//! Parsing a full include analysis takes far longer than a batch run wants to
//! spend on startup, so the normalized store can be written once with bincode
//! and reloaded on subsequent runs. The pass-through `extra` bucket is not
//! cached.

use crate::centrality::CentralityScorer;
use crate::error::CacheError;
use crate::graph::{GraphStore, GraphStoreBuilder};
use crate::model::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Bumped whenever the cached layout changes.
pub const CACHE_FORMAT_VERSION: u32 = 1;

/// Conventional extension for cache files.
pub const CACHE_EXTENSION: &str = "bin";

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    format_version: u32,
    created_at: String,
    meta: SnapshotMeta,
    files: Vec<FileNode>,
    /// Endpoints are indices into `files`.
    edges: Vec<IncludeEdge>,
    roots: Vec<u32>,
    stats: LoadStats,
}

/// Summary of a cache file without rebuilding the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheInfo {
    pub format_version: u32,
    pub created_at: String,
    pub revision: Option<String>,
    pub files: usize,
    pub edges: usize,
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> CacheError + '_ {
    move |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Write `store` to `path`.
pub fn save_cache(store: &GraphStore, path: &Path) -> Result<(), CacheError> {
    // Compact IDs so the cache does not depend on graph index layout.
    let ids: Vec<FileId> = store.file_ids().collect();
    let mut remap = std::collections::HashMap::with_capacity(ids.len());
    for (compact, &id) in ids.iter().enumerate() {
        remap.insert(id, FileId(compact as u32));
    }

    let files: Vec<FileNode> = ids.iter().filter_map(|&id| store.file(id).cloned()).collect();
    let edges: Vec<IncludeEdge> = store
        .all_edges()
        .filter_map(|edge| {
            let includer = *remap.get(&edge.includer)?;
            let included = *remap.get(&edge.included)?;
            Some(IncludeEdge {
                includer,
                included,
                ..edge.clone()
            })
        })
        .collect();
    let roots: Vec<u32> = store
        .roots()
        .iter()
        .filter_map(|root| remap.get(root).map(|id| id.0))
        .collect();

    let cache = CacheFile {
        format_version: CACHE_FORMAT_VERSION,
        created_at: chrono::Utc::now().to_rfc3339(),
        meta: store.meta().clone(),
        files,
        edges,
        roots,
        stats: store.load_stats(),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_error(path))?;
    }
    let mut writer = BufWriter::new(File::create(path).map_err(io_error(path))?);
    bincode::serialize_into(&mut writer, &cache)?;
    writer.flush().map_err(io_error(path))?;

    tracing::info!(
        "Wrote snapshot cache {} ({} files, {} edges)",
        path.display(),
        cache.files.len(),
        cache.edges.len()
    );
    Ok(())
}

fn read_cache(path: &Path) -> Result<CacheFile, CacheError> {
    let reader = BufReader::new(File::open(path).map_err(io_error(path))?);
    let cache: CacheFile = bincode::deserialize_from(reader)?;
    if cache.format_version != CACHE_FORMAT_VERSION {
        return Err(CacheError::Version {
            found: cache.format_version,
            expected: CACHE_FORMAT_VERSION,
        });
    }
    Ok(cache)
}

/// Read a cache file back into a store, rescoring centrality with `scorer`.
pub fn load_cache(path: &Path, scorer: &dyn CentralityScorer) -> Result<GraphStore, CacheError> {
    let cache = read_cache(path)?;
    tracing::debug!("Loading snapshot cache {} written {}", path.display(), cache.created_at);

    let mut builder = GraphStoreBuilder::new(cache.meta);
    let ids: Vec<Option<FileId>> = cache
        .files
        .into_iter()
        .map(|file| builder.add_file(file))
        .collect();
    let lookup = |id: FileId| ids.get(id.index()).copied().flatten();

    for root in cache.roots {
        if let Some(id) = lookup(FileId(root)) {
            builder.mark_root(id);
        }
    }
    for edge in cache.edges {
        if let (Some(includer), Some(included)) = (lookup(edge.includer), lookup(edge.included)) {
            builder.add_edge(IncludeEdge {
                includer,
                included,
                ..edge
            });
        }
    }

    let mut store = builder.finish(scorer);
    store.restore_load_stats(cache.stats);
    Ok(store)
}

/// Header fields of a cache file.
pub fn cache_info(path: &Path) -> Result<CacheInfo, CacheError> {
    let cache = read_cache(path)?;
    Ok(CacheInfo {
        format_version: cache.format_version,
        created_at: cache.created_at,
        revision: cache.meta.revision,
        files: cache.files.len(),
        edges: cache.edges.len(),
    })
}

/// Whether `path` names a cache file rather than a raw snapshot.
pub fn is_cache_path(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == CACHE_EXTENSION)
}
