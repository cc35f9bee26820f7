//! Include-analysis snapshot loading
//!
//! The snapshot is the output of the build-time include analysis: one JSON
//! object, usually wrapped in a `data = {...}` JavaScript assignment and, in
//! the archived copies, embedded in an HTML page. Files are referenced by
//! their index into `files`, and all per-file values are parallel arrays.
//!
//! This is the only place raw analysis data enters the crate. Individual
//! records that are incomplete or inconsistent are skipped and counted in
//! [`LoadStats`]; only a document that cannot be parsed at all is an error.

use crate::centrality::{CentralityScorer, DegreeScorer};
use crate::error::SnapshotLoadError;
use crate::graph::{percentage, GraphStore, GraphStoreBuilder};
use crate::model::*;
use regex::Regex;
use serde::de::IgnoredAny;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::sync::OnceLock;

/// One entry of a per-record array. A value of the wrong type (a null size,
/// a negative index) becomes `Invalid` so the record can be skipped without
/// rejecting the document.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot<T> {
    Valid(T),
    Invalid,
}

impl<T> Slot<T> {
    pub fn valid(&self) -> Option<&T> {
        match self {
            Slot::Valid(value) => Some(value),
            Slot::Invalid => None,
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Slot<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(serde_json::from_value(value).map_or(Slot::Invalid, Slot::Valid))
    }
}

/// Value at `idx` of a per-record array, if present and well-typed.
fn slot<T: Copy>(slots: &[Slot<T>], idx: usize) -> Option<T> {
    slots.get(idx).and_then(Slot::valid).copied()
}

/// Raw document as produced by the include analysis.
#[derive(Debug, Deserialize)]
pub struct RawSnapshot {
    #[serde(default)]
    pub revision: Option<serde_json::Value>,
    #[serde(default)]
    pub date: Option<String>,
    pub files: Vec<Slot<String>>,
    #[serde(default)]
    pub roots: Vec<Slot<usize>>,
    #[serde(default)]
    pub includes: Vec<Slot<Vec<Slot<usize>>>>,
    /// Rebuilt from `includes`; accepted but not retained.
    #[serde(default)]
    pub included_by: IgnoredAny,
    #[serde(default)]
    pub sizes: Vec<Slot<u64>>,
    #[serde(default)]
    pub tsizes: Vec<Slot<u64>>,
    #[serde(default)]
    pub asizes: Vec<Slot<u64>>,
    #[serde(default)]
    pub esizes: Vec<Slot<Vec<Slot<u64>>>>,
    #[serde(default)]
    pub prevalence: Vec<Slot<u64>>,
    #[serde(default)]
    pub sysroot: Option<String>,
    #[serde(default)]
    pub sysroot_platform: Option<String>,
    #[serde(default)]
    pub gen_prefix: Option<String>,
    /// Indices of self-contained files. Absent means every file is.
    #[serde(default)]
    pub self_contained: Option<Vec<Slot<usize>>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

enum Preamble {
    Json,
    Html,
}

/// Skip leading whitespace and any `name =` assignment in front of the object.
fn skip_preamble<R: BufRead>(reader: &mut R) -> std::io::Result<Preamble> {
    loop {
        let (skip, exhausted) = {
            let buf = reader.fill_buf()?;
            if buf.is_empty() {
                return Ok(Preamble::Json);
            }
            let skip = buf.iter().take_while(|b| b.is_ascii_whitespace()).count();
            (skip, skip == buf.len())
        };
        reader.consume(skip);
        if !exhausted {
            break;
        }
    }

    let first = reader.fill_buf()?.first().copied();
    match first {
        Some(b'<') => Ok(Preamble::Html),
        Some(b'{') | None => Ok(Preamble::Json),
        Some(_) => {
            let mut assignment = Vec::new();
            reader.read_until(b'=', &mut assignment)?;
            Ok(Preamble::Json)
        }
    }
}

fn script_regex() -> &'static Regex {
    static SCRIPT: OnceLock<Regex> = OnceLock::new();
    SCRIPT.get_or_init(|| {
        Regex::new(r"(?s)<script>\s*data\s*=\s*(\{.*?\})\s*;?\s*</script>").expect("valid regex")
    })
}

/// Parse the raw document from a reader without buffering it whole.
pub fn parse_raw<R: Read>(reader: R) -> Result<RawSnapshot, SnapshotLoadError> {
    let mut reader = BufReader::new(reader);
    match skip_preamble(&mut reader)? {
        Preamble::Json => {
            let mut stream = serde_json::Deserializer::from_reader(reader).into_iter::<RawSnapshot>();
            match stream.next() {
                Some(raw) => Ok(raw?),
                None => Err(SnapshotLoadError::Empty),
            }
        }
        Preamble::Html => {
            let mut page = String::new();
            reader.read_to_string(&mut page)?;
            let captures = script_regex()
                .captures(&page)
                .ok_or(SnapshotLoadError::Empty)?;
            Ok(serde_json::from_str(&captures[1])?)
        }
    }
}

/// Load a snapshot from any reader, scoring centrality with `scorer`.
pub fn load<R: Read>(reader: R, scorer: &dyn CentralityScorer) -> Result<GraphStore, SnapshotLoadError> {
    let raw = parse_raw(reader)?;
    Ok(build(raw, scorer))
}

/// Load a snapshot file from disk.
pub fn load_path(path: &Path, scorer: &dyn CentralityScorer) -> Result<GraphStore, SnapshotLoadError> {
    let file = File::open(path).map_err(|source| SnapshotLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let store = load(file, scorer)?;
    tracing::info!(
        "Loaded snapshot {} ({} files, {} edges, {} records skipped)",
        path.display(),
        store.file_count(),
        store.edge_count(),
        store.load_stats().skipped()
    );
    Ok(store)
}

/// Convenience for in-memory documents with the default scorer.
pub fn load_str(document: &str) -> Result<GraphStore, SnapshotLoadError> {
    load(document.as_bytes(), &DegreeScorer::default())
}

fn revision_string(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Normalize a raw document into a graph store.
pub fn build(raw: RawSnapshot, scorer: &dyn CentralityScorer) -> GraphStore {
    let meta = SnapshotMeta {
        revision: raw.revision.and_then(revision_string),
        date: raw.date,
        sysroot: raw.sysroot,
        sysroot_platform: raw.sysroot_platform,
        gen_prefix: raw.gen_prefix,
    };
    let mut builder = GraphStoreBuilder::new(meta);
    let self_contained: Option<HashSet<usize>> = raw
        .self_contained
        .map(|indices| indices.iter().filter_map(|idx| idx.valid().copied()).collect());

    // Raw index -> loaded file, None for skipped records.
    let mut ids: Vec<Option<FileId>> = Vec::with_capacity(raw.files.len());
    for (idx, path) in raw.files.into_iter().enumerate() {
        let (Slot::Valid(path), Some(size)) = (path, slot(&raw.sizes, idx)) else {
            tracing::debug!("Skipping file record {} without a path or size", idx);
            builder.skip_file();
            ids.push(None);
            continue;
        };
        let file = FileNode {
            path,
            size,
            expanded_size: slot(&raw.tsizes, idx).unwrap_or(size),
            added_size: slot(&raw.asizes, idx).unwrap_or(0),
            prevalence: slot(&raw.prevalence, idx).unwrap_or(0),
            is_root: false,
            self_contained: self_contained
                .as_ref()
                .is_none_or(|set| set.contains(&idx)),
        };
        ids.push(builder.add_file(file));
    }

    let lookup = |idx: usize| ids.get(idx).copied().flatten();

    for root in &raw.roots {
        match root.valid().and_then(|&idx| lookup(idx)) {
            Some(id) => {
                if !builder.mark_root(id) {
                    tracing::debug!("Ignoring repeated root index {:?}", root);
                }
            }
            None => builder.skip_root(),
        }
    }
    let root_count = builder.root_count();

    for (idx, includes) in raw.includes.iter().enumerate() {
        let Some(includes) = includes.valid() else {
            tracing::debug!("Skipping malformed include list of record {}", idx);
            builder.skip_edge();
            continue;
        };
        let Some(includer) = lookup(idx) else {
            for _ in includes {
                builder.skip_edge();
            }
            continue;
        };
        let esizes = raw.esizes.get(idx).and_then(Slot::valid);
        let includer_size = slot(&raw.sizes, idx).unwrap_or(0);
        let prevalence = percentage(slot(&raw.prevalence, idx).unwrap_or(0), root_count);

        for (position, included_idx) in includes.iter().enumerate() {
            let included_idx = included_idx.valid().copied();
            let added_size = esizes.and_then(|sizes| slot(sizes, position));
            let (Some(included_idx), Some(added_size)) = (included_idx, added_size) else {
                tracing::debug!("Skipping malformed edge record {} at position {}", idx, position);
                builder.skip_edge();
                continue;
            };
            let Some(included) = lookup(included_idx) else {
                tracing::debug!("Skipping edge record {} -> unknown index {}", idx, included_idx);
                builder.skip_edge();
                continue;
            };
            let expanded_size = slot(&raw.tsizes, included_idx)
                .or_else(|| slot(&raw.sizes, included_idx))
                .unwrap_or(0);
            builder.add_edge(IncludeEdge {
                includer,
                included,
                added_size,
                expanded_size,
                prevalence,
                includer_size,
                centrality: Centrality::default(),
            });
        }
    }

    builder.set_extra(raw.extra);
    builder.finish(scorer)
}
