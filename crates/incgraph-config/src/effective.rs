//! Flattened configuration for one analyzed path prefix

use crate::schema::{ConfigDocument, IgnoreRules};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Filenames, headers and edges to ignore for one kind of suggestion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IgnoreSet {
    pub filenames: BTreeSet<String>,
    pub headers: BTreeSet<String>,
    /// Includer -> included headers.
    pub edges: HashMap<String, HashSet<String>>,
}

impl IgnoreSet {
    fn from_rules(rules: &IgnoreRules) -> Self {
        let mut set = IgnoreSet {
            filenames: rules.filenames.iter().cloned().collect(),
            headers: rules.headers.iter().cloned().collect(),
            ..Default::default()
        };
        for (includer, included) in &rules.edges {
            set.insert_edge(includer.clone(), included.clone());
        }
        set
    }

    pub fn insert_edge(&mut self, includer: impl Into<String>, included: impl Into<String>) {
        self.edges
            .entry(includer.into())
            .or_default()
            .insert(included.into());
    }

    pub fn contains_edge(&self, includer: &str, included: &str) -> bool {
        self.edges
            .get(includer)
            .is_some_and(|headers| headers.contains(included))
    }

    /// Whether a suggestion for `header` in `filename` is ignored.
    pub fn matches(&self, filename: &str, header: &str) -> bool {
        self.filenames.contains(filename) || self.headers.contains(header) || self.contains_edge(filename, header)
    }

    pub fn is_empty(&self) -> bool {
        self.filenames.is_empty() && self.headers.is_empty() && self.edges.is_empty()
    }

    fn union(&mut self, other: &IgnoreSet) {
        self.filenames.extend(other.filenames.iter().cloned());
        self.headers.extend(other.headers.iter().cloned());
        for (includer, headers) in &other.edges {
            self.edges
                .entry(includer.clone())
                .or_default()
                .extend(headers.iter().cloned());
        }
    }

    /// Filenames and edge includers move under `prefix`. Headers are
    /// reachable both by their short and their root-relative spelling.
    fn prefixed(&self, prefix: &str) -> IgnoreSet {
        IgnoreSet {
            filenames: self.filenames.iter().map(|f| join(prefix, f)).collect(),
            headers: self
                .headers
                .iter()
                .flat_map(|h| [h.clone(), join(prefix, h)])
                .collect(),
            edges: self
                .edges
                .iter()
                .map(|(includer, headers)| (join(prefix, includer), headers.clone()))
                .collect(),
        }
    }
}

fn join(prefix: &str, path: &str) -> String {
    let path = path.trim_start_matches("./");
    if prefix.is_empty() {
        path.to_string()
    } else if path.is_empty() || path == "." {
        prefix.trim_end_matches('/').to_string()
    } else {
        format!("{}/{}", prefix.trim_end_matches('/'), path)
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EffectiveConfig {
    /// Header search directories in priority order.
    pub include_dirs: Vec<String>,
    pub skip: HashSet<String>,
    pub add: IgnoreSet,
    pub remove: IgnoreSet,
    pub header_mappings: BTreeMap<String, String>,
}

impl EffectiveConfig {
    /// A document's own directives, without its dependencies.
    pub fn from_document(doc: &ConfigDocument) -> Self {
        let mut config = EffectiveConfig::default();
        for dir in &doc.include_dirs {
            push_unique(&mut config.include_dirs, dir.clone());
        }
        config.skip = doc.ignores.skip.iter().cloned().collect();
        config.add = IgnoreSet::from_rules(&doc.ignores.add);
        config.remove = IgnoreSet::from_rules(&doc.ignores.remove);
        config.header_mappings = doc.header_mappings.clone();
        config
    }

    /// Rebase paths owned by a dependency rooted at `prefix`.
    pub fn prefixed(&self, prefix: &str) -> EffectiveConfig {
        if prefix.is_empty() {
            return self.clone();
        }
        EffectiveConfig {
            include_dirs: self
                .include_dirs
                .iter()
                .map(|dir| if dir.starts_with('{') { dir.clone() } else { join(prefix, dir) })
                .collect(),
            skip: self.skip.iter().map(|s| join(prefix, s)).collect(),
            add: self.add.prefixed(prefix),
            remove: self.remove.prefixed(prefix),
            header_mappings: self.header_mappings.clone(),
        }
    }

    /// Fold in a less specific config. Existing include dirs keep their
    /// position and existing header mappings win; everything else is a union.
    pub fn merge_from(&mut self, other: &EffectiveConfig) {
        for dir in &other.include_dirs {
            push_unique(&mut self.include_dirs, dir.clone());
        }
        self.skip.extend(other.skip.iter().cloned());
        self.add.union(&other.add);
        self.remove.union(&other.remove);
        for (raw, canonical) in &other.header_mappings {
            self.header_mappings
                .entry(raw.clone())
                .or_insert_with(|| canonical.clone());
        }
    }

    pub fn push_include_dir(&mut self, dir: impl Into<String>) {
        push_unique(&mut self.include_dirs, dir.into());
    }

    pub fn is_skipped(&self, path: &str) -> bool {
        self.skip.contains(path)
    }

    /// Canonical spelling for a header the oracle suggested.
    pub fn map_header<'a>(&'a self, header: &'a str) -> &'a str {
        self.header_mappings
            .get(header)
            .map_or(header, String::as_str)
    }
}
