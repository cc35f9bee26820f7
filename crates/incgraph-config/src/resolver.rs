//! Hierarchical config resolution
//!
//! A root config names sub-configs under `dependencies`, keyed by the
//! directory each one owns. Flattening a config folds every reachable
//! dependency into it, rebased under the dependency's directory. Resolving
//! for a path prefix additionally puts the nearest owning config first so
//! its include dirs and header mappings take precedence.
//!
//! Parsed documents, flattened configs and resolved configs are each cached
//! per identity inside the resolver, never process-wide.

use crate::effective::EffectiveConfig;
use crate::error::ConfigError;
use crate::schema::{ConfigDocument, DependencySpec, DocumentFormat};
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One config in the dependency tree.
#[derive(Debug, Clone)]
struct ConfigNode {
    /// File path for on-disk configs, `parent#name` for inline ones.
    identity: String,
    document: Arc<ConfigDocument>,
    /// Directory relative paths in `document` are resolved against.
    base_dir: PathBuf,
}

pub struct ConfigResolver {
    config_dir: PathBuf,
    documents: DashMap<PathBuf, Arc<ConfigDocument>>,
    flattened: DashMap<String, Arc<EffectiveConfig>>,
    resolved: DashMap<String, Arc<EffectiveConfig>>,
}

impl ConfigResolver {
    /// Named configs are looked up in `config_dir`.
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        ConfigResolver {
            config_dir: config_dir.into(),
            documents: DashMap::new(),
            flattened: DashMap::new(),
            resolved: DashMap::new(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Number of distinct config files parsed so far.
    pub fn parsed_documents(&self) -> usize {
        self.documents.len()
    }

    /// Path of the named config, trying each supported extension.
    pub fn named_path(&self, name: &str) -> Result<PathBuf, ConfigError> {
        let direct = self.config_dir.join(name);
        if direct.extension().is_some() && direct.is_file() {
            return Ok(direct);
        }
        DocumentFormat::EXTENSIONS
            .iter()
            .map(|(ext, _)| self.config_dir.join(format!("{name}.{ext}")))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| ConfigError::NotFound {
                name: name.to_string(),
                searched: self.config_dir.display().to_string(),
            })
    }

    fn document(&self, path: &Path) -> Result<Arc<ConfigDocument>, ConfigError> {
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if let Some(doc) = self.documents.get(&key) {
            return Ok(Arc::clone(&doc));
        }
        let doc = Arc::new(ConfigDocument::load(path)?);
        tracing::debug!("Parsed config {}", key.display());
        self.documents.insert(key, Arc::clone(&doc));
        Ok(doc)
    }

    fn file_node(&self, path: &Path) -> Result<ConfigNode, ConfigError> {
        let document = self.document(path)?;
        let identity = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf())
            .display()
            .to_string();
        Ok(ConfigNode {
            identity,
            document,
            base_dir: path.parent().map(Path::to_path_buf).unwrap_or_default(),
        })
    }

    fn dependency_node(&self, parent: &ConfigNode, name: &str, spec: &DependencySpec) -> Result<ConfigNode, ConfigError> {
        match spec {
            DependencySpec::Path(relative) => self.file_node(&parent.base_dir.join(relative)),
            DependencySpec::Inline(document) => Ok(ConfigNode {
                identity: format!("{}#{}", parent.identity, name),
                document: Arc::new((**document).clone()),
                base_dir: parent.base_dir.clone(),
            }),
        }
    }

    /// `node` with every reachable dependency folded in.
    fn flatten(&self, node: &ConfigNode, stack: &mut Vec<String>) -> Result<Arc<EffectiveConfig>, ConfigError> {
        if stack.contains(&node.identity) {
            let mut chain = stack.clone();
            chain.push(node.identity.clone());
            return Err(ConfigError::Cycle {
                chain: chain.join(" -> "),
            });
        }
        if let Some(flat) = self.flattened.get(&node.identity) {
            return Ok(Arc::clone(&flat));
        }

        stack.push(node.identity.clone());
        let mut config = EffectiveConfig::from_document(&node.document);
        for (name, spec) in &node.document.dependencies {
            let child = self.dependency_node(node, name, spec)?;
            let child_flat = self.flatten(&child, stack)?;
            config.push_include_dir(name.clone());
            config.merge_from(&child_flat.prefixed(name));
        }
        stack.pop();

        let config = Arc::new(config);
        self.flattened
            .insert(node.identity.clone(), Arc::clone(&config));
        Ok(config)
    }

    /// Effective config for files under `path_prefix`, starting from the
    /// config named `root`.
    pub fn resolve(&self, root: &str, path_prefix: &str) -> Result<Arc<EffectiveConfig>, ConfigError> {
        let path = self.named_path(root)?;
        self.resolve_file(&path, path_prefix)
    }

    /// As [`resolve`](Self::resolve), starting from a config file path.
    pub fn resolve_file(&self, root: &Path, path_prefix: &str) -> Result<Arc<EffectiveConfig>, ConfigError> {
        let root_node = self.file_node(root)?;
        // Flatten the whole tree first so cycles anywhere are reported.
        self.flatten(&root_node, &mut Vec::new())?;

        let chain = self.owning_chain(root_node, path_prefix)?;
        let key = chain
            .iter()
            .map(|(node, _)| node.identity.as_str())
            .collect::<Vec<_>>()
            .join("|");
        if let Some(config) = self.resolved.get(&key) {
            return Ok(Arc::clone(&config));
        }

        let mut merged = EffectiveConfig::default();
        for (node, prefix) in chain.iter().rev() {
            let flat = self.flatten(node, &mut Vec::new())?;
            merged.merge_from(&flat.prefixed(prefix));
        }

        tracing::debug!(
            "Resolved config for {:?}: {} include dirs, {} header mappings",
            path_prefix,
            merged.include_dirs.len(),
            merged.header_mappings.len()
        );
        let merged = Arc::new(merged);
        self.resolved.insert(key, Arc::clone(&merged));
        Ok(merged)
    }

    /// Configs from the root down to the one owning `path_prefix`, each with
    /// its root-relative directory.
    fn owning_chain(&self, root: ConfigNode, path_prefix: &str) -> Result<Vec<(ConfigNode, String)>, ConfigError> {
        let mut chain = vec![(root, String::new())];
        let mut remaining = path_prefix.trim_start_matches("./").to_string();

        loop {
            let Some((current, prefix)) = chain.last() else { break };
            let owner = current
                .document
                .dependencies
                .iter()
                .filter(|(name, _)| owns(name, &remaining))
                .max_by_key(|(name, _)| name.len());
            let Some((name, spec)) = owner else { break };

            let child = self.dependency_node(current, name, spec)?;
            let child_prefix = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}/{name}")
            };
            remaining = remaining[name.len()..].trim_start_matches('/').to_string();
            chain.push((child, child_prefix));
        }

        Ok(chain)
    }
}

fn owns(dependency: &str, path: &str) -> bool {
    path == dependency
        || path
            .strip_prefix(dependency)
            .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, contents: &str) {
        fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn flattens_dependencies_with_prefixes() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "chromium.json",
            r#"{
                "includeDirs": ["."],
                "dependencies": {
                    "third_party/abseil-cpp": "abseil.json",
                    "v8": {"includeDirs": ["include"], "ignores": {"add": {"headers": ["v8-internal.h"]}}}
                },
                "ignores": {"remove": {"headers": ["build/build_config.h"]}}
            }"#,
        );
        write(
            dir.path(),
            "abseil.json",
            r#"{
                "ignores": {
                    "remove": {"headers": ["build/build_config.h", "absl/base/config.h"], "edges": [["absl/a.h", "absl/b.h"]]}
                },
                "headerMappings": {"absl/types/internal/optional.h": "absl/types/optional.h"}
            }"#,
        );

        let resolver = ConfigResolver::new(dir.path());
        let config = resolver.resolve("chromium", "").unwrap();

        assert_eq!(config.include_dirs, vec![".", "third_party/abseil-cpp", "v8", "v8/include"]);
        assert!(config.remove.matches("x.cc", "absl/base/config.h"));
        assert!(config.remove.matches("x.cc", "third_party/abseil-cpp/absl/base/config.h"));
        assert!(config.remove.matches("third_party/abseil-cpp/absl/a.h", "absl/b.h"));
        assert!(config.add.matches("x.cc", "v8/v8-internal.h"));
        assert_eq!(
            config.map_header("absl/types/internal/optional.h"),
            "absl/types/optional.h"
        );
        // Union, not concatenation.
        assert_eq!(
            config
                .remove
                .headers
                .iter()
                .filter(|h| *h == "build/build_config.h")
                .count(),
            1
        );
    }

    #[test]
    fn nearest_owner_comes_first() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "root.json",
            r#"{
                "includeDirs": ["."],
                "headerMappings": {"x.h": "root/x.h"},
                "dependencies": {"third_party/lib": {"includeDirs": ["include"], "headerMappings": {"x.h": "lib/x.h"}}}
            }"#,
        );
        let resolver = ConfigResolver::new(dir.path());

        let lib = resolver.resolve("root", "third_party/lib/src/a.cc").unwrap();
        assert_eq!(lib.include_dirs[0], "third_party/lib/include");
        assert_eq!(lib.map_header("x.h"), "lib/x.h");

        let other = resolver.resolve("root", "base/a.cc").unwrap();
        assert_eq!(other.include_dirs[0], ".");
        assert_eq!(other.map_header("x.h"), "root/x.h");

        // Prefixes sharing a leading string are not owned.
        let sibling = resolver.resolve("root", "third_party/library/a.cc").unwrap();
        assert_eq!(sibling.map_header("x.h"), "root/x.h");
    }

    #[test]
    fn dependency_cycles_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.json", r#"{"dependencies": {"b": "b.json"}}"#);
        write(dir.path(), "b.json", r#"{"dependencies": {"a": "a.json"}}"#);

        let resolver = ConfigResolver::new(dir.path());
        let err = resolver.resolve("a", "").unwrap_err();
        assert!(matches!(err, ConfigError::Cycle { .. }), "{err}");
    }

    #[test]
    fn shared_dependencies_are_parsed_once() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "root.json",
            r#"{"dependencies": {"a": "shared.json", "b": "shared.json"}}"#,
        );
        write(dir.path(), "shared.json", r#"{"ignores": {"skip": ["gen.cc"]}}"#);

        let resolver = ConfigResolver::new(dir.path());
        let config = resolver.resolve("root", "").unwrap();
        assert!(config.is_skipped("a/gen.cc"));
        assert!(config.is_skipped("b/gen.cc"));
        assert_eq!(resolver.parsed_documents(), 2);
    }

    #[test]
    fn missing_and_invalid_configs_fail() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "root.json", r#"{"dependencies": {"a": "missing.json"}}"#);
        write(dir.path(), "bad.json", r#"{"includeDirs": ["a"], "extra": 1}"#);

        let resolver = ConfigResolver::new(dir.path());
        assert!(matches!(resolver.resolve("nope", ""), Err(ConfigError::NotFound { .. })));
        assert!(matches!(resolver.resolve("root", ""), Err(ConfigError::NotFound { .. })));
        assert!(matches!(resolver.resolve("bad", ""), Err(ConfigError::Schema { .. })));
    }
}
