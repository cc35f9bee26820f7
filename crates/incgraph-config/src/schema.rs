//! On-disk config document schema
//!
//! ```json
//! {
//!   "dependencies": { "third_party/abseil-cpp": "abseil.json" },
//!   "includeDirs": ["third_party/abseil-cpp"],
//!   "ignores": {
//!     "skip": ["base/allocator/partition_allocator/src/partition_alloc/shim/allocator_shim.cc"],
//!     "add": { "filenames": [], "headers": ["base/callback_forward.h"], "edges": [] },
//!     "remove": { "headers": ["build/build_config.h"], "edges": [["base/atomicops.h", "base/atomicops_internals_portable.h"]] }
//!   },
//!   "headerMappings": { "__fwd/string.h": "string" }
//! }
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct ConfigDocument {
    /// Sub-configs keyed by the directory they own, relative to the
    /// codebase root. Resolved in key order.
    pub dependencies: BTreeMap<String, DependencySpec>,
    pub include_dirs: Vec<String>,
    pub ignores: Ignores,
    pub header_mappings: BTreeMap<String, String>,
}

/// A dependency is either a path to another config document, relative to
/// the referencing document, or an inline config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencySpec {
    Path(String),
    Inline(Box<ConfigDocument>),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Ignores {
    /// Files never analyzed.
    pub skip: Vec<String>,
    pub add: IgnoreRules,
    pub remove: IgnoreRules,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IgnoreRules {
    /// Files whose suggestions are dropped.
    pub filenames: Vec<String>,
    /// Headers never suggested.
    pub headers: Vec<String>,
    /// Specific `[includer, included]` pairs.
    pub edges: Vec<(String, String)>,
}

/// Serialization format of a config document, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    pub const EXTENSIONS: [(&'static str, DocumentFormat); 3] = [
        ("json", DocumentFormat::Json),
        ("yaml", DocumentFormat::Yaml),
        ("yml", DocumentFormat::Yaml),
    ];

    pub fn from_path(path: &Path) -> DocumentFormat {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => DocumentFormat::Yaml,
            _ => DocumentFormat::Json,
        }
    }
}

impl ConfigDocument {
    pub fn parse(text: &str, format: DocumentFormat) -> Result<Self, String> {
        match format {
            DocumentFormat::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
            DocumentFormat::Yaml => serde_yaml::from_str(text).map_err(|e| e.to_string()),
        }
    }

    /// Read and validate a document from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound {
                    name: path.display().to_string(),
                    searched: path.display().to_string(),
                }
            } else {
                ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Self::parse(&text, DocumentFormat::from_path(path)).map_err(|message| ConfigError::Schema {
            path: path.to_path_buf(),
            message,
        })
    }
}
