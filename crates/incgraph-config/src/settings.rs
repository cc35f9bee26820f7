//! Tool settings (`incgraph.toml`)
//!
//! ```toml
//! [diff]
//! increase_threshold_absolute = 10000
//! increase_percentage_threshold = 25
//! increase_from_zero_threshold = 100000
//!
//! [centrality]
//! scorer = "degree"
//! scale = 100000.0
//!
//! [oracle]
//! workers = 16
//! timeout_secs = 300
//! ```

use crate::error::SettingsError;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SETTINGS_FILE: &str = "incgraph.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub diff: DiffSettings,
    pub centrality: CentralitySettings,
    pub oracle: OracleSettings,
}

/// Diff thresholds. Left unset here, they must come from the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DiffSettings {
    pub increase_threshold_absolute: Option<i64>,
    pub increase_percentage_threshold: Option<i64>,
    pub increase_from_zero_threshold: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CentralitySettings {
    pub scorer: String,
    pub scale: f64,
}

impl Default for CentralitySettings {
    fn default() -> Self {
        CentralitySettings {
            scorer: "degree".to_string(),
            scale: 100_000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OracleSettings {
    /// Concurrent analyses. Defaults to the host's logical CPU count.
    pub workers: Option<usize>,
    pub timeout_secs: u64,
}

impl Default for OracleSettings {
    fn default() -> Self {
        OracleSettings {
            workers: None,
            timeout_secs: 300,
        }
    }
}

impl Settings {
    pub fn from_toml_str(text: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml_str(&text)?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// `incgraph.toml` in `dir` if present, defaults otherwise.
    pub fn discover(dir: &Path) -> Result<Self, SettingsError> {
        let path = dir.join(SETTINGS_FILE);
        if path.is_file() {
            Self::load(&path)
        } else {
            Ok(Settings::default())
        }
    }
}
