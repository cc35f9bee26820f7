//! incgraph config: hierarchical ignore/mapping configs and tool settings

pub mod effective;
pub mod error;
pub mod resolver;
pub mod schema;
pub mod settings;

pub use effective::{EffectiveConfig, IgnoreSet};
pub use error::{ConfigError, SettingsError};
pub use resolver::ConfigResolver;
pub use schema::{ConfigDocument, DependencySpec, DocumentFormat, IgnoreRules, Ignores};
pub use settings::{CentralitySettings, DiffSettings, OracleSettings, Settings, SETTINGS_FILE};
