//! incgraph oracle: the per-file analysis seam and the batch orchestrator

pub mod bridge;
pub mod error;
pub mod orchestrator;
pub mod providers;

pub use bridge::*;
pub use error::OracleFailure;
pub use orchestrator::{select_files, Orchestrator, OrchestratorOptions};
pub use providers::{create_oracle, CommandOracle, RecordedOracle};
