//! Concrete oracle backends

pub mod command;
pub mod recorded;

pub use command::CommandOracle;
pub use recorded::RecordedOracle;

use crate::bridge::SourceOracle;
use anyhow::Result;
use std::path::Path;

/// Create an oracle by name.
///
/// `recorded` replays a verdicts file (change-list CSV or JSON map) named by
/// `source`; `command` runs `source` as an external program per file.
pub fn create_oracle(oracle_name: &str, source: Option<&str>) -> Result<Box<dyn SourceOracle>> {
    match oracle_name {
        "recorded" => {
            let Some(path) = source else {
                anyhow::bail!("The recorded oracle needs a verdicts file");
            };
            Ok(Box::new(RecordedOracle::from_path(Path::new(path))?))
        }
        "command" => {
            let Some(command_line) = source else {
                anyhow::bail!("The command oracle needs a program to run");
            };
            Ok(Box::new(CommandOracle::from_command_line(command_line)?))
        }
        _ => anyhow::bail!("Unknown oracle: {}", oracle_name),
    }
}
