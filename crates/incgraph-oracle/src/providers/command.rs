//! Runs an external analysis program once per file
//!
//! The request is written to the program's stdin as one JSON object and the
//! verdict is read back from stdout:
//!
//! ```text
//! stdin:  {"file": "base/foo.cc", "includeDirs": ["third_party/abseil-cpp"]}
//! stdout: {"unusedEdges": ["base/bar.h"], "missingHeaders": [{"header": "base/baz.h", "line": 7}]}
//! ```

use crate::bridge::{AnalysisRequest, SourceOracle};
use crate::error::OracleFailure;
use incgraph_core::OracleVerdict;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

pub struct CommandOracle {
    program: String,
    args: Vec<String>,
}

impl CommandOracle {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a whitespace-separated command line into program and arguments.
    pub fn from_command_line(command_line: &str) -> anyhow::Result<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let Some(program) = parts.next() else {
            anyhow::bail!("Empty oracle command");
        };
        Ok(Self::new(program, parts.collect()))
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait::async_trait]
impl SourceOracle for CommandOracle {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<OracleVerdict, OracleFailure> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let payload = serde_json::to_vec(request)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&payload).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(OracleFailure::Exit {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        tracing::debug!("{} analyzed {}", self.program, request.file);
        Ok(serde_json::from_slice(&output.stdout)?)
    }

    fn name(&self) -> &str {
        "command"
    }
}
