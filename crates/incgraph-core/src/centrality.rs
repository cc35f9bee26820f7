//! Pluggable edge centrality scoring
//!
//! Centrality is a node metric in most graph libraries, but ranking include
//! changes needs a per-edge value. Scorers receive the degree counts of both
//! endpoints plus the edge's prevalence and return a score where higher means
//! the edge is more load-bearing. Every scorer must be strictly increasing in
//! prevalence and in the fan-in of both endpoints.

use crate::error::UnknownScorer;

/// Everything a scorer may look at for one edge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CentralityInputs {
    /// Edge prevalence, 0-100.
    pub prevalence: f64,
    pub includer_fan_in: usize,
    pub includer_fan_out: usize,
    pub included_fan_in: usize,
    pub included_fan_out: usize,
    /// Number of files in the snapshot, used for normalization.
    pub file_count: usize,
}

pub trait CentralityScorer: Send + Sync {
    fn name(&self) -> &str;

    fn score(&self, inputs: &CentralityInputs) -> f64;
}

pub const DEFAULT_SCALE: f64 = 100_000.0;

/// Normalized in-degree of the includer times normalized out-degree of the
/// included file, weighted by prevalence and by how widely the included file
/// is already included. Finds edges in commonly included headers that pull
/// many more headers into the graph.
#[derive(Debug, Clone, Copy)]
pub struct DegreeScorer {
    pub scale: f64,
}

impl Default for DegreeScorer {
    fn default() -> Self {
        DegreeScorer { scale: DEFAULT_SCALE }
    }
}

impl CentralityScorer for DegreeScorer {
    fn name(&self) -> &str {
        "degree"
    }

    fn score(&self, inputs: &CentralityInputs) -> f64 {
        let n = inputs.file_count.saturating_sub(1).max(1) as f64;
        let fan_in = (inputs.includer_fan_in + 1) as f64 / n;
        let fan_out = (inputs.included_fan_out + 1) as f64 / n;
        self.scale * (1.0 + inputs.prevalence / 100.0) * fan_in * fan_out * included_weight(inputs)
    }
}

/// `1 + fan_in(included) / n`, so wider-included targets rank higher.
fn included_weight(inputs: &CentralityInputs) -> f64 {
    1.0 + inputs.included_fan_in as f64 / inputs.file_count.max(1) as f64
}

/// Prevalence scaled by the fan-in of both endpoints, ignoring what the
/// included file pulls in.
#[derive(Debug, Clone, Copy)]
pub struct PrevalenceScorer {
    pub scale: f64,
}

impl CentralityScorer for PrevalenceScorer {
    fn name(&self) -> &str {
        "prevalence"
    }

    fn score(&self, inputs: &CentralityInputs) -> f64 {
        let n = inputs.file_count.max(1) as f64;
        self.scale * (inputs.prevalence / 100.0) * (1.0 + inputs.includer_fan_in as f64 / n) * included_weight(inputs)
    }
}

/// Factory for scorers named in settings.
pub fn create_scorer(name: &str, scale: f64) -> Result<Box<dyn CentralityScorer>, UnknownScorer> {
    match name {
        "degree" => Ok(Box::new(DegreeScorer { scale })),
        "prevalence" => Ok(Box::new(PrevalenceScorer { scale })),
        other => Err(UnknownScorer(other.to_string())),
    }
}
