//! incgraph CLI entry point

use clap::{Parser, Subcommand};
use incgraph_core::Metric;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{Context, OutputFormat};

#[derive(Parser)]
#[command(name = "incgraph")]
#[command(about = "Include dependency graph analysis and include cleanup suggestions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding named config documents
    #[arg(long, global = true, default_value = ".")]
    config_dir: PathBuf,

    /// Root config name (looked up as <config-dir>/<name>.json|yaml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Tool settings file (defaults to ./incgraph.toml when present)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Csv)]
    format: OutputFormat,
}

#[derive(clap::Args)]
struct ReconcileFlags {
    /// Weight columns to attach (added_size, expanded_size, prevalence, includer_size, centrality)
    #[arg(short, long = "metric")]
    metrics: Vec<Metric>,

    /// Only output includes to add
    #[arg(long, conflicts_with = "remove_only")]
    add_only: bool,

    /// Only output includes to remove
    #[arg(long)]
    remove_only: bool,

    /// Only keep suggestions for headers matching this regex
    #[arg(long)]
    header_filter: Option<String>,

    /// Keep suggestions on generated files
    #[arg(long)]
    keep_generated: bool,

    /// Keep suggestions on mojom headers
    #[arg(long)]
    keep_mojom: bool,

    /// Drop suggestions on third-party files
    #[arg(long)]
    filter_third_party: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Shortest include chain from one file to another
    Trace {
        snapshot: PathBuf,
        start: String,
        target: String,
    },
    /// Everything a file includes, directly or transitively
    Includes {
        snapshot: PathBuf,
        file: String,
        /// List every edge of the reachable subgraph with its weight
        #[arg(long)]
        edges: bool,
        /// Weight shown with --edges
        #[arg(long, default_value = "added_size")]
        metric: Metric,
    },
    /// Every file including a file, directly or transitively
    Includers { snapshot: PathBuf, file: String },
    /// Graph statistics
    Stats {
        snapshot: PathBuf,
        /// Number of top included files to list
        #[arg(long, default_value = "20")]
        top: usize,
    },
    /// Files and edges whose size grew significantly between two snapshots
    Diff {
        previous: PathBuf,
        current: PathBuf,
        #[arg(long)]
        increase_threshold_absolute: Option<i64>,
        #[arg(long)]
        increase_percentage_threshold: Option<i64>,
        #[arg(long)]
        increase_from_zero_threshold: Option<i64>,
        /// Also list files and edges that disappeared
        #[arg(long)]
        removed: bool,
    },
    /// Ask an oracle about every file and output weighted include changes
    Suggest {
        snapshot: PathBuf,
        /// Oracle backend (recorded, command)
        #[arg(long, default_value = "recorded")]
        oracle: String,
        /// Verdicts file for the recorded oracle, program for the command oracle
        #[arg(long)]
        oracle_source: Option<String>,
        /// Regex matched at the start of each path to select files to analyze
        #[arg(long)]
        filename_filter: Option<String>,
        #[arg(long)]
        workers: Option<usize>,
        #[arg(long)]
        timeout_secs: Option<u64>,
        #[command(flatten)]
        flags: ReconcileFlags,
    },
    /// Weight and filter an existing change list
    Reconcile {
        snapshot: PathBuf,
        changes: PathBuf,
        /// Only keep suggestions for files matching this regex
        #[arg(long)]
        filename_filter: Option<String>,
        #[command(flatten)]
        flags: ReconcileFlags,
    },
    /// Expanded sizes after applying a change list
    Recalc {
        snapshot: PathBuf,
        changes: PathBuf,
        /// Ignore add changes
        #[arg(long)]
        remove_only: bool,
        /// Files to recompute (defaults to every translation unit)
        #[arg(long = "file")]
        files: Vec<String>,
    },
    /// Number of translation units that include a file
    ReachableRoots {
        snapshot: PathBuf,
        target: String,
        /// Apply this change list first
        #[arg(long)]
        changes: Option<PathBuf>,
    },
    /// Fewest includes to remove so one file no longer reaches another
    MinCut {
        snapshot: PathBuf,
        source: String,
        target: String,
        /// Cut from each file the source includes rather than from the source
        #[arg(long)]
        start_from_source_includes: bool,
        /// Drop cut edges whose includer prevalence percentage is below this
        #[arg(long)]
        prevalence_threshold: Option<f64>,
        /// Apply this change list first
        #[arg(long)]
        changes: Option<PathBuf>,
    },
    /// Rank includes inside the cluster of widely included first-party headers
    EdgesToCut {
        snapshot: PathBuf,
        /// Minimum prevalence percentage for a header to join the cluster
        #[arg(long)]
        min_prevalence: f64,
        /// Length of each ranking
        #[arg(long, default_value = "10")]
        top: usize,
        /// CSV of includer,included edges to remove from the graph first
        #[arg(long = "skips")]
        skips: Vec<PathBuf>,
        /// CSV of includer,included edges to leave out of the rankings
        #[arg(long = "ignores")]
        ignores: Vec<PathBuf>,
    },
    /// Write a binary cache of a snapshot
    Cache { snapshot: PathBuf, output: PathBuf },
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!("incgraph={log_level}")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let ctx = Context::new(cli.config_dir, cli.config, cli.settings.as_deref(), cli.format)?;

    match cli.command {
        Commands::Trace { snapshot, start, target } => commands::trace(&ctx, &snapshot, &start, &target),
        Commands::Includes {
            snapshot,
            file,
            edges,
            metric,
        } => commands::includes(&ctx, &snapshot, &file, edges.then_some(metric)),
        Commands::Includers { snapshot, file } => commands::includers(&ctx, &snapshot, &file),
        Commands::Stats { snapshot, top } => commands::stats(&ctx, &snapshot, top),
        Commands::Diff {
            previous,
            current,
            increase_threshold_absolute,
            increase_percentage_threshold,
            increase_from_zero_threshold,
            removed,
        } => {
            let mut thresholds = ctx.settings.diff;
            thresholds.increase_threshold_absolute =
                increase_threshold_absolute.or(thresholds.increase_threshold_absolute);
            thresholds.increase_percentage_threshold =
                increase_percentage_threshold.or(thresholds.increase_percentage_threshold);
            thresholds.increase_from_zero_threshold =
                increase_from_zero_threshold.or(thresholds.increase_from_zero_threshold);
            commands::diff(&ctx, &previous, &current, &thresholds, removed)
        }
        Commands::Suggest {
            snapshot,
            oracle,
            oracle_source,
            filename_filter,
            workers,
            timeout_secs,
            flags,
        } => {
            let batch = commands::BatchArgs {
                oracle,
                oracle_source,
                filename_filter,
                workers,
                timeout_secs,
            };
            commands::suggest(&ctx, &snapshot, batch, flags.into_options()?).await
        }
        Commands::Reconcile {
            snapshot,
            changes,
            filename_filter,
            flags,
        } => {
            let mut options = flags.into_options()?;
            options.filename_filter = commands::compile_regex(filename_filter.as_deref(), "--filename-filter")?;
            commands::reconcile(&ctx, &snapshot, &changes, options)
        }
        Commands::Recalc {
            snapshot,
            changes,
            remove_only,
            files,
        } => commands::recalc(&ctx, &snapshot, &changes, remove_only, &files),
        Commands::ReachableRoots {
            snapshot,
            target,
            changes,
        } => commands::reachable_roots(&ctx, &snapshot, &target, changes.as_deref()),
        Commands::MinCut {
            snapshot,
            source,
            target,
            start_from_source_includes,
            prevalence_threshold,
            changes,
        } => {
            let options = incgraph_core::MinCutOptions {
                start_from_source_includes,
                prevalence_threshold,
            };
            commands::min_cut(&ctx, &snapshot, &source, &target, changes.as_deref(), &options)
        }
        Commands::EdgesToCut {
            snapshot,
            min_prevalence,
            top,
            skips,
            ignores,
        } => commands::edges_to_cut(&ctx, &snapshot, min_prevalence, top, &skips, &ignores),
        Commands::Cache { snapshot, output } => commands::cache(&ctx, &snapshot, &output),
        Commands::Version => {
            println!("incgraph v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

impl ReconcileFlags {
    fn into_options(self) -> anyhow::Result<incgraph_core::ReconcileOptions> {
        let change_filter = if self.add_only {
            Some(incgraph_core::ChangeKind::Add)
        } else if self.remove_only {
            Some(incgraph_core::ChangeKind::Remove)
        } else {
            None
        };

        Ok(incgraph_core::ReconcileOptions {
            metrics: self.metrics,
            filter_generated_files: !self.keep_generated,
            filter_mojom_headers: !self.keep_mojom,
            filter_third_party: self.filter_third_party,
            change_filter,
            filename_filter: None,
            header_filter: commands::compile_regex(self.header_filter.as_deref(), "--header-filter")?,
        })
    }
}
