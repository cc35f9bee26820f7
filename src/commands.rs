//! CLI command implementations

use anyhow::{Context as _, Result};
use incgraph_config::{ConfigResolver, DiffSettings, EffectiveConfig, Settings};
use incgraph_core::{
    create_scorer, edge_pairs_from_path, is_cache_path, load_cache, minimum_edge_cut, reconcile_changes_per_file,
    reconcile_per_file, render_csv, render_json_lines, save_cache, snapshot, CentralityScorer, ChangeList, CutCandidate,
    DiffThresholds, EdgeOverlay, EdgesToCutOptions, GraphStore, Membership, Metric, MinCutOptions, ReconcileOptions,
    SuggestedChange,
};
use incgraph_oracle::{create_oracle, select_files, AnalysisRequest, Orchestrator, OrchestratorOptions};
use regex::Regex;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Csv,
    Json,
}

/// State shared by every command: settings, the config tree and output format.
pub struct Context {
    pub settings: Settings,
    pub format: OutputFormat,
    resolver: Option<(ConfigResolver, String)>,
    default_config: Arc<EffectiveConfig>,
}

impl Context {
    pub fn new(
        config_dir: PathBuf,
        config_name: Option<String>,
        settings_path: Option<&Path>,
        format: OutputFormat,
    ) -> Result<Self> {
        let settings = match settings_path {
            Some(path) => Settings::load(path)?,
            None => Settings::discover(Path::new("."))?,
        };
        let resolver = config_name.map(|name| (ConfigResolver::new(config_dir), name));
        Ok(Self {
            settings,
            format,
            resolver,
            default_config: Arc::new(EffectiveConfig::default()),
        })
    }

    /// Effective config for files under `path_prefix` (empty for the whole tree).
    pub fn config(&self, path_prefix: &str) -> Result<Arc<EffectiveConfig>> {
        match &self.resolver {
            Some((resolver, name)) => Ok(resolver.resolve(name, path_prefix)?),
            None => Ok(self.default_config.clone()),
        }
    }

    pub fn has_config(&self) -> bool {
        self.resolver.is_some()
    }

    pub fn scorer(&self) -> Result<Box<dyn CentralityScorer>> {
        Ok(create_scorer(&self.settings.centrality.scorer, self.settings.centrality.scale)?)
    }

    /// Load a snapshot document, or a binary cache when the path ends in `.bin`.
    pub fn load_store(&self, path: &Path) -> Result<GraphStore> {
        let scorer = self.scorer()?;
        let store = if is_cache_path(path) {
            load_cache(path, scorer.as_ref()).with_context(|| format!("Failed to load cache {}", path.display()))?
        } else {
            snapshot::load_path(path, scorer.as_ref())
                .with_context(|| format!("Failed to load snapshot {}", path.display()))?
        };

        let stats = store.load_stats();
        if stats.skipped() > 0 {
            eprintln!(
                "{}: skipped {} malformed records ({} files, {} edges, {} roots)",
                path.display(),
                stats.skipped(),
                stats.skipped_files,
                stats.skipped_edges,
                stats.skipped_roots
            );
        }
        Ok(store)
    }
}

pub struct BatchArgs {
    pub oracle: String,
    pub oracle_source: Option<String>,
    pub filename_filter: Option<String>,
    pub workers: Option<usize>,
    pub timeout_secs: Option<u64>,
}

pub fn compile_regex(pattern: Option<&str>, flag: &str) -> Result<Option<Regex>> {
    pattern
        .map(Regex::new)
        .transpose()
        .with_context(|| format!("{flag} is not a valid regex"))
}

fn print_json_lines<I: IntoIterator<Item = serde_json::Value>>(values: I) -> Result<()> {
    for value in values {
        println!("{}", serde_json::to_string(&value)?);
    }
    Ok(())
}

fn write_changes(format: OutputFormat, changes: &[SuggestedChange]) -> Result<()> {
    match format {
        OutputFormat::Csv => print!("{}", render_csv(changes, false)),
        OutputFormat::Json => print!("{}", render_json_lines(changes)?),
    }
    Ok(())
}

fn load_changes(path: &Path) -> Result<Vec<SuggestedChange>> {
    let list = ChangeList::from_path(path).with_context(|| format!("Failed to read change list {}", path.display()))?;
    if list.skipped > 0 {
        eprintln!("{}: skipped {} rows with unknown actions", path.display(), list.skipped);
    }
    Ok(list.changes)
}

pub fn trace(ctx: &Context, snapshot: &Path, start: &str, target: &str) -> Result<()> {
    let store = ctx.load_store(snapshot)?;
    let chain = incgraph_core::trace(&store, start, target)?;

    match ctx.format {
        OutputFormat::Csv => {
            for file in chain {
                println!("{}", file.path);
            }
        }
        OutputFormat::Json => {
            let paths: Vec<&str> = chain.iter().map(|file| file.path.as_str()).collect();
            println!("{}", serde_json::to_string(&paths)?);
        }
    }
    Ok(())
}

fn membership_label(membership: Membership) -> &'static str {
    match membership {
        Membership::Direct => "direct",
        Membership::Transitive => "transitive",
    }
}

pub fn includes(ctx: &Context, snapshot: &Path, file: &str, edges_metric: Option<Metric>) -> Result<()> {
    let store = ctx.load_store(snapshot)?;

    if let Some(metric) = edges_metric {
        let edges = incgraph_core::transitive_edges(&store, file, &EdgeOverlay::new())?;
        match ctx.format {
            OutputFormat::Csv => {
                for edge in edges {
                    println!(
                        "{},{},{}",
                        store.path(edge.includer),
                        store.path(edge.included),
                        metric.of_edge(edge)
                    );
                }
            }
            OutputFormat::Json => print_json_lines(edges.into_iter().map(|edge| {
                json!({
                    "includer": store.path(edge.includer),
                    "included": store.path(edge.included),
                    metric.as_str(): metric.of_edge(edge),
                })
            }))?,
        }
        return Ok(());
    }

    let reachable = incgraph_core::transitive_includes(&store, file)?;
    write_reachable(ctx.format, reachable.sorted(&store))
}

pub fn includers(ctx: &Context, snapshot: &Path, file: &str) -> Result<()> {
    let store = ctx.load_store(snapshot)?;
    let reachable = incgraph_core::transitive_includers(&store, file)?;
    write_reachable(ctx.format, reachable.sorted(&store))
}

fn write_reachable(format: OutputFormat, entries: Vec<(&str, Membership)>) -> Result<()> {
    match format {
        OutputFormat::Csv => {
            for (path, membership) in entries {
                println!("{},{}", path, membership_label(membership));
            }
            Ok(())
        }
        OutputFormat::Json => print_json_lines(
            entries
                .into_iter()
                .map(|(path, membership)| json!({ "file": path, "membership": membership_label(membership) })),
        ),
    }
}

pub fn stats(ctx: &Context, snapshot: &Path, top: usize) -> Result<()> {
    let store = ctx.load_store(snapshot)?;
    let stats = store.stats(top);

    match ctx.format {
        OutputFormat::Csv => {
            println!("files,{}", stats.files);
            println!("roots,{}", stats.roots);
            println!("edges,{}", stats.edges);
            println!("edges_from_roots,{}", stats.edges_from_roots);
            println!("edges_from_headers,{}", stats.edges_from_headers);
            for entry in &stats.top_included {
                println!("{},{},{:.2}", entry.path, entry.direct_includers, entry.prevalence);
            }
        }
        OutputFormat::Json => {
            let top: Vec<_> = stats
                .top_included
                .iter()
                .map(|entry| {
                    json!({
                        "file": entry.path,
                        "direct_includers": entry.direct_includers,
                        "prevalence": entry.prevalence,
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::to_string(&json!({
                    "revision": store.meta().revision,
                    "files": stats.files,
                    "roots": stats.roots,
                    "edges": stats.edges,
                    "edges_from_roots": stats.edges_from_roots,
                    "edges_from_headers": stats.edges_from_headers,
                    "top_included": top,
                }))?
            );
        }
    }
    Ok(())
}

pub fn diff(ctx: &Context, previous: &Path, current: &Path, thresholds: &DiffSettings, removed: bool) -> Result<()> {
    let thresholds = DiffThresholds::from_settings(thresholds)?;
    let previous = ctx.load_store(previous)?;
    let current = ctx.load_store(current)?;
    let config = ctx.has_config().then(|| ctx.config("")).transpose()?;

    let report = incgraph_core::diff(&previous, &current, &thresholds, config.as_deref());

    match ctx.format {
        OutputFormat::Csv => print!("{}", report.render_csv()),
        OutputFormat::Json => print_json_lines(
            report
                .records
                .iter()
                .map(serde_json::to_value)
                .collect::<Result<Vec<_>, _>>()?,
        )?,
    }

    if removed {
        let entries = incgraph_core::removed_entries(&previous, &current);
        eprintln!("{} files and edges removed", entries.len());
        match ctx.format {
            OutputFormat::Csv => {
                for entry in entries {
                    println!(
                        "removed,{},{},{},{}",
                        entry.scope.as_str(),
                        entry.includer,
                        entry.included,
                        entry.previous_size
                    );
                }
            }
            OutputFormat::Json => print_json_lines(
                entries
                    .iter()
                    .map(serde_json::to_value)
                    .collect::<Result<Vec<_>, _>>()?,
            )?,
        }
    }
    Ok(())
}

pub async fn suggest(ctx: &Context, snapshot: &Path, batch: BatchArgs, options: ReconcileOptions) -> Result<()> {
    let store = ctx.load_store(snapshot)?;
    let config = ctx.config("")?;
    let scorer = ctx.scorer()?;

    let filename_filter = compile_regex(batch.filename_filter.as_deref(), "--filename-filter")?;
    let files = select_files(&store, Some(&config), filename_filter.as_ref());
    if files.is_empty() {
        anyhow::bail!("No files selected for analysis");
    }

    let requests = files
        .into_iter()
        .map(|file| {
            let include_dirs = ctx.config(&file)?.include_dirs.clone();
            Ok(AnalysisRequest::new(file).with_include_dirs(include_dirs))
        })
        .collect::<Result<Vec<_>>>()?;

    let oracle = create_oracle(&batch.oracle, batch.oracle_source.as_deref())?;
    let mut orchestrator_options = OrchestratorOptions::from_settings(&ctx.settings.oracle);
    if let Some(workers) = batch.workers {
        orchestrator_options.workers = workers.max(1);
    }
    if let Some(secs) = batch.timeout_secs {
        orchestrator_options.timeout = std::time::Duration::from_secs(secs);
    }

    let orchestrator = Orchestrator::new(Arc::from(oracle), orchestrator_options);
    let results = orchestrator.run(requests).await;

    let reconciliation = reconcile_per_file(&results, &store, scorer.as_ref(), &options, |file| ctx.config(file))?;
    write_changes(ctx.format, &reconciliation.changes)?;
    eprintln!("{}", reconciliation.stats);
    Ok(())
}

pub fn reconcile(ctx: &Context, snapshot: &Path, changes: &Path, options: ReconcileOptions) -> Result<()> {
    let store = ctx.load_store(snapshot)?;
    let scorer = ctx.scorer()?;
    let changes = load_changes(changes)?;

    let reconciliation =
        reconcile_changes_per_file(changes, &store, scorer.as_ref(), &options, |file| ctx.config(file))?;
    write_changes(ctx.format, &reconciliation.changes)?;
    eprintln!("{}", reconciliation.stats);
    Ok(())
}

pub fn recalc(ctx: &Context, snapshot: &Path, changes: &Path, remove_only: bool, files: &[String]) -> Result<()> {
    let store = ctx.load_store(snapshot)?;
    let config = ctx.config("")?;
    let changes = load_changes(changes)?;

    let targets = files
        .iter()
        .map(|file| {
            store
                .file_id(file)
                .with_context(|| format!("{file} is not in the snapshot"))
        })
        .collect::<Result<Vec<_>>>()?;
    let targets = (!targets.is_empty()).then_some(targets.as_slice());

    let sizes =
        incgraph_core::recalculate_expanded_sizes(&store, &changes, targets, &config.include_dirs, remove_only);

    match ctx.format {
        OutputFormat::Csv => {
            for (file, size) in &sizes.files {
                println!("{},{},{},{}", file, size.previous, size.current, size.delta());
            }
        }
        OutputFormat::Json => print_json_lines(sizes.files.iter().map(|(file, size)| {
            json!({
                "file": file,
                "previous": size.previous,
                "current": size.current,
                "delta": size.delta(),
            })
        }))?,
    }

    eprintln!(
        "{} files: {} -> {} bytes; {} changes skipped due to unresolved paths",
        sizes.files.len(),
        sizes.total_previous(),
        sizes.total_current(),
        sizes.unresolved_changes
    );
    Ok(())
}

pub fn reachable_roots(ctx: &Context, snapshot: &Path, target: &str, changes: Option<&Path>) -> Result<()> {
    let store = ctx.load_store(snapshot)?;
    let overlay = overlay_for(ctx, &store, changes)?;

    let count = incgraph_core::reachable_roots(&store, target, &overlay)?;
    match ctx.format {
        OutputFormat::Csv => println!("{count}"),
        OutputFormat::Json => println!("{}", json!({ "file": target, "roots": count })),
    }
    Ok(())
}

/// Overlay for an optional change list, reporting unresolved rows.
fn overlay_for(ctx: &Context, store: &GraphStore, changes: Option<&Path>) -> Result<EdgeOverlay> {
    let Some(path) = changes else {
        return Ok(EdgeOverlay::new());
    };
    let config = ctx.config("")?;
    let overlay = EdgeOverlay::from_changes(store, &load_changes(path)?, &config.include_dirs, false);
    if overlay.unresolved() > 0 {
        eprintln!("{} changes skipped due to unresolved paths", overlay.unresolved());
    }
    Ok(overlay)
}

pub fn min_cut(
    ctx: &Context,
    snapshot: &Path,
    source: &str,
    target: &str,
    changes: Option<&Path>,
    options: &MinCutOptions,
) -> Result<()> {
    let store = ctx.load_store(snapshot)?;
    let overlay = overlay_for(ctx, &store, changes)?;
    let cut = minimum_edge_cut(&store, source, target, &overlay, options)?;

    match ctx.format {
        OutputFormat::Csv => {
            for edge in &cut {
                println!("{},{},{:.2}", edge.includer, edge.included, edge.prevalence);
            }
        }
        OutputFormat::Json => print_json_lines(cut.iter().map(serde_json::to_value).collect::<Result<Vec<_>, _>>()?)?,
    }
    Ok(())
}

fn load_edge_pairs(paths: &[PathBuf]) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    for path in paths {
        let parsed = edge_pairs_from_path(path).with_context(|| format!("Failed to read edge list {}", path.display()))?;
        pairs.extend(parsed);
    }
    Ok(pairs)
}

pub fn edges_to_cut(
    ctx: &Context,
    snapshot: &Path,
    min_prevalence: f64,
    top: usize,
    skips: &[PathBuf],
    ignores: &[PathBuf],
) -> Result<()> {
    let store = ctx.load_store(snapshot)?;
    let overlay = EdgeOverlay::removing_pairs(&store, &load_edge_pairs(skips)?);
    let options = EdgesToCutOptions {
        min_prevalence,
        top,
        ignores: load_edge_pairs(ignores)?.into_iter().collect(),
    };

    let found = incgraph_core::edges_to_cut(&store, &overlay, &options);
    if found.cluster_size == 0 {
        eprintln!("No files meet the minimum prevalence of {min_prevalence:.2}%");
        return Ok(());
    }
    tracing::info!("Entry points: {}", found.entry_points.join(", "));

    match ctx.format {
        OutputFormat::Csv => {
            let row = |c: &CutCandidate| format!("{},{},{:.2},{}", c.includer, c.included, c.prevalence, c.dominated);
            eprintln!("Top {top} edges by prevalence:");
            for candidate in &found.by_prevalence {
                println!("{}", row(candidate));
            }
            eprintln!("Top {top} edges by dominator count:");
            for candidate in &found.by_dominators {
                println!("{}", row(candidate));
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string(&found)?),
    }
    Ok(())
}

pub fn cache(ctx: &Context, snapshot: &Path, output: &Path) -> Result<()> {
    let store = ctx.load_store(snapshot)?;
    save_cache(&store, output).with_context(|| format!("Failed to write cache {}", output.display()))?;

    let info = incgraph_core::cache_info(output)?;
    tracing::info!(
        "Wrote {} ({} files, {} edges, format v{}, revision {})",
        output.display(),
        info.files,
        info.edges,
        info.format_version,
        info.revision.as_deref().unwrap_or("unknown")
    );
    Ok(())
}
