//! Integration tests for incgraph
//!
//! Snapshot, config tree and oracle verdicts on disk, driven through the
//! library crates and through the CLI binary.

use incgraph_config::ConfigResolver;
use incgraph_core::{reconcile, snapshot, ChangeKind, DegreeScorer, Metric, MetricValue, ReconcileOptions};
use incgraph_oracle::{create_oracle, select_files, AnalysisRequest, Orchestrator, OrchestratorOptions};
use regex::Regex;
use serde_json::json;
use std::path::Path;
use std::process::{Command, Output};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Two translation units sharing `base/a.h`:
///
/// ```text
/// base/a.cc  -> base/a.h -> base/big.h -> third_party/abseil-cpp/absl/x.h
/// base/a.cc  -> base/unused.h
/// chrome/c.cc -> base/a.h
/// ```
fn snapshot_json(revision: &str, big_size: u64) -> serde_json::Value {
    json!({
        "revision": revision,
        "date": "2024-06-01 08:00:00 UTC",
        "files": [
            "base/a.cc",
            "base/a.h",
            "base/big.h",
            "third_party/abseil-cpp/absl/x.h",
            "base/unused.h",
            "chrome/c.cc",
        ],
        "roots": [0, 5],
        "includes": [[1, 4], [2], [3], [], [], [1]],
        "included_by": [[], [0, 5], [1], [2], [0], []],
        "sizes": [100, 50, big_size, 50, 10, 30],
        "tsizes": [410, 300, big_size + 50, 50, 10, 330],
        "asizes": [100, 50, big_size, 50, 10, 30],
        "esizes": [[250, 10], [big_size + 50], [50], [], [], [300]],
        "prevalence": [1, 2, 2, 2, 1, 1],
    })
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace { dir };

        let document = format!("data = {};\n", snapshot_json("r2000", 200));
        workspace.write("snapshot.js", &document);
        workspace.write("old.json", &snapshot_json("r1000", 100).to_string());

        workspace.write(
            "configs/chromium.json",
            &json!({
                "dependencies": { "third_party/abseil-cpp": "abseil.yaml" },
                "headerMappings": { "base/internal/big_impl.h": "base/big.h" },
            })
            .to_string(),
        );
        workspace.write("configs/abseil.yaml", "ignores:\n  add:\n    headers:\n      - absl/x.h\n");

        workspace.write(
            "verdicts.json",
            &json!({
                "base/a.cc": {
                    "unusedEdges": [{ "header": "base/unused.h", "line": 4 }],
                    "missingHeaders": ["base/internal/big_impl.h"],
                },
                "base/a.h": { "missingHeaders": ["absl/x.h"] },
                "base/big.h": {},
            })
            .to_string(),
        );
        workspace
    }

    fn path(&self, name: &str) -> std::path::PathBuf {
        self.dir.path().join(name)
    }

    fn write(&self, name: &str, contents: &str) {
        let path = self.path(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn incgraph(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_incgraph"))
            .args(args)
            .current_dir(self.dir.path())
            .output()
            .expect("Failed to run incgraph")
    }
}

fn stdout(output: &Output) -> String {
    assert!(
        output.status.success(),
        "incgraph failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Oracle batch over a filtered file set, reconciled against the config tree
#[tokio::test]
async fn test_recorded_batch_end_to_end() {
    let workspace = Workspace::new();
    let store = snapshot::load_path(&workspace.path("snapshot.js"), &DegreeScorer::default()).unwrap();
    let resolver = ConfigResolver::new(workspace.path("configs"));
    let config = resolver.resolve("chromium", "").unwrap();
    assert!(config.include_dirs.contains(&"third_party/abseil-cpp".to_string()));

    let filter = Regex::new("base/").unwrap();
    let files = select_files(&store, Some(&config), Some(&filter));
    assert_eq!(files, vec!["base/a.cc", "base/a.h", "base/big.h", "base/unused.h"]);

    let verdicts = workspace.path("verdicts.json");
    let oracle = create_oracle("recorded", verdicts.to_str()).unwrap();
    let orchestrator = Orchestrator::new(
        Arc::from(oracle),
        OrchestratorOptions {
            workers: 2,
            timeout: Duration::from_secs(5),
        },
    );
    let requests: Vec<_> = files.into_iter().map(AnalysisRequest::new).collect();
    let results = orchestrator.run(requests).await;
    assert_eq!(results.len(), 4);

    let options = ReconcileOptions {
        metrics: vec![Metric::AddedSize, Metric::Prevalence],
        ..Default::default()
    };
    let outcome = reconcile(&results, &store, &config, &DegreeScorer::default(), &options);

    // base/unused.h has no recorded verdict.
    assert_eq!(outcome.stats.files_total, 4);
    assert_eq!(outcome.stats.files_failed, 1);
    assert_eq!(outcome.stats.ignored, 1);
    assert_eq!(outcome.stats.suggestions, 2);

    let add = &outcome.changes[0];
    assert_eq!(add.kind, ChangeKind::Add);
    assert_eq!(add.edge, "base/big.h");
    assert!(!add.unverified);
    assert_eq!(add.metric(Metric::AddedSize), Some(MetricValue::Unknown));
    assert_eq!(add.metric(Metric::Prevalence), Some(MetricValue::Percent(50.0)));

    let remove = &outcome.changes[1];
    assert_eq!(remove.kind, ChangeKind::Remove);
    assert_eq!(remove.line, Some(4));
    assert_eq!(remove.metric(Metric::AddedSize), Some(MetricValue::Size(10)));
}

#[test]
fn test_cli_suggest_with_recorded_oracle() {
    let workspace = Workspace::new();
    let output = workspace.incgraph(&[
        "--config-dir",
        "configs",
        "--config",
        "chromium",
        "suggest",
        "snapshot.js",
        "--oracle-source",
        "verdicts.json",
        "--filename-filter",
        "base/",
        "--metric",
        "added_size",
    ]);

    assert_eq!(
        stdout(&output),
        "add,,base/a.cc,base/big.h,unknown\nremove,4,base/a.cc,base/unused.h,10\n"
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("3 of 4 files analyzed (1 failed)"), "{stderr}");
}

/// Files under a dependency are reconciled with that dependency's mappings
#[test]
fn test_cli_suggest_uses_nearest_config() {
    let workspace = Workspace::new();
    workspace.write(
        "configs/nested.json",
        &json!({
            "dependencies": { "third_party/abseil-cpp": "nested_abseil.yaml" },
            "headerMappings": { "big_impl.h": "base/big.h" },
        })
        .to_string(),
    );
    workspace.write("configs/nested_abseil.yaml", "headerMappings:\n  big_impl.h: base/unused.h\n");
    workspace.write(
        "nested_verdicts.json",
        &json!({
            "base/a.h": { "missingHeaders": ["big_impl.h"] },
            "third_party/abseil-cpp/absl/x.h": { "missingHeaders": ["big_impl.h"] },
        })
        .to_string(),
    );

    let output = workspace.incgraph(&[
        "--config-dir",
        "configs",
        "--config",
        "nested",
        "suggest",
        "snapshot.js",
        "--oracle-source",
        "nested_verdicts.json",
        "--filename-filter",
        "base/a\\.h$|third_party/",
        "--metric",
        "added_size",
    ]);

    assert_eq!(
        stdout(&output),
        "add,,third_party/abseil-cpp/absl/x.h,base/unused.h,unknown\nadd,,base/a.h,base/big.h,250\n"
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("2 of 2 files analyzed (0 failed)"), "{stderr}");
}

#[test]
fn test_cli_trace_and_includers() {
    let workspace = Workspace::new();

    let chain = stdout(&workspace.incgraph(&["trace", "snapshot.js", "chrome/c.cc", "third_party/abseil-cpp/absl/x.h"]));
    assert_eq!(
        chain.lines().collect::<Vec<_>>(),
        vec!["chrome/c.cc", "base/a.h", "base/big.h", "third_party/abseil-cpp/absl/x.h"]
    );

    let includers = stdout(&workspace.incgraph(&["includers", "snapshot.js", "base/big.h"]));
    assert_eq!(includers, "base/a.cc,transitive\nbase/a.h,direct\nchrome/c.cc,transitive\n");

    let missing = workspace.incgraph(&["trace", "snapshot.js", "base/unused.h", "base/a.h"]);
    assert!(!missing.status.success());
}

#[test]
fn test_cli_min_cut() {
    let workspace = Workspace::new();

    let cut = stdout(&workspace.incgraph(&["min-cut", "snapshot.js", "base/a.cc", "third_party/abseil-cpp/absl/x.h"]));
    assert_eq!(cut, "base/a.cc,base/a.h,50.00\n");

    let from_includes = stdout(&workspace.incgraph(&[
        "min-cut",
        "snapshot.js",
        "base/a.cc",
        "third_party/abseil-cpp/absl/x.h",
        "--start-from-source-includes",
    ]));
    assert_eq!(from_includes, "base/a.h,base/big.h,100.00\n");

    let unreachable = workspace.incgraph(&["min-cut", "snapshot.js", "base/unused.h", "base/a.h"]);
    assert!(!unreachable.status.success());
}

#[test]
fn test_cli_edges_to_cut() {
    let workspace = Workspace::new();

    let ranked = stdout(&workspace.incgraph(&["edges-to-cut", "snapshot.js", "--min-prevalence", "100"]));
    assert_eq!(ranked, "base/a.h,base/big.h,100.00,1\nbase/a.h,base/big.h,100.00,1\n");

    workspace.write("skips.csv", "# cut already landed\nbase/a.h,base/big.h\n");
    let skipped = stdout(&workspace.incgraph(&[
        "edges-to-cut",
        "snapshot.js",
        "--min-prevalence",
        "100",
        "--skips",
        "skips.csv",
    ]));
    assert_eq!(skipped, "");
}

#[test]
fn test_cli_cache_round_trip() {
    let workspace = Workspace::new();
    stdout(&workspace.incgraph(&["cache", "snapshot.js", "cache/snapshot.bin"]));
    assert!(workspace.path("cache/snapshot.bin").is_file());

    let from_document = stdout(&workspace.incgraph(&["stats", "snapshot.js"]));
    let from_cache = stdout(&workspace.incgraph(&["stats", "cache/snapshot.bin"]));
    assert_eq!(from_document, from_cache);
    assert!(from_cache.starts_with("files,6\nroots,2\nedges,5\n"));
}

#[test]
fn test_cli_diff_needs_thresholds() {
    let workspace = Workspace::new();
    let output = workspace.incgraph(&["diff", "old.json", "snapshot.js"]);
    assert!(!output.status.success());

    workspace.write(
        "incgraph.toml",
        "[diff]\nincrease_threshold_absolute = 50\nincrease_percentage_threshold = 10\nincrease_from_zero_threshold = 50\n",
    );
    let report = stdout(&workspace.incgraph(&["diff", "old.json", "snapshot.js"]));
    assert_eq!(
        report,
        "r1000,2024-06-01 08:00:00 UTC,edge,base/a.h,base/big.h,100,250\n\
         r1000,2024-06-01 08:00:00 UTC,file,base/big.h,,100,200\n"
    );
}

#[test]
fn test_cli_recalc_after_removal() {
    let workspace = Workspace::new();
    workspace.write("changes.csv", "remove,,chrome/c.cc,base/a.h\n");

    let sizes = stdout(&workspace.incgraph(&["recalc", "snapshot.js", "changes.csv"]));
    assert_eq!(sizes, "base/a.cc,410,410,0\nchrome/c.cc,330,30,-300\n");

    let roots = stdout(&workspace.incgraph(&["reachable-roots", "snapshot.js", "base/big.h", "--changes", "changes.csv"]));
    assert_eq!(roots.trim(), "1");
}

#[test]
fn test_unknown_oracle_is_an_error() {
    assert!(create_oracle("psychic", None).is_err());
    assert!(Path::new(env!("CARGO_BIN_EXE_incgraph")).exists());
}
