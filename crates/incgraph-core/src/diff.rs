//! Size regressions between two snapshots
//!
//! Files are joined by path and edges by (includer, included) path pair, both
//! through the stores' hash indices, so a diff is linear in the size of the
//! larger snapshot.

use crate::error::ThresholdConfigError;
use crate::graph::GraphStore;
use incgraph_config::{DiffSettings, EffectiveConfig};
use serde::Serialize;
use std::fmt::Write as _;

/// Validated thresholds for flagging an increase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiffThresholds {
    /// Minimum absolute growth, in bytes, for the percentage rule.
    pub increase_threshold_absolute: i64,
    /// Minimum growth relative to the previous size, in percent.
    pub increase_percentage_threshold: i64,
    /// Minimum size for something that previously weighed nothing.
    pub increase_from_zero_threshold: i64,
}

impl DiffThresholds {
    pub fn from_settings(settings: &DiffSettings) -> Result<Self, ThresholdConfigError> {
        fn required(value: Option<i64>, name: &'static str) -> Result<i64, ThresholdConfigError> {
            match value {
                None => Err(ThresholdConfigError::Missing(name)),
                Some(value) if value < 0 => Err(ThresholdConfigError::Negative { name, value }),
                Some(value) => Ok(value),
            }
        }

        Ok(DiffThresholds {
            increase_threshold_absolute: required(
                settings.increase_threshold_absolute,
                "increase_threshold_absolute",
            )?,
            increase_percentage_threshold: required(
                settings.increase_percentage_threshold,
                "increase_percentage_threshold",
            )?,
            increase_from_zero_threshold: required(
                settings.increase_from_zero_threshold,
                "increase_from_zero_threshold",
            )?,
        })
    }

    /// Whether growth from `previous` to `current` should be reported.
    pub fn is_significant(&self, previous: u64, current: u64) -> bool {
        let previous = i128::from(previous);
        let delta = i128::from(current) - previous;

        if previous == 0 {
            return delta >= i128::from(self.increase_from_zero_threshold);
        }
        delta >= i128::from(self.increase_threshold_absolute)
            && delta * 100 >= i128::from(self.increase_percentage_threshold) * previous
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffScope {
    File,
    Edge,
}

impl DiffScope {
    pub fn as_str(self) -> &'static str {
        match self {
            DiffScope::File => "file",
            DiffScope::Edge => "edge",
        }
    }
}

/// One flagged increase. `included` is empty for file-scope records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffRecord {
    pub scope: DiffScope,
    pub includer: String,
    pub included: String,
    pub previous_size: u64,
    pub current_size: u64,
    pub delta: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiffReport {
    pub previous_revision: Option<String>,
    pub previous_date: Option<String>,
    pub current_revision: Option<String>,
    pub records: Vec<DiffRecord>,
}

impl DiffReport {
    /// `revision,date,scope,includer,included,delta,new_total` rows.
    pub fn render_csv(&self) -> String {
        let revision = self.previous_revision.as_deref().unwrap_or("");
        let date = self.previous_date.as_deref().unwrap_or("");
        let mut out = String::new();
        for record in &self.records {
            let _ = writeln!(
                out,
                "{},{},{},{},{},{},{}",
                revision,
                date,
                record.scope.as_str(),
                record.includer,
                record.included,
                record.delta,
                record.current_size
            );
        }
        out
    }
}

fn delta(previous: u64, current: u64) -> i64 {
    (i128::from(current) - i128::from(previous)) as i64
}

/// Flag files and edges whose size grew significantly from `previous` to `current`.
pub fn diff(
    previous: &GraphStore,
    current: &GraphStore,
    thresholds: &DiffThresholds,
    config: Option<&EffectiveConfig>,
) -> DiffReport {
    let skipped = |path: &str| config.is_some_and(|c| c.is_skipped(path));
    let mut records = Vec::new();

    for file in current.all_files() {
        if skipped(&file.path) {
            continue;
        }
        let previous_size = previous.file_by_path(&file.path).map_or(0, |f| f.size);
        if thresholds.is_significant(previous_size, file.size) {
            records.push(DiffRecord {
                scope: DiffScope::File,
                includer: file.path.clone(),
                included: String::new(),
                previous_size,
                current_size: file.size,
                delta: delta(previous_size, file.size),
            });
        }
    }

    for edge in current.all_edges() {
        let includer = current.path(edge.includer);
        if skipped(includer) {
            continue;
        }
        let included = current.path(edge.included);
        let previous_size = previous.edge(includer, included).map_or(0, |e| e.added_size);
        if thresholds.is_significant(previous_size, edge.added_size) {
            records.push(DiffRecord {
                scope: DiffScope::Edge,
                includer: includer.to_string(),
                included: included.to_string(),
                previous_size,
                current_size: edge.added_size,
                delta: delta(previous_size, edge.added_size),
            });
        }
    }

    records.sort_by(|a, b| {
        a.includer
            .cmp(&b.includer)
            .then_with(|| a.included.cmp(&b.included))
            .then_with(|| a.scope.cmp(&b.scope))
    });
    tracing::info!(
        "Diff against {} flagged {} increases",
        previous.meta().revision.as_deref().unwrap_or("unknown revision"),
        records.len()
    );

    DiffReport {
        previous_revision: previous.meta().revision.clone(),
        previous_date: previous.meta().date.clone(),
        current_revision: current.meta().revision.clone(),
        records,
    }
}

/// A file or edge present in the previous snapshot but not the current one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovedEntry {
    pub scope: DiffScope,
    pub includer: String,
    pub included: String,
    pub previous_size: u64,
}

/// Files and edges that disappeared between two snapshots.
pub fn removed_entries(previous: &GraphStore, current: &GraphStore) -> Vec<RemovedEntry> {
    let files = previous
        .all_files()
        .filter(|file| !current.contains(&file.path))
        .map(|file| RemovedEntry {
            scope: DiffScope::File,
            includer: file.path.clone(),
            included: String::new(),
            previous_size: file.size,
        });
    let edges = previous.all_edges().filter_map(|edge| {
        let includer = previous.path(edge.includer);
        let included = previous.path(edge.included);
        current.edge(includer, included).is_none().then(|| RemovedEntry {
            scope: DiffScope::Edge,
            includer: includer.to_string(),
            included: included.to_string(),
            previous_size: edge.added_size,
        })
    });

    let mut removed: Vec<RemovedEntry> = files.chain(edges).collect();
    removed.sort_by(|a, b| {
        a.includer
            .cmp(&b.includer)
            .then_with(|| a.included.cmp(&b.included))
    });
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::store_from_json;
    use serde_json::json;

    fn thresholds() -> DiffThresholds {
        DiffThresholds {
            increase_threshold_absolute: 26,
            increase_percentage_threshold: 25,
            increase_from_zero_threshold: 40,
        }
    }

    fn snapshot(revision: &str, edge_size: u64, new_edge_size: Option<u64>) -> GraphStore {
        let (includes, esizes) = match new_edge_size {
            Some(size) => (json!([[1, 2], [], []]), json!([[edge_size, size], [], []])),
            None => (json!([[1], [], []]), json!([[edge_size], [], []])),
        };
        store_from_json(json!({
            "revision": revision,
            "date": "2024-05-01 12:00:00 UTC",
            "files": ["a.cc", "b.h", "c.h"],
            "roots": [0],
            "includes": includes,
            "sizes": [1000, 500, 500],
            "esizes": esizes,
            "prevalence": [1, 1, 1],
        }))
    }

    #[test]
    fn percentage_threshold_is_inclusive() {
        let previous = snapshot("r1", 100, None);

        let report = diff(&previous, &snapshot("r2", 126, None), &thresholds(), None);
        assert_eq!(report.records.len(), 1);
        let record = &report.records[0];
        assert_eq!(record.scope, DiffScope::Edge);
        assert_eq!((record.includer.as_str(), record.included.as_str()), ("a.cc", "b.h"));
        assert_eq!(record.delta, 26);
        assert_eq!(report.previous_revision.as_deref(), Some("r1"));

        let report = diff(&previous, &snapshot("r2", 124, None), &thresholds(), None);
        assert!(report.records.is_empty());
    }

    #[test]
    fn absolute_threshold_gates_percentage_rule() {
        let previous = snapshot("r1", 100, None);
        let strict = DiffThresholds {
            increase_threshold_absolute: 27,
            ..thresholds()
        };
        assert!(diff(&previous, &snapshot("r2", 126, None), &strict, None).records.is_empty());
    }

    #[test]
    fn new_edges_use_from_zero_threshold() {
        let previous = snapshot("r1", 100, None);

        let report = diff(&previous, &snapshot("r2", 100, Some(41)), &thresholds(), None);
        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].included, "c.h");
        assert_eq!(report.records[0].previous_size, 0);

        let report = diff(&previous, &snapshot("r2", 100, Some(39)), &thresholds(), None);
        assert!(report.records.is_empty());
    }

    #[test]
    fn file_records_come_first_and_skips_apply() {
        let previous = snapshot("r1", 100, None);
        let mut document = json!({
            "revision": "r2",
            "files": ["a.cc", "b.h", "c.h"],
            "roots": [0],
            "includes": [[1], [], []],
            "sizes": [2000, 500, 500],
            "esizes": [[200], [], []],
            "prevalence": [1, 1, 1],
        });
        let current = store_from_json(document.clone());

        let report = diff(&previous, &current, &thresholds(), None);
        let scopes: Vec<DiffScope> = report.records.iter().map(|r| r.scope).collect();
        assert_eq!(scopes, vec![DiffScope::File, DiffScope::Edge]);

        let config = EffectiveConfig {
            skip: ["a.cc".to_string()].into_iter().collect(),
            ..Default::default()
        };
        assert!(diff(&previous, &current, &thresholds(), Some(&config)).records.is_empty());

        document["files"][2] = json!("d.h");
        let shrunk = store_from_json(document);
        let removed = removed_entries(&current, &shrunk);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].includer, "c.h");
    }

    #[test]
    fn renders_tabular_report() {
        let previous = snapshot("r1", 100, None);
        let report = diff(&previous, &snapshot("r2", 130, Some(64)), &thresholds(), None);
        insta::assert_snapshot!(report.render_csv().trim_end(), @r"
        r1,2024-05-01 12:00:00 UTC,edge,a.cc,b.h,30,130
        r1,2024-05-01 12:00:00 UTC,edge,a.cc,c.h,64,64
        ");
    }

    #[test]
    fn thresholds_must_be_present_and_non_negative() {
        let settings = DiffSettings {
            increase_threshold_absolute: Some(10),
            increase_percentage_threshold: None,
            increase_from_zero_threshold: Some(5),
        };
        assert_eq!(
            DiffThresholds::from_settings(&settings),
            Err(ThresholdConfigError::Missing("increase_percentage_threshold"))
        );

        let settings = DiffSettings {
            increase_percentage_threshold: Some(-1),
            ..settings
        };
        assert_eq!(
            DiffThresholds::from_settings(&settings),
            Err(ThresholdConfigError::Negative {
                name: "increase_percentage_threshold",
                value: -1
            })
        );
    }
}
