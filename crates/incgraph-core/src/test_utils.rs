//! Snapshot fixtures shared by the unit tests

use crate::centrality::DegreeScorer;
use crate::graph::GraphStore;
use crate::snapshot;
use serde_json::{json, Value};

/// Load a snapshot document built with `json!`.
pub fn store_from_json(document: Value) -> GraphStore {
    let raw: snapshot::RawSnapshot = serde_json::from_value(document).unwrap();
    snapshot::build(raw, &DegreeScorer::default())
}

/// `a.cc` (100 bytes) includes the self-contained `b.h` (50 bytes).
pub fn end_to_end_json() -> Value {
    json!({
        "revision": "r1000",
        "date": "2024-05-01 12:00:00 UTC",
        "files": ["a.cc", "b.h"],
        "roots": [0],
        "includes": [[1], []],
        "included_by": [[], [0]],
        "sizes": [100, 50],
        "tsizes": [150, 50],
        "asizes": [100, 50],
        "esizes": [[50], []],
        "prevalence": [1, 1],
    })
}

pub fn end_to_end_store() -> GraphStore {
    store_from_json(end_to_end_json())
}

/// Two translation units over a header chain:
///
/// ```text
/// a.cc -> b.h -> c.h -> d.h
/// e.cc ----------------> d.h
/// ```
pub fn chain_store() -> GraphStore {
    store_from_json(json!({
        "revision": "r2000",
        "files": ["a.cc", "b.h", "c.h", "d.h", "e.cc"],
        "roots": [0, 4],
        "includes": [[1], [2], [3], [], [3]],
        "sizes": [10, 20, 30, 40, 5],
        "tsizes": [100, 90, 70, 40, 45],
        "asizes": [10, 20, 30, 40, 5],
        "esizes": [[20], [30], [40], [], [40]],
        "prevalence": [1, 1, 1, 2, 1],
    }))
}

/// A three-header include cycle plus an unrelated header.
pub fn cyclic_store() -> GraphStore {
    store_from_json(json!({
        "files": ["x.h", "y.h", "z.h", "w.h"],
        "roots": [],
        "includes": [[1], [2], [0], []],
        "sizes": [1, 2, 3, 4],
        "tsizes": [6, 6, 6, 4],
        "esizes": [[2], [3], [1], []],
    }))
}
