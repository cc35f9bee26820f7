//! Change-list CSV and JSON-lines rendering
//!
//! A change list is one row per suggestion: `action,line,file,header`
//! followed by any requested metric columns. This is the exchange format
//! with patch tooling, recorded oracle runs and the size recalculation.

use crate::error::ChangeListError;
use crate::model::*;
use std::fmt::Write as _;
use std::io::BufRead;
use std::path::Path;

/// A parsed change list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeList {
    pub changes: Vec<SuggestedChange>,
    /// Rows with an unknown action.
    pub skipped: usize,
}

/// Split one CSV line, honouring double-quoted fields.
fn split_row(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if quoted && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut field)),
            other => field.push(other),
        }
    }
    fields.push(field);
    fields
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

impl ChangeList {
    pub fn parse<R: BufRead>(reader: R) -> Result<Self, ChangeListError> {
        let mut list = ChangeList::default();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = idx + 1;
            let trimmed = line.trim_end_matches('\r');
            if trimmed.trim().is_empty() {
                continue;
            }

            let fields = split_row(trimmed);
            if fields.len() < 4 {
                return Err(ChangeListError::Columns {
                    line: line_no,
                    found: fields.len(),
                });
            }
            if idx == 0 && fields[0] == "action" {
                continue;
            }

            let Ok(kind) = fields[0].parse::<ChangeKind>() else {
                tracing::warn!("Skipping change list row {} with unknown action {:?}", line_no, fields[0]);
                list.skipped += 1;
                continue;
            };
            let line_number = match fields[1].trim() {
                "" => None,
                value => Some(value.parse::<u32>().map_err(|_| ChangeListError::LineNumber {
                    line: line_no,
                    value: value.to_string(),
                })?),
            };

            let mut change = SuggestedChange::new(kind, fields[2].trim(), fields[3].trim());
            change.line = line_number;
            list.changes.push(change);
        }

        Ok(list)
    }

    pub fn parse_str(text: &str) -> Result<Self, ChangeListError> {
        Self::parse(text.as_bytes())
    }

    pub fn from_path(path: &Path) -> Result<Self, ChangeListError> {
        let file = std::fs::File::open(path)?;
        Self::parse(std::io::BufReader::new(file))
    }
}

/// `includer,included` pairs, one per row. Blank rows and rows starting
/// with `#` are skipped; extra columns are ignored.
pub fn parse_edge_pairs<R: BufRead>(reader: R) -> Result<Vec<(String, String)>, ChangeListError> {
    let mut pairs = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim_end_matches('\r');
        if trimmed.trim().is_empty() || trimmed.trim_start().starts_with('#') {
            continue;
        }
        let mut fields = split_row(trimmed).into_iter();
        match (fields.next(), fields.next()) {
            (Some(includer), Some(included)) => pairs.push((includer.trim().to_string(), included.trim().to_string())),
            _ => {
                return Err(ChangeListError::EdgeColumns {
                    line: idx + 1,
                    found: 1,
                })
            }
        }
    }
    Ok(pairs)
}

pub fn edge_pairs_from_path(path: &Path) -> Result<Vec<(String, String)>, ChangeListError> {
    let file = std::fs::File::open(path)?;
    parse_edge_pairs(std::io::BufReader::new(file))
}

/// One CSV row for a change, metric columns in the order they are attached.
pub fn csv_row(change: &SuggestedChange) -> String {
    let mut row = format!(
        "{},{},{},{}",
        change.kind,
        change.line.map(|l| l.to_string()).unwrap_or_default(),
        escape(&change.file),
        escape(&change.edge)
    );
    for (_, value) in &change.metrics {
        let _ = write!(row, ",{value}");
    }
    row
}

/// Render a change list as CSV, optionally with a header row.
pub fn render_csv(changes: &[SuggestedChange], header: bool) -> String {
    let mut out = String::new();
    if header {
        out.push_str("action,line,file,header");
        if let Some(first) = changes.first() {
            for (metric, _) in &first.metrics {
                let _ = write!(out, ",{metric}");
            }
        }
        out.push('\n');
    }
    for change in changes {
        out.push_str(&csv_row(change));
        out.push('\n');
    }
    out
}

/// Render a change list as one JSON object per line.
pub fn render_json_lines(changes: &[SuggestedChange]) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    for change in changes {
        let mut object = serde_json::json!({
            "action": change.kind,
            "line": change.line,
            "file": change.file,
            "header": change.edge,
        });
        if change.unverified {
            object["unverified"] = serde_json::Value::Bool(true);
        }
        for (metric, value) in &change.metrics {
            object[metric.as_str()] = serde_json::to_value(value)?;
        }
        out.push_str(&serde_json::to_string(&object)?);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_and_skips_unknown_actions() {
        let text = "action,line,file,header\n\
                    remove,12,base/a.cc,base/b.h\n\
                    add,,base/a.cc,\"base/weird,name.h\",0.5\n\
                    \n\
                    rename,3,base/a.cc,base/c.h\n";
        let list = ChangeList::parse_str(text).unwrap();

        assert_eq!(list.skipped, 1);
        assert_eq!(list.changes.len(), 2);
        assert_eq!(list.changes[0].kind, ChangeKind::Remove);
        assert_eq!(list.changes[0].line, Some(12));
        assert_eq!(list.changes[1].kind, ChangeKind::Add);
        assert_eq!(list.changes[1].line, None);
        assert_eq!(list.changes[1].edge, "base/weird,name.h");
    }

    #[test]
    fn rejects_short_rows_and_bad_line_numbers() {
        assert!(matches!(
            ChangeList::parse_str("remove,1,a.cc\n"),
            Err(ChangeListError::Columns { line: 1, found: 3 })
        ));
        assert!(matches!(
            ChangeList::parse_str("remove,one,a.cc,b.h\n"),
            Err(ChangeListError::LineNumber { line: 1, .. })
        ));
    }

    #[test]
    fn renders_csv_with_metric_columns() {
        let mut remove = SuggestedChange::new(ChangeKind::Remove, "a.cc", "b.h");
        remove.line = Some(4);
        remove.metrics = vec![
            (Metric::AddedSize, MetricValue::Size(50)),
            (Metric::Prevalence, MetricValue::Percent(12.5)),
        ];
        let mut add = SuggestedChange::new(ChangeKind::Add, "a.cc", "d,e.h");
        add.metrics = vec![
            (Metric::AddedSize, MetricValue::Unknown),
            (Metric::Prevalence, MetricValue::Percent(100.0)),
        ];

        insta::assert_snapshot!(render_csv(&[remove, add], true).trim_end(), @r#"
        action,line,file,header,added_size,prevalence
        remove,4,a.cc,b.h,50,12.50
        add,,a.cc,"d,e.h",unknown,100.00
        "#);
    }

    #[test]
    fn renders_json_lines() {
        let mut add = SuggestedChange::new(ChangeKind::Add, "a.cc", "x.h");
        add.unverified = true;
        add.metrics = vec![(Metric::ExpandedSize, MetricValue::Unknown)];

        let rendered = render_json_lines(&[add]).unwrap();
        let value: serde_json::Value = serde_json::from_str(rendered.trim()).unwrap();
        assert_eq!(value["action"], "add");
        assert_eq!(value["unverified"], true);
        assert_eq!(value["expanded_size"], "unknown");
        assert!(value["line"].is_null());
    }

    #[test]
    fn parses_edge_pairs_with_comments() {
        let text = "# skipped while cutting\nbase/a.h,base/b.h\n\n\"base/c,d.h\",base/e.h,extra\n";
        let pairs = parse_edge_pairs(text.as_bytes()).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("base/a.h".to_string(), "base/b.h".to_string()),
                ("base/c,d.h".to_string(), "base/e.h".to_string()),
            ]
        );

        let err = parse_edge_pairs("base/a.h\n".as_bytes()).unwrap_err();
        assert!(matches!(err, ChangeListError::EdgeColumns { line: 1, found: 1 }));
    }
}
