//! The `contacts` entity: schema, row transform, and export flattening.
//!
//! The import schema is embedded at compile time from
//! `schemas/contacts.json`. The wire format for `tags` is a pipe-joined
//! string (`"a|b|c"`) in both directions, so exported files re-import
//! cleanly.

use chrono::DateTime;
use serde_json::{json, Map, Value};

use super::ExportRow;
use crate::parser::RawRow;
use crate::transform::{coerce_integer, join_list, non_empty, split_list};

pub const NAME: &str = "contacts";

/// Fields copied through as trimmed strings when non-empty.
const STRING_FIELDS: &[&str] = &[
    "id", "name", "email", "phone", "company", "position", "status", "notes",
];

/// Export column order. Identifier and tenant fields are deliberately
/// absent; system timestamps come last.
pub const EXPORT_COLUMNS: &[&str] = &[
    "name",
    "email",
    "phone",
    "company",
    "position",
    "status",
    "score",
    "tags",
    "notes",
    "aiScore",
    "aiJustification",
    "createdAt",
    "updatedAt",
];

/// The embedded contact row schema (JSON Schema Draft 7).
pub fn schema() -> Value {
    serde_json::from_str(include_str!("../../schemas/contacts.json"))
        .expect("invalid embedded schema")
}

/// Normalize one raw CSV row into the shapes the schema expects.
///
/// Never fails: a non-numeric `score` is dropped rather than rejected, and
/// `tags` defaults to an empty list when the column is absent. Unknown
/// columns are discarded here, which is what lets the schema keep
/// `additionalProperties: false`.
pub fn transform_row(raw: &RawRow) -> Map<String, Value> {
    let mut out = Map::new();

    for &field in STRING_FIELDS {
        if let Some(value) = raw.get(field).and_then(Value::as_str).and_then(non_empty) {
            out.insert(field.to_string(), json!(value));
        }
    }

    if let Some(raw_score) = raw.get("score").and_then(Value::as_str) {
        if let Some(score) = coerce_integer(raw_score) {
            out.insert("score".to_string(), json!(score));
        }
    }

    let tags = raw
        .get("tags")
        .and_then(Value::as_str)
        .map(split_list)
        .unwrap_or_default();
    out.insert("tags".to_string(), json!(tags));

    out
}

/// Denormalize one stored contact into a flat export row.
///
/// Tag lists are rejoined with the import delimiter, timestamps are rendered
/// as plain calendar dates, and the nested AI score is hoisted into
/// `aiScore`/`aiJustification` columns. Absent fields render as empty
/// strings, never as errors.
pub fn flatten_row(data: &Map<String, Value>) -> ExportRow {
    let mut row = ExportRow::new();

    for &field in &["name", "email", "phone", "company", "position", "status", "notes"] {
        row.insert(field.to_string(), string_field(data, field));
    }

    if let Some(score) = data.get("score").and_then(Value::as_i64) {
        row.insert("score".to_string(), score.to_string());
    }

    let tags: Vec<String> = data
        .get("tags")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    row.insert("tags".to_string(), join_list(&tags));

    if let Some(ai) = data.get("aiScore") {
        match ai {
            Value::Object(fields) => {
                if let Some(value) = fields.get("value") {
                    row.insert("aiScore".to_string(), scalar_to_string(value));
                }
                row.insert(
                    "aiJustification".to_string(),
                    string_field(fields, "justification"),
                );
            }
            other => {
                row.insert("aiScore".to_string(), scalar_to_string(other));
            }
        }
    }

    row.insert("createdAt".to_string(), date_field(data, "createdAt"));
    row.insert("updatedAt".to_string(), date_field(data, "updatedAt"));

    row
}

fn string_field(data: &Map<String, Value>, field: &str) -> String {
    data.get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render a stored RFC 3339 timestamp as a plain calendar date.
///
/// Absent fields render as empty string; a value that does not parse is
/// passed through untouched rather than failing the export.
fn date_field(data: &Map<String, Value>, field: &str) -> String {
    match data.get(field).and_then(Value::as_str) {
        None => String::new(),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.date_naive().to_string())
            .unwrap_or_else(|_| raw.to_string()),
    }
}
