//! JSON reader
//!
//! Accepted shapes, tried in order:
//!
//! 1. `{"docs": [...]}`, the bulk envelope
//! 2. `[...]`, a bare array
//! 3. `{...}`, a single document
//! 4. JSON lines, one document per non-empty line, used only when the whole
//!    content is not a single JSON value
//!
//! Non-object entries are wrapped as `{"value": entry}`. In JSON-lines mode a
//! line that fails to parse is skipped with a warning instead of failing the
//! file; only a file where no line parses is malformed.

use super::{check_id_field, SourceOutput};
use crate::error::{IngestError, Result};
use crate::record::{Record, ID_FIELD};
use crate::report::Warning;
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

/// Field holding the document array in the bulk envelope
pub const BULK_ENVELOPE_FIELD: &str = "docs";

/// Read a JSON or JSON-lines file
pub fn read(path: &Path, id_field: Option<&str>) -> Result<SourceOutput> {
    let bytes = std::fs::read(path).map_err(|e| IngestError::io(path, e))?;
    let content = String::from_utf8(bytes)
        .map_err(|e| IngestError::malformed(path, format!("not valid UTF-8: {}", e)))?;
    parse(path, &content, id_field)
}

/// Parse JSON content; `path` is only used in errors and logs
pub fn parse(path: &Path, content: &str, id_field: Option<&str>) -> Result<SourceOutput> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);

    let (entries, warnings) = match serde_json::from_str::<Value>(content) {
        Ok(value) => (unwrap_envelope(path, value)?, Vec::new()),
        Err(whole) => {
            debug!(path = %path.display(), error = %whole, "Not a single JSON value, trying JSON lines");
            parse_lines(path, content, &whole)?
        },
    };

    let records: Vec<Record> = entries.into_iter().map(Record::from_value).collect();

    if !records.is_empty() {
        check_id_field(path, id_field, discovered_fields(&records))?;
    }

    Ok(SourceOutput { records, warnings })
}

fn unwrap_envelope(path: &Path, value: Value) -> Result<Vec<Value>> {
    match value {
        Value::Object(mut map) if map.contains_key(BULK_ENVELOPE_FIELD) => {
            match map.remove(BULK_ENVELOPE_FIELD) {
                Some(Value::Array(docs)) => {
                    debug!(shape = "envelope", documents = docs.len(), "Detected JSON shape");
                    Ok(docs)
                },
                _ => Err(IngestError::malformed(
                    path,
                    format!("'{}' must be an array of documents", BULK_ENVELOPE_FIELD),
                )),
            }
        },
        Value::Array(items) => {
            debug!(shape = "array", documents = items.len(), "Detected JSON shape");
            Ok(items)
        },
        Value::Object(map) => {
            debug!(shape = "object", "Detected JSON shape");
            Ok(vec![Value::Object(map)])
        },
        other => Err(IngestError::malformed(
            path,
            format!("top-level JSON must be an object or array, found {}", kind(&other)),
        )),
    }
}

fn parse_lines(
    path: &Path,
    content: &str,
    whole: &serde_json::Error,
) -> Result<(Vec<Value>, Vec<Warning>)> {
    let mut entries = Vec::new();
    let mut warnings = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match serde_json::from_str::<Value>(line) {
            Ok(value) => entries.push(value),
            Err(e) => {
                warn!(path = %path.display(), line = index + 1, error = %e, "Skipping invalid JSON line");
                warnings.push(Warning::SkippedLine {
                    line: index + 1,
                    message: e.to_string(),
                });
            },
        }
    }

    if entries.is_empty() {
        return Err(IngestError::malformed(
            path,
            format!("neither a JSON document nor JSON lines: {}", whole),
        ));
    }

    debug!(
        shape = "lines",
        documents = entries.len(),
        skipped = warnings.len(),
        "Detected JSON shape"
    );
    Ok((entries, warnings))
}

/// Union of field names across records, in first-seen order
fn discovered_fields(records: &[Record]) -> Vec<&str> {
    let mut fields: Vec<&str> = Vec::new();
    if records.iter().any(Record::has_id) {
        fields.push(ID_FIELD);
    }
    for record in records {
        for name in record.field_names() {
            if !fields.contains(&name) {
                fields.push(name);
            }
        }
    }
    fields
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
