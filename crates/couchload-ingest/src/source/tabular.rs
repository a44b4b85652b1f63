//! CSV reader
//!
//! The first row names the fields. Every following row becomes one record
//! whose values are kept as strings. Rows with a different column count and
//! repeated header names are malformed input.

use super::{check_id_field, SourceOutput};
use crate::error::{IngestError, Result};
use crate::record::Record;
use serde_json::Value;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Read a CSV file
pub fn read(path: &Path, id_field: Option<&str>) -> Result<SourceOutput> {
    let file = File::open(path).map_err(|e| IngestError::io(path, e))?;
    parse(path, file, id_field)
}

/// Parse CSV from any reader; `path` is only used in errors
pub fn parse<R: Read>(path: &Path, input: R, id_field: Option<&str>) -> Result<SourceOutput> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(input);

    let headers = reader
        .headers()
        .map_err(|e| IngestError::malformed(path, e.to_string()))?
        .clone();

    let mut seen = HashSet::new();
    if let Some(name) = headers.iter().find(|name| !seen.insert(*name)) {
        return Err(IngestError::malformed(
            path,
            format!("duplicate column '{}' in header row", name),
        ));
    }

    check_id_field(path, id_field, headers.iter())?;

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(|e| IngestError::malformed(path, e.to_string()))?;

        let mut record = Record::new();
        for (name, value) in headers.iter().zip(row.iter()) {
            record.insert(name, Value::String(value.to_string()));
        }
        records.push(record);
    }

    debug!(
        path = %path.display(),
        columns = headers.len(),
        rows = records.len(),
        "Read CSV"
    );

    Ok(SourceOutput {
        records,
        warnings: Vec::new(),
    })
}
