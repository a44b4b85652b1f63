//! Source readers
//!
//! A [`SourceDescriptor`] pins down the file, its format and the optional
//! identifier field once. The format is decided by the file extension alone
//! and is never re-checked downstream.
//!
//! | Extension                   | Format                          |
//! |-----------------------------|---------------------------------|
//! | `.csv`                      | [`SourceFormat::Tabular`]       |
//! | `.json`, `.jsonl`, `.ndjson` | [`SourceFormat::Structured`]    |
//! | `.pdf`                      | [`SourceFormat::BinaryDocument`] |

pub mod binary;
pub mod structured;
pub mod tabular;

pub use binary::{default_extractor, NoTextExtractor, TextExtractor};
#[cfg(feature = "pdf")]
pub use binary::PdfTextExtractor;

use crate::error::{IngestError, Result};
use crate::record::Record;
use crate::report::Warning;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Input shape of a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// Delimited text with a header row
    Tabular,
    /// JSON document or JSON lines
    Structured,
    /// Opaque document embedded as an attachment
    BinaryDocument,
}

impl SourceFormat {
    /// Detect the format from a path's extension (case-insensitive)
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "csv" => Ok(SourceFormat::Tabular),
            "json" | "jsonl" | "ndjson" => Ok(SourceFormat::Structured),
            "pdf" => Ok(SourceFormat::BinaryDocument),
            _ => Err(IngestError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension,
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Tabular => "tabular",
            SourceFormat::Structured => "structured",
            SourceFormat::BinaryDocument => "binary_document",
        }
    }

    /// Whether records without an identifier get their 1-based position.
    ///
    /// Binary documents yield a single record per file, so a positional
    /// identifier would collide across imports.
    pub fn assigns_positional_ids(&self) -> bool {
        !matches!(self, SourceFormat::BinaryDocument)
    }

    /// Whether a caller-supplied identifier field applies to this format
    pub fn honours_id_field(&self) -> bool {
        !matches!(self, SourceFormat::BinaryDocument)
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved input: location, detected format and identifier field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    location: PathBuf,
    format: SourceFormat,
    id_field: Option<String>,
}

impl SourceDescriptor {
    /// Resolve a source, failing with `UnsupportedFormat` for unknown extensions.
    ///
    /// An empty identifier-field name is treated as absent.
    pub fn resolve(location: impl Into<PathBuf>, id_field: Option<String>) -> Result<Self> {
        let location = location.into();
        let format = SourceFormat::from_path(&location)?;
        let id_field = id_field.filter(|field| !field.is_empty());

        Ok(Self {
            location,
            format,
            id_field,
        })
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    /// Identifier field as requested by the caller
    pub fn id_field(&self) -> Option<&str> {
        self.id_field.as_deref()
    }

    /// Identifier field as it applies to this source's format
    pub fn effective_id_field(&self) -> Option<&str> {
        self.id_field().filter(|_| self.format.honours_id_field())
    }
}

/// Everything a reader produced from one source
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceOutput {
    pub records: Vec<Record>,
    /// Recoverable problems, e.g. skipped JSON lines
    pub warnings: Vec<Warning>,
}

/// Read a source with the reader its format selects
pub fn read_source(
    descriptor: &SourceDescriptor,
    extractor: &dyn TextExtractor,
) -> Result<SourceOutput> {
    let path = descriptor.location();
    match descriptor.format() {
        SourceFormat::Tabular => tabular::read(path, descriptor.id_field()),
        SourceFormat::Structured => structured::read(path, descriptor.id_field()),
        SourceFormat::BinaryDocument => binary::read(path, extractor),
    }
}

/// Fail with `Schema` when `id_field` is not among the discovered fields
pub(crate) fn check_id_field<'a>(
    path: &Path,
    id_field: Option<&str>,
    available: impl IntoIterator<Item = &'a str>,
) -> Result<()> {
    let Some(field) = id_field else {
        return Ok(());
    };

    let available: Vec<String> = available.into_iter().map(str::to_string).collect();
    if available.iter().any(|name| name == field) {
        return Ok(());
    }

    Err(IngestError::Schema {
        path: path.to_path_buf(),
        field: field.to_string(),
        available,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection() {
        let cases = [
            ("people.csv", SourceFormat::Tabular),
            ("PEOPLE.CSV", SourceFormat::Tabular),
            ("docs.json", SourceFormat::Structured),
            ("events.jsonl", SourceFormat::Structured),
            ("events.ndjson", SourceFormat::Structured),
            ("manual.Pdf", SourceFormat::BinaryDocument),
        ];

        for (name, expected) in cases {
            assert_eq!(SourceFormat::from_path(Path::new(name)).unwrap(), expected, "{}", name);
        }
    }

    #[test]
    fn test_unknown_extension_is_unsupported() {
        for name in ["notes.txt", "archive.tar.gz", "Makefile"] {
            let err = SourceFormat::from_path(Path::new(name)).unwrap_err();
            assert!(matches!(err, IngestError::UnsupportedFormat { .. }), "{}", name);
        }
    }

    #[test]
    fn test_descriptor_drops_empty_id_field() {
        let descriptor = SourceDescriptor::resolve("a.csv", Some(String::new())).unwrap();
        assert_eq!(descriptor.id_field(), None);
    }

    #[test]
    fn test_binary_documents_ignore_id_field() {
        let descriptor = SourceDescriptor::resolve("a.pdf", Some("sku".to_string())).unwrap();
        assert_eq!(descriptor.id_field(), Some("sku"));
        assert_eq!(descriptor.effective_id_field(), None);
        assert!(!descriptor.format().assigns_positional_ids());
    }

    #[test]
    fn test_check_id_field() {
        let path = Path::new("a.csv");
        assert!(check_id_field(path, None, ["a"]).is_ok());
        assert!(check_id_field(path, Some("a"), ["a", "b"]).is_ok());

        let err = check_id_field(path, Some("c"), ["a", "b"]).unwrap_err();
        match err {
            IngestError::Schema { field, available, .. } => {
                assert_eq!(field, "c");
                assert_eq!(available, vec!["a", "b"]);
            },
            other => panic!("unexpected error: {other}"),
        }
    }
}
