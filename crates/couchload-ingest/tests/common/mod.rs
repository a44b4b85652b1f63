//! Shared fixtures for integration tests

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use couchload_ingest::source::TextExtractor;
use couchload_ingest::SourceDescriptor;
use std::path::PathBuf;
use tempfile::TempDir;

/// Write `content` to `name` inside a fresh temporary directory
pub fn fixture(name: &str, content: impl AsRef<[u8]>) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    (dir, path)
}

/// Write a fixture and resolve it as a source
pub fn source(
    name: &str,
    content: impl AsRef<[u8]>,
    id_field: Option<&str>,
) -> (TempDir, SourceDescriptor) {
    let (dir, path) = fixture(name, content);
    let descriptor = SourceDescriptor::resolve(path, id_field.map(str::to_string)).unwrap();
    (dir, descriptor)
}

/// Extractor returning fixed text, for PDF fixtures that are not real PDFs
pub struct FixedText(pub &'static str);

impl TextExtractor for FixedText {
    fn extract(&self, _bytes: &[u8]) -> anyhow::Result<String> {
        Ok(self.0.to_string())
    }
}

/// Extractor that always fails
pub struct FailingExtractor;

impl TextExtractor for FailingExtractor {
    fn extract(&self, _bytes: &[u8]) -> anyhow::Result<String> {
        anyhow::bail!("encrypted document")
    }
}
