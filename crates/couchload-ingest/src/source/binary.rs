//! Binary document reader
//!
//! One file becomes one record carrying the file name, a content-type tag,
//! whatever plain text could be extracted and the original bytes as an inline
//! attachment. Text extraction is best effort: any failure, including an
//! extractor that is not compiled in, falls back to [`NO_TEXT_PLACEHOLDER`].

use super::SourceOutput;
use crate::error::{IngestError, Result};
use crate::record::{Attachment, Record};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Stored as `extracted_text` when no text could be extracted
pub const NO_TEXT_PLACEHOLDER: &str = "[no extractable text content]";

/// Fallback MIME type for the attachment
pub const DEFAULT_MIME_TYPE: &str = "application/pdf";

/// Plain-text extraction capability
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> anyhow::Result<String>;
}

/// Extractor used when no text extraction is available
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTextExtractor;

impl TextExtractor for NoTextExtractor {
    fn extract(&self, _bytes: &[u8]) -> anyhow::Result<String> {
        anyhow::bail!("text extraction is not available in this build")
    }
}

/// PDF text extraction backed by `pdf-extract`
#[cfg(feature = "pdf")]
#[derive(Debug, Clone)]
pub struct PdfTextExtractor {
    timeout: std::time::Duration,
}

#[cfg(feature = "pdf")]
impl PdfTextExtractor {
    /// Default cap on extraction time; some fonts make `pdf-extract` spin
    pub const DEFAULT_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

    pub fn new() -> Self {
        Self {
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: std::time::Duration) -> Self {
        Self { timeout }
    }
}

#[cfg(feature = "pdf")]
impl Default for PdfTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "pdf")]
impl TextExtractor for PdfTextExtractor {
    fn extract(&self, bytes: &[u8]) -> anyhow::Result<String> {
        use std::sync::mpsc;

        // Run on a separate thread: a stuck or panicking extraction must not
        // take the import down with it.
        let data = bytes.to_vec();
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let _ = tx.send(pdf_extract::extract_text_from_mem(&data));
        });

        match rx.recv_timeout(self.timeout) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(anyhow::anyhow!("pdf-extract failed: {}", e)),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                anyhow::bail!("PDF text extraction timed out after {:?}", self.timeout)
            },
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                anyhow::bail!("PDF text extraction thread crashed")
            },
        }
    }
}

/// Extractor for the enabled feature set
pub fn default_extractor() -> Arc<dyn TextExtractor> {
    #[cfg(feature = "pdf")]
    {
        Arc::new(PdfTextExtractor::new())
    }
    #[cfg(not(feature = "pdf"))]
    {
        Arc::new(NoTextExtractor)
    }
}

/// Read a binary document from disk
pub fn read(path: &Path, extractor: &dyn TextExtractor) -> Result<SourceOutput> {
    let bytes = std::fs::read(path).map_err(|e| IngestError::io(path, e))?;
    parse(path, &bytes, extractor)
}

/// Build the record for a document's bytes; `path` supplies name and type
pub fn parse(path: &Path, bytes: &[u8], extractor: &dyn TextExtractor) -> Result<SourceOutput> {
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| IngestError::malformed(path, "path has no file name"))?;

    let type_tag = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let mime_type = mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(DEFAULT_MIME_TYPE)
        .to_string();

    let text = match extractor.extract(bytes) {
        Ok(text) => text.trim().to_string(),
        Err(e) => {
            warn!(file = %filename, error = %e, "Could not extract text, storing placeholder");
            String::new()
        },
    };
    let text = if text.is_empty() {
        NO_TEXT_PLACEHOLDER.to_string()
    } else {
        text
    };

    debug!(
        file = %filename,
        bytes = bytes.len(),
        text_chars = text.chars().count(),
        "Read binary document"
    );

    let mut record = Record::new();
    record.insert("filename", Value::String(filename.clone()));
    record.insert("content_type", Value::String(type_tag));
    record.insert("extracted_text", Value::String(text));
    let record = record.with_attachment(Attachment::from_bytes(filename, mime_type, bytes));

    Ok(SourceOutput {
        records: vec![record],
        warnings: Vec::new(),
    })
}
