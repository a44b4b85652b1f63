//! Error types for couchload ingestion
//!
//! Errors are split by how far they reach:
//!
//! - [`IngestError`] ends a run. The pipeline aborts and hands exactly one of
//!   these back to the caller.
//! - [`TransportError`] fails a single batch. Its records are rejected and the
//!   run carries on with the next batch.
//! - [`Rejection`] is a per-document outcome recorded in the report.

use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Terminal error for an import run
#[derive(Error, Debug)]
pub enum IngestError {
    /// File extension does not map to a known source format
    #[error("Unsupported file format '{extension}' for {}. Use .csv, .json, .jsonl, .ndjson or .pdf.", .path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// Content could not be parsed as the detected format
    #[error("Malformed input in {}: {message}", .path.display())]
    MalformedInput { path: PathBuf, message: String },

    /// Requested identifier field does not exist in the source
    #[error("Identifier field '{field}' does not exist in {} (available fields: {})", .path.display(), .available.join(", "))]
    Schema {
        path: PathBuf,
        field: String,
        available: Vec<String>,
    },

    /// Destination collection could not be verified or created
    #[error("Collection '{collection}' is not usable: {source}")]
    Guard {
        collection: String,
        #[source]
        source: GuardError,
    },

    /// A batch submission failed in a way every later batch would repeat
    #[error("Submission aborted at batch {batch}: HTTP {status}: {body}")]
    SubmissionAborted { batch: usize, status: u16, body: String },

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reading the source file failed
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IngestError {
    /// Create a malformed input error
    pub fn malformed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::MalformedInput {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an IO error bound to the file it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Why the collection guard refused to let a run proceed
#[derive(Error, Debug)]
pub enum GuardError {
    #[error("endpoint unreachable: {0}")]
    Unreachable(#[source] TransportError),

    #[error("probe/create timed out after {0:?}")]
    Timeout(Duration),

    #[error("unexpected probe response HTTP {status}: {body}")]
    UnexpectedProbe { status: u16, body: String },

    #[error("create refused with HTTP {status}: {body}")]
    CreateFailed { status: u16, body: String },
}

/// A request that could not be completed at the HTTP level
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("request body could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Why a single document did not make it into the collection
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Rejection {
    /// The destination refused the document (e.g. `conflict`, `forbidden`)
    #[error("{error}")]
    Document {
        error: String,
        reason: Option<String>,
    },

    /// The batch carrying this document failed in transit
    #[error("transport: {message}")]
    Transport { message: String },

    /// Another document earlier in the same batch has this identifier
    #[error("duplicate identifier within batch")]
    DuplicateInBatch,

    /// The bulk reply was shorter than the batch
    #[error("no result returned by bulk endpoint")]
    MissingResult,
}

impl Rejection {
    /// Short machine-friendly reason, e.g. `conflict`
    pub fn reason(&self) -> String {
        match self {
            Rejection::Document { error, .. } => error.clone(),
            Rejection::Transport { .. } => "transport".to_string(),
            Rejection::DuplicateInBatch => "duplicate_in_batch".to_string(),
            Rejection::MissingResult => "missing_result".to_string(),
        }
    }

    /// Longer human-readable explanation, when one exists
    pub fn detail(&self) -> Option<String> {
        match self {
            Rejection::Document { reason, .. } => reason.clone(),
            Rejection::Transport { message } => Some(message.clone()),
            Rejection::DuplicateInBatch | Rejection::MissingResult => Some(self.to_string()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_format_message_lists_extensions() {
        let err = IngestError::UnsupportedFormat {
            path: PathBuf::from("notes.txt"),
            extension: "txt".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'txt'"));
        assert!(msg.contains(".csv"));
    }

    #[test]
    fn test_schema_message_lists_available_fields() {
        let err = IngestError::Schema {
            path: PathBuf::from("people.csv"),
            field: "sku".to_string(),
            available: vec!["id".to_string(), "name".to_string()],
        };
        assert!(err.to_string().contains("id, name"));
    }

    #[test]
    fn test_rejection_reason_and_detail() {
        let conflict = Rejection::Document {
            error: "conflict".to_string(),
            reason: Some("Document update conflict.".to_string()),
        };
        assert_eq!(conflict.reason(), "conflict");
        assert_eq!(conflict.detail().as_deref(), Some("Document update conflict."));

        let transport = Rejection::Transport {
            message: "HTTP 500".to_string(),
        };
        assert_eq!(transport.reason(), "transport");
        assert_eq!(transport.detail().as_deref(), Some("HTTP 500"));
    }

    #[test]
    fn test_rejection_serializes_with_kind_tag() {
        let json = serde_json::to_value(Rejection::DuplicateInBatch).unwrap();
        assert_eq!(json["kind"], "duplicate_in_batch");
    }
}
