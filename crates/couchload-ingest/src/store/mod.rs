//! Destination database access
//!
//! The pipeline only needs two capabilities from the destination: checking or
//! creating a collection, and writing a batch through the bulk endpoint. They
//! are separate traits so a test double can script each one independently.

pub mod couch;
pub mod endpoints;
pub mod mock;

pub use couch::CouchClient;
pub use mock::{MockCall, MockCouch};

use crate::error::TransportError;
use crate::record::Record;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Answer to an existence probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeStatus {
    Exists,
    NotFound,
    Unexpected { status: u16, body: String },
}

/// Answer to a create request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateStatus {
    Created,
    Refused { status: u16, body: String },
}

/// One entry of the bulk endpoint's positional result array
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ok: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl DocResult {
    pub fn accepted(id: impl Into<String>, rev: impl Into<String>) -> Self {
        Self {
            ok: Some(true),
            id: Some(id.into()),
            rev: Some(rev.into()),
            ..Self::default()
        }
    }

    pub fn rejected(id: Option<String>, error: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id,
            error: Some(error.into()),
            reason: Some(reason.into()),
            ..Self::default()
        }
    }

    /// A result is a success unless it names an error or says `ok: false`
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.ok != Some(false)
    }
}

/// Answer to a bulk write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkReply {
    /// Endpoint accepted the request; one result per document sent
    Results(Vec<DocResult>),
    /// Endpoint refused the request as a whole
    Refused { status: u16, body: String },
}

/// Collection existence check and creation
#[async_trait]
pub trait CollectionApi: Send + Sync {
    async fn probe(&self, collection: &str) -> Result<ProbeStatus, TransportError>;

    async fn create(&self, collection: &str) -> Result<CreateStatus, TransportError>;
}

/// Bulk document writes
#[async_trait]
pub trait BulkApi: Send + Sync {
    async fn bulk_docs(
        &self,
        collection: &str,
        docs: &[&Record],
    ) -> Result<BulkReply, TransportError>;
}

/// Everything the pipeline needs from a destination
pub trait DocumentStore: CollectionApi + BulkApi {}

impl<T: CollectionApi + BulkApi + ?Sized> DocumentStore for T {}

/// Longest response body kept in statuses and messages
pub const MAX_BODY_EXCERPT: usize = 512;

/// Cut a response body down to [`MAX_BODY_EXCERPT`] characters
pub fn body_excerpt(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(MAX_BODY_EXCERPT) {
        Some((cut, _)) => format!("{}...", &body[..cut]),
        None => body.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_result_deserializes_both_shapes() {
        let results: Vec<DocResult> = serde_json::from_str(
            r#"[
                {"ok": true, "id": "a", "rev": "1-abc"},
                {"id": "b", "error": "conflict", "reason": "Document update conflict."},
                {"ok": true}
            ]"#,
        )
        .unwrap();

        assert!(results[0].is_success());
        assert_eq!(results[0].rev.as_deref(), Some("1-abc"));
        assert!(!results[1].is_success());
        assert_eq!(results[1].error.as_deref(), Some("conflict"));
        assert!(results[2].is_success());
        assert_eq!(results[2].id, None);
    }

    #[test]
    fn test_ok_false_is_failure() {
        let result: DocResult = serde_json::from_str(r#"{"ok": false, "id": "x"}"#).unwrap();
        assert!(!result.is_success());
    }

    #[test]
    fn test_body_excerpt() {
        assert_eq!(body_excerpt("  short \n"), "short");
        let long = "é".repeat(MAX_BODY_EXCERPT + 10);
        let excerpt = body_excerpt(&long);
        assert!(excerpt.ends_with("..."));
        assert_eq!(excerpt.chars().count(), MAX_BODY_EXCERPT + 3);
    }
}
