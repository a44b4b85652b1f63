//! Scripted in-memory destination
//!
//! Replies are queued per operation and consumed in FIFO order. When a queue
//! is empty the mock behaves like a healthy server: the collection exists and
//! every document is accepted.
//!
//! ```ignore
//! let couch = MockCouch::new();
//! couch.push_probe(ProbeStatus::NotFound);
//! couch.push_create(CreateStatus::Created);
//! couch.push_bulk(BulkReply::Results(vec![DocResult::accepted("1", "1-a")]));
//! ```

use super::{BulkApi, BulkReply, CollectionApi, CreateStatus, DocResult, ProbeStatus};
use crate::error::TransportError;
use crate::record::Record;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;

/// Record of a call made to the mock
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Probe { collection: String },
    Create { collection: String },
    Bulk { collection: String, docs: Vec<Value> },
}

enum Scripted<T> {
    Reply(T),
    Fail(String),
    /// Never completes; lets callers exercise their timeouts
    Hang,
}

#[derive(Default)]
struct MockState {
    probes: VecDeque<Scripted<ProbeStatus>>,
    creates: VecDeque<Scripted<CreateStatus>>,
    bulks: VecDeque<Scripted<BulkReply>>,
    calls: Vec<MockCall>,
    revision: usize,
}

#[derive(Clone, Default)]
pub struct MockCouch {
    state: Arc<Mutex<MockState>>,
}

impl MockCouch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_probe(&self, status: ProbeStatus) {
        self.state.lock().probes.push_back(Scripted::Reply(status));
    }

    pub fn fail_probe(&self, message: &str) {
        self.state
            .lock()
            .probes
            .push_back(Scripted::Fail(message.to_string()));
    }

    pub fn hang_probe(&self) {
        self.state.lock().probes.push_back(Scripted::Hang);
    }

    pub fn push_create(&self, status: CreateStatus) {
        self.state.lock().creates.push_back(Scripted::Reply(status));
    }

    pub fn push_bulk(&self, reply: BulkReply) {
        self.state.lock().bulks.push_back(Scripted::Reply(reply));
    }

    /// Queue a successful bulk reply carrying these results
    pub fn push_bulk_results(&self, results: Vec<DocResult>) {
        self.push_bulk(BulkReply::Results(results));
    }

    pub fn fail_bulk(&self, message: &str) {
        self.state
            .lock()
            .bulks
            .push_back(Scripted::Fail(message.to_string()));
    }

    pub fn hang_bulk(&self) {
        self.state.lock().bulks.push_back(Scripted::Hang);
    }

    /// All calls made so far, in order
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().calls.clone()
    }

    /// Documents sent with each bulk call, in order
    pub fn bulk_calls(&self) -> Vec<Vec<Value>> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                MockCall::Bulk { docs, .. } => Some(docs.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn create_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, MockCall::Create { .. }))
            .count()
    }

    fn accept_all(state: &mut MockState, docs: &[&Record]) -> BulkReply {
        let results = docs
            .iter()
            .map(|doc| {
                state.revision += 1;
                let id = doc
                    .id()
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("generated-{}", state.revision));
                DocResult::accepted(id, format!("1-{:08x}", state.revision))
            })
            .collect();
        BulkReply::Results(results)
    }
}

async fn resolve<T>(scripted: Scripted<T>) -> Result<T, TransportError> {
    match scripted {
        Scripted::Reply(reply) => Ok(reply),
        Scripted::Fail(message) => Err(TransportError::Connection(message)),
        Scripted::Hang => std::future::pending().await,
    }
}

#[async_trait]
impl CollectionApi for MockCouch {
    async fn probe(&self, collection: &str) -> Result<ProbeStatus, TransportError> {
        let scripted = {
            let mut state = self.state.lock();
            state.calls.push(MockCall::Probe {
                collection: collection.to_string(),
            });
            state
                .probes
                .pop_front()
                .unwrap_or(Scripted::Reply(ProbeStatus::Exists))
        };
        resolve(scripted).await
    }

    async fn create(&self, collection: &str) -> Result<CreateStatus, TransportError> {
        let scripted = {
            let mut state = self.state.lock();
            state.calls.push(MockCall::Create {
                collection: collection.to_string(),
            });
            state
                .creates
                .pop_front()
                .unwrap_or(Scripted::Reply(CreateStatus::Created))
        };
        resolve(scripted).await
    }
}

#[async_trait]
impl BulkApi for MockCouch {
    async fn bulk_docs(
        &self,
        collection: &str,
        docs: &[&Record],
    ) -> Result<BulkReply, TransportError> {
        let rendered = docs
            .iter()
            .map(|doc| doc.to_document())
            .collect::<Result<Vec<_>, _>>()?;

        let scripted = {
            let mut state = self.state.lock();
            state.calls.push(MockCall::Bulk {
                collection: collection.to_string(),
                docs: rendered,
            });
            match state.bulks.pop_front() {
                Some(scripted) => scripted,
                None => Scripted::Reply(Self::accept_all(&mut state, docs)),
            }
        };
        resolve(scripted).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_defaults_behave_like_healthy_server() {
        let couch = MockCouch::new();
        assert_eq!(couch.probe("db").await.unwrap(), ProbeStatus::Exists);
        assert_eq!(couch.create("db").await.unwrap(), CreateStatus::Created);

        let mut record = Record::new();
        record.insert("_id", json!("a"));
        let anonymous = Record::new();

        match couch.bulk_docs("db", &[&record, &anonymous]).await.unwrap() {
            BulkReply::Results(results) => {
                assert_eq!(results.len(), 2);
                assert_eq!(results[0].id.as_deref(), Some("a"));
                assert!(results[1].id.as_deref().unwrap().starts_with("generated-"));
            },
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_scripted_replies_in_order() {
        let couch = MockCouch::new();
        couch.push_probe(ProbeStatus::NotFound);
        couch.fail_probe("connection refused");

        assert_eq!(couch.probe("db").await.unwrap(), ProbeStatus::NotFound);
        assert!(matches!(
            couch.probe("db").await.unwrap_err(),
            TransportError::Connection(_)
        ));
        assert_eq!(couch.probe("db").await.unwrap(), ProbeStatus::Exists);
    }

    #[tokio::test]
    async fn test_bulk_calls_are_recorded() {
        let couch = MockCouch::new();
        let mut record = Record::new();
        record.insert("_id", json!("x"));
        record.insert("n", json!(1));

        couch.bulk_docs("db", &[&record]).await.unwrap();

        assert_eq!(couch.bulk_calls(), vec![vec![json!({"_id": "x", "n": 1})]]);
        assert_eq!(couch.calls().len(), 1);
    }
}
