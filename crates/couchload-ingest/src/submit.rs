//! Bulk submission and reconciliation
//!
//! Records are cut into order-preserving batches and written one batch at a
//! time. A 2xx from the bulk endpoint only means the request was understood:
//! the body lists one result per document, in the order sent, and every entry
//! is checked to find the documents that were actually refused.
//!
//! Failure handling per batch:
//!
//! | What happened                         | Effect                               |
//! |---------------------------------------|--------------------------------------|
//! | result entry with `error`             | that record rejected                 |
//! | timeout, connection error, HTTP 5xx   | every record of the batch rejected   |
//! | HTTP 401 / 403                        | run aborted, later batches not sent  |

use crate::error::{IngestError, Rejection, Result, TransportError};
use crate::progress::{BatchProgress, ProgressSink};
use crate::record::Record;
use crate::report::Outcome;
use crate::store::{BulkApi, BulkReply, DocResult};
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Default maximum number of records per bulk call
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Default timeout for one bulk call
pub const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);

/// A slice of the record sequence sent in one bulk call
#[derive(Debug, Clone, Copy)]
pub struct Batch<'r> {
    /// 0-based batch index
    pub index: usize,
    /// Index of the first record within the whole sequence
    pub offset: usize,
    pub records: &'r [Record],
}

impl Batch<'_> {
    /// 1-based batch number for messages
    pub fn number(&self) -> usize {
        self.index + 1
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Split records into consecutive batches of at most `max` records
pub fn partition(records: &[Record], max: usize) -> Vec<Batch<'_>> {
    let max = max.max(1);
    records
        .chunks(max)
        .enumerate()
        .map(|(index, records)| Batch {
            index,
            offset: index * max,
            records,
        })
        .collect()
}

/// Outcome of submitting a whole record sequence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitSummary {
    /// One outcome per record of every batch that was processed
    pub outcomes: Vec<Outcome>,
    pub batches_submitted: usize,
    /// Records never sent because the run was cancelled
    pub not_submitted: usize,
    pub cancelled: bool,
}

pub struct BulkSubmitter<'a, B: BulkApi + ?Sized> {
    api: &'a B,
    batch_size: usize,
    timeout: Duration,
}

impl<'a, B: BulkApi + ?Sized> BulkSubmitter<'a, B> {
    pub fn new(api: &'a B, batch_size: usize, timeout: Duration) -> Self {
        Self {
            api,
            batch_size: batch_size.max(1),
            timeout,
        }
    }

    /// Submit every record, one batch after the other.
    ///
    /// Cancellation is checked before each batch; a batch in flight is always
    /// allowed to finish.
    pub async fn submit_all(
        &self,
        collection: &str,
        records: &[Record],
        cancel: &CancellationToken,
        progress: &dyn ProgressSink,
    ) -> Result<SubmitSummary> {
        let batches = partition(records, self.batch_size);
        let mut summary = SubmitSummary::default();

        progress.submission_started(records.len(), batches.len());

        for batch in &batches {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                summary.not_submitted = records.len() - batch.offset;
                info!(
                    batch = batch.number(),
                    not_submitted = summary.not_submitted,
                    "Cancelled before batch"
                );
                break;
            }

            let outcomes = self.submit_batch(collection, batch).await?;
            let accepted = outcomes.iter().filter(|o| o.is_accepted()).count();

            progress.batch_submitted(&BatchProgress {
                batch: batch.number(),
                batches: batches.len(),
                records: batch.len(),
                accepted,
                rejected: outcomes.len() - accepted,
            });

            summary.batches_submitted += 1;
            summary.outcomes.extend(outcomes);
        }

        Ok(summary)
    }

    /// Submit one batch and reconcile the reply.
    ///
    /// Only a refused authorization is an error; every other failure turns
    /// into rejected outcomes for this batch's records.
    pub async fn submit_batch(&self, collection: &str, batch: &Batch<'_>) -> Result<Vec<Outcome>> {
        let (sent, mut outcomes) = screen_duplicates(batch);

        if !sent.is_empty() {
            let docs: Vec<&Record> = sent.iter().map(|(_, record)| *record).collect();

            let reply = tokio::time::timeout(self.timeout, self.api.bulk_docs(collection, &docs))
                .await
                .map_err(|_| TransportError::Timeout(self.timeout))
                .and_then(|reply| reply);

            match reply {
                Ok(BulkReply::Results(results)) => {
                    outcomes.extend(reconcile(&sent, results));
                },
                Ok(BulkReply::Refused { status, body }) if status == 401 || status == 403 => {
                    warn!(batch = batch.number(), status, "Bulk write not authorized, aborting");
                    return Err(IngestError::SubmissionAborted {
                        batch: batch.number(),
                        status,
                        body,
                    });
                },
                Ok(BulkReply::Refused { status, body }) => {
                    warn!(batch = batch.number(), status, "Bulk write refused, rejecting batch");
                    outcomes.extend(reject_all(&sent, format!("HTTP {}: {}", status, body)));
                },
                Err(e) => {
                    warn!(batch = batch.number(), error = %e, "Bulk write failed, rejecting batch");
                    outcomes.extend(reject_all(&sent, e.to_string()));
                },
            }
        }

        outcomes.sort_by_key(|outcome| outcome.position);

        let accepted = outcomes.iter().filter(|o| o.is_accepted()).count();
        info!(
            collection = %collection,
            batch = batch.number(),
            records = batch.len(),
            accepted,
            rejected = outcomes.len() - accepted,
            "Batch reconciled"
        );

        Ok(outcomes)
    }
}

/// Split a batch into records to send and local rejections for identifiers
/// already used earlier in the same batch. Positions are 1-based within the run.
fn screen_duplicates<'r>(batch: &Batch<'r>) -> (Vec<(usize, &'r Record)>, Vec<Outcome>) {
    let mut seen = HashSet::new();
    let mut sent = Vec::with_capacity(batch.len());
    let mut rejected = Vec::new();

    for (i, record) in batch.records.iter().enumerate() {
        let position = batch.offset + i + 1;
        if let Some(id) = record.id() {
            if !seen.insert(id) {
                warn!(identifier = %id, position, "Duplicate identifier within batch, not sent");
                rejected.push(Outcome::rejected(
                    position,
                    Some(id.to_string()),
                    Rejection::DuplicateInBatch,
                ));
                continue;
            }
        }
        sent.push((position, record));
    }

    (sent, rejected)
}

fn reject_all(sent: &[(usize, &Record)], message: String) -> Vec<Outcome> {
    sent.iter()
        .map(|(position, record)| {
            Outcome::rejected(
                *position,
                record.id().map(str::to_string),
                Rejection::Transport {
                    message: message.clone(),
                },
            )
        })
        .collect()
}

/// Match bulk results to the records sent, by position.
///
/// Records without a matching result are rejected with
/// [`Rejection::MissingResult`]; surplus results are ignored. A record sent
/// without an identifier takes the one the destination assigned.
pub fn reconcile(sent: &[(usize, &Record)], results: Vec<DocResult>) -> Vec<Outcome> {
    if results.len() != sent.len() {
        warn!(
            sent = sent.len(),
            results = results.len(),
            "Bulk reply length does not match documents sent"
        );
    }

    let mut results = results.into_iter();

    sent.iter()
        .map(|&(position, record)| {
            let Some(result) = results.next() else {
                return Outcome::rejected(
                    position,
                    record.id().map(str::to_string),
                    Rejection::MissingResult,
                );
            };

            let identifier = match (record.id(), result.id.as_deref()) {
                (Some(sent_id), Some(returned)) if sent_id != returned => {
                    warn!(position, sent = %sent_id, returned = %returned, "Bulk result identifier mismatch");
                    Some(sent_id.to_string())
                },
                (Some(sent_id), _) => Some(sent_id.to_string()),
                (None, returned) => returned.map(str::to_string),
            };

            if result.is_success() {
                Outcome::accepted(position, identifier)
            } else {
                let rejection = Rejection::Document {
                    error: result.error.unwrap_or_else(|| "unknown_error".to_string()),
                    reason: result.reason,
                };
                Outcome::rejected(position, identifier, rejection)
            }
        })
        .collect()
}
