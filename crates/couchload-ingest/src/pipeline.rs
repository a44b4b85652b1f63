//! Import orchestration
//!
//! ```text
//! Idle -> GuardingCollection -> Reading -> Normalizing -> Submitting -> Reported
//!               |                  |                          |
//!               +------------------+--------------------------+--> Aborted
//! ```
//!
//! A [`Pipeline`] runs exactly once. It owns all mutable state of its run and
//! is consumed by [`Pipeline::run`], which returns either the [`Report`] or
//! the single error that aborted the run.

use crate::error::{IngestError, Result};
use crate::guard::{CollectionGuard, DEFAULT_GUARD_TIMEOUT};
use crate::normalize::Normalizer;
use crate::progress::{ProgressSink, TracingProgress};
use crate::report::Report;
use crate::source::{default_extractor, read_source, SourceDescriptor, TextExtractor};
use crate::store::DocumentStore;
use crate::submit::{BulkSubmitter, DEFAULT_BATCH_SIZE, DEFAULT_SUBMIT_TIMEOUT};
use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    GuardingCollection,
    Reading,
    Normalizing,
    Submitting,
    Reported,
    Aborted,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::GuardingCollection => "guarding_collection",
            PipelineState::Reading => "reading",
            PipelineState::Normalizing => "normalizing",
            PipelineState::Submitting => "submitting",
            PipelineState::Reported => "reported",
            PipelineState::Aborted => "aborted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Reported | PipelineState::Aborted)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tunables for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub batch_size: usize,
    /// Applied to each collection probe and create
    pub guard_timeout: Duration,
    /// Applied to each bulk call
    pub submit_timeout: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            guard_timeout: DEFAULT_GUARD_TIMEOUT,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
        }
    }
}

/// One import of one source into one collection
pub struct Pipeline<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    collection: String,
    descriptor: SourceDescriptor,
    options: PipelineOptions,
    progress: Arc<dyn ProgressSink>,
    extractor: Arc<dyn TextExtractor>,
    cancel: CancellationToken,
    run_id: Uuid,
    state: PipelineState,
}

impl<'a, S: DocumentStore + ?Sized> Pipeline<'a, S> {
    pub fn new(
        store: &'a S,
        collection: impl Into<String>,
        descriptor: SourceDescriptor,
        options: PipelineOptions,
    ) -> Result<Self> {
        let collection = collection.into();
        if collection.trim().is_empty() {
            return Err(IngestError::config("collection name must not be empty"));
        }
        if options.batch_size == 0 {
            return Err(IngestError::config("batch size must be at least 1"));
        }

        Ok(Self {
            store,
            collection,
            descriptor,
            options,
            progress: Arc::new(TracingProgress),
            extractor: default_extractor(),
            cancel: CancellationToken::new(),
            run_id: Uuid::new_v4(),
            state: PipelineState::Idle,
        })
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Token checked before every batch
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Run the import to completion
    pub async fn run(mut self) -> Result<Report> {
        let span = info_span!(
            "import",
            run_id = %self.run_id,
            collection = %self.collection,
            source = %self.descriptor.location().display(),
        );
        async move { self.execute().await }.instrument(span).await
    }

    async fn execute(&mut self) -> Result<Report> {
        let started_at = Utc::now();
        let store = self.store;

        self.transition(PipelineState::GuardingCollection);
        let guarded = CollectionGuard::new(store, self.options.guard_timeout)
            .ensure(&self.collection)
            .await;
        if let Err(source) = guarded {
            return Err(self.abort(IngestError::Guard {
                collection: self.collection.clone(),
                source,
            }));
        }

        self.transition(PipelineState::Reading);
        let output = match read_source(&self.descriptor, self.extractor.as_ref()) {
            Ok(output) => output,
            Err(e) => return Err(self.abort(e)),
        };
        info!(
            format = %self.descriptor.format(),
            records = output.records.len(),
            skipped = output.warnings.len(),
            "Source read"
        );

        self.transition(PipelineState::Normalizing);
        let format = self.descriptor.format();
        let normalized = Normalizer::new(
            self.descriptor.effective_id_field(),
            format.assigns_positional_ids(),
        )
        .normalize(output.records);

        let mut warnings = output.warnings;
        warnings.extend(normalized.warnings);
        for warning in &warnings {
            self.progress.warning(warning);
        }

        self.transition(PipelineState::Submitting);
        let mut report = Report::new(
            self.run_id,
            self.collection.clone(),
            self.descriptor.location(),
            format,
            started_at,
        );
        report.warnings = warnings;

        if normalized.records.is_empty() {
            info!("No records to submit");
        } else {
            let submitter =
                BulkSubmitter::new(store, self.options.batch_size, self.options.submit_timeout);
            let submitted = submitter
                .submit_all(
                    &self.collection,
                    &normalized.records,
                    &self.cancel,
                    self.progress.as_ref(),
                )
                .await;
            let summary = match submitted {
                Ok(summary) => summary,
                Err(e) => return Err(self.abort(e)),
            };

            report.record_outcomes(summary.outcomes);
            report.not_submitted = summary.not_submitted;
            report.cancelled = summary.cancelled;
        }

        report.finished_at = Utc::now();
        self.transition(PipelineState::Reported);
        self.progress.finished(&report);

        info!(
            submitted = report.total_submitted,
            accepted = report.total_accepted,
            rejected = report.total_rejected(),
            cancelled = report.cancelled,
            "Import reported"
        );

        Ok(report)
    }

    fn transition(&mut self, to: PipelineState) {
        let from = self.state;
        self.state = to;
        self.progress.state_changed(from, to);
    }

    fn abort(&mut self, err: IngestError) -> IngestError {
        error!(state = %self.state, error = %err, "Import aborted");
        self.transition(PipelineState::Aborted);
        err
    }
}
