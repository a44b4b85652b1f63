//! Progress reporting
//!
//! The pipeline never prints. It calls a [`ProgressSink`] at each state
//! transition, for every warning and after every batch; the sink decides
//! where that goes.

use crate::pipeline::PipelineState;
use crate::report::{Report, Warning};
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use tracing::{info, warn};

/// Counters for one finished batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// 1-based batch number
    pub batch: usize,
    pub batches: usize,
    pub records: usize,
    pub accepted: usize,
    pub rejected: usize,
}

/// Receiver for pipeline progress events. Every method defaults to a no-op.
pub trait ProgressSink: Send + Sync {
    fn state_changed(&self, _from: PipelineState, _to: PipelineState) {}

    fn warning(&self, _warning: &Warning) {}

    fn submission_started(&self, _records: usize, _batches: usize) {}

    fn batch_submitted(&self, _progress: &BatchProgress) {}

    fn finished(&self, _report: &Report) {}
}

/// Sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {}

/// Sink that forwards events to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn state_changed(&self, from: PipelineState, to: PipelineState) {
        info!(from = %from, to = %to, "Pipeline state changed");
    }

    fn warning(&self, warning: &Warning) {
        warn!(warning = %warning, "Import warning");
    }

    fn submission_started(&self, records: usize, batches: usize) {
        info!(records, batches, "Submitting records");
    }

    fn batch_submitted(&self, progress: &BatchProgress) {
        info!(
            batch = progress.batch,
            batches = progress.batches,
            records = progress.records,
            accepted = progress.accepted,
            rejected = progress.rejected,
            "Batch submitted"
        );
    }

    fn finished(&self, report: &Report) {
        info!(
            run_id = %report.run_id,
            submitted = report.total_submitted,
            accepted = report.total_accepted,
            rejected = report.total_rejected(),
            cancelled = report.cancelled,
            "Import finished"
        );
    }
}

/// Terminal progress bar over submitted records
#[derive(Default)]
pub struct ConsoleProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::default()
    }

    fn style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} records ({eta})")
            .map(|style| style.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
    }
}

impl ProgressSink for ConsoleProgress {
    fn warning(&self, warning: &Warning) {
        match self.bar.lock().as_ref() {
            Some(bar) => bar.println(format!("warning: {}", warning)),
            None => warn!(warning = %warning, "Import warning"),
        }
    }

    fn submission_started(&self, records: usize, batches: usize) {
        let bar = ProgressBar::new(records as u64);
        bar.set_style(Self::style());
        bar.set_message(format!("Submitting {} records in {} batch(es)", records, batches));
        *self.bar.lock() = Some(bar);
    }

    fn batch_submitted(&self, progress: &BatchProgress) {
        if let Some(bar) = self.bar.lock().as_ref() {
            bar.inc(progress.records as u64);
            if progress.rejected > 0 {
                bar.println(format!(
                    "batch {}/{}: {} rejected",
                    progress.batch, progress.batches, progress.rejected
                ));
            }
        }
    }

    fn finished(&self, _report: &Report) {
        if let Some(bar) = self.bar.lock().take() {
            bar.finish_and_clear();
        }
    }
}

/// Everything a [`RecordingProgress`] saw
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    StateChanged {
        from: PipelineState,
        to: PipelineState,
    },
    Warning(Warning),
    SubmissionStarted {
        records: usize,
        batches: usize,
    },
    BatchSubmitted(BatchProgress),
    Finished {
        accepted: usize,
        rejected: usize,
    },
}

/// Sink that keeps every event in memory
#[derive(Debug, Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().clone()
    }

    /// States entered, starting with the first state left
    pub fn states(&self) -> Vec<PipelineState> {
        let events = self.events.lock();
        let mut states = Vec::new();
        for event in events.iter() {
            if let ProgressEvent::StateChanged { from, to } = event {
                if states.is_empty() {
                    states.push(*from);
                }
                states.push(*to);
            }
        }
        states
    }

    pub fn batches(&self) -> Vec<BatchProgress> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                ProgressEvent::BatchSubmitted(progress) => Some(*progress),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ProgressEvent) {
        self.events.lock().push(event);
    }
}

impl ProgressSink for RecordingProgress {
    fn state_changed(&self, from: PipelineState, to: PipelineState) {
        self.push(ProgressEvent::StateChanged { from, to });
    }

    fn warning(&self, warning: &Warning) {
        self.push(ProgressEvent::Warning(warning.clone()));
    }

    fn submission_started(&self, records: usize, batches: usize) {
        self.push(ProgressEvent::SubmissionStarted { records, batches });
    }

    fn batch_submitted(&self, progress: &BatchProgress) {
        self.push(ProgressEvent::BatchSubmitted(*progress));
    }

    fn finished(&self, report: &Report) {
        self.push(ProgressEvent::Finished {
            accepted: report.total_accepted,
            rejected: report.total_rejected(),
        });
    }
}
