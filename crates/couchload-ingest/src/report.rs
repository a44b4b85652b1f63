//! Run report
//!
//! A [`Report`] is built fresh for every run and is the only thing a run hands
//! back on success. It lists every rejected document with its reason, even
//! when the bulk endpoint answered each call with a success status.

use crate::error::Rejection;
use crate::source::SourceFormat;
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use std::fmt::{self, Write as _};
use std::path::PathBuf;
use uuid::Uuid;

/// Per-record submission result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    /// 1-based position of the record within the run
    pub position: usize,
    /// Identifier sent, or the one the destination assigned
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
}

impl Outcome {
    pub fn accepted(position: usize, identifier: Option<String>) -> Self {
        Self {
            position,
            identifier,
            rejection: None,
        }
    }

    pub fn rejected(position: usize, identifier: Option<String>, rejection: Rejection) -> Self {
        Self {
            position,
            identifier,
            rejection: Some(rejection),
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.rejection.is_none()
    }

    /// Short rejection reason such as `conflict`
    pub fn reason(&self) -> Option<String> {
        self.rejection.as_ref().map(Rejection::reason)
    }

    fn label(&self) -> String {
        match self.identifier {
            Some(ref id) => id.clone(),
            None => format!("record #{} (no identifier)", self.position),
        }
    }
}

/// Recoverable condition noticed while reading or normalizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// A JSON line could not be parsed and was left out
    SkippedLine { line: usize, message: String },
    /// The identifier field was empty or absent for this record
    MissingIdentifier { position: usize, field: String },
    /// The same identifier was derived for several records
    DuplicateIdentifier {
        identifier: String,
        positions: Vec<usize>,
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::SkippedLine { line, message } => {
                write!(f, "line {} skipped: {}", line, message)
            },
            Warning::MissingIdentifier { position, field } => {
                write!(
                    f,
                    "record #{} has no value for '{}'; the destination will assign an identifier",
                    position, field
                )
            },
            Warning::DuplicateIdentifier {
                identifier,
                positions,
            } => {
                let positions: Vec<String> = positions.iter().map(|p| format!("#{}", p)).collect();
                write!(
                    f,
                    "identifier '{}' used by records {}",
                    identifier,
                    positions.join(", ")
                )
            },
        }
    }
}

/// Aggregated result of one import run
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub run_id: Uuid,
    pub collection: String,
    pub source: PathBuf,
    pub format: SourceFormat,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Records handed to the submitter in a batch, whether sent or screened out
    pub total_submitted: usize,
    pub total_accepted: usize,
    /// Rejected outcomes in submission order
    pub rejected: Vec<Outcome>,
    pub warnings: Vec<Warning>,
    /// Records left over when the run was cancelled
    pub not_submitted: usize,
    pub cancelled: bool,
}

impl Report {
    pub fn new(
        run_id: Uuid,
        collection: impl Into<String>,
        source: impl Into<PathBuf>,
        format: SourceFormat,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            run_id,
            collection: collection.into(),
            source: source.into(),
            format,
            started_at,
            finished_at: started_at,
            total_submitted: 0,
            total_accepted: 0,
            rejected: Vec::new(),
            warnings: Vec::new(),
            not_submitted: 0,
            cancelled: false,
        }
    }

    /// Fold submission outcomes into the totals
    pub fn record_outcomes(&mut self, outcomes: impl IntoIterator<Item = Outcome>) {
        for outcome in outcomes {
            self.total_submitted += 1;
            if outcome.is_accepted() {
                self.total_accepted += 1;
            } else {
                self.rejected.push(outcome);
            }
        }
    }

    pub fn total_rejected(&self) -> usize {
        self.rejected.len()
    }

    /// Identifiers (or position labels) of rejected records with their reason
    pub fn rejected_identifiers(&self) -> Vec<(String, String)> {
        self.rejected
            .iter()
            .map(|outcome| (outcome.label(), outcome.reason().unwrap_or_default()))
            .collect()
    }

    /// True when every record was accepted and nothing was skipped
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty() && self.not_submitted == 0 && !self.cancelled
    }

    /// Human-readable summary for the terminal
    pub fn summary(&self) -> String {
        let mut out = String::new();

        let headline = if self.cancelled {
            format!("{} Import cancelled", "!".yellow().bold())
        } else if self.rejected.is_empty() {
            format!("{} Import complete", "✓".green().bold())
        } else {
            format!("{} Import complete with rejections", "!".yellow().bold())
        };
        let _ = writeln!(out, "{}", headline);
        let _ = writeln!(
            out,
            "  {} {} ({}) -> {}",
            "→".cyan(),
            self.source.display(),
            self.format,
            self.collection.cyan()
        );
        let _ = writeln!(out, "  Submitted:     {}", self.total_submitted);
        let _ = writeln!(
            out,
            "  Accepted:      {}",
            self.total_accepted.to_string().green()
        );

        let rejected = self.total_rejected().to_string();
        let rejected = if self.rejected.is_empty() {
            rejected.normal()
        } else {
            rejected.red()
        };
        let _ = writeln!(out, "  Rejected:      {}", rejected);

        if self.not_submitted > 0 {
            let _ = writeln!(
                out,
                "  Not submitted: {}",
                self.not_submitted.to_string().yellow()
            );
        }

        if !self.rejected.is_empty() {
            let _ = writeln!(out, "\nRejected documents:");
            for outcome in &self.rejected {
                let reason = outcome.reason().unwrap_or_default();
                match outcome.rejection.as_ref().and_then(Rejection::detail) {
                    Some(detail) if detail != reason => {
                        let _ = writeln!(
                            out,
                            "  {} {}: {} ({})",
                            "✗".red(),
                            outcome.label(),
                            reason,
                            detail
                        );
                    },
                    _ => {
                        let _ = writeln!(out, "  {} {}: {}", "✗".red(), outcome.label(), reason);
                    },
                }
            }
        }

        if !self.warnings.is_empty() {
            let _ = writeln!(out, "\nWarnings:");
            for warning in &self.warnings {
                let _ = writeln!(out, "  {} {}", "⚠".yellow(), warning);
            }
        }

        out
    }
}
