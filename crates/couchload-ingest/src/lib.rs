//! Couchload ingestion library
//!
//! Imports CSV, JSON and PDF files into a CouchDB database through its bulk
//! document endpoint.
//!
//! # Overview
//!
//! - **Sources**: the file extension selects a reader ([`source`])
//! - **Normalization**: every record gets its `_id` ([`normalize`])
//! - **Collection guard**: the database is probed and created if missing ([`guard`])
//! - **Submission**: records are written in batches and each per-document
//!   result is reconciled ([`submit`])
//! - **Orchestration**: [`Pipeline`] runs the steps above once and returns a
//!   [`Report`]
//!
//! ```ignore
//! let couch = CouchClient::new("http://localhost:5984")?;
//! let source = SourceDescriptor::resolve("movies.json", Some("imdb_id".into()))?;
//! let report = Pipeline::new(&couch, "movies", source, PipelineOptions::default())?
//!     .run()
//!     .await?;
//! println!("{}", report.summary());
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod config;
pub mod error;
pub mod guard;
pub mod normalize;
pub mod pipeline;
pub mod progress;
pub mod record;
pub mod report;
pub mod source;
pub mod store;
pub mod submit;

// Re-export commonly used types
pub use config::IngestConfig;
pub use error::{GuardError, IngestError, Rejection, Result, TransportError};
pub use pipeline::{Pipeline, PipelineOptions, PipelineState};
pub use record::{Attachment, Record};
pub use report::{Outcome, Report, Warning};
pub use source::{SourceDescriptor, SourceFormat};
pub use store::{CouchClient, DocumentStore, MockCouch};

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Couchload - bulk import files into CouchDB
#[derive(Parser, Debug)]
#[command(name = "couchload")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// File to import (.csv, .json, .jsonl, .ndjson or .pdf)
    #[arg(short, long)]
    pub file: PathBuf,

    /// Target database (created if missing)
    #[arg(short, long)]
    pub db: String,

    /// CouchDB server URL
    #[arg(long, env = config::ENV_URL, default_value = config::DEFAULT_COUCHDB_URL)]
    pub url: String,

    /// CouchDB user
    #[arg(short, long, env = config::ENV_USER)]
    pub user: Option<String>,

    /// CouchDB password
    #[arg(short, long, env = config::ENV_PASSWORD, hide_env_values = true)]
    pub password: Option<String>,

    /// Field whose value becomes the document _id
    #[arg(long)]
    pub id_column: Option<String>,

    /// Maximum documents per bulk request
    #[arg(long, env = config::ENV_BATCH_SIZE)]
    pub batch_size: Option<usize>,

    /// Timeout in seconds for each bulk request
    #[arg(long, env = config::ENV_SUBMIT_TIMEOUT)]
    pub timeout_secs: Option<u64>,

    /// Timeout in seconds for checking and creating the database
    #[arg(long, env = config::ENV_GUARD_TIMEOUT)]
    pub guard_timeout_secs: Option<u64>,

    /// Print the report as JSON instead of a summary
    #[arg(long)]
    pub json: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Resolve the run configuration from flags, environment and defaults
    pub fn config(&self) -> Result<IngestConfig> {
        let defaults = IngestConfig::default();
        let config = IngestConfig {
            base_url: self.url.trim_end_matches('/').to_string(),
            username: self.user.clone().filter(|u| !u.is_empty()),
            password: self.password.clone().filter(|p| !p.is_empty()),
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            guard_timeout: self
                .guard_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.guard_timeout),
            submit_timeout: self
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.submit_timeout),
        };
        config.validate()?;
        Ok(config)
    }

    /// Resolve the source file and its format
    pub fn source(&self) -> Result<SourceDescriptor> {
        SourceDescriptor::resolve(self.file.clone(), self.id_column.clone())
    }
}
