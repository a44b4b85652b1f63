//! Connection and run configuration
//!
//! Values come from defaults, then environment variables, then CLI flags.

use crate::error::{IngestError, Result};
use crate::guard::DEFAULT_GUARD_TIMEOUT;
use crate::pipeline::PipelineOptions;
use crate::submit::{DEFAULT_BATCH_SIZE, DEFAULT_SUBMIT_TIMEOUT};
use std::time::Duration;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default CouchDB URL when none is configured
pub const DEFAULT_COUCHDB_URL: &str = "http://localhost:5984";

pub const ENV_URL: &str = "COUCHDB_URL";
pub const ENV_USER: &str = "COUCHDB_USER";
pub const ENV_PASSWORD: &str = "COUCHDB_PASSWORD";
pub const ENV_BATCH_SIZE: &str = "COUCHLOAD_BATCH_SIZE";
pub const ENV_GUARD_TIMEOUT: &str = "COUCHLOAD_GUARD_TIMEOUT_SECS";
pub const ENV_SUBMIT_TIMEOUT: &str = "COUCHLOAD_SUBMIT_TIMEOUT_SECS";

/// Settings for one import
#[derive(Clone, PartialEq, Eq)]
pub struct IngestConfig {
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub batch_size: usize,
    pub guard_timeout: Duration,
    pub submit_timeout: Duration,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_COUCHDB_URL.to_string(),
            username: None,
            password: None,
            batch_size: DEFAULT_BATCH_SIZE,
            guard_timeout: DEFAULT_GUARD_TIMEOUT,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
        }
    }
}

impl std::fmt::Debug for IngestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("batch_size", &self.batch_size)
            .field("guard_timeout", &self.guard_timeout)
            .field("submit_timeout", &self.submit_timeout)
            .finish()
    }
}

impl IngestConfig {
    /// Load config from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load config through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = non_empty(lookup(ENV_URL)) {
            config.base_url = url;
        }
        config.username = non_empty(lookup(ENV_USER));
        config.password = non_empty(lookup(ENV_PASSWORD));

        if let Some(raw) = non_empty(lookup(ENV_BATCH_SIZE)) {
            config.batch_size = parse_number(ENV_BATCH_SIZE, &raw)? as usize;
        }
        if let Some(raw) = non_empty(lookup(ENV_GUARD_TIMEOUT)) {
            config.guard_timeout = Duration::from_secs(parse_number(ENV_GUARD_TIMEOUT, &raw)?);
        }
        if let Some(raw) = non_empty(lookup(ENV_SUBMIT_TIMEOUT)) {
            config.submit_timeout = Duration::from_secs(parse_number(ENV_SUBMIT_TIMEOUT, &raw)?);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(IngestError::config("batch size must be at least 1"));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(IngestError::config(format!(
                "CouchDB URL must start with http:// or https://, got '{}'",
                self.base_url
            )));
        }
        if self.guard_timeout.is_zero() || self.submit_timeout.is_zero() {
            return Err(IngestError::config("timeouts must be at least one second"));
        }
        Ok(())
    }

    /// Whether HTTP basic auth will be sent
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            batch_size: self.batch_size,
            guard_timeout: self.guard_timeout,
            submit_timeout: self.submit_timeout,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_number(key: &str, raw: &str) -> Result<u64> {
    raw.trim().parse::<u64>().map_err(|e| {
        IngestError::config(format!("{} must be a non-negative integer, got '{}': {}", key, raw, e))
    })
}
