//! Couchload Common Library
//!
//! Shared setup used by the couchload workspace members. Today that is the
//! logging bootstrap; anything reused by more than one binary belongs here.

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod logging;

pub use logging::{init_logging, LogConfig, LogFormat, LogLevel};
