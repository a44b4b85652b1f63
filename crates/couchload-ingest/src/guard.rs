//! Collection guard
//!
//! Makes sure the destination collection exists before anything is written.
//! Any answer other than "exists" or "not found, then created" stops the run:
//! an ambiguous probe is never followed by a create.

use crate::error::GuardError;
use crate::store::{CollectionApi, CreateStatus, ProbeStatus};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Default timeout for each probe or create call
pub const DEFAULT_GUARD_TIMEOUT: Duration = Duration::from_secs(10);

/// How the guard found the collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStatus {
    Existed,
    Created,
}

pub struct CollectionGuard<'a, C: CollectionApi + ?Sized> {
    api: &'a C,
    timeout: Duration,
}

impl<'a, C: CollectionApi + ?Sized> CollectionGuard<'a, C> {
    pub fn new(api: &'a C, timeout: Duration) -> Self {
        Self { api, timeout }
    }

    /// Verify the collection exists, creating it when the probe says it does not
    pub async fn ensure(&self, collection: &str) -> Result<CollectionStatus, GuardError> {
        match self.bounded(self.api.probe(collection)).await? {
            ProbeStatus::Exists => {
                info!(collection = %collection, "Collection exists");
                Ok(CollectionStatus::Existed)
            },
            ProbeStatus::NotFound => {
                info!(collection = %collection, "Collection not found, creating it");
                match self.bounded(self.api.create(collection)).await? {
                    CreateStatus::Created => {
                        info!(collection = %collection, "Collection created");
                        Ok(CollectionStatus::Created)
                    },
                    CreateStatus::Refused { status, body } => {
                        warn!(collection = %collection, status, "Collection create refused");
                        Err(GuardError::CreateFailed { status, body })
                    },
                }
            },
            ProbeStatus::Unexpected { status, body } => {
                warn!(collection = %collection, status, "Unexpected collection probe response");
                Err(GuardError::UnexpectedProbe { status, body })
            },
        }
    }

    /// Boolean form of [`CollectionGuard::ensure`]
    pub async fn is_ready(&self, collection: &str) -> bool {
        self.ensure(collection).await.is_ok()
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, crate::error::TransportError>>,
    ) -> Result<T, GuardError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(GuardError::Unreachable(e)),
            Err(_) => Err(GuardError::Timeout(self.timeout)),
        }
    }
}
