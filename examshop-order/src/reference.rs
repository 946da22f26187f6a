use std::fmt;
use std::future::Future;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::OrderError;
use crate::repository::{OrderRepository, RepositoryError};

pub const REFERENCE_LENGTH: usize = 12;
pub const DEFAULT_REFERENCE_ATTEMPTS: u32 = 5;

pub type ReferenceSource = Arc<dyn Fn() -> String + Send + Sync>;

/// Random 128-bit identifier as hex, cut to 12 uppercase characters.
pub fn random_reference() -> String {
    Uuid::new_v4().simple().to_string()[..REFERENCE_LENGTH].to_uppercase()
}

/// Produces candidate payment references and bounds how many collisions a
/// single allocation tolerates.
#[derive(Clone)]
pub struct ReferenceGenerator {
    source: ReferenceSource,
    max_attempts: u32,
}

impl ReferenceGenerator {
    pub fn new(max_attempts: u32) -> Self {
        Self::with_source(Arc::new(random_reference), max_attempts)
    }

    pub fn with_source(source: ReferenceSource, max_attempts: u32) -> Self {
        Self {
            source,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn candidate(&self) -> String {
        (self.source)()
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Draws candidates until `insert` persists one. A candidate already in
    /// the store, or an insert rejected as a duplicate, counts as a
    /// collision.
    pub async fn allocate<T, F, Fut>(&self, orders: &dyn OrderRepository, mut insert: F) -> Result<T, OrderError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, RepositoryError>>,
    {
        for attempt in 1..=self.max_attempts {
            let reference = self.candidate();
            if orders.reference_exists(&reference).await? {
                tracing::debug!("Reference {} already taken (attempt {})", reference, attempt);
                continue;
            }

            match insert(reference).await {
                Ok(created) => return Ok(created),
                Err(RepositoryError::DuplicateReference(taken)) => {
                    tracing::warn!("Reference {} claimed concurrently (attempt {})", taken, attempt);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(OrderError::ReferenceExhausted {
            attempts: self.max_attempts,
        })
    }
}

impl Default for ReferenceGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_REFERENCE_ATTEMPTS)
    }
}

impl fmt::Debug for ReferenceGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceGenerator")
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}
