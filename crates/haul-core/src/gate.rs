//! Bounded concurrency for outbound fetches.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::AppError;

/// Limits how many fetches run at the same time.
///
/// Slots are handed out as [`GatePermit`]s; dropping a permit frees the
/// slot on every exit path, including errors, panics and cancellation.
#[derive(Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

/// A held gate slot. Released on drop.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

impl ConcurrencyGate {
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    /// Wait for a free slot.
    pub async fn acquire(&self) -> Result<GatePermit, AppError> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| AppError::Generic("concurrency gate closed".into()))?;
        Ok(GatePermit { _permit: permit })
    }

    /// Take a slot only if one is free right now.
    pub fn try_acquire(&self) -> Option<GatePermit> {
        Arc::clone(&self.semaphore)
            .try_acquire_owned()
            .ok()
            .map(|permit| GatePermit { _permit: permit })
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Number of slots currently held.
    pub fn active(&self) -> usize {
        self.max_concurrent
            .saturating_sub(self.semaphore.available_permits())
    }
}
