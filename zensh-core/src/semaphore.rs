// zensh-core/src/semaphore.rs
//! Counting semaphore bounding how many recipe workers run at once.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore as TokioSemaphore};
use tracing::trace;
use zensh_common::error::{Result, ZenshError};

#[derive(Debug, Clone)]
pub struct Semaphore {
    inner: Arc<TokioSemaphore>,
    capacity: usize,
}

/// A held slot. Dropping it, or calling [`Permit::release`], frees the slot.
#[derive(Debug)]
pub struct Permit {
    _permit: OwnedSemaphorePermit,
}

impl Permit {
    pub fn release(self) {}
}

impl Semaphore {
    /// `capacity` is clamped to at least one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(TokioSemaphore::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.inner.available_permits()
    }

    /// Waits until fewer than `capacity` permits are held, then takes one.
    pub async fn acquire(&self) -> Result<Permit> {
        let permit = Arc::clone(&self.inner)
            .acquire_owned()
            .await
            .map_err(|e| ZenshError::Generic(format!("semaphore closed: {e}")))?;
        trace!("Permit acquired, {} left", self.inner.available_permits());
        Ok(Permit { _permit: permit })
    }
}
