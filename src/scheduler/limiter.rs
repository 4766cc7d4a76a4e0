use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::app::{NexaError, Result};

pub const DEFAULT_WORKERS: usize = 8;

/// Counting admission gate for fetch executions.
///
/// A slot is held for as long as the returned [`Slot`] lives; dropping it
/// releases the slot. Waiters are admitted in FIFO order.
#[derive(Clone)]
pub struct Limiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

pub type Slot = OwnedSemaphorePermit;

impl Limiter {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub async fn acquire(&self) -> Result<Slot> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| NexaError::Other("Limiter closed".into()))
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

impl Default for Limiter {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}
