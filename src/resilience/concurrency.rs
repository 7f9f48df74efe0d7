//! Fixed-capacity admission gate for in-flight request sequences.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

/// Bounds the number of retry sequences running at once.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    slots: Arc<Semaphore>,
    capacity: usize,
}

impl ConcurrencyLimiter {
    /// Create a limiter; a capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Take a slot if one is free right now.
    pub fn acquire(&self) -> Option<RequestPermit> {
        match self.slots.clone().try_acquire_owned() {
            Ok(permit) => Some(RequestPermit { _permit: permit }),
            Err(TryAcquireError::NoPermits) | Err(TryAcquireError::Closed) => None,
        }
    }

    /// Wait up to `timeout` for a slot.
    pub async fn try_acquire(&self, timeout: Duration) -> Option<RequestPermit> {
        match tokio::time::timeout(timeout, self.slots.clone().acquire_owned()).await {
            Ok(Ok(permit)) => Some(RequestPermit { _permit: permit }),
            Ok(Err(_)) | Err(_) => None,
        }
    }

    /// Currently free slots.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// A held slot.
///
/// When dropped, the slot is released back to the limiter, on every exit
/// path including panics of the holding task.
#[derive(Debug)]
pub struct RequestPermit {
    _permit: OwnedSemaphorePermit,
}

impl RequestPermit {
    /// Release the slot before the permit goes out of scope.
    pub fn release(self) {}
}
