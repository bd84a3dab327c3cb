//! Bounded pool for background shadow reads
//!
//! Capacity is a fixed number of semaphore permits. A task that finds no
//! free permit is dropped without being polled; nothing queues.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Returned when every permit is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSaturated;

/// Fixed-capacity background task pool
#[derive(Debug, Clone)]
pub struct ShadowPool {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl ShadowPool {
    /// Create pool running at most `capacity` tasks at once
    ///
    /// Capacity is clamped to `1..=Semaphore::MAX_PERMITS`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, Semaphore::MAX_PERMITS);
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Maximum concurrent tasks
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Tasks currently running
    #[inline]
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.capacity - self.permits.available_permits()
    }

    /// Run `task` in the background if a permit is free
    ///
    /// The permit is held until the task finishes.
    ///
    /// # Errors
    /// [`PoolSaturated`] when the pool is full; `task` is dropped unpolled
    pub fn try_spawn<F>(&self, task: F) -> Result<JoinHandle<()>, PoolSaturated>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permit = Arc::clone(&self.permits)
            .try_acquire_owned()
            .map_err(|_| PoolSaturated)?;
        Ok(tokio::spawn(async move {
            task.await;
            drop(permit);
        }))
    }

    /// Wait until no task is running
    pub async fn drain(&self) {
        let all = u32::try_from(self.capacity).unwrap_or(u32::MAX);
        // acquire fails only on a closed semaphore, which this pool never does
        if let Ok(permits) = self.permits.acquire_many(all).await {
            drop(permits);
        }
    }
}
