//! Bounded pool of worker slots.
//!
//! # Responsibilities
//! - Hand out at most `capacity` slots at any instant
//! - Make callers wait (bounded by the acquire timeout) when saturated
//! - Accept idempotent releases, including the forced release after a
//!   handler timeout
//! - Refuse new waiters once closed for draining
//!
//! # Design Decisions
//! - Capacity accounting is a Tokio semaphore; no second counter to drift
//! - Slots hold their permit behind a mutex so release is idempotent
//! - Dropping a slot releases it (panics and aborted tasks cannot leak capacity)

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Error returned when a slot cannot be acquired.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    /// No slot freed up within the acquire timeout.
    #[error("worker pool saturated: no slot free after {waited:?}")]
    Saturated { waited: Duration },
    /// The pool was closed because the server is draining.
    #[error("worker pool closed")]
    Closed,
}

#[derive(Debug)]
struct PoolInner {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    acquire_timeout: Duration,
    next_slot_id: AtomicU64,
    acquired_total: AtomicU64,
    saturated_total: AtomicU64,
}

/// Fixed-capacity worker pool. Cheap to clone; clones share capacity.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl WorkerPool {
    /// Create a pool with `capacity` slots.
    ///
    /// A capacity of zero is bumped to one so the server can make progress.
    pub fn new(capacity: usize, acquire_timeout: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(PoolInner {
                semaphore: Arc::new(Semaphore::new(capacity)),
                capacity,
                acquire_timeout,
                next_slot_id: AtomicU64::new(1),
                acquired_total: AtomicU64::new(0),
                saturated_total: AtomicU64::new(0),
            }),
        }
    }

    /// Wait for a free slot, at most the configured acquire timeout.
    pub async fn acquire(&self) -> Result<WorkerSlot, PoolError> {
        let started = Instant::now();
        let acquire = self.inner.semaphore.clone().acquire_owned();

        let permit = match tokio::time::timeout(self.inner.acquire_timeout, acquire).await {
            Ok(Ok(permit)) => permit,
            Ok(Err(_closed)) => return Err(PoolError::Closed),
            Err(_elapsed) => {
                self.inner.saturated_total.fetch_add(1, Ordering::Relaxed);
                return Err(PoolError::Saturated {
                    waited: started.elapsed(),
                });
            }
        };

        self.inner.acquired_total.fetch_add(1, Ordering::Relaxed);
        let id = self.inner.next_slot_id.fetch_add(1, Ordering::Relaxed);

        tracing::trace!(
            slot = id,
            waited_ms = started.elapsed().as_millis() as u64,
            available = self.available(),
            "Worker slot acquired"
        );

        Ok(WorkerSlot {
            id,
            permit: Mutex::new(Some(permit)),
        })
    }

    /// Return a slot's capacity to the pool.
    ///
    /// Releasing an already-released slot is a no-op. Returns `true` only for
    /// the call that actually released capacity.
    pub fn release(&self, slot: &WorkerSlot) -> bool {
        slot.release()
    }

    /// Stop handing out slots. Current and future waiters get
    /// [`PoolError::Closed`]; outstanding slots still release normally.
    pub fn close(&self) {
        self.inner.semaphore.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.semaphore.is_closed()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Slots free right now.
    pub fn available(&self) -> usize {
        self.inner.semaphore.available_permits()
    }

    /// Slots currently borrowed.
    pub fn in_use(&self) -> usize {
        self.inner.capacity - self.available().min(self.inner.capacity)
    }

    pub fn acquired_total(&self) -> u64 {
        self.inner.acquired_total.load(Ordering::Relaxed)
    }

    pub fn saturated_total(&self) -> u64 {
        self.inner.saturated_total.load(Ordering::Relaxed)
    }
}

/// One unit of pool capacity, borrowed for the duration of one request.
#[derive(Debug)]
pub struct WorkerSlot {
    id: u64,
    permit: Mutex<Option<OwnedSemaphorePermit>>,
}

impl WorkerSlot {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Give the capacity back. Idempotent; `true` if this call released it.
    pub fn release(&self) -> bool {
        let permit = match self.permit.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match permit {
            Some(permit) => {
                drop(permit);
                tracing::trace!(slot = self.id, "Worker slot released");
                true
            }
            None => false,
        }
    }

    pub fn is_released(&self) -> bool {
        match self.permit.lock() {
            Ok(guard) => guard.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }
}

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        self.release();
    }
}
