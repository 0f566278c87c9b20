//! Worker pool subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher (route matched)
//!     → pool.rs acquire() (wait for a slot, bounded by acquire timeout)
//!     → WorkerSlot held while the handler runs
//!     → release() (normal return, error, timeout) or Drop (abort/panic)
//! ```

pub mod pool;

pub use pool::{PoolError, WorkerPool, WorkerSlot};
