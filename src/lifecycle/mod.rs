//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (http/server.rs start()):
//!     Build config → Register routes → Bind → Starting→Running → Accept
//!
//! Shutdown (shutdown.rs):
//!     shutdown() → Running→Draining → Stop accepting → Drain connections
//!     → Abort stragglers after drain timeout → Draining→Stopped
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - State (state.rs) only moves forward; a stopped server is never restarted
//! - Shutdown has timeout: forced termination after the drain deadline
//! - Shutdown is idempotent: late callers wait for the first caller's outcome

pub mod shutdown;
pub mod signals;
pub mod state;

pub use shutdown::{drain_connections, ShutdownReport};
pub use signals::shutdown_signal;
pub use state::{Lifecycle, ServerState};
