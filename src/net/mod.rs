//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept while Running, count, assign ConnectionId)
//!     → connection.rs (active-connection tracking)
//!     → Hand off to HTTP layer (one task per connection)
//!
//! Connection States:
//!     Accepted → Serving → (Draining) → Closed
//! ```
//!
//! # Design Decisions
//! - The acceptor checks the lifecycle before and after every accept
//! - Dropping the acceptor closes the listening socket, so connection
//!   attempts after shutdown are refused by the OS

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{Accepted, Acceptor, ListenerError};
