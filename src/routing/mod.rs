//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (route lookup)
//!     → matcher.rs (evaluate path pattern)
//!     → Return: matched Route or NoMatch (404)
//!
//! Route registration (before start):
//!     register_route(method, pattern, handler)
//!     → matcher.rs parses the pattern
//!     → RouteTable frozen behind Arc at start
//! ```
//!
//! # Design Decisions
//! - Routes registered before start, immutable at runtime
//! - No regex in hot path (exact and prefix matching only)
//! - Deterministic: same input always matches same route

pub mod matcher;
pub mod router;

pub use matcher::{MatchKind, PathPattern, RouteError};
pub use router::{Route, RouteTable};
