//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted TCP connection
//!     → server.rs (hyper HTTP/1.1, one task per connection)
//!     → request.rs (read body under limit, assign request ID)
//!     → dispatcher.rs (route lookup, worker slot, handler under timeout)
//!     → response.rs (status, headers, body, x-request-id)
//!     → Send to client
//! ```
//!
//! # Design Decisions
//! - Every request gets exactly one response, synthesized when the handler
//!   cannot produce one (404, 500, 503, 504)
//! - Handlers run as their own tasks so a panic is contained

pub mod dispatcher;
pub mod handler;
pub mod headers;
pub mod request;
pub mod response;
pub mod server;

pub use dispatcher::Dispatcher;
pub use handler::{BoxFuture, Handler, HandlerError, HandlerResult, SharedHandler};
pub use headers::Headers;
pub use request::{Request, RequestError, RequestId, X_REQUEST_ID};
pub use response::Response;
pub use server::{HttpServer, ServerError, ServerHandle, ServerStats, StatsSnapshot};
