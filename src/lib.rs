//! Concurrent request-dispatch HTTP server library

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;
pub mod worker;

pub use config::ServerConfig;
pub use http::{HttpServer, ServerHandle};
pub use lifecycle::{ServerState, ShutdownReport};
