//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::ServerConfig;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Check a parsed configuration for values serde cannot reject on its own.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = config.listener.socket_addr() {
        errors.push(ValidationError::new(
            "listener.host",
            format!("'{}' is not an IP address: {}", config.listener.host, e),
        ));
    }

    if config.workers.acquire_timeout_ms == 0 {
        errors.push(ValidationError::new(
            "workers.acquire_timeout_ms",
            "must be greater than zero",
        ));
    }

    if config.timeouts.handler_ms == 0 {
        errors.push(ValidationError::new(
            "timeouts.handler_ms",
            "must be greater than zero",
        ));
    }

    if config.timeouts.request_read_ms == 0 {
        errors.push(ValidationError::new(
            "timeouts.request_read_ms",
            "must be greater than zero",
        ));
    }

    if config.timeouts.drain_ms == 0 {
        errors.push(ValidationError::new(
            "timeouts.drain_ms",
            "must be greater than zero",
        ));
    }

    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::new(
            "limits.max_body_bytes",
            "must be greater than zero",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
