//! dispatchd: a concurrent request-dispatch HTTP server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──TCP──▶ net::Acceptor ──▶ http::server (one task per connection)
//!                                              │
//!                                              ▼
//!                                     http::Dispatcher
//!                                   ┌──────────┼───────────┐
//!                                   ▼          ▼           ▼
//!                              routing::   worker::    handler task
//!                              RouteTable  WorkerPool  (under timeout)
//!                                              │
//!     Client ◀──────────── Response ◀──────────┘
//!
//!     lifecycle: Starting → Running → Draining → Stopped
//! ```

use std::path::PathBuf;

use clap::Parser;

use dispatchd::admin::register_builtin_routes;
use dispatchd::config::{load_config, validate_config, ConfigError, ServerConfig};
use dispatchd::http::HttpServer;
use dispatchd::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "dispatchd", version)]
#[command(about = "Concurrent request-dispatch HTTP server", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Worker pool capacity (0 = available parallelism)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Per-request handler timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Shutdown drain timeout in milliseconds
    #[arg(long)]
    drain_timeout_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn into_config(self) -> Result<ServerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ServerConfig::default(),
        };

        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(workers) = self.workers {
            config.workers.capacity = workers;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.timeouts.handler_ms = timeout_ms;
        }
        if let Some(drain_ms) = self.drain_timeout_ms {
            config.timeouts.drain_ms = drain_ms;
        }
        if let Some(level) = self.log_level {
            config.observability.log_level = level;
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Cli::parse().into_config()?;

    logging::init_logging(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "dispatchd starting");
    tracing::info!(
        host = %config.listener.host,
        port = config.listener.port,
        workers = config.workers.effective_capacity(),
        handler_timeout_ms = config.timeouts.handler_ms,
        drain_timeout_ms = config.timeouts.drain_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let mut server = HttpServer::new(config);
    register_builtin_routes(&mut server)?;

    let report = server.run_until_signal().await?;

    tracing::info!(
        drained = report.drained,
        forced = report.forced,
        "Shutdown complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(args: &[&str]) -> Result<ServerConfig, ConfigError> {
        let argv = std::iter::once("dispatchd").chain(args.iter().copied());
        Cli::try_parse_from(argv).unwrap().into_config()
    }

    #[test]
    fn defaults_without_flags() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.listener.port, 5000);
        assert_eq!(config.timeouts.handler_ms, 5_000);
    }

    #[test]
    fn flags_override_defaults() {
        let config = config_from(&[
            "--port",
            "8080",
            "--workers",
            "3",
            "--timeout-ms",
            "250",
            "--drain-timeout-ms",
            "1500",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(config.listener.port, 8080);
        assert_eq!(config.workers.capacity, 3);
        assert_eq!(config.timeouts.handler_ms, 250);
        assert_eq!(config.timeouts.drain_ms, 1_500);
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn flags_override_config_file() {
        let path = std::env::temp_dir()
            .join(format!("dispatchd-cli-{}.toml", std::process::id()));
        std::fs::write(&path, "[listener]\nport = 7000\n\n[timeouts]\nhandler_ms = 900\n")
            .unwrap();

        let config = config_from(&["--config", path.to_str().unwrap(), "--port", "7001"]);
        std::fs::remove_file(&path).unwrap();
        let config = config.unwrap();

        assert_eq!(config.listener.port, 7001);
        assert_eq!(config.timeouts.handler_ms, 900);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = config_from(&["--timeout-ms", "0"]).unwrap_err();
        match err {
            ConfigError::Validation(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].field, "timeouts.handler_ms");
            }
            other => panic!("expected validation error, got {other}"),
        }
    }

    #[test]
    fn missing_config_file_is_io_error() {
        let err = config_from(&["--config", "/nonexistent/dispatchd.toml"]).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn malformed_flags_are_rejected_by_clap() {
        assert!(Cli::try_parse_from(["dispatchd", "--port", "not-a-port"]).is_err());
        assert!(Cli::try_parse_from(["dispatchd", "--workers", "-1"]).is_err());
    }
}
