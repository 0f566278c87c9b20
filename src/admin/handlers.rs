use hyper::StatusCode;
use serde::Serialize;

use crate::http::{HandlerResult, Request, Response, ServerStats, StatsSnapshot};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    #[serde(flatten)]
    pub server: StatsSnapshot,
}

pub async fn hello_world(_req: Request) -> HandlerResult {
    Ok(Response::text(StatusCode::OK, "Hello World\n"))
}

/// Report lifecycle state, worker pool usage and connection counts.
pub async fn get_status(stats: ServerStats) -> HandlerResult {
    let status = SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        server: stats.snapshot(),
    };
    Ok(Response::json(StatusCode::OK, &status)?)
}
