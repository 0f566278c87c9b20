//! Built-in routes served by the `dispatchd` binary.

pub mod handlers;

use hyper::Method;

use crate::http::{HttpServer, Request};
use crate::routing::RouteError;
use self::handlers::*;

/// Register `GET /` and `GET /status` on `server`.
pub fn register_builtin_routes(server: &mut HttpServer) -> Result<(), RouteError> {
    let stats = server.stats().clone();

    server.register_route(Method::GET, "/", hello_world)?;
    server.register_route(Method::GET, "/status", move |_req: Request| {
        get_status(stats.clone())
    })?;
    Ok(())
}
