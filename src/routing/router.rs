//! Route table and lookup.
//!
//! # Responsibilities
//! - Store registered routes in registration order
//! - Look up the route for a method and path
//! - Return the matched route or an explicit no-match
//!
//! # Design Decisions
//! - Immutable after the server starts (shared via Arc, no locks)
//! - O(n) scan (acceptable for typical route counts)
//! - An exact match beats any wildcard; among wildcards the longest prefix
//!   wins; ties go to the first registered route

use std::fmt;
use std::sync::Arc;

use hyper::Method;

use crate::http::handler::{Handler, SharedHandler};
use crate::routing::matcher::{MatchKind, PathPattern, RouteError};

/// A registered (method, pattern) → handler mapping.
#[derive(Clone)]
pub struct Route {
    method: Method,
    pattern: PathPattern,
    handler: SharedHandler,
}

impl Route {
    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn handler(&self) -> &SharedHandler {
        &self.handler
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

/// Ordered collection of routes.
#[derive(Debug, Default, Clone)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `method` and `pattern`.
    pub fn register<H: Handler>(
        &mut self,
        method: Method,
        pattern: &str,
        handler: H,
    ) -> Result<(), RouteError> {
        let pattern = PathPattern::parse(pattern)?;

        if self
            .routes
            .iter()
            .any(|r| r.method == method && r.pattern == pattern)
        {
            tracing::warn!(
                method = %method,
                pattern = %pattern,
                "Duplicate route registered; the first registration wins"
            );
        }

        tracing::debug!(method = %method, pattern = %pattern, "Route registered");
        self.routes.push(Route {
            method,
            pattern,
            handler: Arc::new(handler),
        });
        Ok(())
    }

    /// Find the best route for `method` and `path`.
    pub fn lookup(&self, method: &Method, path: &str) -> Option<&Route> {
        let mut best: Option<(MatchKind, &Route)> = None;

        for route in self.routes.iter().filter(|r| r.method == *method) {
            let Some(kind) = route.pattern.matches(path) else {
                continue;
            };
            if kind == MatchKind::Exact {
                return Some(route);
            }
            // Strictly greater keeps the earliest route on ties.
            if best.map_or(true, |(current, _)| kind > current) {
                best = Some((kind, route));
            }
        }

        best.map(|(_, route)| route)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter()
    }
}
