//! Handler abstraction.
//!
//! Any `Fn(Request) -> impl Future<Output = Result<Response, HandlerError>>`
//! that is `Send + Sync + 'static` is a handler, so plain async functions and
//! closures register directly.

use std::error::Error as StdError;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::http::request::Request;
use crate::http::response::Response;

/// Boxed, sendable future returned by handlers.
pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

pub type HandlerResult = Result<Response, HandlerError>;

/// A handler failure. The message goes to the logs, never to the client.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying error with context.
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Message plus the full source chain, for logging.
    pub fn detail(&self) -> String {
        let mut detail = self.message.clone();
        let mut source = self.source();
        while let Some(err) = source {
            detail.push_str(": ");
            detail.push_str(&err.to_string());
            source = err.source();
        }
        detail
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(e: std::io::Error) -> Self {
        Self::with_source("I/O error", e)
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        Self::with_source("JSON error", e)
    }
}

/// Converts a [`Request`] into a [`Response`].
pub trait Handler: Send + Sync + 'static {
    fn call(&self, request: Request) -> BoxFuture<HandlerResult>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, request: Request) -> BoxFuture<HandlerResult> {
        Box::pin((self)(request))
    }
}

/// Shared handler reference stored in the route table.
pub type SharedHandler = Arc<dyn Handler>;

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::{Method, StatusCode};

    async fn echo(req: Request) -> HandlerResult {
        Ok(Response::text(StatusCode::OK, req.body().clone()))
    }

    #[tokio::test]
    async fn async_fn_is_a_handler() {
        let handler: SharedHandler = Arc::new(echo);
        let req = Request::builder(Method::POST, "/echo").body("ping").build();

        let resp = handler.call(req).await.unwrap();
        assert_eq!(resp.body().as_ref(), b"ping");
    }

    #[tokio::test]
    async fn closure_is_a_handler() {
        let greeting = String::from("hi");
        let handler: SharedHandler = Arc::new(move |_req: Request| {
            let greeting = greeting.clone();
            async move { HandlerResult::Ok(Response::text(StatusCode::OK, greeting)) }
        });

        let resp = handler
            .call(Request::builder(Method::GET, "/").build())
            .await
            .unwrap();
        assert_eq!(resp.body().as_ref(), b"hi");
    }

    #[test]
    fn detail_includes_source_chain() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing file");
        let err = HandlerError::with_source("loading template", io);
        assert_eq!(err.message(), "loading template");
        assert_eq!(err.detail(), "loading template: missing file");
        assert_eq!(err.to_string(), "loading template");
    }
}
