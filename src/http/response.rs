//! Response representation and serialization.
//!
//! # Responsibilities
//! - Give handlers a small fixed-shape response type
//! - Synthesize the server's own error responses (404, 413, 500, 503, 504)
//! - Convert to a hyper response exactly once (conversion consumes)
//!
//! # Design Decisions
//! - Synthesized error bodies are generic; details stay in the logs
//! - `x-request-id` is stamped on the way out, never by handlers

use bytes::Bytes;
use http_body_util::Full;
use hyper::StatusCode;
use serde::Serialize;

use crate::http::headers::Headers;
use crate::http::request::{RequestId, X_REQUEST_ID};

/// A response produced by a handler or synthesized by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Bytes,
}

impl Response {
    /// Empty response with the given status.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// `text/plain` response.
    pub fn text(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self::new(status)
            .with_header("content-type", "text/plain; charset=utf-8")
            .with_body(body)
    }

    /// `application/json` response serialized from `value`.
    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        Ok(Self::new(status)
            .with_header("content-type", "application/json")
            .with_body(body))
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn not_found() -> Self {
        Self::text(StatusCode::NOT_FOUND, "Not Found\n")
    }

    pub fn bad_request() -> Self {
        Self::text(StatusCode::BAD_REQUEST, "Bad Request\n")
    }

    pub fn request_timeout() -> Self {
        Self::text(StatusCode::REQUEST_TIMEOUT, "Request Timeout\n")
            .with_header("connection", "close")
    }

    pub fn payload_too_large() -> Self {
        Self::text(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large\n")
    }

    pub fn internal_error() -> Self {
        Self::text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error\n")
    }

    pub fn service_unavailable() -> Self {
        Self::text(StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable\n")
            .with_header("retry-after", "1")
    }

    pub fn gateway_timeout() -> Self {
        Self::text(StatusCode::GATEWAY_TIMEOUT, "Gateway Timeout\n")
    }

    /// Serialize into a hyper response, stamping the request ID.
    pub fn into_hyper(self, request_id: &RequestId) -> hyper::Response<Full<Bytes>> {
        let mut response = hyper::Response::new(Full::new(self.body));
        *response.status_mut() = self.status;

        let headers = response.headers_mut();
        for (name, value) in self.headers.iter() {
            match (
                hyper::header::HeaderName::from_bytes(name.as_bytes()),
                hyper::header::HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => tracing::warn!(header = %name, "Dropping invalid response header"),
            }
        }
        if let Ok(value) = hyper::header::HeaderValue::from_str(request_id.as_str()) {
            headers.insert(X_REQUEST_ID, value);
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_sets_content_type() {
        let resp = Response::json(StatusCode::OK, &serde_json::json!({"ok": true})).unwrap();
        assert_eq!(resp.headers().get("Content-Type"), Some("application/json"));
        assert_eq!(resp.body().as_ref(), br#"{"ok":true}"#);
    }

    #[test]
    fn into_hyper_stamps_request_id() {
        let id = RequestId::generate();
        let hyper_resp = Response::text(StatusCode::CREATED, "done")
            .with_header("X-Custom", "1")
            .into_hyper(&id);

        assert_eq!(hyper_resp.status(), StatusCode::CREATED);
        assert_eq!(hyper_resp.headers()["x-custom"], "1");
        assert_eq!(hyper_resp.headers()[X_REQUEST_ID], id.as_str());
    }

    #[test]
    fn invalid_header_values_are_dropped() {
        let hyper_resp = Response::new(StatusCode::OK)
            .with_header("x-bad", "line\nbreak")
            .into_hyper(&RequestId::generate());
        assert!(hyper_resp.headers().get("x-bad").is_none());
    }
}
