//! Request representation and intake.
//!
//! # Responsibilities
//! - Assign a request ID (client-supplied `x-request-id` or UUID v4)
//! - Enforce the body size limit and read timeout while collecting the body
//! - Freeze method, path, headers, body and arrival time into an
//!   immutable [`Request`]
//!
//! # Design Decisions
//! - Request ID attached as early as possible for tracing
//! - Declared `content-length` checked before any body bytes are read

use std::fmt;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::Method;

use crate::http::headers::Headers;

/// Header carrying the request correlation ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Longest client-supplied request ID we are willing to echo back.
const MAX_REQUEST_ID_LEN: usize = 128;

/// Correlation ID for one request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh UUID v4 request ID.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Reuse the client's ID when it is present and sane, otherwise generate.
    pub fn from_headers(headers: &Headers) -> Self {
        match headers.get(X_REQUEST_ID) {
            Some(id)
                if !id.is_empty()
                    && id.len() <= MAX_REQUEST_ID_LEN
                    && id.bytes().all(|b| b.is_ascii_graphic()) =>
            {
                Self(id.to_string())
            }
            _ => Self::generate(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error while turning a wire request into a [`Request`].
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
    #[error("request body not received within {timeout:?}")]
    ReadTimeout { timeout: Duration },
    #[error("failed to read request body: {0}")]
    Body(String),
}

/// An inbound request. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct Request {
    id: RequestId,
    method: Method,
    path: String,
    query: Option<String>,
    headers: Headers,
    body: Bytes,
    received_at: Instant,
}

impl Request {
    /// Start building a request by hand (tests, embedders).
    pub fn builder(method: Method, path: impl Into<String>) -> RequestBuilder {
        RequestBuilder {
            method,
            path: path.into(),
            query: None,
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// Collect a hyper request into a [`Request`], reading at most
    /// `max_body_bytes` of body and giving the client `read_timeout` to
    /// send all of it.
    pub async fn from_hyper<B>(
        request: hyper::Request<B>,
        max_body_bytes: usize,
        read_timeout: Duration,
    ) -> Result<Self, RequestError>
    where
        B: hyper::body::Body,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let received_at = Instant::now();
        let (parts, body) = request.into_parts();
        let headers = Headers::from_header_map(&parts.headers);

        let declared = headers
            .get("content-length")
            .and_then(|v| v.parse::<usize>().ok());
        if declared.is_some_and(|len| len > max_body_bytes) {
            return Err(RequestError::BodyTooLarge {
                limit: max_body_bytes,
            });
        }

        let collected =
            tokio::time::timeout(read_timeout, Limited::new(body, max_body_bytes).collect())
                .await
                .map_err(|_| RequestError::ReadTimeout {
                    timeout: read_timeout,
                })?;
        let body = match collected {
            Ok(collected) => collected.to_bytes(),
            Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                return Err(RequestError::BodyTooLarge {
                    limit: max_body_bytes,
                })
            }
            Err(e) => return Err(RequestError::Body(e.to_string())),
        };

        Ok(Self {
            id: RequestId::from_headers(&headers),
            method: parts.method,
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            headers,
            body,
            received_at,
        })
    }

    pub fn id(&self) -> &RequestId {
        &self.id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// When the request arrived at the server.
    pub fn received_at(&self) -> Instant {
        self.received_at
    }
}

/// Builder for hand-made requests.
#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    path: String,
    query: Option<String>,
    headers: Headers,
    body: Bytes,
}

impl RequestBuilder {
    pub fn query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn build(self) -> Request {
        Request {
            id: RequestId::from_headers(&self.headers),
            method: self.method,
            path: self.path,
            query: self.query,
            headers: self.headers,
            body: self.body,
            received_at: Instant::now(),
        }
    }
}
