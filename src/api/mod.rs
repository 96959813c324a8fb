//! Boundary to cloud control-plane REST APIs.
//!
//! Resource kinds describe requests as [`ApiRequest`] values and send them
//! through a [`Transport`]. The production transport is [`HttpTransport`];
//! tests substitute [`crate::test_support::ScriptedTransport`].

mod client;
mod http;

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use thiserror::Error;

pub(crate) use client::{decode, execute};
pub use http::HttpTransport;

/// Future returned by transport and resource API calls.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// HTTP verbs used by the control planes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Method {
    /// `GET`
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
}

impl Method {
    /// Upper-case verb name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

/// A single REST call, relative to the transport's endpoint.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApiRequest {
    /// HTTP verb.
    pub method: Method,
    /// Path beginning with `/`.
    pub path: String,
    /// Query parameters in order.
    pub query: Vec<(String, String)>,
    /// Optional JSON body.
    pub body: Option<Value>,
}

impl ApiRequest {
    fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body,
        }
    }

    /// `GET path`.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path, None)
    }

    /// `POST path` with a JSON body.
    #[must_use]
    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path, Some(body))
    }

    /// `PUT path`, optionally with a JSON body.
    #[must_use]
    pub fn put(path: impl Into<String>, body: Option<Value>) -> Self {
        Self::new(Method::Put, path, body)
    }

    /// `PATCH path` with a JSON body.
    #[must_use]
    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Patch, path, Some(body))
    }

    /// `DELETE path`.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path, None)
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Returns the value of a query parameter.
    #[must_use]
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }
}

/// Raw response returned by a transport.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body bytes.
    pub body: Vec<u8>,
}

impl ApiResponse {
    /// Whether the status is in the 2xx range.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Sends requests to a control plane.
pub trait Transport: Send + Sync {
    /// Sends `request` and returns the raw response. Only failures to reach
    /// the server are errors; HTTP error statuses are returned as responses.
    fn send(&self, request: ApiRequest) -> ApiFuture<'_, ApiResponse>;
}

/// Errors raised at the API boundary.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ApiError {
    /// The addressed resource does not exist (HTTP 404).
    #[error("{resource} not found")]
    NotFound {
        /// Request path that returned 404.
        resource: String,
    },
    /// The server could not be reached or the connection failed.
    #[error("transport error: {message}")]
    Transport {
        /// Message from the HTTP client.
        message: String,
    },
    /// The server answered with a non-success status.
    #[error("{method} {path} failed with status {status}: {message}")]
    Status {
        /// HTTP verb of the failed request.
        method: &'static str,
        /// Request path.
        path: String,
        /// HTTP status code.
        status: u16,
        /// Message extracted from the structured error body.
        message: String,
    },
    /// A success response carried a body that could not be decoded.
    #[error("failed to decode response from {path}: {message}")]
    Decode {
        /// Request path.
        path: String,
        /// Decoder message.
        message: String,
    },
    /// The resource kind does not implement the requested call.
    #[error("{operation} is not supported by {kind}")]
    Unsupported {
        /// Resource kind.
        kind: String,
        /// Operation that was attempted.
        operation: String,
    },
}

impl ApiError {
    /// Whether this error is the universal not-found signal.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub(crate) fn unsupported(kind: &str, operation: &str) -> Self {
        Self::Unsupported {
            kind: kind.to_owned(),
            operation: operation.to_owned(),
        }
    }
}
