//! Transport adapter boundary
//!
//! The engine never talks HTTP directly. Every exchange goes through an
//! implementation of [`Transport`], which owns connection handling, TLS and
//! request signing.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// HTTP method used by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Put,
    Post,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single outgoing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    /// Absolute path, already percent-encoded
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Request addressing an object path-style: `/{bucket}/{key}`
    pub fn object(method: Method, bucket: &str, key: &str) -> Self {
        Self::new(method, object_path(bucket, key))
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Value of a query parameter, if present
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Case-insensitive header lookup
    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// A completed response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    /// Headers in the order the server sent them
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Broad category of an adapter-level failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Connect,
    Timeout,
    Io,
    Other,
}

/// The exchange could not be completed at all
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Performs one request/response round trip
///
/// Implementations must be safe to share between concurrent transfers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn exchange(&self, request: Request) -> std::result::Result<Response, TransportError>;
}

/// Build a path-style object path, encoding each key segment
pub fn object_path(bucket: &str, key: &str) -> String {
    let encoded: Vec<String> = key
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("/{}/{}", bucket, encoded.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_path_encoding() {
        assert_eq!(object_path("mybucket", "plain"), "/mybucket/plain");
        assert_eq!(
            object_path("mybucket", "dir/with space/file+1.txt"),
            "/mybucket/dir/with%20space/file%2B1.txt"
        );
    }

    #[test]
    fn test_response_header_lookup_is_case_insensitive() {
        let response = Response::new(200)
            .with_header("X-Amz-Restore", "ongoing-request=\"true\"")
            .with_header("ETag", "\"abc\"");
        assert_eq!(response.header("x-amz-restore"), Some("ongoing-request=\"true\""));
        assert_eq!(response.header("etag"), Some("\"abc\""));
        assert_eq!(response.header("content-type"), None);
    }

    #[test]
    fn test_request_builder() {
        let request = Request::object(Method::Put, "b", "k")
            .query("partNumber", "3")
            .header("Content-Type", "text/plain")
            .body("hello");
        assert_eq!(request.path, "/b/k");
        assert_eq!(request.query_param("partNumber"), Some("3"));
        assert_eq!(request.header_value("content-type"), Some("text/plain"));
        assert_eq!(request.body, Bytes::from_static(b"hello"));
    }
}
