//! Error types for xfer-core
//!
//! Terminal transfer failures carry the last observed status code, error code
//! and attempt count so callers can diagnose what went wrong.

use std::fmt;

use thiserror::Error;

use crate::transport::TransportError;

/// Result type alias for xfer-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Classification of the last failure seen before a transfer gave up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// 5xx response
    TransientServer,
    /// 4xx response carrying the `RequestTimeout` error code
    TransientTimeout,
    /// Any other 4xx, unclassifiable status or malformed response
    Fatal,
    /// Adapter-level I/O failure (connection refused, TLS, ...)
    TransportFailure,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::TransientServer => write!(f, "server error"),
            FailureKind::TransientTimeout => write!(f, "request timeout"),
            FailureKind::Fatal => write!(f, "fatal error"),
            FailureKind::TransportFailure => write!(f, "transport failure"),
        }
    }
}

/// A terminal failure of one logical transfer
///
/// A retryable failure that ran out of budget is surfaced with `kind` set to
/// [`FailureKind::Fatal`]; `cause` keeps the class of the last failure seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferFailure {
    pub kind: FailureKind,
    /// Classification of the last failed exchange
    pub cause: FailureKind,
    /// Last HTTP status, absent for transport failures
    pub status: Option<u16>,
    /// Error code extracted from the last response body
    pub code: Option<String>,
    pub message: Option<String>,
    /// Attempts made for the exchange that failed
    pub attempts: u32,
    /// Chunk number when the failure happened during a chunked transfer
    pub chunk: Option<u32>,
    /// True when a retryable failure ran out of retry budget
    pub exhausted: bool,
}

impl TransferFailure {
    pub fn new(kind: FailureKind, attempts: u32) -> Self {
        Self {
            kind,
            cause: kind,
            status: None,
            code: None,
            message: None,
            attempts,
            chunk: None,
            exhausted: false,
        }
    }

    /// Re-classify a retryable failure whose retry budget ran out
    pub fn into_exhausted(self) -> Self {
        Self {
            kind: FailureKind::Fatal,
            exhausted: true,
            ..self
        }
    }

    /// Failure for a success response that could not be interpreted
    pub fn malformed(status: u16, message: impl Into<String>, attempts: u32) -> Self {
        Self {
            status: Some(status),
            message: Some(message.into()),
            ..Self::new(FailureKind::Fatal, attempts)
        }
    }
}

impl fmt::Display for TransferFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cause)?;
        if let Some(status) = self.status {
            write!(f, " (HTTP {status}")?;
            if let Some(code) = &self.code {
                write!(f, ", {code}")?;
            }
            write!(f, ")")?;
        }
        if let Some(chunk) = self.chunk {
            write!(f, " on part {chunk}")?;
        }
        write!(f, " after {} attempt(s)", self.attempts)?;
        if self.exhausted {
            write!(f, ", retries exhausted")?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

impl std::error::Error for TransferFailure {}

/// Core error type for xfer operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Alias not found: {0}")]
    AliasNotFound(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transfer failed: {0}")]
    Transfer(#[from] TransferFailure),

    #[error("Transfer cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Error {
    /// The transfer failure behind this error, if any
    pub fn failure(&self) -> Option<&TransferFailure> {
        match self {
            Error::Transfer(failure) => Some(failure),
            _ => None,
        }
    }

    /// HTTP status of the last exchange, if the error came from one
    pub fn status(&self) -> Option<u16> {
        self.failure().and_then(|f| f.status)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }
}
