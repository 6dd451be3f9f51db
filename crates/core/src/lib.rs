//! xfer-core: Transfer engine for S3-compatible object storage
//!
//! This crate provides the parts of xfer that do not depend on an HTTP stack:
//! - Response classification and retry control with bounded backoff
//! - Single-request and chunked (multipart) uploads
//! - Object handles: upload, delete, metadata and restore status
//! - Configuration and alias management
//!
//! All network traffic goes through the [`Transport`] trait, so the engine
//! can be driven by a real HTTP client or by an in-memory fake in tests.

pub mod alias;
pub mod cancel;
pub mod classify;
pub mod config;
pub mod error;
pub mod error_body;
pub mod key;
pub mod path;
pub mod payload;
pub mod restore;
pub mod retry;
pub mod transfer;
pub mod transport;

pub use alias::{Alias, AliasManager};
pub use cancel::{CancelHandle, CancelToken};
pub use classify::{Classified, Outcome, classify, classify_status};
pub use config::{Config, ConfigManager, TransferConfig};
pub use error::{Error, FailureKind, Result, TransferFailure};
pub use key::{Bucket, Key, ObjectMetadata, SendOptions};
pub use path::RemotePath;
pub use payload::{BytesSource, FileSource, PayloadSource};
pub use restore::{RestoreParseError, RestoreStatus};
pub use retry::{
    Decision, RetryBuilder, RetryConfig, RetryController, RetryCounter, RetryPolicy, Sleeper,
    TokioSleeper, TransferAttempt,
};
pub use transfer::{TransferDriver, TransferReport, UploadTarget};
pub use transport::{Method, Request, Response, Transport, TransportError, TransportErrorKind};
