//! Object-level operations
//!
//! [`Bucket`] and [`Key`] are the entry points callers use: upload an object,
//! delete it, or read its metadata (including the restore status of archived
//! objects).

use std::fmt;
use std::sync::Arc;

use jiff::Timestamp;

use crate::cancel::CancelToken;
use crate::config::TransferConfig;
use crate::error::{Error, Result};
use crate::payload::PayloadSource;
use crate::restore::RestoreStatus;
use crate::retry::{RetryController, RetryCounter, Sleeper};
use crate::transfer::{TransferDriver, TransferReport, UploadTarget};
use crate::transport::{Method, Request, Response, Transport};

/// Metadata observed on the last metadata read of an object
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
    pub restore: RestoreStatus,
    pub size: Option<u64>,
    pub etag: Option<String>,
    pub content_type: Option<String>,
    pub last_modified: Option<Timestamp>,
    pub storage_class: Option<String>,
    pub version_id: Option<String>,
    /// Set when a delete created a delete marker
    pub delete_marker: bool,
}

impl ObjectMetadata {
    pub fn from_response(response: &Response) -> Self {
        Self {
            restore: RestoreStatus::from_response(response),
            size: response
                .header("content-length")
                .and_then(|v| v.trim().parse().ok()),
            etag: response
                .header("etag")
                .map(|v| v.trim_matches('"').to_string()),
            content_type: response.header("content-type").map(str::to_string),
            last_modified: response
                .header("last-modified")
                .and_then(|v| jiff::fmt::rfc2822::parse(v).ok())
                .map(|zoned| zoned.timestamp()),
            storage_class: response.header("x-amz-storage-class").map(str::to_string),
            version_id: response.header("x-amz-version-id").map(str::to_string),
            delete_marker: response
                .header("x-amz-delete-marker")
                .is_some_and(|v| v.eq_ignore_ascii_case("true")),
        }
    }
}

/// Options for [`Key::send_file`]
#[derive(Clone, Default)]
pub struct SendOptions {
    /// `None` picks chunked mode from the payload size and the configured
    /// threshold
    pub chunked: Option<bool>,
    pub content_type: Option<String>,
    /// Counter to observe retry decisions; a fresh one is used otherwise
    pub counter: Option<RetryCounter>,
    /// Overrides the bucket-level cancellation token
    pub cancel: Option<CancelToken>,
    pub sleeper: Option<Arc<dyn Sleeper>>,
}

impl SendOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunked(mut self, chunked: bool) -> Self {
        self.chunked = Some(chunked);
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn counter(mut self, counter: RetryCounter) -> Self {
        self.counter = Some(counter);
        self
    }

    pub fn cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }
}

impl fmt::Debug for SendOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendOptions")
            .field("chunked", &self.chunked)
            .field("content_type", &self.content_type)
            .field("counter", &self.counter)
            .field("cancel", &self.cancel.is_some())
            .field("sleeper", &self.sleeper.is_some())
            .finish()
    }
}

#[derive(Clone)]
struct Context {
    transport: Arc<dyn Transport>,
    config: TransferConfig,
    cancel: Option<CancelToken>,
    sleeper: Option<Arc<dyn Sleeper>>,
}

impl Context {
    fn driver(&self) -> TransferDriver {
        let mut driver = TransferDriver::new(self.transport.clone(), self.config.clone())
            .with_cancel(self.cancel.clone());
        if let Some(sleeper) = &self.sleeper {
            driver = driver.with_sleeper(sleeper.clone());
        }
        driver
    }
}

/// A bucket on the remote service
#[derive(Clone)]
pub struct Bucket {
    name: String,
    ctx: Context,
}

impl Bucket {
    pub fn new(
        name: impl Into<String>,
        transport: Arc<dyn Transport>,
        config: TransferConfig,
    ) -> Self {
        Self {
            name: name.into(),
            ctx: Context {
                transport,
                config,
                cancel: None,
                sleeper: None,
            },
        }
    }

    /// Cancel every operation on this bucket's keys when `cancel` fires
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.ctx.cancel = Some(cancel);
        self
    }

    /// Replace the backoff sleeper for every operation
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.ctx.sleeper = Some(sleeper);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &TransferConfig {
        &self.ctx.config
    }

    /// Handle for an object without contacting the service
    pub fn new_key(&self, name: impl Into<String>) -> Key {
        Key {
            bucket: self.name.clone(),
            name: name.into(),
            metadata: ObjectMetadata::default(),
            ctx: self.ctx.clone(),
        }
    }

    /// Read an object's metadata; `None` if it does not exist
    pub async fn get_key(&self, name: impl Into<String>) -> Result<Option<Key>> {
        let mut key = self.new_key(name);
        match key.fetch_metadata().await {
            Ok(()) => Ok(Some(key)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Delete an object, returning a handle describing the deleted object
    pub async fn delete_key(&self, name: impl Into<String>) -> Result<Key> {
        self.new_key(name).delete().await
    }
}

impl fmt::Debug for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bucket").field("name", &self.name).finish()
    }
}

/// An object in a bucket
#[derive(Clone)]
pub struct Key {
    bucket: String,
    name: String,
    metadata: ObjectMetadata,
    ctx: Context,
}

impl Key {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn metadata(&self) -> &ObjectMetadata {
        &self.metadata
    }

    pub fn restore_status(&self) -> &RestoreStatus {
        &self.metadata.restore
    }

    /// `None` when no restore status has been reported
    pub fn ongoing_restore(&self) -> Option<bool> {
        self.metadata.restore.ongoing_restore()
    }

    pub fn expiry_date(&self) -> Option<&str> {
        self.metadata.restore.expiry_date()
    }

    /// Upload `source` as this object's content.
    ///
    /// Metadata is not refreshed afterwards.
    pub async fn send_file(
        &self,
        source: &mut dyn PayloadSource,
        options: SendOptions,
    ) -> Result<TransferReport> {
        let config = &self.ctx.config;
        let chunked = options
            .chunked
            .unwrap_or_else(|| config.wants_chunked(source.size_hint()));

        let controller = RetryController::with_counter(
            config.retry.clone(),
            options.counter.unwrap_or_default(),
        );
        let mut driver = self
            .ctx
            .driver()
            .with_controller(controller)
            .with_cancel(options.cancel.or_else(|| self.ctx.cancel.clone()));
        if let Some(sleeper) = options.sleeper {
            driver = driver.with_sleeper(sleeper);
        }

        let mut target = UploadTarget::new(&self.bucket, &self.name);
        target.content_type = options.content_type;

        tracing::debug!(bucket = %self.bucket, key = %self.name, chunked, "Sending object");
        driver.send_payload(&target, source, chunked).await
    }

    /// Re-read the object's metadata, replacing what was observed before
    pub async fn fetch_metadata(&mut self) -> Result<()> {
        let request = Request::object(Method::Head, &self.bucket, &self.name);
        let response = self
            .ctx
            .driver()
            .execute(request)
            .await
            .map_err(|e| self.not_found(e))?;

        self.metadata = ObjectMetadata::from_response(&response);
        Ok(())
    }

    /// Delete the object. A successful delete always yields a handle, even
    /// though the service answers with an empty body.
    pub async fn delete(&self) -> Result<Key> {
        let request = Request::object(Method::Delete, &self.bucket, &self.name);
        let response = self
            .ctx
            .driver()
            .execute(request)
            .await
            .map_err(|e| self.not_found(e))?;

        tracing::debug!(bucket = %self.bucket, key = %self.name, status = response.status, "Deleted object");

        let observed = ObjectMetadata::from_response(&response);
        Ok(Key {
            bucket: self.bucket.clone(),
            name: self.name.clone(),
            metadata: ObjectMetadata {
                version_id: observed.version_id,
                delete_marker: observed.delete_marker,
                ..ObjectMetadata::default()
            },
            ctx: self.ctx.clone(),
        })
    }

    fn not_found(&self, error: Error) -> Error {
        if error.status() == Some(404) {
            Error::NotFound(format!("{}/{}", self.bucket, self.name))
        } else {
            error
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("bucket", &self.bucket)
            .field("name", &self.name)
            .field("metadata", &self.metadata)
            .finish()
    }
}
