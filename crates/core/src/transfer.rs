//! Transfer driver
//!
//! Sends payloads either as a single `PUT` or as an S3 multipart upload, one
//! part per chunk. Every exchange is classified and handed to the
//! [`RetryController`]; retries re-send the same request (the same part, for
//! chunked transfers) after the controller's backoff.
//!
//! Parts are sent strictly in order. When a part fails for good the upload is
//! aborted and no later part is sent: the server is not assumed to keep the
//! parts it already accepted.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::cancel::CancelToken;
use crate::classify::{self, Classified, Outcome};
use crate::config::TransferConfig;
use crate::error::{Error, FailureKind, Result, TransferFailure};
use crate::error_body;
use crate::payload::{self, PayloadSource};
use crate::retry::{Decision, RetryController, Sleeper, TokioSleeper, TransferAttempt};
use crate::transport::{Method, Request, Response, Transport};

/// Where an upload goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub bucket: String,
    pub key: String,
    pub content_type: Option<String>,
}

impl UploadTarget {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            content_type: None,
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    fn request(&self, method: Method) -> Request {
        Request::object(method, &self.bucket, &self.key)
    }
}

/// Summary of a finished upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReport {
    pub bytes: u64,
    /// 1 for single-request uploads
    pub parts: u32,
    /// Exchanges performed, including retries
    pub exchanges: u32,
    /// Retry decisions made during the transfer
    pub retry_invocations: u64,
    pub etag: Option<String>,
    pub chunked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CompletedPart {
    number: u32,
    etag: String,
}

enum Step {
    Done(Response),
    Retry,
}

type Classifier = fn(&Response) -> Classified;

/// Upper bound on the best-effort abort of a failed multipart upload
pub const DEFAULT_ABORT_TIMEOUT: Duration = Duration::from_secs(10);

/// Drives the exchanges of one logical transfer
pub struct TransferDriver {
    transport: Arc<dyn Transport>,
    config: TransferConfig,
    controller: RetryController,
    sleeper: Arc<dyn Sleeper>,
    cancel: Option<CancelToken>,
    abort_timeout: Duration,
    exchanges: u32,
}

impl TransferDriver {
    pub fn new(transport: Arc<dyn Transport>, config: TransferConfig) -> Self {
        let controller = RetryController::new(config.retry.clone());
        Self {
            transport,
            config,
            controller,
            sleeper: Arc::new(TokioSleeper),
            cancel: None,
            abort_timeout: DEFAULT_ABORT_TIMEOUT,
            exchanges: 0,
        }
    }

    pub fn with_controller(mut self, controller: RetryController) -> Self {
        self.controller = controller;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_cancel(mut self, cancel: Option<CancelToken>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_abort_timeout(mut self, timeout: Duration) -> Self {
        self.abort_timeout = timeout;
        self
    }

    pub fn controller(&self) -> &RetryController {
        &self.controller
    }

    /// Exchanges performed so far, including retries
    pub fn exchanges(&self) -> u32 {
        self.exchanges
    }

    /// Perform one logical exchange, retrying per the controller
    pub async fn execute(&mut self, request: Request) -> Result<Response> {
        self.run(request, None, classify::classify)
            .await
            .map(|(response, _)| response)
    }

    /// Upload the whole of `source` to `target`
    pub async fn send_payload(
        &mut self,
        target: &UploadTarget,
        source: &mut dyn PayloadSource,
        chunked: bool,
    ) -> Result<TransferReport> {
        // A zero chunk size would read nothing and upload an empty object
        self.config.validate()?;
        source.rewind().await?;

        let report = if chunked {
            self.send_chunked(target, source).await?
        } else {
            self.send_single(target, source).await?
        };

        tracing::debug!(
            bucket = %target.bucket,
            key = %target.key,
            bytes = report.bytes,
            parts = report.parts,
            exchanges = report.exchanges,
            "Upload complete"
        );
        Ok(report)
    }

    async fn send_single(
        &mut self,
        target: &UploadTarget,
        source: &mut dyn PayloadSource,
    ) -> Result<TransferReport> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            // Every attempt re-reads the payload from the start
            source.rewind().await?;
            let body = payload::read_to_end(source).await?;
            let bytes = body.len() as u64;

            let mut request = target.request(Method::Put).body(body);
            if let Some(ct) = &target.content_type {
                request = request.header("Content-Type", ct);
            }

            if let Step::Done(response) = self
                .attempt(request, attempt, None, classify::classify)
                .await?
            {
                return Ok(TransferReport {
                    bytes,
                    parts: 1,
                    exchanges: self.exchanges,
                    retry_invocations: self.controller.invocations(),
                    etag: response.header("etag").map(trim_etag),
                    chunked: false,
                });
            }
        }
    }

    async fn send_chunked(
        &mut self,
        target: &UploadTarget,
        source: &mut dyn PayloadSource,
    ) -> Result<TransferReport> {
        let upload_id = self.initiate(target).await?;

        match self.send_parts_and_complete(target, &upload_id, source).await {
            Ok(report) => Ok(report),
            Err(e) => {
                self.abort(target, &upload_id).await;
                Err(e)
            }
        }
    }

    async fn initiate(&mut self, target: &UploadTarget) -> Result<String> {
        let mut request = target.request(Method::Post).query("uploads", "");
        if let Some(ct) = &target.content_type {
            request = request.header("Content-Type", ct);
        }

        let (response, attempts) = self.run(request, None, classify::classify).await?;
        error_body::element_text(&response.body, "UploadId")
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                TransferFailure::malformed(
                    response.status,
                    "multipart initiation returned no UploadId",
                    attempts,
                )
                .into()
            })
    }

    async fn send_parts_and_complete(
        &mut self,
        target: &UploadTarget,
        upload_id: &str,
        source: &mut dyn PayloadSource,
    ) -> Result<TransferReport> {
        let mut parts = Vec::new();
        let mut bytes = 0u64;

        loop {
            let chunk = match source.read_chunk(self.config.chunk_size).await? {
                Some(chunk) => chunk,
                // An empty payload still needs one (empty) part
                None if parts.is_empty() => Bytes::new(),
                None => break,
            };
            let number = parts.len() as u32 + 1;
            let len = chunk.len() as u64;

            let request = target
                .request(Method::Put)
                .query("partNumber", number.to_string())
                .query("uploadId", upload_id)
                .body(chunk);
            let (response, attempts) = self.run(request, Some(number), classify::classify).await?;

            let etag = response.header("etag").map(str::to_string).ok_or_else(|| {
                Error::from(TransferFailure {
                    chunk: Some(number),
                    ..TransferFailure::malformed(response.status, "part upload returned no ETag", attempts)
                })
            })?;

            tracing::debug!(part = number, bytes = len, "Part uploaded");
            parts.push(CompletedPart { number, etag });
            bytes += len;

            if len == 0 {
                break;
            }
        }

        let request = target
            .request(Method::Post)
            .query("uploadId", upload_id)
            .header("Content-Type", "application/xml")
            .body(completion_body(&parts));
        let (response, _) = self.run(request, None, classify::classify_embedded).await?;

        Ok(TransferReport {
            bytes,
            parts: parts.len() as u32,
            exchanges: self.exchanges,
            retry_invocations: self.controller.invocations(),
            etag: error_body::element_text(&response.body, "ETag")
                .as_deref()
                .map(trim_etag),
            chunked: true,
        })
    }

    /// Best-effort cleanup of a failed multipart upload
    async fn abort(&mut self, target: &UploadTarget, upload_id: &str) {
        let request = target
            .request(Method::Delete)
            .query("uploadId", upload_id);
        self.exchanges += 1;

        // Runs after cancellation too, so it must not wait on a stuck transport
        let result =
            match tokio::time::timeout(self.abort_timeout, self.transport.exchange(request)).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(
                        key = %target.key,
                        upload_id,
                        timeout_ms = self.abort_timeout.as_millis() as u64,
                        "Timed out aborting multipart upload"
                    );
                    return;
                }
            };

        match result {
            Ok(response) if response.is_success() => {
                tracing::debug!(key = %target.key, "Aborted multipart upload");
            }
            Ok(response) => {
                tracing::warn!(
                    key = %target.key,
                    upload_id,
                    status = response.status,
                    "Failed to abort multipart upload"
                );
            }
            Err(e) => {
                tracing::warn!(
                    key = %target.key,
                    upload_id,
                    error = %e,
                    "Failed to abort multipart upload"
                );
            }
        }
    }

    /// Retry loop around a request that can be re-sent as is
    async fn run(
        &mut self,
        request: Request,
        chunk: Option<u32>,
        classifier: Classifier,
    ) -> Result<(Response, u32)> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            if let Step::Done(response) = self
                .attempt(request.clone(), attempt, chunk, classifier)
                .await?
            {
                return Ok((response, attempt));
            }
        }
    }

    /// One exchange: send, classify, consult the controller, back off
    async fn attempt(
        &mut self,
        request: Request,
        attempt: u32,
        chunk: Option<u32>,
        classifier: Classifier,
    ) -> Result<Step> {
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(Error::Cancelled {
                attempts: attempt - 1,
            });
        }

        let method = request.method;
        let path = request.path.clone();
        self.exchanges += 1;

        let result = self
            .suspend(self.transport.exchange(request), attempt)
            .await?;

        let (outcome, response, failure) = match result {
            Ok(response) => {
                let classified = classifier(&response);
                let failure = TransferFailure {
                    status: Some(classified.status),
                    code: classified.code,
                    message: classified.message,
                    chunk,
                    ..TransferFailure::new(failure_kind(classified.outcome), attempt)
                };
                (classified.outcome, Some(response), failure)
            }
            Err(e) => {
                let outcome = if self.config.retry.retry_transport_errors {
                    Outcome::RetryableServerError
                } else {
                    Outcome::FatalError
                };
                let failure = TransferFailure {
                    message: Some(e.to_string()),
                    chunk,
                    ..TransferFailure::new(FailureKind::TransportFailure, attempt)
                };
                (outcome, None, failure)
            }
        };

        tracing::debug!(
            method = %method,
            path = %path,
            attempt,
            chunk = ?chunk,
            status = ?failure.status,
            outcome = ?outcome,
            "Exchange finished"
        );

        let decision = self.controller.decide(&TransferAttempt {
            attempt,
            chunk,
            outcome,
        });

        match decision {
            Decision::Complete => match response {
                Some(response) => Ok(Step::Done(response)),
                None => Err(failure.into()),
            },
            Decision::Retry(delay) => {
                tracing::warn!(
                    method = %method,
                    path = %path,
                    attempt,
                    chunk = ?chunk,
                    status = ?failure.status,
                    code = ?failure.code,
                    backoff_ms = delay.as_millis() as u64,
                    "Retrying after transient error"
                );
                self.suspend(self.sleeper.sleep(delay), attempt).await?;
                Ok(Step::Retry)
            }
            Decision::Abort { exhausted: true } => Err(failure.into_exhausted().into()),
            Decision::Abort { exhausted: false } => Err(failure.into()),
        }
    }

    /// Await `fut` unless the transfer is cancelled first
    async fn suspend<F: Future>(&self, fut: F, attempts: u32) -> Result<F::Output> {
        match &self.cancel {
            None => Ok(fut.await),
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => {
                    tracing::debug!(attempts, "Transfer cancelled");
                    Err(Error::Cancelled { attempts })
                }
                output = fut => Ok(output),
            },
        }
    }
}

fn failure_kind(outcome: Outcome) -> FailureKind {
    match outcome {
        Outcome::RetryableServerError => FailureKind::TransientServer,
        Outcome::RetryableTimeout => FailureKind::TransientTimeout,
        Outcome::Success | Outcome::FatalError => FailureKind::Fatal,
    }
}

fn trim_etag(etag: &str) -> String {
    etag.trim_matches('"').to_string()
}

fn completion_body(parts: &[CompletedPart]) -> String {
    let mut body = String::from("<CompleteMultipartUpload>");
    for part in parts {
        body.push_str(&format!(
            "<Part><PartNumber>{}</PartNumber><ETag>{}</ETag></Part>",
            part.number,
            quick_xml::escape::escape(part.etag.as_str())
        ));
    }
    body.push_str("</CompleteMultipartUpload>");
    body
}
