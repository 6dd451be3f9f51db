//! Response classification
//!
//! Turns a completed exchange into an [`Outcome`] the retry controller can act
//! on. Classification is a pure function of status code and error code.

use crate::error_body::{self, REQUEST_TIMEOUT_CODE, TRANSIENT_SERVER_CODES};
use crate::transport::Response;

/// What a single exchange means for the transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    /// 5xx; retried under the whole-request policy
    RetryableServerError,
    /// 4xx carrying the `RequestTimeout` code; retried under the timeout policy
    RetryableTimeout,
    FatalError,
}

impl Outcome {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Outcome::RetryableServerError | Outcome::RetryableTimeout
        )
    }
}

/// Classify a status code and (optional) error code
pub fn classify_status(status: u16, code: Option<&str>) -> Outcome {
    match status {
        200..=299 => Outcome::Success,
        500..=599 => Outcome::RetryableServerError,
        400..=499 if code == Some(REQUEST_TIMEOUT_CODE) => Outcome::RetryableTimeout,
        _ => Outcome::FatalError,
    }
}

/// Outcome of an exchange together with the details needed for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub outcome: Outcome,
    pub status: u16,
    pub code: Option<String>,
    pub message: Option<String>,
}

/// Classify a response, reading the error code from non-2xx bodies
pub fn classify(response: &Response) -> Classified {
    if response.is_success() {
        return Classified {
            outcome: Outcome::Success,
            status: response.status,
            code: None,
            message: None,
        };
    }

    let code = error_body::error_code(&response.body);
    let message = error_body::error_message(&response.body);
    Classified {
        outcome: classify_status(response.status, code.as_deref()),
        status: response.status,
        code,
        message,
    }
}

/// Classify a response that may report failure inside a 200 body.
///
/// CompleteMultipartUpload can answer 200 and then stream an `<Error>`
/// document once processing fails.
pub fn classify_embedded(response: &Response) -> Classified {
    if !response.is_success() || !error_body::is_error_document(&response.body) {
        return classify(response);
    }

    let code = error_body::error_code(&response.body);
    let outcome = match code.as_deref() {
        Some(REQUEST_TIMEOUT_CODE) => Outcome::RetryableTimeout,
        Some(c) if TRANSIENT_SERVER_CODES.contains(&c) => Outcome::RetryableServerError,
        _ => Outcome::FatalError,
    };
    Classified {
        outcome,
        status: response.status,
        message: error_body::error_message(&response.body),
        code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status_ranges() {
        assert_eq!(classify_status(200, None), Outcome::Success);
        assert_eq!(classify_status(204, None), Outcome::Success);
        assert_eq!(classify_status(299, None), Outcome::Success);
        for status in 500..=599 {
            assert_eq!(classify_status(status, None), Outcome::RetryableServerError);
        }
        assert_eq!(classify_status(400, None), Outcome::FatalError);
        assert_eq!(classify_status(404, Some("NoSuchKey")), Outcome::FatalError);
        assert_eq!(classify_status(301, None), Outcome::FatalError);
        assert_eq!(classify_status(100, None), Outcome::FatalError);
        assert_eq!(classify_status(600, None), Outcome::FatalError);
    }

    #[test]
    fn test_request_timeout_only_in_4xx() {
        assert_eq!(
            classify_status(400, Some("RequestTimeout")),
            Outcome::RetryableTimeout
        );
        assert_eq!(
            classify_status(408, Some("RequestTimeout")),
            Outcome::RetryableTimeout
        );
        // A 5xx is a server error whatever the body says
        assert_eq!(
            classify_status(503, Some("RequestTimeout")),
            Outcome::RetryableServerError
        );
        // Code matching is exact
        assert_eq!(
            classify_status(400, Some("requesttimeout")),
            Outcome::FatalError
        );
    }

    #[test]
    fn test_classify_reads_body() {
        let response = Response::new(400).with_body("<Error><Code>RequestTimeout</Code></Error>");
        let classified = classify(&response);
        assert_eq!(classified.outcome, Outcome::RetryableTimeout);
        assert_eq!(classified.code.as_deref(), Some("RequestTimeout"));
        assert_eq!(classified.status, 400);
    }

    #[test]
    fn test_delete_no_content_is_success() {
        let classified = classify(&Response::new(204));
        assert_eq!(classified.outcome, Outcome::Success);
        assert_eq!(classified.code, None);
    }

    #[test]
    fn test_classify_embedded_error() {
        let ok = Response::new(200).with_body(
            "<CompleteMultipartUploadResult><ETag>\"x\"</ETag></CompleteMultipartUploadResult>",
        );
        assert_eq!(classify_embedded(&ok).outcome, Outcome::Success);

        let internal = Response::new(200)
            .with_body("<Error><Code>InternalError</Code><Message>retry</Message></Error>");
        let classified = classify_embedded(&internal);
        assert_eq!(classified.outcome, Outcome::RetryableServerError);
        assert_eq!(classified.message.as_deref(), Some("retry"));

        let denied = Response::new(200).with_body("<Error><Code>InvalidPart</Code></Error>");
        assert_eq!(classify_embedded(&denied).outcome, Outcome::FatalError);
    }
}
