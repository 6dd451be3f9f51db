//! Restore status of archived objects
//!
//! S3 reports the state of a restore request for archived (Glacier class)
//! objects in the `x-amz-restore` response header, in one of two shapes:
//!
//! ```text
//! ongoing-request="true"
//! ongoing-request="false", expiry-date="Fri, 21 Dec 2012 00:00:00 GMT"
//! ```

use std::fmt;

use jiff::Timestamp;
use thiserror::Error;

use crate::transport::Response;

/// Response header carrying the restore status
pub const RESTORE_HEADER: &str = "x-amz-restore";

/// Restore state reported for an object
///
/// The expiry date is only representable once the restore has completed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RestoreStatus {
    /// No restore header was reported
    #[default]
    Unknown,
    /// A restore request is in progress
    Ongoing,
    /// The restored copy is readable until `expiry_date`
    Completed {
        /// Verbatim header value, never reformatted
        expiry_date: String,
    },
}

/// The restore header was present but did not match a known shape
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized {RESTORE_HEADER} header: {0:?}")]
pub struct RestoreParseError(pub String);

impl RestoreStatus {
    /// Parse the raw header value; `None` means the header was absent.
    pub fn parse(header: Option<&str>) -> Result<Self, RestoreParseError> {
        let Some(raw) = header else {
            return Ok(RestoreStatus::Unknown);
        };

        let invalid = || RestoreParseError(raw.to_string());

        let (first, rest) = match raw.split_once(',') {
            Some((first, rest)) => (first, Some(rest)),
            None => (raw, None),
        };

        let ongoing = match parse_pair(first).ok_or_else(invalid)? {
            ("ongoing-request", "true") => true,
            ("ongoing-request", "false") => false,
            _ => return Err(invalid()),
        };

        match (ongoing, rest) {
            (true, None) => Ok(RestoreStatus::Ongoing),
            (false, Some(rest)) => match parse_pair(rest).ok_or_else(invalid)? {
                ("expiry-date", date) if !date.is_empty() => Ok(RestoreStatus::Completed {
                    expiry_date: date.to_string(),
                }),
                _ => Err(invalid()),
            },
            _ => Err(invalid()),
        }
    }

    /// Restore status of a metadata response.
    ///
    /// An unrecognized header is logged and treated as absent.
    pub fn from_response(response: &Response) -> Self {
        let header = response.header(RESTORE_HEADER);
        match Self::parse(header) {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring restore status");
                RestoreStatus::Unknown
            }
        }
    }

    /// `Some(true)` while restoring, `Some(false)` once done, `None` if unknown
    pub fn ongoing_restore(&self) -> Option<bool> {
        match self {
            RestoreStatus::Unknown => None,
            RestoreStatus::Ongoing => Some(true),
            RestoreStatus::Completed { .. } => Some(false),
        }
    }

    pub fn expiry_date(&self) -> Option<&str> {
        match self {
            RestoreStatus::Completed { expiry_date } => Some(expiry_date),
            _ => None,
        }
    }

    /// The expiry date as a timestamp, if it is a valid RFC 1123 date
    pub fn expiry_timestamp(&self) -> Option<Timestamp> {
        let date = self.expiry_date()?;
        jiff::fmt::rfc2822::parse(date)
            .ok()
            .map(|zoned| zoned.timestamp())
    }
}

impl fmt::Display for RestoreStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestoreStatus::Unknown => write!(f, "-"),
            RestoreStatus::Ongoing => write!(f, "in progress"),
            RestoreStatus::Completed { expiry_date } => write!(f, "restored until {expiry_date}"),
        }
    }
}

/// Split `key="value"` into its trimmed parts
fn parse_pair(part: &str) -> Option<(&str, &str)> {
    let (key, value) = part.split_once('=')?;
    let value = value.trim();
    let value = value.strip_prefix('"')?.strip_suffix('"')?;
    Some((key.trim(), value))
}
