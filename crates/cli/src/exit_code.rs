//! Process exit codes
//!
//! Scripts rely on these values, so they never change once assigned.

use xfer_core::{Error, FailureKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    /// Bad arguments or an unparseable path
    UsageError = 2,
    /// Connection failures and exhausted transient retries
    NetworkError = 3,
    /// The service rejected the request outright
    Rejected = 4,
    NotFound = 5,
    /// Interrupted by Ctrl-C
    Cancelled = 130,
}

impl ExitCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Map a core error to the exit code reported for it
    pub fn from_error(error: &Error) -> Self {
        match error {
            Error::InvalidPath(_) => ExitCode::UsageError,
            Error::AliasNotFound(_) | Error::NotFound(_) => ExitCode::NotFound,
            Error::Cancelled { .. } => ExitCode::Cancelled,
            Error::Transport(_) => ExitCode::NetworkError,
            Error::Transfer(failure) if failure.exhausted => ExitCode::NetworkError,
            Error::Transfer(failure) => match failure.kind {
                FailureKind::Fatal => ExitCode::Rejected,
                FailureKind::TransientServer
                | FailureKind::TransientTimeout
                | FailureKind::TransportFailure => ExitCode::NetworkError,
            },
            Error::Config(_)
            | Error::Io(_)
            | Error::TomlParse(_)
            | Error::TomlSerialize(_) => ExitCode::GeneralError,
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code.as_u8())
    }
}
