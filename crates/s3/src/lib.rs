//! xfer-s3: HTTP transport adapter for xfer
//!
//! Implements [`xfer_core::Transport`] on top of reqwest, signing requests
//! with AWS Signature Version 4.

mod client;
mod signing;

pub use client::{HttpTransport, TransportBuilder};
pub use signing::SigningError;
