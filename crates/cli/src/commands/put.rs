//! put command - Upload a local file
//!
//! Files above the alias's multipart threshold go up in chunks, each chunk
//! retried on its own; `--chunked` and `--single` override that choice.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Args;
use serde::Serialize;
use xfer_core::{CancelToken, FileSource, RetryCounter, SendOptions, TransferReport};

use crate::commands::{open_bucket, report_error};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

#[derive(Args, Debug)]
pub struct PutArgs {
    /// Local file to upload
    pub source: PathBuf,

    /// Destination (alias/bucket/key)
    pub target: String,

    /// Always use a chunked upload
    #[arg(long, conflicts_with = "single")]
    pub chunked: bool,

    /// Always send the file in one request
    #[arg(long)]
    pub single: bool,

    /// Content type (guessed from the file name by default)
    #[arg(long)]
    pub content_type: Option<String>,
}

impl PutArgs {
    fn chunked_override(&self) -> Option<bool> {
        match (self.chunked, self.single) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize)]
struct PutOutput {
    source: String,
    target: String,
    bytes: u64,
    size_human: String,
    chunked: bool,
    parts: u32,
    exchanges: u32,
    retry_decisions: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    etag: Option<String>,
}

pub async fn execute(args: PutArgs, output_config: OutputConfig, cancel: CancelToken) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let (remote, bucket) = match open_bucket(&args.target, &cancel, &formatter) {
        Ok(opened) => opened,
        Err(code) => return code,
    };

    let mut source = match open_source(&args.source).await {
        Ok(source) => source,
        Err(e) => {
            formatter.error(&format!("{e:#}"));
            return ExitCode::GeneralError;
        }
    };

    let content_type = args
        .content_type
        .clone()
        .unwrap_or_else(|| guess_content_type(&args.source));

    let counter = RetryCounter::new();
    let mut options = SendOptions::new()
        .content_type(content_type)
        .counter(counter.clone());
    if let Some(chunked) = args.chunked_override() {
        options = options.chunked(chunked);
    }

    let key = bucket.new_key(&remote.key);
    match key.send_file(&mut source, options).await {
        Ok(report) => {
            let size_human = humansize::format_size(report.bytes, humansize::BINARY);
            if formatter.is_json() {
                formatter.json(&PutOutput {
                    source: args.source.display().to_string(),
                    target: remote.to_string(),
                    bytes: report.bytes,
                    size_human,
                    chunked: report.chunked,
                    parts: report.parts,
                    exchanges: report.exchanges,
                    retry_decisions: report.retry_invocations,
                    etag: report.etag,
                });
            } else {
                let mode = if report.chunked {
                    format!("{} part(s)", report.parts)
                } else {
                    "single request".to_string()
                };
                formatter.success(&format!(
                    "{} -> {} ({}, {mode})",
                    args.source.display(),
                    formatter.style_name(&remote.to_string()),
                    formatter.style_size(&size_human),
                ));
                let retries = retried_requests(&report);
                if retries > 0 {
                    formatter.warning(&format!("{retries} request(s) were retried"));
                }
            }
            ExitCode::Success
        }
        Err(e) => {
            tracing::debug!(retry_decisions = counter.get(), "Upload failed");
            report_error(&e, &formatter)
        }
    }
}

async fn open_source(path: &Path) -> anyhow::Result<FileSource> {
    let metadata = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("Failed to open '{}'", path.display()))?;
    if !metadata.is_file() {
        anyhow::bail!("'{}' is not a regular file", path.display());
    }
    FileSource::open(path)
        .await
        .with_context(|| format!("Failed to open '{}'", path.display()))
}

/// Exchanges beyond the minimum the upload needed
fn retried_requests(report: &TransferReport) -> u32 {
    // A chunked upload also initiates and completes
    let minimum = if report.chunked {
        report.parts + 2
    } else {
        1
    };
    report.exchanges.saturating_sub(minimum)
}

fn guess_content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use xfer_core::PayloadSource;

    fn args(chunked: bool, single: bool) -> PutArgs {
        PutArgs {
            source: PathBuf::from("report.csv"),
            target: "local/bucket/report.csv".to_string(),
            chunked,
            single,
            content_type: None,
        }
    }

    #[test]
    fn test_chunked_override() {
        assert_eq!(args(false, false).chunked_override(), None);
        assert_eq!(args(true, false).chunked_override(), Some(true));
        assert_eq!(args(false, true).chunked_override(), Some(false));
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type(Path::new("a/b/report.csv")), "text/csv");
        assert_eq!(guess_content_type(Path::new("photo.png")), "image/png");
        assert_eq!(
            guess_content_type(Path::new("blob.unknownext")),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_retried_requests() {
        let mut report = TransferReport {
            bytes: 20,
            parts: 4,
            exchanges: 6,
            retry_invocations: 6,
            etag: None,
            chunked: true,
        };
        assert_eq!(retried_requests(&report), 0);

        report.exchanges = 9;
        assert_eq!(retried_requests(&report), 3);

        report.chunked = false;
        report.parts = 1;
        report.exchanges = 1;
        assert_eq!(retried_requests(&report), 0);
    }

    #[tokio::test]
    async fn test_open_source_rejects_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_source(dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("not a regular file"));
    }

    #[tokio::test]
    async fn test_open_source_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_source(&dir.path().join("missing.bin")).await.unwrap_err();
        assert!(format!("{err:#}").contains("Failed to open"));
    }

    #[tokio::test]
    async fn test_open_source_reports_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"0123456789").unwrap();
        let source = open_source(&path).await.unwrap();
        assert_eq!(source.size_hint(), Some(10));
    }
}
