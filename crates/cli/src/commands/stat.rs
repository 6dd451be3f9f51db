//! stat command - Show object metadata
//!
//! Includes the archive restore state reported by the service: whether a
//! restore is running and, once it has finished, when the restored copy
//! expires.

use clap::Args;
use serde::Serialize;
use xfer_core::{CancelToken, Key, RestoreStatus};

use crate::commands::{open_bucket, report_error};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

#[derive(Args, Debug)]
pub struct StatArgs {
    /// Object to inspect (alias/bucket/key)
    pub path: String,
}

#[derive(Debug, Serialize)]
struct RestoreInfo {
    /// Absent when the service reported no restore state
    #[serde(skip_serializing_if = "Option::is_none")]
    ongoing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expiry_date: Option<String>,
}

impl From<&RestoreStatus> for RestoreInfo {
    fn from(status: &RestoreStatus) -> Self {
        Self {
            ongoing: status.ongoing_restore(),
            expiry_date: status.expiry_date().map(str::to_string),
        }
    }
}

#[derive(Debug, Serialize)]
struct StatOutput {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size_human: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_modified: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    storage_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version_id: Option<String>,
    restore: RestoreInfo,
}

impl StatOutput {
    fn new(path: String, key: &Key) -> Self {
        let meta = key.metadata();
        Self {
            path,
            size: meta.size,
            size_human: meta
                .size
                .map(|s| humansize::format_size(s, humansize::BINARY)),
            etag: meta.etag.clone(),
            content_type: meta.content_type.clone(),
            last_modified: meta.last_modified.map(|t| t.to_string()),
            storage_class: meta.storage_class.clone(),
            version_id: meta.version_id.clone(),
            restore: RestoreInfo::from(&meta.restore),
        }
    }
}

fn restore_summary(status: &RestoreStatus) -> String {
    match status {
        RestoreStatus::Unknown => "none".to_string(),
        RestoreStatus::Ongoing => "in progress".to_string(),
        RestoreStatus::Completed { expiry_date } => format!("completed, expires {expiry_date}"),
    }
}

pub async fn execute(args: StatArgs, output_config: OutputConfig, cancel: CancelToken) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let (remote, bucket) = match open_bucket(&args.path, &cancel, &formatter) {
        Ok(opened) => opened,
        Err(code) => return code,
    };

    let key = match bucket.get_key(&remote.key).await {
        Ok(Some(key)) => key,
        Ok(None) => {
            formatter.error(&format!("Object not found: {remote}"));
            return ExitCode::NotFound;
        }
        Err(e) => return report_error(&e, &formatter),
    };

    let output = StatOutput::new(remote.to_string(), &key);
    if formatter.is_json() {
        formatter.json(&output);
        return ExitCode::Success;
    }

    const WIDTH: usize = 14;
    formatter.property("Name", &formatter.style_name(&output.path), WIDTH);
    if let (Some(size), Some(human)) = (output.size, &output.size_human) {
        formatter.property("Size", &format!("{} ({size} bytes)", formatter.style_size(human)), WIDTH);
    }
    if let Some(etag) = &output.etag {
        formatter.property("ETag", etag, WIDTH);
    }
    if let Some(content_type) = &output.content_type {
        formatter.property("Type", content_type, WIDTH);
    }
    if let Some(modified) = &output.last_modified {
        formatter.property("Last modified", &formatter.style_date(modified), WIDTH);
    }
    if let Some(class) = &output.storage_class {
        formatter.property("Storage class", class, WIDTH);
    }
    if let Some(version) = &output.version_id {
        formatter.property("Version", version, WIDTH);
    }
    formatter.property("Restore", &restore_summary(key.restore_status()), WIDTH);

    ExitCode::Success
}
