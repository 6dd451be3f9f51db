//! rm command - Delete an object

use clap::Args;
use serde::Serialize;
use xfer_core::{CancelToken, Key};

use crate::commands::{open_bucket, report_error};
use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

#[derive(Args, Debug)]
pub struct RmArgs {
    /// Object to delete (alias/bucket/key)
    pub path: String,
}

#[derive(Debug, Serialize)]
struct RmOutput {
    path: String,
    deleted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    version_id: Option<String>,
    delete_marker: bool,
}

impl RmOutput {
    fn new(path: String, key: &Key) -> Self {
        Self {
            path,
            deleted: true,
            version_id: key.metadata().version_id.clone(),
            delete_marker: key.metadata().delete_marker,
        }
    }
}

pub async fn execute(args: RmArgs, output_config: OutputConfig, cancel: CancelToken) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let (remote, bucket) = match open_bucket(&args.path, &cancel, &formatter) {
        Ok(opened) => opened,
        Err(code) => return code,
    };

    match bucket.delete_key(&remote.key).await {
        Ok(key) => {
            let output = RmOutput::new(remote.to_string(), &key);
            if formatter.is_json() {
                formatter.json(&output);
            } else {
                let mut message = format!("Removed {}", formatter.style_name(&output.path));
                if let Some(version) = &output.version_id {
                    message.push_str(&format!(" (version {version})"));
                }
                if output.delete_marker {
                    message.push_str(" [delete marker]");
                }
                formatter.success(&message);
            }
            ExitCode::Success
        }
        Err(e) => report_error(&e, &formatter),
    }
}
