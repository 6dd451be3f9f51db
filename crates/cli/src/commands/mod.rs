//! Command implementations
//!
//! Each command takes its parsed arguments plus the global output settings
//! and returns the exit code for the process.

use std::sync::Arc;

use clap::Subcommand;
use xfer_core::{AliasManager, Bucket, CancelToken, RemotePath};
use xfer_s3::HttpTransport;

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

pub mod alias;
pub mod put;
pub mod rm;
pub mod stat;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage storage service aliases
    #[command(subcommand)]
    Alias(alias::AliasCommands),

    /// Upload a local file as an object
    Put(put::PutArgs),

    /// Delete an object
    Rm(rm::RmArgs),

    /// Show object metadata and restore status
    Stat(stat::StatArgs),
}

/// Run one command to completion
pub async fn execute(
    command: Commands,
    output_config: OutputConfig,
    cancel: CancelToken,
) -> ExitCode {
    match command {
        Commands::Alias(cmd) => alias::execute(cmd, output_config).await,
        Commands::Put(args) => put::execute(args, output_config, cancel).await,
        Commands::Rm(args) => rm::execute(args, output_config, cancel).await,
        Commands::Stat(args) => stat::execute(args, output_config, cancel).await,
    }
}

/// Resolve `alias/bucket/key` into a bucket handle bound to the alias's
/// endpoint and transfer settings. Errors are reported through `formatter`.
pub(crate) fn open_bucket(
    path: &str,
    cancel: &CancelToken,
    formatter: &Formatter,
) -> Result<(RemotePath, Bucket), ExitCode> {
    let remote = RemotePath::parse(path).map_err(|e| {
        formatter.error(&e.to_string());
        ExitCode::UsageError
    })?;

    let manager = AliasManager::new().map_err(|e| {
        formatter.error(&format!("Failed to load aliases: {e}"));
        ExitCode::GeneralError
    })?;

    let alias = manager.get(&remote.alias).map_err(|_| {
        formatter.error(&format!("Alias '{}' not found", remote.alias));
        ExitCode::NotFound
    })?;

    let transport = HttpTransport::from_alias(&alias).map_err(|e| {
        formatter.error(&format!("Failed to create transport: {e}"));
        ExitCode::from_error(&e)
    })?;

    let config = alias.transfer_config(&manager.config().defaults);
    tracing::debug!(
        alias = %alias.name,
        endpoint = %alias.endpoint,
        chunk_size = config.chunk_size,
        "Opened bucket"
    );

    let bucket = Bucket::new(&remote.bucket, Arc::new(transport), config).with_cancel(cancel.clone());
    Ok((remote, bucket))
}

/// Report a failed operation and pick its exit code
pub(crate) fn report_error(error: &xfer_core::Error, formatter: &Formatter) -> ExitCode {
    if error.is_cancelled() {
        formatter.error("Interrupted");
    } else {
        formatter.error(&error.to_string());
    }
    ExitCode::from_error(error)
}
