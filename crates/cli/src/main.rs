//! xfer - upload and manage objects on S3-compatible storage
//!
//! Transfers retry transient server errors and request timeouts on their own
//! and can be interrupted with Ctrl-C, which aborts any in-flight chunked
//! upload.

use clap::{ArgAction, Parser};
use tracing_subscriber::EnvFilter;
use xfer_core::CancelHandle;

mod commands;
mod exit_code;
mod output;

use commands::Commands;
use output::OutputConfig;

#[derive(Parser, Debug)]
#[command(name = "xfer", version, about, long_about = None)]
struct Cli {
    /// Output strict JSON
    #[arg(long, global = true)]
    json: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_config(&self) -> OutputConfig {
        OutputConfig {
            json: self.json,
            no_color: self.no_color || std::env::var_os("NO_COLOR").is_some(),
            quiet: self.quiet,
        }
    }
}

fn log_filter(verbose: u8) -> EnvFilter {
    // RUST_LOG wins over -v
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        EnvFilter::new(format!("xfer={level},xfer_core={level},xfer_s3={level}"))
    })
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let output_config = cli.output_config();

    let cancel = CancelHandle::new();
    let token = cancel.token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling");
            cancel.cancel();
        }
    });

    commands::execute(cli.command, output_config, token)
        .await
        .into()
}
