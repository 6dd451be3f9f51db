//! Alias management commands
//!
//! An alias names an S3-compatible endpoint together with its credentials,
//! so object paths can be written as `alias/bucket/key`.

use clap::Subcommand;
use serde::Serialize;
use xfer_core::{Alias, AliasManager};

use crate::exit_code::ExitCode;
use crate::output::{Formatter, OutputConfig};

#[derive(Subcommand, Debug)]
pub enum AliasCommands {
    /// Add or update an alias
    Set(SetArgs),

    /// List configured aliases
    List(ListArgs),

    /// Remove an alias
    Remove(RemoveArgs),
}

#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Alias name (e.g. "local", "archive")
    pub name: String,

    /// Endpoint URL (e.g. `http://localhost:9000`)
    pub endpoint: String,

    pub access_key: String,

    pub secret_key: String,

    #[arg(long, default_value = "us-east-1")]
    pub region: String,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Show region and transfer settings
    #[arg(short, long)]
    pub long: bool,
}

#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
    pub name: String,
}

/// Alias as shown to the user; credentials are never printed
#[derive(Debug, Serialize)]
struct AliasInfo {
    name: String,
    endpoint: String,
    region: String,
    custom_transfer: bool,
}

impl From<&Alias> for AliasInfo {
    fn from(alias: &Alias) -> Self {
        Self {
            name: alias.name.clone(),
            endpoint: alias.endpoint.clone(),
            region: alias.region.clone(),
            custom_transfer: alias.transfer.is_some(),
        }
    }
}

#[derive(Debug, Serialize)]
struct AliasListOutput {
    aliases: Vec<AliasInfo>,
}

#[derive(Debug, Serialize)]
struct AliasOperationOutput {
    success: bool,
    alias: String,
    message: String,
}

pub async fn execute(cmd: AliasCommands, output_config: OutputConfig) -> ExitCode {
    let formatter = Formatter::new(output_config);

    let mut manager = match AliasManager::new() {
        Ok(m) => m,
        Err(e) => {
            formatter.error(&format!("Failed to load aliases: {e}"));
            return ExitCode::GeneralError;
        }
    };

    match cmd {
        AliasCommands::Set(args) => execute_set(args, &mut manager, &formatter),
        AliasCommands::List(args) => execute_list(args, &manager, &formatter),
        AliasCommands::Remove(args) => execute_remove(args, &mut manager, &formatter),
    }
}

fn execute_set(args: SetArgs, manager: &mut AliasManager, formatter: &Formatter) -> ExitCode {
    let mut alias = Alias::new(&args.name, &args.endpoint, &args.access_key, &args.secret_key);
    alias.region = args.region;

    // Keep per-alias transfer settings across a credential update
    if let Ok(existing) = manager.get(&args.name) {
        alias.transfer = existing.transfer;
    }

    match manager.set(alias) {
        Ok(()) => {
            if formatter.is_json() {
                formatter.json(&AliasOperationOutput {
                    success: true,
                    alias: args.name.clone(),
                    message: format!("Alias '{}' configured successfully", args.name),
                });
            } else {
                let styled_name = formatter.style_name(&args.name);
                formatter.success(&format!("Alias '{styled_name}' configured successfully."));
            }
            ExitCode::Success
        }
        Err(e) => {
            formatter.error(&e.to_string());
            ExitCode::from_error(&e)
        }
    }
}

fn execute_list(args: ListArgs, manager: &AliasManager, formatter: &Formatter) -> ExitCode {
    let aliases = manager.list();

    if formatter.is_json() {
        formatter.json(&AliasListOutput {
            aliases: aliases.iter().map(AliasInfo::from).collect(),
        });
    } else if aliases.is_empty() {
        formatter.println("No aliases configured.");
    } else {
        for alias in aliases {
            let styled_name = formatter.style_name(&format!("{:<12}", alias.name));
            let styled_url = formatter.style_url(&alias.endpoint);
            if args.long {
                let config = alias.transfer_config(&manager.config().defaults);
                let chunk = humansize::format_size(config.chunk_size as u64, humansize::BINARY);
                formatter.println(&format!(
                    "{styled_name} {styled_url} (region: {}, chunk: {}, server retries: {}, timeout retries: {})",
                    formatter.style_date(&alias.region),
                    formatter.style_size(&chunk),
                    config.retry.server.max_attempts,
                    config.retry.timeout.max_attempts,
                ));
            } else {
                formatter.println(&format!("{styled_name} {styled_url}"));
            }
        }
    }
    ExitCode::Success
}

fn execute_remove(args: RemoveArgs, manager: &mut AliasManager, formatter: &Formatter) -> ExitCode {
    match manager.remove(&args.name) {
        Ok(()) => {
            if formatter.is_json() {
                formatter.json(&AliasOperationOutput {
                    success: true,
                    alias: args.name.clone(),
                    message: format!("Alias '{}' removed successfully", args.name),
                });
            } else {
                let styled_name = formatter.style_name(&args.name);
                formatter.success(&format!("Alias '{styled_name}' removed successfully."));
            }
            ExitCode::Success
        }
        Err(xfer_core::Error::AliasNotFound(_)) => {
            formatter.error(&format!("Alias '{}' not found", args.name));
            ExitCode::NotFound
        }
        Err(e) => {
            formatter.error(&e.to_string());
            ExitCode::from_error(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xfer_core::TransferConfig;

    #[test]
    fn test_alias_info_hides_credentials() {
        let alias = Alias::new("local", "http://localhost:9000", "key", "secret");
        let info = AliasInfo::from(&alias);

        assert_eq!(info.name, "local");
        assert_eq!(info.endpoint, "http://localhost:9000");
        assert_eq!(info.region, "us-east-1");
        assert!(!info.custom_transfer);

        let json = serde_json::to_string(&info).unwrap();
        assert!(!json.contains("secret"));
    }

    #[test]
    fn test_alias_info_custom_transfer() {
        let mut alias = Alias::new("archive", "https://s3.example.com", "ak", "sk");
        alias.transfer = Some(TransferConfig::default());
        assert!(AliasInfo::from(&alias).custom_transfer);
    }
}
