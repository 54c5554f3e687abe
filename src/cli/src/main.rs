//! Sharing CLI - inspect record access decisions against an access snapshot.
//!
//! Provides commands for single-record checks, list filters and group
//! resolution.

mod commands;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use commands::{check, filter, groups};
use output::OutputFormat;
use sharing_core::config::Config;
use sharing_core::sharing::RecordAccessService;
use sharing_core::store::InMemoryAccessStore;
use sharing_core::telemetry::{init_logging, LogFormat, LoggingConfig};

/// Sharing - record-level access control inspector
#[derive(Parser)]
#[command(
    name = "sharing",
    version,
    about = "Sharing - record-level access control inspector",
    long_about = "Evaluate access decisions, list filters and group membership against an access snapshot file.",
    propagate_version = true
)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    output: OutputFormat,

    /// Access snapshot (YAML or JSON)
    #[arg(short, long, global = true, env = "SHARING_SNAPSHOT")]
    snapshot: Option<PathBuf>,

    /// Engine configuration file; SHARING__* variables override it
    #[arg(short, long, global = true, env = "SHARING_CONFIG")]
    config: Option<String>,

    /// Log level for engine diagnostics on stderr (e.g. debug)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decide whether a user may access one record
    Check(check::CheckArgs),

    /// Compile the list filter for a user and collection
    Filter(filter::FilterArgs),

    /// Show a user's effective groups
    Groups(groups::GroupsArgs),

    /// Show a group's effective users
    Members(groups::MembersArgs),
}

fn build_service(cli: &Cli) -> Result<RecordAccessService> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };

    let snapshot = cli
        .snapshot
        .as_ref()
        .context("no snapshot given; pass --snapshot or set SHARING_SNAPSHOT")?;
    let store = InMemoryAccessStore::load(snapshot)
        .with_context(|| format!("failed to load snapshot {}", snapshot.display()))?;

    Ok(RecordAccessService::with_store(Arc::new(store)).configured(&config.sharing))
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if cli.no_color {
        colored::control::set_override(false);
    }

    if let Some(level) = &cli.log_level {
        let logging = LoggingConfig {
            level: level.clone(),
            format: LogFormat::Compact,
            stderr: true,
            ..LoggingConfig::default()
        };
        init_logging(&logging, "cli")?;
    }

    let format = cli.output;
    let result = match build_service(&cli) {
        Ok(service) => match cli.command {
            Commands::Check(args) => check::execute(args, &service, format).await,
            Commands::Filter(args) => filter::execute(args, &service, format).await,
            Commands::Groups(args) => groups::execute_groups(args, &service, format).await,
            Commands::Members(args) => groups::execute_members(args, &service, format).await,
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_command_metadata_comes_from_manifest() {
        let command = Cli::command();
        command.clone().debug_assert();

        assert_eq!(command.get_version(), Some(env!("CARGO_PKG_VERSION")));
        assert_eq!(command.get_author(), None);
    }

    #[test]
    fn test_snapshot_is_optional_until_a_command_runs() {
        let cli = Cli::try_parse_from(["sharing", "groups", "erin"]).unwrap();
        assert!(matches!(cli.command, Commands::Groups(_)));
    }
}
