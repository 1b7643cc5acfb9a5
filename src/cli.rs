///
/// This module implements the CLI surface of log-archiver: command parsing and
/// the wiring of configuration, collaborators and the job itself.
///
/// ## How To Use
/// - From a scheduler: `log-archiver run [--config options.yaml] [--past-due]`.
/// - To check a deployment: `log-archiver validate`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// All pipeline logic lives in the library modules; this is glue only.
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::config::{validate_environment, ArchiveConfig, ConfigSource};
use crate::job::{run_job, Trigger};
use crate::load_config::{load_options, resolve_settings};
use crate::share::MountedShare;
use crate::upload::AzureBlobClient;

/// CLI for log-archiver: archive keyword-matching log lines to blob storage.
#[derive(Parser)]
#[clap(
    name = "log-archiver",
    version,
    about = "Filter log files on a network share and archive the relevant lines to blob storage"
)]
pub struct Cli {
    /// Emit logs as JSON lines
    #[clap(long, global = true)]
    pub json_logs: bool,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process every log file currently on the share
    Run {
        /// Path to the optional YAML options file
        #[clap(long)]
        config: Option<PathBuf>,

        /// Set by the scheduler when this run is late
        #[clap(long)]
        past_due: bool,
    },
    /// Check that every required setting is present
    Validate,
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run { config, past_due } => {
            let options = load_options(config.as_deref())?;
            let settings = resolve_settings(env_lookup).await?;

            let share = MountedShare::new(&options.share.mount_root);
            let sink = AzureBlobClient::from_connection_string(&settings.storage_connection_string)
                .map_err(|e| {
                    tracing::error!(error = %e, "Failed to construct blob client");
                    e
                })?;
            let archive = ArchiveConfig::new(&settings, &options);

            tracing::info!(command = "run", "Starting log archive run");
            let report = run_job(&archive, &share, &sink, Trigger { past_due }).await?;
            println!(
                "Processing complete. {} files processed.",
                report.processed_count()
            );
            Ok(())
        }
        Commands::Validate => {
            let source = validate_environment(env_lookup)?;
            match source {
                ConfigSource::Environment => {
                    println!("Configuration OK (environment mode)")
                }
                ConfigSource::KeyVault { vault_url } => {
                    println!("Configuration OK (key vault mode: {vault_url})")
                }
            }
            Ok(())
        }
    }
}
