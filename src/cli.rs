use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::download::SftpFetcher;
use crate::load_config::load_config;
use crate::retry::TokioSleeper;
use crate::select::{select_latest, Freshness};
use crate::synchronise::synchronise;
use crate::upload::ArcGisClient;

/// CLI for fleet-publish: refresh the fleet vehicle feature service from the latest SFTP drop.
#[derive(Parser)]
#[clap(
    name = "fleet-publish",
    version,
    about = "Pull fleet vehicle csvs over SFTP and overwrite a hosted feature service with the latest one"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download, select the latest csv, and publish it over the hosted feature service
    Publish {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
    },
    /// Print the latest vehicle_data_<YYYYMMDD>.csv in a local directory without publishing
    Latest {
        /// Directory holding the downloaded csvs
        #[clap(long)]
        dir: PathBuf,
        /// Freshness window in days; zero or negative disables the check
        #[clap(long, default_value_t = 0, allow_negative_numbers = true)]
        freshness_days: i64,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let today = Local::now().date_naive();

    match cli.command {
        Commands::Publish { config } => {
            let config = load_config(config)?;
            tracing::info!(command = "publish", "Starting feature service update");
            let fetcher = SftpFetcher::new(config.sftp.clone());
            let portal = ArcGisClient::new(&config.portal.url)?;
            match synchronise(&config, &fetcher, &portal, &TokioSleeper, today).await {
                Ok(report) => {
                    tracing::info!(command = "publish", ?report, "Feature service update complete");
                    println!(
                        "Published {} ({} features) after {} attempt(s)",
                        report.source_file.display(),
                        report.feature_count,
                        report.attempts
                    );
                    Ok(())
                }
                Err(e) => {
                    tracing::error!(command = "publish", error = %e, kind = ?e.kind(), "Feature service update failed");
                    Err(anyhow::Error::new(e))
                }
            }
        }
        Commands::Latest {
            dir,
            freshness_days,
        } => {
            let staged = select_latest(&dir, Freshness::from_days(freshness_days), today)?;
            println!("{}\t{}", staged.path.display(), staged.date.format("%Y-%m-%d"));
            Ok(())
        }
    }
}
