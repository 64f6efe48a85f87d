//! High-level pipeline: fetch → select → convert → publish with retries.
//!
//! One call to [`synchronise`] is one run:
//!   - Resets the scratch layout (delete-if-exists, recreate)
//!   - Checks the known_hosts prerequisite before any network I/O
//!   - Pulls all remote files through the [`Fetcher`]
//!   - Selects the newest `vehicle_data_<YYYYMMDD>.csv` within the freshness window
//!   - Converts it to point features once
//!   - Runs the publish sequence on the [`Portal`] inside [`retry_with_backoff`]
//!
//! Steps before the publish loop fail the run immediately. Inside the loop only
//! retryable errors lead to another attempt, and exhaustion returns the last
//! attempt's error unchanged.

use chrono::NaiveDate;
use std::path::PathBuf;
use tracing::{error, info};

use crate::config::PublishConfig;
use crate::contract::{Fetcher, Portal, PublishOutcome};
use crate::download::ensure_known_hosts;
use crate::errors::Result;
use crate::preprocess::{self, PointLayer};
use crate::retry::{retry_with_backoff, Sleeper};
use crate::select::{self, StagedFile};
use crate::staging::StagingLayout;

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub source_file: PathBuf,
    pub source_date: NaiveDate,
    pub fetched_files: usize,
    pub feature_count: usize,
    pub skipped_rows: usize,
    pub attempts: u32,
    pub outcome: PublishOutcome,
}

/// `"<prefix>; updated on YYYY-MM-DD"`
pub fn description_for(prefix: &str, date: NaiveDate) -> String {
    format!("{prefix}; updated on {}", date.format("%Y-%m-%d"))
}

pub async fn synchronise<F, P, S>(
    config: &PublishConfig,
    fetcher: &F,
    portal: &P,
    sleeper: &S,
    today: NaiveDate,
) -> Result<RunReport>
where
    F: Fetcher + ?Sized,
    P: Portal + ?Sized,
    S: Sleeper + ?Sized,
{
    info!("[SYNC] Starting vehicle feature service update");

    let layout = StagingLayout::new(
        &config.staging.scratch_dir,
        &config.portal.feature_service_name,
    );
    layout.reset().inspect_err(|e| {
        error!(error = %e, scratch_dir = %config.staging.scratch_dir.display(), "[SYNC][ERROR] Failed to reset scratch layout");
    })?;

    ensure_known_hosts(&config.sftp)?;

    let manifest = fetcher.fetch_all(&layout.csv_dir).await.inspect_err(|e| {
        error!(host = %config.sftp.host, error = %e, "[SYNC][ERROR] Download failed");
    })?;
    info!(remote = %manifest.remote, files = manifest.files.len(), "[SYNC] Download succeeded");

    let staged = select::select_latest(&layout.csv_dir, config.selection.freshness(), today)?;

    let layer = preprocess::csv_to_points(&staged.path)?;

    let retried = retry_with_backoff(&config.retry, sleeper, |attempt| {
        publish_attempt(config, portal, &layout, &staged, &layer, attempt)
    })
    .await?;

    let report = RunReport {
        source_file: staged.path.clone(),
        source_date: staged.date,
        fetched_files: manifest.files.len(),
        feature_count: layer.feature_count(),
        skipped_rows: layer.skipped_rows,
        attempts: retried.attempts,
        outcome: retried.value,
    };
    info!(
        source = %report.source_file.display(),
        date = %report.source_date,
        features = report.feature_count,
        attempts = report.attempts,
        "[SYNC] Feature service updated"
    );
    Ok(report)
}

/// One full publish attempt. Every side effect is redone from scratch.
async fn publish_attempt<P>(
    config: &PublishConfig,
    portal: &P,
    layout: &StagingLayout,
    staged: &StagedFile,
    layer: &PointLayer,
    attempt: u32,
) -> Result<PublishOutcome>
where
    P: Portal + ?Sized,
{
    let portal_config = &config.portal;

    info!(attempt, username = %portal_config.username, "Connecting to portal");
    let session = portal
        .authenticate(&portal_config.username, portal_config.password.expose())
        .await?;
    let sd_item = portal.get_item(&session, &portal_config.sd_item_id).await?;

    info!(attempt, path = %layout.staged_features.display(), "Staging and updating...");
    preprocess::write_staged(layer, &layout.staged_features)?;
    portal
        .update_item_data(&session, &sd_item, &layout.staged_features)
        .await?;
    let outcome = portal
        .publish_overwrite(&session, &sd_item, &portal_config.feature_service_name)
        .await?;

    info!(attempt, file = %staged.file_name(), "Updating item description...");
    let features_item = portal
        .get_item(&session, &portal_config.features_item_id)
        .await?;
    let description = description_for(&portal_config.description_prefix, staged.date);
    portal
        .update_description(&session, &features_item, &description)
        .await?;

    Ok(outcome)
}
