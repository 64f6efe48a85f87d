use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::select::Freshness;

/// A credential injected from the environment. Never printed by `Debug`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Everything one publish run needs. Built once in `load_config` and passed by reference.
#[derive(Debug, Clone)]
pub struct PublishConfig {
    pub sftp: SftpConfig,
    pub portal: PortalConfig,
    pub staging: StagingConfig,
    pub selection: SelectionConfig,
    pub retry: RetryPolicy,
}

impl PublishConfig {
    pub fn trace_loaded(&self) {
        info!(
            sftp_host = %self.sftp.host,
            remote_dir = %self.sftp.remote_dir,
            portal_url = %self.portal.url,
            feature_service_name = %self.portal.feature_service_name,
            scratch_dir = %self.staging.scratch_dir.display(),
            freshness_days = self.selection.freshness_days,
            max_retries = self.retry.max_retries,
            "Loaded PublishConfig"
        );
        debug!(?self, "PublishConfig loaded (full debug)");
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SftpConfig {
    pub host: String,
    #[serde(default = "default_sftp_port")]
    pub port: u16,
    pub username: String,
    /// OpenSSH known_hosts file holding the server's host key.
    pub known_hosts: PathBuf,
    #[serde(default = "default_remote_dir")]
    pub remote_dir: String,
    #[serde(skip)]
    pub password: Secret,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default = "default_portal_url")]
    pub url: String,
    pub username: String,
    /// Name of the existing hosted feature service. Must match exactly or publishing fails.
    pub feature_service_name: String,
    /// Source item originally used to publish the feature service.
    pub sd_item_id: String,
    /// The hosted feature layer item whose description gets the "updated on" stamp.
    pub features_item_id: String,
    #[serde(default = "default_description_prefix")]
    pub description_prefix: String,
    #[serde(skip)]
    pub password: Secret,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagingConfig {
    pub scratch_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Accept files dated within this many days of today. Zero or negative disables the check.
    #[serde(default = "default_freshness_days")]
    pub freshness_days: i64,
}

impl SelectionConfig {
    pub fn freshness(&self) -> Freshness {
        Freshness::from_days(self.freshness_days)
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            freshness_days: default_freshness_days(),
        }
    }
}

/// Retry settings for the publish loop.
///
/// After a failed attempt `n` the loop gives up when `n > max_retries`, otherwise it
/// sleeps `n² * backoff_unit` and tries again. With the default of 3 that is one
/// initial attempt plus three retries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_unit_secs")]
    pub backoff_unit_secs: u64,
}

impl RetryPolicy {
    /// Total number of invocations the loop makes before giving up.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay after attempt `attempt` (1-based) has failed.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let squared = u64::from(attempt).saturating_mul(u64::from(attempt));
        Duration::from_secs(squared.saturating_mul(self.backoff_unit_secs))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_unit_secs: default_backoff_unit_secs(),
        }
    }
}

fn default_sftp_port() -> u16 {
    22
}

fn default_remote_dir() -> String {
    "upload".to_string()
}

fn default_portal_url() -> String {
    "https://www.arcgis.com".to_string()
}

fn default_description_prefix() -> String {
    "Vehicle location data obtained from Fleet".to_string()
}

fn default_freshness_days() -> i64 {
    7
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_unit_secs() -> u64 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_is_attempt_squared() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_for(1), Duration::from_secs(1));
        assert_eq!(policy.backoff_for(2), Duration::from_secs(4));
        assert_eq!(policy.backoff_for(3), Duration::from_secs(9));
        assert_eq!(policy.max_attempts(), 4);
    }

    #[test]
    fn max_attempts_saturates_at_u32_max() {
        let policy: RetryPolicy = serde_yaml::from_str("max_retries: 4294967295").unwrap();
        assert_eq!(policy.max_retries, u32::MAX);
        assert_eq!(policy.max_attempts(), u32::MAX);
    }

    #[test]
    fn secret_debug_is_redacted() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{secret:?}"), "Secret(***)");
        assert_eq!(secret.expose(), "hunter2");
    }
}
