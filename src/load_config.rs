/// `load_config` module: Loads a static YAML config and injects secrets from the environment.
///
/// The YAML file carries everything that is safe to commit (hosts, usernames, item ids,
/// paths, retry and freshness settings). Passwords come only from the environment:
///
/// - `SFTP_PASSWORD`: password for the SFTP account
/// - `PORTAL_PASSWORD`: password for the portal publishing account
///
/// A `.env` file is honoured through `dotenvy` in `main`.
///
/// # Errors
/// All errors here use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{error, info};

use crate::config::{
    PortalConfig, PublishConfig, RetryPolicy, Secret, SelectionConfig, SftpConfig, StagingConfig,
};

pub const SFTP_PASSWORD_VAR: &str = "SFTP_PASSWORD";
pub const PORTAL_PASSWORD_VAR: &str = "PORTAL_PASSWORD";

#[derive(Debug, Deserialize)]
struct RawConfig {
    sftp: SftpConfig,
    portal: PortalConfig,
    staging: StagingConfig,
    #[serde(default)]
    selection: SelectionConfig,
    #[serde(default)]
    retry: RetryPolicy,
}

fn required_env(name: &str) -> Result<Secret> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => {
            info!(var = name, "Secret found in env");
            Ok(Secret::new(value))
        }
        Ok(_) => {
            error!(var = name, "Environment variable is empty");
            Err(anyhow::anyhow!("{name} environment variable is empty"))
        }
        Err(e) => {
            error!(error = ?e, var = name, "Environment variable not set");
            Err(anyhow::anyhow!("{name} environment variable not set: {e}"))
        }
    }
}

/// Loads a static YAML config file (no secrets) and injects required env vars for secrets.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PublishConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = fs::read_to_string(path_ref)
        .inspect_err(|e| error!(error = ?e, config_path = ?path_ref, "Failed to read config file"))
        .with_context(|| format!("Failed to read config file {path_ref:?}"))?;

    let raw: RawConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    if raw.portal.feature_service_name.trim().is_empty() {
        anyhow::bail!("portal.feature_service_name must not be empty");
    }

    let mut sftp = raw.sftp;
    sftp.password = required_env(SFTP_PASSWORD_VAR)?;
    let mut portal = raw.portal;
    portal.password = required_env(PORTAL_PASSWORD_VAR)?;

    let config = PublishConfig {
        sftp,
        portal,
        staging: raw.staging,
        selection: raw.selection,
        retry: raw.retry,
    };
    config.trace_loaded();
    Ok(config)
}
