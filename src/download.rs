//! SFTP fetcher: mirrors the remote upload directory into the local staging area.
//!
//! The transfer uses `ssh2`, which is blocking, so the whole session runs on a
//! `spawn_blocking` thread. Host keys are checked against an OpenSSH known_hosts
//! file before the password is sent.

use ssh2::{CheckResult, KnownHostFileKind, Session};
use std::fs::File;
use std::io;
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};
use tracing::{debug, error, info};

use crate::config::SftpConfig;
use crate::contract::{FetchedManifest, Fetcher};
use crate::errors::{FleetError, Result};

/// Fail unless the known_hosts file is configured and present. No network I/O.
pub fn ensure_known_hosts(config: &SftpConfig) -> Result<()> {
    let path = &config.known_hosts;
    if path.as_os_str().is_empty() || !path.is_file() {
        error!(path = %path.display(), "known_hosts file missing");
        return Err(FleetError::MissingKnownHosts { path: path.clone() });
    }
    Ok(())
}

pub struct SftpFetcher {
    config: SftpConfig,
}

impl SftpFetcher {
    pub fn new(config: SftpConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl Fetcher for SftpFetcher {
    async fn fetch_all(&self, local_dir: &Path) -> Result<FetchedManifest> {
        ensure_known_hosts(&self.config)?;
        let config = self.config.clone();
        let local_dir = local_dir.to_path_buf();
        tokio::task::spawn_blocking(move || fetch_blocking(&config, &local_dir)).await?
    }
}

fn fetch_blocking(config: &SftpConfig, local_dir: &Path) -> Result<FetchedManifest> {
    let remote = format!("{}/{}", config.host, config.remote_dir);
    info!(remote = %remote, "Downloading all files from {remote}...");

    let address = format!("{}:{}", config.host, config.port);
    let tcp = TcpStream::connect(&address).map_err(|source| {
        error!(host = %config.host, port = config.port, error = %source, "Failed to connect");
        FleetError::Connect {
            host: config.host.clone(),
            source,
        }
    })?;

    let mut session = Session::new()?;
    session.set_tcp_stream(tcp);
    session.handshake()?;
    verify_host_key(&session, config)?;
    session.userauth_password(&config.username, config.password.expose())?;
    if !session.authenticated() {
        return Err(FleetError::Config(format!(
            "sftp authentication as {} failed",
            config.username
        )));
    }
    debug!(host = %config.host, username = %config.username, "SFTP session authenticated");

    let sftp = session.sftp()?;
    let mut files = Vec::new();
    for (remote_path, stat) in sftp.readdir(Path::new(&config.remote_dir))? {
        if !stat.is_file() {
            debug!(path = %remote_path.display(), "Skipping non-file entry");
            continue;
        }
        let Some(name) = remote_path.file_name() else {
            continue;
        };
        let local_path: PathBuf = local_dir.join(name);
        let mut remote_file = sftp.open(&remote_path)?;
        let mut local_file = File::create(&local_path)?;
        let bytes = io::copy(&mut remote_file, &mut local_file)?;
        if let Some(mtime) = stat.mtime {
            local_file.set_modified(UNIX_EPOCH + Duration::from_secs(mtime))?;
        }
        debug!(remote = %remote_path.display(), local = %local_path.display(), bytes, "Downloaded file");
        files.push(local_path);
    }

    info!(remote = %remote, count = files.len(), "Download complete");
    Ok(FetchedManifest { remote, files })
}

fn verify_host_key(session: &Session, config: &SftpConfig) -> Result<()> {
    let rejected = |reason: &str| FleetError::HostKeyRejected {
        host: config.host.clone(),
        reason: reason.to_string(),
    };

    let mut known_hosts = session.known_hosts()?;
    known_hosts.read_file(&config.known_hosts, KnownHostFileKind::OpenSSH)?;
    let (key, _key_type) = session
        .host_key()
        .ok_or_else(|| rejected("server sent no host key"))?;

    let check = if config.port == 22 {
        known_hosts.check(&config.host, key)
    } else {
        known_hosts.check_port(&config.host, config.port, key)
    };

    match check {
        CheckResult::Match => Ok(()),
        CheckResult::Mismatch => {
            error!(host = %config.host, "Host key does not match known_hosts entry");
            Err(rejected("host key mismatch"))
        }
        CheckResult::NotFound => {
            error!(host = %config.host, known_hosts = %config.known_hosts.display(), "Host not in known_hosts");
            Err(rejected("host not present in known_hosts"))
        }
        CheckResult::Failure => Err(rejected("known_hosts check failed")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Secret;

    fn sftp_config(known_hosts: PathBuf) -> SftpConfig {
        SftpConfig {
            host: "sftp.example.gov".into(),
            port: 22,
            username: "fleet".into(),
            known_hosts,
            remote_dir: "upload".into(),
            password: Secret::new("pw"),
        }
    }

    #[test]
    fn missing_known_hosts_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let config = sftp_config(dir.path().join("known_hosts"));
        let err = ensure_known_hosts(&config).unwrap_err();
        assert!(matches!(err, FleetError::MissingKnownHosts { .. }));
    }

    #[test]
    fn empty_known_hosts_path_fails_fast() {
        let config = sftp_config(PathBuf::new());
        assert!(ensure_known_hosts(&config).is_err());
    }

    #[test]
    fn present_known_hosts_passes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known_hosts");
        std::fs::write(&path, "sftp.example.gov ssh-ed25519 AAAA\n").unwrap();
        ensure_known_hosts(&sftp_config(path)).unwrap();
    }
}
