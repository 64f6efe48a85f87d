//! Error type shared by every pipeline stage.
//!
//! Each variant maps onto an [`ErrorKind`]. The publish retry loop consults
//! [`FleetError::is_retryable`] to decide whether another attempt is worth
//! making; everything else fails the run on the spot.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FleetError>;

/// Coarse classification of failures, used for retry decisions and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No candidate input file was found.
    MissingInput,
    /// A filename, date stamp or CSV value could not be interpreted.
    MalformedInput,
    /// The newest input is outside the freshness window.
    StaleData,
    /// Something the run depends on (known-hosts, config value, trusted host key) is absent.
    MissingPrerequisite,
    /// Network, SSH, HTTP or portal failures. Retried inside the publish loop.
    TransientRemote,
    /// Local I/O and everything else.
    Local,
}

#[derive(Error, Debug)]
pub enum FleetError {
    #[error("no \"vehicle_data_*.csv\" files found in {}", .dir.display())]
    NoCandidateFiles { dir: PathBuf },

    #[error("can't parse date from {file}: {reason}")]
    MalformedFileDate { file: String, reason: String },

    #[error("latest csv \"{file}\" not within {window_days} days of today ({today})")]
    StaleFile {
        file: String,
        window_days: u32,
        today: chrono::NaiveDate,
    },

    #[error("known_hosts file {} not found. Please create with ssh-keyscan.", .path.display())]
    MissingKnownHosts { path: PathBuf },

    #[error("host key for {host} rejected: {reason}")]
    HostKeyRejected { host: String, reason: String },

    #[error("missing column {column} in {file}")]
    MissingColumn { file: String, column: String },

    #[error("invalid coordinate in {file} row {row}: {value}")]
    InvalidCoordinate {
        file: String,
        row: usize,
        value: String,
    },

    #[error("can't list {}: {source}", .dir.display())]
    ReadDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("connection to {host} failed: {source}")]
    Connect {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ssh error {0}")]
    Ssh(#[from] ssh2::Error),

    #[error("http error {0}")]
    Http(#[from] reqwest::Error),

    #[error("portal error during {operation} (code {code}): {message}")]
    Portal {
        operation: String,
        code: i64,
        message: String,
    },

    #[error("unexpected portal response during {operation}: {message}")]
    PortalResponse { operation: String, message: String },

    #[error("csv error {0}")]
    Csv(#[from] csv::Error),

    #[error("serde error {0}")]
    Serde(#[from] serde_json::Error),

    #[error("IO error {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl FleetError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FleetError::NoCandidateFiles { .. } => ErrorKind::MissingInput,
            FleetError::MalformedFileDate { .. }
            | FleetError::MissingColumn { .. }
            | FleetError::InvalidCoordinate { .. }
            | FleetError::Csv(_) => ErrorKind::MalformedInput,
            FleetError::StaleFile { .. } => ErrorKind::StaleData,
            FleetError::MissingKnownHosts { .. }
            | FleetError::HostKeyRejected { .. }
            | FleetError::Config(_) => ErrorKind::MissingPrerequisite,
            FleetError::Connect { .. }
            | FleetError::Ssh(_)
            | FleetError::Http(_)
            | FleetError::Portal { .. }
            | FleetError::PortalResponse { .. } => ErrorKind::TransientRemote,
            FleetError::ReadDir { .. }
            | FleetError::Serde(_)
            | FleetError::Io(_)
            | FleetError::Join(_) => ErrorKind::Local,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::TransientRemote
    }
}
