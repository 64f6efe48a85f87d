//! fleet-publish: keeps a hosted vehicle-location feature service in step with
//! the csv drops a fleet vendor leaves on an SFTP server.
//!
//! The run is a straight pipeline (see [`synchronise`]): fetch every remote file,
//! pick the newest dated csv, turn it into points, publish with bounded retries.

pub mod cli;
pub mod config;
pub mod contract;
pub mod download;
pub mod errors;
pub mod load_config;
pub mod preprocess;
pub mod retry;
pub mod select;
pub mod staging;
pub mod synchronise;
pub mod upload;

pub use cli::{run, Cli, Commands};
pub use errors::{ErrorKind, FleetError, Result};
