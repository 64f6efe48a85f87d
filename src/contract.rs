#![allow(unused)]

//! # contract: seams between the pipeline and the outside world
//!
//! The pipeline in [`crate::synchronise`] only talks to two traits:
//! - [`Fetcher`] pulls every remote file into a local directory (SFTP in production).
//! - [`Portal`] authenticates against the GIS portal and drives the
//!   update → publish → describe sequence for a hosted feature service.
//!
//! Both are `mockall`-annotated so tests can script remote behaviour, including
//! failures on specific attempts.

use async_trait::async_trait;
use mockall::{automock, predicate::*};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::errors::Result;

/// Files copied into the staging directory by a [`Fetcher`].
#[derive(Debug, Clone, Default)]
pub struct FetchedManifest {
    pub remote: String,
    pub files: Vec<PathBuf>,
}

/// Token returned by portal authentication. Valid for a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalSession {
    pub token: String,
}

/// The subset of item metadata the publish sequence needs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PortalItem {
    pub id: String,
    pub owner: String,
    #[serde(default)]
    pub title: String,
    #[serde(rename = "type", default)]
    pub item_type: String,
}

/// What the portal reports back after an overwrite publish.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    pub service_item_id: Option<String>,
    pub service_url: Option<String>,
}

/// Pulls all files from the configured remote directory.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Copy every regular file from the remote directory into `local_dir`.
    async fn fetch_all(&self, local_dir: &Path) -> Result<FetchedManifest>;
}

/// Operations against the hosting portal.
///
/// Implementations must not cache sessions across calls to [`Portal::authenticate`];
/// every publish attempt signs in afresh.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Portal: Send + Sync {
    async fn authenticate(&self, username: &str, password: &str) -> Result<PortalSession>;

    async fn get_item(&self, session: &PortalSession, item_id: &str) -> Result<PortalItem>;

    /// Replace the data file behind `item` with the file at `data`.
    async fn update_item_data(
        &self,
        session: &PortalSession,
        item: &PortalItem,
        data: &Path,
    ) -> Result<()>;

    /// Publish `item` over the existing service named `service_name`.
    async fn publish_overwrite(
        &self,
        session: &PortalSession,
        item: &PortalItem,
        service_name: &str,
    ) -> Result<PublishOutcome>;

    async fn update_description(
        &self,
        session: &PortalSession,
        item: &PortalItem,
        description: &str,
    ) -> Result<()>;
}
