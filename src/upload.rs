#![doc = "Portal client: implements the `Portal` contract against the ArcGIS sharing REST API."]
//
//! # Portal client
//!
//! [`ArcGisClient`] speaks the `sharing/rest` endpoints of ArcGIS Online (or an
//! Enterprise portal at a different base url):
//!
//! - `generateToken` for a short-lived token per attempt
//! - `content/items/{id}` to look up an item and its owner
//! - `content/users/{owner}/items/{id}/update` to replace item data or set the description
//! - `content/users/{owner}/publish` with `overwrite=true` to refresh the hosted service
//!
//! The portal answers most failures with HTTP 200 and an `{"error": {...}}` body;
//! [`parse_portal_response`] turns those into [`FleetError::Portal`].

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, error, info};

use crate::contract::{Portal, PortalItem, PortalSession, PublishOutcome};
use crate::errors::{FleetError, Result};

/// Token lifetime requested from `generateToken`, in minutes.
const TOKEN_EXPIRATION_MINUTES: u32 = 60;

pub struct ArcGisClient {
    http: reqwest::Client,
    base_url: String,
}

impl ArcGisClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("fleet-publish/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/sharing/rest/{}", self.base_url, path)
    }

    async fn post_form<T: DeserializeOwned>(
        &self,
        operation: &str,
        url: &str,
        form: &[(&str, &str)],
    ) -> Result<T> {
        debug!(operation, url, "POST portal form");
        let body = self
            .http
            .post(url)
            .form(form)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_portal_response(&body, operation)
    }
}

#[derive(Debug, Deserialize)]
struct PortalErrorBody {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: PortalErrorBody,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
    #[serde(default)]
    expires: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SuccessResponse {
    #[serde(default)]
    success: bool,
}

#[derive(Debug, Deserialize)]
struct PublishResponse {
    #[serde(default)]
    services: Vec<PublishedService>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishedService {
    #[serde(default, rename = "serviceurl")]
    service_url: Option<String>,
    #[serde(default)]
    service_item_id: Option<String>,
    #[serde(default)]
    error: Option<PortalErrorBody>,
}

fn portal_error(operation: &str, body: PortalErrorBody) -> FleetError {
    let mut message = body.message;
    if !body.details.is_empty() {
        message = format!("{message} ({})", body.details.join("; "));
    }
    FleetError::Portal {
        operation: operation.to_string(),
        code: body.code,
        message,
    }
}

/// Decode a portal JSON body, mapping an `error` envelope to [`FleetError::Portal`].
pub fn parse_portal_response<T: DeserializeOwned>(body: &str, operation: &str) -> Result<T> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| FleetError::PortalResponse {
            operation: operation.to_string(),
            message: format!("invalid json: {e}"),
        })?;
    if value.get("error").is_some() {
        let envelope: ErrorEnvelope =
            serde_json::from_value(value).map_err(|e| FleetError::PortalResponse {
                operation: operation.to_string(),
                message: format!("malformed error body: {e}"),
            })?;
        error!(operation, code = envelope.error.code, message = %envelope.error.message, "Portal returned an error");
        return Err(portal_error(operation, envelope.error));
    }
    serde_json::from_value(value).map_err(|e| FleetError::PortalResponse {
        operation: operation.to_string(),
        message: e.to_string(),
    })
}

fn require_success(response: SuccessResponse, operation: &str) -> Result<()> {
    if response.success {
        Ok(())
    } else {
        Err(FleetError::PortalResponse {
            operation: operation.to_string(),
            message: "portal did not report success".to_string(),
        })
    }
}

fn publish_outcome(response: PublishResponse) -> Result<PublishOutcome> {
    let Some(service) = response.services.into_iter().next() else {
        return Err(FleetError::PortalResponse {
            operation: "publish".to_string(),
            message: "no services in publish response".to_string(),
        });
    };
    if let Some(err) = service.error {
        return Err(portal_error("publish", err));
    }
    Ok(PublishOutcome {
        service_item_id: service.service_item_id,
        service_url: service.service_url,
    })
}

#[async_trait]
impl Portal for ArcGisClient {
    async fn authenticate(&self, username: &str, password: &str) -> Result<PortalSession> {
        info!(username, portal = %self.base_url, "Connecting to portal as {username}...");
        let expiration = TOKEN_EXPIRATION_MINUTES.to_string();
        let url = self.rest_url("generateToken");
        let response: TokenResponse = self
            .post_form(
                "generateToken",
                &url,
                &[
                    ("username", username),
                    ("password", password),
                    ("client", "referer"),
                    ("referer", self.base_url.as_str()),
                    ("expiration", expiration.as_str()),
                    ("f", "json"),
                ],
            )
            .await?;
        debug!(expires = ?response.expires, "Portal token issued");
        Ok(PortalSession {
            token: response.token,
        })
    }

    async fn get_item(&self, session: &PortalSession, item_id: &str) -> Result<PortalItem> {
        let url = self.rest_url(&format!("content/items/{item_id}"));
        debug!(item_id, "Fetching portal item");
        let body = self
            .http
            .get(&url)
            .query(&[("f", "json"), ("token", session.token.as_str())])
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let item: PortalItem = parse_portal_response(&body, "get item")?;
        info!(item_id = %item.id, owner = %item.owner, title = %item.title, "Fetched portal item");
        Ok(item)
    }

    async fn update_item_data(
        &self,
        session: &PortalSession,
        item: &PortalItem,
        data: &Path,
    ) -> Result<()> {
        let file_name = data
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "features.geojson".to_string());
        let bytes = tokio::task::spawn_blocking({
            let data = data.to_path_buf();
            move || std::fs::read(data)
        })
        .await??;
        info!(item_id = %item.id, file = %file_name, bytes = bytes.len(), "Updating item data");

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/geo+json")?;
        let form = Form::new()
            .part("file", part)
            .text("f", "json")
            .text("token", session.token.clone());

        let url = self.rest_url(&format!(
            "content/users/{}/items/{}/update",
            item.owner, item.id
        ));
        let body = self
            .http
            .post(&url)
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let response: SuccessResponse = parse_portal_response(&body, "update item data")?;
        require_success(response, "update item data")
    }

    async fn publish_overwrite(
        &self,
        session: &PortalSession,
        item: &PortalItem,
        service_name: &str,
    ) -> Result<PublishOutcome> {
        info!(item_id = %item.id, service_name, "Publishing with overwrite");
        let publish_parameters = serde_json::json!({ "name": service_name }).to_string();
        let url = self.rest_url(&format!("content/users/{}/publish", item.owner));
        let response: PublishResponse = self
            .post_form(
                "publish",
                &url,
                &[
                    ("itemId", item.id.as_str()),
                    ("filetype", "geojson"),
                    ("overwrite", "true"),
                    ("publishParameters", publish_parameters.as_str()),
                    ("f", "json"),
                    ("token", session.token.as_str()),
                ],
            )
            .await?;
        let outcome = publish_outcome(response)?;
        info!(
            service_item_id = ?outcome.service_item_id,
            service_url = ?outcome.service_url,
            "Publish complete"
        );
        Ok(outcome)
    }

    async fn update_description(
        &self,
        session: &PortalSession,
        item: &PortalItem,
        description: &str,
    ) -> Result<()> {
        info!(item_id = %item.id, description, "Updating item description...");
        let url = self.rest_url(&format!(
            "content/users/{}/items/{}/update",
            item.owner, item.id
        ));
        let response: SuccessResponse = self
            .post_form(
                "update description",
                &url,
                &[
                    ("description", description),
                    ("f", "json"),
                    ("token", session.token.as_str()),
                ],
            )
            .await?;
        require_success(response, "update description")
    }
}
