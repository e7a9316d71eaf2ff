use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::credentials::{CredentialError, TokenSource};
use super::http::error_message;
use crate::workflows::lifecycle::site_id::SiteId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteCreation {
    Created,
    /// The site id is already taken, most likely by an earlier run for this tenant.
    AlreadyExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteRemoval {
    Deleted,
    NotFound,
}

#[derive(Debug, thiserror::Error)]
pub enum HostingError {
    #[error("hosting credentials unavailable: {0}")]
    Credentials(#[from] CredentialError),
    #[error("hosting network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("hosting API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("hosting call timed out after {0:?}")]
    Timeout(Duration),
    #[error("site id {0:?} is not a valid hosting site name")]
    InvalidSite(String),
}

/// Static-hosting control plane.
#[async_trait]
pub trait HostingGateway: Send + Sync {
    async fn create_site(&self, site: &SiteId) -> Result<SiteCreation, HostingError>;
    async fn delete_site(&self, site: &SiteId) -> Result<SiteRemoval, HostingError>;
}

/// Firebase Hosting REST client (`v1beta1` sites resource).
pub struct FirebaseHostingClient {
    http: Client,
    tokens: Arc<dyn TokenSource>,
    api_base: String,
    project_id: String,
}

impl FirebaseHostingClient {
    pub fn new(
        http: Client,
        tokens: Arc<dyn TokenSource>,
        api_base: impl Into<String>,
        project_id: impl Into<String>,
    ) -> Self {
        Self {
            http,
            tokens,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            project_id: project_id.into(),
        }
    }

    fn sites_url(&self) -> String {
        format!("{}/projects/{}/sites", self.api_base, self.project_id)
    }

    fn site_url(&self, site: &SiteId) -> Result<String, HostingError> {
        if !site.is_path_safe() {
            return Err(HostingError::InvalidSite(site.to_string()));
        }
        Ok(format!("{}/{}", self.sites_url(), site.as_str()))
    }
}

impl std::fmt::Debug for FirebaseHostingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseHostingClient")
            .field("api_base", &self.api_base)
            .field("project_id", &self.project_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl HostingGateway for FirebaseHostingClient {
    async fn create_site(&self, site: &SiteId) -> Result<SiteCreation, HostingError> {
        let token = self.tokens.access_token().await?;
        debug!(site_id = %site, "creating hosting site");

        let response = self
            .http
            .post(self.sites_url())
            .query(&[("siteId", site.as_str())])
            .bearer_auth(token.expose())
            .json(&serde_json::json!({}))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(SiteCreation::Created),
            StatusCode::CONFLICT => Ok(SiteCreation::AlreadyExists),
            status => Err(HostingError::Api {
                status: status.as_u16(),
                message: error_message(response).await,
            }),
        }
    }

    async fn delete_site(&self, site: &SiteId) -> Result<SiteRemoval, HostingError> {
        let url = self.site_url(site)?;
        let token = self.tokens.access_token().await?;
        debug!(site_id = %site, "deleting hosting site");

        let response = self
            .http
            .delete(url)
            .bearer_auth(token.expose())
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(SiteRemoval::Deleted),
            StatusCode::NOT_FOUND => Ok(SiteRemoval::NotFound),
            status => Err(HostingError::Api {
                status: status.as_u16(),
                message: error_message(response).await,
            }),
        }
    }
}
