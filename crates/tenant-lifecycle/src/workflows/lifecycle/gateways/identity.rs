use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use tracing::debug;

use super::credentials::{CredentialError, TokenSource};
use super::firestore::{documents_root, ListDocumentsResponse};
use super::http::error_message;
use crate::config::{GoogleCloudConfig, RegistryConfig};
use crate::workflows::lifecycle::domain::{Identity, TenantId};

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("identity credentials unavailable: {0}")]
    Credentials(#[from] CredentialError),
    #[error("identity network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("identity API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("identity call timed out after {0:?}")]
    Timeout(Duration),
    #[error("tenant id {0:?} cannot address an identity collection")]
    InvalidTenant(String),
}

/// Tenant-scoped authentication identities.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn list_identities(&self, tenant: &TenantId) -> Result<Vec<Identity>, IdentityError>;
    async fn delete_identity(&self, uid: &str) -> Result<(), IdentityError>;
}

const PAGE_SIZE: &str = "300";

/// Enumerates identity records from the tenant's Firestore namespace and removes the
/// matching Firebase Auth accounts through the Identity Toolkit API.
pub struct FirebaseIdentityStore {
    http: Client,
    tokens: Arc<dyn TokenSource>,
    documents_root: String,
    identity_api_base: String,
    project_id: String,
    tenant_data_collection: String,
    identity_subcollection: String,
}

impl FirebaseIdentityStore {
    pub fn new(
        http: Client,
        tokens: Arc<dyn TokenSource>,
        google: &GoogleCloudConfig,
        registry: &RegistryConfig,
        project_id: impl Into<String>,
    ) -> Self {
        let project_id = project_id.into();
        Self {
            http,
            tokens,
            documents_root: documents_root(&google.firestore_api_base, &project_id),
            identity_api_base: google.identity_api_base.trim_end_matches('/').to_string(),
            project_id,
            tenant_data_collection: registry.tenant_data_collection.clone(),
            identity_subcollection: registry.identity_subcollection.clone(),
        }
    }

    fn identities_url(&self, tenant: &TenantId) -> Result<String, IdentityError> {
        if !tenant.is_path_safe() {
            return Err(IdentityError::InvalidTenant(tenant.to_string()));
        }
        Ok(format!(
            "{}/{}/{}/{}",
            self.documents_root, self.tenant_data_collection, tenant, self.identity_subcollection
        ))
    }
}

impl std::fmt::Debug for FirebaseIdentityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseIdentityStore")
            .field("documents_root", &self.documents_root)
            .field("identity_api_base", &self.identity_api_base)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl IdentityStore for FirebaseIdentityStore {
    async fn list_identities(&self, tenant: &TenantId) -> Result<Vec<Identity>, IdentityError> {
        let url = self.identities_url(tenant)?;
        let token = self.tokens.access_token().await?;
        let mut identities = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(&url)
                .bearer_auth(token.expose())
                .query(&[("pageSize", PAGE_SIZE)]);
            if let Some(page) = page_token.as_deref() {
                request = request.query(&[("pageToken", page)]);
            }

            let response = request.send().await?;
            let page: ListDocumentsResponse = match response.status() {
                status if status.is_success() => response.json().await?,
                // An empty collection has no parent document to speak of.
                StatusCode::NOT_FOUND => ListDocumentsResponse::default(),
                status => {
                    return Err(IdentityError::Api {
                        status: status.as_u16(),
                        message: error_message(response).await,
                    })
                }
            };

            identities.extend(page.documents.iter().map(|document| Identity {
                uid: document.id().to_string(),
                email: document.string("email"),
            }));

            match page.next_page_token.filter(|next| !next.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!(tenant_id = %tenant, count = identities.len(), "listed tenant identities");
        Ok(identities)
    }

    async fn delete_identity(&self, uid: &str) -> Result<(), IdentityError> {
        let token = self.tokens.access_token().await?;
        let url = format!(
            "{}/projects/{}/accounts:delete",
            self.identity_api_base, self.project_id
        );

        let response = self
            .http
            .post(url)
            .bearer_auth(token.expose())
            .json(&json!({ "localId": uid }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = error_message(response).await;
        if message.contains("USER_NOT_FOUND") {
            debug!(uid, "identity already absent");
            return Ok(());
        }
        Err(IdentityError::Api {
            status: status.as_u16(),
            message,
        })
    }
}
