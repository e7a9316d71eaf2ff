use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

use super::domain::{DeploymentStatus, DeploymentUpdate, TenantId, TenantRecord};
use super::gateways::credentials::{CredentialError, TokenSource};
use super::gateways::firestore::{documents_root, string_value, timestamp_value, Document};
use super::gateways::http::error_message;

pub const FIELD_SUBDOMAIN: &str = "subdomain";
pub const FIELD_DOMAIN: &str = "domain";
pub const FIELD_STATUS: &str = "deploymentStatus";
pub const FIELD_TRIGGERED_AT: &str = "deploymentTriggeredAt";
pub const FIELD_FAILED_AT: &str = "deploymentFailedAt";
pub const FIELD_ERROR: &str = "deploymentError";

/// System of record for tenant provisioning state.
#[async_trait]
pub trait TenantRegistry: Send + Sync {
    async fn get(&self, id: &TenantId) -> Result<Option<TenantRecord>, RegistryError>;
    async fn update_deployment(
        &self,
        id: &TenantId,
        update: &DeploymentUpdate,
    ) -> Result<(), RegistryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("tenant record not found")]
    NotFound,
    #[error("registry credentials unavailable: {0}")]
    Credentials(#[from] CredentialError),
    #[error("registry network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("registry API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("registry call timed out after {0:?}")]
    Timeout(Duration),
    #[error("registry unavailable: {0}")]
    Unavailable(String),
    #[error("tenant id {0:?} is not a valid document key")]
    InvalidId(TenantId),
}

/// Field mask and values for a deployment update. Fields named in the mask but absent from
/// the values are removed from the stored document.
pub fn update_fields(update: &DeploymentUpdate) -> (Vec<&'static str>, BTreeMap<String, Value>) {
    let mut fields = BTreeMap::new();
    fields.insert(
        FIELD_STATUS.to_string(),
        string_value(update.status().label()),
    );

    match update {
        DeploymentUpdate::Deploying {
            triggered_at,
            domain,
        } => {
            fields.insert(FIELD_TRIGGERED_AT.to_string(), timestamp_value(*triggered_at));
            let mut mask = vec![FIELD_STATUS, FIELD_TRIGGERED_AT, FIELD_ERROR];
            if let Some(domain) = domain {
                fields.insert(FIELD_DOMAIN.to_string(), string_value(domain));
                mask.push(FIELD_DOMAIN);
            }
            (mask, fields)
        }
        DeploymentUpdate::Failed { error, failed_at } => {
            fields.insert(FIELD_ERROR.to_string(), string_value(error));
            fields.insert(FIELD_FAILED_AT.to_string(), timestamp_value(*failed_at));
            (vec![FIELD_STATUS, FIELD_ERROR, FIELD_FAILED_AT], fields)
        }
    }
}

pub fn record_from_document(id: &TenantId, document: &Document) -> TenantRecord {
    TenantRecord {
        id: id.clone(),
        subdomain: document.string(FIELD_SUBDOMAIN).unwrap_or_default(),
        domain: document.string(FIELD_DOMAIN).unwrap_or_default(),
        deployment_status: document
            .string(FIELD_STATUS)
            .map(|label| DeploymentStatus::from_label(&label))
            .unwrap_or_default(),
        deployment_triggered_at: document.timestamp(FIELD_TRIGGERED_AT),
        deployment_failed_at: document.timestamp(FIELD_FAILED_AT),
        deployment_error: document.string(FIELD_ERROR),
    }
}

/// Firestore REST backed registry.
pub struct FirestoreTenantRegistry {
    http: Client,
    tokens: Arc<dyn TokenSource>,
    collection_url: String,
}

impl FirestoreTenantRegistry {
    pub fn new(
        http: Client,
        tokens: Arc<dyn TokenSource>,
        firestore_api_base: &str,
        project_id: &str,
        collection: &str,
    ) -> Self {
        Self {
            http,
            tokens,
            collection_url: format!(
                "{}/{}",
                documents_root(firestore_api_base, project_id),
                collection.trim_matches('/')
            ),
        }
    }

    fn document_url(&self, id: &TenantId) -> Result<String, RegistryError> {
        if !id.is_path_safe() {
            return Err(RegistryError::InvalidId(id.clone()));
        }
        Ok(format!("{}/{}", self.collection_url, id))
    }
}

impl std::fmt::Debug for FirestoreTenantRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirestoreTenantRegistry")
            .field("collection_url", &self.collection_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TenantRegistry for FirestoreTenantRegistry {
    async fn get(&self, id: &TenantId) -> Result<Option<TenantRecord>, RegistryError> {
        let url = self.document_url(id)?;
        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .get(url)
            .bearer_auth(token.expose())
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                let document: Document = response.json().await?;
                Ok(Some(record_from_document(id, &document)))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(RegistryError::Api {
                status: status.as_u16(),
                message: error_message(response).await,
            }),
        }
    }

    async fn update_deployment(
        &self,
        id: &TenantId,
        update: &DeploymentUpdate,
    ) -> Result<(), RegistryError> {
        let url = self.document_url(id)?;
        let token = self.tokens.access_token().await?;
        let (mask, fields) = update_fields(update);

        let mut query: Vec<(&str, &str)> = mask
            .iter()
            .map(|field| ("updateMask.fieldPaths", *field))
            .collect();
        query.push(("currentDocument.exists", "true"));

        debug!(tenant_id = %id, status = update.status().label(), "writing deployment update");
        let response = self
            .http
            .patch(url)
            .bearer_auth(token.expose())
            .query(&query)
            .json(&Document {
                name: String::new(),
                fields,
            })
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(RegistryError::NotFound),
            status => Err(RegistryError::Api {
                status: status.as_u16(),
                message: error_message(response).await,
            }),
        }
    }
}
