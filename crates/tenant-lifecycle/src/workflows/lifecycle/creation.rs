use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use super::domain::{DeploymentUpdate, TenantId, TenantRecord};
use super::gateways::http::bounded;
use super::gateways::{DeploymentDispatcher, DispatchError, HostingError, HostingGateway, SiteCreation};
use super::registry::{RegistryError, TenantRegistry};
use super::site_id::{SiteId, SiteIdResolver};

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum CreationError {
    #[error("tenant {tenant_id} has neither a subdomain nor a hosting domain")]
    MissingSubdomain { tenant_id: TenantId },
    #[error("deployment dispatch is not configured (missing token or repository)")]
    DispatchNotConfigured,
    #[error("deployment dispatch failed: {0}")]
    Dispatch(#[source] DispatchError),
    #[error("registry update failed: {0}")]
    Registry(#[from] RegistryError),
}

impl From<DispatchError> for CreationError {
    fn from(value: DispatchError) -> Self {
        match value {
            DispatchError::NotConfigured => Self::DispatchNotConfigured,
            other => Self::Dispatch(other),
        }
    }
}

/// What the hosting step did. Only informational: creation failures never stop dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum HostingProvision {
    Created,
    AlreadyExists,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreationOutcome {
    pub tenant_id: TenantId,
    pub site_id: SiteId,
    pub hosting: HostingProvision,
    pub domain: String,
    pub triggered_at: DateTime<Utc>,
}

/// Reacts to a newly registered tenant: ensures the hosting site, dispatches the deployment
/// workflow and records the outcome on the tenant record.
pub struct CreationOrchestrator {
    resolver: SiteIdResolver,
    hosting: Arc<dyn HostingGateway>,
    dispatcher: Arc<dyn DeploymentDispatcher>,
    registry: Arc<dyn TenantRegistry>,
    call_timeout: Duration,
}

impl CreationOrchestrator {
    pub fn new(
        resolver: SiteIdResolver,
        hosting: Arc<dyn HostingGateway>,
        dispatcher: Arc<dyn DeploymentDispatcher>,
        registry: Arc<dyn TenantRegistry>,
    ) -> Self {
        Self {
            resolver,
            hosting,
            dispatcher,
            registry,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    #[instrument(name = "tenant_created", skip(self, record), fields(tenant_id = %record.id))]
    pub async fn on_created(&self, record: &TenantRecord) -> Result<CreationOutcome, CreationError> {
        let Some(site) = self.resolver.resolve(record) else {
            error!("tenant has no subdomain or hosting domain; nothing was provisioned");
            return Err(CreationError::MissingSubdomain {
                tenant_id: record.id.clone(),
            });
        };

        let hosting = self.ensure_site(&site).await;

        match self.dispatch(&site).await {
            Ok(()) => {
                let triggered_at = Utc::now();
                let written_domain = record
                    .domain
                    .trim()
                    .is_empty()
                    .then(|| self.resolver.domain_for(&site));
                let update = DeploymentUpdate::Deploying {
                    triggered_at,
                    domain: written_domain.clone(),
                };
                self.record(&record.id, &update).await?;

                info!(site_id = %site, status = "deploying", "deployment triggered");
                Ok(CreationOutcome {
                    tenant_id: record.id.clone(),
                    site_id: site,
                    hosting,
                    domain: written_domain.unwrap_or_else(|| record.domain.clone()),
                    triggered_at,
                })
            }
            Err(failure) => {
                error!(site_id = %site, error = %failure, "deployment dispatch failed");
                let update = DeploymentUpdate::Failed {
                    error: failure.to_string(),
                    failed_at: Utc::now(),
                };
                if let Err(registry_error) = self.record(&record.id, &update).await {
                    error!(
                        error = %registry_error,
                        "could not record deployment failure on tenant record"
                    );
                }
                Err(failure)
            }
        }
    }

    async fn ensure_site(&self, site: &SiteId) -> HostingProvision {
        let created = bounded(
            self.call_timeout,
            self.hosting.create_site(site),
            HostingError::Timeout,
        )
        .await;

        match created {
            Ok(SiteCreation::Created) => {
                info!(site_id = %site, "hosting site created");
                HostingProvision::Created
            }
            Ok(SiteCreation::AlreadyExists) => {
                info!(site_id = %site, "hosting site already exists");
                HostingProvision::AlreadyExists
            }
            Err(error) => {
                warn!(
                    site_id = %site,
                    error = %error,
                    "hosting site creation failed; continuing with deployment"
                );
                HostingProvision::Failed {
                    error: error.to_string(),
                }
            }
        }
    }

    async fn dispatch(&self, site: &SiteId) -> Result<(), CreationError> {
        if !self.dispatcher.is_configured() {
            return Err(CreationError::DispatchNotConfigured);
        }
        bounded(
            self.call_timeout,
            self.dispatcher.dispatch(site.as_str()),
            DispatchError::Timeout,
        )
        .await?;
        Ok(())
    }

    async fn record(&self, id: &TenantId, update: &DeploymentUpdate) -> Result<(), RegistryError> {
        bounded(
            self.call_timeout,
            self.registry.update_deployment(id, update),
            RegistryError::Timeout,
        )
        .await
    }
}
