use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, instrument};

use super::creation::DEFAULT_CALL_TIMEOUT;
use super::domain::{DeploymentStatus, TenantId, TenantRecord};
use super::gateways::http::bounded;
use super::registry::{RegistryError, TenantRegistry};

/// Who is asking. Authentication itself happens at the transport edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerContext {
    Authenticated { subject: String },
    Anonymous,
}

impl CallerContext {
    pub fn authenticated(subject: impl Into<String>) -> Self {
        Self::Authenticated {
            subject: subject.into(),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StatusQueryError {
    #[error("caller is not authenticated")]
    Unauthenticated,
    #[error("tenant {0} not found")]
    NotFound(TenantId),
    #[error("registry lookup failed: {0}")]
    Registry(#[from] RegistryError),
}

/// Polling payload for a tenant's provisioning state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub tenant_id: TenantId,
    pub deployment_status: DeploymentStatus,
    pub deployment_triggered_at: Option<DateTime<Utc>>,
    pub deployment_error: Option<String>,
}

impl From<TenantRecord> for StatusView {
    fn from(record: TenantRecord) -> Self {
        Self {
            tenant_id: record.id,
            deployment_status: record.deployment_status,
            deployment_triggered_at: record.deployment_triggered_at,
            deployment_error: record.deployment_error,
        }
    }
}

pub struct StatusQueryService {
    registry: Arc<dyn TenantRegistry>,
    call_timeout: Duration,
}

impl StatusQueryService {
    pub fn new(registry: Arc<dyn TenantRegistry>) -> Self {
        Self {
            registry,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    #[instrument(skip(self, caller), fields(tenant_id = %tenant_id))]
    pub async fn deployment_status(
        &self,
        caller: &CallerContext,
        tenant_id: &TenantId,
    ) -> Result<StatusView, StatusQueryError> {
        if !caller.is_authenticated() {
            return Err(StatusQueryError::Unauthenticated);
        }

        let record = bounded(
            self.call_timeout,
            self.registry.get(tenant_id),
            RegistryError::Timeout,
        )
        .await?
        .ok_or_else(|| StatusQueryError::NotFound(tenant_id.clone()))?;

        debug!(status = record.deployment_status.label(), "status read");
        Ok(record.into())
    }
}
