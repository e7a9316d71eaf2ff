use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use super::creation::DEFAULT_CALL_TIMEOUT;
use super::domain::{Identity, TenantId, TenantRecord};
use super::gateways::http::bounded;
use super::gateways::{
    ConfigSyncError, HostingConfigStore, HostingError, HostingGateway, IdentityError,
    IdentityStore, SiteRemoval,
};
use super::site_id::{SiteId, SiteIdResolver};

pub const DEFAULT_DELETE_CONCURRENCY: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum HostingCleanup {
    /// No site identifier could be derived from the prior record.
    Skipped,
    Deleted,
    AlreadyGone,
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityFailure {
    pub uid: String,
    pub error: String,
}

/// Aggregate result of one deletion run. Every step is best effort, so this is the only
/// place partial failures surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub tenant_id: TenantId,
    pub site_id: Option<SiteId>,
    pub hosting: HostingCleanup,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub failures: Vec<IdentityFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enumeration_error: Option<String>,
    pub config_pruned: bool,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
            && self.enumeration_error.is_none()
            && !matches!(self.hosting, HostingCleanup::Failed { .. })
    }
}

/// Tears down what a deleted tenant left behind: its hosting site, its identities and its
/// hosting configuration targets. Never fails; problems are logged and reported.
pub struct DeletionOrchestrator {
    resolver: SiteIdResolver,
    hosting: Arc<dyn HostingGateway>,
    identities: Arc<dyn IdentityStore>,
    hosting_config: Arc<dyn HostingConfigStore>,
    call_timeout: Duration,
    concurrency: usize,
}

impl DeletionOrchestrator {
    pub fn new(
        resolver: SiteIdResolver,
        hosting: Arc<dyn HostingGateway>,
        identities: Arc<dyn IdentityStore>,
        hosting_config: Arc<dyn HostingConfigStore>,
    ) -> Self {
        Self {
            resolver,
            hosting,
            identities,
            hosting_config,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            concurrency: DEFAULT_DELETE_CONCURRENCY,
        }
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Upper bound on identity deletions in flight; values below one are raised to one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    #[instrument(name = "tenant_deleted", skip(self, record), fields(tenant_id = %record.id))]
    pub async fn on_deleted(&self, record: &TenantRecord) -> CleanupReport {
        let site = self.resolver.resolve(record);
        let hosting = match &site {
            Some(site) => self.remove_site(site).await,
            None => HostingCleanup::Skipped,
        };

        let mut report = CleanupReport {
            tenant_id: record.id.clone(),
            site_id: site.clone(),
            hosting,
            attempted: 0,
            succeeded: 0,
            failed: 0,
            failures: Vec::new(),
            enumeration_error: None,
            config_pruned: false,
        };

        match self.list_identities(&record.id).await {
            Ok(identities) => self.remove_identities(identities, &mut report).await,
            Err(error) => {
                error!(error = %error, "could not enumerate tenant identities");
                report.enumeration_error = Some(error.to_string());
            }
        }

        report.config_pruned = self.prune_config(&record.id, site.as_ref()).await;

        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            config_pruned = report.config_pruned,
            "tenant cleanup finished"
        );
        report
    }

    async fn remove_site(&self, site: &SiteId) -> HostingCleanup {
        let removed = bounded(
            self.call_timeout,
            self.hosting.delete_site(site),
            HostingError::Timeout,
        )
        .await;

        match removed {
            Ok(SiteRemoval::Deleted) => {
                info!(site_id = %site, "hosting site deleted");
                HostingCleanup::Deleted
            }
            Ok(SiteRemoval::NotFound) => {
                info!(site_id = %site, "hosting site already gone");
                HostingCleanup::AlreadyGone
            }
            Err(error) => {
                warn!(site_id = %site, error = %error, "hosting site deletion failed");
                HostingCleanup::Failed {
                    error: error.to_string(),
                }
            }
        }
    }

    async fn list_identities(&self, tenant: &TenantId) -> Result<Vec<Identity>, IdentityError> {
        bounded(
            self.call_timeout,
            self.identities.list_identities(tenant),
            IdentityError::Timeout,
        )
        .await
    }

    async fn remove_identities(&self, identities: Vec<Identity>, report: &mut CleanupReport) {
        let store = self.identities.as_ref();
        let limit = self.call_timeout;
        report.attempted = identities.len();

        let results: Vec<(Identity, Result<(), IdentityError>)> = stream::iter(identities)
            .map(|identity| async move {
                let result = bounded(
                    limit,
                    store.delete_identity(&identity.uid),
                    IdentityError::Timeout,
                )
                .await;
                (identity, result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (identity, result) in results {
            match result {
                Ok(()) => report.succeeded += 1,
                Err(error) => {
                    error!(
                        uid = %identity.uid,
                        email = identity.email.as_deref().unwrap_or(""),
                        error = %error,
                        "identity deletion failed"
                    );
                    report.failures.push(IdentityFailure {
                        uid: identity.uid,
                        error: error.to_string(),
                    });
                }
            }
        }

        report.failures.sort_by(|a, b| a.uid.cmp(&b.uid));
        report.failed = report.failures.len();
    }

    async fn prune_config(&self, tenant: &TenantId, site: Option<&SiteId>) -> bool {
        if !self.hosting_config.is_configured() {
            warn!("hosting configuration sync is not configured; skipping target cleanup");
            return false;
        }

        let mut targets = vec![tenant.as_str().to_string()];
        if let Some(site) = site {
            if site.as_str() != tenant.as_str() {
                targets.push(site.as_str().to_string());
            }
        }

        let pruned = bounded(
            self.call_timeout,
            self.hosting_config.remove_targets(&targets),
            ConfigSyncError::Timeout,
        )
        .await;

        match pruned {
            Ok(0) => {
                info!("no hosting configuration targets to remove");
                false
            }
            Ok(files) => {
                info!(files, "hosting configuration targets removed");
                true
            }
            Err(error) => {
                warn!(error = %error, "hosting configuration cleanup failed");
                false
            }
        }
    }
}
