use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tenant_lifecycle::workflows::lifecycle::gateways::{
    ConfigSyncError, DispatchError, HostingError, IdentityError,
};
use tenant_lifecycle::workflows::lifecycle::{
    Collaborators, DeploymentDispatcher, DeploymentUpdate, HostingConfigStore, HostingGateway,
    Identity, IdentityStore, RegistryError, SiteCreation, SiteId, SiteRemoval, TenantId,
    TenantRecord, TenantRegistry,
};
use tokio::sync::Mutex;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
pub(crate) struct InMemoryHosting {
    sites: Mutex<BTreeSet<String>>,
}

impl InMemoryHosting {
    pub(crate) async fn sites(&self) -> Vec<String> {
        self.sites.lock().await.iter().cloned().collect()
    }
}

#[async_trait]
impl HostingGateway for InMemoryHosting {
    async fn create_site(&self, site: &SiteId) -> Result<SiteCreation, HostingError> {
        if self.sites.lock().await.insert(site.to_string()) {
            Ok(SiteCreation::Created)
        } else {
            Ok(SiteCreation::AlreadyExists)
        }
    }

    async fn delete_site(&self, site: &SiteId) -> Result<SiteRemoval, HostingError> {
        if self.sites.lock().await.remove(site.as_str()) {
            Ok(SiteRemoval::Deleted)
        } else {
            Ok(SiteRemoval::NotFound)
        }
    }
}

/// Records dispatched subdomains instead of starting workflow runs.
pub(crate) struct RecordingDispatcher {
    configured: bool,
    runs: Mutex<Vec<String>>,
}

impl RecordingDispatcher {
    pub(crate) fn new(configured: bool) -> Self {
        Self {
            configured,
            runs: Mutex::new(Vec::new()),
        }
    }

    pub(crate) async fn runs(&self) -> Vec<String> {
        self.runs.lock().await.clone()
    }
}

#[async_trait]
impl DeploymentDispatcher for RecordingDispatcher {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn dispatch(&self, subdomain: &str) -> Result<(), DispatchError> {
        if !self.configured {
            return Err(DispatchError::NotConfigured);
        }
        self.runs.lock().await.push(subdomain.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryIdentities {
    by_tenant: Mutex<HashMap<TenantId, Vec<Identity>>>,
}

impl InMemoryIdentities {
    pub(crate) async fn seed(&self, tenant: &TenantId, identities: Vec<Identity>) {
        self.by_tenant
            .lock()
            .await
            .insert(tenant.clone(), identities);
    }

    pub(crate) async fn remaining(&self, tenant: &TenantId) -> usize {
        self.by_tenant
            .lock()
            .await
            .get(tenant)
            .map(Vec::len)
            .unwrap_or_default()
    }
}

#[async_trait]
impl IdentityStore for InMemoryIdentities {
    async fn list_identities(&self, tenant: &TenantId) -> Result<Vec<Identity>, IdentityError> {
        Ok(self
            .by_tenant
            .lock()
            .await
            .get(tenant)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_identity(&self, uid: &str) -> Result<(), IdentityError> {
        let mut guard = self.by_tenant.lock().await;
        for identities in guard.values_mut() {
            identities.retain(|identity| identity.uid != uid);
        }
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct InMemoryHostingConfig {
    targets: Mutex<BTreeSet<String>>,
}

impl InMemoryHostingConfig {
    pub(crate) async fn seed(&self, target: &str) {
        self.targets.lock().await.insert(target.to_string());
    }

    pub(crate) async fn targets(&self) -> Vec<String> {
        self.targets.lock().await.iter().cloned().collect()
    }
}

#[async_trait]
impl HostingConfigStore for InMemoryHostingConfig {
    fn is_configured(&self) -> bool {
        true
    }

    async fn remove_targets(&self, targets: &[String]) -> Result<usize, ConfigSyncError> {
        let mut guard = self.targets.lock().await;
        let removed = targets.iter().filter(|target| guard.remove(*target)).count();
        Ok(usize::from(removed > 0))
    }
}

#[derive(Default)]
pub(crate) struct InMemoryRegistry {
    records: Mutex<HashMap<TenantId, TenantRecord>>,
}

impl InMemoryRegistry {
    pub(crate) async fn insert(&self, record: TenantRecord) {
        self.records.lock().await.insert(record.id.clone(), record);
    }

    pub(crate) async fn remove(&self, id: &TenantId) -> Option<TenantRecord> {
        self.records.lock().await.remove(id)
    }
}

#[async_trait]
impl TenantRegistry for InMemoryRegistry {
    async fn get(&self, id: &TenantId) -> Result<Option<TenantRecord>, RegistryError> {
        Ok(self.records.lock().await.get(id).cloned())
    }

    async fn update_deployment(
        &self,
        id: &TenantId,
        update: &DeploymentUpdate,
    ) -> Result<(), RegistryError> {
        let mut guard = self.records.lock().await;
        let record = guard.get_mut(id).ok_or(RegistryError::NotFound)?;
        record.apply(update);
        Ok(())
    }
}

/// In-memory collaborators plus typed handles for inspecting them afterwards.
pub(crate) struct DemoCollaborators {
    pub(crate) hosting: Arc<InMemoryHosting>,
    pub(crate) dispatcher: Arc<RecordingDispatcher>,
    pub(crate) identities: Arc<InMemoryIdentities>,
    pub(crate) hosting_config: Arc<InMemoryHostingConfig>,
    pub(crate) registry: Arc<InMemoryRegistry>,
}

impl DemoCollaborators {
    pub(crate) fn new(dispatch_configured: bool) -> Self {
        Self {
            hosting: Arc::new(InMemoryHosting::default()),
            dispatcher: Arc::new(RecordingDispatcher::new(dispatch_configured)),
            identities: Arc::new(InMemoryIdentities::default()),
            hosting_config: Arc::new(InMemoryHostingConfig::default()),
            registry: Arc::new(InMemoryRegistry::default()),
        }
    }

    pub(crate) fn collaborators(&self) -> Collaborators {
        Collaborators {
            hosting: self.hosting.clone(),
            dispatcher: self.dispatcher.clone(),
            identities: self.identities.clone(),
            hosting_config: self.hosting_config.clone(),
            registry: self.registry.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hosting_create_is_idempotent() {
        let hosting = InMemoryHosting::default();
        let site = SiteId::new("village7-abc123");

        assert_eq!(
            hosting.create_site(&site).await.expect("create"),
            SiteCreation::Created
        );
        assert_eq!(
            hosting.create_site(&site).await.expect("create again"),
            SiteCreation::AlreadyExists
        );
        assert_eq!(
            hosting.delete_site(&site).await.expect("delete"),
            SiteRemoval::Deleted
        );
        assert_eq!(
            hosting.delete_site(&site).await.expect("delete again"),
            SiteRemoval::NotFound
        );
    }

    #[tokio::test]
    async fn unconfigured_dispatcher_refuses_runs() {
        let dispatcher = RecordingDispatcher::new(false);
        assert!(!dispatcher.is_configured());
        assert!(matches!(
            dispatcher.dispatch("village7").await,
            Err(DispatchError::NotConfigured)
        ));
        assert!(dispatcher.runs().await.is_empty());
    }

    #[tokio::test]
    async fn registry_updates_require_existing_record() {
        let registry = InMemoryRegistry::default();
        let update = DeploymentUpdate::Failed {
            error: "boom".to_string(),
            failed_at: chrono::Utc::now(),
        };
        assert!(matches!(
            registry
                .update_deployment(&TenantId::new("ghost"), &update)
                .await,
            Err(RegistryError::NotFound)
        ));
    }
}
