use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use serde_json::Value;

use crate::config::SecretToken;
use crate::workflows::lifecycle::gateways::{
    ConfigSyncError, DispatchError, HostingError, IdentityError,
};
use crate::workflows::lifecycle::{
    CreationOrchestrator, DeletionOrchestrator, DeploymentDispatcher, DeploymentUpdate,
    HostingConfigStore, HostingGateway, Identity, IdentityStore, LifecycleApi,
    LifecycleDispatcher, RegistryError, SiteCreation, SiteId, SiteIdResolver, SiteRemoval,
    StatusQueryService, TenantId, TenantRecord, TenantRegistry,
};

pub(super) const API_TOKEN: &str = "status-token-1";

pub(super) fn village7() -> TenantRecord {
    TenantRecord::new("village7", "village7-abc123", "")
}

pub(super) fn identity(uid: &str) -> Identity {
    Identity {
        uid: uid.to_string(),
        email: Some(format!("{uid}@village.example")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Behavior {
    Succeed,
    /// Create answers "already exists", delete answers "not found".
    Conflict,
    Fail,
    Stall,
}

async fn stall() {
    tokio::time::sleep(Duration::from_secs(3600)).await;
}

pub(super) struct FakeHosting {
    behavior: Behavior,
    pub(super) created: Mutex<Vec<String>>,
    pub(super) deleted: Mutex<Vec<String>>,
}

impl FakeHosting {
    pub(super) fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            created: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
        })
    }

    pub(super) fn created(&self) -> Vec<String> {
        self.created.lock().expect("hosting mutex poisoned").clone()
    }

    pub(super) fn deleted(&self) -> Vec<String> {
        self.deleted.lock().expect("hosting mutex poisoned").clone()
    }
}

#[async_trait]
impl HostingGateway for FakeHosting {
    async fn create_site(&self, site: &SiteId) -> Result<SiteCreation, HostingError> {
        self.created
            .lock()
            .expect("hosting mutex poisoned")
            .push(site.to_string());
        match self.behavior {
            Behavior::Succeed => Ok(SiteCreation::Created),
            Behavior::Conflict => Ok(SiteCreation::AlreadyExists),
            Behavior::Fail => Err(HostingError::Api {
                status: 403,
                message: "permission denied".to_string(),
            }),
            Behavior::Stall => {
                stall().await;
                Ok(SiteCreation::Created)
            }
        }
    }

    async fn delete_site(&self, site: &SiteId) -> Result<SiteRemoval, HostingError> {
        self.deleted
            .lock()
            .expect("hosting mutex poisoned")
            .push(site.to_string());
        match self.behavior {
            Behavior::Succeed => Ok(SiteRemoval::Deleted),
            Behavior::Conflict => Ok(SiteRemoval::NotFound),
            Behavior::Fail => Err(HostingError::Api {
                status: 500,
                message: "backend error".to_string(),
            }),
            Behavior::Stall => {
                stall().await;
                Ok(SiteRemoval::Deleted)
            }
        }
    }
}

pub(super) struct FakeDispatcher {
    configured: bool,
    behavior: Behavior,
    pub(super) dispatched: Mutex<Vec<String>>,
}

impl FakeDispatcher {
    pub(super) fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            configured: true,
            behavior,
            dispatched: Mutex::new(Vec::new()),
        })
    }

    pub(super) fn unconfigured() -> Arc<Self> {
        Arc::new(Self {
            configured: false,
            behavior: Behavior::Succeed,
            dispatched: Mutex::new(Vec::new()),
        })
    }

    pub(super) fn dispatched(&self) -> Vec<String> {
        self.dispatched.lock().expect("dispatch mutex poisoned").clone()
    }
}

#[async_trait]
impl DeploymentDispatcher for FakeDispatcher {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn dispatch(&self, subdomain: &str) -> Result<(), DispatchError> {
        self.dispatched
            .lock()
            .expect("dispatch mutex poisoned")
            .push(subdomain.to_string());
        match self.behavior {
            Behavior::Succeed | Behavior::Conflict => Ok(()),
            Behavior::Fail => Err(DispatchError::Api {
                status: 422,
                message: "workflow does not have workflow_dispatch trigger".to_string(),
            }),
            Behavior::Stall => {
                stall().await;
                Ok(())
            }
        }
    }
}

#[derive(Default)]
pub(super) struct FakeIdentities {
    by_tenant: HashMap<TenantId, Vec<Identity>>,
    failing: BTreeSet<String>,
    list_fails: bool,
    delete_delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    pub(super) deleted: Mutex<Vec<String>>,
}

impl FakeIdentities {
    pub(super) fn with(tenant: &str, identities: Vec<Identity>) -> Self {
        let mut by_tenant = HashMap::new();
        by_tenant.insert(TenantId::new(tenant), identities);
        Self {
            by_tenant,
            ..Self::default()
        }
    }

    pub(super) fn failing_on(mut self, uid: &str) -> Self {
        self.failing.insert(uid.to_string());
        self
    }

    pub(super) fn listing_fails(mut self) -> Self {
        self.list_fails = true;
        self
    }

    /// Every delete takes `delay` of (virtual) time.
    pub(super) fn slow_deletes(mut self, delay: Duration) -> Self {
        self.delete_delay = Some(delay);
        self
    }

    /// Most deletes observed running at the same time.
    pub(super) fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub(super) fn deleted(&self) -> Vec<String> {
        let mut deleted = self.deleted.lock().expect("identity mutex poisoned").clone();
        deleted.sort();
        deleted
    }
}

#[async_trait]
impl IdentityStore for FakeIdentities {
    async fn list_identities(&self, tenant: &TenantId) -> Result<Vec<Identity>, IdentityError> {
        if self.list_fails {
            return Err(IdentityError::Api {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(self.by_tenant.get(tenant).cloned().unwrap_or_default())
    }

    async fn delete_identity(&self, uid: &str) -> Result<(), IdentityError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        match self.delete_delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(uid) {
            return Err(IdentityError::Api {
                status: 400,
                message: "INVALID_ID_TOKEN".to_string(),
            });
        }
        self.deleted
            .lock()
            .expect("identity mutex poisoned")
            .push(uid.to_string());
        Ok(())
    }
}

pub(super) struct FakeHostingConfig {
    configured: bool,
    fails: bool,
    pub(super) removed: Mutex<Vec<Vec<String>>>,
}

impl FakeHostingConfig {
    pub(super) fn new() -> Arc<Self> {
        Arc::new(Self {
            configured: true,
            fails: false,
            removed: Mutex::new(Vec::new()),
        })
    }

    pub(super) fn unconfigured() -> Arc<Self> {
        Arc::new(Self {
            configured: false,
            fails: false,
            removed: Mutex::new(Vec::new()),
        })
    }

    pub(super) fn failing() -> Arc<Self> {
        Arc::new(Self {
            configured: true,
            fails: true,
            removed: Mutex::new(Vec::new()),
        })
    }

    pub(super) fn removed(&self) -> Vec<Vec<String>> {
        self.removed.lock().expect("config mutex poisoned").clone()
    }
}

#[async_trait]
impl HostingConfigStore for FakeHostingConfig {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn remove_targets(&self, targets: &[String]) -> Result<usize, ConfigSyncError> {
        self.removed
            .lock()
            .expect("config mutex poisoned")
            .push(targets.to_vec());
        if self.fails {
            return Err(ConfigSyncError::Api {
                path: ".firebaserc".to_string(),
                status: 409,
                message: "sha mismatch".to_string(),
            });
        }
        Ok(2)
    }
}

#[derive(Default)]
pub(super) struct MemoryRegistry {
    pub(super) records: Mutex<HashMap<TenantId, TenantRecord>>,
    pub(super) updates: Mutex<Vec<(TenantId, DeploymentUpdate)>>,
    unavailable: bool,
}

impl MemoryRegistry {
    pub(super) fn seeded(records: impl IntoIterator<Item = TenantRecord>) -> Arc<Self> {
        let registry = Self::default();
        {
            let mut guard = registry.records.lock().expect("registry mutex poisoned");
            for record in records {
                guard.insert(record.id.clone(), record);
            }
        }
        Arc::new(registry)
    }

    pub(super) fn empty() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(super) fn unavailable() -> Arc<Self> {
        Arc::new(Self {
            unavailable: true,
            ..Self::default()
        })
    }

    pub(super) fn record(&self, id: &str) -> Option<TenantRecord> {
        self.records
            .lock()
            .expect("registry mutex poisoned")
            .get(&TenantId::new(id))
            .cloned()
    }

    pub(super) fn updates(&self) -> Vec<(TenantId, DeploymentUpdate)> {
        self.updates.lock().expect("registry mutex poisoned").clone()
    }
}

#[async_trait]
impl TenantRegistry for MemoryRegistry {
    async fn get(&self, id: &TenantId) -> Result<Option<TenantRecord>, RegistryError> {
        if self.unavailable {
            return Err(RegistryError::Unavailable("firestore offline".to_string()));
        }
        Ok(self.record(id.as_str()))
    }

    async fn update_deployment(
        &self,
        id: &TenantId,
        update: &DeploymentUpdate,
    ) -> Result<(), RegistryError> {
        self.updates
            .lock()
            .expect("registry mutex poisoned")
            .push((id.clone(), update.clone()));
        if self.unavailable {
            return Err(RegistryError::Unavailable("firestore offline".to_string()));
        }
        let mut guard = self.records.lock().expect("registry mutex poisoned");
        let record = guard.get_mut(id).ok_or(RegistryError::NotFound)?;
        record.apply(update);
        Ok(())
    }
}

pub(super) fn creation(
    hosting: Arc<FakeHosting>,
    dispatcher: Arc<FakeDispatcher>,
    registry: Arc<MemoryRegistry>,
) -> CreationOrchestrator {
    CreationOrchestrator::new(SiteIdResolver::default(), hosting, dispatcher, registry)
        .with_call_timeout(Duration::from_secs(5))
}

pub(super) fn deletion(
    hosting: Arc<FakeHosting>,
    identities: Arc<FakeIdentities>,
    config: Arc<FakeHostingConfig>,
) -> DeletionOrchestrator {
    DeletionOrchestrator::new(SiteIdResolver::default(), hosting, identities, config)
        .with_call_timeout(Duration::from_secs(5))
        .with_concurrency(2)
}

/// Fully wired fakes around one registry.
pub(super) struct Harness {
    pub(super) hosting: Arc<FakeHosting>,
    pub(super) dispatcher: Arc<FakeDispatcher>,
    pub(super) identities: Arc<FakeIdentities>,
    pub(super) config: Arc<FakeHostingConfig>,
    pub(super) registry: Arc<MemoryRegistry>,
}

impl Harness {
    pub(super) fn new(registry: Arc<MemoryRegistry>, identities: FakeIdentities) -> Self {
        Self {
            hosting: FakeHosting::new(Behavior::Succeed),
            dispatcher: FakeDispatcher::new(Behavior::Succeed),
            identities: Arc::new(identities),
            config: FakeHostingConfig::new(),
            registry,
        }
    }

    pub(super) fn dispatcher(&self) -> LifecycleDispatcher {
        LifecycleDispatcher::new(
            creation(
                self.hosting.clone(),
                self.dispatcher.clone(),
                self.registry.clone(),
            ),
            deletion(
                self.hosting.clone(),
                self.identities.clone(),
                self.config.clone(),
            ),
        )
    }

    pub(super) fn api(&self) -> Arc<LifecycleApi> {
        Arc::new(LifecycleApi {
            dispatcher: self.dispatcher(),
            status: StatusQueryService::new(self.registry.clone()),
            tokens: vec![SecretToken::new(API_TOKEN)],
        })
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
