//! Tenant provisioning and teardown driven by registry change notifications.
//!
//! A created tenant gets a hosting site and a deployment run; a deleted tenant has its site,
//! identities and hosting configuration targets removed. Each collaborator sits behind a
//! trait in [`gateways`] so the orchestrators can run against in-memory fakes.

pub mod creation;
pub mod deletion;
pub mod dispatcher;
pub mod domain;
pub mod gateways;
pub mod registry;
pub mod router;
pub mod site_id;
pub mod status;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use crate::config::LifecycleConfig;
use crate::error::AppError;

pub use creation::{CreationError, CreationOrchestrator, CreationOutcome, HostingProvision};
pub use deletion::{CleanupReport, DeletionOrchestrator, HostingCleanup, IdentityFailure};
pub use dispatcher::{CreationFailure, EventOutcome, LifecycleDispatcher, LoopSummary};
pub use domain::{
    DeploymentStatus, DeploymentUpdate, Identity, InvalidTenantId, TenantEvent, TenantId,
    TenantRecord,
};
pub use gateways::{
    DeploymentDispatcher, HostingConfigStore, HostingGateway, IdentityStore, SiteCreation,
    SiteRemoval,
};
pub use registry::{FirestoreTenantRegistry, RegistryError, TenantRegistry};
pub use router::{lifecycle_router, LifecycleApi};
pub use site_id::{SiteId, SiteIdResolver};
pub use status::{CallerContext, StatusQueryError, StatusQueryService, StatusView};

/// One handle per collaborator seam.
#[derive(Clone)]
pub struct Collaborators {
    pub hosting: Arc<dyn HostingGateway>,
    pub dispatcher: Arc<dyn DeploymentDispatcher>,
    pub identities: Arc<dyn IdentityStore>,
    pub hosting_config: Arc<dyn HostingConfigStore>,
    pub registry: Arc<dyn TenantRegistry>,
}

impl Collaborators {
    /// HTTP-backed collaborators sharing one client and one credential source.
    pub fn live(config: &LifecycleConfig) -> Result<Self, AppError> {
        let project_id = config.require_project_id()?.to_string();
        let http = gateways::http::client(config.collaborator_timeout)?;
        let tokens = gateways::token_source(&config.google, http.clone());
        let alias = config
            .hosting
            .config_project_alias
            .clone()
            .unwrap_or_else(|| project_id.clone());

        Ok(Self {
            hosting: Arc::new(gateways::FirebaseHostingClient::new(
                http.clone(),
                tokens.clone(),
                config.google.hosting_api_base.clone(),
                project_id.clone(),
            )),
            dispatcher: Arc::new(gateways::GithubWorkflowDispatcher::new(
                http.clone(),
                config.deployment.clone(),
            )),
            identities: Arc::new(gateways::FirebaseIdentityStore::new(
                http.clone(),
                tokens.clone(),
                &config.google,
                &config.registry,
                project_id.clone(),
            )),
            hosting_config: Arc::new(gateways::GithubHostingConfig::new(
                http.clone(),
                &config.deployment,
                alias,
            )),
            registry: Arc::new(FirestoreTenantRegistry::new(
                http,
                tokens,
                &config.google.firestore_api_base,
                &project_id,
                &config.registry.collection,
            )),
        })
    }

    pub fn dispatcher(&self, config: &LifecycleConfig) -> LifecycleDispatcher {
        let resolver = SiteIdResolver::from_config(&config.hosting);
        let creation = CreationOrchestrator::new(
            resolver.clone(),
            self.hosting.clone(),
            self.dispatcher.clone(),
            self.registry.clone(),
        )
        .with_call_timeout(config.collaborator_timeout);
        let deletion = DeletionOrchestrator::new(
            resolver,
            self.hosting.clone(),
            self.identities.clone(),
            self.hosting_config.clone(),
        )
        .with_call_timeout(config.collaborator_timeout)
        .with_concurrency(config.identity_delete_concurrency);

        LifecycleDispatcher::new(creation, deletion)
    }

    pub fn status_service(&self, config: &LifecycleConfig) -> StatusQueryService {
        StatusQueryService::new(self.registry.clone())
            .with_call_timeout(config.collaborator_timeout)
    }

    pub fn api(&self, config: &LifecycleConfig) -> LifecycleApi {
        LifecycleApi {
            dispatcher: self.dispatcher(config),
            status: self.status_service(config),
            tokens: config.status_tokens.clone(),
        }
    }
}
