//! Collaborator seams used by the orchestrators, with their HTTP implementations.

pub mod config_sync;
pub mod credentials;
pub mod dispatch;
pub mod firestore;
pub mod hosting;
pub mod http;
pub mod identity;

pub use config_sync::{ConfigSyncError, GithubHostingConfig, HostingConfigStore};
pub use credentials::{
    token_source, CredentialError, MetadataTokenSource, StaticTokenSource, TokenSource,
};
pub use dispatch::{DeploymentDispatcher, DispatchError, GithubWorkflowDispatcher};
pub use hosting::{FirebaseHostingClient, HostingError, HostingGateway, SiteCreation, SiteRemoval};
pub use identity::{FirebaseIdentityStore, IdentityError, IdentityStore};
