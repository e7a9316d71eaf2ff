#![allow(dead_code)]

use std::time::Duration;

use tenant_lifecycle::config::{
    DeploymentConfig, GoogleCloudConfig, HostingConfig, LifecycleConfig, RegistryConfig,
    SecretToken, DEFAULT_SITE_SUFFIXES,
};

pub const PROJECT: &str = "village-portal";
pub const GCP_TOKEN: &str = "gcp-test-token";
pub const GITHUB_TOKEN: &str = "gh-test-token";
pub const REGISTRY_PATH: &str =
    "/firestore/v1/projects/village-portal/databases/(default)/documents/globalConfig/metadata/gramPanchayats";
pub const USERS_ROOT: &str =
    "/firestore/v1/projects/village-portal/databases/(default)/documents/gramPanchayats";

/// Every collaborator pointed at one mock server, each under its own path prefix.
pub fn lifecycle_config(base: &str) -> LifecycleConfig {
    LifecycleConfig {
        google: GoogleCloudConfig {
            project_id: Some(PROJECT.to_string()),
            access_token: Some(SecretToken::new(GCP_TOKEN)),
            metadata_token_url: format!("{base}/metadata/token"),
            hosting_api_base: format!("{base}/hosting/v1beta1"),
            firestore_api_base: format!("{base}/firestore/v1"),
            identity_api_base: format!("{base}/identity/v1"),
        },
        hosting: HostingConfig {
            site_suffixes: DEFAULT_SITE_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            hosting_domain: "web.app".to_string(),
            config_project_alias: None,
        },
        registry: RegistryConfig {
            collection: "globalConfig/metadata/gramPanchayats".to_string(),
            tenant_data_collection: "gramPanchayats".to_string(),
            identity_subcollection: "users".to_string(),
        },
        deployment: DeploymentConfig {
            api_base: format!("{base}/github"),
            token: Some(SecretToken::new(GITHUB_TOKEN)),
            owner: Some("council-ops".to_string()),
            repo: Some("village-sites".to_string()),
            workflow: "deploy-gp.yml".to_string(),
            git_ref: "main".to_string(),
            input_name: "gp_subdomain".to_string(),
        },
        collaborator_timeout: Duration::from_secs(5),
        identity_delete_concurrency: 4,
        status_tokens: vec![SecretToken::new("status-token")],
    }
}

pub fn without_dispatch(mut config: LifecycleConfig) -> LifecycleConfig {
    config.deployment.token = None;
    config
}
