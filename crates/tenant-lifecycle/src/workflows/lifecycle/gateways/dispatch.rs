use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use tracing::debug;

use super::http::error_message;
use crate::config::DeploymentConfig;

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("deployment dispatch is not configured (missing token or repository)")]
    NotConfigured,
    #[error("dispatch network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("dispatch API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("dispatch call timed out after {0:?}")]
    Timeout(Duration),
}

/// Triggers the CI/CD workflow that builds and deploys a tenant site.
#[async_trait]
pub trait DeploymentDispatcher: Send + Sync {
    /// Credentials and target are present; checked before any dispatch attempt.
    fn is_configured(&self) -> bool;

    async fn dispatch(&self, subdomain: &str) -> Result<(), DispatchError>;
}

/// GitHub Actions `workflow_dispatch` client.
pub struct GithubWorkflowDispatcher {
    http: Client,
    config: DeploymentConfig,
}

impl GithubWorkflowDispatcher {
    pub fn new(http: Client, config: DeploymentConfig) -> Self {
        Self { http, config }
    }

    fn dispatch_body(&self, subdomain: &str) -> Value {
        let mut inputs = Map::new();
        inputs.insert(self.config.input_name.clone(), Value::from(subdomain));
        json!({ "ref": self.config.git_ref, "inputs": inputs })
    }
}

impl std::fmt::Debug for GithubWorkflowDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubWorkflowDispatcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl DeploymentDispatcher for GithubWorkflowDispatcher {
    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    async fn dispatch(&self, subdomain: &str) -> Result<(), DispatchError> {
        let (Some(token), Some(owner), Some(repo)) = (
            self.config.token.as_ref(),
            self.config.owner.as_deref(),
            self.config.repo.as_deref(),
        ) else {
            return Err(DispatchError::NotConfigured);
        };

        let url = format!(
            "{}/repos/{}/{}/actions/workflows/{}/dispatches",
            self.config.api_base.trim_end_matches('/'),
            owner,
            repo,
            self.config.workflow
        );
        debug!(%url, subdomain, "dispatching deployment workflow");

        let response = self
            .http
            .post(url)
            .bearer_auth(token.expose())
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .json(&self.dispatch_body(subdomain))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(DispatchError::Api {
                status: status.as_u16(),
                message: error_message(response).await,
            })
        }
    }
}
