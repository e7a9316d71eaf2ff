//! Removal of a deleted tenant's hosting target from the deployment repository's
//! `firebase.json` and `.firebaserc`.

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::http::error_message;
use crate::config::{DeploymentConfig, SecretToken};

pub const FIREBASE_JSON: &str = "firebase.json";
pub const FIREBASERC: &str = ".firebaserc";

#[derive(Debug, thiserror::Error)]
pub enum ConfigSyncError {
    #[error("hosting config sync is not configured")]
    NotConfigured,
    #[error("config sync network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("contents API error for {path}: {status} - {message}")]
    Api {
        path: String,
        status: u16,
        message: String,
    },
    #[error("{path} is not valid JSON: {source}")]
    Malformed {
        path: String,
        source: serde_json::Error,
    },
    #[error("{path} content is not valid base64: {source}")]
    Encoding {
        path: String,
        source: base64::DecodeError,
    },
    #[error("config sync timed out after {0:?}")]
    Timeout(Duration),
}

/// Hosting configuration files kept alongside the deployment workflow.
#[async_trait]
pub trait HostingConfigStore: Send + Sync {
    fn is_configured(&self) -> bool;

    /// Drop every hosting target named in `targets`; returns how many files changed.
    async fn remove_targets(&self, targets: &[String]) -> Result<usize, ConfigSyncError>;
}

/// Drops `hosting` entries whose `target` is listed. Returns whether anything changed.
pub fn prune_firebase_json(config: &mut Value, targets: &[String]) -> bool {
    let Some(hosting) = config.get_mut("hosting").and_then(Value::as_array_mut) else {
        return false;
    };
    let before = hosting.len();
    hosting.retain(|site| {
        site.get("target")
            .and_then(Value::as_str)
            .map_or(true, |target| !targets.iter().any(|t| t == target))
    });
    hosting.len() != before
}

/// Drops `targets.<alias>.hosting.<target>` keys (and the flat `targets.<alias>.<target>`
/// form older files used). Returns whether anything changed.
pub fn prune_firebaserc(config: &mut Value, alias: &str, targets: &[String]) -> bool {
    let Some(project_targets) = config
        .get_mut("targets")
        .and_then(|all| all.get_mut(alias))
        .and_then(Value::as_object_mut)
    else {
        return false;
    };

    let mut changed = false;
    for target in targets {
        changed |= project_targets.remove(target).is_some();
    }
    if let Some(hosting) = project_targets
        .get_mut("hosting")
        .and_then(Value::as_object_mut)
    {
        for target in targets {
            changed |= hosting.remove(target).is_some();
        }
    }
    changed
}

#[derive(Debug, Deserialize)]
struct ContentsFile {
    content: String,
    sha: String,
}

/// GitHub contents API implementation.
pub struct GithubHostingConfig {
    http: Client,
    api_base: String,
    token: Option<SecretToken>,
    owner: Option<String>,
    repo: Option<String>,
    branch: String,
    project_alias: String,
}

impl GithubHostingConfig {
    pub fn new(http: Client, deployment: &DeploymentConfig, project_alias: impl Into<String>) -> Self {
        Self {
            http,
            api_base: deployment.api_base.trim_end_matches('/').to_string(),
            token: deployment.token.clone(),
            owner: deployment.owner.clone(),
            repo: deployment.repo.clone(),
            branch: deployment.git_ref.clone(),
            project_alias: project_alias.into(),
        }
    }

    fn coordinates(&self) -> Result<(&SecretToken, &str, &str), ConfigSyncError> {
        match (&self.token, self.owner.as_deref(), self.repo.as_deref()) {
            (Some(token), Some(owner), Some(repo)) => Ok((token, owner, repo)),
            _ => Err(ConfigSyncError::NotConfigured),
        }
    }

    async fn fetch(&self, path: &str) -> Result<(Value, String), ConfigSyncError> {
        let (token, owner, repo) = self.coordinates()?;
        let url = format!("{}/repos/{owner}/{repo}/contents/{path}", self.api_base);
        let response = self
            .http
            .get(url)
            .bearer_auth(token.expose())
            .header("Accept", "application/vnd.github+json")
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConfigSyncError::Api {
                path: path.to_string(),
                status: status.as_u16(),
                message: error_message(response).await,
            });
        }

        let file: ContentsFile = response.json().await?;
        let compact: String = file.content.split_whitespace().collect();
        let raw = STANDARD
            .decode(compact)
            .map_err(|source| ConfigSyncError::Encoding {
                path: path.to_string(),
                source,
            })?;
        let value = serde_json::from_slice(&raw).map_err(|source| ConfigSyncError::Malformed {
            path: path.to_string(),
            source,
        })?;
        Ok((value, file.sha))
    }

    async fn store(
        &self,
        path: &str,
        value: &Value,
        sha: &str,
        message: &str,
    ) -> Result<(), ConfigSyncError> {
        let (token, owner, repo) = self.coordinates()?;
        let url = format!("{}/repos/{owner}/{repo}/contents/{path}", self.api_base);
        let rendered =
            serde_json::to_string_pretty(value).map_err(|source| ConfigSyncError::Malformed {
                path: path.to_string(),
                source,
            })?;

        let response = self
            .http
            .put(url)
            .bearer_auth(token.expose())
            .header("Accept", "application/vnd.github+json")
            .json(&json!({
                "message": message,
                "content": STANDARD.encode(format!("{rendered}\n")),
                "sha": sha,
                "branch": self.branch,
            }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ConfigSyncError::Api {
                path: path.to_string(),
                status: status.as_u16(),
                message: error_message(response).await,
            })
        }
    }
}

impl std::fmt::Debug for GithubHostingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubHostingConfig")
            .field("api_base", &self.api_base)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl HostingConfigStore for GithubHostingConfig {
    fn is_configured(&self) -> bool {
        self.coordinates().is_ok()
    }

    async fn remove_targets(&self, targets: &[String]) -> Result<usize, ConfigSyncError> {
        let label = targets.first().map(String::as_str).unwrap_or_default();
        let mut changed = 0;

        let (mut firebase_json, sha) = self.fetch(FIREBASE_JSON).await?;
        if prune_firebase_json(&mut firebase_json, targets) {
            let message = format!("chore: Remove {label} hosting configuration");
            self.store(FIREBASE_JSON, &firebase_json, &sha, &message)
                .await?;
            info!(file = FIREBASE_JSON, target = label, "hosting target removed");
            changed += 1;
        } else {
            debug!(file = FIREBASE_JSON, target = label, "no hosting entry to remove");
        }

        let (mut firebaserc, sha) = self.fetch(FIREBASERC).await?;
        if prune_firebaserc(&mut firebaserc, &self.project_alias, targets) {
            let message = format!("chore: Remove {label} hosting target");
            self.store(FIREBASERC, &firebaserc, &sha, &message).await?;
            info!(file = FIREBASERC, target = label, "hosting target removed");
            changed += 1;
        } else {
            debug!(file = FIREBASERC, target = label, "no hosting alias to remove");
        }

        Ok(changed)
    }
}
