use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use super::http::error_message;
use crate::config::{GoogleCloudConfig, SecretToken};

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("token endpoint unreachable: {0}")]
    Network(#[from] reqwest::Error),
    #[error("token endpoint returned {status}: {message}")]
    Endpoint { status: u16, message: String },
}

/// Ambient bearer credential provider for Google APIs.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<SecretToken, CredentialError>;
}

/// Pre-issued token from configuration.
#[derive(Debug, Clone)]
pub struct StaticTokenSource {
    token: SecretToken,
}

impl StaticTokenSource {
    pub fn new(token: SecretToken) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn access_token(&self) -> Result<SecretToken, CredentialError> {
        Ok(self.token.clone())
    }
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    #[serde(default)]
    expires_in: u64,
}

/// Default service account token from the compute metadata server, cached until shortly
/// before it expires.
#[derive(Debug)]
pub struct MetadataTokenSource {
    http: Client,
    url: String,
    cached: Mutex<Option<(SecretToken, Instant)>>,
}

const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

impl MetadataTokenSource {
    pub fn new(http: Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            cached: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TokenSource for MetadataTokenSource {
    async fn access_token(&self) -> Result<SecretToken, CredentialError> {
        let mut cached = self.cached.lock().await;
        if let Some((token, valid_until)) = cached.as_ref() {
            if Instant::now() < *valid_until {
                return Ok(token.clone());
            }
        }

        let response = self
            .http
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CredentialError::Endpoint {
                status: status.as_u16(),
                message: error_message(response).await,
            });
        }

        let body: MetadataToken = response.json().await?;
        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(EXPIRY_MARGIN);
        let token = SecretToken::new(body.access_token);
        debug!(expires_in = body.expires_in, "refreshed metadata access token");
        *cached = Some((token.clone(), Instant::now() + lifetime));
        Ok(token)
    }
}

/// Configured static token when present, metadata server otherwise.
pub fn token_source(config: &GoogleCloudConfig, http: Client) -> Arc<dyn TokenSource> {
    match &config.access_token {
        Some(token) => Arc::new(StaticTokenSource::new(token.clone())),
        None => Arc::new(MetadataTokenSource::new(
            http,
            config.metadata_token_url.clone(),
        )),
    }
}
