use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub lifecycle: LifecycleConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = match optional_var("APP_LOG_FORMAT") {
            Some(raw) => LogFormat::parse(&raw)?,
            None if environment == AppEnvironment::Production => LogFormat::Json,
            None => LogFormat::Compact,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                log_format,
            },
            lifecycle: LifecycleConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

/// Line format for emitted log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(ConfigError::InvalidLogFormat(value.to_string())),
        }
    }
}

/// Credential that never shows up in `Debug` output or log lines.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretToken(String);

impl SecretToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretToken(<redacted>)")
    }
}

/// Google Cloud endpoints and credentials shared by hosting, registry and identity calls.
#[derive(Debug, Clone)]
pub struct GoogleCloudConfig {
    pub project_id: Option<String>,
    pub access_token: Option<SecretToken>,
    pub metadata_token_url: String,
    pub hosting_api_base: String,
    pub firestore_api_base: String,
    pub identity_api_base: String,
}

/// Rules for turning `domain`/`subdomain` into a hosting site identifier.
#[derive(Debug, Clone)]
pub struct HostingConfig {
    pub site_suffixes: Vec<String>,
    pub hosting_domain: String,
    pub config_project_alias: Option<String>,
}

/// Collection paths inside the document store.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub collection: String,
    pub tenant_data_collection: String,
    pub identity_subcollection: String,
}

/// CI/CD workflow dispatch target.
#[derive(Debug, Clone)]
pub struct DeploymentConfig {
    pub api_base: String,
    pub token: Option<SecretToken>,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub workflow: String,
    pub git_ref: String,
    pub input_name: String,
}

impl DeploymentConfig {
    /// Credentials and repository coordinates are all present.
    pub fn is_configured(&self) -> bool {
        self.token.is_some() && self.owner.is_some() && self.repo.is_some()
    }
}

/// Everything the provisioning pipeline needs beyond the HTTP server itself.
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub google: GoogleCloudConfig,
    pub hosting: HostingConfig,
    pub registry: RegistryConfig,
    pub deployment: DeploymentConfig,
    pub collaborator_timeout: Duration,
    pub identity_delete_concurrency: usize,
    pub status_tokens: Vec<SecretToken>,
}

pub const DEFAULT_SITE_SUFFIXES: [&str; 2] = [".web.app", ".firebaseapp.com"];

const DEFAULT_METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

impl LifecycleConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let project_id = optional_var("GCP_PROJECT_ID").or_else(|| optional_var("GCLOUD_PROJECT"));

        let site_suffixes = match optional_var("HOSTING_SITE_SUFFIXES") {
            Some(raw) => split_list(&raw),
            None => DEFAULT_SITE_SUFFIXES.iter().map(|s| s.to_string()).collect(),
        };

        let timeout_secs = env::var("COLLABORATOR_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()
            .ok()
            .filter(|secs| *secs > 0)
            .ok_or(ConfigError::InvalidTimeout)?;

        let identity_delete_concurrency = env::var("IDENTITY_DELETE_CONCURRENCY")
            .unwrap_or_else(|_| "16".to_string())
            .parse::<usize>()
            .ok()
            .filter(|limit| *limit > 0)
            .ok_or(ConfigError::InvalidConcurrency)?;

        let status_tokens = optional_var("STATUS_API_TOKENS")
            .map(|raw| split_list(&raw).into_iter().map(SecretToken::new).collect())
            .unwrap_or_default();

        Ok(Self {
            google: GoogleCloudConfig {
                project_id,
                access_token: optional_var("GCP_ACCESS_TOKEN").map(SecretToken::new),
                metadata_token_url: var_or("GCP_METADATA_TOKEN_URL", DEFAULT_METADATA_TOKEN_URL),
                hosting_api_base: var_or(
                    "HOSTING_API_BASE",
                    "https://firebasehosting.googleapis.com/v1beta1",
                ),
                firestore_api_base: var_or(
                    "FIRESTORE_API_BASE",
                    "https://firestore.googleapis.com/v1",
                ),
                identity_api_base: var_or(
                    "IDENTITY_API_BASE",
                    "https://identitytoolkit.googleapis.com/v1",
                ),
            },
            hosting: HostingConfig {
                site_suffixes,
                hosting_domain: var_or("HOSTING_DOMAIN", "web.app"),
                config_project_alias: optional_var("HOSTING_CONFIG_PROJECT_ALIAS"),
            },
            registry: RegistryConfig {
                collection: var_or("REGISTRY_COLLECTION", "globalConfig/metadata/gramPanchayats"),
                tenant_data_collection: var_or("TENANT_DATA_COLLECTION", "gramPanchayats"),
                identity_subcollection: var_or("IDENTITY_SUBCOLLECTION", "users"),
            },
            deployment: DeploymentConfig {
                api_base: var_or("GITHUB_API_BASE", "https://api.github.com"),
                token: optional_var("GITHUB_TOKEN").map(SecretToken::new),
                owner: optional_var("DEPLOY_REPO_OWNER"),
                repo: optional_var("DEPLOY_REPO_NAME"),
                workflow: var_or("DEPLOY_WORKFLOW", "deploy-gp.yml"),
                git_ref: var_or("DEPLOY_REF", "main"),
                input_name: var_or("DEPLOY_INPUT_NAME", "gp_subdomain"),
            },
            collaborator_timeout: Duration::from_secs(timeout_secs),
            identity_delete_concurrency,
            status_tokens,
        })
    }

    pub fn require_project_id(&self) -> Result<&str, ConfigError> {
        self.google
            .project_id
            .as_deref()
            .ok_or(ConfigError::MissingProjectId)
    }
}

fn optional_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn var_or(key: &str, default: &str) -> String {
    optional_var(key).unwrap_or_else(|| default.to_string())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidLogFormat(String),
    InvalidTimeout,
    InvalidConcurrency,
    MissingProjectId,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidLogFormat(value) => {
                write!(f, "APP_LOG_FORMAT '{value}' must be 'compact' or 'json'")
            }
            ConfigError::InvalidTimeout => {
                write!(f, "COLLABORATOR_TIMEOUT_SECS must be a positive integer")
            }
            ConfigError::InvalidConcurrency => {
                write!(f, "IDENTITY_DELETE_CONCURRENCY must be a positive integer")
            }
            ConfigError::MissingProjectId => {
                write!(f, "GCP_PROJECT_ID (or GCLOUD_PROJECT) must be set")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidLogFormat(_)
            | ConfigError::InvalidTimeout
            | ConfigError::InvalidConcurrency
            | ConfigError::MissingProjectId => None,
        }
    }
}
