use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// True when `value` can stand alone as one URL path segment: non-empty, not a dot segment,
/// and free of separators, query or fragment markers and percent escapes.
pub fn is_path_segment(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains(['/', '\\', '?', '#', '%'])
        && !value.chars().any(char::is_control)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid tenant id {0:?}: must be a single non-empty path segment")]
pub struct InvalidTenantId(pub String);

/// Stable tenant identifier; the registry document key.
///
/// Deserialized ids are checked with [`is_path_segment`]; gateways re-check before building
/// request paths, so ids built with [`TenantId::new`] cannot escape their collection either.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn parse(value: impl Into<String>) -> Result<Self, InvalidTenantId> {
        let value = value.into();
        if is_path_segment(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidTenantId(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_path_safe(&self) -> bool {
        is_path_segment(&self.0)
    }
}

impl TryFrom<String> for TenantId {
    type Error = InvalidTenantId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provisioning state stored on the tenant record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    /// No orchestration outcome has been recorded yet.
    #[default]
    #[serde(rename = "unknown", alias = "unset")]
    Unset,
    Deploying,
    Active,
    Failed,
}

impl DeploymentStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unset => "unknown",
            Self::Deploying => "deploying",
            Self::Active => "active",
            Self::Failed => "failed",
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "deploying" => Self::Deploying,
            "active" => Self::Active,
            "failed" => Self::Failed,
            _ => Self::Unset,
        }
    }
}

/// One tenant registration as held by the tenant registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantRecord {
    pub id: TenantId,
    #[serde(default)]
    pub subdomain: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub deployment_status: DeploymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_triggered_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_failed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_error: Option<String>,
}

impl TenantRecord {
    /// Freshly registered tenant with no provisioning outcome.
    pub fn new(id: impl Into<String>, subdomain: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            id: TenantId::new(id),
            subdomain: subdomain.into(),
            domain: domain.into(),
            deployment_status: DeploymentStatus::Unset,
            deployment_triggered_at: None,
            deployment_failed_at: None,
            deployment_error: None,
        }
    }

    /// Apply a registry mutation in place, mirroring what the document store does.
    pub fn apply(&mut self, update: &DeploymentUpdate) {
        match update {
            DeploymentUpdate::Deploying {
                triggered_at,
                domain,
            } => {
                self.deployment_status = DeploymentStatus::Deploying;
                self.deployment_triggered_at = Some(*triggered_at);
                self.deployment_error = None;
                if let Some(domain) = domain {
                    self.domain = domain.clone();
                }
            }
            DeploymentUpdate::Failed { error, failed_at } => {
                self.deployment_status = DeploymentStatus::Failed;
                self.deployment_error = Some(error.clone());
                self.deployment_failed_at = Some(*failed_at);
            }
        }
    }
}

/// The field group the creation orchestrator writes back to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentUpdate {
    Deploying {
        triggered_at: DateTime<Utc>,
        /// Set only when the record had no domain yet.
        domain: Option<String>,
    },
    Failed {
        error: String,
        failed_at: DateTime<Utc>,
    },
}

impl DeploymentUpdate {
    pub fn status(&self) -> DeploymentStatus {
        match self {
            Self::Deploying { .. } => DeploymentStatus::Deploying,
            Self::Failed { .. } => DeploymentStatus::Failed,
        }
    }
}

/// Authentication-store entry belonging to a tenant's user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Change-feed notification for the tenant registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "record", rename_all = "lowercase")]
pub enum TenantEvent {
    Created(TenantRecord),
    Deleted(TenantRecord),
}

impl TenantEvent {
    pub fn tenant_id(&self) -> &TenantId {
        match self {
            Self::Created(record) | Self::Deleted(record) => &record.id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Created(_) => "created",
            Self::Deleted(_) => "deleted",
        }
    }
}
