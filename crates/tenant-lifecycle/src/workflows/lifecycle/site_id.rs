use std::fmt;

use serde::Serialize;

use super::domain::{is_path_segment, TenantRecord};
use crate::config::{HostingConfig, DEFAULT_SITE_SUFFIXES};

/// Hosting provider site identifier, e.g. `village7-abc123`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SiteId(String);

impl SiteId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_path_safe(&self) -> bool {
        is_path_segment(&self.0)
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Turns a tenant's `subdomain`/`domain` pair into the hosting site identifier.
///
/// `subdomain` wins verbatim because it already carries any uniqueness suffix assigned at
/// registration. Otherwise the first configured hosting suffix that `domain` ends with is
/// removed. A domain that matches no suffix is used as-is; only an empty result means there
/// is nothing to provision.
#[derive(Debug, Clone)]
pub struct SiteIdResolver {
    suffixes: Vec<String>,
    hosting_domain: String,
}

impl Default for SiteIdResolver {
    fn default() -> Self {
        Self::new(
            DEFAULT_SITE_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            "web.app",
        )
    }
}

impl SiteIdResolver {
    pub fn new(suffixes: Vec<String>, hosting_domain: impl Into<String>) -> Self {
        let suffixes = suffixes
            .into_iter()
            .map(|suffix| suffix.trim().to_string())
            .filter(|suffix| !suffix.is_empty())
            .map(|suffix| {
                if suffix.starts_with('.') {
                    suffix
                } else {
                    format!(".{suffix}")
                }
            })
            .collect();

        Self {
            suffixes,
            hosting_domain: hosting_domain.into().trim_start_matches('.').to_string(),
        }
    }

    pub fn from_config(config: &HostingConfig) -> Self {
        Self::new(config.site_suffixes.clone(), config.hosting_domain.clone())
    }

    pub fn resolve(&self, record: &TenantRecord) -> Option<SiteId> {
        let subdomain = record.subdomain.trim();
        if !subdomain.is_empty() {
            return Some(SiteId(subdomain.to_string()));
        }
        self.site_for_domain(&record.domain)
    }

    pub fn site_for_domain(&self, domain: &str) -> Option<SiteId> {
        let domain = domain.trim().trim_end_matches('.');
        if domain.is_empty() {
            return None;
        }

        let stripped = self
            .suffixes
            .iter()
            .find_map(|suffix| domain.strip_suffix(suffix.as_str()));

        match stripped {
            Some("") => None,
            Some(site) => Some(SiteId(site.to_string())),
            None => Some(SiteId(domain.to_string())),
        }
    }

    /// Public hostname the hosting provider serves a site under.
    pub fn domain_for(&self, site: &SiteId) -> String {
        format!("{}.{}", site.as_str(), self.hosting_domain)
    }
}
