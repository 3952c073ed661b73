//! Site table and endpoint settings, loaded from YAML.
//!
//! The configuration is plain data: editing which sites and prefixes get
//! exported never touches the fetch or conversion code. Without `--config`
//! the built-in `sites.yaml` is used.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use tracing::{info, instrument};

use crate::errors::StatsError;
use crate::models::Target;

const BUILTIN_SITES: &str = include_str!("../sites.yaml");

/// How a target's prefix reaches the export endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointStyle {
    /// `<base>/<site>/export`; the prefix only appears in the filter array.
    #[default]
    Filter,
    /// `<base>/<site>/<prefix>/export`, filter array still sent.
    PathSegment,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub style: EndpointStyle,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Static headers sent with every request (e.g. `Authorization`).
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_base_url() -> String {
    "https://analytics.python.org".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            style: EndpointStyle::default(),
            timeout_secs: default_timeout_secs(),
            headers: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    pub id: String,
    #[serde(default)]
    pub prefixes: Vec<String>,
}

/// Immutable run configuration: the endpoint plus the ordered site table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatsConfig {
    #[serde(default)]
    pub endpoint: EndpointConfig,
    pub sites: Vec<SiteConfig>,
}

impl StatsConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self, StatsError> {
        let config: StatsConfig = serde_yaml::from_str(raw)
            .map_err(|e| StatsError::Config(format!("invalid YAML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// The site table shipped with the binary.
    pub fn builtin() -> Result<Self, StatsError> {
        Self::from_yaml_str(BUILTIN_SITES)
    }

    #[instrument(level = "info", skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self, StatsError> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            StatsError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::from_yaml_str(&raw)?;
        info!(sites = config.sites.len(), "Loaded site configuration");
        Ok(config)
    }

    fn validate(&self) -> Result<(), StatsError> {
        if self.sites.is_empty() {
            return Err(StatsError::Config("no sites configured".into()));
        }
        if self.endpoint.timeout_secs == 0 {
            return Err(StatsError::Config("timeout_secs must be positive".into()));
        }
        let mut seen = HashSet::new();
        for site in &self.sites {
            if site.id.trim().is_empty() {
                return Err(StatsError::Config("site id must not be empty".into()));
            }
            if !seen.insert(site.id.as_str()) {
                return Err(StatsError::Config(format!("duplicate site '{}'", site.id)));
            }
            if site.prefixes.iter().any(|p| p.trim().is_empty()) {
                return Err(StatsError::Config(format!(
                    "site '{}' has an empty prefix; omit prefixes to fetch the whole site",
                    site.id
                )));
            }
        }
        Ok(())
    }

    /// Keep only the named sites, preserving configured order.
    pub fn restrict_to(&mut self, site_ids: &[String]) -> Result<(), StatsError> {
        if site_ids.is_empty() {
            return Ok(());
        }
        if let Some(unknown) = site_ids
            .iter()
            .find(|id| !self.sites.iter().any(|s| &s.id == *id))
        {
            return Err(StatsError::Config(format!("site '{unknown}' is not configured")));
        }
        self.sites.retain(|s| site_ids.contains(&s.id));
        Ok(())
    }

    /// Expand the site table into targets: one per prefix, or one
    /// whole-site target when a site lists no prefixes.
    pub fn targets(&self) -> Vec<Target> {
        self.sites
            .iter()
            .flat_map(|site| {
                if site.prefixes.is_empty() {
                    vec![Target::whole_site(&site.id)]
                } else {
                    site.prefixes
                        .iter()
                        .map(|p| Target::new(&site.id, p))
                        .collect()
                }
            })
            .collect()
    }
}
