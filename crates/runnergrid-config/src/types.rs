//! Configuration types.
//!
//! All structs deserialize from kebab-case YAML keys. Provider blocks are
//! captured through a flattened map so new clouds need no schema change.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ConfigError, ConfigResult};

/// Fallback region when neither the ASG, the provider block, nor the
/// environment names one.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub autoscaler: AutoscalerConfig,
    pub gitlab: GitlabConfig,
    /// Every top-level key other than `autoscaler` and `gitlab` is a
    /// provider block keyed by provider name (`aws`, `azure`, …).
    #[serde(flatten)]
    pub providers: HashMap<String, ProviderConfig>,
}

/// Control-loop parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AutoscalerConfig {
    /// Seconds between reconciliation ticks. Must be positive.
    pub check_interval: i64,
}

/// GitLab API access parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitlabConfig {
    /// Private token with permission to read projects and jobs.
    pub token: String,
    /// Group whose projects (subgroups included) are scanned for jobs.
    pub group: String,
    /// Project names excluded from collection.
    #[serde(default)]
    pub exclude_projects: Vec<String>,
}

/// One cloud provider block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProviderConfig {
    /// Provider-level default region for ASGs that do not name one.
    #[serde(default)]
    pub region: Option<String>,
    /// Auto Scaling Groups managed by this provider.
    #[serde(default)]
    pub asg_names: Vec<AsgConfig>,
}

/// A single Auto Scaling Group entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AsgConfig {
    /// ASG name, unique across the whole configuration.
    pub name: String,
    /// Job tags this group serves. An empty set means the group is
    /// skipped each tick (with a warning).
    #[serde(default)]
    pub tags: Vec<String>,
    /// Upper bound on the group's target size.
    #[serde(rename = "max-asg-capacity", default = "default_max_capacity")]
    pub max_capacity: i64,
    /// When false the group never shrinks below one instance.
    #[serde(default)]
    pub scale_to_zero: bool,
    /// Region override for this group.
    #[serde(default)]
    pub region: Option<String>,
}

fn default_max_capacity() -> i64 {
    1
}

impl Config {
    /// Validate the configuration.
    ///
    /// Checks interval positivity, GitLab credentials, per-ASG fields and
    /// ASG name uniqueness across providers.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.autoscaler.check_interval <= 0 {
            return Err(ConfigError::Invalid(
                "autoscaler.check-interval must be positive".to_string(),
            ));
        }
        if self.gitlab.token.is_empty() {
            return Err(ConfigError::Invalid("gitlab.token is required".to_string()));
        }
        if self.gitlab.group.is_empty() {
            return Err(ConfigError::Invalid("gitlab.group is required".to_string()));
        }

        let mut seen_names = HashSet::new();
        for (provider, provider_cfg) in &self.providers {
            for (idx, asg) in provider_cfg.asg_names.iter().enumerate() {
                asg.validate().map_err(|err| {
                    ConfigError::Invalid(format!("provider {provider}: asg[{idx}]: {err}"))
                })?;
                if !seen_names.insert(asg.name.clone()) {
                    return Err(ConfigError::Invalid(format!(
                        "duplicate asg name {}",
                        asg.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Log a startup summary. The token itself is never printed.
    pub fn log_summary(&self) {
        info!(
            group = %self.gitlab.group,
            token = if self.gitlab.token.is_empty() { "missing" } else { "present" },
            check_interval = self.autoscaler.check_interval,
            "configuration loaded"
        );
        for (provider, provider_cfg) in &self.providers {
            for asg in &provider_cfg.asg_names {
                info!(
                    provider = %provider,
                    asg = %asg.name,
                    region = %asg.resolve_region(provider_cfg.region.as_deref()),
                    max_capacity = asg.max_capacity,
                    scale_to_zero = asg.scale_to_zero,
                    tags = ?asg.tags,
                    "configured ASG"
                );
            }
        }
    }
}

impl AsgConfig {
    fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("name is required".to_string());
        }
        if self.max_capacity < 0 {
            return Err("max-asg-capacity must be non-negative".to_string());
        }
        Ok(())
    }

    /// Resolve the effective region for this group.
    ///
    /// Order: ASG region, provider default, `AWS_REGION`,
    /// `AWS_DEFAULT_REGION`, then [`DEFAULT_REGION`].
    pub fn resolve_region(&self, provider_default: Option<&str>) -> String {
        if let Some(region) = self.region.as_deref().filter(|r| !r.is_empty()) {
            return region.to_string();
        }
        if let Some(region) = provider_default.filter(|r| !r.is_empty()) {
            return region.to_string();
        }
        env_region().unwrap_or_else(|| DEFAULT_REGION.to_string())
    }
}

fn env_region() -> Option<String> {
    std::env::var("AWS_REGION")
        .ok()
        .filter(|r| !r.is_empty())
        .or_else(|| std::env::var("AWS_DEFAULT_REGION").ok().filter(|r| !r.is_empty()))
}
