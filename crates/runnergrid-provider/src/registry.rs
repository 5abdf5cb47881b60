//! Provider registry.
//!
//! Maps provider keys to their region pools and ASG names to provider
//! keys. Built from configuration at startup and rebuilt on reload; a
//! build failure leaves the previously installed registry untouched.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use runnergrid_config::Config;

use crate::aws::AwsClients;
use crate::error::{ProviderError, ProviderResult};
use crate::port::{Provider, ProviderPool};

/// All configured providers and the ASG → provider mapping.
#[derive(Debug)]
pub struct ProviderRegistry {
    pools: HashMap<String, Arc<dyn ProviderPool>>,
    asg_to_provider: HashMap<String, String>,
}

impl ProviderRegistry {
    /// Assemble a registry from explicit parts. Used by tests and by
    /// clouds registered outside [`ProviderRegistry::from_config`].
    pub fn new(
        pools: HashMap<String, Arc<dyn ProviderPool>>,
        asg_to_provider: HashMap<String, String>,
    ) -> Self {
        Self {
            pools,
            asg_to_provider,
        }
    }

    /// Build pools for every provider block with a non-empty ASG list.
    ///
    /// The default-region client of each pool is created eagerly so
    /// credential and region problems surface here rather than midway
    /// through a tick. Unknown provider keys are rejected.
    pub async fn from_config(config: &Config) -> ProviderResult<Self> {
        let mut pools: HashMap<String, Arc<dyn ProviderPool>> = HashMap::new();
        let mut asg_to_provider = HashMap::new();

        for (key, provider_cfg) in &config.providers {
            if provider_cfg.asg_names.is_empty() {
                continue;
            }

            let pool: Arc<dyn ProviderPool> = match key.to_lowercase().as_str() {
                "aws" => Arc::new(AwsClients::new()),
                other => {
                    return Err(ProviderError::Configuration(format!(
                        "unsupported provider '{other}'"
                    )));
                }
            };

            // Surface construction errors now, not at first use.
            for asg in &provider_cfg.asg_names {
                let region = asg.resolve_region(provider_cfg.region.as_deref());
                pool.get(&region).await?;
            }

            for asg in &provider_cfg.asg_names {
                asg_to_provider.insert(asg.name.clone(), key.clone());
            }
            debug!(provider = %key, asgs = provider_cfg.asg_names.len(), "provider registered");
            pools.insert(key.clone(), pool);
        }

        Ok(Self {
            pools,
            asg_to_provider,
        })
    }

    /// Resolve the client serving `asg_name` in `region`.
    pub async fn provider_for(
        &self,
        asg_name: &str,
        region: &str,
    ) -> ProviderResult<Arc<dyn Provider>> {
        let key = self.asg_to_provider.get(asg_name).ok_or_else(|| {
            ProviderError::Configuration(format!("no provider configured for ASG {asg_name}"))
        })?;
        let pool = self.pools.get(key).ok_or_else(|| {
            ProviderError::Configuration(format!("no pool registered for provider {key}"))
        })?;
        pool.get(region).await
    }

    /// Provider key serving `asg_name`, if any.
    pub fn provider_key_for(&self, asg_name: &str) -> Option<&str> {
        self.asg_to_provider.get(asg_name).map(String::as_str)
    }
}
