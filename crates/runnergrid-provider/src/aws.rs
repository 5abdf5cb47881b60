//! AWS implementation of the provider port.
//!
//! One `AwsProvider` wraps an Auto Scaling client for a single region;
//! `AwsClients` is the per-region pool. Allocation counts instances in
//! the lifecycle states that already consume capacity; `Terminating*`,
//! `Standby` and `Quarantined` instances do not.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_autoscaling::error::DisplayErrorContext;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};
use crate::port::{validate_write_request, AsgReading, Provider, ProviderPool};

/// Lifecycle states counted as allocated capacity.
pub const ALLOCATED_LIFECYCLE_STATES: [&str; 4] =
    ["InService", "Pending", "Pending:Wait", "Pending:Proceed"];

/// Auto Scaling client for one region.
#[derive(Debug)]
pub struct AwsProvider {
    client: aws_sdk_autoscaling::Client,
}

impl AwsProvider {
    /// Build a client for `region` from the default credential chain.
    pub async fn new(region: &str) -> ProviderResult<Self> {
        if region.is_empty() {
            return Err(ProviderError::Configuration(
                "region must not be empty".to_string(),
            ));
        }
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        Ok(Self {
            client: aws_sdk_autoscaling::Client::new(&sdk_config),
        })
    }
}

#[async_trait]
impl Provider for AwsProvider {
    async fn read(&self, asg_name: &str) -> ProviderResult<AsgReading> {
        let output = self
            .client
            .describe_auto_scaling_groups()
            .auto_scaling_group_names(asg_name)
            .send()
            .await
            .map_err(|err| {
                ProviderError::Api(format!(
                    "failed to describe ASG {asg_name}: {}",
                    DisplayErrorContext(&err)
                ))
            })?;

        let group = output
            .auto_scaling_groups()
            .first()
            .ok_or_else(|| ProviderError::NotFound(asg_name.to_string()))?;

        let allocated = group
            .instances()
            .iter()
            .filter(|instance| {
                instance
                    .lifecycle_state()
                    .is_some_and(|state| ALLOCATED_LIFECYCLE_STATES.contains(&state.as_str()))
            })
            .count() as i64;

        let desired = i64::from(group.desired_capacity().unwrap_or(0));
        if desired < 0 {
            return Err(ProviderError::Api(format!(
                "ASG {asg_name} reported negative desired capacity {desired}"
            )));
        }

        Ok(AsgReading { allocated, desired })
    }

    async fn write(&self, asg_name: &str, target: i64) -> ProviderResult<()> {
        validate_write_request(asg_name, target)?;
        let size = i32::try_from(target).map_err(|_| {
            ProviderError::Validation(format!("target capacity {target} out of range"))
        })?;

        self.client
            .update_auto_scaling_group()
            .auto_scaling_group_name(asg_name)
            .min_size(size)
            .max_size(size)
            .desired_capacity(size)
            .send()
            .await
            .map_err(|err| {
                ProviderError::Api(format!(
                    "failed to update ASG {asg_name}: {}",
                    DisplayErrorContext(&err)
                ))
            })?;

        info!(asg = asg_name, target, "ASG capacity updated");
        Ok(())
    }
}

/// Region → client cache for AWS.
#[derive(Default, Debug)]
pub struct AwsClients {
    clients: RwLock<HashMap<String, Arc<dyn Provider>>>,
}

impl AwsClients {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProviderPool for AwsClients {
    async fn get(&self, region: &str) -> ProviderResult<Arc<dyn Provider>> {
        // Fast path: shared lock.
        {
            let clients = self.clients.read().await;
            if let Some(client) = clients.get(region) {
                return Ok(client.clone());
            }
        }

        // Slow path: exclusive lock with double-check.
        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get(region) {
            return Ok(client.clone());
        }
        debug!(region, "creating AWS client");
        let client: Arc<dyn Provider> = Arc::new(AwsProvider::new(region).await?);
        clients.insert(region.to_string(), client.clone());
        Ok(client)
    }
}
