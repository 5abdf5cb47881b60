//! Per-tick reconciler.
//!
//! One invocation per tick: enumerate every configured ASG, spawn one
//! worker per group, and drive each group through read → plan → write.
//! Workers share only the tick's running allocation sum; a worker that
//! fails to read or write logs the error and leaves the others alone.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use runnergrid_config::{AsgConfig, Config};
use runnergrid_gitlab::ClusterState;
use runnergrid_provider::ProviderRegistry;

use crate::planner::{plan, Decision};

/// Drives every ASG toward its planned size once per tick.
pub struct Reconciler {
    registry: Arc<ProviderRegistry>,
}

impl Reconciler {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    /// Reconcile every ASG against `state`.
    ///
    /// Returns the total allocation observed this tick, for the
    /// end-of-tick capacity log.
    pub async fn reconcile(&self, config: Arc<Config>, state: Arc<ClusterState>) -> i64 {
        let total_allocated = Arc::new(Mutex::new(0i64));

        let mut handles = Vec::new();
        for (provider_key, provider_cfg) in &config.providers {
            for asg in &provider_cfg.asg_names {
                if asg.tags.is_empty() {
                    warn!(asg = %asg.name, provider = %provider_key, "ASG has no tags, skipping");
                    continue;
                }
                let region = asg.resolve_region(provider_cfg.region.as_deref());
                let worker = Worker {
                    registry: self.registry.clone(),
                    state: state.clone(),
                    total_allocated: total_allocated.clone(),
                    asg: asg.clone(),
                    region,
                };
                handles.push(tokio::spawn(worker.run()));
            }
        }

        for handle in handles {
            if let Err(err) = handle.await {
                error!(error = %err, "reconcile worker failed");
            }
        }

        let total = *total_allocated.lock().await;
        debug!(total_allocated = total, "tick reconciled");
        total
    }
}

struct Worker {
    registry: Arc<ProviderRegistry>,
    state: Arc<ClusterState>,
    total_allocated: Arc<Mutex<i64>>,
    asg: AsgConfig,
    region: String,
}

impl Worker {
    async fn run(self) {
        let provider = match self.registry.provider_for(&self.asg.name, &self.region).await {
            Ok(provider) => provider,
            Err(err) => {
                error!(asg = %self.asg.name, error = %err, "provider resolution failed");
                return;
            }
        };

        let reading = match provider.read(&self.asg.name).await {
            Ok(reading) => reading,
            Err(err) => {
                error!(asg = %self.asg.name, error = %err, "failed to read ASG");
                return;
            }
        };

        // Account this group's allocation before planning; rule 2 sees
        // the sum of every group processed so far, this one included.
        let seen_allocated = {
            let mut total = self.total_allocated.lock().await;
            *total += reading.allocated.max(0);
            *total
        };

        info!(
            asg = %self.asg.name,
            desired = reading.desired,
            allocated = reading.allocated,
            tags = ?self.asg.tags,
            "processing ASG"
        );

        match plan(&self.asg, &reading, &self.state, seen_allocated) {
            Decision::ScaleTo(target) => {
                let direction = if target > reading.desired { "up" } else { "down" };
                match provider.write(&self.asg.name, target).await {
                    Ok(()) => info!(
                        asg = %self.asg.name,
                        old_desired = reading.desired,
                        new_desired = target,
                        direction,
                        "ASG scaled"
                    ),
                    Err(err) => {
                        error!(asg = %self.asg.name, target, error = %err, "scale write failed");
                    }
                }
            }
            Decision::NoChange => {
                debug!(asg = %self.asg.name, "no capacity change required");
            }
        }
    }
}
