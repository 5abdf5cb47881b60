//! The control loop.
//!
//! Owns the installed `(config, provider registry, gitlab client)`
//! triple behind a read-write lock: ticks read a snapshot of it, a
//! successful reload swaps in a new one atomically, and a failed reload
//! leaves the previous installation running.
//!
//! One reconciliation runs at a time; ticks that fire while a
//! reconciliation is still in flight are dropped, not queued.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::{watch, RwLock};
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use runnergrid_config::Config;
use runnergrid_engine::Reconciler;
use runnergrid_gitlab::GitlabClient;
use runnergrid_provider::ProviderRegistry;

use crate::pidfile;

/// Minimum spacing between two honoured reload signals.
const RELOAD_DEBOUNCE: Duration = Duration::from_secs(1);

/// Everything a tick needs, swapped as one unit on reload.
struct Installed {
    config: Arc<Config>,
    registry: Arc<ProviderRegistry>,
    gitlab: GitlabClient,
}

type SharedInstallation = Arc<RwLock<Arc<Installed>>>;

/// Run the daemon until a termination signal arrives.
pub async fn run(config_path: PathBuf, pid_path: PathBuf) -> anyhow::Result<()> {
    let initial = build_installation(&config_path).await?;
    let interval = initial.config.autoscaler.check_interval as u64;
    let installed: SharedInstallation = Arc::new(RwLock::new(Arc::new(initial)));

    pidfile::write(&pid_path)?;

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    spawn_signal_task(config_path, installed.clone(), shutdown_tx)?;

    // The first tick completes immediately, so the initial
    // reconciliation runs before the interval starts counting.
    let mut ticker = tokio::time::interval(Duration::from_secs(interval));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let current = installed.read().await.clone();
                run_tick(current).await;
            }
            _ = shutdown_rx.changed() => {
                info!("shutdown signal received");
                break;
            }
        }
    }

    pidfile::remove(&pid_path);
    info!("runnerd stopped");
    Ok(())
}

/// Load, validate and assemble one installation.
///
/// Used both at startup (errors are fatal) and on reload (errors reject
/// the reload).
async fn build_installation(config_path: &Path) -> anyhow::Result<Installed> {
    let config = runnergrid_config::load(config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;
    config.validate()?;
    config.log_summary();

    let registry = ProviderRegistry::from_config(&config).await?;
    let gitlab = GitlabClient::new(&config.gitlab.token)?;

    Ok(Installed {
        config: Arc::new(config),
        registry: Arc::new(registry),
        gitlab,
    })
}

/// One reconciliation: collect the backlog, then drive every ASG.
///
/// A collector failure aborts the tick; no ASG is written and the loop
/// waits for the next interval.
async fn run_tick(installed: Arc<Installed>) {
    let config = installed.config.clone();

    let projects = match installed
        .gitlab
        .fetch_projects(&config.gitlab.group, &config.gitlab.exclude_projects)
        .await
    {
        Ok(projects) => projects,
        Err(err) => {
            error!(error = %err, "failed to fetch projects, skipping tick");
            return;
        }
    };

    info!(projects = projects.len(), "collecting job backlog");
    let state = installed.gitlab.collect(&projects).await;

    let reconciler = Reconciler::new(installed.registry.clone());
    let total = reconciler.reconcile(config, Arc::new(state)).await;
    info!(total_allocated = total, "tick complete");
}

/// Handle `SIGHUP`/`SIGINT`/`SIGTERM` for the lifetime of the process.
fn spawn_signal_task(
    config_path: PathBuf,
    installed: SharedInstallation,
    shutdown_tx: watch::Sender<bool>,
) -> anyhow::Result<()> {
    let mut hangup = signal(SignalKind::hangup()).context("failed to install SIGHUP handler")?;
    let mut interrupt =
        signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;
    let mut terminate =
        signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

    tokio::spawn(async move {
        let mut debounce = ReloadDebounce::new(RELOAD_DEBOUNCE);
        loop {
            tokio::select! {
                _ = hangup.recv() => {
                    if !debounce.admit(Instant::now()) {
                        info!("reload suppressed (debounce)");
                        continue;
                    }
                    info!("received SIGHUP, reloading configuration");
                    match build_installation(&config_path).await {
                        Ok(next) => {
                            *installed.write().await = Arc::new(next);
                            info!("configuration reloaded");
                        }
                        Err(err) => {
                            error!(error = %err, "reload rejected, keeping previous configuration");
                        }
                    }
                }
                _ = interrupt.recv() => {
                    let _ = shutdown_tx.send(true);
                    break;
                }
                _ = terminate.recv() => {
                    let _ = shutdown_tx.send(true);
                    break;
                }
            }
        }
    });
    Ok(())
}

/// Timestamp-based reload debounce; a reload within the minimum
/// interval of the previous one is discarded.
struct ReloadDebounce {
    min_interval: Duration,
    last: Option<Instant>,
}

impl ReloadDebounce {
    fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    fn admit(&mut self, now: Instant) -> bool {
        if let Some(previous) = self.last {
            if now.duration_since(previous) < self.min_interval {
                return false;
            }
        }
        self.last = Some(now);
        true
    }
}
