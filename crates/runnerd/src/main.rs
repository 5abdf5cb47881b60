//! runnerd — the runnergrid daemon.
//!
//! Long-running autoscaler for GitLab CI Auto Scaling Groups. Once per
//! `check-interval` it collects the group's job backlog and drives every
//! configured ASG toward the size the backlog demands.
//!
//! # Usage
//!
//! ```text
//! runnerd --config /etc/runnergrid/config.yml
//! runnerd -r                 # validate config, signal a reload
//! runnerd --version
//! ```
//!
//! Signals: `SIGHUP` reloads the configuration (debounced), `SIGINT` and
//! `SIGTERM` shut down gracefully. A pidfile is written on start and
//! removed on exit.

mod daemon;
mod paths;
mod pidfile;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use tracing::info;

#[derive(Parser)]
#[command(name = "runnerd", about = "GitLab ASG autoscaler daemon")]
struct Cli {
    /// Path to the configuration file (explicit value overrides discovery).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to the pidfile (explicit value overrides discovery).
    #[arg(long)]
    pid_file: Option<PathBuf>,

    /// Validate the resolved config, then signal the running process to
    /// reload it.
    #[arg(short = 'r')]
    reload: bool,

    /// Print the version and exit.
    #[arg(long)]
    version: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,runnerd=debug,runnergrid=debug".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    if cli.version {
        print_version();
        return Ok(());
    }

    let config_path = paths::resolve_config_path(cli.config);
    let pid_path = paths::resolve_pid_path(cli.pid_file);

    if cli.reload {
        return send_reload(&config_path, &pid_path);
    }

    daemon::run(config_path, pid_path).await
}

fn print_version() {
    println!("runnerd version: {}", env!("CARGO_PKG_VERSION"));
    if let Some(commit) = option_env!("RUNNERGRID_COMMIT") {
        println!("commit hash: {commit}");
    }
}

/// The `-r` path: prove the config is loadable before disturbing the
/// running process, then send it `SIGHUP`. Falls back to signalling
/// ourselves when no pidfile exists.
fn send_reload(config_path: &std::path::Path, pid_path: &std::path::Path) -> anyhow::Result<()> {
    let config = runnergrid_config::load(config_path)
        .with_context(|| format!("failed to load config {}", config_path.display()))?;
    config.validate().context("config validation failed")?;

    let pid = match pidfile::read(pid_path) {
        Ok(pid) => {
            info!(pid, pidfile = %pid_path.display(), "sending SIGHUP");
            pid
        }
        Err(_) => {
            info!(pidfile = %pid_path.display(), "pidfile not found, sending SIGHUP to self");
            std::process::id() as i32
        }
    };

    kill(Pid::from_raw(pid), Signal::SIGHUP)
        .with_context(|| format!("failed to send SIGHUP to pid {pid}"))?;
    info!("reload signal sent");
    Ok(())
}
