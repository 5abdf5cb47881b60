//! Config and pidfile path discovery.
//!
//! Explicit flags win; otherwise the system location is used when it
//! already exists, with a working-directory fallback.

use std::path::{Path, PathBuf};

const SYSTEM_CONFIG_PATH: &str = "/etc/runnergrid/config.yml";
const LOCAL_CONFIG_PATH: &str = "./config.yml";
const SYSTEM_PID_PATH: &str = "/var/run/runnerd.pid";
const LOCAL_PID_PATH: &str = "./runnerd.pid";

pub fn resolve_config_path(explicit: Option<PathBuf>) -> PathBuf {
    resolve(explicit, SYSTEM_CONFIG_PATH, LOCAL_CONFIG_PATH)
}

pub fn resolve_pid_path(explicit: Option<PathBuf>) -> PathBuf {
    resolve(explicit, SYSTEM_PID_PATH, LOCAL_PID_PATH)
}

fn resolve(explicit: Option<PathBuf>, system: &str, local: &str) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }
    if Path::new(system).exists() {
        return PathBuf::from(system);
    }
    PathBuf::from(local)
}
