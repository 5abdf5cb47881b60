//! Pidfile handling.

use std::path::Path;

use anyhow::Context;
use tracing::warn;

/// Write the current process id.
pub fn write(path: &Path) -> anyhow::Result<()> {
    std::fs::write(path, std::process::id().to_string())
        .with_context(|| format!("failed to write pidfile {}", path.display()))
}

/// Read a pid back; fails when the file is missing or malformed.
pub fn read(path: &Path) -> anyhow::Result<i32> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read pidfile {}", path.display()))?;
    contents
        .trim()
        .parse()
        .with_context(|| format!("malformed pidfile {}", path.display()))
}

/// Best-effort removal on shutdown.
pub fn remove(path: &Path) {
    if let Err(err) = std::fs::remove_file(path) {
        warn!(pidfile = %path.display(), error = %err, "failed to remove pidfile");
    }
}
