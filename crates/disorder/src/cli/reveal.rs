//! Open a directory in the platform file manager.

use std::path::Path;
use std::process::Command;

#[cfg(target_os = "macos")]
const OPENER: &str = "open";

#[cfg(target_os = "windows")]
const OPENER: &str = "explorer";

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const OPENER: &str = "xdg-open";

/// Reveal `path` without waiting for the file manager to exit.
pub fn reveal(path: &Path) -> anyhow::Result<()> {
    Command::new(OPENER)
        .arg(path)
        .spawn()
        .map_err(|e| anyhow::anyhow!("Failed to run {OPENER} for {}: {e}", path.display()))?;
    tracing::debug!("Revealed {:?} with {}", path, OPENER);
    Ok(())
}
