mod config;
mod task_cache;
mod timer_progress;

pub use config::{Config, SyncConfig};
pub use task_cache::{RecentTasks, MAX_RECENT_TASKS};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns `~/.config/pomosync[-dev]/` based on POMOSYNC_ENV.
///
/// Set POMOSYNC_ENV=dev to use development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("POMOSYNC_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("pomosync-dev")
    } else {
        base_dir.join("pomosync")
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
