//! Cycle position saved between `timer run` invocations.

use std::path::{Path, PathBuf};

use tracing::warn;

use super::data_dir;
use crate::error::{CacheError, ConfigError, CoreError};
use crate::timer::TimerProgress;

impl TimerProgress {
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("timer_progress.json"))
    }

    /// Read the saved position. A missing or unreadable file starts a new cycle.
    pub fn load_from(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(error) => {
                warn!(path = %path.display(), %error, "timer progress unreadable; starting a new cycle");
                return Self::default();
            }
        };
        serde_json::from_str(&content).unwrap_or_else(|error| {
            warn!(path = %path.display(), %error, "timer progress corrupt; starting a new cycle");
            Self::default()
        })
    }

    pub fn load() -> Self {
        match Self::path() {
            Ok(path) => Self::load_from(&path),
            Err(error) => {
                warn!(%error, "timer progress location unavailable");
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<(), CacheError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| CacheError::WriteFailed {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self) -> Result<(), CoreError> {
        self.save_to(&Self::path()?)?;
        Ok(())
    }
}
