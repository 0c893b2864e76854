//! Recently used task labels, kept on disk to preselect a task at startup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::data_dir;
use crate::error::{CacheError, ConfigError, CoreError};

pub const MAX_RECENT_TASKS: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentTasks {
    /// Most recent first, no duplicates.
    #[serde(default)]
    pub tasks: Vec<String>,
    #[serde(default)]
    pub selected: Option<String>,
}

impl RecentTasks {
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("recent_tasks.json"))
    }

    /// Read the cache. A missing or unreadable file yields an empty cache.
    pub fn load_from(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(error) => {
                warn!(path = %path.display(), %error, "recent task cache unreadable; starting empty");
                return Self::default();
            }
        };
        match serde_json::from_str::<RecentTasks>(&content) {
            Ok(mut cache) => {
                cache.normalize();
                cache
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "recent task cache corrupt; starting empty");
                Self::default()
            }
        }
    }

    pub fn load() -> Self {
        match Self::path() {
            Ok(path) => Self::load_from(&path),
            Err(error) => {
                warn!(%error, "recent task cache location unavailable");
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

    /// Move `task` to the front and make it the selection.
    pub fn remember(&mut self, task: &str) {
        let task = task.trim();
        if task.is_empty() {
            return;
        }
        self.tasks.retain(|t| t != task);
        self.tasks.insert(0, task.to_string());
        self.tasks.truncate(MAX_RECENT_TASKS);
        self.selected = Some(task.to_string());
    }

    /// Task to preselect: the last selection, else the most recent one.
    pub fn preselect(&self) -> Option<&str> {
        self.selected
            .as_deref()
            .or_else(|| self.tasks.first().map(String::as_str))
    }

    fn normalize(&mut self) {
        let mut seen = Vec::with_capacity(self.tasks.len());
        for task in self.tasks.drain(..) {
            let task = task.trim().to_string();
            if !task.is_empty() && !seen.contains(&task) {
                seen.push(task);
            }
        }
        seen.truncate(MAX_RECENT_TASKS);
        self.tasks = seen;
        self.selected = self
            .selected
            .take()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remember_dedups_and_caps() {
        let mut cache = RecentTasks::default();
        for i in 0..12 {
            cache.remember(&format!("task {i}"));
        }
        cache.remember("task 5");
        assert_eq!(cache.tasks.len(), MAX_RECENT_TASKS);
        assert_eq!(cache.tasks[0], "task 5");
        assert_eq!(cache.tasks.iter().filter(|t| *t == "task 5").count(), 1);
        assert_eq!(cache.preselect(), Some("task 5"));
    }

    #[test]
    fn blank_task_is_ignored() {
        let mut cache = RecentTasks::default();
        cache.remember("   ");
        assert!(cache.tasks.is_empty());
        assert_eq!(cache.preselect(), None);
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recent_tasks.json");
        let mut cache = RecentTasks::default();
        cache.remember("Write spec");
        cache.remember("Review");
        cache.save_to(&path).unwrap();

        let loaded = RecentTasks::load_from(&path);
        assert_eq!(loaded, cache);
        assert_eq!(loaded.preselect(), Some("Review"));
    }

    #[test]
    fn corrupt_file_falls_back_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recent_tasks.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(RecentTasks::load_from(&path), RecentTasks::default());
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            RecentTasks::load_from(&dir.path().join("absent.json")),
            RecentTasks::default()
        );
    }

    #[test]
    fn preselect_falls_back_to_most_recent() {
        let cache = RecentTasks {
            tasks: vec!["Inbox".into(), "Deep work".into()],
            selected: None,
        };
        assert_eq!(cache.preselect(), Some("Inbox"));
    }
}
