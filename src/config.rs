use crate::error::{KanbanError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_SYNC_INTERVAL: &str = "KANBAN_SYNC_INTERVAL_SECS";
pub const ENV_DATA_DIR: &str = "KANBAN_DATA_DIR";
pub const ENV_LOG: &str = "KANBAN_LOG";

/// Runtime settings for a board session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KanbanConfig {
    /// Seconds between periodic sync attempts
    pub sync_interval_secs: u64,
    /// Where file-backed storage keeps its documents
    pub data_dir: PathBuf,
    /// Connectivity assumed until the first change is reported
    pub start_online: bool,
    /// `tracing` filter directive used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Maximum number of undo steps kept; unbounded when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_limit: Option<usize>,
}

impl Default for KanbanConfig {
    fn default() -> Self {
        Self {
            sync_interval_secs: 30,
            data_dir: PathBuf::from(".kanban"),
            start_online: true,
            log_filter: "info".to_string(),
            history_limit: None,
        }
    }
}

impl KanbanConfig {
    /// Loads a TOML file, then applies environment overrides
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            KanbanError::ConfigError(format!("failed to read {}: {e}", path.display()))
        })?;
        let mut config = Self::parse(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Like [`Self::load`], but falls back to defaults when the file is missing
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| KanbanError::ConfigError(format!("failed to parse config: {e}")))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| KanbanError::ConfigError(format!("failed to render config: {e}")))
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup. Unparseable values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(secs) = lookup(ENV_SYNC_INTERVAL).and_then(|v| v.trim().parse().ok()) {
            self.sync_interval_secs = secs;
        }
        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(filter) = lookup(ENV_LOG).filter(|v| !v.trim().is_empty()) {
            self.log_filter = filter;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sync_interval_secs == 0 {
            return Err(KanbanError::ConfigError(
                "sync_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.history_limit == Some(0) {
            return Err(KanbanError::ConfigError(
                "history_limit must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = KanbanConfig::default();
        assert_eq!(config.sync_interval(), Duration::from_secs(30));
        assert_eq!(config.data_dir, PathBuf::from(".kanban"));
        assert!(config.start_online);
        assert!(config.history_limit.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = KanbanConfig::parse("sync_interval_secs = 5\nhistory_limit = 50\n").unwrap();
        assert_eq!(config.sync_interval_secs, 5);
        assert_eq!(config.history_limit, Some(50));
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(KanbanConfig::parse("sync_interval_secs = \"soon\"").is_err());

        let zero = KanbanConfig {
            sync_interval_secs: 0,
            ..KanbanConfig::default()
        };
        assert!(matches!(zero.validate(), Err(KanbanError::ConfigError(_))));

        let no_history = KanbanConfig {
            history_limit: Some(0),
            ..KanbanConfig::default()
        };
        assert!(no_history.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_SYNC_INTERVAL, "12"),
            (ENV_DATA_DIR, "/tmp/board"),
            (ENV_LOG, "kanban_sync=debug"),
        ]
        .into_iter()
        .collect();

        let mut config = KanbanConfig::default();
        config.apply_overrides_from(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.sync_interval_secs, 12);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/board"));
        assert_eq!(config.log_filter, "kanban_sync=debug");
    }

    #[test]
    fn test_bad_override_is_ignored() {
        let mut config = KanbanConfig::default();
        config.apply_overrides_from(|key| (key == ENV_SYNC_INTERVAL).then(|| "often".to_string()));
        assert_eq!(config.sync_interval_secs, 30);
    }

    #[test]
    fn test_file_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("kanban.toml");
        let config = KanbanConfig {
            sync_interval_secs: 45,
            history_limit: Some(20),
            ..KanbanConfig::default()
        };
        std::fs::write(&path, config.to_toml().unwrap()).unwrap();

        let loaded = KanbanConfig::parse(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("absent.toml");
        assert!(KanbanConfig::load(&path).is_err());
        assert!(KanbanConfig::load_or_default(&path).is_ok());
    }
}
