//! autodev configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::domain::RepoRef;
use crate::hub::HubConfig;
use crate::periodic::PeriodicConfig;
use crate::queue::QueueConfig;
use crate::service::ServiceConfig;

/// Main autodev configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Task queue and worker pool
    pub queue: QueueConfig,

    /// Observer hub
    pub hub: HubConfig,

    /// Daily and hourly triggers
    pub periodic: PeriodicConfig,

    /// Service lifecycle and feature toggles
    pub service: ServiceConfig,

    /// Activity log location
    pub activity: ActivityConfig,

    /// Repositories covered by the daily trigger
    pub repositories: Vec<RepoRef>,
}

impl Config {
    /// Reject settings the service cannot run with
    pub fn validate(&self) -> Result<()> {
        let queue = &self.queue;
        if queue.workers == 0 {
            bail!("queue.workers must be at least 1");
        }
        if queue.workers > queue.max_workers {
            bail!(
                "queue.workers ({}) exceeds queue.max-workers ({})",
                queue.workers,
                queue.max_workers
            );
        }
        if queue.max_attempts == 0 {
            bail!("queue.max-attempts must be at least 1");
        }
        if queue.poll_interval_ms == 0 {
            bail!("queue.poll-interval-ms must be greater than 0");
        }
        if queue.retry_priority_step < 1 {
            bail!(
                "queue.retry-priority-step must be at least 1, got {}",
                queue.retry_priority_step
            );
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    ///
    /// Explicit path, then `./.autodev.yml`, then
    /// `~/.config/autodev/autodev.yml`, then defaults. Only an explicit path
    /// that fails to load is an error.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        let local_config = PathBuf::from(".autodev.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("autodev").join("autodev.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config")
    }
}

/// Activity log location
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityConfig {
    /// Directory holding activity.jsonl
    #[serde(rename = "log-dir", skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

impl ActivityConfig {
    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("autodev")
                .join("activity")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskType;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.queue.workers, 3);
        assert_eq!(config.queue.max_attempts, 3);
        assert!(config.periodic.enabled);
        assert!(config.repositories.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_yaml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
log-level: debug
queue:
  workers: 5
  retry-delay-ms: 10
periodic:
  enabled: false
service:
  features:
    stale-management: false
repositories:
  - id: 7
    owner-id: 1
    name: acme/widgets
"#
        )
        .unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.queue.workers, 5);
        assert_eq!(config.queue.retry_delay_ms, 10);
        assert_eq!(config.queue.max_workers, 10);
        assert!(!config.periodic.enabled);
        assert!(!config.service.features.is_enabled(TaskType::StaleManagement));
        assert!(config.service.features.is_enabled(TaskType::IssueTriage));
        assert_eq!(config.repositories, vec![RepoRef::new(7, 1, "acme/widgets")]);
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("nope.yml"))).is_err());
    }

    #[test]
    fn test_malformed_yaml_is_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "queue: [not, a, map]").unwrap();
        assert!(Config::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_worker_counts() {
        let mut config = Config::default();
        config.queue.workers = 0;
        assert!(config.validate().is_err());

        config.queue.workers = 11;
        assert!(config.validate().is_err());

        config.queue.workers = 10;
        assert!(config.validate().is_ok());

        config.queue.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_positive_retry_step() {
        let mut config = Config::default();
        for step in [0, -1] {
            config.queue.retry_priority_step = step;
            let err = config.validate().unwrap_err();
            assert!(err.to_string().contains("retry-priority-step"));
        }

        config.queue.retry_priority_step = 2;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_round_trip_keeps_kebab_keys() {
        let yaml = Config::default().to_yaml().unwrap();
        assert!(yaml.contains("max-workers: 10"));
        assert!(yaml.contains("workers: 3"));
        let back: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back.queue.workers, 3);
    }
}
