//! Configuration management for autoclock
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{AutoclockError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for autoclock
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote time-tracking service settings
    #[serde(default)]
    pub remote: RemoteConfig,
    /// Presence polling and resume policy
    #[serde(default)]
    pub presence: PresenceConfig,
    /// Session store location and retention
    #[serde(default)]
    pub storage: StorageConfig,
    /// Optional Jira work-log integration
    #[serde(default)]
    pub jira: Option<JiraConfig>,
    /// Logging output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote time-tracking service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL of the time-tracking REST API
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Workspace to track time in; resolved from the user's active workspace when absent
    #[serde(default)]
    pub workspace_id: Option<String>,

    /// User owning the timers; resolved from the API token when absent
    #[serde(default)]
    pub user_id: Option<String>,

    /// Upper bound on any single remote call (seconds)
    #[serde(default = "default_remote_timeout")]
    pub timeout_seconds: u64,
}

fn default_api_base() -> String {
    "https://api.clockify.me/api/v1".to_string()
}

fn default_remote_timeout() -> u64 {
    10
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            workspace_id: None,
            user_id: None,
            timeout_seconds: default_remote_timeout(),
        }
    }
}

impl RemoteConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Whether the lock-state axis should be probed at startup
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LockDetection {
    /// Probe the platform and use the lock source when one exists
    #[default]
    Auto,
    /// Only the idle axis drives the controller
    Disabled,
}

/// Presence polling and resume policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Idle duration at which the machine counts as inactive (seconds)
    #[serde(default = "default_idle_threshold")]
    pub idle_threshold_seconds: u64,

    /// Idle poll interval (seconds)
    #[serde(default = "default_idle_poll")]
    pub idle_poll_seconds: u64,

    /// Lock-state poll interval (seconds)
    #[serde(default = "default_lock_poll")]
    pub lock_poll_seconds: u64,

    /// How recently an auto-stopped session must have ended to be resumed (minutes)
    #[serde(default = "default_resume_window")]
    pub resume_window_minutes: i64,

    /// Minimum time between two resumes (seconds)
    #[serde(default = "default_resume_cooldown")]
    pub resume_cooldown_seconds: i64,

    /// Pause before re-reading remote state after activity returns (milliseconds)
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,

    /// Shortest session that is worth a ticket work-log entry (seconds)
    #[serde(default = "default_min_ticket_log")]
    pub min_ticket_log_seconds: i64,

    /// Lock-state source selection
    #[serde(default)]
    pub lock_detection: LockDetection,
}

fn default_idle_threshold() -> u64 {
    300
}

fn default_idle_poll() -> u64 {
    5
}

fn default_lock_poll() -> u64 {
    3
}

fn default_resume_window() -> i64 {
    120
}

fn default_resume_cooldown() -> i64 {
    10
}

fn default_settle_delay() -> u64 {
    800
}

fn default_min_ticket_log() -> i64 {
    60
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            idle_threshold_seconds: default_idle_threshold(),
            idle_poll_seconds: default_idle_poll(),
            lock_poll_seconds: default_lock_poll(),
            resume_window_minutes: default_resume_window(),
            resume_cooldown_seconds: default_resume_cooldown(),
            settle_delay_ms: default_settle_delay(),
            min_ticket_log_seconds: default_min_ticket_log(),
            lock_detection: LockDetection::default(),
        }
    }
}

/// Session store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file; the platform data directory is used when absent
    #[serde(default)]
    pub db_path: Option<PathBuf>,

    /// Sessions older than this are purged when the watcher starts (days)
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
}

fn default_retention_days() -> i64 {
    5
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            retention_days: default_retention_days(),
        }
    }
}

/// Jira work-log configuration
///
/// The API token itself lives in the OS keyring, see
/// [`crate::ticket::credentials`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraConfig {
    /// Jira site, e.g. `https://example.atlassian.net`
    pub base_url: String,

    /// Account email used for basic auth
    #[serde(default)]
    pub email: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json_format: bool,

    /// Optional file that receives a copy of every log line
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

fn default_log_level() -> String {
    "autoclock=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error: defaults are used and a warning is
    /// logged.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| AutoclockError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| AutoclockError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(api_base) = std::env::var("AUTOCLOCK_API_BASE") {
            self.remote.api_base = api_base;
        }

        if let Ok(workspace_id) = std::env::var("AUTOCLOCK_WORKSPACE_ID") {
            self.remote.workspace_id = Some(workspace_id);
        }

        if let Ok(user_id) = std::env::var("AUTOCLOCK_USER_ID") {
            self.remote.user_id = Some(user_id);
        }

        if let Ok(db_path) = std::env::var("AUTOCLOCK_DB") {
            self.storage.db_path = Some(PathBuf::from(db_path));
        }

        if let Ok(level) = std::env::var("AUTOCLOCK_LOG_LEVEL") {
            tracing::debug!(level = %level, "Env override: AUTOCLOCK_LOG_LEVEL");
            self.logging.level = level;
        }

        if let Ok(json_logs) = std::env::var("AUTOCLOCK_JSON_LOGS") {
            match json_logs.parse::<bool>() {
                Ok(v) => self.logging.json_format = v,
                Err(_) => tracing::warn!("Invalid value for AUTOCLOCK_JSON_LOGS: {}", json_logs),
            }
        }

        if let Ok(threshold) = std::env::var("AUTOCLOCK_IDLE_THRESHOLD") {
            match threshold.parse::<u64>() {
                Ok(v) => {
                    self.presence.idle_threshold_seconds = v;
                    tracing::debug!(idle_threshold = v, "Env override: AUTOCLOCK_IDLE_THRESHOLD");
                }
                Err(_) => tracing::warn!("Invalid value for AUTOCLOCK_IDLE_THRESHOLD: {}", threshold),
            }
        }

        if let Ok(window) = std::env::var("AUTOCLOCK_RESUME_WINDOW_MINUTES") {
            match window.parse::<i64>() {
                Ok(v) => self.presence.resume_window_minutes = v,
                Err(_) => {
                    tracing::warn!("Invalid value for AUTOCLOCK_RESUME_WINDOW_MINUTES: {}", window)
                }
            }
        }

        if let Ok(mode) = std::env::var("AUTOCLOCK_LOCK_DETECTION") {
            self.presence.lock_detection = match mode.to_lowercase().as_str() {
                "auto" => LockDetection::Auto,
                "disabled" => LockDetection::Disabled,
                _ => {
                    tracing::warn!("Invalid lock detection mode: {}, using default", mode);
                    LockDetection::default()
                }
            };
        }

        if let Ok(base_url) = std::env::var("AUTOCLOCK_JIRA_URL") {
            let email = std::env::var("AUTOCLOCK_JIRA_EMAIL").ok();
            match self.jira.as_mut() {
                Some(jira) => {
                    jira.base_url = base_url;
                    if let Some(email) = email {
                        jira.email = email;
                    }
                }
                None => {
                    self.jira = Some(JiraConfig {
                        base_url,
                        email: email.unwrap_or_default(),
                    });
                }
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(db) = &cli.db {
            self.storage.db_path = Some(db.clone());
        }
        if cli.verbose {
            self.logging.level = "autoclock=debug".to_string();
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.remote.api_base).map_err(|e| {
            AutoclockError::Config(format!("remote.api_base is not a valid URL: {}", e))
        })?;

        if self.remote.timeout_seconds == 0 {
            return Err(AutoclockError::Config(
                "remote.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.presence.idle_threshold_seconds == 0 {
            return Err(AutoclockError::Config(
                "presence.idle_threshold_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.presence.idle_poll_seconds == 0 || self.presence.lock_poll_seconds == 0 {
            return Err(AutoclockError::Config(
                "presence poll intervals must be greater than 0".to_string(),
            )
            .into());
        }

        if self.presence.resume_window_minutes <= 0 {
            return Err(AutoclockError::Config(
                "presence.resume_window_minutes must be greater than 0".to_string(),
            )
            .into());
        }

        if self.presence.resume_cooldown_seconds < 0 || self.presence.min_ticket_log_seconds < 0 {
            return Err(AutoclockError::Config(
                "presence durations cannot be negative".to_string(),
            )
            .into());
        }

        if self.storage.retention_days <= 0 {
            return Err(AutoclockError::Config(
                "storage.retention_days must be greater than 0".to_string(),
            )
            .into());
        }

        if let Some(jira) = &self.jira {
            url::Url::parse(&jira.base_url).map_err(|e| {
                AutoclockError::Config(format!("jira.base_url is not a valid URL: {}", e))
            })?;
            if jira.email.trim().is_empty() {
                return Err(AutoclockError::Config(
                    "jira.email is required when jira is configured".to_string(),
                )
                .into());
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.presence.idle_threshold_seconds, 300);
        assert_eq!(config.presence.idle_poll_seconds, 5);
        assert_eq!(config.presence.lock_poll_seconds, 3);
        assert_eq!(config.presence.resume_window_minutes, 120);
        assert_eq!(config.presence.resume_cooldown_seconds, 10);
        assert_eq!(config.presence.settle_delay_ms, 800);
        assert_eq!(config.storage.retention_days, 5);
        assert!(config.jira.is_none());
    }

    #[test]
    fn test_config_validation_success() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_invalid_api_base() {
        let mut config = Config::default();
        config.remote.api_base = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_poll_interval() {
        let mut config = Config::default();
        config.presence.lock_poll_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_idle_threshold() {
        let mut config = Config::default();
        config.presence.idle_threshold_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_jira_requires_email() {
        let mut config = Config::default();
        config.jira = Some(JiraConfig {
            base_url: "https://example.atlassian.net".to_string(),
            email: String::new(),
        });
        assert!(config.validate().is_err());

        config.jira.as_mut().unwrap().email = "me@example.com".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
remote:
  workspace_id: ws-1
  timeout_seconds: 4
presence:
  idle_threshold_seconds: 600
  lock_detection: disabled
storage:
  retention_days: 14
jira:
  base_url: https://example.atlassian.net
  email: me@example.com
logging:
  json_format: true
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.remote.workspace_id.as_deref(), Some("ws-1"));
        assert_eq!(config.remote.api_base, default_api_base());
        assert_eq!(config.remote.timeout(), Duration::from_secs(4));
        assert_eq!(config.presence.idle_threshold_seconds, 600);
        assert_eq!(config.presence.idle_poll_seconds, 5);
        assert_eq!(config.presence.lock_detection, LockDetection::Disabled);
        assert_eq!(config.storage.retention_days, 14);
        assert!(config.logging.json_format);
        assert!(config.validate().is_ok());
    }

    #[test]
    #[serial]
    fn test_load_nonexistent_file_uses_defaults() {
        let cli = crate::cli::Cli::default();
        let config = Config::load("/nonexistent/autoclock.yaml", &cli).unwrap();
        assert_eq!(config.presence.idle_threshold_seconds, 300);
    }

    #[test]
    #[serial]
    fn test_env_overrides_threshold_and_lock_detection() {
        std::env::set_var("AUTOCLOCK_IDLE_THRESHOLD", "120");
        std::env::set_var("AUTOCLOCK_LOCK_DETECTION", "disabled");

        let cli = crate::cli::Cli::default();
        let config = Config::load("/nonexistent/autoclock.yaml", &cli).unwrap();

        std::env::remove_var("AUTOCLOCK_IDLE_THRESHOLD");
        std::env::remove_var("AUTOCLOCK_LOCK_DETECTION");

        assert_eq!(config.presence.idle_threshold_seconds, 120);
        assert_eq!(config.presence.lock_detection, LockDetection::Disabled);
    }

    #[test]
    #[serial]
    fn test_invalid_env_value_is_ignored() {
        std::env::set_var("AUTOCLOCK_IDLE_THRESHOLD", "soon");
        let cli = crate::cli::Cli::default();
        let config = Config::load("/nonexistent/autoclock.yaml", &cli).unwrap();
        std::env::remove_var("AUTOCLOCK_IDLE_THRESHOLD");

        assert_eq!(config.presence.idle_threshold_seconds, 300);
    }

    #[test]
    #[serial]
    fn test_cli_verbose_raises_log_level() {
        let mut cli = crate::cli::Cli::default();
        cli.verbose = true;
        cli.db = Some(PathBuf::from("/tmp/autoclock-test.db"));
        let config = Config::load("/nonexistent/autoclock.yaml", &cli).unwrap();
        assert_eq!(config.logging.level, "autoclock=debug");
        assert_eq!(
            config.storage.db_path,
            Some(PathBuf::from("/tmp/autoclock-test.db"))
        );
    }
}
