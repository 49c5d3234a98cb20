//! Configuration module for Syncward.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{Priority, SyncKind};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Syncward.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub retry: RetryConfig,
    pub connectivity: ConnectivityConfig,
    pub logging: LoggingConfig,
    pub jobs: Vec<JobConfig>,
}

/// Orchestrator defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Master switch; when false every submission is dropped.
    pub enabled: bool,
    /// Priority used when a submission does not specify one (0-10).
    pub default_priority: u8,
    /// Retries allowed after the first attempt when not specified.
    pub default_max_attempts: u32,
}

/// Backoff settings: `min(base * 2^attempt, max) + random(0..=jitter)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Upper bound of the uniform random jitter added to each delay.
    pub jitter_ms: u64,
}

/// Reachability probe used by the daemon as its online/offline signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
    /// `host:port` the probe opens a TCP connection to.
    pub probe_addr: String,
    /// Seconds between probes.
    pub probe_interval_secs: u64,
    /// Seconds before a probe connection attempt counts as failed.
    pub probe_timeout_secs: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Output format: `pretty` or `json`.
    pub format: String,
}

/// A command the daemon submits periodically as a sync operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    pub kind: SyncKind,
    /// Falls back to `sync.default_priority` when absent.
    #[serde(default)]
    pub priority: Option<Priority>,
    /// Overrides `sync.default_max_attempts` for this job.
    #[serde(default)]
    pub max_attempts: Option<u32>,
    /// Seconds between submissions.
    pub interval_secs: u64,
    /// Program followed by its arguments.
    pub command: Vec<String>,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/syncward/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("syncward")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Section defaults
// ---------------------------------------------------------------------------

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_priority: 5,
            default_max_attempts: 3,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            jitter_ms: 1_000,
        }
    }
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            probe_addr: "1.1.1.1:443".to_string(),
            probe_interval_secs: 15,
            probe_timeout_secs: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"retry.base_delay_ms"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["pretty", "json"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- sync ---
        if self.sync.default_priority > Priority::MAX.value() {
            errors.push(ValidationError {
                field: "sync.default_priority".into(),
                message: format!("must be in range 0..={}", Priority::MAX.value()),
            });
        }

        // --- retry ---
        if self.retry.base_delay_ms == 0 {
            errors.push(ValidationError {
                field: "retry.base_delay_ms".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            errors.push(ValidationError {
                field: "retry.max_delay_ms".into(),
                message: format!(
                    "max_delay_ms ({}) must not be below base_delay_ms ({})",
                    self.retry.max_delay_ms, self.retry.base_delay_ms
                ),
            });
        }

        // --- connectivity ---
        if self.connectivity.probe_addr.trim().is_empty() {
            errors.push(ValidationError {
                field: "connectivity.probe_addr".into(),
                message: "must not be empty".into(),
            });
        }
        if self.connectivity.probe_interval_secs == 0 {
            errors.push(ValidationError {
                field: "connectivity.probe_interval_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.connectivity.probe_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "connectivity.probe_timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError {
                field: "logging.format".into(),
                message: format!(
                    "invalid format '{}'; valid options: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        // --- jobs ---
        for (i, job) in self.jobs.iter().enumerate() {
            if job.command.first().map_or(true, |p| p.trim().is_empty()) {
                errors.push(ValidationError {
                    field: format!("jobs[{i}].command"),
                    message: "must name a program".into(),
                });
            }
            if job.interval_secs == 0 {
                errors.push(ValidationError {
                    field: format!("jobs[{i}].interval_secs"),
                    message: "must be greater than 0".into(),
                });
            }
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust
/// use syncward_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .retry_base_delay_ms(500)
///     .retry_jitter_ms(0)
///     .logging_level("debug")
///     .build();
/// assert_eq!(config.retry.base_delay_ms, 500);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- sync ---

    pub fn sync_enabled(mut self, enabled: bool) -> Self {
        self.config.sync.enabled = enabled;
        self
    }

    pub fn sync_default_priority(mut self, priority: u8) -> Self {
        self.config.sync.default_priority = priority;
        self
    }

    pub fn sync_default_max_attempts(mut self, n: u32) -> Self {
        self.config.sync.default_max_attempts = n;
        self
    }

    // --- retry ---

    pub fn retry_base_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry.base_delay_ms = ms;
        self
    }

    pub fn retry_max_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry.max_delay_ms = ms;
        self
    }

    pub fn retry_jitter_ms(mut self, ms: u64) -> Self {
        self.config.retry.jitter_ms = ms;
        self
    }

    // --- connectivity ---

    pub fn connectivity_probe_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.connectivity.probe_addr = addr.into();
        self
    }

    pub fn connectivity_probe_interval_secs(mut self, seconds: u64) -> Self {
        self.config.connectivity.probe_interval_secs = seconds;
        self
    }

    pub fn connectivity_probe_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.connectivity.probe_timeout_secs = seconds;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // --- jobs ---

    pub fn job(mut self, job: JobConfig) -> Self {
        self.config.jobs.push(job);
        self
    }

    // --- build ---

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }

    /// Build and validate in one step. Returns `Err` with the list of
    /// validation errors if the configuration is invalid.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let config = self.build();
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
