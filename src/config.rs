//! Runtime configuration.
//!
//! # Configuration Precedence
//!
//! Settings are resolved in this order (highest priority first):
//!
//! 1. **Programmatic**: values set with the `with_*` methods
//! 2. **Environment variables**: values from `SAGAFLOW_*` env vars
//! 3. **Config file**: values loaded from a TOML file (requires the
//!    `config-file` feature)
//! 4. **Defaults**: [`RuntimeConfig::default()`]
//!
//! # Supported Environment Variables
//!
//! | Variable | Type | Maps to |
//! |----------|------|---------|
//! | `SAGAFLOW_DEFAULT_BUFFER_LIMIT` | `usize` | `default_buffer_limit` |
//! | `SAGAFLOW_LOG_CANCELLATIONS` | `bool` | `log_cancellations` |
//! | `SAGAFLOW_TASK_NAME_PREFIX` | `String` | `task_name_prefix` |
//!
//! Observer hooks cannot come from the environment; they live in
//! [`SagaOptions`].

use core::fmt;
use std::rc::Rc;

use serde::Deserialize;

use crate::channel::DEFAULT_LIMIT;
use crate::error::Error;
use crate::monitor::{Logger, SagaMonitor};

/// Environment variable name for the default buffer limit.
pub const ENV_DEFAULT_BUFFER_LIMIT: &str = "SAGAFLOW_DEFAULT_BUFFER_LIMIT";
/// Environment variable name for cancellation logging.
pub const ENV_LOG_CANCELLATIONS: &str = "SAGAFLOW_LOG_CANCELLATIONS";
/// Environment variable name for the task name prefix.
pub const ENV_TASK_NAME_PREFIX: &str = "SAGAFLOW_TASK_NAME_PREFIX";

/// Error loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable held an unparseable value.
    #[error("invalid value for {var}: expected {expected}, got {value:?}")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
        /// What was expected.
        expected: &'static str,
    },
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// The config file was not valid TOML for [`RuntimeConfig`].
    #[error("failed to parse TOML config: {0}")]
    Parse(String),
}

/// Tunables of a [`Runtime`](crate::processor::Runtime).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Capacity of buffers the runtime creates without an explicit size.
    pub default_buffer_limit: usize,
    /// Report task cancellations through the logger at info level.
    pub log_cancellations: bool,
    /// Prepended to every task name.
    pub task_name_prefix: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            default_buffer_limit: DEFAULT_LIMIT,
            log_cancellations: false,
            task_name_prefix: String::new(),
        }
    }
}

impl RuntimeConfig {
    /// Sets the default buffer limit.
    #[must_use]
    pub const fn with_default_buffer_limit(mut self, limit: usize) -> Self {
        self.default_buffer_limit = limit;
        self
    }

    /// Enables or disables cancellation logging.
    #[must_use]
    pub const fn with_log_cancellations(mut self, enabled: bool) -> Self {
        self.log_cancellations = enabled;
        self
    }

    /// Sets the task name prefix.
    #[must_use]
    pub fn with_task_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.task_name_prefix = prefix.into();
        self
    }

    /// Defaults overridden by the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        apply_env_overrides(&mut config)?;
        Ok(config)
    }

    /// Parses TOML, then applies the environment on top.
    ///
    /// ```toml
    /// default_buffer_limit = 32
    /// log_cancellations = true
    /// task_name_prefix = "checkout/"
    /// ```
    #[cfg(feature = "config-file")]
    pub fn from_toml_str(toml_str: &str) -> Result<Self, ConfigError> {
        let mut config: Self =
            toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
        apply_env_overrides(&mut config)?;
        Ok(config)
    }

    /// Reads a TOML file, then applies the environment on top.
    #[cfg(feature = "config-file")]
    pub fn from_toml_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}

/// Applies environment variable overrides to `config`.
///
/// Only variables that are set are applied.
pub fn apply_env_overrides(config: &mut RuntimeConfig) -> Result<(), ConfigError> {
    if let Some(val) = read_env(ENV_DEFAULT_BUFFER_LIMIT) {
        config.default_buffer_limit = parse_usize(ENV_DEFAULT_BUFFER_LIMIT, &val)?;
    }
    if let Some(val) = read_env(ENV_LOG_CANCELLATIONS) {
        config.log_cancellations = parse_bool(ENV_LOG_CANCELLATIONS, &val)?;
    }
    if let Some(val) = read_env(ENV_TASK_NAME_PREFIX) {
        config.task_name_prefix = val;
    }
    Ok(())
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_usize(var: &'static str, val: &str) -> Result<usize, ConfigError> {
    val.trim().parse::<usize>().map_err(|_| ConfigError::InvalidEnv {
        var,
        value: val.to_owned(),
        expected: "unsigned integer",
    })
}

fn parse_bool(var: &'static str, val: &str) -> Result<bool, ConfigError> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv {
            var,
            value: val.to_owned(),
            expected: "bool (true/false/1/0/yes/no)",
        }),
    }
}

/// Terminal error handler for root tasks.
pub type ErrorHandler = Rc<dyn Fn(&Error)>;

/// Observer hooks of a runtime. Every field is optional.
#[derive(Clone, Default)]
pub struct SagaOptions {
    /// Effect lifecycle observer.
    pub monitor: Option<Rc<dyn SagaMonitor>>,
    /// Diagnostic sink; defaults to [`TracingLogger`](crate::monitor::TracingLogger).
    pub logger: Option<Rc<dyn Logger>>,
    /// Receives the error of a root task that failed.
    pub on_error: Option<ErrorHandler>,
}

impl SagaOptions {
    /// Sets the monitor.
    #[must_use]
    pub fn with_monitor(mut self, monitor: Rc<dyn SagaMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    /// Sets the logger.
    #[must_use]
    pub fn with_logger(mut self, logger: Rc<dyn Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Sets the terminal error handler.
    #[must_use]
    pub fn with_on_error(mut self, handler: impl Fn(&Error) + 'static) -> Self {
        self.on_error = Some(Rc::new(handler));
        self
    }
}

impl fmt::Debug for SagaOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SagaOptions")
            .field("monitor", &self.monitor.is_some())
            .field("logger", &self.logger.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
