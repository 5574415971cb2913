//! Layered configuration: defaults, then a TOML file, then `JSBOX_*`
//! environment variables. Command-line flags are applied by the caller last.
//!
//! ```toml
//! [executor]
//! timeout_ms = 2000
//! worker_program = "/usr/local/bin/jsbox-worker"
//!
//! [tools]
//! enableCodeInterpreterTool = true
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sandbox::{ExecutorConfig, WorkerCommand, DEFAULT_TIMEOUT_MS};
use crate::tool::ToolSettings;

pub const ENV_TIMEOUT_MS: &str = "JSBOX_TIMEOUT_MS";
pub const ENV_WORKER: &str = "JSBOX_WORKER";
pub const ENV_WORKER_ARGS: &str = "JSBOX_WORKER_ARGS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorSettings {
    pub timeout_ms: u64,
    /// Worker executable. Unset means the caller picks one.
    pub worker_program: Option<PathBuf>,
    pub worker_args: Vec<String>,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            worker_program: None,
            worker_args: Vec::new(),
        }
    }
}

impl ExecutorSettings {
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            timeout_ms: self.timeout_ms,
        }
    }

    /// The configured worker, if a program was set.
    pub fn worker_command(&self) -> Option<WorkerCommand> {
        self.worker_program
            .as_ref()
            .map(|program| WorkerCommand::new(program).args(self.worker_args.iter().cloned()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsboxConfig {
    pub executor: ExecutorSettings,
    pub tools: ToolSettings,
}

impl JsboxConfig {
    /// Defaults, overlaid by `path` when given, then by the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|var| std::env::var(var).ok())
    }

    /// Overlay values from `lookup`, which maps a variable name to its value.
    pub fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(value) = lookup(ENV_TIMEOUT_MS) {
            self.executor.timeout_ms = value.trim().parse().map_err(|_| ConfigError::Env {
                var: ENV_TIMEOUT_MS,
                value: value.clone(),
            })?;
        }
        if let Some(value) = lookup(ENV_WORKER).filter(|v| !v.is_empty()) {
            self.executor.worker_program = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup(ENV_WORKER_ARGS) {
            self.executor.worker_args = value.split_whitespace().map(str::to_string).collect();
        }
        Ok(())
    }
}
