use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// SQLite file for the operation log. In-memory when absent.
    pub operation_log: Option<PathBuf>,
    /// Window for pruning rolled-back records after each recorded operation.
    /// Active operations are never pruned. `None` keeps everything.
    pub max_operations: Option<usize>,
    pub register_curated: bool,
    pub auto_register: bool,
    /// `tracing_subscriber::EnvFilter` directive.
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            operation_log: None,
            max_operations: None,
            register_curated: true,
            auto_register: true,
            log_filter: "info".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, EngineError> {
        let config: EngineConfig =
            toml::from_str(content).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    fn validate(&self) -> Result<(), EngineError> {
        if self.max_operations == Some(0) {
            return Err(EngineError::Config("maxOperations must be at least 1".into()));
        }
        if self.log_filter.trim().is_empty() {
            return Err(EngineError::Config("logFilter cannot be empty".into()));
        }
        Ok(())
    }
}
