//! Cleaner configuration (YAML).
//!
//! ```yaml
//! ttl: 10ms
//! thread_name: resource-cleaner
//! keep_thread_alive: false
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::CleanerError;

pub const DEFAULT_TTL: Duration = Duration::from_secs(1);
pub const DEFAULT_THREAD_NAME: &str = "lazy-cleaner";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanerConfig {
    /// How long an idle worker waits for a notification before checking
    /// whether it may stop.
    #[serde(with = "humantime_serde")]
    pub ttl: Duration,

    pub thread_name: String,

    /// Worker stack size in bytes; platform default when absent.
    pub stack_size: Option<usize>,

    pub keep_thread_alive: bool,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            stack_size: None,
            keep_thread_alive: false,
        }
    }
}

impl CleanerConfig {
    pub fn from_yaml_str(raw: &str) -> Result<Self, CleanerError> {
        let cfg: Self = serde_yaml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, CleanerError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| CleanerError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), CleanerError> {
        if self.ttl.is_zero() {
            return Err(CleanerError::InvalidConfig("ttl must be greater than zero".into()));
        }
        if self.thread_name.trim().is_empty() {
            return Err(CleanerError::InvalidConfig("thread_name must not be empty".into()));
        }
        if self.thread_name.contains('\0') {
            return Err(CleanerError::InvalidConfig("thread_name must not contain NUL bytes".into()));
        }
        if self.stack_size == Some(0) {
            return Err(CleanerError::InvalidConfig("stack_size must be greater than zero".into()));
        }
        Ok(())
    }
}
