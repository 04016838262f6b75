//! Compiler and runtime configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Flattening compiler settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Deepest allowed group nesting; a root-level group has depth 1
    pub max_depth: usize,
    /// Emit info diagnostics for leaves unreachable from the default state
    pub report_unreachable: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_depth: 16,
            report_unreachable: true,
        }
    }
}

impl CompilerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(Error::Config("max_depth must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Per-tick scheduling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Below this many live instances a tick runs on the calling thread
    pub parallel_threshold: usize,
    /// Size of a dedicated worker pool; `None` uses rayon's global pool
    pub worker_threads: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            parallel_threshold: 64,
            worker_threads: None,
        }
    }
}

impl RuntimeConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == Some(0) {
            return Err(Error::Config("worker_threads must be at least 1".to_string()));
        }
        Ok(())
    }
}
