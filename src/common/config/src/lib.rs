//! Configuration management for tessel.
//!
//! Provides runtime configuration for tiling drivers and chunk executors.

use std::path::Path;

use common_error::{TesselError, TesselResult};
use serde::{Deserialize, Serialize};

/// Global tessel configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesselConfig {
    /// Tiling driver configuration.
    pub tiling: TilingConfig,
    /// Chunk execution configuration.
    pub execution: ExecutionConfig,
}

impl TesselConfig {
    /// Parse a configuration from a JSON string.
    ///
    /// Missing sections and fields fall back to their defaults.
    pub fn from_json_str(json: &str) -> TesselResult<Self> {
        serde_json::from_str(json)
            .map_err(|e| TesselError::config(format!("invalid configuration: {e}")))
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> TesselResult<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    /// Replace the tiling section.
    pub fn with_tiling(mut self, tiling: TilingConfig) -> Self {
        self.tiling = tiling;
        self
    }

    /// Replace the execution section.
    pub fn with_execution(mut self, execution: ExecutionConfig) -> Self {
        self.execution = execution;
        self
    }
}

/// Tiling driver configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TilingConfig {
    /// How many times one tiling task may suspend before the driver gives up.
    pub max_suspensions: usize,
}

impl Default for TilingConfig {
    fn default() -> Self {
        Self { max_suspensions: 16 }
    }
}

impl TilingConfig {
    /// Set the suspension bound.
    pub fn with_max_suspensions(mut self, max: usize) -> Self {
        self.max_suspensions = max;
        self
    }
}

/// Chunk execution configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Maximum number of chunk operands executed concurrently.
    pub parallelism: usize,
    /// Extra attempts granted to operands that ask to be retried on failure.
    pub max_task_retries: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            parallelism: num_cpus(),
            max_task_retries: 3,
        }
    }
}

impl ExecutionConfig {
    /// Set the parallelism level. Zero is clamped to one.
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Set the retry budget for retryable operands.
    pub fn with_max_task_retries(mut self, retries: usize) -> Self {
        self.max_task_retries = retries;
        self
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
}
