//! Engine configuration.

use anyhow::Result;
use std::time::Duration;

/// Execution engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Guard against runaway definitions; a run exceeding this many state
    /// transitions fails with a step-limit error. `None` disables the guard
    /// and leaves termination to the definition's author.
    pub max_steps: Option<u64>,

    /// Deadline applied to task invocations that do not set their own.
    pub default_task_timeout: Option<Duration>,

    /// Maximum runs executing at once through the run registry.
    pub max_concurrent_runs: usize,
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let max_steps = std::env::var("FLOWSTATE_MAX_STEPS")
            .ok()
            .and_then(|s| s.parse().ok());

        let default_task_timeout = std::env::var("FLOWSTATE_TASK_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs);

        let max_concurrent_runs: usize = std::env::var("FLOWSTATE_MAX_CONCURRENT_RUNS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(16);

        Ok(Self {
            max_steps,
            default_task_timeout,
            max_concurrent_runs,
        })
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_steps: None,
            default_task_timeout: None,
            max_concurrent_runs: 16,
        }
    }
}
