use std::time::Duration;

use wayfarer_config::{BrowserConfig, ExecutorConfig, WayfarerConfig};

/// Task-level retry budget and recovery timings.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries per task after the first try.
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Bound on the reload triggered by a timeout.
    pub reload_timeout: Duration,
    /// Extra pause after that reload.
    pub reload_delay: Duration,
    pub plan_retry_delay: Duration,
}

impl RetryPolicy {
    pub fn new(executor: &ExecutorConfig, browser: &BrowserConfig) -> Self {
        Self {
            max_retries: executor.max_retries,
            retry_delay: Duration::from_millis(executor.retry_delay_ms),
            reload_timeout: Duration::from_millis(browser.navigation_timeout_ms),
            reload_delay: Duration::from_millis(executor.reload_delay_ms),
            plan_retry_delay: Duration::from_millis(executor.plan_retry_delay_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&WayfarerConfig::default())
    }
}

impl From<&WayfarerConfig> for RetryPolicy {
    fn from(config: &WayfarerConfig) -> Self {
        Self::new(&config.executor, &config.browser)
    }
}

/// Per-run plan behaviour for [`Executor::execute_plan`](crate::Executor::execute_plan).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanOptions {
    pub stop_on_error: bool,
    pub retry_full_plan: bool,
    pub max_plan_attempts: u32,
}

impl From<&ExecutorConfig> for PlanOptions {
    fn from(config: &ExecutorConfig) -> Self {
        Self {
            stop_on_error: config.stop_on_error,
            retry_full_plan: config.retry_full_plan,
            max_plan_attempts: config.max_plan_attempts.max(1),
        }
    }
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self::from(&ExecutorConfig::default())
    }
}

/// Failures whose text carries this signature trigger a page reload before
/// the next retry.
pub fn is_timeout_error(error: &str) -> bool {
    error.to_lowercase().contains("timeout")
}
