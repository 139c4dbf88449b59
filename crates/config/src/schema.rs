/// Config schema: browser launch, executor retry policy, replay pacing, output paths.
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WayfarerConfig {
    pub browser: BrowserConfig,
    pub executor: ExecutorConfig,
    pub replay: ReplayConfig,
    pub paths: PathsConfig,
}

/// Browser launch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Whether to run in headless mode.
    pub headless: bool,
    /// Path to Chrome/Chromium binary (auto-detected if not set).
    pub chrome_path: Option<String>,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Device scale factor for HiDPI displays.
    pub device_scale_factor: f64,
    /// Default navigation timeout in milliseconds.
    pub navigation_timeout_ms: u64,
    /// Default element wait timeout in milliseconds.
    pub element_timeout_ms: u64,
    /// User agent string (Chrome default if not set).
    pub user_agent: Option<String>,
    /// Additional Chrome arguments.
    pub chrome_args: Vec<String>,
    /// Allowed domains for navigation (empty = all allowed).
    pub allowed_domains: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            chrome_path: None,
            viewport_width: 1920,
            viewport_height: 1080,
            device_scale_factor: 1.0,
            navigation_timeout_ms: 30_000,
            element_timeout_ms: 10_000,
            user_agent: None,
            chrome_args: Vec::new(),
            allowed_domains: Vec::new(),
        }
    }
}

/// Task- and plan-level retry policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Retries per task after the first attempt.
    pub max_retries: u32,
    /// Full passes over the plan before giving up.
    pub max_plan_attempts: u32,
    pub retry_delay_ms: u64,
    /// Extra pause after reloading the page on a timeout-style failure.
    pub reload_delay_ms: u64,
    pub plan_retry_delay_ms: u64,
    pub stop_on_error: bool,
    pub retry_full_plan: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_plan_attempts: 3,
            retry_delay_ms: 1_000,
            reload_delay_ms: 1_000,
            plan_retry_delay_ms: 2_000,
            stop_on_error: true,
            retry_full_plan: true,
        }
    }
}

/// Replay pacing. Timeouts are independent of `speed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub speed: f64,
    pub base_delay_ms: u64,
    pub stop_on_error: bool,
    pub navigation_timeout_ms: u64,
    pub element_timeout_ms: u64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            base_delay_ms: 500,
            stop_on_error: true,
            navigation_timeout_ms: 30_000,
            element_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub sessions_dir: PathBuf,
    pub screenshots_dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sessions_dir: PathBuf::from("logs"),
            screenshots_dir: PathBuf::from("screenshots"),
            output_dir: PathBuf::from("output"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = WayfarerConfig::default();
        assert_eq!(cfg.executor.max_retries, 3);
        assert_eq!(cfg.executor.max_plan_attempts, 3);
        assert_eq!(cfg.executor.plan_retry_delay_ms, 2_000);
        assert!(cfg.executor.stop_on_error);
        assert_eq!(cfg.replay.base_delay_ms, 500);
        assert_eq!(cfg.paths.sessions_dir, PathBuf::from("logs"));
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let cfg: WayfarerConfig =
            serde_json::from_str(r#"{"executor":{"max_retries":1},"replay":{"speed":2.5}}"#)
                .unwrap();
        assert_eq!(cfg.executor.max_retries, 1);
        assert_eq!(cfg.executor.max_plan_attempts, 3);
        assert!((cfg.replay.speed - 2.5).abs() < f64::EPSILON);
        assert_eq!(cfg.browser.viewport_width, 1920);
    }
}
