//! Re-drives a recorded session against a live page.
//!
//! Replay never consults a planner. `navigate`, `click`, `type_text` and `wait`
//! are replayed from their logged params with the configured timeouts;
//! `extract` is skipped; anything else goes through the action registry.

use std::{sync::Arc, time::Duration};

use {
    serde::Serialize,
    serde_json::Value,
    uuid::Uuid,
    wayfarer_actions::{ActionRegistry, ActionResult, Params, Task},
    wayfarer_browser::PageDriver,
    wayfarer_config::ReplayConfig,
};

use crate::{
    error::ReplayError,
    model::{LogEntry, Session},
    store::SessionStore,
};

#[derive(Debug, Clone)]
pub struct ReplayOptions {
    /// Divides `base_delay`. Zero or negative disables the delay.
    pub speed: f64,
    pub base_delay: Duration,
    pub stop_on_error: bool,
    pub navigation_timeout: Duration,
    pub element_timeout: Duration,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self::from(&ReplayConfig::default())
    }
}

impl From<&ReplayConfig> for ReplayOptions {
    fn from(config: &ReplayConfig) -> Self {
        Self {
            speed: config.speed,
            base_delay: Duration::from_millis(config.base_delay_ms),
            stop_on_error: config.stop_on_error,
            navigation_timeout: Duration::from_millis(config.navigation_timeout_ms),
            element_timeout: Duration::from_millis(config.element_timeout_ms),
        }
    }
}

impl ReplayOptions {
    /// Pause between two replayed actions.
    pub fn inter_action_delay(&self) -> Option<Duration> {
        if !self.speed.is_finite() || self.speed <= 0.0 || self.base_delay.is_zero() {
            return None;
        }
        Some(self.base_delay.div_f64(self.speed))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub success: bool,
    pub session_id: Uuid,
    pub total_actions: usize,
    pub successful_actions: usize,
    pub results: Vec<ActionResult>,
}

pub struct Replayer {
    store: SessionStore,
    registry: Arc<ActionRegistry>,
}

impl Replayer {
    pub fn new(store: SessionStore, registry: Arc<ActionRegistry>) -> Self {
        Self { store, registry }
    }

    /// Loads a session by id and replays it.
    pub async fn replay(
        &self,
        page: &dyn PageDriver,
        session_id: &str,
        options: &ReplayOptions,
    ) -> Result<ReplayReport, ReplayError> {
        let session = self.store.load(session_id).await?;
        self.replay_session(page, &session, options).await
    }

    pub async fn replay_session(
        &self,
        page: &dyn PageDriver,
        session: &Session,
        options: &ReplayOptions,
    ) -> Result<ReplayReport, ReplayError> {
        if session.actions.is_empty() {
            return Err(ReplayError::EmptySession(session.session_id.to_string()));
        }
        let total = session.actions.len();
        tracing::info!(session_id = %session.session_id, total, speed = options.speed, "replaying session");

        let mut results = Vec::with_capacity(total);
        for (index, entry) in session.actions.iter().enumerate() {
            if index > 0
                && let Some(delay) = options.inter_action_delay()
            {
                tokio::time::sleep(delay).await;
            }
            let result = self.replay_entry(page, entry, options).await;
            let failed = !result.success;
            if failed {
                tracing::warn!(
                    index,
                    action = %entry.action,
                    error = result.error.as_deref().unwrap_or_default(),
                    "replayed action failed"
                );
            }
            results.push(result);
            if failed && options.stop_on_error {
                break;
            }
        }

        let successful_actions = results.iter().filter(|r| r.success).count();
        let report = ReplayReport {
            success: successful_actions == total,
            session_id: session.session_id,
            total_actions: total,
            successful_actions,
            results,
        };
        tracing::info!(
            session_id = %report.session_id,
            success = report.success,
            successful = report.successful_actions,
            total,
            "replay finished"
        );
        Ok(report)
    }

    async fn replay_entry(
        &self,
        page: &dyn PageDriver,
        entry: &LogEntry,
        options: &ReplayOptions,
    ) -> ActionResult {
        let timeout = match entry.action.as_str() {
            "extract" => {
                return ActionResult::ok("extract").with_meta("skipped", true);
            },
            "navigate" => Some(options.navigation_timeout),
            "click" | "type_text" | "wait" => Some(options.element_timeout),
            _ => None,
        };
        let params = match timeout {
            Some(timeout) => with_timeout(&entry.params, timeout),
            None => entry.params.clone(),
        };
        self.registry
            .execute(page, &Task::new(entry.action.clone(), params))
            .await
    }
}

fn with_timeout(params: &Params, timeout: Duration) -> Params {
    let mut params = params.clone();
    let ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    params.insert("timeout".into(), Value::from(ms));
    params
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        crate::recorder::SessionRecorder,
        serde_json::json,
        tokio::time::Instant,
        wayfarer_actions::ErrorKind,
        wayfarer_browser::{
            ElementSnapshot,
            mock::{MockDocument, MockPage},
        },
    };

    fn params(v: Value) -> Params {
        v.as_object().cloned().unwrap()
    }

    fn site() -> MockPage {
        MockPage::new(vec![
            MockDocument::new("about:blank"),
            MockDocument::new("https://shop.test/")
                .with_elements("#q", vec![ElementSnapshot::new("")])
                .with_link_to("a.deals", "https://shop.test/deals"),
        ])
    }

    async fn record(dir: &std::path::Path, steps: &[(&str, Value)]) -> Uuid {
        let mut recorder = SessionRecorder::new(SessionStore::new(dir));
        let id = recorder.start_session("replay me");
        for (action, p) in steps {
            recorder.log_action(action, &params(p.clone()), &ActionResult::ok(*action));
        }
        recorder.end_session(true, None).await.unwrap();
        id
    }

    fn replayer(dir: &std::path::Path) -> Replayer {
        Replayer::new(
            SessionStore::new(dir),
            Arc::new(ActionRegistry::with_builtins(dir.join("shots"))),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn navigate_wait_click_replay_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let id = record(dir.path(), &[
            ("navigate", json!({"url": "https://shop.test/"})),
            ("wait", json!({"selector": "#q"})),
            ("type_text", json!({"selector": "#q", "text": "lamp"})),
            ("click", json!({"selector": "a.deals"})),
        ])
        .await;

        let page = site();
        let report = replayer(dir.path())
            .replay(&page, &id.to_string(), &ReplayOptions::default())
            .await
            .unwrap();
        assert!(report.success);
        assert_eq!(report.total_actions, 4);
        assert_eq!(report.successful_actions, report.total_actions);
        assert_eq!(page.active_url(), "https://shop.test/deals");
    }

    #[tokio::test(start_paused = true)]
    async fn extract_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let id = record(dir.path(), &[
            ("navigate", json!({"url": "https://shop.test/"})),
            ("extract", json!({"selector": ".price", "multiple": true})),
        ])
        .await;
        let page = site();
        let report = replayer(dir.path())
            .replay(&page, &id.to_string(), &ReplayOptions::default())
            .await
            .unwrap();
        assert!(report.success);
        assert_eq!(report.results[1].metadata["skipped"], true);
        assert_eq!(page.call_count("wait_for_selector"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_on_error_replays_a_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let id = record(dir.path(), &[
            ("navigate", json!({"url": "https://shop.test/"})),
            ("click", json!({"selector": "#gone"})),
            ("click", json!({"selector": "a.deals"})),
        ])
        .await;

        let page = site();
        let report = replayer(dir.path())
            .replay(&page, &id.to_string(), &ReplayOptions::default())
            .await
            .unwrap();
        assert!(!report.success);
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.successful_actions, 1);
        assert_eq!(report.results[1].error_kind, Some(ErrorKind::Timeout));

        let page = site();
        let options = ReplayOptions {
            stop_on_error: false,
            ..ReplayOptions::default()
        };
        let report = replayer(dir.path())
            .replay(&page, &id.to_string(), &options)
            .await
            .unwrap();
        assert!(!report.success);
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.successful_actions, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn speed_scales_only_the_gap_between_actions() {
        let dir = tempfile::tempdir().unwrap();
        let id = record(dir.path(), &[
            ("navigate", json!({"url": "https://shop.test/"})),
            ("navigate", json!({"url": "https://shop.test/"})),
            ("navigate", json!({"url": "https://shop.test/"})),
        ])
        .await;
        let replayer = replayer(dir.path());

        let options = ReplayOptions {
            speed: 2.0,
            base_delay: Duration::from_millis(1000),
            ..ReplayOptions::default()
        };
        let start = Instant::now();
        replayer.replay(&site(), &id.to_string(), &options).await.unwrap();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(1000), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(1500), "{elapsed:?}");

        let options = ReplayOptions {
            speed: 0.0,
            ..options
        };
        assert_eq!(options.inter_action_delay(), None);
        assert_eq!(options.navigation_timeout, Duration::from_secs(30));
    }

    #[test]
    fn timeouts_come_from_options() {
        let p = with_timeout(&params(json!({"url": "x", "timeout": 5})), Duration::from_secs(30));
        assert_eq!(p["timeout"], 30_000);
    }

    #[tokio::test]
    async fn missing_and_empty_sessions_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let replayer = replayer(dir.path());
        let page = site();
        let missing = Uuid::new_v4().to_string();
        assert!(matches!(
            replayer.replay(&page, &missing, &ReplayOptions::default()).await,
            Err(ReplayError::SessionNotFound(id)) if id == missing
        ));

        let id = record(dir.path(), &[]).await;
        assert!(matches!(
            replayer.replay(&page, &id.to_string(), &ReplayOptions::default()).await,
            Err(ReplayError::EmptySession(_))
        ));
        assert!(page.calls().is_empty());
    }
}
