//! Runs plans against one page.
//!
//! A task is retried up to `max_retries` times after its first try. A whole
//! plan is rerun from the first task, up to `max_plan_attempts` times, until
//! every task in one attempt succeeds.

use std::sync::Arc;

use {
    serde_json::Value,
    uuid::Uuid,
    wayfarer_actions::{
        Action, ActionRegistry, ActionResult, Task, pattern_loop::is_produced, suggestion_selector,
    },
    wayfarer_browser::PageDriver,
    wayfarer_sessions::SessionRecorder,
};

use crate::{
    policy::{PlanOptions, RetryPolicy, is_timeout_error},
    summary::{CollectedItem, ExecutionSummary, FailedTask},
};

/// Actions whose successful output is collected for export.
const COLLECTING_ACTIONS: &[&str] = &["extract", "loop"];

pub struct Executor {
    page: Arc<dyn PageDriver>,
    registry: Arc<ActionRegistry>,
    recorder: SessionRecorder,
    policy: RetryPolicy,
    collected_data: Vec<CollectedItem>,
    /// Data of the latest successful `inspect`, scoped to one plan run.
    last_inspection: Option<Value>,
}

impl Executor {
    pub fn new(
        page: Arc<dyn PageDriver>,
        registry: Arc<ActionRegistry>,
        recorder: SessionRecorder,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            page,
            registry,
            recorder,
            policy,
            collected_data: Vec::new(),
            last_inspection: None,
        }
    }

    /// Adds or replaces an action for subsequent runs.
    pub fn register_action(&mut self, action: Arc<dyn Action>) {
        Arc::make_mut(&mut self.registry).register(action);
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn recorder(&self) -> &SessionRecorder {
        &self.recorder
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Data collected by the latest plan attempt.
    pub fn collected_data(&self) -> &[CollectedItem] {
        &self.collected_data
    }

    pub fn last_inspection(&self) -> Option<&Value> {
        self.last_inspection.as_ref()
    }

    /// Runs one task with task-level retries and logs its final result.
    pub async fn execute_task(&mut self, task: &Task) -> ActionResult {
        let mut current = task.clone();
        let mut repaired = false;
        let mut retries = 0;

        let result = loop {
            tracing::info!(
                action = %current.action,
                description = %current.description,
                attempt = retries + 1,
                "running task"
            );
            let mut result = self.run(&current).await;

            if !result.success
                && !repaired
                && current.action == "extract"
                && retries < self.policy.max_retries
                && let Some(selector) = self.suggested_selector()
            {
                repaired = true;
                tracing::info!(%selector, "retrying extract with suggested selector");
                current
                    .params
                    .insert("selector".into(), Value::String(selector));
                result = self.run(&current).await;
            }

            if result.success || !result.is_retryable() || retries >= self.policy.max_retries {
                break result;
            }
            retries += 1;
            let error = result.error.clone().unwrap_or_default();
            tracing::warn!(
                action = %current.action,
                %error,
                retry = retries,
                max_retries = self.policy.max_retries,
                "task failed, retrying"
            );
            tokio::time::sleep(self.policy.retry_delay).await;
            if is_timeout_error(&error) {
                self.recover().await;
            }
        };

        self.record(&current, &result);
        if result.success {
            tracing::info!(action = %current.action, "task succeeded");
        } else {
            tracing::warn!(
                action = %current.action,
                error = result.error.as_deref().unwrap_or_default(),
                "task failed"
            );
        }
        result
    }

    /// Runs `tasks` in order under one recorded session, rerunning the whole
    /// list on failure.
    pub async fn execute_plan(
        &mut self,
        tasks: &[Task],
        goal: &str,
        options: PlanOptions,
    ) -> ExecutionSummary {
        if tasks.is_empty() {
            tracing::warn!(%goal, "empty plan");
            return ExecutionSummary::empty_plan(goal);
        }

        let session_id: Uuid = self.recorder.start_session(goal);
        self.last_inspection = None;
        let total = tasks.len();
        let max_attempts = if options.retry_full_plan {
            options.max_plan_attempts.max(1)
        } else {
            1
        };

        let mut attempts = 0;
        let mut completed = 0;
        let mut failed_task: Option<FailedTask> = None;
        while attempts < max_attempts {
            attempts += 1;
            if attempts > 1 {
                tracing::info!(attempt = attempts, max_attempts, "retrying entire plan");
                tokio::time::sleep(self.policy.plan_retry_delay).await;
            }
            tracing::info!(%session_id, tasks = total, attempt = attempts, "executing plan");

            self.collected_data.clear();
            completed = 0;
            failed_task = None;
            let mut fatal = false;
            for (index, task) in tasks.iter().enumerate() {
                let result = self.execute_task(task).await;
                if result.success {
                    completed += 1;
                    continue;
                }
                fatal |= !result.is_retryable();
                if failed_task.is_none() {
                    failed_task = Some(FailedTask {
                        task: task.clone(),
                        error: result.error.clone().unwrap_or_default(),
                        index,
                    });
                }
                if options.stop_on_error {
                    break;
                }
            }

            if completed == total {
                break;
            }
            if let Some(failed) = &failed_task {
                tracing::warn!(
                    attempt = attempts,
                    index = failed.index,
                    error = %failed.error,
                    "plan attempt failed"
                );
            }
            if fatal {
                tracing::warn!("non-retryable failure, not retrying the plan");
                break;
            }
        }

        let success = completed == total;
        let session_error = (!success).then(|| {
            failed_task
                .as_ref()
                .map_or_else(|| "Unknown error".to_string(), |f| f.error.clone())
        });
        let log_path = match self.recorder.end_session(success, session_error).await {
            Ok(saved) => saved.map(|s| s.path),
            Err(e) => {
                tracing::warn!(%session_id, error = %e, "failed to save session");
                None
            },
        };
        tracing::info!(%session_id, success, completed, total, attempts, "plan finished");

        ExecutionSummary {
            success,
            goal: goal.to_string(),
            session_id: Some(session_id),
            total_tasks: total,
            completed_tasks: completed,
            attempts,
            failed_task,
            error: None,
            collected_data: self.collected_data.clone(),
            log_path,
        }
    }

    async fn run(&self, task: &Task) -> ActionResult {
        self.registry.execute(self.page.as_ref(), task).await
    }

    fn suggested_selector(&self) -> Option<String> {
        let first = self
            .last_inspection
            .as_ref()?
            .get("suggested_selectors")?
            .as_array()?
            .first()?
            .as_str()?;
        Some(suggestion_selector(first).to_string())
    }

    async fn recover(&self) {
        tracing::info!("reloading page after timeout");
        if let Err(e) = self.page.reload(self.policy.reload_timeout).await {
            tracing::warn!(error = %e, "reload failed");
        }
        tokio::time::sleep(self.policy.reload_delay).await;
    }

    fn record(&mut self, task: &Task, result: &ActionResult) {
        self.recorder.log_action(&task.action, &task.params, result);
        if !result.success {
            return;
        }
        if task.action == "inspect" && result.data.is_some() {
            self.last_inspection = result.data.clone();
        }
        if COLLECTING_ACTIONS.contains(&task.action.as_str())
            && let Some(data) = result.data.as_ref().filter(|d| is_produced(d))
        {
            self.collected_data.push(CollectedItem {
                action: task.action.clone(),
                data: data.clone(),
                save_as: task
                    .params
                    .get("save_as")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            });
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        rstest::rstest,
        serde_json::json,
        std::path::Path,
        wayfarer_actions::{ErrorKind, Params},
        wayfarer_browser::{
            BrowserError, ElementSnapshot,
            mock::{MockDocument, MockPage},
        },
        wayfarer_sessions::SessionStore,
    };

    fn task(action: &str, params: Value) -> Task {
        Task::new(action, params.as_object().cloned().unwrap())
    }

    fn shop() -> Arc<MockPage> {
        Arc::new(MockPage::new(vec![
            MockDocument::new("about:blank"),
            MockDocument::new("https://shop.test/")
                .with_title("Shop")
                .with_elements(".card", vec![
                    ElementSnapshot::new("Lamp"),
                    ElementSnapshot::new("Desk"),
                ])
                .with_elements("#flaky", vec![ElementSnapshot::new("More")]),
        ]))
    }

    fn executor(page: Arc<MockPage>, dir: &Path, policy: RetryPolicy) -> Executor {
        Executor::new(
            page,
            Arc::new(ActionRegistry::with_builtins(dir.join("shots"))),
            SessionRecorder::new(SessionStore::new(dir.join("logs"))),
            policy,
        )
    }

    fn open() -> Task {
        task("navigate", json!({"url": "https://shop.test/"}))
    }

    #[tokio::test(start_paused = true)]
    async fn clean_run_takes_one_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let mut executor = executor(shop(), dir.path(), RetryPolicy::default());
        let tasks = vec![
            open(),
            task("extract", json!({"selector": ".card", "multiple": true, "save_as": "products"})),
            task("wait", json!({"duration": 100})),
        ];
        let summary = executor
            .execute_plan(&tasks, "list products", PlanOptions::default())
            .await;

        assert!(summary.success);
        assert_eq!(summary.attempts, 1);
        assert_eq!(summary.completed_tasks, summary.total_tasks);
        assert!(summary.failed_task.is_none());
        assert_eq!(summary.collected_data.len(), 1);
        assert_eq!(summary.collected_data[0].save_as.as_deref(), Some("products"));
        assert_eq!(summary.collected_data[0].data.as_array().unwrap().len(), 2);

        let log_path = summary.log_path.unwrap();
        assert!(log_path.exists());
        let session = SessionStore::new(dir.path().join("logs"))
            .load(&summary.session_id.unwrap().to_string())
            .await
            .unwrap();
        assert!(session.success);
        assert_eq!(session.action_count, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_task_reruns_whole_plan() {
        let dir = tempfile::tempdir().unwrap();
        let page = shop();
        let mut executor = executor(page.clone(), dir.path(), RetryPolicy::default());
        let tasks = vec![
            open(),
            task("click", json!({"selector": "#missing"})),
            task("extract", json!({"selector": ".card", "multiple": true})),
            task("reload", json!({})),
        ];
        let summary = executor
            .execute_plan(&tasks, "checkout", PlanOptions::default())
            .await;

        assert!(!summary.success);
        assert_eq!(summary.attempts, 3);
        assert_eq!(summary.total_tasks, 4);
        assert_eq!(summary.completed_tasks, 1);
        let failed = summary.failed_task.unwrap();
        assert_eq!(failed.index, 1);
        assert!(failed.error.contains("timeout"), "{}", failed.error);

        // One try plus three retries, each retry preceded by a reload.
        assert_eq!(page.call_count("click"), 3 * 4);
        assert_eq!(page.call_count("reload"), 3 * 3);
        assert_eq!(page.call_count("query_all"), 0);

        let session = executor
            .recorder()
            .get_log(&summary.session_id.unwrap().to_string())
            .await
            .unwrap();
        assert!(!session.success);
        assert_eq!(session.action_count, 3 * 2);
        assert_eq!(session.error.as_deref(), Some(failed.error.as_str()));
    }

    #[tokio::test(start_paused = true)]
    async fn collected_data_is_reset_between_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let page = shop();
        for _ in 0..2 {
            page.fail_next("click", BrowserError::NotInteractable("covered".into()));
        }
        let policy = RetryPolicy {
            max_retries: 1,
            ..RetryPolicy::default()
        };
        let mut executor = executor(page.clone(), dir.path(), policy);
        let tasks = vec![
            open(),
            task("extract", json!({"selector": ".card", "multiple": true})),
            task("click", json!({"selector": "#flaky"})),
        ];
        let summary = executor
            .execute_plan(&tasks, "paged", PlanOptions::default())
            .await;

        assert!(summary.success);
        assert_eq!(summary.attempts, 2);
        assert_eq!(summary.collected_data.len(), 1);
        assert_eq!(executor.collected_data(), summary.collected_data.as_slice());
        assert_eq!(page.call_count("reload"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_extract_uses_inspected_selector() {
        let dir = tempfile::tempdir().unwrap();
        let page = shop();
        let mut executor = executor(page.clone(), dir.path(), RetryPolicy::default());
        let tasks = vec![
            open(),
            task("inspect", json!({})),
            task("extract", json!({"selector": ".product", "multiple": true, "timeout": 500})),
        ];
        let summary = executor
            .execute_plan(&tasks, "products", PlanOptions::default())
            .await;

        assert!(summary.success, "{:?}", summary.failed_task);
        assert_eq!(summary.attempts, 1);
        assert_eq!(
            executor.last_inspection().unwrap()["suggested_selectors"][0],
            ".card (2)"
        );
        assert_eq!(page.call_count("wait_for_selector .product"), 1);
        assert_eq!(page.call_count("wait_for_selector .card"), 1);
        assert_eq!(page.call_count("reload"), 0);

        let session = executor
            .recorder()
            .get_log(&summary.session_id.unwrap().to_string())
            .await
            .unwrap();
        assert_eq!(session.actions[2].params["selector"], ".card");
    }

    #[tokio::test(start_paused = true)]
    async fn extract_without_inspection_takes_the_generic_path() {
        let dir = tempfile::tempdir().unwrap();
        let page = shop();
        let policy = RetryPolicy {
            max_retries: 1,
            ..RetryPolicy::default()
        };
        let mut executor = executor(page.clone(), dir.path(), policy);
        executor.execute_task(&open()).await;
        let result = executor
            .execute_task(&task("extract", json!({"selector": ".product"})))
            .await;

        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::Timeout));
        assert_eq!(page.call_count("wait_for_selector .product"), 2);
        assert_eq!(page.call_count("reload"), 1);
        assert!(executor.collected_data().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_reload_is_bounded_by_navigation_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let page = shop();
        let mut config = wayfarer_config::WayfarerConfig::default();
        config.browser.navigation_timeout_ms = 12_000;
        config.executor.max_retries = 1;
        let mut executor = executor(page.clone(), dir.path(), RetryPolicy::from(&config));
        executor.execute_task(&open()).await;
        let result = executor
            .execute_task(&task("click", json!({"selector": "#missing", "timeout": 100})))
            .await;

        assert!(!result.success);
        assert_eq!(page.call_count("reload 12000ms"), 1);
        assert_eq!(page.call_count("reload"), 1);
    }

    #[rstest]
    #[case::validation(task("click", json!({})))]
    #[case::unknown_action(task("hover", json!({"selector": "a"})))]
    #[tokio::test(start_paused = true)]
    async fn non_retryable_failures_fail_fast(#[case] bad: Task) {
        let dir = tempfile::tempdir().unwrap();
        let page = shop();
        let mut executor = executor(page.clone(), dir.path(), RetryPolicy::default());
        let summary = executor
            .execute_plan(&[open(), bad], "bad plan", PlanOptions::default())
            .await;

        assert!(!summary.success);
        assert_eq!(summary.attempts, 1);
        assert_eq!(summary.failed_task.unwrap().index, 1);
        assert_eq!(page.call_count("goto"), 1);
        assert_eq!(page.call_count("reload"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn continue_on_error_reports_first_failure() {
        let dir = tempfile::tempdir().unwrap();
        let policy = RetryPolicy {
            max_retries: 0,
            ..RetryPolicy::default()
        };
        let mut executor = executor(shop(), dir.path(), policy);
        let tasks = vec![
            open(),
            task("click", json!({"selector": "#gone"})),
            task("click", json!({"selector": "#also-gone"})),
            task("extract", json!({"selector": ".card"})),
        ];
        let options = PlanOptions {
            stop_on_error: false,
            retry_full_plan: false,
            max_plan_attempts: 3,
        };
        let summary = executor.execute_plan(&tasks, "partial", options).await;

        assert!(!summary.success);
        assert_eq!(summary.attempts, 1);
        assert_eq!(summary.completed_tasks, 2);
        assert_eq!(summary.failed_task.unwrap().index, 1);
        assert_eq!(summary.collected_data[0].data, json!("Lamp"));
    }

    #[tokio::test]
    async fn empty_plan_opens_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut executor = executor(shop(), dir.path(), RetryPolicy::default());
        let summary = executor
            .execute_plan(&[], "nothing", PlanOptions::default())
            .await;
        assert!(!summary.success);
        assert_eq!(summary.error.as_deref(), Some("No tasks to execute"));
        assert!(summary.session_id.is_none());
        assert!(executor.recorder().list_sessions().await.unwrap().is_empty());
    }

    struct Shout;

    #[async_trait::async_trait]
    impl Action for Shout {
        fn name(&self) -> &str {
            "shout"
        }

        fn description(&self) -> &str {
            "Returns a fixed greeting"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(
            &self,
            _ctx: &wayfarer_actions::ActionContext<'_>,
            _params: &Params,
        ) -> ActionResult {
            ActionResult::ok("shout").with_data("hello")
        }
    }

    #[tokio::test]
    async fn registered_actions_are_dispatched() {
        let dir = tempfile::tempdir().unwrap();
        let mut executor = executor(shop(), dir.path(), RetryPolicy::default());
        executor.register_action(Arc::new(Shout));
        assert!(executor.registry().contains("shout"));
        assert!(executor.registry().contains("navigate"));

        let result = executor.execute_task(&task("shout", json!({}))).await;
        assert!(result.success);
        assert_eq!(result.data, Some(json!("hello")));
    }
}
