//! Pattern-loop engine.
//!
//! Runs a fixed list of steps once per page and paginates between iterations
//! by clicking a "next" control or scrolling to the bottom. The whole loop is
//! described once; no planner is consulted per page.

use std::time::Duration;

use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
    serde_json::{Value, json},
    wayfarer_browser::{Locator, PageDriver, ScrollEdge},
};

use crate::{
    action::{Action, ActionContext, finish, millis, parse_params},
    error::{ActionError, Result},
    result::{ActionResult, Params, Task},
};

const CLICK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationKind {
    #[default]
    Click,
    Scroll,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationSpec {
    #[serde(rename = "type", default)]
    pub kind: PaginationKind,
    pub selector: Option<String>,
    #[serde(default = "default_wait_after", alias = "wait_after")]
    pub wait_after_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopKind {
    #[default]
    MaxIterations,
    NoNextButton,
    EmptyResults,
}

impl StopKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::MaxIterations => "max_iterations",
            Self::NoNextButton => "no_next_button",
            Self::EmptyResults => "empty_results",
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StopSpec {
    #[serde(rename = "type", default)]
    pub kind: StopKind,
    pub value: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnEmpty {
    #[default]
    Stop,
    Continue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoopConfig {
    #[serde(default)]
    pub pattern: Vec<Value>,
    pub pagination: Option<PaginationSpec>,
    pub stop_condition: Option<StopSpec>,
    #[serde(default)]
    pub on_empty: OnEmpty,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "default_delay_between", alias = "delay_between")]
    pub delay_between_ms: u64,
}

fn default_wait_after() -> u64 {
    2_000
}

fn default_max_iterations() -> u32 {
    100
}

fn default_delay_between() -> u64 {
    1_000
}

/// Why a loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopTermination {
    /// The iteration limit was reached: the stop condition's count, or
    /// `max_iterations` when no stop condition is set.
    MaxIterations,
    /// Pagination found no next page. Not an error.
    NoNextPage,
    EmptyResults,
    NoPagination,
    /// `max_iterations` ran out before the configured stop condition fired.
    IterationCap,
}

impl LoopTermination {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MaxIterations => "max_iterations",
            Self::NoNextPage => "no_next_page",
            Self::EmptyResults => "empty_results",
            Self::NoPagination => "no_pagination",
            Self::IterationCap => "iteration_cap",
        }
    }
}

/// Whether step data counts as produced output.
pub fn is_produced(data: &Value) -> bool {
    match data {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        _ => true,
    }
}

fn parse_steps(pattern: Vec<Value>) -> Result<Vec<Task>> {
    if pattern.is_empty() {
        return Err(ActionError::missing(&["pattern"]));
    }
    pattern
        .into_iter()
        .map(|step| {
            let task = Task::from_value(step)?;
            if task.action == "loop" {
                return Err(ActionError::Validation(
                    "nested loop steps are not supported".into(),
                ));
            }
            Ok(task)
        })
        .collect()
}

/// Advances to the next page. Any failure means there is no next page.
async fn paginate(page: &dyn PageDriver, spec: &PaginationSpec, selector: Option<&str>) -> bool {
    match (spec.kind, selector) {
        (PaginationKind::Click, Some(selector)) => {
            let next = match page.query_all(selector, 1).await {
                Ok(found) => found.into_iter().next(),
                Err(e) => {
                    tracing::debug!(error = %e, "next control lookup failed");
                    None
                },
            };
            let Some(next) = next else {
                tracing::debug!(%selector, "no next control");
                return false;
            };
            let aria_disabled = next.attributes.get("aria-disabled").is_some_and(|v| v == "true");
            if next.disabled || aria_disabled || next.attributes.contains_key("disabled") {
                tracing::debug!(%selector, "next control disabled");
                return false;
            }
            if let Err(e) = page.click(&Locator::css(selector), CLICK_TIMEOUT).await {
                tracing::debug!(error = %e, "clicking next control failed");
                return false;
            }
        },
        (PaginationKind::Click, None) => return false,
        (PaginationKind::Scroll, _) => {
            if let Err(e) = page.scroll_to(ScrollEdge::Bottom, false).await {
                tracing::debug!(error = %e, "scroll pagination failed");
                return false;
            }
        },
    }
    tokio::time::sleep(millis(spec.wait_after_ms)).await;
    true
}

/// Repeats a step pattern across paginated content.
pub struct LoopAction;

impl LoopAction {
    async fn run(&self, ctx: &ActionContext<'_>, params: &Params) -> Result<ActionResult> {
        let config: LoopConfig = parse_params(params)?;
        let steps = parse_steps(config.pattern)?;
        let next_selector = config
            .pagination
            .as_ref()
            .filter(|spec| spec.kind == PaginationKind::Click)
            .and_then(|spec| spec.selector.as_deref())
            .filter(|s| !s.is_empty());
        let max_iterations = config.max_iterations.max(1);
        let stop = config.stop_condition.as_ref();
        let stop_reason = stop.map_or(StopKind::MaxIterations, |s| s.kind);

        let mut collected: Vec<Value> = Vec::new();
        let mut iteration = 0u32;
        let mut terminated_by = LoopTermination::IterationCap;

        while iteration < max_iterations {
            iteration += 1;
            tracing::info!(iteration, max_iterations, "loop iteration");

            let mut produced = Vec::new();
            for step in &steps {
                let result = ctx.registry.execute(ctx.page, step).await;
                if !result.success {
                    tracing::warn!(
                        iteration,
                        step = %step.action,
                        error = result.error.as_deref().unwrap_or_default(),
                        "loop step failed, ending iteration"
                    );
                    break;
                }
                if let Some(data) = result.data.filter(is_produced) {
                    produced.push(data);
                }
            }

            let empty = produced.is_empty();
            if empty && config.on_empty == OnEmpty::Stop {
                terminated_by = LoopTermination::EmptyResults;
                break;
            }
            for data in produced {
                match data {
                    Value::Array(items) => collected.extend(items),
                    other => collected.push(other),
                }
            }

            match stop {
                Some(StopSpec {
                    kind: StopKind::MaxIterations,
                    value,
                }) if iteration >= value.unwrap_or(max_iterations) => {
                    terminated_by = LoopTermination::MaxIterations;
                    break;
                },
                Some(StopSpec {
                    kind: StopKind::EmptyResults,
                    ..
                }) if empty => {
                    terminated_by = LoopTermination::EmptyResults;
                    break;
                },
                _ => {},
            }

            let Some(spec) = &config.pagination else {
                terminated_by = LoopTermination::NoPagination;
                break;
            };
            if stop.is_none() && iteration >= max_iterations {
                terminated_by = LoopTermination::MaxIterations;
                break;
            }
            if !paginate(ctx.page, spec, next_selector).await {
                terminated_by = LoopTermination::NoNextPage;
                break;
            }
            if config.delay_between_ms > 0 {
                tokio::time::sleep(millis(config.delay_between_ms)).await;
            }
        }

        tracing::info!(
            iterations = iteration,
            items = collected.len(),
            terminated_by = terminated_by.as_str(),
            "loop finished"
        );
        let items_collected = collected.len();
        Ok(ActionResult::ok(self.name())
            .with_data(collected)
            .with_meta("iterations", iteration)
            .with_meta("items_collected", items_collected)
            .with_meta("stop_reason", stop_reason.as_str())
            .with_meta("terminated_by", terminated_by.as_str()))
    }
}

#[async_trait]
impl Action for LoopAction {
    fn name(&self) -> &str {
        "loop"
    }

    fn description(&self) -> &str {
        "Repeat a pattern of steps across pages, following click or scroll pagination"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "array",
                    "description": "Steps run each iteration, e.g. {\"action\": \"extract\", \"selector\": \".item\", \"multiple\": true}",
                    "items": {"type": "object"}
                },
                "pagination": {
                    "type": "object",
                    "properties": {
                        "type": {"type": "string", "enum": ["click", "scroll"]},
                        "selector": {"type": "string", "description": "Next-page control for click pagination"},
                        "wait_after_ms": {"type": "integer", "description": "Default 2000"}
                    }
                },
                "stop_condition": {
                    "type": "object",
                    "properties": {
                        "type": {"type": "string", "enum": ["max_iterations", "no_next_button", "empty_results"]},
                        "value": {"type": "integer"}
                    }
                },
                "on_empty": {"type": "string", "enum": ["stop", "continue"]},
                "max_iterations": {"type": "integer", "description": "Default 100"},
                "delay_between_ms": {"type": "integer", "description": "Default 1000"}
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, ctx: &ActionContext<'_>, params: &Params) -> ActionResult {
        finish(self.name(), self.run(ctx, params).await)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use {
        super::*,
        crate::{error::ErrorKind, registry::ActionRegistry},
        wayfarer_browser::{
            ElementSnapshot,
            mock::{MockDocument, MockPage},
        },
    };

    fn items(names: &[&str]) -> Vec<ElementSnapshot> {
        names.iter().map(|n| ElementSnapshot::new(*n)).collect()
    }

    /// Three pages of `.item`; `button.next` exists on the first two only.
    fn paginated() -> MockPage {
        MockPage::new(vec![
            MockDocument::new("https://list.test/1")
                .with_elements(".item", items(&["a", "b"]))
                .with_link_to("button.next", "https://list.test/2"),
            MockDocument::new("https://list.test/2")
                .with_elements(".item", items(&["c", "d"]))
                .with_link_to("button.next", "https://list.test/3"),
            MockDocument::new("https://list.test/3").with_elements(".item", items(&["e"])),
        ])
    }

    async fn run_loop(page: &MockPage, params: Value) -> ActionResult {
        let registry = ActionRegistry::with_builtins("shots");
        let task = Task::new("loop", params.as_object().cloned().unwrap());
        registry.execute(page, &task).await
    }

    fn extract_items() -> Value {
        json!([{"action": "extract", "selector": ".item", "multiple": true}])
    }

    #[tokio::test(start_paused = true)]
    async fn no_pagination_runs_exactly_once() {
        for max in [0, 1, 5, 100] {
            let page = paginated();
            let result = run_loop(
                &page,
                json!({"pattern": extract_items(), "max_iterations": max}),
            )
            .await;
            assert!(result.success);
            assert_eq!(result.metadata["iterations"], 1);
            assert_eq!(result.metadata["terminated_by"], "no_pagination");
            assert_eq!(result.data, Some(json!([{"text": "a"}, {"text": "b"}])));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn next_control_disappearing_stops_before_the_limit() {
        let page = MockPage::new(vec![
            MockDocument::new("https://list.test/1")
                .with_elements(".item", items(&["a", "b"]))
                .with_link_to("button.next", "https://list.test/2"),
            MockDocument::new("https://list.test/2").with_elements(".item", items(&["c"])),
        ]);
        let result = run_loop(
            &page,
            json!({
                "pattern": extract_items(),
                "pagination": {"type": "click", "selector": "button.next", "wait_after_ms": 500},
                "stop_condition": {"type": "max_iterations", "value": 3}
            }),
        )
        .await;
        assert!(result.success);
        assert_eq!(result.metadata["iterations"], 2);
        assert_eq!(result.metadata["items_collected"], 3);
        assert_eq!(result.metadata["stop_reason"], "max_iterations");
        assert_eq!(result.metadata["terminated_by"], "no_next_page");
    }

    #[tokio::test(start_paused = true)]
    async fn unresolvable_next_control_keeps_first_iteration_only() {
        let page = paginated();
        let result = run_loop(
            &page,
            json!({
                "pattern": extract_items(),
                "pagination": {"type": "click", "selector": "a.does-not-exist"},
                "stop_condition": {"type": "no_next_button"}
            }),
        )
        .await;
        assert_eq!(result.metadata["iterations"], 1);
        assert_eq!(result.metadata["stop_reason"], "no_next_button");
        assert_eq!(result.data, Some(json!([{"text": "a"}, {"text": "b"}])));
        assert_eq!(page.call_count("click"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_condition_value_caps_iterations() {
        let page = paginated();
        let result = run_loop(
            &page,
            json!({
                "pattern": extract_items(),
                "pagination": {"selector": "button.next", "wait_after": 100},
                "stop_condition": {"type": "max_iterations", "value": 2},
                "delay_between": 0
            }),
        )
        .await;
        assert_eq!(result.metadata["iterations"], 2);
        assert_eq!(result.metadata["terminated_by"], "max_iterations");
        assert_eq!(result.metadata["items_collected"], 4);
        assert_eq!(page.active_url(), "https://list.test/2");
    }

    #[tokio::test(start_paused = true)]
    async fn click_pagination_without_selector_keeps_first_page() {
        let page = MockPage::new(vec![
            MockDocument::new("https://list.test/1").with_elements(".item", items(&["a", "b"])),
        ]);
        let result = run_loop(
            &page,
            json!({"pattern": extract_items(), "pagination": {"type": "click"}}),
        )
        .await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.metadata["iterations"], 1);
        assert_eq!(result.metadata["terminated_by"], "no_next_page");
        assert_eq!(result.data, Some(json!([{"text": "a"}, {"text": "b"}])));
        assert_eq!(page.call_count("click"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_value_beyond_the_cap_reports_the_cap() {
        let page = MockPage::new(vec![
            MockDocument::new("https://feed.test/")
                .with_elements(".post", items(&["p1"]))
                .with_scroll_batch(".post", items(&["p2"])),
        ]);
        let result = run_loop(
            &page,
            json!({
                "pattern": [{"action": "extract", "selector": ".post", "multiple": true}],
                "pagination": {"type": "scroll", "wait_after_ms": 10},
                "stop_condition": {"type": "max_iterations", "value": 50},
                "max_iterations": 2,
                "delay_between_ms": 0
            }),
        )
        .await;
        assert_eq!(result.metadata["iterations"], 2);
        assert_eq!(result.metadata["stop_reason"], "max_iterations");
        assert_eq!(result.metadata["terminated_by"], "iteration_cap");
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_next_control_ends_the_loop() {
        let page = MockPage::new(vec![
            MockDocument::new("https://list.test/1")
                .with_elements(".item", items(&["a"]))
                .with_elements("button.next", vec![ElementSnapshot::new("Next").disabled()]),
        ]);
        let result = run_loop(
            &page,
            json!({"pattern": extract_items(), "pagination": {"selector": "button.next"}}),
        )
        .await;
        assert_eq!(result.metadata["terminated_by"], "no_next_page");
        assert_eq!(page.call_count("click"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn scroll_pagination_loads_more_content() {
        let page = MockPage::new(vec![
            MockDocument::new("https://feed.test/")
                .with_elements(".post", items(&["p1"]))
                .with_scroll_batch(".post", items(&["p2"])),
        ]);
        let result = run_loop(
            &page,
            json!({
                "pattern": [{"action": "extract", "selector": ".post", "multiple": true}],
                "pagination": {"type": "scroll", "wait_after_ms": 100},
                "stop_condition": {"type": "max_iterations", "value": 2}
            }),
        )
        .await;
        assert_eq!(result.metadata["iterations"], 2);
        assert_eq!(result.metadata["terminated_by"], "max_iterations");
        assert_eq!(
            result.data,
            Some(json!([{"text": "p1"}, {"text": "p1"}, {"text": "p2"}]))
        );
        assert_eq!(page.call_count("scroll_to"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_step_ends_the_iteration_only() {
        let page = paginated();
        let result = run_loop(
            &page,
            json!({
                "pattern": [
                    {"action": "extract", "selector": ".item", "multiple": true},
                    {"action": "click", "selector": "#missing", "timeout": 10},
                    {"action": "extract", "selector": ".item"}
                ],
                "pagination": {"selector": "button.next", "wait_after_ms": 10},
                "max_iterations": 2
            }),
        )
        .await;
        assert!(result.success);
        assert_eq!(result.metadata["iterations"], 2);
        assert_eq!(result.metadata["items_collected"], 4);
        assert_eq!(result.metadata["terminated_by"], "max_iterations");
    }

    #[tokio::test(start_paused = true)]
    async fn empty_iteration_stops_by_default() {
        let page = paginated();
        let result = run_loop(
            &page,
            json!({
                "pattern": [{"action": "extract", "selector": ".item", "attribute": "nope", "multiple": false}],
                "pagination": {"selector": "button.next"}
            }),
        )
        .await;
        assert_eq!(result.metadata["iterations"], 1);
        assert_eq!(result.metadata["terminated_by"], "empty_results");
        assert_eq!(page.call_count("click"), 0);
    }

    #[tokio::test]
    async fn invalid_configs_are_validation_errors() {
        let page = paginated();
        for params in [
            json!({}),
            json!({"pattern": []}),
            json!({"pattern": [{"selector": ".item"}]}),
            json!({"pattern": [{"action": "loop", "pattern": []}]}),
            json!({"pattern": extract_items(), "pagination": {"type": "teleport"}}),
        ] {
            let result = run_loop(&page, params.clone()).await;
            assert!(!result.success, "{params}");
            assert_eq!(result.error_kind, Some(ErrorKind::Validation), "{params}");
        }
        let result = run_loop(&page, json!({})).await;
        assert_eq!(result.error.as_deref(), Some("Missing required parameters: pattern"));
        assert!(page.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_step_action_fails_the_step() {
        let page = paginated();
        let result = run_loop(
            &page,
            json!({"pattern": [{"action": "teleport"}], "on_empty": "continue"}),
        )
        .await;
        assert!(result.success);
        assert_eq!(result.data, Some(json!([])));
        assert_eq!(result.metadata["terminated_by"], "no_pagination");
    }
}
