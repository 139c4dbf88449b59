use std::time::Duration;

use {
    async_trait::async_trait,
    serde::Deserialize,
    serde_json::{Value, json},
    wayfarer_browser::{ElementState, LoadState},
};

use crate::{
    action::{Action, ActionContext, finish, millis, parse_params},
    error::{ActionError, Result},
    navigate::load_state,
    result::{ActionResult, Params},
};

/// Settling time added after the default page-load wait.
const DEFAULT_BUFFER: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct WaitParams {
    selector: Option<String>,
    #[serde(default = "default_timeout")]
    timeout: u64,
    #[serde(default = "default_state")]
    state: String,
    duration: Option<u64>,
    wait_for: Option<String>,
}

fn default_timeout() -> u64 {
    5_000
}

fn default_state() -> String {
    "visible".into()
}

/// Waits for a fixed duration, a load state, or an element state.
pub struct WaitAction;

impl WaitAction {
    async fn run(&self, ctx: &ActionContext<'_>, params: &Params) -> Result<ActionResult> {
        let p: WaitParams = parse_params(params)?;
        let timeout = millis(p.timeout);
        let duration = p.duration.filter(|d| *d > 0);
        let selector = p.selector.filter(|s| !s.is_empty());
        let mut result = ActionResult::ok(self.name());

        if duration.is_none() && p.wait_for.is_none() && selector.is_none() {
            ctx.page.wait_for_load(LoadState::DomContentLoaded, timeout).await?;
            tokio::time::sleep(DEFAULT_BUFFER).await;
            return Ok(result.with_meta("default_wait", true));
        }

        if let Some(ms) = duration {
            tokio::time::sleep(millis(ms)).await;
            result = result.with_meta("duration", ms);
        }
        if let Some(state) = load_state(p.wait_for.as_deref())? {
            ctx.page.wait_for_load(state, timeout).await?;
            result = result.with_meta("wait_for", p.wait_for);
        }
        if let Some(selector) = selector {
            let state = ElementState::parse(&p.state)
                .ok_or_else(|| ActionError::Validation(format!("Invalid state: {}", p.state)))?;
            ctx.page.wait_for_selector(&selector, state, timeout).await?;
            result = result
                .with_meta("selector", selector)
                .with_meta("state", state.to_string());
        }
        Ok(result)
    }
}

#[async_trait]
impl Action for WaitAction {
    fn name(&self) -> &str {
        "wait"
    }

    fn description(&self) -> &str {
        "Wait for a duration, a page load state, or an element to reach a state"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "duration": {"type": "integer", "description": "Milliseconds to sleep"},
                "wait_for": {"type": "string", "enum": ["domcontentloaded", "load", "networkidle"]},
                "selector": {"type": "string"},
                "state": {"type": "string", "enum": ["visible", "hidden", "attached", "detached"]},
                "timeout": {"type": "integer", "description": "Milliseconds (default 5000)"}
            }
        })
    }

    async fn execute(&self, ctx: &ActionContext<'_>, params: &Params) -> ActionResult {
        finish(self.name(), self.run(ctx, params).await)
    }
}
