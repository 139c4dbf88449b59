use {
    async_trait::async_trait,
    serde::Deserialize,
    serde_json::{Value, json},
};

use crate::{
    action::{Action, ActionContext, Target, finish, millis, parse_params},
    error::{ActionError, Result},
    result::{ActionResult, Params},
};

#[derive(Debug, Deserialize)]
struct ClickParams {
    #[serde(flatten)]
    target: Target,
    #[serde(default = "default_timeout")]
    timeout: u64,
}

fn default_timeout() -> u64 {
    10_000
}

/// Clicks an element addressed by role, CSS selector or visible text.
pub struct ClickAction;

impl ClickAction {
    async fn run(&self, ctx: &ActionContext<'_>, params: &Params) -> Result<ActionResult> {
        let p: ClickParams = parse_params(params)?;
        let locator = p.target.locator().ok_or_else(|| {
            ActionError::Validation("Either 'role', 'selector', or 'text' must be provided".into())
        })?;

        ctx.page.click(&locator, millis(p.timeout)).await?;
        tracing::debug!(%locator, "clicked");

        let mut result = ActionResult::ok(self.name());
        result.metadata = p.target.describe();
        Ok(result)
    }
}

#[async_trait]
impl Action for ClickAction {
    fn name(&self) -> &str {
        "click"
    }

    fn description(&self) -> &str {
        "Click an element by ARIA role and name, CSS selector, or visible text"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "role": {"type": "string", "description": "ARIA role, e.g. button or link"},
                "name": {"type": "string", "description": "Accessible name to match with role"},
                "selector": {"type": "string"},
                "text": {"type": "string", "description": "Visible text to match"},
                "timeout": {"type": "integer", "description": "Milliseconds (default 10000)"}
            }
        })
    }

    async fn execute(&self, ctx: &ActionContext<'_>, params: &Params) -> ActionResult {
        finish(self.name(), self.run(ctx, params).await)
    }
}
