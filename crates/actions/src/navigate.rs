use {
    async_trait::async_trait,
    serde::Deserialize,
    serde_json::{Value, json},
    wayfarer_browser::LoadState,
};

use crate::{
    action::{Action, ActionContext, finish, millis, parse_params, required},
    error::{ActionError, Result},
    result::{ActionResult, Params},
};

#[derive(Debug, Deserialize)]
struct NavigateParams {
    url: Option<String>,
    #[serde(default = "default_timeout")]
    timeout: u64,
    wait_until: Option<String>,
}

fn default_timeout() -> u64 {
    30_000
}

/// Parses an optional `wait_until` value.
pub(crate) fn load_state(value: Option<&str>) -> Result<Option<LoadState>> {
    match value {
        None => Ok(None),
        Some(s) => LoadState::parse(s)
            .map(Some)
            .ok_or_else(|| ActionError::Validation(format!("Invalid load state: {s}"))),
    }
}

/// Loads a URL in the active tab.
pub struct NavigateAction;

impl NavigateAction {
    async fn run(&self, ctx: &ActionContext<'_>, params: &Params) -> Result<ActionResult> {
        let p: NavigateParams = parse_params(params)?;
        let url = required(p.url.filter(|u| !u.is_empty()), "url")?;
        let wait_until = load_state(p.wait_until.as_deref())?;
        let timeout = millis(p.timeout);

        ctx.page.goto(&url, timeout).await?;
        if let Some(state) = wait_until {
            ctx.page.wait_for_load(state, timeout).await?;
        }
        let landed = ctx.page.current_url().await?;
        tracing::info!(url = %landed, "navigated");

        Ok(ActionResult::ok(self.name())
            .with_data(json!({"url": landed, "status_code": null}))
            .with_meta("url", url)
            .with_meta("wait_until", p.wait_until.unwrap_or_else(|| "load".into())))
    }
}

#[async_trait]
impl Action for NavigateAction {
    fn name(&self) -> &str {
        "navigate"
    }

    fn description(&self) -> &str {
        "Navigate the active tab to a URL"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {"type": "string", "description": "http or https URL"},
                "timeout": {"type": "integer", "description": "Milliseconds (default 30000)"},
                "wait_until": {"type": "string", "enum": ["domcontentloaded", "load", "networkidle"]}
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, ctx: &ActionContext<'_>, params: &Params) -> ActionResult {
        finish(self.name(), self.run(ctx, params).await)
    }
}
