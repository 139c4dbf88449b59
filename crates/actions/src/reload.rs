use {
    async_trait::async_trait,
    serde::Deserialize,
    serde_json::{Value, json},
};

use crate::{
    action::{Action, ActionContext, finish, millis, parse_params},
    error::Result,
    navigate::load_state,
    result::{ActionResult, Params},
};

#[derive(Debug, Deserialize)]
struct ReloadParams {
    #[serde(default = "default_timeout")]
    timeout: u64,
    wait_until: Option<String>,
}

fn default_timeout() -> u64 {
    30_000
}

pub struct ReloadAction;

impl ReloadAction {
    async fn run(&self, ctx: &ActionContext<'_>, params: &Params) -> Result<ActionResult> {
        let p: ReloadParams = parse_params(params)?;
        let wait_until = load_state(p.wait_until.as_deref())?;
        let timeout = millis(p.timeout);

        ctx.page.reload(timeout).await?;
        if let Some(state) = wait_until {
            ctx.page.wait_for_load(state, timeout).await?;
        }
        let url = ctx.page.current_url().await?;
        tracing::info!(%url, "reloaded");

        Ok(ActionResult::ok(self.name()).with_data(json!({ "url": url })))
    }
}

#[async_trait]
impl Action for ReloadAction {
    fn name(&self) -> &str {
        "reload"
    }

    fn description(&self) -> &str {
        "Reload the current page"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "timeout": {"type": "integer", "description": "Milliseconds (default 30000)"},
                "wait_until": {"type": "string", "enum": ["domcontentloaded", "load", "networkidle"]}
            }
        })
    }

    async fn execute(&self, ctx: &ActionContext<'_>, params: &Params) -> ActionResult {
        finish(self.name(), self.run(ctx, params).await)
    }
}
