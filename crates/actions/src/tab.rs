use {
    async_trait::async_trait,
    serde::Deserialize,
    serde_json::{Value, json},
    wayfarer_browser::BrowserError,
};

use crate::{
    action::{Action, ActionContext, finish, millis, parse_params, required},
    error::{ActionError, Result},
    result::{ActionResult, Params},
};

const RELOAD_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Deserialize)]
struct TabParams {
    operation: Option<String>,
    url: Option<String>,
    tab_index: Option<usize>,
}

fn tab_error(err: BrowserError) -> ActionError {
    match err {
        BrowserError::LastTab => ActionError::Interaction("Cannot close the only tab".into()),
        BrowserError::TabNotFound(index) => {
            ActionError::Interaction(format!("Invalid tab index: {index}"))
        },
        other => other.into(),
    }
}

/// Opens, closes, switches, lists and reloads tabs.
pub struct TabAction;

impl TabAction {
    async fn run(&self, ctx: &ActionContext<'_>, params: &Params) -> Result<ActionResult> {
        let p: TabParams = parse_params(params)?;
        let operation = required(p.operation, "operation")?.to_lowercase();
        let page = ctx.page;
        let result = ActionResult::ok(self.name()).with_meta("operation", operation.as_str());

        match operation.as_str() {
            "new" => {
                let index = page.new_tab(p.url.as_deref()).await.map_err(tab_error)?;
                let tab_count = page.list_tabs().await?.len();
                tracing::info!(index, tab_count, "opened tab");
                Ok(result
                    .with_data(json!({ "tab_count": tab_count }))
                    .with_meta("tab_index", index))
            },
            "close" => {
                let index = match p.tab_index {
                    Some(index) => index,
                    None => page
                        .list_tabs()
                        .await?
                        .iter()
                        .find(|t| t.active)
                        .map_or(0, |t| t.index),
                };
                page.close_tab(index).await.map_err(tab_error)?;
                let tab_count = page.list_tabs().await?.len();
                tracing::info!(index, tab_count, "closed tab");
                Ok(result.with_data(json!({ "tab_count": tab_count })))
            },
            "switch" => {
                let index = required(p.tab_index, "tab_index")?;
                page.switch_tab(index).await.map_err(tab_error)?;
                let url = page.current_url().await?;
                Ok(result.with_data(json!({ "current_tab": index, "url": url })))
            },
            "list" => {
                let tabs = page.list_tabs().await?;
                let count = tabs.len();
                let tabs: Vec<Value> = tabs
                    .into_iter()
                    .map(|t| json!({"index": t.index, "url": t.url, "title": t.title, "active": t.active}))
                    .collect();
                Ok(result.with_data(tabs).with_meta("tab_count", count))
            },
            "reload" => {
                page.reload(millis(RELOAD_TIMEOUT_MS)).await?;
                let url = page.current_url().await?;
                Ok(result.with_data(json!({ "url": url })))
            },
            other => Err(ActionError::Validation(format!("Unknown operation: {other}"))),
        }
    }
}

#[async_trait]
impl Action for TabAction {
    fn name(&self) -> &str {
        "tab"
    }

    fn description(&self) -> &str {
        "Manage browser tabs: new, close, switch, list, reload"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "operation": {"type": "string", "enum": ["new", "close", "switch", "list", "reload"]},
                "url": {"type": "string", "description": "URL for a new tab"},
                "tab_index": {"type": "integer", "description": "0-based tab index for close/switch"}
            },
            "required": ["operation"]
        })
    }

    async fn execute(&self, ctx: &ActionContext<'_>, params: &Params) -> ActionResult {
        finish(self.name(), self.run(ctx, params).await)
    }
}
