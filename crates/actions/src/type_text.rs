use std::time::Duration;

use {
    async_trait::async_trait,
    serde::Deserialize,
    serde_json::{Value, json},
    wayfarer_browser::{BrowserError, Locator, TypeOptions},
};

use crate::{
    action::{Action, ActionContext, Target, finish, millis, parse_params, required},
    error::{ActionError, Result},
    result::{ActionResult, Params},
};

/// Tried in order when no target is given.
const FALLBACK_INPUTS: &[(&str, &str)] = &[
    ("role", "combobox"),
    ("role", "searchbox"),
    ("role", "textbox"),
    ("css", r#"textarea[name="q"]"#),
    ("css", r#"input[name="q"]"#),
    ("css", r#"input[type="text"]"#),
];

const FALLBACK_PROBE: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct TypeTextParams {
    text: Option<String>,
    #[serde(flatten)]
    target: Target,
    #[serde(default = "yes")]
    clear_first: bool,
    #[serde(default = "default_delay")]
    delay: u64,
    #[serde(default)]
    press_enter: bool,
    #[serde(default = "default_timeout")]
    timeout: u64,
}

fn yes() -> bool {
    true
}

fn default_delay() -> u64 {
    30
}

fn default_timeout() -> u64 {
    10_000
}

fn fallback_locators() -> impl Iterator<Item = Locator> {
    FALLBACK_INPUTS.iter().map(|&(kind, value)| match kind {
        "role" => Locator::role(value, None),
        _ => Locator::css(value),
    })
}

/// Types into an input. Without a target, the first common search or text
/// input on the page is used.
pub struct TypeTextAction;

impl TypeTextAction {
    async fn run(&self, ctx: &ActionContext<'_>, params: &Params) -> Result<ActionResult> {
        let p: TypeTextParams = parse_params(params)?;
        let text = required(p.text.filter(|t| !t.is_empty()), "text")?;
        let target = p.target;
        let opts = TypeOptions {
            clear_first: p.clear_first,
            delay: millis(p.delay),
            timeout: millis(p.timeout),
        };

        let locator = match target.locator() {
            Some(locator) => {
                ctx.page.type_text(&locator, &text, &opts).await?;
                locator
            },
            None => self.type_into_fallback(ctx, &text, &opts).await?,
        };
        if p.press_enter {
            ctx.page.press_key(&locator, "Enter").await?;
        }
        tracing::debug!(%locator, chars = text.chars().count(), "typed text");

        let mut result = ActionResult::ok(self.name())
            .with_meta("text_length", text.chars().count())
            .with_meta("press_enter", p.press_enter);
        result.metadata.extend(target.describe());
        if target.locator().is_none() {
            result = result.with_meta("resolved", locator.to_string());
        }
        Ok(result)
    }

    async fn type_into_fallback(
        &self,
        ctx: &ActionContext<'_>,
        text: &str,
        opts: &TypeOptions,
    ) -> Result<Locator> {
        let probe = TypeOptions {
            timeout: opts.timeout.min(FALLBACK_PROBE),
            ..opts.clone()
        };
        for locator in fallback_locators() {
            match ctx.page.type_text(&locator, text, &probe).await {
                Ok(()) => return Ok(locator),
                Err(BrowserError::Timeout(_) | BrowserError::ElementNotFound(_)) => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(ActionError::Interaction("Could not find input element".into()))
    }
}

#[async_trait]
impl Action for TypeTextAction {
    fn name(&self) -> &str {
        "type_text"
    }

    fn description(&self) -> &str {
        "Type text into an input field, optionally pressing Enter"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": {"type": "string"},
                "role": {"type": "string", "description": "ARIA role, e.g. searchbox"},
                "name": {"type": "string"},
                "selector": {"type": "string"},
                "clear_first": {"type": "boolean", "description": "Default true"},
                "delay": {"type": "integer", "description": "Milliseconds between keystrokes (default 30)"},
                "press_enter": {"type": "boolean", "description": "Default false"},
                "timeout": {"type": "integer", "description": "Milliseconds (default 10000)"}
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, ctx: &ActionContext<'_>, params: &Params) -> ActionResult {
        finish(self.name(), self.run(ctx, params).await)
    }
}
