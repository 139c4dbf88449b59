use {
    async_trait::async_trait,
    serde::Deserialize,
    serde_json::{Value, json},
    wayfarer_browser::ScrollEdge,
};

use crate::{
    action::{Action, ActionContext, Target, finish, millis, parse_params},
    error::{ActionError, Result},
    result::{ActionResult, Params},
};

#[derive(Debug, Deserialize)]
struct ScrollParams {
    selector: Option<String>,
    role: Option<String>,
    #[serde(alias = "role_name")]
    name: Option<String>,
    #[serde(default)]
    to_top: bool,
    #[serde(default)]
    to_bottom: bool,
    #[serde(default = "default_direction")]
    direction: String,
    #[serde(default = "default_pixels")]
    pixels: i64,
    #[serde(default = "yes")]
    smooth: bool,
    #[serde(default = "default_timeout")]
    timeout: u64,
}

fn default_direction() -> String {
    "down".into()
}

fn default_pixels() -> i64 {
    500
}

fn yes() -> bool {
    true
}

fn default_timeout() -> u64 {
    10_000
}

fn delta(direction: &str, pixels: i64) -> Option<(i64, i64)> {
    match direction {
        "down" => Some((0, pixels)),
        "up" => Some((0, -pixels)),
        "right" => Some((pixels, 0)),
        "left" => Some((-pixels, 0)),
        _ => None,
    }
}

/// Scrolls an element into view, to an edge of the page, or by an offset.
pub struct ScrollAction;

impl ScrollAction {
    async fn run(&self, ctx: &ActionContext<'_>, params: &Params) -> Result<ActionResult> {
        let p: ScrollParams = parse_params(params)?;
        let result = ActionResult::ok(self.name());

        let target = Target {
            selector: p.selector,
            text: None,
            role: p.role,
            name: p.name,
        };
        if let Some(locator) = target.locator() {
            ctx.page.scroll_into_view(&locator, millis(p.timeout)).await?;
            return Ok(result.with_meta("scrolled_to", locator.to_string()));
        }
        if p.to_top {
            ctx.page.scroll_to(ScrollEdge::Top, p.smooth).await?;
            return Ok(result.with_meta("position", "top"));
        }
        if p.to_bottom {
            ctx.page.scroll_to(ScrollEdge::Bottom, p.smooth).await?;
            return Ok(result.with_meta("position", "bottom"));
        }

        let direction = p.direction.to_lowercase();
        let (dx, dy) = delta(&direction, p.pixels).ok_or_else(|| {
            ActionError::Validation(format!(
                "Invalid direction: {direction}. Use up, down, left, right"
            ))
        })?;
        ctx.page.scroll_by(dx, dy, p.smooth).await?;
        Ok(result
            .with_meta("direction", direction)
            .with_meta("pixels", p.pixels))
    }
}

#[async_trait]
impl Action for ScrollAction {
    fn name(&self) -> &str {
        "scroll"
    }

    fn description(&self) -> &str {
        "Scroll the page by an offset, to the top or bottom, or to an element"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "selector": {"type": "string", "description": "Element to scroll into view"},
                "role": {"type": "string"},
                "name": {"type": "string"},
                "to_top": {"type": "boolean"},
                "to_bottom": {"type": "boolean"},
                "direction": {"type": "string", "enum": ["up", "down", "left", "right"]},
                "pixels": {"type": "integer", "description": "Default 500"},
                "smooth": {"type": "boolean", "description": "Default true"}
            }
        })
    }

    async fn execute(&self, ctx: &ActionContext<'_>, params: &Params) -> ActionResult {
        finish(self.name(), self.run(ctx, params).await)
    }
}
