use std::path::PathBuf;

use {
    async_trait::async_trait,
    serde::Deserialize,
    serde_json::{Value, json},
    wayfarer_browser::{BrowserError, ScreenshotTarget},
};

use crate::{
    action::{Action, ActionContext, finish, parse_params},
    error::{ActionError, Result},
    result::{ActionResult, Params},
};

#[derive(Debug, Deserialize)]
struct ScreenshotParams {
    filename: Option<String>,
    selector: Option<String>,
    #[serde(default)]
    full_page: bool,
}

fn file_name(requested: Option<&str>) -> String {
    let name = match requested.filter(|n| !n.is_empty()) {
        Some(name) => name.to_string(),
        None => format!(
            "screenshot_{}",
            chrono::Local::now().format("%Y%m%d_%H%M%S")
        ),
    };
    if name.to_ascii_lowercase().ends_with(".png") {
        name
    } else {
        format!("{name}.png")
    }
}

/// Captures the viewport, the full page, or one element as PNG.
pub struct ScreenshotAction {
    dir: PathBuf,
}

impl ScreenshotAction {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    async fn run(&self, ctx: &ActionContext<'_>, params: &Params) -> Result<ActionResult> {
        let p: ScreenshotParams = parse_params(params)?;
        let target = match (p.selector.filter(|s| !s.is_empty()), p.full_page) {
            (Some(selector), _) => ScreenshotTarget::Element(selector),
            (None, true) => ScreenshotTarget::FullPage,
            (None, false) => ScreenshotTarget::Viewport,
        };

        let bytes = ctx.page.screenshot(&target).await.map_err(|e| match e {
            BrowserError::ElementNotFound(sel) => {
                ActionError::Interaction(format!("Element not found: {sel}"))
            },
            other => other.into(),
        })?;

        let path = self.dir.join(file_name(p.filename.as_deref()));
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            ActionError::Interaction(format!("failed to create {}: {e}", self.dir.display()))
        })?;
        tokio::fs::write(&path, &bytes).await.map_err(|e| {
            ActionError::Interaction(format!("failed to write {}: {e}", path.display()))
        })?;
        tracing::info!(path = %path.display(), bytes = bytes.len(), "saved screenshot");

        let path = path.display().to_string();
        let mut result = ActionResult::ok(self.name())
            .with_data(json!({ "path": path }))
            .with_meta("full_page", p.full_page);
        if let ScreenshotTarget::Element(selector) = target {
            result = result.with_meta("selector", selector);
        }
        Ok(result)
    }
}

#[async_trait]
impl Action for ScreenshotAction {
    fn name(&self) -> &str {
        "screenshot"
    }

    fn description(&self) -> &str {
        "Save a PNG screenshot of the viewport, the full page, or one element"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "filename": {"type": "string", "description": "Defaults to a timestamped name; .png is appended"},
                "selector": {"type": "string", "description": "Capture only this element"},
                "full_page": {"type": "boolean", "description": "Default false"}
            }
        })
    }

    async fn execute(&self, ctx: &ActionContext<'_>, params: &Params) -> ActionResult {
        finish(self.name(), self.run(ctx, params).await)
    }
}
