//! Structural inspection of the current page.
//!
//! The interactive-element listing has two tiers: the accessibility tree when
//! the driver advertises it, otherwise a selector heuristic. The tier used is
//! reported in `metadata.tier`.

use {
    async_trait::async_trait,
    serde::Deserialize,
    serde_json::{Value, json},
    wayfarer_browser::{BrowserError, InteractiveElement, PageDriver, ax_tree},
};

use crate::{
    action::{Action, ActionContext, clip, finish, parse_params},
    error::Result,
    result::{ActionResult, Params},
};

const MAX_AX_DEPTH: usize = 10;
const MAX_ELEMENTS: usize = 50;
const MAX_LINKS: usize = 30;
const MAX_BUTTONS: usize = 20;
const MAX_INPUTS: usize = 20;

const LINK_SELECTOR: &str = "a[href]";
const BUTTON_SELECTOR: &str = "button, input[type='submit'], [role='button']";
const INPUT_SELECTOR: &str = "input, textarea, select";

/// Container selectors probed for `suggested_selectors`.
pub const COMMON_SELECTORS: &[&str] = &[
    "article", ".post", ".card", ".item", "table", "tr", "ul li", "ol li", "h1", "h2", "h3",
    "p", ".content", ".main", "#content",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    AccessibilityTree,
    SelectorFallback,
}

impl Tier {
    fn as_str(self) -> &'static str {
        match self {
            Self::AccessibilityTree => "accessibility_tree",
            Self::SelectorFallback => "selector_fallback",
        }
    }
}

#[derive(Debug, Deserialize)]
struct InspectParams {
    #[serde(default = "yes")]
    find_elements: bool,
    #[serde(default)]
    get_links: bool,
    #[serde(default)]
    get_buttons: bool,
    #[serde(default)]
    get_inputs: bool,
    selector: Option<String>,
}

fn yes() -> bool {
    true
}

async fn interactive(page: &dyn PageDriver) -> Result<(Vec<InteractiveElement>, Tier)> {
    if page.capabilities().accessibility_tree {
        match page.accessibility_tree().await {
            Ok(root) => {
                let found = ax_tree::interactive_elements(&root, MAX_AX_DEPTH, MAX_ELEMENTS);
                return Ok((found, Tier::AccessibilityTree));
            },
            Err(BrowserError::Unsupported(what)) => {
                tracing::debug!(%what, "accessibility tree unavailable, using selectors");
            },
            Err(e) => return Err(e.into()),
        }
    }
    Ok((fallback_elements(page).await?, Tier::SelectorFallback))
}

async fn fallback_elements(page: &dyn PageDriver) -> Result<Vec<InteractiveElement>> {
    let element = |role: &str, name: &str| InteractiveElement {
        role: role.to_string(),
        name: clip(name, 50),
        focused: false,
    };
    let mut out = Vec::new();
    for el in page.query_all(LINK_SELECTOR, 20).await? {
        if !el.text.is_empty() {
            out.push(element("link", &el.text));
        }
    }
    for el in page.query_all("button, [role='button']", 10).await? {
        if !el.text.is_empty() {
            out.push(element("button", &el.text));
        }
    }
    for el in page.query_all("input, textarea", 10).await? {
        let name = ["placeholder", "name", "aria-label"]
            .iter()
            .find_map(|a| el.attributes.get(*a).filter(|v| !v.is_empty()))
            .map_or("input", String::as_str);
        out.push(element("textbox", name));
    }
    out.truncate(MAX_ELEMENTS);
    Ok(out)
}

async fn links(page: &dyn PageDriver) -> Result<Vec<Value>> {
    Ok(page
        .query_all(LINK_SELECTOR, MAX_LINKS)
        .await?
        .into_iter()
        .map(|el| {
            let href = el
                .link
                .or_else(|| el.attributes.get("href").cloned())
                .unwrap_or_default();
            json!({"text": clip(&el.text, 50), "href": clip(&href, 200)})
        })
        .collect())
}

async fn buttons(page: &dyn PageDriver) -> Result<Vec<Value>> {
    Ok(page
        .query_all(BUTTON_SELECTOR, MAX_BUTTONS)
        .await?
        .into_iter()
        .map(|el| {
            let text = if el.text.is_empty() {
                el.attributes.get("value").cloned().unwrap_or_default()
            } else {
                el.text
            };
            json!({ "text": clip(&text, 50) })
        })
        .collect())
}

async fn inputs(page: &dyn PageDriver) -> Result<Vec<Value>> {
    Ok(page
        .query_all(INPUT_SELECTOR, MAX_INPUTS)
        .await?
        .into_iter()
        .map(|el| {
            let attr = |name: &str| el.attributes.get(name).cloned();
            json!({
                "name": attr("name").unwrap_or_default(),
                "type": attr("type").unwrap_or_else(|| "text".into()),
                "placeholder": clip(&attr("placeholder").unwrap_or_default(), 50),
            })
        })
        .collect())
}

async fn suggested_selectors(page: &dyn PageDriver) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for selector in COMMON_SELECTORS {
        let count = page.count(selector).await?;
        if count > 0 {
            out.push(format!("{selector} ({count})"));
        }
    }
    Ok(out)
}

/// Strips the `" (<count>)"` suffix from a suggested selector.
pub fn suggestion_selector(suggestion: &str) -> &str {
    match suggestion.rsplit_once(" (") {
        Some((selector, rest)) if rest.ends_with(')') => selector,
        _ => suggestion,
    }
}

/// Reports what is on the page so later steps can pick selectors.
pub struct InspectAction;

impl InspectAction {
    async fn run(&self, ctx: &ActionContext<'_>, params: &Params) -> Result<ActionResult> {
        let p: InspectParams = parse_params(params)?;
        let page = ctx.page;
        let url = page.current_url().await?;
        let mut data = Params::new();
        data.insert("url".into(), Value::String(url.clone()));
        data.insert("title".into(), Value::String(page.title().await?));
        let mut result = ActionResult::ok(self.name()).with_meta("url", url);

        if let Some(selector) = p.selector.filter(|s| !s.is_empty()) {
            let count = page.count(&selector).await?;
            data.insert(
                "selector_test".into(),
                json!({"selector": selector, "found": count > 0, "count": count}),
            );
        }
        if p.find_elements {
            let (elements, tier) = interactive(page).await?;
            tracing::debug!(tier = tier.as_str(), count = elements.len(), "listed interactive elements");
            data.insert("interactive_elements".into(), json!(elements));
            result = result.with_meta("tier", tier.as_str());
        }
        if p.get_links {
            data.insert("links".into(), Value::Array(links(page).await?));
        }
        if p.get_buttons {
            data.insert("buttons".into(), Value::Array(buttons(page).await?));
        }
        if p.get_inputs {
            data.insert("inputs".into(), Value::Array(inputs(page).await?));
        }
        data.insert("suggested_selectors".into(), json!(suggested_selectors(page).await?));

        Ok(result.with_data(Value::Object(data)))
    }
}

#[async_trait]
impl Action for InspectAction {
    fn name(&self) -> &str {
        "inspect"
    }

    fn description(&self) -> &str {
        "Inspect the page: interactive elements, links, buttons, inputs and likely content selectors"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "find_elements": {"type": "boolean", "description": "List interactive elements (default true)"},
                "get_links": {"type": "boolean"},
                "get_buttons": {"type": "boolean"},
                "get_inputs": {"type": "boolean"},
                "selector": {"type": "string", "description": "Selector to test for existence"}
            }
        })
    }

    async fn execute(&self, ctx: &ActionContext<'_>, params: &Params) -> ActionResult {
        finish(self.name(), self.run(ctx, params).await)
    }
}
