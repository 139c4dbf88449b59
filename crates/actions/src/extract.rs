use std::collections::BTreeMap;

use {
    async_trait::async_trait,
    serde::Deserialize,
    serde_json::{Value, json},
    wayfarer_browser::{ElementSnapshot, ElementState, FieldSpec},
};

use crate::{
    action::{Action, ActionContext, finish, millis, parse_params, required},
    error::Result,
    result::{ActionResult, Params},
};

/// Upper bound on items returned by one extraction.
pub const MAX_ITEMS: usize = 200;

#[derive(Debug, Deserialize)]
struct ExtractParams {
    selector: Option<String>,
    attribute: Option<String>,
    #[serde(default)]
    multiple: bool,
    save_as: Option<String>,
    #[serde(default = "default_timeout")]
    timeout: u64,
    extract_fields: Option<BTreeMap<String, FieldParams>>,
}

#[derive(Debug, Deserialize)]
struct FieldParams {
    selector: String,
    attribute: Option<String>,
}

fn default_timeout() -> u64 {
    5_000
}

/// One `{text, link, <attr>}` item; `None` when the element carries nothing.
fn item(el: &ElementSnapshot, attribute: Option<&str>) -> Option<Value> {
    let mut item = Params::new();
    if !el.text.is_empty() {
        item.insert("text".into(), Value::String(el.text.clone()));
    }
    if let Some(link) = &el.link {
        item.insert("link".into(), Value::String(link.clone()));
    }
    if let Some(attr) = attribute
        && let Some(value) = el.attributes.get(attr)
    {
        item.insert(attr.into(), Value::String(value.clone()));
    }
    (!item.is_empty()).then_some(Value::Object(item))
}

fn has_content(record: &Params) -> bool {
    record
        .values()
        .any(|v| !v.is_null() && v.as_str().is_none_or(|s| !s.trim().is_empty()))
}

/// Pulls text, attributes or multi-field records out of matching elements.
pub struct ExtractAction;

impl ExtractAction {
    async fn run(&self, ctx: &ActionContext<'_>, params: &Params) -> Result<ActionResult> {
        let p: ExtractParams = parse_params(params)?;
        let selector = required(p.selector.filter(|s| !s.is_empty()), "selector")?;

        ctx.page
            .wait_for_selector(&selector, ElementState::Visible, millis(p.timeout))
            .await?;

        let (data, count) = if let Some(fields) = p.extract_fields.filter(|f| !f.is_empty()) {
            let specs: Vec<FieldSpec> = fields
                .into_iter()
                .map(|(name, f)| FieldSpec {
                    name,
                    selector: f.selector,
                    attribute: f.attribute,
                })
                .collect();
            let records: Vec<Value> = ctx
                .page
                .query_fields(&selector, &specs, MAX_ITEMS)
                .await?
                .into_iter()
                .map(|record| record.into_iter().filter(|(_, v)| !v.is_null()).collect::<Params>())
                .filter(has_content)
                .map(Value::Object)
                .collect();
            let count = records.len();
            (Value::Array(records), count)
        } else if p.multiple {
            let items: Vec<Value> = ctx
                .page
                .query_all(&selector, MAX_ITEMS)
                .await?
                .iter()
                .filter_map(|el| item(el, p.attribute.as_deref()))
                .collect();
            let count = items.len();
            (Value::Array(items), count)
        } else {
            let first = ctx.page.query_all(&selector, 1).await?.into_iter().next();
            let value = first.and_then(|el| match &p.attribute {
                Some(attr) => el.attributes.get(attr).map(|v| v.trim().to_string()),
                None => Some(el.text),
            });
            let count = usize::from(value.is_some());
            (value.map_or(Value::Null, Value::String), count)
        };
        tracing::info!(%selector, count, "extracted");

        Ok(ActionResult::ok(self.name())
            .with_data(data)
            .with_meta("selector", selector)
            .with_meta("attribute", p.attribute)
            .with_meta("multiple", p.multiple)
            .with_meta("save_as", p.save_as)
            .with_meta("count", count))
    }
}

#[async_trait]
impl Action for ExtractAction {
    fn name(&self) -> &str {
        "extract"
    }

    fn description(&self) -> &str {
        "Extract text, attributes or multi-field records from elements matching a selector"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "selector": {"type": "string"},
                "attribute": {"type": "string", "description": "Attribute to read instead of text"},
                "multiple": {"type": "boolean", "description": "Extract every match (default false)"},
                "save_as": {"type": "string", "description": "Label for the collected data"},
                "timeout": {"type": "integer", "description": "Milliseconds (default 5000)"},
                "extract_fields": {
                    "type": "object",
                    "description": "Field name to {selector, attribute}, evaluated inside each match",
                    "additionalProperties": {
                        "type": "object",
                        "properties": {
                            "selector": {"type": "string"},
                            "attribute": {"type": "string"}
                        },
                        "required": ["selector"]
                    }
                }
            },
            "required": ["selector"]
        })
    }

    async fn execute(&self, ctx: &ActionContext<'_>, params: &Params) -> ActionResult {
        finish(self.name(), self.run(ctx, params).await)
    }
}
