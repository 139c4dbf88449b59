//! The [`Action`] trait and the helpers concrete actions share.

use std::time::Duration;

use {
    async_trait::async_trait,
    serde::{Deserialize, de::DeserializeOwned},
    serde_json::Value,
    wayfarer_browser::{Locator, PageDriver},
};

use crate::{
    error::{ActionError, Result},
    registry::ActionRegistry,
    result::{ActionResult, Params},
};

/// What an action may touch while it runs: the active page, and the registry
/// (for actions that run other actions).
#[derive(Clone, Copy)]
pub struct ActionContext<'a> {
    pub page: &'a dyn PageDriver,
    pub registry: &'a ActionRegistry,
}

/// A named unit of browser interaction.
///
/// `execute` never fails: every error is folded into the returned
/// [`ActionResult`]. Implementors usually write a fallible `run` and wrap it
/// with [`finish`].
#[async_trait]
pub trait Action: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema for the accepted parameters.
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, ctx: &ActionContext<'_>, params: &Params) -> ActionResult;
}

/// Deserializes params into an action's typed parameter struct.
pub fn parse_params<T: DeserializeOwned>(params: &Params) -> Result<T> {
    serde_json::from_value(Value::Object(params.clone()))
        .map_err(|e| ActionError::Validation(format!("invalid parameters: {e}")))
}

pub fn required<T>(value: Option<T>, name: &str) -> Result<T> {
    value.ok_or_else(|| ActionError::missing(&[name]))
}

/// Folds a fallible action body into an [`ActionResult`].
pub fn finish(name: &str, outcome: Result<ActionResult>) -> ActionResult {
    match outcome {
        Ok(result) => result,
        Err(err) => {
            tracing::debug!(action = name, error = %err, "action failed");
            ActionResult::failed(name, &err)
        },
    }
}

pub(crate) fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

/// Element addressing shared by click, type_text and scroll.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Target {
    pub selector: Option<String>,
    pub text: Option<String>,
    pub role: Option<String>,
    #[serde(alias = "role_name")]
    pub name: Option<String>,
}

impl Target {
    /// Role wins over selector, selector over text.
    pub fn locator(&self) -> Option<Locator> {
        if let Some(role) = self.role.as_deref().filter(|r| !r.is_empty()) {
            return Some(Locator::role(role, self.name.clone()));
        }
        if let Some(selector) = self.selector.as_deref().filter(|s| !s.is_empty()) {
            return Some(Locator::css(selector));
        }
        self.text
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(Locator::text)
    }

    pub fn describe(&self) -> Params {
        let mut meta = Params::new();
        for (key, value) in [
            ("role", &self.role),
            ("name", &self.name),
            ("selector", &self.selector),
            ("text", &self.text),
        ] {
            if let Some(v) = value {
                meta.insert(key.into(), Value::String(v.clone()));
            }
        }
        meta
    }
}

/// Truncates to at most `max` characters.
pub(crate) fn clip(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use {super::*, serde_json::json};

    fn target(v: Value) -> Target {
        parse_params(v.as_object().unwrap()).unwrap()
    }

    #[test]
    fn role_takes_precedence() {
        let t = target(json!({"role": "button", "role_name": "Go", "selector": "#go", "text": "Go"}));
        assert_eq!(t.locator(), Some(Locator::role("button", Some("Go".into()))));

        let t = target(json!({"selector": "#go", "text": "Go"}));
        assert_eq!(t.locator(), Some(Locator::css("#go")));

        let t = target(json!({"text": "Go"}));
        assert_eq!(t.locator(), Some(Locator::text("Go")));

        assert_eq!(target(json!({"selector": ""})).locator(), None);
    }

    #[test]
    fn bad_param_types_are_validation_errors() {
        let params = json!({"selector": 5});
        let err = parse_params::<Target>(params.as_object().unwrap()).unwrap_err();
        assert!(err.to_string().starts_with("invalid parameters"));
    }

    #[test]
    fn clip_counts_chars() {
        assert_eq!(clip("héllo", 2), "hé");
        assert_eq!(clip("ab", 10), "ab");
    }
}
