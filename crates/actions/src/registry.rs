use std::{collections::HashMap, path::PathBuf, sync::Arc};

use {serde_json::Value, wayfarer_browser::PageDriver};

use crate::{
    action::{Action, ActionContext},
    click::ClickAction,
    error::ActionError,
    extract::ExtractAction,
    inspect::InspectAction,
    navigate::NavigateAction,
    pattern_loop::LoopAction,
    reload::ReloadAction,
    result::{ActionResult, Task},
    screenshot::ScreenshotAction,
    scroll::ScrollAction,
    tab::TabAction,
    type_text::TypeTextAction,
    wait::WaitAction,
};

/// Actions keyed by name. A lookup miss is an [`ActionError::UnknownAction`];
/// there is no fallback action.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in action. Screenshots land in
    /// `screenshots_dir`.
    pub fn with_builtins(screenshots_dir: impl Into<PathBuf>) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(NavigateAction));
        registry.register(Arc::new(ClickAction));
        registry.register(Arc::new(TypeTextAction));
        registry.register(Arc::new(ExtractAction));
        registry.register(Arc::new(WaitAction));
        registry.register(Arc::new(LoopAction));
        registry.register(Arc::new(ReloadAction));
        registry.register(Arc::new(TabAction));
        registry.register(Arc::new(ScrollAction));
        registry.register(Arc::new(ScreenshotAction::new(screenshots_dir)));
        registry.register(Arc::new(InspectAction));
        registry
    }

    /// Adds or replaces the action registered under its name.
    pub fn register(&mut self, action: Arc<dyn Action>) {
        self.actions.insert(action.name().to_string(), action);
    }

    pub fn unregister(&mut self, name: &str) -> bool {
        self.actions.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.actions.keys().cloned().collect();
        names.sort();
        names
    }

    /// `{name, description, parameters}` for every action, sorted by name.
    pub fn list_schemas(&self) -> Vec<Value> {
        let mut schemas: Vec<Value> = self
            .actions
            .values()
            .map(|a| {
                serde_json::json!({
                    "name": a.name(),
                    "description": a.description(),
                    "parameters": a.parameters_schema(),
                })
            })
            .collect();
        schemas.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
        schemas
    }

    /// Runs one task against `page`.
    pub async fn execute(&self, page: &dyn PageDriver, task: &Task) -> ActionResult {
        let Some(action) = self.actions.get(&task.action) else {
            tracing::warn!(action = %task.action, "unknown action");
            return ActionResult::failed(
                task.action.clone(),
                &ActionError::UnknownAction(task.action.clone()),
            );
        };
        let ctx = ActionContext {
            page,
            registry: self,
        };
        action.execute(&ctx, &task.params).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        crate::{error::ErrorKind, result::Params},
        async_trait::async_trait,
        serde_json::json,
        wayfarer_browser::mock::MockPage,
    };

    struct Echo;

    #[async_trait]
    impl Action for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Returns its params"
        }

        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }

        async fn execute(&self, _ctx: &ActionContext<'_>, params: &Params) -> ActionResult {
            ActionResult::ok("echo").with_data(Value::Object(params.clone()))
        }
    }

    #[test]
    fn builtins_are_registered() {
        let registry = ActionRegistry::with_builtins("shots");
        assert_eq!(registry.names(), vec![
            "click",
            "extract",
            "inspect",
            "loop",
            "navigate",
            "reload",
            "screenshot",
            "scroll",
            "tab",
            "type_text",
            "wait",
        ]);
        let schemas = registry.list_schemas();
        assert_eq!(schemas.len(), 11);
        assert_eq!(schemas[0]["name"], "click");
        assert_eq!(schemas[0]["parameters"]["type"], "object");
    }

    #[tokio::test]
    async fn unknown_action_is_reported_not_defaulted() {
        let registry = ActionRegistry::with_builtins("shots");
        let page = MockPage::blank();
        let result = registry
            .execute(&page, &Task::new("teleport", Params::new()))
            .await;
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::UnknownAction));
        assert_eq!(result.error.as_deref(), Some("Unknown action: teleport"));
        assert!(page.calls().is_empty());
    }

    #[tokio::test]
    async fn custom_actions_can_be_added_and_removed() {
        let mut registry = ActionRegistry::new();
        registry.register(Arc::new(Echo));
        let page = MockPage::blank();
        let params = json!({"x": 1}).as_object().cloned().unwrap();
        let result = registry.execute(&page, &Task::new("echo", params)).await;
        assert!(result.success);
        assert_eq!(result.data, Some(json!({"x": 1})));

        assert!(registry.unregister("echo"));
        assert!(!registry.contains("echo"));
    }
}
