//! Goal → task list boundary.
//!
//! Natural-language planning lives outside this workspace. [`PlanFile`] is the
//! static planner used by the CLI: it reads a prepared plan from disk.

use std::path::Path;

use {async_trait::async_trait, serde_json::Value, wayfarer_actions::Task};

use crate::error::{PlanError, Result};

#[async_trait]
pub trait Planner: Send + Sync {
    /// Produces an ordered task list for `goal`. `context` carries optional
    /// page state from a previous run.
    async fn plan(&self, goal: &str, context: Option<&Value>) -> Result<Vec<Task>>;
}

/// A plan prepared ahead of time, as `{"goal": ..., "tasks": [...]}` or a bare
/// task list, in JSON or YAML.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanFile {
    pub goal: Option<String>,
    pub tasks: Vec<Task>,
}

impl PlanFile {
    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| PlanError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml" | "yml")
        );
        let plan = Self::parse(&raw, yaml)?;
        tracing::debug!(path = %path.display(), tasks = plan.tasks.len(), "loaded plan file");
        Ok(plan)
    }

    pub fn parse(raw: &str, yaml: bool) -> Result<Self> {
        let value: Value = if yaml {
            serde_yaml::from_str(raw)?
        } else {
            serde_json::from_str(raw)?
        };
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let (goal, steps) = match value {
            Value::Array(steps) => (None, steps),
            Value::Object(mut map) => {
                let goal = map.get("goal").and_then(Value::as_str).map(str::to_string);
                match map.remove("tasks") {
                    Some(Value::Array(steps)) => (goal, steps),
                    _ => return Err(PlanError::Invalid("plan has no `tasks` list".into())),
                }
            },
            _ => {
                return Err(PlanError::Invalid(
                    "plan must be a task list or an object with `tasks`".into(),
                ));
            },
        };
        let tasks = steps
            .into_iter()
            .enumerate()
            .map(|(index, step)| {
                Task::from_value(step).map_err(|e| PlanError::InvalidTask {
                    index,
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { goal, tasks })
    }
}

#[async_trait]
impl Planner for PlanFile {
    async fn plan(&self, goal: &str, _context: Option<&Value>) -> Result<Vec<Task>> {
        if let Some(planned) = self.goal.as_deref()
            && planned != goal
        {
            tracing::debug!(%goal, %planned, "plan file was written for a different goal");
        }
        Ok(self.tasks.clone())
    }
}
