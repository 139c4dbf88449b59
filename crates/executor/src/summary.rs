use std::path::PathBuf;

use {
    serde::{Deserialize, Serialize},
    serde_json::Value,
    uuid::Uuid,
    wayfarer_actions::Task,
};

/// Output of one successful extraction-class task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectedItem {
    pub action: String,
    pub data: Value,
    #[serde(default)]
    pub save_as: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedTask {
    pub task: Task,
    pub error: String,
    /// 0-based position in the plan.
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub success: bool,
    pub goal: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_task: Option<FailedTask>,
    /// Plan-level error, set when the plan could not run at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub collected_data: Vec<CollectedItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
}

impl ExecutionSummary {
    pub(crate) fn empty_plan(goal: &str) -> Self {
        Self {
            success: false,
            goal: goal.to_string(),
            session_id: None,
            total_tasks: 0,
            completed_tasks: 0,
            attempts: 0,
            failed_task: None,
            error: Some("No tasks to execute".into()),
            collected_data: Vec::new(),
            log_path: None,
        }
    }
}
