use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    serde_json::Value,
    uuid::Uuid,
    wayfarer_actions::{ActionResult, Params},
};

/// One recorded action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub action: String,
    #[serde(default)]
    pub params: Params,
    #[serde(rename = "result", default)]
    pub result_data: Option<Value>,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(action: &str, params: &Params, result: &ActionResult) -> Self {
        Self {
            action: action.to_string(),
            params: params.clone(),
            result_data: result.data.clone(),
            success: result.success,
            error: result.error.clone(),
            timestamp: Utc::now(),
        }
    }
}

/// A sealed run. Written once when the run ends and only read afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    pub goal: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: f64,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    pub action_count: usize,
    pub actions: Vec<LogEntry>,
}

/// Listing row for `wayfarer sessions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub goal: String,
    pub start_time: DateTime<Utc>,
    pub success: bool,
    pub action_count: usize,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            session_id: session.session_id,
            goal: session.goal.clone(),
            start_time: session.start_time,
            success: session.success,
            action_count: session.action_count,
        }
    }
}
