//! Tasks in, results out.

use {
    serde::{Deserialize, Serialize},
    serde_json::Value,
};

use crate::error::{ActionError, ErrorKind};

/// Action parameters as they appear in a plan.
pub type Params = serde_json::Map<String, Value>;

/// One step of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub action: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub params: Params,
}

impl Task {
    pub fn new(action: impl Into<String>, params: Params) -> Self {
        Self {
            action: action.into(),
            description: String::new(),
            params,
        }
    }

    /// Accepts both `{action, description, params}` and the flat step form
    /// `{action, selector, ...}` used inside loop patterns. Keys outside
    /// `params` are merged in without overriding it.
    pub fn from_value(value: Value) -> Result<Self, ActionError> {
        let Value::Object(mut map) = value else {
            return Err(ActionError::Validation("task must be an object".into()));
        };
        let action = match map.remove("action") {
            Some(Value::String(name)) if !name.is_empty() => name,
            _ => return Err(ActionError::Validation("Action name not specified in step".into())),
        };
        let description = match map.remove("description") {
            Some(Value::String(d)) => d,
            _ => String::new(),
        };
        let params = match map.remove("params") {
            Some(Value::Object(mut params)) => {
                for (k, v) in map {
                    params.entry(k).or_insert(v);
                }
                params
            },
            _ => map,
        };
        Ok(Self {
            action,
            description,
            params,
        })
    }
}

/// Outcome of one action invocation. Failures are data, never panics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub success: bool,
    pub action_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default)]
    pub metadata: Params,
}

impl ActionResult {
    pub fn ok(action_name: impl Into<String>) -> Self {
        Self {
            success: true,
            action_name: action_name.into(),
            data: None,
            error: None,
            error_kind: None,
            metadata: Params::new(),
        }
    }

    pub fn failed(action_name: impl Into<String>, err: &ActionError) -> Self {
        Self {
            success: false,
            error: Some(err.to_string()),
            error_kind: Some(err.kind()),
            ..Self::ok(action_name)
        }
    }

    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !self.success && self.error_kind.is_none_or(ErrorKind::is_retryable)
    }
}
