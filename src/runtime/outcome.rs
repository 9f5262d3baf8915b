//! Uniform handler return contract.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Key/value payload a handler may return; merged into the action context.
pub type ResultMap = HashMap<String, String>;

/// `{ success, result?, error? }` returned by every handler and by the
/// collaborator at the end of a tool-calling conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    /// True when the action completed.
    pub success: bool,
    /// Query output, present only for data-returning actions.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_result_map"
    )]
    pub result: Option<ResultMap>,
    /// Failure description when `success` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionOutcome {
    /// Successful outcome without output.
    pub fn ok() -> Self {
        Self {
            success: true,
            result: None,
            error: None,
        }
    }

    /// Successful outcome carrying a result map.
    pub fn with_result(result: ResultMap) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    /// Failed outcome with a message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(message.into()),
        }
    }

    /// Error message, or a placeholder when the handler gave none.
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("unknown error")
    }
}

/// Accepts `null`, or an object whose scalar values are stringified.
fn deserialize_result_map<'de, D>(deserializer: D) -> Result<Option<ResultMap>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<HashMap<String, serde_json::Value>> = Option::deserialize(deserializer)?;
    Ok(raw.map(|map| {
        map.into_iter()
            .map(|(key, value)| {
                let text = match value {
                    serde_json::Value::String(s) => s,
                    serde_json::Value::Null => String::new(),
                    other => other.to_string(),
                };
                (key, text)
            })
            .collect()
    }))
}
