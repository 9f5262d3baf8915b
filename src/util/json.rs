//! Helpers for pulling a JSON object out of free-form model output.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::runtime::error::{LlmError, LlmResult};

/// Slice from the first `{` to the last `}` in `text`, if any.
pub fn find_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Extract and decode the JSON object embedded in `text`.
///
/// Models often wrap JSON in prose or code fences; everything outside the
/// outermost braces is ignored. No object, or an undecodable one, is a
/// [`LlmError::ResponseParse`].
pub fn parse_json_object(text: &str) -> LlmResult<Value> {
    let Some(raw) = find_json_object(text) else {
        return Err(LlmError::ResponseParse(format!("No JSON string found in: {}", text)));
    };
    serde_json::from_str(raw)
        .map_err(|err| LlmError::ResponseParse(format!("{} in: {}", err, text)))
}

/// Extract the embedded JSON object and decode it as `T`.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> LlmResult<T> {
    let value = parse_json_object(text)?;
    serde_json::from_value(value)
        .map_err(|err| LlmError::ResponseParse(format!("{} in: {}", err, text)))
}
