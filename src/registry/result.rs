use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `errorType` reported for rejected payloads, unknown operations and
/// unknown categories.
pub const VALIDATION_ERROR: &str = "ValidationError";
/// `errorType` reported when the compilation wait hits its bound.
pub const COMPILATION_TIMEOUT: &str = "CompilationTimeout";
/// `errorType` reported when the caller cancels the compilation wait.
pub const CANCELLED: &str = "Cancelled";
/// `errorType` reported when an operation body panics.
pub const PANIC: &str = "Panic";

/// Outcome of one command, serialized as a single flat JSON object.
///
/// `success` is always present and always a real boolean. Failures carry
/// `error` and `errorType`; successes carry the operation's own fields.
/// Both carry `category` once a handler was involved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl CommandResult {
    /// Successful result built from an operation's output fields.
    ///
    /// Envelope keys inside `data` are dropped: `category` is always the
    /// handler's, and a stray `success` cannot flip the outcome.
    pub fn success(category: &str, mut data: Map<String, Value>) -> Self {
        for key in ["success", "error", "errorType", "category"] {
            data.remove(key);
        }
        Self {
            success: true,
            error: None,
            error_type: None,
            category: Some(category.to_string()),
            data,
        }
    }

    pub fn failure(error: impl Into<String>, error_type: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            error_type: Some(error_type.into()),
            category: None,
            data: Map::new(),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({
                "success": false,
                "error": format!("Failed to serialize result: {e}"),
                "errorType": "Internal",
            })
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use serde_json::json;

    use super::*;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn success_serializes_flat() {
        let result = CommandResult::success("scene", map(json!({ "name": "Cube", "id": 12 })));
        let value = result.to_json();
        assert_eq!(value, json!({ "success": true, "category": "scene", "name": "Cube", "id": 12 }));
    }

    #[test]
    fn success_flag_cannot_be_spoofed_by_data() {
        let result = CommandResult::success("scene", map(json!({ "success": "yes", "error": "x" })));
        let value = result.to_json();
        assert_eq!(value["success"], json!(true));
        assert!(value.get("error").is_none());
    }

    #[test]
    fn operation_cannot_rename_the_handler_category() {
        let result = CommandResult::success("scene", map(json!({ "category": "prefab", "id": 3 })));
        assert_eq!(result.category.as_deref(), Some("scene"));
        assert_eq!(
            result.to_json(),
            json!({ "success": true, "category": "scene", "id": 3 })
        );
    }

    #[test]
    fn failure_serializes_error_fields() {
        let result = CommandResult::failure("boom", "Internal").with_category("asset");
        assert_eq!(
            result.to_json(),
            json!({ "success": false, "error": "boom", "errorType": "Internal", "category": "asset" })
        );
    }

    #[test]
    fn deserializes_from_wire() {
        let result: CommandResult =
            serde_json::from_value(json!({ "success": true, "category": "bridge", "message": "pong" })).unwrap();
        assert!(result.is_success());
        assert_eq!(result.get("message"), Some(&json!("pong")));
        assert_eq!(result.category.as_deref(), Some("bridge"));
    }
}
