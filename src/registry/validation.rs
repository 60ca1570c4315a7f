//! Command envelope validation.
//!
//! Runs before any handler code: a payload either yields a [`Command`] naming
//! its operation, or a [`ValidationError`] saying why it was rejected.

use std::sync::LazyLock;

use serde_json::{Map, Value};
use thiserror::Error;

use super::payload::Payload;

/// Payload key naming the requested operation.
pub const OPERATION_KEY: &str = "operation";

static EMPTY_FIELDS: LazyLock<Map<String, Value>> = LazyLock::new(Map::new);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("payload is null")]
    NullPayload,
    #[error("payload must be an object, got {found}")]
    NotAnObject { found: &'static str },
    #[error("'operation' parameter is required")]
    MissingOperation,
    #[error("'operation' must be a string, got {found}")]
    OperationNotString { found: &'static str },
    #[error("'operation' must not be empty")]
    EmptyOperation,
}

pub type ValidationResult<'a> = Result<Command<'a>, ValidationError>;

/// A validated request: an operation name plus read-only access to the
/// payload it came from.
#[derive(Debug, Clone, Copy)]
pub struct Command<'a> {
    operation: &'a str,
    args: Payload<'a>,
}

impl<'a> Command<'a> {
    /// The operation name, verbatim and case-sensitive.
    pub fn operation(&self) -> &'a str {
        self.operation
    }

    /// All payload fields, `operation` included.
    pub fn args(&self) -> Payload<'a> {
        self.args
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Validate an inbound payload. Pure: nothing is logged or mutated.
pub fn validate(payload: Option<&Value>) -> ValidationResult<'_> {
    let fields = match payload {
        None | Some(Value::Null) => return Err(ValidationError::NullPayload),
        Some(Value::Object(fields)) => fields,
        Some(other) => {
            return Err(ValidationError::NotAnObject {
                found: kind_name(other),
            })
        }
    };
    validate_fields(fields, None)
}

/// Like [`validate`], for handlers that accept a missing payload or a missing
/// `operation` key: those are routed to `default_operation`. An explicit
/// `"operation": null` is rejected as in [`validate`].
pub fn validate_with_default<'a>(
    payload: Option<&'a Value>,
    default_operation: &'static str,
) -> ValidationResult<'a> {
    let fields = match payload {
        None | Some(Value::Null) => &*EMPTY_FIELDS,
        Some(Value::Object(fields)) => fields,
        Some(other) => {
            return Err(ValidationError::NotAnObject {
                found: kind_name(other),
            })
        }
    };
    validate_fields(fields, Some(default_operation))
}

fn validate_fields<'a>(
    fields: &'a Map<String, Value>,
    default_operation: Option<&'static str>,
) -> ValidationResult<'a> {
    let operation = match (fields.get(OPERATION_KEY), default_operation) {
        (None, Some(default)) => default,
        (None, None) => return Err(ValidationError::MissingOperation),
        (Some(Value::Null), _) => return Err(ValidationError::EmptyOperation),
        (Some(Value::String(op)), _) => op.as_str(),
        (Some(other), _) => {
            return Err(ValidationError::OperationNotString {
                found: kind_name(other),
            })
        }
    };
    if operation.trim().is_empty() {
        return Err(ValidationError::EmptyOperation);
    }
    Ok(Command {
        operation,
        args: Payload::new(fields),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn null_and_absent_payloads_are_rejected() {
        assert_eq!(validate(None).unwrap_err(), ValidationError::NullPayload);
        assert_eq!(validate(Some(&Value::Null)).unwrap_err(), ValidationError::NullPayload);
        assert_eq!(ValidationError::NullPayload.to_string(), "payload is null");
    }

    #[test]
    fn non_object_payloads_are_rejected() {
        let err = validate(Some(&json!([1, 2]))).unwrap_err();
        assert_eq!(err, ValidationError::NotAnObject { found: "array" });
    }

    #[test]
    fn missing_operation_mentions_operation() {
        let err = validate(Some(&json!({}))).unwrap_err();
        assert_eq!(err, ValidationError::MissingOperation);
        assert!(err.to_string().contains("operation"));
    }

    #[test]
    fn blank_null_and_non_string_operations_are_rejected() {
        for bad in [json!({ "operation": "" }), json!({ "operation": "  \t" }), json!({ "operation": null })] {
            assert_eq!(validate(Some(&bad)).unwrap_err(), ValidationError::EmptyOperation);
        }
        let err = validate(Some(&json!({ "operation": 5 }))).unwrap_err();
        assert_eq!(err, ValidationError::OperationNotString { found: "number" });
    }

    #[test]
    fn operation_passes_through_verbatim() {
        let payload = json!({ "operation": "CreateObject", "name": "Cube" });
        let cmd = validate(Some(&payload)).unwrap();
        assert_eq!(cmd.operation(), "CreateObject");
        assert_eq!(cmd.args().str("name"), Some("Cube"));
    }

    #[test]
    fn default_operation_covers_null_payload_only_when_declared() {
        let cmd = validate_with_default(None, "status").unwrap();
        assert_eq!(cmd.operation(), "status");
        assert!(cmd.args().fields().is_empty());

        let verbose = json!({ "verbose": true });
        let cmd = validate_with_default(Some(&verbose), "status").unwrap();
        assert_eq!(cmd.operation(), "status");
        assert!(cmd.args().bool_or("verbose", false));

        let explicit = json!({ "operation": "reset" });
        assert_eq!(validate_with_default(Some(&explicit), "status").unwrap().operation(), "reset");

        let blank = json!({ "operation": " " });
        assert!(validate_with_default(Some(&blank), "status").is_err());

        // Only an absent key falls back; an explicit null is still invalid
        let null_op = json!({ "operation": null });
        assert_eq!(
            validate_with_default(Some(&null_op), "status").unwrap_err(),
            ValidationError::EmptyOperation
        );
    }
}
