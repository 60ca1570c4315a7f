//! Permissive, total accessors over command payloads.
//!
//! Clients are loose about numeric types (an integer may arrive as `3.0`,
//! a flag as `"true"`), so every conversion here falls back to a caller
//! supplied default instead of failing.

use serde_json::{Map, Value};

use crate::error::HandlerError;

/// Total conversions on a JSON value. None of them fail.
pub trait ValueExt {
    /// The string if this is a string, else `default`.
    fn as_string_or(&self, default: &str) -> String;
    /// Bools, `"true"`/`"false"` in any case, and the numbers 0 and 1.
    fn as_bool_or(&self, default: bool) -> bool;
    /// Integers, integral floats inside the i64 range, and numeric strings.
    fn as_int_or(&self, default: i64) -> i64;
    /// Any finite number, and numeric strings.
    fn as_float_or(&self, default: f64) -> f64;
}

impl ValueExt for Value {
    fn as_string_or(&self, default: &str) -> String {
        match self {
            Value::String(s) => s.clone(),
            _ => default.to_string(),
        }
    }

    fn as_bool_or(&self, default: bool) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => true,
                "false" => false,
                _ => default,
            },
            Value::Number(n) => match n.as_i64() {
                Some(1) => true,
                Some(0) => false,
                _ => default,
            },
            _ => default,
        }
    }

    fn as_int_or(&self, default: i64) -> i64 {
        match self {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    i
                } else if let Some(u) = n.as_u64() {
                    i64::try_from(u).unwrap_or(default)
                } else {
                    n.as_f64().and_then(integral_f64).unwrap_or(default)
                }
            }
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(integral_f64))
                    .unwrap_or(default)
            }
            _ => default,
        }
    }

    fn as_float_or(&self, default: f64) -> f64 {
        let parsed = match self {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed.filter(|f| f.is_finite()).unwrap_or(default)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn integral_f64(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is itself out of range
    if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Read-only view of a validated payload's fields.
#[derive(Debug, Clone, Copy)]
pub struct Payload<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> Payload<'a> {
    pub fn new(fields: &'a Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &'a Map<String, Value> {
        self.fields
    }

    pub fn get(&self, key: &str) -> Option<&'a Value> {
        self.fields.get(key)
    }

    /// True if `key` is present and not null.
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| !v.is_null())
    }

    pub fn str(&self, key: &str) -> Option<&'a str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn string_or(&self, key: &str, default: &str) -> String {
        self.get(key).map_or_else(|| default.to_string(), |v| v.as_string_or(default))
    }

    pub fn bool_or(&self, key: &str, default: bool) -> bool {
        self.get(key).map_or(default, |v| v.as_bool_or(default))
    }

    pub fn int_or(&self, key: &str, default: i64) -> i64 {
        self.get(key).map_or(default, |v| v.as_int_or(default))
    }

    pub fn float_or(&self, key: &str, default: f64) -> f64 {
        self.get(key).map_or(default, |v| v.as_float_or(default))
    }

    /// A required, non-blank string argument.
    pub fn require_str(&self, key: &str) -> Result<&'a str, HandlerError> {
        match self.str(key) {
            Some(s) if !s.trim().is_empty() => Ok(s),
            Some(_) => Err(HandlerError::invalid_argument(format!(
                "'{key}' must not be empty"
            ))),
            None => Err(HandlerError::invalid_argument(format!(
                "'{key}' parameter is required"
            ))),
        }
    }
}
