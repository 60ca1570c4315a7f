use thiserror::Error;

/// Crate-level error for fallible setup work: writing discovery records,
/// loading settings, building handlers and registries.
///
/// Command execution never returns this. Handler failures are reported
/// through [`crate::registry::CommandResult`] instead.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Could not resolve a home directory for per-user bridge files")]
    NoHomeDirectory,
    #[error("Handler '{category}' must support at least one operation")]
    EmptyOperationSet { category: String },
    #[error("Handler '{category}' registers operation '{operation}' more than once")]
    DuplicateOperation { category: String, operation: String },
    #[error("Handler '{category}' names unknown default operation '{operation}'")]
    UnknownDefaultOperation { category: String, operation: String },
    #[error("A handler for category '{category}' is already registered")]
    DuplicateCategory { category: String },
}

impl From<tempfile::PersistError> for BridgeError {
    fn from(e: tempfile::PersistError) -> Self {
        BridgeError::Io(e.error)
    }
}

/// Error returned by an operation body. The dispatcher converts it into a
/// failure result; [`HandlerError::kind`] becomes the `errorType` field.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{message}")]
    InvalidArgument { message: String },
    #[error("{what} not found")]
    NotFound { what: String },
    #[error("{message}")]
    InvalidState { message: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{message}")]
    Internal { message: String },
}

impl HandlerError {
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        HandlerError::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        HandlerError::NotFound { what: what.into() }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        HandlerError::InvalidState {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        HandlerError::Internal {
            message: message.into(),
        }
    }

    /// Stable category tag reported as `errorType`.
    pub fn kind(&self) -> &'static str {
        match self {
            HandlerError::InvalidArgument { .. } => "InvalidArgument",
            HandlerError::NotFound { .. } => "NotFound",
            HandlerError::InvalidState { .. } => "InvalidState",
            HandlerError::Io(_) => "Io",
            HandlerError::Internal { .. } => "Internal",
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(e: serde_json::Error) -> Self {
        HandlerError::InvalidArgument {
            message: e.to_string(),
        }
    }
}

impl From<String> for HandlerError {
    fn from(s: String) -> Self {
        HandlerError::Internal { message: s }
    }
}

impl From<&str> for HandlerError {
    fn from(s: &str) -> Self {
        HandlerError::Internal {
            message: s.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn handler_error_kinds_are_stable() {
        assert_eq!(HandlerError::invalid_argument("x").kind(), "InvalidArgument");
        assert_eq!(HandlerError::not_found("scene").kind(), "NotFound");
        assert_eq!(HandlerError::invalid_state("busy").kind(), "InvalidState");
        assert_eq!(HandlerError::internal("boom").kind(), "Internal");
        let io = HandlerError::from(std::io::Error::other("disk"));
        assert_eq!(io.kind(), "Io");
    }

    #[test]
    fn not_found_message_names_the_subject() {
        assert_eq!(HandlerError::not_found("Prefab 'Tree'").to_string(), "Prefab 'Tree' not found");
    }
}
