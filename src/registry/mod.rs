//! Command dispatch: payload validation, per-handler operation tables, the
//! compilation gate, and the category-level registry every surface routes
//! through.

pub mod catalog;
pub mod compilation;
pub mod execute;
pub mod handler;
pub mod handlers;
pub mod payload;
pub mod result;
pub mod validation;

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::BridgeError;

pub use compilation::{CancelFlag, CompilationMonitor, CompilationSignal, GateOutcome, NeverCompiling};
pub use handler::{output, Access, CommandHandler, Handler, HandlerBuilder, OperationInfo, OperationOutput};
pub use payload::{Payload, ValueExt};
pub use result::CommandResult;
pub use validation::{validate, Command, ValidationError, ValidationResult};

/// Handlers keyed by category, in registration order.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: IndexMap<String, Arc<dyn CommandHandler>>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("categories", &self.categories())
            .finish()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a handler. Categories are unique.
    pub fn register(&mut self, handler: Arc<dyn CommandHandler>) -> Result<(), BridgeError> {
        let category = handler.category().to_string();
        if self.handlers.contains_key(&category) {
            return Err(BridgeError::DuplicateCategory { category });
        }
        self.handlers.insert(category, handler);
        Ok(())
    }

    pub fn get(&self, category: &str) -> Option<&Arc<dyn CommandHandler>> {
        self.handlers.get(category)
    }

    pub fn categories(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    pub fn handlers(&self) -> impl Iterator<Item = &Arc<dyn CommandHandler>> {
        self.handlers.values()
    }

    /// Execute `payload` on the handler for `category`.
    pub fn route(&self, category: &str, payload: Option<&Value>, cancel: &CancelFlag) -> CommandResult {
        match self.handlers.get(category) {
            Some(handler) => handler.execute_cancellable(payload, cancel),
            None => CommandResult::failure(
                format!(
                    "Unknown category '{category}'. Available categories: {}",
                    self.categories().join(", ")
                ),
                result::VALIDATION_ERROR,
            ),
        }
    }
}
