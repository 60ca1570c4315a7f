//! The dispatch contract every command handler conforms to.
//!
//! A [`Handler`] owns a category name and a fixed table of operations, each
//! marked read-only or mutating. `execute` validates the payload, routes by
//! operation name, holds mutating operations until the host has stopped
//! compiling, runs the body, and turns every outcome into a [`CommandResult`].
//! Nothing escapes as an error or a panic.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use super::compilation::{CancelFlag, CompilationSignal, GateOutcome, NeverCompiling};
use super::result::{CommandResult, CANCELLED, COMPILATION_TIMEOUT, PANIC, VALIDATION_ERROR};
use super::validation::{validate, validate_with_default, Command};
use crate::error::{BridgeError, HandlerError};
use crate::settings::{BridgeSettings, DEFAULT_COMPILE_WAIT_TIMEOUT_MS};

/// Version reported by handlers that do not set one.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Fields an operation returns on success.
pub type OperationOutput = Map<String, Value>;

type OperationFn = dyn Fn(&Command<'_>) -> Result<OperationOutput, HandlerError> + Send + Sync;

/// Whether an operation changes host state and must wait out a compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    ReadOnly,
    Mutating,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct OperationInfo {
    pub name: String,
    pub access: Access,
}

/// Convert a JSON object into operation output. Anything else is wrapped as `{"data": value}`.
pub fn output(value: Value) -> OperationOutput {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            map
        }
    }
}

/// The seam between a transport and a unit of command handling.
pub trait CommandHandler: Send + Sync {
    fn category(&self) -> &str;

    /// Diagnostic only.
    fn version(&self) -> &str {
        DEFAULT_VERSION
    }

    fn operations(&self) -> Vec<OperationInfo>;

    fn execute_cancellable(&self, payload: Option<&Value>, cancel: &CancelFlag) -> CommandResult;

    fn execute(&self, payload: Option<&Value>) -> CommandResult {
        self.execute_cancellable(payload, &CancelFlag::new())
    }
}

struct Operation {
    access: Access,
    run: Box<OperationFn>,
}

/// Table-driven [`CommandHandler`]. Build one with [`Handler::builder`].
pub struct Handler {
    category: String,
    version: String,
    operations: IndexMap<&'static str, Operation>,
    default_operation: Option<&'static str>,
    signal: Arc<dyn CompilationSignal>,
    gate_timeout: Duration,
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handler")
            .field("category", &self.category)
            .field("version", &self.version)
            .field("operations", &self.operations.keys().collect::<Vec<_>>())
            .field("default_operation", &self.default_operation)
            .field("gate_timeout", &self.gate_timeout)
            .finish_non_exhaustive()
    }
}

impl Handler {
    pub fn builder(category: impl Into<String>) -> HandlerBuilder {
        HandlerBuilder::new(category)
    }

    /// Case-sensitive membership test.
    pub fn supports(&self, operation: &str) -> bool {
        self.operations.contains_key(operation)
    }

    pub fn access(&self, operation: &str) -> Option<Access> {
        self.operations.get(operation).map(|op| op.access)
    }

    fn unsupported(&self, operation: &str) -> CommandResult {
        let supported: Vec<&str> = self.operations.keys().copied().collect();
        CommandResult::failure(
            format!(
                "Operation '{operation}' is not supported by handler '{}'. Supported operations: {}",
                self.category,
                supported.join(", ")
            ),
            VALIDATION_ERROR,
        )
        .with_category(&self.category)
    }

    fn await_compilation(&self, operation: &str, cancel: &CancelFlag) -> Result<(), CommandResult> {
        match self.signal.wait_until_idle(self.gate_timeout, cancel) {
            GateOutcome::Idle { waited } => {
                if !waited.is_zero() {
                    debug!(category = %self.category, operation, ?waited, "Waited for host compilation");
                }
                Ok(())
            }
            GateOutcome::TimedOut => {
                warn!(category = %self.category, operation, timeout = ?self.gate_timeout, "Gave up waiting for host compilation");
                Err(CommandResult::failure(
                    format!(
                        "Timed out after {}ms waiting for compilation to finish before '{operation}'",
                        self.gate_timeout.as_millis()
                    ),
                    COMPILATION_TIMEOUT,
                )
                .with_category(&self.category))
            }
            GateOutcome::Cancelled => Err(CommandResult::failure(
                format!("'{operation}' was cancelled while waiting for compilation"),
                CANCELLED,
            )
            .with_category(&self.category)),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl CommandHandler for Handler {
    fn category(&self) -> &str {
        &self.category
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn operations(&self) -> Vec<OperationInfo> {
        self.operations
            .iter()
            .map(|(name, op)| OperationInfo {
                name: (*name).to_string(),
                access: op.access,
            })
            .collect()
    }

    fn execute_cancellable(&self, payload: Option<&Value>, cancel: &CancelFlag) -> CommandResult {
        let validated = match self.default_operation {
            Some(default) => validate_with_default(payload, default),
            None => validate(payload),
        };
        let command = match validated {
            Ok(command) => command,
            Err(e) => {
                return CommandResult::failure(e.to_string(), VALIDATION_ERROR)
                    .with_category(&self.category)
            }
        };

        let name = command.operation();
        let Some(operation) = self.operations.get(name) else {
            return self.unsupported(name);
        };

        if operation.access == Access::Mutating {
            if let Err(rejected) = self.await_compilation(name, cancel) {
                return rejected;
            }
        }

        match catch_unwind(AssertUnwindSafe(|| (operation.run)(&command))) {
            Ok(Ok(data)) => CommandResult::success(&self.category, data),
            Ok(Err(e)) => {
                debug!(category = %self.category, operation = name, "Operation failed: {e}");
                CommandResult::failure(e.to_string(), e.kind()).with_category(&self.category)
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(category = %self.category, operation = name, "Operation panicked: {message}");
                CommandResult::failure(format!("Operation '{name}' panicked: {message}"), PANIC)
                    .with_category(&self.category)
            }
        }
    }
}

/// Collects a handler's operation table. The table is fixed once built.
pub struct HandlerBuilder {
    category: String,
    version: String,
    operations: IndexMap<&'static str, Operation>,
    duplicate: Option<&'static str>,
    default_operation: Option<&'static str>,
    signal: Arc<dyn CompilationSignal>,
    gate_timeout: Duration,
}

impl HandlerBuilder {
    fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            version: DEFAULT_VERSION.to_string(),
            operations: IndexMap::new(),
            duplicate: None,
            default_operation: None,
            signal: Arc::new(NeverCompiling),
            gate_timeout: Duration::from_millis(DEFAULT_COMPILE_WAIT_TIMEOUT_MS),
        }
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn operation<F>(mut self, name: &'static str, access: Access, run: F) -> Self
    where
        F: Fn(&Command<'_>) -> Result<OperationOutput, HandlerError> + Send + Sync + 'static,
    {
        let previous = self.operations.insert(
            name,
            Operation {
                access,
                run: Box::new(run),
            },
        );
        if previous.is_some() && self.duplicate.is_none() {
            self.duplicate = Some(name);
        }
        self
    }

    /// Inspection/listing operation: never waits for compilation.
    pub fn read_only<F>(self, name: &'static str, run: F) -> Self
    where
        F: Fn(&Command<'_>) -> Result<OperationOutput, HandlerError> + Send + Sync + 'static,
    {
        self.operation(name, Access::ReadOnly, run)
    }

    /// State-changing operation: waits until the host is not compiling.
    pub fn mutating<F>(self, name: &'static str, run: F) -> Self
    where
        F: Fn(&Command<'_>) -> Result<OperationOutput, HandlerError> + Send + Sync + 'static,
    {
        self.operation(name, Access::Mutating, run)
    }

    /// Accept a null payload or a missing `operation` and route it here.
    pub fn default_operation(mut self, name: &'static str) -> Self {
        self.default_operation = Some(name);
        self
    }

    pub fn compilation_signal(mut self, signal: Arc<dyn CompilationSignal>) -> Self {
        self.signal = signal;
        self
    }

    pub fn gate_timeout(mut self, timeout: Duration) -> Self {
        self.gate_timeout = timeout;
        self
    }

    /// Apply the gate bound from settings.
    pub fn settings(self, settings: &BridgeSettings) -> Self {
        self.gate_timeout(settings.compile_wait_timeout())
    }

    pub fn build(self) -> Result<Handler, BridgeError> {
        if self.operations.is_empty() {
            return Err(BridgeError::EmptyOperationSet {
                category: self.category,
            });
        }
        if let Some(operation) = self.duplicate {
            return Err(BridgeError::DuplicateOperation {
                category: self.category,
                operation: operation.to_string(),
            });
        }
        if let Some(default) = self.default_operation {
            if !self.operations.contains_key(default) {
                return Err(BridgeError::UnknownDefaultOperation {
                    category: self.category,
                    operation: default.to_string(),
                });
            }
        }
        Ok(Handler {
            category: self.category,
            version: self.version,
            operations: self.operations,
            default_operation: self.default_operation,
            signal: self.signal,
            gate_timeout: self.gate_timeout,
        })
    }
}
