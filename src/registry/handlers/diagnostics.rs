use std::sync::Arc;

use serde_json::json;

use crate::discovery::{derive_key, normalize_project_path};
use crate::error::{BridgeError, HandlerError};
use crate::registry::compilation::CompilationSignal;
use crate::registry::handler::{output, Handler, OperationOutput};
use crate::registry::validation::Command;
use crate::settings::BridgeSettings;

pub const CATEGORY: &str = "bridge";

fn ping(_cmd: &Command<'_>) -> Result<OperationOutput, HandlerError> {
    Ok(output(json!({
        "message": "pong",
        "version": env!("CARGO_PKG_VERSION"),
    })))
}

fn discovery_key(cmd: &Command<'_>) -> Result<OperationOutput, HandlerError> {
    let path = cmd.args().require_str("path")?;
    Ok(output(json!({
        "path": path,
        "normalized": normalize_project_path(path),
        "key": derive_key(path),
    })))
}

fn compilation_status(signal: &dyn CompilationSignal) -> OperationOutput {
    output(json!({
        "compiling": signal.is_compiling(),
        "completedBuilds": signal.completed_builds(),
    }))
}

/// Built-in `bridge` handler: liveness, key derivation, compile status.
/// Everything here is read-only, so it answers even mid-compile.
pub fn handler(signal: Arc<dyn CompilationSignal>, settings: &BridgeSettings) -> Result<Handler, BridgeError> {
    let status_signal = signal.clone();
    Handler::builder(CATEGORY)
        .settings(settings)
        .compilation_signal(signal)
        .read_only("ping", ping)
        .read_only("discovery_key", discovery_key)
        .read_only("compilation_status", move |_| Ok(compilation_status(status_signal.as_ref())))
        .default_operation("ping")
        .build()
}
