use std::sync::Arc;

use serde_json::Value;

use super::compilation::CancelFlag;
use super::result::{CommandResult, PANIC};
use super::HandlerRegistry;

/// Execute a command payload against the handler for `category`.
/// This is the single dispatch point for all surfaces (CLI, host transport).
pub fn execute(registry: &HandlerRegistry, category: &str, payload: Option<&Value>) -> CommandResult {
    registry.route(category, payload, &CancelFlag::new())
}

/// Async variant for hosts running on tokio. The handler runs on the blocking
/// pool so a compilation wait never stalls the runtime.
pub async fn execute_async(
    registry: Arc<HandlerRegistry>,
    category: String,
    payload: Option<Value>,
    cancel: CancelFlag,
) -> CommandResult {
    let joined = tokio::task::spawn_blocking(move || {
        registry.route(&category, payload.as_ref(), &cancel)
    })
    .await;
    joined.unwrap_or_else(|e| {
        tracing::error!("Command task failed: {e}");
        CommandResult::failure(format!("Command task failed: {e}"), PANIC)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::registry::compilation::CompilationMonitor;
    use crate::registry::{output, Handler};

    fn registry_with(monitor: Arc<CompilationMonitor>) -> Arc<HandlerRegistry> {
        let mut registry = HandlerRegistry::new();
        let handler = Handler::builder("scene")
            .compilation_signal(monitor)
            .read_only("inspect", |_| Ok(output(json!({ "objects": 3 }))))
            .mutating("create", |_| Ok(output(json!({ "created": true }))))
            .build()
            .unwrap();
        registry.register(Arc::new(handler)).unwrap();
        Arc::new(registry)
    }

    #[test]
    fn sync_execute_routes() {
        let registry = registry_with(Arc::new(CompilationMonitor::new()));
        let result = execute(&registry, "scene", Some(&json!({ "operation": "inspect" })));
        assert_eq!(result.get("objects"), Some(&json!(3)));
    }

    #[tokio::test]
    async fn async_execute_does_not_block_the_runtime() {
        let monitor = Arc::new(CompilationMonitor::new());
        monitor.begin();
        let registry = registry_with(monitor.clone());

        let pending = tokio::spawn(execute_async(
            registry.clone(),
            "scene".to_string(),
            Some(json!({ "operation": "create" })),
            CancelFlag::new(),
        ));

        // The runtime keeps serving other commands while create is gated
        let inspect = execute_async(
            registry,
            "scene".to_string(),
            Some(json!({ "operation": "inspect" })),
            CancelFlag::new(),
        )
        .await;
        assert!(inspect.success);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());
        monitor.finish();

        let created = pending.await.unwrap();
        assert!(created.success);
    }
}
