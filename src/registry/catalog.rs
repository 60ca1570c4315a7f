use schemars::{schema_for, JsonSchema};
use serde::Serialize;
use serde_json::Value;

use super::handler::OperationInfo;
use super::HandlerRegistry;
use crate::discovery::DiscoveryRecord;

/// Introspection entry for one registered handler.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct HandlerInfo {
    pub category: String,
    pub version: String,
    pub operations: Vec<OperationInfo>,
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

fn schema_value<T: JsonSchema>() -> Value {
    let root = schema_for!(T);
    serde_json::to_value(root).unwrap_or_else(|_| empty_object_schema())
}

/// Every registered handler with its operations, in registration order.
pub fn describe(registry: &HandlerRegistry) -> Vec<HandlerInfo> {
    registry
        .handlers()
        .map(|h| HandlerInfo {
            category: h.category().to_string(),
            version: h.version().to_string(),
            operations: h.operations(),
        })
        .collect()
}

/// JSON Schema of the discovery file, for clients in other languages.
pub fn discovery_record_schema() -> Value {
    schema_value::<DiscoveryRecord>()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::registry::{output, Access, Handler};

    #[test]
    fn describe_lists_handlers_and_access() {
        let mut registry = HandlerRegistry::new();
        let handler = Handler::builder("prefab")
            .version("2.1.0")
            .read_only("list", |_| Ok(output(json!({ "prefabs": [] }))))
            .mutating("instantiate", |_| Ok(output(json!({}))))
            .build()
            .unwrap();
        registry.register(Arc::new(handler)).unwrap();

        let infos = describe(&registry);
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].category, "prefab");
        assert_eq!(infos[0].version, "2.1.0");
        assert_eq!(infos[0].operations[1].name, "instantiate");
        assert_eq!(infos[0].operations[1].access, Access::Mutating);

        let value = serde_json::to_value(&infos).unwrap();
        assert_eq!(value[0]["operations"][0]["access"], "read_only");
    }

    #[test]
    fn discovery_schema_names_wire_fields() {
        let schema = discovery_record_schema();
        let props = schema["properties"].as_object().unwrap();
        for field in ["port", "projectPath", "pid", "timestamp"] {
            assert!(props.contains_key(field), "missing {field}");
        }
        let required: Vec<&str> = schema["required"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert!(required.contains(&"port"));
    }
}
