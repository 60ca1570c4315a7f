use std::path::Path;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The JSON document a server writes so clients can find its port.
///
/// Wire format: `{"port": int, "projectPath": string, "pid": int, "timestamp": RFC 3339}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[cfg_attr(feature = "ts-bindings", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts-bindings", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryRecord {
    /// TCP port the owning process is listening on (1–65535).
    #[schemars(range(min = 1, max = 65535))]
    pub port: u16,
    /// Absolute path of the project the owner serves. Informational.
    pub project_path: String,
    /// OS process id of the owner when the record was written.
    pub pid: u32,
    /// Creation time. Diagnostic only, never used for expiry.
    #[cfg_attr(feature = "ts-bindings", ts(type = "string"))]
    pub timestamp: DateTime<Utc>,
}

impl DiscoveryRecord {
    pub fn new(project_path: impl Into<String>, port: u16, pid: u32) -> Self {
        Self {
            port,
            project_path: project_path.into(),
            pid,
            timestamp: Utc::now(),
        }
    }

    /// Record describing the calling process as the owner.
    pub fn for_current_process(project_path: &Path, port: u16) -> Self {
        Self::new(
            project_path.to_string_lossy().into_owned(),
            port,
            std::process::id(),
        )
    }
}

/// The two fields a reader needs, pulled out of an arbitrary JSON document.
///
/// Readers do not deserialize into [`DiscoveryRecord`] directly: a record
/// written by another implementation may format `timestamp` differently or
/// omit `projectPath`, and that must not hide a perfectly usable port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RecordFields {
    pub port: Option<u16>,
    pub pid: Option<u32>,
}

impl RecordFields {
    pub(crate) fn from_json(value: &Value) -> Self {
        let port = value
            .get("port")
            .and_then(Value::as_u64)
            .and_then(|p| u16::try_from(p).ok())
            .filter(|p| *p != 0);
        let pid = value
            .get("pid")
            .and_then(Value::as_u64)
            .and_then(|p| u32::try_from(p).ok());
        Self { port, pid }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn serializes_with_camel_case_wire_names() {
        let record = DiscoveryRecord::new("/work/game", 6400, 4242);
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["port"], 6400);
        assert_eq!(value["projectPath"], "/work/game");
        assert_eq!(value["pid"], 4242);
        let ts = value["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[test]
    fn parses_a_record_from_another_writer() {
        let text = r#"{"port":6401,"projectPath":"C:\\Game","pid":99,"timestamp":"2026-01-02T03:04:05.678Z"}"#;
        let record: DiscoveryRecord = serde_json::from_str(text).unwrap();
        assert_eq!(record.port, 6401);
        assert_eq!(record.project_path, "C:\\Game");
        assert_eq!(record.pid, 99);
    }

    #[test]
    fn lenient_fields_reject_out_of_range_ports() {
        assert_eq!(RecordFields::from_json(&json!({ "port": 0, "pid": 1 })).port, None);
        assert_eq!(RecordFields::from_json(&json!({ "port": 70000, "pid": 1 })).port, None);
        assert_eq!(RecordFields::from_json(&json!({ "port": -5, "pid": 1 })).port, None);
        assert_eq!(RecordFields::from_json(&json!({ "port": "6400", "pid": 1 })).port, None);
        assert_eq!(RecordFields::from_json(&json!({ "port": 65535 })).port, Some(65535));
    }

    #[test]
    fn lenient_fields_tolerate_missing_metadata() {
        let fields = RecordFields::from_json(&json!({ "port": 6400, "pid": 12 }));
        assert_eq!(fields, RecordFields { port: Some(6400), pid: Some(12) });
        assert_eq!(RecordFields::from_json(&json!({ "port": 6400 })).pid, None);
    }
}
