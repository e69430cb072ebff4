use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::severity::Severity;

/// A single entry in the shape Cloud Logging stores it.
///
/// `payload` is sent as `jsonPayload`; `labels` are the indexed
/// string-to-string metadata of the entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    #[serde(rename = "jsonPayload")]
    pub payload: serde_json::Map<String, serde_json::Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// The monitored resource entries are attributed to, e.g. `global` or
/// `gce_instance` with its instance labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonitoredResource {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl MonitoredResource {
    pub fn new(kind: impl Into<String>) -> Self {
        MonitoredResource { kind: kind.into(), labels: BTreeMap::new() }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

impl Default for MonitoredResource {
    fn default() -> Self {
        MonitoredResource::new("global")
    }
}

/// Body of an `entries:write` call.
///
/// Labels and resource set here apply to every entry that does not carry
/// its own.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteRequest {
    pub log_name: String,
    pub resource: MonitoredResource,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    pub entries: Vec<Entry>,
}

/// Full resource name of a log: `projects/{project}/logs/{log_id}`, with
/// the log id URL-encoded as the API requires.
pub fn log_name(project_id: &str, log_id: &str) -> String {
    format!("projects/{}/logs/{}", project_id, urlencoding::encode(log_id))
}
