//! Inbound event surface fed by the monitoring daemon.
//!
//! The relay consumes four event kinds: initial host/service status events
//! carrying custom routing attributes, and host/service check results
//! carrying perfdata. Events arrive as one JSON object per line, tagged by
//! a `type` field.

use std::collections::HashMap;

use serde::Deserialize;

/// Host custom attribute: secondary path prefix, applied left of the group.
pub const CUSTOM_PRE: &str = "_GRAPHITE_PRE";

/// Host custom attribute: group path prefix, applied directly left of the
/// host segment.
pub const CUSTOM_GROUP: &str = "_GRAPHITE_GROUP";

/// Service custom attribute: path suffix appended after the service segment.
pub const CUSTOM_POST: &str = "_GRAPHITE_POST";

/// One lifecycle or check-result event from the monitoring daemon.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A host became known; its custom attributes carry routing prefixes.
    InitialHostStatus {
        host_name: String,
        #[serde(default)]
        customs: HashMap<String, String>,
    },

    /// A service became known; its custom attributes carry the routing
    /// suffix.
    InitialServiceStatus {
        host_name: String,
        service_description: String,
        #[serde(default)]
        customs: HashMap<String, String>,
    },

    /// A host check completed with perfdata.
    HostCheckResult {
        host_name: String,
        #[serde(default)]
        perf_data: String,
        last_chk: i64,
        #[serde(default)]
        latency: f64,
    },

    /// A service check completed with perfdata.
    ServiceCheckResult {
        host_name: String,
        service_description: String,
        #[serde(default)]
        perf_data: String,
        last_chk: i64,
        #[serde(default)]
        latency: f64,
    },
}
