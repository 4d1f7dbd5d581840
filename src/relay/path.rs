//! Metric path composition and the check timestamp policy.

use crate::naming::{sanitize_identifier, sanitize_metric};

/// Per-host routing attributes captured from the initial status event.
#[derive(Debug, Default, Clone)]
pub struct HostRoute {
    /// Group prefix, applied directly left of the host segment.
    pub group: Option<String>,
    /// Secondary prefix, applied left of the group.
    pub pre: Option<String>,
}

/// Per-service routing attributes captured from the initial status event.
#[derive(Debug, Default, Clone)]
pub struct ServiceRoute {
    /// Suffix appended after the service segment.
    pub post: Option<String>,
}

/// Builds dotted metric paths from routing attributes and the configured
/// namespace segments. Segment order, left to right:
/// `[pre].[group].host.[data_source].service|hostcheck.[post]`,
/// with absent segments skipped.
#[derive(Debug, Clone)]
pub struct PathBuilder {
    data_source: String,
    hostcheck: String,
}

impl PathBuilder {
    /// The data-source segment goes through the metric-name rule once,
    /// here, so arbitrary configured text cannot break the namespace.
    pub fn new(data_source: &str, hostcheck: &str) -> Self {
        Self {
            data_source: sanitize_metric(data_source),
            hostcheck: hostcheck.to_string(),
        }
    }

    /// `[pre].[group].<host>` — the group binds closer to the host name.
    fn host_prefix(&self, host_name: &str, route: &HostRoute) -> String {
        let mut prefix = sanitize_identifier(host_name);
        if let Some(group) = &route.group {
            prefix = format!("{group}.{prefix}");
        }
        if let Some(pre) = &route.pre {
            prefix = format!("{pre}.{prefix}");
        }
        prefix
    }

    /// Path for a service check result.
    pub fn service_path(
        &self,
        host_name: &str,
        route: &HostRoute,
        service: &str,
        svc_route: &ServiceRoute,
    ) -> String {
        let mut desc = sanitize_identifier(service);
        if let Some(post) = &svc_route.post {
            desc = format!("{desc}.{post}");
        }

        let prefix = self.host_prefix(host_name, route);
        if self.data_source.is_empty() {
            format!("{prefix}.{desc}")
        } else {
            format!("{prefix}.{}.{desc}", self.data_source)
        }
    }

    /// Path for a host check result: the host prefix plus the optional
    /// data-source and hostcheck-label segments.
    pub fn host_check_path(&self, host_name: &str, route: &HostRoute) -> String {
        let mut path = self.host_prefix(host_name, route);
        if !self.data_source.is_empty() {
            path = format!("{path}.{}", self.data_source);
        }
        if !self.hostcheck.is_empty() {
            path = format!("{path}.{}", self.hostcheck);
        }
        path
    }
}

/// Effective timestamp for a check result. A positive scheduler latency
/// within the configured limit back-dates the sample to its scheduled
/// time (Carbon dislikes jittered timestamps and renders gaps); anything
/// else keeps the raw check time. Seconds, truncated.
pub fn effective_timestamp(last_chk: i64, latency: f64, ignore_latency_limit: u64) -> i64 {
    if latency > 0.0 && latency <= ignore_latency_limit as f64 {
        last_chk - latency as i64
    } else {
        last_chk
    }
}
