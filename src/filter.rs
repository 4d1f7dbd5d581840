//! Per-service metric suppression.
//!
//! The filter table is built once from configuration and read-only
//! afterwards. Metrics are matched by their raw parsed name, before path
//! sanitization.

use std::collections::{HashMap, HashSet};

use tracing::{info, warn};

/// Suppression rules keyed by service name. A service mapped to an empty
/// set is suppressed entirely.
#[derive(Debug, Default, Clone)]
pub struct MetricFilter {
    rules: HashMap<String, HashSet<String>>,
}

impl MetricFilter {
    /// Builds the table from `service:metric1,metric2` entries. An empty
    /// metric list after the colon suppresses the whole service. An entry
    /// without a colon is ignored with a warning; the rest still apply.
    pub fn from_entries(entries: &[String]) -> Self {
        let mut rules = HashMap::new();

        for entry in entries {
            let Some((service, metrics)) = entry.split_once(':') else {
                warn!(entry, "ignoring badly declared metric filter");
                continue;
            };

            let suppressed: HashSet<String> = if metrics.is_empty() {
                HashSet::new()
            } else {
                metrics.split(',').map(str::to_string).collect()
            };

            info!(service, metrics = ?suppressed, "metric filter loaded");
            rules.insert(service.to_string(), suppressed);
        }

        Self { rules }
    }

    /// True when every metric of this service is suppressed. Callers check
    /// this before parsing perfdata at all.
    pub fn suppresses_service(&self, service: &str) -> bool {
        self.rules.get(service).is_some_and(HashSet::is_empty)
    }

    /// Per-metric decision. A fully suppressed service emits nothing here
    /// either.
    pub fn should_emit(&self, service: &str, metric: &str) -> bool {
        match self.rules.get(service) {
            None => true,
            Some(suppressed) if suppressed.is_empty() => false,
            Some(suppressed) => !suppressed.contains(metric),
        }
    }

    /// Number of services with a filter entry.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when no filter entries are configured.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
