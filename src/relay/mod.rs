//! Event dispatcher: consumes monitoring events, maintains the routing
//! caches, and turns check results into Carbon packets.
//!
//! The relay is a single logical consumer. Events arrive in order through
//! one channel and are handled one at a time, so the routing caches and
//! the packet cache never need locking. Check results for hosts or
//! services that never sent an initial status are dropped: the routing
//! caches are the sole source of truth for whether an entity is known.

pub mod path;

use std::collections::HashMap;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::carbon::CarbonSink;
use crate::config::Config;
use crate::event::{Event, CUSTOM_GROUP, CUSTOM_POST, CUSTOM_PRE};
use crate::filter::MetricFilter;
use crate::naming::sanitize_metric;
use crate::perfdata;

use self::path::{effective_timestamp, HostRoute, PathBuilder, ServiceRoute};

/// Synthetic service key under which host-check perfdata is filtered.
const HOST_CHECK_SERVICE: &str = "host_check";

/// The relay pipeline: routing caches, filter, path builder, and the
/// Carbon sink.
pub struct Relay {
    sink: CarbonSink,
    paths: PathBuilder,
    filter: MetricFilter,
    hosts: HashMap<String, HostRoute>,
    services: HashMap<String, ServiceRoute>,
    ignore_latency_limit: u64,
    send_warning: bool,
    send_critical: bool,
    send_min: bool,
    send_max: bool,
}

impl Relay {
    pub fn new(cfg: &Config) -> Self {
        Self {
            sink: CarbonSink::new(cfg.carbon.clone()),
            paths: PathBuilder::new(&cfg.data_source, &cfg.hostcheck),
            filter: MetricFilter::from_entries(&cfg.filters),
            hosts: HashMap::new(),
            services: HashMap::new(),
            ignore_latency_limit: cfg.ignore_latency_limit.max(0) as u64,
            send_warning: cfg.send_warning,
            send_critical: cfg.send_critical,
            send_min: cfg.send_min,
            send_max: cfg.send_max,
        }
    }

    /// Consumes events until the channel closes or shutdown is requested.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Event>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("relay stopping");
                    return;
                }
                event = rx.recv() => {
                    match event {
                        Some(event) => self.handle(event).await,
                        None => {
                            info!("event stream ended, relay stopping");
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Dispatches one event. Never fails; the worst outcome of any event
    /// is a dropped metric.
    pub async fn handle(&mut self, event: Event) {
        match event {
            Event::InitialHostStatus { host_name, customs } => {
                self.on_host_status(host_name, &customs);
            }
            Event::InitialServiceStatus {
                host_name,
                service_description,
                customs,
            } => {
                self.on_service_status(host_name, service_description, &customs);
            }
            Event::HostCheckResult {
                host_name,
                perf_data,
                last_chk,
                latency,
            } => {
                self.on_host_check(&host_name, &perf_data, last_chk, latency)
                    .await;
            }
            Event::ServiceCheckResult {
                host_name,
                service_description,
                perf_data,
                last_chk,
                latency,
            } => {
                self.on_service_check(&host_name, &service_description, &perf_data, last_chk, latency)
                    .await;
            }
        }
    }

    fn on_host_status(&mut self, host_name: String, customs: &HashMap<String, String>) {
        info!(host = %host_name, "initial host status");
        let route = HostRoute {
            group: customs.get(CUSTOM_GROUP).cloned(),
            pre: customs.get(CUSTOM_PRE).cloned(),
        };
        self.hosts.insert(host_name, route);
    }

    fn on_service_status(
        &mut self,
        host_name: String,
        service: String,
        customs: &HashMap<String, String>,
    ) {
        let service_id = service_key(&host_name, &service);
        info!(service = %service_id, "initial service status");

        if !self.hosts.contains_key(&host_name) {
            warn!(service = %service_id, "initial service status for an unknown host, dropping");
            return;
        }

        let route = ServiceRoute {
            post: customs.get(CUSTOM_POST).cloned(),
        };
        self.services.insert(service_id, route);
    }

    async fn on_host_check(&mut self, host_name: &str, perf_data: &str, last_chk: i64, latency: f64) {
        debug!(host = %host_name, "host check result");

        let Some(route) = self.hosts.get(host_name) else {
            warn!(host = %host_name, "check result for an unknown host, dropping");
            return;
        };

        if self.filter.suppresses_service(HOST_CHECK_SERVICE) {
            debug!(host = %host_name, "host check metrics fully suppressed");
            return;
        }

        let couples = self.decode_metrics(HOST_CHECK_SERVICE, perf_data);
        if couples.is_empty() {
            debug!(host = %host_name, "no metrics to send");
            return;
        }

        let metric_path = self.paths.host_check_path(host_name, route);
        let timestamp = effective_timestamp(last_chk, latency, self.ignore_latency_limit);
        if timestamp != last_chk {
            info!(host = %host_name, latency, "masking scheduler latency for host check");
        }

        let packet = build_packet(&metric_path, &couples, timestamp);
        self.sink.send(packet).await;
    }

    async fn on_service_check(
        &mut self,
        host_name: &str,
        service: &str,
        perf_data: &str,
        last_chk: i64,
        latency: f64,
    ) {
        let service_id = service_key(host_name, service);
        debug!(service = %service_id, "service check result");

        let Some(host_route) = self.hosts.get(host_name) else {
            warn!(service = %service_id, "check result for an unknown host, dropping");
            return;
        };
        let Some(svc_route) = self.services.get(&service_id) else {
            warn!(service = %service_id, "check result for an unknown service, dropping");
            return;
        };

        if self.filter.suppresses_service(service) {
            debug!(service = %service_id, "service metrics fully suppressed");
            return;
        }

        let couples = self.decode_metrics(service, perf_data);
        if couples.is_empty() {
            debug!(service = %service_id, "no metrics to send");
            return;
        }

        let metric_path = self
            .paths
            .service_path(host_name, host_route, service, svc_route);
        let timestamp = effective_timestamp(last_chk, latency, self.ignore_latency_limit);
        if timestamp != last_chk {
            info!(service = %service_id, latency, "masking scheduler latency for service check");
        }

        let packet = build_packet(&metric_path, &couples, timestamp);
        self.sink.send(packet).await;
    }

    /// Expands perfdata into `(metric, value)` couples: filtered metrics
    /// are dropped along with their thresholds, survivors are sanitized,
    /// and threshold fields become `_warn`/`_crit`/`_min`/`_max` companion
    /// metrics when the corresponding send flag is on.
    fn decode_metrics(&self, service: &str, perf_data: &str) -> Vec<(String, f64)> {
        let mut couples = Vec::new();

        for sample in perfdata::parse(perf_data) {
            if !self.filter.should_emit(service, &sample.name) {
                debug!(service, metric = %sample.name, "metric filtered");
                continue;
            }

            let name = sanitize_metric(&sample.name);
            couples.push((name.clone(), sample.value));

            if self.send_warning {
                if let Some(warning) = sample.warning {
                    couples.push((format!("{name}_warn"), warning));
                }
            }
            if self.send_critical {
                if let Some(critical) = sample.critical {
                    couples.push((format!("{name}_crit"), critical));
                }
            }
            if self.send_min {
                if let Some(min) = sample.min {
                    couples.push((format!("{name}_min"), min));
                }
            }
            if self.send_max {
                if let Some(max) = sample.max {
                    couples.push((format!("{name}_max"), max));
                }
            }
        }

        couples
    }

    /// Number of hosts currently known to the routing cache.
    pub fn known_hosts(&self) -> usize {
        self.hosts.len()
    }

    /// Number of services currently known to the routing cache.
    pub fn known_services(&self) -> usize {
        self.services.len()
    }

    /// Number of packets cached in the delivery channel.
    pub fn cached_packets(&self) -> usize {
        self.sink.cached()
    }
}

fn service_key(host_name: &str, service: &str) -> String {
    format!("{host_name}/{service}")
}

/// Serializes one check result into a wire packet: one
/// `<path>.<metric> <value> <timestamp>` line per couple, newline
/// separated, with a trailing blank line terminating the packet.
pub fn build_packet(metric_path: &str, couples: &[(String, f64)], timestamp: i64) -> String {
    let lines: Vec<String> = couples
        .iter()
        .map(|(metric, value)| format!("{metric_path}.{metric} {value} {timestamp}"))
        .collect();
    lines.join("\n") + "\n\n"
}
