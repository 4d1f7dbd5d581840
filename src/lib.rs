//! Relays monitoring check results (plugin perfdata) to a Carbon/Graphite
//! backend as plain-text metric lines over a persistent TCP connection.
//!
//! Initial status events populate per-host and per-service routing caches;
//! check results are parsed from the perfdata mini-language, filtered,
//! mapped onto dotted metric paths, and sent as line-protocol packets.
//! While the backend is unreachable, packets land in a bounded FIFO cache
//! that is drained (commit-volume-capped) once the connection recovers.

pub mod carbon;
pub mod config;
pub mod event;
pub mod filter;
pub mod naming;
pub mod perfdata;
pub mod relay;
