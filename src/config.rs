use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Top-level configuration for the carbonoor relay.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Logging verbosity (debug, info, warn, error). Default: "info".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Carbon backend connection and cache tuning.
    #[serde(default)]
    pub carbon: CarbonConfig,

    /// Latency back-dating threshold in seconds. Check results whose
    /// scheduler latency is positive and at most this value are stamped
    /// with their scheduled time instead of the actual check time, so
    /// jitter does not punch holes in graphs. Default: 0 (disabled);
    /// negative values are clamped to 0 at load.
    #[serde(default)]
    pub ignore_latency_limit: i64,

    /// Optional path segment appended for host-check metrics.
    #[serde(default)]
    pub hostcheck: String,

    /// Optional namespace segment inserted before the service segment,
    /// identifying this relay as the data source.
    #[serde(default)]
    pub data_source: String,

    /// `service:metric1,metric2` suppression entries. An empty metric list
    /// after the colon suppresses the whole service.
    #[serde(default)]
    pub filters: Vec<String>,

    /// Emit warning thresholds as extra `<metric>_warn` metrics.
    #[serde(default)]
    pub send_warning: bool,

    /// Emit critical thresholds as extra `<metric>_crit` metrics.
    #[serde(default)]
    pub send_critical: bool,

    /// Emit minimum bounds as extra `<metric>_min` metrics.
    #[serde(default)]
    pub send_min: bool,

    /// Emit maximum bounds as extra `<metric>_max` metrics.
    #[serde(default)]
    pub send_max: bool,
}

/// Carbon backend connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CarbonConfig {
    /// Carbon plaintext listener host. Default: "localhost".
    #[serde(default = "default_host")]
    pub host: String,

    /// Carbon plaintext listener port. Default: 2003.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Packet cache capacity; the oldest packet is evicted on overflow.
    /// Default: 1000.
    #[serde(default = "default_cache_max_length")]
    pub cache_max_length: usize,

    /// Maximum cached packets flushed ahead of one send. Default: 100.
    #[serde(default = "default_cache_commit_volume")]
    pub cache_commit_volume: usize,

    /// Connection establishment timeout. Default: 5s.
    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Per-packet send timeout. Default: 5s.
    #[serde(default = "default_send_timeout", with = "humantime_serde")]
    pub send_timeout: Duration,
}

// --- Default value functions ---

fn default_log_level() -> String {
    "info".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    2003
}

fn default_cache_max_length() -> usize {
    1000
}

fn default_cache_commit_volume() -> usize {
    100
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_send_timeout() -> Duration {
    Duration::from_secs(5)
}

// --- Default trait impls ---

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            carbon: CarbonConfig::default(),
            ignore_latency_limit: 0,
            hostcheck: String::new(),
            data_source: String::new(),
            filters: Vec::new(),
            send_warning: false,
            send_critical: false,
            send_min: false,
            send_max: false,
        }
    }
}

impl Default for CarbonConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cache_max_length: default_cache_max_length(),
            cache_commit_volume: default_cache_commit_volume(),
            connect_timeout: default_connect_timeout(),
            send_timeout: default_send_timeout(),
        }
    }
}

// --- Validation and loading ---

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;

        let mut cfg: Config = serde_yaml::from_str(&data)
            .with_context(|| format!("parsing config file {}", path.display()))?;

        cfg.normalize();
        cfg.validate()?;

        Ok(cfg)
    }

    /// Clamps out-of-range values that are tolerated rather than rejected.
    pub fn normalize(&mut self) {
        if self.ignore_latency_limit < 0 {
            tracing::warn!(
                configured = self.ignore_latency_limit,
                "negative ignore_latency_limit clamped to 0",
            );
            self.ignore_latency_limit = 0;
        }
    }

    /// Validate the configuration for required fields and consistency.
    pub fn validate(&self) -> Result<()> {
        if self.carbon.host.is_empty() {
            bail!("carbon.host must not be empty");
        }

        if self.carbon.port == 0 {
            bail!("carbon.port must be positive");
        }

        if self.carbon.cache_max_length == 0 {
            bail!("carbon.cache_max_length must be positive");
        }

        if self.carbon.cache_commit_volume == 0 {
            bail!("carbon.cache_commit_volume must be positive");
        }

        if self.carbon.connect_timeout.is_zero() {
            bail!("carbon.connect_timeout must be positive");
        }

        if self.carbon.send_timeout.is_zero() {
            bail!("carbon.send_timeout must be positive");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let cfg = Config::default();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.carbon.host, "localhost");
        assert_eq!(cfg.carbon.port, 2003);
        assert_eq!(cfg.carbon.cache_max_length, 1000);
        assert_eq!(cfg.carbon.cache_commit_volume, 100);
        assert_eq!(cfg.carbon.connect_timeout, Duration::from_secs(5));
        assert_eq!(cfg.ignore_latency_limit, 0);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_parse_full_yaml() {
        let raw = r#"
log_level: debug
carbon:
  host: graphite.internal
  port: 2004
  cache_max_length: 50
  cache_commit_volume: 10
  connect_timeout: 2s
  send_timeout: 3s
ignore_latency_limit: 10
hostcheck: __HOST__
data_source: shinken
filters:
  - "cpu:1m,5m"
  - "mem:"
send_warning: true
send_max: true
"#;
        let cfg: Config = serde_yaml::from_str(raw).expect("parse");
        assert_eq!(cfg.carbon.host, "graphite.internal");
        assert_eq!(cfg.carbon.port, 2004);
        assert_eq!(cfg.carbon.cache_max_length, 50);
        assert_eq!(cfg.carbon.connect_timeout, Duration::from_secs(2));
        assert_eq!(cfg.ignore_latency_limit, 10);
        assert_eq!(cfg.data_source, "shinken");
        assert_eq!(cfg.filters.len(), 2);
        assert!(cfg.send_warning);
        assert!(!cfg.send_critical);
        assert!(cfg.send_max);
    }

    #[test]
    fn test_negative_latency_limit_is_clamped() {
        let mut cfg = Config {
            ignore_latency_limit: -5,
            ..Default::default()
        };
        cfg.normalize();
        assert_eq!(cfg.ignore_latency_limit, 0);
    }

    #[test]
    fn test_validation_rejects_zero_cache_length() {
        let cfg = Config {
            carbon: CarbonConfig {
                cache_max_length: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("cache_max_length"));
    }

    #[test]
    fn test_validation_rejects_zero_commit_volume() {
        let cfg = Config {
            carbon: CarbonConfig {
                cache_commit_volume: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("cache_commit_volume"));
    }

    #[test]
    fn test_validation_rejects_empty_host() {
        let cfg = Config {
            carbon: CarbonConfig {
                host: String::new(),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("carbon.host"));
    }
}
