// ABOUTME: Health check, reconciler and worker pool settings.
// ABOUTME: Durations use humantime strings such as "5s" or "2m".

use serde::Deserialize;
use std::time::Duration;

/// How long and how often the health check polls a new version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct HealthCheckConfig {
    #[serde(default = "default_health_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(default = "default_health_interval", with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            timeout: default_health_timeout(),
            interval: default_health_interval(),
        }
    }
}

fn default_health_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_health_interval() -> Duration {
    Duration::from_secs(5)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ReconcilerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_reconcile_interval", with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: default_reconcile_interval(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_reconcile_interval() -> Duration {
    Duration::from_secs(10)
}

/// Worker pool bounds for orchestrator operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct OperationsConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

impl Default for OperationsConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
        }
    }
}

fn default_max_concurrent() -> usize {
    4
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_check_defaults() {
        let config: HealthCheckConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert_eq!(config.interval, Duration::from_secs(5));
    }

    #[test]
    fn humantime_durations() {
        let config: HealthCheckConfig = serde_yaml::from_str("timeout: 2m\ninterval: 500ms\n").unwrap();
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert_eq!(config.interval, Duration::from_millis(500));
    }

    #[test]
    fn reconciler_defaults() {
        let config: ReconcilerConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.enabled);
        assert_eq!(config.interval, Duration::from_secs(10));
    }
}
