//! Config surface (spec §6). Layered the way the teacher's
//! `tasker-shared/src/config` family does it: built-in defaults, overridden
//! by an optional file, overridden by `TASKER_` prefixed environment
//! variables, then validated before any background task starts (spec §7
//! "Configuration error").

use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct Config {
    #[validate(range(min = 1))]
    pub heartbeat_interval_seconds: u64,
    #[validate(range(min = 1))]
    pub poll_interval_seconds: u64,
    #[validate(range(min = 1))]
    pub stale_threshold_seconds: u64,
    #[validate(range(min = 1))]
    pub stuck_threshold_seconds: u64,
    #[validate(range(min = 1))]
    pub health_check_interval_seconds: u64,
    #[validate(range(min = 1))]
    pub max_concurrent_agents: usize,
    #[validate(range(min = 1))]
    pub context_token_limit: u64,
    #[validate(range(min = 1))]
    pub bus_max_queue_size: usize,
    #[validate(range(min = 1))]
    pub consolidation_window_hours: u64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub consolidation_min_confidence: f64,
    pub surprise_threshold: f64,
    #[validate(range(min = 1))]
    pub max_time_gap_minutes: u64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub saturation_threshold: f64,
    #[validate(range(min = 0.0, max = 1.0))]
    pub critical_threshold: f64,
    #[validate(range(min = 1))]
    pub alert_horizon_hours: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            heartbeat_interval_seconds: 30,
            poll_interval_seconds: 5,
            stale_threshold_seconds: 60,
            stuck_threshold_seconds: 300,
            health_check_interval_seconds: 10,
            max_concurrent_agents: 4,
            context_token_limit: 200_000,
            bus_max_queue_size: 1000,
            consolidation_window_hours: 24,
            consolidation_min_confidence: 0.7,
            surprise_threshold: 3.5,
            max_time_gap_minutes: 60,
            saturation_threshold: 0.85,
            critical_threshold: 0.95,
            alert_horizon_hours: 4,
        }
    }
}

impl Config {
    /// Load defaults, then an optional TOML/YAML file, then `TASKER_*`
    /// environment variables. Surfaces a `TaskerError::Configuration` on
    /// any parse or validation failure rather than panicking - startup
    /// configuration errors are the one kind this kernel lets exit the
    /// process (spec §7).
    pub fn load(file_path: Option<&str>) -> crate::TaskerResult<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default()).map_err(|e| {
                crate::TaskerError::Configuration(format!("default config invalid: {e}"))
            })?);

        if let Some(path) = file_path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("TASKER")
                .try_parsing(true)
                .separator("__"),
        );

        let raw = builder
            .build()
            .map_err(|e| crate::TaskerError::Configuration(e.to_string()))?;
        let cfg: Config = raw
            .try_deserialize()
            .map_err(|e| crate::TaskerError::Configuration(e.to_string()))?;
        cfg.validate()
            .map_err(|e| crate::TaskerError::Configuration(e.to_string()))?;
        Ok(cfg)
    }

    pub fn stale_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.stale_threshold_seconds as i64)
    }

    pub fn stuck_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.stuck_threshold_seconds as i64)
    }

    pub fn heartbeat_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.heartbeat_interval_seconds)
    }

    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn health_check_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.health_check_interval_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.max_concurrent_agents, 4);
        assert_eq!(cfg.saturation_threshold, 0.85);
    }

    #[test]
    fn load_with_missing_file_falls_back_to_defaults() {
        let cfg = Config::load(Some("/nonexistent/path/does-not-exist")).unwrap();
        assert_eq!(cfg.heartbeat_interval_seconds, 30);
    }
}
