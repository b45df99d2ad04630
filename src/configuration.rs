use crate::connectors::PlatformSettings;
use crate::health::{
    ClassificationPolicy, OutagePolicy, ServiceDescriptor, DEFAULT_PROBE_TIMEOUT,
    SLOW_RESPONSE_THRESHOLD_MS,
};
use serde_valid::Validate;
use std::collections::HashSet;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize, Validate)]
pub struct Settings {
    #[serde(default)]
    #[validate]
    pub monitor: MonitorSettings,
    #[serde(default)]
    #[validate]
    pub services: Vec<ServiceDescriptor>,
    #[serde(default)]
    pub third_party: Vec<PlatformSettings>,
}

#[derive(Debug, Clone, serde::Deserialize, Validate)]
pub struct MonitorSettings {
    /// Bound on every probe request
    #[serde(default = "MonitorSettings::default_probe_timeout_secs")]
    #[validate(minimum = 1)]
    pub probe_timeout_secs: u64,
    /// Period of the scheduled check cycle
    #[serde(default = "MonitorSettings::default_check_interval_secs")]
    #[validate(minimum = 1)]
    pub check_interval_secs: u64,
    /// Successful responses slower than this are degraded
    #[serde(default = "MonitorSettings::default_slow_response_threshold_ms")]
    #[validate(minimum = 1)]
    pub slow_response_threshold_ms: u64,
    /// Samples kept per service by the in-memory history
    #[serde(default = "MonitorSettings::default_history_capacity")]
    #[validate(minimum = 1)]
    pub history_capacity: usize,
    #[serde(default)]
    pub outage_policy: OutagePolicy,
}

impl MonitorSettings {
    const fn default_probe_timeout_secs() -> u64 {
        DEFAULT_PROBE_TIMEOUT.as_secs()
    }

    const fn default_check_interval_secs() -> u64 {
        60
    }

    const fn default_slow_response_threshold_ms() -> u64 {
        SLOW_RESPONSE_THRESHOLD_MS
    }

    const fn default_history_capacity() -> usize {
        1000
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn classification_policy(&self) -> ClassificationPolicy {
        ClassificationPolicy {
            slow_response_threshold_ms: self.slow_response_threshold_ms,
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            probe_timeout_secs: Self::default_probe_timeout_secs(),
            check_interval_secs: Self::default_check_interval_secs(),
            slow_response_threshold_ms: Self::default_slow_response_threshold_ms(),
            history_capacity: Self::default_history_capacity(),
            outage_policy: OutagePolicy::default(),
        }
    }
}

impl Settings {
    /// Field constraints plus roster-wide rules serde cannot express.
    pub fn check(&self) -> Result<(), config::ConfigError> {
        self.validate()
            .map_err(|e| config::ConfigError::Message(format!("Invalid configuration: {}", e)))?;

        let mut seen = HashSet::new();
        let ids = self
            .services
            .iter()
            .map(|service| service.id.as_str())
            .chain(self.third_party.iter().map(|p| p.platform.id()));
        for id in ids {
            if !seen.insert(id) {
                return Err(config::ConfigError::Message(format!(
                    "Duplicate service id in roster: {}",
                    id
                )));
            }
        }
        Ok(())
    }
}

pub fn get_configuration() -> Result<Settings, config::ConfigError> {
    get_configuration_from("configuration")
}

/// Loads `name` (any extension the config crate knows) then `STATUSWATCH__*` overrides.
pub fn get_configuration_from(name: &str) -> Result<Settings, config::ConfigError> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let settings = config::Config::builder()
        .add_source(config::File::with_name(name).required(false))
        .add_source(
            config::Environment::with_prefix("STATUSWATCH")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    let config: Settings = settings.try_deserialize()?;
    config.check()?;

    Ok(config)
}
