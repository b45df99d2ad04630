use super::platform::Platform;
use serde::{Deserialize, Serialize};

/// Third-party platform entry of the roster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformSettings {
    /// Platform identifier (github, cloudflare, discord, slack, twitter, telegram)
    pub platform: Platform,
    /// Enable/disable checks for this platform
    #[serde(default = "PlatformSettings::default_enabled")]
    pub enabled: bool,
    /// Overrides the platform's default status URL
    #[serde(default)]
    pub url: Option<String>,
}

impl PlatformSettings {
    const fn default_enabled() -> bool {
        true
    }

    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            enabled: Self::default_enabled(),
            url: None,
        }
    }
}
