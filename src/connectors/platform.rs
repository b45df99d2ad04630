use super::errors::ConnectorError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// External platforms the monitor knows how to check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Github,
    Cloudflare,
    Discord,
    Slack,
    Twitter,
    Telegram,
}

/// Shape of the page a platform publishes its status on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSource {
    /// Atlassian Statuspage `api/v2/status.json`
    Statuspage,
    /// Slack status API `api/v2.0.0/current`
    SlackApi,
    /// No status page; any HTTP answer proves the platform reachable
    Reachability,
    /// HTML page expected to match a pattern when healthy
    PageMarker { pattern: &'static str },
}

impl Platform {
    pub const ALL: [Platform; 6] = [
        Platform::Github,
        Platform::Cloudflare,
        Platform::Discord,
        Platform::Slack,
        Platform::Twitter,
        Platform::Telegram,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Platform::Github => "github",
            Platform::Cloudflare => "cloudflare",
            Platform::Discord => "discord",
            Platform::Slack => "slack",
            Platform::Twitter => "twitter",
            Platform::Telegram => "telegram",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Platform::Github => "GitHub",
            Platform::Cloudflare => "Cloudflare",
            Platform::Discord => "Discord",
            Platform::Slack => "Slack",
            Platform::Twitter => "X (Twitter)",
            Platform::Telegram => "Telegram",
        }
    }

    pub fn default_url(self) -> &'static str {
        match self {
            Platform::Github => "https://www.githubstatus.com/api/v2/status.json",
            Platform::Cloudflare => "https://www.cloudflarestatus.com/api/v2/status.json",
            Platform::Discord => "https://discordstatus.com/api/v2/status.json",
            Platform::Slack => "https://slack-status.com/api/v2.0.0/current",
            Platform::Twitter => "https://x.com/",
            Platform::Telegram => "https://telegram.org/",
        }
    }

    pub fn source(self) -> StatusSource {
        match self {
            Platform::Github | Platform::Cloudflare | Platform::Discord => StatusSource::Statuspage,
            Platform::Slack => StatusSource::SlackApi,
            Platform::Twitter => StatusSource::Reachability,
            Platform::Telegram => StatusSource::PageMarker {
                pattern: r"(?i)<title>[^<]*telegram",
            },
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Platform {
    type Err = ConnectorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|platform| platform.id().eq_ignore_ascii_case(value))
            .ok_or_else(|| ConnectorError::UnknownPlatform(value.to_string()))
    }
}
