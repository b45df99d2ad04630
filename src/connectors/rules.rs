//! Per-source classification of third-party status pages.

use super::errors::ConnectorError;
use super::platform::{Platform, StatusSource};
use crate::health::{is_failure, is_success, HealthState, RawResult, Verdict};
use regex::Regex;
use serde::Deserialize;

/// Compiled classification rule for one [`StatusSource`].
#[derive(Debug, Clone)]
pub enum SourceRule {
    Statuspage,
    SlackApi,
    Reachability,
    PageMarker(Regex),
}

#[derive(Debug, Deserialize)]
struct StatuspagePayload {
    status: StatuspageStatus,
}

#[derive(Debug, Deserialize)]
struct StatuspageStatus {
    indicator: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlackPayload {
    status: String,
    #[serde(default)]
    active_incidents: Vec<SlackIncident>,
}

#[derive(Debug, Deserialize)]
struct SlackIncident {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    title: Option<String>,
}

impl SourceRule {
    pub fn for_platform(platform: Platform) -> Result<Self, ConnectorError> {
        match platform.source() {
            StatusSource::Statuspage => Ok(SourceRule::Statuspage),
            StatusSource::SlackApi => Ok(SourceRule::SlackApi),
            StatusSource::Reachability => Ok(SourceRule::Reachability),
            StatusSource::PageMarker { pattern } => Regex::new(pattern)
                .map(SourceRule::PageMarker)
                .map_err(|source| ConnectorError::InvalidPattern {
                    platform: platform.id().to_string(),
                    source,
                }),
        }
    }

    /// Bare reachability needs no body.
    pub fn needs_body(&self) -> bool {
        !matches!(self, SourceRule::Reachability)
    }

    pub fn classify(&self, raw: &RawResult, slow_threshold_ms: u64) -> Verdict {
        if let Some(error) = &raw.transport_error {
            return Verdict::new(HealthState::Down, Some(error.to_string()));
        }
        let Some(status) = raw.status_code else {
            return Verdict::new(HealthState::Unknown, Some("No response recorded".to_string()));
        };

        match self {
            SourceRule::Statuspage => json_status(status, raw, statuspage_verdict),
            SourceRule::SlackApi => json_status(status, raw, slack_verdict),
            SourceRule::Reachability => reachability_verdict(status, raw, slow_threshold_ms),
            SourceRule::PageMarker(pattern) => marker_verdict(status, raw, pattern, slow_threshold_ms),
        }
    }
}

fn json_status<T, F>(status: u16, raw: &RawResult, verdict: F) -> Verdict
where
    T: serde::de::DeserializeOwned,
    F: Fn(T) -> Verdict,
{
    if !is_success(status) {
        let state = if is_failure(status) {
            HealthState::Down
        } else {
            HealthState::Unknown
        };
        return Verdict::new(state, Some(format!("Status page returned status: {}", status)));
    }

    match serde_json::from_str::<T>(raw.body.as_deref().unwrap_or_default()) {
        Ok(payload) => verdict(payload),
        Err(e) => Verdict::new(HealthState::Unknown, Some(format!("Unreadable status payload: {}", e))),
    }
}

fn statuspage_verdict(payload: StatuspagePayload) -> Verdict {
    let state = match payload.status.indicator.as_str() {
        "none" => return Verdict::operational(),
        "minor" => HealthState::Degraded,
        "major" => HealthState::PartialOutage,
        "critical" => HealthState::MajorOutage,
        "maintenance" => HealthState::Maintenance,
        other => {
            return Verdict::new(HealthState::Unknown, Some(format!("Unknown status indicator: {}", other)))
        }
    };
    Verdict::new(state, payload.status.description)
}

fn slack_verdict(payload: SlackPayload) -> Verdict {
    match payload.status.as_str() {
        "ok" => Verdict::operational(),
        "active" => {
            let state = HealthState::worst(payload.active_incidents.iter().map(|incident| {
                match incident.kind.as_str() {
                    "outage" => HealthState::MajorOutage,
                    "incident" => HealthState::PartialOutage,
                    "maintenance" => HealthState::Maintenance,
                    _ => HealthState::Degraded,
                }
            }));
            // "active" with an empty incident list still means something is going on
            let state = if state.is_operational() {
                HealthState::Degraded
            } else {
                state
            };
            let titles: Vec<&str> = payload
                .active_incidents
                .iter()
                .filter_map(|incident| incident.title.as_deref())
                .collect();
            let message = if titles.is_empty() {
                "Active incident".to_string()
            } else {
                titles.join("; ")
            };
            Verdict::new(state, Some(message))
        }
        other => Verdict::new(HealthState::Unknown, Some(format!("Unknown Slack status: {}", other))),
    }
}

fn slow(raw: &RawResult, slow_threshold_ms: u64) -> Option<Verdict> {
    let elapsed = raw.elapsed.as_millis() as u64;
    (elapsed >= slow_threshold_ms).then(|| {
        Verdict::new(HealthState::Degraded, Some(format!("Responding slowly ({} ms)", elapsed)))
    })
}

fn reachability_verdict(status: u16, raw: &RawResult, slow_threshold_ms: u64) -> Verdict {
    match status {
        s if is_success(s) => slow(raw, slow_threshold_ms).unwrap_or_else(Verdict::operational),
        401 | 403 | 429 => Verdict::new(
            HealthState::Degraded,
            Some(format!("Reachable but rejecting probes (status {})", status)),
        ),
        s if is_failure(s) => Verdict::new(HealthState::Down, Some(format!("Returned status: {}", status))),
        _ => Verdict::new(HealthState::Unknown, Some(format!("Unexpected status: {}", status))),
    }
}

fn marker_verdict(status: u16, raw: &RawResult, pattern: &Regex, slow_threshold_ms: u64) -> Verdict {
    if is_failure(status) {
        return Verdict::new(HealthState::Down, Some(format!("Returned status: {}", status)));
    }
    if !is_success(status) {
        return Verdict::new(HealthState::Unknown, Some(format!("Unexpected status: {}", status)));
    }

    let matched = raw.body.as_deref().map_or(false, |body| pattern.is_match(body));
    if !matched {
        return Verdict::new(
            HealthState::Degraded,
            Some("Page served without the expected content".to_string()),
        );
    }
    slow(raw, slow_threshold_ms).unwrap_or_else(Verdict::operational)
}
