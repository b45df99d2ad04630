use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_valid::Validate;

/// Prefix carried by the error message of samples whose endpoint answered but served a bad payload.
pub const DATA_FEED_ISSUE: &str = "Data feed issue";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ServiceKind {
    FirstParty,
    ThirdParty,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
    Main,
    Auth,
    Api,
    Database,
    Cdn,
    #[default]
    Other,
}

/// Expected shape of the payload served by a data-feed endpoint.
///
/// An endpoint carrying a feed can answer `200 OK` while the feed itself is broken,
/// so the probe inspects the body and reports a [`ContentSignal`](super::ContentSignal).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FeedExpectation {
    /// Substring that must be present in the body
    #[serde(default)]
    pub contains: Option<String>,
    /// JSON pointer (RFC 6901) to an RFC 3339 or unix-seconds timestamp in the body
    #[serde(default)]
    pub timestamp_pointer: Option<String>,
    /// Maximum tolerated age of the timestamp found at `timestamp_pointer`
    #[serde(default)]
    pub max_age_secs: Option<u64>,
}

/// Immutable identity of a monitored service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Validate)]
pub struct ServiceDescriptor {
    #[validate(min_length = 1)]
    pub id: String,
    #[validate(min_length = 1)]
    pub name: String,
    #[validate(min_length = 1)]
    pub url: String,
    pub kind: ServiceKind,
    #[serde(default)]
    pub component_type: ComponentType,
    #[serde(default)]
    pub feed: Option<FeedExpectation>,
    /// Overrides the global slow-response threshold for this service
    #[serde(default)]
    pub slow_threshold_ms: Option<u64>,
}

impl ServiceDescriptor {
    pub fn first_party(id: &str, name: &str, url: &str, component_type: ComponentType) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            url: url.to_string(),
            kind: ServiceKind::FirstParty,
            component_type,
            feed: None,
            slow_threshold_ms: None,
        }
    }

    pub fn third_party(id: &str, name: &str, url: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            url: url.to_string(),
            kind: ServiceKind::ThirdParty,
            component_type: ComponentType::Other,
            feed: None,
            slow_threshold_ms: None,
        }
    }

    pub fn with_feed(mut self, feed: FeedExpectation) -> Self {
        self.feed = Some(feed);
        self
    }
}

/// Health classification of one sample.
///
/// Declaration order means nothing; compare through [`HealthState::severity`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "camelCase")]
pub enum HealthState {
    Operational,
    Degraded,
    PartialOutage,
    MajorOutage,
    Down,
    Maintenance,
    #[default]
    Unknown,
}

impl HealthState {
    /// Position in the severity lattice, 0 being healthy.
    pub fn severity(self) -> u8 {
        match self {
            HealthState::Operational => 0,
            HealthState::Unknown => 1,
            HealthState::Maintenance => 2,
            HealthState::Degraded => 3,
            HealthState::PartialOutage => 4,
            HealthState::MajorOutage => 5,
            HealthState::Down => 6,
        }
    }

    pub fn is_operational(self) -> bool {
        self == HealthState::Operational
    }

    /// States that open an outage window when degradation counts as an outage.
    pub fn is_outage(self) -> bool {
        matches!(
            self,
            HealthState::Degraded
                | HealthState::PartialOutage
                | HealthState::MajorOutage
                | HealthState::Down
        )
    }

    pub fn is_hard_outage(self) -> bool {
        matches!(
            self,
            HealthState::PartialOutage | HealthState::MajorOutage | HealthState::Down
        )
    }

    /// Most severe state of the iterator, `Operational` when empty.
    pub fn worst<I>(states: I) -> HealthState
    where
        I: IntoIterator<Item = HealthState>,
    {
        states
            .into_iter()
            .max_by_key(|state| state.severity())
            .unwrap_or(HealthState::Operational)
    }
}

impl std::fmt::Display for HealthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            HealthState::Operational => "operational",
            HealthState::Degraded => "degraded",
            HealthState::PartialOutage => "partialOutage",
            HealthState::MajorOutage => "majorOutage",
            HealthState::Down => "down",
            HealthState::Maintenance => "maintenance",
            HealthState::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// One classified probe outcome. Never edited after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthSample {
    pub service_id: String,
    pub timestamp: DateTime<Utc>,
    pub state: HealthState,
    /// Round-trip latency, 0 when not measured
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

impl HealthSample {
    pub fn new(service_id: &str, state: HealthState, latency_ms: u64) -> Self {
        Self {
            service_id: service_id.to_string(),
            timestamp: Utc::now(),
            state,
            latency_ms,
            error_message: None,
            status_code: None,
        }
    }

    /// Placeholder held by a service before its first probe completes.
    pub fn unknown(service_id: &str) -> Self {
        Self::new(service_id, HealthState::Unknown, 0)
    }

    pub fn down(service_id: &str, error: String) -> Self {
        Self::new(service_id, HealthState::Down, 0).with_error(error)
    }

    pub fn with_error(mut self, error: String) -> Self {
        self.error_message = Some(error);
        self
    }

    pub fn with_status_code(mut self, status_code: Option<u16>) -> Self {
        self.status_code = status_code;
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn is_data_feed_issue(&self) -> bool {
        self.error_message
            .as_deref()
            .map_or(false, |message| message.starts_with(DATA_FEED_ISSUE))
    }
}

/// Current-value view of one service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceState {
    pub descriptor: ServiceDescriptor,
    pub latest: HealthSample,
    pub last_up_time: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    /// Sequence number of the check that produced `latest`
    #[serde(skip)]
    pub(crate) applied_seq: u64,
}

impl ServiceState {
    pub fn new(descriptor: ServiceDescriptor) -> Self {
        let latest = HealthSample::unknown(&descriptor.id);
        Self {
            descriptor,
            latest,
            last_up_time: None,
            consecutive_failures: 0,
            applied_seq: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    /// Folds a new sample into the view.
    ///
    /// Returns `false` and leaves the state untouched when `seq` is not newer than the
    /// check already applied, so a slow earlier check cannot overwrite a newer result.
    pub fn apply(&mut self, sample: HealthSample, seq: u64) -> bool {
        if seq <= self.applied_seq {
            return false;
        }

        if sample.state.is_operational() {
            self.last_up_time = Some(sample.timestamp);
            self.consecutive_failures = 0;
        } else {
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        }
        self.latest = sample;
        self.applied_seq = seq;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ServiceDescriptor {
        ServiceDescriptor::first_party("api", "API", "https://api.example.com", ComponentType::Api)
    }

    #[test]
    fn test_new_state_starts_unknown() {
        let state = ServiceState::new(descriptor());
        assert_eq!(state.latest.state, HealthState::Unknown);
        assert_eq!(state.latest.service_id, "api");
        assert_eq!(state.consecutive_failures, 0);
        assert!(state.last_up_time.is_none());
    }

    #[test]
    fn test_apply_counts_failures_and_resets_on_operational() {
        let mut state = ServiceState::new(descriptor());

        assert!(state.apply(HealthSample::down("api", "refused".to_string()), 1));
        assert!(state.apply(HealthSample::new("api", HealthState::Degraded, 1500), 2));
        assert_eq!(state.consecutive_failures, 2);
        assert!(state.last_up_time.is_none());

        let up = HealthSample::new("api", HealthState::Operational, 120);
        let up_at = up.timestamp;
        assert!(state.apply(up, 3));
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(state.last_up_time, Some(up_at));
    }

    #[test]
    fn test_apply_rejects_stale_sequence() {
        let mut state = ServiceState::new(descriptor());
        assert!(state.apply(HealthSample::new("api", HealthState::Operational, 80), 5));

        let stale = HealthSample::down("api", "old cycle".to_string());
        assert!(!state.apply(stale, 4));
        assert_eq!(state.latest.state, HealthState::Operational);
        assert_eq!(state.consecutive_failures, 0);
    }

    #[test]
    fn test_worst_state() {
        let worst = HealthState::worst([
            HealthState::Operational,
            HealthState::Maintenance,
            HealthState::PartialOutage,
            HealthState::Degraded,
        ]);
        assert_eq!(worst, HealthState::PartialOutage);
        assert_eq!(HealthState::worst([]), HealthState::Operational);
    }

    #[test]
    fn test_state_serializes_camel_case() {
        let json = serde_json::to_string(&HealthState::PartialOutage).unwrap();
        assert_eq!(json, "\"partialOutage\"");
        assert_eq!(HealthState::MajorOutage.to_string(), "majorOutage");
    }

    #[test]
    fn test_data_feed_flag() {
        let sample = HealthSample::new("feed", HealthState::Degraded, 90)
            .with_error(format!("{}: payload is empty", DATA_FEED_ISSUE));
        assert!(sample.is_data_feed_issue());
        assert!(!HealthSample::down("feed", "timeout".to_string()).is_data_feed_issue());
    }
}
