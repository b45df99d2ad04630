//! Maps raw probe results onto the health-state lattice.
//!
//! Everything here is pure: the same [`RawResult`] always yields the same [`Verdict`].

use super::models::{HealthSample, HealthState, ServiceDescriptor, DATA_FEED_ISSUE};
use super::probe::{ContentSignal, RawResult};
use chrono::{DateTime, Utc};

pub const SLOW_RESPONSE_THRESHOLD_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassificationPolicy {
    pub slow_response_threshold_ms: u64,
}

impl Default for ClassificationPolicy {
    fn default() -> Self {
        Self {
            slow_response_threshold_ms: SLOW_RESPONSE_THRESHOLD_MS,
        }
    }
}

impl ClassificationPolicy {
    pub fn threshold_for(&self, descriptor: &ServiceDescriptor) -> u64 {
        descriptor
            .slow_threshold_ms
            .unwrap_or(self.slow_response_threshold_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub state: HealthState,
    pub message: Option<String>,
}

impl Verdict {
    pub fn new(state: HealthState, message: Option<String>) -> Self {
        Self { state, message }
    }

    pub fn operational() -> Self {
        Self::new(HealthState::Operational, None)
    }

    /// Turns the verdict into a sample stamped at `timestamp`.
    pub fn into_sample(self, service_id: &str, raw: &RawResult, timestamp: DateTime<Utc>) -> HealthSample {
        let sample = HealthSample::new(service_id, self.state, raw.latency_ms())
            .with_status_code(raw.status_code)
            .at(timestamp);
        match self.message {
            Some(message) => sample.with_error(message),
            None => sample,
        }
    }
}

pub fn is_success(status: u16) -> bool {
    (200..=399).contains(&status)
}

pub fn is_failure(status: u16) -> bool {
    (400..=599).contains(&status)
}

/// Default policy for first-party services.
pub fn classify(descriptor: &ServiceDescriptor, raw: &RawResult, policy: &ClassificationPolicy) -> Verdict {
    if let Some(error) = &raw.transport_error {
        return Verdict::new(HealthState::Down, Some(error.to_string()));
    }

    let Some(status) = raw.status_code else {
        return Verdict::new(HealthState::Unknown, Some("No response recorded".to_string()));
    };

    if is_failure(status) {
        return Verdict::new(HealthState::Down, Some(format!("{} returned status: {}", descriptor.name, status)));
    }

    if !is_success(status) {
        return Verdict::new(HealthState::Unknown, Some(format!("Unexpected status: {}", status)));
    }

    if descriptor.feed.is_some() {
        if let Some(message) = raw.content.as_ref().and_then(feed_problem) {
            return Verdict::new(HealthState::Degraded, Some(format!("{}: {}", DATA_FEED_ISSUE, message)));
        }
    }

    let elapsed_ms = raw.elapsed.as_millis() as u64;
    if elapsed_ms >= policy.threshold_for(descriptor) {
        return Verdict::new(
            HealthState::Degraded,
            Some(format!("{} responding slowly ({} ms)", descriptor.name, elapsed_ms)),
        );
    }

    Verdict::operational()
}

fn feed_problem(signal: &ContentSignal) -> Option<String> {
    match signal {
        ContentSignal::Fresh => None,
        ContentSignal::Empty => Some("payload is empty".to_string()),
        ContentSignal::MissingMarker(marker) => Some(format!("expected content {} not found", marker)),
        ContentSignal::Stale { age_secs } => Some(format!("payload is {} s old", age_secs)),
        ContentSignal::Unreadable(reason) => Some(reason.clone()),
    }
}
