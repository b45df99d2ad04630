use super::models::{HealthSample, HealthState};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Which states open an outage window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutagePolicy {
    /// Degraded, partial outage, major outage and down all open a window
    #[default]
    IncludeDegraded,
    /// Only partial outage, major outage and down open a window
    HardDownOnly,
}

impl OutagePolicy {
    fn opens_outage(self, state: HealthState) -> bool {
        match self {
            OutagePolicy::IncludeDegraded => state.is_outage(),
            OutagePolicy::HardDownOnly => state.is_hard_outage(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateCounts {
    pub operational: usize,
    pub degraded: usize,
    pub partial_outage: usize,
    pub major_outage: usize,
    pub down: usize,
    pub maintenance: usize,
    pub unknown: usize,
}

impl StateCounts {
    fn record(&mut self, state: HealthState) {
        let slot = match state {
            HealthState::Operational => &mut self.operational,
            HealthState::Degraded => &mut self.degraded,
            HealthState::PartialOutage => &mut self.partial_outage,
            HealthState::MajorOutage => &mut self.major_outage,
            HealthState::Down => &mut self.down,
            HealthState::Maintenance => &mut self.maintenance,
            HealthState::Unknown => &mut self.unknown,
        };
        *slot += 1;
    }

    pub fn get(&self, state: HealthState) -> usize {
        match state {
            HealthState::Operational => self.operational,
            HealthState::Degraded => self.degraded,
            HealthState::PartialOutage => self.partial_outage,
            HealthState::MajorOutage => self.major_outage,
            HealthState::Down => self.down,
            HealthState::Maintenance => self.maintenance,
            HealthState::Unknown => self.unknown,
        }
    }
}

/// Summary folded out of one service's history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusStatistics {
    pub total_checks: usize,
    pub counts: StateCounts,
    pub uptime_percentage: f64,
    pub average_response_time: f64,
    pub outage_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_outage_start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_outage_end: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "duration_millis")]
    pub last_outage_duration: Option<Duration>,
    /// Last outage was still open at the end of the history
    pub outage_ongoing: bool,
}

/// Statistics over `history`, an ongoing outage being closed at the current time.
pub fn compute_statistics(history: &[HealthSample]) -> StatusStatistics {
    compute_statistics_at(history, Utc::now(), OutagePolicy::default())
}

/// Single pass over a time-ordered history.
///
/// An outage opens on the first outage state seen while none is open and closes on the next
/// operational sample. Maintenance and unknown samples neither open nor close a window. A
/// window still open at the end is closed at `now` in the result only.
pub fn compute_statistics_at(
    history: &[HealthSample],
    now: DateTime<Utc>,
    policy: OutagePolicy,
) -> StatusStatistics {
    let mut stats = StatusStatistics::default();
    let mut latency_sum: u64 = 0;
    let mut latency_samples: u64 = 0;
    let mut open_outage: Option<DateTime<Utc>> = None;

    for sample in history {
        stats.total_checks += 1;
        stats.counts.record(sample.state);

        if sample.latency_ms > 0 {
            latency_sum += sample.latency_ms;
            latency_samples += 1;
        }

        if open_outage.is_none() && policy.opens_outage(sample.state) {
            open_outage = Some(sample.timestamp);
            stats.outage_count += 1;
        } else if sample.state.is_operational() {
            if let Some(start) = open_outage.take() {
                stats.last_outage_start = Some(start);
                stats.last_outage_end = Some(sample.timestamp);
                stats.last_outage_duration = Some(sample.timestamp - start);
            }
        }
    }

    if let Some(start) = open_outage {
        stats.last_outage_start = Some(start);
        stats.last_outage_end = Some(now);
        stats.last_outage_duration = Some(now - start);
        stats.outage_ongoing = true;
    }

    if stats.total_checks > 0 {
        stats.uptime_percentage =
            stats.counts.operational as f64 / stats.total_checks as f64 * 100.0;
    }
    if latency_samples > 0 {
        stats.average_response_time = latency_sum as f64 / latency_samples as f64;
    }

    stats
}

mod duration_millis {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_i64(duration.num_milliseconds()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<i64>::deserialize(deserializer)?.map(Duration::milliseconds))
    }
}

/// Half-open time window `[from, to)`; an unset bound is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| timestamp >= from) && self.to.map_or(true, |to| timestamp < to)
    }
}

/// Per-service sample feed kept outside the engine, ordered by sample timestamp.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, sample: HealthSample);

    /// Samples of one service inside `range`, oldest first.
    async fn range(&self, service_id: &str, range: TimeRange) -> Vec<HealthSample>;
}

/// Bounded in-process history, the oldest samples of a service dropped first.
pub struct InMemoryHistory {
    samples: Arc<RwLock<HashMap<String, VecDeque<HealthSample>>>>,
    max_samples: usize,
}

impl InMemoryHistory {
    pub fn new(max_samples: usize) -> Self {
        Self {
            samples: Arc::new(RwLock::new(HashMap::new())),
            max_samples: max_samples.max(1),
        }
    }

    pub async fn len(&self, service_id: &str) -> usize {
        let samples = self.samples.read().await;
        samples.get(service_id).map_or(0, VecDeque::len)
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    async fn append(&self, sample: HealthSample) {
        let mut samples = self.samples.write().await;
        let feed = samples.entry(sample.service_id.clone()).or_default();
        // checks complete out of order; keep the feed sorted by timestamp
        let at = feed.partition_point(|existing| existing.timestamp <= sample.timestamp);
        feed.insert(at, sample);

        while feed.len() > self.max_samples {
            feed.pop_front();
        }
    }

    async fn range(&self, service_id: &str, range: TimeRange) -> Vec<HealthSample> {
        let samples = self.samples.read().await;
        samples
            .get(service_id)
            .map(|feed| {
                feed.iter()
                    .filter(|sample| range.contains(sample.timestamp))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn sample(state: HealthState, minute: i64) -> HealthSample {
        HealthSample::new("api", state, 100).at(t(minute))
    }

    #[test]
    fn test_empty_history() {
        let stats = compute_statistics(&[]);
        assert_eq!(stats.total_checks, 0);
        assert_eq!(stats.uptime_percentage, 0.0);
        assert_eq!(stats.average_response_time, 0.0);
        assert!(stats.last_outage_start.is_none());
        assert!(stats.last_outage_end.is_none());
        assert!(stats.last_outage_duration.is_none());
        assert_eq!(stats, StatusStatistics::default());
    }

    #[test]
    fn test_closed_outage_reconstruction() {
        let history = vec![
            sample(HealthState::Operational, 0),
            sample(HealthState::Down, 1),
            sample(HealthState::Down, 2),
            sample(HealthState::Operational, 3),
        ];
        let stats = compute_statistics_at(&history, t(10), OutagePolicy::default());

        assert_eq!(stats.last_outage_start, Some(t(1)));
        assert_eq!(stats.last_outage_end, Some(t(3)));
        assert_eq!(stats.last_outage_duration, Some(Duration::minutes(2)));
        assert_eq!(stats.outage_count, 1);
        assert!(!stats.outage_ongoing);
        assert_eq!(stats.uptime_percentage, 50.0);
        assert_eq!(stats.counts.down, 2);
    }

    #[test]
    fn test_open_outage_is_closed_virtually() {
        let history = vec![
            sample(HealthState::Operational, 0),
            sample(HealthState::Down, 1),
        ];
        let before = history.clone();
        let stats = compute_statistics_at(&history, t(2), OutagePolicy::default());

        assert_eq!(stats.last_outage_start, Some(t(1)));
        assert_eq!(stats.last_outage_end, Some(t(2)));
        assert_eq!(stats.last_outage_duration, Some(Duration::minutes(1)));
        assert!(stats.outage_ongoing);
        assert_eq!(history, before);
    }

    #[test]
    fn test_open_outage_uses_wall_clock() {
        let start = Utc::now() - Duration::minutes(5);
        let history = vec![HealthSample::down("api", "refused".to_string()).at(start)];
        let stats = compute_statistics(&history);

        let duration = stats.last_outage_duration.unwrap();
        assert!(duration >= Duration::minutes(5));
        assert!(duration < Duration::minutes(6));
    }

    #[test]
    fn test_average_latency_skips_unmeasured() {
        let history = vec![
            HealthSample::new("api", HealthState::Down, 0).at(t(0)),
            HealthSample::new("api", HealthState::Operational, 100).at(t(1)),
            HealthSample::new("api", HealthState::Operational, 300).at(t(2)),
        ];
        let stats = compute_statistics_at(&history, t(3), OutagePolicy::default());
        assert_eq!(stats.average_response_time, 200.0);
    }

    #[test]
    fn test_last_outage_wins() {
        let history = vec![
            sample(HealthState::Degraded, 0),
            sample(HealthState::Operational, 4),
            sample(HealthState::MajorOutage, 6),
            sample(HealthState::PartialOutage, 7),
            sample(HealthState::Operational, 9),
        ];
        let stats = compute_statistics_at(&history, t(20), OutagePolicy::default());

        assert_eq!(stats.outage_count, 2);
        assert_eq!(stats.last_outage_start, Some(t(6)));
        assert_eq!(stats.last_outage_end, Some(t(9)));
    }

    #[test]
    fn test_maintenance_and_unknown_do_not_touch_windows() {
        let history = vec![
            sample(HealthState::Down, 0),
            sample(HealthState::Maintenance, 1),
            sample(HealthState::Unknown, 2),
            sample(HealthState::Operational, 3),
            sample(HealthState::Maintenance, 4),
        ];
        let stats = compute_statistics_at(&history, t(5), OutagePolicy::default());

        assert_eq!(stats.outage_count, 1);
        assert_eq!(stats.last_outage_start, Some(t(0)));
        assert_eq!(stats.last_outage_end, Some(t(3)));
        assert!(!stats.outage_ongoing);
    }

    #[test]
    fn test_hard_down_policy_ignores_degradation() {
        let history = vec![
            sample(HealthState::Degraded, 0),
            sample(HealthState::Operational, 1),
        ];
        let stats = compute_statistics_at(&history, t(2), OutagePolicy::HardDownOnly);
        assert_eq!(stats.outage_count, 0);
        assert!(stats.last_outage_start.is_none());
    }

    #[test]
    fn test_statistics_are_pure() {
        let history = vec![
            sample(HealthState::Operational, 0),
            sample(HealthState::Degraded, 1),
        ];
        let first = compute_statistics_at(&history, t(5), OutagePolicy::default());
        let second = compute_statistics_at(&history, t(5), OutagePolicy::default());
        assert_eq!(first, second);
    }

    #[test]
    fn test_statistics_serialize_duration_as_millis() {
        let history = vec![sample(HealthState::Down, 0), sample(HealthState::Operational, 1)];
        let stats = compute_statistics_at(&history, t(2), OutagePolicy::default());
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["last_outage_duration"], serde_json::json!(60_000));
    }

    #[tokio::test]
    async fn test_history_limit() {
        let history = InMemoryHistory::new(5);

        for i in 0..10 {
            history.append(sample(HealthState::Operational, i)).await;
        }

        assert_eq!(history.len("api").await, 5);
        let kept = history.range("api", TimeRange::all()).await;
        assert_eq!(kept.first().map(|s| s.timestamp), Some(t(5)));
    }

    #[tokio::test]
    async fn test_history_range_filter() {
        let history = InMemoryHistory::new(100);
        for i in 0..6 {
            history.append(sample(HealthState::Operational, i)).await;
        }
        history.append(HealthSample::unknown("other").at(t(2))).await;

        let range = TimeRange {
            from: Some(t(2)),
            to: Some(t(4)),
        };
        let selected = history.range("api", range).await;
        assert_eq!(selected.len(), 2);
        assert!(history.range("missing", TimeRange::all()).await.is_empty());
    }

    #[tokio::test]
    async fn test_late_append_keeps_timestamp_order() {
        let history = InMemoryHistory::new(100);
        history.append(sample(HealthState::Down, 5)).await;
        history.append(sample(HealthState::Operational, 1)).await;
        history.append(sample(HealthState::Operational, 7)).await;

        let feed = history.range("api", TimeRange::all()).await;
        let stamps: Vec<DateTime<Utc>> = feed.iter().map(|s| s.timestamp).collect();
        assert_eq!(stamps, vec![t(1), t(5), t(7)]);

        let stats = compute_statistics_at(&feed, t(8), OutagePolicy::default());
        assert_eq!(stats.last_outage_start, Some(t(5)));
        assert_eq!(stats.last_outage_duration, Some(Duration::minutes(2)));
    }
}
