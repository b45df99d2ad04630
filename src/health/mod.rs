mod classifier;
mod metrics;
mod models;
mod probe;

pub use classifier::{
    classify, is_failure, is_success, ClassificationPolicy, Verdict, SLOW_RESPONSE_THRESHOLD_MS,
};
pub use metrics::{
    compute_statistics, compute_statistics_at, HistoryStore, InMemoryHistory, OutagePolicy,
    StateCounts, StatusStatistics, TimeRange,
};
pub use models::{
    ComponentType, FeedExpectation, HealthSample, HealthState, ServiceDescriptor, ServiceKind,
    ServiceState, DATA_FEED_ISSUE,
};
pub use probe::{
    ContentSignal, HealthProbe, HttpProbe, ProbeError, RawResult, TransportError,
    TransportErrorKind, DEFAULT_PROBE_TIMEOUT,
};
