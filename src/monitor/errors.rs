use crate::connectors::ConnectorError;
use crate::health::ProbeError;

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Identifier has no roster entry
    #[error("Unknown service: {0}")]
    UnknownService(String),
    #[error("Duplicate service id in roster: {0}")]
    DuplicateService(String),
    /// Teardown already ran; no further check may start
    #[error("Monitor has been shut down")]
    ShutDown,
    /// A zero period cannot drive a schedule
    #[error("Check interval must be positive, got {0:?}")]
    InvalidInterval(std::time::Duration),
    #[error(transparent)]
    Probe(#[from] ProbeError),
    #[error(transparent)]
    Connector(#[from] ConnectorError),
}
