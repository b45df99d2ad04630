use crate::health::{HealthSample, HealthState, ServiceState};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// Published to subscribers once per completed cycle or single-service check.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum MonitorEvent {
    CycleCompleted(CycleReport),
    ServiceChecked(ServiceState),
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One sample per roster entry, in roster order
    pub samples: Vec<HealthSample>,
}

impl CycleReport {
    pub fn overall(&self) -> HealthState {
        HealthState::worst(self.samples.iter().map(|sample| sample.state))
    }
}

#[derive(Debug, Clone)]
pub enum CycleOutcome {
    Completed(CycleReport),
    /// Another cycle was in flight; nothing was done
    AlreadyRunning,
}

impl CycleOutcome {
    pub fn report(&self) -> Option<&CycleReport> {
        match self {
            CycleOutcome::Completed(report) => Some(report),
            CycleOutcome::AlreadyRunning => None,
        }
    }

    pub fn is_already_running(&self) -> bool {
        matches!(self, CycleOutcome::AlreadyRunning)
    }
}

/// Copy of the current state table handed to readers.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorSnapshot {
    pub overall: HealthState,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub services: Vec<ServiceState>,
}
