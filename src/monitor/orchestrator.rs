use super::errors::MonitorError;
use super::events::{CycleOutcome, CycleReport, MonitorEvent, MonitorSnapshot};
use super::scheduler::Periodic;
use super::tasks::{CycleGate, CycleTasks};
use crate::configuration::{MonitorSettings, Settings};
use crate::connectors::{AdapterRegistry, ThirdPartyAdapter};
use crate::health::{
    classify, compute_statistics_at, ClassificationPolicy, HealthProbe, HealthSample, HealthState,
    HistoryStore, HttpProbe, InMemoryHistory, OutagePolicy, ServiceDescriptor, ServiceState,
    StatusStatistics, TimeRange,
};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock, RwLockReadGuard};
use uuid::Uuid;

/// Headroom on top of the probe timeout before a check is cut off.
const CHECK_GRACE: Duration = Duration::from_secs(2);

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Held by every in-flight check; shutdown takes it once they are done.
struct Resources {
    probe: Arc<dyn HealthProbe>,
    adapters: AdapterRegistry,
}

struct StateTable {
    services: HashMap<String, ServiceState>,
    last_cycle_at: Option<DateTime<Utc>>,
}

pub(crate) struct Inner {
    first_party: Vec<ServiceDescriptor>,
    /// Combined roster, first-party entries first
    roster: Vec<ServiceDescriptor>,
    resources: RwLock<Option<Resources>>,
    policy: ClassificationPolicy,
    outage_policy: OutagePolicy,
    check_limit: Duration,
    table: RwLock<StateTable>,
    history: Arc<dyn HistoryStore>,
    checking: AtomicBool,
    seq: AtomicU64,
    events: broadcast::Sender<MonitorEvent>,
    pub(crate) scheduler: Mutex<Option<Periodic>>,
}

enum Target {
    FirstParty(ServiceDescriptor),
    ThirdParty(Arc<dyn ThirdPartyAdapter>),
}

/// Owns the roster and the state table, and runs check cycles over them.
///
/// Cheap to clone; all clones drive the same monitor.
#[derive(Clone)]
pub struct Monitor {
    pub(crate) inner: Arc<Inner>,
}

impl Monitor {
    pub fn builder(settings: MonitorSettings) -> MonitorBuilder {
        MonitorBuilder::new(settings)
    }

    /// Production wiring: HTTP probe, HTTP platform adapters and in-memory history.
    pub fn from_settings(settings: &Settings) -> Result<Self, MonitorError> {
        let probe = Arc::new(HttpProbe::new(settings.monitor.probe_timeout())?);
        let adapters = AdapterRegistry::from_settings(
            &settings.third_party,
            probe.clone(),
            settings.monitor.classification_policy(),
        )?;

        MonitorBuilder::new(settings.monitor.clone())
            .services(settings.services.clone())
            .probe(probe)
            .adapters(adapters)
            .build()
    }

    pub fn roster(&self) -> &[ServiceDescriptor] {
        &self.inner.roster
    }

    pub fn subscribe(&self) -> broadcast::Receiver<MonitorEvent> {
        self.inner.events.subscribe()
    }

    pub fn is_checking(&self) -> bool {
        self.inner.checking.load(Ordering::Acquire)
    }

    pub async fn state(&self, service_id: &str) -> Option<ServiceState> {
        let table = self.inner.table.read().await;
        table.services.get(service_id).cloned()
    }

    pub async fn last_cycle_at(&self) -> Option<DateTime<Utc>> {
        self.inner.table.read().await.last_cycle_at
    }

    pub async fn snapshot(&self) -> MonitorSnapshot {
        let table = self.inner.table.read().await;
        let services: Vec<ServiceState> = self
            .inner
            .roster
            .iter()
            .filter_map(|descriptor| table.services.get(&descriptor.id).cloned())
            .collect();

        MonitorSnapshot {
            overall: HealthState::worst(services.iter().map(|state| state.latest.state)),
            last_cycle_at: table.last_cycle_at,
            services,
        }
    }

    /// Runs one batch cycle over the whole roster.
    ///
    /// Returns [`CycleOutcome::AlreadyRunning`] without doing anything while another cycle
    /// is in flight. Individual check failures become samples; the cycle always completes.
    #[tracing::instrument(name = "Check all services", skip(self))]
    pub async fn check_all(&self) -> Result<CycleOutcome, MonitorError> {
        let resources = self.inner.acquire().await?;
        let Some(_gate) = CycleGate::acquire(&self.inner.checking) else {
            tracing::info!("Check cycle already running, skipping");
            return Ok(CycleOutcome::AlreadyRunning);
        };

        let seq = self.inner.next_seq();
        let cycle_id = Uuid::new_v4();
        let started_at = Utc::now();
        tracing::info!(%cycle_id, services = self.inner.roster.len(), "Starting check cycle");

        let mut tasks = CycleTasks::default();
        for descriptor in &self.inner.first_party {
            let check = probe_service(resources.probe.clone(), descriptor.clone(), self.inner.policy);
            tasks.spawn(descriptor.id.clone(), self.inner.check_limit, check);
        }
        for adapter in resources.adapters.adapters() {
            let adapter = adapter.clone();
            let service_id = adapter.descriptor().id.clone();
            tasks.spawn(service_id, self.inner.check_limit, async move {
                adapter.check_status().await
            });
        }
        let samples = tasks.join().await;

        let finished_at = Utc::now();
        self.inner.record(&samples, seq, Some(finished_at)).await;

        let report = CycleReport {
            cycle_id,
            started_at,
            finished_at,
            samples,
        };
        tracing::info!(
            %cycle_id,
            overall = %report.overall(),
            elapsed_ms = (finished_at - started_at).num_milliseconds(),
            "Check cycle completed"
        );
        // no subscribers is fine
        let _ = self.inner.events.send(MonitorEvent::CycleCompleted(report.clone()));

        Ok(CycleOutcome::Completed(report))
    }

    /// Checks one roster entry, first-party or third-party, by id.
    #[tracing::instrument(name = "Check service", skip(self))]
    pub async fn check_service(&self, service_id: &str) -> Result<ServiceState, MonitorError> {
        let resources = self.inner.acquire().await?;
        let target = match self.inner.first_party.iter().find(|d| d.id == service_id) {
            Some(descriptor) => Target::FirstParty(descriptor.clone()),
            None => Target::ThirdParty(
                resources
                    .adapters
                    .lookup(service_id)
                    .map_err(|_| MonitorError::UnknownService(service_id.to_string()))?,
            ),
        };

        let seq = self.inner.next_seq();
        let mut tasks = CycleTasks::default();
        match target {
            Target::FirstParty(descriptor) => {
                let check = probe_service(resources.probe.clone(), descriptor, self.inner.policy);
                tasks.spawn(service_id.to_string(), self.inner.check_limit, check);
            }
            Target::ThirdParty(adapter) => {
                tasks.spawn(service_id.to_string(), self.inner.check_limit, async move {
                    adapter.check_status().await
                });
            }
        }
        let samples = tasks.join().await;
        self.inner.record(&samples, seq, None).await;

        let state = self
            .state(service_id)
            .await
            .ok_or_else(|| MonitorError::UnknownService(service_id.to_string()))?;
        let _ = self.inner.events.send(MonitorEvent::ServiceChecked(state.clone()));

        Ok(state)
    }

    /// Statistics over the history of one service; read-only.
    pub async fn statistics(
        &self,
        service_id: &str,
        range: TimeRange,
    ) -> Result<StatusStatistics, MonitorError> {
        if !self.inner.roster.iter().any(|d| d.id == service_id) {
            return Err(MonitorError::UnknownService(service_id.to_string()));
        }
        let history = self.inner.history.range(service_id, range).await;
        Ok(compute_statistics_at(&history, Utc::now(), self.inner.outage_policy))
    }

    /// Stops the schedule, waits for checks in flight and refuses any later check.
    ///
    /// A check that already started runs to completion and is recorded before this returns.
    pub async fn shutdown(&self) {
        let periodic = self.inner.scheduler.lock().await.take();
        if let Some(periodic) = &periodic {
            periodic.cancel();
        }

        // waits for every in-flight check to drop its guard
        let resources = self.inner.resources.write().await.take();

        if let Some(periodic) = periodic {
            periodic.join().await;
        }
        drop(resources);
        tracing::info!("Monitor shut down");
    }
}

impl Inner {
    /// Pins the probe and adapters for one check. Shutdown blocks until the guard drops.
    async fn acquire(&self) -> Result<RwLockReadGuard<'_, Resources>, MonitorError> {
        RwLockReadGuard::try_map(self.resources.read().await, |slot| slot.as_ref())
            .map_err(|_| MonitorError::ShutDown)
    }

    pub(crate) async fn is_shut_down(&self) -> bool {
        self.resources.read().await.is_none()
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Appends to history, then replaces each service's state by id.
    async fn record(&self, samples: &[HealthSample], seq: u64, cycle_finished: Option<DateTime<Utc>>) {
        for sample in samples {
            self.history.append(sample.clone()).await;
        }

        let mut table = self.table.write().await;
        for sample in samples {
            let Some(current) = table.services.get(&sample.service_id) else {
                tracing::error!(service_id = %sample.service_id, "Sample for a service outside the roster");
                continue;
            };
            let mut next = current.clone();
            if next.apply(sample.clone(), seq) {
                table.services.insert(sample.service_id.clone(), next);
            } else {
                tracing::debug!(service_id = %sample.service_id, "Discarded sample from an older check");
            }
        }
        if let Some(finished_at) = cycle_finished {
            table.last_cycle_at = Some(finished_at);
        }
    }
}

async fn probe_service(
    probe: Arc<dyn HealthProbe>,
    descriptor: ServiceDescriptor,
    policy: ClassificationPolicy,
) -> HealthSample {
    match probe.probe(&descriptor).await {
        Ok(raw) => {
            let sample = classify(&descriptor, &raw, &policy).into_sample(&descriptor.id, &raw, Utc::now());
            tracing::debug!(
                service_id = %descriptor.id,
                state = %sample.state,
                latency_ms = sample.latency_ms,
                "Service checked"
            );
            sample
        }
        Err(e) => {
            tracing::error!(service_id = %descriptor.id, "Probe could not be issued: {:?}", e);
            HealthSample::unknown(&descriptor.id).with_error(e.to_string())
        }
    }
}

/// Assembles a [`Monitor`]; unset collaborators fall back to the HTTP probe and
/// an in-memory history.
pub struct MonitorBuilder {
    settings: MonitorSettings,
    services: Vec<ServiceDescriptor>,
    probe: Option<Arc<dyn HealthProbe>>,
    adapters: AdapterRegistry,
    history: Option<Arc<dyn HistoryStore>>,
}

impl MonitorBuilder {
    pub fn new(settings: MonitorSettings) -> Self {
        Self {
            settings,
            services: Vec::new(),
            probe: None,
            adapters: AdapterRegistry::new(),
            history: None,
        }
    }

    pub fn service(mut self, descriptor: ServiceDescriptor) -> Self {
        self.services.push(descriptor);
        self
    }

    pub fn services(mut self, descriptors: Vec<ServiceDescriptor>) -> Self {
        self.services.extend(descriptors);
        self
    }

    pub fn probe(mut self, probe: Arc<dyn HealthProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn adapters(mut self, adapters: AdapterRegistry) -> Self {
        self.adapters = adapters;
        self
    }

    pub fn history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn build(self) -> Result<Monitor, MonitorError> {
        let roster: Vec<ServiceDescriptor> = self
            .services
            .iter()
            .cloned()
            .chain(self.adapters.descriptors())
            .collect();

        let mut seen = HashSet::new();
        for descriptor in &roster {
            if !seen.insert(descriptor.id.as_str()) {
                return Err(MonitorError::DuplicateService(descriptor.id.clone()));
            }
        }

        let probe: Arc<dyn HealthProbe> = match self.probe {
            Some(probe) => probe,
            None => Arc::new(HttpProbe::new(self.settings.probe_timeout())?),
        };
        let history: Arc<dyn HistoryStore> = self
            .history
            .unwrap_or_else(|| Arc::new(InMemoryHistory::new(self.settings.history_capacity)));

        let services = roster
            .iter()
            .map(|descriptor| (descriptor.id.clone(), ServiceState::new(descriptor.clone())))
            .collect();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        tracing::info!(
            first_party = self.services.len(),
            third_party = self.adapters.len(),
            "Monitor roster initialized"
        );

        Ok(Monitor {
            inner: Arc::new(Inner {
                first_party: self.services,
                roster,
                resources: RwLock::new(Some(Resources {
                    probe,
                    adapters: self.adapters,
                })),
                policy: self.settings.classification_policy(),
                outage_policy: self.settings.outage_policy,
                check_limit: self.settings.probe_timeout() + CHECK_GRACE,
                table: RwLock::new(StateTable {
                    services,
                    last_cycle_at: None,
                }),
                history,
                checking: AtomicBool::new(false),
                seq: AtomicU64::new(0),
                events,
                scheduler: Mutex::new(None),
            }),
        })
    }
}
