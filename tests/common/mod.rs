#![allow(dead_code)]

use async_trait::async_trait;
use statuswatch::configuration::MonitorSettings;
use statuswatch::connectors::{AdapterRegistry, Platform, ThirdPartyAdapter};
use statuswatch::health::{
    ComponentType, HealthProbe, HealthSample, HealthState, ProbeError, RawResult,
    ServiceDescriptor, TransportError, TransportErrorKind,
};
use statuswatch::monitor::Monitor;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

pub fn first_party(id: &str) -> ServiceDescriptor {
    ServiceDescriptor::first_party(
        id,
        &format!("{} service", id),
        &format!("https://{}.test/health", id),
        ComponentType::Api,
    )
}

/// Address on which nothing listens, so connecting is refused.
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}/health", port)
}

pub enum Reply {
    Status(u16),
    Refused,
    Panic,
}

/// Scripted stand-in for the HTTP probe.
///
/// Replies are queued per service id; a service with an empty queue answers `200` at once.
#[derive(Default)]
pub struct FakeProbe {
    script: Mutex<HashMap<String, VecDeque<(Duration, Reply)>>>,
    always_panic: Mutex<HashSet<String>>,
    calls: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every probe waits for a permit from `gate` before answering.
    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn then(self, service_id: &str, delay: Duration, reply: Reply) -> Self {
        self.script
            .lock()
            .unwrap()
            .entry(service_id.to_string())
            .or_default()
            .push_back((delay, reply));
        self
    }

    pub fn panics_on(self, service_id: &str) -> Self {
        self.always_panic
            .lock()
            .unwrap()
            .insert(service_id.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProbe for FakeProbe {
    async fn probe(&self, descriptor: &ServiceDescriptor) -> Result<RawResult, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if self.always_panic.lock().unwrap().contains(&descriptor.id) {
            panic!("probe for {} exploded", descriptor.id);
        }

        let next = self
            .script
            .lock()
            .unwrap()
            .get_mut(&descriptor.id)
            .and_then(|queue| queue.pop_front());
        let (delay, reply) = next.unwrap_or((Duration::ZERO, Reply::Status(200)));
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let elapsed = Duration::from_millis(5);
        match reply {
            Reply::Status(code) => Ok(RawResult::response(code, elapsed)),
            Reply::Refused => Ok(RawResult::failed(
                TransportError {
                    kind: TransportErrorKind::Connect,
                    message: "Connection refused".to_string(),
                },
                elapsed,
            )),
            Reply::Panic => panic!("probe for {} exploded", descriptor.id),
        }
    }
}

/// Platform adapter reporting a fixed state.
pub struct StubAdapter {
    platform: Platform,
    descriptor: ServiceDescriptor,
    state: HealthState,
    panics: bool,
}

impl StubAdapter {
    pub fn new(platform: Platform, state: HealthState) -> Self {
        Self {
            platform,
            descriptor: ServiceDescriptor::third_party(
                platform.id(),
                platform.display_name(),
                platform.default_url(),
            ),
            state,
            panics: false,
        }
    }

    pub fn panicking(platform: Platform) -> Self {
        Self {
            panics: true,
            ..Self::new(platform, HealthState::Operational)
        }
    }
}

#[async_trait]
impl ThirdPartyAdapter for StubAdapter {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    async fn check_status(&self) -> HealthSample {
        if self.panics {
            panic!("{} adapter exploded", self.platform);
        }
        HealthSample::new(self.platform.id(), self.state, 30)
    }
}

pub fn registry(adapters: Vec<StubAdapter>) -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    for adapter in adapters {
        registry
            .register(Arc::new(adapter))
            .expect("Failed to register adapter");
    }
    registry
}

pub fn spawn_monitor(
    probe: Arc<FakeProbe>,
    services: Vec<ServiceDescriptor>,
    adapters: AdapterRegistry,
) -> Monitor {
    Monitor::builder(MonitorSettings::default())
        .services(services)
        .probe(probe)
        .adapters(adapters)
        .build()
        .expect("Failed to build monitor")
}
