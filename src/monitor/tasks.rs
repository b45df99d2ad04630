use crate::health::{HealthSample, TransportError};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Holds the "cycle running" flag for as long as it lives.
pub(crate) struct CycleGate<'a> {
    flag: &'a AtomicBool,
}

impl<'a> CycleGate<'a> {
    pub(crate) fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for CycleGate<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Per-service checks of one cycle.
///
/// Every task is joined by [`CycleTasks::join`]; if the owner is dropped first the
/// remaining tasks are aborted, so no check outlives its cycle.
#[derive(Default)]
pub(crate) struct CycleTasks {
    tasks: Vec<(String, JoinHandle<HealthSample>)>,
}

impl CycleTasks {
    /// Spawns `check`, turning an overrun of `limit` into a down sample.
    pub(crate) fn spawn<F>(&mut self, service_id: String, limit: Duration, check: F)
    where
        F: Future<Output = HealthSample> + Send + 'static,
    {
        let id = service_id.clone();
        let handle = tokio::spawn(async move {
            match tokio::time::timeout(limit, check).await {
                Ok(sample) => sample,
                Err(_) => {
                    tracing::warn!(service_id = %id, "Check exceeded {} ms", limit.as_millis());
                    HealthSample::down(&id, TransportError::timeout(limit).to_string())
                }
            }
        });
        self.tasks.push((service_id, handle));
    }

    /// Waits for every task, in spawn order. A panicked check yields an unknown sample.
    pub(crate) async fn join(&mut self) -> Vec<HealthSample> {
        let mut samples = Vec::with_capacity(self.tasks.len());
        for (service_id, handle) in self.tasks.iter_mut() {
            let sample = match handle.await {
                Ok(sample) => sample,
                Err(e) => {
                    tracing::error!(service_id = %service_id, "Check task failed: {:?}", e);
                    let reason = if e.is_panic() {
                        "Check panicked"
                    } else {
                        "Check cancelled"
                    };
                    HealthSample::unknown(service_id).with_error(reason.to_string())
                }
            };
            samples.push(sample);
        }
        self.tasks.clear();
        samples
    }
}

impl Drop for CycleTasks {
    fn drop(&mut self) {
        for (_, handle) in &self.tasks {
            handle.abort();
        }
    }
}
