use super::errors::MonitorError;
use super::events::CycleOutcome;
use super::orchestrator::{Inner, Monitor};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Running periodic schedule.
pub(crate) struct Periodic {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
    interval: Duration,
}

impl Periodic {
    /// Stops scheduling new cycles; a cycle already dispatched runs to completion.
    pub(crate) fn cancel(&self) {
        let _ = self.stop.send(true);
    }

    pub(crate) async fn join(self) {
        self.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!("Periodic check task ended abnormally: {:?}", e);
        }
    }
}

impl Monitor {
    /// Runs `check_all` now and then every `interval`.
    ///
    /// Calling it again replaces the running schedule, so at most one timer is ever active.
    /// A cycle dispatched by the replaced schedule is not aborted; while it runs, the new
    /// schedule's first cycle is skipped as already running.
    pub async fn start_periodic(&self, interval: Duration) -> Result<(), MonitorError> {
        if interval.is_zero() {
            return Err(MonitorError::InvalidInterval(interval));
        }
        if self.inner.is_shut_down().await {
            return Err(MonitorError::ShutDown);
        }

        let mut slot = self.inner.scheduler.lock().await;
        if let Some(previous) = slot.take() {
            tracing::info!(
                previous_secs = previous.interval.as_secs(),
                "Replacing periodic check schedule"
            );
            previous.cancel();
        }

        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(run_periodic(Arc::downgrade(&self.inner), interval, stop_rx));
        *slot = Some(Periodic {
            stop,
            handle,
            interval,
        });
        tracing::info!(interval_secs = interval.as_secs(), "Periodic checks started");

        Ok(())
    }

    /// Cancels the schedule. Returns `false` when none was running.
    pub async fn stop_periodic(&self) -> bool {
        match self.inner.scheduler.lock().await.take() {
            Some(periodic) => {
                periodic.cancel();
                tracing::info!("Periodic checks stopped");
                true
            }
            None => false,
        }
    }

    pub async fn is_periodic_active(&self) -> bool {
        self.inner.scheduler.lock().await.is_some()
    }
}

async fn run_periodic(inner: Weak<Inner>, period: Duration, mut stop: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            // a dropped sender stops the loop as well
            _ = stop.changed() => break,
            _ = ticker.tick() => {}
        }
        if *stop.borrow() {
            break;
        }

        let Some(inner) = inner.upgrade() else {
            break;
        };
        let monitor = Monitor { inner };
        match monitor.check_all().await {
            Ok(CycleOutcome::Completed(_)) => {}
            Ok(CycleOutcome::AlreadyRunning) => {
                tracing::info!("Scheduled cycle skipped, previous one still running")
            }
            Err(MonitorError::ShutDown) => break,
            Err(e) => tracing::error!("Scheduled check cycle failed: {:?}", e),
        }
    }

    tracing::debug!("Periodic check loop exited");
}
