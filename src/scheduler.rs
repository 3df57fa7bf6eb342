//! Periodic automatic refresh.
//!
//! [`AutoRefreshScheduler`] owns one timer task. Enabling it fires a cycle
//! immediately, then once per interval; reconfiguring replaces the timer.
//! Each fire is spawned as its own task, so disabling the scheduler stops
//! future fires but never cancels a cycle already in flight.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::orchestrator::{FetchSource, Monitor};

/// Snapshot of the scheduler state for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshStatus {
    pub enabled: bool,
    pub interval_secs: u64,
    pub next_fire_at: Option<DateTime<Utc>>,
}

pub struct AutoRefreshScheduler {
    monitor: Arc<Mutex<Monitor>>,
    enabled: bool,
    interval: Duration,
    timer: Option<JoinHandle<()>>,
    next_fire_at: Arc<StdMutex<Option<DateTime<Utc>>>>,
}

impl AutoRefreshScheduler {
    pub fn new(monitor: Arc<Mutex<Monitor>>) -> Self {
        Self {
            monitor,
            enabled: false,
            interval: Duration::from_secs(600),
            timer: None,
            next_fire_at: Arc::new(StdMutex::new(None)),
        }
    }

    /// Enable or disable periodic refresh. The interval is clamped to at
    /// least one minute.
    pub fn configure(&mut self, enabled: bool, interval_minutes: u64) {
        let minutes = interval_minutes.max(1);
        self.arm(enabled, Duration::from_secs(minutes.saturating_mul(60)));
    }

    /// Replace the timer with a new one (or none). Split out from
    /// [`configure`](Self::configure) so tests can use sub-minute periods.
    fn arm(&mut self, enabled: bool, period: Duration) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.enabled = enabled;
        self.interval = period;

        if !enabled {
            self.clear_next_fire();
            debug!("automatic refresh disabled");
            return;
        }

        if let Ok(mut slot) = self.next_fire_at.lock() {
            *slot = Some(Utc::now());
        }
        let monitor = self.monitor.clone();
        let next_fire_at = self.next_fire_at.clone();
        self.timer = Some(tokio::spawn(async move {
            loop {
                // Fires are detached: aborting this timer never cancels a
                // cycle that already started.
                tokio::spawn(refresh_cycle(monitor.clone()));

                // None when the period is too far out to represent
                let next = i64::try_from(period.as_secs())
                    .ok()
                    .and_then(chrono::Duration::try_seconds)
                    .and_then(|delta| Utc::now().checked_add_signed(delta));
                if let Ok(mut slot) = next_fire_at.lock() {
                    *slot = next;
                }
                tokio::time::sleep(period).await;
            }
        }));
        debug!(period_secs = period.as_secs(), "automatic refresh enabled");
    }

    pub fn status(&self) -> RefreshStatus {
        let next_fire_at = if self.enabled {
            self.next_fire_at.lock().ok().and_then(|slot| *slot)
        } else {
            None
        };
        RefreshStatus {
            enabled: self.enabled,
            interval_secs: self.interval.as_secs(),
            next_fire_at,
        }
    }

    fn clear_next_fire(&self) {
        if let Ok(mut slot) = self.next_fire_at.lock() {
            *slot = None;
        }
    }
}

impl Drop for AutoRefreshScheduler {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// One automatic cycle: current coordinates first, last manual city second.
/// With neither, location fallback resolution is retried; a fire only skips
/// when that also yields nothing.
async fn refresh_cycle(monitor: Arc<Mutex<Monitor>>) {
    let mut m = monitor.lock().await;
    let target = match m.auto_target() {
        Some(target) => target,
        None => {
            if !m.resolver.run_ip_fallback(false).await {
                debug!("refresh fired with no target and no fallback location; skipping");
                return;
            }
            match m.auto_target() {
                Some(target) => target,
                None => return,
            }
        }
    };
    if let Err(e) = m.fetch_reading(target, FetchSource::Auto, Utc::now()).await {
        warn!(error = %e, "scheduled refresh failed");
    }
}
