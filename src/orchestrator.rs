//! Reading orchestration.
//!
//! [`Monitor`] owns the location resolver, the geocode cache, the alert
//! manager and the bounded reading history, and drives one reading cycle end
//! to end: resolve the query target, call the AQI provider, derive a usable
//! value, update location/label state, evaluate the alert, append to history,
//! then make the best-effort persistence write. Within a cycle that ordering
//! is fixed; persistence failures are logged and swallowed.
//!
//! The free functions at the bottom wire the monitor to a position watch:
//! an event pump for the continuous subscription and a one-shot idle probe
//! that falls back to IP geolocation when no fix arrives in time.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::alert::AlertManager;
use crate::config::Config;
use crate::error::FetchError;
use crate::geocache::ReverseGeocodeCache;
use crate::location::{LocationResolver, PositionEvent, PositionStream};
use crate::model::{Coordinates, NotificationPermission, Reading};
use crate::notify::Notifier;
use crate::providers::aqi::{derive_index, parse_station_coords};
use crate::providers::{AqiClient, GeocodeClient, IpLocateClient};
use crate::storage::Storage;

/// What a reading cycle should query.
#[derive(Debug, Clone)]
pub enum Target {
    /// A place name; wins over coordinates when explicitly provided.
    City(String),
    /// Resolved coordinates.
    Coords(Coordinates),
}

/// Who initiated a reading cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    Manual,
    Auto,
}

/// The orchestration state for one monitoring session.
pub struct Monitor {
    pub resolver: LocationResolver,
    geocache: ReverseGeocodeCache,
    alerts: AlertManager,
    aqi: AqiClient,
    storage: Storage,
    history: Vec<Reading>,
    history_retention: usize,
    manual_city: Option<String>,
    threshold: i64,
    permission: NotificationPermission,
}

impl Monitor {
    /// Assemble a monitor and its collaborator clients from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be initialized.
    pub fn new(
        config: &Config,
        storage: Storage,
        notifier: Box<dyn Notifier>,
    ) -> anyhow::Result<Self> {
        let aqi = AqiClient::new(&config.aqi_base_url, &config.aqi_token)?;
        let ip = IpLocateClient::new(&config.ip_base_url)?;
        let geocode = GeocodeClient::new(&config.geocode_base_url)?;

        Ok(Self {
            resolver: LocationResolver::new(ip, config.motion_epsilon_deg),
            geocache: ReverseGeocodeCache::new(geocode, config.geocode_epsilon_deg),
            alerts: AlertManager::new(
                notifier,
                config.alert_bucket_width,
                config.alert_cooldown_secs,
                config.alert_log_retention,
            ),
            aqi,
            storage,
            history: Vec::new(),
            history_retention: config.history_retention,
            manual_city: None,
            threshold: config.default_threshold,
            permission: NotificationPermission::Granted,
        })
    }

    /// Run one reading cycle for the given target.
    ///
    /// Fails fast with [`FetchError::MissingTarget`] before any network call
    /// when neither a place name nor coordinates are available.
    pub async fn fetch_reading(
        &mut self,
        target: Target,
        source: FetchSource,
        now: DateTime<Utc>,
    ) -> Result<Reading, FetchError> {
        let query = match target {
            Target::City(name) => {
                let name = name.trim().to_string();
                if name.is_empty() {
                    match self.resolver.state().coords {
                        Some(c) => Query::Geo(c),
                        None => return Err(FetchError::MissingTarget),
                    }
                } else {
                    Query::City(name)
                }
            }
            Target::Coords(c) => Query::Geo(c),
        };

        let response = match &query {
            Query::City(name) => self.aqi.fetch_city(name).await?,
            Query::Geo(coords) => self.aqi.fetch_geo(*coords).await?,
        };

        if !response.is_ok() {
            let detail = response
                .error_detail()
                .unwrap_or(response.status.as_str())
                .to_string();
            return Err(FetchError::Provider(detail));
        }

        let payload = response.payload().unwrap_or_default();
        let value = derive_index(&payload).ok_or(FetchError::NoData)?;

        let observed_at = payload
            .time
            .as_ref()
            .and_then(|t| t.s.clone())
            .unwrap_or_else(|| now.to_rfc3339());

        let label = match &query {
            Query::City(name) => {
                let station_label = payload
                    .city
                    .as_ref()
                    .and_then(|c| c.name.clone())
                    .unwrap_or_else(|| name.clone());
                let station_coords = payload
                    .city
                    .as_ref()
                    .and_then(|c| parse_station_coords(&c.geo));
                self.resolver.apply_city_reading(&station_label, station_coords);
                if source == FetchSource::Manual {
                    self.manual_city = Some(name.clone());
                }
                station_label
            }
            Query::Geo(coords) => {
                let label = self.geocache.resolve(*coords).await;
                self.resolver.set_label(label.clone());
                label
            }
        };

        let reading = Reading {
            value,
            observed_at,
            label,
            tier: crate::model::AdvisoryTier::from_value(value),
            dominant_pollutant: payload.dominentpol.clone(),
        };

        info!(
            value = reading.value,
            label = %reading.label,
            tier = reading.tier.label(),
            source = ?source,
            "reading acquired"
        );

        // Ordering within a cycle: alert evaluation, then history append,
        // then the best-effort persistence write.
        if self.permission == NotificationPermission::Granted {
            self.alerts.evaluate(&reading, self.threshold, now);
        } else {
            debug!(permission = ?self.permission, "alerts disabled; skipping evaluation");
        }

        self.history.insert(0, reading.clone());
        self.history.truncate(self.history_retention);

        if let Err(e) = self.storage.insert_reading(&reading, now).await {
            warn!(error = %e, "failed to persist reading");
        }

        Ok(reading)
    }

    /// The target an automatic cycle would use right now: resolved
    /// coordinates first, then the last manually entered place.
    pub fn auto_target(&self) -> Option<Target> {
        if let Some(c) = self.resolver.state().coords {
            return Some(Target::Coords(c));
        }
        self.manual_city.clone().map(Target::City)
    }

    /// Reading history, newest first, bounded by the retention cap.
    pub fn history(&self) -> &[Reading] {
        &self.history
    }

    /// The most recent reading, if any.
    pub fn last_reading(&self) -> Option<&Reading> {
        self.history.first()
    }

    /// Delivered alerts, newest first.
    pub fn alert_records(&self) -> &[crate::model::AlertRecord] {
        self.alerts.records()
    }

    /// Persisted readings, newest first. Read straight from the database.
    pub async fn stored_history(
        &self,
        limit: u32,
    ) -> anyhow::Result<Vec<crate::storage::StoredReading>> {
        self.storage.recent_readings(limit).await
    }

    pub fn threshold(&self) -> i64 {
        self.threshold
    }

    pub fn set_threshold(&mut self, threshold: i64) {
        self.threshold = threshold;
    }

    pub fn permission(&self) -> NotificationPermission {
        self.permission
    }

    pub fn set_permission(&mut self, permission: NotificationPermission) {
        self.permission = permission;
    }
}

/// Query form actually sent to the provider.
enum Query {
    City(String),
    Geo(Coordinates),
}

/// Handles for the background tasks attached to a position watch.
#[derive(Default)]
pub struct LocationTasks {
    pump: Option<JoinHandle<()>>,
    idle: Option<JoinHandle<()>>,
}

impl LocationTasks {
    /// Tear down the subscription tasks. Stops future position events; an
    /// in-flight fallback call on another task is unaffected.
    pub fn shutdown(&mut self) {
        if let Some(task) = self.pump.take() {
            task.abort();
        }
        if let Some(task) = self.idle.take() {
            task.abort();
        }
    }
}

/// Begin location resolution for a monitor.
///
/// With a watch, spawns the event pump and the idle probe and returns their
/// handles. Without one, runs the IP fallback inline and triggers a first
/// automatic reading when it yields coordinates.
pub async fn start_location(
    monitor: Arc<Mutex<Monitor>>,
    watch: Option<PositionStream>,
    idle_timeout: Duration,
) -> LocationTasks {
    match watch {
        None => {
            let triggered = {
                let mut m = monitor.lock().await;
                m.resolver.start(false).await
            };
            if triggered {
                run_auto_cycle(&monitor).await;
            }
            LocationTasks::default()
        }
        Some(rx) => {
            {
                let mut m = monitor.lock().await;
                m.resolver.start(true).await;
            }
            let pump = tokio::spawn(pump_watch(monitor.clone(), rx));
            let idle = tokio::spawn(idle_probe(monitor, idle_timeout));
            LocationTasks {
                pump: Some(pump),
                idle: Some(idle),
            }
        }
    }
}

/// Run one automatic cycle against the resolver's current coordinates.
async fn run_auto_cycle(monitor: &Arc<Mutex<Monitor>>) {
    let mut m = monitor.lock().await;
    let Some(coords) = m.resolver.state().coords else {
        return;
    };
    let now = Utc::now();
    if let Err(e) = m
        .fetch_reading(Target::Coords(coords), FetchSource::Auto, now)
        .await
    {
        warn!(error = %e, "automatic reading cycle failed");
    }
}

/// Forward watch events into the resolver until the sender is dropped.
async fn pump_watch(monitor: Arc<Mutex<Monitor>>, mut rx: PositionStream) {
    while let Some(event) = rx.recv().await {
        match event {
            PositionEvent::Fix(coords) => {
                let moved = {
                    let mut m = monitor.lock().await;
                    m.resolver.on_fix(coords)
                };
                if moved {
                    run_auto_cycle(&monitor).await;
                }
            }
            PositionEvent::Failed(kind) => {
                let recovered = {
                    let mut m = monitor.lock().await;
                    m.resolver.handle_watch_error(kind).await
                };
                if recovered {
                    run_auto_cycle(&monitor).await;
                }
            }
        }
    }
    debug!("position watch ended");
}

/// If no coordinates arrive within the idle timeout, try the IP fallback
/// (non-forced, so it will not double-fire if the watch resolved first).
async fn idle_probe(monitor: Arc<Mutex<Monitor>>, timeout: Duration) {
    tokio::time::sleep(timeout).await;
    let recovered = {
        let mut m = monitor.lock().await;
        if m.resolver.state().coords.is_some() {
            return;
        }
        m.resolver.run_ip_fallback(false).await
    };
    if recovered {
        run_auto_cycle(&monitor).await;
    }
}
