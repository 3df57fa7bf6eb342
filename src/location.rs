//! Location resolution state machine.
//!
//! Produces the current best-known location by combining three signals in
//! fallback order: a continuous position watch (when the environment has
//! one), a one-shot IP-geolocation lookup, and manual city entry. The
//! resolver owns all location state; nothing else mutates it.
//!
//! The IP fallback is single-flight: once it has run for the current
//! location-acquisition episode, re-invoking it is a no-op unless explicitly
//! forced (the watch-error path forces, the idle probe does not). A failed
//! fallback resets the guard so a later retry can still happen.

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::model::{Coordinates, LocationState, LocationStatus};
use crate::providers::IpLocateClient;

/// Status message shown when location resolution has been exhausted.
pub const ENTER_CITY_PROMPT: &str =
    "Could not determine your location; enter a city to check air quality";

/// Status message when the environment has no position capability at all.
pub const UNSUPPORTED_REASON: &str = "Location is not supported in this environment";

/// Platform error codes of the position watch, mapped to human reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionErrorKind {
    PermissionDenied,
    Unavailable,
    Timeout,
    Insecure,
}

impl PositionErrorKind {
    /// Human-readable reason for the status display.
    pub fn reason(self) -> &'static str {
        match self {
            PositionErrorKind::PermissionDenied => {
                "Location permission denied; using approximate location"
            }
            PositionErrorKind::Unavailable => "Position unavailable; using approximate location",
            PositionErrorKind::Timeout => "Location request timed out; using approximate location",
            PositionErrorKind::Insecure => {
                "Location requires a secure context; using approximate location"
            }
        }
    }
}

/// One event from the continuous position watch.
#[derive(Debug, Clone, Copy)]
pub enum PositionEvent {
    Fix(Coordinates),
    Failed(PositionErrorKind),
}

/// Receiving half of a position watch subscription. Dropping the sender ends
/// the subscription; no further events arrive.
pub type PositionStream = mpsc::Receiver<PositionEvent>;

/// The location-resolution state machine.
pub struct LocationResolver {
    state: LocationState,
    last_live_fix: Option<Coordinates>,
    /// Single-flight latch for the IP-fallback path.
    fallback_started: bool,
    motion_epsilon_deg: f64,
    ip_client: IpLocateClient,
}

impl LocationResolver {
    pub fn new(ip_client: IpLocateClient, motion_epsilon_deg: f64) -> Self {
        Self {
            state: LocationState::idle(),
            last_live_fix: None,
            fallback_started: false,
            motion_epsilon_deg,
            ip_client,
        }
    }

    /// Current best-known location.
    pub fn state(&self) -> &LocationState {
        &self.state
    }

    /// Begin resolution. With a position capability this just opens the
    /// Locating state and waits for watch events; without one it goes
    /// straight to the IP fallback.
    ///
    /// Returns whether fallback coordinates were obtained (a downstream
    /// trigger for the caller).
    pub async fn start(&mut self, has_capability: bool) -> bool {
        if has_capability {
            self.state.status = LocationStatus::Locating;
            debug_assert!(self.invariant_ok());
            return false;
        }

        self.state.status = LocationStatus::Error(UNSUPPORTED_REASON.to_string());
        self.state.coords = None;
        self.run_ip_fallback(false).await
    }

    /// Handle one position fix from the watch.
    ///
    /// Returns `true` when the fix moved beyond the motion epsilon from the
    /// last live fix (a downstream trigger); small jitter updates the state
    /// silently.
    pub fn on_fix(&mut self, coords: Coordinates) -> bool {
        let moved = match self.last_live_fix {
            Some(last) => !coords.is_near(&last, self.motion_epsilon_deg),
            None => true,
        };

        self.state.status = LocationStatus::Live;
        self.state.coords = Some(coords);
        self.last_live_fix = Some(coords);
        debug_assert!(self.invariant_ok());

        if !moved {
            debug!("position jitter below motion epsilon; no downstream trigger");
        }
        moved
    }

    /// Transition to an error state for a watch failure. Does not run the
    /// fallback; see [`Self::handle_watch_error`].
    pub fn on_watch_error(&mut self, kind: PositionErrorKind) {
        warn!(reason = kind.reason(), "position watch failed");
        self.state.status = LocationStatus::Error(kind.reason().to_string());
        self.state.coords = None;
        self.last_live_fix = None;
        debug_assert!(self.invariant_ok());
    }

    /// Watch failure path: record the error reason, then force the IP
    /// fallback. Returns whether fallback coordinates were obtained.
    pub async fn handle_watch_error(&mut self, kind: PositionErrorKind) -> bool {
        self.on_watch_error(kind);
        self.run_ip_fallback(true).await
    }

    /// Run the IP-fallback path. Single-flight unless `forced`.
    ///
    /// Returns `true` when coordinates were obtained.
    pub async fn run_ip_fallback(&mut self, forced: bool) -> bool {
        if self.fallback_started && !forced {
            debug!("ip fallback already ran for this episode; skipping");
            return false;
        }
        self.fallback_started = true;

        match self.ip_client.locate().await {
            Ok(loc) if loc.is_ok() => {
                if let Some(coords) = loc.coordinates() {
                    let label = loc.composed_label();
                    debug!(%label, "approximate location resolved via IP");
                    self.state = LocationState {
                        status: LocationStatus::ApproximateViaNetwork,
                        coords: Some(coords),
                        label,
                    };
                    debug_assert!(self.invariant_ok());
                    return true;
                }
                self.fallback_failed();
            }
            Ok(_) => self.fallback_failed(),
            Err(e) => {
                warn!(error = %e, "ip geolocation request failed");
                self.fallback_failed();
            }
        }
        false
    }

    fn fallback_failed(&mut self) {
        // Reset the latch so a later retry (forced or not) can run again
        self.fallback_started = false;
        self.state.status = LocationStatus::Error(ENTER_CITY_PROMPT.to_string());
        self.state.coords = None;
        debug_assert!(self.invariant_ok());
    }

    /// A manual-city reading succeeded: pin the location to that city.
    /// Station coordinates take over when parseable; otherwise whatever
    /// coordinates were previously known remain.
    pub fn apply_city_reading(&mut self, label: &str, station_coords: Option<Coordinates>) {
        self.state = LocationState {
            status: LocationStatus::CityLookup,
            coords: station_coords.or(self.state.coords),
            label: label.to_string(),
        };
        debug_assert!(self.invariant_ok());
    }

    /// Update the display label (from the reverse-geocode cache) without
    /// touching the status.
    pub fn set_label(&mut self, label: String) {
        self.state.label = label;
    }

    /// Structural invariant: coords absent in Idle/Error, present once
    /// resolution has succeeded via watch or network.
    fn invariant_ok(&self) -> bool {
        match self.state.status {
            LocationStatus::Idle | LocationStatus::Error(_) => self.state.coords.is_none(),
            LocationStatus::Live | LocationStatus::ApproximateViaNetwork => {
                self.state.coords.is_some()
            }
            LocationStatus::Locating | LocationStatus::CityLookup => true,
        }
    }
}
