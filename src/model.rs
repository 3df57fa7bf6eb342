//! Data models for Airwatch.
//!
//! The core types here are deliberately small: a coordinate pair with a
//! proximity predicate, the location-resolution state, an immutable reading
//! with its advisory tier, and the bounded alert/ranking records. All derived
//! advisory text is a static lookup on [`AdvisoryTier`], never computed.

use serde::{Deserialize, Serialize};

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Two fixes count as "the same place" when both axis deltas are below
    /// `epsilon_deg`. Used for motion suppression and geocode-cache reuse,
    /// with a different epsilon for each.
    pub fn is_near(&self, other: &Coordinates, epsilon_deg: f64) -> bool {
        (self.lat - other.lat).abs() < epsilon_deg && (self.lng - other.lng).abs() < epsilon_deg
    }

    /// Fallback display label when no geocoded name is available.
    pub fn display_label(&self) -> String {
        format!("{:.4}, {:.4}", self.lat, self.lng)
    }
}

/// Where the current best-known location came from, or why there is none.
///
/// Exactly one status holds at a time; it is mutated only by the
/// location resolver.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "detail")]
pub enum LocationStatus {
    /// Nothing has happened yet.
    Idle,
    /// A position watch is open and we are waiting for the first fix.
    Locating,
    /// Following live position fixes.
    Live,
    /// Coordinates derived from IP geolocation.
    ApproximateViaNetwork,
    /// Location pinned by a manually entered city whose reading succeeded.
    CityLookup,
    /// Location resolution failed; the detail is a human-readable reason.
    Error(String),
}

/// The resolver's current best-known location.
///
/// `coords` is absent in `Idle` and `Error` (and transiently in `Locating`
/// before the first fix); it is always present in `Live`,
/// `ApproximateViaNetwork` and `CityLookup`.
#[derive(Debug, Clone, Serialize)]
pub struct LocationState {
    pub status: LocationStatus,
    pub coords: Option<Coordinates>,
    pub label: String,
}

impl LocationState {
    pub fn idle() -> Self {
        Self {
            status: LocationStatus::Idle,
            coords: None,
            label: String::new(),
        }
    }
}

/// Health-advisory tier for an air-quality index value.
///
/// Bounds are inclusive on the upper end: 50 is still `Good`, 150 is still
/// `SensitiveCaution`, and so on. Everything above 300 is `Hazardous`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryTier {
    Good,
    Moderate,
    SensitiveCaution,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AdvisoryTier {
    /// Map an index value onto its advisory tier.
    pub fn from_value(value: i64) -> Self {
        match value {
            v if v <= 50 => AdvisoryTier::Good,
            v if v <= 100 => AdvisoryTier::Moderate,
            v if v <= 150 => AdvisoryTier::SensitiveCaution,
            v if v <= 200 => AdvisoryTier::Unhealthy,
            v if v <= 300 => AdvisoryTier::VeryUnhealthy,
            _ => AdvisoryTier::Hazardous,
        }
    }

    /// Short display label.
    pub fn label(&self) -> &'static str {
        match self {
            AdvisoryTier::Good => "Good",
            AdvisoryTier::Moderate => "Moderate",
            AdvisoryTier::SensitiveCaution => "Unhealthy for Sensitive Groups",
            AdvisoryTier::Unhealthy => "Unhealthy",
            AdvisoryTier::VeryUnhealthy => "Very Unhealthy",
            AdvisoryTier::Hazardous => "Hazardous",
        }
    }

    /// One-sentence health advisory for this tier.
    pub fn advisory(&self) -> &'static str {
        match self {
            AdvisoryTier::Good => {
                "Air quality is satisfactory; enjoy your usual outdoor activities."
            }
            AdvisoryTier::Moderate => {
                "Air quality is acceptable; unusually sensitive people should consider limiting prolonged outdoor exertion."
            }
            AdvisoryTier::SensitiveCaution => {
                "Members of sensitive groups may experience health effects; limit prolonged outdoor exertion."
            }
            AdvisoryTier::Unhealthy => {
                "Everyone may begin to experience health effects; reduce outdoor activities."
            }
            AdvisoryTier::VeryUnhealthy => {
                "Health alert: everyone may experience more serious health effects; avoid outdoor activities."
            }
            AdvisoryTier::Hazardous => {
                "Health warning of emergency conditions: everyone should stay indoors."
            }
        }
    }

    /// One-sentence prevention guidance for this tier.
    pub fn prevention(&self) -> &'static str {
        match self {
            AdvisoryTier::Good => "No special precautions needed.",
            AdvisoryTier::Moderate => {
                "Keep windows open for ventilation; sensitive people should watch for symptoms."
            }
            AdvisoryTier::SensitiveCaution => {
                "Sensitive groups should wear a mask outdoors and keep rescue medication at hand."
            }
            AdvisoryTier::Unhealthy => {
                "Wear a mask outdoors, close windows, and run an air purifier if available."
            }
            AdvisoryTier::VeryUnhealthy => {
                "Stay indoors with windows closed; use an air purifier and avoid physical exertion."
            }
            AdvisoryTier::Hazardous => {
                "Remain indoors, seal windows, run air purifiers, and seek medical help if symptoms develop."
            }
        }
    }

    /// Display color for this tier.
    pub fn color(&self) -> &'static str {
        match self {
            AdvisoryTier::Good => "#009966",
            AdvisoryTier::Moderate => "#ffde33",
            AdvisoryTier::SensitiveCaution => "#ff9933",
            AdvisoryTier::Unhealthy => "#cc0033",
            AdvisoryTier::VeryUnhealthy => "#660099",
            AdvisoryTier::Hazardous => "#7e0023",
        }
    }
}

/// A single successful air-quality reading. Immutable once created.
#[derive(Debug, Clone, Serialize)]
pub struct Reading {
    /// Derived air-quality index.
    pub value: i64,
    /// Observation time as reported by the provider, or the fetch time when
    /// the provider carried none.
    pub observed_at: String,
    /// Display label for the place the reading describes.
    pub label: String,
    /// Advisory tier derived from `value`.
    pub tier: AdvisoryTier,
    /// Dominant pollutant as reported by the provider, when present.
    pub dominant_pollutant: Option<String>,
}

/// Reading as served to the dashboard, with the static tier lookups expanded.
#[derive(Debug, Clone, Serialize)]
pub struct ReadingResponse {
    pub value: i64,
    pub observed_at: String,
    pub label: String,
    pub tier: AdvisoryTier,
    pub tier_label: &'static str,
    pub advisory: &'static str,
    pub prevention: &'static str,
    pub color: &'static str,
    pub dominant_pollutant: Option<String>,
}

impl From<&Reading> for ReadingResponse {
    fn from(r: &Reading) -> Self {
        Self {
            value: r.value,
            observed_at: r.observed_at.clone(),
            label: r.label.clone(),
            tier: r.tier,
            tier_label: r.tier.label(),
            advisory: r.tier.advisory(),
            prevention: r.tier.prevention(),
            color: r.tier.color(),
            dominant_pollutant: r.dominant_pollutant.clone(),
        }
    }
}

/// Record of an alert that was actually delivered, never one that was merely
/// eligible.
#[derive(Debug, Clone, Serialize)]
pub struct AlertRecord {
    pub label: String,
    pub value: i64,
    pub observed_at: String,
    /// The threshold that was in force when this alert fired.
    pub threshold: i64,
}

/// One city's entry in a ranking snapshot. `value` is absent when that city's
/// fetch failed.
#[derive(Debug, Clone, Serialize)]
pub struct RankingEntry {
    pub city: String,
    pub label: String,
    pub value: Option<i64>,
}

/// Permission state of the notification channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPermission {
    Default,
    Granted,
    Denied,
    Unsupported,
}
