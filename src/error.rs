//! Error types for reading acquisition.
//!
//! Every failure in the fetch pipeline is one of three distinct conditions so
//! that callers (and the API layer) can tell "you gave me nothing to look up"
//! apart from "the provider rejected us" apart from "the provider answered
//! but carried no usable value".

use thiserror::Error;

/// Failures of a single reading-acquisition cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Neither a place name nor coordinates were available. Rejected before
    /// any network call is made.
    #[error("no place or coordinates available; enter a city to check air quality")]
    MissingTarget,

    /// The provider answered with a non-ok status, or the request itself
    /// failed in transit.
    #[error("place not found or provider error: {0}")]
    Provider(String),

    /// The provider answered ok but no air-quality index could be derived
    /// from the payload.
    #[error("air-quality data is unavailable for this location right now")]
    NoData,
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        FetchError::Provider(e.to_string())
    }
}

/// Failure of the best-effort notification channel.
///
/// Treated everywhere as "not delivered": no alert state is mutated and no
/// record is logged when this is returned.
#[derive(Debug, Error)]
#[error("notification channel unavailable: {0}")]
pub struct NotifyError(pub String);
