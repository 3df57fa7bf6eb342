//! Reference-city ranking.
//!
//! Fetches the current index for a fixed list of reference cities
//! concurrently and ranks them cleanest first. A city whose fetch fails or
//! yields no usable value is dropped from the ranking rather than failing
//! the whole view.

use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::model::RankingEntry;
use crate::providers::aqi::derive_index;
use crate::providers::AqiClient;

/// Ranked snapshot, cleanest city first.
#[derive(Debug, Clone, Serialize)]
pub struct RankingSnapshot {
    pub cities: Vec<RankingEntry>,
    pub cleanest: Option<RankingEntry>,
    pub most_polluted: Option<RankingEntry>,
}

#[derive(Clone)]
pub struct CityRankingAggregator {
    aqi: AqiClient,
    cities: Vec<String>,
}

impl CityRankingAggregator {
    pub fn new(aqi: AqiClient, cities: Vec<String>) -> Self {
        Self { aqi, cities }
    }

    /// Fetch every reference city concurrently and rank the usable results
    /// by ascending index.
    pub async fn refresh(&self) -> RankingSnapshot {
        let mut set = JoinSet::new();
        for city in &self.cities {
            let aqi = self.aqi.clone();
            let city = city.clone();
            set.spawn(async move {
                let entry = fetch_city_entry(&aqi, &city).await;
                (city, entry)
            });
        }

        let mut entries = Vec::with_capacity(self.cities.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((city, Some(entry))) => {
                    debug!(%city, value = ?entry.value, "ranking entry resolved");
                    entries.push(entry);
                }
                Ok((city, None)) => {
                    warn!(%city, "ranking entry unavailable; dropping");
                }
                Err(e) => warn!(error = %e, "ranking task failed"),
            }
        }

        entries.sort_by_key(|e| e.value);
        let cleanest = entries.first().cloned();
        let most_polluted = entries.last().cloned();
        RankingSnapshot {
            cities: entries,
            cleanest,
            most_polluted,
        }
    }
}

async fn fetch_city_entry(aqi: &AqiClient, city: &str) -> Option<RankingEntry> {
    let response = match aqi.fetch_city(city).await {
        Ok(r) => r,
        Err(e) => {
            warn!(%city, error = %e, "ranking fetch failed");
            return None;
        }
    };
    if !response.is_ok() {
        return None;
    }
    let payload = response.payload()?;
    let value = derive_index(&payload)?;
    let label = payload
        .city
        .as_ref()
        .and_then(|c| c.name.clone())
        .unwrap_or_else(|| city.to_string());
    Some(RankingEntry {
        city: city.to_string(),
        label,
        value: Some(value),
    })
}
