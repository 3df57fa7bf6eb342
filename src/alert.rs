//! Threshold alerts with cooldown/signature deduplication.
//!
//! A reading at or above the configured threshold is *eligible*; whether it
//! is *delivered* depends on the dedup rule. Each delivery records a
//! signature: the place label plus the value coarsened to a bucket. Within
//! the cooldown window a reading with the same signature is suppressed as
//! noise; a different signature (new place, or a value that jumped buckets)
//! always delivers. Only a confirmed delivery mutates the cooldown state and
//! the bounded alert log.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::model::{AlertRecord, Reading};
use crate::notify::Notifier;

/// Evaluates readings against a threshold and delivers deduplicated
/// notifications.
pub struct AlertManager {
    notifier: Box<dyn Notifier>,
    bucket_width: i64,
    cooldown_secs: i64,
    log_retention: usize,
    last_fired_at: Option<DateTime<Utc>>,
    last_signature: Option<String>,
    log: Vec<AlertRecord>,
}

impl AlertManager {
    pub fn new(
        notifier: Box<dyn Notifier>,
        bucket_width: i64,
        cooldown_secs: i64,
        log_retention: usize,
    ) -> Self {
        Self {
            notifier,
            bucket_width: bucket_width.max(1),
            cooldown_secs,
            log_retention,
            last_fired_at: None,
            last_signature: None,
            log: Vec::new(),
        }
    }

    /// Evaluate one reading. Returns whether a notification was actually
    /// delivered.
    pub fn evaluate(&mut self, reading: &Reading, threshold: i64, now: DateTime<Utc>) -> bool {
        if reading.value < threshold {
            return false;
        }

        let signature = format!("{}|{}", reading.label, reading.value / self.bucket_width);

        if let (Some(fired_at), Some(last_sig)) = (self.last_fired_at, &self.last_signature) {
            let elapsed = now.signed_duration_since(fired_at).num_seconds();
            if elapsed < self.cooldown_secs && *last_sig == signature {
                debug!(%signature, elapsed, "alert suppressed within cooldown");
                return false;
            }
        }

        let title = format!("Air quality alert: {}", reading.tier.label());
        let body = format!(
            "{} is at {} in {}. {}",
            reading.tier.label(),
            reading.value,
            reading.label,
            reading.tier.advisory()
        );

        if let Err(e) = self.notifier.notify(&title, &body) {
            // Not delivered: no cooldown update, no log entry
            warn!(error = %e, "alert not delivered");
            return false;
        }

        info!(
            value = reading.value,
            label = %reading.label,
            threshold,
            "alert delivered"
        );

        self.last_fired_at = Some(now);
        self.last_signature = Some(signature);
        self.log.insert(
            0,
            AlertRecord {
                label: reading.label.clone(),
                value: reading.value,
                observed_at: reading.observed_at.clone(),
                threshold,
            },
        );
        self.log.truncate(self.log_retention);

        true
    }

    /// Delivered alerts, newest first.
    pub fn records(&self) -> &[AlertRecord] {
        &self.log
    }
}
