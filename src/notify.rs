//! Notification channel abstraction.
//!
//! Delivery is best-effort and fire-and-forget: the alert manager treats any
//! channel error as "not delivered" and mutates no state. The service binary
//! ships with a channel that writes to the log; tests substitute recording or
//! failing channels.

use tracing::info;

use crate::error::NotifyError;

/// A fire-and-forget notification channel.
pub trait Notifier: Send + Sync {
    /// Display a notification. An `Err` means it was not delivered.
    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError>;
}

/// Notification channel that writes to the structured log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        info!(%title, %body, "notification");
        Ok(())
    }
}
