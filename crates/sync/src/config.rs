// crates/sync/src/config.rs
//! Engine timing configuration.

use std::time::Duration;

/// Timing knobs for the sync engine. The defaults are the product's
/// shipping values; tests shrink them per instance.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Delay between successive status checks of a still-running job.
    pub status_poll_interval: Duration,
    /// Notification feed poll period.
    pub notification_poll_interval: Duration,
    /// Maximum age of a cached presentation list before a re-fetch.
    pub stale_window: Duration,
    /// Window that coalesces rapid refresh triggers into one pass.
    pub debounce_window: Duration,
    /// Coarse periodic re-check of expanded topics, the backstop against
    /// missed notifications.
    pub backstop_interval: Duration,
    /// Page size for notification feed fetches.
    pub notification_page_size: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            status_poll_interval: Duration::from_secs(10),
            notification_poll_interval: Duration::from_secs(10),
            stale_window: Duration::from_secs(30),
            debounce_window: Duration::from_secs(1),
            backstop_interval: Duration::from_secs(120),
            notification_page_size: 20,
        }
    }
}
