// crates/sync/src/lib.rs
//! Client-side synchronization engine for the podium coaching product.
//!
//! The engine keeps a local view of topics, presentations, and analysis
//! jobs consistent with a backend that changes state out-of-band (completed
//! background jobs, other tabs, teammates). Five pieces cooperate:
//!
//! - [`StatusTracker`] polls per-presentation analysis status with a
//!   process-wide in-flight set, so no presentation ever has two
//!   concurrent status fetches.
//! - [`ResultCache`] holds last-known statuses, results, and presentation
//!   lists behind a staleness window, with forward-only status writes.
//! - [`NotificationWatcher`] polls the notification feed, detects genuinely
//!   new items by id, and turns analysis-complete events into targeted
//!   cache invalidations.
//! - [`RefreshCoordinator`] scopes refreshes to expanded topics, coalesces
//!   rapid triggers through a debounce window, and runs a coarse backstop
//!   pass against missed notifications.
//! - [`Scheduler`] gives every spawned loop and delay a cancellation root,
//!   so [`SyncEngine::stop`] deterministically ends all pending work.
//!
//! UI layers read from the cache and subscribe to [`SyncEvent`]s; they
//! never see transport errors directly.

pub mod backend;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod events;
pub mod notifications;
pub mod scheduler;
pub mod tracker;

pub use backend::CoachBackend;
pub use cache::{CacheEntry, ResultCache};
pub use config::SyncConfig;
pub use coordinator::{RefreshCoordinator, RefreshTrigger};
pub use engine::SyncEngine;
pub use events::SyncEvent;
pub use notifications::NotificationWatcher;
pub use scheduler::Scheduler;
pub use tracker::StatusTracker;
