// crates/sync/src/engine.rs
//! The owning engine object.
//!
//! [`SyncEngine`] wires the tracker, cache, watcher, and coordinator to one
//! scheduler and one event channel, with an explicit `start()`/`stop()`
//! lifecycle. All state lives in the instance — two engines (tests, two
//! tabs) never interfere.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{info, warn};

use podium_client::SessionSignal;
use podium_types::{PresentationId, TopicId};

use crate::backend::CoachBackend;
use crate::cache::ResultCache;
use crate::config::SyncConfig;
use crate::coordinator::{RefreshCoordinator, RefreshTrigger};
use crate::events::SyncEvent;
use crate::notifications::NotificationWatcher;
use crate::scheduler::Scheduler;
use crate::tracker::StatusTracker;

pub struct SyncEngine {
    config: SyncConfig,
    scheduler: Scheduler,
    cache: Arc<ResultCache>,
    tracker: Arc<StatusTracker>,
    coordinator: Arc<RefreshCoordinator>,
    watcher: Arc<NotificationWatcher>,
    events: broadcast::Sender<SyncEvent>,
    started: AtomicBool,
}

impl SyncEngine {
    pub fn new(backend: Arc<dyn CoachBackend>, config: SyncConfig) -> Self {
        let scheduler = Scheduler::new();
        let events = broadcast::channel(256).0;
        let cache = Arc::new(ResultCache::new());
        let tracker = Arc::new(StatusTracker::new(
            Arc::clone(&backend),
            Arc::clone(&cache),
            scheduler.clone(),
            events.clone(),
            config.status_poll_interval,
        ));
        let coordinator = Arc::new(RefreshCoordinator::new(
            Arc::clone(&backend),
            Arc::clone(&cache),
            Arc::clone(&tracker),
            scheduler.clone(),
            events.clone(),
            &config,
        ));
        let watcher = Arc::new(NotificationWatcher::new(
            backend,
            Arc::clone(&coordinator),
            events.clone(),
            config.notification_page_size,
        ));
        Self {
            config,
            scheduler,
            cache,
            tracker,
            coordinator,
            watcher,
            events,
            started: AtomicBool::new(false),
        }
    }

    /// Start the background loops: notification watcher and the coarse
    /// backstop pass. Idempotent; the first call also runs the mount pass.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("sync engine starting");

        self.watcher.spawn(&self.scheduler, self.config.notification_poll_interval);

        let coordinator = Arc::clone(&self.coordinator);
        let period = self.config.backstop_interval;
        self.scheduler.spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The mount pass covers now; the backstop starts one period out.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                coordinator.trigger(RefreshTrigger::Timer);
            }
        });

        self.coordinator.trigger(RefreshTrigger::Mount);
    }

    /// Tear down the engine: watcher, backstop, every pending re-poll and
    /// debounce flush. Terminal for this instance — construct a new engine
    /// to start over.
    pub fn stop(&self) {
        info!("sync engine stopping");
        self.scheduler.shutdown();
    }

    /// Tie the engine's lifetime to the session: on expiry, surface the
    /// event, drop the cache, and stop all polling.
    pub fn watch_session(&self, mut signals: broadcast::Receiver<SessionSignal>) {
        let scheduler = self.scheduler.clone();
        let cache = Arc::clone(&self.cache);
        let events = self.events.clone();
        self.scheduler.spawn(async move {
            loop {
                match signals.recv().await {
                    Ok(SessionSignal::Expired) => {
                        warn!("session expired; tearing down sync engine");
                        let _ = events.send(SyncEvent::SessionExpired);
                        cache.clear();
                        scheduler.shutdown();
                        break;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "session signal stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// The cache UI layers read from.
    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn tracker(&self) -> &Arc<StatusTracker> {
        &self.tracker
    }

    pub fn is_stopped(&self) -> bool {
        self.scheduler.is_shut_down()
    }

    // ── UI-facing triggers ──────────────────────────────────────────────

    pub fn expand_topic(&self, topic: TopicId) {
        self.coordinator.expand(topic);
    }

    pub fn collapse_topic(&self, topic: TopicId) {
        self.coordinator.collapse(topic);
    }

    pub fn on_focus(&self) {
        self.coordinator.trigger(RefreshTrigger::Focus);
    }

    /// Manual retry of a failed analysis.
    pub fn retry_analysis(&self, presentation: PresentationId) {
        self.tracker.retry(presentation);
    }
}
