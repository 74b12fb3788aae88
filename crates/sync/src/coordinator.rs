// crates/sync/src/coordinator.rs
//! Expansion-scoped refresh coordination.
//!
//! Refreshes are always scoped to the currently expanded topics; collapsed
//! topics are never polled. Rapid triggers (several expansions in quick
//! succession, focus churn) coalesce through a debounce window into one
//! pass per affected topic. A coarse timer pass runs independently of the
//! debounce as the backstop against missed notifications.
//!
//! Notification-sourced refreshes target the affected presentation only
//! and bypass both the debounce and the staleness window, so they always
//! produce a network fetch.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use podium_client::ClientError;
use podium_types::{PresentationId, TopicId};

use crate::backend::CoachBackend;
use crate::cache::ResultCache;
use crate::config::SyncConfig;
use crate::events::SyncEvent;
use crate::scheduler::Scheduler;
use crate::tracker::StatusTracker;

/// What asked for a refresh pass. Notification-sourced refreshes do not
/// appear here; they go through [`RefreshCoordinator::analysis_completed`]
/// because they target one presentation, not a topic set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    /// Initial mount of the topic view.
    Mount,
    /// The coarse periodic backstop.
    Timer,
    /// Window regained focus.
    Focus,
}

#[derive(Default)]
struct PendingPass {
    topics: HashSet<TopicId>,
    bypass_staleness: bool,
    flush_scheduled: bool,
}

pub struct RefreshCoordinator {
    backend: Arc<dyn CoachBackend>,
    cache: Arc<ResultCache>,
    tracker: Arc<StatusTracker>,
    scheduler: Scheduler,
    events: broadcast::Sender<SyncEvent>,
    expanded: RwLock<HashSet<TopicId>>,
    pending: Mutex<PendingPass>,
    /// Set once the first pass after construction has been requested. The
    /// very first load always fetches, whatever timestamps persisted state
    /// left behind.
    first_load_done: AtomicBool,
    stale_window: Duration,
    debounce_window: Duration,
}

impl RefreshCoordinator {
    pub fn new(
        backend: Arc<dyn CoachBackend>,
        cache: Arc<ResultCache>,
        tracker: Arc<StatusTracker>,
        scheduler: Scheduler,
        events: broadcast::Sender<SyncEvent>,
        config: &SyncConfig,
    ) -> Self {
        Self {
            backend,
            cache,
            tracker,
            scheduler,
            events,
            expanded: RwLock::new(HashSet::new()),
            pending: Mutex::new(PendingPass::default()),
            first_load_done: AtomicBool::new(false),
            stale_window: config.stale_window,
            debounce_window: config.debounce_window,
        }
    }

    /// Mark a topic expanded and request its presentations.
    pub fn expand(self: &Arc<Self>, topic: TopicId) {
        match self.expanded.write() {
            Ok(mut set) => {
                set.insert(topic);
            }
            Err(e) => {
                error!("expanded set lock poisoned: {e}");
                return;
            }
        }
        let bypass = !self.first_load_done.swap(true, Ordering::SeqCst);
        self.request_pass(vec![topic], bypass);
    }

    /// Mark a topic collapsed. Collapsed topics drop out of every pending
    /// and future pass.
    pub fn collapse(&self, topic: TopicId) {
        if let Ok(mut set) = self.expanded.write() {
            set.remove(&topic);
        }
    }

    pub fn expanded_topics(&self) -> Vec<TopicId> {
        match self.expanded.read() {
            Ok(set) => set.iter().copied().collect(),
            Err(e) => {
                error!("expanded set lock poisoned: {e}");
                Vec::new()
            }
        }
    }

    /// Request a refresh pass over all expanded topics.
    pub fn trigger(self: &Arc<Self>, trigger: RefreshTrigger) {
        let topics = self.expanded_topics();
        match trigger {
            RefreshTrigger::Mount => {
                let bypass = !self.first_load_done.swap(true, Ordering::SeqCst);
                self.request_pass(topics, bypass);
            }
            RefreshTrigger::Focus => {
                self.request_pass(topics, false);
            }
            RefreshTrigger::Timer => {
                // The backstop runs immediately; it is already coarse and
                // must not queue behind the debounce.
                let coordinator = Arc::clone(self);
                self.scheduler.spawn(async move {
                    coordinator.run_pass(topics, false).await;
                });
            }
        }
    }

    /// Targeted refresh for one presentation, straight from the
    /// notification watcher. Bypasses the debounce and the staleness
    /// window: the cached state is dropped before the tracker re-fetches.
    pub fn analysis_completed(&self, presentation: PresentationId) {
        debug!(presentation_id = presentation, "analysis-complete notification; forcing refresh");
        self.cache.invalidate_presentation(presentation);
        self.tracker.ensure_tracking(presentation);
    }

    /// Queue topics into the coalescing pass and schedule a flush if none
    /// is pending.
    fn request_pass(self: &Arc<Self>, topics: Vec<TopicId>, bypass_staleness: bool) {
        let mut pending = match self.pending.lock() {
            Ok(guard) => guard,
            Err(e) => {
                error!("pending pass lock poisoned: {e}");
                return;
            }
        };
        pending.topics.extend(topics);
        pending.bypass_staleness |= bypass_staleness;
        if pending.flush_scheduled {
            return;
        }
        pending.flush_scheduled = true;

        let coordinator = Arc::clone(self);
        self.scheduler.spawn_after(self.debounce_window, async move {
            coordinator.flush().await;
        });
    }

    async fn flush(&self) {
        let (topics, bypass) = {
            let mut pending = match self.pending.lock() {
                Ok(guard) => guard,
                Err(e) => {
                    error!("pending pass lock poisoned during flush: {e}");
                    return;
                }
            };
            pending.flush_scheduled = false;
            (
                std::mem::take(&mut pending.topics).into_iter().collect::<Vec<_>>(),
                std::mem::replace(&mut pending.bypass_staleness, false),
            )
        };
        self.run_pass(topics, bypass).await;
    }

    async fn run_pass(&self, topics: Vec<TopicId>, bypass_staleness: bool) {
        for topic in topics {
            if !self.is_expanded(topic) {
                continue;
            }
            if !bypass_staleness && !self.cache.is_list_stale(topic, self.stale_window) {
                debug!(topic_id = topic, "presentation list fresh; skipping fetch");
                continue;
            }
            self.refresh_topic(topic).await;
        }
    }

    fn is_expanded(&self, topic: TopicId) -> bool {
        match self.expanded.read() {
            Ok(set) => set.contains(&topic),
            Err(e) => {
                error!("expanded set lock poisoned: {e}");
                false
            }
        }
    }

    async fn refresh_topic(&self, topic: TopicId) {
        match self.backend.presentations(topic).await {
            Ok(list) => {
                self.cache.put_presentations(topic, list.clone());
                let _ = self.events.send(SyncEvent::TopicRefreshed {
                    topic_id: topic,
                    presentation_count: list.len(),
                });
                for presentation in list {
                    self.tracker.ensure_tracking(presentation.id);
                }
            }
            Err(ClientError::Unauthorized) => {
                // The transport already ran the refresh protocol; a
                // terminal 401 here is the session layer's problem.
                debug!(topic_id = topic, "presentation list fetch unauthorized");
            }
            Err(e) => {
                warn!(topic_id = topic, error = %e, "presentation list fetch failed");
            }
        }
    }
}
