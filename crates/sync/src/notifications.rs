// crates/sync/src/notifications.rs
//! Notification feed watcher.
//!
//! Polls the feed on a fixed interval while the engine runs. A genuinely
//! new item is detected by identity: the newest id changed since the last
//! poll. The very first successful fetch surfaces at most the single
//! oldest unread item, so a page load never floods the user with toasts
//! for the whole backlog.
//!
//! Analysis-complete events become targeted cache invalidations through
//! the coordinator; every other kind is surfaced to the UI untouched.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use podium_client::ClientError;
use podium_types::{Notification, NotificationId, NotificationKind};

use crate::backend::CoachBackend;
use crate::coordinator::RefreshCoordinator;
use crate::events::SyncEvent;
use crate::scheduler::Scheduler;

pub struct NotificationWatcher {
    backend: Arc<dyn CoachBackend>,
    coordinator: Arc<RefreshCoordinator>,
    events: broadcast::Sender<SyncEvent>,
    last_seen: Mutex<Option<NotificationId>>,
    page_size: u32,
}

impl NotificationWatcher {
    pub fn new(
        backend: Arc<dyn CoachBackend>,
        coordinator: Arc<RefreshCoordinator>,
        events: broadcast::Sender<SyncEvent>,
        page_size: u32,
    ) -> Self {
        Self {
            backend,
            coordinator,
            events,
            last_seen: Mutex::new(None),
            page_size,
        }
    }

    /// Start the poll loop. The first poll fires immediately; the loop
    /// ends when the scheduler shuts down.
    pub fn spawn(self: &Arc<Self>, scheduler: &Scheduler, interval: Duration) {
        let watcher = Arc::clone(self);
        scheduler.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                watcher.poll_once().await;
            }
        });
    }

    /// One poll of the feed. This loop runs opportunistically: an
    /// unauthorized answer is suppressed, it neither forces logout nor
    /// surfaces an error.
    pub async fn poll_once(&self) {
        match self.backend.notifications(0, self.page_size).await {
            Ok(feed) => self.process_feed(feed),
            Err(ClientError::Unauthorized) => {
                debug!("notification poll unauthorized; suppressed");
            }
            Err(e) => {
                warn!(error = %e, "notification poll failed");
            }
        }
    }

    /// Newest id observed so far.
    pub fn last_seen(&self) -> Option<NotificationId> {
        match self.last_seen.lock() {
            Ok(guard) => *guard,
            Err(e) => {
                error!("last-seen lock poisoned: {e}");
                None
            }
        }
    }

    fn process_feed(&self, feed: Vec<Notification>) {
        let mut last_seen = match self.last_seen.lock() {
            Ok(guard) => guard,
            Err(e) => {
                error!("last-seen lock poisoned: {e}");
                return;
            }
        };
        // An empty page carries no identity to advance to.
        let Some(newest) = feed.first() else { return };

        match *last_seen {
            None => {
                // First successful fetch: one toast at most, for the
                // oldest unread item, never the whole backlog.
                if let Some(oldest_unread) = feed.iter().rev().find(|n| !n.is_read) {
                    self.surface(oldest_unread);
                }
            }
            Some(previous) if newest.id != previous => {
                if !newest.is_read {
                    self.surface(newest);
                }
            }
            _ => {}
        }
        // Last-seen advances whatever the read state was.
        *last_seen = Some(newest.id);
    }

    fn surface(&self, notification: &Notification) {
        debug!(
            notification_id = notification.id,
            kind = ?notification.kind,
            "surfacing notification"
        );
        if notification.kind == NotificationKind::AnalysisComplete {
            if let Some(presentation) = notification.related_id {
                self.coordinator.analysis_completed(presentation);
            }
        }
        let _ = self.events.send(SyncEvent::NotificationSurfaced {
            notification: notification.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use podium_types::{
        AnalysisResult, AnalysisStatus, Presentation, PresentationId, TopicId,
    };

    use crate::cache::ResultCache;
    use crate::config::SyncConfig;
    use crate::tracker::StatusTracker;

    /// Backend fake: a settable feed, plus counters for the status calls
    /// the coordinator's targeted refresh produces.
    struct FeedBackend {
        feed: Mutex<Vec<Notification>>,
        unauthorized: AtomicBool,
        status_calls: AtomicUsize,
    }

    impl FeedBackend {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                feed: Mutex::new(Vec::new()),
                unauthorized: AtomicBool::new(false),
                status_calls: AtomicUsize::new(0),
            })
        }

        fn set_feed(&self, feed: Vec<Notification>) {
            *self.feed.lock().unwrap() = feed;
        }
    }

    #[async_trait]
    impl CoachBackend for FeedBackend {
        async fn analysis_status(
            &self,
            _id: PresentationId,
        ) -> Result<AnalysisStatus, ClientError> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            Ok(AnalysisStatus::completed())
        }

        async fn analysis_result(
            &self,
            _id: PresentationId,
        ) -> Result<Option<AnalysisResult>, ClientError> {
            Ok(None)
        }

        async fn has_results(&self, _id: PresentationId) -> Result<bool, ClientError> {
            Ok(false)
        }

        async fn presentations(&self, _topic: TopicId) -> Result<Vec<Presentation>, ClientError> {
            Ok(Vec::new())
        }

        async fn notifications(
            &self,
            _page: u32,
            _size: u32,
        ) -> Result<Vec<Notification>, ClientError> {
            if self.unauthorized.load(Ordering::SeqCst) {
                return Err(ClientError::Unauthorized);
            }
            Ok(self.feed.lock().unwrap().clone())
        }
    }

    fn notification(id: NotificationId, kind: NotificationKind, is_read: bool) -> Notification {
        Notification {
            id,
            kind,
            related_id: Some(100 + id),
            is_read,
            created_at: chrono::Utc::now(),
        }
    }

    fn watcher_with(
        backend: Arc<FeedBackend>,
    ) -> (Arc<NotificationWatcher>, broadcast::Receiver<SyncEvent>) {
        let config = SyncConfig::default();
        let scheduler = Scheduler::new();
        let cache = Arc::new(ResultCache::new());
        let events = broadcast::channel(64).0;
        let tracker = Arc::new(StatusTracker::new(
            Arc::clone(&backend) as Arc<dyn CoachBackend>,
            Arc::clone(&cache),
            scheduler.clone(),
            events.clone(),
            config.status_poll_interval,
        ));
        let coordinator = Arc::new(RefreshCoordinator::new(
            Arc::clone(&backend) as Arc<dyn CoachBackend>,
            cache,
            tracker,
            scheduler,
            events.clone(),
            &config,
        ));
        let rx = events.subscribe();
        let watcher = Arc::new(NotificationWatcher::new(backend, coordinator, events, 20));
        (watcher, rx)
    }

    fn surfaced_ids(rx: &mut broadcast::Receiver<SyncEvent>) -> Vec<NotificationId> {
        let mut ids = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let SyncEvent::NotificationSurfaced { notification } = event {
                ids.push(notification.id);
            }
        }
        ids
    }

    #[tokio::test]
    async fn first_fetch_surfaces_only_the_oldest_unread() {
        let backend = FeedBackend::new();
        backend.set_feed(vec![
            notification(9, NotificationKind::Comment, false),
            notification(8, NotificationKind::Comment, false),
            notification(7, NotificationKind::Comment, false),
        ]);

        let (watcher, mut rx) = watcher_with(backend);
        watcher.poll_once().await;

        assert_eq!(surfaced_ids(&mut rx), vec![7]);
        assert_eq!(watcher.last_seen(), Some(9));
    }

    #[tokio::test]
    async fn first_fetch_with_all_read_surfaces_nothing() {
        let backend = FeedBackend::new();
        backend.set_feed(vec![
            notification(5, NotificationKind::Comment, true),
            notification(4, NotificationKind::Comment, true),
        ]);

        let (watcher, mut rx) = watcher_with(backend);
        watcher.poll_once().await;

        assert!(surfaced_ids(&mut rx).is_empty());
        assert_eq!(watcher.last_seen(), Some(5));
    }

    #[tokio::test]
    async fn new_unread_item_is_surfaced_once() {
        let backend = FeedBackend::new();
        backend.set_feed(vec![notification(9, NotificationKind::Comment, true)]);

        let (watcher, mut rx) = watcher_with(Arc::clone(&backend));
        watcher.poll_once().await;
        assert!(surfaced_ids(&mut rx).is_empty());

        backend.set_feed(vec![
            notification(10, NotificationKind::Comment, false),
            notification(9, NotificationKind::Comment, true),
        ]);
        watcher.poll_once().await;
        assert_eq!(surfaced_ids(&mut rx), vec![10]);
        assert_eq!(watcher.last_seen(), Some(10));

        // Unchanged feed: nothing new to surface.
        watcher.poll_once().await;
        assert!(surfaced_ids(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn new_but_read_item_advances_last_seen_silently() {
        let backend = FeedBackend::new();
        backend.set_feed(vec![notification(9, NotificationKind::Comment, true)]);

        let (watcher, mut rx) = watcher_with(Arc::clone(&backend));
        watcher.poll_once().await;

        // Read in another tab before this one polled.
        backend.set_feed(vec![notification(10, NotificationKind::Comment, true)]);
        watcher.poll_once().await;

        assert!(surfaced_ids(&mut rx).is_empty());
        assert_eq!(watcher.last_seen(), Some(10));
    }

    #[tokio::test]
    async fn empty_feed_keeps_state() {
        let backend = FeedBackend::new();
        let (watcher, mut rx) = watcher_with(backend);

        watcher.poll_once().await;
        assert!(surfaced_ids(&mut rx).is_empty());
        assert_eq!(watcher.last_seen(), None);
    }

    #[tokio::test]
    async fn analysis_complete_triggers_a_targeted_fetch() {
        let backend = FeedBackend::new();
        backend.set_feed(vec![notification(3, NotificationKind::AnalysisComplete, false)]);

        let (watcher, mut rx) = watcher_with(Arc::clone(&backend));
        watcher.poll_once().await;
        // Let the tracker's spawned poll run.
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        assert_eq!(surfaced_ids(&mut rx), vec![3]);
        assert!(backend.status_calls.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn other_kinds_do_not_touch_the_cache_path() {
        let backend = FeedBackend::new();
        backend.set_feed(vec![notification(3, NotificationKind::TeamInvite, false)]);

        let (watcher, mut rx) = watcher_with(Arc::clone(&backend));
        watcher.poll_once().await;
        tokio::task::yield_now().await;

        assert_eq!(surfaced_ids(&mut rx), vec![3]);
        assert_eq!(backend.status_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unauthorized_polls_are_suppressed() {
        let backend = FeedBackend::new();
        backend.unauthorized.store(true, Ordering::SeqCst);

        let (watcher, mut rx) = watcher_with(backend);
        watcher.poll_once().await;

        assert!(surfaced_ids(&mut rx).is_empty());
        assert_eq!(watcher.last_seen(), None);
    }
}
