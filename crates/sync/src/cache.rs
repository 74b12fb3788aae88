// crates/sync/src/cache.rs
//! In-memory result cache with staleness windows.
//!
//! Process-wide, single-writer-at-a-time: every map sits behind a
//! `std::sync::RwLock` and no guard is ever held across an `.await`.
//! Timestamps use the tokio clock so staleness tests run under paused time.
//!
//! Status writes are forward-only. A terminal phase (`completed`, `error`)
//! only leaves the cache via [`ResultCache::invalidate_presentation`];
//! late stale writes (a `processing` status racing behind a finished
//! result) are rejected, never applied.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error};

use podium_types::{
    AnalysisPhase, AnalysisResult, AnalysisStatus, Presentation, PresentationId, Topic, TopicId,
};

/// A cached value plus when it was fetched.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub fetched_at: Instant,
}

impl<T> CacheEntry<T> {
    fn new(value: T) -> Self {
        Self { value, fetched_at: Instant::now() }
    }

    pub fn is_stale(&self, window: Duration) -> bool {
        self.fetched_at.elapsed() >= window
    }
}

/// Ordering of phases for the forward-only guard. Equal ranks may rewrite
/// (progress updates); lower ranks never overwrite higher ones.
fn phase_rank(phase: AnalysisPhase) -> u8 {
    match phase {
        AnalysisPhase::Unknown => 0,
        AnalysisPhase::NotStarted => 1,
        AnalysisPhase::Pending => 2,
        AnalysisPhase::Processing => 3,
        AnalysisPhase::Error => 4,
        AnalysisPhase::Completed => 5,
    }
}

/// Last-known analysis state, results, and presentation lists.
pub struct ResultCache {
    statuses: RwLock<HashMap<PresentationId, CacheEntry<AnalysisStatus>>>,
    results: RwLock<HashMap<PresentationId, CacheEntry<AnalysisResult>>>,
    lists: RwLock<HashMap<TopicId, CacheEntry<Vec<Presentation>>>>,
    topics: RwLock<HashMap<TopicId, CacheEntry<Topic>>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self {
            statuses: RwLock::new(HashMap::new()),
            results: RwLock::new(HashMap::new()),
            lists: RwLock::new(HashMap::new()),
            topics: RwLock::new(HashMap::new()),
        }
    }

    // ── Analysis status ─────────────────────────────────────────────────

    /// Last-known status. `None` means "never checked"; a stored
    /// `Unknown` means "checked, backend had nothing".
    pub fn status(&self, id: PresentationId) -> Option<AnalysisStatus> {
        match self.statuses.read() {
            Ok(map) => map.get(&id).map(|entry| entry.value),
            Err(e) => {
                error!("status map lock poisoned during read: {e}");
                None
            }
        }
    }

    /// Store a status, enforcing forward-only transitions. Returns `false`
    /// when the write was rejected as a regression.
    pub fn put_status(&self, id: PresentationId, status: AnalysisStatus) -> bool {
        let mut map = match self.statuses.write() {
            Ok(map) => map,
            Err(e) => {
                error!("status map lock poisoned during write: {e}");
                return false;
            }
        };
        if let Some(existing) = map.get(&id) {
            if phase_rank(status.phase) < phase_rank(existing.value.phase) {
                debug!(
                    presentation_id = id,
                    from = ?existing.value.phase,
                    to = ?status.phase,
                    "rejected status regression"
                );
                return false;
            }
        }
        map.insert(id, CacheEntry::new(status));
        true
    }

    // ── Analysis results ────────────────────────────────────────────────

    pub fn result(&self, id: PresentationId) -> Option<AnalysisResult> {
        match self.results.read() {
            Ok(map) => map.get(&id).map(|entry| entry.value.clone()),
            Err(e) => {
                error!("result map lock poisoned during read: {e}");
                None
            }
        }
    }

    pub fn put_result(&self, id: PresentationId, result: AnalysisResult) {
        match self.results.write() {
            Ok(mut map) => {
                map.insert(id, CacheEntry::new(result));
            }
            Err(e) => error!("result map lock poisoned during write: {e}"),
        }
    }

    /// Drop a presentation's status and result. The next status write is
    /// accepted whatever phase it carries; this is how manual retry and
    /// notification-driven refreshes escape terminal phases.
    pub fn invalidate_presentation(&self, id: PresentationId) {
        if let Ok(mut map) = self.statuses.write() {
            map.remove(&id);
        }
        if let Ok(mut map) = self.results.write() {
            map.remove(&id);
        }
    }

    // ── Presentation lists ──────────────────────────────────────────────

    /// A topic's presentation list, only if fetched within `window`.
    /// Individual entity freshness never substitutes for list freshness.
    pub fn presentations(&self, topic: TopicId, window: Duration) -> Option<Vec<Presentation>> {
        match self.lists.read() {
            Ok(map) => map
                .get(&topic)
                .filter(|entry| !entry.is_stale(window))
                .map(|entry| entry.value.clone()),
            Err(e) => {
                error!("list map lock poisoned during read: {e}");
                None
            }
        }
    }

    /// `true` when the list is absent or older than `window`.
    pub fn is_list_stale(&self, topic: TopicId, window: Duration) -> bool {
        match self.lists.read() {
            Ok(map) => map.get(&topic).map(|entry| entry.is_stale(window)).unwrap_or(true),
            Err(e) => {
                error!("list map lock poisoned during read: {e}");
                true
            }
        }
    }

    /// Replace a topic's list with a fresh fetch; the cached topic's
    /// derived count follows.
    pub fn put_presentations(&self, topic: TopicId, list: Vec<Presentation>) {
        let count = list.len() as u32;
        match self.lists.write() {
            Ok(mut map) => {
                map.insert(topic, CacheEntry::new(list));
            }
            Err(e) => error!("list map lock poisoned during write: {e}"),
        }
        self.set_topic_count(topic, count);
    }

    pub fn invalidate_list(&self, topic: TopicId) {
        if let Ok(mut map) = self.lists.write() {
            map.remove(&topic);
        }
    }

    // ── Topics ──────────────────────────────────────────────────────────

    pub fn topic(&self, id: TopicId) -> Option<Topic> {
        match self.topics.read() {
            Ok(map) => map.get(&id).map(|entry| entry.value.clone()),
            Err(e) => {
                error!("topic map lock poisoned during read: {e}");
                None
            }
        }
    }

    pub fn put_topics(&self, topics: Vec<Topic>) {
        match self.topics.write() {
            Ok(mut map) => {
                for topic in topics {
                    map.insert(topic.id, CacheEntry::new(topic));
                }
            }
            Err(e) => error!("topic map lock poisoned during write: {e}"),
        }
    }

    fn set_topic_count(&self, topic: TopicId, count: u32) {
        if let Ok(mut map) = self.topics.write() {
            if let Some(entry) = map.get_mut(&topic) {
                entry.value.presentation_count = count;
            }
        }
    }

    // ── Structural child updates ────────────────────────────────────────

    /// A presentation was created locally: splice it into the cached list
    /// and bump the parent's count. Content changes, fetch time does not.
    pub fn insert_presentation(&self, presentation: Presentation) {
        let topic = presentation.topic_id;
        let new_count = match self.lists.write() {
            Ok(mut map) => map.get_mut(&topic).map(|entry| {
                entry.value.retain(|p| p.id != presentation.id);
                entry.value.insert(0, presentation);
                entry.value.len() as u32
            }),
            Err(e) => {
                error!("list map lock poisoned during insert: {e}");
                None
            }
        };
        if let Some(count) = new_count {
            self.set_topic_count(topic, count);
        }
    }

    /// A presentation was deleted locally: remove it everywhere and fix
    /// the parent's count. Returns the owning topic when one was cached.
    pub fn remove_presentation(&self, id: PresentationId) -> Option<TopicId> {
        self.invalidate_presentation(id);
        let removed = match self.lists.write() {
            Ok(mut map) => map.iter_mut().find_map(|(topic, entry)| {
                if entry.value.iter().any(|p| p.id == id) {
                    entry.value.retain(|p| p.id != id);
                    Some((*topic, entry.value.len() as u32))
                } else {
                    None
                }
            }),
            Err(e) => {
                error!("list map lock poisoned during remove: {e}");
                None
            }
        };
        removed.map(|(topic, count)| {
            self.set_topic_count(topic, count);
            topic
        })
    }

    /// Drop everything (logout).
    pub fn clear(&self) {
        if let Ok(mut map) = self.statuses.write() {
            map.clear();
        }
        if let Ok(mut map) = self.results.write() {
            map.clear();
        }
        if let Ok(mut map) = self.lists.write() {
            map.clear();
        }
        if let Ok(mut map) = self.topics.write() {
            map.clear();
        }
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}
