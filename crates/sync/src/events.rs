// crates/sync/src/events.rs
//! Events broadcast to UI subscribers.

use serde::Serialize;

use podium_types::{AnalysisStatus, Notification, PresentationId, TopicId};

/// Events emitted by the sync engine. UI layers render from the cache and
/// use these to know when to re-read it.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A presentation's analysis status changed in the cache.
    StatusChanged {
        #[serde(rename = "presentationId")]
        presentation_id: PresentationId,
        status: AnalysisStatus,
    },
    /// A completed analysis result landed in the cache.
    ResultReady {
        #[serde(rename = "presentationId")]
        presentation_id: PresentationId,
    },
    /// A topic's presentation list was refreshed from the backend.
    TopicRefreshed {
        #[serde(rename = "topicId")]
        topic_id: TopicId,
        #[serde(rename = "presentationCount")]
        presentation_count: usize,
    },
    /// A genuinely new notification was detected in the feed.
    NotificationSurfaced { notification: Notification },
    /// The session was invalidated; the engine is shutting down.
    SessionExpired,
}
