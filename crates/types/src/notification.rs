// crates/types/src/notification.rs
//! Notification feed items.
//!
//! The feed is append-only and served newest-first. Feed watchers detect a
//! new item by identity (id), never by content.

use serde::{Deserialize, Serialize};

use crate::{NotificationId, PresentationId};

/// Kind discriminator for a feed item. Only `ANALYSIS_COMPLETE` drives cache
/// invalidation; everything else is surfaced to the UI untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
    AnalysisComplete,
    Comment,
    TeamInvite,
    /// Forward-compatibility: kinds this client version does not know.
    #[serde(other)]
    Other,
}

/// One item of `GET /notifications`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    /// References a presentation for analysis-complete events.
    #[serde(default)]
    pub related_id: Option<PresentationId>,
    pub is_read: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
