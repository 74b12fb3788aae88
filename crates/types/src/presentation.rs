// crates/types/src/presentation.rs
//! Presentations: a recorded or uploaded talk belonging to one topic.

use serde::{Deserialize, Serialize};

use crate::{PresentationId, TopicId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presentation {
    pub id: PresentationId,
    pub topic_id: TopicId,
    pub title: String,
    /// Absent until the uploaded video finished server-side ingestion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
