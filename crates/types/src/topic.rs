// crates/types/src/topic.rs
//! Topics: groups of presentations, personal or team-owned.

use serde::{Deserialize, Serialize};

use crate::{TeamId, TopicId};

/// A presentation group. `presentation_count` may be server-supplied or
/// derived from a loaded presentation list; the cache keeps both in step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: TopicId,
    pub title: String,
    pub is_team_group: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<TeamId>,
    #[serde(default)]
    pub presentation_count: u32,
}
