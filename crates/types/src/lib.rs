// crates/types/src/lib.rs
//! Domain model for the podium presentation-coaching client.
//!
//! Pure data: topics, presentations, analysis status/results, and the
//! notification feed. Wire payloads are camelCase JSON; enums use the
//! server's snake_case / SCREAMING_SNAKE_CASE conventions. No I/O here.

pub mod analysis;
pub mod notification;
pub mod presentation;
pub mod topic;

/// Unique identifier for a topic (presentation group).
pub type TopicId = i64;

/// Unique identifier for a presentation.
pub type PresentationId = i64;

/// Unique identifier for a notification feed item.
pub type NotificationId = i64;

/// Unique identifier for a team.
pub type TeamId = i64;

pub use analysis::{AnalysisPhase, AnalysisResult, AnalysisStatus, Grade};
pub use notification::{Notification, NotificationKind};
pub use presentation::Presentation;
pub use topic::Topic;
