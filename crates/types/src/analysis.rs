// crates/types/src/analysis.rs
//! Analysis job status and result types.
//!
//! [`AnalysisPhase`] is an explicit tagged enum with a distinguished
//! [`AnalysisPhase::Unknown`] case, so "never checked" is representable
//! without `Option` ambiguity. The server only ever sends the other five
//! values; anything unrecognized also decodes to `Unknown`.

use serde::{Deserialize, Serialize};

use crate::PresentationId;

/// Lifecycle phase of a presentation's analysis job.
///
/// Transitions move forward only (`not_started`/`pending` → `processing` →
/// `completed`), except `error → pending` on a manual retry. `Unknown` is
/// client-side only: the status endpoint has not been consulted yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisPhase {
    NotStarted,
    Pending,
    Processing,
    Completed,
    Error,
    /// No status observed yet. Never sent by the server; unrecognized wire
    /// values also land here.
    #[serde(other)]
    Unknown,
}

impl AnalysisPhase {
    /// Terminal phases only leave via an explicit invalidation (retry,
    /// notification-triggered refresh).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }

    /// Phases that warrant continued polling of the status endpoint.
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

/// Status payload of `GET /video-analysis/{id}/status`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStatus {
    #[serde(rename = "status")]
    pub phase: AnalysisPhase,
    /// Percent complete, 0–100. Meaningful while `processing`.
    #[serde(default)]
    pub progress: u8,
}

impl AnalysisStatus {
    /// The "never checked" status the cache starts from.
    pub fn unknown() -> Self {
        Self { phase: AnalysisPhase::Unknown, progress: 0 }
    }

    pub fn not_started() -> Self {
        Self { phase: AnalysisPhase::NotStarted, progress: 0 }
    }

    pub fn completed() -> Self {
        Self { phase: AnalysisPhase::Completed, progress: 100 }
    }
}

/// Letter grade derived from a 0–100 score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    /// Fixed 90/80/70/60 thresholds. Scores outside 0–100 clamp to F/A.
    pub fn from_score(score: f32) -> Self {
        match score {
            s if s >= 90.0 => Self::A,
            s if s >= 80.0 => Self::B,
            s if s >= 70.0 => Self::C,
            s if s >= 60.0 => Self::D,
            _ => Self::F,
        }
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let letter = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        };
        f.write_str(letter)
    }
}

/// Full analysis result payload (`GET /video-analysis/results/{id}`).
///
/// Exists only once the job reached `completed`; a 404 from the results
/// endpoint means "not yet available", not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub presentation_id: PresentationId,
    pub overall_score: f32,
    pub voice_score: f32,
    pub pace_score: f32,
    pub pitch_score: f32,
    pub pronunciation_score: f32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl AnalysisResult {
    pub fn overall_grade(&self) -> Grade {
        Grade::from_score(self.overall_score)
    }

    /// Per-dimension letter grades in display order:
    /// voice, pace, pitch, pronunciation.
    pub fn dimension_grades(&self) -> [Grade; 4] {
        [
            Grade::from_score(self.voice_score),
            Grade::from_score(self.pace_score),
            Grade::from_score(self.pitch_score),
            Grade::from_score(self.pronunciation_score),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn phase_deserializes_snake_case() {
        let phase: AnalysisPhase = serde_json::from_str("\"not_started\"").unwrap();
        assert_eq!(phase, AnalysisPhase::NotStarted);
        let phase: AnalysisPhase = serde_json::from_str("\"processing\"").unwrap();
        assert_eq!(phase, AnalysisPhase::Processing);
    }

    #[test]
    fn unrecognized_phase_decodes_to_unknown() {
        let phase: AnalysisPhase = serde_json::from_str("\"transcoding\"").unwrap();
        assert_eq!(phase, AnalysisPhase::Unknown);
    }

    #[test]
    fn phase_classification() {
        assert!(AnalysisPhase::Completed.is_terminal());
        assert!(AnalysisPhase::Error.is_terminal());
        assert!(!AnalysisPhase::Processing.is_terminal());
        assert!(!AnalysisPhase::Unknown.is_terminal());

        assert!(AnalysisPhase::Pending.is_in_flight());
        assert!(AnalysisPhase::Processing.is_in_flight());
        assert!(!AnalysisPhase::Completed.is_in_flight());
        assert!(!AnalysisPhase::NotStarted.is_in_flight());
    }

    #[test]
    fn status_deserializes_wire_shape() {
        let status: AnalysisStatus =
            serde_json::from_str(r#"{"status":"processing","progress":42}"#).unwrap();
        assert_eq!(status.phase, AnalysisPhase::Processing);
        assert_eq!(status.progress, 42);
    }

    #[test]
    fn status_progress_defaults_to_zero() {
        let status: AnalysisStatus = serde_json::from_str(r#"{"status":"pending"}"#).unwrap();
        assert_eq!(status.progress, 0);
    }

    #[test]
    fn grade_thresholds() {
        assert_eq!(Grade::from_score(95.0), Grade::A);
        assert_eq!(Grade::from_score(90.0), Grade::A);
        assert_eq!(Grade::from_score(89.9), Grade::B);
        assert_eq!(Grade::from_score(80.0), Grade::B);
        assert_eq!(Grade::from_score(75.0), Grade::C);
        assert_eq!(Grade::from_score(65.0), Grade::D);
        assert_eq!(Grade::from_score(59.9), Grade::F);
        assert_eq!(Grade::from_score(0.0), Grade::F);
    }

    #[test]
    fn result_grades() {
        let result = AnalysisResult {
            presentation_id: 7,
            overall_score: 84.0,
            voice_score: 91.0,
            pace_score: 78.0,
            pitch_score: 66.0,
            pronunciation_score: 52.0,
            created_at: chrono::Utc::now(),
        };
        assert_eq!(result.overall_grade(), Grade::B);
        assert_eq!(
            result.dimension_grades(),
            [Grade::A, Grade::C, Grade::D, Grade::F]
        );
    }

    #[test]
    fn result_roundtrips_camel_case() {
        let json = r#"{
            "presentationId": 3,
            "overallScore": 88.5,
            "voiceScore": 90.0,
            "paceScore": 85.0,
            "pitchScore": 87.0,
            "pronunciationScore": 92.0,
            "createdAt": "2026-07-01T12:00:00Z"
        }"#;
        let result: AnalysisResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.presentation_id, 3);
        let back = serde_json::to_string(&result).unwrap();
        assert!(back.contains("\"overallScore\":88.5"));
    }
}
