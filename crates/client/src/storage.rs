// crates/client/src/storage.rs
//! Transient resume-view persistence.
//!
//! When the user leaves an analysis view, the client may stash the last
//! rendered result so a reload can restore the view without refetching.
//! The payload expires after one hour of wall-clock time; an expired file
//! is discarded on load.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use podium_types::{AnalysisResult, PresentationId};

/// Resume payloads older than this are dropped on load.
const RESUME_EXPIRY_SECS: i64 = 60 * 60;

/// The stashed analysis view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeState {
    pub presentation_id: PresentationId,
    pub result: AnalysisResult,
    pub saved_at: DateTime<Utc>,
}

/// File-backed store for the resume payload.
pub struct ResumeStore {
    path: PathBuf,
}

impl ResumeStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store backed by `~/.podium/resume.json`.
    pub fn open_default() -> Option<Self> {
        dirs::home_dir().map(|home| Self::new(home.join(".podium").join("resume.json")))
    }

    pub fn save(&self, state: &ResumeState) {
        if let Some(parent) = self.path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let outcome = serde_json::to_vec_pretty(state)
            .map_err(std::io::Error::other)
            .and_then(|bytes| std::fs::write(&self.path, bytes));
        if let Err(e) = outcome {
            warn!(path = %self.path.display(), error = %e, "failed to save resume state");
        }
    }

    /// Load the payload if present and not expired. Expired or unreadable
    /// files are removed.
    pub fn load(&self) -> Option<ResumeState> {
        self.load_at(Utc::now())
    }

    fn load_at(&self, now: DateTime<Utc>) -> Option<ResumeState> {
        let bytes = std::fs::read(&self.path).ok()?;
        let state: ResumeState = match serde_json::from_slice(&bytes) {
            Ok(state) => state,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "discarding unreadable resume state");
                self.clear();
                return None;
            }
        };
        let age = now.signed_duration_since(state.saved_at);
        if age.num_seconds() >= RESUME_EXPIRY_SECS {
            debug!(
                presentation_id = state.presentation_id,
                age_secs = age.num_seconds(),
                "resume state expired"
            );
            self.clear();
            return None;
        }
        Some(state)
    }

    pub fn clear(&self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "failed to clear resume state");
            }
        }
    }
}
