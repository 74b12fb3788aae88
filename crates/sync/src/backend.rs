// crates/sync/src/backend.rs
//! The seam between the engine and the coaching API.
//!
//! Everything the engine fetches goes through [`CoachBackend`], so tests
//! drive the full polling/caching machinery against scripted fakes.

use async_trait::async_trait;

use podium_client::{ClientError, CoachApi};
use podium_types::{
    AnalysisResult, AnalysisStatus, Notification, Presentation, PresentationId, TopicId,
};

/// Backend surface the sync engine polls.
#[async_trait]
pub trait CoachBackend: Send + Sync {
    async fn analysis_status(&self, id: PresentationId) -> Result<AnalysisStatus, ClientError>;

    /// `Ok(None)` when the result has not materialized yet.
    async fn analysis_result(
        &self,
        id: PresentationId,
    ) -> Result<Option<AnalysisResult>, ClientError>;

    async fn has_results(&self, id: PresentationId) -> Result<bool, ClientError>;

    async fn presentations(&self, topic: TopicId) -> Result<Vec<Presentation>, ClientError>;

    /// One page of the notification feed, newest first.
    async fn notifications(&self, page: u32, size: u32) -> Result<Vec<Notification>, ClientError>;
}

#[async_trait]
impl CoachBackend for CoachApi {
    async fn analysis_status(&self, id: PresentationId) -> Result<AnalysisStatus, ClientError> {
        CoachApi::analysis_status(self, id).await
    }

    async fn analysis_result(
        &self,
        id: PresentationId,
    ) -> Result<Option<AnalysisResult>, ClientError> {
        CoachApi::analysis_result(self, id).await
    }

    async fn has_results(&self, id: PresentationId) -> Result<bool, ClientError> {
        CoachApi::has_results(self, id).await
    }

    async fn presentations(&self, topic: TopicId) -> Result<Vec<Presentation>, ClientError> {
        CoachApi::presentations(self, topic).await
    }

    async fn notifications(&self, page: u32, size: u32) -> Result<Vec<Notification>, ClientError> {
        CoachApi::notifications(self, page, size).await.map(|page| page.items)
    }
}
