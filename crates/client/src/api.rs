// crates/client/src/api.rs
//! Typed REST surface of the coaching backend.
//!
//! Thin request/response mapping over [`Transport`]; no caching or retry
//! policy lives here. The sync engine consumes these methods through its
//! backend trait.

use serde::{Deserialize, Serialize};

use podium_types::{
    AnalysisResult, AnalysisStatus, Notification, NotificationId, Presentation, PresentationId,
    TeamId, Topic, TopicId,
};

use crate::error::ClientError;
use crate::jwt;
use crate::session::{Identity, Provider, Session};
use crate::transport::{FilePart, MultipartPlan, RequestPlan, Transport};

/// One page of a paged listing, newest first.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub total_pages: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HasResultsResponse {
    has_results: bool,
}

/// Fields for creating a topic.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTopic {
    pub title: String,
    pub is_team_group: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub team_id: Option<TeamId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RenameRequest<'a> {
    title: &'a str,
}

/// Typed client for the coaching REST API.
pub struct CoachApi {
    transport: Transport,
}

impl CoachApi {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    // ── Auth ────────────────────────────────────────────────────────────

    /// Password login. Installs the session into the store and returns it.
    pub async fn log_in(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let response: LoginResponse = self
            .transport
            .send_json(&RequestPlan::post("/auth/login").json(&LoginRequest { email, password }))
            .await?;
        self.adopt_token(response.access_token)
    }

    /// Install an externally obtained access token (OAuth callback). The
    /// identity is recovered from the token's own claims.
    pub fn adopt_token(&self, access_token: String) -> Result<Session, ClientError> {
        let claims = jwt::decode_claims(&access_token)?;
        let identity = Identity {
            subject: claims
                .subject
                .ok_or_else(|| ClientError::Credential("token missing sub claim".into()))?,
            email: claims
                .email
                .ok_or_else(|| ClientError::Credential("token missing email claim".into()))?,
            provider: claims
                .provider
                .as_deref()
                .map(Provider::parse)
                .unwrap_or(Provider::Local),
        };
        let session = Session { access_token, identity };
        self.transport.sessions().log_in(session.clone());
        Ok(session)
    }

    // ── Video analysis ──────────────────────────────────────────────────

    pub async fn analysis_status(&self, id: PresentationId) -> Result<AnalysisStatus, ClientError> {
        self.transport
            .send_json(&RequestPlan::get(format!("/video-analysis/{id}/status")))
            .await
    }

    /// Full analysis result. `Ok(None)` when the backend has nothing yet
    /// (404 is not an error on this endpoint).
    pub async fn analysis_result(
        &self,
        id: PresentationId,
    ) -> Result<Option<AnalysisResult>, ClientError> {
        match self
            .transport
            .send_json(&RequestPlan::get(format!("/video-analysis/results/{id}")))
            .await
        {
            Ok(result) => Ok(Some(result)),
            Err(ClientError::NotFoundYet) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub async fn has_results(&self, id: PresentationId) -> Result<bool, ClientError> {
        let response: HasResultsResponse = self
            .transport
            .send_json(&RequestPlan::get(format!("/video-analysis/has-results/{id}")))
            .await?;
        Ok(response.has_results)
    }

    // ── Notifications ───────────────────────────────────────────────────

    pub async fn notifications(
        &self,
        page: u32,
        size: u32,
    ) -> Result<Page<Notification>, ClientError> {
        self.transport
            .send_json(
                &RequestPlan::get("/notifications")
                    .query("page", page)
                    .query("size", size),
            )
            .await
    }

    pub async fn mark_notification_read(&self, id: NotificationId) -> Result<(), ClientError> {
        self.transport
            .send_unit(&RequestPlan::patch(format!("/notifications/{id}/read")))
            .await
    }

    pub async fn mark_all_notifications_read(&self) -> Result<(), ClientError> {
        self.transport
            .send_unit(&RequestPlan::patch("/notifications/read-all"))
            .await
    }

    // ── Topics ──────────────────────────────────────────────────────────

    pub async fn topics(&self) -> Result<Vec<Topic>, ClientError> {
        self.transport.send_json(&RequestPlan::get("/topics")).await
    }

    pub async fn create_topic(&self, new: &NewTopic) -> Result<Topic, ClientError> {
        self.transport
            .send_json(&RequestPlan::post("/topics").json(new))
            .await
    }

    pub async fn rename_topic(&self, id: TopicId, title: &str) -> Result<Topic, ClientError> {
        self.transport
            .send_json(&RequestPlan::put(format!("/topics/{id}")).json(&RenameRequest { title }))
            .await
    }

    pub async fn delete_topic(&self, id: TopicId) -> Result<(), ClientError> {
        self.transport
            .send_unit(&RequestPlan::delete(format!("/topics/{id}")))
            .await
    }

    // ── Presentations ───────────────────────────────────────────────────

    pub async fn presentations(&self, topic: TopicId) -> Result<Vec<Presentation>, ClientError> {
        self.transport
            .send_json(&RequestPlan::get("/presentations").query("topicId", topic))
            .await
    }

    /// Upload a recorded presentation. Multipart body; the transport
    /// applies the extended upload timeout.
    pub async fn upload_presentation(
        &self,
        topic: TopicId,
        title: &str,
        video: FilePart,
    ) -> Result<Presentation, ClientError> {
        let body = MultipartPlan {
            fields: vec![
                ("topicId".into(), topic.to_string()),
                ("title".into(), title.to_string()),
            ],
            files: vec![video],
        };
        self.transport
            .send_json(&RequestPlan::post("/presentations").multipart(body))
            .await
    }

    pub async fn rename_presentation(
        &self,
        id: PresentationId,
        title: &str,
    ) -> Result<Presentation, ClientError> {
        self.transport
            .send_json(
                &RequestPlan::put(format!("/presentations/{id}")).json(&RenameRequest { title }),
            )
            .await
    }

    pub async fn delete_presentation(&self, id: PresentationId) -> Result<(), ClientError> {
        self.transport
            .send_unit(&RequestPlan::delete(format!("/presentations/{id}")))
            .await
    }
}
