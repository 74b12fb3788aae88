// crates/client/src/transport.rs
//! Authenticated HTTP transport.
//!
//! Every outbound request goes through [`Transport::send`], which attaches
//! the current bearer credential and performs at most one refresh-and-replay
//! when the backend answers 401. Requests are described by a rebuildable
//! [`RequestPlan`] so the replay reconstructs an identical request,
//! multipart bodies included.
//!
//! Concurrent 401s collapse into a single token replacement: refreshers
//! serialize on a mutex and compare the session store's token version
//! against the one they observed at failure time. Whoever wins performs the
//! network refresh; everyone else reuses the replaced token.

use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::jwt;
use crate::session::{Provider, SessionStore};

/// Transport configuration. Upload requests (multipart) get the extended
/// timeout; everything else uses the default.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub upload_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: Duration::from_secs(30),
            upload_timeout: Duration::from_secs(300),
        }
    }
}

/// One file part of a multipart upload, held as owned bytes so the form can
/// be rebuilt for the 401 replay.
#[derive(Debug, Clone)]
pub struct FilePart {
    pub name: String,
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Text fields + file parts of a multipart body.
#[derive(Debug, Clone, Default)]
pub struct MultipartPlan {
    pub fields: Vec<(String, String)>,
    pub files: Vec<FilePart>,
}

impl MultipartPlan {
    fn build_form(&self) -> Result<Form, ClientError> {
        let mut form = Form::new();
        for (name, value) in &self.fields {
            form = form.text(name.clone(), value.clone());
        }
        for file in &self.files {
            let part = Part::bytes(file.bytes.clone())
                .file_name(file.file_name.clone())
                .mime_str(&file.mime)
                .map_err(ClientError::Network)?;
            form = form.part(file.name.clone(), part);
        }
        Ok(form)
    }
}

/// A request description that can be turned into a `reqwest` request any
/// number of times.
#[derive(Debug, Clone)]
pub struct RequestPlan {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    json: Option<serde_json::Value>,
    multipart: Option<MultipartPlan>,
    timeout: Option<Duration>,
}

impl RequestPlan {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            json: None,
            multipart: None,
            timeout: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Attach a JSON body. Panics only on types whose `Serialize` impl
    /// fails, which the wire structs in this workspace never do.
    pub fn json<T: serde::Serialize>(mut self, body: &T) -> Self {
        self.json = Some(serde_json::to_value(body).expect("wire struct serializes"));
        self
    }

    /// Attach a multipart body; the transport switches to the upload
    /// timeout and leaves content-type negotiation to the multipart layer.
    pub fn multipart(mut self, plan: MultipartPlan) -> Self {
        self.multipart = Some(plan);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Response of both refresh endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    access_token: String,
}

/// The authenticated request pipeline.
pub struct Transport {
    http: reqwest::Client,
    config: ClientConfig,
    sessions: Arc<SessionStore>,
    /// Serializes refresh attempts so concurrent 401s produce one
    /// replacement.
    refresh_gate: tokio::sync::Mutex<()>,
}

impl Transport {
    pub fn new(config: ClientConfig, sessions: Arc<SessionStore>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("reqwest client builds with static configuration");
        Self {
            http,
            config,
            sessions,
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn build(&self, plan: &RequestPlan) -> Result<reqwest::RequestBuilder, ClientError> {
        let mut builder = self.http.request(plan.method.clone(), self.url(&plan.path));
        if !plan.query.is_empty() {
            builder = builder.query(&plan.query);
        }
        if let Some(token) = self.sessions.access_token() {
            builder = builder.bearer_auth(token);
        }
        if let Some(json) = &plan.json {
            builder = builder.json(json);
        }
        if let Some(multipart) = &plan.multipart {
            builder = builder
                .multipart(multipart.build_form()?)
                .timeout(self.config.upload_timeout);
        }
        if let Some(timeout) = plan.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(builder)
    }

    async fn attempt(&self, plan: &RequestPlan) -> Result<reqwest::Response, ClientError> {
        self.build(plan)?.send().await.map_err(ClientError::Network)
    }

    async fn into_result(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::from_status(status.as_u16(), body))
    }

    /// Send a request with the one-shot 401 refresh-and-replay protocol.
    ///
    /// Network errors and non-401 server errors are never retried here;
    /// polling layers own that. A second 401 after the replay is terminal.
    pub async fn send(&self, plan: &RequestPlan) -> Result<reqwest::Response, ClientError> {
        let observed_version = self.sessions.token_version();
        let response = self.attempt(plan).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::into_result(response).await;
        }

        self.refresh(observed_version).await?;

        let replayed = self.attempt(plan).await?;
        if replayed.status() == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Unauthorized);
        }
        Self::into_result(replayed).await
    }

    /// Send and decode a JSON response body.
    pub async fn send_json<T: DeserializeOwned>(&self, plan: &RequestPlan) -> Result<T, ClientError> {
        let response = self.send(plan).await?;
        response.json::<T>().await.map_err(ClientError::Network)
    }

    /// Send, discarding the response body.
    pub async fn send_unit(&self, plan: &RequestPlan) -> Result<(), ClientError> {
        self.send(plan).await.map(|_| ())
    }

    /// Refresh the access token, deduplicating concurrent attempts.
    ///
    /// `observed_version` is the token version the caller saw when its
    /// request failed with 401. If the store moved past it while we waited
    /// on the gate, the token was already replaced (or cleared) and no
    /// network call is made.
    async fn refresh(&self, observed_version: u64) -> Result<(), ClientError> {
        let _gate = self.refresh_gate.lock().await;
        if self.sessions.token_version() != observed_version {
            return if self.sessions.is_authenticated() {
                Ok(())
            } else {
                Err(ClientError::Unauthorized)
            };
        }

        let session = self.sessions.current().ok_or(ClientError::Unauthorized)?;
        // Malformed credential aborts the refresh without touching the
        // session; the provider cannot be established, so nobody is
        // force-logged-out.
        let claims = jwt::decode_claims(&session.access_token)?;
        let provider = claims
            .provider
            .as_deref()
            .map(Provider::parse)
            .unwrap_or(session.identity.provider);
        let email = claims.email.unwrap_or_else(|| session.identity.email.clone());

        let path = match provider {
            Provider::Local => "/auth/token/refresh",
            Provider::Federated => "/oauth2/refresh",
        };

        let outcome = async {
            let response = self
                .http
                .post(self.url(path))
                .query(&[("email", email.as_str())])
                .send()
                .await
                .map_err(ClientError::Network)?;
            let response = Self::into_result(response).await?;
            response
                .json::<TokenResponse>()
                .await
                .map_err(ClientError::Network)
        }
        .await;

        match outcome {
            Ok(token) => {
                self.sessions.replace_token(token.access_token);
                debug!(provider = ?provider, "access token refreshed");
                Ok(())
            }
            Err(e) => {
                if provider.is_federated() {
                    // Federated sessions are never force-logged-out on a
                    // failed refresh; they stay and keep retrying on later
                    // requests.
                    warn!(error = %e, "token refresh failed for federated session; session kept");
                } else {
                    warn!(error = %e, "token refresh failed; clearing local session");
                    self.sessions.expire();
                }
                Err(ClientError::Unauthorized)
            }
        }
    }
}
