// crates/client/src/lib.rs
//! HTTP client layer for the podium coaching backend.
//!
//! [`Transport`] owns the authenticated request pipeline: bearer credential
//! attachment, one-shot refresh-and-retry on 401, and provider-routed token
//! refresh. [`CoachApi`] layers the typed REST surface on top. The
//! [`SessionStore`] persists the credential and a minimal identity across
//! restarts and broadcasts expiry so the sync engine can tear down.

pub mod api;
pub mod error;
pub mod jwt;
pub mod session;
pub mod storage;
pub mod transport;

pub use api::{CoachApi, NewTopic, Page};
pub use error::ClientError;
pub use session::{Identity, Provider, Session, SessionSignal, SessionStore};
pub use storage::{ResumeState, ResumeStore};
pub use transport::{ClientConfig, FilePart, MultipartPlan, RequestPlan, Transport};
