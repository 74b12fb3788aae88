// crates/client/src/session.rs
//! Process-wide session state: the access credential plus a minimal
//! identity, persisted across restarts.
//!
//! The store carries a monotonic token version. Every replacement (login,
//! refresh, clear) bumps it, which is what lets concurrent 401 handlers
//! detect that somebody else already refreshed while they waited.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Account provider recovered from the token's `provider` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Local,
    Federated,
}

impl Provider {
    /// `LOCAL` (any case) is a password account; every other provider name
    /// is federated.
    pub fn parse(claim: &str) -> Self {
        if claim.eq_ignore_ascii_case("LOCAL") {
            Self::Local
        } else {
            Self::Federated
        }
    }

    pub fn is_federated(self) -> bool {
        matches!(self, Self::Federated)
    }
}

/// Minimal user descriptor persisted alongside the credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub subject: String,
    pub email: String,
    pub provider: Provider,
}

/// An authenticated session: the bearer credential plus who it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    pub identity: Identity,
}

/// Signals broadcast to subscribers when the session changes out from under
/// them.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionSignal {
    /// The session was invalidated (refresh failed for a local account).
    /// UI layers redirect to login; the sync engine tears down.
    Expired,
}

/// Owner of the process-wide [`Session`].
pub struct SessionStore {
    inner: RwLock<Option<Session>>,
    version: AtomicU64,
    signals_tx: broadcast::Sender<SessionSignal>,
    /// Persistence target; `None` keeps the session memory-only (tests).
    path: Option<PathBuf>,
}

impl SessionStore {
    /// Memory-only store with no session.
    pub fn in_memory() -> Self {
        Self {
            inner: RwLock::new(None),
            version: AtomicU64::new(0),
            signals_tx: broadcast::channel(16).0,
            path: None,
        }
    }

    /// Store backed by a JSON file; an existing valid file restores the
    /// previous session.
    pub fn with_file(path: PathBuf) -> Self {
        let restored = Self::load_file(&path);
        if restored.is_some() {
            debug!(path = %path.display(), "restored persisted session");
        }
        Self {
            inner: RwLock::new(restored),
            version: AtomicU64::new(0),
            signals_tx: broadcast::channel(16).0,
            path: Some(path),
        }
    }

    /// Store backed by `~/.podium/credentials.json`.
    pub fn open_default() -> Self {
        match dirs::home_dir() {
            Some(home) => Self::with_file(home.join(".podium").join("credentials.json")),
            None => {
                warn!("could not determine home directory; session will not persist");
                Self::in_memory()
            }
        }
    }

    fn load_file(path: &std::path::Path) -> Option<Session> {
        let bytes = std::fs::read(path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable session file");
                None
            }
        }
    }

    fn persist(&self, session: Option<&Session>) {
        let Some(path) = &self.path else { return };
        let outcome = match session {
            Some(session) => {
                if let Some(parent) = path.parent() {
                    let _ = std::fs::create_dir_all(parent);
                }
                serde_json::to_vec_pretty(session)
                    .map_err(std::io::Error::other)
                    .and_then(|bytes| std::fs::write(path, bytes))
            }
            None => match std::fs::remove_file(path) {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e),
                _ => Ok(()),
            },
        };
        if let Err(e) = outcome {
            warn!(path = %path.display(), error = %e, "failed to persist session state");
        }
    }

    /// Install a freshly authenticated session (login / OAuth callback).
    pub fn log_in(&self, session: Session) {
        self.persist(Some(&session));
        match self.inner.write() {
            Ok(mut guard) => *guard = Some(session),
            Err(e) => warn!("session lock poisoned during login: {e}"),
        }
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    /// Replace only the access token, keeping the identity (refresh path).
    pub fn replace_token(&self, access_token: String) {
        match self.inner.write() {
            Ok(mut guard) => {
                if let Some(session) = guard.as_mut() {
                    session.access_token = access_token;
                    self.persist(Some(session));
                }
            }
            Err(e) => warn!("session lock poisoned during token replacement: {e}"),
        }
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    /// Destroy the session without signalling (user-initiated logout).
    pub fn log_out(&self) {
        self.take_session();
    }

    /// Destroy the session and broadcast [`SessionSignal::Expired`]
    /// (refresh failure on a local account).
    pub fn expire(&self) {
        self.take_session();
        let _ = self.signals_tx.send(SessionSignal::Expired);
    }

    fn take_session(&self) {
        self.persist(None);
        match self.inner.write() {
            Ok(mut guard) => *guard = None,
            Err(e) => warn!("session lock poisoned during clear: {e}"),
        }
        self.version.fetch_add(1, Ordering::SeqCst);
    }

    pub fn current(&self) -> Option<Session> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(e) => {
                warn!("session lock poisoned during read: {e}");
                None
            }
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.current().map(|s| s.access_token)
    }

    pub fn is_authenticated(&self) -> bool {
        self.current().is_some()
    }

    /// Monotonic counter bumped on every token change.
    pub fn token_version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionSignal> {
        self.signals_tx.subscribe()
    }
}
