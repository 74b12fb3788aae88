// crates/client/src/jwt.rs
//! Unverified JWT payload decoding.
//!
//! The client never validates signatures; it only parses the payload to
//! recover identity claims (`sub`, `email`, `provider`) for routing the
//! token refresh. Verification is the server's job.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Deserialize;

use crate::error::ClientError;

/// Identity claims carried in the access token payload.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    #[serde(default, rename = "sub")]
    pub subject: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// `LOCAL` for password accounts, the provider name (e.g. `GOOGLE`)
    /// for federated ones.
    #[serde(default)]
    pub provider: Option<String>,
}

/// Decode the payload segment of a JWT without verifying it.
pub fn decode_claims(token: &str) -> Result<Claims, ClientError> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| ClientError::Credential("access token is not a JWT".into()))?;

    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|e| ClientError::Credential(format!("token payload is not base64url: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| ClientError::Credential(format!("token payload is not valid JSON: {e}")))
}
