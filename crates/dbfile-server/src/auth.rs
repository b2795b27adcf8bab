//! Admin bearer-token check for the storage action endpoints.

use std::sync::Arc;

use axum::http::{header, HeaderMap};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::ApiError;

/// Admin token, kept only as its SHA-256 digest.
#[derive(Clone)]
pub struct AdminToken {
    digest: String,
}

impl AdminToken {
    pub fn new(token: &str) -> Self {
        Self {
            digest: hash_token(token),
        }
    }

    /// Compare a presented token by digest.
    pub fn verify(&self, presented: &str) -> bool {
        let presented = hash_token(presented);
        // Equal-length hex strings; fold so the comparison does not exit early.
        presented.len() == self.digest.len()
            && presented
                .bytes()
                .zip(self.digest.bytes())
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }
}

impl std::fmt::Debug for AdminToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AdminToken(<redacted>)")
    }
}

pub type SharedAdminToken = Arc<AdminToken>;

/// Hash a token using SHA-256.
fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Extract Bearer token from the Authorization header.
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Gate for admin-only endpoints.
///
/// With no admin token configured the endpoints are disabled (403).
pub fn require_admin(admin: Option<&AdminToken>, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(admin) = admin else {
        debug!("Admin endpoint called but no admin token is configured");
        return Err(ApiError::AdminDisabled);
    };
    let token = extract_bearer_token(headers).ok_or(ApiError::Unauthorized)?;
    if admin.verify(token) {
        Ok(())
    } else {
        Err(ApiError::InvalidToken)
    }
}
