//! Signed role claim cookie.
//!
//! Caches the caller's role between requests so page guards don't need a
//! profile lookup each time. The claim is an HS256 JWT bound to the session
//! secret it was issued for.

use crate::backend::SessionToken;
use crate::roles::Role;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const ROLE_COOKIE: &str = "staj_role";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleClaim {
    #[serde(rename = "sub")]
    pub user_id: String,
    pub name: String,
    pub role: Role,
    #[serde(rename = "exp")]
    pub expires_at: i64,
    #[serde(rename = "sid")]
    pub session_digest: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum ClaimError {
    #[error("malformed role claim")]
    Malformed,
    #[error("role claim signature mismatch")]
    BadSignature,
    #[error("role claim expired")]
    Expired,
    #[error("role claim issued for another session")]
    WrongSession,
    #[error("role claim could not be encoded")]
    Encode,
}

impl From<jsonwebtoken::errors::Error> for ClaimError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::InvalidSignature => ClaimError::BadSignature,
            ErrorKind::ExpiredSignature => ClaimError::Expired,
            _ => ClaimError::Malformed,
        }
    }
}

fn session_digest(session: &SessionToken) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(session.expose().as_bytes()))
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation
}

impl RoleClaim {
    pub fn issue(user_id: &str, name: &str, role: Role, session: &SessionToken, now: i64, ttl_seconds: i64) -> Self {
        Self {
            user_id: user_id.to_string(),
            name: name.to_string(),
            role,
            expires_at: now + ttl_seconds,
            session_digest: session_digest(session),
        }
    }

    pub fn sign(&self, key: &str) -> Result<String, ClaimError> {
        encode(&Header::new(Algorithm::HS256), self, &EncodingKey::from_secret(key.as_bytes()))
            .map_err(|_| ClaimError::Encode)
    }

    /// Checks signature and expiry, then that the claim belongs to `session`
    pub fn verify(token: &str, key: &str, session: &SessionToken) -> Result<Self, ClaimError> {
        let data = decode::<RoleClaim>(token, &DecodingKey::from_secret(key.as_bytes()), &validation())?;
        if data.claims.session_digest != session_digest(session) {
            return Err(ClaimError::WrongSession);
        }
        Ok(data.claims)
    }
}
