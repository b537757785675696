//! Who is making the request.
//!
//! The signed role claim answers without a backend call. When it is
//! missing, stale or forged, the identity and profile are fetched and a
//! fresh claim is issued for the response.

use chrono::Utc;
use lambda_http::Request;
use staj_shared::auth::get_current_user;
use staj_shared::backend::SessionToken;
use staj_shared::claims::{RoleClaim, ROLE_COOKIE};
use staj_shared::cookies;
use staj_shared::outcome::Outcome;
use staj_shared::roles::Role;
use staj_shared::users::get_user_profile;
use staj_shared::AppState;

use crate::http_handler::request_cookie;

#[derive(Debug, Clone)]
pub(crate) struct Viewer {
    pub user_id: String,
    pub name: String,
    pub role: Role,
    /// `Set-Cookie` value for a newly issued role claim
    pub refreshed_claim: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ViewerError {
    /// The session is missing or rejected by the platform
    Unauthenticated,
    /// Signed in, but no usable profile
    NoProfile(String),
}

pub(crate) async fn resolve(
    event: &Request,
    state: &AppState,
    session: &SessionToken,
) -> Result<Viewer, ViewerError> {
    let now = Utc::now().timestamp();

    if let Some(token) = request_cookie(event, ROLE_COOKIE) {
        match RoleClaim::verify(&token, &state.config.signing_key, session) {
            Ok(claim) => {
                return Ok(Viewer {
                    user_id: claim.user_id,
                    name: claim.name,
                    role: claim.role,
                    refreshed_claim: None,
                })
            }
            Err(e) => tracing::info!("Ignoring role claim: {}", e),
        }
    }

    let identity = match get_current_user(state.backend.as_ref(), session).await {
        Outcome::Success(identity) => identity,
        Outcome::Failure(_) => return Err(ViewerError::Unauthenticated),
    };
    let profile = match get_user_profile(state.backend.as_ref(), session, &identity.id).await {
        Outcome::Success(profile) => profile,
        Outcome::Failure(message) => return Err(ViewerError::NoProfile(message)),
    };

    let refreshed_claim = issue_claim_cookie(state, session, &profile.user_id, &profile.name, profile.role, now);
    Ok(Viewer {
        user_id: profile.user_id,
        name: profile.name,
        role: profile.role,
        refreshed_claim,
    })
}

/// Signed role claim as a `Set-Cookie` value; `None` when signing fails.
pub(crate) fn issue_claim_cookie(
    state: &AppState,
    session: &SessionToken,
    user_id: &str,
    name: &str,
    role: Role,
    now: i64,
) -> Option<String> {
    let ttl = state.config.role_claim_ttl_seconds;
    match RoleClaim::issue(user_id, name, role, session, now, ttl).sign(&state.config.signing_key) {
        Ok(token) => Some(cookies::format_cookie(ROLE_COOKIE, &token, ttl, state.config.secure_cookies)),
        Err(e) => {
            tracing::error!("Role claim signing error: {}", e);
            None
        }
    }
}
