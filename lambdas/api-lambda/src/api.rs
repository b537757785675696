//! JSON API. Every body is an `Outcome`: `{"success": .., "data" | "error": ..}`.

use chrono::{Local, Utc};
use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, RequestExt, Response,
};
use serde::Serialize;
use staj_shared::activities::{self, normalize_date, DEFAULT_LIST_LIMIT, MISSING_FIELDS};
use staj_shared::auth::{self, UpdatePasswordRequest};
use staj_shared::backend::SessionToken;
use staj_shared::outcome::Outcome;
use staj_shared::roles::{self, Role};
use staj_shared::settings::{validate_password_change, validate_profile_name};
use staj_shared::types::{CreateActivityRequest, UpdateActivityRequest, UpdateProfileRequest};
use staj_shared::{stats, users, AppState};

use crate::http_handler::{append_cookie, json_response, read_payload};
use crate::viewer::{self, Viewer, ViewerError};

const NO_SESSION: &str = "Oturum bulunamadı";
const NO_PERMISSION: &str = "Bu işlem için yetkiniz yok";
const BAD_BODY: &str = "Geçersiz istek gövdesi";

pub(crate) async fn handle(
    event: &Request,
    state: &AppState,
    session: Option<SessionToken>,
    method: &Method,
    path: &str,
) -> Result<Response<Body>, Error> {
    let Some(session) = session else {
        return failure(StatusCode::UNAUTHORIZED, NO_SESSION);
    };
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    // Identity only; works before a profile exists
    if let (&Method::GET, ["api", "me"]) = (method, parts.as_slice()) {
        let outcome = auth::get_current_user(state.backend.as_ref(), &session).await;
        let status = if outcome.is_success() { StatusCode::OK } else { StatusCode::UNAUTHORIZED };
        return json_response(status, &outcome);
    }

    let viewer = match viewer::resolve(event, state, &session).await {
        Ok(viewer) => viewer,
        Err(ViewerError::Unauthenticated) => return failure(StatusCode::UNAUTHORIZED, NO_SESSION),
        Err(ViewerError::NoProfile(message)) => return failure(StatusCode::FORBIDDEN, &message),
    };

    let mut response = match (method, parts.as_slice()) {
        (&Method::GET, ["api", "profile"]) => get_profile(event, state, &session, &viewer).await?,
        (&Method::PATCH, ["api", "profile"]) => update_profile(event, state, &session, &viewer).await?,
        (&Method::PATCH, ["api", "password"]) => update_password(event, state, &session).await?,
        (&Method::GET, ["api", "activities"]) => list_activities(event, state, &session, &viewer).await?,
        (&Method::POST, ["api", "activities"]) => create_activity(event, state, &session, &viewer).await?,
        (_, ["api", "activities", activity_id]) => {
            activity_by_id(event, state, &session, &viewer, method, activity_id).await?
        }
        (&Method::GET, ["api", "stats"]) => get_stats(state, &session, &viewer).await?,
        _ => failure(StatusCode::NOT_FOUND, "Bulunamadı")?,
    };

    if let Some(cookie) = &viewer.refreshed_claim {
        append_cookie(&mut response, cookie)?;
    }
    Ok(response)
}

fn failure(status: StatusCode, message: &str) -> Result<Response<Body>, Error> {
    json_response(status, &Outcome::<()>::Failure(message.to_string()))
}

/// 200 for success, 400 when the platform rejected the call
fn reply<T: Serialize>(outcome: Outcome<T>) -> Result<Response<Body>, Error> {
    let status = if outcome.is_success() { StatusCode::OK } else { StatusCode::BAD_REQUEST };
    json_response(status, &outcome)
}

fn query_param(event: &Request, name: &str) -> Option<String> {
    event
        .query_string_parameters_ref()
        .and_then(|params| params.first(name))
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
}

fn numeric_param(event: &Request, name: &str, default: u64) -> u64 {
    query_param(event, name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ========== PROFILE ==========
async fn get_profile(
    event: &Request,
    state: &AppState,
    session: &SessionToken,
    viewer: &Viewer,
) -> Result<Response<Body>, Error> {
    let target = query_param(event, "userId").unwrap_or_else(|| viewer.user_id.clone());
    if !roles::can_access_user_data(&viewer.user_id, &target, viewer.role) {
        return failure(StatusCode::FORBIDDEN, NO_PERMISSION);
    }
    reply(users::get_user_profile(state.backend.as_ref(), session, &target).await)
}

async fn update_profile(
    event: &Request,
    state: &AppState,
    session: &SessionToken,
    viewer: &Viewer,
) -> Result<Response<Body>, Error> {
    let Some(body) = read_payload::<UpdateProfileRequest>(event) else {
        return failure(StatusCode::BAD_REQUEST, BAD_BODY);
    };
    let name = match validate_profile_name(&body.name) {
        Ok(name) => name.to_string(),
        Err(e) => return failure(StatusCode::BAD_REQUEST, &e.to_string()),
    };

    let backend = state.backend.as_ref();
    let profile = match users::get_user_profile(backend, session, &viewer.user_id).await {
        Outcome::Success(profile) => profile,
        Outcome::Failure(message) => return failure(StatusCode::BAD_REQUEST, &message),
    };
    let outcome = users::update_user_profile(backend, session, &profile.id, &UpdateProfileRequest { name }).await;

    let claim = match &outcome {
        Outcome::Success(updated) => viewer::issue_claim_cookie(
            state,
            session,
            &updated.user_id,
            &updated.name,
            updated.role,
            Utc::now().timestamp(),
        ),
        Outcome::Failure(_) => None,
    };
    let mut response = reply(outcome)?;
    if let Some(cookie) = claim {
        append_cookie(&mut response, &cookie)?;
    }
    Ok(response)
}

async fn update_password(event: &Request, state: &AppState, session: &SessionToken) -> Result<Response<Body>, Error> {
    let Some(body) = read_payload::<UpdatePasswordRequest>(event) else {
        return failure(StatusCode::BAD_REQUEST, BAD_BODY);
    };
    if let Err(e) = validate_password_change(&body) {
        return failure(StatusCode::BAD_REQUEST, &e.to_string());
    }
    reply(auth::update_password(state.backend.as_ref(), session, &body.old_password, &body.new_password).await)
}

// ========== ACTIVITIES ==========
async fn list_activities(
    event: &Request,
    state: &AppState,
    session: &SessionToken,
    viewer: &Viewer,
) -> Result<Response<Body>, Error> {
    let backend = state.backend.as_ref();
    let limit = numeric_param(event, "limit", DEFAULT_LIST_LIMIT);

    let target = match (viewer.role, query_param(event, "userId")) {
        (_, Some(user_id)) => Some(user_id),
        (Role::Intern, None) => Some(viewer.user_id.clone()),
        (Role::Manager, None) => None,
    };
    let outcome = match target {
        Some(user_id) => {
            if !roles::can_access_user_data(&viewer.user_id, &user_id, viewer.role) {
                return failure(StatusCode::FORBIDDEN, NO_PERMISSION);
            }
            activities::get_activity_by_user(backend, session, &user_id, limit).await
        }
        None => {
            let offset = numeric_param(event, "offset", 0);
            activities::list_all_activities(backend, session, limit, offset).await
        }
    };
    reply(outcome)
}

async fn create_activity(
    event: &Request,
    state: &AppState,
    session: &SessionToken,
    viewer: &Viewer,
) -> Result<Response<Body>, Error> {
    let Some(body) = read_payload::<CreateActivityRequest>(event) else {
        return failure(StatusCode::BAD_REQUEST, BAD_BODY);
    };
    let activity = match body.into_new_activity(&viewer.user_id, &viewer.name) {
        Ok(activity) => activity,
        Err(message) => return failure(StatusCode::BAD_REQUEST, message),
    };
    reply(activities::create_activity(state.backend.as_ref(), session, &activity).await)
}

/// Blank description or date would erase required fields
fn checked_changes(mut changes: UpdateActivityRequest) -> Option<UpdateActivityRequest> {
    let blank = |field: &Option<String>| field.as_deref().map(|v| v.trim().is_empty()).unwrap_or(false);
    if blank(&changes.description) || blank(&changes.date) {
        return None;
    }
    changes.date = changes.date.map(|d| normalize_date(d.trim()));
    Some(changes)
}

async fn activity_by_id(
    event: &Request,
    state: &AppState,
    session: &SessionToken,
    viewer: &Viewer,
    method: &Method,
    activity_id: &str,
) -> Result<Response<Body>, Error> {
    let backend = state.backend.as_ref();
    let activity = match activities::get_activity(backend, session, activity_id).await {
        Outcome::Success(activity) => activity,
        Outcome::Failure(message) => return failure(StatusCode::NOT_FOUND, &message),
    };
    if !roles::can_access_user_data(&viewer.user_id, &activity.user_id, viewer.role) {
        tracing::info!("User {} denied access to activity {}", viewer.user_id, activity_id);
        return failure(StatusCode::FORBIDDEN, NO_PERMISSION);
    }

    match *method {
        Method::GET => reply(Outcome::Success(activity)),
        Method::PATCH => {
            let Some(body) = read_payload::<UpdateActivityRequest>(event) else {
                return failure(StatusCode::BAD_REQUEST, BAD_BODY);
            };
            let Some(changes) = checked_changes(body) else {
                return failure(StatusCode::BAD_REQUEST, MISSING_FIELDS);
            };
            reply(activities::update_activity(backend, session, activity_id, &changes).await)
        }
        Method::DELETE => reply(activities::delete_activity(backend, session, activity_id).await),
        _ => failure(StatusCode::METHOD_NOT_ALLOWED, "Desteklenmeyen yöntem"),
    }
}

// ========== STATS ==========
async fn get_stats(state: &AppState, session: &SessionToken, viewer: &Viewer) -> Result<Response<Body>, Error> {
    if !roles::require_manager(viewer.role.as_str()) {
        return failure(StatusCode::FORBIDDEN, NO_PERMISSION);
    }
    let dashboard = stats::dashboard_stats(
        state.backend.as_ref(),
        session,
        Local::now(),
        state.config.stats_scan_limit,
    )
    .await;
    json_response(StatusCode::OK, &Outcome::Success(dashboard))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_handler::function_handler;
    use crate::http_handler::tests::{body_text, get, seed_user, send, test_state};
    use serde_json::{json, Value};
    use staj_shared::backend::Collection;
    use std::collections::HashMap;

    const JSON: &str = "application/json";

    fn body_json(response: &Response<Body>) -> Value {
        serde_json::from_str(&body_text(response)).unwrap()
    }

    #[tokio::test]
    async fn test_me_returns_identity() {
        let (backend, state) = test_state();
        let (id, token) = seed_user(&backend, "Ayşe", "ayse@example.com", "stajyer");

        let response = function_handler(get("/api/me", Some(&token)), state).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(&response);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["$id"], id.as_str());
    }

    #[tokio::test]
    async fn test_missing_session_is_401_json() {
        let (_, state) = test_state();
        let response = function_handler(get("/api/activities", None), state).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(&response), json!({"success": false, "error": "Oturum bulunamadı"}));
    }

    #[tokio::test]
    async fn test_create_and_list_own_activities() {
        let (backend, state) = test_state();
        let (id, token) = seed_user(&backend, "Ayşe", "ayse@example.com", "stajyer");

        let create = send(
            "POST",
            "/api/activities",
            Some(&token),
            JSON,
            r#"{"category":"Backend","description":"API yazıldı","date":"2026-10-19T09:00:00.000Z"}"#,
        );
        let response = function_handler(create, state.clone()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(&response)["data"]["userId"], id.as_str());

        let response = function_handler(get("/api/activities", Some(&token)), state).await.unwrap();
        let body = body_json(&response);
        assert_eq!(body["data"]["total"], 1);
        assert_eq!(body["data"]["documents"][0]["userName"], "Ayşe");
    }

    #[tokio::test]
    async fn test_create_without_description_is_400() {
        let (backend, state) = test_state();
        let (_, token) = seed_user(&backend, "Ayşe", "ayse@example.com", "stajyer");

        let create = send("POST", "/api/activities", Some(&token), JSON, r#"{"date":"2026-10-19"}"#);
        let response = function_handler(create, state).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(&response)["error"], "Açıklama ve tarih zorunludur");
    }

    #[tokio::test]
    async fn test_intern_cannot_touch_other_activity() {
        let (backend, state) = test_state();
        let (_, token) = seed_user(&backend, "Ayşe", "ayse@example.com", "stajyer");
        let other = backend.seed_document(
            Collection::Activities,
            json!({"userId": "u2", "description": "x", "date": "2026-10-19T09:00:00.000Z"}),
        );
        let path = format!("/api/activities/{}", other["$id"].as_str().unwrap());

        let read = function_handler(get(&path, Some(&token)), state.clone()).await.unwrap();
        assert_eq!(read.status(), StatusCode::FORBIDDEN);
        let delete = function_handler(send("DELETE", &path, Some(&token), JSON, ""), state.clone())
            .await
            .unwrap();
        assert_eq!(delete.status(), StatusCode::FORBIDDEN);
        assert_eq!(backend.documents(Collection::Activities).len(), 1);

        let listing = get("/api/activities", Some(&token))
            .with_query_string_parameters(HashMap::from([("userId".to_string(), "u2".to_string())]));
        let response = function_handler(listing, state).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_owner_updates_and_deletes_activity() {
        let (backend, state) = test_state();
        let (id, token) = seed_user(&backend, "Ayşe", "ayse@example.com", "stajyer");
        let own = backend.seed_document(
            Collection::Activities,
            json!({"userId": id, "description": "ilk", "date": "2026-10-19T09:00:00.000Z"}),
        );
        let path = format!("/api/activities/{}", own["$id"].as_str().unwrap());

        let blank = send("PATCH", &path, Some(&token), JSON, r#"{"description":"  "}"#);
        assert_eq!(function_handler(blank, state.clone()).await.unwrap().status(), StatusCode::BAD_REQUEST);

        let patch = send("PATCH", &path, Some(&token), JSON, r#"{"description":"güncel"}"#);
        let response = function_handler(patch, state.clone()).await.unwrap();
        assert_eq!(body_json(&response)["data"]["description"], "güncel");

        let delete = function_handler(send("DELETE", &path, Some(&token), JSON, ""), state)
            .await
            .unwrap();
        assert_eq!(delete.status(), StatusCode::OK);
        assert!(backend.documents(Collection::Activities).is_empty());
    }

    #[tokio::test]
    async fn test_stats_for_managers_only() {
        let (backend, state) = test_state();
        let (_, intern) = seed_user(&backend, "Ayşe", "ayse@example.com", "stajyer");
        let (_, manager) = seed_user(&backend, "Mert", "mert@example.com", "yonetici");

        let denied = function_handler(get("/api/stats", Some(&intern)), state.clone()).await.unwrap();
        assert_eq!(denied.status(), StatusCode::FORBIDDEN);

        let response = function_handler(get("/api/stats", Some(&manager)), state).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(&response);
        assert_eq!(body["data"]["total_interns"], 1);
        assert_eq!(body["data"]["truncated"], false);
    }

    #[tokio::test]
    async fn test_short_password_is_rejected_without_call() {
        let (backend, state) = test_state();
        let (_, token) = seed_user(&backend, "Ayşe", "ayse@example.com", "stajyer");
        let request = send(
            "PATCH",
            "/api/password",
            Some(&token),
            JSON,
            r#"{"old_password":"password123","new_password":"short1","confirm_password":"short1"}"#,
        );
        let before = backend.call_count();
        let response = function_handler(request, state).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(&response)["error"], "Yeni şifre en az 8 karakter olmalıdır");
        // Viewer lookup (identity + profile) only
        assert_eq!(backend.call_count(), before + 2);
    }

    #[tokio::test]
    async fn test_profile_name_update() {
        let (backend, state) = test_state();
        let (_, token) = seed_user(&backend, "Ayşe", "ayse@example.com", "stajyer");

        let short = send("PATCH", "/api/profile", Some(&token), JSON, r#"{"name":"A"}"#);
        let response = function_handler(short, state.clone()).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(&response)["error"], "İsim en az 2 karakter olmalıdır");

        let ok = send("PATCH", "/api/profile", Some(&token), JSON, r#"{"name":"Al"}"#);
        let response = function_handler(ok, state).await.unwrap();
        assert_eq!(body_json(&response)["data"]["name"], "Al");
    }
}
