use lambda_http::{
    http::{header, HeaderValue, StatusCode},
    Body, Error, Request, RequestPayloadExt, Response,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use staj_shared::backend::SessionToken;
use staj_shared::gate::{self, GateDecision};
use staj_shared::{cookies, AppState};
use std::sync::Arc;

use crate::{api, pages};

/// Main Lambda handler - gates pages, then routes to the JSON API or a page
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let method = event.method().clone();
    let path = event.uri().path().to_string();
    tracing::info!("Request - Method: {} Path: {}", method, path);

    let session = session_token(&event, &state);

    if let GateDecision::Redirect(location) = gate::check(&path, session.is_some()) {
        tracing::info!("Gate redirect {} -> {}", path, location);
        return redirect(&location, &[]);
    }

    if path == "/api" || path.starts_with("/api/") {
        return api::handle(&event, &state, session, &method, &path).await;
    }
    pages::handle(&event, &state, session, &method, &path).await
}

/// Value of a request cookie, looking through every `Cookie` header
pub(crate) fn request_cookie(event: &Request, name: &str) -> Option<String> {
    event
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|h| cookies::cookie_value(h, name))
        .map(|v| v.to_string())
}

pub(crate) fn session_token(event: &Request, state: &AppState) -> Option<SessionToken> {
    request_cookie(event, &state.config.session_cookie_name()).map(SessionToken::new)
}

/// Form or JSON body, by Content-Type; `None` when absent or malformed
pub(crate) fn read_payload<T: DeserializeOwned>(event: &Request) -> Option<T> {
    match event.payload::<T>() {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("Payload decode error: {}", e);
            None
        }
    }
}

pub(crate) fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(serde_json::to_string(value)?.into())
        .map_err(Box::new)?)
}

pub(crate) fn html_response(status: StatusCode, html: String) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "text/html; charset=utf-8")
        .body(html.into())
        .map_err(Box::new)?)
}

/// 303 to `location`, setting each of `set_cookies`
pub(crate) fn redirect(location: &str, set_cookies: &[String]) -> Result<Response<Body>, Error> {
    let mut builder = Response::builder()
        .status(StatusCode::SEE_OTHER)
        .header("Location", location);
    for cookie in set_cookies {
        builder = builder.header("Set-Cookie", cookie.as_str());
    }
    Ok(builder.body(Body::Empty).map_err(Box::new)?)
}

pub(crate) fn append_cookie(response: &mut Response<Body>, cookie: &str) -> Result<(), Error> {
    response
        .headers_mut()
        .append(header::SET_COOKIE, HeaderValue::from_str(cookie)?);
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use staj_shared::backend::memory::MemoryBackend;
    use staj_shared::backend::Collection;
    use staj_shared::config::Config;
    use serde_json::json;
    use std::collections::HashMap;

    pub(crate) fn test_state() -> (Arc<MemoryBackend>, Arc<AppState>) {
        let env = HashMap::from([
            ("APPWRITE_PROJECT_ID", "staj"),
            ("APPWRITE_DATABASE_ID", "main"),
            ("APPWRITE_ACTIVITIES_COLLECTION_ID", "activities"),
            ("APPWRITE_USERS_COLLECTION_ID", "users"),
            ("SESSION_SIGNING_KEY", "test-signing-key"),
            ("SECURE_COOKIES", "false"),
        ]);
        let config = Config::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap();
        let backend = Arc::new(MemoryBackend::new());
        let state = AppState::new(backend.clone(), config);
        (backend, state)
    }

    /// Seed an identity with a profile and an open session; returns (user id, session secret)
    pub(crate) fn seed_user(backend: &MemoryBackend, name: &str, email: &str, role: &str) -> (String, SessionToken) {
        let id = backend.seed_identity(email, "password123", name);
        backend.seed_document(
            Collection::Users,
            json!({"$id": id, "userId": id, "name": name, "email": email, "role": role}),
        );
        let token = backend.seed_session(&id);
        (id, token)
    }

    pub(crate) fn get(path: &str, session: Option<&SessionToken>) -> Request {
        let mut builder = lambda_http::http::Request::builder().method("GET").uri(path);
        if let Some(token) = session {
            builder = builder.header("Cookie", format!("a_session_staj={}", token.expose()));
        }
        builder.body(Body::Empty).unwrap()
    }

    pub(crate) fn send(method: &str, path: &str, session: Option<&SessionToken>, content_type: &str, body: &str) -> Request {
        let mut builder = lambda_http::http::Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", content_type);
        if let Some(token) = session {
            builder = builder.header("Cookie", format!("a_session_staj={}", token.expose()));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    pub(crate) fn body_text(response: &Response<Body>) -> String {
        String::from_utf8_lossy(response.body()).to_string()
    }

    pub(crate) fn location(response: &Response<Body>) -> &str {
        response
            .headers()
            .get("Location")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }

    pub(crate) fn set_cookies(response: &Response<Body>) -> Vec<String> {
        response
            .headers()
            .get_all("Set-Cookie")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(|v| v.to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_gate_redirects_anonymous_page_request() {
        let (_, state) = test_state();
        let response = function_handler(get("/activities", None), state).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login?redirect=/activities");
    }

    #[tokio::test]
    async fn test_gate_sends_signed_in_user_away_from_login() {
        let (backend, state) = test_state();
        let (_, token) = seed_user(&backend, "Ayşe", "ayse@example.com", "stajyer");
        let response = function_handler(get("/login", Some(&token)), state).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/activities");
    }

    #[tokio::test]
    async fn test_api_is_not_redirected() {
        let (_, state) = test_state();
        let response = function_handler(get("/api/me", None), state).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_request_cookie_reads_all_headers() {
        let request = lambda_http::http::Request::builder()
            .uri("/")
            .header("Cookie", "theme=dark")
            .header("Cookie", "a_session_staj=abc; staj_role=x.y")
            .body(Body::Empty)
            .unwrap();
        assert_eq!(request_cookie(&request, "a_session_staj").as_deref(), Some("abc"));
        assert_eq!(request_cookie(&request, "staj_role").as_deref(), Some("x.y"));
        assert_eq!(request_cookie(&request, "missing"), None);
    }
}
