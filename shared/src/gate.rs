//! Routing-level session gate.
//!
//! Only looks at whether a session cookie is present. Identity and role
//! checks happen later, against the backend and the signed role claim.

/// Pages reachable without a session
pub const PUBLIC_ROUTES: &[&str] = &["/login", "/register"];
pub const LOGIN_PAGE: &str = "/login";
/// Where authenticated users land
pub const LANDING_PAGE: &str = "/activities";

/// Paths the gate never touches (API routes answer 401 themselves)
const UNGATED_PREFIXES: &[&str] = &["/api", "/static", "/favicon.ico", "/public"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Pass,
    Redirect(String),
}

pub fn is_public_path(path: &str) -> bool {
    PUBLIC_ROUTES.iter().any(|route| path.starts_with(route))
}

fn has_prefix_segment(path: &str, prefix: &str) -> bool {
    path == prefix || path.starts_with(&format!("{}/", prefix))
}

pub fn is_gated(path: &str) -> bool {
    !UNGATED_PREFIXES.iter().any(|prefix| has_prefix_segment(path, prefix))
}

pub fn check(path: &str, has_session_cookie: bool) -> GateDecision {
    if !is_gated(path) {
        return GateDecision::Pass;
    }
    let public = is_public_path(path);

    if !has_session_cookie && !public && path != "/" {
        return GateDecision::Redirect(login_redirect(path));
    }
    if has_session_cookie && public {
        return GateDecision::Redirect(LANDING_PAGE.to_string());
    }
    GateDecision::Pass
}

/// `/login?redirect=<path>`
pub fn login_redirect(path: &str) -> String {
    format!("{}?redirect={}", LOGIN_PAGE, encode_query_value(path))
}

/// Post-login destination: a local path from the query, else the landing page.
pub fn return_destination(redirect: Option<&str>) -> &str {
    match redirect {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !is_public_path(path) => path,
        _ => LANDING_PAGE,
    }
}

/// Percent-encode a query value, keeping `/` readable
fn encode_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => out.push(byte as char),
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}
