//! Server-rendered pages.

use askama::Template;
use chrono::{DateTime, Local, Utc};
use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, RequestExt, Response,
};
use serde::Deserialize;
use staj_shared::activities::{self, DEFAULT_LIST_LIMIT};
use staj_shared::auth::{self, UpdatePasswordRequest};
use staj_shared::backend::SessionToken;
use staj_shared::claims::ROLE_COOKIE;
use staj_shared::gate::{self, LANDING_PAGE, LOGIN_PAGE};
use staj_shared::outcome::Outcome;
use staj_shared::roles::{self, Role};
use staj_shared::settings::{FormState, LoadError, SettingsPage, ToastKind};
use staj_shared::stats::{self, UNCATEGORIZED, UNKNOWN_USER};
use staj_shared::types::{Activity, CreateActivityRequest, DocumentList, Session, UserProfile};
use staj_shared::{cookies, users, AppState};

use crate::http_handler::{append_cookie, html_response, read_payload, redirect};
use crate::viewer::{self, Viewer, ViewerError};

const DEFAULT_SESSION_MAX_AGE: i64 = 365 * 24 * 60 * 60;
const NO_ACCESS: &str = "Bu sayfayı görüntüleme yetkiniz yok";
const LOAD_FAILED: &str = "Profil bilgileri yüklenemedi";

// ========== TEMPLATES ==========
#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    error: String,
    email: String,
    redirect: String,
}

#[derive(Template)]
#[template(path = "register.html")]
struct RegisterTemplate {
    error: String,
    name: String,
    email: String,
}

struct ActivityRow {
    id: String,
    owner_id: String,
    owner_name: String,
    category: String,
    description: String,
    date: String,
}

#[derive(Template)]
#[template(path = "activities.html")]
struct ActivitiesTemplate {
    is_manager: bool,
    viewer_name: String,
    error: String,
    rows: Vec<ActivityRow>,
}

#[derive(Template)]
#[template(path = "activity_new.html")]
struct ActivityNewTemplate {
    is_manager: bool,
    error: String,
    category: String,
    description: String,
    date: String,
}

struct CategoryRow {
    name: String,
    count: u64,
}

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    is_manager: bool,
    total_interns: String,
    today_active_interns: String,
    total_activities: String,
    most_active_id: String,
    most_active_name: String,
    most_active_count: u64,
    categories: Vec<CategoryRow>,
    truncated: bool,
    scan_limit: usize,
}

#[derive(Template)]
#[template(path = "student.html")]
struct StudentTemplate {
    is_manager: bool,
    name: String,
    email: String,
    initials: String,
    role_label: String,
    error: String,
    rows: Vec<ActivityRow>,
}

#[derive(Template)]
#[template(path = "settings.html")]
struct SettingsTemplate {
    is_manager: bool,
    loaded: bool,
    name: String,
    email: String,
    initials: String,
    role_label: String,
    toast_kind: String,
    toast_message: String,
    profile_error: String,
    password_error: String,
    old_password: String,
    new_password: String,
    confirm_password: String,
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate {
    title: String,
    message: String,
}

// ========== FORMS ==========
#[derive(Deserialize)]
struct LoginForm {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    redirect: String,
}

#[derive(Deserialize)]
struct RegisterForm {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
struct SettingsForm {
    #[serde(default)]
    form: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    old_password: String,
    #[serde(default)]
    new_password: String,
    #[serde(default)]
    confirm_password: String,
}

/// Page routes. The session gate has already run.
pub(crate) async fn handle(
    event: &Request,
    state: &AppState,
    session: Option<SessionToken>,
    method: &Method,
    path: &str,
) -> Result<Response<Body>, Error> {
    match (method, path) {
        (&Method::GET, "/") => redirect(LANDING_PAGE, &[]),
        (&Method::GET, "/login") => {
            let redirect_to = event
                .query_string_parameters_ref()
                .and_then(|params| params.first("redirect"))
                .unwrap_or_default()
                .to_string();
            render(
                StatusCode::OK,
                &LoginTemplate {
                    error: String::new(),
                    email: String::new(),
                    redirect: redirect_to,
                },
            )
        }
        (&Method::POST, "/login") => login_submit(event, state).await,
        (&Method::GET, "/register") => render(
            StatusCode::OK,
            &RegisterTemplate {
                error: String::new(),
                name: String::new(),
                email: String::new(),
            },
        ),
        (&Method::POST, "/register") => register_submit(event, state).await,
        (&Method::POST, "/logout") => logout_submit(state, session).await,
        _ => protected(event, state, session, method, path).await,
    }
}

async fn protected(
    event: &Request,
    state: &AppState,
    session: Option<SessionToken>,
    method: &Method,
    path: &str,
) -> Result<Response<Body>, Error> {
    // Only pages listed in the permission table are served
    if roles::page_permissions(path).is_none() {
        return error_page(StatusCode::NOT_FOUND, "Sayfa bulunamadı", "Aradığınız sayfa mevcut değil");
    }
    let Some(session) = session else {
        return redirect(&gate::login_redirect(path), &[]);
    };

    let viewer = match viewer::resolve(event, state, &session).await {
        Ok(viewer) => viewer,
        Err(ViewerError::Unauthenticated) => return signed_out(state, path),
        // Settings reports any load failure through its own toast
        Err(ViewerError::NoProfile(_)) if path == "/settings" => {
            return render(StatusCode::OK, &settings_unavailable())
        }
        Err(ViewerError::NoProfile(message)) => {
            return error_page(StatusCode::FORBIDDEN, "Profil bulunamadı", &message)
        }
    };
    if !roles::can_access_page(viewer.role, path) {
        tracing::info!("Page {} denied for role {}", path, viewer.role);
        return error_page(StatusCode::FORBIDDEN, "Erişim engellendi", NO_ACCESS);
    }

    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let mut response = match (method, parts.as_slice()) {
        (&Method::GET, ["activities"]) => activities_page(state, &session, &viewer).await?,
        (&Method::GET, ["activities", "new"]) => render(
            StatusCode::OK,
            &ActivityNewTemplate {
                is_manager: viewer.role == Role::Manager,
                error: String::new(),
                category: String::new(),
                description: String::new(),
                date: Local::now().format("%Y-%m-%d").to_string(),
            },
        )?,
        (&Method::POST, ["activities", "new"]) => new_activity_submit(event, state, &session, &viewer).await?,
        (&Method::GET, ["dashboard"]) => dashboard_page(state, &session).await?,
        (&Method::GET, ["students", student_id]) => student_page(state, &session, &viewer, student_id).await?,
        (&Method::GET, ["settings"]) => settings_get(state, &session).await?,
        (&Method::POST, ["settings"]) => settings_submit(event, state, &session).await?,
        _ => error_page(StatusCode::METHOD_NOT_ALLOWED, "Geçersiz istek", "Bu işlem desteklenmiyor")?,
    };

    if let Some(cookie) = &viewer.refreshed_claim {
        append_cookie(&mut response, cookie)?;
    }
    Ok(response)
}

// ========== AUTH ==========
async fn login_submit(event: &Request, state: &AppState) -> Result<Response<Body>, Error> {
    let Some(form) = read_payload::<LoginForm>(event) else {
        return error_page(StatusCode::BAD_REQUEST, "Geçersiz istek", "Form okunamadı");
    };

    match auth::login(state.backend.as_ref(), &form.email, &form.password).await {
        Outcome::Success(session) => {
            let token = SessionToken::new(session.secret.clone());
            let profile = users::get_user_profile(state.backend.as_ref(), &token, &session.user_id)
                .await
                .data();
            let destination = gate::return_destination(Some(form.redirect.as_str()));
            redirect(destination, &session_cookies(state, &session, profile.as_ref()))
        }
        Outcome::Failure(error) => render(
            StatusCode::UNAUTHORIZED,
            &LoginTemplate {
                error,
                email: form.email,
                redirect: form.redirect,
            },
        ),
    }
}

async fn register_submit(event: &Request, state: &AppState) -> Result<Response<Body>, Error> {
    let Some(form) = read_payload::<RegisterForm>(event) else {
        return error_page(StatusCode::BAD_REQUEST, "Geçersiz istek", "Form okunamadı");
    };

    match auth::register(state.backend.as_ref(), &form.email, &form.password, &form.name).await {
        Outcome::Success(registration) => redirect(
            LANDING_PAGE,
            &session_cookies(state, &registration.session, Some(&registration.profile)),
        ),
        Outcome::Failure(error) => render(
            StatusCode::BAD_REQUEST,
            &RegisterTemplate {
                error,
                name: form.name,
                email: form.email,
            },
        ),
    }
}

async fn logout_submit(state: &AppState, session: Option<SessionToken>) -> Result<Response<Body>, Error> {
    if let Some(session) = session {
        if let Outcome::Failure(e) = auth::logout(state.backend.as_ref(), &session).await {
            tracing::warn!("Logout continuing after platform error: {}", e);
        }
    }
    redirect(LOGIN_PAGE, &clear_cookies(state))
}

/// Session cookie plus, when the profile is known, a signed role claim
fn session_cookies(state: &AppState, session: &Session, profile: Option<&UserProfile>) -> Vec<String> {
    let secure = state.config.secure_cookies;
    let max_age = session_max_age(&session.expire, Utc::now());
    let mut set = vec![cookies::format_cookie(
        &state.config.session_cookie_name(),
        &session.secret,
        max_age,
        secure,
    )];

    let token = SessionToken::new(session.secret.clone());
    let claim = profile.and_then(|p| {
        viewer::issue_claim_cookie(state, &token, &p.user_id, &p.name, p.role, Utc::now().timestamp())
    });
    match claim {
        Some(cookie) => set.push(cookie),
        None => set.push(cookies::clear_cookie(ROLE_COOKIE, secure)),
    }
    set
}

fn clear_cookies(state: &AppState) -> Vec<String> {
    let secure = state.config.secure_cookies;
    vec![
        cookies::clear_cookie(&state.config.session_cookie_name(), secure),
        cookies::clear_cookie(ROLE_COOKIE, secure),
    ]
}

/// Seconds until the platform session expires
fn session_max_age(expire: &str, now: DateTime<Utc>) -> i64 {
    DateTime::parse_from_rfc3339(expire)
        .map(|at| (at.with_timezone(&Utc) - now).num_seconds())
        .ok()
        .filter(|seconds| *seconds > 0)
        .unwrap_or(DEFAULT_SESSION_MAX_AGE)
}

/// Session rejected by the platform: drop both cookies and go to login
fn signed_out(state: &AppState, path: &str) -> Result<Response<Body>, Error> {
    redirect(&gate::login_redirect(path), &clear_cookies(state))
}

// ========== ACTIVITIES ==========
fn activity_row(activity: Activity) -> ActivityRow {
    ActivityRow {
        id: activity.id,
        owner_id: activity.user_id,
        owner_name: activity
            .user_name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| UNKNOWN_USER.to_string()),
        category: activity
            .category
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| UNCATEGORIZED.to_string()),
        description: activity.description,
        date: date_label(&activity.date),
    }
}

fn date_label(date: &str) -> String {
    DateTime::parse_from_rfc3339(date)
        .map(|d| d.with_timezone(&Local).format("%d.%m.%Y").to_string())
        .unwrap_or_else(|_| date.to_string())
}

fn rows_or_error(outcome: Outcome<DocumentList<Activity>>) -> (Vec<ActivityRow>, String) {
    match outcome {
        Outcome::Success(list) => (list.documents.into_iter().map(activity_row).collect(), String::new()),
        Outcome::Failure(error) => (Vec::new(), error),
    }
}

async fn activities_page(state: &AppState, session: &SessionToken, viewer: &Viewer) -> Result<Response<Body>, Error> {
    let backend = state.backend.as_ref();
    let outcome = match viewer.role {
        Role::Manager => activities::list_all_activities(backend, session, DEFAULT_LIST_LIMIT, 0).await,
        Role::Intern => activities::get_activity_by_user(backend, session, &viewer.user_id, DEFAULT_LIST_LIMIT).await,
    };
    let (rows, error) = rows_or_error(outcome);
    render(
        StatusCode::OK,
        &ActivitiesTemplate {
            is_manager: viewer.role == Role::Manager,
            viewer_name: viewer.name.clone(),
            error,
            rows,
        },
    )
}

async fn new_activity_submit(
    event: &Request,
    state: &AppState,
    session: &SessionToken,
    viewer: &Viewer,
) -> Result<Response<Body>, Error> {
    let Some(form) = read_payload::<CreateActivityRequest>(event) else {
        return error_page(StatusCode::BAD_REQUEST, "Geçersiz istek", "Form okunamadı");
    };
    let echo = |error: String, form: &CreateActivityRequest| ActivityNewTemplate {
        is_manager: viewer.role == Role::Manager,
        error,
        category: form.category.clone(),
        description: form.description.clone(),
        date: form.date.clone(),
    };

    let activity = match form.clone().into_new_activity(&viewer.user_id, &viewer.name) {
        Ok(activity) => activity,
        Err(message) => return render(StatusCode::BAD_REQUEST, &echo(message.to_string(), &form)),
    };
    match activities::create_activity(state.backend.as_ref(), session, &activity).await {
        Outcome::Success(created) => {
            tracing::info!("Activity {} created by {}", created.id, viewer.user_id);
            redirect("/activities", &[])
        }
        Outcome::Failure(error) => render(StatusCode::OK, &echo(error, &form)),
    }
}

// ========== MANAGER PAGES ==========
fn figure(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

async fn dashboard_page(state: &AppState, session: &SessionToken) -> Result<Response<Body>, Error> {
    let scan_limit = state.config.stats_scan_limit;
    let stats = stats::dashboard_stats(state.backend.as_ref(), session, Local::now(), scan_limit).await;

    let most_active = stats
        .most_active_intern
        .unwrap_or_else(|| stats::most_active_intern(&[]));
    let categories = stats
        .category_distribution
        .unwrap_or_default()
        .into_iter()
        .map(|(name, count)| CategoryRow { name, count })
        .collect();

    render(
        StatusCode::OK,
        &DashboardTemplate {
            is_manager: true,
            total_interns: figure(stats.total_interns),
            today_active_interns: figure(stats.today_active_interns),
            total_activities: figure(stats.total_activities),
            most_active_id: most_active.user_id,
            most_active_name: most_active.user_name,
            most_active_count: most_active.count,
            categories,
            truncated: stats.truncated,
            scan_limit,
        },
    )
}

async fn student_page(
    state: &AppState,
    session: &SessionToken,
    viewer: &Viewer,
    student_id: &str,
) -> Result<Response<Body>, Error> {
    if !roles::can_access_user_data(&viewer.user_id, student_id, viewer.role) {
        return error_page(StatusCode::FORBIDDEN, "Erişim engellendi", NO_ACCESS);
    }
    let backend = state.backend.as_ref();
    let profile = match users::get_user_profile(backend, session, student_id).await {
        Outcome::Success(profile) => profile,
        Outcome::Failure(message) => return error_page(StatusCode::NOT_FOUND, "Stajyer bulunamadı", &message),
    };
    let (rows, error) =
        rows_or_error(activities::get_activity_by_user(backend, session, student_id, DEFAULT_LIST_LIMIT).await);

    render(
        StatusCode::OK,
        &StudentTemplate {
            is_manager: viewer.role == Role::Manager,
            initials: staj_shared::settings::initials(&profile.name),
            role_label: profile.role.label().to_string(),
            name: profile.name,
            email: profile.email,
            error,
            rows,
        },
    )
}

// ========== SETTINGS ==========
fn settings_template(page: &SettingsPage) -> SettingsTemplate {
    let form_error = |state: &FormState| match state {
        FormState::Error(message) => message.clone(),
        _ => String::new(),
    };
    let (toast_kind, toast_message) = match &page.toast {
        Some(toast) => (
            match toast.kind {
                ToastKind::Success => "success",
                ToastKind::Error => "error",
            },
            toast.message.clone(),
        ),
        None => ("", String::new()),
    };

    SettingsTemplate {
        is_manager: page.profile.role == Role::Manager,
        loaded: true,
        name: page.name.clone(),
        email: page.profile.email.clone(),
        initials: page.initials(),
        role_label: page.role_label().to_string(),
        toast_kind: toast_kind.to_string(),
        toast_message,
        profile_error: form_error(&page.profile_state),
        password_error: form_error(&page.password_state),
        old_password: page.password.old_password.clone(),
        new_password: page.password.new_password.clone(),
        confirm_password: page.password.confirm_password.clone(),
    }
}

fn settings_unavailable() -> SettingsTemplate {
    SettingsTemplate {
        is_manager: false,
        loaded: false,
        name: String::new(),
        email: String::new(),
        initials: String::new(),
        role_label: String::new(),
        toast_kind: "error".to_string(),
        toast_message: LOAD_FAILED.to_string(),
        profile_error: String::new(),
        password_error: String::new(),
        old_password: String::new(),
        new_password: String::new(),
        confirm_password: String::new(),
    }
}

async fn load_settings(state: &AppState, session: &SessionToken) -> Result<SettingsPage, Result<Response<Body>, Error>> {
    match SettingsPage::load(state.backend.as_ref(), session).await {
        Ok(page) => Ok(page),
        Err(LoadError::Unauthenticated) => Err(signed_out(state, "/settings")),
        Err(LoadError::Failed) => Err(render(StatusCode::OK, &settings_unavailable())),
    }
}

async fn settings_get(state: &AppState, session: &SessionToken) -> Result<Response<Body>, Error> {
    match load_settings(state, session).await {
        Ok(page) => render(StatusCode::OK, &settings_template(&page)),
        Err(response) => response,
    }
}

async fn settings_submit(event: &Request, state: &AppState, session: &SessionToken) -> Result<Response<Body>, Error> {
    let Some(form) = read_payload::<SettingsForm>(event) else {
        return error_page(StatusCode::BAD_REQUEST, "Geçersiz istek", "Form okunamadı");
    };
    let mut page = match load_settings(state, session).await {
        Ok(page) => page,
        Err(response) => return response,
    };

    let backend = state.backend.as_ref();
    match form.form.as_str() {
        "profile" => page.submit_profile(backend, session, &form.name).await,
        "password" => {
            let fields = UpdatePasswordRequest {
                old_password: form.old_password,
                new_password: form.new_password,
                confirm_password: form.confirm_password,
            };
            page.submit_password(backend, session, fields).await
        }
        other => {
            tracing::warn!("Unknown settings form: {}", other);
            return error_page(StatusCode::BAD_REQUEST, "Geçersiz istek", "Bilinmeyen form");
        }
    }

    let mut response = render(StatusCode::OK, &settings_template(&page))?;
    // The role claim carries the display name
    if form.form == "profile" && page.profile_state == FormState::Success {
        let profile = &page.profile;
        let claim = viewer::issue_claim_cookie(state, session, &profile.user_id, &profile.name, profile.role, Utc::now().timestamp());
        if let Some(cookie) = claim {
            append_cookie(&mut response, &cookie)?;
        }
    }
    Ok(response)
}

// ========== HELPERS ==========
fn render<T: Template>(status: StatusCode, template: &T) -> Result<Response<Body>, Error> {
    html_response(status, template.render()?)
}

fn error_page(status: StatusCode, title: &str, message: &str) -> Result<Response<Body>, Error> {
    render(
        status,
        &ErrorTemplate {
            title: title.to_string(),
            message: message.to_string(),
        },
    )
}
