use crate::backend::{unique_id, Backend, Collection, SessionToken};
use crate::error::BackendError;
use crate::outcome::Outcome;
use crate::roles::Role;
use crate::types::{Identity, NewProfile, Session, UserProfile};
use serde::{Deserialize, Serialize};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePasswordRequest {
    #[serde(default)]
    pub old_password: String,
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Registration {
    pub user: Identity,
    pub profile: UserProfile,
    #[serde(skip)]
    pub session: Session,
}

/// Email/password login
pub async fn login(backend: &dyn Backend, email: &str, password: &str) -> Outcome<Session> {
    tracing::info!("Login attempt for {}", email);
    Outcome::settle(
        "Login",
        "Giriş başarısız",
        backend.create_session(email, password).await,
    )
}

/// Create identity, open a session and write the intern profile.
///
/// Each step undoes the previous ones when it fails, so a failed
/// registration leaves neither a profile-less identity nor a dangling session.
pub async fn register(backend: &dyn Backend, email: &str, password: &str, name: &str) -> Outcome<Registration> {
    Outcome::settle(
        "Register",
        "Kayıt başarısız",
        register_steps(backend, email, password, name).await,
    )
}

async fn register_steps(
    backend: &dyn Backend,
    email: &str,
    password: &str,
    name: &str,
) -> Result<Registration, BackendError> {
    let user = backend
        .create_identity(&unique_id(), email, password, name)
        .await?;
    tracing::info!("Identity {} created for {}", user.id, email);

    let session = match backend.create_session(email, password).await {
        Ok(session) => session,
        Err(e) => {
            undo_identity(backend, &user.id).await;
            return Err(e);
        }
    };
    let token = SessionToken::new(session.secret.clone());

    let new_profile = NewProfile {
        user_id: user.id.clone(),
        name: name.to_string(),
        email: email.to_string(),
        role: Role::Intern,
    };
    // Profile id mirrors the identity id so a second profile cannot be created
    let written = match serde_json::to_value(&new_profile) {
        Ok(data) => {
            backend
                .create_document(&token, Collection::Users, &user.id, data)
                .await
        }
        Err(e) => Err(e.into()),
    };
    let created = match written {
        Ok(doc) => doc,
        Err(e) => {
            if let Err(undo) = backend.delete_session(&token, "current").await {
                tracing::warn!("Register rollback: could not delete session for {}: {}", user.id, undo);
            }
            undo_identity(backend, &user.id).await;
            return Err(e);
        }
    };

    let profile: UserProfile = crate::backend::decode(created)?;
    Ok(Registration { user, profile, session })
}

async fn undo_identity(backend: &dyn Backend, user_id: &str) {
    match backend.delete_identity(user_id).await {
        Ok(()) => tracing::info!("Register rollback: identity {} removed", user_id),
        Err(e) => tracing::warn!("Register rollback: identity {} left behind: {}", user_id, e),
    }
}

pub async fn logout(backend: &dyn Backend, session: &SessionToken) -> Outcome<()> {
    Outcome::settle(
        "Logout",
        "Çıkış başarısız",
        backend.delete_session(session, "current").await,
    )
}

pub async fn get_current_user(backend: &dyn Backend, session: &SessionToken) -> Outcome<Identity> {
    Outcome::settle_quiet("Kullanıcı bulunamadı", backend.get_identity(session).await)
}

pub async fn update_password(
    backend: &dyn Backend,
    session: &SessionToken,
    old_password: &str,
    new_password: &str,
) -> Outcome<Identity> {
    Outcome::settle(
        "Update password",
        "Şifre güncellenemedi",
        backend.update_password(session, new_password, old_password).await,
    )
}
