//! Settings page: profile name and password forms.
//!
//! Each form validates locally first and only reaches the backend with
//! acceptable input. Form state and the toast shown after a submission are
//! kept on the page value so the renderer can show them.

use crate::auth::{get_current_user, update_password, UpdatePasswordRequest};
use crate::backend::{Backend, SessionToken};
use crate::outcome::Outcome;
use crate::types::{Identity, UpdateProfileRequest, UserProfile};
use crate::users::{get_user_profile, update_user_profile};
use serde::Serialize;
use thiserror::Error;

pub const MIN_NAME_CHARS: usize = 2;
pub const MIN_PASSWORD_CHARS: usize = 8;

pub const PROFILE_UPDATED: &str = "Profil güncellendi";
pub const PASSWORD_UPDATED: &str = "Şifre güncellendi";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormState {
    Idle,
    Submitting,
    Success,
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
}

impl Toast {
    pub fn success(message: &str) -> Self {
        Self {
            kind: ToastKind::Success,
            message: message.to_string(),
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            kind: ToastKind::Error,
            message: message.to_string(),
        }
    }
}

/// Input rejected before any backend call
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("İsim en az 2 karakter olmalıdır")]
    NameTooShort,
    #[error("Tüm alanları doldurunuz")]
    MissingFields,
    #[error("Yeni şifre en az 8 karakter olmalıdır")]
    PasswordTooShort,
    #[error("Yeni şifreler eşleşmiyor")]
    PasswordMismatch,
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("no active session")]
    Unauthenticated,
    #[error("Profil bilgileri yüklenemedi")]
    Failed,
}

/// Trimmed name, at least two characters long
pub fn validate_profile_name(name: &str) -> Result<&str, ValidationError> {
    let name = name.trim();
    if name.chars().count() < MIN_NAME_CHARS {
        return Err(ValidationError::NameTooShort);
    }
    Ok(name)
}

pub fn validate_password_change(fields: &UpdatePasswordRequest) -> Result<(), ValidationError> {
    if fields.old_password.is_empty() || fields.new_password.is_empty() || fields.confirm_password.is_empty() {
        return Err(ValidationError::MissingFields);
    }
    if fields.new_password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(ValidationError::PasswordTooShort);
    }
    if fields.new_password != fields.confirm_password {
        return Err(ValidationError::PasswordMismatch);
    }
    Ok(())
}

/// First letter of up to two words, uppercased
pub fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .take(2)
        .flat_map(char::to_uppercase)
        .collect()
}

#[derive(Debug, Clone)]
pub struct SettingsPage {
    pub identity: Identity,
    pub profile: UserProfile,
    /// Value of the name field
    pub name: String,
    pub password: UpdatePasswordRequest,
    pub profile_state: FormState,
    pub password_state: FormState,
    pub toast: Option<Toast>,
}

impl SettingsPage {
    /// Resolve the signed-in identity and its profile.
    pub async fn load(backend: &dyn Backend, session: &SessionToken) -> Result<Self, LoadError> {
        let identity = match get_current_user(backend, session).await {
            Outcome::Success(identity) => identity,
            Outcome::Failure(_) => return Err(LoadError::Unauthenticated),
        };
        let profile = match get_user_profile(backend, session, &identity.id).await {
            Outcome::Success(profile) => profile,
            Outcome::Failure(message) => {
                tracing::warn!("Settings profile load failed for {}: {}", identity.id, message);
                return Err(LoadError::Failed);
            }
        };

        Ok(Self {
            name: profile.name.clone(),
            identity,
            profile,
            password: UpdatePasswordRequest::default(),
            profile_state: FormState::Idle,
            password_state: FormState::Idle,
            toast: None,
        })
    }

    pub fn initials(&self) -> String {
        initials(&self.profile.name)
    }

    pub fn role_label(&self) -> &'static str {
        self.profile.role.label()
    }

    fn fail(state: &mut FormState, toast: &mut Option<Toast>, message: &str) {
        *state = FormState::Error(message.to_string());
        *toast = Some(Toast::error(message));
    }

    pub async fn submit_profile(&mut self, backend: &dyn Backend, session: &SessionToken, name: &str) {
        if self.profile_state == FormState::Submitting {
            return;
        }
        self.name = name.to_string();
        let name = match validate_profile_name(name) {
            Ok(name) => name.to_string(),
            Err(e) => return Self::fail(&mut self.profile_state, &mut self.toast, &e.to_string()),
        };

        self.profile_state = FormState::Submitting;
        let update = UpdateProfileRequest { name };
        match update_user_profile(backend, session, &self.profile.id, &update).await {
            Outcome::Success(profile) => {
                self.name = profile.name.clone();
                self.profile = profile;
                self.profile_state = FormState::Success;
                self.toast = Some(Toast::success(PROFILE_UPDATED));
            }
            Outcome::Failure(message) => Self::fail(&mut self.profile_state, &mut self.toast, &message),
        }
    }

    /// Fields are cleared after a successful change and kept otherwise.
    pub async fn submit_password(
        &mut self,
        backend: &dyn Backend,
        session: &SessionToken,
        fields: UpdatePasswordRequest,
    ) {
        if self.password_state == FormState::Submitting {
            return;
        }
        self.password = fields;
        if let Err(e) = validate_password_change(&self.password) {
            return Self::fail(&mut self.password_state, &mut self.toast, &e.to_string());
        }

        self.password_state = FormState::Submitting;
        let outcome = update_password(
            backend,
            session,
            &self.password.old_password,
            &self.password.new_password,
        )
        .await;
        match outcome {
            Outcome::Success(_) => {
                self.password = UpdatePasswordRequest::default();
                self.password_state = FormState::Success;
                self.toast = Some(Toast::success(PASSWORD_UPDATED));
            }
            Outcome::Failure(message) => Self::fail(&mut self.password_state, &mut self.toast, &message),
        }
    }
}
