use crate::error::BackendError;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Uniform result of every backend wrapper.
///
/// Serializes as `{"success": true, "data": ...}` or
/// `{"success": false, "error": "..."}`.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Success(T),
    Failure(String),
}

impl<T> Outcome<T> {
    /// Convert a backend result, logging failures under `context` and
    /// replacing messageless errors with `fallback`.
    pub(crate) fn settle(context: &str, fallback: &str, result: Result<T, BackendError>) -> Self {
        match result {
            Ok(data) => Outcome::Success(data),
            Err(e) => {
                tracing::error!("{} error: {}", context, e);
                Outcome::Failure(e.user_message().unwrap_or(fallback).to_string())
            }
        }
    }

    /// Like `settle` but without logging, for lookups where failure is routine.
    pub(crate) fn settle_quiet(fallback: &str, result: Result<T, BackendError>) -> Self {
        match result {
            Ok(data) => Outcome::Success(data),
            Err(e) => Outcome::Failure(e.user_message().unwrap_or(fallback).to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn data(self) -> Option<T> {
        match self {
            Outcome::Success(data) => Some(data),
            Outcome::Failure(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Outcome::Success(_) => None,
            Outcome::Failure(message) => Some(message),
        }
    }

    pub fn into_result(self) -> Result<T, String> {
        match self {
            Outcome::Success(data) => Ok(data),
            Outcome::Failure(message) => Err(message),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Success(data) => Outcome::Success(f(data)),
            Outcome::Failure(message) => Outcome::Failure(message),
        }
    }
}

impl<T: Serialize> Serialize for Outcome<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        match self {
            Outcome::Success(data) => {
                map.serialize_entry("success", &true)?;
                map.serialize_entry("data", data)?;
            }
            Outcome::Failure(message) => {
                map.serialize_entry("success", &false)?;
                map.serialize_entry("error", message)?;
            }
        }
        map.end()
    }
}
