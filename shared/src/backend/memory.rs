//! In-process backend used by tests and local runs.
//!
//! Keeps identities, sessions and documents in memory and evaluates the same
//! query primitives as the platform (including its default page size of 25).
//! Every trait call is counted and any operation can be made to fail once.

use super::{unique_id, Backend, Collection, Query, SessionToken};
use crate::error::BackendError;
use crate::types::{DocumentList, Identity, Session};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Mutex, MutexGuard};

const DEFAULT_LIMIT: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateIdentity,
    DeleteIdentity,
    CreateSession,
    DeleteSession,
    GetIdentity,
    UpdatePassword,
    CreateDocument,
    GetDocument,
    ListDocuments,
    UpdateDocument,
    DeleteDocument,
}

#[derive(Debug, Clone)]
struct StoredIdentity {
    id: String,
    email: String,
    password: String,
    name: String,
}

#[derive(Debug, Clone)]
struct StoredSession {
    id: String,
    user_id: String,
}

#[derive(Default)]
struct MemoryState {
    identities: Vec<StoredIdentity>,
    sessions: HashMap<String, StoredSession>,
    documents: HashMap<Collection, Vec<Value>>,
    failures: HashSet<Operation>,
}

#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    calls: AtomicUsize,
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn collection_name(collection: Collection) -> &'static str {
    match collection {
        Collection::Users => "users",
        Collection::Activities => "activities",
    }
}

fn unauthorized() -> BackendError {
    BackendError::platform(401, "general_unauthorized_scope", "User (role: guests) missing scope (account)")
}

fn document_not_found() -> BackendError {
    BackendError::platform(404, "document_not_found", "Document with the requested ID could not be found.")
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Count the call and apply any injected failure
    fn begin(&self, operation: Operation) -> Result<MutexGuard<'_, MemoryState>, BackendError> {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        let mut state = self.lock();
        if state.failures.remove(&operation) {
            return Err(BackendError::platform(
                500,
                "general_unknown",
                &format!("Injected failure for {:?}", operation),
            ));
        }
        Ok(state)
    }

    /// Number of backend calls made so far
    pub fn call_count(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    /// Make the next call of `operation` fail with a platform error
    pub fn fail_next(&self, operation: Operation) {
        self.lock().failures.insert(operation);
    }

    /// Register an identity directly; returns its id.
    pub fn seed_identity(&self, email: &str, password: &str, name: &str) -> String {
        let id = unique_id();
        self.lock().identities.push(StoredIdentity {
            id: id.clone(),
            email: email.to_string(),
            password: password.to_string(),
            name: name.to_string(),
        });
        id
    }

    /// Open a session for an identity without going through a call.
    pub fn seed_session(&self, user_id: &str) -> SessionToken {
        let secret = unique_id();
        self.lock().sessions.insert(
            secret.clone(),
            StoredSession {
                id: unique_id(),
                user_id: user_id.to_string(),
            },
        );
        SessionToken::new(secret)
    }

    /// Store a document directly, stamping platform metadata.
    pub fn seed_document(&self, collection: Collection, data: Value) -> Value {
        let id = data
            .get("$id")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(unique_id);
        let document = stamp(collection, &id, data);
        self.lock()
            .documents
            .entry(collection)
            .or_default()
            .push(document.clone());
        document
    }

    pub fn documents(&self, collection: Collection) -> Vec<Value> {
        self.lock().documents.get(&collection).cloned().unwrap_or_default()
    }

    pub fn identity_count(&self) -> usize {
        self.lock().identities.len()
    }

    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn password_of(&self, user_id: &str) -> Option<String> {
        self.lock()
            .identities
            .iter()
            .find(|i| i.id == user_id)
            .map(|i| i.password.clone())
    }
}

fn stamp(collection: Collection, id: &str, data: Value) -> Value {
    let mut document = match data {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let timestamp = now();
    document.insert("$id".to_string(), Value::String(id.to_string()));
    document.insert("$collectionId".to_string(), Value::String(collection_name(collection).to_string()));
    document.insert("$databaseId".to_string(), Value::String("memory".to_string()));
    document.insert("$createdAt".to_string(), Value::String(timestamp.clone()));
    document.insert("$updatedAt".to_string(), Value::String(timestamp));
    document.entry("$permissions").or_insert_with(|| Value::Array(vec![]));
    Value::Object(document)
}

fn session_user(state: &MemoryState, session: &SessionToken) -> Result<String, BackendError> {
    state
        .sessions
        .get(session.expose())
        .map(|s| s.user_id.clone())
        .ok_or_else(unauthorized)
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => {
            match (DateTime::parse_from_rfc3339(x), DateTime::parse_from_rfc3339(y)) {
                (Ok(x), Ok(y)) => Some(x.cmp(&y)),
                _ => Some(x.cmp(y)),
            }
        }
        _ => None,
    }
}

fn matches(document: &Value, query: &Query) -> bool {
    match query {
        Query::Equal(attribute, values) => document
            .get(attribute)
            .map(|actual| values.iter().any(|v| v == actual))
            .unwrap_or(false),
        Query::GreaterThanEqual(attribute, value) => document
            .get(attribute)
            .and_then(|actual| compare_values(actual, value))
            .map(|ord| ord != Ordering::Less)
            .unwrap_or(false),
        _ => true,
    }
}

fn compare_attribute(a: &Value, b: &Value, attribute: &str) -> Ordering {
    match (a.get(attribute), b.get(attribute)) {
        (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

fn run_queries(documents: &[Value], queries: &[Query]) -> DocumentList<Value> {
    let mut selected: Vec<Value> = documents
        .iter()
        .filter(|doc| queries.iter().all(|q| matches(doc, q)))
        .cloned()
        .collect();

    selected.sort_by(|a, b| {
        queries
            .iter()
            .filter_map(|q| match q {
                Query::OrderDesc(attr) => Some(compare_attribute(b, a, attr)),
                Query::OrderAsc(attr) => Some(compare_attribute(a, b, attr)),
                _ => None,
            })
            .find(|ord| *ord != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });

    let limit = queries
        .iter()
        .rev()
        .find_map(|q| match q {
            Query::Limit(n) => Some(*n as usize),
            _ => None,
        })
        .unwrap_or(DEFAULT_LIMIT);
    let offset = queries
        .iter()
        .rev()
        .find_map(|q| match q {
            Query::Offset(n) => Some(*n as usize),
            _ => None,
        })
        .unwrap_or(0);

    let total = selected.len() as u64;
    let documents = selected.into_iter().skip(offset).take(limit).collect();
    DocumentList { total, documents }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn create_identity(
        &self,
        user_id: &str,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<Identity, BackendError> {
        let mut state = self.begin(Operation::CreateIdentity)?;
        if state.identities.iter().any(|i| i.id == user_id || i.email == email) {
            return Err(BackendError::platform(
                409,
                "user_already_exists",
                "A user with the same id, email, or phone already exists in this project.",
            ));
        }
        if password.chars().count() < 8 {
            return Err(BackendError::platform(
                400,
                "general_argument_invalid",
                "Invalid `password` param: Password must be between 8 and 256 characters long.",
            ));
        }
        state.identities.push(StoredIdentity {
            id: user_id.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            name: name.to_string(),
        });
        Ok(Identity {
            id: user_id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
        })
    }

    async fn delete_identity(&self, user_id: &str) -> Result<(), BackendError> {
        let mut state = self.begin(Operation::DeleteIdentity)?;
        let before = state.identities.len();
        state.identities.retain(|i| i.id != user_id);
        if state.identities.len() == before {
            return Err(BackendError::platform(404, "user_not_found", "User with the requested ID could not be found."));
        }
        state.sessions.retain(|_, s| s.user_id != user_id);
        Ok(())
    }

    async fn create_session(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        let mut state = self.begin(Operation::CreateSession)?;
        let user_id = state
            .identities
            .iter()
            .find(|i| i.email == email && i.password == password)
            .map(|i| i.id.clone())
            .ok_or_else(|| {
                BackendError::platform(
                    401,
                    "user_invalid_credentials",
                    "Invalid credentials. Please check the email and password.",
                )
            })?;
        let secret = unique_id();
        let id = unique_id();
        state.sessions.insert(
            secret.clone(),
            StoredSession {
                id: id.clone(),
                user_id: user_id.clone(),
            },
        );
        Ok(Session {
            id,
            user_id,
            secret,
            expire: now(),
        })
    }

    async fn delete_session(&self, session: &SessionToken, session_id: &str) -> Result<(), BackendError> {
        let mut state = self.begin(Operation::DeleteSession)?;
        let user_id = session_user(&state, session)?;
        if session_id == "current" {
            state.sessions.remove(session.expose());
        } else {
            state
                .sessions
                .retain(|_, s| !(s.id == session_id && s.user_id == user_id));
        }
        Ok(())
    }

    async fn get_identity(&self, session: &SessionToken) -> Result<Identity, BackendError> {
        let state = self.begin(Operation::GetIdentity)?;
        let user_id = session_user(&state, session)?;
        state
            .identities
            .iter()
            .find(|i| i.id == user_id)
            .map(|i| Identity {
                id: i.id.clone(),
                name: i.name.clone(),
                email: i.email.clone(),
            })
            .ok_or_else(unauthorized)
    }

    async fn update_password(
        &self,
        session: &SessionToken,
        password: &str,
        old_password: &str,
    ) -> Result<Identity, BackendError> {
        let mut state = self.begin(Operation::UpdatePassword)?;
        let user_id = session_user(&state, session)?;
        let identity = state
            .identities
            .iter_mut()
            .find(|i| i.id == user_id)
            .ok_or_else(unauthorized)?;
        if identity.password != old_password {
            return Err(BackendError::platform(
                401,
                "user_invalid_credentials",
                "Invalid credentials. Please check the email and password.",
            ));
        }
        identity.password = password.to_string();
        Ok(Identity {
            id: identity.id.clone(),
            name: identity.name.clone(),
            email: identity.email.clone(),
        })
    }

    async fn create_document(
        &self,
        session: &SessionToken,
        collection: Collection,
        document_id: &str,
        data: Value,
    ) -> Result<Value, BackendError> {
        let mut state = self.begin(Operation::CreateDocument)?;
        session_user(&state, session)?;
        let documents = state.documents.entry(collection).or_default();
        if documents.iter().any(|d| d.get("$id").and_then(|v| v.as_str()) == Some(document_id)) {
            return Err(BackendError::platform(
                409,
                "document_already_exists",
                "Document with the requested ID already exists.",
            ));
        }
        let document = stamp(collection, document_id, data);
        documents.push(document.clone());
        Ok(document)
    }

    async fn get_document(
        &self,
        session: &SessionToken,
        collection: Collection,
        document_id: &str,
    ) -> Result<Value, BackendError> {
        let state = self.begin(Operation::GetDocument)?;
        session_user(&state, session)?;
        state
            .documents
            .get(&collection)
            .and_then(|docs| {
                docs.iter()
                    .find(|d| d.get("$id").and_then(|v| v.as_str()) == Some(document_id))
            })
            .cloned()
            .ok_or_else(document_not_found)
    }

    async fn list_documents(
        &self,
        session: &SessionToken,
        collection: Collection,
        queries: &[Query],
    ) -> Result<DocumentList<Value>, BackendError> {
        let state = self.begin(Operation::ListDocuments)?;
        session_user(&state, session)?;
        let documents = state.documents.get(&collection).map(|d| d.as_slice()).unwrap_or(&[]);
        Ok(run_queries(documents, queries))
    }

    async fn update_document(
        &self,
        session: &SessionToken,
        collection: Collection,
        document_id: &str,
        data: Value,
    ) -> Result<Value, BackendError> {
        let mut state = self.begin(Operation::UpdateDocument)?;
        session_user(&state, session)?;
        let document = state
            .documents
            .get_mut(&collection)
            .and_then(|docs| {
                docs.iter_mut()
                    .find(|d| d.get("$id").and_then(|v| v.as_str()) == Some(document_id))
            })
            .ok_or_else(document_not_found)?;
        if let (Value::Object(target), Value::Object(changes)) = (&mut *document, data) {
            for (key, value) in changes {
                if !key.starts_with('$') {
                    target.insert(key, value);
                }
            }
            target.insert("$updatedAt".to_string(), Value::String(now()));
        }
        Ok(document.clone())
    }

    async fn delete_document(
        &self,
        session: &SessionToken,
        collection: Collection,
        document_id: &str,
    ) -> Result<(), BackendError> {
        let mut state = self.begin(Operation::DeleteDocument)?;
        session_user(&state, session)?;
        let documents = state.documents.entry(collection).or_default();
        let before = documents.len();
        documents.retain(|d| d.get("$id").and_then(|v| v.as_str()) != Some(document_id));
        if documents.len() == before {
            return Err(document_not_found());
        }
        Ok(())
    }
}
