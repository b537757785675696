pub mod appwrite;
#[cfg(any(test, feature = "testing"))]
pub mod memory;

use crate::error::BackendError;
use crate::types::{DocumentList, Identity, Session};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;

/// Opaque session secret issued by the platform. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(***)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    Activities,
}

/// Query primitives understood by the document database
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Equal(String, Vec<Value>),
    GreaterThanEqual(String, Value),
    OrderDesc(String),
    OrderAsc(String),
    Limit(u64),
    Offset(u64),
}

impl Query {
    pub fn equal(attribute: &str, value: impl Into<Value>) -> Self {
        Query::Equal(attribute.to_string(), vec![value.into()])
    }

    pub fn greater_than_equal(attribute: &str, value: impl Into<Value>) -> Self {
        Query::GreaterThanEqual(attribute.to_string(), value.into())
    }

    pub fn order_desc(attribute: &str) -> Self {
        Query::OrderDesc(attribute.to_string())
    }

    pub fn order_asc(attribute: &str) -> Self {
        Query::OrderAsc(attribute.to_string())
    }

    pub fn limit(n: u64) -> Self {
        Query::Limit(n)
    }

    pub fn offset(n: u64) -> Self {
        Query::Offset(n)
    }

    /// JSON query string, e.g. `{"method":"equal","attribute":"userId","values":["u1"]}`
    pub fn to_wire(&self) -> String {
        let value = match self {
            Query::Equal(attr, values) => {
                serde_json::json!({"method": "equal", "attribute": attr, "values": values})
            }
            Query::GreaterThanEqual(attr, value) => {
                serde_json::json!({"method": "greaterThanEqual", "attribute": attr, "values": [value]})
            }
            Query::OrderDesc(attr) => serde_json::json!({"method": "orderDesc", "attribute": attr}),
            Query::OrderAsc(attr) => serde_json::json!({"method": "orderAsc", "attribute": attr}),
            Query::Limit(n) => serde_json::json!({"method": "limit", "values": [n]}),
            Query::Offset(n) => serde_json::json!({"method": "offset", "values": [n]}),
        };
        value.to_string()
    }
}

/// Operations consumed from the backend platform.
///
/// Account calls act on the identity behind `session`; document calls are
/// made with the caller's session so the platform's document permissions
/// apply.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn create_identity(
        &self,
        user_id: &str,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<Identity, BackendError>;

    /// Server-side removal of an identity, used to undo a failed registration
    async fn delete_identity(&self, user_id: &str) -> Result<(), BackendError>;

    async fn create_session(&self, email: &str, password: &str) -> Result<Session, BackendError>;

    async fn delete_session(&self, session: &SessionToken, session_id: &str) -> Result<(), BackendError>;

    async fn get_identity(&self, session: &SessionToken) -> Result<Identity, BackendError>;

    async fn update_password(
        &self,
        session: &SessionToken,
        password: &str,
        old_password: &str,
    ) -> Result<Identity, BackendError>;

    async fn create_document(
        &self,
        session: &SessionToken,
        collection: Collection,
        document_id: &str,
        data: Value,
    ) -> Result<Value, BackendError>;

    async fn get_document(
        &self,
        session: &SessionToken,
        collection: Collection,
        document_id: &str,
    ) -> Result<Value, BackendError>;

    async fn list_documents(
        &self,
        session: &SessionToken,
        collection: Collection,
        queries: &[Query],
    ) -> Result<DocumentList<Value>, BackendError>;

    async fn update_document(
        &self,
        session: &SessionToken,
        collection: Collection,
        document_id: &str,
        data: Value,
    ) -> Result<Value, BackendError>;

    async fn delete_document(
        &self,
        session: &SessionToken,
        collection: Collection,
        document_id: &str,
    ) -> Result<(), BackendError>;
}

/// Fresh document/identity id in the platform's accepted alphabet
pub fn unique_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub(crate) fn decode<T: DeserializeOwned>(value: Value) -> Result<T, BackendError> {
    Ok(serde_json::from_value(value)?)
}

pub(crate) fn decode_list<T: DeserializeOwned>(list: DocumentList<Value>) -> Result<DocumentList<T>, BackendError> {
    let documents = list
        .documents
        .into_iter()
        .map(decode::<T>)
        .collect::<Result<Vec<T>, _>>()?;
    Ok(DocumentList {
        total: list.total,
        documents,
    })
}
