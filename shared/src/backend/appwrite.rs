use super::{Backend, Collection, Query, SessionToken};
use crate::config::Config;
use crate::error::BackendError;
use crate::types::{DocumentList, Identity, Session};
use async_trait::async_trait;
use reqwest::{header::SET_COOKIE, Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;

/// REST client for the Appwrite platform.
pub struct AppwriteClient {
    http: Client,
    endpoint: String,
    project_id: String,
    database_id: String,
    users_collection_id: String,
    activities_collection_id: String,
    api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PlatformErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: u16,
    #[serde(rename = "type", default)]
    kind: String,
}

impl AppwriteClient {
    pub fn new(config: &Config) -> Result<Self, BackendError> {
        let http = Client::builder().build()?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            project_id: config.project_id.clone(),
            database_id: config.database_id.clone(),
            users_collection_id: config.users_collection_id.clone(),
            activities_collection_id: config.activities_collection_id.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn collection_id(&self, collection: Collection) -> &str {
        match collection {
            Collection::Users => &self.users_collection_id,
            Collection::Activities => &self.activities_collection_id,
        }
    }

    fn documents_path(&self, collection: Collection) -> String {
        format!(
            "/databases/{}/collections/{}/documents",
            self.database_id,
            self.collection_id(collection)
        )
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.endpoint, path))
            .header("X-Appwrite-Project", &self.project_id)
    }

    /// Request carrying the server key when one is configured
    fn server_request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.request(method, path);
        match &self.api_key {
            Some(key) => builder.header("X-Appwrite-Key", key),
            None => builder,
        }
    }

    fn session_request(&self, method: Method, path: &str, session: &SessionToken) -> RequestBuilder {
        self.request(method, path)
            .header("X-Appwrite-Session", session.expose())
    }

    async fn send(builder: RequestBuilder) -> Result<Response, BackendError> {
        let response = builder.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();
        Err(parse_platform_error(status, &text))
    }

    async fn send_json(builder: RequestBuilder) -> Result<Value, BackendError> {
        let response = Self::send(builder).await?;
        Ok(response.json::<Value>().await?)
    }
}

fn parse_platform_error(status: u16, text: &str) -> BackendError {
    let body: PlatformErrorBody = serde_json::from_str(text).unwrap_or_default();
    let code = if body.code == 0 { status } else { body.code };
    BackendError::Platform {
        code,
        kind: body.kind,
        message: body.message,
    }
}

/// Value of cookie `name` from a `Set-Cookie` header, if that header sets it
fn set_cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    let pair = header.split(';').next()?.trim();
    let (key, value) = pair.split_once('=')?;
    (key == name && !value.is_empty()).then_some(value)
}

#[async_trait]
impl Backend for AppwriteClient {
    async fn create_identity(
        &self,
        user_id: &str,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<Identity, BackendError> {
        let body = serde_json::json!({
            "userId": user_id,
            "email": email,
            "password": password,
            "name": name,
        });
        let value = Self::send_json(self.server_request(Method::POST, "/account").json(&body)).await?;
        super::decode(value)
    }

    async fn delete_identity(&self, user_id: &str) -> Result<(), BackendError> {
        if self.api_key.is_none() {
            return Err(BackendError::Unsupported("deleting identities requires APPWRITE_API_KEY"));
        }
        Self::send(self.server_request(Method::DELETE, &format!("/users/{}", user_id))).await?;
        Ok(())
    }

    async fn create_session(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let response = Self::send(
            self.server_request(Method::POST, "/account/sessions/email")
                .json(&body),
        )
        .await?;

        // Without a server key the secret only travels in the session cookie
        let cookie_name = format!("a_session_{}", self.project_id);
        let cookie_secret = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|h| set_cookie_value(h, &cookie_name))
            .map(|s| s.to_string());

        let mut session: Session = super::decode(response.json::<Value>().await?)?;
        if session.secret.is_empty() {
            session.secret = cookie_secret.unwrap_or_default();
        }
        if session.secret.is_empty() {
            return Err(BackendError::platform(500, "session_secret_missing", ""));
        }
        Ok(session)
    }

    async fn delete_session(&self, session: &SessionToken, session_id: &str) -> Result<(), BackendError> {
        let path = format!("/account/sessions/{}", session_id);
        Self::send(self.session_request(Method::DELETE, &path, session)).await?;
        Ok(())
    }

    async fn get_identity(&self, session: &SessionToken) -> Result<Identity, BackendError> {
        let value = Self::send_json(self.session_request(Method::GET, "/account", session)).await?;
        super::decode(value)
    }

    async fn update_password(
        &self,
        session: &SessionToken,
        password: &str,
        old_password: &str,
    ) -> Result<Identity, BackendError> {
        let body = serde_json::json!({ "password": password, "oldPassword": old_password });
        let value = Self::send_json(
            self.session_request(Method::PATCH, "/account/password", session)
                .json(&body),
        )
        .await?;
        super::decode(value)
    }

    async fn create_document(
        &self,
        session: &SessionToken,
        collection: Collection,
        document_id: &str,
        data: Value,
    ) -> Result<Value, BackendError> {
        let body = serde_json::json!({ "documentId": document_id, "data": data });
        let path = self.documents_path(collection);
        Self::send_json(self.session_request(Method::POST, &path, session).json(&body)).await
    }

    async fn get_document(
        &self,
        session: &SessionToken,
        collection: Collection,
        document_id: &str,
    ) -> Result<Value, BackendError> {
        let path = format!("{}/{}", self.documents_path(collection), document_id);
        Self::send_json(self.session_request(Method::GET, &path, session)).await
    }

    async fn list_documents(
        &self,
        session: &SessionToken,
        collection: Collection,
        queries: &[Query],
    ) -> Result<DocumentList<Value>, BackendError> {
        let params: Vec<(&str, String)> = queries
            .iter()
            .map(|q| ("queries[]", q.to_wire()))
            .collect();
        let path = self.documents_path(collection);
        let value = Self::send_json(self.session_request(Method::GET, &path, session).query(&params)).await?;
        super::decode(value)
    }

    async fn update_document(
        &self,
        session: &SessionToken,
        collection: Collection,
        document_id: &str,
        data: Value,
    ) -> Result<Value, BackendError> {
        let body = serde_json::json!({ "data": data });
        let path = format!("{}/{}", self.documents_path(collection), document_id);
        Self::send_json(self.session_request(Method::PATCH, &path, session).json(&body)).await
    }

    async fn delete_document(
        &self,
        session: &SessionToken,
        collection: Collection,
        document_id: &str,
    ) -> Result<(), BackendError> {
        let path = format!("{}/{}", self.documents_path(collection), document_id);
        Self::send(self.session_request(Method::DELETE, &path, session)).await?;
        Ok(())
    }
}
