//! Remote backend: each operation is one request over a [`Transport`].
//!
//! No local state. Non-2xx statuses are mapped onto [`BackendError`] kinds:
//! 404 is `NotFound`, 409/412 are `Conflict`, anything else is `Unavailable`.

use super::Backend;
use crate::error::{ApiError, BackendError};
use crate::tree::{Node, Tree};
use crate::types::{BackendKind, GitStatusSnapshot};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// HTTP verb of a transport request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

/// Transport-level request: endpoint, query pairs, optional JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    pub endpoint: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl TransportRequest {
    pub fn get(endpoint: &str) -> Self {
        Self {
            method: Method::Get,
            endpoint: endpoint.to_string(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(endpoint: &str, body: serde_json::Value) -> Self {
        Self {
            method: Method::Post,
            endpoint: endpoint.to_string(),
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn delete(endpoint: &str) -> Self {
        Self {
            method: Method::Delete,
            endpoint: endpoint.to_string(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Value of a query parameter.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// String field of the JSON body.
    pub fn body_str(&self, key: &str) -> Option<&str> {
        self.body.as_ref()?.get(key)?.as_str()
    }
}

/// Status code and raw body of a transport response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Request/response carrier used by [`RemoteBackend`].
///
/// Implementations report connection failures as `BackendError::Unavailable`
/// and hand back every HTTP response, successful or not.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, BackendError>;
}

/// Transport over HTTP with `reqwest`.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpTransport {
    pub fn new(
        base_url: String,
        timeout: Duration,
        auth_token: Option<String>,
    ) -> Result<Self, ApiError> {
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ApiError::ConfigError(format!(
                "Invalid backend URL: {}",
                base_url
            )));
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, BackendError> {
        let url = format!("{}{}", self.base_url, request.endpoint);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
            Method::Delete => self.client.delete(&url),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(token) = &self.auth_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(format!("Request to {} failed: {}", url, e)))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            BackendError::Unavailable(format!("Failed to read response from {}: {}", url, e))
        })?;
        Ok(TransportResponse { status, body })
    }
}

#[derive(Debug, Deserialize)]
struct FileContent {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "message")]
    error: String,
}

fn error_message(endpoint: &str, response: &TransportResponse) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(&response.body) {
        return parsed.error;
    }
    let body = response.body.trim();
    if body.is_empty() {
        format!("{} returned {}", endpoint, response.status)
    } else {
        format!("{} returned {}: {}", endpoint, response.status, body)
    }
}

fn check_status(endpoint: &str, response: TransportResponse) -> Result<TransportResponse, BackendError> {
    if response.is_success() {
        return Ok(response);
    }
    let message = error_message(endpoint, &response);
    match response.status {
        404 => Err(BackendError::NotFound(message)),
        409 | 412 => Err(BackendError::Conflict(message)),
        _ => Err(BackendError::Unavailable(message)),
    }
}

fn parse_body<T: serde::de::DeserializeOwned>(
    endpoint: &str,
    response: &TransportResponse,
) -> Result<T, BackendError> {
    serde_json::from_str(&response.body).map_err(|e| {
        BackendError::Unavailable(format!("Malformed response from {}: {}", endpoint, e))
    })
}

/// Backend that forwards every call to a remote workspace server.
pub struct RemoteBackend {
    transport: Arc<dyn Transport>,
}

impl RemoteBackend {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    async fn call(&self, request: TransportRequest) -> Result<TransportResponse, BackendError> {
        let endpoint = request.endpoint.clone();
        debug!(method = ?request.method, endpoint = %endpoint, "remote request");
        let response = self.transport.send(request).await?;
        check_status(&endpoint, response)
    }
}

#[async_trait]
impl Backend for RemoteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn list_tree(&self, root: &str) -> Result<Tree, BackendError> {
        let response = self
            .call(TransportRequest::get("/tree").with_query("path", root))
            .await?;
        let nodes: Vec<Node> = parse_body("/tree", &response)?;
        let tree = Tree::from_nodes(root, nodes);
        tree.validate().map_err(|e| {
            BackendError::Unavailable(format!("Malformed tree listing for {}: {}", root, e))
        })?;
        Ok(tree)
    }

    async fn read_file(&self, path: &str) -> Result<String, BackendError> {
        let response = self
            .call(TransportRequest::get("/file").with_query("path", path))
            .await?;
        let file: FileContent = parse_body("/file", &response)?;
        Ok(file.content)
    }

    async fn write_file(&self, path: &str, content: &str) -> Result<(), BackendError> {
        self.call(TransportRequest::post(
            "/file",
            json!({ "path": path, "content": content }),
        ))
        .await?;
        Ok(())
    }

    async fn create_file(&self, path: &str) -> Result<(), BackendError> {
        self.call(TransportRequest::post("/file", json!({ "path": path })))
            .await?;
        Ok(())
    }

    async fn create_folder(&self, path: &str) -> Result<(), BackendError> {
        self.call(TransportRequest::post("/folder", json!({ "path": path })))
            .await?;
        Ok(())
    }

    async fn delete_path(&self, path: &str) -> Result<(), BackendError> {
        self.call(TransportRequest::delete("/path").with_query("path", path))
            .await?;
        Ok(())
    }

    async fn rename_path(&self, old_path: &str, new_path: &str) -> Result<(), BackendError> {
        self.call(TransportRequest::post(
            "/rename",
            json!({ "path": old_path, "newPath": new_path }),
        ))
        .await?;
        Ok(())
    }

    async fn git_status(&self, root: &str) -> Result<GitStatusSnapshot, BackendError> {
        let response = self
            .call(TransportRequest::get("/git/status").with_query("path", root))
            .await?;
        parse_body("/git/status", &response)
    }

    async fn stage_path(&self, root: &str, path: &str) -> Result<(), BackendError> {
        self.call(TransportRequest::post(
            "/git/add",
            json!({ "path": root, "file": path }),
        ))
        .await?;
        Ok(())
    }

    async fn unstage_path(&self, root: &str, path: &str) -> Result<(), BackendError> {
        self.call(TransportRequest::post(
            "/git/unstage",
            json!({ "path": root, "file": path }),
        ))
        .await?;
        Ok(())
    }

    async fn commit(&self, root: &str, message: &str, paths: &[String]) -> Result<(), BackendError> {
        self.call(TransportRequest::post(
            "/git/commit",
            json!({ "path": root, "message": message, "files": paths }),
        ))
        .await?;
        Ok(())
    }

    async fn reset(&self, root: &str) -> Result<(), BackendError> {
        self.call(TransportRequest::post("/git/reset", json!({ "path": root })))
            .await?;
        Ok(())
    }
}
