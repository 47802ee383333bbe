//! Shared fixtures and an in-process server for the remote backend.

use async_trait::async_trait;
use canopy::backend::{
    Backend, FixtureCache, FixtureDocument, FixtureSource, Method, RemoteBackend, Transport,
    TransportRequest, TransportResponse, VirtualBackend,
};
use canopy::error::BackendError;
use canopy::tree::{Node, Tree};
use canopy::types::{GitStatusSnapshot, NodeKind};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// `/a/keep.txt`, `/a/nested/deep.txt`, `/top.txt`
pub fn fixture_doc() -> FixtureDocument {
    FixtureDocument {
        root: "/".to_string(),
        tree: vec![
            Node::directory(
                "/a",
                vec![
                    Node::file("/a/keep.txt"),
                    Node::directory("/a/nested", vec![Node::file("/a/nested/deep.txt")]),
                ],
            ),
            Node::file("/top.txt"),
        ],
        files: BTreeMap::from([
            ("/a/keep.txt".to_string(), "keep".to_string()),
            ("/a/nested/deep.txt".to_string(), "deep".to_string()),
            ("/top.txt".to_string(), "top".to_string()),
        ]),
        git: GitStatusSnapshot::default(),
    }
}

pub fn virtual_backend() -> VirtualBackend {
    VirtualBackend::new(FixtureCache::new(FixtureSource::Inline(Box::new(
        fixture_doc(),
    ))))
}

/// Paths and kinds in preorder.
pub fn shape(tree: &Tree) -> Vec<(String, NodeKind)> {
    tree.iter().map(|n| (n.path.clone(), n.kind)).collect()
}

/// Serves the HTTP contract of the remote backend from a [`VirtualBackend`].
pub struct LoopbackTransport {
    server: VirtualBackend,
    requests: Mutex<Vec<TransportRequest>>,
    fail_tree: AtomicBool,
    delay: Option<Duration>,
    reply_delay: Mutex<Option<(Method, String, Duration)>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    gate_armed: AtomicBool,
    gate_waiting: AtomicBool,
    gate: Notify,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::with_server(virtual_backend())
    }

    pub fn with_server(server: VirtualBackend) -> Self {
        Self {
            server,
            requests: Mutex::new(Vec::new()),
            fail_tree: AtomicBool::new(false),
            delay: None,
            reply_delay: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            gate_armed: AtomicBool::new(false),
            gate_waiting: AtomicBool::new(false),
            gate: Notify::new(),
        }
    }

    /// Every request sleeps for `delay` before it is served.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Hold the reply to `method endpoint` for `delay` after the server has
    /// already applied the request.
    pub fn delay_reply(&self, method: Method, endpoint: &str, delay: Duration) {
        *self.reply_delay.lock() = Some((method, endpoint.to_string(), delay));
    }

    pub fn server(&self) -> &VirtualBackend {
        &self.server
    }

    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().clone()
    }

    /// Answer `/tree` with 503 while set.
    pub fn fail_tree_listing(&self, fail: bool) {
        self.fail_tree.store(fail, Ordering::SeqCst);
    }

    /// Most requests ever served at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Hold the next `/tree` request until [`release`](Self::release).
    pub fn arm_gate(&self) {
        self.gate_armed.store(true, Ordering::SeqCst);
    }

    pub fn gate_waiting(&self) -> bool {
        self.gate_waiting.load(Ordering::SeqCst)
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }

    async fn route(&self, request: &TransportRequest) -> Result<String, BackendError> {
        let query = |key: &str| {
            request
                .query_param(key)
                .map(str::to_string)
                .ok_or_else(|| BackendError::Unavailable(format!("missing query {}", key)))
        };
        let field = |key: &str| {
            request
                .body_str(key)
                .map(str::to_string)
                .ok_or_else(|| BackendError::Unavailable(format!("missing field {}", key)))
        };
        let done = || -> Result<String, BackendError> { Ok("{}".to_string()) };

        match (request.method, request.endpoint.as_str()) {
            (Method::Get, "/tree") => {
                if self.fail_tree.load(Ordering::SeqCst) {
                    return Err(BackendError::Unavailable("listing disabled".to_string()));
                }
                let tree = self.server.list_tree(&query("path")?).await?;
                Ok(serde_json::to_string(&tree).unwrap())
            }
            (Method::Get, "/file") => {
                let content = self.server.read_file(&query("path")?).await?;
                Ok(json!({ "content": content }).to_string())
            }
            (Method::Post, "/file") => {
                let path = field("path")?;
                match request.body_str("content") {
                    Some(content) => self.server.write_file(&path, content).await?,
                    None => self.server.create_file(&path).await?,
                }
                done()
            }
            (Method::Post, "/folder") => {
                self.server.create_folder(&field("path")?).await?;
                done()
            }
            (Method::Delete, "/path") => {
                self.server.delete_path(&query("path")?).await?;
                done()
            }
            (Method::Post, "/rename") => {
                self.server
                    .rename_path(&field("path")?, &field("newPath")?)
                    .await?;
                done()
            }
            (Method::Get, "/git/status") => {
                let status = self.server.git_status(&query("path")?).await?;
                Ok(serde_json::to_string(&status).unwrap())
            }
            (Method::Post, "/git/add") => {
                self.server.stage_path(&field("path")?, &field("file")?).await?;
                done()
            }
            (Method::Post, "/git/unstage") => {
                self.server
                    .unstage_path(&field("path")?, &field("file")?)
                    .await?;
                done()
            }
            (Method::Post, "/git/commit") => {
                let files: Vec<String> = request
                    .body
                    .as_ref()
                    .and_then(|b| b.get("files"))
                    .and_then(|f| serde_json::from_value(f.clone()).ok())
                    .unwrap_or_default();
                self.server
                    .commit(&field("path")?, &field("message")?, &files)
                    .await?;
                done()
            }
            (Method::Post, "/git/reset") => {
                self.server.reset(&field("path")?).await?;
                done()
            }
            (method, endpoint) => Err(BackendError::NotFound(format!(
                "no route for {:?} {}",
                method, endpoint
            ))),
        }
    }
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, BackendError> {
        self.requests.lock().push(request.clone());

        if request.endpoint == "/tree" && self.gate_armed.swap(false, Ordering::SeqCst) {
            self.gate_waiting.store(true, Ordering::SeqCst);
            self.gate.notified().await;
            self.gate_waiting.store(false, Ordering::SeqCst);
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let result = self.route(&request).await;
        let reply_delay = self
            .reply_delay
            .lock()
            .as_ref()
            .filter(|(method, endpoint, _)| *method == request.method && *endpoint == request.endpoint)
            .map(|(_, _, delay)| *delay);
        if let Some(delay) = reply_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        Ok(match result {
            Ok(body) => TransportResponse::ok(body),
            Err(e) => {
                let status = match e {
                    BackendError::NotFound(_) => 404,
                    BackendError::Conflict(_) => 409,
                    BackendError::Unavailable(_) => 503,
                };
                TransportResponse::new(status, json!({ "error": e.to_string() }).to_string())
            }
        })
    }
}

pub fn remote_backend() -> (RemoteBackend, Arc<LoopbackTransport>) {
    let transport = Arc::new(LoopbackTransport::new());
    (RemoteBackend::new(transport.clone()), transport)
}
