//! In-process mock storage nodes for integration tests

#![allow(dead_code)]

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use minidfs::common::{Config, TimeoutConfig};
use minidfs::DfsClient;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Chunk write as seen by a mock node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedChunk {
    pub file_id: String,
    pub sequence: u64,
    pub len: usize,
}

#[derive(Default)]
pub struct NodeState {
    role_body: Mutex<String>,
    chunks: Mutex<HashMap<(String, u64), Vec<u8>>>,
    received: Mutex<Vec<ReceivedChunk>>,
    delay: Mutex<Option<Duration>>,
    /// Answer 307 to writes once this many chunks were accepted
    redirect_after: Mutex<Option<usize>>,
    empty_reads: AtomicBool,
    role_probes: AtomicUsize,
}

impl NodeState {
    fn role_body(&self) -> String {
        self.role_body.lock().unwrap().clone()
    }

    fn is_leader(&self) -> bool {
        self.role_body().trim() == "LEADER"
    }

    async fn pause(&self) {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

pub struct MockNode {
    pub url: String,
    pub state: Arc<NodeState>,
}

impl MockNode {
    pub async fn spawn(role: &str) -> Self {
        let state = Arc::new(NodeState::default());
        *state.role_body.lock().unwrap() = role.to_string();

        let app = Router::new()
            .route("/raft/role", get(role_handler))
            .route(
                "/files/:file_id/chunks/:sequence",
                get(get_chunk_handler).post(put_chunk_handler),
            )
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}", addr),
            state,
        }
    }

    pub fn set_role(&self, role: &str) {
        *self.state.role_body.lock().unwrap() = role.to_string();
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.state.delay.lock().unwrap() = Some(delay);
    }

    pub fn redirect_after(&self, accepted: usize) {
        *self.state.redirect_after.lock().unwrap() = Some(accepted);
    }

    pub fn serve_empty_chunks(&self) {
        self.state.empty_reads.store(true, Ordering::SeqCst);
    }

    pub fn put(&self, file_id: &str, sequence: u64, data: &[u8]) {
        self.state
            .chunks
            .lock()
            .unwrap()
            .insert((file_id.to_string(), sequence), data.to_vec());
    }

    pub fn received(&self) -> Vec<ReceivedChunk> {
        self.state.received.lock().unwrap().clone()
    }

    pub fn role_probes(&self) -> usize {
        self.state.role_probes.load(Ordering::SeqCst)
    }
}

async fn role_handler(State(state): State<Arc<NodeState>>) -> Response {
    state.role_probes.fetch_add(1, Ordering::SeqCst);
    state.pause().await;
    state.role_body().into_response()
}

async fn put_chunk_handler(
    State(state): State<Arc<NodeState>>,
    Path((file_id, sequence)): Path<(String, u64)>,
    body: Bytes,
) -> Response {
    state.pause().await;

    let accepted = state.received.lock().unwrap().len();
    let redirect = state
        .redirect_after
        .lock()
        .unwrap()
        .map(|limit| accepted >= limit)
        .unwrap_or(false);
    if !state.is_leader() || redirect {
        return (
            StatusCode::TEMPORARY_REDIRECT,
            "Not leader; forward to leader (prototype)",
        )
            .into_response();
    }

    state.received.lock().unwrap().push(ReceivedChunk {
        file_id: file_id.clone(),
        sequence,
        len: body.len(),
    });
    state
        .chunks
        .lock()
        .unwrap()
        .insert((file_id, sequence), body.to_vec());
    (StatusCode::OK, "OK").into_response()
}

async fn get_chunk_handler(
    State(state): State<Arc<NodeState>>,
    Path((file_id, sequence)): Path<(String, u64)>,
) -> Response {
    state.pause().await;

    if state.empty_reads.load(Ordering::SeqCst) {
        return StatusCode::OK.into_response();
    }

    let data = state.chunks.lock().unwrap().get(&(file_id, sequence)).cloned();
    match data {
        Some(data) => (StatusCode::OK, data).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// URL of a port nobody listens on
pub fn dead_endpoint() -> String {
    dead_endpoints(1).remove(0)
}

/// `n` distinct URLs nobody listens on
pub fn dead_endpoints(n: usize) -> Vec<String> {
    // hold every listener until all ports are known so they stay distinct
    let listeners: Vec<std::net::TcpListener> = (0..n)
        .map(|_| std::net::TcpListener::bind("127.0.0.1:0").unwrap())
        .collect();
    listeners
        .iter()
        .map(|l| format!("http://{}", l.local_addr().unwrap()))
        .collect()
}

pub fn test_config<S: AsRef<str>>(nodes: &[S], timeout: Duration) -> Config {
    Config {
        nodes: nodes.iter().map(|n| n.as_ref().to_string()).collect(),
        timeouts: TimeoutConfig::uniform(timeout),
        log_level: "debug".to_string(),
    }
}

pub fn client<S: AsRef<str>>(nodes: &[S]) -> DfsClient {
    DfsClient::new(&test_config(nodes, Duration::from_millis(1_000))).unwrap()
}

pub fn client_with_timeout<S: AsRef<str>>(nodes: &[S], timeout: Duration) -> DfsClient {
    DfsClient::new(&test_config(nodes, timeout)).unwrap()
}

/// Deterministic test payload
pub fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
