//! HTTP transport to storage nodes
//!
//! Every call carries an explicit timeout. Role responses are normalized here
//! so nothing above this layer sees raw bodies: a node that cannot be probed
//! is simply `RaftRole::Unknown`.

use bytes::Bytes;
use reqwest::{redirect, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use crate::common::{encode_segment, Error, NodeFailure, Result, TimeoutConfig};

/// Header name for request ID
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Consensus role reported by a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RaftRole {
    Leader,
    Follower,
    Candidate,
    Unknown,
}

impl RaftRole {
    pub fn is_leader(&self) -> bool {
        matches!(self, RaftRole::Leader)
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, RaftRole::Unknown)
    }

    /// Normalize a `/raft/role` body.
    ///
    /// Accepts bare text (`LEADER`), a JSON string (`"LEADER"`) or a JSON
    /// object with a `role` field. Anything else is `Unknown`.
    pub fn from_body(body: &str) -> Self {
        let body = body.trim();
        if let Ok(role) = body.parse() {
            return role;
        }

        match serde_json::from_str::<serde_json::Value>(body) {
            Ok(serde_json::Value::String(s)) => s.parse().unwrap_or(RaftRole::Unknown),
            Ok(serde_json::Value::Object(map)) => map
                .get("role")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse().ok())
                .unwrap_or(RaftRole::Unknown),
            _ => RaftRole::Unknown,
        }
    }
}

impl FromStr for RaftRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LEADER" => Ok(RaftRole::Leader),
            "FOLLOWER" => Ok(RaftRole::Follower),
            "CANDIDATE" => Ok(RaftRole::Candidate),
            "UNKNOWN" => Ok(RaftRole::Unknown),
            other => Err(Error::Other(format!("unknown raft role: {}", other))),
        }
    }
}

impl std::fmt::Display for RaftRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RaftRole::Leader => write!(f, "LEADER"),
            RaftRole::Follower => write!(f, "FOLLOWER"),
            RaftRole::Candidate => write!(f, "CANDIDATE"),
            RaftRole::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Thin reqwest wrapper speaking the storage node HTTP API
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    timeouts: TimeoutConfig,
}

impl HttpTransport {
    pub fn new(timeouts: TimeoutConfig) -> Result<Self> {
        // 307 is a "not leader" signal, never something to follow
        let client = Client::builder()
            .redirect(redirect::Policy::none())
            .connect_timeout(timeouts.connect())
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| Error::Http(format!("failed to build http client: {}", e)))?;

        Ok(Self { client, timeouts })
    }

    pub fn timeouts(&self) -> &TimeoutConfig {
        &self.timeouts
    }

    /// `GET {endpoint}/raft/role`. Never fails: errors map to `Unknown`.
    pub async fn probe_role(&self, endpoint: &str, timeout: Duration) -> RaftRole {
        let url = format!("{}/raft/role", endpoint);
        let response = self
            .client
            .get(&url)
            .header(REQUEST_ID_HEADER, Uuid::new_v4().to_string())
            .timeout(timeout)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                debug!(endpoint, error = %e, "Role probe failed");
                return RaftRole::Unknown;
            }
        };

        if !response.status().is_success() {
            debug!(endpoint, status = %response.status(), "Role probe rejected");
            return RaftRole::Unknown;
        }

        match response.text().await {
            Ok(body) => RaftRole::from_body(&body),
            Err(e) => {
                debug!(endpoint, error = %e, "Role probe body unreadable");
                RaftRole::Unknown
            }
        }
    }

    /// `POST {endpoint}/files/{file_id}/chunks/{sequence}`
    ///
    /// A 307/308 answer becomes `Error::NotLeader(endpoint)`.
    pub async fn put_chunk(
        &self,
        endpoint: &str,
        file_id: &str,
        sequence: u64,
        payload: Bytes,
    ) -> Result<()> {
        let url = chunk_url(endpoint, file_id, sequence);
        let response = self
            .client
            .post(&url)
            .header(REQUEST_ID_HEADER, Uuid::new_v4().to_string())
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .timeout(self.timeouts.upload())
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        if matches!(
            status,
            StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT
        ) {
            return Err(Error::NotLeader(endpoint.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        Err(Error::Http(format!(
            "{} rejected chunk {} of {}: {} {}",
            endpoint,
            sequence,
            file_id,
            status,
            body.trim()
        )))
    }

    /// `GET {endpoint}/files/{file_id}/chunks/{sequence}`
    ///
    /// An empty 2xx body is a failure, not an empty chunk.
    pub async fn get_chunk(
        &self,
        endpoint: &str,
        file_id: &str,
        sequence: u64,
    ) -> std::result::Result<Bytes, NodeFailure> {
        let url = chunk_url(endpoint, file_id, sequence);
        let response = self
            .client
            .get(&url)
            .header(REQUEST_ID_HEADER, Uuid::new_v4().to_string())
            .timeout(self.timeouts.download())
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(NodeFailure::NotFound);
        }
        if !status.is_success() {
            return Err(NodeFailure::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        if body.is_empty() {
            return Err(NodeFailure::EmptyResponse);
        }
        Ok(body)
    }
}

fn chunk_url(endpoint: &str, file_id: &str, sequence: u64) -> String {
    format!(
        "{}/files/{}/chunks/{}",
        endpoint,
        encode_segment(file_id),
        sequence
    )
}
