//! Error types for minidfs

use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === Leadership Errors ===
    #[error("No leader node available")]
    NoLeader,

    #[error("Not leader: {0} no longer leads, please retry")]
    NotLeader(String),

    // === Network Errors ===
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Operation timeout: {0}")]
    Timeout(String),

    #[error("HTTP error: {0}")]
    Http(String),

    // === Transfer Errors ===
    #[error("{}", describe_unavailable(.file_id, .sequence, .attempts))]
    ChunkUnavailable {
        file_id: String,
        sequence: u64,
        attempts: Vec<NodeAttempt>,
    },

    #[error("Upload of {file_id} aborted after {completed}/{total} chunks: {source}")]
    TransferAborted {
        file_id: String,
        completed: u64,
        total: u64,
        #[source]
        source: Box<Error>,
    },

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    // === Generic ===
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Is this a retryable error?
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::NoLeader
            | Error::NotLeader(_)
            | Error::Timeout(_)
            | Error::ConnectionFailed(_) => true,
            Error::TransferAborted { source, .. } => source.is_retryable(),
            _ => false,
        }
    }

    /// Number of chunks accepted before a transfer was aborted.
    pub fn completed_chunks(&self) -> Option<u64> {
        match self {
            Error::TransferAborted { completed, .. } => Some(*completed),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(e.to_string())
        } else if e.is_connect() {
            Error::ConnectionFailed(e.to_string())
        } else {
            Error::Http(e.to_string())
        }
    }
}

/// Why a single node could not serve a chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeFailure {
    NotFound,
    EmptyResponse,
    ConnectionRefused,
    Timeout,
    Status(u16),
    Other(String),
}

impl fmt::Display for NodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeFailure::NotFound => write!(f, "Not found (404)"),
            NodeFailure::EmptyResponse => write!(f, "Empty response"),
            NodeFailure::ConnectionRefused => write!(f, "Connection refused"),
            NodeFailure::Timeout => write!(f, "Timed out"),
            NodeFailure::Status(code) => write!(f, "HTTP {}", code),
            NodeFailure::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl From<reqwest::Error> for NodeFailure {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            NodeFailure::Timeout
        } else if e.is_connect() {
            NodeFailure::ConnectionRefused
        } else {
            NodeFailure::Other(e.to_string())
        }
    }
}

/// One failed attempt in a fallback scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeAttempt {
    pub endpoint: String,
    pub failure: NodeFailure,
}

impl fmt::Display for NodeAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.endpoint, self.failure)
    }
}

fn describe_unavailable(file_id: &str, sequence: &u64, attempts: &[NodeAttempt]) -> String {
    if attempts.is_empty() {
        return format!("Chunk {} of {} not found on any node", sequence, file_id);
    }
    let reasons: Vec<String> = attempts.iter().map(|a| a.to_string()).collect();
    format!(
        "Failed to download chunk {} of {}. Errors: {}",
        sequence,
        file_id,
        reasons.join("; ")
    )
}
