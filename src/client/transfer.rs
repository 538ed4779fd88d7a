//! Chunked file transfer
//!
//! Uploads split a file into 1 MiB chunks numbered from 1 and send them to the
//! leader strictly one after another; the first unrecoverable chunk aborts the
//! job. Downloads fetch each requested chunk from the first node that has it
//! and reassemble by sequence number. A failed download never yields data.

use bytes::{Bytes, BytesMut};
use serde::Serialize;
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::client::leader::LeaderLocator;
use crate::client::registry::NodeRegistry;
use crate::client::transport::HttpTransport;
use crate::common::{Error, NodeAttempt, Result};

/// Maximum chunk payload (1 MiB)
pub const CHUNK_SIZE: usize = 1024 * 1024;

/// One ordered slice of a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub file_id: String,
    /// 1-based
    pub sequence: u64,
    pub payload: Bytes,
}

/// Number of chunks needed for `size` bytes
pub fn chunk_count(size: usize) -> u64 {
    size.div_ceil(CHUNK_SIZE) as u64
}

/// Byte range of chunk `sequence` (1-based) in a file of `size` bytes
pub fn chunk_range(size: usize, sequence: u64) -> Range<usize> {
    let index = sequence.saturating_sub(1) as usize;
    let start = index.saturating_mul(CHUNK_SIZE).min(size);
    let end = start.saturating_add(CHUNK_SIZE).min(size);
    start..end
}

/// Split `data` into chunks `1..=N` without copying
pub fn split_chunks<'a>(file_id: &'a str, data: &'a Bytes) -> impl Iterator<Item = Chunk> + 'a {
    (1..=chunk_count(data.len())).map(move |sequence| Chunk {
        file_id: file_id.to_string(),
        sequence,
        payload: data.slice(chunk_range(data.len(), sequence)),
    })
}

/// Parse a comma-separated chunk list such as `"1, 2,3"`.
///
/// Each token is read up to its first non-digit, so `"2abc"` is 2 and `"1.5"`
/// is 1. Tokens without leading digits, negative numbers and zero are
/// dropped; if nothing survives the result is `[1]`.
pub fn parse_chunk_sequences(input: &str) -> Vec<u64> {
    let parsed: Vec<u64> = input.split(',').filter_map(leading_number).collect();
    normalize_sequences(&parsed)
}

fn leading_number(token: &str) -> Option<u64> {
    let token = token.trim_start();
    let token = token.strip_prefix('+').unwrap_or(token);
    let end = token
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(token.len());
    token[..end].parse().ok()
}

/// Drop zeros and duplicates (first occurrence wins), default to `[1]`
pub fn normalize_sequences(sequences: &[u64]) -> Vec<u64> {
    let mut out: Vec<u64> = Vec::with_capacity(sequences.len());
    for &sequence in sequences {
        if sequence > 0 && !out.contains(&sequence) {
            out.push(sequence);
        }
    }
    if out.is_empty() {
        out.push(1);
    }
    out
}

/// Concatenate chunk payloads in ascending sequence order
pub fn reassemble(mut chunks: Vec<Chunk>) -> Bytes {
    chunks.sort_by_key(|c| c.sequence);
    let len = chunks.iter().map(|c| c.payload.len()).sum();
    let mut buf = BytesMut::with_capacity(len);
    for chunk in &chunks {
        buf.extend_from_slice(&chunk.payload);
    }
    buf.freeze()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferKind {
    Upload,
    Download,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferState {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl TransferState {
    fn can_become(self, next: TransferState) -> bool {
        matches!(
            (self, next),
            (TransferState::Pending, TransferState::InProgress)
                | (TransferState::InProgress, TransferState::Completed)
                | (TransferState::InProgress, TransferState::Failed)
        )
    }
}

/// Chunks done out of chunks planned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TransferProgress {
    pub completed: u64,
    pub total: u64,
}

impl TransferProgress {
    /// Whole percent, rounded
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.completed as f64 / self.total as f64) * 100.0).round() as u8
    }
}

/// Bookkeeping for one upload or download; lives only as long as the call
#[derive(Debug, Clone, Serialize)]
pub struct TransferJob {
    pub id: Uuid,
    pub kind: TransferKind,
    pub file_id: String,
    pub total_chunks: u64,
    pub completed_chunks: u64,
    pub state: TransferState,
    pub last_error: Option<String>,
}

impl TransferJob {
    pub fn new(kind: TransferKind, file_id: &str, total_chunks: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            file_id: file_id.to_string(),
            total_chunks,
            completed_chunks: 0,
            state: TransferState::Pending,
            last_error: None,
        }
    }

    fn transition(&mut self, next: TransferState) {
        if self.state.can_become(next) {
            self.state = next;
        } else {
            warn!(
                job = %self.id,
                from = ?self.state,
                to = ?next,
                "Ignoring illegal transfer state change"
            );
        }
    }

    pub fn start(&mut self) {
        self.transition(TransferState::InProgress);
    }

    pub fn record_chunk(&mut self) {
        if self.state == TransferState::InProgress {
            self.completed_chunks += 1;
        }
    }

    pub fn complete(&mut self) {
        self.transition(TransferState::Completed);
    }

    pub fn fail(&mut self, error: &Error) {
        self.last_error = Some(error.to_string());
        self.transition(TransferState::Failed);
    }

    pub fn progress(&self) -> TransferProgress {
        TransferProgress {
            completed: self.completed_chunks,
            total: self.total_chunks,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(
            self.state,
            TransferState::Completed | TransferState::Failed
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    pub job_id: Uuid,
    pub file_id: String,
    pub total_chunks: u64,
    pub total_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct DownloadReport {
    pub job_id: Uuid,
    pub file_id: String,
    /// Retrieved sequences, ascending
    pub sequences: Vec<u64>,
    pub data: Bytes,
}

/// Moves files in and out of the cluster chunk by chunk
pub struct ChunkTransferEngine {
    registry: Arc<NodeRegistry>,
    locator: Arc<LeaderLocator>,
    transport: HttpTransport,
}

impl ChunkTransferEngine {
    pub fn new(
        registry: Arc<NodeRegistry>,
        locator: Arc<LeaderLocator>,
        transport: HttpTransport,
    ) -> Self {
        Self {
            registry,
            locator,
            transport,
        }
    }

    pub async fn upload_file(&self, file_id: &str, data: Bytes) -> Result<UploadReport> {
        self.upload_file_with_progress(file_id, data, |_| {}).await
    }

    /// Upload `data` as chunks `1..=N`, one at a time, each to the current leader.
    ///
    /// `on_progress` runs after every accepted chunk.
    pub async fn upload_file_with_progress<F>(
        &self,
        file_id: &str,
        data: Bytes,
        mut on_progress: F,
    ) -> Result<UploadReport>
    where
        F: FnMut(TransferProgress),
    {
        let total = chunk_count(data.len());
        let mut job = TransferJob::new(TransferKind::Upload, file_id, total);
        job.start();
        info!(job = %job.id, file_id, chunks = total, bytes = data.len(), "Upload started");

        for chunk in split_chunks(file_id, &data) {
            if let Err(e) = self.send_to_leader(&chunk).await {
                let err = Error::TransferAborted {
                    file_id: file_id.to_string(),
                    completed: job.completed_chunks,
                    total,
                    source: Box::new(e),
                };
                job.fail(&err);
                warn!(job = %job.id, sequence = chunk.sequence, error = %err, "Upload failed");
                return Err(err);
            }
            job.record_chunk();
            on_progress(job.progress());
        }

        job.complete();
        info!(job = %job.id, file_id, chunks = total, "Upload completed");

        Ok(UploadReport {
            job_id: job.id,
            file_id: file_id.to_string(),
            total_chunks: total,
            total_bytes: data.len() as u64,
        })
    }

    /// Send one chunk to `target`, or to the resolved leader when `None`.
    pub async fn upload_chunk(
        &self,
        file_id: &str,
        sequence: u64,
        payload: Bytes,
        target: Option<&str>,
    ) -> Result<()> {
        let chunk = Chunk {
            file_id: file_id.to_string(),
            sequence,
            payload,
        };
        match target {
            Some(endpoint) => {
                self.transport
                    .put_chunk(endpoint, file_id, sequence, chunk.payload)
                    .await
            }
            None => self.send_to_leader(&chunk).await,
        }
    }

    async fn send_to_leader(&self, chunk: &Chunk) -> Result<()> {
        let leader = self.locator.resolve().await.ok_or(Error::NoLeader)?;

        let result = self
            .transport
            .put_chunk(
                &leader.endpoint,
                &chunk.file_id,
                chunk.sequence,
                chunk.payload.clone(),
            )
            .await;

        if let Err(e) = &result {
            debug!(
                endpoint = %leader.endpoint,
                sequence = chunk.sequence,
                error = %e,
                "Chunk write to leader failed"
            );
            self.locator.invalidate(&leader);
        }
        result
    }

    pub async fn download_file(&self, file_id: &str, sequences: &[u64]) -> Result<DownloadReport> {
        self.download_file_with_progress(file_id, sequences, |_| {})
            .await
    }

    /// Fetch the requested chunks and return them concatenated by sequence.
    ///
    /// An empty request means chunk 1. All-or-nothing.
    pub async fn download_file_with_progress<F>(
        &self,
        file_id: &str,
        sequences: &[u64],
        mut on_progress: F,
    ) -> Result<DownloadReport>
    where
        F: FnMut(TransferProgress),
    {
        let sequences = normalize_sequences(sequences);
        let mut job = TransferJob::new(TransferKind::Download, file_id, sequences.len() as u64);
        job.start();
        info!(job = %job.id, file_id, chunks = ?sequences, "Download started");

        let mut chunks = Vec::with_capacity(sequences.len());
        for &sequence in &sequences {
            match self.fetch_with_fallback(file_id, sequence, None).await {
                Ok(payload) => {
                    chunks.push(Chunk {
                        file_id: file_id.to_string(),
                        sequence,
                        payload,
                    });
                    job.record_chunk();
                    on_progress(job.progress());
                }
                Err(e) => {
                    job.fail(&e);
                    warn!(job = %job.id, sequence, error = %e, "Download failed");
                    return Err(e);
                }
            }
        }

        let data = reassemble(chunks);
        job.complete();
        info!(job = %job.id, file_id, bytes = data.len(), "Download completed");

        let mut sorted = sequences;
        sorted.sort_unstable();
        Ok(DownloadReport {
            job_id: job.id,
            file_id: file_id.to_string(),
            sequences: sorted,
            data,
        })
    }

    /// Fetch one chunk from `source` only, or from the registry in order when `None`.
    pub async fn download_chunk(
        &self,
        file_id: &str,
        sequence: u64,
        source: Option<&str>,
    ) -> Result<Bytes> {
        self.fetch_with_fallback(file_id, sequence, source).await
    }

    async fn fetch_with_fallback(
        &self,
        file_id: &str,
        sequence: u64,
        source: Option<&str>,
    ) -> Result<Bytes> {
        let candidates: Vec<&str> = match source {
            Some(endpoint) => vec![endpoint],
            None => self.registry.iter().collect(),
        };

        let mut attempts = Vec::new();
        for endpoint in candidates {
            match self.transport.get_chunk(endpoint, file_id, sequence).await {
                Ok(payload) => {
                    debug!(endpoint, file_id, sequence, bytes = payload.len(), "Chunk retrieved");
                    return Ok(payload);
                }
                Err(failure) => {
                    debug!(endpoint, file_id, sequence, reason = %failure, "Chunk fetch failed, trying next node");
                    attempts.push(NodeAttempt {
                        endpoint: endpoint.to_string(),
                        failure,
                    });
                }
            }
        }

        Err(Error::ChunkUnavailable {
            file_id: file_id.to_string(),
            sequence,
            attempts,
        })
    }
}
