//! Readings Route
//!
//! Streams the whole ring as one chunked JSON array. Each request owns its
//! serializer; the body stream holds it, so the state goes away when the
//! document is finished or when the client disconnects mid-stream.

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use futures::stream::{self, Stream};
use ring_buffer::RingBuffer;
use snapshot::{SnapshotSerializer, MIN_CHUNK_LEN};
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::{ApiError, AppState};

/// Counts one in-flight snapshot for as long as it lives
#[derive(Debug)]
pub struct ActiveSnapshot {
    counter: Arc<AtomicUsize>,
}

impl ActiveSnapshot {
    pub fn acquire(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self {
            counter: Arc::clone(counter),
        }
    }
}

impl Drop for ActiveSnapshot {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Per-request serialization state
pub struct SnapshotBody {
    serializer: SnapshotSerializer<Arc<RingBuffer>>,
    scratch: Vec<u8>,
    _active: ActiveSnapshot,
}

impl SnapshotBody {
    /// Freeze the ring's cursor and reserve one chunk of scratch space.
    ///
    /// Chunks are never smaller than [`MIN_CHUNK_LEN`]: below that the
    /// serializer only emits filler and the document would never end.
    pub fn new(state: &AppState) -> Result<Self, ApiError> {
        let chunk_size = state.chunk_size.max(MIN_CHUNK_LEN);
        let mut scratch = Vec::new();
        scratch
            .try_reserve_exact(chunk_size)
            .map_err(|_| ApiError::ResourceExhausted(chunk_size))?;
        scratch.resize(chunk_size, 0);

        let serializer = SnapshotSerializer::new(Arc::clone(&state.buffer));
        debug!("Snapshot started at cursor {}", serializer.end());

        Ok(Self {
            serializer,
            scratch,
            _active: ActiveSnapshot::acquire(&state.active_snapshots),
        })
    }

    /// Next body chunk, or `None` once the document is complete
    fn next_chunk(&mut self) -> Option<Bytes> {
        let chunk = self.serializer.produce_next(&mut self.scratch);
        if chunk.done {
            return None;
        }
        Some(Bytes::copy_from_slice(&self.scratch[..chunk.len]))
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
        stream::unfold(self, |mut body| async move {
            body.next_chunk().map(|bytes| (Ok(bytes), body))
        })
    }
}

/// GET /readings
pub async fn get_readings(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let body = SnapshotBody::new(&state)?;
    metrics::counter!("volta_snapshot_requests_total").increment(1);

    Ok((
        [(header::CONTENT_TYPE, "application/json")],
        Body::from_stream(body.into_stream()),
    )
        .into_response())
}
