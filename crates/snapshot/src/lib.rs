//! Chunked Snapshot Serialization
//!
//! Streams the full contents of a [`ring_buffer::RingBuffer`] as one JSON
//! array, in chunks whose sizes are chosen by the transport.

mod format;
mod serializer;

pub use format::{JsonNumber, MAX_RECORD_LEN};
pub use serializer::{Chunk, SnapshotSerializer, FILLER, MIN_CHUNK_LEN, TAIL_RESERVE};
