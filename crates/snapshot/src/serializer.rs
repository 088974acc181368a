//! Resumable Snapshot Serializer

use crate::format::encode_record;
use ring_buffer::RingBuffer;
use std::ops::Deref;
use tracing::debug;

/// Offers smaller than this only receive filler
pub const MIN_CHUNK_LEN: usize = 64;

/// Bytes kept free at the tail of each chunk for one more record and `]\n`
pub const TAIL_RESERVE: usize = 64;

/// Byte used to pad offers below [`MIN_CHUNK_LEN`]; JSON ignores whitespace
pub const FILLER: u8 = b' ';

/// Result of one [`SnapshotSerializer::produce_next`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Bytes written to the front of the output buffer
    pub len: usize,
    /// The document is complete and nothing was written
    pub done: bool,
}

/// Produces `[{"t":..,"v":..},...]\n` for one frozen cycle of a ring buffer,
/// across as many calls as the transport needs.
///
/// The cycle is fixed when the serializer is created: it starts at the
/// oldest slot (`end`) and stops when the read position wraps back to it.
/// Dropping the serializer releases the request's state, whether or not the
/// document was finished.
pub struct SnapshotSerializer<R> {
    buffer: R,
    /// Writer cursor frozen at request start
    end: usize,
    /// Next slot to serialize
    position: usize,
    calls: usize,
    opened: bool,
    closed: bool,
}

impl<R> SnapshotSerializer<R>
where
    R: Deref<Target = RingBuffer>,
{
    /// Freeze the buffer's current cursor and start a new document
    pub fn new(buffer: R) -> Self {
        let end = buffer.snapshot_end();
        Self {
            buffer,
            end,
            position: end,
            calls: 0,
            opened: false,
            closed: false,
        }
    }

    /// Fill the front of `out` with the next part of the document.
    ///
    /// Never writes more than `out.len()` bytes and never splits a record.
    /// Offers of at least [`MIN_CHUNK_LEN`] bytes always make progress until
    /// the document is closed; after that the call returns `done`.
    pub fn produce_next(&mut self, out: &mut [u8]) -> Chunk {
        self.calls += 1;
        let max_len = out.len();

        if max_len < MIN_CHUNK_LEN {
            out.fill(FILLER);
            return Chunk {
                len: max_len,
                done: false,
            };
        }

        let budget = max_len - TAIL_RESERVE;
        let mut len = 0;

        if !self.opened {
            self.opened = true;
            len += self.emit_record(&mut out[len..], "[");
        }

        while !self.closed && len <= budget {
            len += self.emit_record(&mut out[len..], ",");
        }

        if len == 0 {
            debug!(
                "Snapshot at cursor {} complete after {} calls",
                self.end, self.calls
            );
            return Chunk { len, done: true };
        }

        Chunk { len, done: false }
    }

    /// Write the record at the read position and advance it
    fn emit_record(&mut self, out: &mut [u8], prefix: &str) -> usize {
        let reading = self.buffer.at(self.position);
        self.position = (self.position + 1) % self.buffer.capacity();

        let suffix = if self.position == self.end {
            self.closed = true;
            "]\n"
        } else {
            ""
        };

        let record = encode_record(prefix, reading, suffix);
        let bytes = record.as_bytes();
        out[..bytes.len()].copy_from_slice(bytes);
        bytes.len()
    }

    /// Drain the whole document using offers of `chunk_len` bytes
    /// (raised to [`MIN_CHUNK_LEN`] if smaller)
    pub fn collect_document(mut self, chunk_len: usize) -> Vec<u8> {
        let mut scratch = vec![0u8; chunk_len.max(MIN_CHUNK_LEN)];
        let mut document = Vec::new();
        loop {
            let chunk = self.produce_next(&mut scratch);
            if chunk.done {
                return document;
            }
            document.extend_from_slice(&scratch[..chunk.len]);
        }
    }

    /// Cursor value frozen when the request started
    pub fn end(&self) -> usize {
        self.end
    }

    /// Next slot to be serialized
    pub fn position(&self) -> usize {
        self.position
    }

    /// Number of `produce_next` calls so far
    pub fn calls(&self) -> usize {
        self.calls
    }

    /// Whether the closing bracket has been written
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MAX_RECORD_LEN;
    use proptest::prelude::*;
    use ring_buffer::Reading;
    use std::sync::Arc;

    const SCENARIO: &str =
        "[{\"t\":20,\"v\":2},{\"t\":30,\"v\":3},{\"t\":40,\"v\":4},{\"t\":50,\"v\":5}]\n";

    /// N = 4 with five appends: the first one has been evicted
    fn scenario_buffer() -> RingBuffer {
        let buffer = RingBuffer::new(4);
        for i in 1..=5u32 {
            buffer.append(Reading::new(i * 10, i as f32));
        }
        buffer
    }

    fn drain(serializer: &mut SnapshotSerializer<&RingBuffer>, offers: &[usize]) -> Vec<u8> {
        let mut document = Vec::new();
        let last = offers.last().copied().unwrap_or(9999);
        let mut offers = offers.iter().copied();
        loop {
            let mut out = vec![0u8; offers.next().unwrap_or(last)];
            let chunk = serializer.produce_next(&mut out);
            assert!(chunk.len <= out.len());
            if chunk.done {
                return document;
            }
            document.extend_from_slice(&out[..chunk.len]);
        }
    }

    #[test]
    fn test_scenario_single_call() {
        let buffer = scenario_buffer();
        let mut serializer = SnapshotSerializer::new(&buffer);

        let mut out = vec![0u8; 9999];
        let chunk = serializer.produce_next(&mut out);
        assert_eq!(&out[..chunk.len], SCENARIO.as_bytes());
        assert!(!chunk.done);
        assert!(serializer.is_closed());

        // Next call writes nothing and signals the end
        assert_eq!(
            serializer.produce_next(&mut out),
            Chunk { len: 0, done: true }
        );
    }

    #[test]
    fn test_scenario_split_calls_match() {
        let buffer = scenario_buffer();
        let mut serializer = SnapshotSerializer::new(&buffer);
        let document = drain(&mut serializer, &[80, 80, 9999]);
        assert_eq!(String::from_utf8(document).unwrap(), SCENARIO);
        assert!(serializer.calls() >= 3);
    }

    #[test]
    fn test_small_offer_is_filler_only() {
        let buffer = scenario_buffer();
        let mut serializer = SnapshotSerializer::new(&buffer);

        for len in [0, 1, 10, MIN_CHUNK_LEN - 1] {
            let mut out = vec![b'x'; len];
            let chunk = serializer.produce_next(&mut out);
            assert_eq!(chunk, Chunk { len, done: false });
            assert!(out.iter().all(|&b| b == FILLER));
            assert_eq!(serializer.position(), serializer.end());
        }

        // The document still starts with its opening bracket afterwards
        let document = drain(&mut serializer, &[9999]);
        assert_eq!(String::from_utf8(document).unwrap(), SCENARIO);
    }

    #[test]
    fn test_minimum_offer_makes_progress() {
        let buffer = scenario_buffer();
        let mut serializer = SnapshotSerializer::new(&buffer);

        let mut out = [0u8; MIN_CHUNK_LEN];
        let mut records = 0;
        loop {
            let chunk = serializer.produce_next(&mut out);
            if chunk.done {
                break;
            }
            assert!(chunk.len > 0);
            records += 1;
        }
        // One record per call at the minimum size
        assert_eq!(records, 4);
    }

    #[test]
    fn test_single_slot_buffer() {
        let buffer = RingBuffer::new(1);
        buffer.append(Reading::new(7, 1.5));
        let document = SnapshotSerializer::new(&buffer).collect_document(64);
        assert_eq!(document, b"[{\"t\":7,\"v\":1.5}]\n");
    }

    #[test]
    fn test_cold_buffer_serializes_zero_records() {
        let buffer = RingBuffer::new(2);
        let document = SnapshotSerializer::new(&buffer).collect_document(128);
        assert_eq!(document, b"[{\"t\":0,\"v\":0},{\"t\":0,\"v\":0}]\n");
    }

    #[test]
    fn test_snapshot_frozen_while_writer_continues() {
        let buffer = Arc::new(scenario_buffer());
        let mut serializer = SnapshotSerializer::new(Arc::clone(&buffer));

        let mut out = vec![0u8; 80];
        let first = serializer.produce_next(&mut out);
        let mut document = out[..first.len].to_vec();

        // Writer appends two more while the request is in flight
        buffer.append(Reading::new(60, 6.0));
        buffer.append(Reading::new(70, 7.0));

        let rest = serializer.collect_document(9999);
        document.extend_from_slice(&rest);

        let parsed: Vec<serde_json::Value> = serde_json::from_slice(&document).unwrap();
        // Still exactly N records, bounded by the cursor frozen at start
        assert_eq!(parsed.len(), 4);
        assert_eq!(parsed[3]["t"], 50);
    }

    #[test]
    fn test_non_finite_values_stay_valid_json() {
        let buffer = RingBuffer::new(2);
        buffer.append(Reading::new(1, f32::NAN));
        buffer.append(Reading::new(2, f32::INFINITY));
        let document = SnapshotSerializer::new(&buffer).collect_document(256);
        let parsed: serde_json::Value = serde_json::from_slice(&document).unwrap();
        assert!(parsed[0]["v"].is_null());
        assert!(parsed[1]["v"].is_null());
    }

    proptest! {
        #[test]
        fn prop_any_chunking_yields_same_document(
            capacity in 1usize..40,
            appends in 0usize..100,
            offers in prop::collection::vec(0usize..300, 1..40),
            values in prop::collection::vec(any::<f32>(), 100),
        ) {
            let buffer = RingBuffer::new(capacity);
            for i in 0..appends {
                buffer.append(Reading::new(i as u32 * 7, values[i]));
            }
            let reference = SnapshotSerializer::new(&buffer).collect_document(1 << 16);

            let mut serializer = SnapshotSerializer::new(&buffer);
            let mut document = Vec::new();
            let mut offers = offers.into_iter().chain(std::iter::repeat(MIN_CHUNK_LEN));
            loop {
                let offer = offers.next().unwrap_or(MIN_CHUNK_LEN);
                let mut out = vec![0u8; offer];
                let before = serializer.position();
                let was_closed = serializer.is_closed();
                let chunk = serializer.produce_next(&mut out);

                // No overflow
                prop_assert!(chunk.len <= offer);
                if offer < MIN_CHUNK_LEN {
                    prop_assert_eq!(chunk.len, offer);
                    prop_assert_eq!(serializer.position(), before);
                    continue;
                }
                if chunk.done {
                    prop_assert!(was_closed);
                    break;
                }
                // Progress on every usable offer
                prop_assert!(chunk.len > 0);
                prop_assert!(chunk.len <= offer.saturating_sub(TAIL_RESERVE) + MAX_RECORD_LEN);
                document.extend_from_slice(&out[..chunk.len]);
            }

            prop_assert_eq!(&document, &reference);

            // Exactly N records, oldest first
            let parsed: Vec<serde_json::Value> = serde_json::from_slice(&document).unwrap();
            prop_assert_eq!(parsed.len(), capacity);
            let end = buffer.snapshot_end();
            for (k, record) in parsed.iter().enumerate() {
                let expected = buffer.at(end + k).timestamp_ms;
                prop_assert_eq!(record["t"].as_u64(), Some(u64::from(expected)));
            }
        }
    }
}
