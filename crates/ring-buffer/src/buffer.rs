//! Lock-Free Ring Buffer Implementation

use crate::{Reading, RingBufferError};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Default buffer capacity (512 readings, ~2 min at one reading per 95.6ms)
pub const DEFAULT_CAPACITY: usize = 512;

/// Fixed-capacity ring of readings.
///
/// Every slot always holds a reading: the oldest one sits at `cursor` and the
/// newest at `cursor - 1 (mod N)`. Slots are single atomic words so a reader
/// racing the writer sees either the old or the new reading, never a mix.
///
/// There must be exactly one writer calling [`RingBuffer::append`]; readers
/// may be on any thread.
pub struct RingBuffer {
    /// Pre-allocated storage, one packed reading per slot
    slots: Box<[AtomicU64]>,
    /// Next slot to be written
    cursor: AtomicUsize,
    /// Total readings appended (for statistics)
    total_written: AtomicU64,
}

impl RingBuffer {
    /// Create a new ring buffer, rejecting a zero capacity
    pub fn try_new(capacity: usize) -> Result<Self, RingBufferError> {
        if capacity == 0 {
            return Err(RingBufferError::ZeroCapacity);
        }
        let slots: Vec<AtomicU64> = (0..capacity)
            .map(|_| AtomicU64::new(Reading::default().pack()))
            .collect();
        Ok(Self {
            slots: slots.into_boxed_slice(),
            cursor: AtomicUsize::new(0),
            total_written: AtomicU64::new(0),
        })
    }

    /// Create a new ring buffer with given capacity
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        match Self::try_new(capacity) {
            Ok(buffer) => buffer,
            Err(e) => panic!("{e}"),
        }
    }

    /// Create a buffer with default capacity (512 readings)
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Append a reading, overwriting the oldest one
    pub fn append(&self, reading: Reading) {
        let cursor = self.cursor.load(Ordering::Relaxed);
        self.slots[cursor].store(reading.pack(), Ordering::Relaxed);

        // Release orders the slot store before the new cursor becomes visible.
        self.cursor
            .store((cursor + 1) % self.slots.len(), Ordering::Release);
        self.total_written.fetch_add(1, Ordering::Relaxed);
    }

    /// Current write cursor, i.e. the slot of the oldest reading.
    ///
    /// Readers use this to freeze the end of a traversal.
    pub fn snapshot_end(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }

    /// Read the slot at `index` (reduced modulo capacity)
    pub fn at(&self, index: usize) -> Reading {
        Reading::unpack(self.slots[index % self.slots.len()].load(Ordering::Relaxed))
    }

    /// Most recently appended reading
    pub fn newest(&self) -> Reading {
        let end = self.snapshot_end();
        self.at(end + self.slots.len() - 1)
    }

    /// Iterate one full cycle, oldest first, from a frozen end
    pub fn iter_snapshot(&self) -> SnapshotIter<'_> {
        let end = self.snapshot_end();
        SnapshotIter {
            buffer: self,
            position: end,
            remaining: self.slots.len(),
        }
    }

    /// Get the buffer capacity
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Get total readings appended (for statistics)
    pub fn total_written(&self) -> u64 {
        self.total_written.load(Ordering::Relaxed)
    }

    /// Whether every slot has been written at least once
    pub fn is_primed(&self) -> bool {
        self.total_written() >= self.slots.len() as u64
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .field("cursor", &self.snapshot_end())
            .field("total_written", &self.total_written())
            .finish()
    }
}

/// Iterator over one snapshot of a [`RingBuffer`], oldest first
pub struct SnapshotIter<'a> {
    buffer: &'a RingBuffer,
    position: usize,
    remaining: usize,
}

impl Iterator for SnapshotIter<'_> {
    type Item = Reading;

    fn next(&mut self) -> Option<Reading> {
        if self.remaining == 0 {
            return None;
        }
        let reading = self.buffer.at(self.position);
        self.position = (self.position + 1) % self.buffer.capacity();
        self.remaining -= 1;
        Some(reading)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for SnapshotIter<'_> {}
