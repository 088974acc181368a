//! Lock-Free Ring Buffer
//!
//! Fixed-capacity history of timestamped readings with a single writer and
//! any number of concurrent readers.

mod buffer;
mod error;

pub use buffer::{RingBuffer, SnapshotIter, DEFAULT_CAPACITY};
pub use error::RingBufferError;

use serde::{Deserialize, Serialize};

/// One published measurement
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Milliseconds since the sampler clock origin (wraps at 2^32)
    #[serde(rename = "t")]
    pub timestamp_ms: u32,
    /// Reduced value for the window
    #[serde(rename = "v")]
    pub value: f32,
}

impl Reading {
    /// Create a new reading
    pub fn new(timestamp_ms: u32, value: f32) -> Self {
        Self { timestamp_ms, value }
    }

    /// Pack into a single word: timestamp in the high half, value bits in the low half
    pub(crate) fn pack(self) -> u64 {
        (u64::from(self.timestamp_ms) << 32) | u64::from(self.value.to_bits())
    }

    pub(crate) fn unpack(word: u64) -> Self {
        Self {
            timestamp_ms: (word >> 32) as u32,
            value: f32::from_bits(word as u32),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_preserves_fields() {
        let reading = Reading::new(u32::MAX, -12.5);
        assert_eq!(Reading::unpack(reading.pack()), reading);

        let zero = Reading::default();
        assert_eq!(zero.pack(), 0);
    }
}
