//! Compact Record Encoding

use ring_buffer::Reading;
use std::fmt::{self, Write};

/// Longest encoded record: `,{"t":4294967295,"v":-999999900000000}]\n`
pub const MAX_RECORD_LEN: usize = 40;

/// JSON rendering of a reading value in the style of `%g`.
///
/// Plain decimal for `1e-4 <= |v| < 1e15`, exponent form otherwise, `null`
/// for values JSON cannot express. Never longer than 16 bytes.
#[derive(Debug, Clone, Copy)]
pub struct JsonNumber(pub f32);

impl fmt::Display for JsonNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.0;
        if !v.is_finite() {
            return f.write_str("null");
        }
        let magnitude = v.abs();
        if magnitude == 0.0 || (1e-4..1e15).contains(&magnitude) {
            write!(f, "{v}")
        } else {
            write!(f, "{v:e}")
        }
    }
}

/// One encoded record on the stack
pub(crate) struct RecordBuf {
    bytes: [u8; MAX_RECORD_LEN],
    len: usize,
}

impl RecordBuf {
    fn new() -> Self {
        Self {
            bytes: [0; MAX_RECORD_LEN],
            len: 0,
        }
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl Write for RecordBuf {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.len + s.len();
        if end > MAX_RECORD_LEN {
            return Err(fmt::Error);
        }
        self.bytes[self.len..end].copy_from_slice(s.as_bytes());
        self.len = end;
        Ok(())
    }
}

/// Encode `prefix{"t":..,"v":..}suffix`.
///
/// Falls back to a `null` value if the number would not fit, which keeps the
/// document well-formed.
pub(crate) fn encode_record(prefix: &str, reading: Reading, suffix: &str) -> RecordBuf {
    let mut record = RecordBuf::new();
    let written = write!(
        record,
        "{prefix}{{\"t\":{},\"v\":{}}}{suffix}",
        reading.timestamp_ms,
        JsonNumber(reading.value)
    );
    if written.is_err() {
        record = RecordBuf::new();
        let _ = write!(
            record,
            "{prefix}{{\"t\":{},\"v\":null}}{suffix}",
            reading.timestamp_ms
        );
    }
    record
}
