//! Ring Buffer Error Types

use thiserror::Error;

/// Errors raised when constructing a ring buffer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RingBufferError {
    /// A ring needs at least one slot
    #[error("Ring buffer capacity must be greater than zero")]
    ZeroCapacity,
}
