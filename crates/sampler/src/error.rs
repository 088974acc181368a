//! Sampler Error Types

use thiserror::Error;

/// Errors raised when configuring or starting the sampler
#[derive(Debug, Error)]
pub enum SamplerError {
    /// Configuration rejected before the loop starts
    #[error("Invalid sampler configuration: {0}")]
    InvalidConfig(String),

    /// The dedicated sampler thread could not be spawned
    #[error("Failed to spawn sampler thread: {0}")]
    Spawn(#[from] std::io::Error),
}
