//! Error types for synthesis gateway operations.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for synthesis operations.
pub type Result<T> = std::result::Result<T, SynthesisError>;

/// Error type for synthesis gateway operations.
///
/// The enum is `Clone` so that a single failed synthesis attempt can be
/// handed to every caller waiting on it; transport-level causes are
/// stringified at this boundary for the same reason.
#[derive(Debug, Clone, Error)]
pub enum SynthesisError {
    /// The provider rejected the request due to rate limiting.
    #[error("synthesis rate limited")]
    RateLimited {
        /// Provider-suggested wait before retrying, if any.
        retry_after: Option<Duration>,
    },

    /// The provider rejected the request as invalid.
    #[error("invalid synthesis request: {0}")]
    InvalidRequest(String),

    /// The provider is unavailable (server-side failure).
    #[error("synthesis provider unavailable: {0}")]
    Unavailable(String),

    /// The request never reached a provider response.
    #[error("synthesis transport error: {0}")]
    Transport(String),

    /// The provider responded but the audio payload was undecodable.
    #[error("synthesis audio decode error: {0}")]
    Decode(String),
}

impl SynthesisError {
    /// Returns true if this is a rate limit error.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, SynthesisError::RateLimited { .. })
    }

    /// Returns true if the request can be retried.
    ///
    /// Invalid requests and undecodable payloads are deterministic —
    /// retrying them would just burn provider quota.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SynthesisError::RateLimited { .. }
                | SynthesisError::Unavailable(_)
                | SynthesisError::Transport(_)
        )
    }
}
