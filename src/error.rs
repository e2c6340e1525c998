// =============================================================================
// Engine error taxonomy
// =============================================================================
//
// None of these are fatal to the process. Each variant is recovered locally by
// the component that raises it; the worst outcome is a stale or degraded (but
// well-formed) snapshot.
//
//   UpstreamUnavailable  -> pipeline reuses the last good series / price
//   InsufficientHistory  -> indicator falls back to its degraded value
//   DataIntegrity        -> candle batch rejected, prior series kept
//   PublishFault         -> only the failing subscriber is dropped
// =============================================================================

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("upstream {provider} unavailable: {reason}")]
    UpstreamUnavailable { provider: String, reason: String },

    #[error("{indicator} needs {required} data points, have {available}")]
    InsufficientHistory {
        indicator: &'static str,
        required: usize,
        available: usize,
    },

    #[error("candle data integrity violation: {0}")]
    DataIntegrity(String),

    #[error("publish to subscriber {subscriber} failed: {reason}")]
    PublishFault { subscriber: Uuid, reason: String },
}

impl EngineError {
    pub fn upstream(provider: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::UpstreamUnavailable {
            provider: provider.into(),
            reason: reason.to_string(),
        }
    }

    /// `Ok(())` when `available >= required`, otherwise an
    /// [`EngineError::InsufficientHistory`] describing the shortfall.
    pub fn check_history(
        indicator: &'static str,
        required: usize,
        available: usize,
    ) -> Result<(), Self> {
        if available >= required {
            Ok(())
        } else {
            Err(Self::InsufficientHistory {
                indicator,
                required,
                available,
            })
        }
    }
}
