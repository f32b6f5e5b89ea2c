//! Conversion error taxonomy.

use thiserror::Error;

/// Errors raised by rate refreshes and payment-grade conversions.
///
/// Display paths recover from every variant locally; payment paths surface
/// them to the caller. The type is `Clone` so one refresh outcome can be
/// handed to every caller that joined the same in-flight fetch.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum FxError {
    /// No rate could be derived for the pair from the current cache.
    #[error("Rate not available for {from}/{to}")]
    RateUnavailable { from: String, to: String },

    /// The rate provider failed or returned an unexpected shape.
    #[error("Rate provider error: {0}")]
    Provider(String),

    /// The rate provider did not answer within the configured bound.
    #[error("Rate provider timed out after {0} ms")]
    Timeout(u64),

    /// Persisted cache data failed shape or age validation.
    #[error("Persisted rate cache is corrupt: {0}")]
    CacheCorruption(String),

    /// Amount is NaN, infinite or negative.
    #[error("Invalid amount: {0}")]
    InvalidAmount(f64),

    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),
}

impl FxError {
    pub fn unavailable(from: &str, to: &str) -> Self {
        FxError::RateUnavailable {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

pub type FxResult<T> = Result<T, FxError>;
