use std::time::Duration;

use thiserror::Error;

/// Construction-time failures. Every hot-path operation is infallible and
/// reports degenerate states through sentinel values instead.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A reservoir needs room for at least one value
    #[error("reservoir capacity must be positive, got {0}")]
    InvalidCapacity(usize),

    /// Smoothing and decay constants must lie strictly inside (0, 1)
    #[error("alpha must be within (0, 1), got {0}")]
    InvalidAlpha(f64),

    #[error("tick interval must be positive, got {0:?}")]
    InvalidTickInterval(Duration),

    #[error("rescale period must be positive, got {0:?}")]
    InvalidRescalePeriod(Duration),

    /// Weights would overflow before the next landmark rescale
    #[error("decay alpha {alpha} over a {period:?} rescale period overflows f64 weights")]
    DecayOverflow { alpha: f64, period: Duration },

    /// Averaging windows are whole or fractional minutes, strictly positive
    #[error("averaging window must be a positive number of minutes, got {0}")]
    InvalidWindow(f64),

    /// `Meter` spawns its ticker on the ambient tokio runtime
    #[error("meter must be created inside a tokio runtime")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, MetricsError>;

pub(crate) fn check_alpha(alpha: f64) -> Result<f64> {
    if alpha > 0.0 && alpha < 1.0 {
        Ok(alpha)
    } else {
        Err(MetricsError::InvalidAlpha(alpha))
    }
}

pub(crate) fn check_capacity(capacity: usize) -> Result<usize> {
    if capacity == 0 {
        return Err(MetricsError::InvalidCapacity(capacity));
    }
    Ok(capacity)
}
