use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{check_alpha, check_capacity, MetricsError, Result};

// ─── Defaults ────────────────────────────────────────────────────

/// Tick interval the load-average constants below are calibrated for
pub const TICK_INTERVAL: Duration = Duration::from_secs(5);

/// 1 - e^(-5 / 60 / 1)
pub const M1_ALPHA: f64 = 0.079_955_585_370_676_71;
/// 1 - e^(-5 / 60 / 5)
pub const M5_ALPHA: f64 = 0.016_528_546_178_382_51;
/// 1 - e^(-5 / 60 / 15)
pub const M15_ALPHA: f64 = 0.005_540_151_995_103_271;

/// 1028 elements: 99.9% confidence, 5% margin of error for a normal
/// distribution
pub const DEFAULT_RESERVOIR_SIZE: usize = 1028;

/// Biases the decaying reservoir toward roughly the last five minutes
pub const DEFAULT_DECAY_ALPHA: f64 = 0.015;

pub const DEFAULT_RESCALE_PERIOD: Duration = Duration::from_secs(60 * 60);

/// Largest `alpha * rescale_period_secs` a decaying reservoir accepts.
/// `ln(f64::MAX)` is about 709.8 and dividing by the smallest uniform draw
/// adds up to another ~37 to the exponent of a priority.
pub const MAX_DECAY_EXPONENT: f64 = 600.0;

/// Averaging windows, in minutes, of the three meter rates
pub const RATE_WINDOWS_MINUTES: [f64; 3] = [1.0, 5.0, 15.0];

// ─── Meter ───────────────────────────────────────────────────────

/// Ticking configuration for a [`Meter`](crate::Meter).
///
/// Only the interval is configurable. The smoothing constants are derived
/// from it, so the two can never drift apart and silently change the
/// effective averaging window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterConfig {
    pub tick_interval: Duration,
}

impl Default for MeterConfig {
    fn default() -> Self {
        Self {
            tick_interval: TICK_INTERVAL,
        }
    }
}

impl MeterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval.is_zero() {
            return Err(MetricsError::InvalidTickInterval(self.tick_interval));
        }
        for alpha in self.alphas() {
            check_alpha(alpha)?;
        }
        Ok(())
    }

    /// Smoothing constants for the 1, 5 and 15 minute windows.
    pub fn alphas(&self) -> [f64; 3] {
        RATE_WINDOWS_MINUTES.map(|minutes| alpha_for(self.tick_interval, minutes))
    }
}

/// `1 - e^(-interval / 60 / window)`, the UNIX load-average constant.
pub fn alpha_for(tick_interval: Duration, window_minutes: f64) -> f64 {
    1.0 - (-tick_interval.as_secs_f64() / 60.0 / window_minutes).exp()
}

// ─── Reservoir ───────────────────────────────────────────────────

/// Sizing and decay parameters shared by both reservoir variants.
/// `alpha` and `rescale_period` only matter to the decaying one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservoirConfig {
    pub capacity: usize,
    pub alpha: f64,
    pub rescale_period: Duration,
}

impl Default for ReservoirConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_RESERVOIR_SIZE,
            alpha: DEFAULT_DECAY_ALPHA,
            rescale_period: DEFAULT_RESCALE_PERIOD,
        }
    }
}

impl ReservoirConfig {
    pub fn validate(&self) -> Result<()> {
        check_capacity(self.capacity)?;
        check_alpha(self.alpha)?;
        if self.rescale_period.is_zero() {
            return Err(MetricsError::InvalidRescalePeriod(self.rescale_period));
        }
        if self.alpha * self.rescale_period.as_secs_f64() > MAX_DECAY_EXPONENT {
            return Err(MetricsError::DecayOverflow {
                alpha: self.alpha,
                period: self.rescale_period,
            });
        }
        Ok(())
    }
}
