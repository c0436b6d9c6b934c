use std::time::Duration;

use parking_lot::Mutex;

use crate::config::{alpha_for, M15_ALPHA, M1_ALPHA, M5_ALPHA, TICK_INTERVAL};
use crate::error::{check_alpha, MetricsError, Result};

/// Exponentially-weighted moving average of a rate, ticked at a fixed
/// interval.
///
/// Calibrated the way the UNIX load average is: see "UNIX Load Average
/// Part 1: How It Works" and "Part 2: Not Your Average Average".
///
/// Updaters and the ticker may run on different threads; the accumulator
/// and the smoothed rate live behind one lock so a tick reads and resets
/// the accumulator atomically with respect to concurrent updates.
#[derive(Debug)]
pub struct Ewma {
    interval_secs: f64,
    alpha: f64,
    state: Mutex<EwmaState>,
}

#[derive(Debug, Default)]
struct EwmaState {
    uncounted: f64,
    rate: f64,
    initialized: bool,
}

impl Ewma {
    /// Average over `window_minutes` when ticked every `interval`.
    ///
    /// The smoothing constant is derived from the pair, so ticking at a
    /// different interval than the one given here skews the window.
    pub fn new(interval: Duration, window_minutes: f64) -> Result<Self> {
        if interval.is_zero() {
            return Err(MetricsError::InvalidTickInterval(interval));
        }
        if !(window_minutes.is_finite() && window_minutes > 0.0) {
            return Err(MetricsError::InvalidWindow(window_minutes));
        }
        Ok(Self {
            interval_secs: interval.as_secs_f64(),
            alpha: check_alpha(alpha_for(interval, window_minutes))?,
            state: Mutex::new(EwmaState::default()),
        })
    }

    pub fn one_minute() -> Self {
        Self::calibrated(M1_ALPHA)
    }

    pub fn five_minute() -> Self {
        Self::calibrated(M5_ALPHA)
    }

    pub fn fifteen_minute() -> Self {
        Self::calibrated(M15_ALPHA)
    }

    /// Default 5 s interval paired with one of its precomputed constants.
    fn calibrated(alpha: f64) -> Self {
        Self {
            interval_secs: TICK_INTERVAL.as_secs_f64(),
            alpha,
            state: Mutex::new(EwmaState::default()),
        }
    }

    /// Add to the uncounted total. Not visible in `rate()` until the next tick.
    pub fn update(&self, value: f64) {
        self.state.lock().uncounted += value;
    }

    /// Fold everything seen since the last tick into the smoothed rate.
    pub fn tick(&self) {
        let mut state = self.state.lock();
        let instant_rate = std::mem::take(&mut state.uncounted) / self.interval_secs;
        if state.initialized {
            state.rate += self.alpha * (instant_rate - state.rate);
        } else {
            state.rate = instant_rate;
            state.initialized = true;
        }
    }

    /// Smoothed events per second.
    pub fn rate(&self) -> f64 {
        self.state.lock().rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_is_zero_until_first_tick() {
        let ewma = Ewma::one_minute();
        ewma.update(10.0);
        assert_eq!(ewma.rate(), 0.0);
    }

    #[test]
    fn first_tick_takes_instant_rate() {
        let ewma = Ewma::one_minute();
        ewma.update(3.0);
        ewma.tick();
        assert!((ewma.rate() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn one_minute_decays_like_load_average() {
        let ewma = Ewma::one_minute();
        ewma.update(3.0);
        ewma.tick();

        // after one minute of idle ticks: 0.6 * e^-1
        for _ in 0..12 {
            ewma.tick();
        }
        assert!((ewma.rate() - 0.220_727_66).abs() < 1e-6);
    }

    #[test]
    fn fifteen_minute_decays_slowly() {
        let ewma = Ewma::fifteen_minute();
        ewma.update(3.0);
        ewma.tick();

        for _ in 0..12 {
            ewma.tick();
        }
        // 0.6 * e^(-1/15)
        assert!((ewma.rate() - 0.561_304_19).abs() < 1e-6);
    }

    #[test]
    fn constant_input_converges_to_per_second_rate() {
        for (minutes, alpha) in [(1.0, M1_ALPHA), (5.0, M5_ALPHA), (15.0, M15_ALPHA)] {
            let ewma = Ewma::new(TICK_INTERVAL, minutes).unwrap();
            // seed away from the target so convergence is observable
            ewma.tick();
            let target = 7.0 / 5.0;
            for k in 1..=5000 {
                ewma.update(7.0);
                ewma.tick();
                let bound = target * (1.0 - alpha).powi(k) + 1e-9;
                assert!((ewma.rate() - target).abs() <= bound);
            }
            assert!((ewma.rate() - target).abs() < 1e-6);
        }
    }

    #[test]
    fn tick_resets_accumulator() {
        let ewma = Ewma::one_minute();
        ewma.update(10.0);
        ewma.tick();
        assert!((ewma.rate() - 2.0).abs() < 1e-12);
        ewma.tick();
        assert!((ewma.rate() - 2.0 * (1.0 - M1_ALPHA)).abs() < 1e-12);
    }

    #[test]
    fn derived_constant_matches_precomputed_one() {
        // same decay as the calibrated one-minute average
        let derived = Ewma::new(TICK_INTERVAL, 1.0).unwrap();
        let calibrated = Ewma::one_minute();
        for ewma in [&derived, &calibrated] {
            ewma.update(3.0);
            ewma.tick();
            ewma.tick();
        }
        assert!((derived.rate() - calibrated.rate()).abs() < 1e-12);
    }

    #[test]
    fn window_follows_tick_interval() {
        // one-second ticks over one minute decay slower per tick
        let fast = Ewma::new(Duration::from_secs(1), 1.0).unwrap();
        fast.update(5.0);
        fast.tick();
        fast.tick();
        let expected = 5.0 * (-1.0f64 / 60.0).exp();
        assert!((fast.rate() - expected).abs() < 1e-12);
    }

    #[test]
    fn rejects_invalid_construction() {
        assert!(matches!(
            Ewma::new(Duration::ZERO, 0.5),
            Err(MetricsError::InvalidTickInterval(_))
        ));
        assert!(matches!(
            Ewma::new(TICK_INTERVAL, 0.0),
            Err(MetricsError::InvalidWindow(_))
        ));
        assert!(matches!(
            Ewma::new(TICK_INTERVAL, f64::NAN),
            Err(MetricsError::InvalidWindow(_))
        ));
        // the window is so short relative to the tick that alpha saturates
        assert!(matches!(
            Ewma::new(Duration::from_secs(u32::MAX as u64), 1.0),
            Err(MetricsError::InvalidAlpha(_))
        ));
    }
}
