use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace};

use super::ewma::Ewma;
use super::snapshot::MeterSnapshot;
use crate::config::{MeterConfig, RATE_WINDOWS_MINUTES};
use crate::error::{MetricsError, Result};

/// Counts events and tracks their 1, 5 and 15 minute rates.
///
/// Construction spawns one ticker task on the current tokio runtime that
/// folds the accumulated counts into the three moving averages once per
/// tick interval. `update` may be called from any thread.
///
/// After [`stop`](Meter::stop) returns, no further tick runs. Updates are
/// still accepted and keep advancing [`count`](Meter::count) and
/// [`mean_rate`](Meter::mean_rate), but the moving-average rates freeze
/// at their last ticked values.
pub struct Meter {
    shared: Arc<Shared>,
    start: Instant,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

/// State touched by both updaters and the ticker task.
struct Shared {
    count: AtomicU64,
    m1: Ewma,
    m5: Ewma,
    m15: Ewma,
    /// Held for the whole of each tick firing; `true` once stopped
    stopped: Mutex<bool>,
}

impl Shared {
    /// Returns `false` once the meter has been stopped.
    fn tick(&self) -> bool {
        let stopped = self.stopped.lock();
        if *stopped {
            return false;
        }
        self.m1.tick();
        self.m5.tick();
        self.m15.tick();
        true
    }
}

impl Meter {
    /// Meter ticking every 5 seconds.
    pub fn new() -> Result<Self> {
        Self::with_config(MeterConfig::default())
    }

    /// Must be called from inside a tokio runtime.
    pub fn with_config(config: MeterConfig) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| MetricsError::NoRuntime)?;

        let period = config.tick_interval;
        let [m1, m5, m15] = RATE_WINDOWS_MINUTES;
        let shared = Arc::new(Shared {
            count: AtomicU64::new(0),
            m1: Ewma::new(period, m1)?,
            m5: Ewma::new(period, m5)?,
            m15: Ewma::new(period, m15)?,
            stopped: Mutex::new(false),
        });

        let start = Instant::now();
        let task = runtime.spawn(tick_loop(Arc::clone(&shared), start + period, period));
        debug!(tick_interval_ms = period.as_millis() as u64, "meter ticker started");

        Ok(Self {
            shared,
            start,
            ticker: Mutex::new(Some(task)),
        })
    }

    /// Record `delta` events.
    pub fn update(&self, delta: u64) {
        self.shared.count.fetch_add(delta, Ordering::Relaxed);
        let delta = delta as f64;
        self.shared.m1.update(delta);
        self.shared.m5.update(delta);
        self.shared.m15.update(delta);
    }

    pub fn count(&self) -> u64 {
        self.shared.count.load(Ordering::Relaxed)
    }

    /// Events per second over the meter's whole lifetime. Not smoothed.
    pub fn mean_rate(&self) -> f64 {
        let elapsed = self.start.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        self.count() as f64 / elapsed
    }

    pub fn one_minute_rate(&self) -> f64 {
        self.shared.m1.rate()
    }

    pub fn five_minute_rate(&self) -> f64 {
        self.shared.m5.rate()
    }

    pub fn fifteen_minute_rate(&self) -> f64 {
        self.shared.m15.rate()
    }

    /// Halt ticking. Safe to call any number of times.
    pub fn stop(&self) {
        {
            let mut stopped = self.shared.stopped.lock();
            if *stopped {
                return;
            }
            *stopped = true;
        }
        if let Some(task) = self.ticker.lock().take() {
            task.abort();
        }
        debug!(count = self.count(), "meter ticker stopped");
    }

    pub fn is_stopped(&self) -> bool {
        *self.shared.stopped.lock()
    }

    pub fn snapshot(&self) -> MeterSnapshot {
        MeterSnapshot {
            count: self.count(),
            mean_rate: self.mean_rate(),
            one_minute_rate: self.one_minute_rate(),
            five_minute_rate: self.five_minute_rate(),
            fifteen_minute_rate: self.fifteen_minute_rate(),
        }
    }
}

impl Drop for Meter {
    fn drop(&mut self) {
        self.stop();
    }
}

// ─── Ticker task ─────────────────────────────────────────────────

async fn tick_loop(shared: Arc<Shared>, first: Instant, period: Duration) {
    let mut ticker = time::interval_at(first, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if !shared.tick() {
            break;
        }
        trace!(
            m1 = shared.m1.rate(),
            m5 = shared.m5.rate(),
            m15 = shared.m15.rate(),
            "meter ticked"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TICK_INTERVAL;

    /// Sleep until just past the `n`-th tick after `start`.
    async fn past_tick(start: Instant, n: u32) {
        time::sleep_until(start + TICK_INTERVAL * n + Duration::from_millis(1)).await;
    }

    #[test]
    fn requires_runtime() {
        assert!(matches!(Meter::new(), Err(MetricsError::NoRuntime)));
    }

    #[tokio::test(start_paused = true)]
    async fn rejects_zero_interval() {
        let cfg = MeterConfig {
            tick_interval: Duration::ZERO,
        };
        assert!(matches!(
            Meter::with_config(cfg),
            Err(MetricsError::InvalidTickInterval(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn count_accumulates_updates() {
        let meter = Meter::new().unwrap();
        for _ in 0..10 {
            meter.update(5);
        }
        assert_eq!(meter.count(), 50);
    }

    #[tokio::test(start_paused = true)]
    async fn rates_are_zero_before_first_tick() {
        let meter = Meter::new().unwrap();
        meter.update(100);
        assert_eq!(meter.one_minute_rate(), 0.0);
        assert_eq!(meter.five_minute_rate(), 0.0);
        assert_eq!(meter.fifteen_minute_rate(), 0.0);
        // no time has passed on the paused clock
        assert_eq!(meter.mean_rate(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn background_task_ticks_all_rates() {
        let meter = Meter::new().unwrap();
        let start = meter.start;

        meter.update(300);
        past_tick(start, 1).await;

        assert!((meter.one_minute_rate() - 60.0).abs() < 1e-9);
        assert!((meter.five_minute_rate() - 60.0).abs() < 1e-9);
        assert!((meter.fifteen_minute_rate() - 60.0).abs() < 1e-9);

        // idle tick decays each window by its own constant
        past_tick(start, 2).await;
        assert!(meter.one_minute_rate() < meter.five_minute_rate());
        assert!(meter.five_minute_rate() < meter.fifteen_minute_rate());
    }

    #[tokio::test(start_paused = true)]
    async fn mean_rate_uses_elapsed_time() {
        let meter = Meter::new().unwrap();
        meter.update(100);
        time::sleep(Duration::from_secs(10)).await;
        assert!((meter.mean_rate() - 10.0).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let meter = Meter::new().unwrap();
        assert!(!meter.is_stopped());
        meter.stop();
        meter.stop();
        assert!(meter.is_stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_meter_keeps_counting_but_freezes_rates() {
        let meter = Meter::new().unwrap();
        let start = meter.start;

        meter.update(50);
        past_tick(start, 1).await;
        let frozen = meter.snapshot();
        assert!(frozen.one_minute_rate > 0.0);

        meter.stop();
        meter.update(1_000);
        past_tick(start, 4).await;

        assert_eq!(meter.count(), 1_050);
        assert_eq!(meter.one_minute_rate(), frozen.one_minute_rate);
        assert_eq!(meter.five_minute_rate(), frozen.five_minute_rate);
        assert_eq!(meter.fifteen_minute_rate(), frozen.fifteen_minute_rate);
    }

    #[tokio::test(start_paused = true)]
    async fn custom_interval_rescales_instant_rate() {
        let cfg = MeterConfig {
            tick_interval: Duration::from_secs(1),
        };
        let meter = Meter::with_config(cfg).unwrap();
        meter.update(4);
        time::sleep(Duration::from_millis(1_001)).await;
        assert!((meter.one_minute_rate() - 4.0).abs() < 1e-9);
    }
}
