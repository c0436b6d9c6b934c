use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use rand::distributions::Open01;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::sample::Sample;
use crate::config::ReservoirConfig;
use crate::error::Result;

/// Reservoir biased toward recent observations using forward decay.
///
/// An item arriving at `t` gets weight `e^(alpha * (t - landmark))` and
/// priority `weight / u` for a uniform `u` in (0, 1). The `capacity`
/// highest priorities are kept. Weights grow without bound, so once per
/// rescale period the landmark moves to the present and every retained
/// priority is scaled down by the same factor, which leaves their order
/// intact.
///
/// See Cormode et al., "Forward Decay: A Practical Time Decay Model for
/// Streaming Systems".
#[derive(Debug)]
pub struct ExponentiallyDecayingSample {
    capacity: usize,
    alpha: f64,
    rescale_period: Duration,
    landmark: Instant,
    next_rescale: Instant,
    // min-heap on priority: the root is the next eviction candidate
    entries: BinaryHeap<Reverse<Entry>>,
    rng: StdRng,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    priority: f64,
    value: f64,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority.total_cmp(&other.priority)
    }
}

impl ExponentiallyDecayingSample {
    /// Rescales hourly, which bounds `alpha` to about 0.16 before weights
    /// could overflow; use [`from_config`](Self::from_config) with a
    /// shorter period for steeper decay.
    pub fn new(capacity: usize, alpha: f64) -> Result<Self> {
        Self::from_config(&ReservoirConfig {
            capacity,
            alpha,
            ..ReservoirConfig::default()
        })
    }

    pub fn from_config(config: &ReservoirConfig) -> Result<Self> {
        config.validate()?;
        let now = Instant::now();
        Ok(Self {
            capacity: config.capacity,
            alpha: config.alpha,
            rescale_period: config.rescale_period,
            landmark: now,
            next_rescale: now + config.rescale_period,
            entries: BinaryHeap::with_capacity(config.capacity),
            rng: StdRng::from_entropy(),
        })
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Record `value` as if it arrived at `now`.
    pub fn update_at(&mut self, value: f64, now: Instant) {
        if now >= self.next_rescale {
            self.rescale(now);
        }

        let weight = self.weight(now);
        let u: f64 = self.rng.sample(Open01);
        let entry = Entry {
            priority: weight / u,
            value,
        };

        if self.entries.len() < self.capacity {
            self.entries.push(Reverse(entry));
        } else if let Some(mut lowest) = self.entries.peek_mut() {
            if lowest.0 < entry {
                *lowest = Reverse(entry);
            }
        }
    }

    fn weight(&self, at: Instant) -> f64 {
        let age = at.saturating_duration_since(self.landmark).as_secs_f64();
        (self.alpha * age).exp()
    }

    /// Move the landmark to `now` and rebase retained priorities onto it.
    fn rescale(&mut self, now: Instant) {
        let old_landmark = std::mem::replace(&mut self.landmark, now);
        self.next_rescale = now + self.rescale_period;

        let elapsed = now.saturating_duration_since(old_landmark).as_secs_f64();
        let factor = (-self.alpha * elapsed).exp();
        let scaled: Vec<_> = std::mem::take(&mut self.entries)
            .into_vec()
            .into_iter()
            .map(|Reverse(e)| {
                Reverse(Entry {
                    priority: e.priority * factor,
                    value: e.value,
                })
            })
            .collect();
        self.entries = BinaryHeap::from(scaled);

        debug!(
            retained = self.entries.len(),
            elapsed_secs = elapsed,
            factor,
            "decaying sample rescaled"
        );
    }
}

impl Sample for ExponentiallyDecayingSample {
    fn update(&mut self, value: f64) {
        self.update_at(value, Instant::now());
    }

    fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|Reverse(e)| e.value).collect()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn clear(&mut self) {
        self.entries.clear();
        let now = Instant::now();
        self.landmark = now;
        self.next_rescale = now + self.rescale_period;
    }
}
