use std::fmt;

use super::decaying::ExponentiallyDecayingSample;
use super::sample::Sample;
use super::snapshot::HistogramSnapshot;
use super::uniform::UniformSample;
use crate::config::{DEFAULT_DECAY_ALPHA, DEFAULT_RESERVOIR_SIZE};
use crate::error::Result;

/// Running statistics over every observation plus percentiles estimated
/// from a bounded reservoir.
///
/// Count, sum, min, max and the Welford mean/variance accumulators cover
/// the full stream. Percentiles only see what the reservoir retained.
///
/// No internal locking: every `&mut self` call must be serialized by the
/// owner, e.g. one `Mutex<Histogram>` shared between writers and readers.
pub struct Histogram {
    sample: Box<dyn Sample>,
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    // Welford running mean and sum of squared deviations
    variance_m: f64,
    variance_s: f64,
}

impl Histogram {
    pub fn new(sample: Box<dyn Sample>) -> Self {
        Self {
            sample,
            count: 0,
            sum: 0.0,
            min: 0.0,
            max: 0.0,
            variance_m: 0.0,
            variance_s: 0.0,
        }
    }

    /// Exponentially decaying reservoir of 1028 elements with alpha 0.015,
    /// heavily biased toward the last five minutes of observations.
    pub fn new_biased() -> Result<Self> {
        let sample = ExponentiallyDecayingSample::new(DEFAULT_RESERVOIR_SIZE, DEFAULT_DECAY_ALPHA)?;
        Ok(Self::new(Box::new(sample)))
    }

    /// Uniform reservoir of 1028 elements.
    pub fn new_unbiased() -> Result<Self> {
        let sample = UniformSample::new(DEFAULT_RESERVOIR_SIZE)?;
        Ok(Self::new(Box::new(sample)))
    }

    /// Record one observation.
    ///
    /// A NaN observation is counted and poisons `sum`, `mean` and the
    /// variance, but `min` and `max` skip it and keep the extremes of the
    /// other values.
    pub fn update(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.sample.update(value);

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.variance_m = value;
            self.variance_s = 0.0;
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);

        let old_m = self.variance_m;
        self.variance_m = old_m + (value - old_m) / self.count as f64;
        self.variance_s += (value - old_m) * (value - self.variance_m);
    }

    /// Back to the freshly constructed state, reservoir included.
    pub fn clear(&mut self) {
        self.sample.clear();
        self.count = 0;
        self.sum = 0.0;
        self.min = 0.0;
        self.max = 0.0;
        self.variance_m = 0.0;
        self.variance_s = 0.0;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// NaN while empty.
    pub fn min(&self) -> f64 {
        if self.count == 0 {
            return f64::NAN;
        }
        self.min
    }

    /// NaN while empty.
    pub fn max(&self) -> f64 {
        if self.count == 0 {
            return f64::NAN;
        }
        self.max
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum / self.count as f64
    }

    /// Sample variance (`n - 1` denominator); zero below two observations.
    pub fn variance(&self) -> f64 {
        if self.count <= 1 {
            return 0.0;
        }
        self.variance_s / (self.count - 1) as f64
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// One estimate per requested percentile `p` in `[0, 1]`, in request
    /// order. All zeros while empty.
    ///
    /// With `n` sorted reservoir values and `pos = p * (n + 1)`: below rank
    /// 1 yields the minimum, at or beyond rank `n` the maximum, otherwise
    /// the ranks `floor(pos)` and `floor(pos) + 1` are linearly
    /// interpolated. A NaN `p` is treated as 0 and yields the minimum.
    pub fn percentiles(&self, ps: &[f64]) -> Vec<f64> {
        let mut scores = vec![0.0; ps.len()];
        if self.count == 0 {
            return scores;
        }

        let mut values = self.sample.values();
        if values.is_empty() {
            return scores;
        }
        values.sort_by(f64::total_cmp);
        let n = values.len();

        for (score, &p) in scores.iter_mut().zip(ps) {
            let pos = p * (n + 1) as f64;
            *score = if pos.is_nan() || pos < 1.0 {
                values[0]
            } else if pos >= n as f64 {
                values[n - 1]
            } else {
                let rank = pos.floor();
                let lower = values[rank as usize - 1];
                let upper = values[rank as usize];
                lower + (pos - rank) * (upper - lower)
            };
        }
        scores
    }

    /// Copy of the values currently held by the reservoir.
    pub fn values(&self) -> Vec<f64> {
        self.sample.values()
    }

    pub fn snapshot(&self, ps: &[f64]) -> HistogramSnapshot {
        HistogramSnapshot {
            count: self.count(),
            sum: self.sum(),
            min: self.min(),
            max: self.max(),
            mean: self.mean(),
            std_dev: self.std_dev(),
            variance: self.variance(),
            percentiles: ps.iter().copied().zip(self.percentiles(ps)).collect(),
        }
    }
}

impl fmt::Display for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Histogram{{sum:{:.4} count:{} min:{:.4} max:{:.4}}}",
            self.sum, self.count, self.min, self.max
        )
    }
}

impl fmt::Debug for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Histogram")
            .field("count", &self.count)
            .field("sum", &self.sum)
            .field("min", &self.min())
            .field("max", &self.max())
            .field("retained", &self.sample.len())
            .finish()
    }
}
