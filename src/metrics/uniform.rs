use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::sample::Sample;
use crate::error::{check_capacity, Result};

/// Fixed-size uniform random sample of a stream (Vitter's Algorithm R).
///
/// After `k` observations, each of them is retained with probability
/// `capacity / k`.
#[derive(Debug)]
pub struct UniformSample {
    capacity: usize,
    seen: u64,
    values: Vec<f64>,
    rng: StdRng,
}

impl UniformSample {
    pub fn new(capacity: usize) -> Result<Self> {
        let capacity = check_capacity(capacity)?;
        Ok(Self {
            capacity,
            seen: 0,
            values: Vec::with_capacity(capacity),
            rng: StdRng::from_entropy(),
        })
    }

    /// Replace the entropy-seeded generator, e.g. with a seeded one for
    /// reproducible runs.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Observations offered since construction or the last clear.
    pub fn seen(&self) -> u64 {
        self.seen
    }
}

impl Sample for UniformSample {
    fn update(&mut self, value: f64) {
        self.seen += 1;
        if self.values.len() < self.capacity {
            self.values.push(value);
            return;
        }
        let slot = self.rng.gen_range(0..self.seen);
        if slot < self.capacity as u64 {
            self.values[slot as usize] = value;
        }
    }

    fn values(&self) -> Vec<f64> {
        self.values.clone()
    }

    fn len(&self) -> usize {
        self.values.len()
    }

    fn clear(&mut self) {
        self.values.clear();
        self.seen = 0;
    }
}
