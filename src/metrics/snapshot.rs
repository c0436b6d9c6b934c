use serde::Serialize;

/// Point-in-time copy of every histogram accessor.
/// `min` and `max` are NaN and the percentiles zero while empty.
#[derive(Debug, Clone, Serialize)]
pub struct HistogramSnapshot {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub variance: f64,
    /// `(requested percentile, value)` in request order
    pub percentiles: Vec<(f64, f64)>,
}

impl HistogramSnapshot {
    /// `false` for a snapshot of an empty or freshly cleared histogram.
    pub fn has_data(&self) -> bool {
        self.count > 0
    }

    /// Value recorded for exactly `p`, if it was requested.
    pub fn percentile(&self, p: f64) -> Option<f64> {
        self.percentiles
            .iter()
            .find(|(requested, _)| *requested == p)
            .map(|&(_, value)| value)
    }
}

/// Point-in-time copy of a meter's count and rates.
#[derive(Debug, Clone, Serialize)]
pub struct MeterSnapshot {
    pub count: u64,
    pub mean_rate: f64,
    pub one_minute_rate: f64,
    pub five_minute_rate: f64,
    pub fifteen_minute_rate: f64,
}
