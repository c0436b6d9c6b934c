//! In-process statistics primitives with bounded memory: moving-average
//! rates, a three-window meter, sampling reservoirs and a histogram that
//! estimates percentiles from them.
//!
//! Naming, iterating and exporting metrics is left to the caller.

pub mod config;
pub mod error;
pub mod metrics;

pub use config::{MeterConfig, ReservoirConfig};
pub use error::{MetricsError, Result};
pub use metrics::{
    Ewma, ExponentiallyDecayingSample, Histogram, HistogramSnapshot, Meter, MeterSnapshot, Sample,
    UniformSample,
};
