pub mod decaying;
pub mod ewma;
pub mod histogram;
pub mod meter;
pub mod sample;
pub mod snapshot;
pub mod uniform;

pub use decaying::ExponentiallyDecayingSample;
pub use ewma::Ewma;
pub use histogram::Histogram;
pub use meter::Meter;
pub use sample::Sample;
pub use snapshot::{HistogramSnapshot, MeterSnapshot};
pub use uniform::UniformSample;
