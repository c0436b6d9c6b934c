/// A bounded reservoir of observations from which percentiles are read.
///
/// Implementations carry no internal synchronization. A reservoir is owned
/// by exactly one [`Histogram`](super::Histogram), and callers sharing that
/// histogram across threads must serialize access themselves, e.g. behind
/// one `Mutex`.
pub trait Sample: Send {
    /// Offer one observation; the variant's policy decides what is kept.
    fn update(&mut self, value: f64);

    /// Copy of the currently retained values, in no particular order.
    fn values(&self) -> Vec<f64>;

    /// Number of values currently retained.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self);
}
