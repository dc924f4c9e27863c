use std::fmt::Debug;

/// Uniform integer source used by every randomized rule (heist outcomes,
/// message draws, race movement, prizes).
pub trait Dice: Send + Debug {
    /// A value in `low..=high`.
    fn roll(&mut self, low: u64, high: u64) -> u64;

    /// A percentile roll in `1..=100`.
    fn percent(&mut self) -> u64 {
        self.roll(1, 100)
    }

    /// An index into a collection of `len` elements; `len` must be non-zero.
    fn pick(&mut self, len: usize) -> usize {
        self.roll(0, len.saturating_sub(1) as u64) as usize
    }
}
