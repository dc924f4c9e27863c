pub mod loaded;

use rand::{rngs::StdRng, Rng, SeedableRng};
use types::Dice;

pub use crate::loaded::LoadedDice;

/// Uniform dice backed by a seedable standard RNG.
#[derive(Debug)]
pub struct RandomDice {
    rng: StdRng,
}

impl RandomDice {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        log::debug!("Seeding dice with {seed}");
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomDice {
    fn default() -> Self {
        Self::new()
    }
}

impl Dice for RandomDice {
    fn roll(&mut self, low: u64, high: u64) -> u64 {
        if high <= low {
            return low;
        }
        self.rng.gen_range(low..=high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolls_stay_within_inclusive_bounds() {
        let mut dice = RandomDice::seeded(7);
        let rolls: Vec<u64> = (0..1000).map(|_| dice.roll(0, 7)).collect();
        assert!(rolls.iter().all(|&r| r <= 7));
        assert!(rolls.contains(&0));
        assert!(rolls.contains(&7));
    }

    #[test]
    fn degenerate_ranges_return_low() {
        let mut dice = RandomDice::seeded(1);
        assert_eq!(dice.roll(5, 5), 5);
        assert_eq!(dice.roll(9, 3), 9);
        assert_eq!(dice.pick(1), 0);
    }

    #[test]
    fn same_seed_same_rolls() {
        let mut a = RandomDice::seeded(99);
        let mut b = RandomDice::seeded(99);
        for _ in 0..50 {
            assert_eq!(a.percent(), b.percent());
        }
    }
}
