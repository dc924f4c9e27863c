use std::collections::VecDeque;

use types::Dice;

/// Plays back a fixed script of rolls. Each value is clamped into the
/// requested range; once the script runs out every roll returns `low`.
#[derive(Debug, Default, Clone)]
pub struct LoadedDice {
    script: VecDeque<u64>,
    rolled: usize,
}

impl LoadedDice {
    pub fn new(script: impl IntoIterator<Item = u64>) -> Self {
        Self {
            script: script.into_iter().collect(),
            rolled: 0,
        }
    }

    pub fn push(&mut self, value: u64) {
        self.script.push_back(value);
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    pub fn rolled(&self) -> usize {
        self.rolled
    }
}

impl Dice for LoadedDice {
    fn roll(&mut self, low: u64, high: u64) -> u64 {
        self.rolled += 1;
        match self.script.pop_front() {
            Some(value) => value.clamp(low, high.max(low)),
            None => {
                log::trace!("Loaded dice exhausted, rolling {low}");
                low
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plays_back_then_rolls_low() {
        let mut dice = LoadedDice::new([3, 250, 0]);
        assert_eq!(dice.roll(1, 6), 3);
        assert_eq!(dice.percent(), 100);
        assert_eq!(dice.roll(1, 6), 1);
        assert_eq!(dice.remaining(), 0);
        assert_eq!(dice.roll(4, 9), 4);
        assert_eq!(dice.rolled(), 4);
    }

    #[test]
    fn pick_indexes_from_zero() {
        let mut dice = LoadedDice::new([2, 10]);
        assert_eq!(dice.pick(3), 2);
        assert_eq!(dice.pick(3), 2);
        assert_eq!(dice.pick(3), 0);
    }
}
