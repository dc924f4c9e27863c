use std::{cmp::Ordering, fmt::Display};

use chrono::{DateTime, Utc};
use itertools::Itertools;

use crate::{
    catalog::{Character, Mode, MovementClass},
    clock::after,
    config::GuildConfig,
    dice::Dice,
    error::GameError,
    PlayerId,
};

pub const TRACK_LENGTH: u32 = 80;
/// Legs after which any racer still on the track is ranked by distance left.
pub const MAX_LEGS: u32 = 500;
const LANE_CELLS: u32 = 20;

/// Distance a character of `class` covers on leg `turn` (0-based).
pub fn movement(class: MovementClass, turn: u32, dice: &mut dyn Dice) -> u32 {
    let distance = match class {
        MovementClass::VeryFast => dice.roll(0, 7) * 2,
        MovementClass::Fast => dice.roll(0, 4) * 3,
        MovementClass::Slow => (dice.roll(0, 2) + 1) * 3,
        MovementClass::Steady => 6,
        MovementClass::Aberrant => {
            if dice.roll(1, 100) <= 90 {
                dice.roll(0, 2) * 3
            } else {
                15
            }
        }
        MovementClass::Predator if turn % 2 == 0 => 0,
        MovementClass::Predator => (dice.roll(0, 3) + 2) * 3,
        MovementClass::Special => match turn {
            0 => 42,
            1 => 0,
            _ => dice.roll(0, 2) * 3,
        },
    };
    distance as u32
}

/// `turns + last_position / last_move`, kept as an exact fraction so equal
/// speeds compare equal. Lower is faster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinishTime {
    pub turns: u32,
    pub last_position: u32,
    pub last_move: u32,
}

impl FinishTime {
    fn numerator(&self) -> u64 {
        self.turns as u64 * self.last_move as u64 + self.last_position as u64
    }

    fn denominator(&self) -> u64 {
        self.last_move.max(1) as u64
    }

    pub fn as_f64(&self) -> f64 {
        self.numerator() as f64 / self.denominator() as f64
    }
}

impl Ord for FinishTime {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.numerator() as u128 * other.denominator() as u128)
            .cmp(&(other.numerator() as u128 * self.denominator() as u128))
    }
}

impl PartialOrd for FinishTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for FinishTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.as_f64())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entrant {
    pub player_id: PlayerId,
    pub name: String,
    pub bot: bool,
}

#[derive(Debug, Clone)]
pub struct Racer {
    pub entrant: Entrant,
    pub character: Character,
    pub position: i64,
    pub last_move: u32,
    pub last_position: u32,
    pub turn: u32,
    pub finish: Option<FinishTime>,
    pub tiebreak: u64,
    pub prize: u64,
}

impl Racer {
    pub fn new(entrant: Entrant, character: Character) -> Self {
        Self {
            entrant,
            character,
            position: TRACK_LENGTH as i64,
            last_move: 0,
            last_position: TRACK_LENGTH,
            turn: 0,
            finish: None,
            tiebreak: 0,
            prize: 0,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finish.is_some()
    }

    /// Moves one leg. Returns true if the racer crossed the line on this leg.
    pub fn advance(&mut self, dice: &mut dyn Dice) -> bool {
        if self.is_finished() {
            return false;
        }
        let distance = movement(self.character.movement, self.turn, dice);
        self.last_position = self.position.max(0) as u32;
        self.last_move = distance;
        self.position -= distance as i64;
        self.turn += 1;
        if self.position <= 0 {
            self.finish = Some(FinishTime {
                turns: self.turn,
                last_position: self.last_position,
                last_move: self.last_move,
            });
            self.tiebreak = dice.roll(0, u32::MAX as u64);
            return true;
        }
        false
    }

    /// One text lane: finish glyph, the racer at its scaled position, start glyph.
    pub fn lane(&self, mode: &Mode) -> String {
        let position = self.position.clamp(0, TRACK_LENGTH as i64) as u32;
        let before = position * LANE_CELLS / TRACK_LENGTH;
        format!(
            "{}{}{}{}{} {}",
            mode.ending,
            "·".repeat(before as usize),
            self.character.emoji,
            "·".repeat((LANE_CELLS - before) as usize),
            mode.beginning,
            self.entrant.name
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bettor {
    pub player_id: PlayerId,
    pub name: String,
    /// Index into `Race::racers`.
    pub racer: usize,
    pub stake: u64,
    pub winnings: u64,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RacePhase {
    Joining,
    Betting,
    Running,
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placing {
    pub racer: usize,
    /// 1-based.
    pub place: usize,
    pub prize: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaceResult {
    pub prize: u64,
    pub placings: Vec<Placing>,
    /// (bettor, winnings) for every bet on the winner.
    pub payouts: Vec<(PlayerId, u64)>,
}

impl RaceResult {
    pub fn winner(&self) -> Option<usize> {
        self.placings.first().map(|p| p.racer)
    }
}

pub fn prize_for_place(prize: u64, place: usize) -> u64 {
    match place {
        1 => prize,
        2 => prize * 3 / 4,
        3 => prize / 2,
        _ => 0,
    }
}

#[derive(Debug, Clone)]
pub struct Race {
    pub racers: Vec<Racer>,
    pub bets: Vec<Bettor>,
    pub planned: bool,
    pub betting: bool,
    pub started: bool,
    pub ended: bool,
    pub join_deadline: DateTime<Utc>,
    pub bet_deadline: DateTime<Utc>,
}

impl Race {
    pub fn new(now: DateTime<Utc>, config: &GuildConfig) -> Self {
        let join_deadline = after(now, config.wait_for_join);
        Self {
            racers: Vec::new(),
            bets: Vec::new(),
            planned: true,
            betting: false,
            started: false,
            ended: false,
            join_deadline,
            bet_deadline: after(join_deadline, config.wait_for_betting),
        }
    }

    pub fn phase(&self) -> RacePhase {
        match (self.planned, self.betting, self.started, self.ended) {
            (_, _, _, true) => RacePhase::Ended,
            (_, _, true, _) => RacePhase::Running,
            (_, true, _, _) => RacePhase::Betting,
            _ => RacePhase::Joining,
        }
    }

    pub fn is_entered(&self, player_id: PlayerId) -> bool {
        self.racers.iter().any(|r| r.entrant.player_id == player_id)
    }

    pub fn add_racer(&mut self, racer: Racer, max_racers: usize) -> Result<(), GameError> {
        if self.phase() != RacePhase::Joining {
            return Err(GameError::precondition("The race is no longer open for entries."));
        }
        if self.is_entered(racer.entrant.player_id) {
            return Err(GameError::precondition("You are already in the race."));
        }
        if self.racers.len() >= max_racers {
            return Err(GameError::precondition(format!(
                "The race is full ({max_racers} racers)."
            )));
        }
        self.racers.push(racer);
        Ok(())
    }

    pub fn open_betting(&mut self) -> Result<(), GameError> {
        if self.phase() != RacePhase::Joining {
            return Err(GameError::Internal("betting opened twice".to_string()));
        }
        self.betting = true;
        Ok(())
    }

    pub fn place_bet(&mut self, bettor: Bettor) -> Result<(), GameError> {
        if self.phase() != RacePhase::Betting {
            return Err(GameError::precondition("Betting is not open right now."));
        }
        if self.bets.iter().any(|b| b.player_id == bettor.player_id) {
            return Err(GameError::precondition("You have already placed a bet."));
        }
        if bettor.racer >= self.racers.len() {
            return Err(GameError::not_found("racer", (bettor.racer + 1).to_string()));
        }
        self.bets.push(bettor);
        Ok(())
    }

    pub fn begin(&mut self) -> Result<(), GameError> {
        if self.phase() != RacePhase::Betting {
            return Err(GameError::Internal(
                "race started outside of the betting phase".to_string(),
            ));
        }
        self.planned = false;
        self.betting = false;
        self.started = true;
        Ok(())
    }

    pub fn all_finished(&self) -> bool {
        self.racers.iter().all(Racer::is_finished)
    }

    /// Advances every racer still on the track by one leg.
    pub fn run_leg(&mut self, dice: &mut dyn Dice) {
        for racer in self.racers.iter_mut() {
            if racer.advance(dice) {
                log::debug!("{} crossed the line on leg {}", racer.entrant.name, racer.turn);
            }
        }
    }

    /// Ranks anyone still running after `MAX_LEGS` behind every finisher,
    /// nearest to the line first.
    pub fn force_finish(&mut self) {
        for racer in self.racers.iter_mut().filter(|r| !r.is_finished()) {
            let left = racer.position.max(0) as u32;
            racer.finish = Some(FinishTime {
                turns: racer.turn.saturating_add(left),
                last_position: 0,
                last_move: 1,
            });
            racer.tiebreak = u64::MAX;
        }
    }

    /// Racer indices from first to last.
    pub fn standings(&self) -> Vec<usize> {
        (0..self.racers.len())
            .filter(|&idx| self.racers[idx].is_finished())
            .sorted_by(|&a, &b| {
                let (a, b) = (&self.racers[a], &self.racers[b]);
                a.finish.cmp(&b.finish).then(a.tiebreak.cmp(&b.tiebreak))
            })
            .collect()
    }

    /// Applies prizes and bet winnings to the race itself and reports them.
    /// `base_prize` is scaled by the number of racers.
    pub fn settle(&mut self, base_prize: u64) -> Result<RaceResult, GameError> {
        if self.phase() != RacePhase::Running || !self.all_finished() {
            return Err(GameError::Internal(
                "race settled before every racer finished".to_string(),
            ));
        }
        let field = self.racers.len() as u64;
        let prize = base_prize.saturating_mul(field);

        let placings: Vec<Placing> = self
            .standings()
            .into_iter()
            .enumerate()
            .map(|(idx, racer)| Placing {
                racer,
                place: idx + 1,
                prize: prize_for_place(prize, idx + 1),
            })
            .collect();
        for placing in &placings {
            self.racers[placing.racer].prize = placing.prize;
        }

        let winner = placings.first().map(|p| p.racer);
        let mut payouts = Vec::new();
        for bet in self.bets.iter_mut() {
            if Some(bet.racer) == winner {
                bet.winnings = bet.stake.saturating_mul(field);
                payouts.push((bet.player_id, bet.winnings));
            }
        }

        self.ended = true;
        Ok(RaceResult {
            prize,
            placings,
            payouts,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    #[derive(Debug)]
    struct Scripted(VecDeque<u64>);

    impl Dice for Scripted {
        fn roll(&mut self, low: u64, high: u64) -> u64 {
            self.0.pop_front().unwrap_or(low).clamp(low, high)
        }
    }

    fn dice(values: &[u64]) -> Scripted {
        Scripted(values.iter().copied().collect())
    }

    fn character(movement: MovementClass) -> Character {
        Character {
            emoji: "🐎".to_string(),
            movement,
        }
    }

    fn racer(id: PlayerId, movement: MovementClass) -> Racer {
        Racer::new(
            Entrant {
                player_id: id,
                name: format!("racer{id}"),
                bot: false,
            },
            character(movement),
        )
    }

    fn betting_race(racers: Vec<Racer>) -> Race {
        let mut race = Race::new(Utc::now(), &GuildConfig::default());
        for r in racers {
            race.add_racer(r, 10).unwrap();
        }
        race.open_betting().unwrap();
        race
    }

    #[test]
    fn movement_table() {
        assert_eq!(movement(MovementClass::VeryFast, 0, &mut dice(&[7])), 14);
        assert_eq!(movement(MovementClass::Fast, 0, &mut dice(&[4])), 12);
        assert_eq!(movement(MovementClass::Slow, 0, &mut dice(&[0])), 3);
        assert_eq!(movement(MovementClass::Slow, 0, &mut dice(&[2])), 9);
        assert_eq!(movement(MovementClass::Steady, 3, &mut dice(&[])), 6);
        assert_eq!(movement(MovementClass::Aberrant, 0, &mut dice(&[90, 2])), 6);
        assert_eq!(movement(MovementClass::Aberrant, 0, &mut dice(&[91])), 15);
        assert_eq!(movement(MovementClass::Predator, 2, &mut dice(&[3])), 0);
        assert_eq!(movement(MovementClass::Predator, 1, &mut dice(&[3])), 15);
        assert_eq!(movement(MovementClass::Special, 0, &mut dice(&[])), 42);
        assert_eq!(movement(MovementClass::Special, 1, &mut dice(&[])), 0);
        assert_eq!(movement(MovementClass::Special, 2, &mut dice(&[2])), 6);
    }

    #[test]
    fn finish_time_compares_exact_fractions() {
        let a = FinishTime {
            turns: 14,
            last_position: 2,
            last_move: 6,
        };
        let b = FinishTime {
            turns: 14,
            last_position: 1,
            last_move: 3,
        };
        assert_eq!(a.cmp(&b), Ordering::Equal);
        let c = FinishTime {
            turns: 14,
            last_position: 3,
            last_move: 6,
        };
        assert!(a < c);
        assert!(c < FinishTime {
            turns: 15,
            last_position: 0,
            last_move: 6,
        });
    }

    #[test]
    fn steady_racer_crosses_on_fourteenth_leg() {
        let mut r = racer(1, MovementClass::Steady);
        let mut d = dice(&[]);
        for _ in 0..13 {
            assert!(!r.advance(&mut d));
        }
        assert_eq!(r.position, 2);
        assert!(r.advance(&mut d));
        assert_eq!(
            r.finish,
            Some(FinishTime {
                turns: 14,
                last_position: 2,
                last_move: 6
            })
        );
        assert!(!r.advance(&mut d));
        assert_eq!(r.turn, 14);
    }

    #[test]
    fn joining_and_betting_rules() {
        let mut race = Race::new(Utc::now(), &GuildConfig::default());
        race.add_racer(racer(1, MovementClass::Steady), 2).unwrap();
        assert!(race.add_racer(racer(1, MovementClass::Fast), 2).is_err());
        race.add_racer(racer(2, MovementClass::Steady), 2).unwrap();
        assert!(race.add_racer(racer(3, MovementClass::Steady), 2).is_err());

        let bet = |player_id, racer| Bettor {
            player_id,
            name: "b".to_string(),
            racer,
            stake: 100,
            winnings: 0,
        };
        assert!(race.place_bet(bet(9, 0)).is_err());
        race.open_betting().unwrap();
        assert!(race.add_racer(racer(3, MovementClass::Steady), 5).is_err());
        assert!(race.place_bet(bet(9, 2)).is_err());
        race.place_bet(bet(9, 0)).unwrap();
        assert!(race.place_bet(bet(9, 1)).is_err());
        assert_eq!(race.phase(), RacePhase::Betting);
    }

    #[test]
    fn deadlines_follow_config() {
        let now = Utc::now();
        let config = GuildConfig::default();
        let race = Race::new(now, &config);
        assert_eq!(race.join_deadline, after(now, config.wait_for_join));
        assert_eq!(
            race.bet_deadline,
            after(now, config.wait_for_join + config.wait_for_betting)
        );
        assert_eq!(race.phase(), RacePhase::Joining);
    }

    #[test]
    fn settlement_pays_places_and_winning_bets() {
        let mut race = betting_race(vec![
            racer(1, MovementClass::Slow),
            racer(2, MovementClass::Steady),
            racer(3, MovementClass::Predator),
        ]);
        let bet = |player_id, racer| Bettor {
            player_id,
            name: format!("bettor{player_id}"),
            racer,
            stake: 100,
            winnings: 0,
        };
        race.place_bet(bet(7, 1)).unwrap();
        race.place_bet(bet(8, 2)).unwrap();
        race.begin().unwrap();

        // every roll comes up low: slow moves 3, steady 6, predator 6 on odd legs
        let mut d = dice(&[]);
        let mut legs = 0;
        while !race.all_finished() && legs < MAX_LEGS {
            race.run_leg(&mut d);
            legs += 1;
        }
        assert_eq!(legs, 28);

        let result = race.settle(1000).unwrap();
        assert_eq!(result.prize, 3000);
        assert_eq!(result.winner(), Some(1));
        let prizes: Vec<_> = result.placings.iter().map(|p| (p.racer, p.prize)).collect();
        assert_eq!(prizes, vec![(1, 3000), (0, 2250), (2, 1500)]);
        assert_eq!(result.payouts, vec![(7, 300)]);
        assert_eq!(race.bets[0].winnings, 300);
        assert_eq!(race.bets[1].winnings, 0);
        assert_eq!(race.racers[2].prize, 1500);
        assert_eq!(race.phase(), RacePhase::Ended);
    }

    #[test]
    fn ties_are_broken_by_tiebreak_draw() {
        let mut race = betting_race(vec![
            racer(1, MovementClass::Steady),
            racer(2, MovementClass::Steady),
        ]);
        race.begin().unwrap();
        // steady never rolls, so the only draws are the two tiebreaks
        let mut d = dice(&[900, 100]);
        while !race.all_finished() {
            race.run_leg(&mut d);
        }
        assert_eq!(race.racers[0].finish, race.racers[1].finish);
        assert_eq!(race.standings(), vec![1, 0]);
    }

    #[test]
    fn stragglers_are_ranked_by_distance_left() {
        let mut race = betting_race(vec![
            racer(1, MovementClass::VeryFast),
            racer(2, MovementClass::Steady),
            racer(3, MovementClass::VeryFast),
        ]);
        race.begin().unwrap();
        // very fast racers roll 0 forever; only the steady racer finishes
        let mut d = dice(&[]);
        for _ in 0..20 {
            race.run_leg(&mut d);
        }
        race.force_finish();
        assert!(race.all_finished());
        assert_eq!(race.standings()[0], 1);
        assert!(race.settle(100).is_ok());
    }

    #[test]
    fn settle_requires_a_finished_running_race() {
        let mut race = betting_race(vec![
            racer(1, MovementClass::Steady),
            racer(2, MovementClass::Steady),
        ]);
        assert!(race.settle(100).is_err());
        race.begin().unwrap();
        assert!(race.settle(100).is_err());
    }

    #[test]
    fn prize_shares() {
        assert_eq!(prize_for_place(2001, 1), 2001);
        assert_eq!(prize_for_place(2001, 2), 1500);
        assert_eq!(prize_for_place(2001, 3), 1000);
        assert_eq!(prize_for_place(2001, 4), 0);
    }
}
