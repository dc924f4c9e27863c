use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::{
    catalog::{HeistMessage, Theme},
    clock::after,
    dice::Dice,
    error::GameError,
    player::PlayerStatus,
    target::Target,
    PlayerId,
};

/// A heist in its planning or running phase. At most one exists per guild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heist {
    pub planner: PlayerId,
    /// Join order; the planner is always first.
    pub crew: Vec<PlayerId>,
    pub start_time: DateTime<Utc>,
    pub planned: bool,
    pub started: bool,
}

impl Heist {
    pub fn plan(planner: PlayerId, now: DateTime<Utc>, wait: Duration) -> Self {
        Self {
            planner,
            crew: vec![planner],
            start_time: after(now, wait),
            planned: true,
            started: false,
        }
    }

    pub fn is_member(&self, player_id: PlayerId) -> bool {
        self.crew.contains(&player_id)
    }

    pub fn add_member(&mut self, player_id: PlayerId) -> Result<(), GameError> {
        if !self.planned {
            return Err(GameError::precondition("The heist is no longer taking new members."));
        }
        if self.is_member(player_id) {
            return Err(GameError::precondition("You are already in the crew."));
        }
        self.crew.push(player_id);
        Ok(())
    }

    pub fn remove_member(&mut self, player_id: PlayerId) -> Result<(), GameError> {
        if !self.planned {
            return Err(GameError::precondition("The heist is already underway."));
        }
        if player_id == self.planner {
            return Err(GameError::precondition(
                "The planner cannot leave the crew; cancel the heist instead.",
            ));
        }
        let before = self.crew.len();
        self.crew.retain(|&id| id != player_id);
        if self.crew.len() == before {
            return Err(GameError::precondition("You are not in the crew."));
        }
        Ok(())
    }

    pub fn begin(&mut self) -> Result<(), GameError> {
        if !self.planned {
            return Err(GameError::Internal(
                "heist started without being planned".to_string(),
            ));
        }
        self.planned = false;
        self.started = true;
        Ok(())
    }
}

/// Draws from a message pool without replacement; once every message has
/// been used the pool is replenished.
#[derive(Debug)]
pub struct MessageDeck<'a, T> {
    pool: &'a [T],
    remaining: Vec<usize>,
}

impl<'a, T> MessageDeck<'a, T> {
    pub fn new(pool: &'a [T]) -> Self {
        Self {
            pool,
            remaining: (0..pool.len()).collect(),
        }
    }

    pub fn draw(&mut self, dice: &mut dyn Dice) -> Option<&'a T> {
        if self.pool.is_empty() {
            return None;
        }
        if self.remaining.is_empty() {
            self.remaining = (0..self.pool.len()).collect();
        }
        let slot = self.remaining.remove(dice.pick(self.remaining.len()));
        self.pool.get(slot)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberOutcome {
    pub player_id: PlayerId,
    pub name: String,
    pub status: PlayerStatus,
    pub message: String,
    pub bonus: u64,
    pub stolen: u64,
}

impl MemberOutcome {
    pub fn is_survivor(&self) -> bool {
        self.status != PlayerStatus::Dead
    }

    pub fn payout(&self) -> u64 {
        if self.is_survivor() {
            self.stolen + self.bonus
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeistOutcome {
    pub target: String,
    pub success_rate: u64,
    pub credits_per_survivor: u64,
    /// Crew order.
    pub members: Vec<MemberOutcome>,
}

impl HeistOutcome {
    /// Everyone who did not die, including apprehended members.
    pub fn survivors(&self) -> impl Iterator<Item = &MemberOutcome> {
        self.members.iter().filter(|m| m.is_survivor())
    }

    pub fn total_payout(&self) -> u64 {
        self.members.iter().map(MemberOutcome::payout).sum()
    }

    /// Loot taken from the vault; message bonuses are not part of it.
    pub fn total_stolen(&self) -> u64 {
        self.members.iter().map(|m| m.stolen).sum()
    }
}

/// `⌊vault · 0.75 / (members + survivors)⌋` in integer arithmetic.
pub fn credits_per_survivor(vault: u64, members: usize, survivors: usize) -> u64 {
    let shares = (members + survivors) as u128 * 4;
    if shares == 0 {
        return 0;
    }
    (vault as u128 * 3 / shares) as u64
}

/// Rolls every crew member's fate against `target` and computes each share.
pub fn resolve(
    crew: &[(PlayerId, String)],
    target: &Target,
    theme: &Theme,
    dice: &mut dyn Dice,
) -> Result<HeistOutcome, GameError> {
    let success_rate = target.success_rate(crew.len());
    let mut good = MessageDeck::new(&theme.good);
    let mut bad = MessageDeck::new(&theme.bad);

    let mut members = Vec::with_capacity(crew.len());
    for (player_id, name) in crew {
        let roll = dice.percent();
        let drawn = if roll <= success_rate {
            good.draw(dice).cloned().map(HeistMessage::Good)
        } else {
            bad.draw(dice).cloned().map(HeistMessage::Bad)
        };
        let message = drawn.ok_or_else(|| {
            GameError::Internal(format!("theme {} has an empty message pool", theme.id))
        })?;
        log::debug!("{name} rolled {roll} against {success_rate}: {:?}", message.status());
        members.push(MemberOutcome {
            player_id: *player_id,
            name: name.clone(),
            status: message.status(),
            message: message.render(name),
            bonus: message.bonus(),
            stolen: 0,
        });
    }

    let survivors = members.iter().filter(|m| m.is_survivor()).count();
    let share = credits_per_survivor(target.vault, members.len(), survivors);
    for member in members.iter_mut().filter(|m| m.is_survivor()) {
        member.stolen = share;
    }

    Ok(HeistOutcome {
        target: target.name.clone(),
        success_rate,
        credits_per_survivor: share,
        members,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::catalog::{BadMessage, BadResult, GoodMessage, Labels};

    #[derive(Debug)]
    struct Scripted(VecDeque<u64>);

    impl Dice for Scripted {
        fn roll(&mut self, low: u64, high: u64) -> u64 {
            self.0.pop_front().unwrap_or(low).clamp(low, high)
        }
    }

    fn theme(good: &[(&str, u64)], bad: &[(&str, BadResult)]) -> Theme {
        Theme {
            id: "test".to_string(),
            labels: Labels::default(),
            good: good
                .iter()
                .map(|&(message, bonus)| GoodMessage {
                    message: message.to_string(),
                    bonus,
                })
                .collect(),
            bad: bad
                .iter()
                .map(|&(message, result)| BadMessage {
                    message: message.to_string(),
                    result,
                })
                .collect(),
        }
    }

    fn bank(success: u64) -> Target {
        Target {
            name: "bank".to_string(),
            crew_size: 2,
            success,
            vault: 10000,
            vault_max: 10000,
        }
    }

    fn crew() -> Vec<(PlayerId, String)> {
        vec![(1, "A".to_string()), (2, "B".to_string())]
    }

    #[test]
    fn crew_membership_rules() {
        let mut heist = Heist::plan(1, Utc::now(), Duration::from_secs(30));
        assert_eq!(heist.crew, vec![1]);
        heist.add_member(2).unwrap();
        assert!(heist.add_member(2).is_err());
        assert!(heist.remove_member(1).is_err());
        assert!(heist.remove_member(3).is_err());
        heist.remove_member(2).unwrap();
        assert_eq!(heist.crew, vec![1]);

        heist.begin().unwrap();
        assert!(heist.started && !heist.planned);
        assert!(heist.add_member(4).is_err());
        assert!(heist.begin().is_err());
    }

    #[test]
    fn deck_draws_without_replacement_then_replenishes() {
        let pool = ["a", "b", "c"];
        let mut deck = MessageDeck::new(&pool);
        let mut dice = Scripted(VecDeque::from(vec![2, 0, 0, 1]));
        assert_eq!(deck.draw(&mut dice), Some(&"c"));
        assert_eq!(deck.draw(&mut dice), Some(&"a"));
        assert_eq!(deck.draw(&mut dice), Some(&"b"));
        // replenished
        assert_eq!(deck.draw(&mut dice), Some(&"b"));

        let empty: [&str; 0] = [];
        assert_eq!(MessageDeck::new(&empty).draw(&mut dice), None);
    }

    #[test]
    fn two_member_success_splits_three_quarters_of_vault() {
        let theme = theme(&[("{} escaped", 100)], &[("{} was caught", BadResult::Apprehended)]);
        let mut dice = Scripted(VecDeque::from(vec![100, 0, 100, 0]));
        let outcome = resolve(&crew(), &bank(100), &theme, &mut dice).unwrap();

        assert_eq!(outcome.success_rate, 105);
        assert_eq!(outcome.credits_per_survivor, 1875);
        for member in &outcome.members {
            assert_eq!(member.status, PlayerStatus::Free);
            assert_eq!(member.payout(), 1975);
        }
        assert_eq!(outcome.members[0].message, "A escaped");
        assert_eq!(outcome.members[1].message, "B escaped");
    }

    #[test]
    fn apprehended_members_are_credited_survivors() {
        let theme = theme(&[("{} escaped", 100)], &[("{} was caught", BadResult::Apprehended)]);
        let mut dice = Scripted(VecDeque::from(vec![100, 0, 100, 0]));
        let outcome = resolve(&crew(), &bank(0), &theme, &mut dice).unwrap();

        assert_eq!(outcome.survivors().count(), 2);
        for member in &outcome.members {
            assert_eq!(member.status, PlayerStatus::Apprehended);
            assert_eq!(member.payout(), 1875);
        }
        assert_eq!(outcome.members[1].message, "B was caught");
    }

    #[test]
    fn the_dead_take_nothing_but_count_as_members() {
        let theme = theme(
            &[("{} escaped", 10)],
            &[("{} was shot", BadResult::Dead)],
        );
        // A succeeds (roll 1), B fails (roll 100)
        let mut dice = Scripted(VecDeque::from(vec![1, 0, 100, 0]));
        let outcome = resolve(&crew(), &bank(50), &theme, &mut dice).unwrap();

        // 10000 * 0.75 / (2 members + 1 survivor)
        assert_eq!(outcome.credits_per_survivor, 2500);
        assert_eq!(outcome.members[0].payout(), 2510);
        assert_eq!(outcome.members[1].status, PlayerStatus::Dead);
        assert_eq!(outcome.members[1].payout(), 0);
        assert_eq!(outcome.total_payout(), 2510);
        assert_eq!(outcome.total_stolen(), 2500);
    }

    #[test]
    fn share_formula_floors() {
        assert_eq!(credits_per_survivor(10000, 2, 2), 1875);
        assert_eq!(credits_per_survivor(1001, 3, 3), 125);
        assert_eq!(credits_per_survivor(0, 3, 3), 0);
        assert_eq!(credits_per_survivor(10000, 0, 0), 0);
    }
}
