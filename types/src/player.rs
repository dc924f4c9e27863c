use std::{fmt::Display, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    catalog::Labels,
    clock::{after, format_duration, remaining},
    config::GuildConfig,
    error::GameError,
    PlayerId,
};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerStatus {
    #[default]
    Free,
    Apprehended,
    Dead,
}

impl Display for PlayerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerStatus::Free => write!(f, "Free"),
            PlayerStatus::Apprehended => write!(f, "Apprehended"),
            PlayerStatus::Dead => write!(f, "Dead"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum CriminalRank {
    Greenhorn,
    Renegade,
    Veteran,
    Commander,
    WarChief,
    Legend,
    Immortal,
}

impl CriminalRank {
    pub fn from_level(level: u32) -> Self {
        match level {
            0 => CriminalRank::Greenhorn,
            1..=9 => CriminalRank::Renegade,
            10..=24 => CriminalRank::Veteran,
            25..=49 => CriminalRank::Commander,
            50..=74 => CriminalRank::WarChief,
            75..=99 => CriminalRank::Legend,
            _ => CriminalRank::Immortal,
        }
    }
}

impl Display for CriminalRank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CriminalRank::Greenhorn => "Greenhorn",
            CriminalRank::Renegade => "Renegade",
            CriminalRank::Veteran => "Veteran",
            CriminalRank::Commander => "Commander",
            CriminalRank::WarChief => "War Chief",
            CriminalRank::Legend => "Legend",
            CriminalRank::Immortal => "Immortal",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceStats {
    pub wins: u32,
    pub places: u32,
    pub shows: u32,
    pub losses: u32,
    pub earnings: u64,
    pub bets_placed: u32,
    pub bets_won: u32,
    pub bet_earnings: u64,
}

impl RaceStats {
    /// `place` is 1-based.
    pub fn record_finish(&mut self, place: usize, prize: u64) {
        match place {
            1 => self.wins += 1,
            2 => self.places += 1,
            3 => self.shows += 1,
            _ => self.losses += 1,
        }
        self.earnings += prize;
    }

    pub fn record_bet(&mut self, winnings: u64) {
        self.bets_placed += 1;
        if winnings > 0 {
            self.bets_won += 1;
            self.bet_earnings += winnings;
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Release {
    /// Sentence served; the player walks out of jail.
    Served,
    /// Sentence served while out on bail; the bail penalty is lifted.
    BailCleared,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub status: PlayerStatus,
    pub criminal_level: u32,
    pub oob: bool,
    pub bail_cost: u64,
    #[serde(with = "crate::serde_secs")]
    pub sentence: Duration,
    pub jail_until: Option<DateTime<Utc>>,
    pub dead_until: Option<DateTime<Utc>>,
    pub spree: u32,
    pub jail_counter: u32,
    pub total_jail: u32,
    pub total_deaths: u32,
    pub race: RaceStats,
}

impl Default for Player {
    fn default() -> Self {
        Self::new(0, String::new())
    }
}

impl Player {
    pub fn new(id: PlayerId, name: String) -> Self {
        Self {
            id,
            name,
            status: PlayerStatus::Free,
            criminal_level: 0,
            oob: false,
            bail_cost: 0,
            sentence: Duration::ZERO,
            jail_until: None,
            dead_until: None,
            spree: 0,
            jail_counter: 0,
            total_jail: 0,
            total_deaths: 0,
            race: RaceStats::default(),
        }
    }

    pub fn rank(&self) -> CriminalRank {
        CriminalRank::from_level(self.criminal_level)
    }

    pub fn sentence_served(&self, now: DateTime<Utc>) -> bool {
        self.jail_until.map_or(true, |until| now >= until)
    }

    pub fn jail_remaining(&self, now: DateTime<Utc>) -> Duration {
        self.jail_until
            .map_or(Duration::ZERO, |until| remaining(until, now))
    }

    pub fn death_remaining(&self, now: DateTime<Utc>) -> Duration {
        self.dead_until
            .map_or(Duration::ZERO, |until| remaining(until, now))
    }

    /// Whether this player may plan or join a heist right now. A served
    /// sentence or an expired death timer still blocks until the player
    /// explicitly releases or revives.
    pub fn check_can_heist(&self, now: DateTime<Utc>, labels: &Labels) -> Result<(), GameError> {
        match self.status {
            PlayerStatus::Free => Ok(()),
            PlayerStatus::Dead if self.death_remaining(now).is_zero() => Err(GameError::precondition(
                "You have risen from the dead! Use revive to rejoin the living.",
            )),
            PlayerStatus::Dead => Err(GameError::precondition(format!(
                "You are dead. You can revive in {}.",
                format_duration(self.death_remaining(now))
            ))),
            PlayerStatus::Apprehended if self.sentence_served(now) => Err(GameError::precondition(
                format!(
                    "Your {} is served. Use release to get out of {}.",
                    labels.sentence, labels.jail
                ),
            )),
            PlayerStatus::Apprehended => Err(GameError::precondition(format!(
                "You are in {} for another {}. {} is set at {}.",
                labels.jail,
                format_duration(self.jail_remaining(now)),
                capitalize(&labels.bail),
                self.bail_cost
            ))),
        }
    }

    pub fn apprehend(&mut self, now: DateTime<Utc>, config: &GuildConfig) {
        let priors = self.jail_counter + 1;
        self.sentence = config.sentence_base.saturating_mul(priors);
        self.bail_cost = if self.oob {
            config.bail_base.saturating_mul(3)
        } else {
            config.bail_base
        };
        self.criminal_level += 1;
        self.jail_counter += 1;
        self.total_jail += 1;
        self.spree = 0;
        self.jail_until = Some(after(now, self.sentence));
        self.oob = false;
        self.status = PlayerStatus::Apprehended;
    }

    pub fn kill(&mut self, now: DateTime<Utc>, config: &GuildConfig) {
        self.bail_cost = 0;
        self.sentence = Duration::ZERO;
        self.jail_counter = 0;
        self.criminal_level = 0;
        self.spree = 0;
        self.oob = false;
        self.jail_until = None;
        self.total_deaths += 1;
        self.dead_until = Some(after(now, config.death_timer));
        self.status = PlayerStatus::Dead;
    }

    pub fn record_escape(&mut self) {
        if self.status == PlayerStatus::Free {
            self.spree += 1;
        }
    }

    /// Validates a bail purchase for this player and returns its cost.
    pub fn bail_quote(&self, now: DateTime<Utc>, labels: &Labels) -> Result<u64, GameError> {
        if self.status != PlayerStatus::Apprehended {
            return Err(GameError::precondition(format!(
                "{} is not in {}.",
                self.name, labels.jail
            )));
        }
        if self.oob {
            return Err(GameError::precondition(format!(
                "{} is already {}.",
                self.name, labels.oob
            )));
        }
        if self.sentence_served(now) {
            return Err(GameError::precondition(format!(
                "{}'s {} is already served. Use release instead.",
                self.name, labels.sentence
            )));
        }
        Ok(self.bail_cost)
    }

    /// Marks the player out on bail. The sentence deadline is kept so a
    /// repeat offence while out on bail costs triple.
    pub fn post_bail(&mut self) {
        self.oob = true;
        self.status = PlayerStatus::Free;
    }

    pub fn release(&mut self, now: DateTime<Utc>, labels: &Labels) -> Result<Release, GameError> {
        match self.status {
            PlayerStatus::Apprehended if self.sentence_served(now) => {
                self.clear_jail();
                self.status = PlayerStatus::Free;
                Ok(Release::Served)
            }
            PlayerStatus::Apprehended => Err(GameError::precondition(format!(
                "You still have {} left on your {}.",
                format_duration(self.jail_remaining(now)),
                labels.sentence
            ))),
            PlayerStatus::Free if self.oob && self.sentence_served(now) => {
                self.clear_jail();
                Ok(Release::BailCleared)
            }
            PlayerStatus::Free if self.oob => Err(GameError::precondition(format!(
                "You are {} with {} left on your {}.",
                labels.oob,
                format_duration(self.jail_remaining(now)),
                labels.sentence
            ))),
            PlayerStatus::Free => Err(GameError::precondition(format!(
                "You are not in {}.",
                labels.jail
            ))),
            PlayerStatus::Dead => Err(GameError::precondition(
                "You are dead. Use revive once your death timer runs out.",
            )),
        }
    }

    pub fn revive(&mut self, now: DateTime<Utc>) -> Result<(), GameError> {
        match self.status {
            PlayerStatus::Dead if self.death_remaining(now).is_zero() => {
                self.dead_until = None;
                self.status = PlayerStatus::Free;
                Ok(())
            }
            PlayerStatus::Dead => Err(GameError::precondition(format!(
                "You can revive in {}.",
                format_duration(self.death_remaining(now))
            ))),
            _ => Err(GameError::precondition("You are not dead.")),
        }
    }

    /// Admin wipe of the criminal record; race stats are kept.
    pub fn clear_record(&mut self) {
        let race = std::mem::take(&mut self.race);
        *self = Self {
            race,
            ..Self::new(self.id, std::mem::take(&mut self.name))
        };
    }

    fn clear_jail(&mut self) {
        self.oob = false;
        self.bail_cost = 0;
        self.sentence = Duration::ZERO;
        self.jail_until = None;
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
