use std::{collections::BTreeMap, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    clock::{after, remaining},
    config::GuildConfig,
    economy::Ledger,
    heist::Heist,
    player::Player,
    race::Race,
    target::Targets,
    GuildId, PlayerId,
};

/// Everything a guild owns. The in-flight heist and race are never persisted;
/// a restart drops them.
#[derive(Debug, Clone)]
pub struct GuildState {
    pub guild_id: GuildId,
    pub config: GuildConfig,
    pub players: BTreeMap<PlayerId, Player>,
    pub targets: Targets,
    pub ledger: Ledger,
    pub heist: Option<Heist>,
    pub race: Option<Race>,
    pub last_race_ended: Option<DateTime<Utc>>,
}

/// Persisted form of the heist side of a guild.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeistDocument {
    pub config: GuildConfig,
    pub players: BTreeMap<PlayerId, Player>,
    pub targets: Targets,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaceDocument {
    pub last_race_ended: Option<DateTime<Utc>>,
}

impl GuildState {
    pub fn new(guild_id: GuildId, config: GuildConfig, targets: Targets) -> Self {
        Self {
            guild_id,
            config,
            players: BTreeMap::new(),
            targets,
            ledger: Ledger::new(guild_id),
            heist: None,
            race: None,
            last_race_ended: None,
        }
    }

    pub fn from_documents(
        guild_id: GuildId,
        heist: HeistDocument,
        race: RaceDocument,
        ledger: Ledger,
    ) -> Self {
        Self {
            guild_id,
            config: heist.config,
            players: heist.players,
            targets: heist.targets,
            ledger,
            heist: None,
            race: None,
            last_race_ended: race.last_race_ended,
        }
    }

    pub fn heist_document(&self) -> HeistDocument {
        HeistDocument {
            config: self.config.clone(),
            players: self.players.clone(),
            targets: self.targets.clone(),
        }
    }

    pub fn race_document(&self) -> RaceDocument {
        RaceDocument {
            last_race_ended: self.last_race_ended,
        }
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&Player> {
        self.players.get(&player_id)
    }

    /// Fetches the player's profile, creating it on first sight and keeping
    /// the display name current.
    pub fn player_mut(&mut self, player_id: PlayerId, name: &str) -> &mut Player {
        let player = self
            .players
            .entry(player_id)
            .or_insert_with(|| Player::new(player_id, name.to_string()));
        if player.name != name {
            player.name = name.to_string();
        }
        player
    }

    pub fn player_name(&self, player_id: PlayerId) -> String {
        self.players
            .get(&player_id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| player_id.to_string())
    }

    /// Time left before another race may be prepared.
    pub fn race_cooldown(&self, now: DateTime<Utc>) -> Duration {
        self.last_race_ended.map_or(Duration::ZERO, |ended| {
            remaining(after(ended, self.config.wait_between_races), now)
        })
    }
}
