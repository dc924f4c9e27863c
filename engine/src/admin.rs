use std::{fmt::Display, time::Duration};

use types::{clock::format_duration, Catalog, GameError, GuildState, Target, TargetEdit};

use crate::{
    render,
    session::Doc,
    transport::{Actor, Interaction, Reply},
    Engine, EngineError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeistSetting {
    Bail(u64),
    Cost(u64),
    Death(Duration),
    Hardcore(bool),
    Police(Duration),
    Sentence(Duration),
    Theme(String),
    Wait(Duration),
}

impl HeistSetting {
    fn apply(&self, state: &mut GuildState, catalog: &Catalog) -> Result<(), GameError> {
        let config = &mut state.config;
        match self {
            HeistSetting::Bail(amount) => config.bail_base = *amount,
            HeistSetting::Cost(amount) => config.heist_cost = *amount,
            HeistSetting::Death(wait) => config.death_timer = *wait,
            HeistSetting::Hardcore(on) => config.hardcore = *on,
            HeistSetting::Police(wait) => config.police_alert = *wait,
            HeistSetting::Sentence(wait) => config.sentence_base = *wait,
            HeistSetting::Theme(id) => {
                catalog.theme(id)?;
                config.theme = id.clone();
            }
            HeistSetting::Wait(wait) => config.wait_time = *wait,
        }
        Ok(())
    }
}

impl Display for HeistSetting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeistSetting::Bail(amount) => write!(f, "Base bail is now {amount}"),
            HeistSetting::Cost(amount) => write!(f, "Heists now cost {amount}"),
            HeistSetting::Death(wait) => write!(f, "Death now lasts {}", format_duration(*wait)),
            HeistSetting::Hardcore(true) => write!(f, "Hardcore mode is on"),
            HeistSetting::Hardcore(false) => write!(f, "Hardcore mode is off"),
            HeistSetting::Police(wait) => {
                write!(f, "Police stay alert for {}", format_duration(*wait))
            }
            HeistSetting::Sentence(wait) => {
                write!(f, "Base sentence is now {}", format_duration(*wait))
            }
            HeistSetting::Theme(id) => write!(f, "Theme is now {id}"),
            HeistSetting::Wait(wait) => {
                write!(f, "Crews now gather for {}", format_duration(*wait))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaceSetting {
    Bet(u64),
    Prize { min: u64, max: u64 },
    Racers { min: usize, max: usize },
    JoinWait(Duration),
    BetWait(Duration),
    Cooldown(Duration),
    Mode(String),
    Currency(String),
}

impl RaceSetting {
    fn apply(&self, state: &mut GuildState, catalog: &Catalog) -> Result<(), GameError> {
        let config = &mut state.config;
        match self {
            RaceSetting::Bet(amount) => config.bet_amount = *amount,
            RaceSetting::Prize { min, max } => config.set_prize_range(*min, *max)?,
            RaceSetting::Racers { min, max } => config.set_racer_bounds(*min, *max)?,
            RaceSetting::JoinWait(wait) => config.wait_for_join = *wait,
            RaceSetting::BetWait(wait) => config.wait_for_betting = *wait,
            RaceSetting::Cooldown(wait) => config.wait_between_races = *wait,
            RaceSetting::Mode(id) => {
                catalog.mode(id)?;
                config.mode = id.clone();
            }
            RaceSetting::Currency(name) => {
                if name.trim().is_empty() {
                    return Err(GameError::precondition("Currency name cannot be empty"));
                }
                config.currency = name.clone();
                state.ledger.currency = name.clone();
            }
        }
        Ok(())
    }
}

impl Display for RaceSetting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RaceSetting::Bet(amount) => write!(f, "Bets now cost {amount}"),
            RaceSetting::Prize { min, max } => write!(f, "Base prize is now {min} to {max}"),
            RaceSetting::Racers { min, max } => write!(f, "Races now take {min} to {max} racers"),
            RaceSetting::JoinWait(wait) => {
                write!(f, "Entries stay open for {}", format_duration(*wait))
            }
            RaceSetting::BetWait(wait) => {
                write!(f, "Betting stays open for {}", format_duration(*wait))
            }
            RaceSetting::Cooldown(wait) => {
                write!(f, "Races are now {} apart", format_duration(*wait))
            }
            RaceSetting::Mode(id) => write!(f, "Race mode is now {id}"),
            RaceSetting::Currency(name) => write!(f, "Currency is now {name}"),
        }
    }
}

/// Admin operations. Permission checks belong to the chat platform.
impl Engine {
    /// Drops the guild's heist in any phase without refunds.
    pub(crate) async fn reset_heist(&self, ctx: &Interaction) -> Result<(), EngineError> {
        let session = self.session(ctx.guild_id).await;
        let (message, closed, reply) = {
            let mut session = session.lock().await;
            let labels = self.labels(&session.state.config)?;
            if session.state.heist.is_none() {
                return Err(GameError::precondition(format!(
                    "There is no {} to reset.",
                    labels.heist
                ))
                .into());
            }
            let closed = render::heist_planning(&session.state, &labels, None);
            let message = session.heist.message;
            session.state.heist = None;
            session.retire_heist_window();
            log::info!("Heist reset in guild {} by {}", ctx.guild_id, ctx.user.name);
            (message, closed, render::heist_reset(&labels))
        };
        self.edit(message, closed).await;
        self.reply(ctx, reply).await;
        Ok(())
    }

    pub(crate) async fn add_target(&self, ctx: &Interaction, target: Target) -> Result<(), EngineError> {
        self.update_guild(ctx, &[Doc::Heist], |session| {
            let name = target.name.clone();
            session.state.targets.add(target)?;
            Ok(Reply::text(format!("Added target {name}.")))
        })
        .await
    }

    pub(crate) async fn edit_target(
        &self,
        ctx: &Interaction,
        name: &str,
        edit: TargetEdit,
    ) -> Result<(), EngineError> {
        self.update_guild(ctx, &[Doc::Heist], |session| {
            let target = session.state.targets.edit(name, edit)?;
            Ok(Reply::text(format!(
                "{} now needs a crew of {} with {}% success and holds {}/{}.",
                target.name, target.crew_size, target.success, target.vault, target.vault_max
            )))
        })
        .await
    }

    pub(crate) async fn remove_target(&self, ctx: &Interaction, name: &str) -> Result<(), EngineError> {
        self.update_guild(ctx, &[Doc::Heist], |session| {
            let removed = session.state.targets.remove(name)?;
            Ok(Reply::text(format!("Removed target {}.", removed.name)))
        })
        .await
    }

    pub(crate) async fn set_heist(&self, ctx: &Interaction, setting: HeistSetting) -> Result<(), EngineError> {
        self.update_guild(ctx, &[Doc::Heist], |session| {
            setting.apply(&mut session.state, self.catalog())?;
            log::info!("Guild {}: {setting}", ctx.guild_id);
            Ok(Reply::text(format!("{setting}.")))
        })
        .await
    }

    /// Wipes a player's criminal record. Race stats survive.
    pub(crate) async fn clear_player(&self, ctx: &Interaction, target: Actor) -> Result<(), EngineError> {
        self.update_guild(ctx, &[Doc::Heist], |session| {
            let player = session
                .state
                .players
                .get_mut(&target.id)
                .ok_or_else(|| GameError::not_found("player", target.name.clone()))?;
            player.clear_record();
            Ok(Reply::text(format!("{}'s record has been wiped.", target.name)))
        })
        .await
    }

    /// Drops a race that is not running and refunds its bets.
    pub(crate) async fn reset_race(&self, ctx: &Interaction) -> Result<(), EngineError> {
        let session = self.session(ctx.guild_id).await;
        let (message, snapshot, reply) = {
            let mut guard = session.lock().await;
            let session = &mut *guard;
            let Some(race) = &session.state.race else {
                return Err(GameError::precondition("There is no race to reset.").into());
            };
            if race.started {
                return Err(GameError::precondition(
                    "The race is already running; wait for it to finish.",
                )
                .into());
            }
            let bets = race.bets.clone();
            for bet in &bets {
                if bet.stake > 0 {
                    session.state.ledger.deposit(bet.player_id, bet.stake)?;
                }
            }
            let message = session.race.message;
            session.state.race = None;
            session.retire_race_window();
            log::info!("Race reset in guild {}, {} bets refunded", ctx.guild_id, bets.len());
            (message, session.snapshot(&[Doc::Economy])?, render::race_reset(bets.len()))
        };
        self.save(snapshot).await;
        self.edit(message, Reply::text("This race was called off.")).await;
        self.reply(ctx, reply).await;
        Ok(())
    }

    pub(crate) async fn set_race(&self, ctx: &Interaction, setting: RaceSetting) -> Result<(), EngineError> {
        self.update_guild(ctx, &[Doc::Heist, Doc::Economy], |session| {
            setting.apply(&mut session.state, self.catalog())?;
            log::info!("Guild {}: {setting}", ctx.guild_id);
            Ok(Reply::text(format!("{setting}.")))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use types::{
        catalog::{BadMessage, GoodMessage},
        BadResult, Character, GuildConfig, Labels, Mode, MovementClass, Targets, Theme,
    };

    use super::*;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog
            .add_theme(Theme {
                id: "pirates".to_string(),
                labels: Labels::default(),
                good: vec![GoodMessage {
                    message: "{} sailed off".to_string(),
                    bonus: 5,
                }],
                bad: vec![BadMessage {
                    message: "{} walked the plank".to_string(),
                    result: BadResult::Dead,
                }],
            })
            .unwrap();
        catalog
            .add_mode(Mode {
                id: "space".to_string(),
                beginning: "|".to_string(),
                ending: "|".to_string(),
                characters: vec![Character {
                    emoji: "🚀".to_string(),
                    movement: MovementClass::Fast,
                }],
            })
            .unwrap();
        catalog
    }

    fn state() -> GuildState {
        GuildState::new(1, GuildConfig::default(), Targets::new())
    }

    #[test]
    fn heist_settings_validate_theme() {
        let catalog = catalog();
        let mut state = state();
        HeistSetting::Death(Duration::from_secs(600))
            .apply(&mut state, &catalog)
            .unwrap();
        assert_eq!(state.config.death_timer, Duration::from_secs(600));

        assert!(HeistSetting::Theme("ninjas".to_string())
            .apply(&mut state, &catalog)
            .is_err());
        HeistSetting::Theme("pirates".to_string())
            .apply(&mut state, &catalog)
            .unwrap();
        assert_eq!(state.config.theme, "pirates");
    }

    #[test]
    fn race_settings_validate_bounds_and_mode() {
        let catalog = catalog();
        let mut state = state();
        assert!(RaceSetting::Racers { min: 1, max: 4 }
            .apply(&mut state, &catalog)
            .is_err());
        assert!(RaceSetting::Prize { min: 900, max: 500 }
            .apply(&mut state, &catalog)
            .is_err());
        assert!(RaceSetting::Mode("clash".to_string())
            .apply(&mut state, &catalog)
            .is_err());
        RaceSetting::Mode("space".to_string())
            .apply(&mut state, &catalog)
            .unwrap();
        RaceSetting::Currency("doubloons".to_string())
            .apply(&mut state, &catalog)
            .unwrap();
        assert_eq!(state.config.mode, "space");
        assert_eq!(state.ledger.currency, "doubloons");
    }

    #[test]
    fn settings_describe_themselves() {
        assert_eq!(
            HeistSetting::Sentence(Duration::from_secs(90)).to_string(),
            "Base sentence is now 1m 30s"
        );
        assert_eq!(
            RaceSetting::Prize { min: 500, max: 900 }.to_string(),
            "Base prize is now 500 to 900"
        );
    }
}
