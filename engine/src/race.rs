use std::time::Duration;

use chrono::{DateTime, Utc};
use types::{
    clock::{format_duration, remaining},
    race::{RaceResult, MAX_LEGS},
    Bettor, Entrant, GameError, GuildId, GuildState, Mode, PlayerId, Race, RacePhase, Racer,
};

use crate::{
    charge, ensure_funds, render,
    session::Doc,
    timer::{self, BoxFuture, TimerHandle},
    transport::{Actor, Interaction, MessageHandle, Reply},
    Engine, EngineError, SharedSession,
};

/// What a race timer does when it runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    OpenBetting,
    Run,
}

impl Engine {
    pub(crate) async fn prepare_race(&self, ctx: &Interaction) -> Result<(), EngineError> {
        let now = self.now();
        let session = self.session(ctx.guild_id).await;
        let (generation, reply) = {
            let mut guard = session.lock().await;
            let session = &mut *guard;
            let state = &mut session.state;
            if state.race.is_some() {
                return Err(GameError::precondition("A race is already underway.").into());
            }
            let cooldown = state.race_cooldown(now);
            if !cooldown.is_zero() {
                return Err(GameError::precondition(format!(
                    "The track is being cleaned. The next race can start in {}.",
                    format_duration(cooldown)
                ))
                .into());
            }
            let mode = self.mode(&state.config)?;
            let bot = &self.settings().bot;
            let max = state.config.max_racers;
            let mut race = Race::new(now, &state.config);
            race.add_racer(self.racer(&ctx.user, false, mode)?, max)?;
            race.add_racer(self.racer(bot, true, mode)?, max)?;

            let wait = state.config.wait_for_join;
            let reply = render::race_lobby(&race, &state.config, mode, Some(wait));
            state.race = Some(race);
            log::info!("{} prepared a race in guild {}", ctx.user.name, ctx.guild_id);

            let generation = session.open_race_window(ctx.channel_id);
            session.race.timer = Some(self.schedule_race(ctx.guild_id, generation, wait, Step::OpenBetting));
            (generation, reply)
        };
        let message = self.reply(ctx, reply).await;
        remember_message(&session, generation, message).await;
        Ok(())
    }

    pub(crate) async fn join_race(&self, ctx: &Interaction) -> Result<(), EngineError> {
        let now = self.now();
        let session = self.session(ctx.guild_id).await;
        let (message, lobby, reply) = {
            let mut guard = session.lock().await;
            let session = &mut *guard;
            let state = &mut session.state;
            let mode = self.mode(&state.config)?;
            let Some(race) = state.race.as_mut() else {
                return Err(GameError::precondition("There is no race to join.").into());
            };
            let racer = self.racer(&ctx.user, false, mode)?;
            let emoji = racer.character.emoji.clone();
            race.add_racer(racer, state.config.max_racers)?;
            log::info!("{} joined the race in guild {}", ctx.user.name, ctx.guild_id);

            let left = remaining(race.join_deadline, now);
            let lobby = render::race_lobby(race, &state.config, mode, Some(left));
            (
                session.race.message,
                lobby,
                render::race_joined(&ctx.user.name, &emoji),
            )
        };
        self.edit(message, lobby).await;
        self.reply(ctx, reply).await;
        Ok(())
    }

    /// Bets the guild's bet amount on the racer at index `racer`.
    pub(crate) async fn bet(&self, ctx: &Interaction, racer: usize) -> Result<(), EngineError> {
        let now = self.now();
        self.update_guild(ctx, &[Doc::Economy], |session| {
            let state = &mut session.state;
            let stake = state.config.bet_amount;
            let Some(race) = state.race.as_mut() else {
                return Err(GameError::precondition("There is no race to bet on.").into());
            };
            if race.phase() != RacePhase::Betting {
                return Err(GameError::precondition("Betting is not open right now.").into());
            }
            ensure_funds(&state.ledger, ctx.user.id, stake)?;
            race.place_bet(Bettor {
                player_id: ctx.user.id,
                name: ctx.user.name.clone(),
                racer,
                stake,
                winnings: 0,
            })?;
            let racer_name = race
                .racers
                .get(racer)
                .map(|r| r.entrant.name.clone())
                .unwrap_or_default();
            charge(&mut state.ledger, &ctx.user, stake, now)?;
            log::info!("{} bet {stake} on {racer_name}", ctx.user.name);
            Ok(render::bet_placed(
                &ctx.user.name,
                &racer_name,
                stake,
                &state.ledger.currency,
            ))
        })
        .await
    }

    pub(crate) async fn race_stats(&self, ctx: &Interaction, target: Option<Actor>) -> Result<(), EngineError> {
        let target = target.unwrap_or_else(|| ctx.user.clone());
        self.update_guild(ctx, &[], |session| {
            let state = &session.state;
            Ok(render::race_stats(
                &target.name,
                state.player(target.id),
                &state.ledger.currency,
            ))
        })
        .await
    }

    /// A racer for `actor` riding a character drawn uniformly from `mode`.
    fn racer(&self, actor: &Actor, bot: bool, mode: &Mode) -> Result<Racer, GameError> {
        let character = self
            .with_dice(|dice| mode.characters.get(dice.pick(mode.characters.len())).cloned())
            .ok_or_else(|| GameError::Internal(format!("race mode {} has no characters", mode.id)))?;
        Ok(Racer::new(
            Entrant {
                player_id: actor.id,
                name: actor.name.clone(),
                bot,
            },
            character,
        ))
    }

    fn schedule_race(&self, guild_id: GuildId, generation: u64, wait: Duration, step: Step) -> TimerHandle {
        let ticker = self.clone();
        let runner = self.clone();
        timer::start(
            wait,
            move |left| {
                let engine = ticker.clone();
                Box::pin(async move { engine.race_tick(guild_id, generation, left).await })
            },
            move || runner.race_step(guild_id, generation, step),
        )
    }

    async fn race_tick(&self, guild_id: GuildId, generation: u64, left: Duration) -> Result<(), EngineError> {
        let session = self.session(guild_id).await;
        let (message, reply) = {
            let session = session.lock().await;
            if !session.race.is_current(generation) {
                return Ok(());
            }
            let state = &session.state;
            let Some(race) = &state.race else {
                return Ok(());
            };
            let reply = match race.phase() {
                RacePhase::Joining => render::race_lobby(race, &state.config, self.mode(&state.config)?, Some(left)),
                RacePhase::Betting => render::betting_board(race, &state.config, Some(left)),
                _ => return Ok(()),
            };
            (session.race.message, reply)
        };
        self.edit(message, reply).await;
        Ok(())
    }

    /// Runs a terminal race step. A failed step drops the race and tells the channel.
    fn race_step(&self, guild_id: GuildId, generation: u64, step: Step) -> BoxFuture<Result<(), EngineError>> {
        let engine = self.clone();
        Box::pin(async move {
            let result = match step {
                Step::OpenBetting => engine.open_betting(guild_id, generation).await,
                Step::Run => engine.run_race(guild_id, generation).await,
            };
            let Err(err) = result else {
                return Ok(());
            };
            log::error!("Race step {step:?} in guild {guild_id} failed: {err}");
            let session = engine.session(guild_id).await;
            let channel = {
                let mut session = session.lock().await;
                if !session.race.is_current(generation) {
                    return Err(err);
                }
                let channel = session.race.channel;
                session.state.race = None;
                session.retire_race_window();
                channel
            };
            engine
                .post(channel, Reply::text("Something went wrong and the race was called off."))
                .await;
            Err(err)
        })
    }

    /// Closes entries. Too few racers calls the race off; otherwise betting opens.
    async fn open_betting(&self, guild_id: GuildId, generation: u64) -> Result<(), EngineError> {
        let session = self.session(guild_id).await;
        let (channel, lobby_message, lobby, board) = {
            let mut guard = session.lock().await;
            let session = &mut *guard;
            if !session.race.is_current(generation) {
                log::debug!("Stale race timer for guild {guild_id}");
                return Ok(());
            }
            let channel = session.race.channel;
            let lobby_message = session.race.message.take();
            let state = &mut session.state;
            let mode = self.mode(&state.config)?;
            let Some(race) = state.race.as_mut() else {
                return Err(GameError::Internal("race timer fired without a race".to_string()).into());
            };
            let lobby = render::race_lobby(race, &state.config, mode, None);

            if race.racers.len() < state.config.min_racers {
                let entered = race.racers.len();
                let min_racers = state.config.min_racers;
                state.race = None;
                session.retire_race_window();
                log::info!("Race in guild {guild_id} called off with {entered} racers");
                (channel, lobby_message, lobby, Err(render::race_cancelled(entered, min_racers)))
            } else {
                race.open_betting()?;
                let wait = state.config.wait_for_betting;
                let board = render::betting_board(race, &state.config, Some(wait));
                session.race.timer = Some(self.schedule_race(guild_id, generation, wait, Step::Run));
                log::info!("Betting open in guild {guild_id}");
                (channel, lobby_message, lobby, Ok(board))
            }
        };
        self.edit(lobby_message, lobby).await;
        match board {
            Ok(board) => {
                let message = self.post(channel, board).await;
                remember_message(&session, generation, message).await;
            }
            Err(cancelled) => {
                self.post(channel, cancelled).await;
            }
        }
        Ok(())
    }

    /// Runs the whole race under the lock, settles it, then plays it back.
    async fn run_race(&self, guild_id: GuildId, generation: u64) -> Result<(), EngineError> {
        let now = self.now();
        let session = self.session(guild_id).await;
        let (channel, board_message, closed_board, frames, results, snapshot) = {
            let mut guard = session.lock().await;
            let session = &mut *guard;
            if !session.race.is_current(generation) {
                log::debug!("Stale race timer for guild {guild_id}");
                return Ok(());
            }
            session.race.timer = None;
            let channel = session.race.channel;
            let board_message = session.race.message.take();
            let state = &mut session.state;
            let mode = self.mode(&state.config)?;
            let Some(mut race) = state.race.take() else {
                return Err(GameError::Internal("race timer fired without a race".to_string()).into());
            };
            let closed_board = render::betting_board(&race, &state.config, None);
            race.begin()?;

            let mut frames = Vec::new();
            let mut legs = 0;
            while !race.all_finished() && legs < MAX_LEGS {
                self.with_dice(|dice| race.run_leg(dice));
                legs += 1;
                frames.push(render::race_frame(&race, mode));
            }
            if !race.all_finished() {
                log::warn!("Race in guild {guild_id} hit {MAX_LEGS} legs, ranking stragglers by distance");
                race.force_finish();
            }

            let (low, high) = (state.config.prize_min, state.config.prize_max);
            let base = self.with_dice(|dice| dice.roll(low, high.saturating_sub(1).max(low)));
            let result = race.settle(base)?;
            pay_out(state, &race, &result, now)?;
            log::info!(
                "Race in guild {guild_id} finished after {legs} legs, purse {}",
                result.prize
            );
            let results = render::race_results(&race, &result, &state.ledger.currency);
            state.race = Some(race);
            let snapshot = session.snapshot(&[Doc::Heist, Doc::Economy])?;
            (channel, board_message, closed_board, frames, results, snapshot)
        };
        self.save(snapshot).await;
        self.edit(board_message, closed_board).await;

        let mut frames = frames.into_iter();
        if let Some(first) = frames.next() {
            let track = self.post(channel, first).await;
            for frame in frames {
                tokio::time::sleep(self.settings().leg_cadence).await;
                self.edit(track, frame).await;
            }
        }
        self.post(channel, results).await;

        let snapshot = {
            let mut session = session.lock().await;
            if !session.race.is_current(generation) {
                return Ok(());
            }
            session.state.race = None;
            session.state.last_race_ended = Some(self.now());
            session.retire_race_window();
            session.snapshot(&[Doc::Race])?
        };
        self.save(snapshot).await;
        Ok(())
    }
}

/// Credits prizes and winning bets and records everyone's stats. The house
/// racer is never paid and keeps no record.
fn pay_out(
    state: &mut GuildState,
    race: &Race,
    result: &RaceResult,
    now: DateTime<Utc>,
) -> Result<(), GameError> {
    for placing in &result.placings {
        let Some(racer) = race.racers.get(placing.racer) else {
            continue;
        };
        let entrant = &racer.entrant;
        if entrant.bot {
            continue;
        }
        state
            .player_mut(entrant.player_id, &entrant.name)
            .race
            .record_finish(placing.place, placing.prize);
        credit(state, entrant.player_id, &entrant.name, placing.prize, now)?;
    }
    for bet in &race.bets {
        state
            .player_mut(bet.player_id, &bet.name)
            .race
            .record_bet(bet.winnings);
        credit(state, bet.player_id, &bet.name, bet.winnings, now)?;
    }
    Ok(())
}

fn credit(
    state: &mut GuildState,
    player_id: PlayerId,
    name: &str,
    amount: u64,
    now: DateTime<Utc>,
) -> Result<(), GameError> {
    if amount == 0 {
        return Ok(());
    }
    state.ledger.get_or_create(player_id, name, now);
    state.ledger.deposit(player_id, amount)?;
    Ok(())
}

async fn remember_message(session: &SharedSession, generation: u64, message: Option<MessageHandle>) {
    let mut session = session.lock().await;
    if session.race.is_current(generation) {
        session.race.message = message;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use types::{Character, GuildConfig, MovementClass, Targets};

    use super::*;

    fn entrant(player_id: PlayerId, bot: bool) -> Entrant {
        Entrant {
            player_id,
            name: format!("p{player_id}"),
            bot,
        }
    }

    fn steady() -> Character {
        Character {
            emoji: "🐢".to_string(),
            movement: MovementClass::Steady,
        }
    }

    #[test]
    fn pay_out_skips_the_house_racer() {
        let now = Utc::now();
        let mut state = GuildState::new(1, GuildConfig::default(), Targets::new());
        let mut race = Race::new(now, &state.config);
        race.add_racer(Racer::new(entrant(1, false), steady()), 4).unwrap();
        race.add_racer(Racer::new(entrant(99, true), steady()), 4).unwrap();
        race.open_betting().unwrap();
        race.place_bet(Bettor {
            player_id: 2,
            name: "p2".to_string(),
            racer: 0,
            stake: 100,
            winnings: 0,
        })
        .unwrap();
        race.begin().unwrap();
        let mut dice = dice::LoadedDice::new([]);
        while !race.all_finished() {
            race.run_leg(&mut dice);
        }
        let result = race.settle(1000).unwrap();
        pay_out(&mut state, &race, &result, now).unwrap();

        let opening = state.ledger.default_balance;
        assert_eq!(state.ledger.balance(1), Ok(opening + 2000));
        assert_eq!(state.ledger.balance(2), Ok(opening + 200));
        assert!(state.ledger.account(99).is_none());
        assert!(state.player(99).is_none());

        let players: BTreeMap<_, _> = state
            .players
            .iter()
            .map(|(id, p)| (*id, (p.race.wins, p.race.bets_won)))
            .collect();
        assert_eq!(players, BTreeMap::from([(1, (1, 0)), (2, (0, 1))]));
    }
}
