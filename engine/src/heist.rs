use std::time::Duration;

use chrono::{DateTime, Utc};
use types::{
    clock::{after, format_duration, remaining},
    heist::resolve,
    GameError, GuildId, GuildState, Heist, HeistOutcome, Labels, PlayerId, PlayerStatus, Release,
};

use crate::{
    charge, ensure_funds, render,
    session::Doc,
    timer::{self, TimerHandle},
    transport::{Actor, ChannelId, Interaction, MessageHandle, Reply},
    Engine, EngineError, SharedSession,
};

/// How a started heist ended, settled under the guild lock.
#[derive(Debug)]
enum HeistReport {
    NoCrew,
    CrewTooLarge { crew: usize, largest: usize },
    Resolved(HeistOutcome),
}

/// Everything the start phase posts once the lock is released.
struct Narration {
    channel: ChannelId,
    planning: Option<MessageHandle>,
    closed: Reply,
    banner: Option<Reply>,
    lines: Vec<Reply>,
    result: Reply,
}

impl Engine {
    pub(crate) async fn plan_heist(&self, ctx: &Interaction) -> Result<(), EngineError> {
        let now = self.now();
        let session = self.session(ctx.guild_id).await;
        let (generation, reply, snapshot) = {
            let mut guard = session.lock().await;
            let session = &mut *guard;
            let state = &mut session.state;
            let labels = self.labels(&state.config)?;
            if state.heist.is_some() {
                return Err(GameError::precondition(format!(
                    "A {} is already underway.",
                    labels.heist
                ))
                .into());
            }
            if state.targets.is_empty() {
                return Err(GameError::precondition(format!(
                    "There is nothing to hit. An admin needs to add targets before a {} can be planned.",
                    labels.heist
                ))
                .into());
            }
            if let Some(until) = state.config.alert_time.filter(|_| state.config.police_alerted(now)) {
                return Err(GameError::precondition(format!(
                    "The {} are on high alert. Try again in {}.",
                    labels.police,
                    format_duration(remaining(until, now))
                ))
                .into());
            }
            self.check_recruit(state, &ctx.user, &labels, now)?;

            let wait = state.config.wait_time;
            charge(&mut state.ledger, &ctx.user, state.config.heist_cost, now)?;
            state.player_mut(ctx.user.id, &ctx.user.name);
            state.heist = Some(Heist::plan(ctx.user.id, now, wait));
            log::info!("{} planned a heist in guild {}", ctx.user.name, ctx.guild_id);

            let generation = session.open_heist_window(ctx.channel_id);
            session.heist.timer = Some(self.schedule_heist(ctx.guild_id, generation, wait));
            let reply = render::heist_planning(&session.state, &labels, Some(wait));
            (generation, reply, session.snapshot(&[Doc::Heist, Doc::Economy])?)
        };
        self.save(snapshot).await;
        let message = self.reply(ctx, reply).await;
        remember_message(&session, generation, message).await;
        Ok(())
    }

    pub(crate) async fn join_heist(&self, ctx: &Interaction) -> Result<(), EngineError> {
        let now = self.now();
        let session = self.session(ctx.guild_id).await;
        let (message, planning, reply, snapshot) = {
            let mut guard = session.lock().await;
            let session = &mut *guard;
            let state = &mut session.state;
            let labels = self.labels(&state.config)?;
            let heist = planned_heist(state, &labels)?;
            if heist.is_member(ctx.user.id) {
                return Err(GameError::precondition(format!(
                    "You are already in the {}.",
                    labels.crew
                ))
                .into());
            }
            let start_time = heist.start_time;
            self.check_recruit(state, &ctx.user, &labels, now)?;

            charge(&mut state.ledger, &ctx.user, state.config.heist_cost, now)?;
            state.player_mut(ctx.user.id, &ctx.user.name);
            let crew = match state.heist.as_mut() {
                Some(heist) => {
                    heist.add_member(ctx.user.id)?;
                    heist.crew.len()
                }
                None => return Err(GameError::Internal("heist vanished while joining".to_string()).into()),
            };
            log::info!("{} joined the heist in guild {}", ctx.user.name, ctx.guild_id);

            let planning = render::heist_planning(state, &labels, Some(remaining(start_time, now)));
            let reply = render::heist_joined(&labels, &ctx.user.name, crew);
            (
                session.heist.message,
                planning,
                reply,
                session.snapshot(&[Doc::Heist, Doc::Economy])?,
            )
        };
        self.save(snapshot).await;
        self.edit(message, planning).await;
        self.reply(ctx, reply).await;
        Ok(())
    }

    /// Leaves the crew. The cost is not refunded.
    pub(crate) async fn leave_heist(&self, ctx: &Interaction) -> Result<(), EngineError> {
        let now = self.now();
        let session = self.session(ctx.guild_id).await;
        let (message, planning, reply) = {
            let mut guard = session.lock().await;
            let session = &mut *guard;
            let state = &mut session.state;
            let labels = self.labels(&state.config)?;
            let start_time = planned_heist(state, &labels)?.start_time;
            match state.heist.as_mut() {
                Some(heist) => heist.remove_member(ctx.user.id)?,
                None => return Err(GameError::Internal("heist vanished while leaving".to_string()).into()),
            }
            log::info!("{} left the heist in guild {}", ctx.user.name, ctx.guild_id);
            let planning = render::heist_planning(state, &labels, Some(remaining(start_time, now)));
            (
                session.heist.message,
                planning,
                render::heist_left(&labels, &ctx.user.name),
            )
        };
        self.edit(message, planning).await;
        self.reply(ctx, reply).await;
        Ok(())
    }

    /// Planner-only cancel. The crew keeps nothing back.
    pub(crate) async fn cancel_heist(&self, ctx: &Interaction) -> Result<(), EngineError> {
        let session = self.session(ctx.guild_id).await;
        let (message, closed, reply) = {
            let mut guard = session.lock().await;
            let session = &mut *guard;
            let labels = self.labels(&session.state.config)?;
            let heist = planned_heist(&session.state, &labels)?;
            if heist.planner != ctx.user.id {
                return Err(GameError::precondition(format!(
                    "Only the planner can call off the {}.",
                    labels.heist
                ))
                .into());
            }
            let closed = render::heist_planning(&session.state, &labels, None);
            let message = session.heist.message;
            session.state.heist = None;
            session.retire_heist_window();
            log::info!("{} cancelled the heist in guild {}", ctx.user.name, ctx.guild_id);
            (message, closed, render::heist_cancelled(&labels, &ctx.user.name))
        };
        self.edit(message, closed).await;
        self.reply(ctx, reply).await;
        Ok(())
    }

    /// Eligibility and funds for planning or joining. Never mutates.
    fn check_recruit(
        &self,
        state: &GuildState,
        user: &Actor,
        labels: &Labels,
        now: DateTime<Utc>,
    ) -> Result<(), GameError> {
        if let Some(player) = state.player(user.id) {
            player.check_can_heist(now, labels)?;
        }
        ensure_funds(&state.ledger, user.id, state.config.heist_cost)
    }

    fn schedule_heist(&self, guild_id: GuildId, generation: u64, wait: Duration) -> TimerHandle {
        let ticker = self.clone();
        let starter = self.clone();
        timer::start(
            wait,
            move |left| {
                let engine = ticker.clone();
                Box::pin(async move { engine.heist_tick(guild_id, generation, left).await })
            },
            move || Box::pin(async move { starter.start_heist(guild_id, generation).await }),
        )
    }

    async fn heist_tick(&self, guild_id: GuildId, generation: u64, left: Duration) -> Result<(), EngineError> {
        let session = self.session(guild_id).await;
        let (message, planning) = {
            let session = session.lock().await;
            if !session.heist.is_current(generation) {
                return Ok(());
            }
            let labels = self.labels(&session.state.config)?;
            (
                session.heist.message,
                render::heist_planning(&session.state, &labels, Some(left)),
            )
        };
        self.edit(message, planning).await;
        Ok(())
    }

    /// Terminal callback of the planning timer.
    pub(crate) async fn start_heist(&self, guild_id: GuildId, generation: u64) -> Result<(), EngineError> {
        let now = self.now();
        let session = self.session(guild_id).await;
        let settled = {
            let mut guard = session.lock().await;
            let session = &mut *guard;
            if !session.heist.is_current(generation) {
                log::debug!("Stale heist timer for guild {guild_id}");
                return Ok(());
            }
            session.heist.timer = None;
            let channel = session.heist.channel;
            let planning = session.heist.message;
            match self.run_heist(&mut session.state, now) {
                Ok((report, labels)) => {
                    let closed = render::heist_planning(&session.state, &labels, None);
                    let currency = session.state.ledger.currency.clone();
                    let snapshot = session.snapshot(&[Doc::Heist, Doc::Economy])?;
                    Ok((narrate(report, &labels, &currency, channel, planning, closed), snapshot))
                }
                Err(err) => {
                    session.state.heist = None;
                    session.retire_heist_window();
                    let labels = self.labels(&session.state.config).unwrap_or_default();
                    Err((err, channel, render::heist_failure(&labels)))
                }
            }
        };

        let (narration, snapshot) = match settled {
            Ok(settled) => settled,
            Err((err, channel, failure)) => {
                log::error!("Heist in guild {guild_id} failed: {err}");
                self.post(channel, failure).await;
                return Err(err);
            }
        };
        self.save(snapshot).await;

        self.lock_channel(narration.channel, true).await;
        if let Some(banner) = narration.banner {
            self.post(narration.channel, banner).await;
        }
        for line in narration.lines {
            tokio::time::sleep(self.settings().narration_pause).await;
            self.post(narration.channel, line).await;
        }
        self.post(narration.channel, narration.result).await;
        self.lock_channel(narration.channel, false).await;
        self.edit(narration.planning, narration.closed).await;

        let mut session = session.lock().await;
        if session.heist.is_current(generation) {
            session.state.heist = None;
            session.retire_heist_window();
        }
        Ok(())
    }

    /// Starts the planned heist and applies its results to the guild.
    fn run_heist(
        &self,
        state: &mut GuildState,
        now: DateTime<Utc>,
    ) -> Result<(HeistReport, Labels), EngineError> {
        let theme = self.theme(&state.config)?;
        let crew_ids = match state.heist.as_mut() {
            Some(heist) => {
                heist.begin()?;
                heist.crew.clone()
            }
            None => return Err(GameError::Internal("heist timer fired without a heist".to_string()).into()),
        };
        let crew: Vec<(PlayerId, String)> = crew_ids
            .iter()
            .map(|&id| (id, state.player_name(id)))
            .collect();
        log::info!("Heist started in guild {} with {} members", state.guild_id, crew.len());

        if crew.len() <= 1 {
            return Ok((HeistReport::NoCrew, theme.labels.clone()));
        }
        let config = state.config.clone();
        let target = match state.targets.select_for_crew(crew.len()) {
            Some(target) => target.clone(),
            None => {
                state.config.alert_time = Some(after(now, config.police_alert));
                let report = HeistReport::CrewTooLarge {
                    crew: crew.len(),
                    largest: state.targets.largest_crew(),
                };
                return Ok((report, theme.labels.clone()));
            }
        };

        let outcome = self.with_dice(|dice| resolve(&crew, &target, theme, dice))?;
        let left = state.targets.take_loot(&target.name, outcome.total_stolen())?;
        log::debug!("{} vault down to {left}", target.name);
        for member in &outcome.members {
            let player = state.player_mut(member.player_id, &member.name);
            match member.status {
                PlayerStatus::Free => player.record_escape(),
                PlayerStatus::Apprehended => player.apprehend(now, &config),
                PlayerStatus::Dead => player.kill(now, &config),
            }
            state.ledger.get_or_create(member.player_id, &member.name, now);
            if member.status == PlayerStatus::Dead && config.hardcore {
                state.ledger.set_balance(member.player_id, 0)?;
            }
            if member.payout() > 0 {
                state.ledger.deposit(member.player_id, member.payout())?;
            }
        }
        state.config.alert_time = Some(after(now, config.police_alert));
        log::info!(
            "Heist on {} in guild {} paid out {}",
            outcome.target,
            state.guild_id,
            outcome.total_payout()
        );
        Ok((HeistReport::Resolved(outcome), theme.labels.clone()))
    }

    /// Pays someone's bail, the invoker's own by default.
    pub(crate) async fn bail(&self, ctx: &Interaction, target: Option<Actor>) -> Result<(), EngineError> {
        let now = self.now();
        let target = target.unwrap_or_else(|| ctx.user.clone());
        let session = self.session(ctx.guild_id).await;
        let (reply, notice, snapshot) = {
            let mut session = session.lock().await;
            let state = &mut session.state;
            let labels = self.labels(&state.config)?;
            let cost = state
                .player(target.id)
                .ok_or_else(|| {
                    GameError::precondition(format!("{} is not in {}.", target.name, labels.jail))
                })?
                .bail_quote(now, &labels)?;
            ensure_funds(&state.ledger, ctx.user.id, cost)?;

            charge(&mut state.ledger, &ctx.user, cost, now)?;
            state.player_mut(target.id, &target.name).post_bail();
            log::info!("{} bailed out {} for {cost}", ctx.user.name, target.name);

            let currency = state.ledger.currency.clone();
            let reply = render::bailed(&labels, &ctx.user.name, &target.name, cost, &currency);
            let notice = (target.id != ctx.user.id)
                .then(|| render::bail_notice(&labels, &ctx.user.name, cost, &currency));
            (reply, notice, session.snapshot(&[Doc::Heist, Doc::Economy])?)
        };
        self.save(snapshot).await;
        self.reply(ctx, reply).await;
        if let Some(notice) = notice {
            self.notify_privately(target.id, notice).await;
        }
        Ok(())
    }

    pub(crate) async fn release(&self, ctx: &Interaction) -> Result<(), EngineError> {
        let now = self.now();
        self.update_guild(ctx, &[Doc::Heist], |session| {
            let labels = self.labels(&session.state.config)?;
            let player = session
                .state
                .players
                .get_mut(&ctx.user.id)
                .ok_or_else(|| GameError::precondition(format!("You are not in {}.", labels.jail)))?;
            let release = player.release(now, &labels)?;
            Ok(render::released(&labels, &player.name, release == Release::Served))
        })
        .await
    }

    pub(crate) async fn revive(&self, ctx: &Interaction) -> Result<(), EngineError> {
        let now = self.now();
        self.update_guild(ctx, &[Doc::Heist], |session| {
            let player = session
                .state
                .players
                .get_mut(&ctx.user.id)
                .ok_or_else(|| GameError::precondition("You are not dead."))?;
            player.revive(now)?;
            Ok(render::revived(&player.name))
        })
        .await
    }

    pub(crate) async fn player_info(&self, ctx: &Interaction, target: Option<Actor>) -> Result<(), EngineError> {
        let now = self.now();
        let target = target.unwrap_or_else(|| ctx.user.clone());
        self.update_guild(ctx, &[], |session| {
            let state = &session.state;
            let labels = self.labels(&state.config)?;
            let fresh;
            let player = match state.player(target.id) {
                Some(player) => player,
                None => {
                    fresh = types::Player::new(target.id, target.name.clone());
                    &fresh
                }
            };
            let balance = state.ledger.balance(target.id).ok();
            Ok(render::player_info(player, &labels, now, balance, &state.ledger.currency))
        })
        .await
    }

    pub(crate) async fn list_targets(&self, ctx: &Interaction) -> Result<(), EngineError> {
        self.update_guild(ctx, &[], |session| {
            let labels = self.labels(&session.state.config)?;
            Ok(render::targets(&session.state.targets, &labels))
        })
        .await
    }
}

/// The heist, provided it is still taking members.
fn planned_heist<'a>(state: &'a GuildState, labels: &Labels) -> Result<&'a Heist, GameError> {
    match &state.heist {
        Some(heist) if heist.planned => Ok(heist),
        Some(_) => Err(GameError::precondition(format!(
            "The {} is already underway.",
            labels.heist
        ))),
        None => Err(GameError::precondition(format!(
            "Nobody is planning a {}.",
            labels.heist
        ))),
    }
}

fn narrate(
    report: HeistReport,
    labels: &Labels,
    currency: &str,
    channel: ChannelId,
    planning: Option<MessageHandle>,
    closed: Reply,
) -> Narration {
    let (banner, lines, result) = match report {
        HeistReport::NoCrew => (None, Vec::new(), render::heist_no_crew(labels)),
        HeistReport::CrewTooLarge { crew, largest } => {
            (None, Vec::new(), render::heist_crew_too_large(labels, crew, largest))
        }
        HeistReport::Resolved(outcome) => (
            Some(render::heist_banner(labels, outcome.members.len(), &outcome.target)),
            outcome
                .members
                .iter()
                .map(|m| Reply::text(m.message.clone()))
                .collect(),
            render::heist_results(&outcome, labels, currency),
        ),
    };
    Narration {
        channel,
        planning,
        closed,
        banner,
        lines,
        result,
    }
}

/// Stores the posted message on the window, unless the window has moved on.
async fn remember_message(session: &SharedSession, generation: u64, message: Option<MessageHandle>) {
    let mut session = session.lock().await;
    if session.heist.is_current(generation) {
        session.heist.message = message;
    }
}
