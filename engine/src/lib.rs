pub mod admin;
pub mod bank;
pub mod catalog;
pub mod command;
pub mod config;
pub mod error;
pub mod heist;
pub mod race;
pub mod registry;
pub mod render;
pub mod session;
pub mod timer;
pub mod transport;
pub mod vault;

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use store::{load_typed, Collection, DocumentStore};
use types::{
    Catalog, Clock, Dice, GameError, GuildConfig, GuildId, GuildState, HeistDocument, Labels,
    Ledger, LedgerError, Mode, PlayerId, RaceDocument, Targets, Theme,
};

pub use crate::admin::{HeistSetting, RaceSetting};
pub use crate::command::Command;
pub use crate::config::{BotConfig, CliOverrides};
pub use crate::error::EngineError;
pub use crate::registry::{Registry, SharedSession};
pub use crate::session::{Doc, GuildSession, Snapshot};
pub use crate::transport::{
    Actor, ChannelId, ConsoleTransport, Interaction, MessageHandle, RecordingTransport, Reply,
    Transport, TransportError,
};

use crate::vault::VaultTask;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub default_theme: String,
    pub default_mode: String,
    /// Identity of the house racer entered into every race.
    pub bot: Actor,
    pub narration_pause: Duration,
    pub leg_cadence: Duration,
    pub vault_interval: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        BotConfig::default().settings()
    }
}

/// Everything the engine talks to outside its own state.
pub struct Services {
    pub transport: Arc<dyn Transport>,
    pub store: Arc<dyn DocumentStore>,
    pub clock: Arc<dyn Clock>,
    pub dice: Box<dyn Dice>,
}

struct EngineInner {
    transport: Arc<dyn Transport>,
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    dice: Mutex<Box<dyn Dice>>,
    catalog: Catalog,
    settings: EngineSettings,
    registry: Registry,
    vault: Mutex<Option<VaultTask>>,
}

/// Cheap to clone; every clone drives the same guilds.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Fails if the default theme or race mode is missing from the catalog.
    pub fn new(
        services: Services,
        catalog: Catalog,
        settings: EngineSettings,
    ) -> Result<Self, EngineError> {
        if catalog.theme(&settings.default_theme).is_err() {
            return Err(EngineError::Config(format!(
                "default theme {} is not in the catalog",
                settings.default_theme
            )));
        }
        if catalog.mode(&settings.default_mode).is_err() {
            return Err(EngineError::Config(format!(
                "default race mode {} is not in the catalog",
                settings.default_mode
            )));
        }
        log::info!(
            "Engine ready with theme {} and race mode {}",
            settings.default_theme,
            settings.default_mode
        );
        Ok(Self {
            inner: Arc::new(EngineInner {
                transport: services.transport,
                store: services.store,
                clock: services.clock,
                dice: Mutex::new(services.dice),
                catalog,
                settings,
                registry: Registry::new(),
                vault: Mutex::new(None),
            }),
        })
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.inner.settings
    }

    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    /// The guild's session, loaded from the store on first access.
    pub async fn session(&self, guild_id: GuildId) -> SharedSession {
        self.inner
            .registry
            .get_or_load(guild_id, self.load_guild(guild_id))
            .await
    }

    /// Runs a player command. Guard failures are answered privately to the
    /// invoker and reported as success; anything else is returned.
    pub async fn dispatch(&self, ctx: &Interaction, command: Command) -> Result<(), EngineError> {
        log::debug!("{} in guild {}: {command:?}", ctx.user.name, ctx.guild_id);
        let result = match command {
            Command::PlanHeist => self.plan_heist(ctx).await,
            Command::JoinHeist => self.join_heist(ctx).await,
            Command::LeaveHeist => self.leave_heist(ctx).await,
            Command::CancelHeist => self.cancel_heist(ctx).await,
            Command::Bail { target } => self.bail(ctx, target).await,
            Command::Release => self.release(ctx).await,
            Command::Revive => self.revive(ctx).await,
            Command::PlayerInfo { target } => self.player_info(ctx, target).await,
            Command::Targets => self.list_targets(ctx).await,
            Command::ResetHeist => self.reset_heist(ctx).await,
            Command::AddTarget(target) => self.add_target(ctx, target).await,
            Command::EditTarget { name, edit } => self.edit_target(ctx, &name, edit).await,
            Command::RemoveTarget { name } => self.remove_target(ctx, &name).await,
            Command::SetHeist(setting) => self.set_heist(ctx, setting).await,
            Command::ClearPlayer { target } => self.clear_player(ctx, target).await,
            Command::Race => self.prepare_race(ctx).await,
            Command::JoinRace => self.join_race(ctx).await,
            Command::Bet { racer } => self.bet(ctx, racer).await,
            Command::ResetRace => self.reset_race(ctx).await,
            Command::SetRace(setting) => self.set_race(ctx, setting).await,
            Command::RaceStats { target } => self.race_stats(ctx, target).await,
            Command::Balance => self.balance(ctx).await,
            Command::Transfer { to, amount } => self.transfer(ctx, to, amount).await,
            Command::SetBalance { target, amount } => self.set_balance(ctx, target, amount).await,
            Command::Leaderboard { limit } => self.leaderboard(ctx, limit).await,
        };
        match result {
            Ok(()) => Ok(()),
            Err(err) => match err.player_facing() {
                Some(message) => {
                    self.reply(ctx, Reply::text(message).ephemeral()).await;
                    Ok(())
                }
                None => {
                    log::error!("Command from {} failed: {err}", ctx.user.name);
                    Err(err)
                }
            },
        }
    }

    /// Stops the vault task, cancels every timer and drops all sessions.
    pub async fn shutdown(&self) {
        self.stop_vault_regenerator();
        for session in self.inner.registry.drain().await {
            session.lock().await.shutdown();
        }
        log::info!("Engine shut down");
    }

    pub(crate) fn with_dice<T>(&self, roll: impl FnOnce(&mut dyn Dice) -> T) -> T {
        let mut dice = self.inner.dice.lock().unwrap_or_else(PoisonError::into_inner);
        roll(dice.as_mut())
    }

    /// The guild's theme, falling back to the default if the guild names one
    /// the catalog no longer has.
    pub(crate) fn theme(&self, config: &GuildConfig) -> Result<&Theme, GameError> {
        self.inner.catalog.theme(&config.theme).or_else(|_| {
            log::warn!("Theme {} is gone, using the default", config.theme);
            self.inner.catalog.theme(&self.inner.settings.default_theme)
        })
    }

    pub(crate) fn labels(&self, config: &GuildConfig) -> Result<Labels, GameError> {
        Ok(self.theme(config)?.labels.clone())
    }

    pub(crate) fn mode(&self, config: &GuildConfig) -> Result<&Mode, GameError> {
        self.inner.catalog.mode(&config.mode).or_else(|_| {
            log::warn!("Race mode {} is gone, using the default", config.mode);
            self.inner.catalog.mode(&self.inner.settings.default_mode)
        })
    }

    /// Runs `update` under the guild lock, then saves `docs` and sends the
    /// reply once the lock is released. Nothing is saved if `update` fails.
    pub(crate) async fn update_guild<F>(
        &self,
        ctx: &Interaction,
        docs: &[Doc],
        update: F,
    ) -> Result<(), EngineError>
    where
        F: FnOnce(&mut GuildSession) -> Result<Reply, EngineError>,
    {
        let session = self.session(ctx.guild_id).await;
        let (reply, snapshot) = {
            let mut session = session.lock().await;
            let reply = update(&mut session)?;
            (reply, session.snapshot(docs)?)
        };
        self.save(snapshot).await;
        self.reply(ctx, reply).await;
        Ok(())
    }

    pub(crate) async fn save(&self, snapshot: Snapshot) {
        let id = snapshot.guild_id.to_string();
        for (collection, document) in snapshot.documents {
            if let Err(err) = self.inner.store.save(collection, &id, &document).await {
                log::error!("Could not save {collection}/{id}: {err}");
            }
        }
    }

    /// Replies to an interaction; a transport failure is logged and swallowed.
    pub(crate) async fn reply(&self, ctx: &Interaction, reply: Reply) -> Option<MessageHandle> {
        match self.inner.transport.respond(ctx, reply).await {
            Ok(handle) => Some(handle),
            Err(err) => {
                log::warn!("Could not reply to {}: {err}", ctx.user.name);
                None
            }
        }
    }

    pub(crate) async fn post(&self, channel: ChannelId, reply: Reply) -> Option<MessageHandle> {
        match self.inner.transport.send(channel, reply).await {
            Ok(handle) => Some(handle),
            Err(err) => {
                log::warn!("Could not post to #{channel}: {err}");
                None
            }
        }
    }

    pub(crate) async fn edit(&self, message: Option<MessageHandle>, reply: Reply) {
        let Some(message) = message else {
            return;
        };
        if let Err(err) = self.inner.transport.edit(message, reply).await {
            log::warn!("Could not edit message {message}: {err}");
        }
    }

    pub(crate) async fn lock_channel(&self, channel: ChannelId, locked: bool) {
        if let Err(err) = self.inner.transport.set_channel_locked(channel, locked).await {
            log::warn!("Could not change lock on #{channel}: {err}");
        }
    }

    pub(crate) async fn notify_privately(&self, player: PlayerId, reply: Reply) {
        match self.inner.transport.open_private_channel(player).await {
            Ok(channel) => {
                self.post(channel, reply).await;
            }
            Err(err) => log::warn!("Could not reach player {player} privately: {err}"),
        }
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.inner.transport.as_ref()
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub(crate) fn vault_slot(&self) -> &Mutex<Option<VaultTask>> {
        &self.inner.vault
    }

    async fn load_guild(&self, guild_id: GuildId) -> GuildSession {
        let id = guild_id.to_string();
        let heist: Option<HeistDocument> = self.load_document(Collection::Heist, &id).await;
        let race: Option<RaceDocument> = self.load_document(Collection::Race, &id).await;
        let ledger: Option<Ledger> = self.load_document(Collection::Economy, &id).await;

        let state = match heist {
            Some(heist) => {
                log::info!("Loaded guild {guild_id}");
                GuildState::from_documents(
                    guild_id,
                    heist,
                    race.unwrap_or_default(),
                    ledger.unwrap_or_else(|| Ledger::new(guild_id)),
                )
            }
            None => {
                let mut state = self.fresh_guild(guild_id);
                if let Some(race) = race {
                    state.last_race_ended = race.last_race_ended;
                }
                if let Some(ledger) = ledger {
                    state.ledger = ledger;
                }
                state
            }
        };
        GuildSession::new(state)
    }

    fn fresh_guild(&self, guild_id: GuildId) -> GuildState {
        let settings = &self.inner.settings;
        let config = GuildConfig::with_catalog_defaults(&settings.default_theme, &settings.default_mode);
        let targets = self
            .inner
            .catalog
            .target_set(&config.theme)
            .and_then(|set| Targets::from_list(set.iter().cloned()))
            .unwrap_or_else(|err| {
                log::warn!("Guild {guild_id} starts without targets: {err}");
                Targets::new()
            });
        log::info!("Created guild {guild_id} with {} targets", targets.len());
        GuildState::new(guild_id, config, targets)
    }

    async fn load_document<T: DeserializeOwned>(&self, collection: Collection, id: &str) -> Option<T> {
        match load_typed(self.inner.store.as_ref(), collection, id).await {
            Ok(document) => document,
            Err(err) => {
                log::error!("Could not load {collection}/{id}, starting fresh: {err}");
                None
            }
        }
    }
}

/// Fails unless `player` could pay `amount`, counting the opening balance
/// of an account that does not exist yet.
pub(crate) fn ensure_funds(ledger: &Ledger, player: PlayerId, amount: u64) -> Result<(), GameError> {
    if amount == 0 {
        return Ok(());
    }
    match ledger.account(player) {
        Some(_) => Ok(ledger.can_cover(player, amount)?),
        None if ledger.default_balance >= amount => Ok(()),
        None => Err(LedgerError::InsufficientFunds {
            needed: amount,
            available: ledger.default_balance,
        }
        .into()),
    }
}

/// Opens the account if needed and takes `amount` from it.
pub(crate) fn charge(
    ledger: &mut Ledger,
    actor: &Actor,
    amount: u64,
    now: DateTime<Utc>,
) -> Result<(), GameError> {
    ledger.get_or_create(actor.id, &actor.name, now);
    if amount > 0 {
        ledger.withdraw(actor.id, amount)?;
    }
    Ok(())
}
