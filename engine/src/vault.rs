use std::sync::{Arc, PoisonError};

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};

use store::Collection;
use types::GuildId;

use crate::{session::Doc, Engine};

/// The background task that refills every guild's vaults.
#[derive(Debug)]
pub struct VaultTask {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl VaultTask {
    fn stop(self) {
        self.shutdown.send_replace(true);
        if !self.task.is_finished() {
            log::debug!("Waiting for vault regenerator to notice shutdown");
        }
    }
}

impl Engine {
    /// Starts refilling vaults every `vault_interval`, replacing any running
    /// regenerator. The task holds a weak reference and ends with the engine.
    pub fn start_vault_regenerator(&self) {
        let period = self.settings().vault_interval;
        let (shutdown, mut stopped) = watch::channel(false);
        let engine = Arc::downgrade(&self.inner);

        let task = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = stopped.wait_for(|&stop| stop) => break,
                    _ = ticks.tick() => {}
                }
                let Some(inner) = engine.upgrade() else {
                    break;
                };
                let changed = Engine { inner }.regenerate_vaults().await;
                log::debug!("Vault pass refilled {changed} vaults");
            }
            log::info!("Vault regenerator stopped");
        });

        let previous = self
            .vault_slot()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(VaultTask { shutdown, task });
        if let Some(previous) = previous {
            previous.stop();
        }
        log::info!("Vault regenerator running every {period:?}");
    }

    pub fn stop_vault_regenerator(&self) {
        let running = self
            .vault_slot()
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = running {
            task.stop();
        }
    }

    /// One pass over every guild, stored or loaded. Returns the number of
    /// vaults that changed; guilds with no change are not saved.
    pub async fn regenerate_vaults(&self) -> usize {
        self.load_stored_guilds().await;
        let mut total = 0;
        for guild_id in self.registry().guild_ids().await {
            let Some(session) = self.registry().get(guild_id).await else {
                continue;
            };
            let snapshot = {
                let mut session = session.lock().await;
                let changed = session.state.targets.regenerate();
                if changed == 0 {
                    continue;
                }
                total += changed;
                session.snapshot(&[Doc::Heist])
            };
            match snapshot {
                Ok(snapshot) => self.save(snapshot).await,
                Err(err) => log::error!("Could not snapshot guild {guild_id}: {err}"),
            }
        }
        total
    }

    /// Brings every guild the store knows about into the registry.
    async fn load_stored_guilds(&self) {
        let ids = match self.inner.store.list_ids(Collection::Heist).await {
            Ok(ids) => ids,
            Err(err) => {
                log::warn!("Could not list stored guilds: {err}");
                return;
            }
        };
        for id in ids {
            match id.parse::<GuildId>() {
                Ok(guild_id) => {
                    self.session(guild_id).await;
                }
                Err(_) => log::warn!("Skipping stored guild with id {id}"),
            }
        }
    }
}
