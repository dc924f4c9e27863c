use std::{collections::HashMap, future::Future, sync::Arc};

use tokio::sync::{Mutex, RwLock};
use types::GuildId;

use crate::session::GuildSession;

pub type SharedSession = Arc<Mutex<GuildSession>>;

/// Guild sessions keyed by guild id, each behind its own lock.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: RwLock<HashMap<GuildId, SharedSession>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, guild_id: GuildId) -> Option<SharedSession> {
        self.sessions.read().await.get(&guild_id).cloned()
    }

    /// Returns the guild's session, building it with `load` on first access.
    /// Two concurrent first accesses may both load; the first insert wins.
    pub async fn get_or_load<F>(&self, guild_id: GuildId, load: F) -> SharedSession
    where
        F: Future<Output = GuildSession>,
    {
        if let Some(session) = self.get(guild_id).await {
            return session;
        }
        let loaded = load.await;
        self.sessions
            .write()
            .await
            .entry(guild_id)
            .or_insert_with(|| Arc::new(Mutex::new(loaded)))
            .clone()
    }

    pub async fn guild_ids(&self) -> Vec<GuildId> {
        let mut ids: Vec<_> = self.sessions.read().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub async fn drain(&self) -> Vec<SharedSession> {
        self.sessions.write().await.drain().map(|(_, s)| s).collect()
    }
}

#[cfg(test)]
mod tests {
    use types::{GuildConfig, GuildState, Targets};

    use super::*;

    fn session(guild_id: GuildId) -> GuildSession {
        GuildSession::new(GuildState::new(guild_id, GuildConfig::default(), Targets::new()))
    }

    #[tokio::test]
    async fn loads_once_per_guild() {
        let registry = Registry::new();
        let first = registry.get_or_load(5, async { session(5) }).await;
        first.lock().await.state.config.heist_cost = 1;
        let second = registry.get_or_load(5, async { session(5) }).await;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.lock().await.state.config.heist_cost, 1);

        registry.get_or_load(2, async { session(2) }).await;
        assert_eq!(registry.guild_ids().await, vec![2, 5]);
        assert_eq!(registry.drain().await.len(), 2);
        assert!(registry.get(5).await.is_none());
    }
}
