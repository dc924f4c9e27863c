use store::Collection;
use types::{GuildId, GuildState};

use crate::{
    timer::TimerHandle,
    transport::{ChannelId, MessageHandle},
    EngineError,
};

/// Runtime side of a countdown window: the live timer, the message it keeps
/// updated and a generation id its callbacks must still match.
#[derive(Debug, Default)]
pub struct Window {
    pub generation: u64,
    pub channel: ChannelId,
    pub message: Option<MessageHandle>,
    pub timer: Option<TimerHandle>,
}

impl Window {
    pub fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }

    /// Cancels the timer and forgets the message.
    pub fn close(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        self.message = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Doc {
    Heist,
    Race,
    Economy,
}

/// Serialized documents taken under the guild lock, saved after it is released.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub guild_id: GuildId,
    pub documents: Vec<(Collection, serde_json::Value)>,
}

#[derive(Debug)]
pub struct GuildSession {
    pub state: GuildState,
    pub heist: Window,
    pub race: Window,
    next_generation: u64,
}

impl GuildSession {
    pub fn new(state: GuildState) -> Self {
        Self {
            state,
            heist: Window::default(),
            race: Window::default(),
            next_generation: 0,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.state.guild_id
    }

    /// Closes whatever the window held and gives it a fresh generation.
    pub fn open_heist_window(&mut self, channel: ChannelId) -> u64 {
        let generation = self.bump();
        self.heist.close();
        self.heist.generation = generation;
        self.heist.channel = channel;
        generation
    }

    pub fn open_race_window(&mut self, channel: ChannelId) -> u64 {
        let generation = self.bump();
        self.race.close();
        self.race.generation = generation;
        self.race.channel = channel;
        generation
    }

    /// Invalidates any callback still holding the heist window's generation.
    pub fn retire_heist_window(&mut self) {
        self.heist.close();
        self.heist.generation = self.bump();
    }

    pub fn retire_race_window(&mut self) {
        self.race.close();
        self.race.generation = self.bump();
    }

    pub fn snapshot(&self, docs: &[Doc]) -> Result<Snapshot, EngineError> {
        let mut documents = Vec::with_capacity(docs.len());
        for doc in docs {
            let entry = match doc {
                Doc::Heist => (
                    Collection::Heist,
                    serde_json::to_value(self.state.heist_document()),
                ),
                Doc::Race => (
                    Collection::Race,
                    serde_json::to_value(self.state.race_document()),
                ),
                Doc::Economy => (Collection::Economy, serde_json::to_value(&self.state.ledger)),
            };
            let (collection, value) = entry;
            documents.push((collection, value.map_err(store::StoreError::from)?));
        }
        Ok(Snapshot {
            guild_id: self.guild_id(),
            documents,
        })
    }

    /// Cancels both windows; used on shutdown.
    pub fn shutdown(&mut self) {
        self.retire_heist_window();
        self.retire_race_window();
    }

    fn bump(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }
}
