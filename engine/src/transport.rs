use std::{
    fmt::Display,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Mutex, PoisonError,
    },
};

use async_trait::async_trait;
use itertools::Itertools;
use thiserror::Error;
use types::{GuildId, PlayerId};
use uuid::Uuid;

pub type ChannelId = u64;

/// Opaque reference to a message the transport has posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageHandle(Uuid);

impl MessageHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for MessageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0.simple().to_string()[..8])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Actor {
    pub id: PlayerId,
    pub name: String,
}

impl Actor {
    pub fn new(id: PlayerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A player action as delivered by the chat platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interaction {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub user: Actor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Button {
    pub id: String,
    pub label: String,
    pub disabled: bool,
}

impl Button {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            disabled: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub fields: Vec<(String, String)>,
    pub footer: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub content: Option<String>,
    pub embed: Option<Embed>,
    pub buttons: Vec<Button>,
    pub ephemeral: bool,
}

impl Reply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn embed(embed: Embed) -> Self {
        Self {
            embed: Some(embed),
            ..Default::default()
        }
    }

    pub fn with_buttons(mut self, buttons: Vec<Button>) -> Self {
        self.buttons = buttons;
        self
    }

    pub fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }

    /// Everything a reader would see, flattened into one string.
    pub fn plain_text(&self) -> String {
        let mut parts = Vec::new();
        if let Some(content) = &self.content {
            parts.push(content.clone());
        }
        if let Some(embed) = &self.embed {
            parts.push(embed.title.clone());
            parts.push(embed.description.clone());
            parts.extend(embed.fields.iter().map(|(name, value)| format!("{name}: {value}")));
            parts.extend(embed.footer.clone());
        }
        parts.into_iter().filter(|p| !p.is_empty()).join("\n")
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Unknown message {0}")]
    UnknownMessage(MessageHandle),

    #[error("Request rejected by the platform: {0}")]
    Rejected(String),

    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

/// The chat platform as seen by the engine.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn respond(
        &self,
        interaction: &Interaction,
        reply: Reply,
    ) -> Result<MessageHandle, TransportError>;
    async fn edit(&self, message: MessageHandle, reply: Reply) -> Result<(), TransportError>;
    async fn send(&self, channel: ChannelId, reply: Reply) -> Result<MessageHandle, TransportError>;
    async fn set_channel_locked(&self, channel: ChannelId, locked: bool) -> Result<(), TransportError>;
    async fn open_private_channel(&self, player: PlayerId) -> Result<ChannelId, TransportError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Respond {
        channel: ChannelId,
        player: PlayerId,
        message: MessageHandle,
        reply: Reply,
    },
    Edit {
        message: MessageHandle,
        reply: Reply,
    },
    Send {
        channel: ChannelId,
        message: MessageHandle,
        reply: Reply,
    },
    Lock {
        channel: ChannelId,
        locked: bool,
    },
    OpenPrivate {
        player: PlayerId,
        channel: ChannelId,
    },
}

impl Call {
    pub fn reply(&self) -> Option<&Reply> {
        match self {
            Call::Respond { reply, .. } | Call::Edit { reply, .. } | Call::Send { reply, .. } => {
                Some(reply)
            }
            _ => None,
        }
    }
}

/// Keeps every call in order. Can be switched to reject everything.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    calls: Mutex<Vec<Call>>,
    failing: AtomicBool,
    next_private: AtomicU64,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Text of every posted or edited message, in order.
    pub fn texts(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(Call::reply)
            .map(Reply::plain_text)
            .collect()
    }

    /// Text of messages posted to a channel, skipping interaction replies and edits.
    pub fn channel_texts(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|call| match call {
                Call::Send { reply, .. } => Some(reply.plain_text()),
                _ => None,
            })
            .collect()
    }

    pub fn ephemeral_texts(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|call| match call {
                Call::Respond { reply, .. } if reply.ephemeral => Some(reply.plain_text()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn record(&self, call: Call) -> Result<(), TransportError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Unavailable("recording transport is failing".to_string()));
        }
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        Ok(())
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn respond(
        &self,
        interaction: &Interaction,
        reply: Reply,
    ) -> Result<MessageHandle, TransportError> {
        let message = MessageHandle::new();
        self.record(Call::Respond {
            channel: interaction.channel_id,
            player: interaction.user.id,
            message,
            reply,
        })?;
        Ok(message)
    }

    async fn edit(&self, message: MessageHandle, reply: Reply) -> Result<(), TransportError> {
        self.record(Call::Edit { message, reply })
    }

    async fn send(&self, channel: ChannelId, reply: Reply) -> Result<MessageHandle, TransportError> {
        let message = MessageHandle::new();
        self.record(Call::Send {
            channel,
            message,
            reply,
        })?;
        Ok(message)
    }

    async fn set_channel_locked(&self, channel: ChannelId, locked: bool) -> Result<(), TransportError> {
        self.record(Call::Lock { channel, locked })
    }

    async fn open_private_channel(&self, player: PlayerId) -> Result<ChannelId, TransportError> {
        let channel = 1_000_000 + self.next_private.fetch_add(1, Ordering::SeqCst);
        self.record(Call::OpenPrivate { player, channel })?;
        Ok(channel)
    }
}

/// Prints everything to stdout; used by the console binary.
#[derive(Debug, Default)]
pub struct ConsoleTransport;

impl ConsoleTransport {
    fn print(prefix: &str, reply: &Reply) {
        let buttons = reply
            .buttons
            .iter()
            .filter(|b| !b.disabled)
            .map(|b| format!("[{}: {}]", b.id, b.label))
            .join(" ");
        println!("{prefix}");
        for line in reply.plain_text().lines() {
            println!("    {line}");
        }
        if !buttons.is_empty() {
            println!("    {buttons}");
        }
    }
}

#[async_trait]
impl Transport for ConsoleTransport {
    async fn respond(
        &self,
        interaction: &Interaction,
        reply: Reply,
    ) -> Result<MessageHandle, TransportError> {
        let message = MessageHandle::new();
        let visibility = if reply.ephemeral { " (only you)" } else { "" };
        Self::print(
            &format!("[{message}] -> {}{visibility}:", interaction.user.name),
            &reply,
        );
        Ok(message)
    }

    async fn edit(&self, message: MessageHandle, reply: Reply) -> Result<(), TransportError> {
        Self::print(&format!("[{message}] (edited):"), &reply);
        Ok(())
    }

    async fn send(&self, channel: ChannelId, reply: Reply) -> Result<MessageHandle, TransportError> {
        let message = MessageHandle::new();
        Self::print(&format!("[{message}] #{channel}:"), &reply);
        Ok(message)
    }

    async fn set_channel_locked(&self, channel: ChannelId, locked: bool) -> Result<(), TransportError> {
        let state = if locked { "locked" } else { "unlocked" };
        println!("#{channel} {state}");
        Ok(())
    }

    async fn open_private_channel(&self, player: PlayerId) -> Result<ChannelId, TransportError> {
        Ok(player)
    }
}
