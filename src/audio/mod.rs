//! The audio manager the bot hands its gateway traffic to.
//!
//! Playback itself happens on the relay nodes. The rest of the bot only ever
//! talks to an [AudioManager], it never touches the nodes directly.

mod manager;
mod node;

use async_trait::async_trait;
use serenity::all::ChannelId;
use serenity::all::Event;
use serenity::all::GuildId;
use serenity::all::UserId;

use crate::error::AudioError;

pub use manager::RelayManager;
pub use node::NodeOptions;
pub use node::NodeState;

/// An audio manager fed by the bot.
#[async_trait]
pub trait AudioManager: Send + Sync {
    /// Called once the bot knows its own user id.
    /// Calling it again is a no-op.
    async fn init(&self, user_id: UserId) -> Result<(), AudioError>;

    /// Every raw gateway frame ends up here, unfiltered.
    async fn update_voice_state(&self, frame: GatewayFrame);

    /// Snapshot of the configured nodes.
    fn nodes(&self) -> Vec<NodeStatus>;

    /// Guilds with a complete voice session.
    fn voice_sessions(&self) -> Vec<VoiceSession>;
}

/// Status events emitted by the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    Connect { identifier: String },
    Error { identifier: String, message: String },
}

/// Logs node events until the manager goes away.
pub async fn log_node_events(mut events: tokio::sync::mpsc::UnboundedReceiver<NodeEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            NodeEvent::Connect { identifier } => {
                tracing::info!("Successfully connected to relay node {identifier}")
            }
            NodeEvent::Error {
                identifier,
                message,
            } => tracing::error!("{identifier} encountered an error: {message}"),
        }
    }
    tracing::debug!("Node event stream closed.");
}

/// A node as seen by the bot.
#[derive(Debug, Clone)]
pub struct NodeStatus {
    pub identifier: String,
    pub address: String,
    pub state: NodeState,
}

/// The parts of a gateway frame the audio manager cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayFrame {
    /// A user's voice state changed.
    VoiceState {
        guild_id: Option<GuildId>,
        user_id: UserId,
        channel_id: Option<ChannelId>,
        session_id: String,
    },
    /// The voice server for a guild was (re)assigned.
    VoiceServer {
        guild_id: Option<GuildId>,
        token: String,
        endpoint: Option<String>,
    },
    Other,
}

impl From<&Event> for GatewayFrame {
    fn from(event: &Event) -> Self {
        match event {
            Event::VoiceStateUpdate(update) => {
                let state = &update.voice_state;
                GatewayFrame::VoiceState {
                    guild_id: state.guild_id,
                    user_id: state.user_id,
                    channel_id: state.channel_id,
                    session_id: state.session_id.clone(),
                }
            }
            Event::VoiceServerUpdate(update) => GatewayFrame::VoiceServer {
                guild_id: update.guild_id,
                token: update.token.clone(),
                endpoint: update.endpoint.clone(),
            },
            _ => GatewayFrame::Other,
        }
    }
}

/// What a relay node needs to join a guild's voice channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoiceSession {
    pub guild_id: GuildId,
    pub channel_id: Option<ChannelId>,
    pub session_id: Option<String>,
    pub token: Option<String>,
    pub endpoint: Option<String>,
}

impl VoiceSession {
    pub fn new(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            channel_id: None,
            session_id: None,
            token: None,
            endpoint: None,
        }
    }

    /// Both the state and the server halves have arrived.
    pub fn is_complete(&self) -> bool {
        self.session_id.is_some() && self.token.is_some() && self.endpoint.is_some()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn voice_state_update_becomes_a_frame() {
        let frame = GatewayFrame::from(&voice_state_event(42, 7, Some(9)));

        assert_eq!(
            frame,
            GatewayFrame::VoiceState {
                guild_id: Some(GuildId::new(7)),
                user_id: UserId::new(42),
                channel_id: Some(ChannelId::new(9)),
                session_id: "session".to_string(),
            }
        );
    }

    #[test]
    fn leaving_has_no_channel() {
        let frame = GatewayFrame::from(&voice_state_event(42, 7, None));

        assert!(matches!(
            frame,
            GatewayFrame::VoiceState {
                channel_id: None,
                ..
            }
        ));
    }

    #[test]
    fn voice_server_update_becomes_a_frame() {
        let frame = GatewayFrame::from(&voice_server_event(7));

        assert_eq!(
            frame,
            GatewayFrame::VoiceServer {
                guild_id: Some(GuildId::new(7)),
                token: "token".to_string(),
                endpoint: Some("voice.example.com".to_string()),
            }
        );
    }

    #[test]
    fn other_events_become_other() {
        assert_eq!(GatewayFrame::from(&typing_event()), GatewayFrame::Other);
    }
}
