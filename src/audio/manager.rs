//! [RelayManager], the [AudioManager] backed by relay nodes.

use std::sync::Arc;
use std::sync::OnceLock;

use async_trait::async_trait;
use dashmap::DashMap;
use serenity::all::GuildId;
use serenity::all::UserId;
use tokio::sync::mpsc;
use tracing::instrument;

use super::node::NodeDriver;
use super::AudioManager;
use super::GatewayFrame;
use super::NodeEvent;
use super::NodeOptions;
use super::NodeState;
use super::NodeStatus;
use super::VoiceSession;
use crate::error::AudioError;

/// Owns the relay node connections and the voice state of every guild.
#[derive(Debug)]
pub struct RelayManager {
    nodes: Vec<NodeOptions>,
    /// The bot's own user, set by [AudioManager::init].
    user_id: OnceLock<UserId>,
    /// Keyed by node identifier.
    states: Arc<DashMap<String, NodeState>>,
    sessions: DashMap<GuildId, VoiceSession>,
    events: mpsc::UnboundedSender<NodeEvent>,
}

impl RelayManager {
    /// Create a manager for the given nodes.
    /// Nothing connects until [AudioManager::init] is called.
    ///
    /// The receiver yields the manager's [NodeEvent]s.
    pub fn new(nodes: Vec<NodeOptions>) -> (Self, mpsc::UnboundedReceiver<NodeEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let states = DashMap::new();

        let mut unique = Vec::with_capacity(nodes.len());
        for node in nodes {
            if states.contains_key(&node.identifier) {
                tracing::warn!(
                    "Duplicate relay node identifier '{}', skipping it.",
                    node.identifier
                );
                continue;
            }
            states.insert(node.identifier.clone(), NodeState::Idle);
            unique.push(node);
        }

        let manager = Self {
            nodes: unique,
            user_id: OnceLock::new(),
            states: Arc::new(states),
            sessions: DashMap::new(),
            events,
        };
        (manager, receiver)
    }

    /// The voice session of a guild, complete or not.
    pub fn voice_session(&self, guild_id: GuildId) -> Option<VoiceSession> {
        self.sessions.get(&guild_id).map(|s| s.value().clone())
    }

    fn handle_voice_state(
        &self,
        guild_id: GuildId,
        channel_id: Option<serenity::all::ChannelId>,
        session_id: String,
    ) {
        match channel_id {
            // Left the voice channel.
            None => {
                if self.sessions.remove(&guild_id).is_some() {
                    tracing::debug!("Dropped voice session for guild {guild_id}.");
                }
            }
            Some(channel_id) => {
                let mut session = self
                    .sessions
                    .entry(guild_id)
                    .or_insert_with(|| VoiceSession::new(guild_id));
                session.channel_id = Some(channel_id);
                session.session_id = Some(session_id);
                log_if_complete(&session);
            }
        }
    }

    fn handle_voice_server(&self, guild_id: GuildId, token: String, endpoint: Option<String>) {
        let mut session = self
            .sessions
            .entry(guild_id)
            .or_insert_with(|| VoiceSession::new(guild_id));
        session.token = Some(token);
        session.endpoint = endpoint;
        log_if_complete(&session);
    }
}

fn log_if_complete(session: &VoiceSession) {
    if session.is_complete() {
        tracing::debug!("Voice session ready for guild {}.", session.guild_id);
    }
}

#[async_trait]
impl AudioManager for RelayManager {
    #[instrument(skip(self))]
    async fn init(&self, user_id: UserId) -> Result<(), AudioError> {
        if self.user_id.set(user_id).is_err() {
            tracing::debug!("Audio manager already initialized.");
            return Ok(());
        }

        if self.nodes.is_empty() {
            tracing::warn!("No relay nodes configured, audio playback is unavailable.");
        }

        // Validate before spawning so bad config surfaces right away.
        for options in &self.nodes {
            options.socket_url()?;
        }

        for options in &self.nodes {
            let driver = NodeDriver::new(
                options.clone(),
                user_id,
                self.states.clone(),
                self.events.clone(),
            );
            tokio::spawn(driver.run());
        }

        Ok(())
    }

    async fn update_voice_state(&self, frame: GatewayFrame) {
        let Some(bot) = self.user_id.get() else {
            // Nothing is ours before init.
            return;
        };

        match frame {
            GatewayFrame::VoiceState {
                guild_id: Some(guild_id),
                user_id,
                channel_id,
                session_id,
            } if user_id == *bot => self.handle_voice_state(guild_id, channel_id, session_id),
            GatewayFrame::VoiceServer {
                guild_id: Some(guild_id),
                token,
                endpoint,
            } => self.handle_voice_server(guild_id, token, endpoint),
            _ => {}
        }
    }

    fn nodes(&self) -> Vec<NodeStatus> {
        self.nodes
            .iter()
            .map(|options| NodeStatus {
                identifier: options.identifier.clone(),
                address: options.address(),
                state: self
                    .states
                    .get(&options.identifier)
                    .map(|s| s.value().clone())
                    .unwrap_or(NodeState::Idle),
            })
            .collect()
    }

    fn voice_sessions(&self) -> Vec<VoiceSession> {
        self.sessions
            .iter()
            .filter(|s| s.is_complete())
            .map(|s| s.value().clone())
            .collect()
    }
}
