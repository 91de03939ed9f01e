//! Gateway event handlers.

use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::CommandType;
use serenity::all::Event;
use serenity::all::EventHandler;
use serenity::all::GuildId;
use serenity::all::Interaction;
use serenity::all::RawEventHandler;
use serenity::all::Ready;

use crate::audio::AudioManager;
use crate::audio::GatewayFrame;
use crate::commands::CommandRegistry;
use crate::context::Context;
use crate::data::Data;

/// Handles startup and slash command interactions.
pub(super) struct Handler {
    data: Arc<Data>,
    registry: Arc<CommandRegistry>,
    dev_guild: Option<GuildId>,
    /// Commands are only registered on the first ready.
    registered: AtomicBool,
}

impl Handler {
    pub(super) fn new(
        data: Arc<Data>,
        registry: Arc<CommandRegistry>,
        dev_guild: Option<GuildId>,
    ) -> Self {
        Self {
            data,
            registry,
            dev_guild,
            registered: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: serenity::all::Context, ready: Ready) {
        tracing::info!("I'm awake [{}]", ready.user.name);

        if !self.registered.swap(true, Ordering::SeqCst) {
            match self.registry.register(&*ctx.http, self.dev_guild).await {
                Ok(count) => tracing::info!("Successfully registered {count} [/] commands"),
                Err(e) => {
                    tracing::error!("Failed to register commands: {e}");
                    // Try again on the next ready.
                    self.registered.store(false, Ordering::SeqCst);
                }
            }
        }

        if let Err(e) = self.data.manager.init(ready.user.id).await {
            tracing::error!("Audio manager failed to start: {e}");
        }
    }

    async fn interaction_create(&self, ctx: serenity::all::Context, interaction: Interaction) {
        let Interaction::Command(command) = interaction else {
            return;
        };
        if command.data.kind != CommandType::ChatInput {
            return;
        }

        let ctx = Context::from_interaction(ctx, command, self.data.clone());
        let outcome = self.registry.dispatch(&ctx).await;
        tracing::debug!("Dispatched '{}': {outcome:?}", ctx.command_name());
    }
}

/// Hands every raw gateway event to the audio manager.
pub(super) struct RawForwarder {
    manager: Arc<dyn AudioManager>,
}

impl RawForwarder {
    pub(super) fn new(manager: Arc<dyn AudioManager>) -> Self {
        Self { manager }
    }

    /// Hand one event to the audio manager, whatever its kind.
    async fn forward(&self, event: &Event) {
        self.manager.update_voice_state(GatewayFrame::from(event)).await;
    }
}

#[async_trait]
impl RawEventHandler for RawForwarder {
    async fn raw_event(&self, _ctx: serenity::all::Context, event: Event) {
        self.forward(&event).await;
    }
}
