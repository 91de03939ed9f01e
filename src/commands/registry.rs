//! The command map: registration with Discord and dispatch of interactions.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use itertools::Itertools;
use serenity::all::Command;
use serenity::all::CreateCommand;
use serenity::all::GuildId;
use serenity::all::Http;
use tracing::instrument;

use super::CommandInfo;
use super::SlashCommand;
use crate::context::Context;
use crate::error::SynthError;

/// What happened to a dispatched interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The handler ran to completion.
    Completed,
    /// No command with that name is loaded.
    Unknown,
    /// The handler failed and the user was told.
    Failed,
}

/// Command name to command. Built once at startup.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: HashMap<String, SlashCommand>,
}

impl CommandRegistry {
    pub fn new(commands: HashMap<String, SlashCommand>) -> Self {
        Self { commands }
    }

    pub fn get(&self, name: &str) -> Option<&SlashCommand> {
        self.commands.get(name)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Metadata of every command, sorted by name.
    pub fn infos(&self) -> Vec<CommandInfo> {
        self.commands
            .values()
            .map(|c| c.info.clone())
            .sorted_by(|a, b| a.name.cmp(&b.name))
            .collect()
    }

    /// Registration payloads for every command.
    pub fn create_commands(&self) -> Vec<CreateCommand> {
        self.infos().iter().map(CommandInfo::create_command).collect()
    }

    /// Overwrite the application's global commands with this registry.
    /// Also overwrites the commands of `dev_guild`, which updates faster. The dev
    /// guild failing is only logged, the global commands are already in place.
    ///
    /// Returns how many global commands Discord now knows about.
    pub async fn register(
        &self,
        sink: &dyn CommandSink,
        dev_guild: Option<GuildId>,
    ) -> Result<usize, SynthError> {
        let commands = self.create_commands();

        let registered = sink.set_global_commands(commands.clone()).await?;
        tracing::debug!("Registered: {}", registered.join(", "));

        if let Some(dev_guild) = dev_guild {
            tracing::info!("Registering commands on dev guild.");
            if let Err(e) = sink.set_guild_commands(dev_guild, commands).await {
                tracing::warn!("Failed to register commands on dev guild {dev_guild}: {e}");
            }
        }

        Ok(registered.len())
    }

    /// Run the command named in `ctx`.
    ///
    /// Failures never leave this function: they are logged and the user gets a
    /// single generic reply.
    #[instrument(skip_all, fields(command = ctx.command_name(), author = ctx.author()))]
    pub async fn dispatch(&self, ctx: &Context) -> Dispatch {
        let name = ctx.command_name();

        let Some(command) = self.get(name) else {
            tracing::error!("Uh-oh, we couldn't find a command named {name}");
            return Dispatch::Unknown;
        };

        tracing::info!("Started '{name}' command from {}.", ctx.author());

        let result = match AssertUnwindSafe(command.run.run(ctx)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(SynthError::Panic {
                payload: panic_message(payload.as_ref()),
            }),
        };

        match result {
            Ok(()) => {
                tracing::info!("Finished '{name}' command from {}.", ctx.author());
                Dispatch::Completed
            }
            Err(error) => {
                tracing::error!("{error}");
                ctx.report_failure().await;
                Dispatch::Failed
            }
        }
    }
}

/// Where command registrations are sent.
#[async_trait]
pub trait CommandSink: Send + Sync {
    /// Bulk overwrite the global commands, returning the registered names.
    async fn set_global_commands(
        &self,
        commands: Vec<CreateCommand>,
    ) -> Result<Vec<String>, SynthError>;

    /// Bulk overwrite the commands of one guild, returning the registered names.
    async fn set_guild_commands(
        &self,
        guild_id: GuildId,
        commands: Vec<CreateCommand>,
    ) -> Result<Vec<String>, SynthError>;
}

#[async_trait]
impl CommandSink for Http {
    async fn set_global_commands(
        &self,
        commands: Vec<CreateCommand>,
    ) -> Result<Vec<String>, SynthError> {
        let registered = Command::set_global_commands(self, commands).await?;
        Ok(registered.into_iter().map(|c| c.name).collect())
    }

    async fn set_guild_commands(
        &self,
        guild_id: GuildId,
        commands: Vec<CreateCommand>,
    ) -> Result<Vec<String>, SynthError> {
        let registered = guild_id.set_commands(self, commands).await?;
        Ok(registered.into_iter().map(|c| c.name).collect())
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> Option<String> {
    if let Some(s) = payload.downcast_ref::<&str>() {
        Some(s.to_string())
    } else {
        payload.downcast_ref::<String>().cloned()
    }
}
