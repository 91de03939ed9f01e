//! Builds the bot: commands, audio manager and the [serenity::Client] tying them together.

mod config;
mod handler;

use std::path::Path;
use std::sync::Arc;

use serenity::all::GatewayIntents;

use crate::audio;
use crate::audio::AudioManager;
use crate::audio::RelayManager;
use crate::commands;
use crate::data::Data;
use crate::error::SynthError;
use handler::Handler;
use handler::RawForwarder;

pub use config::Config;
pub use config::LoggingConfig;
pub use config::Secrets;

/// Constructs a [serenity::Client] with the loaded commands and a started audio manager.
pub(super) async fn client(config: Config, secrets: Secrets) -> Result<serenity::Client, SynthError> {
    let handlers = commands::list();
    let loaded = commands::load_dir(Path::new(&config.commands.dir), &handlers)?;
    if !loaded.skipped.is_empty() {
        tracing::warn!("Skipped {} command descriptor(s).", loaded.skipped.len());
    }
    tracing::info!("Loaded {} command(s).", loaded.registry.len());

    let (manager, node_events) = RelayManager::new(config.nodes.clone());
    tokio::spawn(audio::log_node_events(node_events));
    let manager: Arc<dyn AudioManager> = Arc::new(manager);

    let data = Arc::new(Data::new(manager.clone(), loaded.registry.infos()));
    let handler = Handler::new(data, Arc::new(loaded.registry), config.dev_guild());

    // Intents we wish to use
    // See https://discord.com/developers/docs/topics/gateway#gateway-intents
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::MESSAGE_CONTENT;

    let client = serenity::Client::builder(&secrets.token, intents)
        .application_id(secrets.application_id)
        .event_handler(handler)
        .raw_event_handler(RawForwarder::new(manager))
        .await?;

    Ok(client)
}
