//! Synth Music, a Discord music bot.
//!
//! Slash commands are dispatched here, playback is left to the relay nodes
//! managed by [audio].

mod audio;
mod commands;
mod context;
mod data;
mod error;
mod log;
mod setup;

use error::SynthError;
use setup::Config;
use setup::Secrets;

#[tokio::main]
async fn main() -> Result<(), SynthError> {
    // Load before reading secrets. A missing .env file is fine.
    dotenv::dotenv().ok();

    let config = Config::read();

    // Report config errors with the default logging settings.
    let logging = config
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_default();
    let _guard = log::install_tracing(&logging);

    let config = config.inspect_err(|e| tracing::error!("{e}"))?;
    let secrets = Secrets::from_env().inspect_err(|e| tracing::error!("{e}"))?;

    let mut client = setup::client(config, secrets)
        .await
        .inspect_err(|e| tracing::error!("{e}"))?;
    let shards = client.shard_manager.clone();

    tokio::select! {
        result = client.start() => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down.");
            shards.shutdown_all().await;
        }
    }

    Ok(())
}
