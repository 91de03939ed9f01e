//! Error types used throughout the bot.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can surface anywhere in the bot.
#[derive(Error, Debug)]
pub enum SynthError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error("Discord error: {0}")]
    Serenity(#[from] serenity::Error),

    /// A command handler panicked.
    #[error("Command panicked: {}", payload.as_deref().unwrap_or("<no message>"))]
    Panic { payload: Option<String> },
}

/// Errors from reading `config.toml` or the process environment.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing config file! {action_msg}")]
    MissingConfig { action_msg: String },

    #[error("Invalid config: {reason}")]
    InvalidConfig { reason: String },

    #[error("Missing environment variable: '{name}'.")]
    MissingEnv { name: String },

    #[error("Malformed environment variable '{name}': {reason}")]
    MalformedEnv { name: String, reason: String },

    #[error("Config IO error: {0}")]
    IoError(std::io::Error),
}

/// The command directory could not be read at all.
///
/// Individual broken descriptors are skipped with a warning instead.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Could not read command directory {path:?}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Errors raised by the audio manager and its relay nodes.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Invalid address for node '{identifier}': {source}")]
    InvalidUrl {
        identifier: String,
        source: url::ParseError,
    },

    #[error("Invalid handshake header for node '{identifier}': {reason}")]
    InvalidHeader { identifier: String, reason: String },

    #[error("Connection to node '{identifier}' failed: {source}")]
    Connection {
        identifier: String,
        #[source]
        source: Box<tokio_tungstenite::tungstenite::Error>,
    },

    #[error("Node '{identifier}' rejected the request: {source}")]
    Rest {
        identifier: String,
        source: reqwest::Error,
    },

    #[error("Node '{identifier}' closed the connection.")]
    Closed { identifier: String },
}
