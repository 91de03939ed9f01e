//! State shared by every command invocation.

use std::sync::Arc;
use std::time::Instant;

use crate::audio::AudioManager;
use crate::commands::CommandInfo;

/// The data kept between shards
pub struct Data {
    /// The audio manager the gateway traffic is forwarded to.
    pub manager: Arc<dyn AudioManager>,
    /// Metadata of the loaded commands, sorted by name.
    pub commands: Vec<CommandInfo>,
    /// When the bot started.
    pub started: Instant,
}

impl Data {
    pub fn new(manager: Arc<dyn AudioManager>, commands: Vec<CommandInfo>) -> Self {
        Self {
            manager,
            commands,
            started: Instant::now(),
        }
    }
}
