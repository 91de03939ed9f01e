//! Bot commands.
//!
//! A command is a pair of [CommandInfo] (what gets registered with Discord) and a
//! [Run] implementation (what happens when it is used). The metadata is read from
//! descriptor files at startup, see [loader]. The handlers are compiled in and
//! listed by [list].

mod help;
pub mod loader;
mod nodes;
mod ping;
pub mod registry;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use serenity::all::CommandOptionType;
use serenity::all::CreateCommand;
use serenity::all::CreateCommandOption;

use crate::context::Context;
use crate::error::SynthError;

pub use loader::load_dir;
pub use registry::CommandRegistry;

/// The invocation half of a command.
#[async_trait]
pub trait Run: Send + Sync {
    async fn run(&self, ctx: &Context) -> Result<(), SynthError>;
}

/// Built-in handlers, keyed by the name descriptors refer to them with.
pub type Handlers = HashMap<&'static str, Arc<dyn Run>>;

/// Lists all the implemented handlers.
pub fn list() -> Handlers {
    let handlers: [(&'static str, Arc<dyn Run>); 3] = [
        ("help", Arc::new(help::Help)),
        ("nodes", Arc::new(nodes::Nodes)),
        ("ping", Arc::new(ping::Ping)),
    ];
    handlers.into_iter().collect()
}

/// A loaded command: metadata plus the handler to invoke.
#[derive(Clone)]
pub struct SlashCommand {
    pub info: CommandInfo,
    pub run: Arc<dyn Run>,
}

impl std::fmt::Debug for SlashCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlashCommand")
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

/// Metadata of a slash command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandInfo {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub options: Vec<OptionInfo>,
}

impl CommandInfo {
    /// Build the registration payload for this command.
    pub fn create_command(&self) -> CreateCommand {
        self.options.iter().fold(
            CreateCommand::new(&self.name).description(&self.description),
            |command, option| command.add_option(option.create_option()),
        )
    }
}

/// A single argument of a slash command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionInfo {
    pub kind: OptionKind,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

impl OptionInfo {
    fn create_option(&self) -> CreateCommandOption {
        CreateCommandOption::new(self.kind.into(), &self.name, &self.description)
            .required(self.required)
    }
}

/// Supported argument types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionKind {
    String,
    Integer,
    Number,
    Boolean,
    User,
    Channel,
    Role,
}

impl From<OptionKind> for CommandOptionType {
    fn from(kind: OptionKind) -> Self {
        match kind {
            OptionKind::String => CommandOptionType::String,
            OptionKind::Integer => CommandOptionType::Integer,
            OptionKind::Number => CommandOptionType::Number,
            OptionKind::Boolean => CommandOptionType::Boolean,
            OptionKind::User => CommandOptionType::User,
            OptionKind::Channel => CommandOptionType::Channel,
            OptionKind::Role => CommandOptionType::Role,
        }
    }
}

/// Helper function to format a duration.
pub fn format_duration(dur: &Duration) -> String {
    let total_secs = dur.as_secs();
    let total_mins = total_secs / 60;

    let hours = total_mins / 60;
    let mins = total_mins % 60;
    let secs = total_secs % 60;

    if hours > 0 {
        format!("[{hours:02}h:{mins:02}m:{secs:02}s]")
    } else {
        format!("[{mins:02}m:{secs:02}s]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_are_formatted() {
        assert_eq!(format_duration(&Duration::from_secs(59)), "[00m:59s]");
        assert_eq!(format_duration(&Duration::from_secs(61 * 60 + 5)), "[01h:01m:05s]");
    }

    #[test]
    fn every_shipped_descriptor_has_a_handler() {
        let handlers = list();
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("commands");
        let loaded = load_dir(&dir, &handlers).unwrap();

        assert!(loaded.skipped.is_empty(), "{:?}", loaded.skipped);
        assert_eq!(loaded.registry.len(), handlers.len());
    }

    #[test]
    fn metadata_serializes_to_the_registration_schema() {
        let info = CommandInfo {
            name: "help".to_string(),
            description: "Show commands".to_string(),
            options: vec![OptionInfo {
                kind: OptionKind::String,
                name: "command".to_string(),
                description: "A command name".to_string(),
                required: false,
            }],
        };
        let json = serde_json::to_value(info.create_command()).unwrap();

        assert_eq!(json["name"], "help");
        assert_eq!(json["description"], "Show commands");
        assert_eq!(json["options"][0]["name"], "command");
        // String options are type 3 in Discord's schema.
        assert_eq!(json["options"][0]["type"], 3);
    }
}
