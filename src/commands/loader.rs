//! Loading command descriptors from a directory.
//!
//! Every `*.toml` file in the directory describes one command:
//!
//! ```toml
//! run = "ping"
//!
//! [info]
//! name = "ping"
//! description = "Check whether the bot is awake"
//! ```
//!
//! `run` names one of the [built-in handlers](super::list). Files that don't
//! describe a complete command are skipped with a warning, they never stop the bot
//! from starting.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

use super::CommandInfo;
use super::CommandRegistry;
use super::Handlers;
use super::SlashCommand;
use crate::error::LoadError;

/// Discord's limit on command and option descriptions.
const MAX_DESCRIPTION: usize = 100;

/// Discord's limit on options per command.
const MAX_OPTIONS: usize = 25;

/// Names Discord accepts for commands and options, before the lowercase check.
fn name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[-_'\p{L}\p{N}\p{Devanagari}\p{Thai}]{1,32}$").unwrap())
}

/// Result of loading a command directory.
#[derive(Debug)]
pub struct Loaded {
    pub registry: CommandRegistry,
    /// Descriptor files that were skipped.
    pub skipped: Vec<Skipped>,
}

/// A descriptor file that didn't make it into the registry.
#[derive(Debug)]
pub struct Skipped {
    pub path: PathBuf,
    pub reason: String,
}

/// Why a descriptor was skipped.
#[derive(Error, Debug)]
enum Incomplete {
    #[error("unreadable: {0}")]
    Unreadable(#[from] std::io::Error),
    #[error("malformed: {0}")]
    Malformed(String),
    #[error("missing [info]")]
    MissingInfo,
    #[error("empty command name")]
    EmptyName,
    #[error("missing run")]
    MissingRun,
    #[error("no handler named '{0}'")]
    UnknownRun(String),
    #[error("a command named '{0}' is already loaded")]
    Duplicate(String),
    #[error("invalid name '{0}', use 1 to 32 lowercase letters, digits, '-' or '_'")]
    InvalidName(String),
    #[error("description of '{0}' must be 1 to {} characters", MAX_DESCRIPTION)]
    InvalidDescription(String),
    #[error("too many options, at most {} are allowed", MAX_OPTIONS)]
    TooManyOptions,
    #[error("required option '{0}' comes after an optional one")]
    RequiredAfterOptional(String),
}

/// The on-disk shape of a descriptor. Both halves are optional so that
/// incomplete files can be reported instead of failing to parse.
#[derive(Debug, Deserialize)]
struct Descriptor {
    info: Option<CommandInfo>,
    run: Option<String>,
}

/// Load every descriptor in `dir`, pairing it with its handler.
///
/// Only a failure to read the directory itself is an error.
pub fn load_dir(dir: &Path, handlers: &Handlers) -> Result<Loaded, LoadError> {
    let entries = std::fs::read_dir(dir).map_err(|source| LoadError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    // Directory order is platform dependent.
    paths.sort();

    let mut commands: HashMap<String, SlashCommand> = HashMap::new();
    let mut skipped = Vec::new();

    for path in paths {
        let loaded = load_file(&path, handlers).and_then(|command| {
            if commands.contains_key(&command.info.name) {
                Err(Incomplete::Duplicate(command.info.name))
            } else {
                Ok(command)
            }
        });

        match loaded {
            Ok(command) => {
                tracing::debug!("Loaded '{}' from {}", command.info.name, path.display());
                commands.insert(command.info.name.clone(), command);
            }
            Err(reason) => {
                tracing::warn!(
                    "The structure of the command is incomplete ({}): {reason}",
                    path.display()
                );
                skipped.push(Skipped {
                    path,
                    reason: reason.to_string(),
                });
            }
        }
    }

    Ok(Loaded {
        registry: CommandRegistry::new(commands),
        skipped,
    })
}

fn load_file(path: &Path, handlers: &Handlers) -> Result<SlashCommand, Incomplete> {
    let content = std::fs::read_to_string(path)?;

    let to_toml = toml::Deserializer::new(&content);
    let descriptor: Descriptor = serde_path_to_error::deserialize(to_toml)
        .map_err(|error| Incomplete::Malformed(error.to_string()))?;

    let info = descriptor.info.ok_or(Incomplete::MissingInfo)?;
    validate(&info)?;

    let run_name = descriptor.run.ok_or(Incomplete::MissingRun)?;
    let run = handlers
        .get(run_name.as_str())
        .cloned()
        .ok_or(Incomplete::UnknownRun(run_name))?;

    Ok(SlashCommand { info, run })
}

/// Reject metadata Discord would refuse, which would fail the whole bulk overwrite.
fn validate(info: &CommandInfo) -> Result<(), Incomplete> {
    if info.name.trim().is_empty() {
        return Err(Incomplete::EmptyName);
    }
    check_name(&info.name)?;
    check_description(&info.name, &info.description)?;

    if info.options.len() > MAX_OPTIONS {
        return Err(Incomplete::TooManyOptions);
    }
    for option in &info.options {
        check_name(&option.name)?;
        check_description(&option.name, &option.description)?;
    }

    // Discord wants required options first.
    if let Some(late) = info
        .options
        .iter()
        .skip_while(|o| o.required)
        .find(|o| o.required)
    {
        return Err(Incomplete::RequiredAfterOptional(late.name.clone()));
    }

    Ok(())
}

fn check_name(name: &str) -> Result<(), Incomplete> {
    if name_regex().is_match(name) && name.to_lowercase() == name {
        Ok(())
    } else {
        Err(Incomplete::InvalidName(name.to_string()))
    }
}

fn check_description(name: &str, description: &str) -> Result<(), Incomplete> {
    let len = description.chars().count();
    if description.trim().is_empty() || len > MAX_DESCRIPTION {
        return Err(Incomplete::InvalidDescription(name.to_string()));
    }
    Ok(())
}
