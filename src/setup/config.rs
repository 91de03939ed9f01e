//! Configuration for running this bot.
//!
//! Secrets come from the process environment, everything else from [CONFIG_PATH].

use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use serenity::all::ApplicationId;
use serenity::all::GuildId;

use crate::audio::NodeOptions;
use crate::error::ConfigError;

/// The path to the config file
const CONFIG_PATH: &str = "config.toml";

/// Environment variable holding the bot token.
const TOKEN_VAR: &str = "Token";

/// Environment variable holding the application id.
const CLIENT_ID_VAR: &str = "Client_ID";

/// Settings read from [CONFIG_PATH] that modify bot behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// See [LoggingConfig]
    pub logging: LoggingConfig,

    /// See [CommandsConfig]
    pub commands: CommandsConfig,

    /// Useful developer specific configs.
    dev_utils: DevConfig,

    /// Relay nodes handed to the audio manager.
    pub nodes: Vec<NodeOptions>,
}

impl Config {
    /// Tries to read [CONFIG_PATH] to extract a [Config].
    pub fn read() -> Result<Config, ConfigError> {
        Self::read_from(Path::new(CONFIG_PATH))
    }

    /// Tries to read the file at `path` to extract a [Config].
    /// If a file doesn't exists, create the default config file and returns error.
    /// If a file exists but is empty, re-write the default values and return error.
    /// If a file exists but is incomplete, show error and don't change files.
    /// If a file exists and is complete, read file to create a config.
    /// If file existance is indeterminent (e.g. missing permissions), return error.
    pub fn read_from(path: &Path) -> Result<Config, ConfigError> {
        let file = std::fs::read_to_string(path);
        let display = path.display();

        match file {
            // Config file found
            Ok(content) => {
                // Write default values to file if it's empty.
                if content.trim().is_empty() {
                    write_file(path, &Config::default())?;
                    Err(ConfigError::InvalidConfig {
                        reason: format!("Empty config file! Rewriting {display} ..."),
                    })
                } else {
                    Self::parse(&content)
                }
            }
            // File not found or other filesystem error
            Err(file_error) => match file_error.kind() {
                std::io::ErrorKind::NotFound => {
                    let action = format!("Creating {display}...");
                    write_file(path, &Config::default())?;
                    Err(ConfigError::MissingConfig { action_msg: action })
                }
                _ => Err(ConfigError::IoError(file_error)),
            },
        }
    }

    /// Parse a config from toml, naming the offending field on failure.
    pub fn parse(content: &str) -> Result<Config, ConfigError> {
        let to_toml = toml::Deserializer::new(content);
        let result: Result<Config, _> = serde_path_to_error::deserialize(to_toml);

        result.map_err(|error| ConfigError::InvalidConfig {
            reason: error.to_string(),
        })
    }

    pub fn dev_guild(&self) -> Option<GuildId> {
        self.dev_utils.dev_guild
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),

            commands: CommandsConfig {
                dir: "commands".to_string(),
            },

            dev_utils: DevConfig { dev_guild: None },

            nodes: vec![NodeOptions::default()],
        }
    }
}

/// Configs for logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Print debug traces to console?
    pub console_debug: bool,
    /// Enable writing to log file?
    pub logs_enabled: bool,
    /// Directory to store log files
    pub log_dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            console_debug: false,
            logs_enabled: true,
            log_dir: "logs".to_string(),
        }
    }
}

/// Where command descriptors are loaded from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandsConfig {
    pub dir: String,
}

/// Optional configs to enable developer-specific behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DevConfig {
    /// Optional guild to automatically update commands quickly.
    #[serde(serialize_with = "serialize_opt", deserialize_with = "deserialize_opt")]
    dev_guild: Option<GuildId>,
}

/// Credentials read from the environment. Never written to disk.
pub struct Secrets {
    pub token: String,
    pub application_id: ApplicationId,
}

impl Secrets {
    pub fn from_env() -> Result<Self, ConfigError> {
        let token = var(TOKEN_VAR)?;
        let application_id = parse_application_id(&var(CLIENT_ID_VAR)?)?;
        Ok(Secrets {
            token,
            application_id,
        })
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("token", &"<redacted>")
            .field("application_id", &self.application_id)
            .finish()
    }
}

/// Read an environment variable, attaching its name to any errors.
fn var(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnv {
        name: name.to_string(),
    })
}

fn parse_application_id(raw: &str) -> Result<ApplicationId, ConfigError> {
    let malformed = |reason: String| ConfigError::MalformedEnv {
        name: CLIENT_ID_VAR.to_string(),
        reason,
    };
    let id: u64 = raw.trim().parse().map_err(|e| malformed(format!("{e}")))?;
    // Snowflakes are never zero.
    if id == 0 {
        return Err(malformed("id can't be zero".to_string()));
    }
    Ok(ApplicationId::new(id))
}

/// Write the given config to `path`.
fn write_file(path: &Path, config: &Config) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidConfig {
        reason: e.to_string(),
    })?;
    std::fs::write(path, content).map_err(ConfigError::IoError)
}

fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<GuildId>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    deserializer.deserialize_str(OptVisitor)
}

fn serialize_opt<S>(val: &Option<GuildId>, ser: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    match val {
        Some(v) => ser.serialize_str(&v.get().to_string()),
        None => ser.serialize_str(""),
    }
}

struct OptVisitor;

impl serde::de::Visitor<'_> for OptVisitor {
    type Value = Option<GuildId>;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a valid guild id")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        match v {
            "" => Ok(None),
            _ => {
                let num: u64 = v.parse().map_err(|_| E::custom("not u64"))?;
                if num == 0 {
                    return Err(E::custom("guild id can't be zero"));
                }
                Ok(Some(GuildId::new(num)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn default_config_survives_a_round_trip() {
        let content = toml::to_string_pretty(&Config::default()).unwrap();
        let config = Config::parse(&content).unwrap();

        assert_eq!(config.commands.dir, "commands");
        assert!(config.dev_guild().is_none());
        assert_eq!(config.nodes.len(), 1);
        assert_eq!(config.nodes[0].identifier, "Node 1");
        assert_eq!(config.nodes[0].port, 2333);
        assert_eq!(config.nodes[0].retry_delay(), Duration::from_secs(10));
    }

    #[test]
    fn dev_guild_is_parsed() {
        let content = r#"
            nodes = []

            [logging]
            console_debug = true
            logs_enabled = false
            log_dir = "logs"

            [commands]
            dir = "cmds"

            [dev_utils]
            dev_guild = "310243609641484288"
        "#;
        let config = Config::parse(content).unwrap();

        assert_eq!(config.dev_guild(), Some(GuildId::new(310243609641484288)));
        assert!(config.nodes.is_empty());
        assert!(config.logging.console_debug);
    }

    #[test]
    fn invalid_config_names_the_field() {
        let content = r#"
            nodes = []

            [logging]
            console_debug = "yes"
            logs_enabled = false
            log_dir = "logs"

            [commands]
            dir = "cmds"

            [dev_utils]
            dev_guild = ""
        "#;
        let err = Config::parse(content).unwrap_err();

        match err {
            ConfigError::InvalidConfig { reason } => {
                assert!(reason.contains("logging.console_debug"), "{reason}")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let err = Config::read_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::MissingConfig { .. }));

        // The second read picks up the written defaults.
        let config = Config::read_from(&path).unwrap();
        assert_eq!(config.nodes[0].host, "127.0.0.1");
    }

    #[test]
    fn empty_file_is_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "  \n").unwrap();

        let err = Config::read_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidConfig { .. }));
        assert!(Config::read_from(&path).is_ok());
    }

    #[test]
    fn application_id_must_be_numeric() {
        assert_eq!(
            parse_application_id(" 1234 ").unwrap(),
            ApplicationId::new(1234)
        );
        assert!(matches!(
            parse_application_id("abc"),
            Err(ConfigError::MalformedEnv { .. })
        ));
        assert!(parse_application_id("0").is_err());
    }
}
