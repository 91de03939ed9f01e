//! Implements the `/help` command.
//!
//! Lists the loaded commands, or describes one of them.

use async_trait::async_trait;
use itertools::Itertools;

use super::CommandInfo;
use super::Run;
use crate::context::Context;
use crate::error::SynthError;

pub struct Help;

#[async_trait]
impl Run for Help {
    async fn run(&self, ctx: &Context) -> Result<(), SynthError> {
        let commands = &ctx.data().commands;

        let content = match ctx.str_option("command") {
            None => commands.iter().map(summary).join("\n"),
            Some(name) => {
                let name = name.trim_start_matches('/');
                match commands.iter().find(|c| c.name == name) {
                    Some(info) => describe(info),
                    None => format!("There is no command named `/{name}`."),
                }
            }
        };

        ctx.whisper(content).await
    }
}

fn summary(info: &CommandInfo) -> String {
    format!("`/{}` {}", info.name, info.description)
}

fn describe(info: &CommandInfo) -> String {
    let mut lines = vec![summary(info)];
    for option in &info.options {
        let required = if option.required { "" } else { " (optional)" };
        lines.push(format!("- `{}`{required}: {}", option.name, option.description));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::audio::RelayManager;
    use crate::commands::OptionInfo;
    use crate::commands::OptionKind;
    use crate::context::testing::Recorded;
    use crate::context::testing::RecordingResponder;
    use crate::context::OptionValue;
    use crate::data::Data;

    fn data() -> Arc<Data> {
        let commands = vec![
            CommandInfo {
                name: "help".to_string(),
                description: "Show commands".to_string(),
                options: vec![OptionInfo {
                    kind: OptionKind::String,
                    name: "command".to_string(),
                    description: "A command name".to_string(),
                    required: false,
                }],
            },
            CommandInfo {
                name: "ping".to_string(),
                description: "Check the bot".to_string(),
                options: vec![],
            },
        ];
        let (manager, _events) = RelayManager::new(vec![]);
        Arc::new(Data::new(Arc::new(manager), commands))
    }

    async fn help(options: HashMap<String, OptionValue>) -> Vec<Recorded> {
        let (ctx, recorder) = RecordingResponder::context_with_data(
            "help",
            options,
            data(),
            RecordingResponder::default(),
        );
        Help.run(&ctx).await.unwrap();
        recorder.calls()
    }

    #[tokio::test]
    async fn lists_every_command() {
        let calls = help(HashMap::new()).await;

        assert_eq!(
            calls,
            vec![Recorded::Reply {
                content: "`/help` Show commands\n`/ping` Check the bot".to_string(),
                ephemeral: true
            }]
        );
    }

    #[tokio::test]
    async fn describes_one_command() {
        let options = HashMap::from([(
            "command".to_string(),
            OptionValue::String("/help".to_string()),
        )]);
        let calls = help(options).await;

        let Recorded::Reply { content, .. } = &calls[0] else {
            panic!("expected a reply, got {calls:?}");
        };
        assert_eq!(
            content,
            "`/help` Show commands\n- `command` (optional): A command name"
        );
    }

    #[tokio::test]
    async fn unknown_command_is_explained() {
        let options = HashMap::from([(
            "command".to_string(),
            OptionValue::String("nope".to_string()),
        )]);
        let calls = help(options).await;

        assert_eq!(
            calls,
            vec![Recorded::Reply {
                content: "There is no command named `/nope`.".to_string(),
                ephemeral: true
            }]
        );
    }
}
