//! The context a command handler runs in.

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use delegate::delegate;
use serenity::all::ChannelId;
use serenity::all::CommandDataOptionValue;
use serenity::all::CommandInteraction;
use serenity::all::CreateInteractionResponse;
use serenity::all::CreateInteractionResponseFollowup;
use serenity::all::CreateInteractionResponseMessage;
use serenity::all::RoleId;
use serenity::all::UserId;

use crate::audio::NodeStatus;
use crate::audio::VoiceSession;
use crate::data::Data;
use crate::error::SynthError;

/// Sent to the user when a command fails.
pub const FAILURE_MESSAGE: &str = "An unexpected error arose during the execution of this command";

/// A message sent back to the user.
#[derive(Debug, Clone, PartialEq, Eq, bon::Builder)]
pub struct Reply {
    #[builder(into)]
    pub content: String,
    /// Only the user who used the command can see it.
    #[builder(default)]
    pub ephemeral: bool,
}

/// The ways a handler can answer an interaction.
#[async_trait]
pub trait Responder: Send + Sync {
    /// The initial response.
    async fn reply(&self, reply: &Reply) -> Result<(), SynthError>;
    /// Acknowledge now, answer later with a follow-up.
    async fn defer(&self, ephemeral: bool) -> Result<(), SynthError>;
    /// Any message after the interaction was acknowledged.
    async fn follow_up(&self, reply: &Reply) -> Result<(), SynthError>;
}

/// [Responder] for a real Discord interaction.
pub struct InteractionResponder {
    ctx: serenity::all::Context,
    interaction: CommandInteraction,
}

impl InteractionResponder {
    pub fn new(ctx: serenity::all::Context, interaction: CommandInteraction) -> Self {
        Self { ctx, interaction }
    }
}

#[async_trait]
impl Responder for InteractionResponder {
    async fn reply(&self, reply: &Reply) -> Result<(), SynthError> {
        let message = CreateInteractionResponseMessage::new()
            .content(&reply.content)
            .ephemeral(reply.ephemeral);
        self.interaction
            .create_response(&self.ctx, CreateInteractionResponse::Message(message))
            .await?;
        Ok(())
    }

    async fn defer(&self, ephemeral: bool) -> Result<(), SynthError> {
        let message = CreateInteractionResponseMessage::new().ephemeral(ephemeral);
        self.interaction
            .create_response(&self.ctx, CreateInteractionResponse::Defer(message))
            .await?;
        Ok(())
    }

    async fn follow_up(&self, reply: &Reply) -> Result<(), SynthError> {
        let followup = CreateInteractionResponseFollowup::new()
            .content(&reply.content)
            .ephemeral(reply.ephemeral);
        self.interaction
            .create_followup(&self.ctx, followup)
            .await?;
        Ok(())
    }
}

/// A command argument given by the user.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    String(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    User(UserId),
    Channel(ChannelId),
    Role(RoleId),
    /// Anything the bot has no use for.
    Other,
}

impl From<&CommandDataOptionValue> for OptionValue {
    fn from(value: &CommandDataOptionValue) -> Self {
        match value {
            CommandDataOptionValue::String(s) => OptionValue::String(s.clone()),
            CommandDataOptionValue::Integer(i) => OptionValue::Integer(*i),
            CommandDataOptionValue::Number(n) => OptionValue::Number(*n),
            CommandDataOptionValue::Boolean(b) => OptionValue::Boolean(*b),
            CommandDataOptionValue::User(id) => OptionValue::User(*id),
            CommandDataOptionValue::Channel(id) => OptionValue::Channel(*id),
            CommandDataOptionValue::Role(id) => OptionValue::Role(*id),
            _ => OptionValue::Other,
        }
    }
}

/// Everything a handler gets to work with.
///
/// Tracks whether the interaction has been acknowledged, so that later messages
/// become follow-ups.
pub struct Context {
    command_name: String,
    author: String,
    options: HashMap<String, OptionValue>,
    data: Arc<Data>,
    responder: Box<dyn Responder>,
    /// Replied to or deferred.
    acknowledged: AtomicBool,
}

impl Context {
    pub fn new(
        command_name: impl Into<String>,
        author: impl Into<String>,
        options: HashMap<String, OptionValue>,
        data: Arc<Data>,
        responder: Box<dyn Responder>,
    ) -> Self {
        Self {
            command_name: command_name.into(),
            author: author.into(),
            options,
            data,
            responder,
            acknowledged: AtomicBool::new(false),
        }
    }

    /// Build the context of a slash command interaction.
    pub fn from_interaction(
        ctx: serenity::all::Context,
        interaction: CommandInteraction,
        data: Arc<Data>,
    ) -> Self {
        let options = interaction
            .data
            .options
            .iter()
            .map(|option| (option.name.clone(), OptionValue::from(&option.value)))
            .collect();
        let name = interaction.data.name.clone();
        let author = interaction.user.name.clone();
        let responder = InteractionResponder::new(ctx, interaction);

        Self::new(name, author, options, data, Box::new(responder))
    }

    pub fn command_name(&self) -> &str {
        &self.command_name
    }

    /// Name of the user who used the command.
    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn data(&self) -> &Data {
        &self.data
    }

    delegate! {
        to self.data.manager {
            /// See [AudioManager::nodes](crate::audio::AudioManager::nodes)
            pub fn nodes(&self) -> Vec<NodeStatus>;
            /// See [AudioManager::voice_sessions](crate::audio::AudioManager::voice_sessions)
            pub fn voice_sessions(&self) -> Vec<VoiceSession>;
        }
    }

    pub fn option(&self, name: &str) -> Option<&OptionValue> {
        self.options.get(name)
    }

    /// A string argument, if given.
    pub fn str_option(&self, name: &str) -> Option<&str> {
        match self.option(name) {
            Some(OptionValue::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Whether the interaction was replied to or deferred.
    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged.load(Ordering::SeqCst)
    }

    /// Send a public message.
    pub async fn say(&self, content: impl Into<String>) -> Result<(), SynthError> {
        self.send(Reply::builder().content(content).build()).await
    }

    /// Send a message only the author can see.
    pub async fn whisper(&self, content: impl Into<String>) -> Result<(), SynthError> {
        self.send(Reply::builder().content(content).ephemeral(true).build())
            .await
    }

    /// Reply if nothing was sent yet, follow up otherwise.
    pub async fn send(&self, reply: Reply) -> Result<(), SynthError> {
        if self.is_acknowledged() {
            self.responder.follow_up(&reply).await
        } else {
            self.responder.reply(&reply).await?;
            self.acknowledged.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Acknowledge the interaction, the answer comes later through [Context::send].
    pub async fn defer(&self, ephemeral: bool) -> Result<(), SynthError> {
        if self.is_acknowledged() {
            return Ok(());
        }
        self.responder.defer(ephemeral).await?;
        self.acknowledged.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Tell the user their command failed. Exactly one message is attempted.
    pub(crate) async fn report_failure(&self) {
        let reply = Reply::builder()
            .content(FAILURE_MESSAGE)
            .ephemeral(true)
            .build();

        if let Err(e) = self.send(reply).await {
            tracing::error!("Failed to send ephemeral reply. {e}")
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! A [Responder] that records what it was asked to send.

    use std::sync::Mutex;

    use super::*;
    use crate::audio::RelayManager;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Recorded {
        Reply { content: String, ephemeral: bool },
        Defer { ephemeral: bool },
        FollowUp { content: String, ephemeral: bool },
    }

    #[derive(Clone, Default)]
    pub struct RecordingResponder {
        calls: Arc<Mutex<Vec<Recorded>>>,
        /// Every call errors after being recorded.
        failing: bool,
    }

    impl RecordingResponder {
        /// A context for `command_name` answering through a new recorder.
        pub fn context(command_name: &str) -> (Context, RecordingResponder) {
            Self::context_with(command_name, HashMap::new(), RecordingResponder::default())
        }

        /// Like [RecordingResponder::context] but every send fails.
        pub fn failing_context(command_name: &str) -> (Context, RecordingResponder) {
            let recorder = RecordingResponder {
                failing: true,
                ..Default::default()
            };
            Self::context_with(command_name, HashMap::new(), recorder)
        }

        pub fn context_with(
            command_name: &str,
            options: HashMap<String, OptionValue>,
            recorder: RecordingResponder,
        ) -> (Context, RecordingResponder) {
            let (manager, _events) = RelayManager::new(vec![]);
            let data = Arc::new(Data::new(Arc::new(manager), vec![]));
            Self::context_with_data(command_name, options, data, recorder)
        }

        pub fn context_with_data(
            command_name: &str,
            options: HashMap<String, OptionValue>,
            data: Arc<Data>,
            recorder: RecordingResponder,
        ) -> (Context, RecordingResponder) {
            let ctx = Context::new(
                command_name,
                "tester",
                options,
                data,
                Box::new(recorder.clone()),
            );
            (ctx, recorder)
        }

        pub fn calls(&self) -> Vec<Recorded> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Recorded) -> Result<(), SynthError> {
            self.calls.lock().unwrap().push(call);
            if self.failing {
                Err(SynthError::Serenity(serenity::Error::Other("offline")))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl Responder for RecordingResponder {
        async fn reply(&self, reply: &Reply) -> Result<(), SynthError> {
            self.record(Recorded::Reply {
                content: reply.content.clone(),
                ephemeral: reply.ephemeral,
            })
        }

        async fn defer(&self, ephemeral: bool) -> Result<(), SynthError> {
            self.record(Recorded::Defer { ephemeral })
        }

        async fn follow_up(&self, reply: &Reply) -> Result<(), SynthError> {
            self.record(Recorded::FollowUp {
                content: reply.content.clone(),
                ephemeral: reply.ephemeral,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[tokio::test]
    async fn first_message_replies_and_later_ones_follow_up() {
        let (ctx, recorder) = RecordingResponder::context("test");
        assert!(!ctx.is_acknowledged());

        ctx.say("one").await.unwrap();
        assert!(ctx.is_acknowledged());
        ctx.whisper("two").await.unwrap();

        assert_eq!(
            recorder.calls(),
            vec![
                Recorded::Reply {
                    content: "one".to_string(),
                    ephemeral: false
                },
                Recorded::FollowUp {
                    content: "two".to_string(),
                    ephemeral: true
                },
            ]
        );
    }

    #[tokio::test]
    async fn deferring_twice_only_defers_once() {
        let (ctx, recorder) = RecordingResponder::context("test");

        ctx.defer(true).await.unwrap();
        ctx.defer(true).await.unwrap();

        assert_eq!(recorder.calls(), vec![Recorded::Defer { ephemeral: true }]);
    }

    #[tokio::test]
    async fn failed_reply_leaves_the_interaction_unacknowledged() {
        let (ctx, _recorder) = RecordingResponder::failing_context("test");

        assert!(ctx.say("lost").await.is_err());
        assert!(!ctx.is_acknowledged());
    }

    #[test]
    fn string_options_are_found() {
        let options = HashMap::from([
            ("query".to_string(), OptionValue::String("abc".to_string())),
            ("count".to_string(), OptionValue::Integer(3)),
        ]);
        let (ctx, _) =
            RecordingResponder::context_with("test", options, RecordingResponder::default());

        assert_eq!(ctx.str_option("query"), Some("abc"));
        assert_eq!(ctx.str_option("count"), None);
        assert_eq!(ctx.option("count"), Some(&OptionValue::Integer(3)));
        assert_eq!(ctx.str_option("missing"), None);
    }

    #[test]
    fn reply_builder_defaults_to_public() {
        let reply = Reply::builder().content("hi").build();
        assert!(!reply.ephemeral);
    }
}
