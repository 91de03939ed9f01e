//! Implements the `/ping` command.
//!
//! The bot answers with how long it has been awake.

use async_trait::async_trait;

use super::format_duration;
use super::Run;
use crate::context::Context;
use crate::error::SynthError;

pub struct Ping;

#[async_trait]
impl Run for Ping {
    async fn run(&self, ctx: &Context) -> Result<(), SynthError> {
        let uptime = format_duration(&ctx.data().started.elapsed());
        ctx.say(format!("Pong! Awake for {uptime}.")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::Recorded;
    use crate::context::testing::RecordingResponder;

    #[tokio::test]
    async fn ping_replies_with_uptime() {
        let (ctx, recorder) = RecordingResponder::context("ping");

        Ping.run(&ctx).await.unwrap();

        assert_eq!(
            recorder.calls(),
            vec![Recorded::Reply {
                content: "Pong! Awake for [00m:00s].".to_string(),
                ephemeral: false
            }]
        );
    }
}
