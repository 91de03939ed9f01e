//! Implements the `/nodes` command.
//!
//! Shows the relay nodes and the guilds with an active voice session.

use async_trait::async_trait;
use itertools::Itertools;

use super::Run;
use crate::context::Context;
use crate::error::SynthError;

pub struct Nodes;

#[async_trait]
impl Run for Nodes {
    async fn run(&self, ctx: &Context) -> Result<(), SynthError> {
        let nodes = ctx.nodes();

        let mut content = if nodes.is_empty() {
            "No relay nodes configured.".to_string()
        } else {
            nodes
                .iter()
                .map(|node| format!("`{}` {}: {}", node.identifier, node.address, node.state))
                .join("\n")
        };

        let sessions = ctx.voice_sessions().len();
        content.push_str(&format!("\nActive voice sessions: {sessions}"));

        ctx.whisper(content).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::audio::NodeOptions;
    use crate::audio::RelayManager;
    use crate::context::testing::Recorded;
    use crate::context::testing::RecordingResponder;
    use crate::data::Data;

    async fn nodes_reply(nodes: Vec<NodeOptions>) -> Vec<Recorded> {
        let (manager, _events) = RelayManager::new(nodes);
        let data = Arc::new(Data::new(Arc::new(manager), vec![]));
        let (ctx, recorder) = RecordingResponder::context_with_data(
            "nodes",
            HashMap::new(),
            data,
            RecordingResponder::default(),
        );
        Nodes.run(&ctx).await.unwrap();
        recorder.calls()
    }

    #[tokio::test]
    async fn lists_configured_nodes() {
        let calls = nodes_reply(vec![NodeOptions::default()]).await;

        assert_eq!(
            calls,
            vec![Recorded::Reply {
                content: "`Node 1` 127.0.0.1:2333: idle\nActive voice sessions: 0".to_string(),
                ephemeral: true
            }]
        );
    }

    #[tokio::test]
    async fn no_nodes_is_said_plainly() {
        let calls = nodes_reply(vec![]).await;

        let Recorded::Reply { content, .. } = &calls[0] else {
            panic!("expected a reply, got {calls:?}");
        };
        assert!(content.starts_with("No relay nodes configured."));
    }
}
