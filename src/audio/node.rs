//! Connection handling for a single relay node.
//!
//! Each node gets its own driver task. The driver keeps reconnecting until
//! `retry_amount` consecutive attempts have failed.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::StreamExt;
use serde::Deserialize;
use serde::Serialize;
use serenity::all::UserId;
use tokio::sync::mpsc::UnboundedSender;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tracing::instrument;
use url::Url;

use super::NodeEvent;
use crate::error::AudioError;

/// Sent to the node so it can tell clients apart.
const CLIENT_NAME: &str = concat!("synth-music/", env!("CARGO_PKG_VERSION"));

type Socket =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// How to reach a relay node and how hard to try.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeOptions {
    /// Name used in logs.
    pub identifier: String,
    pub host: String,
    pub port: u16,
    pub password: String,
    /// Consecutive failed attempts before giving up on the node.
    pub retry_amount: u32,
    /// Wait between attempts, in milliseconds.
    pub retry_delay_ms: u64,
    /// Ask the node to keep our session alive across reconnects.
    pub resume_status: bool,
    /// How long the node keeps a dropped session, in seconds.
    pub resume_timeout_secs: u64,
    /// Use TLS.
    pub secure: bool,
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            identifier: "Node 1".to_string(),
            host: "127.0.0.1".to_string(),
            port: 2333,
            password: "youshallnotpass".to_string(),
            retry_amount: 1000,
            retry_delay_ms: 10_000,
            resume_status: true,
            resume_timeout_secs: 1000,
            secure: false,
        }
    }
}

impl NodeOptions {
    /// Delay between two connection attempts.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The websocket endpoint of the node.
    pub fn socket_url(&self) -> Result<Url, AudioError> {
        let scheme = if self.secure { "wss" } else { "ws" };
        self.url(scheme, "/v4/websocket")
    }

    /// The REST endpoint for one of our sessions on the node.
    pub fn session_url(&self, session_id: &str) -> Result<Url, AudioError> {
        let scheme = if self.secure { "https" } else { "http" };
        self.url(scheme, &format!("/v4/sessions/{session_id}"))
    }

    fn url(&self, scheme: &str, path: &str) -> Result<Url, AudioError> {
        let raw = format!("{scheme}://{}{path}", self.address());
        Url::parse(&raw).map_err(|source| AudioError::InvalidUrl {
            identifier: self.identifier.clone(),
            source,
        })
    }
}

/// Connection state of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeState {
    /// The manager hasn't been initialized yet.
    Idle,
    Connecting,
    Connected,
    /// Waiting before the given attempt.
    Reconnecting { attempt: u32 },
    /// Out of retries.
    Failed,
}

impl Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeState::Idle => write!(f, "idle"),
            NodeState::Connecting => write!(f, "connecting"),
            NodeState::Connected => write!(f, "connected"),
            NodeState::Reconnecting { attempt } => write!(f, "reconnecting (attempt {attempt})"),
            NodeState::Failed => write!(f, "failed"),
        }
    }
}

/// Messages from the node that the driver acts on.
#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(tag = "op", rename_all = "camelCase")]
enum NodeMessage {
    #[serde(rename_all = "camelCase")]
    Ready { resumed: bool, session_id: String },
    #[serde(other)]
    Other,
}

/// Drives the connection to one node.
pub(super) struct NodeDriver {
    options: NodeOptions,
    user_id: UserId,
    states: Arc<DashMap<String, NodeState>>,
    events: UnboundedSender<NodeEvent>,
    http: reqwest::Client,
    /// Session handed out by the node, kept for resuming.
    session_id: Option<String>,
}

impl NodeDriver {
    pub(super) fn new(
        options: NodeOptions,
        user_id: UserId,
        states: Arc<DashMap<String, NodeState>>,
        events: UnboundedSender<NodeEvent>,
    ) -> Self {
        Self {
            options,
            user_id,
            states,
            events,
            http: reqwest::Client::new(),
            session_id: None,
        }
    }

    /// Connect, listen, and reconnect until out of retries.
    #[instrument(skip(self), fields(node = %self.options.identifier))]
    pub(super) async fn run(mut self) {
        let mut attempts: u32 = 0;

        loop {
            self.set_state(NodeState::Connecting);

            match self.connect().await {
                Ok(socket) => {
                    attempts = 0;
                    self.set_state(NodeState::Connected);
                    self.emit(NodeEvent::Connect {
                        identifier: self.options.identifier.clone(),
                    });
                    if let Err(e) = self.listen(socket).await {
                        self.emit_error(&e);
                    }
                }
                Err(e) => self.emit_error(&e),
            }

            attempts += 1;
            if attempts > self.options.retry_amount {
                tracing::error!(
                    "Giving up on {} after {attempts} failed attempts.",
                    self.options.identifier
                );
                self.set_state(NodeState::Failed);
                return;
            }

            self.set_state(NodeState::Reconnecting { attempt: attempts });
            tokio::time::sleep(self.options.retry_delay()).await;
        }
    }

    /// Open the websocket and authenticate.
    async fn connect(&self) -> Result<Socket, AudioError> {
        let identifier = &self.options.identifier;
        let connection_error = |e: tokio_tungstenite::tungstenite::Error| AudioError::Connection {
            identifier: identifier.clone(),
            source: Box::new(e),
        };

        let url = self.options.socket_url()?;
        tracing::debug!("Connecting to {url}");

        let mut request = url.as_str().into_client_request().map_err(connection_error)?;
        let headers = request.headers_mut();
        headers.insert("authorization", self.header(&self.options.password)?);
        headers.insert("user-id", self.header(&self.user_id.to_string())?);
        headers.insert("client-name", HeaderValue::from_static(CLIENT_NAME));
        if self.options.resume_status {
            if let Some(session_id) = &self.session_id {
                headers.insert("session-id", self.header(session_id)?);
            }
        }

        let (socket, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(connection_error)?;

        Ok(socket)
    }

    /// Read from the node until the connection goes away.
    /// Always ends in an error since a closed node is a failure.
    async fn listen(&mut self, mut socket: Socket) -> Result<(), AudioError> {
        while let Some(message) = socket.next().await {
            let message = message.map_err(|e| AudioError::Connection {
                identifier: self.options.identifier.clone(),
                source: Box::new(e),
            })?;

            match message {
                Message::Text(text) => self.handle_text(text.as_str()).await,
                Message::Close(frame) => {
                    tracing::debug!("Close frame: {frame:?}");
                    break;
                }
                _ => {}
            }
        }

        Err(AudioError::Closed {
            identifier: self.options.identifier.clone(),
        })
    }

    async fn handle_text(&mut self, text: &str) {
        let message: NodeMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!("Ignoring unreadable node message: {e}");
                return;
            }
        };

        if let NodeMessage::Ready {
            resumed,
            session_id,
        } = message
        {
            tracing::debug!("Node session {session_id} ready (resumed: {resumed}).");
            if self.options.resume_status {
                if let Err(e) = self.configure_resuming(&session_id).await {
                    self.emit_error(&e);
                }
            }
            self.session_id = Some(session_id);
        }
    }

    /// Tell the node to hold on to our session if we drop.
    async fn configure_resuming(&self, session_id: &str) -> Result<(), AudioError> {
        let url = self.options.session_url(session_id)?;
        let body = serde_json::json!({
            "resuming": true,
            "timeout": self.options.resume_timeout_secs,
        });

        self.http
            .patch(url)
            .header("Authorization", self.options.password.as_str())
            .json(&body)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|source| AudioError::Rest {
                identifier: self.options.identifier.clone(),
                source,
            })?;

        Ok(())
    }

    fn header(&self, value: &str) -> Result<HeaderValue, AudioError> {
        HeaderValue::from_str(value).map_err(|e| AudioError::InvalidHeader {
            identifier: self.options.identifier.clone(),
            reason: e.to_string(),
        })
    }

    fn set_state(&self, state: NodeState) {
        self.states.insert(self.options.identifier.clone(), state);
    }

    fn emit_error(&self, error: &AudioError) {
        self.emit(NodeEvent::Error {
            identifier: self.options.identifier.clone(),
            message: error.to_string(),
        });
    }

    fn emit(&self, event: NodeEvent) {
        // Nobody listening is fine, the state map still tracks the node.
        if self.events.send(event).is_err() {
            tracing::trace!("Node event dropped, no listener.");
        }
    }
}
