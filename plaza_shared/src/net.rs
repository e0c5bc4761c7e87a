//! Networking primitives.
//!
//! Goals:
//! - One persistent WebSocket channel to the remote authority.
//! - JSON text frames tagged by an `action` field, in both directions.
//! - A malformed or unknown frame never closes the channel.

use std::{collections::BTreeMap, collections::HashMap, sync::Arc};

use anyhow::Context;
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use serde::{Deserialize, Serialize};
use tokio::{
    net::TcpStream,
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, Message},
    MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

use crate::model::{Appearance, Direction, Player, PlayerId};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Client -> authority messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientMsg {
    JoinGame {
        username: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        avatar: Option<Appearance>,
    },
    Move {
        direction: Direction,
    },
    Stop,
    Emote {
        emote: String,
    },
    Chat {
        message: String,
    },
}

/// Authority -> client messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ServerMsg {
    JoinGame {
        success: bool,
        #[serde(rename = "playerId", default, skip_serializing_if = "Option::is_none")]
        player_id: Option<PlayerId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        players: Option<BTreeMap<PlayerId, Player>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        avatars: Option<HashMap<String, Appearance>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    PlayersMoved {
        players: BTreeMap<PlayerId, Player>,
    },
    PlayerJoined {
        player: Player,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        avatar: Option<Appearance>,
    },
    PlayerLeft {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
    },
    Emote {
        #[serde(rename = "playerId")]
        player_id: PlayerId,
        emote: String,
    },
    Chat {
        username: String,
        message: String,
    },
    /// Any action this client does not understand.
    #[serde(other)]
    Unknown,
}

/// Encodes an outbound message as a JSON text payload.
pub fn encode(msg: &ClientMsg) -> anyhow::Result<String> {
    serde_json::to_string(msg).context("serialize client msg")
}

/// Decodes an inbound JSON payload.
pub fn decode(payload: &[u8]) -> anyhow::Result<ServerMsg> {
    serde_json::from_slice(payload).context("deserialize server msg")
}

/// Lifecycle of the connection channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelStatus {
    Open,
    Closed { reason: Option<String> },
}

impl ChannelStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, ChannelStatus::Open)
    }
}

/// What the reader task delivers to the channel owner, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Message(ServerMsg),
    /// A frame that could not be decoded. The channel stays open.
    Malformed { error: String },
    /// The stream ended or failed. No further events follow.
    Closed { reason: Option<String> },
}

/// Persistent bidirectional channel to the remote authority.
pub struct Connection {
    url: String,
    sink: SplitSink<WsStream, Message>,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
    status: Arc<watch::Sender<ChannelStatus>>,
    reader: JoinHandle<()>,
}

impl Connection {
    /// Opens the WebSocket and starts the reader task.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        info!(url = %url, "Connecting to authority");
        let (ws, _response) = connect_async(url)
            .await
            .with_context(|| format!("websocket connect {url}"))?;
        let (sink, stream) = ws.split();

        let (status, _) = watch::channel(ChannelStatus::Open);
        let status = Arc::new(status);
        let (tx, events) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_loop(stream, tx, status.clone()));

        info!(url = %url, "Connected to authority");
        Ok(Self {
            url: url.to_string(),
            sink,
            events,
            status,
            reader,
        })
    }

    pub fn status(&self) -> ChannelStatus {
        self.status.borrow().clone()
    }

    pub fn is_open(&self) -> bool {
        self.status.borrow().is_open()
    }

    /// Subscribes to status changes.
    pub fn watch_status(&self) -> watch::Receiver<ChannelStatus> {
        self.status.subscribe()
    }

    /// Sends a message. Returns `Ok(false)` when the channel is closed and the
    /// message was dropped.
    pub async fn send(&mut self, msg: &ClientMsg) -> anyhow::Result<bool> {
        if !self.is_open() {
            debug!(?msg, "Channel closed, dropping outbound message");
            return Ok(false);
        }
        let payload = encode(msg)?;
        if let Err(e) = self.sink.send(Message::text(payload)).await {
            warn!(error = %e, "Websocket write failed");
            self.status.send_replace(ChannelStatus::Closed {
                reason: Some(e.to_string()),
            });
            return Err(e).context("websocket write");
        }
        Ok(true)
    }

    /// Next event from the reader task, or `None` once it has finished and
    /// every buffered event was consumed.
    pub async fn next_event(&mut self) -> Option<ChannelEvent> {
        self.events.recv().await
    }

    /// Closes the channel. Idempotent.
    pub async fn disconnect(&mut self) {
        if self.is_open() {
            if let Err(e) = self.sink.send(Message::Close(None)).await {
                debug!(error = %e, "Close frame not delivered");
            }
        }
        self.reader.abort();
        self.status.send_replace(ChannelStatus::Closed {
            reason: Some("disconnected by client".to_string()),
        });
        info!(url = %self.url, "Disconnected from authority");
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn read_loop(
    mut stream: SplitStream<WsStream>,
    tx: mpsc::UnboundedSender<ChannelEvent>,
    status: Arc<watch::Sender<ChannelStatus>>,
) {
    let reason = loop {
        let frame = match stream.next().await {
            Some(Ok(frame)) => frame,
            Some(Err(tungstenite::Error::ConnectionClosed)) | None => break None,
            Some(Err(e)) => {
                warn!(error = %e, "Websocket read failed");
                break Some(e.to_string());
            }
        };

        let event = match frame {
            Message::Text(text) => decode_event(text.as_bytes()),
            Message::Binary(bytes) => decode_event(&bytes),
            Message::Close(frame) => {
                break frame
                    .map(|f| f.reason.as_str().to_string())
                    .filter(|r| !r.is_empty());
            }
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
        };

        if tx.send(event).is_err() {
            // Owner is gone.
            return;
        }
    };

    status.send_replace(ChannelStatus::Closed {
        reason: reason.clone(),
    });
    let _ = tx.send(ChannelEvent::Closed { reason });
}

fn decode_event(payload: &[u8]) -> ChannelEvent {
    match decode(payload) {
        Ok(msg) => ChannelEvent::Message(msg),
        Err(e) => {
            warn!(error = %format!("{e:#}"), "Dropping malformed message");
            ChannelEvent::Malformed {
                error: format!("{e:#}"),
            }
        }
    }
}
