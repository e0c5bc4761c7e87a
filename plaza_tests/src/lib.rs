//! Test harness: a scriptable stand-in for the remote authority.
//!
//! The mock binds an ephemeral port, accepts one WebSocket client at a time
//! and lets a test push JSON frames and read what the client sent.

use std::{net::SocketAddr, time::Duration};

use anyhow::{bail, Context};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::{
    net::{TcpListener, TcpStream},
    time::timeout,
};
use tokio_tungstenite::{
    accept_async,
    tungstenite::{
        protocol::{frame::coding::CloseCode, CloseFrame},
        Message,
    },
    WebSocketStream,
};
use tracing::{debug, info};

/// How long a session waits for the client before failing the test.
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// How long `close` waits for the client's acknowledgement.
const CLOSE_GRACE: Duration = Duration::from_millis(500);

pub struct MockAuthority {
    listener: TcpListener,
    addr: SocketAddr,
}

impl MockAuthority {
    /// Binds to an ephemeral localhost port.
    pub async fn bind() -> anyhow::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .context("bind mock authority")?;
        let addr = listener.local_addr().context("local addr")?;
        info!(addr = %addr, "Mock authority listening");
        Ok(Self { listener, addr })
    }

    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Accepts the next client and completes the WebSocket handshake.
    pub async fn accept(&self) -> anyhow::Result<Session> {
        let (stream, peer) = timeout(RECV_TIMEOUT, self.listener.accept())
            .await
            .context("accept timed out")?
            .context("accept")?;
        let ws = accept_async(stream).await.context("websocket handshake")?;
        info!(peer = %peer, "Mock authority accepted client");
        Ok(Session { ws })
    }
}

/// One accepted client connection.
pub struct Session {
    ws: WebSocketStream<TcpStream>,
}

impl Session {
    pub async fn send_json(&mut self, value: Value) -> anyhow::Result<()> {
        self.send_text(&value.to_string()).await
    }

    /// Sends a raw text frame, valid JSON or not.
    pub async fn send_text(&mut self, text: &str) -> anyhow::Result<()> {
        debug!(text, "Mock authority -> client");
        self.ws
            .send(Message::text(text.to_string()))
            .await
            .context("send frame")
    }

    /// Next JSON message from the client. Control frames are skipped.
    pub async fn recv_json(&mut self) -> anyhow::Result<Value> {
        loop {
            let frame = timeout(RECV_TIMEOUT, self.ws.next())
                .await
                .context("recv timed out")?;
            match frame {
                Some(Ok(Message::Text(text))) => {
                    debug!(text = %text.as_str(), "Client -> mock authority");
                    return serde_json::from_str(text.as_str()).context("client sent bad json");
                }
                Some(Ok(Message::Binary(bytes))) => {
                    return serde_json::from_slice(&bytes).context("client sent bad json");
                }
                Some(Ok(Message::Close(_))) | None => bail!("client closed the connection"),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e).context("recv frame"),
            }
        }
    }

    /// Waits until the client closes its side.
    pub async fn expect_close(&mut self) -> anyhow::Result<()> {
        loop {
            match timeout(RECV_TIMEOUT, self.ws.next())
                .await
                .context("close timed out")?
            {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => return Ok(()),
                Some(Ok(Message::Text(text))) => {
                    debug!(text = %text.as_str(), "Ignoring client frame before close");
                }
                Some(Ok(_)) => {}
            }
        }
    }

    /// Closes the connection with a normal close code and `reason`.
    pub async fn close(&mut self, reason: &str) -> anyhow::Result<()> {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: reason.to_string().into(),
        };
        self.ws.close(Some(frame)).await.context("close")?;
        // Drain until the client acknowledges.
        while let Ok(Some(Ok(_))) = timeout(CLOSE_GRACE, self.ws.next()).await {}
        Ok(())
    }
}

/// Helpers building authority messages in wire shape.
pub mod wire {
    use serde_json::{json, Value};

    pub fn player(id: &str, username: &str, x: f32, y: f32) -> Value {
        json!({
            "id": id,
            "username": username,
            "x": x,
            "y": y,
            "facing": "south",
            "animationFrame": 0,
            "avatar": "knight",
        })
    }

    /// Appearance whose frames are `WxH` placeholders understood by test
    /// image sources.
    pub fn appearance(name: &str, size: &str) -> Value {
        json!({
            "name": name,
            "frames": {
                "north": [size],
                "south": [size, size],
                "east": [size],
            },
        })
    }

    pub fn join_ok(player_id: &str, players: &[Value], avatars: &[Value]) -> Value {
        let players: serde_json::Map<String, Value> = players
            .iter()
            .map(|p| (p["id"].as_str().unwrap_or_default().to_string(), p.clone()))
            .collect();
        let avatars: serde_json::Map<String, Value> = avatars
            .iter()
            .map(|a| (a["name"].as_str().unwrap_or_default().to_string(), a.clone()))
            .collect();
        json!({
            "action": "join_game",
            "success": true,
            "playerId": player_id,
            "players": players,
            "avatars": avatars,
        })
    }

    pub fn join_failed(error: &str) -> Value {
        json!({"action": "join_game", "success": false, "error": error})
    }

    pub fn players_moved(players: &[Value]) -> Value {
        let players: serde_json::Map<String, Value> = players
            .iter()
            .map(|p| (p["id"].as_str().unwrap_or_default().to_string(), p.clone()))
            .collect();
        json!({"action": "players_moved", "players": players})
    }

    pub fn player_joined(player: Value, avatar: Option<Value>) -> Value {
        let mut msg = json!({"action": "player_joined", "player": player});
        if let Some(avatar) = avatar {
            msg["avatar"] = avatar;
        }
        msg
    }

    pub fn player_left(player_id: &str) -> Value {
        json!({"action": "player_left", "playerId": player_id})
    }

    pub fn emote(player_id: &str, emote: &str) -> Value {
        json!({"action": "emote", "playerId": player_id, "emote": emote})
    }

    pub fn chat(username: &str, message: &str) -> Value {
        json!({"action": "chat", "username": username, "message": message})
    }
}
