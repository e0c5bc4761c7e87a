//! Client implementation.
//!
//! `WorldClient` owns every piece of client state:
//! - The connection channel to the authority
//! - The world state store and the effect tracker
//! - The asset cache and the camera
//! - The chat log and the input mapper
//!
//! It reacts to one event at a time (inbound message, finished asset load,
//! effect tick, user command) and repaints the surface after each event that
//! changed what is visible. Nothing else mutates this state.

use std::{future, sync::Arc, time::Duration};

use anyhow::Context;
use plaza_shared::{
    chat::{ChatEntry, ChatKind, ChatLog},
    clock::Clock,
    config::ClientConfig,
    model::{Appearance, Player, PlayerId},
    net::{ChannelEvent, ChannelStatus, Connection, ServerMsg},
    render::Surface,
};
use tokio::{
    sync::mpsc,
    time::{self, Interval, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    assets::{AssetCache, AssetEvent, ImageSource},
    camera::Camera,
    effects::EffectTracker,
    input::{InputMapper, Intent, KeyEvent},
    renderer::render_frame,
    upload::appearance_from_upload,
    world::WorldState,
};

/// Client session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientState {
    /// No channel to the authority.
    Disconnected,
    /// Channel open, not joined.
    Connected,
    /// `join_game` sent, waiting for the answer.
    Joining,
    /// Joined; the local identity is known.
    Joined,
}

/// Commands from the input source.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    Key(KeyEvent),
    Connect,
    Join { username: String },
    Chat(String),
    /// Raw bytes of a picture to use as the avatar.
    UploadAvatar(Vec<u8>),
    Resize { width: u32, height: u32 },
    Disconnect,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// One thing the client woke up for.
#[derive(Debug)]
pub enum Wake {
    Channel(Option<ChannelEvent>),
    Asset(AssetEvent),
    Tick,
    Command(Option<ClientCommand>),
}

/// High-level world client.
pub struct WorldClient {
    cfg: ClientConfig,
    clock: Arc<dyn Clock>,
    pub state: ClientState,

    channel: Option<Connection>,
    world: WorldState,
    effects: EffectTracker,
    assets: AssetCache,
    camera: Camera,
    chat: ChatLog,
    input: InputMapper,

    /// Name used for the last join.
    username: Option<String>,
    /// Uploaded avatar sent with every join.
    custom_avatar: Option<Appearance>,

    ticker: Interval,
    frames_rendered: u64,
}

impl WorldClient {
    /// Creates a client and starts loading the background.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(cfg: ClientConfig, images: Arc<dyn ImageSource>, clock: Arc<dyn Clock>) -> Self {
        let mut assets = AssetCache::new(images);
        if let Some(background) = &cfg.background {
            assets.load_background(background);
        }
        let mut ticker = time::interval(Duration::from_millis(cfg.effect_poll_ms.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        Self {
            cfg,
            clock,
            state: ClientState::Disconnected,
            channel: None,
            world: WorldState::new(),
            effects: EffectTracker::new(),
            assets,
            camera: Camera::new(),
            chat: ChatLog::default(),
            input: InputMapper::new(),
            username: None,
            custom_avatar: None,
            ticker,
            frames_rendered: 0,
        }
    }

    /// Opens the channel to the configured authority.
    pub async fn connect(&mut self) -> anyhow::Result<()> {
        if self.channel.as_ref().is_some_and(Connection::is_open) {
            return Ok(());
        }
        let conn = Connection::connect(&self.cfg.server_url)
            .await
            .context("connect to authority")?;
        self.channel = Some(conn);
        self.state = ClientState::Connected;
        self.chat.push_system("Connected to server");
        Ok(())
    }

    /// Waits for one event, handles it and repaints if needed.
    pub async fn pump(
        &mut self,
        commands: &mut mpsc::Receiver<ClientCommand>,
        surface: &mut dyn Surface,
    ) -> anyhow::Result<Flow> {
        let wake = self.wait(commands).await;
        self.handle(wake, surface).await
    }

    /// Waits for the next event without handling it.
    ///
    /// Cancel safe: dropping the future loses no event, so it can race other
    /// sources in a `select!`. Pass the result to [`WorldClient::handle`]
    /// outside the race.
    pub async fn wait(&mut self, commands: &mut mpsc::Receiver<ClientCommand>) -> Wake {
        tokio::select! {
            event = next_channel_event(&mut self.channel) => Wake::Channel(event),
            Some(event) = self.assets.next_event() => Wake::Asset(event),
            _ = self.ticker.tick() => Wake::Tick,
            command = commands.recv() => Wake::Command(command),
        }
    }

    /// Handles one event and repaints if needed. Active effects repaint on
    /// every tick so their motion and fade advance.
    pub async fn handle(&mut self, wake: Wake, surface: &mut dyn Surface) -> anyhow::Result<Flow> {
        let changed = match wake {
            Wake::Channel(Some(event)) => self.handle_channel_event(event),
            Wake::Channel(None) => {
                self.on_closed(None);
                false
            }
            Wake::Asset(event) => self.assets.complete(event),
            Wake::Tick => {
                let expired = !self.effects.expire(self.clock.now()).is_empty();
                expired || !self.effects.is_empty()
            }
            Wake::Command(Some(command)) => return self.execute(command, surface).await,
            Wake::Command(None) => return Ok(Flow::Quit),
        };
        if changed {
            self.render(surface);
        }
        Ok(Flow::Continue)
    }

    /// Pumps until a `Quit` command or the command source closes.
    pub async fn run(
        &mut self,
        mut commands: mpsc::Receiver<ClientCommand>,
        surface: &mut dyn Surface,
    ) -> anyhow::Result<()> {
        self.render(surface);
        while self.pump(&mut commands, surface).await? == Flow::Continue {}
        self.disconnect().await;
        Ok(())
    }

    /// Applies a user command.
    pub async fn execute(
        &mut self,
        command: ClientCommand,
        surface: &mut dyn Surface,
    ) -> anyhow::Result<Flow> {
        match command {
            ClientCommand::Key(event) => {
                if let Some(intent) = self.input.handle(event) {
                    self.send_intent(intent).await;
                }
            }
            ClientCommand::Connect => {
                if let Err(e) = self.connect().await {
                    warn!(error = %format!("{e:#}"), "Connect failed");
                    self.chat.push_system(&format!("Connection failed: {e:#}"));
                }
            }
            ClientCommand::Join { username } => self.join(username).await,
            ClientCommand::Chat(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    self.send_intent(Intent::Chat(text.to_string())).await;
                }
            }
            ClientCommand::UploadAvatar(bytes) => self.upload_avatar(&bytes).await,
            ClientCommand::Resize { width, height } => {
                surface.resize(width, height);
                self.render(surface);
            }
            ClientCommand::Disconnect => self.disconnect().await,
            ClientCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    async fn join(&mut self, username: String) {
        let username = username.trim().to_string();
        if username.is_empty() {
            self.chat.push_system("A name is required to join");
            return;
        }
        self.username = Some(username.clone());
        if self.channel_open() {
            self.state = ClientState::Joining;
        }
        let avatar = self.custom_avatar.clone();
        self.send_intent(Intent::Join { username, avatar }).await;
    }

    async fn upload_avatar(&mut self, bytes: &[u8]) {
        let name = self
            .username
            .clone()
            .unwrap_or_else(|| self.cfg.player_name.clone());
        let appearance = match appearance_from_upload(&name, bytes) {
            Ok(appearance) => appearance,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Avatar upload rejected");
                self.chat.push_system(&format!("Avatar upload failed: {e:#}"));
                return;
            }
        };
        info!(avatar = %appearance.name, "Custom avatar ready");
        self.custom_avatar = Some(appearance);
        self.chat.push_system("Avatar updated");

        // A new avatar is only picked up through a full re-join.
        if self.channel_open() {
            if let Some(username) = self.username.clone() {
                self.join(username).await;
            }
        }
    }

    /// Closes the channel. Held keys are forgotten.
    pub async fn disconnect(&mut self) {
        if let Some(mut conn) = self.channel.take() {
            conn.disconnect().await;
            self.chat.push_system("Disconnected");
        }
        self.input.reset();
        self.state = ClientState::Disconnected;
    }

    fn channel_open(&self) -> bool {
        self.channel.as_ref().is_some_and(Connection::is_open)
    }

    /// Sends an intent, dropping it when there is no open channel.
    async fn send_intent(&mut self, intent: Intent) {
        let Some(conn) = self.channel.as_mut() else {
            debug!(?intent, "Not connected, dropping intent");
            return;
        };
        match conn.send(&intent.to_msg()).await {
            Ok(true) => {}
            Ok(false) => debug!(?intent, "Channel closed, dropping intent"),
            Err(e) => {
                let reason = format!("{e:#}");
                self.on_closed(Some(reason));
            }
        }
    }

    fn handle_channel_event(&mut self, event: ChannelEvent) -> bool {
        match event {
            ChannelEvent::Message(msg) => self.handle_server_msg(msg),
            // Already logged by the reader; state is untouched.
            ChannelEvent::Malformed { .. } => false,
            ChannelEvent::Closed { reason } => {
                self.on_closed(reason);
                false
            }
        }
    }

    fn on_closed(&mut self, reason: Option<String>) {
        self.channel = None;
        self.input.reset();
        self.state = ClientState::Disconnected;
        match reason {
            Some(reason) => {
                warn!(reason = %reason, "Connection closed");
                self.chat
                    .push_system(&format!("Connection closed: {reason}"));
            }
            None => {
                warn!("Connection closed");
                self.chat.push_system("Connection closed");
            }
        }
    }

    /// Applies one inbound message. Returns whether the view changed.
    pub fn handle_server_msg(&mut self, msg: ServerMsg) -> bool {
        match msg {
            ServerMsg::JoinGame {
                success: true,
                player_id: Some(player_id),
                players,
                avatars,
                ..
            } => {
                let players = players.unwrap_or_default();
                let avatars = avatars.unwrap_or_default();
                info!(player = %player_id, players = players.len(), "Joined world");

                self.effects.retain(|id| players.contains_key(id));
                self.world.apply_full_roster(player_id, players, avatars);
                for appearance in self.world.appearances() {
                    self.assets.ensure_loaded(appearance);
                }
                self.state = ClientState::Joined;
                let name = self
                    .world
                    .local_player()
                    .map(|p| p.username.clone())
                    .or_else(|| self.username.clone())
                    .unwrap_or_default();
                self.chat.push_system(&format!("Joined as {name}"));
                true
            }
            ServerMsg::JoinGame {
                success: true,
                player_id: None,
                ..
            } => {
                warn!("Join acknowledged without a player id");
                self.join_rejected("missing player id");
                false
            }
            ServerMsg::JoinGame {
                success: false,
                error,
                ..
            } => {
                let error = error.unwrap_or_else(|| "unknown error".to_string());
                warn!(error = %error, "Join rejected");
                self.join_rejected(&error);
                false
            }
            ServerMsg::PlayersMoved { players } => {
                self.world.apply_partial_update(players);
                true
            }
            ServerMsg::PlayerJoined { player, avatar } => {
                self.player_joined(player, avatar);
                true
            }
            ServerMsg::PlayerLeft { player_id } => {
                self.effects.clear(&player_id);
                match self.world.remove_entity(&player_id) {
                    Some(player) => {
                        info!(player = %player_id, "Player left");
                        self.chat
                            .push_system(&format!("{} left", player.username));
                        true
                    }
                    None => false,
                }
            }
            ServerMsg::Emote { player_id, emote } => {
                if !self.world.contains(&player_id) {
                    debug!(player = %player_id, "Emote for unknown player");
                    return false;
                }
                self.effects.trigger(player_id, &emote, self.clock.now());
                true
            }
            ServerMsg::Chat { username, message } => {
                let kind = if self.username.as_deref() == Some(username.as_str()) {
                    ChatKind::Own
                } else {
                    ChatKind::Other
                };
                info!(from = %username, "{message}");
                self.chat.push(ChatEntry::new(&username, &message, kind));
                false
            }
            ServerMsg::Unknown => {
                debug!("Ignoring unknown action");
                false
            }
        }
    }

    fn join_rejected(&mut self, error: &str) {
        self.state = if self.world.is_joined() {
            ClientState::Joined
        } else if self.channel_open() {
            ClientState::Connected
        } else {
            ClientState::Disconnected
        };
        self.chat.push_system(&format!("Join failed: {error}"));
    }

    fn player_joined(&mut self, player: Player, avatar: Option<Appearance>) {
        let is_self = self.world.local_id() == Some(&player.id);
        let avatar_name = player.avatar.clone();
        if !is_self {
            self.chat
                .push_system(&format!("{} joined", player.username));
        }
        info!(player = %player.id, name = %player.username, "Player joined");

        self.world.add_entity(player, avatar);
        if let Some(appearance) = avatar_name.and_then(|n| self.world.appearance(&n)) {
            self.assets.ensure_loaded(appearance);
        }
    }

    /// Recomputes the camera and paints one frame.
    pub fn render(&mut self, surface: &mut dyn Surface) {
        let (width, height) = surface.size();
        self.camera.recompute(
            width,
            height,
            self.world.local_position(),
            self.cfg.world_size,
        );
        render_frame(
            &self.world,
            &self.camera,
            &self.effects,
            &self.assets,
            self.clock.now(),
            surface,
        );
        self.frames_rendered += 1;
    }

    pub fn config(&self) -> &ClientConfig {
        &self.cfg
    }

    pub fn world(&self) -> &WorldState {
        &self.world
    }

    pub fn effects(&self) -> &EffectTracker {
        &self.effects
    }

    pub fn assets(&self) -> &AssetCache {
        &self.assets
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn chat(&self) -> &ChatLog {
        &self.chat
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn custom_avatar(&self) -> Option<&Appearance> {
        self.custom_avatar.as_ref()
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    pub fn channel_status(&self) -> ChannelStatus {
        self.channel
            .as_ref()
            .map_or(ChannelStatus::Closed { reason: None }, Connection::status)
    }

    pub fn local_id(&self) -> Option<&PlayerId> {
        self.world.local_id()
    }
}

async fn next_channel_event(channel: &mut Option<Connection>) -> Option<ChannelEvent> {
    match channel {
        Some(conn) => conn.next_event().await,
        None => future::pending().await,
    }
}
