//! Configuration system.
//!
//! Loads client configuration from JSON strings (file IO left to app).

use serde::{Deserialize, Serialize};

/// Root client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Authority WebSocket endpoint, e.g. `ws://127.0.0.1:3000/ws`.
    pub server_url: String,
    /// Name sent with `join_game`.
    #[serde(default = "default_player_name")]
    pub player_name: String,
    /// Side length of the square world, in world pixels.
    #[serde(default = "default_world_size")]
    pub world_size: f32,
    #[serde(default = "default_surface_width")]
    pub surface_width: u32,
    #[serde(default = "default_surface_height")]
    pub surface_height: u32,
    /// Image source of the world map, drawn under everything else.
    #[serde(default = "default_background")]
    pub background: Option<String>,
    /// Directory relative image sources are read from.
    #[serde(default = "default_assets_dir")]
    pub assets_dir: String,
    /// When set, relative image sources are fetched from this URL instead.
    #[serde(default)]
    pub asset_base_url: Option<String>,
    /// Interval of the effect expiry tick.
    #[serde(default = "default_effect_poll_ms")]
    pub effect_poll_ms: u64,
}

fn default_player_name() -> String {
    "Player".to_string()
}

fn default_world_size() -> f32 {
    2000.0
}

fn default_surface_width() -> u32 {
    800
}

fn default_surface_height() -> u32 {
    600
}

fn default_background() -> Option<String> {
    Some("map.png".to_string())
}

fn default_assets_dir() -> String {
    "assets".to_string()
}

fn default_effect_poll_ms() -> u64 {
    50
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:3000/ws".to_string(),
            player_name: default_player_name(),
            world_size: default_world_size(),
            surface_width: default_surface_width(),
            surface_height: default_surface_height(),
            background: default_background(),
            assets_dir: default_assets_dir(),
            asset_base_url: None,
            effect_poll_ms: default_effect_poll_ms(),
        }
    }
}

impl ClientConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_server_url_is_required() {
        let cfg = ClientConfig::from_json_str(r#"{"server_url":"ws://example:9/ws"}"#).unwrap();
        assert_eq!(cfg.server_url, "ws://example:9/ws");
        assert_eq!(cfg.world_size, 2000.0);
        assert_eq!(cfg.background.as_deref(), Some("map.png"));
        assert_eq!(cfg.effect_poll_ms, 50);
    }

    #[test]
    fn missing_server_url_is_rejected() {
        assert!(ClientConfig::from_json_str(r#"{"player_name":"ann"}"#).is_err());
    }
}
