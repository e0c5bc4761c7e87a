//! Input handling.
//!
//! Raw key events become discrete intents. The authority expects a current
//! direction rather than a vector, so every movement key-down emits a fresh
//! `Move` and only releasing the last held movement key emits `Stop`.
//! Releasing one key while another is still held emits nothing.

use std::collections::HashSet;

use plaza_shared::{
    model::{Appearance, Direction},
    net::ClientMsg,
};

/// A key as reported by the input source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    W,
    A,
    S,
    D,
    Digit(u8),
    Other(String),
}

impl Key {
    /// Parses a key name such as `w`, `ArrowLeft`, `left` or `3`.
    pub fn parse(name: &str) -> Key {
        match name.to_ascii_lowercase().as_str() {
            "arrowup" | "up" => Key::ArrowUp,
            "arrowdown" | "down" => Key::ArrowDown,
            "arrowleft" | "left" => Key::ArrowLeft,
            "arrowright" | "right" => Key::ArrowRight,
            "w" => Key::W,
            "a" => Key::A,
            "s" => Key::S,
            "d" => Key::D,
            other => match other.parse::<u8>() {
                Ok(n) if n <= 9 => Key::Digit(n),
                _ => Key::Other(name.to_string()),
            },
        }
    }

    pub fn direction(&self) -> Option<Direction> {
        match self {
            Key::ArrowUp | Key::W => Some(Direction::North),
            Key::ArrowDown | Key::S => Some(Direction::South),
            Key::ArrowLeft | Key::A => Some(Direction::West),
            Key::ArrowRight | Key::D => Some(Direction::East),
            Key::Digit(_) | Key::Other(_) => None,
        }
    }

    pub fn emote(&self) -> Option<&'static str> {
        match self {
            Key::Digit(n) => EMOTE_KEYS
                .iter()
                .find(|(digit, _)| digit == n)
                .map(|(_, emote)| *emote),
            _ => None,
        }
    }
}

/// Digit shortcuts for emotes.
pub const EMOTE_KEYS: [(u8, &str); 5] = [
    (1, "wave"),
    (2, "heart"),
    (3, "laugh"),
    (4, "thumbsup"),
    (5, "fire"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyEvent {
    Down(Key),
    Up(Key),
}

/// A discrete user action destined for the authority.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    Move(Direction),
    Stop,
    Emote(String),
    Chat(String),
    Join {
        username: String,
        avatar: Option<Appearance>,
    },
}

impl Intent {
    pub fn to_msg(&self) -> ClientMsg {
        match self {
            Intent::Move(direction) => ClientMsg::Move {
                direction: *direction,
            },
            Intent::Stop => ClientMsg::Stop,
            Intent::Emote(emote) => ClientMsg::Emote {
                emote: emote.clone(),
            },
            Intent::Chat(message) => ClientMsg::Chat {
                message: message.clone(),
            },
            Intent::Join { username, avatar } => ClientMsg::JoinGame {
                username: username.clone(),
                avatar: avatar.clone(),
            },
        }
    }
}

/// Tracks held movement keys.
///
/// Keys rather than directions are tracked, so holding `W` and `ArrowUp`
/// and releasing one of them does not stop movement.
#[derive(Debug, Default)]
pub struct InputMapper {
    held: HashSet<Key>,
}

impl InputMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&mut self, event: KeyEvent) -> Option<Intent> {
        match event {
            KeyEvent::Down(key) => self.key_down(key),
            KeyEvent::Up(key) => self.key_up(key),
        }
    }

    pub fn key_down(&mut self, key: Key) -> Option<Intent> {
        if let Some(direction) = key.direction() {
            self.held.insert(key);
            return Some(Intent::Move(direction));
        }
        key.emote().map(|emote| Intent::Emote(emote.to_string()))
    }

    pub fn key_up(&mut self, key: Key) -> Option<Intent> {
        if key.direction().is_none() {
            return None;
        }
        if self.held.remove(&key) && self.held.is_empty() {
            return Some(Intent::Stop);
        }
        None
    }

    pub fn is_moving(&self) -> bool {
        !self.held.is_empty()
    }

    /// Forgets held keys without emitting anything.
    pub fn reset(&mut self) {
        self.held.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(mapper: &mut InputMapper, events: Vec<KeyEvent>) -> Vec<Intent> {
        events.into_iter().filter_map(|e| mapper.handle(e)).collect()
    }

    #[test]
    fn overlapping_keys_only_stop_on_full_release() {
        let mut mapper = InputMapper::new();
        let intents = run(
            &mut mapper,
            vec![
                KeyEvent::Down(Key::ArrowUp),
                KeyEvent::Down(Key::ArrowDown),
                KeyEvent::Up(Key::ArrowDown),
            ],
        );
        assert_eq!(
            intents,
            vec![
                Intent::Move(Direction::North),
                Intent::Move(Direction::South)
            ]
        );
        assert_eq!(mapper.handle(KeyEvent::Up(Key::ArrowUp)), Some(Intent::Stop));
        assert!(!mapper.is_moving());
    }

    #[test]
    fn key_repeat_reemits_move() {
        let mut mapper = InputMapper::new();
        let intents = run(
            &mut mapper,
            vec![KeyEvent::Down(Key::D), KeyEvent::Down(Key::D), KeyEvent::Up(Key::D)],
        );
        assert_eq!(
            intents,
            vec![
                Intent::Move(Direction::East),
                Intent::Move(Direction::East),
                Intent::Stop
            ]
        );
    }

    #[test]
    fn same_direction_on_two_keys_keeps_moving() {
        let mut mapper = InputMapper::new();
        mapper.key_down(Key::W);
        mapper.key_down(Key::ArrowUp);
        assert_eq!(mapper.key_up(Key::W), None);
        assert_eq!(mapper.key_up(Key::ArrowUp), Some(Intent::Stop));
    }

    #[test]
    fn release_without_press_is_ignored() {
        let mut mapper = InputMapper::new();
        assert_eq!(mapper.key_up(Key::A), None);
    }

    #[test]
    fn digits_emit_emotes_and_others_are_ignored() {
        let mut mapper = InputMapper::new();
        assert_eq!(mapper.key_down(Key::Digit(2)), Some(Intent::Emote("heart".into())));
        assert_eq!(mapper.key_down(Key::Digit(9)), None);
        assert_eq!(mapper.key_down(Key::Other("q".into())), None);
        assert_eq!(mapper.key_up(Key::Digit(2)), None);
        assert!(!mapper.is_moving());
    }

    #[test]
    fn parses_key_names() {
        assert_eq!(Key::parse("ArrowLeft"), Key::ArrowLeft);
        assert_eq!(Key::parse("left"), Key::ArrowLeft);
        assert_eq!(Key::parse("S"), Key::S);
        assert_eq!(Key::parse("4"), Key::Digit(4));
        assert_eq!(Key::parse("F1"), Key::Other("F1".into()));
    }

    #[test]
    fn intents_map_to_wire_messages() {
        assert_eq!(
            Intent::Move(Direction::West).to_msg(),
            ClientMsg::Move {
                direction: Direction::West
            }
        );
        assert_eq!(Intent::Stop.to_msg(), ClientMsg::Stop);
        assert_eq!(
            Intent::Chat("hi".into()).to_msg(),
            ClientMsg::Chat {
                message: "hi".into()
            }
        );
    }
}
