//! Console commands.
//!
//! The standalone client is driven by text lines. Lines either turn into
//! [`ClientCommand`]s for the client or into local actions the binary
//! answers itself.

use std::path::PathBuf;

use crate::{
    client::ClientCommand,
    input::{Key, KeyEvent},
};

pub const HELP: &[&str] = &[
    "press <key>        - Hold a key (w/a/s/d, arrows, 1-5)",
    "release <key>      - Release a key",
    "tap <key>          - Press and release a key",
    "emote <1-5>        - Show an emote",
    "join [name]        - Join the world",
    "say <message>      - Send a chat message",
    "avatar <file>      - Upload a picture as avatar",
    "resize <w> <h>     - Resize the surface",
    "shot <file.png>    - Save the current frame",
    "status | who | chat",
    "connect | disconnect | quit",
];

/// What a console line asks for.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleAction {
    Commands(Vec<ClientCommand>),
    Avatar(PathBuf),
    Shot(PathBuf),
    Status,
    Who,
    Chat,
    Help,
    Usage(&'static str),
    Unknown(String),
}

/// Parses a console line. `default_name` is used by a bare `join`.
pub fn parse_line(line: &str, default_name: &str) -> ConsoleAction {
    let line = line.trim();
    let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    let one = |c: ClientCommand| ConsoleAction::Commands(vec![c]);

    match cmd {
        "" => ConsoleAction::Commands(Vec::new()),
        "press" | "release" | "tap" if rest.is_empty() => ConsoleAction::Usage("Usage: press|release|tap <key>"),
        "press" => one(ClientCommand::Key(KeyEvent::Down(Key::parse(rest)))),
        "release" => one(ClientCommand::Key(KeyEvent::Up(Key::parse(rest)))),
        "tap" => ConsoleAction::Commands(vec![
            ClientCommand::Key(KeyEvent::Down(Key::parse(rest))),
            ClientCommand::Key(KeyEvent::Up(Key::parse(rest))),
        ]),
        "emote" => match rest.parse::<u8>() {
            Ok(n) if Key::Digit(n).emote().is_some() => {
                one(ClientCommand::Key(KeyEvent::Down(Key::Digit(n))))
            }
            _ => ConsoleAction::Usage("Usage: emote <1-5>"),
        },
        "join" => {
            let username = if rest.is_empty() { default_name } else { rest };
            one(ClientCommand::Join {
                username: username.to_string(),
            })
        }
        "say" if rest.is_empty() => ConsoleAction::Usage("Usage: say <message>"),
        "say" => one(ClientCommand::Chat(rest.to_string())),
        "avatar" if rest.is_empty() => ConsoleAction::Usage("Usage: avatar <file>"),
        "avatar" => ConsoleAction::Avatar(PathBuf::from(rest)),
        "shot" if rest.is_empty() => ConsoleAction::Usage("Usage: shot <file.png>"),
        "shot" => ConsoleAction::Shot(PathBuf::from(rest)),
        "resize" => {
            let mut dims = rest.split_whitespace().map(str::parse::<u32>);
            match (dims.next(), dims.next()) {
                (Some(Ok(width)), Some(Ok(height))) if width > 0 && height > 0 => {
                    one(ClientCommand::Resize { width, height })
                }
                _ => ConsoleAction::Usage("Usage: resize <w> <h>"),
            }
        }
        "connect" => one(ClientCommand::Connect),
        "disconnect" => one(ClientCommand::Disconnect),
        "quit" | "exit" => one(ClientCommand::Quit),
        "status" => ConsoleAction::Status,
        "who" => ConsoleAction::Who,
        "chat" => ConsoleAction::Chat,
        "help" => ConsoleAction::Help,
        other => ConsoleAction::Unknown(other.to_string()),
    }
}
