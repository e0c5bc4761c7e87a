//! World data types shared by the protocol and the client stores.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::math::Vec2;

/// Identifies a player for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn new(id: impl Into<String>) -> Self {
        PlayerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        PlayerId(s.to_string())
    }
}

/// Facing direction of a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    #[default]
    South,
    East,
    West,
}

impl Direction {
    /// Directions that carry their own frame sequence. West mirrors east.
    pub const STORED: [Direction; 3] = [Direction::North, Direction::South, Direction::East];

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::North => "north",
            Direction::South => "south",
            Direction::East => "east",
            Direction::West => "west",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A participant in the shared world, as last pushed by the authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub username: String,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub facing: Direction,
    #[serde(default)]
    pub animation_frame: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl Player {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// Frame image sources per stored direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct DirectionFrames {
    #[serde(default)]
    pub north: Vec<String>,
    #[serde(default)]
    pub south: Vec<String>,
    #[serde(default)]
    pub east: Vec<String>,
}

impl DirectionFrames {
    /// Frames for a stored direction. West is never stored and yields an empty slice.
    pub fn get(&self, direction: Direction) -> &[String] {
        match direction {
            Direction::North => &self.north,
            Direction::South => &self.south,
            Direction::East => &self.east,
            Direction::West => &[],
        }
    }

    /// The same frame list replicated across every stored direction.
    pub fn uniform(frames: Vec<String>) -> Self {
        Self {
            north: frames.clone(),
            south: frames.clone(),
            east: frames,
        }
    }
}

/// Named avatar definition. Immutable once received.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Appearance {
    pub name: String,
    #[serde(default)]
    pub frames: DirectionFrames,
}

impl Appearance {
    /// Iterates `(direction, frame index, source)` over every stored frame.
    pub fn sources(&self) -> impl Iterator<Item = (Direction, usize, &str)> + '_ {
        Direction::STORED.into_iter().flat_map(move |dir| {
            self.frames
                .get(dir)
                .iter()
                .enumerate()
                .map(move |(i, src)| (dir, i, src.as_str()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_defaults_missing_fields() {
        let p: Player =
            serde_json::from_str(r#"{"id":"p1","username":"ann","x":10,"y":20.5}"#).unwrap();
        assert_eq!(p.facing, Direction::South);
        assert_eq!(p.animation_frame, 0);
        assert_eq!(p.avatar, None);
        assert_eq!(p.position(), Vec2::new(10.0, 20.5));
    }

    #[test]
    fn player_reads_camel_case_fields() {
        let p: Player = serde_json::from_str(
            r#"{"id":"p1","username":"ann","x":0,"y":0,"facing":"west","animationFrame":2,"avatar":"knight"}"#,
        )
        .unwrap();
        assert_eq!(p.facing, Direction::West);
        assert_eq!(p.animation_frame, 2);
        assert_eq!(p.avatar.as_deref(), Some("knight"));
    }

    #[test]
    fn appearance_sources_skip_west() {
        let a = Appearance {
            name: "knight".into(),
            frames: DirectionFrames {
                north: vec!["n0".into()],
                south: vec!["s0".into(), "s1".into()],
                east: vec!["e0".into()],
            },
        };
        let all: Vec<_> = a.sources().collect();
        assert_eq!(
            all,
            vec![
                (Direction::North, 0, "n0"),
                (Direction::South, 0, "s0"),
                (Direction::South, 1, "s1"),
                (Direction::East, 0, "e0"),
            ]
        );
        assert!(a.frames.get(Direction::West).is_empty());
    }
}
