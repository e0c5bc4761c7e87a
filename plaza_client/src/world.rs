//! World state store.
//!
//! Caches the latest known state pushed by the authority: every player, every
//! appearance they reference, and which player is us. Updates replace whole
//! entities; nothing is validated or merged field by field.

use std::collections::{BTreeMap, HashMap};

use plaza_shared::{
    math::Vec2,
    model::{Appearance, Player, PlayerId},
};
use tracing::debug;

#[derive(Debug, Default, Clone)]
pub struct WorldState {
    local_id: Option<PlayerId>,
    players: BTreeMap<PlayerId, Player>,
    appearances: HashMap<String, Appearance>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces identity, players and appearances with a full snapshot.
    pub fn apply_full_roster(
        &mut self,
        self_id: PlayerId,
        players: BTreeMap<PlayerId, Player>,
        appearances: HashMap<String, Appearance>,
    ) {
        debug!(local = %self_id, players = players.len(), avatars = appearances.len(), "Full roster");
        self.local_id = Some(self_id);
        self.players = players;
        self.appearances = appearances;
    }

    /// Overwrites each listed player wholesale; unknown ids are inserted.
    pub fn apply_partial_update(&mut self, players: BTreeMap<PlayerId, Player>) {
        self.players.extend(players);
    }

    /// Inserts a player and registers its appearance if it is new.
    pub fn add_entity(&mut self, player: Player, appearance: Option<Appearance>) {
        if let Some(appearance) = appearance {
            self.appearances
                .entry(appearance.name.clone())
                .or_insert(appearance);
        }
        self.players.insert(player.id.clone(), player);
    }

    /// Removes a player. Returns it if it was present.
    pub fn remove_entity(&mut self, id: &PlayerId) -> Option<Player> {
        self.players.remove(id)
    }

    /// Position of the local player, if joined and present.
    pub fn local_position(&self) -> Option<Vec2> {
        self.local_player().map(Player::position)
    }

    pub fn local_id(&self) -> Option<&PlayerId> {
        self.local_id.as_ref()
    }

    pub fn local_player(&self) -> Option<&Player> {
        self.local_id.as_ref().and_then(|id| self.players.get(id))
    }

    pub fn is_joined(&self) -> bool {
        self.local_id.is_some()
    }

    pub fn player(&self, id: &PlayerId) -> Option<&Player> {
        self.players.get(id)
    }

    /// Players in stable id order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn contains(&self, id: &PlayerId) -> bool {
        self.players.contains_key(id)
    }

    pub fn appearance(&self, name: &str) -> Option<&Appearance> {
        self.appearances.get(name)
    }

    pub fn appearances(&self) -> impl Iterator<Item = &Appearance> {
        self.appearances.values()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plaza_shared::model::{Direction, DirectionFrames};

    fn player(id: &str, x: f32, y: f32) -> Player {
        Player {
            id: id.into(),
            username: format!("user-{id}"),
            x,
            y,
            facing: Direction::South,
            animation_frame: 0,
            avatar: Some("knight".into()),
        }
    }

    fn knight() -> Appearance {
        Appearance {
            name: "knight".into(),
            frames: DirectionFrames::uniform(vec!["k.png".into()]),
        }
    }

    fn roster(ids: &[&str]) -> BTreeMap<PlayerId, Player> {
        ids.iter()
            .enumerate()
            .map(|(i, id)| (PlayerId::from(*id), player(id, i as f32 * 10.0, 5.0)))
            .collect()
    }

    #[test]
    fn local_position_absent_before_join() {
        let world = WorldState::new();
        assert_eq!(world.local_position(), None);
        assert!(!world.is_joined());
    }

    #[test]
    fn local_position_absent_when_self_missing_from_table() {
        let mut world = WorldState::new();
        world.apply_full_roster("me".into(), roster(&["a", "b"]), HashMap::new());
        assert!(world.is_joined());
        assert_eq!(world.local_position(), None);
    }

    #[test]
    fn full_roster_replaces_everything() {
        let mut world = WorldState::new();
        world.apply_full_roster("a".into(), roster(&["a", "b", "c"]), HashMap::new());
        world.apply_full_roster(
            "z".into(),
            roster(&["z"]),
            HashMap::from([("knight".to_string(), knight())]),
        );
        assert_eq!(world.len(), 1);
        assert_eq!(world.local_id(), Some(&PlayerId::from("z")));
        assert!(world.appearance("knight").is_some());
        assert!(!world.contains(&"a".into()));
    }

    #[test]
    fn partial_update_touches_only_listed_players() {
        let mut world = WorldState::new();
        world.apply_full_roster("a".into(), roster(&["a", "b", "c"]), HashMap::new());
        let before_b = world.player(&"b".into()).cloned();
        let before_c = world.player(&"c".into()).cloned();

        let mut moved = player("a", 99.0, 42.0);
        moved.facing = Direction::West;
        world.apply_partial_update(BTreeMap::from([(PlayerId::from("a"), moved.clone())]));

        assert_eq!(world.player(&"a".into()), Some(&moved));
        assert_eq!(world.player(&"b".into()).cloned(), before_b);
        assert_eq!(world.player(&"c".into()).cloned(), before_c);
        assert_eq!(world.local_position(), Some(Vec2::new(99.0, 42.0)));
    }

    #[test]
    fn partial_update_replaces_whole_entity() {
        let mut world = WorldState::new();
        world.apply_full_roster("a".into(), roster(&["a"]), HashMap::new());

        let mut bare = player("a", 1.0, 1.0);
        bare.avatar = None;
        world.apply_partial_update(BTreeMap::from([(PlayerId::from("a"), bare)]));

        assert_eq!(world.player(&"a".into()).unwrap().avatar, None);
    }

    #[test]
    fn partial_update_inserts_unknown_ids() {
        let mut world = WorldState::new();
        world.apply_partial_update(roster(&["x"]));
        assert!(world.contains(&"x".into()));
    }

    #[test]
    fn add_entity_keeps_first_appearance_definition() {
        let mut world = WorldState::new();
        world.add_entity(player("a", 0.0, 0.0), Some(knight()));

        let mut other = knight();
        other.frames = DirectionFrames::uniform(vec!["other.png".into()]);
        world.add_entity(player("b", 0.0, 0.0), Some(other));

        assert_eq!(world.len(), 2);
        assert_eq!(world.appearance("knight"), Some(&knight()));
    }

    #[test]
    fn remove_entity_is_noop_when_absent() {
        let mut world = WorldState::new();
        world.add_entity(player("a", 0.0, 0.0), None);
        assert!(world.remove_entity(&"ghost".into()).is_none());
        assert!(world.remove_entity(&"a".into()).is_some());
        assert!(world.is_empty());
    }
}
