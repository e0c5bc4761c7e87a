//! Effect tracker.
//!
//! Emotes are time-bounded overlays bound to a player. Each trigger replaces
//! the player's current effect and schedules a removal exactly
//! [`EFFECT_DURATION_MS`] later. Removals live in a min-heap polled by
//! [`EffectTracker::expire`]; a removal whose token no longer matches the
//! stored effect was superseded and does nothing.

use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap},
};

use plaza_shared::{clock::Millis, model::PlayerId};
use tracing::trace;

/// Lifetime of an effect.
pub const EFFECT_DURATION_MS: Millis = 3_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Effect {
    pub kind: String,
    pub started_at: Millis,
    token: u64,
}

#[derive(Debug, Default)]
pub struct EffectTracker {
    active: HashMap<PlayerId, Effect>,
    // (due, token, player)
    schedule: BinaryHeap<Reverse<(Millis, u64, PlayerId)>>,
    next_token: u64,
}

impl EffectTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts (or restarts) `kind` for `player` at `now`.
    pub fn trigger(&mut self, player: PlayerId, kind: &str, now: Millis) {
        let token = self.next_token;
        self.next_token += 1;
        self.schedule
            .push(Reverse((now + EFFECT_DURATION_MS, token, player.clone())));
        self.active.insert(
            player,
            Effect {
                kind: kind.to_string(),
                started_at: now,
                token,
            },
        );
    }

    /// Removes the player's effect immediately.
    pub fn clear(&mut self, player: &PlayerId) -> bool {
        self.active.remove(player).is_some()
    }

    /// Elapsed fraction of the player's effect in `[0, 1)`, or `None` when
    /// there is no live effect at `now`.
    pub fn progress_of(&self, player: &PlayerId, now: Millis) -> Option<f32> {
        let effect = self.active.get(player)?;
        let elapsed = now.saturating_sub(effect.started_at);
        if elapsed >= EFFECT_DURATION_MS {
            return None;
        }
        Some(elapsed as f32 / EFFECT_DURATION_MS as f32)
    }

    /// Drops the effects of players for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(&PlayerId) -> bool) {
        self.active.retain(|player, _| keep(player));
    }

    pub fn active(&self, player: &PlayerId) -> Option<&Effect> {
        self.active.get(player)
    }

    /// Runs every removal due at or before `now`. Returns the players whose
    /// effect was actually removed.
    pub fn expire(&mut self, now: Millis) -> Vec<PlayerId> {
        let mut removed = Vec::new();
        while let Some(Reverse((due, _, _))) = self.schedule.peek() {
            if *due > now {
                break;
            }
            let Some(Reverse((_, token, player))) = self.schedule.pop() else {
                break;
            };
            let current = self.active.get(&player).map(|e| e.token);
            if current == Some(token) {
                self.active.remove(&player);
                trace!(player = %player, "Effect expired");
                removed.push(player);
            }
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
