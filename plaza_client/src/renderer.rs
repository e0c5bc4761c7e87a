//! Renderer.
//!
//! Turns the current world, camera, effects and loaded assets into one frame
//! on a [`Surface`]. Everything except the surface is borrowed immutably, so
//! a pass always observes one consistent snapshot.

use std::f32::consts::PI;

use plaza_shared::{
    clock::Millis,
    math::{Affine2, Rect, Vec2},
    model::{Direction, Player},
    render::{Color, Surface, TextAlign, TextStyle},
};

use crate::{assets::AssetCache, camera::Camera, effects::EffectTracker, world::WorldState};

/// Players further than this outside the surface are not drawn.
pub const CULL_MARGIN: f32 = 50.0;
/// Sprites are scaled to this height, keeping their aspect ratio.
pub const SPRITE_HEIGHT: f32 = 32.0;
const LABEL_GAP: f32 = 4.0;
const EFFECT_GAP: f32 = 18.0;
const BOUNCE_PX: f32 = 5.0;

/// Glyph drawn for an emote type.
pub fn emote_glyph(kind: &str) -> &'static str {
    match kind {
        "wave" => "👋",
        "heart" => "❤️",
        "laugh" => "😂",
        "thumbsup" => "👍",
        "fire" => "🔥",
        _ => "💬",
    }
}

/// Vertical offset (up is positive) and opacity of an effect at `progress`.
pub fn effect_motion(progress: f32) -> (f32, f32) {
    let bounce = (progress * 4.0 * PI).sin() * BOUNCE_PX;
    let alpha = (1.0 - progress).max(0.0);
    (bounce, alpha)
}

/// Paints one frame. With no background loaded the frame stays blank.
pub fn render_frame(
    world: &WorldState,
    camera: &Camera,
    effects: &EffectTracker,
    assets: &AssetCache,
    now: Millis,
    surface: &mut dyn Surface,
) {
    surface.clear();

    let Some(background) = assets.background() else {
        return;
    };

    let (width, height) = surface.size();
    let view = Rect::new(0.0, 0.0, width as f32, height as f32);
    surface.draw_image(background, camera.rect(), view, Affine2::IDENTITY, 1.0);

    // Entities are only shown once joined.
    if world.local_id().is_none() {
        return;
    }

    let origin = camera.origin();
    for player in world.players() {
        let screen = player.position().sub(origin);
        if !view.contains_with_margin(screen, CULL_MARGIN) {
            continue;
        }
        draw_player(player, screen, effects, assets, now, surface);
    }
}

fn draw_player(
    player: &Player,
    screen: Vec2,
    effects: &EffectTracker,
    assets: &AssetCache,
    now: Millis,
    surface: &mut dyn Surface,
) {
    if let Some(avatar) = player.avatar.as_deref() {
        let (direction, transform) = match player.facing {
            Direction::West => (Direction::East, Affine2::mirror_x(screen.x)),
            other => (other, Affine2::IDENTITY),
        };
        let count = assets.frame_count(avatar, direction);
        if count > 0 {
            let index = player.animation_frame as usize % count;
            if let Some(frame) = assets.frame_for(avatar, direction, index) {
                let (fw, fh) = (frame.width() as f32, frame.height() as f32);
                if fw > 0.0 && fh > 0.0 {
                    let width = fw * SPRITE_HEIGHT / fh;
                    let dst = Rect::new(
                        screen.x - width / 2.0,
                        screen.y - SPRITE_HEIGHT / 2.0,
                        width,
                        SPRITE_HEIGHT,
                    );
                    surface.draw_image(frame, Rect::new(0.0, 0.0, fw, fh), dst, transform, 1.0);
                }
            }
        }
    }

    // Layout does not depend on whether the sprite was drawn.
    let label_y = screen.y - SPRITE_HEIGHT / 2.0 - LABEL_GAP;
    surface.draw_text(
        &player.username,
        Vec2::new(screen.x, label_y),
        TextStyle {
            size_px: 12.0,
            fill: Color::WHITE,
            outline: Some((Color::BLACK, 3.0)),
            align: TextAlign::Center,
            alpha: 1.0,
        },
    );

    let Some(progress) = effects.progress_of(&player.id, now) else {
        return;
    };
    let Some(effect) = effects.active(&player.id) else {
        return;
    };
    let (bounce, alpha) = effect_motion(progress);
    surface.draw_text(
        emote_glyph(&effect.kind),
        Vec2::new(screen.x, label_y - EFFECT_GAP - bounce),
        TextStyle {
            size_px: 20.0,
            fill: Color::WHITE,
            outline: None,
            align: TextAlign::Center,
            alpha,
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::tests::{drain, SizedPngSource};
    use plaza_shared::{
        model::{Appearance, DirectionFrames, PlayerId},
        render::{DrawCmd, DrawList},
    };
    use std::{
        collections::{BTreeMap, HashMap},
        sync::Arc,
    };

    const WORLD: f32 = 2000.0;

    fn knight() -> Appearance {
        Appearance {
            name: "knight".into(),
            frames: DirectionFrames {
                north: vec!["10x20".into()],
                south: vec!["16x32".into(), "8x32".into()],
                east: vec!["24x48".into()],
            },
        }
    }

    fn player(id: &str, x: f32, y: f32, facing: Direction) -> Player {
        Player {
            id: id.into(),
            username: id.to_uppercase(),
            x,
            y,
            facing,
            animation_frame: 0,
            avatar: Some("knight".into()),
        }
    }

    struct Scene {
        world: WorldState,
        camera: Camera,
        effects: EffectTracker,
        assets: AssetCache,
        surface: DrawList,
    }

    impl Scene {
        async fn new(players: Vec<Player>, background: bool) -> Self {
            let mut assets = AssetCache::new(Arc::new(SizedPngSource));
            assets.ensure_loaded(&knight());
            if background {
                assets.load_background("64x64");
            }
            drain(&mut assets).await;

            let mut world = WorldState::new();
            let me = players[0].id.clone();
            world.apply_full_roster(
                me,
                players.into_iter().map(|p| (p.id.clone(), p)).collect(),
                HashMap::from([("knight".to_string(), knight())]),
            );
            let mut camera = Camera::new();
            camera.recompute(800, 600, world.local_position(), WORLD);

            Scene {
                world,
                camera,
                effects: EffectTracker::new(),
                assets,
                surface: DrawList::new(800, 600),
            }
        }

        fn render(&mut self, now: Millis) {
            render_frame(
                &self.world,
                &self.camera,
                &self.effects,
                &self.assets,
                now,
                &mut self.surface,
            );
        }

        fn sprites(&self) -> Vec<(Rect, Rect, Affine2)> {
            self.surface
                .images()
                .skip(1)
                .filter_map(|c| match c {
                    DrawCmd::Image {
                        src, dst, transform, ..
                    } => Some((*src, *dst, *transform)),
                    _ => None,
                })
                .collect()
        }
    }

    #[tokio::test]
    async fn blank_without_background() {
        let mut scene = Scene::new(vec![player("a", 1000.0, 1000.0, Direction::South)], false).await;
        scene.render(0);
        assert_eq!(scene.surface.commands, vec![DrawCmd::Clear]);
    }

    #[tokio::test]
    async fn background_only_before_join() {
        let mut scene = Scene::new(vec![player("a", 1000.0, 1000.0, Direction::South)], true).await;
        scene.world = WorldState::new();
        scene.world.apply_partial_update(BTreeMap::from([(
            PlayerId::from("b"),
            player("b", 500.0, 400.0, Direction::South),
        )]));
        scene.render(0);
        assert_eq!(scene.surface.images().count(), 1);
        assert_eq!(scene.surface.texts().count(), 0);
    }

    #[tokio::test]
    async fn background_uses_camera_rect() {
        let mut scene = Scene::new(vec![player("a", 1000.0, 1000.0, Direction::South)], true).await;
        scene.render(0);
        let Some(DrawCmd::Image { src, dst, .. }) = scene.surface.images().next() else {
            panic!("expected background");
        };
        assert_eq!(*src, Rect::new(600.0, 700.0, 800.0, 600.0));
        assert_eq!(*dst, Rect::new(0.0, 0.0, 800.0, 600.0));
    }

    #[tokio::test]
    async fn sprite_scaled_to_base_height_and_centered() {
        let mut scene = Scene::new(vec![player("a", 1000.0, 1000.0, Direction::North)], true).await;
        scene.render(0);
        let sprites = scene.sprites();
        assert_eq!(sprites.len(), 1);
        let (src, dst, transform) = sprites[0];
        assert_eq!(src, Rect::new(0.0, 0.0, 10.0, 20.0));
        // Screen position is (400, 300); 10x20 scales to 16x32.
        assert_eq!(dst, Rect::new(392.0, 284.0, 16.0, 32.0));
        assert!(transform.is_identity());
    }

    #[tokio::test]
    async fn west_mirrors_east_frames_about_screen_x() {
        let mut scene = Scene::new(vec![player("a", 1000.0, 1000.0, Direction::West)], true).await;
        scene.render(0);
        let sprites = scene.sprites();
        let (src, dst, transform) = sprites[0];

        // East frame is 24x48, so the sprite is 16x32.
        assert_eq!(src, Rect::new(0.0, 0.0, 24.0, 48.0));
        assert_eq!(dst, Rect::new(392.0, 284.0, 16.0, 32.0));
        assert_eq!(transform, Affine2::mirror_x(400.0));
        assert_eq!(transform.a, -1.0);
        assert_eq!(transform.e, 800.0);
    }

    #[tokio::test]
    async fn animation_frame_wraps_around_sequence() {
        let mut p = player("a", 1000.0, 1000.0, Direction::South);
        p.animation_frame = 3;
        let mut scene = Scene::new(vec![p], true).await;
        scene.render(0);
        // Index 3 % 2 == 1, the 8x32 frame.
        assert_eq!(scene.sprites()[0].0, Rect::new(0.0, 0.0, 8.0, 32.0));
    }

    #[tokio::test]
    async fn culls_players_far_outside_view() {
        let players = vec![
            player("a", 1000.0, 1000.0, Direction::South),
            // 40px past the left edge: kept.
            player("b", 560.0, 1000.0, Direction::South),
            // 60px past the right edge: culled.
            player("c", 1460.0, 1000.0, Direction::South),
        ];
        let mut scene = Scene::new(players, true).await;
        scene.render(0);
        let labels: Vec<_> = scene.surface.texts().map(|(t, _, _)| t.to_string()).collect();
        assert_eq!(labels, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn missing_avatar_still_draws_label() {
        let mut p = player("a", 1000.0, 1000.0, Direction::South);
        p.avatar = Some("unknown".into());
        let mut scene = Scene::new(vec![p], true).await;
        scene.render(0);
        assert!(scene.sprites().is_empty());
        let (text, at, style) = scene.surface.texts().next().unwrap();
        assert_eq!(text, "A");
        assert_eq!(at, Vec2::new(400.0, 300.0 - 16.0 - 4.0));
        assert!(style.outline.is_some());
    }

    #[tokio::test]
    async fn effect_drawn_above_label_with_fade() {
        let mut scene = Scene::new(vec![player("a", 1000.0, 1000.0, Direction::South)], true).await;
        scene.effects.trigger(PlayerId::from("a"), "heart", 1_000);

        scene.render(1_750);
        let texts: Vec<_> = scene.surface.texts().collect();
        assert_eq!(texts.len(), 2);
        let (glyph, at, style) = texts[1];
        assert_eq!(glyph, "❤️");
        // progress 0.25: sin(pi) == 0, so no bounce.
        assert!((at.y - (280.0 - 18.0)).abs() < 1e-3);
        assert!((style.alpha - 0.75).abs() < 1e-6);

        scene.render(4_000);
        assert_eq!(scene.surface.texts().count(), 1);
    }

    #[test]
    fn unknown_emote_uses_default_glyph() {
        assert_eq!(emote_glyph("wave"), "👋");
        assert_eq!(emote_glyph("dance"), "💬");
    }

    #[test]
    fn bounce_peaks_at_eighth() {
        let (bounce, alpha) = effect_motion(0.125);
        assert!((bounce - 5.0).abs() < 1e-4);
        assert!((alpha - 0.875).abs() < 1e-6);
        assert_eq!(effect_motion(1.0).1, 0.0);
    }
}
