//! Camera.
//!
//! The camera rectangle is the world-space region shown on the surface. It
//! follows the local player and never leaves `[0, world_size]`. On an axis
//! where the surface is larger than the world there is no valid clamp range;
//! the world is centered on that axis instead, which makes the origin
//! negative.

use plaza_shared::math::{Rect, Vec2};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Camera {
    rect: Rect,
}

impl Camera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn origin(&self) -> Vec2 {
        self.rect.origin()
    }

    /// Recomputes the rectangle. With no focus the previous origin is kept
    /// and only re-clamped to the new size.
    pub fn recompute(
        &mut self,
        surface_width: u32,
        surface_height: u32,
        focus: Option<Vec2>,
        world_size: f32,
    ) -> Rect {
        let width = surface_width as f32;
        let height = surface_height as f32;
        let (want_x, want_y) = match focus {
            Some(p) => (p.x - width / 2.0, p.y - height / 2.0),
            None => (self.rect.x, self.rect.y),
        };
        self.rect = Rect::new(
            clamp_axis(want_x, width, world_size),
            clamp_axis(want_y, height, world_size),
            width,
            height,
        );
        self.rect
    }
}

fn clamp_axis(want: f32, extent: f32, world_size: f32) -> f32 {
    let max = world_size - extent;
    if max < 0.0 {
        max / 2.0
    } else {
        want.clamp(0.0, max)
    }
}
