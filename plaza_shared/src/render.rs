//! Rendering abstraction.
//!
//! The renderer paints through [`Surface`]; backends decide how pixels or
//! draw commands end up on screen. [`DrawList`] records commands and is the
//! sink used by headless tests.

use std::sync::Arc;

use image::RgbaImage;

use crate::math::{Affine2, Rect, Vec2};

/// Decoded image shared between the asset cache and surfaces.
pub type Image = Arc<RgbaImage>;

/// RGBA color, 8 bits per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const WHITE: Color = Color([255, 255, 255, 255]);
    pub const BLACK: Color = Color([0, 0, 0, 255]);
    pub const TRANSPARENT: Color = Color([0, 0, 0, 0]);
}

/// Horizontal anchoring of text relative to its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    Left,
    #[default]
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub size_px: f32,
    pub fill: Color,
    /// Stroke drawn around glyphs; `None` for plain text.
    pub outline: Option<(Color, f32)>,
    pub align: TextAlign,
    pub alpha: f32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            size_px: 12.0,
            fill: Color::WHITE,
            outline: None,
            align: TextAlign::Center,
            alpha: 1.0,
        }
    }
}

/// A 2D paint target.
pub trait Surface {
    /// Current size in pixels.
    fn size(&self) -> (u32, u32);
    fn resize(&mut self, width: u32, height: u32);
    fn clear(&mut self);
    /// Draws the `src` region of `image` into `dst`, with `transform` applied
    /// to destination coordinates.
    fn draw_image(&mut self, image: &Image, src: Rect, dst: Rect, transform: Affine2, alpha: f32);
    fn draw_text(&mut self, text: &str, at: Vec2, style: TextStyle);
}

/// A recorded surface operation.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCmd {
    Clear,
    Image {
        image: Image,
        src: Rect,
        dst: Rect,
        transform: Affine2,
        alpha: f32,
    },
    Text {
        text: String,
        at: Vec2,
        style: TextStyle,
    },
}

/// Surface that records every call.
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    width: u32,
    height: u32,
    pub commands: Vec<DrawCmd>,
}

impl DrawList {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            commands: Vec::new(),
        }
    }

    pub fn images(&self) -> impl Iterator<Item = &DrawCmd> {
        self.commands
            .iter()
            .filter(|c| matches!(c, DrawCmd::Image { .. }))
    }

    pub fn texts(&self) -> impl Iterator<Item = (&str, Vec2, &TextStyle)> {
        self.commands.iter().filter_map(|c| match c {
            DrawCmd::Text { text, at, style } => Some((text.as_str(), *at, style)),
            _ => None,
        })
    }
}

impl Surface for DrawList {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    fn clear(&mut self) {
        self.commands.clear();
        self.commands.push(DrawCmd::Clear);
    }

    fn draw_image(&mut self, image: &Image, src: Rect, dst: Rect, transform: Affine2, alpha: f32) {
        self.commands.push(DrawCmd::Image {
            image: image.clone(),
            src,
            dst,
            transform,
            alpha,
        });
    }

    fn draw_text(&mut self, text: &str, at: Vec2, style: TextStyle) {
        self.commands.push(DrawCmd::Text {
            text: text.to_string(),
            at,
            style,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clear_starts_a_new_frame() {
        let mut list = DrawList::new(10, 10);
        list.draw_text("old", Vec2::ZERO, TextStyle::default());
        list.clear();
        list.draw_text("new", Vec2::ZERO, TextStyle::default());
        assert_eq!(list.commands.len(), 2);
        assert_eq!(list.texts().map(|(t, _, _)| t).collect::<Vec<_>>(), vec!["new"]);
    }
}
