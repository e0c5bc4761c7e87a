//! Software surface.
//!
//! Paints into an in-memory RGBA buffer with nearest-neighbour sampling.
//! Text is not rasterised since no font stack is available; use a
//! [`plaza_shared::render::DrawList`] when labels matter.

use std::path::Path;

use anyhow::Context;
use image::{Rgba, RgbaImage};
use plaza_shared::{
    math::{Affine2, Rect, Vec2},
    render::{Color, Image, Surface, TextStyle},
};
use tracing::trace;

pub struct RasterSurface {
    pixels: RgbaImage,
    clear_color: Color,
}

impl RasterSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RgbaImage::from_pixel(width, height, Rgba(Color::BLACK.0)),
            clear_color: Color::BLACK,
        }
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn save_png(&self, path: &Path) -> anyhow::Result<()> {
        self.pixels
            .save(path)
            .with_context(|| format!("save frame to {}", path.display()))
    }
}

fn blend(dst: &mut Rgba<u8>, src: Rgba<u8>, alpha: f32) {
    let a = (src.0[3] as f32 / 255.0) * alpha.clamp(0.0, 1.0);
    if a <= 0.0 {
        return;
    }
    for c in 0..3 {
        let v = src.0[c] as f32 * a + dst.0[c] as f32 * (1.0 - a);
        dst.0[c] = v.round() as u8;
    }
    let out_a = a * 255.0 + dst.0[3] as f32 * (1.0 - a);
    dst.0[3] = out_a.round().min(255.0) as u8;
}

impl Surface for RasterSurface {
    fn size(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.pixels = RgbaImage::from_pixel(width, height, Rgba(self.clear_color.0));
    }

    fn clear(&mut self) {
        let fill = Rgba(self.clear_color.0);
        for p in self.pixels.pixels_mut() {
            *p = fill;
        }
    }

    fn draw_image(&mut self, image: &Image, src: Rect, dst: Rect, transform: Affine2, alpha: f32) {
        if dst.width <= 0.0 || dst.height <= 0.0 || src.width <= 0.0 || src.height <= 0.0 {
            return;
        }
        let Some(inverse) = transform.invert() else {
            return;
        };
        let bounds = transform.bounds(dst);
        let (w, h) = self.pixels.dimensions();
        let x0 = bounds.x.floor().max(0.0) as u32;
        let y0 = bounds.y.floor().max(0.0) as u32;
        let x1 = (bounds.right().ceil().max(0.0) as u32).min(w);
        let y1 = (bounds.bottom().ceil().max(0.0) as u32).min(h);

        for py in y0..y1 {
            for px in x0..x1 {
                let q = inverse.apply(Vec2::new(px as f32 + 0.5, py as f32 + 0.5));
                if q.x < dst.x || q.x >= dst.right() || q.y < dst.y || q.y >= dst.bottom() {
                    continue;
                }
                let u = src.x + (q.x - dst.x) / dst.width * src.width;
                let v = src.y + (q.y - dst.y) / dst.height * src.height;
                if u < 0.0 || v < 0.0 || u >= image.width() as f32 || v >= image.height() as f32 {
                    continue;
                }
                let sample = *image.get_pixel(u as u32, v as u32);
                blend(self.pixels.get_pixel_mut(px, py), sample, alpha);
            }
        }
    }

    fn draw_text(&mut self, text: &str, at: Vec2, _style: TextStyle) {
        trace!(text, x = at.x, y = at.y, "Skipping text on raster surface");
    }
}
