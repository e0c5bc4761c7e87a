//! Custom avatar upload.
//!
//! A single uploaded picture becomes a complete, if static, avatar: it is
//! downsampled to a 32x32 square and the same frame fills every slot of every
//! stored direction.

use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    io::Cursor,
};

use anyhow::Context;
use image::{imageops::FilterType, ImageFormat};
use plaza_shared::model::{Appearance, DirectionFrames};

use crate::assets::encode_data_url;

/// Edge length of uploaded avatars.
pub const UPLOAD_SIZE: u32 = 32;
/// Frame slots filled per direction.
pub const UPLOAD_FRAMES: usize = 3;

/// Builds an appearance from raw image bytes. The name is derived from the
/// username and the picture so a new upload never collides with a cached one.
pub fn appearance_from_upload(username: &str, bytes: &[u8]) -> anyhow::Result<Appearance> {
    let img = image::load_from_memory(bytes).context("decode uploaded avatar")?;
    let small = img.resize_exact(UPLOAD_SIZE, UPLOAD_SIZE, FilterType::Triangle);

    let mut png = Cursor::new(Vec::new());
    small
        .to_rgba8()
        .write_to(&mut png, ImageFormat::Png)
        .context("encode avatar png")?;
    let png = png.into_inner();
    let url = encode_data_url("image/png", &png);

    let mut hasher = DefaultHasher::new();
    png.hash(&mut hasher);
    let name = format!("custom-{username}-{:08x}", hasher.finish() as u32);

    Ok(Appearance {
        name,
        frames: DirectionFrames::uniform(vec![url; UPLOAD_FRAMES]),
    })
}
