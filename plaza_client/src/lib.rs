//! `plaza_client`
//!
//! Client-side systems:
//! - World state mirrored from the authority's broadcasts
//! - Emote effects with timed expiry
//! - Camera following the local player
//! - Asynchronous sprite and background loading
//! - Frame rendering onto a pluggable surface
//! - Keyboard input mapped to movement and emote intents

pub mod assets;
pub mod camera;
pub mod client;
pub mod console;
pub mod effects;
pub mod input;
pub mod raster;
pub mod renderer;
pub mod upload;
pub mod world;

pub use client::WorldClient;
