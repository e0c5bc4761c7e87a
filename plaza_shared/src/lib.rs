//! `plaza_shared`
//!
//! Shared libraries used by the client and its test harness.
//!
//! Design goals:
//! - Wire types that match the authority's JSON exactly.
//! - Clear separation of concerns (net, model, math, render, chat).
//! - Traits at the seams (`Surface`, `Clock`) for headless testing.
//! - No `unsafe`.

pub mod chat;
pub mod clock;
pub mod config;
pub mod math;
pub mod model;
pub mod net;
pub mod render;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::chat::*;
    pub use crate::clock::*;
    pub use crate::config::*;
    pub use crate::math::*;
    pub use crate::model::*;
    pub use crate::net::*;
    pub use crate::render::*;
}
