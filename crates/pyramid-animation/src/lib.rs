//! Rotating textured pyramid on top of `pyramid-engine`.
//!
//! Startup order: shader program, vertex buffer, texture; then one planned
//! and encoded frame per redraw until the window closes.

pub mod app;
pub mod config;
pub mod error;
pub mod geometry;
pub mod renderer;
pub mod shader;
pub mod texture;
pub mod transform;

pub use app::PyramidApp;
pub use config::PyramidConfig;
pub use error::{ShaderError, Stage, TextureError};
