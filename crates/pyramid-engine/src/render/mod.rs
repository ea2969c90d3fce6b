//! Renderer-facing handles.
//!
//! Renderers own their GPU resources (pipelines, buffers, textures) and record
//! into the `RenderTarget` they are handed each frame.

mod ctx;

pub use ctx::{RenderCtx, RenderTarget};
