//! Pyramid engine crate.
//!
//! This crate owns the platform + GPU runtime pieces: the winit window loop,
//! the wgpu device/surface, frame timing and logging. Applications plug in
//! through `core::App`.

pub mod core;
pub mod coords;
pub mod device;
pub mod logging;
pub mod render;
pub mod time;
pub mod window;
