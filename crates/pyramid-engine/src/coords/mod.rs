//! Screen-space types shared between the runtime and renderers.
//!
//! Sizes are physical pixels, origin top-left.

mod viewport;

pub use viewport::Viewport;
