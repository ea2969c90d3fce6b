use winit::dpi::PhysicalSize;

/// Window dimensions in physical pixels.
///
/// Written by the resize handler, read by projection and viewport setup.
/// A zero extent is representable (minimized window); consumers go through
/// `aspect_ratio` / `is_renderable` instead of dividing directly.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    #[inline]
    pub fn is_renderable(self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Width over height, with each extent clamped to at least one pixel.
    #[inline]
    pub fn aspect_ratio(self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }

    /// Extents as floats, for render-pass viewport commands.
    #[inline]
    pub fn extent_f32(self) -> (f32, f32) {
        (self.width as f32, self.height as f32)
    }
}

impl From<PhysicalSize<u32>> for Viewport {
    fn from(size: PhysicalSize<u32>) -> Self {
        Self::new(size.width, size.height)
    }
}
