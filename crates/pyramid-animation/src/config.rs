//! Application-level settings.
//!
//! Everything here is a compile-time constant of the program; `Default`
//! reproduces them and nothing is read from disk or the command line.

use std::path::PathBuf;

use winit::dpi::LogicalSize;

use pyramid_engine::device::GpuInit;
use pyramid_engine::window::RuntimeConfig;

pub const WINDOW_TITLE: &str = "Pyramid Animation";
pub const WINDOW_WIDTH: u32 = 800;
pub const WINDOW_HEIGHT: u32 = 600;

/// Texture read from the working directory.
pub const TEXTURE_PATH: &str = "snhu.jpg";

#[derive(Debug, Clone, PartialEq)]
pub struct PyramidConfig {
    pub texture_path: PathBuf,
    pub clear_color: wgpu::Color,
    /// Radians of rotation per elapsed millisecond.
    pub rotation_rate: f32,
    /// Uniform model scale.
    pub model_scale: f32,
    /// Camera translation along -Z.
    pub camera_distance: f32,
    pub fov_y_degrees: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Default for PyramidConfig {
    fn default() -> Self {
        Self {
            texture_path: PathBuf::from(TEXTURE_PATH),
            clear_color: wgpu::Color::BLACK,
            rotation_rate: -0.0005,
            model_scale: 2.0,
            camera_distance: 5.0,
            fov_y_degrees: 45.0,
            z_near: 0.1,
            z_far: 100.0,
        }
    }
}

pub fn runtime_config() -> RuntimeConfig {
    RuntimeConfig {
        title: WINDOW_TITLE.to_string(),
        initial_size: LogicalSize::new(WINDOW_WIDTH as f64, WINDOW_HEIGHT as f64),
    }
}

/// Unthrottled presentation with a depth buffer.
pub fn gpu_init() -> GpuInit {
    GpuInit {
        present_mode: wgpu::PresentMode::AutoNoVsync,
        depth_format: Some(wgpu::TextureFormat::Depth32Float),
        ..Default::default()
    }
}
