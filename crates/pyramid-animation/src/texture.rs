//! Texture loading: decode, mip chain generation, upload.

use std::path::Path;

use image::imageops::FilterType;
use image::{DynamicImage, RgbImage, RgbaImage};

use pyramid_engine::render::RenderCtx;

use crate::error::TextureError;

pub const TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

/// Decodes `path` as 8-bit RGB.
///
/// A missing or undecodable file is an error, never an empty texture.
pub fn decode_rgb(path: &Path) -> Result<RgbImage, TextureError> {
    let image = image::open(path).map_err(|source| TextureError::Load {
        path: path.to_path_buf(),
        source,
    })?;

    let rgb = image.into_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(TextureError::Empty {
            path: path.to_path_buf(),
            width: rgb.width(),
            height: rgb.height(),
        });
    }

    Ok(rgb)
}

/// Number of levels in a full chain down to 1x1.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    u32::BITS - width.max(height).max(1).leading_zeros()
}

/// Base level followed by successively halved levels, ending at 1x1.
pub fn mip_chain(base: RgbaImage) -> Vec<RgbaImage> {
    let levels = mip_level_count(base.width(), base.height()) as usize;
    let mut chain = Vec::with_capacity(levels);
    chain.push(base);

    while chain.len() < levels {
        let prev = &chain[chain.len() - 1];
        let w = (prev.width() / 2).max(1);
        let h = (prev.height() / 2).max(1);
        let next = image::imageops::resize(prev, w, h, FilterType::Triangle);
        chain.push(next);
    }

    chain
}

/// GPU texture + view + sampler for the pyramid surface.
pub struct PyramidTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    sampler: wgpu::Sampler,
}

impl PyramidTexture {
    /// Decodes `path`, uploads it with a full mip chain and creates a
    /// trilinear sampler. CPU pixels are dropped before returning.
    pub fn load(ctx: &RenderCtx<'_>, path: &Path) -> Result<Self, TextureError> {
        let rgb = decode_rgb(path)?;
        let (width, height) = rgb.dimensions();

        let max = ctx.device.limits().max_texture_dimension_2d;
        if width > max || height > max {
            return Err(TextureError::TooLarge {
                path: path.to_path_buf(),
                width,
                height,
                max,
            });
        }

        // No 3-channel 8-bit GPU format exists; expand to RGBA.
        let chain = mip_chain(DynamicImage::ImageRgb8(rgb).into_rgba8());
        let mip_level_count = chain.len() as u32;

        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("pyramid texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        for (level, img) in chain.iter().enumerate() {
            ctx.queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: level as u32,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                img.as_raw(),
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * img.width()),
                    rows_per_image: Some(img.height()),
                },
                wgpu::Extent3d {
                    width: img.width(),
                    height: img.height(),
                    depth_or_array_layers: 1,
                },
            );
        }
        drop(chain);

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("pyramid sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            ..Default::default()
        });

        log::info!(
            "loaded texture {} ({width}x{height}, {mip_level_count} mip levels)",
            path.display()
        );

        Ok(Self {
            texture,
            view,
            sampler,
        })
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    /// Frees the GPU texture memory without waiting for the handle to drop.
    pub fn release(&self) {
        self.texture.destroy();
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgb, Rgba};

    use super::*;

    // ── decode ────────────────────────────────────────────────────────────

    #[test]
    fn missing_file_names_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snhu.jpg");

        let err = decode_rgb(&path).unwrap_err();
        assert!(matches!(err, TextureError::Load { .. }));
        assert!(err.to_string().contains("snhu.jpg"));
    }

    #[test]
    fn garbage_file_is_a_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not a jpeg").unwrap();

        assert!(matches!(decode_rgb(&path), Err(TextureError::Load { .. })));
    }

    #[test]
    fn decodes_jpeg_as_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snhu.jpg");
        RgbImage::from_pixel(8, 4, Rgb([200, 30, 30])).save(&path).unwrap();

        let rgb = decode_rgb(&path).unwrap();
        assert_eq!(rgb.dimensions(), (8, 4));
        // Lossy codec: stay in the neighbourhood of the source color.
        let Rgb([r, g, b]) = *rgb.get_pixel(3, 2);
        assert!(r > 150 && g < 80 && b < 80);
    }

    #[test]
    fn alpha_is_dropped_on_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alpha.png");
        RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 0])).save(&path).unwrap();

        let rgb = decode_rgb(&path).unwrap();
        assert_eq!(*rgb.get_pixel(0, 0), Rgb([10, 20, 30]));
    }

    // ── mip chain ─────────────────────────────────────────────────────────

    #[test]
    fn level_count_reaches_one_pixel() {
        assert_eq!(mip_level_count(1, 1), 1);
        assert_eq!(mip_level_count(2, 1), 2);
        assert_eq!(mip_level_count(256, 128), 9);
        assert_eq!(mip_level_count(800, 600), 10);
    }

    #[test]
    fn chain_halves_each_level() {
        let chain = mip_chain(RgbaImage::new(800, 600));
        let sizes: Vec<(u32, u32)> = chain.iter().map(|l| l.dimensions()).collect();
        assert_eq!(
            sizes,
            vec![
                (800, 600),
                (400, 300),
                (200, 150),
                (100, 75),
                (50, 37),
                (25, 18),
                (12, 9),
                (6, 4),
                (3, 2),
                (1, 1),
            ]
        );
    }

    #[test]
    fn chain_preserves_flat_color() {
        let chain = mip_chain(RgbaImage::from_pixel(16, 16, Rgba([40, 80, 120, 255])));
        let last = chain.last().unwrap();
        assert_eq!(last.dimensions(), (1, 1));
        assert_eq!(*last.get_pixel(0, 0), Rgba([40, 80, 120, 255]));
    }

    #[test]
    fn single_pixel_has_no_extra_levels() {
        assert_eq!(mip_chain(RgbaImage::new(1, 1)).len(), 1);
    }
}
