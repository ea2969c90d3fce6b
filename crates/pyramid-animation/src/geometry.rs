//! Pyramid vertex data and its GPU buffer.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

/// Interleaved vertex record (20 bytes):
///
///  offset  0  position    [f32; 3]   loc 0
///  offset 12  tex_coords  [f32; 2]   loc 2
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
}

pub const POSITION_LOCATION: u32 = 0;
pub const TEX_COORDS_LOCATION: u32 = 2;

impl Vertex {
    pub const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x3, // position
        2 => Float32x2  // tex_coords
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

const fn v(position: [f32; 3], tex_coords: [f32; 2]) -> Vertex {
    Vertex { position, tex_coords }
}

const APEX: [f32; 3] = [0.0, 1.0, 0.0];
const APEX_UV: [f32; 2] = [0.5, 1.0];

/// Four side faces (one triangle each) and the base (two triangles).
pub const PYRAMID_VERTICES: [Vertex; 18] = [
    // left
    v(APEX, APEX_UV),
    v([-0.5, 0.0, 0.5], [1.0, 0.0]),
    v([-0.5, 0.0, -0.5], [0.0, 0.0]),
    // back
    v(APEX, APEX_UV),
    v([-0.5, 0.0, -0.5], [1.0, 0.0]),
    v([0.5, 0.0, -0.5], [0.0, 0.0]),
    // right
    v(APEX, APEX_UV),
    v([0.5, 0.0, -0.5], [1.0, 0.0]),
    v([0.5, 0.0, 0.5], [0.0, 0.0]),
    // front
    v(APEX, APEX_UV),
    v([-0.5, 0.0, 0.5], [0.0, 0.0]),
    v([0.5, 0.0, 0.5], [1.0, 0.0]),
    // base
    v([-0.5, 0.0, 0.5], [0.0, 1.0]),
    v([-0.5, 0.0, -0.5], [0.0, 0.0]),
    v([0.5, 0.0, 0.5], [1.0, 1.0]),
    v([-0.5, 0.0, -0.5], [0.0, 0.0]),
    v([0.5, 0.0, -0.5], [1.0, 0.0]),
    v([0.5, 0.0, 0.5], [1.0, 1.0]),
];

pub const VERTEX_COUNT: u32 = PYRAMID_VERTICES.len() as u32;

/// Static vertex buffer holding `PYRAMID_VERTICES`.
///
/// Never written after creation. `release` destroys the GPU allocation
/// without waiting for the handle to drop.
pub struct PyramidMesh {
    vbo: wgpu::Buffer,
    vertex_count: u32,
}

impl PyramidMesh {
    pub fn upload(device: &wgpu::Device) -> Self {
        let vbo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("pyramid vbo"),
            contents: bytemuck::cast_slice(&PYRAMID_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        log::info!(
            "uploaded {VERTEX_COUNT} vertices ({} bytes)",
            std::mem::size_of_val(&PYRAMID_VERTICES)
        );

        Self {
            vbo,
            vertex_count: VERTEX_COUNT,
        }
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.vbo
    }

    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn release(&self) {
        self.vbo.destroy();
    }
}

#[cfg(test)]
mod tests {
    use std::mem::{offset_of, size_of};

    use super::*;

    #[test]
    fn eighteen_vertices() {
        assert_eq!(PYRAMID_VERTICES.len(), 18);
        assert_eq!(VERTEX_COUNT, 18);
    }

    #[test]
    fn interleaved_layout() {
        assert_eq!(size_of::<Vertex>(), 20);
        assert_eq!(offset_of!(Vertex, position), 0);
        assert_eq!(offset_of!(Vertex, tex_coords), 12);

        let layout = Vertex::layout();
        assert_eq!(layout.array_stride, 20);
        assert_eq!(layout.step_mode, wgpu::VertexStepMode::Vertex);
    }

    #[test]
    fn attributes_match_shader_locations() {
        let [pos, uv] = Vertex::ATTRS;
        assert_eq!(pos.shader_location, POSITION_LOCATION);
        assert_eq!(pos.offset, 0);
        assert_eq!(pos.format, wgpu::VertexFormat::Float32x3);

        assert_eq!(uv.shader_location, TEX_COORDS_LOCATION);
        assert_eq!(uv.offset, 12);
        assert_eq!(uv.format, wgpu::VertexFormat::Float32x2);
    }

    #[test]
    fn byte_image_is_five_floats_per_vertex() {
        let floats: &[f32] = bytemuck::cast_slice(&PYRAMID_VERTICES);
        assert_eq!(floats.len(), 18 * 5);
        // Second vertex of the left face.
        assert_eq!(&floats[5..10], &[-0.5, 0.0, 0.5, 1.0, 0.0]);
    }

    #[test]
    fn side_faces_share_the_apex() {
        for face in PYRAMID_VERTICES[..12].chunks(3) {
            assert_eq!(face[0].position, APEX);
            assert_eq!(face[0].tex_coords, APEX_UV);
        }
    }

    #[test]
    fn base_lies_on_the_ground_plane() {
        assert!(PYRAMID_VERTICES[12..].iter().all(|v| v.position[1] == 0.0));
    }

    #[test]
    fn texture_coordinates_are_normalized() {
        for v in &PYRAMID_VERTICES {
            assert!(v.tex_coords.iter().all(|c| (0.0..=1.0).contains(c)));
        }
    }
}
