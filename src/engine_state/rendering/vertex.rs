//! Vertex data structures and layouts for voxel rendering.
//!
//! This module defines the vertex format produced by the mesher and uploaded to
//! the GPU, together with the `wgpu` layout describing it to a render pipeline.

use cgmath::Point3;

/// Marker stored in [`Vertex::side`] for crossed-quad geometry, which has no face normal.
pub const CROSS_QUAD_SIDE: u32 = 6;

/// One corner of a section quad, 28 bytes.
///
/// Positions are section-local; the renderer adds the section's world origin.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    /// X coordinate in section space
    x: i32,
    /// Y coordinate in section space
    y: i32,
    /// Z coordinate in section space
    z: i32,
    /// Index of the texture in the texture array
    texture_index: u32,
    /// UV texture coordinates, in voxels so textures repeat across merged faces
    tex_coords: [f32; 2],
    /// `BlockSide` of the face, or [`CROSS_QUAD_SIDE`]
    side: u32,
}

impl Vertex {
    /// Creates a new vertex with the given parameters.
    ///
    /// # Arguments
    /// * `pos` - The position of the vertex in section space
    /// * `texture_index` - Index of the texture in the texture array
    /// * `u` - U texture coordinate in voxels
    /// * `v` - V texture coordinate in voxels
    /// * `side` - Face the vertex belongs to
    pub fn new(pos: Point3<i32>, texture_index: u32, u: u32, v: u32, side: u32) -> Self {
        Vertex {
            x: pos.x,
            y: pos.y,
            z: pos.z,
            texture_index,
            tex_coords: [u as f32, v as f32],
            side,
        }
    }

    /// Position of the vertex in section space.
    pub fn position(&self) -> Point3<i32> {
        Point3::new(self.x, self.y, self.z)
    }

    /// Texture layer sampled by this vertex.
    pub fn texture_index(&self) -> u32 {
        self.texture_index
    }

    /// Layout of [`Vertex`] for a render pipeline reading the uploaded buffers.
    ///
    /// # Shader Attributes
    /// - `location = 0`: section-local position (`vec3<i32>`)
    /// - `location = 1`: texture layer (`u32`)
    /// - `location = 2`: texture coordinates in voxels (`vec2<f32>`)
    /// - `location = 3`: face side (`u32`)
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &VERTEX_ATTRIBUTES,
        }
    }
}

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 4] =
    wgpu::vertex_attr_array![0 => Sint32x3, 1 => Uint32, 2 => Float32x2, 3 => Uint32];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_struct_size() {
        assert_eq!(std::mem::size_of::<Vertex>(), 28);
        assert_eq!(Vertex::desc().array_stride, 28);
        let attributes = Vertex::desc().attributes;
        assert_eq!(attributes.len(), 4);
        assert_eq!(attributes[2].offset, 16);
        assert_eq!(attributes[3].offset, 24);
    }
}
