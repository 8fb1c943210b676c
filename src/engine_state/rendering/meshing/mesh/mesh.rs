//! Geometry buffers produced by the mesher.
//!
//! [`MeshData`] is a flat vertex/index pair for one material pass. Every quad
//! contributes four vertices and six indices, so buffers can be sized and
//! uploaded without further processing.

use cgmath::Point3;

use crate::engine_state::{
    rendering::vertex::{Vertex, CROSS_QUAD_SIDE},
    voxels::block::block_side::BlockSide,
};

use super::face::Face;

/// Vertices and indices for one material pass of one section.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    /// The vertex data
    pub vertices: Vec<Vertex>,
    /// The index data, two triangles per quad
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Creates empty buffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of quads stored.
    pub fn quad_count(&self) -> usize {
        self.vertices.len() / 4
    }

    /// Number of indices to draw.
    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Whether there is nothing to draw.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Appends a (possibly merged) block face.
    pub fn push_face(&mut self, face: &Face, texture_index: u32) {
        let quad = self.quad_count() as u32;
        self.vertices
            .extend(Self::generate_face_vertices(face, texture_index));
        self.indices.extend(Self::generate_face_indices(quad));
    }

    /// Appends the two diagonal quads of a crossed-quad block at (x, y, z).
    pub fn push_cross_quad(&mut self, x: i32, y: i32, z: i32, texture_index: u32) {
        let diagonals = [
            [
                Point3::new(x, y, z),
                Point3::new(x + 1, y, z + 1),
                Point3::new(x, y + 1, z),
                Point3::new(x + 1, y + 1, z + 1),
            ],
            [
                Point3::new(x, y, z + 1),
                Point3::new(x + 1, y, z),
                Point3::new(x, y + 1, z + 1),
                Point3::new(x + 1, y + 1, z),
            ],
        ];

        for [ll, lr, ul, ur] in diagonals {
            let quad = self.quad_count() as u32;
            self.vertices.extend([
                Vertex::new(ll, texture_index, 0, 1, CROSS_QUAD_SIDE),
                Vertex::new(lr, texture_index, 1, 1, CROSS_QUAD_SIDE),
                Vertex::new(ul, texture_index, 0, 0, CROSS_QUAD_SIDE),
                Vertex::new(ur, texture_index, 1, 0, CROSS_QUAD_SIDE),
            ]);
            self.indices.extend(Self::generate_face_indices(quad));
        }
    }

    /// Generates vertex data for a single face of a block.
    ///
    /// # Returns
    /// The four corners of the face, ordered to form two triangles with the
    /// indices from `generate_face_indices`. Texture coordinates span the face's
    /// size in voxels so the texture repeats across merged faces.
    pub fn generate_face_vertices(face: &Face, texture_index: u32) -> [Vertex; 4] {
        let (u_offset, v_offset) = match face.block_side {
            BlockSide::FRONT => (face.lr.z - face.ll.z, face.ul.y - face.ll.y),
            BlockSide::BACK => (face.ll.z - face.lr.z, face.ul.y - face.ll.y),
            BlockSide::LEFT => (face.ll.x - face.lr.x, face.ul.y - face.ll.y),
            BlockSide::RIGHT => (face.lr.x - face.ll.x, face.ul.y - face.ll.y),
            BlockSide::TOP => (face.lr.z - face.ll.z, face.ul.x - face.ll.x),
            BlockSide::BOTTOM => (face.ll.z - face.lr.z, face.ul.x - face.ll.x),
        };
        let (u_offset, v_offset) = (u_offset as u32, v_offset as u32);
        let side = face.block_side as u32;
        let corner = |p: Point3<usize>| Point3::new(p.x as i32, p.y as i32, p.z as i32);

        [
            Vertex::new(corner(face.ll), texture_index, 0, v_offset, side),
            Vertex::new(corner(face.lr), texture_index, u_offset, v_offset, side),
            Vertex::new(corner(face.ul), texture_index, 0, 0, side),
            Vertex::new(corner(face.ur), texture_index, u_offset, 0, side),
        ]
    }

    /// Generates index data for a face, adjusted by the number of previously generated faces.
    ///
    /// # Returns
    /// Six indices forming two triangles over the face's four vertices.
    pub fn generate_face_indices(num_faces_generated: u32) -> [u32; 6] {
        [
            num_faces_generated * 4,
            1 + num_faces_generated * 4,
            3 + num_faces_generated * 4,
            num_faces_generated * 4,
            3 + num_faces_generated * 4,
            2 + num_faces_generated * 4,
        ]
    }
}
