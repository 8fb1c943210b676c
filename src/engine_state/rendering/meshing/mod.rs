//! Mesh generation for voxel sections.
//!
//! [`build_section_mesh`] is a pure function from a [`SectionSnapshot`] to the
//! solid and transparent geometry of that section. It runs on build workers and
//! touches nothing but its arguments, so building the same snapshot twice always
//! yields the same quads.
//!
//! # Architecture
//! - `mesh/`: faces, greedy merging and vertex/index buffers
//! - [`SectionMesh`]: the finished descriptor handed back to the main thread
//! - [`BuildError`]: why a build produced no descriptor
//!
//! # Performance Considerations
//! - Greedy meshing minimizes vertex count
//! - Cancellation is polled once per layer so stale builds stop early

use thiserror::Error;

use crate::engine_state::voxels::{
    block::{block_side::BlockSide, BlockId, BlockMetadata, BlockShape, AIR},
    chunk::{SectionKey, SectionSnapshot},
};

pub mod mesh;

pub use mesh::MeshData;

/// Reasons a section build produced no geometry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BuildError {
    /// A newer build superseded this one, or its chunk was evicted.
    #[error("build was cancelled")]
    Cancelled,
    /// The snapshot contains an id the block registry does not know.
    #[error("unknown block id {id} in section {section} of chunk ({x}, {z})")]
    UnknownBlock {
        /// The unknown id
        id: BlockId,
        /// Chunk x coordinate
        x: i32,
        /// Chunk z coordinate
        z: i32,
        /// Section index
        section: u32,
    },
    /// The mesher panicked.
    #[error("mesher panicked: {0}")]
    Panicked(String),
}

/// Finished geometry of one section.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionMesh {
    /// Section the geometry belongs to
    pub key: SectionKey,
    /// Geometry of opaque blocks
    pub solid: MeshData,
    /// Geometry of transparent blocks and crossed-quad plants
    pub transparent: MeshData,
}

impl SectionMesh {
    /// Whether neither pass has anything to draw.
    pub fn is_empty(&self) -> bool {
        self.solid.is_empty() && self.transparent.is_empty()
    }

    /// Total quads across both passes.
    pub fn quad_count(&self) -> usize {
        self.solid.quad_count() + self.transparent.quad_count()
    }
}

fn find_unknown_block(
    snapshot: &SectionSnapshot,
    blocks: &dyn BlockMetadata,
) -> Option<BlockId> {
    let width = snapshot.width() as i32;
    let height = snapshot.height() as i32;
    for z in -1..=width {
        for y in -1..=height {
            for x in -1..=width {
                let id = snapshot.get(x, y, z);
                if id != AIR && !blocks.is_known(id) {
                    return Some(id);
                }
            }
        }
    }
    None
}

/// Builds the geometry of one section.
///
/// # Arguments
/// * `snapshot` - The section and its one-voxel border
/// * `blocks` - Block metadata
/// * `is_cancelled` - Polled during the build; a `true` answer aborts with `BuildError::Cancelled`
///
/// # Returns
/// The section's solid and transparent geometry, or why none was produced.
pub fn build_section_mesh(
    snapshot: &SectionSnapshot,
    blocks: &dyn BlockMetadata,
    is_cancelled: &dyn Fn() -> bool,
) -> Result<SectionMesh, BuildError> {
    let key = snapshot.key();
    if let Some(id) = find_unknown_block(snapshot, blocks) {
        return Err(BuildError::UnknownBlock {
            id,
            x: key.position.x,
            z: key.position.z,
            section: key.section,
        });
    }

    let faces = mesh::greedy_faces(snapshot, blocks, is_cancelled)?;

    let mut solid = MeshData::new();
    for face in &faces.solid {
        solid.push_face(face, blocks.texture_index(face.block, face.block_side));
    }
    let mut transparent = MeshData::new();
    for face in &faces.transparent {
        transparent.push_face(face, blocks.texture_index(face.block, face.block_side));
    }

    let width = snapshot.width() as i32;
    let height = snapshot.height() as i32;
    for z in 0..width {
        for y in 0..height {
            for x in 0..width {
                let id = snapshot.get(x, y, z);
                if id != AIR && blocks.shape(id) == BlockShape::CrossQuad {
                    transparent.push_cross_quad(
                        x,
                        y,
                        z,
                        blocks.texture_index(id, BlockSide::FRONT),
                    );
                }
            }
        }
    }

    Ok(SectionMesh {
        key,
        solid,
        transparent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::{
        block::{block_type::BlockType, BlockRegistry},
        chunk::ChunkPosition,
    };

    fn snapshot() -> SectionSnapshot {
        SectionSnapshot::new(SectionKey::new(ChunkPosition::new(2, -1), 3), 4, 4)
    }

    fn build(snapshot: &SectionSnapshot) -> SectionMesh {
        build_section_mesh(snapshot, &BlockRegistry::default_palette(), &|| false).unwrap()
    }

    #[test]
    fn lone_block_has_six_faces() {
        let mut snapshot = snapshot();
        snapshot.set(1, 1, 1, BlockType::STONE.id());
        let mesh = build(&snapshot);
        assert_eq!(mesh.key, snapshot.key());
        assert_eq!(mesh.solid.quad_count(), 6);
        assert!(mesh.transparent.is_empty());
    }

    #[test]
    fn border_voxels_hide_boundary_faces() {
        let mut snapshot = snapshot();
        snapshot.set(0, 0, 0, BlockType::STONE.id());
        snapshot.set(-1, 0, 0, BlockType::STONE.id());
        snapshot.set(0, -1, 0, BlockType::DIRT.id());
        assert_eq!(build(&snapshot).solid.quad_count(), 4);
    }

    #[test]
    fn solid_section_with_open_borders_is_a_box() {
        let mut snapshot = snapshot();
        for z in 0..4 {
            for y in 0..4 {
                for x in 0..4 {
                    snapshot.set(x, y, z, BlockType::STONE.id());
                }
            }
        }
        assert_eq!(build(&snapshot).solid.quad_count(), 6);

        for i in -1..=4 {
            for j in -1..=4 {
                for (x, y, z) in [(-1, i, j), (4, i, j), (i, -1, j), (i, 4, j), (i, j, -1), (i, j, 4)] {
                    snapshot.set(x, y, z, BlockType::STONE.id());
                }
            }
        }
        assert!(build(&snapshot).is_empty());
    }

    #[test]
    fn water_merges_but_leaves_draw_between() {
        let mut water = snapshot();
        water.set(0, 0, 0, BlockType::WATER.id());
        water.set(1, 0, 0, BlockType::WATER.id());
        let mesh = build(&water);
        assert_eq!(mesh.transparent.quad_count(), 6);
        assert!(mesh.solid.is_empty());

        let mut leaves = snapshot();
        leaves.set(0, 0, 0, BlockType::LEAVES.id());
        leaves.set(1, 0, 0, BlockType::LEAVES.id());
        assert_eq!(build(&leaves).transparent.quad_count(), 8);
    }

    #[test]
    fn opaque_faces_under_water_stay_solid() {
        let mut snapshot = snapshot();
        snapshot.set(0, 0, 0, BlockType::STONE.id());
        snapshot.set(0, 1, 0, BlockType::WATER.id());
        let mesh = build(&snapshot);
        assert_eq!(mesh.solid.quad_count(), 6);
        assert_eq!(mesh.transparent.quad_count(), 5);
    }

    #[test]
    fn plants_are_crossed_quads_that_do_not_cull() {
        let mut snapshot = snapshot();
        snapshot.set(2, 1, 2, BlockType::TALL_GRASS.id());
        snapshot.set(2, 0, 2, BlockType::GRASS.id());
        let mesh = build(&snapshot);
        assert_eq!(mesh.transparent.quad_count(), 2);
        assert_eq!(mesh.solid.quad_count(), 6);
    }

    #[test]
    fn same_snapshot_builds_identically() {
        let mut snapshot = snapshot();
        let mut rng = fastrand::Rng::with_seed(42);
        for z in 0..4 {
            for y in 0..4 {
                for x in 0..4 {
                    let id = rng.u16(0..BlockType::ALL.len() as u16);
                    snapshot.set(x, y, z, id);
                }
            }
        }
        assert_eq!(build(&snapshot), build(&snapshot));
    }

    #[test]
    fn unknown_blocks_fail_the_build() {
        let mut snapshot = snapshot();
        snapshot.set(4, 0, 0, 500);
        let result =
            build_section_mesh(&snapshot, &BlockRegistry::default_palette(), &|| false);
        assert_eq!(
            result.unwrap_err(),
            BuildError::UnknownBlock {
                id: 500,
                x: 2,
                z: -1,
                section: 3
            }
        );
    }

    #[test]
    fn cancelled_builds_report_cancellation() {
        let mut snapshot = snapshot();
        snapshot.set(0, 0, 0, BlockType::STONE.id());
        let result =
            build_section_mesh(&snapshot, &BlockRegistry::default_palette(), &|| true);
        assert_eq!(result.unwrap_err(), BuildError::Cancelled);
    }
}
