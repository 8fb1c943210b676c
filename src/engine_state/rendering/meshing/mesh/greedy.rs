//! Greedy meshing implementation for voxel rendering.
//!
//! This module implements the greedy meshing algorithm which combines adjacent coplanar
//! faces of the same block into larger quads, significantly reducing the number of
//! vertices needed to render a section.
//!
//! Each side is processed layer by layer. Within a layer, visible faces are first
//! merged into runs along the row axis, then every run is merged with the run of
//! identical extent in the previous row. A face is visible when the voxel it looks
//! at is empty, a crossed-quad plant, or transparent and different from the source
//! (or the same block, if that block draws faces between copies of itself).

use crate::engine_state::voxels::{
    block::{block_side::BlockSide, BlockId, BlockMetadata, BlockShape, AIR},
    chunk::SectionSnapshot,
};

use super::super::BuildError;
use super::face::Face;

/// Faces produced for one section, split by material pass.
#[derive(Debug, Default)]
pub struct GreedyFaces {
    /// Faces of opaque blocks
    pub solid: Vec<Face>,
    /// Faces of transparent blocks
    pub transparent: Vec<Face>,
}

/// Whether the face of `source` looking at `neighbor` has to be drawn.
pub fn is_face_visible(source: BlockId, neighbor: BlockId, blocks: &dyn BlockMetadata) -> bool {
    if source == AIR || blocks.shape(source) == BlockShape::CrossQuad {
        return false;
    }
    neighbor == AIR
        || blocks.shape(neighbor) == BlockShape::CrossQuad
        || (blocks.is_transparent(neighbor)
            && (neighbor != source || blocks.draws_between(source)))
}

/// Maps (layer, row, column) of a side's sweep to a section coordinate.
///
/// Rows advance along the face's "up" axis and columns along its row axis, which
/// is the orientation `Face::merge_up` and `Face::merge_in_row` expect.
fn sweep_to_voxel(side: BlockSide, layer: usize, row: usize, column: usize) -> (usize, usize, usize) {
    match side {
        BlockSide::FRONT | BlockSide::BACK => (layer, row, column),
        BlockSide::LEFT | BlockSide::RIGHT => (column, row, layer),
        BlockSide::TOP | BlockSide::BOTTOM => (row, layer, column),
    }
}

fn sweep_extent(side: BlockSide, width: usize, height: usize) -> (usize, usize, usize) {
    match side {
        BlockSide::FRONT | BlockSide::BACK => (width, height, width),
        BlockSide::LEFT | BlockSide::RIGHT => (width, height, width),
        BlockSide::TOP | BlockSide::BOTTOM => (height, width, width),
    }
}

/// Collects the merged visible faces of every full block in the section.
///
/// # Arguments
/// * `snapshot` - The section and its one-voxel border
/// * `blocks` - Block metadata used for visibility decisions
/// * `is_cancelled` - Polled once per layer; the sweep stops early when it returns `true`
///
/// # Returns
/// The merged faces, or `BuildError::Cancelled`.
pub fn greedy_faces(
    snapshot: &SectionSnapshot,
    blocks: &dyn BlockMetadata,
    is_cancelled: &dyn Fn() -> bool,
) -> Result<GreedyFaces, BuildError> {
    let mut faces = GreedyFaces::default();
    let (width, height) = (snapshot.width(), snapshot.height());

    for side in BlockSide::all() {
        let (dx, dy, dz) = side.normal();
        let (layers, rows, columns) = sweep_extent(side, width, height);

        for layer in 0..layers {
            if is_cancelled() {
                return Err(BuildError::Cancelled);
            }

            let mut open: Vec<Face> = Vec::new();
            for row in 0..rows {
                let mut runs: Vec<Face> = Vec::new();
                for column in 0..columns {
                    let (x, y, z) = sweep_to_voxel(side, layer, row, column);
                    let (xi, yi, zi) = (x as i32, y as i32, z as i32);
                    let source = snapshot.get(xi, yi, zi);
                    let neighbor = snapshot.get(xi + dx, yi + dy, zi + dz);
                    if !is_face_visible(source, neighbor, blocks) {
                        continue;
                    }

                    let face = Face::new(x, y, z, source, side);
                    match runs.last_mut().and_then(|last| last.merge_in_row(&face)) {
                        Some(merged) => {
                            if let Some(last) = runs.last_mut() {
                                *last = merged;
                            }
                        }
                        None => runs.push(face),
                    }
                }

                let mut next_open = Vec::with_capacity(runs.len());
                for run in runs {
                    let extended = open
                        .iter()
                        .enumerate()
                        .find_map(|(index, below)| below.merge_up(&run).map(|face| (index, face)));
                    match extended {
                        Some((index, merged)) => {
                            open.remove(index);
                            next_open.push(merged);
                        }
                        None => next_open.push(run),
                    }
                }

                for finished in open.drain(..) {
                    push_by_material(&mut faces, finished, blocks);
                }
                open = next_open;
            }

            for finished in open {
                push_by_material(&mut faces, finished, blocks);
            }
        }
    }

    Ok(faces)
}

fn push_by_material(faces: &mut GreedyFaces, face: Face, blocks: &dyn BlockMetadata) {
    if blocks.is_transparent(face.block) {
        faces.transparent.push(face);
    } else {
        faces.solid.push(face);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::{
        block::{block_type::BlockType, BlockRegistry},
        chunk::{ChunkPosition, SectionKey},
    };

    fn snapshot() -> SectionSnapshot {
        SectionSnapshot::new(SectionKey::new(ChunkPosition::new(0, 0), 0), 4, 4)
    }

    fn never() -> bool {
        false
    }

    #[test]
    fn visibility_rules() {
        let blocks = BlockRegistry::default_palette();
        let stone = BlockType::STONE.id();
        let water = BlockType::WATER.id();
        let leaves = BlockType::LEAVES.id();
        let plant = BlockType::TALL_GRASS.id();

        assert!(is_face_visible(stone, AIR, &blocks));
        assert!(!is_face_visible(stone, stone, &blocks));
        assert!(is_face_visible(stone, water, &blocks));
        assert!(is_face_visible(stone, plant, &blocks));
        assert!(!is_face_visible(water, water, &blocks));
        assert!(is_face_visible(leaves, leaves, &blocks));
        assert!(is_face_visible(water, leaves, &blocks));
        assert!(!is_face_visible(water, stone, &blocks));
        assert!(!is_face_visible(AIR, stone, &blocks));
        assert!(!is_face_visible(plant, AIR, &blocks));
    }

    #[test]
    fn full_layer_merges_into_single_quads() {
        let blocks = BlockRegistry::default_palette();
        let mut snapshot = snapshot();
        for z in 0..4 {
            for x in 0..4 {
                snapshot.set(x, 0, z, BlockType::STONE.id());
            }
        }

        let faces = greedy_faces(&snapshot, &blocks, &never).unwrap();
        assert_eq!(faces.solid.len(), 6);
        assert!(faces.transparent.is_empty());
        let top = faces
            .solid
            .iter()
            .find(|face| face.block_side == BlockSide::TOP)
            .unwrap();
        assert_eq!(top.extent(), (4, 4));
    }

    #[test]
    fn l_shape_needs_two_top_quads() {
        let blocks = BlockRegistry::default_palette();
        let mut snapshot = snapshot();
        snapshot.set(0, 0, 0, BlockType::STONE.id());
        snapshot.set(0, 0, 1, BlockType::STONE.id());
        snapshot.set(1, 0, 0, BlockType::STONE.id());

        let faces = greedy_faces(&snapshot, &blocks, &never).unwrap();
        let tops = faces
            .solid
            .iter()
            .filter(|face| face.block_side == BlockSide::TOP)
            .count();
        assert_eq!(tops, 2);
    }

    #[test]
    fn cancellation_stops_the_sweep() {
        let blocks = BlockRegistry::default_palette();
        let result = greedy_faces(&snapshot(), &blocks, &|| true);
        assert!(matches!(result, Err(BuildError::Cancelled)));
    }
}
