//! # Block Type Module
//!
//! The built-in block palette. Each variant's discriminant is the block id
//! stored in voxel grids, so the order of variants is part of the data format.

use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

use super::{BlockDefinition, BlockId, BlockShape};

/// Enumerates the block types of the default palette.
///
/// The `FromPrimitive` derive allows conversion from stored block ids.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, FromPrimitive)]
pub enum BlockType {
    /// Empty space. Always id 0.
    AIR,
    /// Bulk terrain below the surface layers.
    STONE,
    /// Sub-surface soil.
    DIRT,
    /// Surface soil with a distinct top texture.
    GRASS,
    /// Transparent liquid. Faces between two water voxels are not drawn.
    WATER,
    /// Shoreline and shallow floor material.
    SAND,
    /// Tree trunk.
    WOOD,
    /// Transparent foliage that still draws faces against itself.
    LEAVES,
    /// Decorative plant rendered as two crossed quads.
    TALL_GRASS,
}

/// Texture layer for each face, in `BlockSide` order:
/// [FRONT, BACK, BOTTOM, TOP, LEFT, RIGHT]
const TEXTURES: [[u32; 6]; 9] = [
    [0, 0, 0, 0, 0, 0], // AIR
    [1, 1, 1, 1, 1, 1], // STONE
    [2, 2, 2, 2, 2, 2], // DIRT
    [3, 3, 2, 4, 3, 3], // GRASS (sides 3, bottom is dirt, top 4)
    [5, 5, 5, 5, 5, 5], // WATER
    [6, 6, 6, 6, 6, 6], // SAND
    [7, 7, 8, 8, 7, 7], // WOOD (bark on the sides, rings on the caps)
    [9, 9, 9, 9, 9, 9], // LEAVES
    [10, 10, 10, 10, 10, 10], // TALL_GRASS
];

impl BlockType {
    /// All palette entries in id order.
    pub const ALL: [BlockType; 9] = [
        BlockType::AIR,
        BlockType::STONE,
        BlockType::DIRT,
        BlockType::GRASS,
        BlockType::WATER,
        BlockType::SAND,
        BlockType::WOOD,
        BlockType::LEAVES,
        BlockType::TALL_GRASS,
    ];

    /// Converts a stored block id back into a palette entry.
    ///
    /// # Returns
    /// `None` for ids outside the default palette.
    pub fn from_id(id: BlockId) -> Option<Self> {
        BlockType::from_u16(id)
    }

    /// The id this block type is stored as.
    pub fn id(self) -> BlockId {
        self as BlockId
    }

    /// Builds the registry definition for this palette entry.
    pub fn definition(self) -> BlockDefinition {
        let (transparent, draws_between, shape) = match self {
            BlockType::AIR => (true, false, BlockShape::Full),
            BlockType::WATER => (true, false, BlockShape::Full),
            BlockType::LEAVES => (true, true, BlockShape::Full),
            BlockType::TALL_GRASS => (true, false, BlockShape::CrossQuad),
            _ => (false, false, BlockShape::Full),
        };

        BlockDefinition {
            name: format!("{:?}", self).to_lowercase(),
            textures: TEXTURES[self as usize],
            transparent,
            draws_between,
            shape,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_from_id() {
        for block_type in BlockType::ALL {
            assert_eq!(BlockType::from_id(block_type.id()), Some(block_type));
        }
        assert_eq!(BlockType::from_id(BlockType::ALL.len() as BlockId), None);
    }

    #[test]
    fn air_is_zero_and_transparent() {
        assert_eq!(BlockType::AIR.id(), 0);
        assert!(BlockType::AIR.definition().transparent);
    }

    #[test]
    fn only_tall_grass_is_a_cross_quad() {
        for block_type in BlockType::ALL {
            let is_cross = block_type.definition().shape == BlockShape::CrossQuad;
            assert_eq!(is_cross, block_type == BlockType::TALL_GRASS);
        }
    }
}
