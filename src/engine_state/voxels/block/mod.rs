//! # Block Module
//!
//! Block ids, block metadata, and the registry that answers metadata queries.
//!
//! Voxel grids only store a [`BlockId`]. Everything the mesher needs to know about a
//! block (transparency, shape, per-face texture) is looked up through the
//! [`BlockMetadata`] trait, which is immutable after startup and shared with the
//! mesh build workers behind an `Arc`.

use thiserror::Error;

use block_side::BlockSide;
use block_type::BlockType;

pub mod block_side;
pub mod block_type;

/// The integer type voxel grids store per cell. Id 0 is empty space.
pub type BlockId = u16;

/// Id of the empty block.
pub const AIR: BlockId = 0;

/// Geometry emitted for a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockShape {
    /// A full cube, subject to face culling and greedy merging
    Full,
    /// Two diagonal quads, never merged and never culling its neighbors
    CrossQuad,
}

/// Static description of one block type.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockDefinition {
    /// Human-readable name used in logs
    pub name: String,
    /// Texture layer per face, indexed by `BlockSide as usize`
    pub textures: [u32; 6],
    /// Whether faces behind this block stay visible
    pub transparent: bool,
    /// Whether faces between two voxels of this block are drawn
    pub draws_between: bool,
    /// Geometry emitted for the block
    pub shape: BlockShape,
}

/// Read-only block metadata consumed by the mesher.
pub trait BlockMetadata: Send + Sync {
    /// Whether `id` names a registered block.
    fn is_known(&self, id: BlockId) -> bool;
    /// Whether faces behind `id` stay visible. Unknown ids are treated as opaque.
    fn is_transparent(&self, id: BlockId) -> bool;
    /// Geometry emitted for `id`.
    fn shape(&self, id: BlockId) -> BlockShape;
    /// Texture layer used for the `side` face of `id`.
    fn texture_index(&self, id: BlockId, side: BlockSide) -> u32;
    /// Whether faces between two adjacent voxels of `id` are drawn.
    fn draws_between(&self, id: BlockId) -> bool;
}

/// Errors detected while building a [`BlockRegistry`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Two definitions share an id.
    #[error("block id {0} is registered twice")]
    DuplicateId(BlockId),
    /// Id 0 must be the transparent empty block.
    #[error("block id 0 must be a transparent full block, got `{0}`")]
    InvalidAir(String),
    /// Cross-quad blocks cannot occlude their neighbors.
    #[error("cross-quad block `{0}` must be transparent")]
    OpaqueCrossQuad(String),
    /// No definition for id 0 was supplied.
    #[error("no definition registered for block id 0")]
    MissingAir,
}

/// Dense id-indexed table of block definitions.
#[derive(Debug, Clone)]
pub struct BlockRegistry {
    definitions: Vec<Option<BlockDefinition>>,
}

impl BlockRegistry {
    /// Builds a registry from `(id, definition)` pairs.
    ///
    /// # Returns
    /// The registry, or the first inconsistency found. Registry errors are
    /// configuration errors and are meant to abort startup.
    pub fn new(
        entries: impl IntoIterator<Item = (BlockId, BlockDefinition)>,
    ) -> Result<Self, RegistryError> {
        let mut definitions: Vec<Option<BlockDefinition>> = Vec::new();

        for (id, definition) in entries {
            let index = id as usize;
            if definitions.len() <= index {
                definitions.resize(index + 1, None);
            }
            if definitions[index].is_some() {
                return Err(RegistryError::DuplicateId(id));
            }
            if definition.shape == BlockShape::CrossQuad && !definition.transparent {
                return Err(RegistryError::OpaqueCrossQuad(definition.name));
            }
            definitions[index] = Some(definition);
        }

        match definitions.first() {
            Some(Some(air)) if air.transparent && air.shape == BlockShape::Full => {}
            Some(Some(air)) => return Err(RegistryError::InvalidAir(air.name.clone())),
            _ => return Err(RegistryError::MissingAir),
        }

        Ok(Self { definitions })
    }

    /// Registry holding the built-in [`BlockType`] palette.
    pub fn default_palette() -> Self {
        let definitions = BlockType::ALL
            .into_iter()
            .map(|block_type| Some(block_type.definition()))
            .collect();
        Self { definitions }
    }

    /// Looks up the definition registered for `id`.
    pub fn get(&self, id: BlockId) -> Option<&BlockDefinition> {
        self.definitions.get(id as usize).and_then(Option::as_ref)
    }

    /// Number of registered block types.
    pub fn len(&self) -> usize {
        self.definitions.iter().filter(|d| d.is_some()).count()
    }

    /// Whether the registry has no entries. A validated registry always has air.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlockMetadata for BlockRegistry {
    fn is_known(&self, id: BlockId) -> bool {
        self.get(id).is_some()
    }

    fn is_transparent(&self, id: BlockId) -> bool {
        self.get(id).is_some_and(|d| d.transparent)
    }

    fn shape(&self, id: BlockId) -> BlockShape {
        self.get(id).map_or(BlockShape::Full, |d| d.shape)
    }

    fn texture_index(&self, id: BlockId, side: BlockSide) -> u32 {
        self.get(id).map_or(0, |d| d.textures[side as usize])
    }

    fn draws_between(&self, id: BlockId) -> bool {
        self.get(id).is_some_and(|d| d.draws_between)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(name: &str) -> BlockDefinition {
        BlockDefinition {
            name: name.to_string(),
            textures: [1; 6],
            transparent: false,
            draws_between: false,
            shape: BlockShape::Full,
        }
    }

    #[test]
    fn default_palette_answers_metadata() {
        let registry = BlockRegistry::default_palette();
        assert_eq!(registry.len(), BlockType::ALL.len());
        assert!(registry.is_transparent(BlockType::WATER.id()));
        assert!(!registry.draws_between(BlockType::WATER.id()));
        assert!(registry.draws_between(BlockType::LEAVES.id()));
        assert!(!registry.is_transparent(BlockType::STONE.id()));
        assert_eq!(
            registry.texture_index(BlockType::GRASS.id(), BlockSide::TOP),
            4
        );
        assert_eq!(
            registry.shape(BlockType::TALL_GRASS.id()),
            BlockShape::CrossQuad
        );
    }

    #[test]
    fn unknown_ids_are_reported() {
        let registry = BlockRegistry::default_palette();
        assert!(!registry.is_known(999));
        assert!(!registry.is_transparent(999));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let result = BlockRegistry::new([
            (0, BlockType::AIR.definition()),
            (1, solid("a")),
            (1, solid("b")),
        ]);
        assert_eq!(result.unwrap_err(), RegistryError::DuplicateId(1));
    }

    #[test]
    fn missing_or_opaque_air_is_rejected() {
        assert_eq!(
            BlockRegistry::new([(1, solid("stone"))]).unwrap_err(),
            RegistryError::MissingAir
        );
        assert_eq!(
            BlockRegistry::new([(0, solid("void"))]).unwrap_err(),
            RegistryError::InvalidAir("void".to_string())
        );
    }

    #[test]
    fn opaque_cross_quads_are_rejected() {
        let mut plant = solid("plant");
        plant.shape = BlockShape::CrossQuad;
        assert_eq!(
            BlockRegistry::new([(0, BlockType::AIR.definition()), (1, plant)]).unwrap_err(),
            RegistryError::OpaqueCrossQuad("plant".to_string())
        );
    }

    #[test]
    fn sparse_ids_leave_gaps_unknown() {
        let registry =
            BlockRegistry::new([(0, BlockType::AIR.definition()), (5, solid("ore"))]).unwrap();
        assert!(registry.is_known(5));
        assert!(!registry.is_known(3));
        assert_eq!(registry.len(), 2);
    }
}
