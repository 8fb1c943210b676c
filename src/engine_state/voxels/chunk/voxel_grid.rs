//! # Voxel Grid
//!
//! Dense block-id storage for one chunk.
//!
//! Cells are addressed with a bit-packed index, `x | y << log2(W) | z << (log2(W) + log2(H))`,
//! which is why every chunk dimension must be a power of two. Accessors take signed
//! coordinates so callers probing one step past an edge get `None` instead of a
//! wrapped index.

use crate::engine_state::{
    config::{ConfigError, EngineConfig},
    voxels::block::{BlockId, AIR},
};

/// Validated chunk dimensions with the shift amounts used for indexing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkDimensions {
    width: u32,
    height: u32,
    section_height: u32,
    width_bits: u32,
    height_bits: u32,
}

impl ChunkDimensions {
    /// Builds dimensions from raw sizes.
    ///
    /// # Returns
    /// `Err` if a size is not a power of two or a section is taller than the chunk.
    pub fn new(width: u32, height: u32, section_height: u32) -> Result<Self, ConfigError> {
        for (field, value) in [
            ("chunk_width", width),
            ("chunk_height", height),
            ("section_height", section_height),
        ] {
            if !value.is_power_of_two() {
                return Err(ConfigError::NotPowerOfTwo { field, value });
            }
        }
        if section_height > height {
            return Err(ConfigError::SectionTallerThanChunk {
                section_height,
                chunk_height: height,
            });
        }

        Ok(Self {
            width,
            height,
            section_height,
            width_bits: width.trailing_zeros(),
            height_bits: height.trailing_zeros(),
        })
    }

    /// Dimensions described by an engine configuration.
    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        Self::new(
            config.chunk_width,
            config.chunk_height,
            config.section_height,
        )
    }

    /// Horizontal size in voxels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Vertical size in voxels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Height of one meshing section in voxels.
    pub fn section_height(&self) -> u32 {
        self.section_height
    }

    /// Number of sections stacked in a chunk.
    pub fn sections(&self) -> u32 {
        self.height / self.section_height
    }

    /// Number of cells in a chunk.
    pub fn volume(&self) -> usize {
        (self.width as usize) * (self.height as usize) * (self.width as usize)
    }

    /// Section containing local height `y`.
    pub fn section_of(&self, y: u32) -> u32 {
        y / self.section_height
    }

    /// Whether a local coordinate lies inside the chunk.
    pub fn contains(&self, x: i32, y: i32, z: i32) -> bool {
        let (w, h) = (self.width as i32, self.height as i32);
        (0..w).contains(&x) && (0..h).contains(&y) && (0..w).contains(&z)
    }

    /// Packed cell index of an in-bounds coordinate.
    #[inline]
    pub fn index(&self, x: u32, y: u32, z: u32) -> usize {
        (x | (y << self.width_bits) | (z << (self.width_bits + self.height_bits))) as usize
    }
}

/// Block ids for every cell of one chunk.
#[derive(Debug, Clone)]
pub struct VoxelGrid {
    dimensions: ChunkDimensions,
    blocks: Vec<BlockId>,
}

impl VoxelGrid {
    /// Allocates a grid filled with air.
    pub fn new(dimensions: ChunkDimensions) -> Self {
        Self {
            dimensions,
            blocks: vec![AIR; dimensions.volume()],
        }
    }

    /// Dimensions this grid was allocated with.
    pub fn dimensions(&self) -> &ChunkDimensions {
        &self.dimensions
    }

    /// Block at a local coordinate, or `None` outside the chunk.
    #[inline]
    pub fn get(&self, x: i32, y: i32, z: i32) -> Option<BlockId> {
        if !self.dimensions.contains(x, y, z) {
            return None;
        }
        Some(self.blocks[self.dimensions.index(x as u32, y as u32, z as u32)])
    }

    /// Writes a block at a local coordinate.
    ///
    /// # Returns
    /// `false` without writing if the coordinate lies outside the chunk.
    pub fn set(&mut self, x: i32, y: i32, z: i32, id: BlockId) -> bool {
        if !self.dimensions.contains(x, y, z) {
            return false;
        }
        let index = self.dimensions.index(x as u32, y as u32, z as u32);
        self.blocks[index] = id;
        true
    }

    /// Fills the cells of column (x, z) from `bottom` up to, but not including, `top`.
    /// The range is clamped to the chunk height.
    pub fn fill_column(&mut self, x: i32, z: i32, bottom: i32, top: i32, id: BlockId) {
        let top = top.min(self.dimensions.height as i32);
        for y in bottom.max(0)..top {
            self.set(x, y, z, id);
        }
    }

    /// Whether every cell of `section` is air.
    pub fn section_is_empty(&self, section: u32) -> bool {
        let section_height = self.dimensions.section_height;
        let width = self.dimensions.width;
        let start = section * section_height;
        (0..width).all(|z| {
            (start..start + section_height).all(|y| {
                (0..width).all(|x| self.blocks[self.dimensions.index(x, y, z)] == AIR)
            })
        })
    }
}
