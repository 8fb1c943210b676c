//! # Terrain Population
//!
//! Populators fill the voxel grid of a freshly admitted chunk. The world calls
//! [`TerrainPopulator::populate`] exactly once per admission, synchronously, before
//! the chunk becomes visible. A failed population keeps the chunk out of the world;
//! the world tries again on its next sync.
//!
//! Two implementations are provided:
//!
//! * [`NoiseTerrainPopulator`]: fractal noise height map with stone, dirt and
//!   grass layers, water up to a fixed level, sandy shores and scattered plants.
//! * [`FlatPopulator`]: stacked horizontal layers, for deterministic worlds.

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use thiserror::Error;

use super::{
    block::{block_type::BlockType, BlockId},
    chunk::{ChunkPosition, VoxelGrid},
};

/// Errors a populator can report for one chunk.
#[derive(Debug, Error)]
pub enum PopulateError {
    /// The populator needs more vertical space than the chunk has.
    #[error("chunk height {height} is below the {required} voxels required")]
    TooShallow {
        /// Height of the chunk being populated
        height: u32,
        /// Height the populator needs
        required: u32,
    },
    /// Generation failed for a populator-specific reason.
    #[error("terrain generation failed for chunk ({x}, {z}): {message}")]
    Failed {
        /// Chunk x coordinate
        x: i32,
        /// Chunk z coordinate
        z: i32,
        /// Reason reported by the populator
        message: String,
    },
}

/// Fills the voxel grid of a newly loaded chunk.
pub trait TerrainPopulator: Send + Sync {
    /// Writes the terrain of chunk `position` into `grid`, which starts out as air.
    fn populate(&self, position: ChunkPosition, grid: &mut VoxelGrid) -> Result<(), PopulateError>;
}

/// Height-map terrain driven by fractal Perlin noise.
pub struct NoiseTerrainPopulator {
    seed: u32,
    height_noise: Fbm<Perlin>,
    /// Highest terrain surface, in voxels
    pub max_height: u32,
    /// Air at or below this height is filled with water
    pub water_level: i32,
    /// Surfaces below this height become sand
    pub shore_level: i32,
    /// World units per noise unit
    pub horizontal_scale: f64,
    /// Chance for a grass surface to grow a plant
    pub plant_chance: f32,
}

impl NoiseTerrainPopulator {
    /// Creates a populator with 8 noise octaves at persistence 0.6.
    pub fn new(seed: u32) -> Self {
        let height_noise = Fbm::<Perlin>::new(seed)
            .set_octaves(8)
            .set_persistence(0.6)
            .set_frequency(1.0);

        Self {
            seed,
            height_noise,
            max_height: 120,
            water_level: 40,
            shore_level: 45,
            horizontal_scale: 256.0,
            plant_chance: 0.04,
        }
    }

    /// Terrain surface height at a world column.
    pub fn surface_height(&self, world_x: i32, world_z: i32) -> i32 {
        let sample = self.height_noise.get([
            world_x as f64 / self.horizontal_scale,
            world_z as f64 / self.horizontal_scale,
        ]);
        let normalized = ((sample + 1.0) * 0.5).clamp(0.0, 1.0);
        (normalized * self.max_height as f64) as i32
    }

    fn column_rng(&self, position: ChunkPosition) -> fastrand::Rng {
        let packed = ((position.x as u32 as u64) << 32) | position.z as u32 as u64;
        fastrand::Rng::with_seed(packed ^ (self.seed as u64).rotate_left(17))
    }
}

impl TerrainPopulator for NoiseTerrainPopulator {
    fn populate(&self, position: ChunkPosition, grid: &mut VoxelGrid) -> Result<(), PopulateError> {
        let dimensions = *grid.dimensions();
        let required = self.max_height + 2;
        if dimensions.height() < required {
            return Err(PopulateError::TooShallow {
                height: dimensions.height(),
                required,
            });
        }

        let width = dimensions.width() as i32;
        let mut rng = self.column_rng(position);

        for z in 0..width {
            for x in 0..width {
                let surface =
                    self.surface_height(position.x * width + x, position.z * width + z);

                let is_shore = surface < self.shore_level;
                let (soil, top) = if is_shore {
                    (BlockType::SAND, BlockType::SAND)
                } else {
                    (BlockType::DIRT, BlockType::GRASS)
                };

                grid.fill_column(x, z, 0, surface - 2, BlockType::STONE.id());
                grid.fill_column(x, z, surface - 2, surface, soil.id());
                grid.set(x, surface, z, top.id());

                if surface < self.water_level {
                    grid.fill_column(x, z, surface + 1, self.water_level + 1, BlockType::WATER.id());
                } else if top == BlockType::GRASS && rng.f32() < self.plant_chance {
                    grid.set(x, surface + 1, z, BlockType::TALL_GRASS.id());
                }
            }
        }

        Ok(())
    }
}

/// Horizontal layers stacked from the bottom of the chunk.
#[derive(Debug, Clone)]
pub struct FlatPopulator {
    layers: Vec<(BlockId, u32)>,
}

impl FlatPopulator {
    /// Creates a populator from `(block, thickness)` layers, bottom first.
    pub fn new(layers: Vec<(BlockId, u32)>) -> Self {
        Self { layers }
    }

    /// Total thickness of all layers.
    pub fn thickness(&self) -> u32 {
        self.layers.iter().map(|(_, thickness)| thickness).sum()
    }
}

impl TerrainPopulator for FlatPopulator {
    fn populate(&self, _position: ChunkPosition, grid: &mut VoxelGrid) -> Result<(), PopulateError> {
        let dimensions = *grid.dimensions();
        let required = self.thickness();
        if dimensions.height() < required {
            return Err(PopulateError::TooShallow {
                height: dimensions.height(),
                required,
            });
        }

        let width = dimensions.width() as i32;
        let mut bottom = 0;
        for &(id, thickness) in &self.layers {
            let top = bottom + thickness as i32;
            for z in 0..width {
                for x in 0..width {
                    grid.fill_column(x, z, bottom, top, id);
                }
            }
            bottom = top;
        }

        Ok(())
    }
}
