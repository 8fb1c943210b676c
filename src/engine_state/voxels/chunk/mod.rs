//! # Chunk Module
//!
//! A chunk is a full-height column of voxels identified by a 2D coordinate.
//! It owns its [`VoxelGrid`] while loaded, tracks which of its meshing sections
//! are dirty, and remembers which horizontal neighbors were loaded the last time
//! adjacency was resolved.
//!
//! ## Lifecycle
//!
//! `UNLOADED -> LOADING -> LOADED -> UNLOADED`. The voxel grid exists in every
//! state except `UNLOADED`. A chunk is only published to the world once it has
//! reached `LOADED`, so no reader ever sees a half-populated grid.
//!
//! ## Neighbors
//!
//! Neighbor links are coordinates, not references. They are a cache of the
//! world's contents and are refreshed by lookup before each mesh snapshot.

use bitvec::prelude::BitVec;

mod snapshot;
mod voxel_grid;

pub use snapshot::SectionSnapshot;
pub use voxel_grid::{ChunkDimensions, VoxelGrid};

/// Integer coordinate of a chunk on the horizontal plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkPosition {
    /// Chunk column along world X
    pub x: i32,
    /// Chunk column along world Z
    pub z: i32,
}

impl ChunkPosition {
    /// Creates a chunk coordinate.
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Coordinate of the adjacent chunk in `direction`.
    pub fn offset(self, direction: Direction) -> Self {
        let (dx, dz) = direction.offset();
        Self::new(self.x + dx, self.z + dz)
    }

    /// Squared horizontal distance to `other`, in chunks.
    pub fn distance_squared(self, other: ChunkPosition) -> i64 {
        let dx = (self.x - other.x) as i64;
        let dz = (self.z - other.z) as i64;
        dx * dx + dz * dz
    }

    /// Chunk containing the world-space point (x, z).
    pub fn containing(world_x: f32, world_z: f32, chunk_width: u32) -> Self {
        let width = chunk_width as f32;
        Self::new(
            (world_x / width).floor() as i32,
            (world_z / width).floor() as i32,
        )
    }
}

/// The four horizontal neighbor directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Towards negative Z
    North = 0,
    /// Towards positive Z
    South = 1,
    /// Towards positive X
    East = 2,
    /// Towards negative X
    West = 3,
}

impl Direction {
    /// All directions, in discriminant order.
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    /// Chunk offset (dx, dz) for this direction.
    pub fn offset(self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::South => (0, 1),
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
        }
    }

    /// The direction pointing back.
    pub fn opposite(self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::South => Direction::North,
            Direction::East => Direction::West,
            Direction::West => Direction::East,
        }
    }
}

/// A build unit: one vertical section of one chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SectionKey {
    /// Chunk the section belongs to
    pub position: ChunkPosition,
    /// Section index, counted from the bottom of the chunk
    pub section: u32,
}

impl SectionKey {
    /// Creates a section key.
    pub const fn new(position: ChunkPosition, section: u32) -> Self {
        Self { position, section }
    }
}

/// Lifecycle state of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkState {
    /// No voxel data
    Unloaded,
    /// Voxel data allocated and being populated
    Loading,
    /// Populated and visible to the rest of the engine
    Loaded,
}

/// One loaded (or loading) column of voxels.
#[derive(Debug)]
pub struct Chunk {
    position: ChunkPosition,
    state: ChunkState,
    voxels: Option<VoxelGrid>,
    dirty_sections: BitVec,
    neighbors: [Option<ChunkPosition>; 4],
}

impl Chunk {
    /// Creates an unloaded chunk with no voxel data.
    pub fn new(position: ChunkPosition, dimensions: &ChunkDimensions) -> Self {
        Self {
            position,
            state: ChunkState::Unloaded,
            voxels: None,
            dirty_sections: BitVec::repeat(false, dimensions.sections() as usize),
            neighbors: [None; 4],
        }
    }

    /// Allocates an air-filled grid and enters `LOADING`.
    ///
    /// # Returns
    /// The grid for the populator to fill.
    pub fn begin_loading(&mut self, dimensions: ChunkDimensions) -> &mut VoxelGrid {
        self.state = ChunkState::Loading;
        self.voxels.insert(VoxelGrid::new(dimensions))
    }

    /// Enters `LOADED` with every section dirty.
    pub fn finish_loading(&mut self) {
        self.state = ChunkState::Loaded;
        self.mark_all_dirty();
    }

    /// Frees the voxel data, forgets neighbors and enters `UNLOADED`.
    pub fn unload(&mut self) {
        self.state = ChunkState::Unloaded;
        self.voxels = None;
        self.neighbors = [None; 4];
        self.dirty_sections.fill(false);
    }

    /// Coordinate of this chunk.
    pub fn position(&self) -> ChunkPosition {
        self.position
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ChunkState {
        self.state
    }

    /// Voxel data, present in every state except `UNLOADED`.
    pub fn voxels(&self) -> Option<&VoxelGrid> {
        self.voxels.as_ref()
    }

    /// Mutable voxel data. Writes through this handle do not mark anything dirty.
    pub fn voxels_mut(&mut self) -> Option<&mut VoxelGrid> {
        self.voxels.as_mut()
    }

    /// Number of meshing sections.
    pub fn section_count(&self) -> u32 {
        self.dirty_sections.len() as u32
    }

    /// Whether `section` needs a rebuild.
    pub fn is_dirty(&self, section: u32) -> bool {
        self.dirty_sections
            .get(section as usize)
            .is_some_and(|bit| *bit)
    }

    /// Flags `section` for a rebuild. Out-of-range sections are ignored.
    ///
    /// # Returns
    /// `true` if the section exists.
    pub fn mark_dirty(&mut self, section: u32) -> bool {
        match self.dirty_sections.get_mut(section as usize) {
            Some(mut bit) => {
                *bit = true;
                true
            }
            None => false,
        }
    }

    /// Flags every section for a rebuild.
    pub fn mark_all_dirty(&mut self) {
        self.dirty_sections.fill(true);
    }

    /// Clears and returns the dirty sections, lowest first.
    pub fn take_dirty(&mut self) -> Vec<u32> {
        let dirty = self.dirty_sections.iter_ones().map(|i| i as u32).collect();
        self.dirty_sections.fill(false);
        dirty
    }

    /// Whether any section is dirty.
    pub fn has_dirty_sections(&self) -> bool {
        self.dirty_sections.any()
    }

    /// Cached neighbor in `direction`.
    pub fn neighbor(&self, direction: Direction) -> Option<ChunkPosition> {
        self.neighbors[direction as usize]
    }

    /// Overwrites the cached neighbor in `direction`.
    pub fn set_neighbor(&mut self, direction: Direction, neighbor: Option<ChunkPosition>) {
        self.neighbors[direction as usize] = neighbor;
    }

    /// All cached neighbor links, indexed by `Direction as usize`.
    pub fn neighbors(&self) -> &[Option<ChunkPosition>; 4] {
        &self.neighbors
    }
}
