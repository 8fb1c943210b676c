//! # World Module
//!
//! The chunk graph: every loaded [`Chunk`], keyed by its 2D coordinate, plus the
//! rules for admitting, evicting and editing them.
//!
//! ## Active Set
//!
//! [`World::sync`] keeps the loaded set equal to the disk of coordinates whose squared
//! distance to the observer's chunk is below `view_distance²`. Evictions run before
//! admissions, and admissions run nearest-first so the terrain under the observer
//! appears first.
//!
//! ## Dirty Tracking
//!
//! A section's geometry depends on its own voxels and on the one-voxel border
//! around it. Any change to that border marks the section dirty: edits on a
//! chunk's outer face dirty the matching section of the neighbor, edits on a
//! section's top or bottom layer dirty the section above or below, and a chunk
//! joining or leaving the world dirties all sections of its neighbors.
//!
//! ## Performance Considerations
//!
//! - Chunk lookup is O(1) using a hash map
//! - Snapshots copy the interior straight out of the grid and only resolve
//!   neighbors for the four border walls

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, trace, warn};

use crate::engine_state::events::{emit, EventSender, WorldEvent};

use super::{
    block::{BlockId, AIR},
    chunk::{
        Chunk, ChunkDimensions, ChunkPosition, ChunkState, Direction, SectionKey,
        SectionSnapshot, VoxelGrid,
    },
    populator::TerrainPopulator,
};

/// Outcome of one [`World::sync`] pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Chunks admitted this pass, nearest first
    pub loaded: Vec<ChunkPosition>,
    /// Chunks evicted this pass
    pub unloaded: Vec<ChunkPosition>,
    /// Chunks whose population failed; they are retried on the next pass
    pub failed: Vec<ChunkPosition>,
}

/// The set of loaded chunks around an observer.
pub struct World {
    dimensions: ChunkDimensions,
    view_distance: i32,
    chunks: HashMap<ChunkPosition, Chunk>,
    populator: Arc<dyn TerrainPopulator>,
    events: EventSender,
}

impl World {
    /// Creates an empty world.
    ///
    /// # Arguments
    /// * `dimensions` - Size of every chunk
    /// * `view_distance` - Radius of the loaded disk, in chunks
    /// * `populator` - Fills the voxel grid of each admitted chunk
    /// * `events` - Receives load, unload and edit notifications
    pub fn new(
        dimensions: ChunkDimensions,
        view_distance: u32,
        populator: Arc<dyn TerrainPopulator>,
        events: EventSender,
    ) -> Self {
        Self {
            dimensions,
            view_distance: view_distance as i32,
            chunks: HashMap::new(),
            populator,
            events,
        }
    }

    /// Size of every chunk in this world.
    pub fn dimensions(&self) -> &ChunkDimensions {
        &self.dimensions
    }

    /// Number of loaded chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether no chunk is loaded.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Coordinates of all loaded chunks, in no particular order.
    pub fn positions(&self) -> impl Iterator<Item = ChunkPosition> + '_ {
        self.chunks.keys().copied()
    }

    /// Whether `position` belongs to the active disk around `center`.
    pub fn is_in_range(&self, center: ChunkPosition, position: ChunkPosition) -> bool {
        let radius = self.view_distance as i64;
        position.distance_squared(center) < radius * radius
    }

    /// Brings the loaded set in line with the active disk around `center`.
    ///
    /// # Returns
    /// What was admitted, evicted, and what failed to populate.
    pub fn sync(&mut self, center: ChunkPosition) -> SyncReport {
        let mut report = SyncReport::default();

        let mut evicted: Vec<ChunkPosition> = self
            .chunks
            .keys()
            .copied()
            .filter(|position| !self.is_in_range(center, *position))
            .collect();
        evicted.sort_unstable();
        for position in evicted {
            self.evict(position);
            report.unloaded.push(position);
        }

        let reach = self.view_distance - 1;
        let mut admitted = Vec::new();
        for dz in -reach..=reach {
            for dx in -reach..=reach {
                let position = ChunkPosition::new(center.x + dx, center.z + dz);
                if self.is_in_range(center, position) && !self.chunks.contains_key(&position) {
                    admitted.push(position);
                }
            }
        }
        admitted.sort_unstable_by_key(|position| (position.distance_squared(center), *position));

        for position in admitted {
            if self.admit(position) {
                report.loaded.push(position);
            } else {
                report.failed.push(position);
            }
        }

        if !report.loaded.is_empty() || !report.unloaded.is_empty() {
            info!(
                "World sync around ({}, {}): {} loaded, {} unloaded, {} resident",
                center.x,
                center.z,
                report.loaded.len(),
                report.unloaded.len(),
                self.chunks.len()
            );
        }

        report
    }

    fn admit(&mut self, position: ChunkPosition) -> bool {
        let mut chunk = Chunk::new(position, &self.dimensions);
        let grid = chunk.begin_loading(self.dimensions);
        if let Err(err) = self.populator.populate(position, grid) {
            warn!(
                "Population of chunk ({}, {}) failed, retrying next sync: {}",
                position.x, position.z, err
            );
            return false;
        }
        chunk.finish_loading();

        for direction in Direction::ALL {
            let neighbor_position = position.offset(direction);
            if let Some(neighbor) = self.chunks.get_mut(&neighbor_position) {
                neighbor.set_neighbor(direction.opposite(), Some(position));
                neighbor.mark_all_dirty();
                chunk.set_neighbor(direction, Some(neighbor_position));
            }
        }

        self.chunks.insert(position, chunk);
        emit(&self.events, WorldEvent::ChunkLoaded { position });
        true
    }

    fn evict(&mut self, position: ChunkPosition) {
        let Some(mut chunk) = self.chunks.remove(&position) else {
            return;
        };
        chunk.unload();

        for direction in Direction::ALL {
            if let Some(neighbor) = self.chunks.get_mut(&position.offset(direction)) {
                if neighbor.neighbor(direction.opposite()) == Some(position) {
                    neighbor.set_neighbor(direction.opposite(), None);
                }
                neighbor.mark_all_dirty();
            }
        }

        debug!("Evicted chunk ({}, {})", position.x, position.z);
        emit(&self.events, WorldEvent::ChunkUnloaded { position });
    }

    /// The loaded chunk at `position`, if any.
    pub fn get_chunk(&self, position: ChunkPosition) -> Option<&Chunk> {
        self.chunks.get(&position)
    }

    fn loaded_grid(&self, position: ChunkPosition) -> Option<&VoxelGrid> {
        self.chunks
            .get(&position)
            .filter(|chunk| chunk.state() == ChunkState::Loaded)
            .and_then(Chunk::voxels)
    }

    fn neighbor_grid(&self, chunk: &Chunk, direction: Direction) -> Option<&VoxelGrid> {
        chunk
            .neighbor(direction)
            .and_then(|position| self.loaded_grid(position))
    }

    /// Block at a chunk-local coordinate.
    ///
    /// Coordinates one step past a horizontal edge are resolved through the
    /// chunk's neighbor link. Anything above or below the chunk, beyond one step,
    /// or in a chunk that is not loaded reads as air.
    pub fn get_block(&self, position: ChunkPosition, x: i32, y: i32, z: i32) -> BlockId {
        let width = self.dimensions.width() as i32;
        if y < 0 || y >= self.dimensions.height() as i32 {
            return AIR;
        }
        let Some(chunk) = self.chunks.get(&position) else {
            return AIR;
        };

        let direction = match (x, z) {
            (x, z) if (0..width).contains(&x) && (0..width).contains(&z) => {
                return chunk.voxels().and_then(|grid| grid.get(x, y, z)).unwrap_or(AIR);
            }
            (-1, z) if (0..width).contains(&z) => Direction::West,
            (x, z) if x == width && (0..width).contains(&z) => Direction::East,
            (x, -1) if (0..width).contains(&x) => Direction::North,
            (x, z) if z == width && (0..width).contains(&x) => Direction::South,
            _ => return AIR,
        };

        self.neighbor_grid(chunk, direction)
            .and_then(|grid| grid.get(x.rem_euclid(width), y, z.rem_euclid(width)))
            .unwrap_or(AIR)
    }

    /// Writes a block at a chunk-local coordinate and marks dependent sections dirty.
    ///
    /// # Returns
    /// `false` if the coordinate is out of bounds or the chunk is not loaded. Such
    /// edits change nothing.
    pub fn set_block(
        &mut self,
        position: ChunkPosition,
        x: i32,
        y: i32,
        z: i32,
        id: BlockId,
    ) -> bool {
        if !self.dimensions.contains(x, y, z) {
            return false;
        }
        let section_height = self.dimensions.section_height() as i32;
        let section = (y / section_height) as u32;
        let width = self.dimensions.width() as i32;

        let Some(chunk) = self
            .chunks
            .get_mut(&position)
            .filter(|chunk| chunk.state() == ChunkState::Loaded)
        else {
            trace!(
                "Ignoring edit in unloaded chunk ({}, {})",
                position.x,
                position.z
            );
            return false;
        };
        let Some(grid) = chunk.voxels_mut() else {
            return false;
        };
        grid.set(x, y, z, id);

        let mut dirtied = vec![SectionKey::new(position, section)];
        chunk.mark_dirty(section);

        let layer = y % section_height;
        if layer == 0 && section > 0 {
            chunk.mark_dirty(section - 1);
            dirtied.push(SectionKey::new(position, section - 1));
        }
        if layer == section_height - 1 && chunk.mark_dirty(section + 1) {
            dirtied.push(SectionKey::new(position, section + 1));
        }

        let mut faces = Vec::with_capacity(2);
        if x == 0 {
            faces.push(Direction::West);
        }
        if x == width - 1 {
            faces.push(Direction::East);
        }
        if z == 0 {
            faces.push(Direction::North);
        }
        if z == width - 1 {
            faces.push(Direction::South);
        }
        for direction in faces {
            let neighbor_position = position.offset(direction);
            if let Some(neighbor) = self
                .chunks
                .get_mut(&neighbor_position)
                .filter(|chunk| chunk.state() == ChunkState::Loaded)
            {
                neighbor.mark_dirty(section);
                dirtied.push(SectionKey::new(neighbor_position, section));
            }
        }

        for key in dirtied {
            emit(&self.events, WorldEvent::ChunkEdited { key });
        }
        true
    }

    fn split_world(&self, world_x: i32, world_z: i32) -> (ChunkPosition, i32, i32) {
        let width = self.dimensions.width() as i32;
        (
            ChunkPosition::new(world_x.div_euclid(width), world_z.div_euclid(width)),
            world_x.rem_euclid(width),
            world_z.rem_euclid(width),
        )
    }

    /// Block at a world-space voxel coordinate.
    pub fn get_block_at_world(&self, world_x: i32, world_y: i32, world_z: i32) -> BlockId {
        let (position, x, z) = self.split_world(world_x, world_z);
        self.get_block(position, x, world_y, z)
    }

    /// Writes a block at a world-space voxel coordinate. See [`World::set_block`].
    pub fn set_block_at_world(
        &mut self,
        world_x: i32,
        world_y: i32,
        world_z: i32,
        id: BlockId,
    ) -> bool {
        let (position, x, z) = self.split_world(world_x, world_z);
        self.set_block(position, x, world_y, z, id)
    }

    /// Re-resolves the neighbor links of `position` against the loaded set.
    pub fn refresh_neighbors(&mut self, position: ChunkPosition) {
        let links = Direction::ALL.map(|direction| {
            let neighbor_position = position.offset(direction);
            self.loaded_grid(neighbor_position)
                .map(|_| neighbor_position)
        });
        if let Some(chunk) = self.chunks.get_mut(&position) {
            for (direction, link) in Direction::ALL.into_iter().zip(links) {
                chunk.set_neighbor(direction, link);
            }
        }
    }

    /// Copies a section and its one-voxel border for meshing.
    ///
    /// Neighbor links are refreshed first so the border reflects the current
    /// loaded set.
    ///
    /// # Returns
    /// `None` if the chunk is not loaded or the section does not exist.
    pub fn snapshot_section(&mut self, key: SectionKey) -> Option<SectionSnapshot> {
        if key.section >= self.dimensions.sections() {
            return None;
        }
        self.refresh_neighbors(key.position);

        let chunk = self
            .chunks
            .get(&key.position)
            .filter(|chunk| chunk.state() == ChunkState::Loaded)?;
        let grid = chunk.voxels()?;

        let width = self.dimensions.width() as i32;
        let section_height = self.dimensions.section_height() as i32;
        let base_y = key.section as i32 * section_height;
        let mut snapshot =
            SectionSnapshot::new(key, width as usize, section_height as usize);

        for z in 0..width {
            for y in -1..=section_height {
                for x in 0..width {
                    if let Some(id) = grid.get(x, base_y + y, z) {
                        snapshot.set(x, y, z, id);
                    }
                }
            }
        }

        let walls = [
            (Direction::West, -1),
            (Direction::East, width),
            (Direction::North, -1),
            (Direction::South, width),
        ];
        for (direction, wall) in walls {
            let Some(neighbor) = self.neighbor_grid(chunk, direction) else {
                continue;
            };
            let source = wall.rem_euclid(width);
            for y in 0..section_height {
                for i in 0..width {
                    let (x, z, source_x, source_z) = match direction {
                        Direction::West | Direction::East => (wall, i, source, i),
                        Direction::North | Direction::South => (i, wall, i, source),
                    };
                    if let Some(id) = neighbor.get(source_x, base_y + y, source_z) {
                        snapshot.set(x, y, z, id);
                    }
                }
            }
        }

        Some(snapshot)
    }

    /// Flags a section for rebuild.
    ///
    /// # Returns
    /// `false` if the chunk is not loaded or the section does not exist.
    pub fn mark_dirty(&mut self, key: SectionKey) -> bool {
        self.chunks
            .get_mut(&key.position)
            .filter(|chunk| chunk.state() == ChunkState::Loaded)
            .is_some_and(|chunk| chunk.mark_dirty(key.section))
    }

    /// Whether a loaded section holds nothing but air.
    ///
    /// Such a section meshes to nothing whatever its neighbors hold. Sections
    /// of chunks that are not loaded report `false`.
    pub fn section_is_empty(&self, key: SectionKey) -> bool {
        key.section < self.dimensions.sections()
            && self
                .loaded_grid(key.position)
                .is_some_and(|grid| grid.section_is_empty(key.section))
    }

    /// Clears every dirty flag and returns the affected sections, nearest to
    /// `center` first.
    pub fn take_dirty_keys(&mut self, center: ChunkPosition) -> Vec<SectionKey> {
        let mut keys: Vec<SectionKey> = self
            .chunks
            .values_mut()
            .filter(|chunk| chunk.state() == ChunkState::Loaded && chunk.has_dirty_sections())
            .flat_map(|chunk| {
                let position = chunk.position();
                chunk
                    .take_dirty()
                    .into_iter()
                    .map(move |section| SectionKey::new(position, section))
            })
            .collect();
        keys.sort_unstable_by_key(|key| (key.position.distance_squared(center), *key));
        keys
    }
}
