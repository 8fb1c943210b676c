//! # Engine State Module
//!
//! The coordinator that ties the streaming subsystems together and runs them
//! one tick at a time on the main thread.
//!
//! ## Key Components
//!
//! * `EngineContext` - Validated configuration and the shared collaborators
//! * `EngineState` - Owns the world, worker pool, build pipeline, upload queue and meshes
//! * `buffer_state` - GPU boundary (`GpuUploader`) and its `wgpu` implementation
//! * `camera_state` - Observer, camera and frustum
//! * `rendering` - Meshing, build scheduling, uploads and visibility
//! * `task_management` - Worker pool
//! * `voxels` - Blocks, chunks, terrain population and the chunk graph
//!
//! ## Tick
//!
//! 1. Sync the loaded set around the observer's chunk
//! 2. Collect finished builds from the workers onto the event bus
//! 3. Drain the bus and dispatch every event
//! 4. Schedule builds for dirty sections, nearest first
//! 5. Hand queued builds to idle workers
//! 6. Upload at most `max_uploads_per_tick` finished meshes
//!
//! Nothing in a tick waits on a worker. GPU resources are only created and
//! destroyed in steps 3 and 6, both on the calling thread.
//!
//! ## Performance Considerations
//!
//! * Workers get owned snapshots, so the world is never locked
//! * Superseded builds are cancelled instead of finishing and being thrown away
//! * The upload budget bounds per-tick GPU work

use std::sync::Arc;

use log::{debug, info, trace, warn};
use thiserror::Error;

pub mod buffer_state;
pub mod camera_state;
pub mod config;
pub mod events;
pub mod rendering;
pub mod task_management;
pub mod voxels;

use buffer_state::GpuUploader;
use camera_state::{frustum::Frustum, Observer};
use config::{ConfigError, EngineConfig};
use events::{EventBus, WorldEvent};
use rendering::{
    meshing::{MeshData, SectionMesh},
    render_set, BuildOutcome, BuildPipeline, MeshStore, RenderableSection, UploadQueue,
};
use task_management::TaskManager;
use voxels::{
    block::{BlockId, BlockMetadata, RegistryError},
    chunk::{ChunkDimensions, ChunkPosition, SectionKey},
    populator::TerrainPopulator,
    world::World,
};

/// Errors that abort engine construction.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The block registry is inconsistent.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// A worker thread could not be spawned.
    #[error("failed to spawn mesh builder: {0}")]
    WorkerSpawn(#[from] std::io::Error),
}

/// Configuration and collaborators shared by every engine subsystem.
///
/// Built once at startup and passed to constructors explicitly.
#[derive(Clone)]
pub struct EngineContext {
    config: EngineConfig,
    dimensions: ChunkDimensions,
    blocks: Arc<dyn BlockMetadata>,
    populator: Arc<dyn TerrainPopulator>,
}

impl EngineContext {
    /// Validates `config` and bundles it with the block metadata and populator.
    ///
    /// # Returns
    /// The context, or the configuration error that makes it unusable.
    pub fn new(
        config: EngineConfig,
        blocks: Arc<dyn BlockMetadata>,
        populator: Arc<dyn TerrainPopulator>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let dimensions = ChunkDimensions::from_config(&config)?;
        Ok(Self {
            config,
            dimensions,
            blocks,
            populator,
        })
    }

    /// The validated configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Chunk dimensions derived from the configuration.
    pub fn dimensions(&self) -> &ChunkDimensions {
        &self.dimensions
    }
}

/// Counters describing what the engine has done so far.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EngineStats {
    /// Ticks run
    pub ticks: u64,
    /// Chunks currently loaded
    pub loaded_chunks: usize,
    /// Chunks admitted
    pub chunks_loaded: u64,
    /// Chunks evicted
    pub chunks_unloaded: u64,
    /// Chunks whose population failed
    pub populate_failures: u64,
    /// Builds submitted
    pub builds_scheduled: u64,
    /// Dirty sections holding only air, cleared without a build
    pub builds_skipped: u64,
    /// Builds accepted
    pub builds_completed: u64,
    /// Builds cancelled while in flight
    pub builds_cancelled: u64,
    /// Builds that failed and were re-marked dirty
    pub builds_failed: u64,
    /// Results rejected for being superseded
    pub builds_stale: u64,
    /// Sections uploaded
    pub uploads: u64,
    /// Upload failures
    pub upload_failures: u64,
    /// Descriptors dropped because their chunk was evicted
    pub uploads_discarded: u64,
    /// Builds currently in flight
    pub builds_in_flight: usize,
    /// Descriptors waiting for upload
    pub pending_uploads: usize,
}

/// The streaming engine.
///
/// Generic over the GPU boundary so it can run against `wgpu` or a test double.
pub struct EngineState<U: GpuUploader> {
    context: EngineContext,
    world: World,
    bus: EventBus,
    task_manager: TaskManager,
    pipeline: BuildPipeline,
    upload_queue: UploadQueue,
    mesh_store: MeshStore,
    uploader: U,
    stats: EngineStats,
}

impl<U: GpuUploader> EngineState<U> {
    /// Creates an engine with an empty world and spawns the worker pool.
    ///
    /// # Arguments
    /// * `context` - Validated configuration and collaborators
    /// * `uploader` - GPU boundary used for every mesh upload and release
    pub fn new(context: EngineContext, uploader: U) -> Result<Self, EngineError> {
        let bus = EventBus::new();
        let world = World::new(
            context.dimensions,
            context.config.view_distance,
            context.populator.clone(),
            bus.sender(),
        );
        let task_manager = TaskManager::new(context.config.worker_count)?;
        let pipeline = BuildPipeline::new(context.blocks.clone());

        info!(
            "Engine ready: view distance {}, chunks {}x{}x{}, {} sections each",
            context.config.view_distance,
            context.dimensions.width(),
            context.dimensions.height(),
            context.dimensions.width(),
            context.dimensions.sections()
        );

        Ok(Self {
            context,
            world,
            bus,
            task_manager,
            pipeline,
            upload_queue: UploadQueue::new(),
            mesh_store: MeshStore::new(),
            uploader,
            stats: EngineStats::default(),
        })
    }

    /// Runs one tick around `observer`.
    pub fn tick(&mut self, observer: &dyn Observer) {
        let position = observer.position();
        let center = ChunkPosition::containing(position.x, position.z, self.context.dimensions.width());

        let report = self.world.sync(center);
        self.stats.populate_failures += report.failed.len() as u64;
        if !report.loaded.is_empty() || !report.unloaded.is_empty() {
            debug!(
                "Sync around ({}, {}): {} loaded, {} unloaded",
                center.x,
                center.z,
                report.loaded.len(),
                report.unloaded.len()
            );
        }

        self.task_manager.process_completed_tasks(&self.bus.sender());

        for event in self.bus.drain() {
            self.dispatch(event);
        }

        for key in self.world.take_dirty_keys(center) {
            if self.world.section_is_empty(key) {
                self.clear_section(key);
                continue;
            }
            if self.pipeline.schedule(&mut self.world, &mut self.task_manager, key) {
                self.stats.builds_scheduled += 1;
            }
        }

        self.task_manager.process_queued_tasks();

        let upload = self.upload_queue.drain_one_tick(
            &mut self.mesh_store,
            &mut self.uploader,
            self.context.config.max_uploads_per_tick,
        );
        self.stats.uploads += upload.uploaded as u64;
        self.stats.upload_failures += upload.failed as u64;
        self.stats.uploads_discarded += upload.discarded as u64;

        self.stats.ticks += 1;
        self.stats.loaded_chunks = self.world.len();
        self.stats.builds_in_flight = self.pipeline.in_flight_count();
        self.stats.pending_uploads = self.upload_queue.len();
    }

    /// Replaces an all-air section's geometry without a build. The empty
    /// descriptor overtakes any upload still waiting for the section.
    fn clear_section(&mut self, key: SectionKey) {
        if self.pipeline.cancel(key) {
            self.stats.builds_cancelled += 1;
        }
        if self.mesh_store.mark_pending(key) {
            self.upload_queue.push(SectionMesh {
                key,
                solid: MeshData::new(),
                transparent: MeshData::new(),
            });
        }
        self.stats.builds_skipped += 1;
    }

    fn dispatch(&mut self, event: WorldEvent) {
        let sections = self.context.dimensions.sections();
        match event {
            WorldEvent::ChunkLoaded { position } => {
                self.mesh_store.insert_chunk(position, sections);
                self.stats.chunks_loaded += 1;
            }
            WorldEvent::ChunkUnloaded { position } => {
                let cancelled = self.pipeline.cancel_chunk(position, sections);
                let discarded = self.upload_queue.purge_chunk(position);
                self.mesh_store.remove_chunk(position, &mut self.uploader);
                self.stats.builds_cancelled += cancelled as u64;
                self.stats.uploads_discarded += discarded as u64;
                self.stats.chunks_unloaded += 1;
            }
            WorldEvent::ChunkEdited { key } => {
                if self.pipeline.cancel(key) {
                    trace!("Edit cancelled in-flight build of {:?}", key);
                    self.stats.builds_cancelled += 1;
                }
            }
            WorldEvent::BuildCompleted {
                key,
                generation,
                result,
            } => match self.pipeline.complete(key, generation, result) {
                BuildOutcome::Ready(mesh) => {
                    self.stats.builds_completed += 1;
                    if self.mesh_store.mark_pending(key) {
                        self.upload_queue.push(mesh);
                    } else {
                        trace!("Build of {:?} finished after its chunk left", key);
                    }
                }
                BuildOutcome::Failed(err) => {
                    warn!("Build of {:?} failed: {}", key, err);
                    self.stats.builds_failed += 1;
                    self.world.mark_dirty(key);
                }
                BuildOutcome::Stale => {
                    self.stats.builds_stale += 1;
                }
            },
        }
    }

    /// Sections that are drawable and inside the observer's frustum.
    pub fn visible_sections(&self, observer: &dyn Observer) -> Vec<RenderableSection> {
        let frustum = Frustum::from_view_projection(observer.view_projection());
        render_set(
            &self.mesh_store,
            &frustum,
            observer.position().y,
            &self.context.dimensions,
        )
    }

    /// Writes a block at a world-space coordinate.
    ///
    /// # Returns
    /// `false` if the coordinate is not inside a loaded chunk.
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, id: BlockId) -> bool {
        self.world.set_block_at_world(x, y, z, id)
    }

    /// Reads a block at a world-space coordinate; unloaded space reads as air.
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> BlockId {
        self.world.get_block_at_world(x, y, z)
    }

    /// Whether no build or upload is outstanding.
    pub fn is_idle(&self) -> bool {
        self.pipeline.in_flight_count() == 0 && self.upload_queue.is_empty()
    }

    /// Counters since construction.
    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// The chunk graph.
    pub fn world(&self) -> &World {
        &self.world
    }

    /// The chunk graph, for direct edits.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Resident meshes of all loaded chunks.
    pub fn mesh_store(&self) -> &MeshStore {
        &self.mesh_store
    }

    /// The GPU boundary.
    pub fn uploader(&self) -> &U {
        &self.uploader
    }

    /// The engine's configuration and collaborators.
    pub fn context(&self) -> &EngineContext {
        &self.context
    }
}

impl<U: GpuUploader> Drop for EngineState<U> {
    fn drop(&mut self) {
        let positions: Vec<ChunkPosition> = self.world.positions().collect();
        for position in positions {
            self.mesh_store.remove_chunk(position, &mut self.uploader);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use cgmath::Deg;

    use super::*;
    use crate::engine_state::{
        buffer_state::recording::RecordingUploader,
        camera_state::{
            camera::{Camera, Projection},
            CameraObserver,
        },
        rendering::{mesh_store::MeshSlot, meshing::build_section_mesh},
        voxels::{
            block::{block_type::BlockType, BlockRegistry},
            populator::FlatPopulator,
        },
    };

    fn config(view_distance: u32) -> EngineConfig {
        EngineConfig {
            view_distance,
            chunk_width: 4,
            chunk_height: 8,
            section_height: 4,
            worker_count: 2,
            max_uploads_per_tick: 1,
        }
    }

    fn engine(view_distance: u32, layers: Vec<(BlockId, u32)>) -> EngineState<RecordingUploader> {
        let context = EngineContext::new(
            config(view_distance),
            Arc::new(BlockRegistry::default_palette()),
            Arc::new(FlatPopulator::new(layers)),
        )
        .unwrap();
        EngineState::new(context, RecordingUploader::default()).unwrap()
    }

    fn observer_at(x: f32, z: f32) -> CameraObserver {
        CameraObserver::new(
            Camera::new((x, 20.0, z), Deg(0.0), Deg(-80.0)),
            Projection::new(100, 100, Deg(90.0), 0.1, 100.0),
        )
    }

    fn settle(engine: &mut EngineState<RecordingUploader>, observer: &CameraObserver) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            engine.tick(observer);
            if engine.is_idle() || Instant::now() > deadline {
                break;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        assert!(engine.is_idle(), "engine did not settle: {:?}", engine.stats());
    }

    fn uploads_of(engine: &EngineState<RecordingUploader>, key: SectionKey) -> usize {
        let label = format!(
            "section ({}, {}, {}) solid",
            key.position.x, key.position.z, key.section
        );
        engine
            .uploader()
            .uploads
            .iter()
            .filter(|upload| **upload == label)
            .count()
    }

    #[test]
    fn loaded_terrain_becomes_visible() {
        let mut engine = engine(1, vec![(BlockType::STONE.id(), 3)]);
        let observer = observer_at(2.0, 2.0);
        settle(&mut engine, &observer);

        let stats = engine.stats();
        assert_eq!(stats.loaded_chunks, 1);
        assert_eq!(stats.uploads, 1);

        let key = SectionKey::new(ChunkPosition::new(0, 0), 0);
        assert!(matches!(
            engine.mesh_store().slot(key).unwrap().solid,
            MeshSlot::Resident(_)
        ));
        assert_eq!(
            engine.mesh_store().slot(SectionKey::new(key.position, 1)).unwrap().solid,
            MeshSlot::Absent
        );

        let visible = engine.visible_sections(&observer);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].key, key);
    }

    #[test]
    fn rescheduled_sections_upload_only_the_newest_build() {
        let mut engine = engine(1, vec![(BlockType::STONE.id(), 2)]);
        let observer = observer_at(2.0, 2.0);
        settle(&mut engine, &observer);
        let key = SectionKey::new(ChunkPosition::new(0, 0), 0);
        let before = uploads_of(&engine, key);

        assert!(engine.set_block(1, 2, 1, BlockType::DIRT.id()));
        engine.tick(&observer);
        assert!(engine.set_block(2, 2, 2, BlockType::DIRT.id()));
        settle(&mut engine, &observer);

        assert_eq!(uploads_of(&engine, key) - before, 1);
        assert!(engine.stats().builds_cancelled >= 1);

        let snapshot = engine.world_mut().snapshot_section(key).unwrap();
        let expected =
            build_section_mesh(&snapshot, &BlockRegistry::default_palette(), &|| false).unwrap();
        match engine.mesh_store().slot(key).unwrap().solid {
            MeshSlot::Resident(mesh) => assert_eq!(mesh.index_count, expected.solid.index_count()),
            other => panic!("unexpected slot {other:?}"),
        }
    }

    #[test]
    fn emptied_sections_drop_their_mesh_without_a_build() {
        let mut engine = engine(1, vec![(BlockType::STONE.id(), 1)]);
        let observer = observer_at(2.0, 2.0);
        settle(&mut engine, &observer);
        let key = SectionKey::new(ChunkPosition::new(0, 0), 0);
        assert!(matches!(
            engine.mesh_store().slot(key).unwrap().solid,
            MeshSlot::Resident(_)
        ));
        let before = engine.stats();

        for x in 0..4 {
            for z in 0..4 {
                assert!(engine.set_block(x, 0, z, BlockType::AIR.id()));
            }
        }
        settle(&mut engine, &observer);

        let after = engine.stats();
        assert_eq!(after.builds_scheduled, before.builds_scheduled);
        assert_eq!(after.builds_skipped, before.builds_skipped + 1);
        assert_eq!(engine.mesh_store().slot(key).unwrap().solid, MeshSlot::Absent);
        assert!(engine.uploader().live.is_empty());
    }

    #[test]
    fn eviction_releases_everything_the_chunk_owned() {
        let mut engine = engine(1, vec![(BlockType::STONE.id(), 3)]);
        settle(&mut engine, &observer_at(2.0, 2.0));
        assert!(!engine.uploader().live.is_empty());

        let far = observer_at(22.0, 2.0);
        settle(&mut engine, &far);

        assert!(engine.mesh_store().bundle(ChunkPosition::new(0, 0)).is_none());
        assert!(engine.world().get_chunk(ChunkPosition::new(0, 0)).is_none());
        assert!(engine.mesh_store().bundle(ChunkPosition::new(5, 0)).is_some());
        assert_eq!(engine.uploader().live.len(), 2);
        assert_eq!(engine.stats().chunks_unloaded, 1);
    }

    #[test]
    fn failed_builds_are_retried() {
        let mut engine = engine(1, vec![(999, 1)]);
        let observer = observer_at(2.0, 2.0);
        let deadline = Instant::now() + Duration::from_secs(5);
        while engine.stats().builds_failed < 2 && Instant::now() < deadline {
            engine.tick(&observer);
            std::thread::sleep(Duration::from_millis(1));
        }

        assert!(engine.stats().builds_failed >= 2);
        assert_eq!(engine.stats().uploads, 0);
    }

    #[test]
    fn invalid_configuration_is_fatal() {
        let mut bad = config(1);
        bad.chunk_width = 3;
        let result = EngineContext::new(
            bad,
            Arc::new(BlockRegistry::default_palette()),
            Arc::new(FlatPopulator::new(vec![])),
        );
        assert!(matches!(result, Err(EngineError::Config(_))));
    }
}
