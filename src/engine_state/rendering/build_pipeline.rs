//! # Build Pipeline
//!
//! Schedules section builds on the worker pool with single-flight semantics:
//! at most one live job per [`SectionKey`], and only the newest job's result is
//! ever accepted.
//!
//! ## Generations
//!
//! Every submission takes the next value of one monotonic counter. The pipeline
//! remembers the generation of the live job per key, and shares it with the job
//! through a ticket (`Arc<AtomicU64>`). Rescheduling or cancelling a key moves the
//! ticket, so the old job notices on its next check and publishes nothing. A
//! result that still slips through is rejected by [`BuildPipeline::complete`]
//! because its generation no longer matches.
//!
//! ## Per-key states
//!
//! `CLEAN -> DIRTY -> BUILDING -> CLEAN`, or `BUILDING -> DIRTY` when an edit lands
//! mid-flight. Dirty flags live on the chunks; this type only tracks `BUILDING`.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use log::{debug, trace};

use crate::engine_state::{
    task_management::TaskManager,
    voxels::{
        block::BlockMetadata,
        chunk::{ChunkPosition, SectionKey},
        world::World,
    },
};

use super::{
    meshing::{BuildError, SectionMesh},
    tasks::SectionMeshTask,
};

/// Ticket value that matches no generation.
const CANCELLED: u64 = 0;

/// What the main thread should do with a finished build.
#[derive(Debug)]
pub enum BuildOutcome {
    /// The newest build of the section succeeded.
    Ready(SectionMesh),
    /// The newest build of the section failed; the section should be rebuilt.
    Failed(BuildError),
    /// A newer build superseded this one, or the section was cancelled.
    Stale,
}

/// Tracks in-flight section builds and hands new ones to the worker pool.
pub struct BuildPipeline {
    next_generation: u64,
    in_flight: HashMap<SectionKey, u64>,
    tickets: HashMap<SectionKey, Arc<AtomicU64>>,
    blocks: Arc<dyn BlockMetadata>,
}

impl BuildPipeline {
    /// Creates an idle pipeline.
    ///
    /// # Arguments
    /// * `blocks` - Block metadata shared with every build job
    pub fn new(blocks: Arc<dyn BlockMetadata>) -> Self {
        BuildPipeline {
            next_generation: CANCELLED,
            in_flight: HashMap::new(),
            tickets: HashMap::new(),
            blocks,
        }
    }

    /// Snapshots a section and submits a build for it, superseding any build
    /// already in flight for the same key.
    ///
    /// # Returns
    /// `false` if the section could not be snapshotted (chunk not loaded).
    pub fn schedule(&mut self, world: &mut World, tasks: &mut TaskManager, key: SectionKey) -> bool {
        if self.cancel(key) {
            debug!("Superseding in-flight build of {:?}", key);
        }

        let Some(snapshot) = world.snapshot_section(key) else {
            trace!("Section {:?} vanished before it could be scheduled", key);
            return false;
        };

        self.next_generation += 1;
        let generation = self.next_generation;
        let ticket = self
            .tickets
            .entry(key)
            .or_insert_with(|| Arc::new(AtomicU64::new(CANCELLED)))
            .clone();
        ticket.store(generation, Ordering::Release);
        self.in_flight.insert(key, generation);

        tasks.publish_task(Box::new(SectionMeshTask::new(
            generation,
            ticket,
            snapshot,
            self.blocks.clone(),
        )));
        true
    }

    /// Cancels the in-flight build of `key`, if any.
    ///
    /// # Returns
    /// Whether a build was in flight.
    pub fn cancel(&mut self, key: SectionKey) -> bool {
        if let Some(ticket) = self.tickets.get(&key) {
            ticket.store(CANCELLED, Ordering::Release);
        }
        self.in_flight.remove(&key).is_some()
    }

    /// Cancels every build belonging to an evicted chunk and forgets its tickets.
    ///
    /// # Returns
    /// The number of builds that were in flight.
    pub fn cancel_chunk(&mut self, position: ChunkPosition, sections: u32) -> usize {
        let mut cancelled = 0;
        for section in 0..sections {
            let key = SectionKey::new(position, section);
            if self.cancel(key) {
                cancelled += 1;
            }
            self.tickets.remove(&key);
        }
        cancelled
    }

    /// Accepts or rejects a finished build.
    ///
    /// # Arguments
    /// * `key` - Section the build was for
    /// * `generation` - Generation the build was submitted with
    /// * `result` - What the worker produced
    pub fn complete(
        &mut self,
        key: SectionKey,
        generation: u64,
        result: Result<SectionMesh, BuildError>,
    ) -> BuildOutcome {
        if self.in_flight.get(&key) != Some(&generation) {
            trace!("Dropping stale build {} of {:?}", generation, key);
            return BuildOutcome::Stale;
        }

        self.in_flight.remove(&key);
        self.tickets.remove(&key);
        match result {
            Ok(mesh) => BuildOutcome::Ready(mesh),
            Err(err) => BuildOutcome::Failed(err),
        }
    }

    /// Number of sections currently being built.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Whether `key` has a build in flight.
    pub fn is_in_flight(&self, key: SectionKey) -> bool {
        self.in_flight.contains_key(&key)
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::engine_state::{
        events::{EventBus, WorldEvent},
        voxels::{
            block::{block_type::BlockType, BlockRegistry},
            chunk::ChunkDimensions,
            populator::FlatPopulator,
        },
    };

    fn setup() -> (World, EventBus, BuildPipeline) {
        let bus = EventBus::new();
        let populator = FlatPopulator::new(vec![(BlockType::STONE.id(), 3)]);
        let mut world = World::new(
            ChunkDimensions::new(4, 8, 4).unwrap(),
            1,
            Arc::new(populator),
            bus.sender(),
        );
        world.sync(ChunkPosition::new(0, 0));
        bus.drain();
        let pipeline = BuildPipeline::new(Arc::new(BlockRegistry::default_palette()));
        (world, bus, pipeline)
    }

    fn key(section: u32) -> SectionKey {
        SectionKey::new(ChunkPosition::new(0, 0), section)
    }

    #[test]
    fn rescheduling_keeps_a_single_build_in_flight() {
        let (mut world, _bus, mut pipeline) = setup();
        let mut tasks = TaskManager::new(0).unwrap();

        assert!(pipeline.schedule(&mut world, &mut tasks, key(0)));
        assert!(pipeline.schedule(&mut world, &mut tasks, key(0)));
        assert_eq!(pipeline.in_flight_count(), 1);

        assert!(matches!(
            pipeline.complete(key(0), 1, Err(BuildError::Cancelled)),
            BuildOutcome::Stale
        ));
        assert!(matches!(
            pipeline.complete(key(0), 2, Err(BuildError::Panicked("boom".into()))),
            BuildOutcome::Failed(BuildError::Panicked(_))
        ));
        assert!(!pipeline.is_in_flight(key(0)));
    }

    #[test]
    fn unloaded_sections_are_not_scheduled() {
        let (mut world, _bus, mut pipeline) = setup();
        let mut tasks = TaskManager::new(0).unwrap();
        let far = SectionKey::new(ChunkPosition::new(5, 5), 0);

        assert!(!pipeline.schedule(&mut world, &mut tasks, far));
        assert_eq!(pipeline.in_flight_count(), 0);
        assert_eq!(tasks.queued(), 0);
    }

    #[test]
    fn cancelled_chunks_reject_late_results() {
        let (mut world, _bus, mut pipeline) = setup();
        let mut tasks = TaskManager::new(0).unwrap();

        pipeline.schedule(&mut world, &mut tasks, key(0));
        pipeline.schedule(&mut world, &mut tasks, key(1));
        assert_eq!(pipeline.cancel_chunk(ChunkPosition::new(0, 0), 2), 2);
        assert_eq!(pipeline.in_flight_count(), 0);

        let mesh = SectionMesh {
            key: key(0),
            solid: Default::default(),
            transparent: Default::default(),
        };
        assert!(matches!(
            pipeline.complete(key(0), 1, Ok(mesh)),
            BuildOutcome::Stale
        ));

        // Both queued jobs now report themselves cancelled and are dropped.
        tasks.process_queued_tasks();
        assert_eq!(tasks.queued(), 0);
    }

    #[test]
    fn only_the_newest_of_two_builds_is_accepted() {
        let (mut world, bus, mut pipeline) = setup();
        let mut tasks = TaskManager::new(1).unwrap();

        pipeline.schedule(&mut world, &mut tasks, key(0));
        world.set_block(ChunkPosition::new(0, 0), 1, 3, 1, BlockType::DIRT.id());
        pipeline.schedule(&mut world, &mut tasks, key(0));

        let sender = bus.sender();
        let mut ready = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(5);
        while pipeline.in_flight_count() > 0 && Instant::now() < deadline {
            tasks.process_completed_tasks(&sender);
            tasks.process_queued_tasks();
            for event in bus.drain() {
                if let WorldEvent::BuildCompleted {
                    key,
                    generation,
                    result,
                } = event
                {
                    if let BuildOutcome::Ready(mesh) = pipeline.complete(key, generation, result) {
                        ready.push((generation, mesh));
                    }
                }
            }
            std::thread::sleep(Duration::from_millis(1));
        }

        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].0, 2);
        assert!(!ready[0].1.is_empty());
    }
}
