//! Task that builds the geometry of one section on a worker thread.
//!
//! The task owns a snapshot of the section and a ticket shared with the build
//! pipeline. The ticket holds the generation of the newest job for the section;
//! once it moves past this task's generation the task is stale and quietly
//! produces nothing. The ticket is checked before the build starts, between
//! layers, and once more before the result is published.

use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use log::{error, trace};

use crate::engine_state::{
    events::WorldEvent,
    rendering::meshing::{build_section_mesh, BuildError},
    task_management::task::{Task, TaskResult},
    voxels::{
        block::BlockMetadata,
        chunk::{SectionKey, SectionSnapshot},
    },
};

/// Builds one section from its snapshot.
pub struct SectionMeshTask {
    /// Section being built
    key: SectionKey,
    /// Generation this job was submitted with
    generation: u64,
    /// Newest generation requested for `key`
    ticket: Arc<AtomicU64>,
    /// Owned copy of the section and its border
    snapshot: SectionSnapshot,
    /// Block metadata shared by every worker
    blocks: Arc<dyn BlockMetadata>,
}

impl SectionMeshTask {
    /// Creates a new section build.
    ///
    /// # Arguments
    /// * `generation` - Generation assigned by the build pipeline
    /// * `ticket` - The section's cancellation ticket
    /// * `snapshot` - Section contents captured on the main thread
    /// * `blocks` - Block metadata
    pub fn new(
        generation: u64,
        ticket: Arc<AtomicU64>,
        snapshot: SectionSnapshot,
        blocks: Arc<dyn BlockMetadata>,
    ) -> Self {
        SectionMeshTask {
            key: snapshot.key(),
            generation,
            ticket,
            snapshot,
            blocks,
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_string(),
            Err(_) => "unknown panic payload".to_string(),
        },
    }
}

impl Task for SectionMeshTask {
    fn process(&self) -> Box<dyn TaskResult> {
        if self.is_cancelled() {
            trace!("Skipping stale build of {:?}", self.key);
            return Box::new(SectionMeshTaskResult { event: None });
        }

        let is_cancelled = || self.is_cancelled();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            build_section_mesh(&self.snapshot, self.blocks.as_ref(), &is_cancelled)
        }))
        .unwrap_or_else(|payload| {
            let message = panic_message(payload);
            error!("Mesher panicked while building {:?}: {}", self.key, message);
            Err(BuildError::Panicked(message))
        });

        if matches!(result, Err(BuildError::Cancelled)) || self.is_cancelled() {
            return Box::new(SectionMeshTaskResult { event: None });
        }

        Box::new(SectionMeshTaskResult {
            event: Some(WorldEvent::BuildCompleted {
                key: self.key,
                generation: self.generation,
                result,
            }),
        })
    }

    fn is_cancelled(&self) -> bool {
        self.ticket.load(Ordering::Acquire) != self.generation
    }
}

/// Outcome of a [`SectionMeshTask`]; `None` when the build was superseded.
pub struct SectionMeshTaskResult {
    event: Option<WorldEvent>,
}

impl TaskResult for SectionMeshTaskResult {
    fn handle_result(self: Box<Self>) -> Option<WorldEvent> {
        self.event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::voxels::{
        block::{block_side::BlockSide, block_type::BlockType, BlockId, BlockRegistry, BlockShape},
        chunk::ChunkPosition,
    };

    fn snapshot() -> SectionSnapshot {
        let mut snapshot =
            SectionSnapshot::new(SectionKey::new(ChunkPosition::new(1, 1), 0), 4, 4);
        snapshot.set(1, 1, 1, BlockType::STONE.id());
        snapshot
    }

    fn task(generation: u64, ticket: &Arc<AtomicU64>, blocks: Arc<dyn BlockMetadata>) -> SectionMeshTask {
        SectionMeshTask::new(generation, ticket.clone(), snapshot(), blocks)
    }

    struct PanickingBlocks;

    impl BlockMetadata for PanickingBlocks {
        fn is_known(&self, _id: BlockId) -> bool {
            panic!("registry unavailable")
        }
        fn is_transparent(&self, _id: BlockId) -> bool {
            false
        }
        fn shape(&self, _id: BlockId) -> BlockShape {
            BlockShape::Full
        }
        fn texture_index(&self, _id: BlockId, _side: BlockSide) -> u32 {
            0
        }
        fn draws_between(&self, _id: BlockId) -> bool {
            false
        }
    }

    #[test]
    fn current_builds_publish_their_mesh() {
        let ticket = Arc::new(AtomicU64::new(7));
        let event = task(7, &ticket, Arc::new(BlockRegistry::default_palette()))
            .process()
            .handle_result();

        match event {
            Some(WorldEvent::BuildCompleted {
                key,
                generation,
                result: Ok(mesh),
            }) => {
                assert_eq!(key, SectionKey::new(ChunkPosition::new(1, 1), 0));
                assert_eq!(generation, 7);
                assert_eq!(mesh.solid.quad_count(), 6);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn superseded_builds_publish_nothing() {
        let ticket = Arc::new(AtomicU64::new(8));
        let task = task(7, &ticket, Arc::new(BlockRegistry::default_palette()));
        assert!(task.is_cancelled());
        assert!(task.process().handle_result().is_none());
    }

    #[test]
    fn panics_become_build_errors() {
        let ticket = Arc::new(AtomicU64::new(1));
        let event = task(1, &ticket, Arc::new(PanickingBlocks)).process().handle_result();
        match event {
            Some(WorldEvent::BuildCompleted {
                result: Err(BuildError::Panicked(message)),
                ..
            }) => assert_eq!(message, "registry unavailable"),
            other => panic!("unexpected result {other:?}"),
        }
    }
}
