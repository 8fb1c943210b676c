//! # World Events
//!
//! Every state change that crosses a component boundary travels as a
//! [`WorldEvent`] through the [`EventBus`]. Producers are the world (load, unload,
//! edit) and the task manager (finished builds); the single consumer is the
//! engine's dispatcher, which matches on the closed enum exhaustively.
//!
//! The bus is an unbounded `std::sync::mpsc` channel. Publishing never blocks, and
//! draining happens once per tick on the main thread.

use std::sync::mpsc::{channel, Receiver, Sender};

use log::trace;

use super::{
    rendering::meshing::{BuildError, SectionMesh},
    voxels::chunk::{ChunkPosition, SectionKey},
};

/// A change the dispatcher has to react to.
#[derive(Debug)]
pub enum WorldEvent {
    /// A chunk finished population and joined the world.
    ChunkLoaded {
        /// The admitted chunk
        position: ChunkPosition,
    },
    /// A chunk left the world and its voxel data was freed.
    ChunkUnloaded {
        /// The evicted chunk
        position: ChunkPosition,
    },
    /// A voxel edit invalidated a section's geometry.
    ChunkEdited {
        /// The section that became dirty
        key: SectionKey,
    },
    /// A worker finished (or failed) building a section.
    BuildCompleted {
        /// Section that was built
        key: SectionKey,
        /// Generation the job was submitted with
        generation: u64,
        /// Built geometry or the reason the build failed
        result: Result<SectionMesh, BuildError>,
    },
}

/// Sending half of the bus, cloned into every producer.
pub type EventSender = Sender<WorldEvent>;

/// Publishes `event`, dropping it if the bus is gone.
pub fn emit(sender: &EventSender, event: WorldEvent) {
    if let Err(err) = sender.send(event) {
        trace!("Event bus closed, dropping {:?}", err.0);
    }
}

/// Multi-producer, single-consumer queue of [`WorldEvent`]s.
pub struct EventBus {
    sender: EventSender,
    receiver: Receiver<WorldEvent>,
}

impl EventBus {
    /// Creates an empty bus.
    pub fn new() -> Self {
        let (sender, receiver) = channel();
        Self { sender, receiver }
    }

    /// A new producer handle.
    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// Takes every event published so far, in arrival order.
    pub fn drain(&self) -> Vec<WorldEvent> {
        self.receiver.try_iter().collect()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
