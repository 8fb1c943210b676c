//! # Upload Queue
//!
//! Hand-off between finished builds and GPU-resident meshes. Descriptors are
//! queued in arrival order, one entry per section: a newer descriptor for a
//! section that is already waiting replaces the old one in place and keeps its
//! position.
//!
//! [`UploadQueue::drain_one_tick`] performs at most `max_uploads` uploads per
//! call so a burst of finished builds never stalls a frame. Descriptors whose
//! chunk was evicted are discarded without counting against the budget, and so
//! are descriptors with no geometry, since installing them allocates nothing.

use std::collections::{HashMap, VecDeque};

use log::{error, trace};

use crate::engine_state::{
    buffer_state::{GpuMesh, GpuUploader, UploadError},
    voxels::chunk::{ChunkPosition, SectionKey},
};

use super::{
    mesh_store::MeshStore,
    meshing::{MeshData, SectionMesh},
};

/// What one [`UploadQueue::drain_one_tick`] call did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UploadTick {
    /// Sections uploaded (counted against the budget)
    pub uploaded: usize,
    /// Sections whose descriptor had no geometry
    pub emptied: usize,
    /// Descriptors dropped because their chunk is gone
    pub discarded: usize,
    /// Uploads that failed
    pub failed: usize,
}

/// Completed section descriptors waiting for the GPU.
#[derive(Debug, Default)]
pub struct UploadQueue {
    order: VecDeque<SectionKey>,
    pending: HashMap<SectionKey, SectionMesh>,
}

fn upload_pass(
    uploader: &mut dyn GpuUploader,
    label: String,
    mesh: &MeshData,
) -> Result<Option<GpuMesh>, UploadError> {
    if mesh.is_empty() {
        return Ok(None);
    }
    uploader.upload(&label, mesh).map(Some)
}

impl UploadQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a descriptor, replacing any descriptor already waiting for its section.
    ///
    /// # Returns
    /// `true` if an older descriptor was replaced.
    pub fn push(&mut self, mesh: SectionMesh) -> bool {
        let key = mesh.key;
        match self.pending.insert(key, mesh) {
            Some(_) => {
                trace!("Replaced waiting descriptor of {:?}", key);
                true
            }
            None => {
                self.order.push_back(key);
                false
            }
        }
    }

    /// Drops every waiting descriptor of an evicted chunk.
    ///
    /// # Returns
    /// The number of descriptors dropped.
    pub fn purge_chunk(&mut self, position: ChunkPosition) -> usize {
        let before = self.pending.len();
        self.pending.retain(|key, _| key.position != position);
        self.order.retain(|key| key.position != position);
        before - self.pending.len()
    }

    /// Number of descriptors waiting.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Whether a descriptor for `key` is waiting.
    pub fn contains(&self, key: SectionKey) -> bool {
        self.pending.contains_key(&key)
    }

    /// Uploads waiting descriptors in arrival order.
    ///
    /// # Arguments
    /// * `store` - Receives the resident meshes
    /// * `uploader` - Creates and destroys GPU buffers
    /// * `max_uploads` - Upload budget for this call
    pub fn drain_one_tick(
        &mut self,
        store: &mut MeshStore,
        uploader: &mut dyn GpuUploader,
        max_uploads: usize,
    ) -> UploadTick {
        let mut tick = UploadTick::default();

        while tick.uploaded < max_uploads {
            let Some(key) = self.order.pop_front() else {
                break;
            };
            let Some(mesh) = self.pending.remove(&key) else {
                continue;
            };

            if !store.contains_chunk(key.position) {
                trace!("Discarding descriptor of evicted {:?}", key);
                tick.discarded += 1;
                continue;
            }

            if mesh.is_empty() {
                store.install(key, None, None, uploader);
                tick.emptied += 1;
                continue;
            }

            let label = format!(
                "section ({}, {}, {})",
                key.position.x, key.position.z, key.section
            );
            let solid = upload_pass(uploader, format!("{label} solid"), &mesh.solid);
            let transparent =
                upload_pass(uploader, format!("{label} transparent"), &mesh.transparent);
            tick.uploaded += 1;

            match (solid, transparent) {
                (Ok(solid), Ok(transparent)) => {
                    store.install(key, solid, transparent, uploader);
                }
                (solid, transparent) => {
                    for result in [&solid, &transparent] {
                        if let Err(err) = result {
                            error!("Upload of {} failed: {}", label, err);
                        }
                    }
                    for mesh in [solid, transparent].into_iter().flatten().flatten() {
                        uploader.release(mesh);
                    }
                    store.install(key, None, None, uploader);
                    tick.failed += 1;
                }
            }
        }

        tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_state::{
        buffer_state::recording::RecordingUploader,
        rendering::{mesh_store::MeshSlot, meshing::mesh::Face},
        voxels::block::block_side::BlockSide,
    };

    fn key(x: i32, section: u32) -> SectionKey {
        SectionKey::new(ChunkPosition::new(x, 0), section)
    }

    fn mesh(key: SectionKey, quads: usize) -> SectionMesh {
        let mut solid = MeshData::new();
        for i in 0..quads {
            solid.push_face(&Face::new(i, 0, 0, 1, BlockSide::TOP), 0);
        }
        SectionMesh {
            key,
            solid,
            transparent: MeshData::new(),
        }
    }

    fn store_with(positions: &[i32]) -> MeshStore {
        let mut store = MeshStore::new();
        for x in positions {
            store.insert_chunk(ChunkPosition::new(*x, 0), 4);
        }
        store
    }

    #[test]
    fn uploads_are_bounded_per_tick() {
        let mut queue = UploadQueue::new();
        let mut store = store_with(&[0]);
        let mut uploader = RecordingUploader::default();
        for section in 0..3 {
            queue.push(mesh(key(0, section), 1));
        }

        let tick = queue.drain_one_tick(&mut store, &mut uploader, 1);
        assert_eq!(tick.uploaded, 1);
        assert_eq!(queue.len(), 2);
        assert!(matches!(store.slot(key(0, 0)).unwrap().solid, MeshSlot::Resident(_)));

        let tick = queue.drain_one_tick(&mut store, &mut uploader, 5);
        assert_eq!(tick.uploaded, 2);
        assert!(queue.is_empty());
    }

    #[test]
    fn newer_descriptors_replace_waiting_ones_in_place() {
        let mut queue = UploadQueue::new();
        let mut store = store_with(&[0]);
        let mut uploader = RecordingUploader::default();

        assert!(!queue.push(mesh(key(0, 0), 1)));
        assert!(!queue.push(mesh(key(0, 1), 1)));
        assert!(queue.push(mesh(key(0, 0), 3)));
        assert_eq!(queue.len(), 2);

        queue.drain_one_tick(&mut store, &mut uploader, 1);
        match store.slot(key(0, 0)).unwrap().solid {
            MeshSlot::Resident(gpu) => assert_eq!(gpu.index_count, 18),
            other => panic!("unexpected slot {other:?}"),
        }
        assert_eq!(uploader.uploads.len(), 1);
    }

    #[test]
    fn evicted_chunks_are_discarded_without_using_the_budget() {
        let mut queue = UploadQueue::new();
        let mut store = store_with(&[1]);
        let mut uploader = RecordingUploader::default();

        queue.push(mesh(key(0, 0), 1));
        queue.push(mesh(key(0, 1), 1));
        queue.push(mesh(key(1, 0), 1));

        let tick = queue.drain_one_tick(&mut store, &mut uploader, 1);
        assert_eq!(tick.discarded, 2);
        assert_eq!(tick.uploaded, 1);
        assert_eq!(uploader.uploads, vec!["section (1, 0, 0) solid".to_string()]);
    }

    #[test]
    fn purged_chunks_never_upload() {
        let mut queue = UploadQueue::new();
        let mut store = store_with(&[0, 1]);
        let mut uploader = RecordingUploader::default();

        queue.push(mesh(key(0, 0), 1));
        queue.push(mesh(key(1, 0), 1));
        assert_eq!(queue.purge_chunk(ChunkPosition::new(0, 0)), 1);

        queue.drain_one_tick(&mut store, &mut uploader, 10);
        assert_eq!(uploader.uploads.len(), 1);
        assert!(!queue.contains(key(0, 0)));
    }

    #[test]
    fn empty_descriptors_clear_the_slot_for_free() {
        let mut queue = UploadQueue::new();
        let mut store = store_with(&[0]);
        let mut uploader = RecordingUploader::default();

        queue.push(mesh(key(0, 0), 1));
        queue.drain_one_tick(&mut store, &mut uploader, 1);
        queue.push(mesh(key(0, 0), 0));
        queue.push(mesh(key(0, 1), 1));

        let tick = queue.drain_one_tick(&mut store, &mut uploader, 1);
        assert_eq!(tick.emptied, 1);
        assert_eq!(tick.uploaded, 1);
        assert_eq!(store.slot(key(0, 0)).unwrap().solid, MeshSlot::Absent);
        assert_eq!(uploader.released.len(), 1);
    }

    #[test]
    fn failed_uploads_leave_the_section_without_a_mesh() {
        let mut queue = UploadQueue::new();
        let mut store = store_with(&[0]);
        let mut uploader = RecordingUploader::failing(UploadError::OutOfMemory {
            label: "test".into(),
        });

        queue.push(mesh(key(0, 0), 1));
        let tick = queue.drain_one_tick(&mut store, &mut uploader, 1);
        assert_eq!(tick.failed, 1);
        assert_eq!(store.slot(key(0, 0)).unwrap().solid, MeshSlot::Absent);
        assert!(uploader.live.is_empty());
    }
}
