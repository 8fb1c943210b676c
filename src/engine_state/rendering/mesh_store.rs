//! Per-chunk bookkeeping of GPU-resident section meshes.
//!
//! Every loaded chunk owns a [`MeshBundle`] with one [`SectionSlot`] per section.
//! A slot moves `Absent -> PendingUpload -> Resident` and may go back to
//! `PendingUpload` while a newer descriptor waits; the previous resident mesh
//! keeps being drawn until its replacement is installed.

use std::collections::HashMap;

use crate::engine_state::{
    buffer_state::{GpuMesh, GpuUploader},
    voxels::chunk::{ChunkPosition, SectionKey},
};

/// State of one material pass of one section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MeshSlot {
    /// Nothing to draw.
    #[default]
    Absent,
    /// A descriptor is waiting in the upload queue; `previous` is still drawn.
    PendingUpload {
        /// Mesh that stays visible until the upload completes
        previous: Option<GpuMesh>,
    },
    /// Mesh is on the GPU.
    Resident(GpuMesh),
}

impl MeshSlot {
    /// The mesh that can be drawn right now, if any.
    pub fn drawable(&self) -> Option<GpuMesh> {
        match *self {
            MeshSlot::Absent => None,
            MeshSlot::PendingUpload { previous } => previous,
            MeshSlot::Resident(mesh) => Some(mesh),
        }
    }

    fn mark_pending(&mut self) {
        *self = MeshSlot::PendingUpload {
            previous: self.drawable(),
        };
    }

    fn take(&mut self) -> Option<GpuMesh> {
        std::mem::take(self).drawable()
    }
}

/// Solid and transparent slots of one section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectionSlot {
    /// Opaque geometry
    pub solid: MeshSlot,
    /// Transparent geometry
    pub transparent: MeshSlot,
}

impl SectionSlot {
    /// Whether either pass has something to draw.
    pub fn is_drawable(&self) -> bool {
        self.solid.drawable().is_some() || self.transparent.drawable().is_some()
    }
}

/// Mesh slots of every section of one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshBundle {
    sections: Vec<SectionSlot>,
}

impl MeshBundle {
    fn new(sections: u32) -> Self {
        Self {
            sections: vec![SectionSlot::default(); sections as usize],
        }
    }

    /// Slots of every section, bottom to top.
    pub fn sections(&self) -> &[SectionSlot] {
        &self.sections
    }

    /// Lowest and highest section with something to draw.
    pub fn occupied_range(&self) -> Option<(u32, u32)> {
        let mut drawable = self
            .sections
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_drawable())
            .map(|(index, _)| index as u32);
        let first = drawable.next()?;
        let last = drawable.last().unwrap_or(first);
        Some((first, last))
    }
}

/// Mesh bundles of all loaded chunks.
#[derive(Debug, Default)]
pub struct MeshStore {
    bundles: HashMap<ChunkPosition, MeshBundle>,
}

impl MeshStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty bundle for a newly loaded chunk.
    pub fn insert_chunk(&mut self, position: ChunkPosition, sections: u32) {
        self.bundles
            .entry(position)
            .or_insert_with(|| MeshBundle::new(sections));
    }

    /// Drops a chunk's bundle and releases every GPU mesh it referenced.
    ///
    /// # Returns
    /// Whether the chunk had a bundle.
    pub fn remove_chunk(&mut self, position: ChunkPosition, uploader: &mut dyn GpuUploader) -> bool {
        let Some(mut bundle) = self.bundles.remove(&position) else {
            return false;
        };
        for slot in &mut bundle.sections {
            for mesh in [slot.solid.take(), slot.transparent.take()].into_iter().flatten() {
                uploader.release(mesh);
            }
        }
        true
    }

    /// Whether the chunk has a bundle.
    pub fn contains_chunk(&self, position: ChunkPosition) -> bool {
        self.bundles.contains_key(&position)
    }

    /// Bundle of a loaded chunk.
    pub fn bundle(&self, position: ChunkPosition) -> Option<&MeshBundle> {
        self.bundles.get(&position)
    }

    /// All bundles with their chunk coordinates.
    pub fn bundles(&self) -> impl Iterator<Item = (ChunkPosition, &MeshBundle)> {
        self.bundles.iter().map(|(position, bundle)| (*position, bundle))
    }

    /// Number of chunks with a bundle.
    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    /// Whether no chunk has a bundle.
    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    /// Slot of one section.
    pub fn slot(&self, key: SectionKey) -> Option<&SectionSlot> {
        self.bundles.get(&key.position)?.sections.get(key.section as usize)
    }

    fn slot_mut(&mut self, key: SectionKey) -> Option<&mut SectionSlot> {
        self.bundles
            .get_mut(&key.position)?
            .sections
            .get_mut(key.section as usize)
    }

    /// Flags a section as waiting for upload.
    ///
    /// # Returns
    /// `false` if the chunk has no bundle.
    pub fn mark_pending(&mut self, key: SectionKey) -> bool {
        let Some(slot) = self.slot_mut(key) else {
            return false;
        };
        slot.solid.mark_pending();
        slot.transparent.mark_pending();
        true
    }

    /// Installs freshly uploaded meshes, releasing the ones they replace.
    ///
    /// `None` leaves the pass empty.
    ///
    /// # Returns
    /// `false` if the chunk has no bundle; the new meshes are released then.
    pub fn install(
        &mut self,
        key: SectionKey,
        solid: Option<GpuMesh>,
        transparent: Option<GpuMesh>,
        uploader: &mut dyn GpuUploader,
    ) -> bool {
        let Some(slot) = self.slot_mut(key) else {
            for mesh in [solid, transparent].into_iter().flatten() {
                uploader.release(mesh);
            }
            return false;
        };

        let replaced = [slot.solid.take(), slot.transparent.take()];
        slot.solid = solid.map_or(MeshSlot::Absent, MeshSlot::Resident);
        slot.transparent = transparent.map_or(MeshSlot::Absent, MeshSlot::Resident);
        for mesh in replaced.into_iter().flatten() {
            uploader.release(mesh);
        }
        true
    }
}
