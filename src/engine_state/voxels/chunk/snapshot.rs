//! # Section Snapshot
//!
//! An immutable copy of one section plus a one-voxel border, taken on the main
//! thread and handed to a mesh build worker.
//!
//! The border holds the boundary voxels of the four horizontal neighbors and of
//! the sections directly above and below, which is everything face culling at
//! the section's edges needs. Border cells with no loaded source read as air.
//! This mirrors the padded chunk layout the mesher always worked on, so the
//! worker never has to touch live world data.

use crate::engine_state::voxels::block::{BlockId, AIR};

use super::SectionKey;

/// Padded block ids for one section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionSnapshot {
    key: SectionKey,
    width: usize,
    height: usize,
    voxels: Vec<BlockId>,
}

impl SectionSnapshot {
    /// Creates an all-air snapshot for a `width` x `height` x `width` section.
    pub fn new(key: SectionKey, width: usize, height: usize) -> Self {
        let wrapped_width = width + 2;
        let wrapped_height = height + 2;
        Self {
            key,
            width,
            height,
            voxels: vec![AIR; wrapped_width * wrapped_height * wrapped_width],
        }
    }

    /// Section this snapshot was taken from.
    pub fn key(&self) -> SectionKey {
        self.key
    }

    /// Horizontal size of the section (without border).
    pub fn width(&self) -> usize {
        self.width
    }

    /// Vertical size of the section (without border).
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn wrapped_index(&self, x: i32, y: i32, z: i32) -> Option<usize> {
        let (w, h) = (self.width as i32, self.height as i32);
        if x < -1 || x > w || y < -1 || y > h || z < -1 || z > w {
            return None;
        }
        let wrapped_width = self.width + 2;
        let wrapped_height = self.height + 2;
        Some(
            (x + 1) as usize
                + wrapped_width * (y + 1) as usize
                + wrapped_width * wrapped_height * (z + 1) as usize,
        )
    }

    /// Block at a section-local coordinate. The border ring (-1 and `width`/`height`)
    /// is addressable; anything further out reads as air.
    #[inline]
    pub fn get(&self, x: i32, y: i32, z: i32) -> BlockId {
        self.wrapped_index(x, y, z)
            .map_or(AIR, |index| self.voxels[index])
    }

    /// Writes a block at a section-local coordinate, including the border ring.
    pub fn set(&mut self, x: i32, y: i32, z: i32, id: BlockId) {
        if let Some(index) = self.wrapped_index(x, y, z) {
            self.voxels[index] = id;
        }
    }
}
