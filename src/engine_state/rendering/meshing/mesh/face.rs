use cgmath::Point3;

use crate::engine_state::voxels::block::{block_side::BlockSide, BlockId};

/// Represents a single quad face of a voxel in the mesh.
///
/// A face is defined by four corner points (lower-left, lower-right, upper-right, upper-left)
/// and carries the block it belongs to and which side of the block it represents.
/// The greedy mesher grows faces by merging coplanar neighbors of the same block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Face {
    /// Lower-right corner of the face in section coordinates
    pub lr: Point3<usize>,
    /// Lower-left corner of the face in section coordinates
    pub ll: Point3<usize>,
    /// Upper-right corner of the face in section coordinates
    pub ur: Point3<usize>,
    /// Upper-left corner of the face in section coordinates
    pub ul: Point3<usize>,
    /// The block this face belongs to
    pub block: BlockId,
    /// Which side of the block this face represents
    pub block_side: BlockSide,
}

impl Face {
    /// Creates the `block_side` face of the voxel at (i, j, k).
    ///
    /// Corners are wound so that "right" runs along the face's row axis and "up"
    /// along +Y for the four walls and along +X for the top and bottom.
    pub fn new(i: usize, j: usize, k: usize, block: BlockId, block_side: BlockSide) -> Self {
        let (ll, lr, ul, ur) = match block_side {
            BlockSide::FRONT => (
                Point3::new(i, j, k),
                Point3::new(i, j, k + 1),
                Point3::new(i, j + 1, k),
                Point3::new(i, j + 1, k + 1),
            ),
            BlockSide::BACK => (
                Point3::new(i + 1, j, k + 1),
                Point3::new(i + 1, j, k),
                Point3::new(i + 1, j + 1, k + 1),
                Point3::new(i + 1, j + 1, k),
            ),
            BlockSide::BOTTOM => (
                Point3::new(i, j, k + 1),
                Point3::new(i, j, k),
                Point3::new(i + 1, j, k + 1),
                Point3::new(i + 1, j, k),
            ),
            BlockSide::TOP => (
                Point3::new(i, j + 1, k),
                Point3::new(i, j + 1, k + 1),
                Point3::new(i + 1, j + 1, k),
                Point3::new(i + 1, j + 1, k + 1),
            ),
            BlockSide::LEFT => (
                Point3::new(i + 1, j, k),
                Point3::new(i, j, k),
                Point3::new(i + 1, j + 1, k),
                Point3::new(i, j + 1, k),
            ),
            BlockSide::RIGHT => (
                Point3::new(i, j, k + 1),
                Point3::new(i + 1, j, k + 1),
                Point3::new(i, j + 1, k + 1),
                Point3::new(i + 1, j + 1, k + 1),
            ),
        };

        Face {
            ll,
            lr,
            ul,
            ur,
            block,
            block_side,
        }
    }

    fn is_mergeable_with(&self, other: &Face) -> bool {
        self.block == other.block && self.block_side == other.block_side
    }

    /// Attempts to merge this face with another face that is directly above it.
    ///
    /// # Returns
    /// `Some(merged_face)` if the faces share a block and their edges align perfectly.
    pub fn merge_up(&self, other: &Face) -> Option<Face> {
        if self.is_mergeable_with(other) && self.ul == other.ll && self.ur == other.lr {
            return Some(Face {
                ul: other.ul,
                ur: other.ur,
                ..*self
            });
        }

        None
    }

    /// Attempts to merge this face with another face that is directly to its right.
    ///
    /// # Returns
    /// `Some(merged_face)` if the faces share a block and their edges align perfectly.
    pub fn merge_right(&self, other: &Face) -> Option<Face> {
        if self.is_mergeable_with(other) && self.lr == other.ll && self.ur == other.ul {
            return Some(Face {
                ur: other.ur,
                lr: other.lr,
                ..*self
            });
        }

        None
    }

    /// Attempts to merge this face with another face that is directly to its left.
    ///
    /// # Returns
    /// `Some(merged_face)` if the faces share a block and their edges align perfectly.
    pub fn merge_left(&self, other: &Face) -> Option<Face> {
        if self.is_mergeable_with(other) && self.ll == other.lr && self.ul == other.ur {
            return Some(Face {
                ul: other.ul,
                ll: other.ll,
                ..*self
            });
        }

        None
    }

    /// Merges a face that sits next to this one within the same row, on either side.
    pub fn merge_in_row(&self, other: &Face) -> Option<Face> {
        self.merge_right(other).or_else(|| self.merge_left(other))
    }

    /// Width and height of the face, in voxels.
    pub fn extent(&self) -> (usize, usize) {
        let span = |a: Point3<usize>, b: Point3<usize>| {
            a.x.abs_diff(b.x) + a.y.abs_diff(b.y) + a.z.abs_diff(b.z)
        };
        (span(self.ll, self.lr), span(self.ll, self.ul))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn front_faces_merge_right_along_z() {
        let a = Face::new(0, 0, 0, 1, BlockSide::FRONT);
        let b = Face::new(0, 0, 1, 1, BlockSide::FRONT);
        let merged = a.merge_in_row(&b).unwrap();
        assert_eq!(merged.extent(), (2, 1));
        assert_eq!(merged.ll, Point3::new(0, 0, 0));
        assert_eq!(merged.ur, Point3::new(0, 1, 2));
    }

    #[test]
    fn back_faces_merge_left_along_z() {
        let a = Face::new(0, 0, 0, 1, BlockSide::BACK);
        let b = Face::new(0, 0, 1, 1, BlockSide::BACK);
        let merged = a.merge_in_row(&b).unwrap();
        assert_eq!(merged.extent(), (2, 1));
    }

    #[test]
    fn top_faces_merge_up_along_x() {
        let a = Face::new(0, 0, 0, 1, BlockSide::TOP);
        let b = Face::new(1, 0, 0, 1, BlockSide::TOP);
        assert_eq!(a.merge_up(&b).unwrap().extent(), (1, 2));
    }

    #[test]
    fn different_blocks_never_merge() {
        let a = Face::new(0, 0, 0, 1, BlockSide::RIGHT);
        let b = Face::new(1, 0, 0, 2, BlockSide::RIGHT);
        assert!(a.merge_in_row(&b).is_none());
    }

    #[test]
    fn misaligned_rows_do_not_merge_up() {
        let wide = Face::new(0, 0, 0, 1, BlockSide::RIGHT)
            .merge_in_row(&Face::new(1, 0, 0, 1, BlockSide::RIGHT))
            .unwrap();
        let narrow = Face::new(0, 1, 0, 1, BlockSide::RIGHT);
        assert!(wide.merge_up(&narrow).is_none());
    }
}
