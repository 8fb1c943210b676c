//! # Block Side Module
//!
//! This module defines the six faces of a voxel block and the unit offset
//! towards the voxel each face looks at.

/// Represents the six possible faces of a voxel block.
///
/// Each variant is assigned a unique integer value so it can index per-face
/// arrays such as texture tables.
///
/// The order is: [FRONT, BACK, BOTTOM, TOP, LEFT, RIGHT]
#[derive(PartialEq, Eq, Hash, Copy, Clone, Debug)]
pub enum BlockSide {
    /// The face looking towards negative X (west)
    FRONT = 0,

    /// The face looking towards positive X (east)
    BACK = 1,

    /// The face looking towards negative Y
    BOTTOM = 2,

    /// The face looking towards positive Y
    TOP = 3,

    /// The face looking towards negative Z (north)
    LEFT = 4,

    /// The face looking towards positive Z (south)
    RIGHT = 5,
}

impl BlockSide {
    /// Returns an array containing all six block faces in a consistent order.
    ///
    /// The order is: [FRONT, BACK, BOTTOM, TOP, LEFT, RIGHT]
    pub fn all() -> [BlockSide; 6] {
        [
            BlockSide::FRONT,
            BlockSide::BACK,
            BlockSide::BOTTOM,
            BlockSide::TOP,
            BlockSide::LEFT,
            BlockSide::RIGHT,
        ]
    }

    /// Offset from a voxel to the neighbor this face is shared with.
    pub fn normal(self) -> (i32, i32, i32) {
        match self {
            BlockSide::FRONT => (-1, 0, 0),
            BlockSide::BACK => (1, 0, 0),
            BlockSide::BOTTOM => (0, -1, 0),
            BlockSide::TOP => (0, 1, 0),
            BlockSide::LEFT => (0, 0, -1),
            BlockSide::RIGHT => (0, 0, 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminants_index_all() {
        for (i, side) in BlockSide::all().into_iter().enumerate() {
            assert_eq!(side as usize, i);
        }
    }

    #[test]
    fn opposite_faces_have_opposite_normals() {
        let pairs = [
            (BlockSide::FRONT, BlockSide::BACK),
            (BlockSide::BOTTOM, BlockSide::TOP),
            (BlockSide::LEFT, BlockSide::RIGHT),
        ];
        for (a, b) in pairs {
            let (ax, ay, az) = a.normal();
            let (bx, by, bz) = b.normal();
            assert_eq!((ax + bx, ay + by, az + bz), (0, 0, 0));
        }
    }
}
