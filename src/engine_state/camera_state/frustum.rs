//! View frustum culling.
//!
//! The six clip planes are extracted from the combined projection × view matrix
//! (Gribb/Hartmann). Depth follows the WGPU convention of `[0, 1]`, so the near
//! plane is the third row on its own rather than `row3 + row2`.

use cgmath::{InnerSpace, Matrix, Matrix4, Point3, Vector4};

use crate::engine_state::voxels::chunk::{ChunkDimensions, ChunkPosition};

/// Six inward-facing planes `(a, b, c, d)` with `a*x + b*y + c*z + d >= 0` inside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    planes: [Vector4<f32>; 6],
}

fn normalize_plane(plane: Vector4<f32>) -> Vector4<f32> {
    let length = plane.truncate().magnitude();
    if length > f32::EPSILON {
        plane / length
    } else {
        plane
    }
}

impl Frustum {
    /// Extracts the frustum of a projection × view matrix.
    pub fn from_view_projection(matrix: Matrix4<f32>) -> Self {
        let r0 = matrix.row(0);
        let r1 = matrix.row(1);
        let r2 = matrix.row(2);
        let r3 = matrix.row(3);

        Self {
            planes: [
                normalize_plane(r3 + r0),
                normalize_plane(r3 - r0),
                normalize_plane(r3 + r1),
                normalize_plane(r3 - r1),
                normalize_plane(r2),
                normalize_plane(r3 - r2),
            ],
        }
    }

    /// Whether any part of the axis-aligned box lies inside.
    ///
    /// Conservative: boxes near a frustum corner may be reported visible even
    /// though they are not.
    pub fn contains_aabb(&self, min: Point3<f32>, max: Point3<f32>) -> bool {
        self.planes.iter().all(|plane| {
            let x = if plane.x >= 0.0 { max.x } else { min.x };
            let y = if plane.y >= 0.0 { max.y } else { min.y };
            let z = if plane.z >= 0.0 { max.z } else { min.z };
            plane.x * x + plane.y * y + plane.z * z + plane.w >= 0.0
        })
    }

    /// Whether a chunk's bounding box intersects the frustum.
    ///
    /// # Arguments
    /// * `position` - The chunk
    /// * `occupied` - Lowest and highest section with geometry, if known
    /// * `observer_y` - Vertical bound used when no section is known
    /// * `dimensions` - Chunk size
    pub fn is_chunk_inside(
        &self,
        position: ChunkPosition,
        occupied: Option<(u32, u32)>,
        observer_y: f32,
        dimensions: &ChunkDimensions,
    ) -> bool {
        let (min, max) = chunk_bounds(position, occupied, observer_y, dimensions);
        self.contains_aabb(min, max)
    }
}

/// World-space bounding box of a chunk.
///
/// The horizontal footprint is fixed; the vertical extent spans the occupied
/// sections, or collapses to `observer_y` when none is known.
pub fn chunk_bounds(
    position: ChunkPosition,
    occupied: Option<(u32, u32)>,
    observer_y: f32,
    dimensions: &ChunkDimensions,
) -> (Point3<f32>, Point3<f32>) {
    let width = dimensions.width() as f32;
    let section_height = dimensions.section_height() as f32;
    let (min_y, max_y) = match occupied {
        Some((lowest, highest)) => (
            lowest as f32 * section_height,
            (highest + 1) as f32 * section_height,
        ),
        None => (observer_y, observer_y),
    };

    let min_x = position.x as f32 * width;
    let min_z = position.z as f32 * width;
    (
        Point3::new(min_x, min_y, min_z),
        Point3::new(min_x + width, max_y, min_z + width),
    )
}

#[cfg(test)]
mod tests {
    use cgmath::Deg;

    use super::*;
    use crate::engine_state::camera_state::camera::{Camera, Projection};

    fn frustum() -> Frustum {
        let camera = Camera::new((0.0, 0.0, 0.0), Deg(0.0), Deg(0.0));
        let projection = Projection::new(100, 100, Deg(90.0), 0.1, 100.0);
        Frustum::from_view_projection(projection.calc_matrix() * camera.calc_matrix())
    }

    fn cube(x: f32, y: f32, z: f32) -> (Point3<f32>, Point3<f32>) {
        (Point3::new(x - 0.5, y - 0.5, z - 0.5), Point3::new(x + 0.5, y + 0.5, z + 0.5))
    }

    #[test]
    fn boxes_in_front_are_inside() {
        let (min, max) = cube(10.0, 0.0, 0.0);
        assert!(frustum().contains_aabb(min, max));
    }

    #[test]
    fn boxes_behind_beside_or_beyond_are_outside() {
        let frustum = frustum();
        for (x, y, z) in [(-10.0, 0.0, 0.0), (10.0, 0.0, 50.0), (10.0, 50.0, 0.0), (200.0, 0.0, 0.0)] {
            let (min, max) = cube(x, y, z);
            assert!(!frustum.contains_aabb(min, max), "({x}, {y}, {z})");
        }
    }

    #[test]
    fn boxes_straddling_a_plane_are_inside() {
        let (min, max) = (Point3::new(5.0, -1.0, -20.0), Point3::new(6.0, 1.0, 0.0));
        assert!(frustum().contains_aabb(min, max));
    }

    #[test]
    fn chunk_bounds_follow_occupied_sections() {
        let dimensions = ChunkDimensions::new(16, 64, 16).unwrap();
        let (min, max) = chunk_bounds(ChunkPosition::new(-1, 2), Some((1, 2)), 0.0, &dimensions);
        assert_eq!(min, Point3::new(-16.0, 16.0, 32.0));
        assert_eq!(max, Point3::new(0.0, 48.0, 48.0));

        let (min, max) = chunk_bounds(ChunkPosition::new(0, 0), None, 7.5, &dimensions);
        assert_eq!((min.y, max.y), (7.5, 7.5));
    }

    #[test]
    fn chunks_behind_the_camera_are_culled() {
        let dimensions = ChunkDimensions::new(16, 64, 16).unwrap();
        let frustum = frustum();
        assert!(frustum.is_chunk_inside(ChunkPosition::new(1, -1), Some((0, 0)), 0.0, &dimensions));
        assert!(!frustum.is_chunk_inside(ChunkPosition::new(-3, -1), Some((0, 3)), 0.0, &dimensions));
    }
}
