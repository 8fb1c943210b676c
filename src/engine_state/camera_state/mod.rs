//! # Camera State Management
//!
//! The engine only needs two things from whoever is looking at the world: where
//! they are, and the projection × view matrix they render with. Both come through
//! the [`Observer`] trait so the engine can be driven by a real camera or by a
//! scripted path in tests and headless runs.
//!
//! ## Core Components
//! - `Camera`: Position and orientation in 3D space
//! - `Projection`: Perspective projection settings
//! - `Frustum`: Clip planes used to select visible chunks
//! - `CameraObserver`: Camera and projection bundled as an `Observer`

use cgmath::{Matrix4, Point3};

pub mod camera;
pub mod frustum;

use camera::{Camera, Projection};

/// The viewpoint the world is streamed and culled around.
pub trait Observer {
    /// World-space position.
    fn position(&self) -> Point3<f32>;

    /// Combined projection × view matrix.
    fn view_projection(&self) -> Matrix4<f32>;
}

/// A camera with its projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraObserver {
    /// The current camera position and orientation
    pub camera: Camera,
    /// Projection used for rendering and culling
    pub projection: Projection,
}

impl CameraObserver {
    /// Bundles a camera with its projection.
    pub fn new(camera: Camera, projection: Projection) -> Self {
        Self { camera, projection }
    }
}

impl Observer for CameraObserver {
    fn position(&self) -> Point3<f32> {
        self.camera.position
    }

    fn view_projection(&self) -> Matrix4<f32> {
        self.projection.calc_matrix() * self.camera.calc_matrix()
    }
}
