//! # Camera
//!
//! A yaw/pitch camera and a perspective projection producing the view and
//! projection matrices the frustum is extracted from.

use cgmath::*;
use std::f32::consts::FRAC_PI_2;

/// Remaps cgmath's `[-1, 1]` clip depth to the `[0, 1]` range `wgpu` uses.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Pitch limit, just short of vertical
const SAFE_FRAC_PI_2: f32 = FRAC_PI_2 - 0.0001;

/// Observer camera. Zero yaw looks along +X, positive pitch looks up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// World-space eye position
    pub position: Point3<f32>,
    /// Heading around +Y
    pub yaw: Rad<f32>,
    /// Elevation above the horizon
    pub pitch: Rad<f32>,
}

impl Camera {
    /// Creates a camera at `position`; angles accept degrees or radians.
    pub fn new<V: Into<Point3<f32>>, Y: Into<Rad<f32>>, P: Into<Rad<f32>>>(
        position: V,
        yaw: Y,
        pitch: P,
    ) -> Self {
        Self {
            position: position.into(),
            yaw: yaw.into(),
            pitch: pitch.into(),
        }
    }

    /// Unit view direction.
    pub fn forward(&self) -> Vector3<f32> {
        let (yaw_sin, yaw_cos) = self.yaw.0.sin_cos();
        let (pitch_sin, pitch_cos) = self.pitch.0.sin_cos();
        Vector3::new(pitch_cos * yaw_cos, pitch_sin, pitch_cos * yaw_sin).normalize()
    }

    /// World-to-view matrix.
    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_to_rh(self.position, self.forward(), Vector3::unit_y())
    }

    /// Moves the camera horizontally along its heading.
    pub fn advance(&mut self, distance: f32) {
        let (yaw_sin, yaw_cos) = self.yaw.0.sin_cos();
        self.position += Vector3::new(yaw_cos, 0.0, yaw_sin) * distance;
    }

    /// Rotates the camera, clamping pitch short of straight up or down.
    pub fn turn(&mut self, yaw: Rad<f32>, pitch: Rad<f32>) {
        self.yaw += yaw;
        self.pitch += pitch;

        if self.pitch < -Rad(SAFE_FRAC_PI_2) {
            self.pitch = -Rad(SAFE_FRAC_PI_2);
        } else if self.pitch > Rad(SAFE_FRAC_PI_2) {
            self.pitch = Rad(SAFE_FRAC_PI_2);
        }
    }
}

/// Perspective projection for a viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
}

impl Projection {
    /// Creates a projection for a `width`×`height` viewport.
    ///
    /// # Arguments
    /// * `fovy` - Vertical field of view
    /// * `znear` - Near plane distance, must be positive
    /// * `zfar` - Far plane distance, bounds what the frustum can see
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    /// View-to-clip matrix in `wgpu` clip space.
    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}
