//! The main viewpoint.
//!
//! The camera is positioned and rotated like any other object (world matrix
//! `T * Ry * Rx * Rz`); its view matrix is the inverse of that.

use cgmath::{Deg, Matrix4, Rad, Vector3, Zero};
use winit::keyboard::KeyCode;

use crate::{input::Keyboard, math};

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    position: Vector3<f32>,
    /// Euler angles in radians.
    rotation: Vector3<f32>,
    fov_y: Rad<f32>,
    aspect: f32,
    near: f32,
    far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vector3::zero(),
            rotation: Vector3::zero(),
            fov_y: Deg(60.0).into(),
            aspect: 4.0 / 3.0,
            near: 1.0,
            far: 10000.0,
        }
    }
}

impl Camera {
    pub fn new(position: Vector3<f32>, rotation: Vector3<f32>) -> Self {
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    pub fn position(&self) -> Vector3<f32> {
        self.position
    }

    pub fn set_position(&mut self, position: Vector3<f32>) {
        self.position = position;
    }

    pub fn rotation(&self) -> Vector3<f32> {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: Vector3<f32>) {
        self.rotation = rotation;
    }

    pub fn fov_y(&self) -> Rad<f32> {
        self.fov_y
    }

    pub fn set_fov_y(&mut self, fov_y: impl Into<Rad<f32>>) {
        self.fov_y = fov_y.into();
    }

    pub fn set_clip_planes(&mut self, near: f32, far: f32) {
        self.near = near;
        self.far = far;
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Ignores degenerate sizes (a minimised window reports zero height).
    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.aspect = width as f32 / height as f32;
    }

    pub fn world(&self) -> Matrix4<f32> {
        math::compose(self.position, self.rotation, Vector3::new(1.0, 1.0, 1.0))
    }

    pub fn view(&self) -> Matrix4<f32> {
        math::inverse_affine(&self.world())
    }

    pub fn projection(&self) -> Matrix4<f32> {
        math::perspective_lh(self.fov_y, self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Matrix4<f32> {
        self.projection() * self.view()
    }

    /// Arrow keys turn the camera, W/S move along its facing, A/D strafe.
    pub fn control(&mut self, dt: f32, keyboard: &Keyboard, rotation_speed: f32, movement_speed: f32) {
        let turn = rotation_speed * dt;
        if keyboard.is_held(KeyCode::ArrowUp) {
            self.rotation.x -= turn;
        }
        if keyboard.is_held(KeyCode::ArrowDown) {
            self.rotation.x += turn;
        }
        if keyboard.is_held(KeyCode::ArrowLeft) {
            self.rotation.y -= turn;
        }
        if keyboard.is_held(KeyCode::ArrowRight) {
            self.rotation.y += turn;
        }

        let world = self.world();
        let right = world.x.truncate();
        let forward = world.z.truncate();
        let step = movement_speed * dt;
        if keyboard.is_held(KeyCode::KeyW) {
            self.position += forward * step;
        }
        if keyboard.is_held(KeyCode::KeyS) {
            self.position -= forward * step;
        }
        if keyboard.is_held(KeyCode::KeyD) {
            self.position += right * step;
        }
        if keyboard.is_held(KeyCode::KeyA) {
            self.position -= right * step;
        }
    }
}
