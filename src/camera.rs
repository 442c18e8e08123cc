use glam::{Mat4, Vec3};
use winit::event::{ElementState, KeyboardInput, VirtualKeyCode, WindowEvent};

/// Pinhole camera as supplied to the tracer each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub world_to_camera: Mat4,
    pub projection: Mat4,
}

impl CameraState {
    pub fn camera_to_world(&self) -> Mat4 {
        self.world_to_camera.inverse()
    }

    pub fn inverse_projection(&self) -> Mat4 {
        self.projection.inverse()
    }
}

pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub aspect: f32,
    pub fov_y: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 40.0, 160.0),
            target: Vec3::new(0.0, 5.0, 0.0),
            up: Vec3::Y,
            aspect: 16.0 / 9.0,
            fov_y: (60.0_f32).to_radians(),
            z_near: 0.3,
            z_far: 1000.0,
        }
    }
}

impl Camera {
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.z_near, self.z_far)
    }

    pub fn state(&self) -> CameraState {
        CameraState {
            world_to_camera: self.view_matrix(),
            projection: self.projection_matrix(),
        }
    }
}

pub struct CameraController {
    pub speed: f32,
}

impl CameraController {
    pub fn new(speed: f32) -> Self {
        Self { speed }
    }

    /// Move the camera with WASD (planar) and Q/E (vertical). Returns true
    /// when the event moved the camera.
    pub fn process_events(&self, camera: &mut Camera, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::KeyboardInput {
                input:
                    KeyboardInput {
                        state: ElementState::Pressed,
                        virtual_keycode: Some(keycode),
                        ..
                    },
                ..
            } => {
                let forward = (camera.target - camera.eye).normalize_or_zero();
                let right = forward.cross(camera.up).normalize_or_zero();
                let step = match keycode {
                    VirtualKeyCode::W => forward,
                    VirtualKeyCode::S => -forward,
                    VirtualKeyCode::D => right,
                    VirtualKeyCode::A => -right,
                    VirtualKeyCode::E => camera.up,
                    VirtualKeyCode::Q => -camera.up,
                    _ => return false,
                } * self.speed;
                camera.eye += step;
                camera.target += step;
                tracing::debug!(?keycode, eye = ?camera.eye, "camera moved");
                true
            }
            _ => false,
        }
    }
}
