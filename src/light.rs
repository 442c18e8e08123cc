use glam::{EulerRot, Mat4, Vec3, Vec4};
use winit::event::{ElementState, KeyboardInput, VirtualKeyCode, WindowEvent};

/// Directional light as supplied to the tracer each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightState {
    pub transform: Mat4,
    pub intensity: f32,
}

impl LightState {
    /// World-space direction the light travels in.
    pub fn forward(&self) -> Vec3 {
        self.transform.transform_vector3(Vec3::NEG_Z).normalize_or_zero()
    }

    /// `xyz` = forward, `w` = intensity, as the kernel expects `_DirectionalLight`.
    pub fn packed(&self) -> Vec4 {
        self.forward().extend(self.intensity)
    }
}

pub struct DirectionalLight {
    /// Rotation about the world up axis, radians.
    pub yaw: f32,
    /// Downward tilt, radians.
    pub pitch: f32,
    pub intensity: f32,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            yaw: (-30.0_f32).to_radians(),
            pitch: (-50.0_f32).to_radians(),
            intensity: 1.0,
        }
    }
}

impl DirectionalLight {
    pub fn state(&self) -> LightState {
        LightState {
            transform: Mat4::from_euler(EulerRot::YXZ, self.yaw, self.pitch, 0.0),
            intensity: self.intensity,
        }
    }
}

pub struct LightController {
    /// Radians per key press.
    pub step: f32,
}

impl LightController {
    pub fn new(step: f32) -> Self {
        Self { step }
    }

    /// Rotate the light with the arrow keys. Returns true when it moved.
    pub fn process_events(&self, light: &mut DirectionalLight, event: &WindowEvent) -> bool {
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
                match keycode {
                    VirtualKeyCode::Left => light.yaw += self.step,
                    VirtualKeyCode::Right => light.yaw -= self.step,
                    VirtualKeyCode::Up => light.pitch += self.step,
                    VirtualKeyCode::Down => light.pitch -= self.step,
                    _ => return false,
                }
                tracing::debug!(yaw = light.yaw, pitch = light.pitch, "light rotated");
                true
            }
            _ => false,
        }
    }
}
