//! Invocation contract with the compute device that runs the ray tracing
//! kernel and the compositing pass.
//!
//! Parameter names are shared with the shader programs and must not change on
//! one side only.

use glam::{Mat4, Vec4};

use crate::{error::Result, geometry::GpuSphere};

/// The ray tracing kernel is the only kernel in the program.
pub const RAY_TRACING_KERNEL: usize = 0;

/// Side of the square thread group declared by the kernel's `@workgroup_size`.
pub const THREAD_GROUP_SIZE: u32 = 8;

pub mod param {
    pub const NUM_OF_SPHERES: &str = "_NumOfSpheres";
    pub const SPHERES: &str = "_Spheres";
    pub const DIRECTIONAL_LIGHT: &str = "_DirectionalLight";
    pub const SKYBOX_TEXTURE: &str = "_SkyboxTexture";
    pub const PIXEL_OFFSET: &str = "_PixelOffset";
    pub const CAMERA_TO_WORLD: &str = "_CameraToWorld";
    pub const CAMERA_INVERSE_PROJECTION: &str = "_CameraInverseProjection";
    pub const RESULT: &str = "Result";
    /// Compositing pass: number of samples already accumulated.
    pub const SAMPLE: &str = "_Sample";
}

/// A device able to hold scene data, run the ray tracing kernel and blend its
/// output into an accumulation image.
///
/// Work submitted through one device executes in call order, so a composite
/// issued after a dispatch observes that dispatch's `Result`.
pub trait RenderDevice {
    type Buffer;
    /// Floating point, random-writable 2D image.
    type Image;
    type Texture;
    /// Resolved compositing shader.
    type Material;

    fn create_sphere_buffer(&mut self, spheres: &[GpuSphere]) -> Result<Self::Buffer>;
    fn release_buffer(&mut self, buffer: Self::Buffer);

    fn create_image(&mut self, width: u32, height: u32) -> Result<Self::Image>;
    fn release_image(&mut self, image: Self::Image);

    fn set_int(&mut self, name: &str, value: i32) -> Result<()>;
    fn set_float(&mut self, name: &str, value: f32) -> Result<()>;
    fn set_vector(&mut self, name: &str, value: Vec4) -> Result<()>;
    fn set_matrix(&mut self, name: &str, value: Mat4) -> Result<()>;
    fn set_buffer(&mut self, kernel: usize, name: &str, buffer: &Self::Buffer) -> Result<()>;
    fn set_texture(&mut self, kernel: usize, name: &str, texture: &Self::Texture) -> Result<()>;
    fn set_image(&mut self, kernel: usize, name: &str, image: &Self::Image) -> Result<()>;

    fn dispatch(&mut self, kernel: usize, groups_x: u32, groups_y: u32, groups_z: u32)
        -> Result<()>;

    fn find_composite_material(&mut self) -> Result<Self::Material>;

    /// Write `mix(previous, sample, 1 / (sample_count + 1))` into `next`.
    fn composite(
        &mut self,
        material: &Self::Material,
        sample_count: f32,
        sample: &Self::Image,
        previous: &Self::Image,
        next: &Self::Image,
    ) -> Result<()>;
}

/// Thread groups needed to cover `extent` pixels, rounded up.
pub fn thread_groups(extent: u32) -> u32 {
    extent.div_ceil(THREAD_GROUP_SIZE)
}

/// Weight of the newest sample when `sample_count` samples are already averaged.
pub fn blend_weight(sample_count: f32) -> f32 {
    1.0 / (sample_count + 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thread_groups_round_up() {
        assert_eq!(thread_groups(1), 1);
        assert_eq!(thread_groups(8), 1);
        assert_eq!(thread_groups(9), 2);
        assert_eq!(thread_groups(1920), 240);
        assert_eq!(thread_groups(1081), 136);
    }

    #[test]
    fn blend_weight_is_running_average() {
        assert_eq!(blend_weight(0.0), 1.0);
        assert_eq!(blend_weight(1.0), 0.5);
        assert_eq!(blend_weight(3.0), 0.25);
    }
}
