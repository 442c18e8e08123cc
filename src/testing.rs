//! CPU stand-in for the compute device, for unit tests.

use std::collections::HashMap;

use glam::{Mat4, Vec3, Vec4};

use crate::{
    camera::CameraState,
    device::{blend_weight, param, RenderDevice, RAY_TRACING_KERNEL},
    error::{Error, Result},
    geometry::GpuSphere,
    light::LightState,
    progressive::Frame,
};

pub fn test_frame(width: u32, height: u32) -> Frame {
    Frame {
        width,
        height,
        camera: CameraState {
            world_to_camera: Mat4::look_at_rh(Vec3::new(0.0, 10.0, 50.0), Vec3::ZERO, Vec3::Y),
            projection: Mat4::perspective_rh(1.0, width as f32 / height as f32, 0.1, 100.0),
        },
        light: LightState {
            transform: Mat4::from_rotation_x(-0.8),
            intensity: 1.0,
        },
    }
}

struct MockImage {
    width: u32,
    height: u32,
    pixels: Vec<Vec4>,
}

/// Resource handles are plain ids; images hold one `Vec4` per pixel.
///
/// The kernel fills `Result` with `kernel_values[n % len]` on its n-th
/// dispatch (or `Vec4::ONE` when the script is empty), so tests know the
/// exact value of every sample.
#[derive(Default)]
pub struct MockDevice {
    next_id: usize,
    buffers: HashMap<usize, Vec<GpuSphere>>,
    images: HashMap<usize, MockImage>,

    pub kernel_values: Vec<Vec4>,
    pub fail_allocations: bool,
    /// Fail image creation once this many images have been created.
    pub fail_image_after: Option<usize>,
    pub missing_composite: bool,

    pub image_allocations: usize,
    pub material_lookups: usize,
    pub ints: HashMap<String, i32>,
    pub floats: HashMap<String, f32>,
    pub vectors: HashMap<String, Vec4>,
    pub matrices: HashMap<String, Mat4>,
    /// Resource bindings by name: buffer/image id, or 0 for the texture.
    pub bound: HashMap<String, usize>,
    pub dispatches: Vec<(usize, u32, u32, u32)>,
    pub composite_samples: Vec<f32>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(&self, id: &usize) -> &[GpuSphere] {
        &self.buffers[id]
    }

    pub fn image(&self, id: usize) -> &[Vec4] {
        &self.images[&id].pixels
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_images(&self) -> usize {
        self.images.len()
    }

    fn allocation_error(what: &'static str) -> Error {
        Error::Allocation {
            what,
            reason: "mock allocation failure".into(),
        }
    }

    fn next_id(&mut self) -> usize {
        self.next_id += 1;
        self.next_id
    }

    fn check_kernel(kernel: usize) -> Result<()> {
        if kernel == RAY_TRACING_KERNEL {
            Ok(())
        } else {
            Err(Error::UnknownKernel(kernel))
        }
    }
}

fn expect_name(name: &str, allowed: &[&str]) -> Result<()> {
    if allowed.contains(&name) {
        Ok(())
    } else {
        Err(Error::UnknownParameter(name.to_owned()))
    }
}

impl RenderDevice for MockDevice {
    type Buffer = usize;
    type Image = usize;
    type Texture = ();
    type Material = ();

    fn create_sphere_buffer(&mut self, spheres: &[GpuSphere]) -> Result<usize> {
        if self.fail_allocations {
            return Err(Self::allocation_error("sphere buffer"));
        }
        let id = self.next_id();
        self.buffers.insert(id, spheres.to_vec());
        Ok(id)
    }

    fn release_buffer(&mut self, buffer: usize) {
        assert!(self.buffers.remove(&buffer).is_some(), "double release");
    }

    fn create_image(&mut self, width: u32, height: u32) -> Result<usize> {
        let exhausted = self
            .fail_image_after
            .is_some_and(|limit| self.image_allocations >= limit);
        if self.fail_allocations || exhausted {
            return Err(Self::allocation_error("image"));
        }
        let id = self.next_id();
        self.images.insert(
            id,
            MockImage {
                width,
                height,
                pixels: vec![Vec4::ZERO; (width * height) as usize],
            },
        );
        self.image_allocations += 1;
        Ok(id)
    }

    fn release_image(&mut self, image: usize) {
        assert!(self.images.remove(&image).is_some(), "double release");
    }

    fn set_int(&mut self, name: &str, value: i32) -> Result<()> {
        expect_name(name, &[param::NUM_OF_SPHERES])?;
        self.ints.insert(name.to_owned(), value);
        Ok(())
    }

    fn set_float(&mut self, name: &str, value: f32) -> Result<()> {
        expect_name(name, &[param::SAMPLE])?;
        self.floats.insert(name.to_owned(), value);
        Ok(())
    }

    fn set_vector(&mut self, name: &str, value: Vec4) -> Result<()> {
        expect_name(name, &[param::DIRECTIONAL_LIGHT, param::PIXEL_OFFSET])?;
        self.vectors.insert(name.to_owned(), value);
        Ok(())
    }

    fn set_matrix(&mut self, name: &str, value: Mat4) -> Result<()> {
        expect_name(
            name,
            &[param::CAMERA_TO_WORLD, param::CAMERA_INVERSE_PROJECTION],
        )?;
        self.matrices.insert(name.to_owned(), value);
        Ok(())
    }

    fn set_buffer(&mut self, kernel: usize, name: &str, buffer: &usize) -> Result<()> {
        Self::check_kernel(kernel)?;
        expect_name(name, &[param::SPHERES])?;
        self.bound.insert(name.to_owned(), *buffer);
        Ok(())
    }

    fn set_texture(&mut self, kernel: usize, name: &str, _texture: &()) -> Result<()> {
        Self::check_kernel(kernel)?;
        expect_name(name, &[param::SKYBOX_TEXTURE])?;
        self.bound.insert(name.to_owned(), 0);
        Ok(())
    }

    fn set_image(&mut self, kernel: usize, name: &str, image: &usize) -> Result<()> {
        Self::check_kernel(kernel)?;
        expect_name(name, &[param::RESULT])?;
        self.bound.insert(name.to_owned(), *image);
        Ok(())
    }

    fn dispatch(&mut self, kernel: usize, groups_x: u32, groups_y: u32, groups_z: u32) -> Result<()> {
        Self::check_kernel(kernel)?;
        let result = *self
            .bound
            .get(param::RESULT)
            .ok_or(Error::UnboundParameter(param::RESULT))?;
        if !self.bound.contains_key(param::SPHERES) {
            return Err(Error::UnboundParameter(param::SPHERES));
        }

        let value = match self.kernel_values.len() {
            0 => Vec4::ONE,
            n => self.kernel_values[self.dispatches.len() % n],
        };
        let image = self
            .images
            .get_mut(&result)
            .expect("Result bound to a released image");
        assert!(groups_x * 8 >= image.width && groups_y * 8 >= image.height);
        image.pixels.fill(value);

        self.dispatches.push((kernel, groups_x, groups_y, groups_z));
        Ok(())
    }

    fn find_composite_material(&mut self) -> Result<()> {
        self.material_lookups += 1;
        if self.missing_composite {
            return Err(Error::MissingCompositeMaterial("mock shader not found".into()));
        }
        Ok(())
    }

    fn composite(
        &mut self,
        _material: &(),
        sample_count: f32,
        sample: &usize,
        previous: &usize,
        next: &usize,
    ) -> Result<()> {
        self.set_float(param::SAMPLE, sample_count)?;
        let weight = blend_weight(sample_count);
        let blended: Vec<Vec4> = self.images[sample]
            .pixels
            .iter()
            .zip(&self.images[previous].pixels)
            .map(|(s, p)| *p * (1.0 - weight) + *s * weight)
            .collect();
        self.images
            .get_mut(next)
            .expect("composite into a released image")
            .pixels = blended;
        self.composite_samples.push(sample_count);
        Ok(())
    }
}
