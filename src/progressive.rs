//! One frame of progressive accumulation: upload, dispatch, composite, count.

use rand::Rng;

use crate::{
    camera::CameraState,
    device::{param, thread_groups, RenderDevice, RAY_TRACING_KERNEL},
    error::Result,
    frame_buffer::{SampleCount, Target},
    geometry::GeometryBuffer,
    light::LightState,
    random,
};

/// Host-supplied state for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub camera: CameraState,
    pub light: LightState,
}

/// Drives the kernel and the compositing pass. Holds the compositing
/// material once it has been resolved.
pub struct ProgressiveRenderer<M> {
    composite: Option<M>,
}

impl<M> Default for ProgressiveRenderer<M> {
    fn default() -> Self {
        Self { composite: None }
    }
}

impl<M> ProgressiveRenderer<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render one sample and fold it into `target`'s accumulation.
    ///
    /// On success `samples` has grown by one and the target's accumulation
    /// image holds the mean of every sample since the last reset.
    pub fn render_frame<D, R>(
        &mut self,
        device: &mut D,
        geometry: &GeometryBuffer<D::Buffer>,
        skybox: &D::Texture,
        target: &mut Target<D::Image>,
        frame: &Frame,
        samples: &mut SampleCount,
        rng: &mut R,
    ) -> Result<()>
    where
        D: RenderDevice<Material = M> + ?Sized,
        R: Rng + ?Sized,
    {
        set_shader_parameters(device, geometry, skybox, frame, rng)?;

        device.set_image(RAY_TRACING_KERNEL, param::RESULT, target.result())?;
        let groups_x = thread_groups(target.width());
        let groups_y = thread_groups(target.height());
        device.dispatch(RAY_TRACING_KERNEL, groups_x, groups_y, 1)?;

        let material = match self.composite.take() {
            Some(material) => material,
            None => {
                let material = device.find_composite_material()?;
                tracing::debug!("resolved compositing material");
                material
            }
        };
        let material = self.composite.insert(material);

        let (previous, next) = target.composite_images();
        device.composite(material, samples.get() as f32, target.result(), previous, next)?;
        target.swap();
        samples.increment();

        tracing::trace!(sample = samples.get(), groups_x, groups_y, "frame rendered");
        Ok(())
    }

    /// Hand the compositing material back; it is resolved again on next use.
    pub fn release(&mut self) {
        self.composite = None;
    }
}

fn set_shader_parameters<D, R>(
    device: &mut D,
    geometry: &GeometryBuffer<D::Buffer>,
    skybox: &D::Texture,
    frame: &Frame,
    rng: &mut R,
) -> Result<()>
where
    D: RenderDevice + ?Sized,
    R: Rng + ?Sized,
{
    device.set_int(param::NUM_OF_SPHERES, geometry.count() as i32)?;
    device.set_buffer(RAY_TRACING_KERNEL, param::SPHERES, geometry.buffer())?;
    device.set_vector(param::DIRECTIONAL_LIGHT, frame.light.packed())?;
    device.set_texture(RAY_TRACING_KERNEL, param::SKYBOX_TEXTURE, skybox)?;
    let offset = random::random_pixel_offset(rng);
    device.set_vector(param::PIXEL_OFFSET, offset.extend(0.0).extend(0.0))?;
    device.set_matrix(param::CAMERA_TO_WORLD, frame.camera.camera_to_world())?;
    device.set_matrix(
        param::CAMERA_INVERSE_PROJECTION,
        frame.camera.inverse_projection(),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        frame_buffer::FrameBufferManager,
        scene::{Scene, Sphere},
        testing::{test_frame, MockDevice},
        Error,
    };
    use glam::{Mat4, Vec4};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    struct Rig {
        device: MockDevice,
        geometry: GeometryBuffer<usize>,
        frame_buffer: FrameBufferManager<usize>,
        renderer: ProgressiveRenderer<()>,
        samples: SampleCount,
        rng: ChaCha8Rng,
    }

    impl Rig {
        fn new() -> Self {
            let mut device = MockDevice::new();
            let scene = Scene {
                spheres: vec![Sphere::anchor()],
            };
            let geometry = GeometryBuffer::upload(&mut device, &scene).unwrap();
            Self {
                device,
                geometry,
                frame_buffer: FrameBufferManager::new(),
                renderer: ProgressiveRenderer::new(),
                samples: SampleCount::default(),
                rng: ChaCha8Rng::seed_from_u64(0),
            }
        }

        fn render(&mut self, frame: &Frame) -> Result<()> {
            let target = self.frame_buffer.ensure_target(
                &mut self.device,
                frame.width,
                frame.height,
                &mut self.samples,
            )?;
            self.renderer.render_frame(
                &mut self.device,
                &self.geometry,
                &(),
                target,
                frame,
                &mut self.samples,
                &mut self.rng,
            )
        }

        fn accumulation(&self) -> &[Vec4] {
            let target = self.frame_buffer.target().unwrap();
            self.device.image(*target.accumulation())
        }
    }

    #[test]
    fn accumulation_converges_to_mean() {
        let mut rig = Rig::new();
        let values = [0.9, 0.1, 0.4, 0.7, 0.25, 0.0, 1.0, 0.6];
        rig.device.kernel_values = values.iter().map(|&v| Vec4::splat(v)).collect();
        let frame = test_frame(16, 16);

        for _ in 0..values.len() {
            rig.render(&frame).unwrap();
        }

        let mean = values.iter().sum::<f32>() / values.len() as f32;
        assert_eq!(rig.samples.get(), values.len() as u32);
        for pixel in rig.accumulation() {
            assert!(pixel.abs_diff_eq(Vec4::splat(mean), 1e-5), "{pixel:?} vs {mean}");
        }
    }

    #[test]
    fn first_frame_replaces_accumulation() {
        let mut rig = Rig::new();
        rig.device.kernel_values = vec![Vec4::splat(0.3)];
        rig.render(&test_frame(8, 8)).unwrap();

        assert_eq!(rig.device.composite_samples, vec![0.0]);
        assert!(rig.accumulation().iter().all(|p| *p == Vec4::splat(0.3)));
    }

    #[test]
    fn dispatch_covers_target_with_8x8_groups() {
        let mut rig = Rig::new();
        rig.render(&test_frame(100, 17)).unwrap();
        assert_eq!(rig.device.dispatches, vec![(0, 13, 3, 1)]);
    }

    #[test]
    fn uploads_every_kernel_parameter() {
        let mut rig = Rig::new();
        let frame = test_frame(8, 8);
        rig.render(&frame).unwrap();

        let d = &rig.device;
        assert_eq!(d.ints[param::NUM_OF_SPHERES], 1);
        assert_eq!(d.vectors[param::DIRECTIONAL_LIGHT], frame.light.packed());
        assert_eq!(
            d.matrices[param::CAMERA_TO_WORLD],
            frame.camera.world_to_camera.inverse()
        );
        assert_eq!(
            d.matrices[param::CAMERA_INVERSE_PROJECTION],
            frame.camera.projection.inverse()
        );
        for name in [param::SPHERES, param::SKYBOX_TEXTURE, param::RESULT] {
            assert!(d.bound.contains_key(name), "{name} not bound");
        }
        let offset = d.vectors[param::PIXEL_OFFSET];
        assert!((0.0..1.0).contains(&offset.x) && (0.0..1.0).contains(&offset.y));
    }

    #[test]
    fn pixel_offset_is_redrawn_each_frame() {
        let mut rig = Rig::new();
        let frame = test_frame(8, 8);
        rig.render(&frame).unwrap();
        let first = rig.device.vectors[param::PIXEL_OFFSET];
        rig.render(&frame).unwrap();
        assert_ne!(rig.device.vectors[param::PIXEL_OFFSET], first);
    }

    #[test]
    fn composite_material_is_resolved_once() {
        let mut rig = Rig::new();
        let frame = test_frame(8, 8);
        for _ in 0..3 {
            rig.render(&frame).unwrap();
        }
        assert_eq!(rig.device.material_lookups, 1);
    }

    #[test]
    fn missing_composite_material_is_fatal() {
        let mut rig = Rig::new();
        rig.device.missing_composite = true;
        let err = rig.render(&test_frame(8, 8)).unwrap_err();
        assert!(matches!(err, Error::MissingCompositeMaterial(_)));
        assert_eq!(rig.samples.get(), 0);
    }

    #[test]
    fn camera_matrices_follow_frame() {
        let mut rig = Rig::new();
        let mut frame = test_frame(8, 8);
        frame.camera.world_to_camera = Mat4::from_translation(glam::Vec3::new(0.0, -2.0, 0.0));
        rig.render(&frame).unwrap();
        let camera_to_world = rig.device.matrices[param::CAMERA_TO_WORLD];
        assert!(camera_to_world
            .w_axis
            .abs_diff_eq(Vec4::new(0.0, 2.0, 0.0, 1.0), 1e-6));
    }
}
