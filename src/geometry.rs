//! Packed sphere records as the kernel reads them from `_Spheres`.

use bytemuck::{Pod, Zeroable};

use crate::{device::RenderDevice, error::Result, scene::Scene};

/// One sphere as laid out in the GPU buffer: 10 tightly packed floats.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuSphere {
    pub position: [f32; 3],
    pub radius: f32,
    pub albedo: [f32; 3],
    pub specular: [f32; 3],
}

/// Byte stride of [`GpuSphere`]; the kernel's record declaration must match.
pub const SPHERE_STRIDE: usize = 40;

const _: () = assert!(std::mem::size_of::<GpuSphere>() == SPHERE_STRIDE);

impl From<&crate::scene::Sphere> for GpuSphere {
    fn from(sphere: &crate::scene::Sphere) -> Self {
        Self {
            position: sphere.position.to_array(),
            radius: sphere.radius,
            albedo: sphere.albedo.to_array(),
            specular: sphere.specular.to_array(),
        }
    }
}

/// Device-resident copy of a scene.
///
/// Must be handed back through [`GeometryBuffer::release`]; dropping it only
/// forgets the handle.
pub struct GeometryBuffer<B> {
    buffer: B,
    count: u32,
}

impl<B> GeometryBuffer<B> {
    pub fn upload<D>(device: &mut D, scene: &Scene) -> Result<Self>
    where
        D: RenderDevice<Buffer = B> + ?Sized,
    {
        let records: Vec<GpuSphere> = scene.spheres.iter().map(GpuSphere::from).collect();
        let buffer = device.create_sphere_buffer(&records)?;
        tracing::debug!(
            count = records.len(),
            bytes = records.len() * SPHERE_STRIDE,
            "uploaded sphere buffer"
        );
        Ok(Self {
            buffer,
            count: records.len() as u32,
        })
    }

    pub fn release<D>(self, device: &mut D)
    where
        D: RenderDevice<Buffer = B> + ?Sized,
    {
        device.release_buffer(self.buffer);
    }

    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{scene::Sphere, testing::MockDevice};
    use glam::Vec3;

    #[test]
    fn record_layout_is_packed() {
        let sphere = Sphere {
            position: Vec3::new(1.0, 2.0, 3.0),
            radius: 4.0,
            albedo: Vec3::new(5.0, 6.0, 7.0),
            specular: Vec3::new(8.0, 9.0, 10.0),
        };
        let record = GpuSphere::from(&sphere);
        let floats: &[f32] = bytemuck::cast_slice(std::slice::from_ref(&record));
        assert_eq!(floats, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0]);
        assert_eq!(bytemuck::bytes_of(&record).len(), 40);
    }

    #[test]
    fn upload_and_release() {
        let mut device = MockDevice::new();
        let scene = Scene {
            spheres: vec![Sphere::anchor(), Sphere::anchor()],
        };
        let geometry = GeometryBuffer::upload(&mut device, &scene).unwrap();
        assert_eq!(geometry.count(), 2);
        assert_eq!(device.buffer(geometry.buffer()).len(), 2);
        assert_eq!(device.live_buffers(), 1);

        geometry.release(&mut device);
        assert_eq!(device.live_buffers(), 0);
    }

    #[test]
    fn upload_propagates_allocation_failure() {
        let mut device = MockDevice::new();
        device.fail_allocations = true;
        let scene = Scene {
            spheres: vec![Sphere::anchor()],
        };
        assert!(matches!(
            GeometryBuffer::upload(&mut device, &scene),
            Err(crate::Error::Allocation { .. })
        ));
    }
}
