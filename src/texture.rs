use std::path::Path;

use image::{Rgba, RgbaImage};

use crate::error::Result;

/// Sampled texture with its own view and sampler, used for the skybox.
pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
}

impl Texture {
    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        img: &RgbaImage,
        label: Option<&str>,
    ) -> Self {
        let (width, height) = img.dimensions();
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        let texture = Self {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            sampler: device.create_sampler(&wgpu::SamplerDescriptor {
                label,
                // Longitude wraps around, latitude stops at the poles.
                address_mode_u: wgpu::AddressMode::Repeat,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: wgpu::FilterMode::Linear,
                min_filter: wgpu::FilterMode::Linear,
                mipmap_filter: wgpu::FilterMode::Nearest,
                ..Default::default()
            }),
            texture,
        };
        texture.update_data(queue, img);
        texture
    }

    /// Load an equirectangular skybox from disk.
    pub fn from_path(device: &wgpu::Device, queue: &wgpu::Queue, path: &Path) -> Result<Self> {
        let img = image::open(path)?.to_rgba8();
        tracing::info!(path = %path.display(), width = img.width(), height = img.height(), "loaded skybox");
        Ok(Self::from_image(device, queue, &img, Some("Skybox Texture")))
    }

    /// Equirectangular sky gradient for when no skybox image is given.
    pub fn procedural_sky(device: &wgpu::Device, queue: &wgpu::Queue) -> Self {
        let img = sky_gradient(256, 128);
        Self::from_image(device, queue, &img, Some("Procedural Sky"))
    }

    pub fn update_data(&self, queue: &wgpu::Queue, img: &RgbaImage) {
        let (width, height) = img.dimensions();
        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            img.as_raw(),
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }
}

/// Zenith blue fading to a pale horizon, then a dark ground below it.
/// Row 0 is straight up.
fn sky_gradient(width: u32, height: u32) -> RgbaImage {
    let zenith = glam::Vec3::new(0.25, 0.45, 0.85);
    let horizon = glam::Vec3::new(0.85, 0.9, 0.95);
    let ground = glam::Vec3::new(0.2, 0.18, 0.16);

    RgbaImage::from_fn(width, height, |_, y| {
        let v = (y as f32 + 0.5) / height as f32;
        let color = if v < 0.5 {
            zenith.lerp(horizon, (v * 2.0).powf(2.0))
        } else {
            horizon.lerp(ground, ((v - 0.5) * 2.0).sqrt())
        };
        Rgba(convert_rgba(color.extend(1.0)))
    })
}

fn convert_rgba(color: glam::Vec4) -> [u8; 4] {
    let c = (color.clamp(glam::Vec4::ZERO, glam::Vec4::ONE) * 255.0).round();
    [c.x as u8, c.y as u8, c.z as u8, c.w as u8]
}
