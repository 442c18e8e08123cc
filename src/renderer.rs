//! wgpu implementation of [`RenderDevice`].
//!
//! Named kernel parameters are mirrored into a single uniform block and
//! resource bindings are collected until `dispatch`, which builds the bind
//! group and submits the compute pass. The compositing pipeline is only
//! built the first time it is asked for.

use std::rc::Rc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};
use wgpu::util::DeviceExt;

use crate::{
    device::{param, RenderDevice, RAY_TRACING_KERNEL},
    error::{Error, Result},
    geometry::{GpuSphere, SPHERE_STRIDE},
    texture::Texture,
};

const RAY_TRACING_WGSL: &str = include_str!("asset/shader/ray_tracing.wgsl");
const COMPOSITE_WGSL: &str = include_str!("asset/shader/composite.wgsl");
const PRESENT_WGSL: &str = include_str!("asset/shader/present.wgsl");

/// Format of the `Result` and accumulation images.
pub const IMAGE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

pub struct StorageBuffer(wgpu::Buffer);

impl StorageBuffer {
    pub fn init_immediate<'label>(
        device: &wgpu::Device,
        content: &[u8],
        label: Option<&'label str>,
    ) -> Self {
        let init_descriptor = wgpu::util::BufferInitDescriptor {
            label,
            contents: content,
            usage: wgpu::BufferUsages::STORAGE,
        };
        let buffer = device.create_buffer_init(&init_descriptor);
        Self(buffer)
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.0
    }
}

/// Floating point image usable as storage target, sampled input and render
/// attachment.
pub struct GpuImage {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

impl GpuImage {
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Accumulation Image"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: IMAGE_FORMAT,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
        }
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Uniform block of the ray tracing kernel (`Params` in ray_tracing.wgsl).
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct RayTracingParams {
    camera_to_world: [[f32; 4]; 4],
    camera_inverse_projection: [[f32; 4]; 4],
    directional_light: [f32; 4],
    pixel_offset: [f32; 2],
    num_of_spheres: i32,
    padding: u32,
}

/// Uniform block of the compositing pass.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct CompositeParams {
    sample_count: f32,
    padding: [f32; 3],
}

pub struct CompositeMaterial {
    pipeline: wgpu::RenderPipeline,
    uniform: wgpu::Buffer,
}

#[derive(Default)]
struct Bindings {
    spheres: Option<Rc<StorageBuffer>>,
    skybox: Option<Rc<Texture>>,
    result: Option<Rc<GpuImage>>,
}

pub struct WgpuDevice {
    device: Rc<wgpu::Device>,
    queue: Rc<wgpu::Queue>,

    kernel_pipeline: wgpu::ComputePipeline,
    kernel_bind_group_layout: wgpu::BindGroupLayout,
    params: RayTracingParams,
    params_buffer: wgpu::Buffer,
    bindings: Bindings,

    composite_bind_group_layout: wgpu::BindGroupLayout,

    present_pipeline: wgpu::RenderPipeline,
    present_bind_group_layout: wgpu::BindGroupLayout,
}

fn texture_entry(binding: u32, visibility: wgpu::ShaderStages, filterable: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type: wgpu::TextureSampleType::Float { filterable },
        },
        count: None,
    }
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

/// Full-screen triangle pipeline writing a single colour target.
fn fullscreen_pipeline(
    device: &wgpu::Device,
    label: &str,
    shader: &wgpu::ShaderModule,
    bind_group_layout: &wgpu::BindGroupLayout,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[bind_group_layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: "vs_main",
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}

/// Run `create` inside an error scope and turn a captured error into `Err`.
fn scoped<T>(
    device: &wgpu::Device,
    filter: wgpu::ErrorFilter,
    create: impl FnOnce() -> T,
) -> std::result::Result<T, wgpu::Error> {
    device.push_error_scope(filter);
    let value = create();
    match pollster::block_on(device.pop_error_scope()) {
        Some(error) => Err(error),
        None => Ok(value),
    }
}

fn full_pass<'pass>(
    encoder: &'pass mut wgpu::CommandEncoder,
    label: &'pass str,
    view: &'pass wgpu::TextureView,
) -> wgpu::RenderPass<'pass> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: true,
            },
        })],
        depth_stencil_attachment: None,
    })
}

impl WgpuDevice {
    pub fn new(
        device: Rc<wgpu::Device>,
        queue: Rc<wgpu::Queue>,
        surface_format: wgpu::TextureFormat,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Ray Tracing Shader"),
            source: wgpu::ShaderSource::Wgsl(RAY_TRACING_WGSL.into()),
        });

        let kernel_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("ray_tracing_bind_group_layout"),
                entries: &[
                    uniform_entry(0, wgpu::ShaderStages::COMPUTE),
                    // _Spheres
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: true },
                            has_dynamic_offset: false,
                            min_binding_size: wgpu::BufferSize::new(SPHERE_STRIDE as u64),
                        },
                        count: None,
                    },
                    // _SkyboxTexture
                    texture_entry(2, wgpu::ShaderStages::COMPUTE, true),
                    wgpu::BindGroupLayoutEntry {
                        binding: 3,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                    // Result
                    wgpu::BindGroupLayoutEntry {
                        binding: 4,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::StorageTexture {
                            access: wgpu::StorageTextureAccess::WriteOnly,
                            format: IMAGE_FORMAT,
                            view_dimension: wgpu::TextureViewDimension::D2,
                        },
                        count: None,
                    },
                ],
            });

        let kernel_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Ray Tracing Pipeline Layout"),
                bind_group_layouts: &[&kernel_bind_group_layout],
                push_constant_ranges: &[],
            });

        let kernel_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Ray Tracing Pipeline"),
            layout: Some(&kernel_pipeline_layout),
            module: &shader,
            entry_point: "main",
        });

        let params = RayTracingParams::zeroed();
        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Ray Tracing Params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let composite_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("composite_bind_group_layout"),
                entries: &[
                    uniform_entry(0, wgpu::ShaderStages::FRAGMENT),
                    texture_entry(1, wgpu::ShaderStages::FRAGMENT, false),
                    texture_entry(2, wgpu::ShaderStages::FRAGMENT, false),
                ],
            });

        let present_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("present_bind_group_layout"),
                entries: &[texture_entry(0, wgpu::ShaderStages::FRAGMENT, false)],
            });
        let present_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Present Shader"),
            source: wgpu::ShaderSource::Wgsl(PRESENT_WGSL.into()),
        });
        let present_pipeline = fullscreen_pipeline(
            &device,
            "Present Pipeline",
            &present_shader,
            &present_bind_group_layout,
            surface_format,
        );

        Self {
            device,
            queue,
            kernel_pipeline,
            kernel_bind_group_layout,
            params,
            params_buffer,
            bindings: Bindings::default(),
            composite_bind_group_layout,
            present_pipeline,
            present_bind_group_layout,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Draw `image` onto the swapchain `view`.
    pub fn present(&self, image: &GpuImage, view: &wgpu::TextureView) {
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("present_bind_group"),
            layout: &self.present_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(image.view()),
            }],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Present Encoder"),
            });
        {
            let mut pass = full_pass(&mut encoder, "Present Pass", view);
            pass.set_pipeline(&self.present_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    fn check_kernel(kernel: usize) -> Result<()> {
        if kernel == RAY_TRACING_KERNEL {
            Ok(())
        } else {
            Err(Error::UnknownKernel(kernel))
        }
    }
}

impl RenderDevice for WgpuDevice {
    type Buffer = Rc<StorageBuffer>;
    type Image = Rc<GpuImage>;
    type Texture = Rc<Texture>;
    type Material = CompositeMaterial;

    fn create_sphere_buffer(&mut self, spheres: &[GpuSphere]) -> Result<Self::Buffer> {
        let bytes: &[u8] = bytemuck::cast_slice(spheres);
        let zeroed = [0u8; SPHERE_STRIDE];
        // A storage binding may not be empty.
        let contents = if bytes.is_empty() { &zeroed[..] } else { bytes };

        let buffer = scoped(&self.device, wgpu::ErrorFilter::OutOfMemory, || {
            StorageBuffer::init_immediate(&self.device, contents, Some("Sphere Buffer"))
        })
        .map_err(|e| Error::Allocation {
            what: "sphere buffer",
            reason: e.to_string(),
        })?;
        Ok(Rc::new(buffer))
    }

    fn release_buffer(&mut self, buffer: Self::Buffer) {
        if let Some(bound) = &self.bindings.spheres {
            if Rc::ptr_eq(bound, &buffer) {
                self.bindings.spheres = None;
            }
        }
        buffer.buffer().destroy();
    }

    fn create_image(&mut self, width: u32, height: u32) -> Result<Self::Image> {
        let image = scoped(&self.device, wgpu::ErrorFilter::OutOfMemory, || {
            GpuImage::new(&self.device, width, height)
        })
        .map_err(|e| Error::Allocation {
            what: "image",
            reason: e.to_string(),
        })?;
        Ok(Rc::new(image))
    }

    fn release_image(&mut self, image: Self::Image) {
        if let Some(bound) = &self.bindings.result {
            if Rc::ptr_eq(bound, &image) {
                self.bindings.result = None;
            }
        }
        image.texture.destroy();
    }

    fn set_int(&mut self, name: &str, value: i32) -> Result<()> {
        match name {
            param::NUM_OF_SPHERES => self.params.num_of_spheres = value,
            _ => return Err(Error::UnknownParameter(name.to_owned())),
        }
        Ok(())
    }

    fn set_float(&mut self, name: &str, _value: f32) -> Result<()> {
        Err(Error::UnknownParameter(name.to_owned()))
    }

    fn set_vector(&mut self, name: &str, value: Vec4) -> Result<()> {
        match name {
            param::DIRECTIONAL_LIGHT => self.params.directional_light = value.to_array(),
            param::PIXEL_OFFSET => self.params.pixel_offset = [value.x, value.y],
            _ => return Err(Error::UnknownParameter(name.to_owned())),
        }
        Ok(())
    }

    fn set_matrix(&mut self, name: &str, value: Mat4) -> Result<()> {
        match name {
            param::CAMERA_TO_WORLD => self.params.camera_to_world = value.to_cols_array_2d(),
            param::CAMERA_INVERSE_PROJECTION => {
                self.params.camera_inverse_projection = value.to_cols_array_2d()
            }
            _ => return Err(Error::UnknownParameter(name.to_owned())),
        }
        Ok(())
    }

    fn set_buffer(&mut self, kernel: usize, name: &str, buffer: &Self::Buffer) -> Result<()> {
        Self::check_kernel(kernel)?;
        match name {
            param::SPHERES => self.bindings.spheres = Some(buffer.clone()),
            _ => return Err(Error::UnknownParameter(name.to_owned())),
        }
        Ok(())
    }

    fn set_texture(&mut self, kernel: usize, name: &str, texture: &Self::Texture) -> Result<()> {
        Self::check_kernel(kernel)?;
        match name {
            param::SKYBOX_TEXTURE => self.bindings.skybox = Some(texture.clone()),
            _ => return Err(Error::UnknownParameter(name.to_owned())),
        }
        Ok(())
    }

    fn set_image(&mut self, kernel: usize, name: &str, image: &Self::Image) -> Result<()> {
        Self::check_kernel(kernel)?;
        match name {
            param::RESULT => self.bindings.result = Some(image.clone()),
            _ => return Err(Error::UnknownParameter(name.to_owned())),
        }
        Ok(())
    }

    fn dispatch(&mut self, kernel: usize, groups_x: u32, groups_y: u32, groups_z: u32) -> Result<()> {
        Self::check_kernel(kernel)?;
        let spheres = self
            .bindings
            .spheres
            .as_ref()
            .ok_or(Error::UnboundParameter(param::SPHERES))?;
        let skybox = self
            .bindings
            .skybox
            .as_ref()
            .ok_or(Error::UnboundParameter(param::SKYBOX_TEXTURE))?;
        let result = self
            .bindings
            .result
            .as_ref()
            .ok_or(Error::UnboundParameter(param::RESULT))?;

        self.queue
            .write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&self.params));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ray_tracing_bind_group"),
            layout: &self.kernel_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: spheres.buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&skybox.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&skybox.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(result.view()),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Ray Tracing Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Ray Tracing Pass"),
            });
            pass.set_pipeline(&self.kernel_pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups_x, groups_y, groups_z);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn find_composite_material(&mut self) -> Result<Self::Material> {
        let device = &self.device;
        let layout = &self.composite_bind_group_layout;
        let pipeline = scoped(device, wgpu::ErrorFilter::Validation, || {
            let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("Composite Shader"),
                source: wgpu::ShaderSource::Wgsl(COMPOSITE_WGSL.into()),
            });
            fullscreen_pipeline(device, "Composite Pipeline", &shader, layout, IMAGE_FORMAT)
        })
        .map_err(|e| Error::MissingCompositeMaterial(e.to_string()))?;

        let uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Composite Params"),
            size: std::mem::size_of::<CompositeParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(CompositeMaterial { pipeline, uniform })
    }

    fn composite(
        &mut self,
        material: &Self::Material,
        sample_count: f32,
        sample: &Self::Image,
        previous: &Self::Image,
        next: &Self::Image,
    ) -> Result<()> {
        let params = CompositeParams {
            sample_count,
            padding: [0.0; 3],
        };
        self.queue
            .write_buffer(&material.uniform, 0, bytemuck::bytes_of(&params));

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("composite_bind_group"),
            layout: &self.composite_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: material.uniform.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(sample.view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(previous.view()),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Composite Encoder"),
            });
        {
            let mut pass = full_pass(&mut encoder, "Composite Pass", next.view());
            pass.set_pipeline(&material.pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}
