//! The progressive tracer subsystem: scene activation, per-frame rendering
//! and explicit teardown.

use rand::Rng;

use crate::{
    device::RenderDevice,
    error::{Error, Result},
    frame_buffer::{FrameBufferManager, SampleCount},
    geometry::GeometryBuffer,
    invalidation::InvalidationTracker,
    progressive::{Frame, ProgressiveRenderer},
    scene::{Scene, SceneConfig},
};

struct Active<B, T> {
    scene: Scene,
    geometry: GeometryBuffer<B>,
    skybox: T,
}

/// Owns every resource of one activation and the random source that drives
/// both scene placement and per-frame jitter.
///
/// Resources are only released through [`ProgressiveTracer::stop`].
pub struct ProgressiveTracer<D: RenderDevice, R> {
    config: SceneConfig,
    rng: R,
    active: Option<Active<D::Buffer, D::Texture>>,
    frame_buffer: FrameBufferManager<D::Image>,
    tracker: InvalidationTracker,
    renderer: ProgressiveRenderer<D::Material>,
    samples: SampleCount,
}

impl<D: RenderDevice, R: Rng> ProgressiveTracer<D, R> {
    pub fn new(config: SceneConfig, rng: R) -> Self {
        Self {
            config,
            rng,
            active: None,
            frame_buffer: FrameBufferManager::new(),
            tracker: InvalidationTracker::new(),
            renderer: ProgressiveRenderer::new(),
            samples: SampleCount::default(),
        }
    }

    /// Generate the scene and upload it. Restarting releases the previous
    /// activation's geometry first.
    pub fn start(&mut self, device: &mut D, skybox: D::Texture) -> Result<()> {
        self.config.validate()?;
        if let Some(previous) = self.active.take() {
            previous.geometry.release(device);
        }

        self.samples.reset();
        self.tracker.clear();

        let scene = Scene::generate(&self.config, &mut self.rng)?;
        let geometry = GeometryBuffer::upload(device, &scene)?;
        tracing::info!(spheres = scene.len(), "tracer started");
        self.active = Some(Active {
            scene,
            geometry,
            skybox,
        });
        Ok(())
    }

    /// Render and accumulate one frame.
    pub fn render_frame(&mut self, device: &mut D, frame: &Frame) -> Result<()> {
        let active = self.active.as_ref().ok_or(Error::NotStarted)?;

        self.tracker.observe(
            frame.camera.world_to_camera,
            frame.light.transform,
            &mut self.samples,
        );
        let target =
            self.frame_buffer
                .ensure_target(device, frame.width, frame.height, &mut self.samples)?;
        self.renderer.render_frame(
            device,
            &active.geometry,
            &active.skybox,
            target,
            frame,
            &mut self.samples,
            &mut self.rng,
        )
    }

    /// Release the scene buffer and the accumulation target. Safe to call
    /// when not started.
    pub fn stop(&mut self, device: &mut D) -> Option<D::Texture> {
        self.frame_buffer.release(device);
        self.renderer.release();
        self.tracker.clear();
        self.samples.reset();
        let active = self.active.take()?;
        active.geometry.release(device);
        tracing::info!("tracer stopped");
        Some(active.skybox)
    }

    /// Restart accumulation on the next frame.
    pub fn invalidate(&mut self) {
        self.tracker.mark_dirty();
    }

    pub fn is_started(&self) -> bool {
        self.active.is_some()
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.active.as_ref().map(|a| &a.scene)
    }

    pub fn sample_count(&self) -> u32 {
        self.samples.get()
    }

    /// Current converged image, once a frame has been rendered.
    pub fn accumulation(&self) -> Option<&D::Image> {
        self.frame_buffer.target().map(|t| t.accumulation())
    }
}
