mod cli;

use std::{path::PathBuf, rc::Rc};

use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sphere_tracer_lib::{
    application::{AppState, Application, FrameError, Layer, Screen, WindowSettings},
    camera::{Camera, CameraController},
    light::{DirectionalLight, LightController},
    progressive::Frame,
    renderer::WgpuDevice,
    scene::SceneConfig,
    texture::Texture,
    tracer::ProgressiveTracer,
    Error,
};
use wgpu::TextureViewDescriptor;
use winit::{
    dpi::PhysicalSize,
    event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent},
};

use cli::{init_logger, Args};

struct TracerSettings {
    scene: SceneConfig,
    seed: Option<u64>,
    skybox: Option<PathBuf>,
}

struct RayTracingMaster {
    device: WgpuDevice,
    tracer: ProgressiveTracer<WgpuDevice, ChaCha8Rng>,
    camera: Camera,
    camera_controller: CameraController,
    light: DirectionalLight,
    light_controller: LightController,
}

impl RayTracingMaster {
    /// Throw the current scene away and place a new one.
    fn regenerate(&mut self) -> Result<(), Error> {
        let skybox = match self.tracer.stop(&mut self.device) {
            Some(skybox) => skybox,
            None => Rc::new(Texture::procedural_sky(
                self.device.device(),
                self.device.queue(),
            )),
        };
        self.tracer.start(&mut self.device, skybox)
    }
}

impl Layer for RayTracingMaster {
    type Config = TracerSettings;
    type LayerErr = Error;

    fn start(screen: &mut Screen, _app: &AppState, config: TracerSettings) -> Result<Self, Error> {
        let mut device = WgpuDevice::new(
            screen.device.clone(),
            screen.queue.clone(),
            screen.config.format,
        );

        let skybox = match &config.skybox {
            Some(path) => Texture::from_path(&screen.device, &screen.queue, path)?,
            None => Texture::procedural_sky(&screen.device, &screen.queue),
        };

        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        };
        let mut tracer = ProgressiveTracer::new(config.scene, rng);
        tracer.start(&mut device, Rc::new(skybox))?;

        let mut camera = Camera::default();
        camera.aspect = screen.config.width as f32 / screen.config.height as f32;

        Ok(Self {
            device,
            tracer,
            camera,
            camera_controller: CameraController::new(2.0),
            light: DirectionalLight::default(),
            light_controller: LightController::new(5.0_f32.to_radians()),
        })
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>, _state: &AppState, _screen: &mut Screen) {
        if new_size.width > 0 && new_size.height > 0 {
            self.camera.aspect = new_size.width as f32 / new_size.height as f32;
        }
    }

    fn process_event(&mut self, event: &Event<()>, _screen: &mut Screen) {
        let Event::WindowEvent { event, .. } = event else {
            return;
        };
        if self.camera_controller.process_events(&mut self.camera, event)
            || self.light_controller.process_events(&mut self.light, event)
        {
            return;
        }
        if let WindowEvent::KeyboardInput {
            input:
                KeyboardInput {
                    state: ElementState::Pressed,
                    virtual_keycode: Some(VirtualKeyCode::F5),
                    ..
                },
            ..
        } = event
        {
            if let Err(e) = self.regenerate() {
                tracing::error!("failed to regenerate scene: {e}");
            }
        }
    }

    fn update(&mut self, app: &AppState, screen: &mut Screen) {
        let samples = self.tracer.sample_count();
        if samples.is_power_of_two() {
            tracing::debug!(
                samples,
                frame_time = app.elapsed_time(),
                frame = app.frame(),
                "accumulating"
            );
            screen
                .window()
                .set_title(&format!("sphere_tracer - {samples} samples"));
        }
    }

    fn render(&mut self, _app: &AppState, screen: &mut Screen) -> Result<(), FrameError<Error>> {
        let output = screen.surface.get_current_texture()?;
        let frame = Frame {
            width: screen.config.width,
            height: screen.config.height,
            camera: self.camera.state(),
            light: self.light.state(),
        };
        self.tracer
            .render_frame(&mut self.device, &frame)
            .map_err(FrameError::Layer)?;

        if let Some(image) = self.tracer.accumulation() {
            let view = output
                .texture
                .create_view(&TextureViewDescriptor::default());
            self.device.present(image, &view);
        }
        output.present();

        Ok(())
    }

    fn shutdown(&mut self, _app: &AppState, _screen: &mut Screen) -> Result<(), Error> {
        if let Some(skybox) = self.tracer.stop(&mut self.device) {
            skybox.texture.destroy();
        }
        tracing::info!("exiting");
        Ok(())
    }
}

fn main() {
    let args = Args::parse();
    init_logger(args.log_level);

    let window = WindowSettings {
        title: "sphere_tracer".to_owned(),
        width: args.width,
        height: args.height,
    };
    let settings = TracerSettings {
        scene: args.scene_config(),
        seed: args.seed,
        skybox: args.skybox.clone(),
    };
    pollster::block_on(Application::<RayTracingMaster>::init(window, settings));
}
