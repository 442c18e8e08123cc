//! Progressive GPU ray tracing of a procedurally placed field of spheres.
//!
//! [`scene`] places non-overlapping spheres by rejection sampling once per
//! activation. Every frame, [`tracer::ProgressiveTracer`] restarts
//! accumulation when the camera or light moved ([`invalidation`]), keeps the
//! accumulation target sized to the output ([`frame_buffer`]), dispatches the
//! kernel and folds the new sample into a running average ([`progressive`]).
//! The GPU is reached through the [`device::RenderDevice`] contract; the wgpu
//! implementation lives in [`renderer`].

pub mod application;
pub mod camera;
pub mod device;
pub mod error;
pub mod frame_buffer;
pub mod geometry;
pub mod invalidation;
pub mod light;
pub mod progressive;
pub mod random;
pub mod renderer;
pub mod scene;
pub mod texture;
pub mod tracer;

#[cfg(test)]
mod testing;

pub use error::{Error, Result};
