//! Error type shared by the scene, accumulation and device layers.

use thiserror::Error;

/// Errors raised while setting up or rendering the progressive tracer.
///
/// Everything here is fatal for the current activation: nothing retries, and
/// a frame that fails leaves the pipeline to be torn down by the host.
#[derive(Error, Debug)]
pub enum Error {
    /// A GPU buffer or image could not be created.
    #[error("Failed to allocate {what}: {reason}")]
    Allocation { what: &'static str, reason: String },

    /// Requested output size has a zero dimension.
    #[error("Invalid target size {width}x{height}")]
    InvalidTargetSize { width: u32, height: u32 },

    /// Scene configuration cannot produce a valid scene.
    #[error("Invalid scene configuration: {0}")]
    InvalidConfig(String),

    /// The compositing shader could not be resolved.
    #[error("Compositing material unavailable: {0}")]
    MissingCompositeMaterial(String),

    /// The kernel has no parameter with this name.
    #[error("Unknown shader parameter: {0}")]
    UnknownParameter(String),

    /// Only kernel 0 exists.
    #[error("Unknown kernel index: {0}")]
    UnknownKernel(usize),

    /// A resource binding required by the kernel was never set.
    #[error("Shader parameter {0} is not bound")]
    UnboundParameter(&'static str),

    /// `render_frame` was called outside `start()`/`stop()`.
    #[error("Tracer has not been started")]
    NotStarted,

    /// Skybox image could not be decoded.
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, Error>;
