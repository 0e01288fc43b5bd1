mod common;
pub mod gbuffer;
mod native;
pub mod resolve;
pub mod shared;

use thiserror::Error;

use crate::config::ConfigError;

pub use gbuffer::{instance_transforms, GBuffer, GeometryPass, InstanceTransforms};
pub use native::Renderer;
pub use resolve::{ResolvePass, ResolveUniform};

/// Failures raised while bringing up or driving the GPU pipeline.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to create rendering surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("failed to acquire GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to create GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("failed to build {program} program:\n{log}")]
    ShaderCompilation { program: &'static str, log: String },
    #[error("G-buffer is incomplete: {0}")]
    IncompleteGBuffer(String),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to acquire frame: {0}")]
    Frame(#[from] wgpu::SurfaceError),
}
