//! Two-pass deferred renderer demonstrating screen-space ambient occlusion.
//!
//! The geometry pass rasterizes randomly oriented boxes into an offscreen
//! G-buffer (world position, normal, albedo). A full-screen resolve pass then
//! estimates ambient occlusion from neighbouring G-buffer texels and adds
//! diffuse point-light contributions. Everything except the wgpu plumbing in
//! [`render`] is plain data and math, so it can be exercised without a GPU.

pub mod app;
pub mod config;
pub mod frame;
pub mod geometry;
pub mod math;
pub mod render;
pub mod sampler;
pub mod shading;

pub use config::{ConfigError, DemoConfig};
pub use frame::{drive_frame, FramePasses, FramePlan, FrameState};
pub use geometry::{box_mesh, BoxMesh, Vertex};
pub use math::{look_at, multiply, perspective, CameraMatrices, Matrix4};
pub use render::{RenderError, Renderer};
pub use sampler::{halton, RotationSampler};
pub use shading::{CpuGBuffer, GBufferTexel, Light, ResolveParams};
