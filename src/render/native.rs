use std::sync::Arc;

use log::{error, info};
use pollster::block_on;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use super::common::pop_validation;
use super::gbuffer::{GBuffer, GeometryPass};
use super::resolve::{ResolvePass, ResolveUniform};
use super::RenderError;
use crate::config::DemoConfig;
use crate::frame::{drive_frame, FramePasses, FramePlan, FrameState};
use crate::math::{look_at, multiply, perspective, CameraMatrices, Matrix4, DEPTH_ZERO_TO_ONE};

/// Owns the window surface, the device and both passes.
pub struct Renderer {
    passes: GpuPasses,
    state: FrameState,
    config: DemoConfig,
}

struct GpuPasses {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,
    gbuffer: GBuffer,
    geometry: GeometryPass,
    resolve: ResolvePass,
    camera: CameraMatrices,
    projection: Matrix4,
    config: DemoConfig,
    pending: Option<wgpu::SurfaceTexture>,
}

impl Renderer {
    /// Brings up the device for `window` and builds both passes.
    pub async fn new(window: Arc<Window>, config: DemoConfig) -> Result<Self, RenderError> {
        config.validate()?;
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: Default::default(),
            backend_options: Default::default(),
        });
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        let adapter_info = adapter.get_info();
        info!(
            "using adapter {} ({:?})",
            adapter_info.name, adapter_info.backend
        );

        let device_descriptor = wgpu::DeviceDescriptor {
            label: Some("ssao-device"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            experimental_features: Default::default(),
            memory_hints: Default::default(),
            trace: Default::default(),
        };
        let (device, queue) = adapter.request_device(&device_descriptor).await?;

        // Shading happens in linear space without any output transfer, so a
        // plain UNORM swapchain keeps the colours the resolve writes.
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| !format.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);
        info!("surface format {surface_format:?}");

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
        };
        surface.configure(&device, &surface_config);

        let (gbuffer_width, gbuffer_height) = config.gbuffer_size;
        let gbuffer = GBuffer::create(&device, &adapter, gbuffer_width, gbuffer_height).await?;
        let geometry = GeometryPass::new(&device, &queue, &config).await?;
        let mut resolve = ResolvePass::new(&device, surface_format).await?;
        resolve.bind_gbuffer(&device, &gbuffer);

        let camera_config = config.camera;
        let camera = look_at(camera_config.eye, camera_config.target, camera_config.up);
        let projection = multiply(
            &perspective(
                camera_config.fov_y_degrees,
                config.aspect(),
                camera_config.near,
                camera_config.far,
            ),
            &DEPTH_ZERO_TO_ONE,
        );

        Ok(Self {
            passes: GpuPasses {
                window,
                surface,
                device,
                queue,
                surface_config,
                gbuffer,
                geometry,
                resolve,
                camera,
                projection,
                config: config.clone(),
                pending: None,
            },
            state: FrameState::new(config.lights.clone()),
            config,
        })
    }

    /// Returns the identifier of the window owned by the renderer.
    pub fn window_id(&self) -> WindowId {
        self.passes.window.id()
    }

    pub fn window(&self) -> &Window {
        &self.passes.window
    }

    pub fn frame_state(&self) -> &FrameState {
        &self.state
    }

    /// Reconfigures the swap chain. The G-buffer keeps its own resolution.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        let passes = &mut self.passes;
        passes.surface_config.width = new_size.width;
        passes.surface_config.height = new_size.height;
        passes
            .surface
            .configure(&passes.device, &passes.surface_config);
    }

    /// Renders and presents one frame.
    pub fn render(&mut self) -> Result<FramePlan, RenderError> {
        drive_frame(&mut self.state, &self.config, &mut self.passes)
    }
}

impl GpuPasses {
    /// Submits `encoder` and reports validation errors raised since the
    /// matching `push_error_scope`. Such errors are logged, never fatal.
    fn submit_checked(&self, pass: &str, encoder: wgpu::CommandEncoder) {
        self.queue.submit(std::iter::once(encoder.finish()));
        if let Some(err) = block_on(pop_validation(&self.device)) {
            error!("GPU error in {pass} pass: {err}");
        }
    }

    fn encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }
}

impl FramePasses for GpuPasses {
    type Error = RenderError;

    fn geometry_pass(&mut self, _state: &FrameState) -> Result<(), RenderError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = self.encoder("geometry-encoder");
        self.geometry.encode(
            &self.device,
            &mut encoder,
            &self.gbuffer,
            &self.camera,
            &self.projection,
        );
        self.submit_checked("geometry", encoder);
        Ok(())
    }

    fn resolve_pass(&mut self, state: &FrameState) -> Result<(), RenderError> {
        let frame = self.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let output_size = (self.surface_config.width, self.surface_config.height);
        let uniform = ResolveUniform::new(&self.config, state.lights(), output_size);
        self.resolve.update(&self.queue, &uniform);

        let mut encoder = self.encoder("resolve-encoder");
        self.resolve.encode(&mut encoder, &view);
        self.submit_checked("resolve", encoder);

        self.pending = Some(frame);
        Ok(())
    }

    fn present(&mut self) -> Result<(), RenderError> {
        if let Some(frame) = self.pending.take() {
            frame.present();
        }
        Ok(())
    }
}
