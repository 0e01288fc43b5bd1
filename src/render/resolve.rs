//! Full-screen lighting and ambient-occlusion pass.

use bytemuck::{bytes_of, Pod, Zeroable};

use super::common::pop_validation;
use super::gbuffer::GBuffer;
use super::shared::resolve_shader_source;
use super::RenderError;
use crate::config::{DemoConfig, MAX_LIGHTS, MAX_SAMPLE_POINTS};
use crate::shading::Light;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightUniform {
    pub position: [f32; 4],
    /// rgb = power, w = falloff distance.
    pub power: [f32; 4],
}

impl From<&Light> for LightUniform {
    fn from(light: &Light) -> Self {
        Self {
            position: light.position.extend(1.0).into(),
            power: light.power.extend(light.falloff_distance).into(),
        }
    }
}

/// Per-frame parameters of the resolve shader, laid out as `ResolveParams`
/// in WGSL.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ResolveUniform {
    /// xyz = camera position, w = ambient cap.
    pub camera: [f32; 4],
    /// xy = output size, zw = G-buffer size.
    pub sizes: [f32; 4],
    /// Kernel length, light count, SSAO flag, direct lighting flag.
    pub counts: [u32; 4],
    pub kernel: [[i32; 4]; MAX_SAMPLE_POINTS],
    pub lights: [LightUniform; MAX_LIGHTS],
}

impl ResolveUniform {
    /// Packs the configuration and the current light set. Entries past
    /// [`MAX_SAMPLE_POINTS`] or [`MAX_LIGHTS`] are ignored; a validated
    /// configuration never has any.
    pub fn new(config: &DemoConfig, lights: &[Light], output_size: (u32, u32)) -> Self {
        let mut uniform = Self::zeroed();
        uniform.camera = config.camera.eye.extend(config.max_ambient).into();
        uniform.sizes = [
            output_size.0 as f32,
            output_size.1 as f32,
            config.gbuffer_size.0 as f32,
            config.gbuffer_size.1 as f32,
        ];

        let kernel_len = config.sample_kernel.len().min(MAX_SAMPLE_POINTS);
        for (slot, offset) in uniform.kernel.iter_mut().zip(&config.sample_kernel) {
            *slot = [offset.x, offset.y, 0, 0];
        }
        let light_count = lights.len().min(MAX_LIGHTS);
        for (slot, light) in uniform.lights.iter_mut().zip(lights) {
            *slot = LightUniform::from(light);
        }

        uniform.counts = [
            kernel_len as u32,
            light_count as u32,
            config.ssao_enabled as u32,
            config.direct_lighting_enabled as u32,
        ];
        uniform
    }
}

pub struct ResolvePass {
    pipeline: wgpu::RenderPipeline,
    gbuffer_layout: wgpu::BindGroupLayout,
    gbuffer_bind_group: Option<wgpu::BindGroup>,
    params_buffer: wgpu::Buffer,
    params_bind_group: wgpu::BindGroup,
}

impl ResolvePass {
    pub async fn new(
        device: &wgpu::Device,
        output_format: wgpu::TextureFormat,
    ) -> Result<Self, RenderError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("resolve-shader"),
            source: wgpu::ShaderSource::Wgsl(resolve_shader_source().into()),
        });

        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: false },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let gbuffer_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("gbuffer-bind-layout"),
            entries: &[texture_entry(0), texture_entry(1), texture_entry(2)],
        });

        let params_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("resolve-params-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<ResolveUniform>() as u64,
                    ),
                },
                count: None,
            }],
        });

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("resolve-params"),
            size: std::mem::size_of::<ResolveUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let params_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("resolve-params-bind-group"),
            layout: &params_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: params_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("resolve-pipeline-layout"),
            bind_group_layouts: &[&gbuffer_layout, &params_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("resolve-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: output_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            multiview: None,
            cache: None,
        });

        if let Some(log) = pop_validation(device).await {
            return Err(RenderError::ShaderCompilation {
                program: "resolve",
                log,
            });
        }

        Ok(Self {
            pipeline,
            gbuffer_layout,
            gbuffer_bind_group: None,
            params_buffer,
            params_bind_group,
        })
    }

    /// Points the pass at the targets it reads from.
    pub fn bind_gbuffer(&mut self, device: &wgpu::Device, gbuffer: &GBuffer) {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("gbuffer-bind-group"),
            layout: &self.gbuffer_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&gbuffer.position.view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&gbuffer.normal.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&gbuffer.albedo.view),
                },
            ],
        });
        self.gbuffer_bind_group = Some(bind_group);
    }

    pub fn update(&self, queue: &wgpu::Queue, uniform: &ResolveUniform) {
        queue.write_buffer(&self.params_buffer, 0, bytes_of(uniform));
    }

    /// Clears `target` to opaque black and shades every covered pixel.
    pub fn encode(&self, encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView) {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("resolve-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        let Some(gbuffer_bind_group) = &self.gbuffer_bind_group else {
            return;
        };
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, gbuffer_bind_group, &[]);
        pass.set_bind_group(1, &self.params_bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{IVec2, Vec3};

    #[test]
    fn uniform_layout_matches_wgsl() {
        assert_eq!(std::mem::size_of::<LightUniform>(), 32);
        let expected = 3 * 16 + MAX_SAMPLE_POINTS * 16 + MAX_LIGHTS * 32;
        assert_eq!(std::mem::size_of::<ResolveUniform>(), expected);
        assert_eq!(std::mem::size_of::<ResolveUniform>() % 16, 0);
    }

    #[test]
    fn packs_reference_configuration() {
        let config = DemoConfig::default();
        let uniform = ResolveUniform::new(&config, &config.lights, (364, 364));
        assert_eq!(uniform.camera, [0.0, 0.0, 5.5, 0.13]);
        assert_eq!(uniform.sizes, [364.0; 4]);
        assert_eq!(uniform.counts, [8, 1, 1, 1]);
        assert_eq!(uniform.kernel[0], [3, 3, 0, 0]);
        assert_eq!(uniform.kernel[7], [1, -1, 0, 0]);
        assert_eq!(uniform.kernel[8], [0; 4]);
        assert_eq!(uniform.lights[0].position, [0.0, 0.0, 1.0, 1.0]);
        assert_eq!(uniform.lights[0].power, [1.0, 1.0, 1.0, 3.5]);
        assert_eq!(uniform.lights[1], LightUniform::zeroed());
    }

    #[test]
    fn toggles_and_output_size_are_carried() {
        let config = DemoConfig {
            ssao_enabled: false,
            direct_lighting_enabled: false,
            sample_kernel: vec![IVec2::new(2, -1)],
            ..DemoConfig::default()
        };
        let lights = [
            Light::new(Vec3::X, Vec3::ONE, 1.0),
            Light::new(Vec3::Y, Vec3::ONE, 2.0),
        ];
        let uniform = ResolveUniform::new(&config, &lights, (728, 182));
        assert_eq!(uniform.counts, [1, 2, 0, 0]);
        assert_eq!(uniform.sizes, [728.0, 182.0, 364.0, 364.0]);
        assert_eq!(uniform.kernel[0], [2, -1, 0, 0]);
        assert_eq!(uniform.lights[1].power[3], 2.0);
    }
}
