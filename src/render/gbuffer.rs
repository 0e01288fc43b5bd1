//! Offscreen G-buffer and the pass that fills it.

use bytemuck::{bytes_of, Pod, Zeroable};
use log::{debug, info};
use wgpu::util::DeviceExt;

use super::common::{pop_validation, DepthBuffer, MeshBuffers};
use super::shared::geometry_shader_source;
use super::RenderError;
use crate::config::DemoConfig;
use crate::geometry::{box_mesh, Vertex};
use crate::math::{multiply, CameraMatrices, Matrix4};
use crate::sampler::RotationSampler;

pub const POSITION_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;
pub const NORMAL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const ALBEDO_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const TARGETS: [(&str, wgpu::TextureFormat); 3] = [
    ("position", POSITION_FORMAT),
    ("normal", NORMAL_FORMAT),
    ("albedo", ALBEDO_FORMAT),
];

/// One colour target of the G-buffer.
pub struct GBufferTarget {
    _texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

/// Position, normal and albedo targets plus the depth attachment.
///
/// Everything is released when the value is dropped.
pub struct GBuffer {
    pub position: GBufferTarget,
    pub normal: GBufferTarget,
    pub albedo: GBufferTarget,
    depth: DepthBuffer,
}

impl GBuffer {
    /// Allocates the targets after checking that the adapter can render to
    /// and sample from every format involved.
    pub async fn create(
        device: &wgpu::Device,
        adapter: &wgpu::Adapter,
        width: u32,
        height: u32,
    ) -> Result<Self, RenderError> {
        let max_attachments = device.limits().max_color_attachments;
        if max_attachments < TARGETS.len() as u32 {
            return Err(RenderError::IncompleteGBuffer(format!(
                "device supports {max_attachments} colour attachments, {} required",
                TARGETS.len()
            )));
        }
        let required =
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
        for (name, format) in TARGETS {
            let features = adapter.get_texture_format_features(format);
            if !features.allowed_usages.contains(required) {
                return Err(RenderError::IncompleteGBuffer(format!(
                    "{name} target format {format:?} cannot be rendered to and sampled"
                )));
            }
        }

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let [position, normal, albedo] =
            TARGETS.map(|(name, format)| create_target(device, name, format, width, height));
        let depth = DepthBuffer::create(device, width, height);
        if let Some(log) = pop_validation(device).await {
            return Err(RenderError::IncompleteGBuffer(log));
        }

        info!("G-buffer allocated at {width}x{height}");
        Ok(Self {
            position,
            normal,
            albedo,
            depth,
        })
    }
}

fn create_target(
    device: &wgpu::Device,
    name: &str,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
) -> GBufferTarget {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(&format!("gbuffer-{name}")),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GBufferTarget {
        _texture: texture,
        view,
    }
}

/// Transforms of one box instance, composed with [`multiply`].
///
/// The G-buffer stores world-space positions and normals, so the fragment
/// stage only needs the object-to-world transform next to the MVP. The
/// camera's view-space normal matrix never reaches the geometry pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InstanceTransforms {
    /// Object to world; the sampled rotation.
    pub model: Matrix4,
    pub model_view_projection: Matrix4,
}

pub fn instance_transforms(
    rotation: &Matrix4,
    camera: &CameraMatrices,
    projection: &Matrix4,
) -> InstanceTransforms {
    let model_view = multiply(rotation, &camera.view);
    InstanceTransforms {
        model: *rotation,
        model_view_projection: multiply(&model_view, projection),
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct InstanceUniform {
    model_view_projection: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
    normal: [[f32; 4]; 4],
}

impl From<&InstanceTransforms> for InstanceUniform {
    fn from(transforms: &InstanceTransforms) -> Self {
        Self {
            model_view_projection: transforms.model_view_projection.to_cols_array_2d(),
            model: transforms.model.to_cols_array_2d(),
            normal: transforms.model.without_translation().to_cols_array_2d(),
        }
    }
}

/// Pipeline and static resources of the geometry pass.
pub struct GeometryPass {
    pipeline: wgpu::RenderPipeline,
    instance_layout: wgpu::BindGroupLayout,
    material_bind_group: wgpu::BindGroup,
    mesh: MeshBuffers,
    sampler: RotationSampler,
    instance_count: u32,
}

impl GeometryPass {
    pub async fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        config: &DemoConfig,
    ) -> Result<Self, RenderError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("geometry-shader"),
            source: wgpu::ShaderSource::Wgsl(geometry_shader_source().into()),
        });

        let instance_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("instance-bind-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<InstanceUniform>() as u64,
                    ),
                },
                count: None,
            }],
        });

        let material_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("material-bind-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        // 1x1 white albedo; the boxes carry no other material.
        let albedo = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("albedo-white"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &[255, 255, 255, 255],
        );
        let albedo_view = albedo.create_view(&wgpu::TextureViewDescriptor::default());
        let albedo_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("albedo-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let material_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("material-bind-group"),
            layout: &material_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&albedo_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&albedo_sampler),
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("geometry-pipeline-layout"),
            bind_group_layouts: &[&instance_layout, &material_layout],
            push_constant_ranges: &[],
        });

        let targets = TARGETS.map(|(_, format)| {
            Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("geometry-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<Vertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[
                        wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x3,
                            offset: 0,
                            shader_location: 0,
                        },
                        wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x3,
                            offset: (3 * std::mem::size_of::<f32>()) as u64,
                            shader_location: 1,
                        },
                        wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Float32x2,
                            offset: (6 * std::mem::size_of::<f32>()) as u64,
                            shader_location: 2,
                        },
                    ],
                }],
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DepthBuffer::FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &targets,
            }),
            multiview: None,
            cache: None,
        });

        if let Some(log) = pop_validation(device).await {
            return Err(RenderError::ShaderCompilation {
                program: "geometry",
                log,
            });
        }

        let extent = config.box_extent;
        let mesh = MeshBuffers::from_box(device, &box_mesh(extent.x, extent.y, extent.z), "box");

        Ok(Self {
            pipeline,
            instance_layout,
            material_bind_group,
            mesh,
            sampler: RotationSampler::with_up_swap_threshold(config.up_swap_threshold),
            instance_count: config.instance_count,
        })
    }

    /// Records the geometry pass: clear every target, then draw one box per
    /// instance with a fresh rotation from the sampler.
    pub fn encode(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        gbuffer: &GBuffer,
        camera: &CameraMatrices,
        projection: &Matrix4,
    ) {
        let bind_groups: Vec<wgpu::BindGroup> = (0..self.instance_count)
            .map(|_| {
                let rotation = self.sampler.next_rotation();
                let transforms = instance_transforms(&rotation, camera, projection);
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("instance-uniform"),
                    contents: bytes_of(&InstanceUniform::from(&transforms)),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("instance-bind-group"),
                    layout: &self.instance_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                })
            })
            .collect();
        debug!(
            "geometry pass: {} instances, sampler at {}",
            bind_groups.len(),
            self.sampler.index()
        );

        let clear = wgpu::Operations {
            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
            store: wgpu::StoreOp::Store,
        };
        let attachments = [&gbuffer.position, &gbuffer.normal, &gbuffer.albedo].map(|target| {
            Some(wgpu::RenderPassColorAttachment {
                view: &target.view,
                depth_slice: None,
                resolve_target: None,
                ops: clear,
            })
        });

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("geometry-pass"),
            color_attachments: &attachments,
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &gbuffer.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(1, &self.material_bind_group, &[]);
        pass.set_vertex_buffer(0, self.mesh.vertex.slice(..));
        pass.set_index_buffer(self.mesh.index.slice(..), MeshBuffers::INDEX_FORMAT);
        for bind_group in &bind_groups {
            pass.set_bind_group(0, bind_group, &[]);
            pass.draw_indexed(0..self.mesh.index_count, 0, 0..1);
        }
    }
}
