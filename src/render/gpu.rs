use std::collections::HashMap;
use std::num::NonZeroU64;

use glam::{Mat4, Vec3};
use log::{debug, warn};
use wgpu::util::DeviceExt;

use super::{srgb_to_linear, GlobalUniform, ObjectUniform};
use crate::background::BackgroundScene;
use crate::frames::Frame;
use crate::model::{MaterialParams, Model, TextureSlot, VERTEX_STRIDE};
use crate::scene::Lighting;
use crate::texture::{Filter, TextureSampling, Wrap};

/// Pipelines, meshes and textures for one [`BackgroundScene`] on one device.
///
/// Geometry is uploaded lazily the first time a node shows up with a model,
/// so models that finish loading after start-up appear on the next frame.
pub struct GpuScene {
    format: wgpu::TextureFormat,
    encode_srgb: bool,
    depth: DepthBuffer,
    global_layout: wgpu::BindGroupLayout,
    object_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    lit: wgpu::RenderPipeline,
    lit_double_sided: wgpu::RenderPipeline,
    sprite: wgpu::RenderPipeline,
    image_sampler: wgpu::Sampler,
    white: TextureBinding,
    animated: Option<TextureBinding>,
    meshes: HashMap<String, NodeMeshes>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineKind {
    Lit,
    LitDoubleSided,
    Sprite,
}

impl PipelineKind {
    fn for_material(material: &MaterialParams) -> Self {
        if material.blend || !material.depth_write {
            Self::Sprite
        } else if material.double_sided {
            Self::LitDoubleSided
        } else {
            Self::Lit
        }
    }
}

struct NodeMeshes {
    primitives: Vec<PrimitiveBuffers>,
    images: Vec<Option<TextureBinding>>,
}

struct PrimitiveBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    index_count: u32,
    transform: Mat4,
    material: MaterialParams,
}

struct TextureBinding {
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    size: (u32, u32),
    format: wgpu::TextureFormat,
}

struct DrawCall<'a> {
    kind: PipelineKind,
    mesh: &'a PrimitiveBuffers,
    object: wgpu::BindGroup,
    texture: &'a wgpu::BindGroup,
}

impl GpuScene {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("background-shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        let global_layout = uniform_layout::<GlobalUniform>(device, "global-bind-layout");
        let object_layout = uniform_layout::<ObjectUniform>(device, "object-bind-layout");
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture-bind-layout"),
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

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("background-pipeline-layout"),
            bind_group_layouts: &[&global_layout, &object_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        let build = |kind| build_pipeline(device, &pipeline_layout, &shader, format, kind);
        let lit = build(PipelineKind::Lit);
        let lit_double_sided = build(PipelineKind::LitDoubleSided);
        let sprite = build(PipelineKind::Sprite);

        let image_sampler = create_sampler(device, &TextureSampling::pixelated());
        let white = upload_texture(
            device,
            queue,
            &texture_layout,
            &image_sampler,
            &Frame {
                width: 1,
                height: 1,
                rgba: vec![255; 4],
            },
            wgpu::TextureFormat::Rgba8UnormSrgb,
            "white-texture",
        );

        Self {
            format,
            encode_srgb: !format.is_srgb(),
            depth: DepthBuffer::create(device, width, height),
            global_layout,
            object_layout,
            texture_layout,
            lit,
            lit_double_sided,
            sprite,
            image_sampler,
            white,
            animated: None,
            meshes: HashMap::new(),
        }
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.depth = DepthBuffer::create(device, width, height);
    }

    /// Brings GPU resources in line with the scene: uploads newly attached
    /// models, drops geometry of torn-down nodes and re-uploads the animated
    /// texture when its canvas changed.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        scene: &mut BackgroundScene,
    ) {
        self.meshes.retain(|name, _| {
            scene
                .node(name)
                .map(|node| node.model.is_some())
                .unwrap_or(false)
        });
        for node in scene.nodes() {
            let Some(model) = node.model.as_ref() else {
                continue;
            };
            if self.meshes.contains_key(&node.object.name) {
                continue;
            }
            let meshes = self.upload_model(device, queue, &node.object.name, model);
            debug!(
                "uploaded {} ({} primitives)",
                node.object.name,
                meshes.primitives.len()
            );
            self.meshes.insert(node.object.name.clone(), meshes);
        }

        let Some(texture) = scene.texture_mut() else {
            self.animated = None;
            return;
        };
        let sampling = *texture.sampling();
        let canvas = texture.canvas_mut();
        let size = (canvas.width(), canvas.height());
        let expected = size.0 as usize * size.1 as usize * 4;
        if canvas.pixels().len() != expected {
            return;
        }
        let format = texture_format(&sampling);
        let stale = self
            .animated
            .as_ref()
            .map(|binding| binding.size != size || binding.format != format)
            .unwrap_or(true);
        if stale {
            let sampler = create_sampler(device, &sampling);
            let frame = Frame {
                width: size.0,
                height: size.1,
                rgba: canvas.pixels().to_vec(),
            };
            self.animated = Some(upload_texture(
                device,
                queue,
                &self.texture_layout,
                &sampler,
                &frame,
                format,
                "animated-texture",
            ));
            canvas.take_dirty();
        } else if canvas.take_dirty() {
            if let Some(binding) = &self.animated {
                write_pixels(queue, &binding._texture, size, canvas.pixels());
            }
        }
    }

    /// Records the background pass into `encoder`.
    pub fn draw(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        scene: &BackgroundScene,
    ) {
        let mut globals = GlobalUniform::new(
            scene.camera(),
            scene.lighting(),
            scene.exposure(),
            scene.aspect(),
        );
        globals.fog_range[2] = if self.encode_srgb { 1.0 } else { 0.0 };
        let global_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("global-uniform"),
            contents: bytemuck::bytes_of(&globals),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let global_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("global-bind-group"),
            layout: &self.global_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: global_buffer.as_entire_binding(),
            }],
        });

        let mut calls = Vec::new();
        for node in scene.nodes() {
            let Some(meshes) = self.meshes.get(&node.object.name) else {
                continue;
            };
            let node_transform = node.transform();
            for mesh in &meshes.primitives {
                let (texture, sampling, textured) = self.texture_for(meshes, mesh, scene);
                let constants = ObjectUniform::new(
                    node_transform * mesh.transform,
                    &mesh.material,
                    &sampling,
                    textured,
                );
                let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("object-uniform"),
                    contents: bytemuck::bytes_of(&constants),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
                let object = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("object-bind-group"),
                    layout: &self.object_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                });
                calls.push(DrawCall {
                    kind: PipelineKind::for_material(&mesh.material),
                    mesh,
                    object,
                    texture,
                });
            }
        }
        // Blended sprites go last so the chunk is already in the depth buffer.
        calls.sort_by_key(|call| call.kind == PipelineKind::Sprite);

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("background-pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear_color(scene.lighting(), self.encode_srgb)),
                    store: true,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: true,
                }),
                stencil_ops: None,
            }),
        });

        pass.set_bind_group(0, &global_bind_group, &[]);
        for call in &calls {
            pass.set_pipeline(self.pipeline(call.kind));
            pass.set_bind_group(1, &call.object, &[]);
            pass.set_bind_group(2, call.texture, &[]);
            pass.set_vertex_buffer(0, call.mesh.vertex.slice(..));
            pass.set_index_buffer(call.mesh.index.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..call.mesh.index_count, 0, 0..1);
        }
    }

    /// Prepares, records and submits one frame into `view`.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        view: &wgpu::TextureView,
        scene: &mut BackgroundScene,
    ) {
        self.prepare(device, queue, scene);
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("background-encoder"),
        });
        self.draw(device, &mut encoder, view, scene);
        queue.submit(std::iter::once(encoder.finish()));
    }

    /// Drops every uploaded mesh and texture.
    pub fn clear(&mut self) {
        self.meshes.clear();
        self.animated = None;
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.values().map(|node| node.primitives.len()).sum()
    }

    fn pipeline(&self, kind: PipelineKind) -> &wgpu::RenderPipeline {
        match kind {
            PipelineKind::Lit => &self.lit,
            PipelineKind::LitDoubleSided => &self.lit_double_sided,
            PipelineKind::Sprite => &self.sprite,
        }
    }

    fn texture_for<'a>(
        &'a self,
        meshes: &'a NodeMeshes,
        mesh: &PrimitiveBuffers,
        scene: &BackgroundScene,
    ) -> (&'a wgpu::BindGroup, TextureSampling, bool) {
        match mesh.material.texture {
            TextureSlot::Image(index) => match meshes.images.get(index).and_then(Option::as_ref) {
                Some(binding) => (&binding.bind_group, TextureSampling::pixelated(), true),
                None => (&self.white.bind_group, TextureSampling::pixelated(), false),
            },
            TextureSlot::Animated => match (&self.animated, scene.texture()) {
                (Some(binding), Some(texture)) => (&binding.bind_group, *texture.sampling(), true),
                _ => (&self.white.bind_group, TextureSampling::pixelated(), false),
            },
            TextureSlot::None => (&self.white.bind_group, TextureSampling::pixelated(), false),
        }
    }

    fn upload_model(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        name: &str,
        model: &Model,
    ) -> NodeMeshes {
        let primitives = model
            .primitives
            .iter()
            .filter(|primitive| !primitive.indices.is_empty())
            .map(|primitive| PrimitiveBuffers {
                vertex: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{name}-vertices")),
                    contents: bytemuck::cast_slice(&primitive.vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
                index: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{name}-indices")),
                    contents: bytemuck::cast_slice(&primitive.indices),
                    usage: wgpu::BufferUsages::INDEX,
                }),
                index_count: primitive.indices.len() as u32,
                transform: primitive.transform,
                material: primitive.material,
            })
            .collect();

        let images = model
            .images
            .iter()
            .enumerate()
            .map(|(index, image)| {
                let image = image.as_ref()?;
                if image.rgba.len() != image.width as usize * image.height as usize * 4 {
                    warn!("{name}: image {index} has a malformed pixel buffer");
                    return None;
                }
                Some(upload_texture(
                    device,
                    queue,
                    &self.texture_layout,
                    &self.image_sampler,
                    image,
                    wgpu::TextureFormat::Rgba8UnormSrgb,
                    &format!("{name}-image-{index}"),
                ))
            })
            .collect();

        NodeMeshes { primitives, images }
    }
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth-texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

fn uniform_layout<T>(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: NonZeroU64::new(std::mem::size_of::<T>() as u64),
            },
            count: None,
        }],
    })
}

fn build_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    kind: PipelineKind,
) -> wgpu::RenderPipeline {
    let (cull_mode, depth_write_enabled, blend) = match kind {
        PipelineKind::Lit => (Some(wgpu::Face::Back), true, wgpu::BlendState::REPLACE),
        PipelineKind::LitDoubleSided => (None, true, wgpu::BlendState::REPLACE),
        PipelineKind::Sprite => (None, false, wgpu::BlendState::ALPHA_BLENDING),
    };
    let float = std::mem::size_of::<f32>() as u64;
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(match kind {
            PipelineKind::Lit => "lit-pipeline",
            PipelineKind::LitDoubleSided => "lit-double-sided-pipeline",
            PipelineKind::Sprite => "sprite-pipeline",
        }),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: "vs_main",
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: VERTEX_STRIDE as u64 * float,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &[
                    wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x3,
                        offset: 0,
                        shader_location: 0,
                    },
                    wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x3,
                        offset: 3 * float,
                        shader_location: 1,
                    },
                    wgpu::VertexAttribute {
                        format: wgpu::VertexFormat::Float32x2,
                        offset: 6 * float,
                        shader_location: 2,
                    },
                ],
            }],
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode,
            polygon_mode: wgpu::PolygonMode::Fill,
            ..Default::default()
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DepthBuffer::FORMAT,
            depth_write_enabled,
            depth_compare: wgpu::CompareFunction::LessEqual,
            stencil: Default::default(),
            bias: Default::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview: None,
    })
}

fn sampler_modes(sampling: &TextureSampling) -> (wgpu::AddressMode, wgpu::FilterMode) {
    let address = match sampling.wrap {
        Wrap::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        Wrap::Repeat => wgpu::AddressMode::Repeat,
    };
    let filter = match sampling.filter {
        Filter::Nearest => wgpu::FilterMode::Nearest,
        Filter::Linear => wgpu::FilterMode::Linear,
    };
    (address, filter)
}

fn create_sampler(device: &wgpu::Device, sampling: &TextureSampling) -> wgpu::Sampler {
    let (address, filter) = sampler_modes(sampling);
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("texture-sampler"),
        address_mode_u: address,
        address_mode_v: address,
        address_mode_w: address,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

fn texture_format(sampling: &TextureSampling) -> wgpu::TextureFormat {
    if sampling.srgb {
        wgpu::TextureFormat::Rgba8UnormSrgb
    } else {
        wgpu::TextureFormat::Rgba8Unorm
    }
}

fn upload_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    frame: &Frame,
    format: wgpu::TextureFormat,
    label: &str,
) -> TextureBinding {
    let size = (frame.width.max(1), frame.height.max(1));
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: size.0,
            height: size.1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    write_pixels(queue, &texture, size, &frame.rgba);
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });
    TextureBinding {
        _texture: texture,
        bind_group,
        size,
        format,
    }
}

fn write_pixels(queue: &wgpu::Queue, texture: &wgpu::Texture, size: (u32, u32), rgba: &[u8]) {
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        rgba,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * size.0),
            rows_per_image: Some(size.1),
        },
        wgpu::Extent3d {
            width: size.0,
            height: size.1,
            depth_or_array_layers: 1,
        },
    );
}

/// The fog colour, so the horizon blends into the clear.
fn clear_color(lighting: &Lighting, encode_srgb: bool) -> wgpu::Color {
    let color: Vec3 = if encode_srgb {
        lighting.fog.color
    } else {
        srgb_to_linear(lighting.fog.color)
    };
    wgpu::Color {
        r: f64::from(color.x),
        g: f64::from(color.y),
        b: f64::from(color.z),
        a: 1.0,
    }
}

const SHADER: &str = r#"
struct GlobalUniform {
    view_proj: mat4x4<f32>,
    camera_position: vec4<f32>,
    sky_color: vec4<f32>,
    ground_color: vec4<f32>,
    sun_direction: vec4<f32>,
    sun_color: vec4<f32>,
    fog_color: vec4<f32>,
    fog_range: vec4<f32>,
}

struct ObjectUniform {
    model: mat4x4<f32>,
    normal: mat3x4<f32>,
    color: vec4<f32>,
    uv_row0: vec4<f32>,
    uv_row1: vec4<f32>,
    material: vec4<f32>,
    emissive: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> globals: GlobalUniform;

@group(1) @binding(0)
var<uniform> object: ObjectUniform;

@group(2) @binding(0)
var base_texture: texture_2d<f32>;
@group(2) @binding(1)
var base_sampler: sampler;

const UNLIT: u32 = 1u;
const FLAT: u32 = 2u;
const TEXTURED: u32 = 4u;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    let world_position = object.model * vec4<f32>(input.position, 1.0);
    out.position = globals.view_proj * world_position;
    out.world_pos = world_position.xyz;

    let world_normal = mat3x3<f32>(
        object.normal[0].xyz,
        object.normal[1].xyz,
        object.normal[2].xyz
    ) * input.normal;
    out.normal = world_normal;

    let uv = vec3<f32>(input.uv, 1.0);
    out.uv = vec2<f32>(dot(object.uv_row0.xyz, uv), dot(object.uv_row1.xyz, uv));
    return out;
}

fn aces(x: vec3<f32>) -> vec3<f32> {
    let a = x * (2.51 * x + 0.03);
    let b = x * (2.43 * x + 0.59) + 0.14;
    return clamp(a / b, vec3<f32>(0.0), vec3<f32>(1.0));
}

fn encode(color: vec3<f32>) -> vec3<f32> {
    if globals.fog_range.z > 0.5 {
        return pow(color, vec3<f32>(1.0 / 2.2));
    }
    return color;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let bits = u32(object.material.w);
    let sampled = textureSample(base_texture, base_sampler, input.uv);
    let flat_normal = normalize(cross(dpdx(input.world_pos), dpdy(input.world_pos)));

    var albedo = object.color;
    if (bits & TEXTURED) != 0u {
        albedo = albedo * sampled;
    }
    if albedo.a < object.emissive.w {
        discard;
    }

    let distance = length(input.world_pos - globals.camera_position.xyz);
    let fog_span = max(globals.fog_range.y - globals.fog_range.x, 0.0001);
    let fog = clamp((distance - globals.fog_range.x) / fog_span, 0.0, 1.0);

    if (bits & UNLIT) != 0u {
        let color = mix(albedo.rgb, globals.fog_color.rgb, fog);
        return vec4<f32>(encode(color), albedo.a);
    }

    var normal = normalize(input.normal);
    if (bits & FLAT) != 0u {
        normal = flat_normal;
    }

    let roughness = object.material.x;
    let metalness = object.material.y;
    let specular_strength = object.material.z;

    let hemisphere = mix(globals.ground_color.rgb, globals.sky_color.rgb, normal.y * 0.5 + 0.5);
    let sun_dir = normalize(globals.sun_direction.xyz);
    let sun = globals.sun_color.rgb * globals.sun_color.w;
    let diffuse = max(dot(normal, sun_dir), 0.0);

    let view_dir = normalize(globals.camera_position.xyz - input.world_pos);
    let half_dir = normalize(sun_dir + view_dir);
    let shininess = mix(256.0, 2.0, roughness);
    let spec_color = mix(vec3<f32>(0.04), albedo.rgb, metalness);
    let highlight = pow(max(dot(normal, half_dir), 0.0), shininess)
        * specular_strength * (1.0 - roughness);

    let diffuse_weight = 1.0 - 0.5 * metalness;
    var color = albedo.rgb * diffuse_weight * (hemisphere + sun * diffuse)
        + spec_color * sun * highlight
        + object.emissive.rgb;

    color = aces(color * globals.fog_color.w);
    color = mix(color, globals.fog_color.rgb, fog);
    return vec4<f32>(encode(color), albedo.a);
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::Scene;

    #[test]
    fn sprites_use_the_blended_pipeline() {
        let sprite = MaterialParams::sprite(0.1);
        assert_eq!(PipelineKind::for_material(&sprite), PipelineKind::Sprite);

        let mut chunk = MaterialParams::default();
        assert_eq!(PipelineKind::for_material(&chunk), PipelineKind::Lit);
        chunk.double_sided = true;
        assert_eq!(PipelineKind::for_material(&chunk), PipelineKind::LitDoubleSided);
    }

    #[test]
    fn sampler_follows_sampling() {
        let (address, filter) = sampler_modes(&TextureSampling::fire_sprite());
        assert_eq!(address, wgpu::AddressMode::ClampToEdge);
        assert_eq!(filter, wgpu::FilterMode::Nearest);

        let (address, _) = sampler_modes(&TextureSampling::pixelated());
        assert_eq!(address, wgpu::AddressMode::Repeat);
    }

    #[test]
    fn clear_matches_fog() {
        let scene = Scene::site_default().unwrap();
        let raw = clear_color(&scene.lighting, true);
        assert!((raw.r - 135.0 / 255.0).abs() < 1e-6);
        let linear = clear_color(&scene.lighting, false);
        assert!(linear.r < raw.r);
        assert_eq!(linear.a, 1.0);
    }

    #[test]
    fn srgb_textures_by_default() {
        assert_eq!(
            texture_format(&TextureSampling::fire_sprite()),
            wgpu::TextureFormat::Rgba8UnormSrgb
        );
        let linear = TextureSampling {
            srgb: false,
            ..TextureSampling::default()
        };
        assert_eq!(texture_format(&linear), wgpu::TextureFormat::Rgba8Unorm);
    }
}
