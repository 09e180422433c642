use std::collections::HashMap;
use std::rc::Rc;

use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

use crate::config::{DriveConfig, LightingConfig};
use crate::controller::simulation::FrameSnapshot;
use crate::error::{DriveError, Result};
use crate::model::camera::Camera;
use crate::model::geometry;
use crate::model::pose::WheelRole;
use crate::model::scene::{NodeKind, SceneLayout};
use crate::view::gpu_init::GpuContext;
use crate::view::mesh::{Mesh, MeshBuffer, Vertex};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const CHASSIS_COLOR: [f32; 4] = [0.75, 0.12, 0.1, 1.0];
const WHEEL_COLOR: [f32; 4] = [0.47, 0.47, 0.47, 1.0];
const BALL_COLOR: [f32; 4] = [0.9, 0.9, 0.85, 1.0];
const RAMP_COLOR: [f32; 4] = [0.6, 0.58, 0.55, 1.0];
const WHITE: [f32; 4] = [1.0; 4];

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub eye: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightingUniform {
    pub sun_dir: [f32; 3],
    pub sun_intensity: f32,
    pub ambient: [f32; 3],
    pub fog_density: f32,
    pub fog_color: [f32; 4],
}

impl LightingUniform {
    pub fn new(lighting: &LightingConfig, sun_dir: Vec3) -> Self {
        let ambient = lighting.ambient_color * lighting.ambient_intensity;
        Self {
            sun_dir: sun_dir.to_array(),
            sun_intensity: lighting.sun_intensity,
            ambient: ambient.to_array(),
            fog_density: lighting.fog_density,
            fog_color: lighting.fog_color.extend(1.0).to_array(),
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct NodeUniform {
    pub model: [[f32; 4]; 4],
    pub tint: [f32; 4],
}

/// Textures that can be swapped in once their image has loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureSlot {
    Grass,
    Wheel,
}

struct GpuTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

fn create_texture(device: &wgpu::Device, queue: &wgpu::Queue, label: &str, image: &image::RgbaImage) -> GpuTexture {
    let (width, height) = image.dimensions();
    let size = wgpu::Extent3d {
        width: width.max(1),
        height: height.max(1),
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        image.as_raw(),
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        size,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture {
        _texture: texture,
        view,
    }
}

pub fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("depth_texture"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    depth_texture.create_view(&wgpu::TextureViewDescriptor::default())
}

struct Node {
    mesh: Rc<MeshBuffer>,
    uniform: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    texture: Option<TextureSlot>,
    tint: [f32; 4],
}

/// egui output ready to be drawn over the scene
pub struct Overlay {
    pub primitives: Vec<egui::ClippedPrimitive>,
    pub textures_delta: egui::TexturesDelta,
    pub pixels_per_point: f32,
}

/// Draws the scene's nodes with one lit, fogged, textured pipeline and the
/// egui overlay on top.
pub struct SceneRenderer {
    pipeline: wgpu::RenderPipeline,
    camera_buffer: wgpu::Buffer,
    lighting_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,
    node_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    white: GpuTexture,
    textures: HashMap<TextureSlot, GpuTexture>,
    depth_view: wgpu::TextureView,
    nodes: HashMap<NodeKind, Node>,
    /// Draw order; nodes missing from `nodes` are skipped
    order: Vec<NodeKind>,
    lighting: LightingConfig,
    clear_color: wgpu::Color,
    egui_renderer: egui_wgpu::Renderer,
}

impl SceneRenderer {
    pub fn new(gpu: &GpuContext, layout: &SceneLayout, config: &DriveConfig) -> Self {
        let device = gpu.device.as_ref();

        let camera_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("camera_buffer"),
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let lighting_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lighting_buffer"),
            size: std::mem::size_of::<LightingUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_entry = |binding, visibility| wgpu::BindGroupLayoutEntry {
            binding,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("globals_bind_group_layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT),
                uniform_entry(1, wgpu::ShaderStages::FRAGMENT),
            ],
        });
        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("globals_bind_group"),
            layout: &globals_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: lighting_buffer.as_entire_binding(),
                },
            ],
        });

        let node_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("node_bind_group_layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("repeat_sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let white = create_texture(
            device,
            &gpu.queue,
            "white_texture",
            &image::RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255])),
        );

        let pipeline = create_scene_pipeline(device, gpu.format, &globals_layout, &node_layout);
        let (width, height) = gpu.size();
        let sky = config.lighting.sky_color;

        let mut renderer = Self {
            pipeline,
            camera_buffer,
            lighting_buffer,
            globals_bind_group,
            node_layout,
            sampler,
            white,
            textures: HashMap::new(),
            depth_view: create_depth_texture(device, width, height),
            nodes: HashMap::new(),
            order: Vec::new(),
            lighting: config.lighting.clone(),
            clear_color: wgpu::Color {
                r: sky.x as f64,
                g: sky.y as f64,
                b: sky.z as f64,
                a: 1.0,
            },
            egui_renderer: egui_wgpu::Renderer::new(device, gpu.format, egui_wgpu::RendererOptions::default()),
        };
        renderer.build_nodes(device, layout, config);
        renderer
    }

    fn build_nodes(&mut self, device: &wgpu::Device, layout: &SceneLayout, config: &DriveConfig) {
        let ground = geometry::cuboid(layout.ground_half_extents, config.scene.ground_texture_repeat);
        let ground_mesh = Rc::new(Mesh::from_geometry(&ground, WHITE).upload(device, "ground"));
        self.add_node(
            device,
            NodeKind::Ground,
            ground_mesh,
            Some(TextureSlot::Grass),
            WHITE,
            Mat4::from_translation(layout.ground_center),
        );

        if let Some(ramp) = &layout.ramp {
            let mesh = Rc::new(Mesh::from_geometry(ramp, RAMP_COLOR).upload(device, "ramp"));
            self.add_node(device, NodeKind::Ramp, mesh, None, WHITE, Mat4::IDENTITY);
        }

        let v = &config.vehicle;
        let chassis = geometry::uv_sphere(v.chassis_radius, 24, 16).scaled(v.chassis_scale);
        let chassis_mesh = Rc::new(Mesh::from_geometry(&chassis, CHASSIS_COLOR).upload(device, "chassis"));
        self.add_node(device, NodeKind::Chassis, chassis_mesh, None, WHITE, Mat4::IDENTITY);

        let wheel = geometry::cylinder_x(v.wheel_radius, v.wheel_width, 24);
        let wheel_mesh = Rc::new(Mesh::from_geometry(&wheel, WHITE).upload(device, "wheel"));
        for role in WheelRole::ALL {
            self.add_node(
                device,
                NodeKind::Wheel(role),
                wheel_mesh.clone(),
                Some(TextureSlot::Wheel),
                WHEEL_COLOR,
                Mat4::IDENTITY,
            );
        }

        for (i, ball) in layout.balls.iter().enumerate() {
            let geo = geometry::uv_sphere(ball.radius, 24, 16);
            let mesh = Rc::new(Mesh::from_geometry(&geo, BALL_COLOR).upload(device, "ball"));
            self.add_node(device, NodeKind::Ball(i), mesh, None, WHITE, Mat4::IDENTITY);
        }

        tracing::debug!(nodes = self.nodes.len(), "scene nodes created");
    }

    fn texture_view(&self, slot: Option<TextureSlot>) -> &wgpu::TextureView {
        slot.and_then(|s| self.textures.get(&s))
            .map(|t| &t.view)
            .unwrap_or(&self.white.view)
    }

    fn node_bind_group(
        &self,
        device: &wgpu::Device,
        uniform: &wgpu::Buffer,
        slot: Option<TextureSlot>,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("node_bind_group"),
            layout: &self.node_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(self.texture_view(slot)),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }

    fn add_node(
        &mut self,
        device: &wgpu::Device,
        kind: NodeKind,
        mesh: Rc<MeshBuffer>,
        texture: Option<TextureSlot>,
        tint: [f32; 4],
        model: Mat4,
    ) {
        let uniform = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("node_uniform"),
            contents: bytemuck::bytes_of(&NodeUniform {
                model: model.to_cols_array_2d(),
                tint,
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = self.node_bind_group(device, &uniform, texture);
        self.order.push(kind);
        self.nodes.insert(
            kind,
            Node {
                mesh,
                uniform,
                bind_group,
                texture,
                tint,
            },
        );
    }

    /// Install a loaded image and rebind every node that samples it
    pub fn set_texture(&mut self, gpu: &GpuContext, slot: TextureSlot, image: &image::RgbaImage) {
        let texture = create_texture(&gpu.device, &gpu.queue, &format!("{slot:?}"), image);
        self.textures.insert(slot, texture);

        let rebinds: Vec<_> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.texture == Some(slot))
            .map(|(kind, n)| (*kind, self.node_bind_group(&gpu.device, &n.uniform, Some(slot))))
            .collect();
        for (kind, bind_group) in rebinds {
            if let Some(node) = self.nodes.get_mut(&kind) {
                node.bind_group = bind_group;
            }
        }
        tracing::info!(?slot, width = image.width(), height = image.height(), "texture installed");
    }

    pub fn resize(&mut self, gpu: &GpuContext) {
        let (width, height) = gpu.size();
        self.depth_view = create_depth_texture(&gpu.device, width, height);
    }

    fn set_transform(&self, queue: &wgpu::Queue, kind: NodeKind, model: Mat4) {
        let Some(node) = self.nodes.get(&kind) else {
            return;
        };
        let uniform = NodeUniform {
            model: model.to_cols_array_2d(),
            tint: node.tint,
        };
        queue.write_buffer(&node.uniform, 0, bytemuck::bytes_of(&uniform));
    }

    /// Copy this frame's poses, camera and sun into the GPU buffers
    pub fn sync(&self, queue: &wgpu::Queue, snapshot: &FrameSnapshot, camera: &Camera) {
        let camera_uniform = CameraUniform {
            view_proj: camera.view_proj().to_cols_array_2d(),
            eye: camera.eye().extend(1.0).to_array(),
        };
        queue.write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&camera_uniform));

        let lighting = LightingUniform::new(&self.lighting, snapshot.sun.direction);
        queue.write_buffer(&self.lighting_buffer, 0, bytemuck::bytes_of(&lighting));

        self.set_transform(queue, NodeKind::Chassis, snapshot.chassis.body().matrix());
        for wheel in &snapshot.wheels {
            self.set_transform(queue, NodeKind::Wheel(wheel.role), wheel.pose.matrix());
        }
        for (i, ball) in snapshot.balls.iter().enumerate() {
            self.set_transform(queue, NodeKind::Ball(i), ball.matrix());
        }
    }

    pub fn render(&mut self, gpu: &GpuContext, overlay: Option<Overlay>) -> Result<()> {
        let frame = match gpu.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                gpu.surface.configure(&gpu.device, &gpu.config);
                tracing::debug!("surface reconfigured, skipping frame");
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                tracing::warn!("surface timeout, skipping frame");
                return Ok(());
            }
            Err(e) => return Err(DriveError::Gpu(e.to_string())),
        };

        let device = gpu.device.as_ref();
        let queue = gpu.queue.as_ref();
        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("encoder"),
        });

        {
            let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.clear_color),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            rp.set_pipeline(&self.pipeline);
            rp.set_bind_group(0, &self.globals_bind_group, &[]);
            for kind in &self.order {
                let Some(node) = self.nodes.get(kind) else {
                    continue;
                };
                if node.mesh.index_count == 0 {
                    continue;
                }
                rp.set_bind_group(1, &node.bind_group, &[]);
                rp.set_vertex_buffer(0, node.mesh.vertex_buffer.slice(..));
                rp.set_index_buffer(node.mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                rp.draw_indexed(0..node.mesh.index_count, 0, 0..1);
            }
        }

        if let Some(overlay) = overlay {
            let screen = egui_wgpu::ScreenDescriptor {
                size_in_pixels: [gpu.config.width, gpu.config.height],
                pixels_per_point: overlay.pixels_per_point,
            };
            for (id, delta) in &overlay.textures_delta.set {
                self.egui_renderer.update_texture(device, queue, *id, delta);
            }
            self.egui_renderer
                .update_buffers(device, queue, &mut encoder, &overlay.primitives, &screen);
            {
                let pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("egui_pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                self.egui_renderer
                    .render(&mut pass.forget_lifetime(), &overlay.primitives, &screen);
            }
            for id in &overlay.textures_delta.free {
                self.egui_renderer.free_texture(id);
            }
        }

        queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

fn create_scene_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    globals_layout: &wgpu::BindGroupLayout,
    node_layout: &wgpu::BindGroupLayout,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("scene_shader"),
        source: wgpu::ShaderSource::Wgsl(include_str!("shaders/scene.wgsl").into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("scene_pipeline_layout"),
        bind_group_layouts: &[globals_layout, node_layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("scene_pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[Vertex::layout()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: true,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_sizes_match_shader_layout() {
        assert_eq!(std::mem::size_of::<CameraUniform>(), 80);
        assert_eq!(std::mem::size_of::<LightingUniform>(), 48);
        assert_eq!(std::mem::size_of::<NodeUniform>(), 80);
    }

    #[test]
    fn test_lighting_uniform_scales_ambient() {
        let cfg = LightingConfig::default();
        let u = LightingUniform::new(&cfg, Vec3::NEG_Y);
        let expected = 64.0 / 255.0 * 2.0;
        assert!(u.ambient.iter().all(|c| (c - expected).abs() < 1e-6));
        assert_eq!(u.fog_density, 0.007);
        assert_eq!(u.sun_dir, [0.0, -1.0, 0.0]);
    }
}
