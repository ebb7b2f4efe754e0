//! Windowed scene renderer

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glbdash_core::{Error, Result};
use nalgebra::{Matrix4, Point3, Vector3};
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::device::GpuContext;
use crate::resources::WgpuResources;
use crate::scene::{GpuScene, MeshVertex};

const SCENE_SHADER: &str = include_str!("shaders/scene.wgsl");
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Per-frame camera and model transform
#[derive(Debug, Clone, Copy)]
pub struct FrameUniforms {
    pub view_proj: Matrix4<f32>,
    pub model: Matrix4<f32>,
    pub eye: Point3<f32>,
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct CameraUniform {
    view_proj: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
    eye: [f32; 4],
    light_dir: [f32; 4],
}

/// Renderer settings
#[derive(Debug, Clone)]
pub struct SceneRenderConfig {
    pub background_color: [f64; 4],
    /// Direction the light travels, world space
    pub light_direction: Vector3<f32>,
}

impl Default for SceneRenderConfig {
    fn default() -> Self {
        Self {
            background_color: [0.95, 0.95, 0.96, 1.0],
            light_direction: Vector3::new(-10.0, -10.0, -5.0),
        }
    }
}

/// Draws a [`GpuScene`] into a window surface
pub struct SceneRenderer {
    gpu: GpuContext,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    material_layout: Arc<wgpu::BindGroupLayout>,
    depth_view: wgpu::TextureView,
    config: SceneRenderConfig,
}

impl SceneRenderer {
    pub async fn new(window: Arc<Window>, config: SceneRenderConfig) -> Result<Self> {
        let instance = GpuContext::create_instance();
        let surface = instance
            .create_surface(window.clone())
            .map_err(|e| Error::Gpu(format!("Failed to create surface: {}", e)))?;
        let gpu = GpuContext::new(instance, Some(&surface)).await?;

        let caps = surface.get_capabilities(&gpu.adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| Error::Gpu("Surface reports no supported formats".to_string()))?;

        let size = window.inner_size();
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&gpu.device, &surface_config);

        let camera_buffer = gpu.create_buffer_init(
            "Camera Buffer",
            &[CameraUniform::zeroed()],
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        );
        let camera_layout = gpu.create_uniform_layout(
            "camera_layout",
            wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        );
        let camera_bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("camera_bind_group"),
            layout: &camera_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });
        let material_layout = Arc::new(
            gpu.create_uniform_layout("material_layout", wgpu::ShaderStages::FRAGMENT),
        );

        let shader = gpu.create_shader_module("Scene Shader", SCENE_SHADER);
        let pipeline = create_pipeline(&gpu.device, &camera_layout, &material_layout, &shader, format);
        let depth_view = create_depth_view(&gpu.device, &surface_config);

        Ok(Self {
            gpu,
            surface,
            surface_config,
            pipeline,
            camera_buffer,
            camera_bind_group,
            material_layout,
            depth_view,
            config,
        })
    }

    /// Resource backend sharing this renderer's device and material layout
    pub fn resources(&self) -> WgpuResources {
        WgpuResources::new(self.gpu.device.clone(), self.material_layout.clone())
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        PhysicalSize::new(self.surface_config.width, self.surface_config.height)
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.surface_config.width as f32 / self.surface_config.height as f32
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        if size.width == 0 || size.height == 0 {
            return;
        }
        self.surface_config.width = size.width;
        self.surface_config.height = size.height;
        self.surface.configure(&self.gpu.device, &self.surface_config);
        self.depth_view = create_depth_view(&self.gpu.device, &self.surface_config);
    }

    /// Draw one frame. An empty `scene` clears to the background color.
    pub fn render(&mut self, scene: Option<&GpuScene<WgpuResources>>, frame: &FrameUniforms) -> Result<()> {
        let light = self.config.light_direction;
        let uniform = CameraUniform {
            view_proj: frame.view_proj.into(),
            model: frame.model.into(),
            eye: [frame.eye.x, frame.eye.y, frame.eye.z, 1.0],
            light_dir: [light.x, light.y, light.z, 0.0],
        };
        self.gpu
            .queue
            .write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(&uniform));

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.gpu.device, &self.surface_config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                tracing::warn!("surface timed out, skipping frame");
                return Ok(());
            }
            Err(e) => return Err(Error::Gpu(format!("Failed to get surface texture: {}", e))),
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Scene Render Encoder"),
            });

        {
            let [r, g, b, a] = self.config.background_color;
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
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

            if let Some(scene) = scene {
                pass.set_pipeline(&self.pipeline);
                pass.set_bind_group(0, &self.camera_bind_group, &[]);
                for node in scene.nodes() {
                    let geometry = &node.geometry;
                    pass.set_vertex_buffer(0, geometry.vertex_buffer.slice(..));
                    pass.set_index_buffer(geometry.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                    for draw in &geometry.draws {
                        let Some(material) = node.materials.get(draw.material_slot) else {
                            continue;
                        };
                        pass.set_bind_group(1, &material.bind_group, &[]);
                        pass.draw_indexed(draw.indices.clone(), 0, 0..1);
                    }
                }
            }
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    camera_layout: &wgpu::BindGroupLayout,
    material_layout: &wgpu::BindGroupLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Scene Pipeline Layout"),
        bind_group_layouts: &[camera_layout, material_layout],
        push_constant_ranges: &[],
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Scene Pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: "vs_main",
            buffers: &[MeshVertex::desc()],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            // double-sided materials are common in exported assets
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
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
    })
}

fn create_depth_view(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
