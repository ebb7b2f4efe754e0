//! wgpu-backed [`GpuResources`]

use std::ops::Range;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glbdash_core::{Error, Result};
use wgpu::util::DeviceExt;

use crate::scene::{GpuResources, MaterialData, MeshVertex, SceneNode};

/// Material factors as laid out in the shader's uniform block
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct MaterialUniform {
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    pub _padding: [f32; 2],
}

impl From<&MaterialData> for MaterialUniform {
    fn from(material: &MaterialData) -> Self {
        Self {
            base_color: material.base_color,
            metallic: material.metallic,
            roughness: material.roughness,
            _padding: [0.0; 2],
        }
    }
}

/// Index range of one primitive inside a node's index buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawRange {
    pub indices: Range<u32>,
    pub material_slot: usize,
}

/// Vertex and index buffers holding all primitives of one node
#[derive(Debug)]
pub struct WgpuGeometry {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub draws: Vec<DrawRange>,
}

#[derive(Debug)]
pub struct WgpuMaterial {
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub double_sided: bool,
}

/// Creates buffers on a device and destroys them on release
pub struct WgpuResources {
    device: Arc<wgpu::Device>,
    material_layout: Arc<wgpu::BindGroupLayout>,
    live_buffers: usize,
}

impl WgpuResources {
    pub fn new(device: Arc<wgpu::Device>, material_layout: Arc<wgpu::BindGroupLayout>) -> Self {
        Self {
            device,
            material_layout,
            live_buffers: 0,
        }
    }

    /// Buffers created and not yet released
    pub fn live_buffers(&self) -> usize {
        self.live_buffers
    }
}

/// Concatenate a node's primitives, rebasing indices onto the shared vertex buffer
pub fn pack_node(node: &SceneNode) -> (Vec<MeshVertex>, Vec<u32>, Vec<DrawRange>) {
    let mut vertices = Vec::with_capacity(node.vertex_count());
    let mut indices = Vec::new();
    let mut draws = Vec::with_capacity(node.primitives.len());

    for primitive in &node.primitives {
        let base = vertices.len() as u32;
        let start = indices.len() as u32;
        vertices.extend_from_slice(&primitive.vertices);
        indices.extend(primitive.indices.iter().map(|i| i + base));
        draws.push(DrawRange {
            indices: start..indices.len() as u32,
            material_slot: primitive.material_slot,
        });
    }
    (vertices, indices, draws)
}

impl GpuResources for WgpuResources {
    type Geometry = WgpuGeometry;
    type Material = WgpuMaterial;

    fn upload_geometry(&mut self, node: &SceneNode) -> Result<WgpuGeometry> {
        let (vertices, indices, draws) = pack_node(node);
        if indices.is_empty() {
            return Err(Error::Gpu("node has no triangles to upload".to_string()));
        }

        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Node Vertex Buffer"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Node Index Buffer"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        self.live_buffers += 2;

        Ok(WgpuGeometry {
            vertex_buffer,
            index_buffer,
            draws,
        })
    }

    fn upload_material(&mut self, material: &MaterialData) -> Result<WgpuMaterial> {
        let uniform = MaterialUniform::from(material);
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Material Buffer"),
            contents: bytemuck::bytes_of(&uniform),
            usage: wgpu::BufferUsages::UNIFORM,
        });
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("material_bind_group"),
            layout: &self.material_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        self.live_buffers += 1;

        Ok(WgpuMaterial {
            buffer,
            bind_group,
            double_sided: material.double_sided,
        })
    }

    fn release_geometry(&mut self, geometry: WgpuGeometry) {
        geometry.vertex_buffer.destroy();
        geometry.index_buffer.destroy();
        self.live_buffers = self.live_buffers.saturating_sub(2);
    }

    fn release_material(&mut self, material: WgpuMaterial) {
        material.buffer.destroy();
        self.live_buffers = self.live_buffers.saturating_sub(1);
    }
}
