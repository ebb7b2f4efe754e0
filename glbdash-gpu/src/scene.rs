//! Decoded GLB scenes and the GPU resources uploaded from them
//!
//! [`SceneData`] is the CPU side: every mesh-bearing node of the default
//! scene, with node transforms baked into its vertices. [`GpuScene`] owns
//! what a [`GpuResources`] backend created for it; the only way to let go
//! of those handles is [`GpuScene::dispose`], which consumes the scene so
//! each geometry and material slot is released exactly once.

use std::collections::HashSet;
use std::mem;

use bytemuck::{Pod, Zeroable};
use glbdash_core::{Error, Result};
use nalgebra::{Matrix3, Matrix4, Point3, Vector3};

/// Interleaved vertex uploaded to the GPU
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl MeshVertex {
    /// Vertex buffer layout descriptor
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Metallic-roughness material factors
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialData {
    pub name: Option<String>,
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    pub double_sided: bool,
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            name: None,
            base_color: [0.8, 0.8, 0.8, 1.0],
            metallic: 1.0,
            roughness: 1.0,
            double_sided: false,
        }
    }
}

impl MaterialData {
    fn from_gltf(material: &gltf::Material<'_>) -> Self {
        let pbr = material.pbr_metallic_roughness();
        Self {
            name: material.name().map(str::to_string),
            base_color: pbr.base_color_factor(),
            metallic: pbr.metallic_factor(),
            roughness: pbr.roughness_factor(),
            double_sided: material.double_sided(),
        }
    }
}

/// One triangle list drawn with one material slot
#[derive(Debug, Clone, PartialEq)]
pub struct PrimitiveData {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    /// Index into the owning node's [`MaterialSlots`]
    pub material_slot: usize,
}

impl PrimitiveData {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// A node's material, or one material per primitive
#[derive(Debug, Clone, PartialEq)]
pub enum MaterialSlots<M> {
    Single(M),
    Multiple(Vec<M>),
}

impl<M> MaterialSlots<M> {
    fn from_vec(mut slots: Vec<M>) -> Option<Self> {
        match slots.len() {
            0 => None,
            1 => slots.pop().map(MaterialSlots::Single),
            _ => Some(MaterialSlots::Multiple(slots)),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            MaterialSlots::Single(_) => 1,
            MaterialSlots::Multiple(slots) => slots.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, slot: usize) -> Option<&M> {
        match self {
            MaterialSlots::Single(material) if slot == 0 => Some(material),
            MaterialSlots::Single(_) => None,
            MaterialSlots::Multiple(slots) => slots.get(slot),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &M> {
        let slice = match self {
            MaterialSlots::Single(material) => std::slice::from_ref(material),
            MaterialSlots::Multiple(slots) => slots.as_slice(),
        };
        slice.iter()
    }

    pub fn into_vec(self) -> Vec<M> {
        match self {
            MaterialSlots::Single(material) => vec![material],
            MaterialSlots::Multiple(slots) => slots,
        }
    }
}

/// A renderable node: world-space geometry plus its material slots
#[derive(Debug, Clone, PartialEq)]
pub struct SceneNode {
    pub name: Option<String>,
    pub primitives: Vec<PrimitiveData>,
    pub materials: MaterialSlots<MaterialData>,
}

impl SceneNode {
    pub fn vertex_count(&self) -> usize {
        self.primitives.iter().map(|p| p.vertices.len()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.primitives.iter().map(PrimitiveData::triangle_count).sum()
    }
}

/// Axis-aligned bounds of a scene in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb {
    fn from_points<'a>(points: impl IntoIterator<Item = &'a [f32; 3]>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = Point3::from(*points.next()?);
        let (min, max) = points.fold((first, first), |(min, max), p| {
            let p = Point3::from(*p);
            (min.inf(&p), max.sup(&p))
        });
        Some(Self { min, max })
    }

    pub fn center(&self) -> Point3<f32> {
        nalgebra::center(&self.min, &self.max)
    }

    /// Radius of the bounding sphere around [`center`](Self::center)
    pub fn radius(&self) -> f32 {
        (self.max - self.min).norm() * 0.5
    }
}

/// A decoded GLB asset
#[derive(Debug, Clone, PartialEq)]
pub struct SceneData {
    pub nodes: Vec<SceneNode>,
    pub bounds: Option<Aabb>,
}

impl SceneData {
    /// Decode a binary glTF asset.
    ///
    /// Walks the default scene (or the first one), baking each node's world
    /// transform into its vertices. Non-triangle primitives and primitives
    /// without positions are skipped.
    pub fn from_glb(bytes: &[u8]) -> Result<Self> {
        let (document, buffers, _images) =
            gltf::import_slice(bytes).map_err(|e| Error::Decode(e.to_string()))?;

        let scene = document
            .default_scene()
            .or_else(|| document.scenes().next())
            .ok_or_else(|| Error::Decode("asset contains no scene".to_string()))?;

        let nodes = collect_nodes(&scene, &buffers)?;

        let bounds = Aabb::from_points(
            nodes
                .iter()
                .flat_map(|n| n.primitives.iter())
                .flat_map(|p| p.vertices.iter())
                .map(|v| &v.position),
        );

        let scene = Self { nodes, bounds };
        tracing::debug!(
            nodes = scene.nodes.len(),
            vertices = scene.vertex_count(),
            triangles = scene.triangle_count(),
            "GLB decoded"
        );
        Ok(scene)
    }

    pub fn vertex_count(&self) -> usize {
        self.nodes.iter().map(SceneNode::vertex_count).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.nodes.iter().map(SceneNode::triangle_count).sum()
    }

    pub fn material_count(&self) -> usize {
        self.nodes.iter().map(|n| n.materials.len()).sum()
    }
}

/// Depth-first walk of the scene hierarchy with an explicit stack.
///
/// Each node may be reached once; a second visit means the hierarchy is not
/// a forest and decoding fails instead of looping.
fn collect_nodes(scene: &gltf::Scene<'_>, buffers: &[gltf::buffer::Data]) -> Result<Vec<SceneNode>> {
    let mut out = Vec::new();
    let mut visited = HashSet::new();
    let mut stack: Vec<(gltf::Node<'_>, Matrix4<f32>)> = scene
        .nodes()
        .map(|node| (node, Matrix4::identity()))
        .collect();
    stack.reverse();

    while let Some((node, parent)) = stack.pop() {
        if !visited.insert(node.index()) {
            return Err(Error::Decode("node hierarchy contains a cycle".to_string()));
        }

        let world = parent * Matrix4::from(node.transform().matrix());
        if let Some(scene_node) = read_node(&node, &world, buffers) {
            out.push(scene_node);
        }

        let children: Vec<_> = node.children().collect();
        stack.extend(children.into_iter().rev().map(|child| (child, world)));
    }

    Ok(out)
}

fn read_node(
    node: &gltf::Node<'_>,
    world: &Matrix4<f32>,
    buffers: &[gltf::buffer::Data],
) -> Option<SceneNode> {
    let mesh = node.mesh()?;
    let normal_matrix = world
        .fixed_view::<3, 3>(0, 0)
        .into_owned()
        .try_inverse()
        .map(|m| m.transpose())
        .unwrap_or_else(Matrix3::identity);

    let mut primitives = Vec::new();
    let mut materials = Vec::new();
    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            tracing::warn!(mode = ?primitive.mode(), "skipping non-triangle primitive");
            continue;
        }
        let Some(data) = read_primitive(&primitive, buffers, world, &normal_matrix, materials.len())
        else {
            continue;
        };
        primitives.push(data);
        materials.push(MaterialData::from_gltf(&primitive.material()));
    }

    let materials = MaterialSlots::from_vec(materials)?;
    Some(SceneNode {
        name: node.name().or_else(|| mesh.name()).map(str::to_string),
        primitives,
        materials,
    })
}

fn read_primitive(
    primitive: &gltf::Primitive<'_>,
    buffers: &[gltf::buffer::Data],
    world: &Matrix4<f32>,
    normal_matrix: &Matrix3<f32>,
    material_slot: usize,
) -> Option<PrimitiveData> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));

    let positions: Vec<[f32; 3]> = match reader.read_positions() {
        Some(iter) => iter.collect(),
        None => {
            tracing::warn!("skipping primitive without positions");
            return None;
        }
    };
    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..positions.len() as u32).collect(),
    };
    if indices.len() < 3 || indices.iter().any(|&i| i as usize >= positions.len()) {
        tracing::warn!("skipping primitive with empty or out-of-range indices");
        return None;
    }
    let indices: Vec<u32> = indices.chunks_exact(3).flatten().copied().collect();

    let world_positions: Vec<Point3<f32>> = positions
        .iter()
        .map(|p| world.transform_point(&Point3::from(*p)))
        .collect();

    let normals: Vec<Vector3<f32>> = match reader.read_normals() {
        Some(iter) => iter
            .map(|n| (normal_matrix * Vector3::from(n)).try_normalize(f32::EPSILON).unwrap_or_else(Vector3::y))
            .collect(),
        None => smooth_normals(&world_positions, &indices),
    };

    let vertices = world_positions
        .iter()
        .zip(normals.iter().chain(std::iter::repeat(&Vector3::y())))
        .map(|(p, n)| MeshVertex {
            position: [p.x, p.y, p.z],
            normal: [n.x, n.y, n.z],
        })
        .collect();

    Some(PrimitiveData {
        vertices,
        indices,
        material_slot,
    })
}

/// Area-weighted vertex normals for assets that omit them
fn smooth_normals(positions: &[Point3<f32>], indices: &[u32]) -> Vec<Vector3<f32>> {
    let mut normals = vec![Vector3::zeros(); positions.len()];
    for tri in indices.chunks_exact(3) {
        let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        let face = (positions[b] - positions[a]).cross(&(positions[c] - positions[a]));
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }
    normals
        .into_iter()
        .map(|n| n.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::y))
        .collect()
}

/// Backend that owns GPU geometry and material handles.
///
/// Release takes handles by value, so a handle can be released at most once.
pub trait GpuResources {
    type Geometry;
    type Material;

    fn upload_geometry(&mut self, node: &SceneNode) -> Result<Self::Geometry>;
    fn upload_material(&mut self, material: &MaterialData) -> Result<Self::Material>;
    fn release_geometry(&mut self, geometry: Self::Geometry);
    fn release_material(&mut self, material: Self::Material);
}

/// Counts of handles returned to the backend by [`GpuScene::dispose`]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseStats {
    pub geometries: usize,
    pub materials: usize,
}

/// A node uploaded to a [`GpuResources`] backend
pub struct GpuNode<R: GpuResources> {
    pub name: Option<String>,
    pub geometry: R::Geometry,
    pub materials: MaterialSlots<R::Material>,
}

/// GPU-resident scene; must be returned to its backend with [`dispose`](Self::dispose)
pub struct GpuScene<R: GpuResources> {
    nodes: Vec<GpuNode<R>>,
    bounds: Option<Aabb>,
}

impl<R: GpuResources> GpuScene<R> {
    /// Upload every node of `scene`. On failure, whatever was already
    /// uploaded is released before the error is returned.
    pub fn upload(scene: &SceneData, resources: &mut R) -> Result<Self> {
        let mut gpu_scene = Self {
            nodes: Vec::with_capacity(scene.nodes.len()),
            bounds: scene.bounds,
        };
        for node in &scene.nodes {
            match upload_node(node, resources) {
                Ok(uploaded) => gpu_scene.nodes.push(uploaded),
                Err(e) => {
                    gpu_scene.dispose(resources);
                    return Err(e);
                }
            }
        }
        Ok(gpu_scene)
    }

    pub fn nodes(&self) -> &[GpuNode<R>] {
        &self.nodes
    }

    pub fn bounds(&self) -> Option<Aabb> {
        self.bounds
    }

    /// Release each node's geometry and every one of its material slots.
    pub fn dispose(mut self, resources: &mut R) -> ReleaseStats {
        let mut stats = ReleaseStats::default();
        for node in mem::take(&mut self.nodes) {
            resources.release_geometry(node.geometry);
            stats.geometries += 1;
            for material in node.materials.into_vec() {
                resources.release_material(material);
                stats.materials += 1;
            }
        }
        tracing::debug!(
            geometries = stats.geometries,
            materials = stats.materials,
            "GPU scene released"
        );
        stats
    }
}

impl<R: GpuResources> Drop for GpuScene<R> {
    fn drop(&mut self) {
        if !self.nodes.is_empty() {
            tracing::warn!(nodes = self.nodes.len(), "GPU scene dropped without dispose");
        }
    }
}

fn upload_node<R: GpuResources>(node: &SceneNode, resources: &mut R) -> Result<GpuNode<R>> {
    let geometry = resources.upload_geometry(node)?;
    let mut materials = Vec::with_capacity(node.materials.len());
    for material in node.materials.iter() {
        match resources.upload_material(material) {
            Ok(handle) => materials.push(handle),
            Err(e) => {
                resources.release_geometry(geometry);
                for handle in materials {
                    resources.release_material(handle);
                }
                return Err(e);
            }
        }
    }
    let materials = MaterialSlots::from_vec(materials)
        .ok_or_else(|| Error::Gpu("node has no material slots".to_string()))?;
    Ok(GpuNode {
        name: node.name.clone(),
        geometry,
        materials,
    })
}
