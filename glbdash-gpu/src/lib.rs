//! # glbdash GPU
//!
//! Decoding of binary glTF assets into a flattened scene graph, ownership of
//! the GPU resources uploaded from it, and a wgpu renderer that draws it.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use glbdash_gpu::{GpuResources, GpuScene, SceneData};
//!
//! fn show<R: GpuResources>(bytes: &[u8], resources: &mut R) -> glbdash_core::Result<()> {
//!     let scene = SceneData::from_glb(bytes)?;
//!     let gpu_scene = GpuScene::upload(&scene, resources)?;
//!     // ... draw frames
//!     gpu_scene.dispose(resources);
//!     Ok(())
//! }
//! ```

pub mod device;
pub mod renderer;
pub mod resources;
pub mod scene;

pub use device::GpuContext;
pub use renderer::{FrameUniforms, SceneRenderConfig, SceneRenderer};
pub use resources::{DrawRange, WgpuGeometry, WgpuMaterial, WgpuResources};
pub use scene::*;
