//! 3D viewer for stored GLB models
//!
//! This crate provides the viewer side of glbdash:
//! - Orbit camera with independently togglable pan, zoom and rotate
//! - Viewer session state machine (idle, loading, ready, error)
//! - Asset loading through the backend client
//! - Native window host driving the wgpu renderer

pub mod camera;
pub mod interactive_viewer;
pub mod loader;
pub mod viewer;

pub use camera::*;
pub use interactive_viewer::{run_viewer, ViewerWindowOptions};
pub use loader::*;
pub use viewer::*;
