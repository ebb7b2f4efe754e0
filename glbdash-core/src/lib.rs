//! Core data structures for glbdash
//!
//! This crate provides the types shared by every other glbdash crate:
//! model records as served by the model-library backend, the error type,
//! runtime configuration and a few display helpers.

pub mod config;
pub mod error;
pub mod format;
pub mod model;

pub use config::*;
pub use error::*;
pub use format::*;
pub use model::*;

/// MIME type declared by browsers and servers for binary glTF
pub const GLB_MIME_TYPE: &str = "model/gltf-binary";

/// Bytes per mebibyte, used when reporting upload limits
pub const BYTES_PER_MB: u64 = 1024 * 1024;
