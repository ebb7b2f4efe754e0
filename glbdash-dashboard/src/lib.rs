//! Dashboard composition for glbdash
//!
//! Ties the model collection, the upload form and the viewer together
//! around a single [`Dashboard`] value, and renders records as text for
//! the `glbdash` command-line client.

pub mod dashboard;
pub mod display;

pub use dashboard::*;
pub use display::*;
