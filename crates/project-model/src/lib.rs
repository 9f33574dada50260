//! QuickEdit Project Model
//!
//! Defines the data contracts for QuickEdit projects:
//! - **Tracks:** Audio and video sources placed on the output timeline
//! - **Layers:** Text and image overlays with fades and paint order
//! - **Project:** The immutable root aggregate plus canvas size
//!
//! All times are seconds on the output timeline. All geometry is in
//! output canvas pixels with the origin at the top-left corner.

pub mod color;
pub mod geometry;
pub mod layer;
pub mod project;
pub mod track;

pub use color::*;
pub use geometry::*;
pub use layer::*;
pub use project::*;
pub use track::*;
