//! Source-side object model and the decoder seam.
//!
//! ## Supported geometry
//!
//! - Meshes, extrusions, brep face meshes and SubD control nets
//! - Lines, polylines, NURBS curves, arcs and poly-curves
//! - Instance references (block placements)
//!
//! ## Not supported
//!
//! - Lights, dimensions, annotations, text (decoded as `Unsupported`)
//! - Exact CAD topology; curves are re-sampled by the converter
//!
//! # Example
//!
//! ```ignore
//! use io3dm_core::source::{Decoder, JsonDecoder};
//!
//! let file = JsonDecoder.decode("model.json".as_ref())?;
//! println!("{} objects", file.objects().len());
//! ```

mod decoder;
mod types;

pub use decoder::*;
pub use types::*;
