//! io3dm core - translates a decoded 3DM object model into a host scene.
//!
//! This crate provides:
//!
//! - **Source model**: the decoded file ([`source::SourceFile`]) and the
//!   [`source::Decoder`] seam
//! - **Conversion**: meshes with quad re-merging, curves, named views
//! - **Resolvers**: materials, the layer tree, block definitions
//! - **Reload**: per-object fingerprints and persisted fingerprint tables
//! - **Host seam**: [`host::SceneHost`] plus the in-memory [`MemoryHost`]
//!
//! # Example
//!
//! ```ignore
//! use io3dm_core::{run_import, ImportOptions, JsonDecoder, MemoryHost};
//!
//! let mut host = MemoryHost::default();
//! let report = run_import(
//!     &mut host,
//!     &JsonDecoder,
//!     "model.json".as_ref(),
//!     "Site",
//!     false,
//!     &ImportOptions::default(),
//! )?;
//! println!("Created {} objects", report.objects_created);
//! ```

pub mod block;
pub mod convert;
pub mod curve;
pub mod fingerprint;
pub mod host;
pub mod import;
pub mod layer;
pub mod material;
pub mod mesh;
pub mod options;
pub mod scene;
pub mod source;

// Re-export commonly used types
pub use fingerprint::{Fingerprint, FingerprintTable};
pub use host::{MemoryHost, Overwrite, SceneHost, Severity};
pub use import::{import_file, run_import, ImportError, ImportReport, ImportResult};
pub use mesh::Mesh;
pub use options::{
    BlockInstancing, DisplacementMethod, ImportOptions, MeshFaceMode, MeshShading,
};
pub use source::{Decoder, JsonDecoder, SourceFile};
