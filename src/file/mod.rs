//! File format support module
//!
//! - PSD (.psd) - layered input, read through the `psd` crate
//! - PNG / JPEG - per-layer export
//! - ZIP - bundle of every layer in both formats plus metadata

pub mod archive;
pub mod encode;
pub mod naming;
pub mod psd;
pub mod types;

pub use archive::{ArchiveExporter, ArchiveMetadata, ExportSource, ExportedArchive, ExportedFile};
pub use encode::{LayerEncoder, RasterEncoder};
pub use naming::{sanitize_name, UniqueNames};
pub use types::*;
