//! Layer tree processing
//!
//! - [`flatten`] - nested tree to a flat list of named, visibility-resolved layers
//! - [`composite`] - nested tree to a single flattened preview image

pub mod composite;
pub mod flatten;
pub mod node;

pub use composite::{composite, draw_over};
pub use flatten::{flatten, ExtractedLayer};
pub use node::{
    Document, Geometry, GroupNode, LayerNode, LeafNode, RawLayer, Surface, UNTITLED_LAYER_NAME,
};

use crate::file::types::FileError;
use image::RgbaImage;

impl Document {
    /// Flat list of exportable layers in document order
    pub fn extract_layers(&self) -> Vec<ExtractedLayer> {
        flatten(&self.children)
    }

    /// Flattened preview at the document's canvas size
    pub fn render_composite(&self) -> Result<RgbaImage, FileError> {
        composite(self.width, self.height, &self.children)
    }
}
