//! Layer tree types
//!
//! The decoder hands over [`RawLayer`] records whose fields are all optional.
//! [`LayerNode::from_raw`] resolves them once into a closed group/leaf tree
//! with every default applied, so the flattener and the compositor never
//! look at optional fields.

use image::RgbaImage;
use std::sync::Arc;

/// Shared handle to a layer's pixels
pub type Surface = Arc<RgbaImage>;

/// Placeholder used for layers without a name
pub const UNTITLED_LAYER_NAME: &str = "Untitled";

/// Offset of a surface within the document canvas
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Geometry {
    pub left: i32,
    pub top: i32,
}

impl Geometry {
    pub fn new(left: i32, top: i32) -> Self {
        Self { left, top }
    }
}

/// Layer record as produced by a decoder, before normalization
#[derive(Debug, Clone, Default)]
pub struct RawLayer {
    pub name: Option<String>,
    pub children: Option<Vec<RawLayer>>,
    pub surface: Option<Surface>,
    pub left: Option<i32>,
    pub top: Option<i32>,
    pub opacity: Option<f32>,
    pub hidden: Option<bool>,
}

/// Group node: only its children are drawn or exported
#[derive(Debug, Clone)]
pub struct GroupNode {
    pub name: String,
    pub hidden: bool,
    pub children: Vec<LayerNode>,
}

/// Leaf node: carries pixels (or nothing, when the decoder had no raster data)
#[derive(Debug, Clone)]
pub struct LeafNode {
    pub name: String,
    pub surface: Option<Surface>,
    pub geometry: Geometry,
    pub opacity: f32,
    pub hidden: bool,
}

#[derive(Debug, Clone)]
pub enum LayerNode {
    Group(GroupNode),
    Leaf(LeafNode),
}

impl LayerNode {
    /// Resolve a decoder record into a group or a leaf.
    ///
    /// A non-empty `children` list wins over a surface on the same record.
    pub fn from_raw(raw: RawLayer) -> Self {
        let name = match raw.name {
            Some(name) if !name.is_empty() => name,
            _ => UNTITLED_LAYER_NAME.to_string(),
        };
        let hidden = raw.hidden.unwrap_or(false);

        match raw.children {
            Some(children) if !children.is_empty() => LayerNode::Group(GroupNode {
                name,
                hidden,
                children: children.into_iter().map(LayerNode::from_raw).collect(),
            }),
            _ => LayerNode::Leaf(LeafNode {
                name,
                surface: raw.surface,
                geometry: Geometry::new(raw.left.unwrap_or(0), raw.top.unwrap_or(0)),
                opacity: normalize_opacity(raw.opacity),
                hidden,
            }),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            LayerNode::Group(group) => &group.name,
            LayerNode::Leaf(leaf) => &leaf.name,
        }
    }

    pub fn hidden(&self) -> bool {
        match self {
            LayerNode::Group(group) => group.hidden,
            LayerNode::Leaf(leaf) => leaf.hidden,
        }
    }
}

fn normalize_opacity(opacity: Option<f32>) -> f32 {
    match opacity {
        Some(value) if value.is_finite() => value.clamp(0.0, 1.0),
        _ => 1.0,
    }
}

/// Fully decoded document: canvas size plus top-level layers in draw order
#[derive(Debug, Clone)]
pub struct Document {
    pub width: u32,
    pub height: u32,
    pub children: Vec<LayerNode>,
}

impl Document {
    pub fn from_raw(width: u32, height: u32, children: Vec<RawLayer>) -> Self {
        Self {
            width,
            height,
            children: children.into_iter().map(LayerNode::from_raw).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface(w: u32, h: u32) -> Surface {
        Arc::new(RgbaImage::new(w, h))
    }

    #[test]
    fn test_leaf_defaults() {
        let node = LayerNode::from_raw(RawLayer {
            surface: Some(surface(2, 2)),
            ..Default::default()
        });

        match node {
            LayerNode::Leaf(leaf) => {
                assert_eq!(leaf.name, UNTITLED_LAYER_NAME);
                assert_eq!(leaf.geometry, Geometry::default());
                assert_eq!(leaf.opacity, 1.0);
                assert!(!leaf.hidden);
                assert!(leaf.surface.is_some());
            }
            LayerNode::Group(_) => panic!("expected a leaf"),
        }
    }

    #[test]
    fn test_children_take_precedence_over_surface() {
        let node = LayerNode::from_raw(RawLayer {
            name: Some("Face".into()),
            surface: Some(surface(4, 4)),
            children: Some(vec![RawLayer {
                name: Some("Eyes".into()),
                ..Default::default()
            }]),
            ..Default::default()
        });

        match node {
            LayerNode::Group(group) => {
                assert_eq!(group.name, "Face");
                assert_eq!(group.children.len(), 1);
                assert_eq!(group.children[0].name(), "Eyes");
            }
            LayerNode::Leaf(_) => panic!("expected a group"),
        }
    }

    #[test]
    fn test_empty_children_is_leaf() {
        let node = LayerNode::from_raw(RawLayer {
            name: Some(String::new()),
            children: Some(Vec::new()),
            hidden: Some(true),
            ..Default::default()
        });

        assert!(matches!(node, LayerNode::Leaf(_)));
        assert_eq!(node.name(), UNTITLED_LAYER_NAME);
        assert!(node.hidden());
    }

    #[test]
    fn test_opacity_is_clamped() {
        let over = LayerNode::from_raw(RawLayer {
            opacity: Some(1.7),
            ..Default::default()
        });
        let nan = LayerNode::from_raw(RawLayer {
            opacity: Some(f32::NAN),
            ..Default::default()
        });

        match (over, nan) {
            (LayerNode::Leaf(a), LayerNode::Leaf(b)) => {
                assert_eq!(a.opacity, 1.0);
                assert_eq!(b.opacity, 1.0);
            }
            _ => panic!("expected leaves"),
        }
    }
}
