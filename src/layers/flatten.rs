//! Turns the nested layer tree into a flat list of exportable layers

use super::node::{LayerNode, Surface};
use crate::file::types::LayerSummary;

/// Leaf layer with its resolved path and visibility
#[derive(Debug, Clone)]
pub struct ExtractedLayer {
    /// Ancestor names joined with `/`, ending with the layer's own name
    pub path: String,
    pub surface: Surface,
    pub width: u32,
    pub height: u32,
    pub opacity: f32,
    /// True when the layer or any of its groups is hidden
    pub hidden: bool,
}

impl ExtractedLayer {
    pub fn summary(&self) -> LayerSummary {
        LayerSummary {
            path: self.path.clone(),
            width: self.width,
            height: self.height,
            opacity: self.opacity,
            hidden: self.hidden,
            image_data: None,
        }
    }
}

/// Collect every leaf that carries pixels, depth-first in document order.
pub fn flatten(children: &[LayerNode]) -> Vec<ExtractedLayer> {
    let mut layers = Vec::new();
    flatten_into(children, None, false, &mut layers);
    layers
}

fn flatten_into(
    nodes: &[LayerNode],
    parent_path: Option<&str>,
    parent_hidden: bool,
    out: &mut Vec<ExtractedLayer>,
) {
    for node in nodes {
        let current_path = match parent_path {
            Some(parent) => format!("{}/{}", parent, node.name()),
            None => node.name().to_string(),
        };
        let is_hidden = parent_hidden || node.hidden();

        match node {
            LayerNode::Group(group) => {
                flatten_into(&group.children, Some(&current_path), is_hidden, out);
            }
            LayerNode::Leaf(leaf) => match &leaf.surface {
                Some(surface) => out.push(ExtractedLayer {
                    width: surface.width(),
                    height: surface.height(),
                    surface: surface.clone(),
                    path: current_path,
                    opacity: leaf.opacity,
                    hidden: is_hidden,
                }),
                None => {
                    tracing::debug!("Skipped layer '{}': no pixel data", current_path);
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::node::RawLayer;
    use image::RgbaImage;
    use std::sync::Arc;

    fn leaf(name: &str) -> RawLayer {
        RawLayer {
            name: Some(name.to_string()),
            surface: Some(Arc::new(RgbaImage::new(3, 2))),
            ..Default::default()
        }
    }

    fn group(name: &str, hidden: bool, children: Vec<RawLayer>) -> RawLayer {
        RawLayer {
            name: Some(name.to_string()),
            hidden: Some(hidden),
            children: Some(children),
            ..Default::default()
        }
    }

    fn nodes(raw: Vec<RawLayer>) -> Vec<LayerNode> {
        raw.into_iter().map(LayerNode::from_raw).collect()
    }

    #[test]
    fn test_flat_leaves_keep_order() {
        let tree = nodes(vec![
            leaf("Background"),
            RawLayer {
                name: Some("Empty".into()),
                ..Default::default()
            },
            leaf("Sky"),
            leaf("Sun"),
        ]);

        let layers = flatten(&tree);
        let paths: Vec<_> = layers.iter().map(|l| l.path.as_str()).collect();
        assert_eq!(paths, ["Background", "Sky", "Sun"]);
        assert!(layers.iter().all(|l| l.width == 3 && l.height == 2));
    }

    #[test]
    fn test_nested_paths() {
        let tree = nodes(vec![
            group("Face", false, vec![leaf("Eyes"), leaf("Mouth")]),
            RawLayer {
                surface: Some(Arc::new(RgbaImage::new(1, 1))),
                ..Default::default()
            },
        ]);

        let layers = flatten(&tree);
        let paths: Vec<_> = layers.iter().map(|l| l.path.as_str()).collect();
        assert_eq!(paths, ["Face/Eyes", "Face/Mouth", "Untitled"]);
    }

    #[test]
    fn test_hidden_is_inherited() {
        let mut own_hidden = leaf("Shadow");
        own_hidden.hidden = Some(true);

        let mut visible_under_hidden = leaf("Hat");
        visible_under_hidden.hidden = Some(false);

        let tree = nodes(vec![
            group("Props", true, vec![visible_under_hidden]),
            group("Body", false, vec![own_hidden, leaf("Arm")]),
        ]);

        let layers = flatten(&tree);
        let hidden: Vec<_> = layers.iter().map(|l| (l.path.as_str(), l.hidden)).collect();
        assert_eq!(
            hidden,
            [("Props/Hat", true), ("Body/Shadow", true), ("Body/Arm", false)]
        );
    }

    #[test]
    fn test_deep_nesting_is_depth_first() {
        let tree = nodes(vec![
            leaf("A"),
            group(
                "G1",
                false,
                vec![leaf("B"), group("G2", false, vec![leaf("C")]), leaf("D")],
            ),
            leaf("E"),
        ]);

        let paths: Vec<_> = flatten(&tree).into_iter().map(|l| l.path).collect();
        assert_eq!(paths, ["A", "G1/B", "G1/G2/C", "G1/D", "E"]);
    }

    #[test]
    fn test_opacity_defaults_to_opaque() {
        let mut faded = leaf("Faded");
        faded.opacity = Some(0.25);
        let layers = flatten(&nodes(vec![leaf("Solid"), faded]));

        assert_eq!(layers[0].opacity, 1.0);
        assert_eq!(layers[1].opacity, 0.25);
    }

    #[test]
    fn test_empty_input() {
        assert!(flatten(&[]).is_empty());
    }
}
