//! PSD file reader using the `psd` crate
//!
//! Converts a PSD into the layer tree consumed by the flattener and the
//! compositor. The crate exposes layers as a flat list with group parent
//! ids; the hierarchy is rebuilt here in bottom-to-top draw order.

use crate::file::types::FileError;
use crate::layers::{Document, Geometry, RawLayer};
use image::RgbaImage;
use psd::{Psd, PsdLayer};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Load a PSD file and decode its layer tree
pub fn load_psd(path: &Path) -> Result<Document, FileError> {
    tracing::info!("Loading PSD file: {:?}", path);

    let data = std::fs::read(path)?;
    decode_psd(&data)
}

/// Decode an in-memory PSD
pub fn decode_psd(data: &[u8]) -> Result<Document, FileError> {
    let psd = Psd::from_bytes(data)
        .map_err(|e| FileError::InvalidFormat(format!("PSD parse error: {}", e)))?;

    let width = psd.width();
    let height = psd.height();

    tracing::debug!("PSD dimensions: {}x{}", width, height);

    let groups: HashMap<u32, GroupRecord> = psd
        .groups()
        .iter()
        .map(|(&id, group)| {
            (
                id,
                GroupRecord {
                    name: group.name().to_string(),
                    parent_id: group.parent_id(),
                    // psd crate reports the "hidden" bit as visible()
                    hidden: group.visible(),
                },
            )
        })
        .collect();

    // psd crate lists layers top-to-bottom; drawing goes bottom-to-top
    let records: Vec<LayerRecord> = psd
        .layers()
        .iter()
        .rev()
        .map(|layer| LayerRecord {
            parent_id: layer.parent_id(),
            layer: convert_psd_layer(layer, width, height),
        })
        .collect();

    tracing::info!(
        "Decoded {} layers in {} groups from PSD",
        records.len(),
        groups.len()
    );

    Ok(Document::from_raw(width, height, build_tree(records, &groups)))
}

/// Convert a PSD layer to a raw leaf record
fn convert_psd_layer(psd_layer: &PsdLayer, doc_width: u32, doc_height: u32) -> RawLayer {
    let bounds = LayerBounds {
        left: psd_layer.layer_left(),
        top: psd_layer.layer_top(),
        right: psd_layer.layer_right(),
        bottom: psd_layer.layer_bottom(),
    };

    let (surface, geometry) =
        match extract_surface(psd_layer.name(), psd_layer.rgba(), bounds, doc_width, doc_height) {
            Some((img, geometry)) => (Some(Arc::new(img)), Some(geometry)),
            None => (None, None),
        };

    RawLayer {
        name: Some(psd_layer.name().to_string()),
        children: None,
        surface,
        left: geometry.map(|g| g.left),
        top: geometry.map(|g| g.top),
        opacity: Some(f32::from(psd_layer.opacity()) / 255.0),
        // WORKAROUND: psd crate has inverted visible flag logic
        // PSD format: bit 1 = 1 means HIDDEN, but psd crate interprets it as VISIBLE
        hidden: Some(psd_layer.visible()),
    }
}

/// Layer rectangle as reported by the psd crate; `right` and `bottom` are inclusive
#[derive(Debug, Clone, Copy)]
struct LayerBounds {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
}

impl LayerBounds {
    fn width(&self) -> i64 {
        i64::from(self.right) - i64::from(self.left) + 1
    }

    fn height(&self) -> i64 {
        i64::from(self.bottom) - i64::from(self.top) + 1
    }

    /// Layers without pixel data collapse to an all-zero rectangle, which is
    /// also how a 1x1 layer at the origin is reported
    fn is_degenerate(&self) -> bool {
        self.left == 0 && self.top == 0 && self.right == 0 && self.bottom == 0
    }
}

/// Cut a layer's pixels out of the buffer returned by the psd crate.
///
/// The crate normally returns full-canvas RGBA with the layer already placed
/// at its offset; some files yield layer-sized data instead. The result is
/// clipped to the canvas. Layers with no visible area yield `None`.
fn extract_surface(
    name: &str,
    rgba: Vec<u8>,
    bounds: LayerBounds,
    doc_width: u32,
    doc_height: u32,
) -> Option<(RgbaImage, Geometry)> {
    let x0 = bounds.left.max(0);
    let y0 = bounds.top.max(0);
    let x1 = (i64::from(bounds.right) + 1).min(i64::from(doc_width));
    let y1 = (i64::from(bounds.bottom) + 1).min(i64::from(doc_height));

    if i64::from(x0) >= x1 || i64::from(y0) >= y1 {
        tracing::debug!("Layer '{}' has no pixels inside the canvas", name);
        return None;
    }

    let crop_w = (x1 - i64::from(x0)) as u32;
    let crop_h = (y1 - i64::from(y0)) as u32;
    let geometry = Geometry::new(x0, y0);

    let full_size = doc_width as usize * doc_height as usize * 4;
    let layer_w = bounds.width().max(0) as u32;
    let layer_h = bounds.height().max(0) as u32;
    let layer_size = layer_w as usize * layer_h as usize * 4;

    let surface = if rgba.len() == full_size {
        let full = RgbaImage::from_raw(doc_width, doc_height, rgba)?;
        image::imageops::crop_imm(&full, x0 as u32, y0 as u32, crop_w, crop_h).to_image()
    } else if rgba.len() == layer_size {
        let layer_img = RgbaImage::from_raw(layer_w, layer_h, rgba)?;
        image::imageops::crop_imm(
            &layer_img,
            (x0 - bounds.left) as u32,
            (y0 - bounds.top) as u32,
            crop_w,
            crop_h,
        )
        .to_image()
    } else {
        tracing::warn!(
            "Layer '{}': cannot parse RGBA data (got {} bytes, canvas {}x{}, layer bounds {}x{})",
            name,
            rgba.len(),
            doc_width,
            doc_height,
            layer_w,
            layer_h
        );
        return None;
    };

    if bounds.is_degenerate() && surface.pixels().all(|p| p[3] == 0) {
        tracing::debug!("Layer '{}' has no pixel data", name);
        return None;
    }

    Some((surface, geometry))
}

#[derive(Debug, Clone)]
struct GroupRecord {
    name: String,
    parent_id: Option<u32>,
    hidden: bool,
}

#[derive(Debug)]
struct LayerRecord {
    parent_id: Option<u32>,
    layer: RawLayer,
}

#[derive(Debug)]
struct PendingNode {
    group_id: Option<u32>,
    layer: RawLayer,
    children: Vec<usize>,
}

/// Rebuild the group hierarchy from layers listed in draw order.
///
/// A group is placed where its first layer appears; consecutive layers of
/// the same group are collected under that one node.
fn build_tree(records: Vec<LayerRecord>, groups: &HashMap<u32, GroupRecord>) -> Vec<RawLayer> {
    let mut nodes: Vec<PendingNode> = Vec::new();
    let mut root: Vec<usize> = Vec::new();

    for record in records {
        let mut parent: Option<usize> = None;

        for group_id in ancestor_chain(record.parent_id, groups) {
            let siblings = match parent {
                Some(idx) => &nodes[idx].children,
                None => &root,
            };
            let existing = siblings
                .last()
                .copied()
                .filter(|&idx| nodes[idx].group_id == Some(group_id));

            let idx = match existing {
                Some(idx) => idx,
                None => {
                    let group = &groups[&group_id];
                    nodes.push(PendingNode {
                        group_id: Some(group_id),
                        layer: RawLayer {
                            name: Some(group.name.clone()),
                            hidden: Some(group.hidden),
                            ..Default::default()
                        },
                        children: Vec::new(),
                    });
                    let idx = nodes.len() - 1;
                    attach(&mut nodes, &mut root, parent, idx);
                    idx
                }
            };
            parent = Some(idx);
        }

        nodes.push(PendingNode {
            group_id: None,
            layer: record.layer,
            children: Vec::new(),
        });
        let idx = nodes.len() - 1;
        attach(&mut nodes, &mut root, parent, idx);
    }

    root.into_iter()
        .map(|idx| take_node(&mut nodes, idx))
        .collect()
}

fn attach(nodes: &mut [PendingNode], root: &mut Vec<usize>, parent: Option<usize>, child: usize) {
    match parent {
        Some(idx) => nodes[idx].children.push(child),
        None => root.push(child),
    }
}

fn take_node(nodes: &mut [PendingNode], idx: usize) -> RawLayer {
    let children = std::mem::take(&mut nodes[idx].children);
    let mut layer = std::mem::take(&mut nodes[idx].layer);

    if nodes[idx].group_id.is_some() {
        layer.children = Some(
            children
                .into_iter()
                .map(|child| take_node(nodes, child))
                .collect(),
        );
    }
    layer
}

/// Group ids from the outermost ancestor down to `parent_id`
fn ancestor_chain(parent_id: Option<u32>, groups: &HashMap<u32, GroupRecord>) -> Vec<u32> {
    let mut chain = Vec::new();
    let mut current = parent_id;

    while let Some(id) = current {
        if !groups.contains_key(&id) {
            tracing::warn!("Layer references unknown group {}", id);
            break;
        }
        if chain.contains(&id) {
            tracing::warn!("Group {} is its own ancestor; hierarchy truncated", id);
            break;
        }
        chain.push(id);
        current = groups[&id].parent_id;
    }

    chain.reverse();
    chain
}
