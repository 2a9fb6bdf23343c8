//! Flattened preview rendering
//!
//! Leaves are painted bottom-to-top in document order with plain
//! source-over blending. Blend modes and group opacity are not applied.

use super::node::{Geometry, LayerNode};
use crate::file::types::FileError;
use image::{Rgba, RgbaImage};

/// Paint every visible leaf of the tree onto a new `width` x `height` canvas.
pub fn composite(width: u32, height: u32, children: &[LayerNode]) -> Result<RgbaImage, FileError> {
    if width == 0 || height == 0 {
        return Err(FileError::InvalidDimensions { width, height });
    }

    let mut canvas = RgbaImage::new(width, height);
    paint_nodes(&mut canvas, children, false);
    Ok(canvas)
}

fn paint_nodes(canvas: &mut RgbaImage, nodes: &[LayerNode], parent_hidden: bool) {
    for node in nodes {
        let is_hidden = parent_hidden || node.hidden();

        match node {
            LayerNode::Group(group) => paint_nodes(canvas, &group.children, is_hidden),
            LayerNode::Leaf(leaf) => {
                if is_hidden {
                    continue;
                }
                if let Some(surface) = &leaf.surface {
                    draw_over(canvas, surface, leaf.geometry, leaf.opacity);
                }
            }
        }
    }
}

/// Draw `src` over `dest` at `offset`, scaling the source alpha by `alpha`.
///
/// Pixels falling outside `dest` are clipped. Only `dest` is modified.
pub fn draw_over(dest: &mut RgbaImage, src: &RgbaImage, offset: Geometry, alpha: f32) {
    let alpha = alpha.clamp(0.0, 1.0);
    if alpha <= 0.0 {
        return;
    }

    let left = i64::from(offset.left);
    let top = i64::from(offset.top);
    let x0 = left.max(0);
    let y0 = top.max(0);
    let x1 = (left + i64::from(src.width())).min(i64::from(dest.width()));
    let y1 = (top + i64::from(src.height())).min(i64::from(dest.height()));

    if x0 >= x1 || y0 >= y1 {
        return;
    }

    for y in y0..y1 {
        for x in x0..x1 {
            let s = *src.get_pixel((x - left) as u32, (y - top) as u32);
            let d = dest.get_pixel_mut(x as u32, y as u32);
            *d = source_over(*d, s, alpha);
        }
    }
}

/// Straight-alpha source-over for a single pixel
fn source_over(dst: Rgba<u8>, src: Rgba<u8>, alpha: f32) -> Rgba<u8> {
    let sa = f32::from(src[3]) / 255.0 * alpha;
    if sa <= 0.0 {
        return dst;
    }

    let da = f32::from(dst[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);

    let mut out = [0u8; 4];
    for c in 0..3 {
        let value = (f32::from(src[c]) * sa + f32::from(dst[c]) * da * (1.0 - sa)) / out_a;
        out[c] = to_channel(value);
    }
    out[3] = to_channel(out_a * 255.0);
    Rgba(out)
}

fn to_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
