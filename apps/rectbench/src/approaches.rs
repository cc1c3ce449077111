//! Rendering strategies under comparison.
//!
//! Each approach answers the same question differently: how do the frame's
//! rectangles become GPU-consumable bytes, and across how many draw batches?
//! The encodings mirror classic GL-era strategies, from one buffer per rect
//! up to a single instanced layout, so the gen/upload/draw stage costs spread
//! in recognizably different ways.

use rectbench_core::Rect;

/// Bytes per vertex in the simple layout: position (2x f32) + RGBA.
const SIMPLE_VERTEX_BYTES: usize = 12;
/// Bytes per vertex in the complete layout: position, color, UV, flags,
/// border color, corner radius.
const COMPLETE_VERTEX_BYTES: usize = 32;
/// Bytes per bit-packed rect record in the storage-buffer layout.
const SSBO_RECORD_BYTES: usize = 24;
/// Bytes per instance record in the instanced layout.
const INSTANCE_RECORD_BYTES: usize = 32;
/// Shared unit quad preceding the instance records: 6 vertices of 2x f32.
const QUAD_HEADER_BYTES: usize = 48;

const VERTICES_PER_RECT: usize = 6;

/// One frame's encoded buffer content and its draw-batch split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoding {
    /// The bytes a renderer would hand to the GPU for this frame.
    pub vertex_bytes: Vec<u8>,
    /// How many separate draw submissions the strategy issues.
    pub draw_batches: usize,
}

/// A buffer-encoding strategy for one frame of rectangles.
pub trait RenderApproach {
    /// Strategy name as it appears in report rows.
    fn name(&self) -> &'static str;

    /// Encode the frame's rectangles.
    fn encode(&self, rects: &[Rect]) -> Encoding;
}

/// All strategies, in benchmark order.
pub fn all_approaches() -> Vec<Box<dyn RenderApproach>> {
    vec![
        Box::new(OneRectPerDraw),
        Box::new(SimpleVbo),
        Box::new(CompleteVbo),
        Box::new(OneSsbo),
        Box::new(InstDiv),
    ]
}

/// Upper bound on the encoded size of any strategy for `rects` rectangles.
/// Sizes the device-side vertex buffer once per run.
pub fn max_encoding_bytes(rects: usize) -> usize {
    QUAD_HEADER_BYTES + rects * VERTICES_PER_RECT * COMPLETE_VERTEX_BYTES
}

/// Per-rect style flags shared by the packed layouts.
fn style_flags(rect: &Rect) -> u32 {
    let mut flags = 0;
    if rect.has_border {
        flags |= 1;
    }
    if rect.has_rounded_corners {
        flags |= 1 << 1;
    }
    if rect.has_texture {
        flags |= 1 << 2;
    }
    if rect.has_texture_array {
        flags |= 1 << 3;
    }
    if rect.has_glyph {
        flags |= 1 << 4;
    }
    flags
}

fn push_f32(out: &mut Vec<u8>, v: f32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn push_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn push_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Corner positions of a rect's two triangles, in emission order.
fn triangle_corners(rect: &Rect) -> [(f32, f32); VERTICES_PER_RECT] {
    let l = rect.pos.left as f32;
    let t = rect.pos.top as f32;
    let r = rect.pos.right as f32;
    let b = rect.pos.bottom as f32;
    [(l, t), (r, t), (l, b), (r, t), (r, b), (l, b)]
}

fn push_simple_vertices(out: &mut Vec<u8>, rect: &Rect) {
    let color = rect.background_color.to_bytes();
    for (x, y) in triangle_corners(rect) {
        push_f32(out, x);
        push_f32(out, y);
        out.extend_from_slice(&color);
    }
}

fn push_complete_vertices(out: &mut Vec<u8>, rect: &Rect) {
    let color = rect.background_color.to_bytes();
    let border = rect.border_color.to_bytes();
    let flags = style_flags(rect);
    let uv = rect.texture_coords;
    let uvs = [
        (uv.left, uv.top),
        (uv.right, uv.top),
        (uv.left, uv.bottom),
        (uv.right, uv.top),
        (uv.right, uv.bottom),
        (uv.left, uv.bottom),
    ];
    for ((x, y), (u, v)) in triangle_corners(rect).into_iter().zip(uvs) {
        push_f32(out, x);
        push_f32(out, y);
        out.extend_from_slice(&color);
        push_f32(out, u);
        push_f32(out, v);
        push_u32(out, flags);
        out.extend_from_slice(&border);
        push_f32(out, rect.corner_radius as f32);
    }
}

/// One buffer and one draw call per rectangle: the naive baseline.
pub struct OneRectPerDraw;

impl RenderApproach for OneRectPerDraw {
    fn name(&self) -> &'static str {
        "one_rect_per_draw"
    }

    fn encode(&self, rects: &[Rect]) -> Encoding {
        let mut bytes = Vec::with_capacity(rects.len() * VERTICES_PER_RECT * SIMPLE_VERTEX_BYTES);
        for rect in rects {
            push_simple_vertices(&mut bytes, rect);
        }
        Encoding {
            vertex_bytes: bytes,
            draw_batches: rects.len().max(1),
        }
    }
}

/// All rects in one vertex buffer with the minimal layout, one draw call.
pub struct SimpleVbo;

impl RenderApproach for SimpleVbo {
    fn name(&self) -> &'static str {
        "simple_vbo"
    }

    fn encode(&self, rects: &[Rect]) -> Encoding {
        let mut bytes = Vec::with_capacity(rects.len() * VERTICES_PER_RECT * SIMPLE_VERTEX_BYTES);
        for rect in rects {
            push_simple_vertices(&mut bytes, rect);
        }
        Encoding {
            vertex_bytes: bytes,
            draw_batches: 1,
        }
    }
}

/// One vertex buffer carrying the full per-vertex attribute set, so the
/// shader needs no auxiliary lookups. Largest upload, single draw call.
pub struct CompleteVbo;

impl RenderApproach for CompleteVbo {
    fn name(&self) -> &'static str {
        "complete_vbo"
    }

    fn encode(&self, rects: &[Rect]) -> Encoding {
        let mut bytes =
            Vec::with_capacity(rects.len() * VERTICES_PER_RECT * COMPLETE_VERTEX_BYTES);
        for rect in rects {
            push_complete_vertices(&mut bytes, rect);
        }
        Encoding {
            vertex_bytes: bytes,
            draw_batches: 1,
        }
    }
}

/// Bit-packed per-rect records in a storage buffer; the vertex stage expands
/// each record into a quad. Smallest upload of all strategies.
pub struct OneSsbo;

impl RenderApproach for OneSsbo {
    fn name(&self) -> &'static str {
        "one_ssbo"
    }

    fn encode(&self, rects: &[Rect]) -> Encoding {
        let mut bytes = Vec::with_capacity(rects.len() * SSBO_RECORD_BYTES);
        for rect in rects {
            push_u16(&mut bytes, rect.pos.left as u16);
            push_u16(&mut bytes, rect.pos.top as u16);
            push_u16(&mut bytes, rect.pos.width() as u16);
            push_u16(&mut bytes, rect.pos.height() as u16);
            bytes.extend_from_slice(&rect.background_color.to_bytes());
            bytes.extend_from_slice(&rect.border_color.to_bytes());
            // Style flags in the low byte, corner radius above them.
            push_u32(&mut bytes, style_flags(rect) | (rect.corner_radius << 8));
            push_u16(&mut bytes, rect.texture_index as u16);
            push_u16(&mut bytes, rect.texture_array_index as u16);
        }
        Encoding {
            vertex_bytes: bytes,
            draw_batches: 1,
        }
    }
}

/// One shared unit quad plus a per-instance attribute stream, the classic
/// instanced-divisor layout.
pub struct InstDiv;

impl RenderApproach for InstDiv {
    fn name(&self) -> &'static str {
        "inst_div"
    }

    fn encode(&self, rects: &[Rect]) -> Encoding {
        let mut bytes =
            Vec::with_capacity(QUAD_HEADER_BYTES + rects.len() * INSTANCE_RECORD_BYTES);
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
            push_f32(&mut bytes, x);
            push_f32(&mut bytes, y);
        }
        for rect in rects {
            push_f32(&mut bytes, rect.pos.left as f32);
            push_f32(&mut bytes, rect.pos.top as f32);
            push_f32(&mut bytes, rect.pos.width() as f32);
            push_f32(&mut bytes, rect.pos.height() as f32);
            bytes.extend_from_slice(&rect.background_color.to_bytes());
            bytes.extend_from_slice(&rect.border_color.to_bytes());
            push_u32(&mut bytes, style_flags(rect));
            push_f32(&mut bytes, rect.corner_radius as f32);
        }
        Encoding {
            vertex_bytes: bytes,
            draw_batches: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rectbench_core::{generate_random_rects, ScenarioOpts};

    fn sample_rects() -> Vec<Rect> {
        generate_random_rects(10, ScenarioOpts::default())
    }

    #[test]
    fn approach_order_and_names() {
        let names: Vec<&str> = all_approaches().iter().map(|a| a.name()).collect();
        assert_eq!(
            names,
            ["one_rect_per_draw", "simple_vbo", "complete_vbo", "one_ssbo", "inst_div"]
        );
    }

    #[test]
    fn encoded_sizes_match_layouts() {
        let rects = sample_rects();
        let n = rects.len();

        assert_eq!(
            SimpleVbo.encode(&rects).vertex_bytes.len(),
            n * VERTICES_PER_RECT * SIMPLE_VERTEX_BYTES
        );
        assert_eq!(
            CompleteVbo.encode(&rects).vertex_bytes.len(),
            n * VERTICES_PER_RECT * COMPLETE_VERTEX_BYTES
        );
        assert_eq!(OneSsbo.encode(&rects).vertex_bytes.len(), n * SSBO_RECORD_BYTES);
        assert_eq!(
            InstDiv.encode(&rects).vertex_bytes.len(),
            QUAD_HEADER_BYTES + n * INSTANCE_RECORD_BYTES
        );
    }

    #[test]
    fn only_the_naive_approach_splits_draws() {
        let rects = sample_rects();
        assert_eq!(OneRectPerDraw.encode(&rects).draw_batches, rects.len());
        for approach in [&SimpleVbo as &dyn RenderApproach, &CompleteVbo, &OneSsbo, &InstDiv] {
            assert_eq!(approach.encode(&rects).draw_batches, 1);
        }
    }

    #[test]
    fn all_encodings_fit_the_size_bound() {
        let rects = sample_rects();
        let bound = max_encoding_bytes(rects.len());
        for approach in all_approaches() {
            assert!(approach.encode(&rects).vertex_bytes.len() <= bound);
        }
    }

    #[test]
    fn encoding_is_deterministic() {
        let rects = sample_rects();
        assert_eq!(OneSsbo.encode(&rects), OneSsbo.encode(&rects));
    }
}
