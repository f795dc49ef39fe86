//! Tessellation of 2D primitives straight into batch regions.
//!
//! Every builder requests exactly the space it fills, so one primitive is one
//! contiguous submission. `None` means the batch refused the request.

use std::f32::consts::TAU;

use strata_core::{alloc::HashMap, math::Vec2};

use crate::{
    batch::Vertex2DBatch,
    color::Color,
    vertex::{Vertex2D, Vertex2DIndex},
};

/// What a builder wrote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submitted {
    pub index_count: u32,
    pub batch_index: u32,
}

impl Submitted {
    /// Degenerate input, nothing written.
    pub const EMPTY: Submitted = Submitted {
        index_count: 0,
        batch_index: 0,
    };
}

const QUAD_INDICES: [Vertex2DIndex; 6] = [0, 1, 2, 2, 3, 0];

/// Copy caller geometry. `indices` are relative to `vertices`.
pub fn build_sprite(batch: &mut Vertex2DBatch, vertices: &[Vertex2D], indices: &[Vertex2DIndex]) -> Option<Submitted> {
    if vertices.is_empty() || indices.is_empty() {
        return Some(Submitted::EMPTY);
    }
    if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
        tracing::warn!("Dropping sprite: index {} out of range for {} vertices", bad, vertices.len());
        return None;
    }
    let region = batch.request_buffer(vertices.len() as u32, indices.len() as u32)?;
    region.vertices.copy_from_slice(vertices);
    for (dst, src) in region.indices.iter_mut().zip(indices) {
        *dst = region.index_offset + src;
    }
    Some(Submitted {
        index_count: indices.len() as u32,
        batch_index: region.batch_index,
    })
}

/// Four corners in order top-left, top-right, bottom-right, bottom-left.
pub fn build_quad(batch: &mut Vertex2DBatch, corners: [Vec2; 4], uvs: [[f32; 2]; 4], colors: [Color; 4]) -> Option<Submitted> {
    let region = batch.request_buffer(4, 6)?;
    for (i, vertex) in region.vertices.iter_mut().enumerate() {
        *vertex = Vertex2D::new(corners[i].to_array(), uvs[i], colors[i].to_array());
    }
    for (dst, src) in region.indices.iter_mut().zip(QUAD_INDICES) {
        *dst = region.index_offset + src;
    }
    Some(Submitted {
        index_count: 6,
        batch_index: region.batch_index,
    })
}

/// Axis aligned rect, one colour per corner.
pub fn build_rect(batch: &mut Vertex2DBatch, pos: Vec2, size: Vec2, colors: [Color; 4]) -> Option<Submitted> {
    build_quad(batch, rect_corners(pos, size), rect_uvs([0.0, 0.0, 1.0, 1.0]), colors)
}

/// Textured rect. `uv` is `[u0, v0, u1, v1]`.
pub fn build_texture_region(batch: &mut Vertex2DBatch, pos: Vec2, size: Vec2, uv: [f32; 4], color: Color) -> Option<Submitted> {
    build_quad(batch, rect_corners(pos, size), rect_uvs(uv), [color; 4])
}

/// Outline of a rect, `thickness` grows inward.
pub fn build_rect_frame(batch: &mut Vertex2DBatch, pos: Vec2, size: Vec2, thickness: f32, color: Color) -> Option<Submitted> {
    let t = thickness.min(size.x * 0.5).min(size.y * 0.5);
    if t <= 0.0 {
        return Some(Submitted::EMPTY);
    }
    let outer = rect_corners(pos, size);
    let inner = rect_corners(pos + Vec2::splat(t), size - Vec2::splat(2.0 * t));
    let region = batch.request_buffer(8, 24)?;
    let c = color.to_array();
    for i in 0..4 {
        region.vertices[i] = Vertex2D::colored(outer[i].to_array(), c);
        region.vertices[i + 4] = Vertex2D::colored(inner[i].to_array(), c);
    }
    let mut cursor = 0;
    for side in 0..4u16 {
        let next = (side + 1) % 4;
        for i in [side, next, next + 4, next + 4, side + 4, side] {
            region.indices[cursor] = region.index_offset + i;
            cursor += 1;
        }
    }
    Some(Submitted {
        index_count: 24,
        batch_index: region.batch_index,
    })
}

pub fn build_triangle(batch: &mut Vertex2DBatch, points: [Vec2; 3], color: Color) -> Option<Submitted> {
    let region = batch.request_buffer(3, 3)?;
    for (i, vertex) in region.vertices.iter_mut().enumerate() {
        *vertex = Vertex2D::colored(points[i].to_array(), color.to_array());
    }
    for (i, index) in region.indices.iter_mut().enumerate() {
        *index = region.index_offset + i as Vertex2DIndex;
    }
    Some(Submitted {
        index_count: 3,
        batch_index: region.batch_index,
    })
}

/// Thick line segment, colour interpolated from `colors[0]` at `begin`.
pub fn build_line(batch: &mut Vertex2DBatch, begin: Vec2, end: Vec2, thickness: f32, colors: [Color; 2]) -> Option<Submitted> {
    let dir = end - begin;
    if thickness <= 0.0 || dir.length_squared() == 0.0 {
        return Some(Submitted::EMPTY);
    }
    let normal = dir.perp().normalize() * (thickness * 0.5);
    let corners = [begin + normal, end + normal, end - normal, begin - normal];
    build_quad(batch, corners, rect_uvs([0.0, 0.0, 1.0, 1.0]), [colors[0], colors[1], colors[1], colors[0]])
}

/// Filled circle as a triangle fan. `scale` is the largest axis scale of the
/// current transform and only affects the segment count.
pub fn build_circle(batch: &mut Vertex2DBatch, center: Vec2, radius: f32, scale: f32, color: Color) -> Option<Submitted> {
    if radius <= 0.0 {
        return Some(Submitted::EMPTY);
    }
    let segments = circle_segments(radius * scale.max(0.0));
    let region = batch.request_buffer(segments + 1, segments * 3)?;
    let c = color.to_array();
    region.vertices[0] = Vertex2D::colored(center.to_array(), c);
    for i in 0..segments as usize {
        let angle = TAU * i as f32 / segments as f32;
        let p = center + Vec2::new(angle.sin(), -angle.cos()) * radius;
        region.vertices[i + 1] = Vertex2D::colored(p.to_array(), c);
    }
    let base = region.index_offset;
    let n = segments as Vertex2DIndex;
    for (i, tri) in region.indices.chunks_exact_mut(3).enumerate() {
        let i = i as Vertex2DIndex;
        tri[0] = base;
        tri[1] = base + 1 + i;
        tri[2] = base + 1 + (i + 1) % n;
    }
    Some(Submitted {
        index_count: segments * 3,
        batch_index: region.batch_index,
    })
}

/// Segment count for a circle of on-screen `radius`.
pub fn circle_segments(radius: f32) -> u32 {
    ((radius.max(0.0).sqrt() * 6.0) as u32).clamp(8, 255)
}

/// Arbitrary indexed triangle list, split into as many submissions as the
/// batch capacity requires. `emit` is called once per submission.
///
/// Returns `false` when the input is malformed or a single triangle cannot fit.
pub fn build_polygon(
    batch: &mut Vertex2DBatch,
    vertices: &[Vertex2D],
    indices: &[u32],
    mut emit: impl FnMut(Submitted),
) -> bool {
    if indices.len() % 3 != 0 {
        tracing::warn!("Dropping polygon: {} indices is not a triangle list", indices.len());
        return false;
    }
    if let Some(bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
        tracing::warn!("Dropping polygon: index {} out of range for {} vertices", bad, vertices.len());
        return false;
    }

    let max_vertices = batch.max_vertices() as usize;
    let max_indices = batch.max_indices() as usize;
    if vertices.len() <= max_vertices.min(Vertex2DIndex::MAX as usize + 1) && indices.len() <= max_indices {
        let local: Vec<Vertex2DIndex> = indices.iter().map(|&i| i as Vertex2DIndex).collect();
        return match build_sprite(batch, vertices, &local) {
            Some(submitted) => {
                emit(submitted);
                true
            }
            None => false,
        };
    }

    let mut remap: HashMap<u32, Vertex2DIndex> = HashMap::new();
    let mut chunk_vertices: Vec<Vertex2D> = Vec::new();
    let mut chunk_indices: Vec<Vertex2DIndex> = Vec::new();

    for tri in indices.chunks_exact(3) {
        let mut fresh = 0;
        for (n, i) in tri.iter().enumerate() {
            if !remap.contains_key(i) && !tri[..n].contains(i) {
                fresh += 1;
            }
        }
        if chunk_vertices.len() + fresh > max_vertices || chunk_indices.len() + 3 > max_indices {
            match build_sprite(batch, &chunk_vertices, &chunk_indices) {
                Some(submitted) => emit(submitted),
                None => return false,
            }
            remap.clear();
            chunk_vertices.clear();
            chunk_indices.clear();
        }
        for &i in tri {
            let local = *remap.entry(i).or_insert_with(|| {
                chunk_vertices.push(vertices[i as usize]);
                (chunk_vertices.len() - 1) as Vertex2DIndex
            });
            chunk_indices.push(local);
        }
    }

    match build_sprite(batch, &chunk_vertices, &chunk_indices) {
        Some(submitted) => {
            emit(submitted);
            true
        }
        None => false,
    }
}

fn rect_corners(pos: Vec2, size: Vec2) -> [Vec2; 4] {
    [
        pos,
        Vec2::new(pos.x + size.x, pos.y),
        pos + size,
        Vec2::new(pos.x, pos.y + size.y),
    ]
}

fn rect_uvs(uv: [f32; 4]) -> [[f32; 2]; 4] {
    [[uv[0], uv[1]], [uv[2], uv[1]], [uv[2], uv[3]], [uv[0], uv[3]]]
}
