use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;

/// Index type of the batch buffers. 16-bit, so one batch addresses at most
/// 65 536 vertices.
pub type Vertex2DIndex = u16;

/// Vertex consumed by the standard sprite shader.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex2D {
    pub pos: [f32; 2],
    pub tex: [f32; 2],
    pub color: [f32; 4],
}

const_assert_eq!(std::mem::size_of::<Vertex2D>(), 32);

impl Vertex2D {
    pub const fn new(pos: [f32; 2], tex: [f32; 2], color: [f32; 4]) -> Self {
        Self { pos, tex, color }
    }

    /// Untextured vertex.
    pub const fn colored(pos: [f32; 2], color: [f32; 4]) -> Self {
        Self {
            pos,
            tex: [0.0, 0.0],
            color,
        }
    }

    #[cfg(feature = "wgpu-backend")]
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRS: &[wgpu::VertexAttribute] = &wgpu::vertex_attr_array![
            0 => Float32x2,  // pos
            1 => Float32x2,  // tex
            2 => Float32x4,  // color
        ];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex2D>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: ATTRS,
        }
    }
}
