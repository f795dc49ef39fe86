//! The downward interface to a graphics API.
//!
//! [`RenderBackend2D`] is what replay drives. It is object safe and takes
//! `&self` everywhere; implementations use interior mutability, so one backend
//! can be shared through an `Arc` between the renderer and resource owners.
//!
//! A freshly created (or reinitialised) backend must have the state described
//! by [`RenderStateSnapshot::DEFAULT_2D`](crate::state::RenderStateSnapshot::DEFAULT_2D)
//! bound, since the renderer's state cache starts from that assumption.

use strata_core::geometry::{Rect, Size};

use crate::{
    error::BackendError,
    state::{BlendState, DepthStencilChanges, DepthStencilState, RasterizerChanges, RasterizerState, SamplerState},
    types::{BufferHandle, BufferKind, PixelShaderId, ShaderStage, StandardShaders2D, TextureId, VertexShaderId, WriteMode},
};

pub type BackendResult<T = ()> = Result<T, BackendError>;

pub trait RenderBackend2D: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    fn render_target_size(&self) -> Size<u32>;

    fn standard_shaders(&self) -> StandardShaders2D;

    /// 1×1 opaque white texture used in place of invalid texture handles.
    fn fallback_texture(&self) -> TextureId;

    fn has_texture(&self, texture: TextureId) -> bool;

    fn has_vertex_shader(&self, shader: VertexShaderId) -> bool;

    fn has_pixel_shader(&self, shader: PixelShaderId) -> bool;

    fn create_buffer(&self, kind: BufferKind, size: u64) -> BackendResult<BufferHandle>;

    /// Write `data` at byte `offset`.
    ///
    /// With [`WriteMode::NoOverwrite`] the caller guarantees the range is not
    /// read by work that is still pending.
    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8], mode: WriteMode) -> BackendResult;

    fn set_vertex_index_buffers(&self, vertices: BufferHandle, indices: BufferHandle) -> BackendResult;

    fn bind_blend_state(&self, state: &BlendState) -> BackendResult;

    fn bind_rasterizer_state(&self, state: &RasterizerState, changes: RasterizerChanges) -> BackendResult;

    fn bind_depth_stencil_state(&self, state: &DepthStencilState, changes: DepthStencilChanges) -> BackendResult;

    fn bind_sampler_state(&self, stage: ShaderStage, slot: u32, state: &SamplerState) -> BackendResult;

    fn bind_texture(&self, stage: ShaderStage, slot: u32, texture: TextureId) -> BackendResult;

    fn bind_vertex_shader(&self, shader: VertexShaderId) -> BackendResult;

    fn bind_pixel_shader(&self, shader: PixelShaderId) -> BackendResult;

    fn bind_constant_buffer(&self, stage: ShaderStage, slot: u32, buffer: BufferHandle) -> BackendResult;

    fn set_scissor_rect(&self, rect: Rect<i32>) -> BackendResult;

    fn set_viewport(&self, rect: Rect<i32>) -> BackendResult;

    fn draw_indexed(&self, index_count: u32, start_index: u32, base_vertex: u32) -> BackendResult;

    /// Draw `vertex_count` vertices with no vertex buffer bound.
    fn draw(&self, vertex_count: u32) -> BackendResult;

    /// Send everything recorded so far to the GPU.
    fn submit(&self) -> BackendResult;

    /// Finish the frame.
    fn present(&self) -> BackendResult;
}
