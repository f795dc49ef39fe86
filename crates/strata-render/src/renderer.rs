//! The upward API: submission of primitives and state, frame boundaries.

use std::sync::Arc;

use strata_core::{
    geometry::Rect,
    math::{Affine2, Vec2, max_scaling},
    profiling::profile_function,
};

use crate::{
    backend::RenderBackend2D,
    batch::Vertex2DBatch,
    builder::{self, Submitted},
    color::Color,
    command::{CommandManager, Renderer2DCommand},
    config::Renderer2DConfig,
    constant_buffer::UserConstantBuffer,
    error::Renderer2DError,
    replay::{CommandReplay, EngineConstants, FrameResources},
    state::{BlendState, DepthStencilState, RasterizerState, SamplerState},
    state_cache::RenderStateCache,
    types::{
        ConstantBufferId, MAX_CONSTANT_BUFFER_SLOTS, PixelShaderId, Renderer2DStats, ShaderStage, TextureId,
        VertexShaderId,
    },
    vertex::{Vertex2D, Vertex2DIndex},
};

/// Batching 2D renderer.
///
/// Submissions are appended to a command list during the frame and replayed
/// against the backend on [`flush`](Self::flush). Consecutive submissions with
/// identical state in the same physical batch collapse into one draw call.
///
/// # Example
///
/// ```ignore
/// let mut renderer = Renderer2D::new(backend, Renderer2DConfig::default())?;
/// renderer.begin_frame();
/// renderer.add_rect(Vec2::new(10.0, 10.0), Vec2::new(100.0, 50.0), Color::RED);
/// renderer.add_textured_quad(texture, corners, Color::WHITE);
/// renderer.end_frame()?;
/// ```
pub struct Renderer2D {
    backend: Arc<dyn RenderBackend2D>,
    config: Renderer2DConfig,
    commands: CommandManager,
    resources: FrameResources,
    stats: Renderer2DStats,
}

impl Renderer2D {
    pub fn new(backend: Arc<dyn RenderBackend2D>, config: Renderer2DConfig) -> Result<Self, Renderer2DError> {
        config.validate()?;
        tracing::info!(
            "Creating Renderer2D on {} backend ({} vertices / {} indices per batch)",
            backend.name(),
            config.max_batch_vertices,
            config.max_batch_indices
        );
        let commands = CommandManager::new(backend.standard_shaders());
        let resources = FrameResources {
            batch: Vertex2DBatch::new(&config),
            state_cache: RenderStateCache::new(),
            constants: EngineConstants::default(),
            user_buffers: Vec::new(),
        };
        Ok(Self {
            backend,
            config,
            commands,
            resources,
            stats: Renderer2DStats::default(),
        })
    }

    pub fn backend(&self) -> &Arc<dyn RenderBackend2D> {
        &self.backend
    }

    pub fn config(&self) -> &Renderer2DConfig {
        &self.config
    }

    /// Counters since [`begin_frame`](Self::begin_frame), complete after a flush.
    pub fn stats(&self) -> Renderer2DStats {
        self.stats
    }

    pub fn commands(&self) -> &[Renderer2DCommand] {
        self.commands.commands()
    }

    pub fn num_batches(&self) -> usize {
        self.resources.batch.num_batches()
    }

    /// Discard anything recorded since the last flush.
    pub fn begin_frame(&mut self) {
        self.reset_frame();
        self.stats = Renderer2DStats::default();
    }

    /// Replay recorded commands against the backend and reset the buffers.
    ///
    /// The buffers are reset whether or not the replay succeeds. On device loss
    /// the frame is discarded and every GPU handle is recreated on next use.
    pub fn flush(&mut self) -> Result<(), Renderer2DError> {
        profile_function!();
        let mut replay = CommandReplay::new(self.backend.as_ref(), self.config.log_commands);
        let result = replay.run(&mut self.resources, &self.commands);
        let replayed = replay.stats;
        self.accumulate(&replayed);
        self.stats.commands += self.commands.len() as u32;
        self.stats.merged_draws += self.commands.merged_draws();
        self.reset_frame();

        match result {
            Ok(()) => Ok(()),
            Err(e) => {
                tracing::error!("Frame discarded: {}", e);
                if e.is_fatal() {
                    self.resources.invalidate_gpu();
                }
                Err(e.into())
            }
        }
    }

    /// Flush, then present.
    pub fn end_frame(&mut self) -> Result<(), Renderer2DError> {
        self.flush()?;
        self.backend.present().map_err(|e| {
            if e.is_fatal() {
                self.resources.invalidate_gpu();
            }
            Renderer2DError::from(e)
        })
    }

    /// Notify the renderer that the backend was recreated after device loss.
    pub fn handle_device_reset(&mut self) {
        tracing::info!("Recreating Renderer2D GPU resources");
        self.resources.invalidate_gpu();
        self.reset_frame();
    }

    fn reset_frame(&mut self) {
        self.resources.batch.reset();
        self.commands.reset();
    }

    fn accumulate(&mut self, replay: &Renderer2DStats) {
        self.stats.draw_calls += replay.draw_calls;
        self.stats.triangles += replay.triangles;
        self.stats.batches += replay.batches;
        self.stats.state_binds += replay.state_binds;
        self.stats.resource_binds += replay.resource_binds;
        self.stats.substituted_handles += replay.substituted_handles;
    }

    fn submit(&mut self, submitted: Option<Submitted>, texture: Option<TextureId>) -> bool {
        match submitted {
            Some(s) => {
                if s.index_count > 0 {
                    self.commands.push_draw(s.index_count, s.batch_index, texture);
                }
                true
            }
            None => {
                self.stats.dropped_draws += 1;
                false
            }
        }
    }

    // --- Submission -------------------------------------------------------

    /// Untextured geometry. Indices are relative to `vertices`.
    pub fn add_sprite(&mut self, vertices: &[Vertex2D], indices: &[Vertex2DIndex]) -> bool {
        let submitted = builder::build_sprite(&mut self.resources.batch, vertices, indices);
        self.submit(submitted, None)
    }

    pub fn add_textured_sprite(&mut self, texture: TextureId, vertices: &[Vertex2D], indices: &[Vertex2DIndex]) -> bool {
        let submitted = builder::build_sprite(&mut self.resources.batch, vertices, indices);
        self.submit(submitted, Some(texture))
    }

    pub fn add_rect(&mut self, pos: Vec2, size: Vec2, color: Color) -> bool {
        self.add_rect_gradient(pos, size, [color; 4])
    }

    /// Corner colours top-left, top-right, bottom-right, bottom-left.
    pub fn add_rect_gradient(&mut self, pos: Vec2, size: Vec2, colors: [Color; 4]) -> bool {
        let submitted = builder::build_rect(&mut self.resources.batch, pos, size, colors);
        self.submit(submitted, None)
    }

    pub fn add_rect_frame(&mut self, pos: Vec2, size: Vec2, thickness: f32, color: Color) -> bool {
        let submitted = builder::build_rect_frame(&mut self.resources.batch, pos, size, thickness, color);
        self.submit(submitted, None)
    }

    pub fn add_triangle(&mut self, points: [Vec2; 3], color: Color) -> bool {
        let submitted = builder::build_triangle(&mut self.resources.batch, points, color);
        self.submit(submitted, None)
    }

    pub fn add_quad(&mut self, corners: [Vec2; 4], colors: [Color; 4]) -> bool {
        let uvs = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        let submitted = builder::build_quad(&mut self.resources.batch, corners, uvs, colors);
        self.submit(submitted, None)
    }

    pub fn add_line(&mut self, begin: Vec2, end: Vec2, thickness: f32, colors: [Color; 2]) -> bool {
        let submitted = builder::build_line(&mut self.resources.batch, begin, end, thickness, colors);
        self.submit(submitted, None)
    }

    pub fn add_circle(&mut self, center: Vec2, radius: f32, color: Color) -> bool {
        let scale = max_scaling(&self.commands.combined_transform());
        let submitted = builder::build_circle(&mut self.resources.batch, center, radius, scale, color);
        self.submit(submitted, None)
    }

    /// Texture region drawn into an axis aligned rect. `uv` is `[u0, v0, u1, v1]`.
    pub fn add_texture_region(&mut self, texture: TextureId, pos: Vec2, size: Vec2, uv: [f32; 4], color: Color) -> bool {
        let submitted = builder::build_texture_region(&mut self.resources.batch, pos, size, uv, color);
        self.submit(submitted, Some(texture))
    }

    /// Whole texture mapped onto four corners (top-left first, clockwise).
    pub fn add_textured_quad(&mut self, texture: TextureId, corners: [Vec2; 4], color: Color) -> bool {
        let uvs = [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];
        let submitted = builder::build_quad(&mut self.resources.batch, corners, uvs, [color; 4]);
        self.submit(submitted, Some(texture))
    }

    /// Indexed triangle list of any size; split across batches as needed.
    pub fn add_polygon(&mut self, vertices: &[Vertex2D], indices: &[u32]) -> bool {
        let mut submissions = Vec::new();
        let ok = builder::build_polygon(&mut self.resources.batch, vertices, indices, |s| submissions.push(s));
        for s in submissions {
            self.submit(Some(s), None);
        }
        if !ok {
            self.stats.dropped_draws += 1;
        }
        ok
    }

    /// Draw `vertex_count` vertices without vertex data, for shaders that
    /// generate their own positions.
    pub fn add_null_vertices(&mut self, vertex_count: u32) {
        if vertex_count > 0 {
            self.commands.push_draw_null(vertex_count);
        }
    }

    /// Submit everything recorded so far to the GPU at this point of the frame.
    pub fn insert_flush(&mut self) {
        self.commands.push_flush();
    }

    // --- State ------------------------------------------------------------

    pub fn blend_state(&self) -> BlendState {
        self.commands.blend_state()
    }

    pub fn set_blend_state(&mut self, state: BlendState) {
        self.commands.set_blend_state(state);
    }

    pub fn rasterizer_state(&self) -> RasterizerState {
        self.commands.rasterizer_state()
    }

    pub fn set_rasterizer_state(&mut self, state: RasterizerState) {
        self.commands.set_rasterizer_state(state);
    }

    pub fn depth_stencil_state(&self) -> DepthStencilState {
        self.commands.depth_stencil_state()
    }

    pub fn set_depth_stencil_state(&mut self, state: DepthStencilState) {
        self.commands.set_depth_stencil_state(state);
    }

    pub fn sampler_state(&self, stage: ShaderStage, slot: usize) -> Option<SamplerState> {
        self.commands.sampler_state(stage, slot)
    }

    pub fn set_sampler_state(&mut self, stage: ShaderStage, slot: usize, state: SamplerState) {
        if !self.commands.set_sampler_state(stage, slot, state) {
            tracing::warn!("Ignoring sampler state for out of range slot {}", slot);
        }
    }

    pub fn ps_texture(&self, slot: usize) -> Option<TextureId> {
        self.commands.ps_texture(slot)
    }

    /// Extra pixel stage texture for custom shaders, slots `1..8`.
    pub fn set_ps_texture(&mut self, slot: usize, texture: Option<TextureId>) {
        if !self.commands.set_ps_texture(slot, texture) {
            tracing::warn!("Ignoring texture for slot {}: slot 0 is used by draws, max is 7", slot);
        }
    }

    pub fn scissor_rect(&self) -> Rect<i32> {
        self.commands.scissor_rect()
    }

    /// Takes effect for draws with a rasterizer state that enables scissoring.
    pub fn set_scissor_rect(&mut self, rect: Rect<i32>) {
        self.commands.set_scissor_rect(rect);
    }

    pub fn viewport(&self) -> Option<Rect<i32>> {
        self.commands.viewport()
    }

    /// `None` restores the full render target.
    pub fn set_viewport(&mut self, viewport: Option<Rect<i32>>) {
        self.commands.set_viewport(viewport);
    }

    pub fn custom_vs(&self) -> Option<VertexShaderId> {
        self.commands.custom_vs()
    }

    pub fn set_custom_vs(&mut self, shader: Option<VertexShaderId>) {
        self.commands.set_custom_vs(shader);
    }

    pub fn custom_ps(&self) -> Option<PixelShaderId> {
        self.commands.custom_ps()
    }

    pub fn set_custom_ps(&mut self, shader: Option<PixelShaderId>) {
        self.commands.set_custom_ps(shader);
    }

    pub fn color_mul(&self) -> Color {
        self.commands.color_mul()
    }

    pub fn set_color_mul(&mut self, color: Color) {
        self.commands.set_color_mul(color);
    }

    pub fn color_add(&self) -> Color {
        self.commands.color_add()
    }

    pub fn set_color_add(&mut self, color: Color) {
        self.commands.set_color_add(color);
    }

    pub fn local_transform(&self) -> Affine2 {
        self.commands.local_transform()
    }

    pub fn set_local_transform(&mut self, transform: Affine2) {
        self.commands.set_local_transform(transform);
    }

    pub fn camera_transform(&self) -> Affine2 {
        self.commands.camera_transform()
    }

    pub fn set_camera_transform(&mut self, transform: Affine2) {
        self.commands.set_camera_transform(transform);
    }

    /// Register a constant buffer of `size` bytes. GPU storage is created on
    /// first use.
    pub fn create_constant_buffer(&mut self, size: usize) -> ConstantBufferId {
        let id = ConstantBufferId(self.resources.user_buffers.len() as u32);
        self.resources.user_buffers.push(UserConstantBuffer::new(size));
        id
    }

    /// Bind `data` as the contents of `buffer` at `stage`/`slot` for the
    /// following draws. Slot 0 holds the engine constants.
    pub fn set_constant_buffer(&mut self, stage: ShaderStage, slot: u32, buffer: ConstantBufferId, data: &[u8]) -> bool {
        if slot == 0 || slot as usize >= MAX_CONSTANT_BUFFER_SLOTS {
            tracing::warn!("Ignoring constant buffer for slot {}: valid slots are 1..{}", slot, MAX_CONSTANT_BUFFER_SLOTS);
            return false;
        }
        let Some(registered) = self.resources.user_buffers.get(buffer.raw() as usize) else {
            tracing::warn!("Ignoring unknown constant buffer {}", buffer);
            return false;
        };
        if registered.size != data.len() {
            tracing::warn!(
                "Ignoring constant buffer {}: expected {} bytes, got {}",
                buffer,
                registered.size,
                data.len()
            );
            return false;
        }
        self.commands.set_constant_buffer(stage, slot, buffer, data);
        true
    }

    // --- Scoped state ------------------------------------------------------

    /// Apply `states` until the returned guard is dropped.
    pub fn scoped_render_states(&mut self, states: RenderStates2D) -> ScopedRenderStates2D<'_> {
        let previous = RenderStates2D {
            blend: states.blend.map(|_| self.blend_state()),
            rasterizer: states.rasterizer.map(|_| self.rasterizer_state()),
            depth_stencil: states.depth_stencil.map(|_| self.depth_stencil_state()),
            sampler: states
                .sampler
                .and_then(|_| self.sampler_state(ShaderStage::Pixel, 0)),
        };
        self.apply_render_states(states);
        ScopedRenderStates2D {
            renderer: self,
            previous,
        }
    }

    /// Use custom shaders until the returned guard is dropped.
    pub fn scoped_custom_shader(
        &mut self,
        vs: Option<VertexShaderId>,
        ps: Option<PixelShaderId>,
    ) -> ScopedCustomShader2D<'_> {
        let previous = (self.custom_vs(), self.custom_ps());
        self.set_custom_vs(vs);
        self.set_custom_ps(ps);
        ScopedCustomShader2D {
            renderer: self,
            previous,
        }
    }

    fn apply_render_states(&mut self, states: RenderStates2D) {
        if let Some(blend) = states.blend {
            self.set_blend_state(blend);
        }
        if let Some(rasterizer) = states.rasterizer {
            self.set_rasterizer_state(rasterizer);
        }
        if let Some(depth_stencil) = states.depth_stencil {
            self.set_depth_stencil_state(depth_stencil);
        }
        if let Some(sampler) = states.sampler {
            self.set_sampler_state(ShaderStage::Pixel, 0, sampler);
        }
    }
}

/// States to override in a [`ScopedRenderStates2D`]. `None` leaves a state alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderStates2D {
    pub blend: Option<BlendState>,
    pub rasterizer: Option<RasterizerState>,
    pub depth_stencil: Option<DepthStencilState>,
    /// Pixel stage slot 0
    pub sampler: Option<SamplerState>,
}

impl RenderStates2D {
    pub fn blend(blend: BlendState) -> Self {
        Self {
            blend: Some(blend),
            ..Default::default()
        }
    }

    pub fn rasterizer(rasterizer: RasterizerState) -> Self {
        Self {
            rasterizer: Some(rasterizer),
            ..Default::default()
        }
    }

    pub fn sampler(sampler: SamplerState) -> Self {
        Self {
            sampler: Some(sampler),
            ..Default::default()
        }
    }
}

/// Restores the overridden render states on drop.
pub struct ScopedRenderStates2D<'a> {
    renderer: &'a mut Renderer2D,
    previous: RenderStates2D,
}

impl std::ops::Deref for ScopedRenderStates2D<'_> {
    type Target = Renderer2D;

    fn deref(&self) -> &Renderer2D {
        self.renderer
    }
}

impl std::ops::DerefMut for ScopedRenderStates2D<'_> {
    fn deref_mut(&mut self) -> &mut Renderer2D {
        self.renderer
    }
}

impl Drop for ScopedRenderStates2D<'_> {
    fn drop(&mut self) {
        self.renderer.apply_render_states(self.previous);
    }
}

/// Restores the previous custom shaders on drop.
pub struct ScopedCustomShader2D<'a> {
    renderer: &'a mut Renderer2D,
    previous: (Option<VertexShaderId>, Option<PixelShaderId>),
}

impl std::ops::Deref for ScopedCustomShader2D<'_> {
    type Target = Renderer2D;

    fn deref(&self) -> &Renderer2D {
        self.renderer
    }
}

impl std::ops::DerefMut for ScopedCustomShader2D<'_> {
    fn deref_mut(&mut self) -> &mut Renderer2D {
        self.renderer
    }
}

impl Drop for ScopedCustomShader2D<'_> {
    fn drop(&mut self) {
        let (vs, ps) = self.previous;
        self.renderer.set_custom_vs(vs);
        self.renderer.set_custom_ps(ps);
    }
}
