//! Turning the recorded command list into backend calls.

use strata_core::{
    geometry::{Rect, Size},
    math::{Affine2, affine_to_rows, screen_transform},
    profiling::{profile_function, profile_scope},
};

use crate::{
    backend::{BackendResult, RenderBackend2D},
    batch::{BatchInfo, Vertex2DBatch},
    color::Color,
    command::{CommandManager, ConstantBufferCommand, DrawState, Renderer2DCommand},
    constant_buffer::{ConstantBuffer, PSConstants2D, UserConstantBuffer, VSConstants2D},
    state_cache::{RenderStateCache, ResourceBindingCache},
    types::{PixelShaderId, Renderer2DStats, ShaderStage, StandardShaders2D, TextureId, VertexShaderId},
};

/// Engine constants and the values they are derived from.
///
/// Lives across frames: constants set in one frame stay in effect until
/// changed.
#[derive(Debug)]
pub(crate) struct EngineConstants {
    pub vs: ConstantBuffer<VSConstants2D>,
    pub ps: ConstantBuffer<PSConstants2D>,
    transform: Affine2,
    screen: Affine2,
    color_mul: Color,
}

impl Default for EngineConstants {
    fn default() -> Self {
        Self {
            vs: ConstantBuffer::default(),
            ps: ConstantBuffer::default(),
            transform: Affine2::IDENTITY,
            screen: Affine2::IDENTITY,
            color_mul: Color::WHITE,
        }
    }
}

impl EngineConstants {
    pub fn set_transform(&mut self, transform: Affine2) {
        self.transform = transform;
        self.refresh_vs();
    }

    pub fn set_screen_size(&mut self, size: Size<f32>) {
        let screen = screen_transform(size);
        if screen != self.screen {
            self.screen = screen;
            self.refresh_vs();
        }
    }

    pub fn set_color_mul(&mut self, color: Color) {
        self.color_mul = color;
        self.refresh_vs();
    }

    pub fn set_color_add(&mut self, color: Color) {
        let mut ps = *self.ps.get();
        ps.color_add = color.to_array();
        self.ps.set(ps);
    }

    pub fn invalidate(&mut self) {
        self.vs.invalidate();
        self.ps.invalidate();
    }

    fn refresh_vs(&mut self) {
        self.vs.set(VSConstants2D {
            transform: affine_to_rows(self.screen * self.transform),
            color_mul: self.color_mul.to_array(),
        });
    }
}

/// GPU-facing resources the replay mutates, owned by the renderer.
pub(crate) struct FrameResources {
    pub batch: Vertex2DBatch,
    pub state_cache: RenderStateCache,
    pub constants: EngineConstants,
    pub user_buffers: Vec<UserConstantBuffer>,
}

impl FrameResources {
    /// Drop every GPU handle so it is recreated against a new device.
    pub fn invalidate_gpu(&mut self) {
        self.batch.invalidate_gpu_buffers();
        self.state_cache.reset();
        self.constants.invalidate();
        for buffer in &mut self.user_buffers {
            buffer.handle = None;
        }
    }
}

/// Upload state of the physical batch the replay is in.
#[derive(Debug, Clone, Copy)]
struct BatchCursor {
    index: u32,
    /// `None` after a failed upload
    info: Option<BatchInfo>,
    /// Indices of this batch already walked past
    consumed: u32,
}

/// Walks a command list once, in order.
///
/// Non-fatal backend errors are logged and the affected draw is skipped or
/// served with a fallback. Device loss aborts the walk.
pub(crate) struct CommandReplay<'a> {
    backend: &'a dyn RenderBackend2D,
    standard: StandardShaders2D,
    target_size: Size<u32>,
    log_commands: bool,
    bindings: ResourceBindingCache,
    batch: Option<BatchCursor>,
    scissor: Rect<i32>,
    /// `None` until the first viewport is issued in this replay
    viewport: Option<Option<Rect<i32>>>,
    pub stats: Renderer2DStats,
}

impl<'a> CommandReplay<'a> {
    pub fn new(backend: &'a dyn RenderBackend2D, log_commands: bool) -> Self {
        Self {
            backend,
            standard: backend.standard_shaders(),
            target_size: backend.render_target_size(),
            log_commands,
            bindings: ResourceBindingCache::default(),
            batch: None,
            scissor: Rect::default(),
            viewport: None,
            stats: Renderer2DStats::default(),
        }
    }

    pub fn run(&mut self, res: &mut FrameResources, commands: &CommandManager) -> BackendResult {
        if commands.is_empty() {
            return Ok(());
        }
        profile_function!();

        let target = Size::new(self.target_size.width as f32, self.target_size.height as f32);
        res.constants.set_screen_size(target);

        for (index, command) in commands.commands().iter().enumerate() {
            if self.log_commands {
                tracing::trace!(index, command = command.name(), "replay");
            }
            match command {
                Renderer2DCommand::Draw(draw) => {
                    let info = self.batch_info(res, draw.batch_index)?;
                    self.consume(draw.index_count);
                    let Some(info) = info else {
                        continue;
                    };
                    if !self.prepare_draw(res, &draw.state)? {
                        continue;
                    }
                    let result = self
                        .backend
                        .draw_indexed(draw.index_count, info.start_index_location, info.base_vertex_location);
                    if absorb(result, "draw_indexed")? {
                        self.stats.draw_calls += 1;
                        self.stats.triangles += draw.index_count / 3;
                    }
                }
                Renderer2DCommand::DrawNull(draw) => {
                    if !self.prepare_draw(res, &draw.state)? {
                        continue;
                    }
                    if absorb(self.backend.draw(draw.vertex_count), "draw")? {
                        self.stats.draw_calls += 1;
                        self.stats.triangles += draw.vertex_count / 3;
                    }
                }
                Renderer2DCommand::ScissorRect(rect) => self.apply_scissor(*rect)?,
                Renderer2DCommand::Viewport(viewport) => self.apply_viewport(res, *viewport)?,
                Renderer2DCommand::SetVS(shader) => {
                    if let Some(shader) = shader {
                        self.bind_vertex_shader(*shader)?;
                    }
                }
                Renderer2DCommand::SetPS(shader) => {
                    if let Some(shader) = shader {
                        self.bind_pixel_shader(*shader, None)?;
                    }
                }
                Renderer2DCommand::SetConstantBuffer(cmd) => self.apply_constant_buffer(res, commands, cmd)?,
                Renderer2DCommand::ColorMul(color) => res.constants.set_color_mul(*color),
                Renderer2DCommand::ColorAdd(color) => res.constants.set_color_add(*color),
                Renderer2DCommand::Transform(transform) => res.constants.set_transform(*transform),
                Renderer2DCommand::Flush => {
                    absorb(self.backend.submit(), "submit")?;
                }
            }
        }
        Ok(())
    }

    /// Range of the next draw in `batch_index`, uploading the batch on first use.
    ///
    /// `None` when the upload failed and the draw has to be skipped. A failed
    /// batch is uploaded again for its next draw, offset past the indices
    /// already walked.
    fn batch_info(&mut self, res: &mut FrameResources, batch_index: u32) -> BackendResult<Option<BatchInfo>> {
        let cursor = match self.batch {
            Some(cursor) if cursor.index == batch_index => cursor,
            _ => BatchCursor {
                index: batch_index,
                info: None,
                consumed: 0,
            },
        };
        if cursor.info.is_some() {
            return Ok(cursor.info);
        }

        profile_scope!("upload_batch");
        let info = match res.batch.update_buffers(batch_index, self.backend) {
            Ok(mut info) => {
                self.stats.batches += 1;
                info.start_index_location += cursor.consumed;
                Some(info)
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::error!("Failed to upload batch {}, skipping draw: {}", batch_index, e);
                None
            }
        };
        self.batch = Some(BatchCursor { info, ..cursor });
        Ok(info)
    }

    /// Advance past a draw of the current batch, drawn or skipped.
    fn consume(&mut self, index_count: u32) {
        if let Some(cursor) = self.batch.as_mut() {
            cursor.consumed += index_count;
            if let Some(info) = cursor.info.as_mut() {
                info.start_index_location += index_count;
            }
        }
    }

    /// Bind everything `state` needs. `false` means the draw must be skipped.
    fn prepare_draw(&mut self, res: &mut FrameResources, state: &DrawState) -> BackendResult<bool> {
        if self.viewport != Some(state.viewport) {
            self.apply_viewport(res, state.viewport)?;
        }
        if state.scissor_rect != self.scissor {
            self.apply_scissor(state.scissor_rect)?;
        }

        match res.state_cache.set(self.backend, &state.render) {
            Ok(binds) => self.stats.state_binds += binds,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::error!("Skipping draw, render state rejected: {}", e);
                return Ok(false);
            }
        }

        if !self.bind_vertex_shader(state.vertex_shader)? || !self.bind_pixel_shader(state.pixel_shader, state.textures[0])? {
            return Ok(false);
        }

        for (slot, texture) in state.textures.iter().enumerate() {
            if let Some(texture) = texture {
                let texture = self.resolve_texture(*texture);
                let bound = self.bindings.bind_texture(self.backend, slot, texture);
                if !absorb(bound.map(|issued| self.count_resource_bind(issued)), "bind_texture")? {
                    return Ok(false);
                }
            }
        }

        let vs = res.constants.vs.update_if_dirty(self.backend);
        let ps = res.constants.ps.update_if_dirty(self.backend);
        for (stage, handle) in [(ShaderStage::Vertex, vs), (ShaderStage::Pixel, ps)] {
            let bound = handle.and_then(|handle| self.bindings.bind_constant_buffer(self.backend, stage, 0, handle));
            if !absorb(bound.map(|issued| self.count_resource_bind(issued)), "engine constants")? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn bind_vertex_shader(&mut self, shader: VertexShaderId) -> BackendResult<bool> {
        let shader = if self.backend.has_vertex_shader(shader) {
            shader
        } else {
            tracing::warn!("Invalid vertex shader {}, using the standard sprite shader", shader);
            self.stats.substituted_handles += 1;
            self.standard.sprite_vs
        };
        let bound = self.bindings.bind_vertex_shader(self.backend, shader);
        absorb(bound.map(|issued| self.count_resource_bind(issued)), "bind_vertex_shader")
    }

    /// `texture` decides which standard shader replaces an invalid one.
    fn bind_pixel_shader(&mut self, shader: PixelShaderId, texture: Option<TextureId>) -> BackendResult<bool> {
        let shader = if self.backend.has_pixel_shader(shader) {
            shader
        } else {
            let fallback = if texture.is_some() {
                self.standard.texture_ps
            } else {
                self.standard.shape_ps
            };
            tracing::warn!("Invalid pixel shader {}, using standard shader {}", shader, fallback);
            self.stats.substituted_handles += 1;
            fallback
        };
        let bound = self.bindings.bind_pixel_shader(self.backend, shader);
        absorb(bound.map(|issued| self.count_resource_bind(issued)), "bind_pixel_shader")
    }

    fn resolve_texture(&mut self, texture: TextureId) -> TextureId {
        if self.backend.has_texture(texture) {
            return texture;
        }
        let fallback = self.backend.fallback_texture();
        tracing::warn!("Invalid texture {}, using fallback {}", texture, fallback);
        self.stats.substituted_handles += 1;
        fallback
    }

    fn count_resource_bind(&mut self, issued: bool) {
        if issued {
            self.stats.resource_binds += 1;
        }
    }

    fn apply_scissor(&mut self, rect: Rect<i32>) -> BackendResult {
        self.scissor = rect;
        if rect.has_area() {
            absorb(self.backend.set_scissor_rect(rect), "set_scissor_rect")?;
        }
        Ok(())
    }

    fn apply_viewport(&mut self, res: &mut FrameResources, viewport: Option<Rect<i32>>) -> BackendResult {
        self.viewport = Some(viewport);
        let rect = viewport.unwrap_or_else(|| Rect::from_size(self.target_size)).clamp_to(self.target_size);
        res.constants
            .set_screen_size(Size::new(rect.width.max(0) as f32, rect.height.max(0) as f32));
        absorb(self.backend.set_viewport(rect), "set_viewport")?;
        Ok(())
    }

    fn apply_constant_buffer(
        &mut self,
        res: &mut FrameResources,
        commands: &CommandManager,
        cmd: &ConstantBufferCommand,
    ) -> BackendResult {
        let Some(buffer) = res.user_buffers.get_mut(cmd.buffer.raw() as usize) else {
            tracing::warn!("Unknown constant buffer {}", cmd.buffer);
            return Ok(());
        };
        let handle = buffer.upload(self.backend, commands.constant_data(cmd.data.clone()));
        let bound = handle.and_then(|handle| {
            self.bindings
                .bind_constant_buffer(self.backend, cmd.stage, cmd.slot as usize, handle)
        });
        absorb(bound.map(|issued| self.count_resource_bind(issued)), "bind_constant_buffer")?;
        Ok(())
    }
}

/// `Ok(true)` on success, `Ok(false)` after logging a recoverable failure,
/// `Err` on device loss.
fn absorb(result: BackendResult, what: &str) -> BackendResult<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_fatal() => {
            tracing::error!("{} failed: {}", what, e);
            Err(e)
        }
        Err(e) => {
            tracing::error!("{} failed: {}", what, e);
            Ok(false)
        }
    }
}
