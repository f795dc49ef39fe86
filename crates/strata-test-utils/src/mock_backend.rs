//! Recording implementation of [`RenderBackend2D`].

use parking_lot::Mutex;
use strata_render::{
    BackendError, BackendResult, BufferHandle, BufferKind, PixelShaderId, RenderBackend2D, ShaderStage,
    StandardShaders2D, TextureId, Vertex2D, VertexShaderId, WriteMode,
    state::{BlendState, DepthStencilChanges, DepthStencilState, RasterizerChanges, RasterizerState, SamplerState},
    strata_core::geometry::{Rect, Size},
};

/// One backend call, in the order the renderer issued it.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    CreateBuffer {
        kind: BufferKind,
        size: u64,
    },
    WriteBuffer {
        buffer: BufferHandle,
        offset: u64,
        size: usize,
        mode: WriteMode,
    },
    SetVertexIndexBuffers {
        vertices: BufferHandle,
        indices: BufferHandle,
    },
    BindBlendState(BlendState),
    BindRasterizerState {
        state: RasterizerState,
        changes: RasterizerChanges,
    },
    BindDepthStencilState {
        state: DepthStencilState,
        changes: DepthStencilChanges,
    },
    BindSamplerState {
        stage: ShaderStage,
        slot: u32,
        state: SamplerState,
    },
    BindTexture {
        stage: ShaderStage,
        slot: u32,
        texture: TextureId,
    },
    BindVertexShader(VertexShaderId),
    BindPixelShader(PixelShaderId),
    BindConstantBuffer {
        stage: ShaderStage,
        slot: u32,
        buffer: BufferHandle,
    },
    SetScissorRect(Rect<i32>),
    SetViewport(Rect<i32>),
    DrawIndexed {
        index_count: u32,
        start_index: u32,
        base_vertex: u32,
    },
    Draw {
        vertex_count: u32,
    },
    Submit,
    Present,
}

impl BackendCall {
    /// Fixed-function state binds, as counted by the renderer's state cache.
    pub fn is_state_bind(&self) -> bool {
        matches!(
            self,
            Self::BindBlendState(_)
                | Self::BindRasterizerState { .. }
                | Self::BindDepthStencilState { .. }
                | Self::BindSamplerState { .. }
        )
    }

    pub fn is_draw(&self) -> bool {
        matches!(self, Self::DrawIndexed { .. } | Self::Draw { .. })
    }
}

/// A draw as the mock saw it, with the resources bound at the time.
#[derive(Debug, Clone, PartialEq)]
pub struct MockDraw {
    pub triangles: Vec<[Vertex2D; 3]>,
    /// Pixel texture slot 0
    pub texture: Option<TextureId>,
    pub vertex_shader: VertexShaderId,
    pub pixel_shader: PixelShaderId,
    pub blend: BlendState,
    pub scissor: Rect<i32>,
    pub viewport: Rect<i32>,
}

#[derive(Debug, Clone)]
struct MockBuffer {
    kind: BufferKind,
    data: Vec<u8>,
}

#[derive(Debug)]
struct MockState {
    calls: Vec<BackendCall>,
    buffers: Vec<MockBuffer>,
    /// `false` entries are textures that were forgotten
    textures: Vec<bool>,
    vertex_shaders: u32,
    pixel_shaders: u32,
    device_lost: bool,
    failing_blend: Option<BlendState>,
    /// Buffer writes still to reject
    failing_writes: u32,
    geometry: Option<(BufferHandle, BufferHandle)>,
    texture: Option<TextureId>,
    vertex_shader: VertexShaderId,
    pixel_shader: PixelShaderId,
    blend: BlendState,
    scissor: Rect<i32>,
    viewport: Rect<i32>,
    draws: Vec<MockDraw>,
}

/// A backend that records instead of rendering.
///
/// Texture 0 is the fallback texture. Vertex shader 0 and pixel shaders 0 and
/// 1 are the standard shaders.
///
/// # Failure Injection
///
/// - [`fail_blend_state`](Self::fail_blend_state) rejects one blend state with
///   [`BackendError::StateCreation`]
/// - [`fail_next_write`](Self::fail_next_write) rejects the next buffer write
///   with [`BackendError::OutOfMemory`]
/// - [`set_device_lost`](Self::set_device_lost) makes every call fail with
///   [`BackendError::DeviceLost`]
/// - [`restore_device`](Self::restore_device) simulates a new device: all
///   buffers created so far become invalid
pub struct MockBackend2D {
    size: Size<u32>,
    state: Mutex<MockState>,
}

const STANDARD: StandardShaders2D = StandardShaders2D {
    sprite_vs: VertexShaderId(0),
    shape_ps: PixelShaderId(0),
    texture_ps: PixelShaderId(1),
};

impl MockBackend2D {
    pub fn new() -> Self {
        Self::with_render_target_size(Size::new(1280, 720))
    }

    pub fn with_render_target_size(size: Size<u32>) -> Self {
        Self {
            size,
            state: Mutex::new(MockState {
                calls: Vec::new(),
                buffers: Vec::new(),
                textures: vec![true],
                vertex_shaders: 1,
                pixel_shaders: 2,
                device_lost: false,
                failing_blend: None,
                failing_writes: 0,
                geometry: None,
                texture: None,
                vertex_shader: STANDARD.sprite_vs,
                pixel_shader: STANDARD.shape_ps,
                blend: BlendState::DEFAULT_2D,
                scissor: Rect::from_size(size),
                viewport: Rect::from_size(size),
                draws: Vec::new(),
            }),
        }
    }

    /// Register a new valid texture.
    pub fn add_texture(&self) -> TextureId {
        let mut state = self.state.lock();
        state.textures.push(true);
        TextureId((state.textures.len() - 1) as u32)
    }

    /// Make `texture` invalid, as if it was destroyed.
    pub fn forget_texture(&self, texture: TextureId) {
        if let Some(valid) = self.state.lock().textures.get_mut(texture.raw() as usize) {
            *valid = false;
        }
    }

    pub fn add_vertex_shader(&self) -> VertexShaderId {
        let mut state = self.state.lock();
        state.vertex_shaders += 1;
        VertexShaderId(state.vertex_shaders - 1)
    }

    pub fn add_pixel_shader(&self) -> PixelShaderId {
        let mut state = self.state.lock();
        state.pixel_shaders += 1;
        PixelShaderId(state.pixel_shaders - 1)
    }

    /// Reject binds of exactly `blend`. `None` accepts everything again.
    pub fn fail_blend_state(&self, blend: Option<BlendState>) {
        self.state.lock().failing_blend = blend;
    }

    /// Reject the next `write_buffer` call. Calls stack.
    pub fn fail_next_write(&self) {
        self.state.lock().failing_writes += 1;
    }

    pub fn set_device_lost(&self, lost: bool) {
        self.state.lock().device_lost = lost;
    }

    /// Come back from device loss with no buffers.
    pub fn restore_device(&self) {
        let mut state = self.state.lock();
        state.device_lost = false;
        state.buffers.clear();
        state.geometry = None;
    }

    /// Get a copy of all recorded calls (for test assertions).
    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().calls.clone()
    }

    /// Clear recorded calls and draws (useful between test steps).
    pub fn clear_calls(&self) {
        let mut state = self.state.lock();
        state.calls.clear();
        state.draws.clear();
    }

    /// Get total number of recorded calls.
    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Count calls matching `predicate`.
    pub fn count_calls(&self, predicate: impl Fn(&BackendCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|call| predicate(call)).count()
    }

    pub fn count_draw_calls(&self) -> usize {
        self.count_calls(BackendCall::is_draw)
    }

    pub fn count_state_binds(&self) -> usize {
        self.count_calls(BackendCall::is_state_bind)
    }

    pub fn count_blend_binds(&self) -> usize {
        self.count_calls(|call| matches!(call, BackendCall::BindBlendState(_)))
    }

    pub fn count_scissor_binds(&self) -> usize {
        self.count_calls(|call| matches!(call, BackendCall::SetScissorRect(_)))
    }

    /// Texture binds of `texture` to any slot.
    pub fn count_texture_binds(&self, texture: TextureId) -> usize {
        self.count_calls(|call| matches!(call, BackendCall::BindTexture { texture: t, .. } if *t == texture))
    }

    pub fn count_buffer_creates(&self) -> usize {
        self.count_calls(|call| matches!(call, BackendCall::CreateBuffer { .. }))
    }

    pub fn count_buffer_writes(&self) -> usize {
        self.count_calls(|call| matches!(call, BackendCall::WriteBuffer { .. }))
    }

    pub fn draws(&self) -> Vec<MockDraw> {
        self.state.lock().draws.clone()
    }

    /// Triangles of every indexed draw, in draw order.
    pub fn drawn_triangles(&self) -> Vec<[Vertex2D; 3]> {
        self.state
            .lock()
            .draws
            .iter()
            .flat_map(|draw| draw.triangles.iter().copied())
            .collect()
    }

    /// Bytes last written to `buffer`.
    pub fn buffer_contents(&self, buffer: BufferHandle) -> Option<Vec<u8>> {
        self.state
            .lock()
            .buffers
            .get(buffer.raw() as usize)
            .map(|buffer| buffer.data.clone())
    }

    /// Record `call`, failing first if the device is lost.
    fn record(&self, call: BackendCall) -> BackendResult<parking_lot::MutexGuard<'_, MockState>> {
        let mut state = self.state.lock();
        if state.device_lost {
            return Err(BackendError::DeviceLost("mock device lost".to_string()));
        }
        state.calls.push(call);
        Ok(state)
    }
}

impl Default for MockBackend2D {
    fn default() -> Self {
        Self::new()
    }
}

impl MockState {
    fn buffer(&self, handle: BufferHandle, kind: BufferKind) -> BackendResult<&MockBuffer> {
        match self.buffers.get(handle.raw() as usize) {
            Some(buffer) if buffer.kind == kind => Ok(buffer),
            Some(buffer) => Err(BackendError::InvalidHandle(format!(
                "{} is a {:?} buffer, expected {:?}",
                handle, buffer.kind, kind
            ))),
            None => Err(BackendError::InvalidHandle(handle.to_string())),
        }
    }

    fn triangles(&self, index_count: u32, start_index: u32, base_vertex: u32) -> BackendResult<Vec<[Vertex2D; 3]>> {
        let (vertices, indices) = self
            .geometry
            .ok_or_else(|| BackendError::InvalidHandle("no vertex/index buffers bound".to_string()))?;
        let vertices = &self.buffer(vertices, BufferKind::Vertex)?.data;
        let indices = &self.buffer(indices, BufferKind::Index)?.data;

        let vertex_size = std::mem::size_of::<Vertex2D>();
        let fetch = |i: u32| -> BackendResult<Vertex2D> {
            let at = (start_index + i) as usize * 2;
            let index = indices
                .get(at..at + 2)
                .map(|bytes| u16::from_le_bytes([bytes[0], bytes[1]]))
                .ok_or_else(|| BackendError::InvalidHandle(format!("index {} out of range", start_index + i)))?;
            let at = (base_vertex + u32::from(index)) as usize * vertex_size;
            vertices
                .get(at..at + vertex_size)
                .map(bytemuck::pod_read_unaligned::<Vertex2D>)
                .ok_or_else(|| BackendError::InvalidHandle(format!("vertex {} out of range", base_vertex + u32::from(index))))
        };

        (0..index_count / 3)
            .map(|t| Ok([fetch(t * 3)?, fetch(t * 3 + 1)?, fetch(t * 3 + 2)?]))
            .collect()
    }

    fn push_draw(&mut self, triangles: Vec<[Vertex2D; 3]>) {
        let draw = MockDraw {
            triangles,
            texture: self.texture,
            vertex_shader: self.vertex_shader,
            pixel_shader: self.pixel_shader,
            blend: self.blend,
            scissor: self.scissor,
            viewport: self.viewport,
        };
        self.draws.push(draw);
    }
}

impl RenderBackend2D for MockBackend2D {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn render_target_size(&self) -> Size<u32> {
        self.size
    }

    fn standard_shaders(&self) -> StandardShaders2D {
        STANDARD
    }

    fn fallback_texture(&self) -> TextureId {
        TextureId(0)
    }

    fn has_texture(&self, texture: TextureId) -> bool {
        self.state
            .lock()
            .textures
            .get(texture.raw() as usize)
            .copied()
            .unwrap_or(false)
    }

    fn has_vertex_shader(&self, shader: VertexShaderId) -> bool {
        shader.raw() < self.state.lock().vertex_shaders
    }

    fn has_pixel_shader(&self, shader: PixelShaderId) -> bool {
        shader.raw() < self.state.lock().pixel_shaders
    }

    fn create_buffer(&self, kind: BufferKind, size: u64) -> BackendResult<BufferHandle> {
        let mut state = self.record(BackendCall::CreateBuffer { kind, size })?;
        state.buffers.push(MockBuffer {
            kind,
            data: vec![0; size as usize],
        });
        Ok(BufferHandle((state.buffers.len() - 1) as u32))
    }

    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8], mode: WriteMode) -> BackendResult {
        let mut state = self.record(BackendCall::WriteBuffer {
            buffer,
            offset,
            size: data.len(),
            mode,
        })?;
        if state.failing_writes > 0 {
            state.failing_writes -= 1;
            return Err(BackendError::OutOfMemory(format!("mock write to {} rejected", buffer)));
        }
        let target = state
            .buffers
            .get_mut(buffer.raw() as usize)
            .ok_or_else(|| BackendError::InvalidHandle(buffer.to_string()))?;
        let start = offset as usize;
        let end = start + data.len();
        if end > target.data.len() {
            return Err(BackendError::InvalidHandle(format!(
                "write of {}..{} outside {} ({} bytes)",
                start,
                end,
                buffer,
                target.data.len()
            )));
        }
        target.data[start..end].copy_from_slice(data);
        Ok(())
    }

    fn set_vertex_index_buffers(&self, vertices: BufferHandle, indices: BufferHandle) -> BackendResult {
        let mut state = self.record(BackendCall::SetVertexIndexBuffers { vertices, indices })?;
        state.buffer(vertices, BufferKind::Vertex)?;
        state.buffer(indices, BufferKind::Index)?;
        state.geometry = Some((vertices, indices));
        Ok(())
    }

    fn bind_blend_state(&self, blend: &BlendState) -> BackendResult {
        let mut state = self.record(BackendCall::BindBlendState(*blend))?;
        if state.failing_blend == Some(*blend) {
            return Err(BackendError::StateCreation(format!("mock rejects {:?}", blend)));
        }
        state.blend = *blend;
        Ok(())
    }

    fn bind_rasterizer_state(&self, state: &RasterizerState, changes: RasterizerChanges) -> BackendResult {
        self.record(BackendCall::BindRasterizerState { state: *state, changes })?;
        Ok(())
    }

    fn bind_depth_stencil_state(&self, state: &DepthStencilState, changes: DepthStencilChanges) -> BackendResult {
        self.record(BackendCall::BindDepthStencilState { state: *state, changes })?;
        Ok(())
    }

    fn bind_sampler_state(&self, stage: ShaderStage, slot: u32, state: &SamplerState) -> BackendResult {
        self.record(BackendCall::BindSamplerState {
            stage,
            slot,
            state: *state,
        })?;
        Ok(())
    }

    fn bind_texture(&self, stage: ShaderStage, slot: u32, texture: TextureId) -> BackendResult {
        let mut state = self.record(BackendCall::BindTexture { stage, slot, texture })?;
        if !state.textures.get(texture.raw() as usize).copied().unwrap_or(false) {
            return Err(BackendError::InvalidHandle(texture.to_string()));
        }
        if stage == ShaderStage::Pixel && slot == 0 {
            state.texture = Some(texture);
        }
        Ok(())
    }

    fn bind_vertex_shader(&self, shader: VertexShaderId) -> BackendResult {
        let mut state = self.record(BackendCall::BindVertexShader(shader))?;
        if shader.raw() >= state.vertex_shaders {
            return Err(BackendError::InvalidHandle(shader.to_string()));
        }
        state.vertex_shader = shader;
        Ok(())
    }

    fn bind_pixel_shader(&self, shader: PixelShaderId) -> BackendResult {
        let mut state = self.record(BackendCall::BindPixelShader(shader))?;
        if shader.raw() >= state.pixel_shaders {
            return Err(BackendError::InvalidHandle(shader.to_string()));
        }
        state.pixel_shader = shader;
        Ok(())
    }

    fn bind_constant_buffer(&self, stage: ShaderStage, slot: u32, buffer: BufferHandle) -> BackendResult {
        let state = self.record(BackendCall::BindConstantBuffer { stage, slot, buffer })?;
        state.buffer(buffer, BufferKind::Constant)?;
        Ok(())
    }

    fn set_scissor_rect(&self, rect: Rect<i32>) -> BackendResult {
        self.record(BackendCall::SetScissorRect(rect))?.scissor = rect;
        Ok(())
    }

    fn set_viewport(&self, rect: Rect<i32>) -> BackendResult {
        self.record(BackendCall::SetViewport(rect))?.viewport = rect;
        Ok(())
    }

    fn draw_indexed(&self, index_count: u32, start_index: u32, base_vertex: u32) -> BackendResult {
        let mut state = self.record(BackendCall::DrawIndexed {
            index_count,
            start_index,
            base_vertex,
        })?;
        let triangles = state.triangles(index_count, start_index, base_vertex)?;
        state.push_draw(triangles);
        Ok(())
    }

    fn draw(&self, vertex_count: u32) -> BackendResult {
        self.record(BackendCall::Draw { vertex_count })?.push_draw(Vec::new());
        Ok(())
    }

    fn submit(&self) -> BackendResult {
        self.record(BackendCall::Submit)?;
        Ok(())
    }

    fn present(&self) -> BackendResult {
        let mut state = self.record(BackendCall::Present)?;
        state.scissor = Rect::from_size(self.size);
        state.viewport = Rect::from_size(self.size);
        Ok(())
    }
}
