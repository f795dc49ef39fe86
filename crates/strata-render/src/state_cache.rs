//! Shadow copies of what is bound on the backend, so redundant binds never
//! reach it.

use strata_core::profiling::profile_function;

use crate::{
    backend::{BackendResult, RenderBackend2D},
    state::RenderStateSnapshot,
    types::{
        BufferHandle, MAX_CONSTANT_BUFFER_SLOTS, MAX_TEXTURE_SLOTS, PixelShaderId, ShaderStage, TextureId,
        VertexShaderId,
    },
};

/// Fixed-function state believed to be bound on the backend.
///
/// Starts at [`RenderStateSnapshot::DEFAULT_2D`], which every backend has bound
/// after creation. Only fields that differ from the shadow copy are sent, and
/// the shadow copy is only updated once the backend accepted the change.
#[derive(Debug, Clone)]
pub struct RenderStateCache {
    current: RenderStateSnapshot,
}

impl Default for RenderStateCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderStateCache {
    pub fn new() -> Self {
        Self {
            current: RenderStateSnapshot::DEFAULT_2D,
        }
    }

    pub fn current(&self) -> &RenderStateSnapshot {
        &self.current
    }

    /// Forget the shadow copy after the backend was reinitialised.
    pub fn reset(&mut self) {
        self.current = RenderStateSnapshot::DEFAULT_2D;
    }

    /// Bring the backend to `requested`, returning the number of binds issued.
    ///
    /// Stops at the first failing bind; fields bound before it stay recorded.
    pub fn set(&mut self, backend: &dyn RenderBackend2D, requested: &RenderStateSnapshot) -> BackendResult<u32> {
        if *requested == self.current {
            return Ok(0);
        }
        profile_function!();
        let mut issued = 0;

        if requested.blend != self.current.blend {
            backend.bind_blend_state(&requested.blend)?;
            self.current.blend = requested.blend;
            issued += 1;
        }

        let raster_changes = requested.rasterizer.diff(&self.current.rasterizer);
        if !raster_changes.is_empty() {
            backend.bind_rasterizer_state(&requested.rasterizer, raster_changes)?;
            self.current.rasterizer = requested.rasterizer;
            issued += 1;
        }

        let depth_changes = requested.depth_stencil.diff(&self.current.depth_stencil);
        if !depth_changes.is_empty() {
            backend.bind_depth_stencil_state(&requested.depth_stencil, depth_changes)?;
            self.current.depth_stencil = requested.depth_stencil;
            issued += 1;
        }

        for stage in [ShaderStage::Vertex, ShaderStage::Pixel] {
            let wanted = requested.samplers(stage);
            for (slot, state) in wanted.iter().enumerate() {
                if self.current.samplers(stage)[slot] != *state {
                    backend.bind_sampler_state(stage, slot as u32, state)?;
                    self.current.samplers_mut(stage)[slot] = *state;
                    issued += 1;
                }
            }
        }

        Ok(issued)
    }
}

/// Shader, texture and constant buffer bindings made during one replay.
///
/// Unlike [`RenderStateCache`] this starts empty every replay, so the first
/// use of each binding is always sent.
#[derive(Debug, Clone, Default)]
pub struct ResourceBindingCache {
    vertex_shader: Option<VertexShaderId>,
    pixel_shader: Option<PixelShaderId>,
    textures: [Option<TextureId>; MAX_TEXTURE_SLOTS],
    vs_constants: [Option<BufferHandle>; MAX_CONSTANT_BUFFER_SLOTS],
    ps_constants: [Option<BufferHandle>; MAX_CONSTANT_BUFFER_SLOTS],
}

impl ResourceBindingCache {
    /// Returns whether a bind was issued.
    pub fn bind_vertex_shader(&mut self, backend: &dyn RenderBackend2D, shader: VertexShaderId) -> BackendResult<bool> {
        if self.vertex_shader == Some(shader) {
            return Ok(false);
        }
        backend.bind_vertex_shader(shader)?;
        self.vertex_shader = Some(shader);
        Ok(true)
    }

    pub fn bind_pixel_shader(&mut self, backend: &dyn RenderBackend2D, shader: PixelShaderId) -> BackendResult<bool> {
        if self.pixel_shader == Some(shader) {
            return Ok(false);
        }
        backend.bind_pixel_shader(shader)?;
        self.pixel_shader = Some(shader);
        Ok(true)
    }

    pub fn bind_texture(&mut self, backend: &dyn RenderBackend2D, slot: usize, texture: TextureId) -> BackendResult<bool> {
        let Some(bound) = self.textures.get_mut(slot) else {
            return Ok(false);
        };
        if *bound == Some(texture) {
            return Ok(false);
        }
        backend.bind_texture(ShaderStage::Pixel, slot as u32, texture)?;
        *bound = Some(texture);
        Ok(true)
    }

    pub fn bind_constant_buffer(
        &mut self,
        backend: &dyn RenderBackend2D,
        stage: ShaderStage,
        slot: usize,
        buffer: BufferHandle,
    ) -> BackendResult<bool> {
        let slots = match stage {
            ShaderStage::Vertex => &mut self.vs_constants,
            ShaderStage::Pixel => &mut self.ps_constants,
        };
        let Some(bound) = slots.get_mut(slot) else {
            return Ok(false);
        };
        if *bound == Some(buffer) {
            return Ok(false);
        }
        backend.bind_constant_buffer(stage, slot as u32, buffer)?;
        *bound = Some(buffer);
        Ok(true)
    }
}
