//! [`RenderBackend2D`] implemented on wgpu.
//!
//! Binds are cheap bookkeeping: the backend keeps the bound state and
//! resolves a pipeline and bind groups when a draw is recorded. Draws are
//! buffered and encoded into a single render pass on [`submit`](RenderBackend2D::submit).
//!
//! The render target is supplied by the caller, which also owns presentation
//! of surface textures:
//!
//! ```rust,no_run
//! use strata_render::{Renderer2D, Renderer2DConfig, wgpu_backend::{GraphicsContext, RenderTarget, WgpuBackend2D}};
//! use std::sync::Arc;
//!
//! # fn target() -> RenderTarget { unimplemented!() }
//! let ctx = GraphicsContext::new_owned_sync().unwrap();
//! let backend = Arc::new(WgpuBackend2D::new(ctx, target()).unwrap());
//! let mut renderer = Renderer2D::new(backend.clone(), Renderer2DConfig::default()).unwrap();
//! ```

mod context;
mod pipeline;
mod sampler_cache;

use std::sync::Arc;

use parking_lot::Mutex;
use strata_core::{
    alloc::{HashMap, HashSet},
    geometry::{Rect, Size},
    profiling::{profile_function, profile_scope},
};

pub use context::{GraphicsContext, GraphicsContextDescriptor, GraphicsContextError};
pub use pipeline::DEPTH_FORMAT;
pub use sampler_cache::SamplerCache;

use crate::{
    backend::{BackendResult, RenderBackend2D},
    color::Color,
    error::BackendError,
    state::{
        BlendState, DepthStencilChanges, DepthStencilState, FillMode, RasterizerChanges, RasterizerState, SamplerState,
    },
    types::{BufferHandle, BufferKind, PixelShaderId, ShaderStage, StandardShaders2D, TextureId, VertexShaderId, WriteMode},
};
use pipeline::{BindLayouts, PipelineCache, PipelineKey, ShaderEntry};

const SPRITE_SHADER: &str = include_str!("shaders/sprite2d.wgsl");

/// Size of the zeroed buffer bound to unused user constant buffer slots.
const EMPTY_UNIFORM_SIZE: u64 = 256;

/// Where the backend draws.
pub struct RenderTarget {
    pub view: wgpu::TextureView,
    pub size: Size<u32>,
    pub format: wgpu::TextureFormat,
}

#[derive(Debug, Clone, Copy)]
enum DrawKind {
    Indexed {
        index_count: u32,
        start_index: u32,
        base_vertex: u32,
    },
    NonIndexed {
        vertex_count: u32,
    },
}

/// A draw with everything it needs resolved, waiting for the next pass.
struct DrawOp {
    pipeline: Arc<wgpu::RenderPipeline>,
    bind_groups: [Arc<wgpu::BindGroup>; 3],
    geometry: Option<(Arc<wgpu::Buffer>, Arc<wgpu::Buffer>)>,
    viewport: Rect<i32>,
    scissor: Rect<i32>,
    kind: DrawKind,
}

struct GpuBuffer {
    buffer: Arc<wgpu::Buffer>,
    size: u64,
}

#[derive(Debug, Clone, Copy)]
struct BoundState {
    blend: BlendState,
    rasterizer: RasterizerState,
    depth_stencil: DepthStencilState,
    /// Pixel sampler slot 0
    sampler: SamplerState,
    /// Pixel texture slot 0
    texture: Option<TextureId>,
    vs: VertexShaderId,
    ps: PixelShaderId,
    /// Slot 0 of the vertex and pixel stage
    constants: [Option<BufferHandle>; 2],
    /// Slot 1 of the vertex and pixel stage
    user: [Option<BufferHandle>; 2],
    geometry: Option<(BufferHandle, BufferHandle)>,
    scissor: Rect<i32>,
    viewport: Rect<i32>,
}

impl BoundState {
    fn new(standard: StandardShaders2D, size: Size<u32>) -> Self {
        Self {
            blend: BlendState::DEFAULT_2D,
            rasterizer: RasterizerState::DEFAULT_2D,
            depth_stencil: DepthStencilState::DEFAULT_2D,
            sampler: SamplerState::DEFAULT_2D,
            texture: None,
            vs: standard.sprite_vs,
            ps: standard.shape_ps,
            constants: [None; 2],
            user: [None; 2],
            geometry: None,
            scissor: Rect::from_size(size),
            viewport: Rect::from_size(size),
        }
    }
}

fn stage_index(stage: ShaderStage) -> usize {
    match stage {
        ShaderStage::Vertex => 0,
        ShaderStage::Pixel => 1,
    }
}

struct BackendState {
    target: RenderTarget,
    depth_view: wgpu::TextureView,
    clear_color: Option<Color>,
    /// Set until the first pass of the frame has been encoded
    frame_start: bool,
    buffers: Vec<GpuBuffer>,
    textures: Vec<Option<wgpu::TextureView>>,
    vertex_shaders: Vec<ShaderEntry>,
    pixel_shaders: Vec<ShaderEntry>,
    pipelines: PipelineCache,
    constant_groups: HashMap<(BufferHandle, BufferHandle), Arc<wgpu::BindGroup>>,
    texture_groups: HashMap<(TextureId, SamplerState), Arc<wgpu::BindGroup>>,
    user_groups: HashMap<[Option<BufferHandle>; 2], Arc<wgpu::BindGroup>>,
    bound: BoundState,
    pending: Vec<DrawOp>,
    /// Buffers read by `pending`
    referenced: HashSet<BufferHandle>,
}

impl BackendState {
    fn buffer(&self, handle: BufferHandle) -> BackendResult<&GpuBuffer> {
        self.buffers
            .get(handle.raw() as usize)
            .ok_or_else(|| BackendError::InvalidHandle(handle.to_string()))
    }

    fn texture(&self, texture: TextureId) -> Option<&wgpu::TextureView> {
        self.textures.get(texture.raw() as usize).and_then(Option::as_ref)
    }
}

pub struct WgpuBackend2D {
    context: Arc<GraphicsContext>,
    layouts: BindLayouts,
    pipeline_layout: wgpu::PipelineLayout,
    samplers: SamplerCache,
    standard: StandardShaders2D,
    fallback_texture: TextureId,
    empty_uniform: Arc<wgpu::Buffer>,
    state: Mutex<BackendState>,
}

impl WgpuBackend2D {
    pub fn new(context: Arc<GraphicsContext>, target: RenderTarget) -> BackendResult<Self> {
        let device = &context.device;
        let layouts = BindLayouts::new(device);
        let pipeline_layout = layouts.pipeline_layout(device);

        let module = Arc::new(compile_module(device, "Renderer2D Sprite Shader", SPRITE_SHADER)?);
        let entry = |entry_point: &str| ShaderEntry {
            module: Arc::clone(&module),
            entry_point: entry_point.to_string(),
        };
        let standard = StandardShaders2D {
            sprite_vs: VertexShaderId(0),
            shape_ps: PixelShaderId(0),
            texture_ps: PixelShaderId(1),
        };

        let empty_uniform = Arc::new(device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Renderer2D Empty Uniform"),
            size: EMPTY_UNIFORM_SIZE,
            usage: wgpu::BufferUsages::UNIFORM,
            mapped_at_creation: false,
        }));

        let depth_view = create_depth_view(device, target.size);
        let bound = BoundState::new(standard, target.size);
        let backend = Self {
            layouts,
            pipeline_layout,
            samplers: SamplerCache::new(),
            standard,
            fallback_texture: TextureId(0),
            empty_uniform,
            state: Mutex::new(BackendState {
                target,
                depth_view,
                clear_color: Some(Color::BLACK),
                frame_start: true,
                buffers: Vec::new(),
                textures: Vec::new(),
                vertex_shaders: vec![entry("vs_sprite")],
                pixel_shaders: vec![entry("ps_shape"), entry("ps_texture")],
                pipelines: PipelineCache::default(),
                constant_groups: HashMap::default(),
                texture_groups: HashMap::default(),
                user_groups: HashMap::default(),
                bound,
                pending: Vec::new(),
                referenced: HashSet::default(),
            }),
            context,
        };

        let fallback = backend.create_texture_rgba8(Size::new(1, 1), &[255, 255, 255, 255])?;
        debug_assert_eq!(fallback, backend.fallback_texture);
        tracing::info!("wgpu 2D backend ready");
        Ok(backend)
    }

    pub fn context(&self) -> &Arc<GraphicsContext> {
        &self.context
    }

    /// Switch render targets. Pending draws go to the previous target first.
    ///
    /// The next pass clears the new target, and viewport and scissor reset to
    /// cover it.
    pub fn set_target(&self, target: RenderTarget) -> BackendResult {
        self.check_lost()?;
        let mut st = self.state.lock();
        self.encode_pending(&mut st);
        if target.size != st.target.size {
            st.depth_view = create_depth_view(&self.context.device, target.size);
        }
        st.bound.viewport = Rect::from_size(target.size);
        st.bound.scissor = Rect::from_size(target.size);
        st.target = target;
        st.frame_start = true;
        Ok(())
    }

    /// Colour the first pass of each frame clears to. `None` keeps the
    /// previous contents.
    pub fn set_clear_color(&self, color: Option<Color>) {
        self.state.lock().clear_color = color;
    }

    /// Upload tightly packed RGBA8 pixels as a new sRGB texture.
    pub fn create_texture_rgba8(&self, size: Size<u32>, pixels: &[u8]) -> BackendResult<TextureId> {
        self.check_lost()?;
        let expected = size.width as usize * size.height as usize * 4;
        if size.width == 0 || size.height == 0 || pixels.len() != expected {
            return Err(BackendError::Unsupported(format!(
                "texture data of {} bytes for {}x{} RGBA8",
                pixels.len(),
                size.width,
                size.height
            )));
        }

        let extent = wgpu::Extent3d {
            width: size.width,
            height: size.height,
            depth_or_array_layers: 1,
        };
        let texture = self.context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Renderer2D Texture"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.context.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * size.width),
                rows_per_image: Some(size.height),
            },
            extent,
        );
        Ok(self.register_texture(texture.create_view(&wgpu::TextureViewDescriptor::default())))
    }

    /// Make an existing view available to draws. The view must be a filterable
    /// 2D float texture.
    pub fn register_texture(&self, view: wgpu::TextureView) -> TextureId {
        let mut st = self.state.lock();
        st.textures.push(Some(view));
        TextureId((st.textures.len() - 1) as u32)
    }

    /// Release a texture. Draws referencing it afterwards receive the fallback.
    pub fn remove_texture(&self, texture: TextureId) -> bool {
        if texture == self.fallback_texture {
            tracing::warn!("The fallback texture cannot be removed");
            return false;
        }
        let mut st = self.state.lock();
        let removed = st
            .textures
            .get_mut(texture.raw() as usize)
            .and_then(Option::take)
            .is_some();
        if removed {
            st.texture_groups.retain(|(id, _), _| *id != texture);
            if st.bound.texture == Some(texture) {
                st.bound.texture = None;
            }
        }
        removed
    }

    /// Compile a WGSL vertex shader. It must accept [`Vertex2D`](crate::Vertex2D)
    /// at locations 0 to 2 unless it is only used for vertex-buffer-less draws,
    /// and follow the bind group layout of the standard sprite shader.
    pub fn register_vertex_shader(&self, source: &str, entry_point: &str) -> BackendResult<VertexShaderId> {
        self.check_lost()?;
        let module = compile_module(&self.context.device, "Renderer2D Custom VS", source)?;
        let mut st = self.state.lock();
        st.vertex_shaders.push(ShaderEntry {
            module: Arc::new(module),
            entry_point: entry_point.to_string(),
        });
        Ok(VertexShaderId((st.vertex_shaders.len() - 1) as u32))
    }

    /// Compile a WGSL fragment shader writing a single colour target.
    pub fn register_pixel_shader(&self, source: &str, entry_point: &str) -> BackendResult<PixelShaderId> {
        self.check_lost()?;
        let module = compile_module(&self.context.device, "Renderer2D Custom PS", source)?;
        let mut st = self.state.lock();
        st.pixel_shaders.push(ShaderEntry {
            module: Arc::new(module),
            entry_point: entry_point.to_string(),
        });
        Ok(PixelShaderId((st.pixel_shaders.len() - 1) as u32))
    }

    pub fn pipeline_count(&self) -> usize {
        self.state.lock().pipelines.len()
    }

    fn check_lost(&self) -> BackendResult {
        if self.context.is_lost() {
            return Err(BackendError::DeviceLost("wgpu device lost".to_string()));
        }
        Ok(())
    }

    fn record_draw(&self, kind: DrawKind) -> BackendResult {
        self.check_lost()?;
        let mut guard = self.state.lock();
        let st = &mut *guard;
        let bound = st.bound;

        let viewport = bound.viewport.clamp_to(st.target.size);
        let scissor = if bound.rasterizer.scissor_enable {
            bound.scissor.intersect(&viewport)
        } else {
            viewport
        };
        if !viewport.has_area() || !scissor.has_area() {
            tracing::trace!("Draw clipped away entirely");
            return Ok(());
        }

        let vertex_input = matches!(kind, DrawKind::Indexed { .. });
        let vs = st
            .vertex_shaders
            .get(bound.vs.raw() as usize)
            .ok_or_else(|| BackendError::InvalidHandle(bound.vs.to_string()))?;
        let ps = st
            .pixel_shaders
            .get(bound.ps.raw() as usize)
            .ok_or_else(|| BackendError::InvalidHandle(bound.ps.to_string()))?;
        let key = PipelineKey {
            vs: bound.vs,
            ps: bound.ps,
            blend: bound.blend,
            fill_mode: bound.rasterizer.fill_mode,
            cull_mode: bound.rasterizer.cull_mode,
            depth_bias: bound.rasterizer.depth_bias,
            depth: bound.depth_stencil,
            vertex_input,
            format: st.target.format,
        };
        let pipeline = st
            .pipelines
            .get_or_create(&self.context.device, &self.pipeline_layout, key, vs, ps)?;

        let bind_groups = [
            self.constant_group(st)?,
            self.texture_group(st)?,
            self.user_group(st)?,
        ];

        let geometry = if vertex_input {
            let (vertices, indices) = bound
                .geometry
                .ok_or_else(|| BackendError::InvalidHandle("no vertex/index buffers bound".to_string()))?;
            let pair = (
                Arc::clone(&st.buffer(vertices)?.buffer),
                Arc::clone(&st.buffer(indices)?.buffer),
            );
            st.referenced.extend([vertices, indices]);
            Some(pair)
        } else {
            None
        };
        st.referenced
            .extend(bound.constants.iter().chain(bound.user.iter()).flatten().copied());

        st.pending.push(DrawOp {
            pipeline,
            bind_groups,
            geometry,
            viewport,
            scissor,
            kind,
        });
        Ok(())
    }

    fn constant_group(&self, st: &mut BackendState) -> BackendResult<Arc<wgpu::BindGroup>> {
        let [Some(vs), Some(ps)] = st.bound.constants else {
            return Err(BackendError::InvalidHandle("engine constants not bound".to_string()));
        };
        if let Some(group) = st.constant_groups.get(&(vs, ps)) {
            return Ok(Arc::clone(group));
        }
        let group = Arc::new(self.context.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Renderer2D Constants"),
            layout: &self.layouts.constants,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: st.buffer(vs)?.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: st.buffer(ps)?.buffer.as_entire_binding(),
                },
            ],
        }));
        st.constant_groups.insert((vs, ps), Arc::clone(&group));
        Ok(group)
    }

    fn texture_group(&self, st: &mut BackendState) -> BackendResult<Arc<wgpu::BindGroup>> {
        let texture = st
            .bound
            .texture
            .filter(|texture| st.texture(*texture).is_some())
            .unwrap_or(self.fallback_texture);
        let key = (texture, st.bound.sampler);
        if let Some(group) = st.texture_groups.get(&key) {
            return Ok(Arc::clone(group));
        }
        let view = st
            .texture(texture)
            .ok_or_else(|| BackendError::InvalidHandle(texture.to_string()))?;
        let sampler = self.samplers.get_or_create(&self.context.device, &st.bound.sampler);
        let group = Arc::new(self.context.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Renderer2D Texture"),
            layout: &self.layouts.texture,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
            ],
        }));
        st.texture_groups.insert(key, Arc::clone(&group));
        Ok(group)
    }

    fn user_group(&self, st: &mut BackendState) -> BackendResult<Arc<wgpu::BindGroup>> {
        let key = st.bound.user;
        if let Some(group) = st.user_groups.get(&key) {
            return Ok(Arc::clone(group));
        }
        let vs = self.uniform_or_empty(st, key[0])?;
        let ps = self.uniform_or_empty(st, key[1])?;
        let group = Arc::new(self.context.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Renderer2D User Constants"),
            layout: &self.layouts.user,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: vs.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: ps.as_entire_binding(),
                },
            ],
        }));
        st.user_groups.insert(key, Arc::clone(&group));
        Ok(group)
    }

    fn uniform_or_empty(&self, st: &BackendState, handle: Option<BufferHandle>) -> BackendResult<Arc<wgpu::Buffer>> {
        match handle {
            Some(handle) => Ok(Arc::clone(&st.buffer(handle)?.buffer)),
            None => Ok(Arc::clone(&self.empty_uniform)),
        }
    }

    /// Encode and submit buffered draws in one render pass.
    ///
    /// The first pass of a frame runs even without draws so the target is
    /// cleared.
    fn encode_pending(&self, st: &mut BackendState) {
        if st.pending.is_empty() && !st.frame_start {
            return;
        }
        profile_function!();
        let ops = std::mem::take(&mut st.pending);
        st.referenced.clear();
        let first = std::mem::replace(&mut st.frame_start, false);

        let color_load = match (first, st.clear_color) {
            (true, Some(color)) => wgpu::LoadOp::Clear(color.to_wgpu()),
            _ => wgpu::LoadOp::Load,
        };
        let depth_load = if first {
            wgpu::LoadOp::Clear(1.0)
        } else {
            wgpu::LoadOp::Load
        };

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Renderer2D Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Renderer2D Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &st.target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: color_load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &st.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: depth_load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            for op in &ops {
                profile_scope!("encode_draw");
                pass.set_pipeline(&op.pipeline);
                for (index, group) in op.bind_groups.iter().enumerate() {
                    pass.set_bind_group(index as u32, &**group, &[]);
                }
                pass.set_viewport(
                    op.viewport.x as f32,
                    op.viewport.y as f32,
                    op.viewport.width as f32,
                    op.viewport.height as f32,
                    0.0,
                    1.0,
                );
                pass.set_scissor_rect(
                    op.scissor.x as u32,
                    op.scissor.y as u32,
                    op.scissor.width as u32,
                    op.scissor.height as u32,
                );
                match op.kind {
                    DrawKind::Indexed {
                        index_count,
                        start_index,
                        base_vertex,
                    } => {
                        if let Some((vertices, indices)) = &op.geometry {
                            pass.set_vertex_buffer(0, vertices.slice(..));
                            pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint16);
                        }
                        pass.draw_indexed(start_index..start_index + index_count, base_vertex as i32, 0..1);
                    }
                    DrawKind::NonIndexed { vertex_count } => pass.draw(0..vertex_count, 0..1),
                }
            }
        }
        self.context.queue.submit(std::iter::once(encoder.finish()));
    }
}

fn compile_module(device: &wgpu::Device, label: &str, source: &str) -> BackendResult<wgpu::ShaderModule> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    match pollster::block_on(device.pop_error_scope()) {
        Some(error) => Err(BackendError::StateCreation(format!("{}: {}", label, error))),
        None => Ok(module),
    }
}

fn create_depth_view(device: &wgpu::Device, size: Size<u32>) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Renderer2D Depth"),
        size: wgpu::Extent3d {
            width: size.width.max(1),
            height: size.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

impl RenderBackend2D for WgpuBackend2D {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn render_target_size(&self) -> Size<u32> {
        self.state.lock().target.size
    }

    fn standard_shaders(&self) -> StandardShaders2D {
        self.standard
    }

    fn fallback_texture(&self) -> TextureId {
        self.fallback_texture
    }

    fn has_texture(&self, texture: TextureId) -> bool {
        self.state.lock().texture(texture).is_some()
    }

    fn has_vertex_shader(&self, shader: VertexShaderId) -> bool {
        (shader.raw() as usize) < self.state.lock().vertex_shaders.len()
    }

    fn has_pixel_shader(&self, shader: PixelShaderId) -> bool {
        (shader.raw() as usize) < self.state.lock().pixel_shaders.len()
    }

    fn create_buffer(&self, kind: BufferKind, size: u64) -> BackendResult<BufferHandle> {
        self.check_lost()?;
        // Writes are padded to 4 bytes; round up so padding always fits.
        let size = size.max(16).next_multiple_of(16);
        let limit = self.context.device.limits().max_buffer_size;
        if size > limit {
            return Err(BackendError::OutOfMemory(format!(
                "{:?} buffer of {} bytes exceeds the device limit of {}",
                kind, size, limit
            )));
        }
        let (label, usage) = match kind {
            BufferKind::Vertex => ("Renderer2D Vertex Buffer", wgpu::BufferUsages::VERTEX),
            BufferKind::Index => ("Renderer2D Index Buffer", wgpu::BufferUsages::INDEX),
            BufferKind::Constant => ("Renderer2D Constant Buffer", wgpu::BufferUsages::UNIFORM),
        };
        let buffer = self.context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut st = self.state.lock();
        st.buffers.push(GpuBuffer {
            buffer: Arc::new(buffer),
            size,
        });
        tracing::debug!("Created {:?} buffer of {} bytes", kind, size);
        Ok(BufferHandle((st.buffers.len() - 1) as u32))
    }

    fn write_buffer(&self, buffer: BufferHandle, offset: u64, data: &[u8], mode: WriteMode) -> BackendResult {
        self.check_lost()?;
        if data.is_empty() {
            return Ok(());
        }
        let mut st = self.state.lock();
        let padded = (data.len() as u64).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT);
        let target = st.buffer(buffer)?;
        if offset % wgpu::COPY_BUFFER_ALIGNMENT != 0 || offset + padded > target.size {
            return Err(BackendError::InvalidHandle(format!(
                "write of {} bytes at {} outside {} ({} bytes)",
                data.len(),
                offset,
                buffer,
                target.size
            )));
        }
        let gpu = Arc::clone(&target.buffer);

        // Queue writes land before the next submission; earlier draws reading
        // this buffer must be submitted first.
        if mode == WriteMode::Discard && st.referenced.contains(&buffer) {
            self.encode_pending(&mut st);
        }

        if padded as usize == data.len() {
            self.context.queue.write_buffer(&gpu, offset, data);
        } else {
            let mut bytes = data.to_vec();
            bytes.resize(padded as usize, 0);
            self.context.queue.write_buffer(&gpu, offset, &bytes);
        }
        Ok(())
    }

    fn set_vertex_index_buffers(&self, vertices: BufferHandle, indices: BufferHandle) -> BackendResult {
        let mut st = self.state.lock();
        st.buffer(vertices)?;
        st.buffer(indices)?;
        st.bound.geometry = Some((vertices, indices));
        Ok(())
    }

    fn bind_blend_state(&self, state: &BlendState) -> BackendResult {
        self.state.lock().bound.blend = *state;
        Ok(())
    }

    fn bind_rasterizer_state(&self, state: &RasterizerState, changes: RasterizerChanges) -> BackendResult {
        if state.fill_mode == FillMode::Wireframe
            && changes.contains(RasterizerChanges::FILL_MODE)
            && !self.context.features().contains(wgpu::Features::POLYGON_MODE_LINE)
        {
            return Err(BackendError::StateCreation(
                "wireframe fill requires POLYGON_MODE_LINE".to_string(),
            ));
        }
        self.state.lock().bound.rasterizer = *state;
        Ok(())
    }

    fn bind_depth_stencil_state(&self, state: &DepthStencilState, _changes: DepthStencilChanges) -> BackendResult {
        self.state.lock().bound.depth_stencil = *state;
        Ok(())
    }

    fn bind_sampler_state(&self, stage: ShaderStage, slot: u32, state: &SamplerState) -> BackendResult {
        if stage == ShaderStage::Pixel && slot == 0 {
            self.state.lock().bound.sampler = *state;
        }
        Ok(())
    }

    fn bind_texture(&self, stage: ShaderStage, slot: u32, texture: TextureId) -> BackendResult {
        let mut st = self.state.lock();
        if st.texture(texture).is_none() {
            return Err(BackendError::InvalidHandle(texture.to_string()));
        }
        if stage == ShaderStage::Pixel && slot == 0 {
            st.bound.texture = Some(texture);
        }
        Ok(())
    }

    fn bind_vertex_shader(&self, shader: VertexShaderId) -> BackendResult {
        let mut st = self.state.lock();
        if shader.raw() as usize >= st.vertex_shaders.len() {
            return Err(BackendError::InvalidHandle(shader.to_string()));
        }
        st.bound.vs = shader;
        Ok(())
    }

    fn bind_pixel_shader(&self, shader: PixelShaderId) -> BackendResult {
        let mut st = self.state.lock();
        if shader.raw() as usize >= st.pixel_shaders.len() {
            return Err(BackendError::InvalidHandle(shader.to_string()));
        }
        st.bound.ps = shader;
        Ok(())
    }

    fn bind_constant_buffer(&self, stage: ShaderStage, slot: u32, buffer: BufferHandle) -> BackendResult {
        let mut st = self.state.lock();
        st.buffer(buffer)?;
        match slot {
            0 => st.bound.constants[stage_index(stage)] = Some(buffer),
            1 => st.bound.user[stage_index(stage)] = Some(buffer),
            _ => {
                return Err(BackendError::Unsupported(format!(
                    "constant buffer slot {} (wgpu backend binds slots 0 and 1)",
                    slot
                )));
            }
        }
        Ok(())
    }

    fn set_scissor_rect(&self, rect: Rect<i32>) -> BackendResult {
        self.state.lock().bound.scissor = rect;
        Ok(())
    }

    fn set_viewport(&self, rect: Rect<i32>) -> BackendResult {
        self.state.lock().bound.viewport = rect;
        Ok(())
    }

    fn draw_indexed(&self, index_count: u32, start_index: u32, base_vertex: u32) -> BackendResult {
        self.record_draw(DrawKind::Indexed {
            index_count,
            start_index,
            base_vertex,
        })
    }

    fn draw(&self, vertex_count: u32) -> BackendResult {
        self.record_draw(DrawKind::NonIndexed { vertex_count })
    }

    fn submit(&self) -> BackendResult {
        self.check_lost()?;
        let mut st = self.state.lock();
        self.encode_pending(&mut st);
        Ok(())
    }

    fn present(&self) -> BackendResult {
        self.check_lost()?;
        let mut st = self.state.lock();
        self.encode_pending(&mut st);
        let full = Rect::from_size(st.target.size);
        st.bound.viewport = full;
        st.bound.scissor = full;
        st.frame_start = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offscreen(ctx: &GraphicsContext, size: Size<u32>) -> (wgpu::Texture, RenderTarget) {
        let format = wgpu::TextureFormat::Rgba8UnormSrgb;
        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("test target"),
            size: wgpu::Extent3d {
                width: size.width,
                height: size.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, RenderTarget { view, size, format })
    }

    #[test]
    #[ignore] // Requires GPU
    fn test_backend_creation() {
        let ctx = GraphicsContext::new_owned_sync().unwrap();
        let (_texture, target) = offscreen(&ctx, Size::new(64, 64));
        let backend = WgpuBackend2D::new(ctx, target).unwrap();
        assert!(backend.has_texture(backend.fallback_texture()));
        assert!(backend.has_vertex_shader(backend.standard_shaders().sprite_vs));
        assert!(backend.has_pixel_shader(backend.standard_shaders().texture_ps));
        assert!(!backend.has_pixel_shader(PixelShaderId(99)));
        assert_eq!(backend.render_target_size(), Size::new(64, 64));
    }

    #[test]
    #[ignore] // Requires GPU
    fn test_remove_texture() {
        let ctx = GraphicsContext::new_owned_sync().unwrap();
        let (_texture, target) = offscreen(&ctx, Size::new(16, 16));
        let backend = WgpuBackend2D::new(ctx, target).unwrap();
        let texture = backend.create_texture_rgba8(Size::new(2, 1), &[0; 8]).unwrap();
        assert!(backend.has_texture(texture));
        assert!(backend.remove_texture(texture));
        assert!(!backend.has_texture(texture));
        assert!(!backend.remove_texture(backend.fallback_texture()));
    }

    #[test]
    #[ignore] // Requires GPU
    fn test_invalid_shader_is_state_creation_error() {
        let ctx = GraphicsContext::new_owned_sync().unwrap();
        let (_texture, target) = offscreen(&ctx, Size::new(16, 16));
        let backend = WgpuBackend2D::new(ctx, target).unwrap();
        let result = backend.register_pixel_shader("this is not wgsl", "main");
        assert!(matches!(result, Err(BackendError::StateCreation(_))));
    }

    #[test]
    #[ignore] // Requires GPU
    fn test_custom_vertex_shader_and_target_switch() {
        let ctx = GraphicsContext::new_owned_sync().unwrap();
        let (_texture, target) = offscreen(&ctx, Size::new(16, 16));
        let backend = WgpuBackend2D::new(ctx.clone(), target).unwrap();

        let vs = backend.register_vertex_shader(SPRITE_SHADER, "vs_sprite").unwrap();
        assert!(backend.has_vertex_shader(vs));
        assert_ne!(vs, backend.standard_shaders().sprite_vs);

        let (_larger, target) = offscreen(&ctx, Size::new(32, 8));
        backend.set_target(target).unwrap();
        assert_eq!(backend.render_target_size(), Size::new(32, 8));
    }

    #[test]
    #[ignore] // Requires GPU
    fn test_unaligned_write_is_rejected() {
        let ctx = GraphicsContext::new_owned_sync().unwrap();
        let (_texture, target) = offscreen(&ctx, Size::new(16, 16));
        let backend = WgpuBackend2D::new(ctx, target).unwrap();
        let buffer = backend.create_buffer(BufferKind::Index, 64).unwrap();
        assert!(backend.write_buffer(buffer, 2, &[0; 6], WriteMode::NoOverwrite).is_err());
        // Odd lengths are padded.
        assert!(backend.write_buffer(buffer, 4, &[0; 6], WriteMode::NoOverwrite).is_ok());
        assert!(backend.write_buffer(buffer, 60, &[0; 8], WriteMode::NoOverwrite).is_err());
    }
}
