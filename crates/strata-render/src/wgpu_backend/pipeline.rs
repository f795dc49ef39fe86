//! Render pipelines built from the fixed-function state the replay binds.
//!
//! wgpu folds blend, rasterizer and depth state into immutable pipelines, so
//! the backend keeps the individual states separately and resolves a pipeline
//! per draw from a [`PipelineKey`].

use std::sync::Arc;

use strata_core::{alloc::HashMap, profiling::profile_function};

use crate::{
    backend::BackendResult,
    error::BackendError,
    state::{Blend, BlendOp, BlendState, ColorWriteMask, CompareFunction, CullMode, DepthStencilState, FillMode},
    types::{PixelShaderId, VertexShaderId},
    vertex::Vertex2D,
};

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// A compiled shader module and the entry point to use from it.
pub struct ShaderEntry {
    pub module: Arc<wgpu::ShaderModule>,
    pub entry_point: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub vs: VertexShaderId,
    pub ps: PixelShaderId,
    pub blend: BlendState,
    pub fill_mode: FillMode,
    pub cull_mode: CullMode,
    pub depth_bias: i32,
    pub depth: DepthStencilState,
    /// `false` for vertex-buffer-less draws
    pub vertex_input: bool,
    pub format: wgpu::TextureFormat,
}

/// Bind group layouts shared by every pipeline.
pub struct BindLayouts {
    /// Engine constants: VS slot 0 at binding 0, PS slot 0 at binding 1
    pub constants: wgpu::BindGroupLayout,
    /// Pixel texture slot 0 and its sampler
    pub texture: wgpu::BindGroupLayout,
    /// User constant buffers: VS slot 1 at binding 0, PS slot 1 at binding 1
    pub user: wgpu::BindGroupLayout,
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl BindLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let constants = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Renderer2D Constants Layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX),
                uniform_entry(1, wgpu::ShaderStages::FRAGMENT),
            ],
        });
        let texture = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Renderer2D Texture Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let user = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Renderer2D User Constants Layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX),
                uniform_entry(1, wgpu::ShaderStages::FRAGMENT),
            ],
        });
        Self { constants, texture, user }
    }

    pub fn pipeline_layout(&self, device: &wgpu::Device) -> wgpu::PipelineLayout {
        device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Renderer2D Pipeline Layout"),
            bind_group_layouts: &[&self.constants, &self.texture, &self.user],
            push_constant_ranges: &[],
        })
    }
}

#[derive(Default)]
pub struct PipelineCache {
    pipelines: HashMap<PipelineKey, Arc<wgpu::RenderPipeline>>,
}

impl PipelineCache {
    pub fn get_or_create(
        &mut self,
        device: &wgpu::Device,
        layout: &wgpu::PipelineLayout,
        key: PipelineKey,
        vs: &ShaderEntry,
        ps: &ShaderEntry,
    ) -> BackendResult<Arc<wgpu::RenderPipeline>> {
        if let Some(pipeline) = self.pipelines.get(&key) {
            return Ok(Arc::clone(pipeline));
        }
        let pipeline = Arc::new(create_pipeline(device, layout, &key, vs, ps)?);
        tracing::debug!("Created pipeline #{} for {} / {}", self.pipelines.len(), key.vs, key.ps);
        self.pipelines.insert(key, Arc::clone(&pipeline));
        Ok(pipeline)
    }

    pub fn len(&self) -> usize {
        self.pipelines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pipelines.is_empty()
    }

    pub fn clear(&mut self) {
        self.pipelines.clear();
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    key: &PipelineKey,
    vs: &ShaderEntry,
    ps: &ShaderEntry,
) -> BackendResult<wgpu::RenderPipeline> {
    profile_function!();
    if key.fill_mode == FillMode::Wireframe && !device.features().contains(wgpu::Features::POLYGON_MODE_LINE) {
        return Err(BackendError::StateCreation(
            "wireframe fill requires POLYGON_MODE_LINE".to_string(),
        ));
    }

    let vertex_buffers = [Vertex2D::layout()];
    let buffers: &[wgpu::VertexBufferLayout] = if key.vertex_input { &vertex_buffers } else { &[] };

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Renderer2D Pipeline"),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: &vs.module,
            entry_point: Some(&vs.entry_point),
            buffers,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &ps.module,
            entry_point: Some(&ps.entry_point),
            targets: &[Some(wgpu::ColorTargetState {
                format: key.format,
                blend: convert_blend(&key.blend),
                write_mask: convert_write_mask(key.blend.write_mask),
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Cw,
            cull_mode: convert_cull(key.cull_mode),
            polygon_mode: match key.fill_mode {
                FillMode::Solid => wgpu::PolygonMode::Fill,
                FillMode::Wireframe => wgpu::PolygonMode::Line,
            },
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(convert_depth(&key.depth, key.depth_bias)),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    });
    match pollster::block_on(device.pop_error_scope()) {
        Some(error) => Err(BackendError::StateCreation(error.to_string())),
        None => Ok(pipeline),
    }
}

pub fn convert_blend(state: &BlendState) -> Option<wgpu::BlendState> {
    if !state.enable {
        return None;
    }
    Some(wgpu::BlendState {
        color: blend_component(state.src, state.dst, state.op),
        alpha: blend_component(state.src_alpha, state.dst_alpha, state.op_alpha),
    })
}

fn blend_component(src: Blend, dst: Blend, op: BlendOp) -> wgpu::BlendComponent {
    let operation = match op {
        BlendOp::Add => wgpu::BlendOperation::Add,
        BlendOp::Subtract => wgpu::BlendOperation::Subtract,
        BlendOp::RevSubtract => wgpu::BlendOperation::ReverseSubtract,
        BlendOp::Min => wgpu::BlendOperation::Min,
        BlendOp::Max => wgpu::BlendOperation::Max,
    };
    // Min and max ignore the factors; wgpu requires them to be One.
    if matches!(op, BlendOp::Min | BlendOp::Max) {
        return wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::One,
            dst_factor: wgpu::BlendFactor::One,
            operation,
        };
    }
    wgpu::BlendComponent {
        src_factor: convert_factor(src),
        dst_factor: convert_factor(dst),
        operation,
    }
}

fn convert_factor(blend: Blend) -> wgpu::BlendFactor {
    match blend {
        Blend::Zero => wgpu::BlendFactor::Zero,
        Blend::One => wgpu::BlendFactor::One,
        Blend::SrcColor => wgpu::BlendFactor::Src,
        Blend::InvSrcColor => wgpu::BlendFactor::OneMinusSrc,
        Blend::SrcAlpha => wgpu::BlendFactor::SrcAlpha,
        Blend::InvSrcAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
        Blend::DestAlpha => wgpu::BlendFactor::DstAlpha,
        Blend::InvDestAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
        Blend::DestColor => wgpu::BlendFactor::Dst,
        Blend::InvDestColor => wgpu::BlendFactor::OneMinusDst,
        Blend::SrcAlphaSat => wgpu::BlendFactor::SrcAlphaSaturated,
        Blend::BlendFactor => wgpu::BlendFactor::Constant,
        Blend::InvBlendFactor => wgpu::BlendFactor::OneMinusConstant,
    }
}

pub fn convert_write_mask(mask: ColorWriteMask) -> wgpu::ColorWrites {
    let mut writes = wgpu::ColorWrites::empty();
    writes.set(wgpu::ColorWrites::RED, mask.contains(ColorWriteMask::RED));
    writes.set(wgpu::ColorWrites::GREEN, mask.contains(ColorWriteMask::GREEN));
    writes.set(wgpu::ColorWrites::BLUE, mask.contains(ColorWriteMask::BLUE));
    writes.set(wgpu::ColorWrites::ALPHA, mask.contains(ColorWriteMask::ALPHA));
    writes
}

fn convert_cull(cull: CullMode) -> Option<wgpu::Face> {
    match cull {
        CullMode::None => None,
        CullMode::Front => Some(wgpu::Face::Front),
        CullMode::Back => Some(wgpu::Face::Back),
    }
}

fn convert_compare(func: CompareFunction) -> wgpu::CompareFunction {
    match func {
        CompareFunction::Never => wgpu::CompareFunction::Never,
        CompareFunction::Less => wgpu::CompareFunction::Less,
        CompareFunction::Equal => wgpu::CompareFunction::Equal,
        CompareFunction::LessEqual => wgpu::CompareFunction::LessEqual,
        CompareFunction::Greater => wgpu::CompareFunction::Greater,
        CompareFunction::NotEqual => wgpu::CompareFunction::NotEqual,
        CompareFunction::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
        CompareFunction::Always => wgpu::CompareFunction::Always,
    }
}

/// A depth attachment is always present; a disabled depth test compares
/// `Always` and never writes.
pub fn convert_depth(state: &DepthStencilState, depth_bias: i32) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled: state.depth_enable && state.depth_write_enable,
        depth_compare: if state.depth_enable {
            convert_compare(state.depth_func)
        } else {
            wgpu::CompareFunction::Always
        },
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState {
            constant: depth_bias,
            slope_scale: 0.0,
            clamp: 0.0,
        },
    }
}
