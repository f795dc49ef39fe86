//! Fixed-function pipeline state descriptions.
//!
//! These are backend-neutral value types. Every field is an integer or enum so
//! the structs are `Eq + Hash` and can key backend caches directly.

mod blend;
mod depth_stencil;
mod rasterizer;
mod sampler;

pub use blend::{Blend, BlendOp, BlendState, ColorWriteMask};
pub use depth_stencil::{CompareFunction, DepthStencilChanges, DepthStencilState};
pub use rasterizer::{CullMode, FillMode, RasterizerChanges, RasterizerState};
pub use sampler::{AddressMode, BorderColor, FilterMode, SamplerState};

use crate::types::{MAX_SAMPLER_SLOTS, ShaderStage};

/// Every piece of fixed-function state the state cache tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderStateSnapshot {
    pub blend: BlendState,
    pub rasterizer: RasterizerState,
    pub depth_stencil: DepthStencilState,
    pub vs_samplers: [SamplerState; MAX_SAMPLER_SLOTS],
    pub ps_samplers: [SamplerState; MAX_SAMPLER_SLOTS],
}

impl RenderStateSnapshot {
    /// State the engine establishes on a freshly created device: alpha
    /// blending, no culling, no scissor, no depth test.
    pub const DEFAULT_2D: RenderStateSnapshot = RenderStateSnapshot {
        blend: BlendState::DEFAULT_2D,
        rasterizer: RasterizerState::DEFAULT_2D,
        depth_stencil: DepthStencilState::DEFAULT_2D,
        vs_samplers: [SamplerState::DEFAULT_2D; MAX_SAMPLER_SLOTS],
        ps_samplers: [SamplerState::DEFAULT_2D; MAX_SAMPLER_SLOTS],
    };

    pub fn samplers(&self, stage: ShaderStage) -> &[SamplerState; MAX_SAMPLER_SLOTS] {
        match stage {
            ShaderStage::Vertex => &self.vs_samplers,
            ShaderStage::Pixel => &self.ps_samplers,
        }
    }

    pub fn samplers_mut(&mut self, stage: ShaderStage) -> &mut [SamplerState; MAX_SAMPLER_SLOTS] {
        match stage {
            ShaderStage::Vertex => &mut self.vs_samplers,
            ShaderStage::Pixel => &mut self.ps_samplers,
        }
    }
}

impl Default for RenderStateSnapshot {
    fn default() -> Self {
        Self::DEFAULT_2D
    }
}
