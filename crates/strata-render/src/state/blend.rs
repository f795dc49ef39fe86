//! Blend state and the common presets.

use bitflags::bitflags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Blend {
    Zero,
    One,
    SrcColor,
    InvSrcColor,
    SrcAlpha,
    InvSrcAlpha,
    DestAlpha,
    InvDestAlpha,
    DestColor,
    InvDestColor,
    SrcAlphaSat,
    BlendFactor,
    InvBlendFactor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendOp {
    Add,
    Subtract,
    RevSubtract,
    Min,
    Max,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColorWriteMask: u8 {
        const RED = 1 << 0;
        const GREEN = 1 << 1;
        const BLUE = 1 << 2;
        const ALPHA = 1 << 3;
        const ALL = Self::RED.bits() | Self::GREEN.bits() | Self::BLUE.bits() | Self::ALPHA.bits();
    }
}

/// How source and destination colours are combined.
///
/// Compared as a whole value: a backend receives the complete state whenever
/// any field differs from what is bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub enable: bool,
    pub write_mask: ColorWriteMask,
    pub src: Blend,
    pub dst: Blend,
    pub op: BlendOp,
    pub src_alpha: Blend,
    pub dst_alpha: Blend,
    pub op_alpha: BlendOp,
    pub alpha_to_coverage: bool,
}

impl BlendState {
    /// Straight (non-premultiplied) alpha blending.
    ///
    /// Formula: `src.rgb * src.a + dst.rgb * (1 - src.a)`
    pub const NON_PREMULTIPLIED: BlendState = BlendState::new(Blend::SrcAlpha, Blend::InvSrcAlpha, BlendOp::Add);

    /// Formula: `src.rgb + dst.rgb * (1 - src.a)`
    pub const PREMULTIPLIED: BlendState = BlendState::new(Blend::One, Blend::InvSrcAlpha, BlendOp::Add);

    /// No blending, source replaces destination.
    pub const OPAQUE: BlendState = BlendState {
        enable: false,
        ..BlendState::NON_PREMULTIPLIED
    };

    /// Glow, particles, light sources.
    pub const ADDITIVE: BlendState = BlendState::new(Blend::SrcAlpha, Blend::One, BlendOp::Add);

    pub const SUBTRACTIVE: BlendState = BlendState::new(Blend::SrcAlpha, Blend::One, BlendOp::RevSubtract);

    /// Formula: `src.rgb * dst.rgb`
    pub const MULTIPLICATIVE: BlendState = BlendState::new(Blend::Zero, Blend::SrcColor, BlendOp::Add);

    pub const DEFAULT_2D: BlendState = BlendState::NON_PREMULTIPLIED;

    /// Colour blending as given; destination alpha is preserved.
    pub const fn new(src: Blend, dst: Blend, op: BlendOp) -> Self {
        Self {
            enable: true,
            write_mask: ColorWriteMask::ALL,
            src,
            dst,
            op,
            src_alpha: Blend::Zero,
            dst_alpha: Blend::One,
            op_alpha: BlendOp::Add,
            alpha_to_coverage: false,
        }
    }

    pub const fn with_alpha(self, src_alpha: Blend, dst_alpha: Blend, op_alpha: BlendOp) -> Self {
        Self {
            src_alpha,
            dst_alpha,
            op_alpha,
            ..self
        }
    }

    pub const fn with_write_mask(self, write_mask: ColorWriteMask) -> Self {
        Self { write_mask, ..self }
    }
}

impl Default for BlendState {
    fn default() -> Self {
        Self::DEFAULT_2D
    }
}
