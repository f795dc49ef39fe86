#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Repeat,
    Mirror,
    Clamp,
    Border,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// Colour used outside the texture with [`AddressMode::Border`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BorderColor {
    TransparentBlack,
    OpaqueBlack,
    OpaqueWhite,
}

/// Texture sampling parameters for one sampler slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerState {
    pub address_u: AddressMode,
    pub address_v: AddressMode,
    pub address_w: AddressMode,
    pub min: FilterMode,
    pub mag: FilterMode,
    pub mip: FilterMode,
    /// 1 disables anisotropic filtering.
    pub max_anisotropy: u8,
    pub border_color: BorderColor,
}

impl SamplerState {
    pub const REPEAT_NEAREST: SamplerState = SamplerState::new(AddressMode::Repeat, FilterMode::Nearest);
    pub const REPEAT_LINEAR: SamplerState = SamplerState::new(AddressMode::Repeat, FilterMode::Linear);
    pub const MIRROR_NEAREST: SamplerState = SamplerState::new(AddressMode::Mirror, FilterMode::Nearest);
    pub const MIRROR_LINEAR: SamplerState = SamplerState::new(AddressMode::Mirror, FilterMode::Linear);
    pub const CLAMP_NEAREST: SamplerState = SamplerState::new(AddressMode::Clamp, FilterMode::Nearest);
    pub const CLAMP_LINEAR: SamplerState = SamplerState::new(AddressMode::Clamp, FilterMode::Linear);
    pub const DEFAULT_2D: SamplerState = SamplerState::CLAMP_LINEAR;

    pub const fn new(address: AddressMode, filter: FilterMode) -> Self {
        Self {
            address_u: address,
            address_v: address,
            address_w: address,
            min: filter,
            mag: filter,
            mip: filter,
            max_anisotropy: 1,
            border_color: BorderColor::TransparentBlack,
        }
    }
}

impl Default for SamplerState {
    fn default() -> Self {
        Self::DEFAULT_2D
    }
}
