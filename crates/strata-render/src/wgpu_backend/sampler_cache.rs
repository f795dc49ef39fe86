//! Sampler objects shared between bind groups with identical [`SamplerState`].

use std::sync::Arc;

use parking_lot::RwLock;
use strata_core::{alloc::HashMap, profiling::profile_function};

use crate::state::{AddressMode, BorderColor, FilterMode, SamplerState};

pub struct SamplerCache {
    cache: RwLock<HashMap<SamplerState, Arc<wgpu::Sampler>>>,
}

impl Default for SamplerCache {
    fn default() -> Self {
        Self::new()
    }
}

impl SamplerCache {
    pub fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::default()),
        }
    }

    /// Get a sampler from the cache or create a new one.
    pub fn get_or_create(&self, device: &wgpu::Device, state: &SamplerState) -> Arc<wgpu::Sampler> {
        profile_function!();
        if let Some(sampler) = self.cache.read().get(state) {
            return Arc::clone(sampler);
        }

        let mut cache = self.cache.write();
        // Another thread may have inserted while we waited for the write lock.
        if let Some(sampler) = cache.get(state) {
            return Arc::clone(sampler);
        }

        let descriptor = sampler_descriptor(state, device.features());
        let sampler = Arc::new(device.create_sampler(&descriptor));
        cache.insert(*state, Arc::clone(&sampler));
        sampler
    }

    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }

    pub fn clear(&self) {
        self.cache.write().clear();
    }
}

/// Descriptor for `state`, downgraded where `features` or wgpu's validation
/// rules would reject it.
pub fn sampler_descriptor(state: &SamplerState, features: wgpu::Features) -> wgpu::SamplerDescriptor<'static> {
    let border_supported = features.contains(wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER);
    let uses_border = [state.address_u, state.address_v, state.address_w].contains(&AddressMode::Border);
    if uses_border && !border_supported {
        tracing::warn!("Border address mode unsupported by this device, clamping to edge");
    }
    let address = |mode: AddressMode| match mode {
        AddressMode::Repeat => wgpu::AddressMode::Repeat,
        AddressMode::Mirror => wgpu::AddressMode::MirrorRepeat,
        AddressMode::Clamp => wgpu::AddressMode::ClampToEdge,
        AddressMode::Border if border_supported => wgpu::AddressMode::ClampToBorder,
        AddressMode::Border => wgpu::AddressMode::ClampToEdge,
    };
    let filter = |mode: FilterMode| match mode {
        FilterMode::Nearest => wgpu::FilterMode::Nearest,
        FilterMode::Linear => wgpu::FilterMode::Linear,
    };
    // Anisotropy is only valid with linear filtering everywhere.
    let all_linear = [state.min, state.mag, state.mip].iter().all(|f| *f == FilterMode::Linear);
    let anisotropy_clamp = if all_linear { state.max_anisotropy.clamp(1, 16) as u16 } else { 1 };
    let border_color = (uses_border && border_supported).then_some(match state.border_color {
        BorderColor::TransparentBlack => wgpu::SamplerBorderColor::TransparentBlack,
        BorderColor::OpaqueBlack => wgpu::SamplerBorderColor::OpaqueBlack,
        BorderColor::OpaqueWhite => wgpu::SamplerBorderColor::OpaqueWhite,
    });

    wgpu::SamplerDescriptor {
        label: Some("strata sampler"),
        address_mode_u: address(state.address_u),
        address_mode_v: address(state.address_v),
        address_mode_w: address(state.address_w),
        mag_filter: filter(state.mag),
        min_filter: filter(state.min),
        mipmap_filter: filter(state.mip),
        lod_min_clamp: 0.0,
        lod_max_clamp: 32.0,
        compare: None,
        anisotropy_clamp,
        border_color,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_border_falls_back_without_feature() {
        let state = SamplerState::new(AddressMode::Border, FilterMode::Linear);
        let desc = sampler_descriptor(&state, wgpu::Features::empty());
        assert_eq!(desc.address_mode_u, wgpu::AddressMode::ClampToEdge);
        assert!(desc.border_color.is_none());
    }

    #[test]
    fn test_border_kept_with_feature() {
        let state = SamplerState::new(AddressMode::Border, FilterMode::Linear);
        let desc = sampler_descriptor(&state, wgpu::Features::ADDRESS_MODE_CLAMP_TO_BORDER);
        assert_eq!(desc.address_mode_u, wgpu::AddressMode::ClampToBorder);
        assert_eq!(desc.border_color, Some(wgpu::SamplerBorderColor::TransparentBlack));
    }

    #[test]
    fn test_anisotropy_requires_linear() {
        let mut state = SamplerState::CLAMP_NEAREST;
        state.max_anisotropy = 8;
        assert_eq!(sampler_descriptor(&state, wgpu::Features::empty()).anisotropy_clamp, 1);
        let mut state = SamplerState::CLAMP_LINEAR;
        state.max_anisotropy = 8;
        assert_eq!(sampler_descriptor(&state, wgpu::Features::empty()).anisotropy_clamp, 8);
    }

    #[test]
    fn test_mirror_maps_to_mirror_repeat() {
        let desc = sampler_descriptor(&SamplerState::MIRROR_NEAREST, wgpu::Features::empty());
        assert_eq!(desc.address_mode_v, wgpu::AddressMode::MirrorRepeat);
        assert_eq!(desc.mag_filter, wgpu::FilterMode::Nearest);
    }
}
