use bitflags::bitflags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FillMode {
    Solid,
    Wireframe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    Front,
    Back,
}

bitflags! {
    /// Which rasterizer fields differ from the bound state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct RasterizerChanges: u8 {
        const FILL_MODE = 1 << 0;
        const CULL_MODE = 1 << 1;
        const SCISSOR_ENABLE = 1 << 2;
        const DEPTH_BIAS = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RasterizerState {
    pub fill_mode: FillMode,
    pub cull_mode: CullMode,
    pub scissor_enable: bool,
    pub depth_bias: i32,
}

impl RasterizerState {
    pub const SOLID_CULL_NONE: RasterizerState = RasterizerState::new(FillMode::Solid, CullMode::None);
    pub const SOLID_CULL_BACK: RasterizerState = RasterizerState::new(FillMode::Solid, CullMode::Back);
    pub const SOLID_CULL_FRONT: RasterizerState = RasterizerState::new(FillMode::Solid, CullMode::Front);
    pub const WIREFRAME_CULL_NONE: RasterizerState = RasterizerState::new(FillMode::Wireframe, CullMode::None);
    pub const DEFAULT_2D: RasterizerState = RasterizerState::SOLID_CULL_NONE;

    pub const fn new(fill_mode: FillMode, cull_mode: CullMode) -> Self {
        Self {
            fill_mode,
            cull_mode,
            scissor_enable: false,
            depth_bias: 0,
        }
    }

    pub const fn with_scissor(self, scissor_enable: bool) -> Self {
        Self { scissor_enable, ..self }
    }

    /// Fields of `self` that differ from `bound`.
    pub fn diff(&self, bound: &RasterizerState) -> RasterizerChanges {
        let mut changes = RasterizerChanges::empty();
        changes.set(RasterizerChanges::FILL_MODE, self.fill_mode != bound.fill_mode);
        changes.set(RasterizerChanges::CULL_MODE, self.cull_mode != bound.cull_mode);
        changes.set(RasterizerChanges::SCISSOR_ENABLE, self.scissor_enable != bound.scissor_enable);
        changes.set(RasterizerChanges::DEPTH_BIAS, self.depth_bias != bound.depth_bias);
        changes
    }
}

impl Default for RasterizerState {
    fn default() -> Self {
        Self::DEFAULT_2D
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diff_identical_is_empty() {
        let state = RasterizerState::DEFAULT_2D;
        assert!(state.diff(&state).is_empty());
    }

    #[test]
    fn test_diff_reports_each_field() {
        let bound = RasterizerState::DEFAULT_2D;
        let next = RasterizerState::WIREFRAME_CULL_NONE.with_scissor(true);
        assert_eq!(next.diff(&bound), RasterizerChanges::FILL_MODE | RasterizerChanges::SCISSOR_ENABLE);
    }
}
