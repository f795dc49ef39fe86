use bitflags::bitflags;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DepthStencilChanges: u8 {
        const DEPTH_ENABLE = 1 << 0;
        const DEPTH_WRITE = 1 << 1;
        const DEPTH_FUNC = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepthStencilState {
    pub depth_enable: bool,
    pub depth_write_enable: bool,
    pub depth_func: CompareFunction,
}

impl DepthStencilState {
    pub const DEFAULT_2D: DepthStencilState = DepthStencilState {
        depth_enable: false,
        depth_write_enable: false,
        depth_func: CompareFunction::Always,
    };

    pub const DEPTH_TEST_WRITE: DepthStencilState = DepthStencilState {
        depth_enable: true,
        depth_write_enable: true,
        depth_func: CompareFunction::LessEqual,
    };

    pub fn diff(&self, bound: &DepthStencilState) -> DepthStencilChanges {
        let mut changes = DepthStencilChanges::empty();
        changes.set(DepthStencilChanges::DEPTH_ENABLE, self.depth_enable != bound.depth_enable);
        changes.set(DepthStencilChanges::DEPTH_WRITE, self.depth_write_enable != bound.depth_write_enable);
        changes.set(DepthStencilChanges::DEPTH_FUNC, self.depth_func != bound.depth_func);
        changes
    }
}

impl Default for DepthStencilState {
    fn default() -> Self {
        Self::DEFAULT_2D
    }
}
