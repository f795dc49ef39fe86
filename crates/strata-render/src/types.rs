//! Handle and id types shared by the renderer and its backends.

use std::fmt;

/// Number of sampler slots per shader stage.
pub const MAX_SAMPLER_SLOTS: usize = 8;

/// Number of texture slots in the pixel stage.
pub const MAX_TEXTURE_SLOTS: usize = 8;

/// Number of constant buffer slots per shader stage. Slot 0 holds the engine constants.
pub const MAX_CONSTANT_BUFFER_SLOTS: usize = 8;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            pub const fn raw(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

define_id!(
    /// Texture registered with a backend.
    TextureId
);
define_id!(
    /// Vertex shader registered with a backend.
    VertexShaderId
);
define_id!(
    /// Pixel (fragment) shader registered with a backend.
    PixelShaderId
);
define_id!(
    /// GPU buffer created through [`RenderBackend2D::create_buffer`](crate::RenderBackend2D::create_buffer).
    BufferHandle
);
define_id!(
    /// User constant buffer registered with [`Renderer2D::create_constant_buffer`](crate::Renderer2D::create_constant_buffer).
    ConstantBufferId
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Pixel,
}

/// What a GPU buffer is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
    Constant,
}

/// How a buffer write may interact with in-flight GPU work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteMode {
    /// Previous contents may still be read by the GPU; hand out fresh storage.
    Discard,
    /// Caller guarantees the written range is not referenced by in-flight work.
    NoOverwrite,
}

/// Shaders every backend ships with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardShaders2D {
    pub sprite_vs: VertexShaderId,
    /// Untextured shapes
    pub shape_ps: PixelShaderId,
    /// Samples texture slot 0
    pub texture_ps: PixelShaderId,
}

/// Per-frame counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Renderer2DStats {
    /// Commands recorded this frame
    pub commands: u32,
    /// `draw_indexed` and `draw` calls issued to the backend
    pub draw_calls: u32,
    pub triangles: u32,
    /// Physical batches uploaded
    pub batches: u32,
    /// Submissions folded into a previous draw command
    pub merged_draws: u32,
    /// Blend, rasterizer, depth-stencil and sampler binds that reached the backend
    pub state_binds: u32,
    /// Texture, shader and constant buffer binds that reached the backend
    pub resource_binds: u32,
    /// Submissions dropped because they could never fit a batch
    pub dropped_draws: u32,
    /// Invalid handles replaced by a fallback during replay
    pub substituted_handles: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        assert_eq!(TextureId::new(7).to_string(), "TextureId(7)");
        assert_eq!(PixelShaderId(2).raw(), 2);
    }

    #[test]
    fn test_stats_default_is_zero() {
        let stats = Renderer2DStats::default();
        assert_eq!(stats.draw_calls, 0);
        assert_eq!(stats.triangles, 0);
    }
}
