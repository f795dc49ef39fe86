use std::fmt;

/// Largest vertex count a batch may hold: 16-bit indices address 0..=65 535.
pub const MAX_ADDRESSABLE_VERTICES: u32 = 1 << 16;

/// Sizing and diagnostics for [`Renderer2D`](crate::Renderer2D).
///
/// The GPU vertex and index ring buffers are sized to `max_batch_vertices` and
/// `max_batch_indices`, so one physical batch always fits one ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Renderer2DConfig {
    pub max_batch_vertices: u32,
    pub max_batch_indices: u32,
    /// Starting capacity of the CPU vertex array. Grows by doubling.
    pub initial_vertex_array_size: u32,
    /// Starting capacity of the CPU index array. Grows by doubling.
    pub initial_index_array_size: u32,
    /// Trace every replayed command.
    pub log_commands: bool,
}

impl Default for Renderer2DConfig {
    fn default() -> Self {
        Self {
            max_batch_vertices: 65_535,
            max_batch_indices: 65_535 * 4,
            initial_vertex_array_size: 4_096,
            initial_index_array_size: 4_096 * 3,
            log_commands: false,
        }
    }
}

impl Renderer2DConfig {
    pub fn with_batch_capacity(mut self, vertices: u32, indices: u32) -> Self {
        self.max_batch_vertices = vertices;
        self.max_batch_indices = indices;
        self
    }

    pub fn with_initial_array_sizes(mut self, vertices: u32, indices: u32) -> Self {
        self.initial_vertex_array_size = vertices;
        self.initial_index_array_size = indices;
        self
    }

    pub fn with_log_commands(mut self, log_commands: bool) -> Self {
        self.log_commands = log_commands;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch_vertices == 0 || self.max_batch_vertices > MAX_ADDRESSABLE_VERTICES {
            return Err(ConfigError::VertexCapacity(self.max_batch_vertices));
        }
        if self.max_batch_indices < 3 {
            return Err(ConfigError::IndexCapacity(self.max_batch_indices));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Batch vertex capacity outside `1..=65536`
    VertexCapacity(u32),
    /// Batch index capacity cannot hold a single triangle
    IndexCapacity(u32),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VertexCapacity(n) => write!(
                f,
                "max_batch_vertices must be in 1..={} for 16-bit indices, got {}",
                MAX_ADDRESSABLE_VERTICES, n
            ),
            Self::IndexCapacity(n) => write!(f, "max_batch_indices must be at least 3, got {}", n),
        }
    }
}

impl std::error::Error for ConfigError {}
