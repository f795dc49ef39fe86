//! Strata Render
//!
//! A batching 2D renderer. Primitive submissions are written into shared
//! vertex/index arrays and recorded as commands; at flush time the command
//! list is replayed against a [`RenderBackend2D`], with consecutive compatible
//! submissions collapsed into one draw call and redundant state binds elided.
//!
//! # Architecture
//!
//! - [`Vertex2DBatch`]: CPU geometry split into physical batches that each fit
//!   the GPU ring buffers
//! - [`CommandManager`]: ordered command list with the draw-merge rule
//! - [`RenderStateCache`]: shadow of the fixed-function state bound on the backend
//! - [`Renderer2D`]: the public submission API tying these together
//! - [`RenderBackend2D`]: the graphics API abstraction, implemented for wgpu in
//!   [`wgpu_backend`]

mod backend;
mod batch;
pub mod builder;
mod color;
mod command;
mod config;
mod constant_buffer;
mod error;
mod renderer;
mod replay;
pub mod state;
mod state_cache;
mod types;
mod vertex;

#[cfg(feature = "wgpu-backend")]
pub mod wgpu_backend;

pub use backend::*;
pub use batch::*;
pub use color::*;
pub use command::*;
pub use config::*;
pub use constant_buffer::{ConstantBuffer, PSConstants2D, VSConstants2D};
pub use error::*;
pub use renderer::*;
pub use state_cache::*;
pub use types::*;
pub use vertex::*;

// Re-export the core crate for downstream users.
pub use strata_core;
#[cfg(feature = "wgpu-backend")]
pub use wgpu;
