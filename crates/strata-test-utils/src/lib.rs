//! Test utilities for Strata.
//!
//! [`MockBackend2D`] implements [`RenderBackend2D`](strata_render::RenderBackend2D)
//! without a GPU. It records every call, keeps the contents of the buffers the
//! renderer uploads, and reconstructs the triangles each draw would rasterize.
//!
//! ```rust
//! # #[cfg(feature = "mock")]
//! # {
//! use std::sync::Arc;
//! use strata_render::{Color, Renderer2D, Renderer2DConfig, strata_core::math::Vec2};
//! use strata_test_utils::MockBackend2D;
//!
//! let mock = Arc::new(MockBackend2D::new());
//! let mut renderer = Renderer2D::new(mock.clone(), Renderer2DConfig::default()).unwrap();
//!
//! renderer.add_rect(Vec2::ZERO, Vec2::splat(10.0), Color::RED);
//! renderer.flush().unwrap();
//!
//! assert_eq!(mock.count_draw_calls(), 1);
//! assert_eq!(mock.drawn_triangles().len(), 2);
//! # }
//! ```
//!
//! # Interior Mutability
//!
//! Backend methods take `&self`, so recorded state lives behind a
//! `parking_lot::Mutex`, which keeps the mock `Send + Sync` like a real backend.

#[cfg(feature = "mock")]
mod mock_backend;

#[cfg(feature = "mock")]
pub use mock_backend::*;
