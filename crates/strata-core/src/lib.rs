//! Strata Core
//!
//! Shared building blocks for the Strata renderer crates: logging bootstrap,
//! profiling hooks, engine configuration, integer geometry and math re-exports.

pub mod alloc;
pub mod config;
pub mod geometry;
pub mod logging;
pub mod math;
pub mod profiling;
