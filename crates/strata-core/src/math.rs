//! Math types re-exported from [`glam`].
//!
//! The renderer only works in two dimensions, so the surface is small: vectors
//! for positions and colours and [`Affine2`] for 2D transforms.
//!
//! [`glam`]: https://docs.rs/glam

pub use glam::{Affine2, Mat2, Vec2, Vec4};

use crate::geometry::Size;

/// Transform mapping pixel coordinates of a `size` target to clip space.
///
/// Pixel `(0, 0)` is the top-left corner and maps to `(-1, 1)`; `(width, height)`
/// maps to `(1, -1)`.
pub fn screen_transform(size: Size<f32>) -> Affine2 {
    let width = size.width.max(1.0);
    let height = size.height.max(1.0);
    Affine2::from_cols_array(&[2.0 / width, 0.0, 0.0, -2.0 / height, -1.0, 1.0])
}

/// Pack an affine transform into two `vec4` rows for a uniform buffer.
///
/// Row `i` holds the coefficients producing output component `i`:
/// `out.x = dot(rows[0].xyz, (p, 1))`.
pub fn affine_to_rows(m: Affine2) -> [[f32; 4]; 2] {
    [
        [m.matrix2.x_axis.x, m.matrix2.y_axis.x, m.translation.x, 0.0],
        [m.matrix2.x_axis.y, m.matrix2.y_axis.y, m.translation.y, 0.0],
    ]
}

/// Largest axis scale of `m`, used to pick tessellation density.
pub fn max_scaling(m: &Affine2) -> f32 {
    m.matrix2.x_axis.length().max(m.matrix2.y_axis.length())
}
