use std::ops::Mul;

/// Linear RGBA colour, components nominally in `0.0..=1.0`.
///
/// Stored as four packed `f32`s so it can be written straight into
/// [`Vertex2D`](crate::Vertex2D) and the engine constant buffers.
///
/// ```
/// use strata_render::Color;
///
/// let orange = Color::from_hex(0xFF8800);
/// let tinted = orange * Color::rgba(1.0, 1.0, 1.0, 0.5);
/// assert_eq!(tinted.a, 0.5);
/// ```
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const RED: Color = Color::rgb(1.0, 0.0, 0.0);
    pub const GREEN: Color = Color::rgb(0.0, 1.0, 0.0);
    pub const BLUE: Color = Color::rgb(0.0, 0.0, 1.0);
    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);
    /// Identity of the additive colour constant.
    pub const ZERO: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self::rgba(r, g, b, 1.0)
    }

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn from_rgba_u8(r: u8, g: u8, b: u8, a: u8) -> Self {
        let unorm = |v: u8| v as f32 / 255.0;
        Self::rgba(unorm(r), unorm(g), unorm(b), unorm(a))
    }

    /// Opaque colour from `0xRRGGBB`.
    pub fn from_hex(hex: u32) -> Self {
        let [_, r, g, b] = hex.to_be_bytes();
        Self::from_rgba_u8(r, g, b, 255)
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    /// RGB scaled by alpha, for use with [`BlendState::PREMULTIPLIED`](crate::state::BlendState::PREMULTIPLIED).
    pub fn premultiplied(self) -> Self {
        Self::rgba(self.r * self.a, self.g * self.a, self.b * self.a, self.a)
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    #[cfg(feature = "wgpu-backend")]
    pub fn to_wgpu(self) -> wgpu::Color {
        wgpu::Color {
            r: self.r as f64,
            g: self.g as f64,
            b: self.b as f64,
            a: self.a as f64,
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Component-wise product, the operation the sprite shader applies for the
/// multiplicative colour constant.
impl Mul for Color {
    type Output = Color;

    fn mul(self, rhs: Color) -> Color {
        Color::rgba(self.r * rhs.r, self.g * rhs.g, self.b * rhs.b, self.a * rhs.a)
    }
}

impl From<[f32; 4]> for Color {
    fn from([r, g, b, a]: [f32; 4]) -> Self {
        Self::rgba(r, g, b, a)
    }
}

impl From<Color> for [f32; 4] {
    fn from(color: Color) -> Self {
        color.to_array()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hex() {
        assert_eq!(Color::from_hex(0xFF0000), Color::RED);
        assert_eq!(Color::from_hex(0x00FF00), Color::GREEN);
    }

    #[test]
    fn test_mul_is_componentwise() {
        let c = Color::rgba(0.5, 1.0, 0.25, 1.0) * Color::rgba(0.5, 0.5, 1.0, 0.5);
        assert_eq!(c.to_array(), [0.25, 0.5, 0.25, 0.5]);
        assert_eq!(Color::RED * Color::WHITE, Color::RED);
    }

    #[test]
    fn test_premultiplied() {
        let c = Color::rgba(1.0, 0.5, 0.0, 0.5).premultiplied();
        assert_eq!(c.to_array(), [0.5, 0.25, 0.0, 0.5]);
    }
}
