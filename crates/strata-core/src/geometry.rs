#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect<T> {
    pub x: T,
    pub y: T,
    pub width: T,
    pub height: T,
}

impl<T> Rect<T> {
    pub const fn new(x: T, y: T, width: T, height: T) -> Self {
        Rect { x, y, width, height }
    }
}

impl Rect<i32> {
    /// Rect covering `size`, anchored at the origin.
    pub fn from_size(size: Size<u32>) -> Self {
        Rect::new(
            0,
            0,
            i32::try_from(size.width).unwrap_or(i32::MAX),
            i32::try_from(size.height).unwrap_or(i32::MAX),
        )
    }

    /// True when the rect covers at least one pixel.
    pub fn has_area(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    /// Overlap of two rects. Disjoint rects give an empty rect at `self`'s origin.
    pub fn intersect(&self, other: &Rect<i32>) -> Rect<i32> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= x || bottom <= y {
            return Rect::new(self.x, self.y, 0, 0);
        }
        Rect::new(x, y, right - x, bottom - y)
    }

    /// Clamp into the `0..size` area of a render target.
    pub fn clamp_to(&self, size: Size<u32>) -> Rect<i32> {
        self.intersect(&Rect::from_size(size))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size<T> {
    pub width: T,
    pub height: T,
}

impl<T> Size<T> {
    pub const fn new(width: T, height: T) -> Self {
        Size { width, height }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_area() {
        assert!(Rect::new(0, 0, 1, 1).has_area());
        assert!(!Rect::new(5, 5, 0, 10).has_area());
        assert!(!Rect::new(5, 5, 10, -1).has_area());
    }

    #[test]
    fn test_intersect() {
        let a = Rect::new(0, 0, 100, 100);
        let b = Rect::new(50, 25, 100, 100);
        assert_eq!(a.intersect(&b), Rect::new(50, 25, 50, 75));
    }

    #[test]
    fn test_intersect_disjoint() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(20, 20, 10, 10);
        assert!(!a.intersect(&b).has_area());
    }

    #[test]
    fn test_clamp_to_target() {
        let viewport = Rect::new(-10, 10, 800, 600);
        let clamped = viewport.clamp_to(Size::new(640, 480));
        assert_eq!(clamped, Rect::new(0, 10, 640, 470));
    }
}
