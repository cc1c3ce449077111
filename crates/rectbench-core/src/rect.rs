//! Rectangle geometry and styling types.

/// An RGBA color with 8 bits per channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Create a fully opaque color.
    #[must_use]
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Create a color with an explicit alpha channel.
    #[must_use]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Pack into a little-endian RGBA byte quadruple.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// An axis-aligned rectangle in integer pixel coordinates (left/top inclusive).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PixelRect {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl PixelRect {
    /// Create a rectangle from position and size.
    #[must_use]
    pub const fn from_pos_size(x: i64, y: i64, w: i64, h: i64) -> Self {
        Self {
            left: x,
            top: y,
            right: x + w,
            bottom: y + h,
        }
    }

    /// Width in pixels.
    #[must_use]
    pub const fn width(&self) -> i64 {
        self.right - self.left
    }

    /// Height in pixels.
    #[must_use]
    pub const fn height(&self) -> i64 {
        self.bottom - self.top
    }

    /// Covered area in pixels.
    #[must_use]
    pub const fn area(&self) -> i64 {
        self.width() * self.height()
    }
}

/// A rectangle in normalized texture coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct UvRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl UvRect {
    /// The full texture.
    pub const FULL: Self = Self {
        left: 0.0,
        top: 0.0,
        right: 1.0,
        bottom: 1.0,
    };
}

/// One styled rectangle as the rendering strategies consume it.
///
/// Mirrors what a UI toolkit would hand to its renderer: a filled quad with
/// optional border, rounded corners and texture sources.
#[derive(Clone, Copy, Debug, Default)]
pub struct Rect {
    /// Position in window pixel coordinates.
    pub pos: PixelRect,
    /// Fill color.
    pub background_color: Color,
    /// Whether the border is drawn.
    pub has_border: bool,
    /// Whether corners are rounded by `corner_radius`.
    pub has_rounded_corners: bool,
    /// Whether `texture_index` is sampled.
    pub has_texture: bool,
    /// Whether `texture_array_index` is sampled.
    pub has_texture_array: bool,
    /// Whether the rect is a glyph from the atlas.
    pub has_glyph: bool,
    /// Border width in pixels.
    pub border_width: f32,
    /// Border color.
    pub border_color: Color,
    /// Corner radius in pixels.
    pub corner_radius: u32,
    /// Texture slot index.
    pub texture_index: u32,
    /// Layer within the texture array.
    pub texture_array_index: u32,
    /// Texture coordinates.
    pub texture_coords: UvRect,
    /// Per-rect random value, used by strategies that vary work per rect.
    pub random: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_from_pos_size() {
        let r = PixelRect::from_pos_size(10, 20, 30, 40);
        assert_eq!(r.left, 10);
        assert_eq!(r.top, 20);
        assert_eq!(r.width(), 30);
        assert_eq!(r.height(), 40);
        assert_eq!(r.area(), 1200);
    }

    #[test]
    fn color_bytes() {
        let c = Color::rgba(1, 2, 3, 4);
        assert_eq!(c.to_bytes(), [1, 2, 3, 4]);
        assert_eq!(Color::opaque(9, 9, 9).a, 255);
    }
}
