//! Small value types shared across the font engine

use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub};

/// Integer 2D vector, used for pixel positions and glyph dimensions
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Vector2i {
    pub x: i32,
    pub y: i32,
}

impl Vector2i {
    pub const ZERO: Self = Self { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Number of pixels covered, treating negative extents as empty
    pub fn area(self) -> usize {
        self.x.max(0) as usize * self.y.max(0) as usize
    }

    pub fn to_f32(self) -> Vector2f {
        Vector2f::new(self.x as f32, self.y as f32)
    }
}

impl Add for Vector2i {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vector2i {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vector2i {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<i32> for Vector2i {
    type Output = Self;

    fn mul(self, rhs: i32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

/// Floating point 2D vector, used for pen positions and texture coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vector2f {
    pub x: f32,
    pub y: f32,
}

impl Vector2f {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn round(self) -> Self {
        Self::new(self.x.round(), self.y.round())
    }
}

impl Add for Vector2f {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

/// Straight-alpha 8-bit colour
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Colourb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Colourb {
    pub const WHITE: Self = Self::new(255, 255, 255, 255);
    pub const BLACK: Self = Self::new(0, 0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Premultiply by alpha after scaling alpha by `opacity`
    pub fn to_premultiplied(self, opacity: f32) -> ColourbPremultiplied {
        let a = (f32::from(self.a) * opacity.clamp(0.0, 1.0)).round();
        let scale = |channel: u8| ((f32::from(channel) * a) / 255.0).round() as u8;
        ColourbPremultiplied {
            r: scale(self.r),
            g: scale(self.g),
            b: scale(self.b),
            a: a as u8,
        }
    }
}

impl Default for Colourb {
    fn default() -> Self {
        Self::WHITE
    }
}

impl fmt::Display for Colourb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
    }
}

/// Premultiplied-alpha 8-bit colour, the format vertices are emitted in
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ColourbPremultiplied {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl ColourbPremultiplied {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque white scaled by `alpha`, used to show colour glyphs untinted
    pub const fn white(alpha: u8) -> Self {
        Self::new(alpha, alpha, alpha, alpha)
    }

    pub const fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

/// Font style
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FontStyle {
    #[default]
    Normal,
    Italic,
}

/// Font weight on the usual 100..=900 scale
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FontWeight(pub u16);

impl FontWeight {
    pub const THIN: Self = Self(100);
    pub const LIGHT: Self = Self(300);
    pub const NORMAL: Self = Self(400);
    pub const MEDIUM: Self = Self(500);
    pub const BOLD: Self = Self(700);
    pub const BLACK: Self = Self(900);

    /// Absolute difference used for nearest-weight matching
    pub fn distance(self, other: Self) -> u16 {
        self.0.abs_diff(other.0)
    }
}

impl Default for FontWeight {
    fn default() -> Self {
        Self::NORMAL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_premultiply_full_opacity() {
        let c = Colourb::new(255, 128, 0, 128).to_premultiplied(1.0);
        assert_eq!(c, ColourbPremultiplied::new(128, 64, 0, 128));
    }

    #[test]
    fn test_premultiply_with_opacity() {
        let c = Colourb::WHITE.to_premultiplied(0.5);
        assert_eq!(c.a, 128);
        assert_eq!(c.r, 128);
    }

    #[test]
    fn test_colour_display() {
        assert_eq!(Colourb::new(255, 0, 16, 255).to_string(), "#ff0010ff");
    }

    #[test]
    fn test_weight_distance() {
        assert_eq!(FontWeight::NORMAL.distance(FontWeight::BOLD), 300);
        assert_eq!(FontWeight::BOLD.distance(FontWeight::NORMAL), 300);
    }
}
