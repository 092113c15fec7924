//! Math utilities and types
//!
//! Provides the small set of math types the scene facade passes across the
//! backend boundary.

use serde::{Deserialize, Serialize};

pub use nalgebra::{Unit, Vector2, Vector3};

/// 2D vector type
pub type Vec2 = Vector2<f32>;

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// A finite line segment cast through the scene
///
/// Mirrors the "line" the rendering backend expects: a start point and an end
/// point rather than an origin with an unbounded direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Where the ray starts
    pub start: Vec3,
    /// Where the ray ends
    pub end: Vec3,
}

impl Ray {
    /// Create a ray from explicit end points
    pub const fn new(start: Vec3, end: Vec3) -> Self {
        Self { start, end }
    }

    /// Create a ray starting at `origin`, pointing at `target`, `length` units long
    ///
    /// A degenerate direction (`target == origin`) produces a zero-length ray.
    pub fn towards(origin: Vec3, target: Vec3, length: f32) -> Self {
        let direction = (target - origin)
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vec3::zeros);
        Self {
            start: origin,
            end: origin + direction * length,
        }
    }

    /// Length of the segment
    pub fn length(&self) -> f32 {
        (self.end - self.start).norm()
    }

    /// Unit direction, or `None` for a zero-length ray
    pub fn direction(&self) -> Option<Unit<Vec3>> {
        Unit::try_new(self.end - self.start, f32::EPSILON)
    }
}

/// Integer rectangle in screen space (upper-left inclusive, lower-right exclusive)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenRect {
    /// Left edge
    pub left: i32,
    /// Top edge
    pub top: i32,
    /// Right edge
    pub right: i32,
    /// Bottom edge
    pub bottom: i32,
}

impl ScreenRect {
    /// Create a rectangle from its edges
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self { left, top, right, bottom }
    }

    /// Rectangle width (zero if inverted)
    pub const fn width(&self) -> i32 {
        if self.right > self.left { self.right - self.left } else { 0 }
    }

    /// Rectangle height (zero if inverted)
    pub const fn height(&self) -> i32 {
        if self.bottom > self.top { self.bottom - self.top } else { 0 }
    }
}

/// 8-bit ARGB color as used by the GUI layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    /// Alpha
    pub a: u8,
    /// Red
    pub r: u8,
    /// Green
    pub g: u8,
    /// Blue
    pub b: u8,
}

impl Color {
    /// Opaque white
    pub const WHITE: Self = Self::argb(0xff, 0xff, 0xff, 0xff);

    /// Build a color from its channels
    pub const fn argb(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self { a, r, g, b }
    }

    /// Pack into a single `0xAARRGGBB` word
    pub const fn to_u32(self) -> u32 {
        (self.a as u32) << 24 | (self.r as u32) << 16 | (self.g as u32) << 8 | self.b as u32
    }
}

/// Floating point RGBA color used by lights
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorF {
    /// Red
    pub r: f32,
    /// Green
    pub g: f32,
    /// Blue
    pub b: f32,
    /// Alpha
    pub a: f32,
}

impl ColorF {
    /// Opaque white
    pub const WHITE: Self = Self { r: 1.0, g: 1.0, b: 1.0, a: 1.0 };
}
