//! Geometric primitives for render transforms.

use glam::{Affine2, Mat3, Vec2 as GlamVec2};
use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI};

/// 2D vector.
pub type Vec2 = GlamVec2;

/// Pixel dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    /// Create a new size.
    #[inline]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Size with width and height swapped.
    #[inline]
    pub fn transposed(self) -> Self {
        Self::new(self.height, self.width)
    }

    /// Check for a degenerate (zero or negative) size.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Width divided by height.
    #[inline]
    pub fn aspect(self) -> f32 {
        self.width / self.height
    }
}

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    /// Create a new rectangle.
    #[inline]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle at the origin covering `size`.
    #[inline]
    pub fn from_size(size: Size) -> Self {
        Self::new(0.0, 0.0, size.width, size.height)
    }

    /// Create a rectangle from center and size.
    pub fn from_center_size(center: Vec2, size: Vec2) -> Self {
        Self {
            x: center.x - size.x * 0.5,
            y: center.y - size.y * 0.5,
            width: size.x,
            height: size.y,
        }
    }

    /// Center point.
    #[inline]
    pub fn center(self) -> Vec2 {
        Vec2::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    /// Size as a vector.
    #[inline]
    pub fn size(self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    /// Compute intersection with another rectangle.
    pub fn intersection(self, other: Self) -> Option<Self> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        if x1 < x2 && y1 < y2 {
            Some(Self::new(x1, y1, x2 - x1, y2 - y1))
        } else {
            None
        }
    }
}

/// How a source frame is rotated relative to how it should be displayed.
///
/// Phone footage commonly stores landscape pixels plus a rotation flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Up,
    /// Rotated 90° clockwise for display.
    Right,
    /// Rotated 180°.
    Down,
    /// Rotated 90° counter-clockwise for display.
    Left,
}

impl Orientation {
    /// Whether display swaps width and height.
    #[inline]
    pub fn is_transposed(self) -> bool {
        matches!(self, Self::Right | Self::Left)
    }

    /// Display size for a frame with the given natural (stored) size.
    pub fn oriented_size(self, natural: Size) -> Size {
        if self.is_transposed() {
            natural.transposed()
        } else {
            natural
        }
    }

    /// Transform mapping natural pixel coordinates into upright display
    /// coordinates with the origin at the top-left of the oriented frame.
    pub fn preferred_transform(self, natural: Size) -> Transform2D {
        match self {
            Self::Up => Transform2D::IDENTITY,
            Self::Right => {
                Transform2D::rotate(FRAC_PI_2).then(Transform2D::translate(natural.height, 0.0))
            }
            Self::Down => {
                Transform2D::rotate(PI).then(Transform2D::translate(natural.width, natural.height))
            }
            Self::Left => {
                Transform2D::rotate(-FRAC_PI_2).then(Transform2D::translate(0.0, natural.width))
            }
        }
    }
}

/// 2D affine transformation matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform2D {
    inner: Affine2,
}

impl Transform2D {
    /// Identity transform.
    pub const IDENTITY: Self = Self {
        inner: Affine2::IDENTITY,
    };

    /// Create a translation transform.
    #[inline]
    pub fn translate(x: f32, y: f32) -> Self {
        Self {
            inner: Affine2::from_translation(Vec2::new(x, y)),
        }
    }

    /// Create a scale transform.
    #[inline]
    pub fn scale(x: f32, y: f32) -> Self {
        Self {
            inner: Affine2::from_scale(Vec2::new(x, y)),
        }
    }

    /// Create a uniform scale transform.
    #[inline]
    pub fn scale_uniform(s: f32) -> Self {
        Self::scale(s, s)
    }

    /// Create a rotation transform (radians).
    #[inline]
    pub fn rotate(angle: f32) -> Self {
        Self {
            inner: Affine2::from_angle(angle),
        }
    }

    /// Create a transform from translation, rotation (radians), and scale.
    pub fn from_trs(translation: Vec2, rotation: f32, scale: Vec2) -> Self {
        Self {
            inner: Affine2::from_scale_angle_translation(scale, rotation, translation),
        }
    }

    /// Apply `self` first, then `next`.
    #[inline]
    pub fn then(self, next: Self) -> Self {
        Self {
            inner: next.inner * self.inner,
        }
    }

    /// Transform a point.
    #[inline]
    pub fn transform_point(self, point: Vec2) -> Vec2 {
        self.inner.transform_point2(point)
    }

    /// Transform a vector (ignores translation).
    #[inline]
    pub fn transform_vector(self, vec: Vec2) -> Vec2 {
        self.inner.transform_vector2(vec)
    }

    /// Get the inverse transform.
    #[inline]
    pub fn inverse(self) -> Self {
        Self {
            inner: self.inner.inverse(),
        }
    }

    /// Convert to a 3x3 matrix for the platform compositor.
    pub fn to_mat3(self) -> Mat3 {
        self.inner.into()
    }

    /// Translation component.
    pub fn translation(&self) -> Vec2 {
        self.inner.translation
    }
}

impl Default for Transform2D {
    fn default() -> Self {
        Self::IDENTITY
    }
}
