//! Affine transforms from source pixels to canvas pixels.

use serde::{Deserialize, Serialize};

use quickedit_project_model::geometry::{Rect, Size};

/// A 2D affine transform:
///
/// ```text
/// x' = a·x + c·y + tx
/// y' = b·x + d·y + ty
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffineTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

impl AffineTransform {
    pub const IDENTITY: AffineTransform = AffineTransform {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    pub fn scale(sx: f64, sy: f64) -> Self {
        Self {
            a: sx,
            d: sy,
            ..Self::IDENTITY
        }
    }

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self {
            tx,
            ty,
            ..Self::IDENTITY
        }
    }

    /// The transform that applies `self` first, then `other`.
    pub fn concatenating(&self, other: &AffineTransform) -> AffineTransform {
        AffineTransform {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            tx: self.tx * other.a + self.ty * other.c + other.tx,
            ty: self.tx * other.b + self.ty * other.d + other.ty,
        }
    }

    /// Map a point.
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.tx,
            self.b * x + self.d * y + self.ty,
        )
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl Default for AffineTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Place a video of `natural` size into `frame`.
///
/// Scales uniformly by `frame.height / natural.height`, centers the scaled
/// width inside `frame.width`, and moves the top edge to `frame.y`. The
/// frame's x origin is not added and the aspect ratio is never corrected.
pub fn fit_transform(natural: Size, frame: &Rect) -> AffineTransform {
    let scale = frame.height / natural.height;
    let scaled_width = natural.width * scale;
    let translate_x = (frame.width - scaled_width) / 2.0;
    AffineTransform::scale(scale, scale)
        .concatenating(&AffineTransform::translation(translate_x, frame.y))
}
