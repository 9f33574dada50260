//! RGBA colors parsed from hex strings.

use serde::{Deserialize, Serialize};

/// A straight-alpha color with components in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Rgba {
    /// Fully transparent black.
    pub const CLEAR: Rgba = Rgba {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };

    pub const WHITE: Rgba = Rgba {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };

    /// Parse `RRGGBB` or `RRGGBBAA`, with optional leading `#`.
    ///
    /// Surrounding whitespace is ignored and digits are case-insensitive.
    /// Returns `None` for any other length or a non-hex digit.
    pub fn from_hex(hex: &str) -> Option<Rgba> {
        let trimmed = hex.trim();
        let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
        if digits.len() != 6 && digits.len() != 8 {
            return None;
        }
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }

        let value = u32::from_str_radix(digits, 16).ok()?;
        let (rgb, alpha) = if digits.len() == 8 {
            (value >> 8, value & 0xFF)
        } else {
            (value, 0xFF)
        };

        Some(Rgba {
            r: ((rgb >> 16) & 0xFF) as f64 / 255.0,
            g: ((rgb >> 8) & 0xFF) as f64 / 255.0,
            b: (rgb & 0xFF) as f64 / 255.0,
            a: alpha as f64 / 255.0,
        })
    }

    /// Parse a hex color, resolving anything invalid to [`Rgba::CLEAR`].
    pub fn from_hex_or_clear(hex: &str) -> Rgba {
        Self::from_hex(hex).unwrap_or(Self::CLEAR)
    }

    /// Components quantized to 8 bits: `[r, g, b, a]`.
    pub fn to_rgba8(&self) -> [u8; 4] {
        let q = |c: f64| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    pub fn is_transparent(&self) -> bool {
        self.a <= 0.0
    }
}
