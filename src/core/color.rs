//! Entity Colors
//!
//! RGBA color plus the fixed palette the host assigns from at spawn.

use serde::{Serialize, Deserialize};

/// RGBA color, components in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Color {
    /// Red
    pub r: f32,
    /// Green
    pub g: f32,
    /// Blue
    pub b: f32,
    /// Alpha
    pub a: f32,
}

impl Color {
    /// Opaque red (default for a freshly created entity).
    pub const RED: Self = Self::rgb(1.0, 0.0, 0.0);
    /// Opaque blue
    pub const BLUE: Self = Self::rgb(0.0, 0.0, 1.0);
    /// Opaque green
    pub const GREEN: Self = Self::rgb(0.0, 1.0, 0.0);
    /// Opaque yellow (Unity-style 0.92 green)
    pub const YELLOW: Self = Self::rgb(1.0, 0.92, 0.016);
    /// Opaque magenta
    pub const MAGENTA: Self = Self::rgb(1.0, 0.0, 1.0);
    /// Opaque cyan
    pub const CYAN: Self = Self::rgb(0.0, 1.0, 1.0);

    /// Create an opaque color.
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Palette entry for the n-th spawned entity (wraps around).
    pub fn from_palette(index: usize) -> Self {
        PALETTE[index % PALETTE.len()]
    }

    /// Hex string `#rrggbb` for logs.
    pub fn to_hex(&self) -> String {
        let to_byte = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{}", hex::encode([to_byte(self.r), to_byte(self.g), to_byte(self.b)]))
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::RED
    }
}

/// Spawn-order palette. The first entry matches the default color.
pub const PALETTE: [Color; 6] = [
    Color::RED,
    Color::BLUE,
    Color::GREEN,
    Color::YELLOW,
    Color::MAGENTA,
    Color::CYAN,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_palette_wraps() {
        assert_eq!(Color::from_palette(0), Color::RED);
        assert_eq!(Color::from_palette(1), Color::BLUE);
        assert_eq!(Color::from_palette(PALETTE.len()), Color::RED);
    }

    #[test]
    fn test_hex() {
        assert_eq!(Color::RED.to_hex(), "#ff0000");
        assert_eq!(Color::CYAN.to_hex(), "#00ffff");
    }
}
