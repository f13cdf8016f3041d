// SPDX-License-Identifier: MIT
//
// Color — palette colors in VGA order.
//
// Cells carry either the terminal's default color or an 8-bit palette
// index. The low 16 indices use VGA ordering: bit 3 is intensity, bits
// 2..0 are red, green, blue. ANSI SGR numbers the same colors with red
// and blue swapped, so every index below 16 is permuted through a fixed
// table right before emission. Indices 16..=255 (the xterm color cube
// and grayscale ramp) are the same in both orderings and pass through.
//
//   VGA   0 black   1 blue    2 green   3 cyan
//         4 red     5 magenta 6 brown   7 light gray
//         8..15 the intense variants
//
// Terminals with fewer colors get indices reduced on the way out:
// 8-color terminals keep the low three bits, 16-color terminals map the
// cube and ramp to the nearest of the 16 VGA colors.

use std::fmt;

// ─── Color ───────────────────────────────────────────────────────────────────

/// A cell color.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    /// The terminal's own default foreground or background.
    #[default]
    Default,
    /// Palette index, VGA order below 16.
    Indexed(u8),
}

impl Color {
    pub const BLACK: Self = Self::Indexed(0);
    pub const BLUE: Self = Self::Indexed(1);
    pub const GREEN: Self = Self::Indexed(2);
    pub const CYAN: Self = Self::Indexed(3);
    pub const RED: Self = Self::Indexed(4);
    pub const MAGENTA: Self = Self::Indexed(5);
    pub const BROWN: Self = Self::Indexed(6);
    pub const LIGHT_GRAY: Self = Self::Indexed(7);
    pub const DARK_GRAY: Self = Self::Indexed(8);
    pub const LIGHT_BLUE: Self = Self::Indexed(9);
    pub const LIGHT_GREEN: Self = Self::Indexed(10);
    pub const LIGHT_CYAN: Self = Self::Indexed(11);
    pub const LIGHT_RED: Self = Self::Indexed(12);
    pub const LIGHT_MAGENTA: Self = Self::Indexed(13);
    pub const YELLOW: Self = Self::Indexed(14);
    pub const WHITE: Self = Self::Indexed(15);

    /// The palette index, `None` for the default color.
    #[inline]
    #[must_use]
    pub const fn index(self) -> Option<u8> {
        match self {
            Self::Default => None,
            Self::Indexed(i) => Some(i),
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_default(self) -> bool {
        matches!(self, Self::Default)
    }

    /// The SGR color number for this color, `None` for the default color.
    #[inline]
    #[must_use]
    pub const fn to_ansi(self) -> Option<u8> {
        match self {
            Self::Default => None,
            Self::Indexed(i) => Some(vga_to_ansi(i)),
        }
    }

    /// Reduce the color to what a terminal with `max_colors` colors can
    /// show. The default color is never reduced.
    #[must_use]
    pub fn reduce(self, max_colors: u16) -> Self {
        let Self::Indexed(i) = self else {
            return self;
        };
        if u16::from(i) < max_colors {
            return self;
        }
        let vga16 = if i < 16 { i } else { palette::nearest_vga16(i) };
        if max_colors <= 8 {
            Self::Indexed(vga16 & 0x07)
        } else {
            Self::Indexed(vga16)
        }
    }
}

impl fmt::Debug for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Indexed(i) => write!(f, "color({i})"),
        }
    }
}

impl From<u8> for Color {
    #[inline]
    fn from(index: u8) -> Self {
        Self::Indexed(index)
    }
}

// ─── VGA → ANSI ──────────────────────────────────────────────────────────────

/// Permutation of the low 16 palette entries from VGA to ANSI order.
pub const VGA_TO_ANSI: [u8; 16] = [0, 4, 2, 6, 1, 5, 3, 7, 8, 12, 10, 14, 9, 13, 11, 15];

/// Map a VGA-ordered palette index to the ANSI SGR color number.
#[inline]
#[must_use]
pub const fn vga_to_ansi(index: u8) -> u8 {
    if index < 16 {
        VGA_TO_ANSI[index as usize]
    } else {
        index
    }
}

// ─── Palette ─────────────────────────────────────────────────────────────────

pub mod palette {
    //! RGB values of the 256-entry palette and nearest-color reduction.

    /// The 16 base colors in VGA order, as the Linux console shows them.
    pub const VGA16_RGB: [(u8, u8, u8); 16] = [
        (0x00, 0x00, 0x00), // black
        (0x00, 0x00, 0xaa), // blue
        (0x00, 0xaa, 0x00), // green
        (0x00, 0xaa, 0xaa), // cyan
        (0xaa, 0x00, 0x00), // red
        (0xaa, 0x00, 0xaa), // magenta
        (0xaa, 0x55, 0x00), // brown
        (0xaa, 0xaa, 0xaa), // light gray
        (0x55, 0x55, 0x55), // dark gray
        (0x55, 0x55, 0xff), // light blue
        (0x55, 0xff, 0x55), // light green
        (0x55, 0xff, 0xff), // light cyan
        (0xff, 0x55, 0x55), // light red
        (0xff, 0x55, 0xff), // light magenta
        (0xff, 0xff, 0x55), // yellow
        (0xff, 0xff, 0xff), // white
    ];

    /// RGB value of a palette index (VGA order below 16).
    #[must_use]
    pub fn rgb(index: u8) -> (u8, u8, u8) {
        match index {
            0..=15 => VGA16_RGB[index as usize],
            16..=231 => {
                let i = index - 16;
                let level = |v: u8| if v == 0 { 0 } else { 55 + 40 * v };
                (level(i / 36), level((i % 36) / 6), level(i % 6))
            }
            232..=255 => {
                let v = 8 + 10 * (index - 232);
                (v, v, v)
            }
        }
    }

    /// The closest of the 16 base colors, by squared RGB distance.
    #[must_use]
    pub fn nearest_vga16(index: u8) -> u8 {
        if index < 16 {
            return index;
        }
        let (r, g, b) = rgb(index);
        let dist = |(pr, pg, pb): (u8, u8, u8)| {
            let dr = i32::from(r) - i32::from(pr);
            let dg = i32::from(g) - i32::from(pg);
            let db = i32::from(b) - i32::from(pb);
            dr * dr + dg * dg + db * db
        };
        let mut best = 0u8;
        let mut best_dist = i32::MAX;
        for (i, &entry) in VGA16_RGB.iter().enumerate() {
            let d = dist(entry);
            if d < best_dist {
                best_dist = d;
                best = i as u8;
            }
        }
        best
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── VGA → ANSI ───────────────────────────────────────────────────────

    #[test]
    fn ansi_swaps_red_and_blue() {
        assert_eq!(Color::BLUE.to_ansi(), Some(4));
        assert_eq!(Color::RED.to_ansi(), Some(1));
        assert_eq!(Color::CYAN.to_ansi(), Some(6));
        assert_eq!(Color::BROWN.to_ansi(), Some(3));
        assert_eq!(Color::LIGHT_BLUE.to_ansi(), Some(12));
        assert_eq!(Color::YELLOW.to_ansi(), Some(11));
    }

    #[test]
    fn ansi_keeps_green_gray_and_symmetric_entries() {
        for i in [0u8, 2, 5, 7, 8, 10, 13, 15] {
            assert_eq!(vga_to_ansi(i), i, "index {i}");
        }
    }

    #[test]
    fn ansi_permutation_is_an_involution() {
        for i in 0..16u8 {
            assert_eq!(vga_to_ansi(vga_to_ansi(i)), i);
        }
    }

    #[test]
    fn extended_indices_pass_through() {
        for i in 16..=255u8 {
            assert_eq!(vga_to_ansi(i), i);
        }
    }

    #[test]
    fn default_has_no_ansi_number() {
        assert_eq!(Color::Default.to_ansi(), None);
        assert!(Color::default().is_default());
    }

    // ── Reduction ────────────────────────────────────────────────────────

    #[test]
    fn reduce_keeps_supported_colors() {
        assert_eq!(Color::Indexed(200).reduce(256), Color::Indexed(200));
        assert_eq!(Color::YELLOW.reduce(16), Color::YELLOW);
        assert_eq!(Color::Default.reduce(8), Color::Default);
    }

    #[test]
    fn reduce_to_eight_drops_intensity() {
        assert_eq!(Color::YELLOW.reduce(8), Color::BROWN);
        assert_eq!(Color::WHITE.reduce(8), Color::LIGHT_GRAY);
        assert_eq!(Color::DARK_GRAY.reduce(8), Color::BLACK);
    }

    #[test]
    fn reduce_cube_to_sixteen() {
        // Pure cube red (5,0,0) and pure cube blue (0,0,5).
        assert_eq!(Color::Indexed(196).reduce(16), Color::RED);
        assert_eq!(Color::Indexed(21).reduce(16), Color::BLUE);
        // Light cube red (5,1,1) lands on the intense variant.
        assert_eq!(Color::Indexed(203).reduce(16), Color::LIGHT_RED);
        // Cube origin is black, cube corner is white.
        assert_eq!(Color::Indexed(16).reduce(16), Color::BLACK);
        assert_eq!(Color::Indexed(231).reduce(16), Color::WHITE);
    }

    #[test]
    fn reduce_grayscale_ramp() {
        assert_eq!(Color::Indexed(232).reduce(16), Color::BLACK);
        assert_eq!(Color::Indexed(255).reduce(16), Color::WHITE);
        assert_eq!(Color::Indexed(243).reduce(16), Color::DARK_GRAY);
    }

    // ── Palette ──────────────────────────────────────────────────────────

    #[test]
    fn palette_cube_levels() {
        assert_eq!(palette::rgb(16), (0, 0, 0));
        assert_eq!(palette::rgb(17), (0, 0, 95));
        assert_eq!(palette::rgb(231), (255, 255, 255));
    }

    #[test]
    fn debug_format() {
        assert_eq!(format!("{:?}", Color::Default), "default");
        assert_eq!(format!("{:?}", Color::Indexed(42)), "color(42)");
    }
}
