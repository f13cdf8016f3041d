// SPDX-License-Identifier: MIT
//
// Cell — the atomic unit of the character grid.
//
// Every position of every area is a Cell: a glyph of up to four code
// points (a base character plus combining marks), foreground and
// background colors, style attributes, compositing flags and a display
// width. The compositor merges cells between layers and the output engine
// turns them into bytes; both work on whole cells.
//
// Compositing flags:
//
//   TRANSPARENT         the layer below shows through unchanged
//   COLOR_OVERLAY       the layer below shows through, recolored with this
//                       cell's fg/bg (drop shadows, tinted panes)
//   INHERIT_BACKGROUND  this cell's glyph on the background of the layer
//                       below
//   FULLWIDTH_PADDING   zero-width companion of the wide glyph on its left
//   PRINTED             the physical terminal already shows this cell
//   NO_CHANGES          merged content equals what is already printed
//
// Equality compares glyph, colors, style attributes and the transparency
// class. The bookkeeping flags (printed, no-changes, padding) and the
// width are deliberately left out, so "would this look different on the
// screen" is a plain `==`.

use unicode_width::UnicodeWidthChar;

use crate::color::Color;

/// Code points a single cell can hold (base + combining marks).
pub const MAX_GLYPH_CHARS: usize = 4;

// ─── Style Attributes ────────────────────────────────────────────────────────

bitflags::bitflags! {
    /// Text attributes of a cell.
    ///
    /// ```
    /// use stratum_term::cell::Attr;
    ///
    /// let style = Attr::BOLD | Attr::REVERSE;
    /// assert!(style.contains(Attr::BOLD));
    /// assert!(!style.contains(Attr::DIM));
    /// ```
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct Attr: u16 {
        const BOLD          = 1 << 0;
        const DIM           = 1 << 1;
        const ITALIC        = 1 << 2;
        const UNDERLINE     = 1 << 3;
        const DBL_UNDERLINE = 1 << 4;
        const BLINK         = 1 << 5;
        const REVERSE       = 1 << 6;
        const STANDOUT      = 1 << 7;
        const INVISIBLE     = 1 << 8;
        const PROTECTED     = 1 << 9;
        const CROSSED_OUT   = 1 << 10;
        /// Glyph is a VT100 alternate-charset key, emitted as is.
        const ALT_CHARSET   = 1 << 11;
        /// Glyph is a code page 437 byte, emitted as is.
        const PC_CHARSET    = 1 << 12;
    }
}

bitflags::bitflags! {
    /// Compositing and bookkeeping flags of a cell.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct CellFlags: u8 {
        const TRANSPARENT        = 1 << 0;
        const COLOR_OVERLAY      = 1 << 1;
        const INHERIT_BACKGROUND = 1 << 2;
        const FULLWIDTH_PADDING  = 1 << 3;
        const PRINTED            = 1 << 4;
        const NO_CHANGES         = 1 << 5;
    }
}

impl CellFlags {
    /// The flags that make a cell let lower layers show through.
    pub const TRANSPARENCY: Self = Self::TRANSPARENT
        .union(Self::COLOR_OVERLAY)
        .union(Self::INHERIT_BACKGROUND);
}

/// Block glyphs that an overlay replaces with a plain space.
const SHADE_BLOCKS: [char; 6] = [
    '\u{2584}', // ▄ lower half block
    '\u{2580}', // ▀ upper half block
    '\u{258c}', // ▌ left half block
    '\u{2590}', // ▐ right half block
    '\u{2592}', // ▒ medium shade
    '\u{2588}', // █ full block
];

/// Whether `ch` is one of the half/full block or shade glyphs.
#[inline]
#[must_use]
pub fn is_shade_block(ch: char) -> bool {
    SHADE_BLOCKS.contains(&ch)
}

// ─── Cell ────────────────────────────────────────────────────────────────────

/// One character position.
#[derive(Clone, Copy)]
pub struct Cell {
    /// Glyph code points, `'\0'` terminated when shorter than the array.
    /// A padding cell has `'\0'` as its first code point.
    pub ch: [char; MAX_GLYPH_CHARS],
    pub fg: Color,
    pub bg: Color,
    pub attrs: Attr,
    pub flags: CellFlags,
    /// Display columns: 0, 1 or 2.
    pub width: u8,
}

const NUL: char = '\0';

impl Cell {
    /// A space with default colors and no attributes.
    pub const EMPTY: Self = Self {
        ch: [' ', NUL, NUL, NUL],
        fg: Color::Default,
        bg: Color::Default,
        attrs: Attr::empty(),
        flags: CellFlags::empty(),
        width: 1,
    };

    /// A cell holding `ch` with default styling. The width is measured.
    #[inline]
    #[must_use]
    pub fn new(ch: char) -> Self {
        Self {
            ch: [ch, NUL, NUL, NUL],
            width: char_width(ch),
            ..Self::EMPTY
        }
    }

    /// A fully styled cell.
    #[must_use]
    pub fn styled(ch: char, fg: Color, bg: Color, attrs: Attr) -> Self {
        Self {
            fg,
            bg,
            attrs,
            ..Self::new(ch)
        }
    }

    /// A cell from a grapheme cluster: the first code point is the base,
    /// up to three more are kept as combining marks. Extra marks are
    /// dropped.
    #[must_use]
    pub fn from_grapheme(grapheme: &str) -> Self {
        let mut ch = [NUL; MAX_GLYPH_CHARS];
        for (slot, c) in ch.iter_mut().zip(grapheme.chars()) {
            *slot = c;
        }
        let width = unicode_width::UnicodeWidthStr::width(grapheme).min(2) as u8;
        Self {
            ch,
            width,
            ..Self::EMPTY
        }
    }

    /// The zero-width companion that follows a wide glyph.
    #[inline]
    #[must_use]
    pub fn padding(fg: Color, bg: Color, attrs: Attr) -> Self {
        Self {
            ch: [NUL; MAX_GLYPH_CHARS],
            fg,
            bg,
            attrs,
            flags: CellFlags::FULLWIDTH_PADDING,
            width: 0,
        }
    }

    // ─── Queries ──────────────────────────────────────────────────────────

    /// The base code point.
    #[inline]
    #[must_use]
    pub const fn base(&self) -> char {
        self.ch[0]
    }

    /// All code points of the glyph.
    pub fn chars(&self) -> impl Iterator<Item = char> + '_ {
        self.ch.iter().copied().take_while(|&c| c != NUL)
    }

    /// The glyph as a string.
    #[must_use]
    pub fn glyph(&self) -> String {
        self.chars().collect()
    }

    #[inline]
    #[must_use]
    pub const fn is_padding(&self) -> bool {
        self.flags.contains(CellFlags::FULLWIDTH_PADDING)
    }

    #[inline]
    #[must_use]
    pub const fn is_transparent(&self) -> bool {
        self.flags.contains(CellFlags::TRANSPARENT)
    }

    #[inline]
    #[must_use]
    pub const fn is_color_overlay(&self) -> bool {
        self.flags.contains(CellFlags::COLOR_OVERLAY)
    }

    #[inline]
    #[must_use]
    pub const fn is_inherit_background(&self) -> bool {
        self.flags.contains(CellFlags::INHERIT_BACKGROUND)
    }

    /// Whether any transparency class is set.
    #[inline]
    #[must_use]
    pub const fn has_transparency(&self) -> bool {
        self.flags.intersects(CellFlags::TRANSPARENCY)
    }

    #[inline]
    #[must_use]
    pub const fn is_printed(&self) -> bool {
        self.flags.contains(CellFlags::PRINTED)
    }

    #[inline]
    #[must_use]
    pub const fn has_no_changes(&self) -> bool {
        self.flags.contains(CellFlags::NO_CHANGES)
    }

    /// Display width measured from the glyph, ignoring the stored value.
    #[must_use]
    pub fn measured_width(&self) -> u8 {
        if self.is_padding() {
            return 0;
        }
        let s = self.glyph();
        unicode_width::UnicodeWidthStr::width(s.as_str()).min(2) as u8
    }

    // ─── Builders ─────────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub const fn with_fg(self, fg: Color) -> Self {
        Self { fg, ..self }
    }

    #[inline]
    #[must_use]
    pub const fn with_bg(self, bg: Color) -> Self {
        Self { bg, ..self }
    }

    #[inline]
    #[must_use]
    pub const fn with_attrs(self, attrs: Attr) -> Self {
        Self { attrs, ..self }
    }

    #[inline]
    #[must_use]
    pub const fn with_flags(self, flags: CellFlags) -> Self {
        Self { flags, ..self }
    }

    /// Replace the glyph with a single code point, keeping the style.
    #[must_use]
    pub fn with_char(self, ch: char) -> Self {
        Self {
            ch: [ch, NUL, NUL, NUL],
            width: char_width(ch),
            ..self
        }
    }

    /// The cell as seen through an overlay with the given colors: reverse
    /// and standout are dropped, block and shade glyphs become a space.
    #[must_use]
    pub fn shaded(self, fg: Color, bg: Color) -> Self {
        let mut cell = Self {
            fg,
            bg,
            attrs: self.attrs - (Attr::REVERSE | Attr::STANDOUT),
            ..self
        };
        if is_shade_block(cell.base()) {
            cell = cell.with_char(' ');
        }
        cell
    }

    /// Whether two cells share colors and attributes.
    #[inline]
    #[must_use]
    pub fn same_style(&self, other: &Self) -> bool {
        self.fg == other.fg && self.bg == other.bg && self.attrs == other.attrs
    }
}

/// Display width of a single code point, clamped to 0..=2.
#[inline]
#[must_use]
pub fn char_width(ch: char) -> u8 {
    ch.width().unwrap_or(0).min(2) as u8
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.ch == other.ch
            && self.fg == other.fg
            && self.bg == other.bg
            && self.attrs == other.attrs
            && (self.flags & CellFlags::TRANSPARENCY) == (other.flags & CellFlags::TRANSPARENCY)
    }
}

impl Eq for Cell {}

impl Default for Cell {
    #[inline]
    fn default() -> Self {
        Self::EMPTY
    }
}

impl std::fmt::Debug for Cell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_padding() {
            return write!(f, "Cell(padding)");
        }
        write!(f, "Cell({:?}", self.glyph())?;
        if self.fg != Color::Default {
            write!(f, ", fg={:?}", self.fg)?;
        }
        if self.bg != Color::Default {
            write!(f, ", bg={:?}", self.bg)?;
        }
        if !self.attrs.is_empty() {
            write!(f, ", {:?}", self.attrs)?;
        }
        let class = self.flags & CellFlags::TRANSPARENCY;
        if !class.is_empty() {
            write!(f, ", {class:?}")?;
        }
        write!(f, ")")
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::mem;

    // ── Layout ───────────────────────────────────────────────────────────

    #[test]
    fn attr_is_2_bytes() {
        assert_eq!(mem::size_of::<Attr>(), 2);
    }

    #[test]
    fn flags_are_1_byte() {
        assert_eq!(mem::size_of::<CellFlags>(), 1);
    }

    #[test]
    fn cell_is_copy() {
        let a = Cell::EMPTY;
        let b = a;
        assert_eq!(a, b);
    }

    // ── Construction ─────────────────────────────────────────────────────

    #[test]
    fn default_cell_is_space() {
        let cell = Cell::default();
        assert_eq!(cell.base(), ' ');
        assert_eq!(cell.width, 1);
        assert_eq!(cell.fg, Color::Default);
        assert_eq!(cell.bg, Color::Default);
        assert!(cell.attrs.is_empty());
        assert!(cell.flags.is_empty());
    }

    #[test]
    fn new_measures_width() {
        assert_eq!(Cell::new('A').width, 1);
        assert_eq!(Cell::new('中').width, 2);
        assert_eq!(Cell::new('\u{0301}').width, 0);
    }

    #[test]
    fn from_grapheme_keeps_combining_marks() {
        let cell = Cell::from_grapheme("e\u{0301}");
        assert_eq!(cell.chars().collect::<Vec<_>>(), vec!['e', '\u{0301}']);
        assert_eq!(cell.width, 1);
        assert_eq!(cell.glyph(), "e\u{0301}");
    }

    #[test]
    fn from_grapheme_truncates_long_clusters() {
        let cell = Cell::from_grapheme("a\u{0300}\u{0301}\u{0302}\u{0303}");
        assert_eq!(cell.chars().count(), MAX_GLYPH_CHARS);
    }

    #[test]
    fn padding_cell() {
        let cell = Cell::padding(Color::RED, Color::BLUE, Attr::BOLD);
        assert!(cell.is_padding());
        assert_eq!(cell.width, 0);
        assert_eq!(cell.chars().count(), 0);
        assert_eq!(cell.measured_width(), 0);
        assert_eq!(cell.bg, Color::BLUE);
    }

    // ── Equality ─────────────────────────────────────────────────────────

    #[test]
    fn equality_ignores_bookkeeping_flags() {
        let a = Cell::new('x');
        let b = a.with_flags(CellFlags::PRINTED | CellFlags::NO_CHANGES);
        assert_eq!(a, b);
    }

    #[test]
    fn equality_ignores_width() {
        let a = Cell::new('x');
        let b = Cell { width: 0, ..a };
        assert_eq!(a, b);
    }

    #[test]
    fn equality_sees_transparency_class() {
        let a = Cell::new('x');
        assert_ne!(a, a.with_flags(CellFlags::TRANSPARENT));
        assert_ne!(a, a.with_flags(CellFlags::COLOR_OVERLAY));
        assert_ne!(a, a.with_flags(CellFlags::INHERIT_BACKGROUND));
    }

    #[test]
    fn equality_sees_style() {
        let a = Cell::new('x');
        assert_ne!(a, a.with_fg(Color::RED));
        assert_ne!(a, a.with_bg(Color::RED));
        assert_ne!(a, a.with_attrs(Attr::BOLD));
        assert_ne!(a, Cell::new('y'));
    }

    // ── Overlay shading ──────────────────────────────────────────────────

    #[test]
    fn shaded_takes_colors_and_drops_reverse() {
        let cell = Cell::styled('a', Color::WHITE, Color::BLUE, Attr::REVERSE | Attr::BOLD);
        let shaded = cell.shaded(Color::DARK_GRAY, Color::BLACK);
        assert_eq!(shaded.base(), 'a');
        assert_eq!(shaded.fg, Color::DARK_GRAY);
        assert_eq!(shaded.bg, Color::BLACK);
        assert_eq!(shaded.attrs, Attr::BOLD);
    }

    #[test]
    fn shaded_blanks_block_glyphs() {
        for ch in ['▄', '▀', '▌', '▐', '▒', '█'] {
            let shaded = Cell::new(ch).shaded(Color::BLACK, Color::BLACK);
            assert_eq!(shaded.base(), ' ', "glyph {ch}");
        }
        assert_eq!(Cell::new('░').shaded(Color::BLACK, Color::BLACK).base(), '░');
    }

    #[test]
    fn has_transparency_classes() {
        assert!(!Cell::EMPTY.has_transparency());
        assert!(Cell::EMPTY.with_flags(CellFlags::COLOR_OVERLAY).has_transparency());
        assert!(!Cell::EMPTY.with_flags(CellFlags::PRINTED).has_transparency());
    }

    // ── Debug ────────────────────────────────────────────────────────────

    #[test]
    fn debug_format() {
        assert_eq!(format!("{:?}", Cell::new('A')), "Cell(\"A\")");
        let styled = Cell::styled('B', Color::RED, Color::Default, Attr::BOLD);
        assert_eq!(format!("{styled:?}"), "Cell(\"B\", fg=color(4), Attr(BOLD))");
        assert_eq!(
            format!("{:?}", Cell::padding(Color::Default, Color::Default, Attr::empty())),
            "Cell(padding)"
        );
    }
}
