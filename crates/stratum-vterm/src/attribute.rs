// SPDX-License-Identifier: MIT
//
// TextStyle — colors, attributes and compositing class of the next
// printed character.
//
// Print operations stamp this state onto every glyph they write. The
// setters take a flag so a widget can switch a single attribute on for a
// run of text and off again afterwards without touching the others.

use stratum_term::{Attr, Cell, CellFlags, Color};

/// State applied to every printed glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextStyle {
    pub fg: Color,
    pub bg: Color,
    pub attrs: Attr,
    /// Transparency class only; bookkeeping flags never live here.
    pub flags: CellFlags,
}

impl TextStyle {
    /// Default colors, no attributes, opaque.
    pub const NORMAL: Self = Self {
        fg: Color::Default,
        bg: Color::Default,
        attrs: Attr::empty(),
        flags: CellFlags::empty(),
    };

    #[inline]
    pub fn set_color(&mut self, fg: Color, bg: Color) {
        self.fg = fg;
        self.bg = bg;
    }

    /// Back to [`TextStyle::NORMAL`].
    #[inline]
    pub fn set_normal(&mut self) {
        *self = Self::NORMAL;
    }

    #[inline]
    fn set_attr(&mut self, attr: Attr, enable: bool) {
        self.attrs.set(attr, enable);
    }

    pub fn set_bold(&mut self, enable: bool) {
        self.set_attr(Attr::BOLD, enable);
    }

    pub fn set_dim(&mut self, enable: bool) {
        self.set_attr(Attr::DIM, enable);
    }

    pub fn set_italic(&mut self, enable: bool) {
        self.set_attr(Attr::ITALIC, enable);
    }

    pub fn set_underline(&mut self, enable: bool) {
        self.set_attr(Attr::UNDERLINE, enable);
    }

    pub fn set_double_underline(&mut self, enable: bool) {
        self.set_attr(Attr::DBL_UNDERLINE, enable);
    }

    pub fn set_blink(&mut self, enable: bool) {
        self.set_attr(Attr::BLINK, enable);
    }

    pub fn set_reverse(&mut self, enable: bool) {
        self.set_attr(Attr::REVERSE, enable);
    }

    pub fn set_standout(&mut self, enable: bool) {
        self.set_attr(Attr::STANDOUT, enable);
    }

    pub fn set_invisible(&mut self, enable: bool) {
        self.set_attr(Attr::INVISIBLE, enable);
    }

    pub fn set_protected(&mut self, enable: bool) {
        self.set_attr(Attr::PROTECTED, enable);
    }

    pub fn set_crossed_out(&mut self, enable: bool) {
        self.set_attr(Attr::CROSSED_OUT, enable);
    }

    /// Glyphs are VT100 graphics keys. Excludes the PC charset.
    pub fn set_alt_charset(&mut self, enable: bool) {
        self.set_attr(Attr::ALT_CHARSET, enable);
        if enable {
            self.attrs.remove(Attr::PC_CHARSET);
        }
    }

    /// Glyphs are code page 437 bytes. Excludes the alternate charset.
    pub fn set_pc_charset(&mut self, enable: bool) {
        self.set_attr(Attr::PC_CHARSET, enable);
        if enable {
            self.attrs.remove(Attr::ALT_CHARSET);
        }
    }

    // ─── Compositing class ────────────────────────────────────────────────
    //
    // A cell has at most one transparency class, so each setter replaces
    // the others.

    #[inline]
    fn set_class(&mut self, class: CellFlags, enable: bool) {
        self.flags.remove(CellFlags::TRANSPARENCY);
        if enable {
            self.flags.insert(class);
        }
    }

    pub fn set_transparent(&mut self, enable: bool) {
        self.set_class(CellFlags::TRANSPARENT, enable);
    }

    pub fn set_color_overlay(&mut self, enable: bool) {
        self.set_class(CellFlags::COLOR_OVERLAY, enable);
    }

    pub fn set_inherit_background(&mut self, enable: bool) {
        self.set_class(CellFlags::INHERIT_BACKGROUND, enable);
    }

    /// Switch on every attribute in `style`. An empty style resets to
    /// normal.
    pub fn apply_style(&mut self, style: Attr) {
        if style.is_empty() {
            self.set_normal();
        } else {
            self.attrs |= style;
        }
    }

    /// `cell`'s glyph in this style. The cell's measured width is kept.
    #[must_use]
    pub fn stamp(&self, cell: &Cell) -> Cell {
        Cell {
            fg: self.fg,
            bg: self.bg,
            attrs: self.attrs,
            flags: (cell.flags & CellFlags::FULLWIDTH_PADDING) | self.flags,
            ..*cell
        }
    }

    /// A single-character cell in this style.
    #[must_use]
    pub fn cell(&self, ch: char) -> Cell {
        Cell::styled(ch, self.fg, self.bg, self.attrs).with_flags(self.flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn setters_toggle_single_attributes() {
        let mut style = TextStyle::default();
        style.set_bold(true);
        style.set_underline(true);
        style.set_bold(false);
        assert_eq!(style.attrs, Attr::UNDERLINE);
    }

    #[test]
    fn charsets_exclude_each_other() {
        let mut style = TextStyle::default();
        style.set_alt_charset(true);
        style.set_pc_charset(true);
        assert_eq!(style.attrs, Attr::PC_CHARSET);
        style.set_alt_charset(true);
        assert_eq!(style.attrs, Attr::ALT_CHARSET);
    }

    #[test]
    fn one_transparency_class_at_a_time() {
        let mut style = TextStyle::default();
        style.set_transparent(true);
        style.set_color_overlay(true);
        assert_eq!(style.flags, CellFlags::COLOR_OVERLAY);
        style.set_color_overlay(false);
        assert!(style.flags.is_empty());
    }

    #[test]
    fn empty_style_resets() {
        let mut style = TextStyle::default();
        style.set_color(Color::RED, Color::BLUE);
        style.apply_style(Attr::BOLD | Attr::ITALIC);
        assert_eq!(style.attrs, Attr::BOLD | Attr::ITALIC);
        style.apply_style(Attr::empty());
        assert_eq!(style, TextStyle::NORMAL);
    }

    #[test]
    fn stamp_keeps_glyph_and_width() {
        let mut style = TextStyle::default();
        style.set_color(Color::RED, Color::BLUE);
        style.set_inherit_background(true);
        let cell = style.stamp(&Cell::from_grapheme("中"));
        assert_eq!(cell.base(), '中');
        assert_eq!(cell.width, 2);
        assert_eq!((cell.fg, cell.bg), (Color::RED, Color::BLUE));
        assert!(cell.is_inherit_background());
    }
}
