// SPDX-License-Identifier: MIT
//
// Print operations.
//
// Text goes into an area at its print cursor in the current text style.
// Strings are split into grapheme clusters, so a base character and its
// combining marks share one cell. A handful of control characters move
// the cursor instead of printing:
//
//   \n  next row, first column      \t  next tab stop
//   \r  first column                \b  one column left
//   \a  terminal bell
//
// Passing the right edge of an area wraps to the next row. Passing the
// last row stops the print with `AreaError::EndOfArea`; everything up to
// and including the glyph that reached the edge was written.

use std::io::Write;

use stratum_term::encoding::Encoding;
use stratum_term::{Cell, Point};
use unicode_segmentation::UnicodeSegmentation;

use crate::compositor::{AreaId, Compositor};
use crate::error::Result;

const fn is_cursor_control(ch: char) -> bool {
    matches!(ch, '\n' | '\r' | '\t' | '\u{8}' | '\u{7}')
}

impl<W: Write> Compositor<W> {
    /// Print `text` into area `id`. Returns the number of grapheme
    /// clusters consumed, control characters included.
    ///
    /// # Errors
    ///
    /// [`AreaError::EndOfArea`](crate::AreaError::EndOfArea) once the
    /// cursor passes the last row, [`AreaError::UnknownArea`](crate::AreaError::UnknownArea)
    /// for a stale handle.
    pub fn print_str(&mut self, id: AreaId, text: &str) -> Result<usize> {
        let mut count = 0;
        for grapheme in text.graphemes(true) {
            let mut chars = grapheme.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) if is_cursor_control(ch) => self.print_control(id, ch)?,
                // CR LF is a single cluster
                (Some('\r'), Some('\n')) => self.print_control(id, '\n')?,
                _ => {
                    let cell = self.style().stamp(&Cell::from_grapheme(grapheme));
                    self.put_glyph(id, &cell)?;
                }
            }
            count += 1;
        }
        Ok(count)
    }

    /// Print a single character into area `id`.
    ///
    /// # Errors
    ///
    /// As [`print_str`](Self::print_str).
    pub fn print_char(&mut self, id: AreaId, ch: char) -> Result<usize> {
        if is_cursor_control(ch) {
            self.print_control(id, ch)?;
            return Ok(1);
        }
        let cell = self.style().cell(ch);
        self.put_glyph(id, &cell)
    }

    /// Print a ready-made cell into area `id`, keeping its own style.
    /// Returns 0 for a zero-width cell that was skipped.
    ///
    /// # Errors
    ///
    /// As [`print_str`](Self::print_str).
    pub fn print_cell(&mut self, id: AreaId, cell: &Cell) -> Result<usize> {
        self.put_glyph(id, cell)
    }

    /// Print a run of ready-made cells. Cells holding a control character
    /// move the cursor like in [`print_str`](Self::print_str).
    ///
    /// # Errors
    ///
    /// As [`print_str`](Self::print_str).
    pub fn print_cells(&mut self, id: AreaId, cells: &[Cell]) -> Result<usize> {
        for cell in cells {
            let ch = cell.base();
            if is_cursor_control(ch) {
                self.print_control(id, ch)?;
            } else {
                self.put_glyph(id, cell)?;
            }
        }
        Ok(cells.len())
    }

    fn put_glyph(&mut self, id: AreaId, cell: &Cell) -> Result<usize> {
        let utf8 = self.output().encoding() == Encoding::Utf8;
        Ok(self.get_mut(id)?.print_cell(cell, utf8)?)
    }

    fn print_control(&mut self, id: AreaId, ch: char) -> Result<()> {
        if ch == '\u{7}' {
            self.get(id)?;
            self.beep()?;
        }
        let tabstop = i32::try_from(self.tabstop()).unwrap_or(8);
        let area = self.get_mut(id)?;
        let cursor = &mut area.cursor;
        match ch {
            '\n' => *cursor = Point::new(1, cursor.y + 1),
            '\r' => cursor.x = 1,
            '\t' => cursor.x = ((cursor.x - 1).max(0) / tabstop + 1) * tabstop + 1,
            '\u{8}' => cursor.x = (cursor.x - 1).max(1),
            _ => {}
        }
        area.wrap_cursor()?;
        Ok(())
    }

    /// Place the print cursor of area `id` at the 1-based terminal
    /// position `pos`.
    ///
    /// # Errors
    ///
    /// [`AreaError::UnknownArea`](crate::AreaError::UnknownArea) for a
    /// stale handle.
    pub fn set_cursor(&mut self, id: AreaId, pos: Point) -> Result<()> {
        let area = self.get_mut(id)?;
        let offset = area.offset();
        area.cursor = Point::new(pos.x - offset.x, pos.y - offset.y);
        Ok(())
    }

    /// The print cursor of area `id` as a 1-based terminal position.
    ///
    /// # Errors
    ///
    /// [`AreaError::UnknownArea`](crate::AreaError::UnknownArea) for a
    /// stale handle.
    pub fn print_cursor(&self, id: AreaId) -> Result<Point> {
        let area = self.get(id)?;
        let offset = area.offset();
        Ok(Point::new(offset.x + area.cursor.x, offset.y + area.cursor.y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AreaError;
    use pretty_assertions::assert_eq;
    use stratum_term::{Attr, CellFlags, Color, Rect, Size, TermProfile};

    fn compositor(encoding: Encoding) -> Compositor<Vec<u8>> {
        let profile = TermProfile::for_terminal("xterm-256color", encoding).unwrap();
        Compositor::new(&profile, Size::new(20, 5), 0, Vec::new()).unwrap()
    }

    fn row(c: &Compositor<Vec<u8>>, id: AreaId, y: usize) -> String {
        c.area(id)
            .unwrap()
            .row(y)
            .iter()
            .map(|cell| if cell.is_padding() { '_' } else { cell.base() })
            .collect()
    }

    fn small(c: &mut Compositor<Vec<u8>>, w: usize, h: usize) -> AreaId {
        c.create_area(Rect::new(0, 0, w, h), Size::default()).unwrap()
    }

    // ── Text ─────────────────────────────────────────────────────────────

    #[test]
    fn print_uses_the_current_style() {
        let mut c = compositor(Encoding::Utf8);
        let id = small(&mut c, 4, 1);
        c.style_mut().set_color(Color::RED, Color::BLUE);
        c.style_mut().set_bold(true);
        assert_eq!(c.print_str(id, "ab").unwrap(), 2);
        let cell = *c.area(id).unwrap().cell(1, 0).unwrap();
        assert_eq!(cell.base(), 'b');
        assert_eq!((cell.fg, cell.bg, cell.attrs), (Color::RED, Color::BLUE, Attr::BOLD));
    }

    #[test]
    fn combining_marks_share_a_cell() {
        let mut c = compositor(Encoding::Utf8);
        let id = small(&mut c, 4, 1);
        assert_eq!(c.print_str(id, "e\u{301}x").unwrap(), 2);
        let area = c.area(id).unwrap();
        assert_eq!(area.cell(0, 0).unwrap().glyph(), "e\u{301}");
        assert_eq!(area.cell(1, 0).unwrap().base(), 'x');
        assert_eq!(area.cursor, Point::new(3, 1));
    }

    #[test]
    fn wide_glyph_takes_two_columns() {
        let mut c = compositor(Encoding::Utf8);
        let id = small(&mut c, 10, 1);
        c.set_cursor(id, Point::new(5, 1)).unwrap();
        c.print_str(id, "中a").unwrap();
        assert_eq!(row(&c, id, 0), "    中_a   ");
        assert!(c.area(id).unwrap().cell(5, 0).unwrap().is_padding());
    }

    #[test]
    fn wide_glyph_without_utf8_is_followed_by_a_dot() {
        let mut c = compositor(Encoding::Vt100);
        let id = small(&mut c, 4, 1);
        c.print_str(id, "中").unwrap();
        assert_eq!(row(&c, id, 0), "中.  ");
    }

    #[test]
    fn transparent_style_counts_per_row() {
        let mut c = compositor(Encoding::Utf8);
        let id = small(&mut c, 4, 2);
        c.style_mut().set_transparent(true);
        c.print_str(id, "ab").unwrap();
        assert_eq!(c.area(id).unwrap().changes(0).trans_count, 2);
        assert!(c.area(id).unwrap().cell(0, 0).unwrap().flags.contains(CellFlags::TRANSPARENT));
    }

    #[test]
    fn end_of_area_stops_printing() {
        let mut c = compositor(Encoding::Utf8);
        let id = small(&mut c, 2, 2);
        let err = c.print_str(id, "abcdef").unwrap_err();
        assert!(matches!(err, AreaError::EndOfArea(_)));
        assert_eq!(row(&c, id, 0), "ab");
        assert_eq!(row(&c, id, 1), "cd");
    }

    // ── Control characters ───────────────────────────────────────────────

    #[test]
    fn newline_and_carriage_return() {
        let mut c = compositor(Encoding::Utf8);
        let id = small(&mut c, 4, 3);
        c.print_str(id, "ab\ncd\r\nx\ry").unwrap();
        assert_eq!(row(&c, id, 0), "ab  ");
        assert_eq!(row(&c, id, 1), "cd  ");
        assert_eq!(row(&c, id, 2), "y   ");
    }

    #[test]
    fn tab_moves_to_the_next_stop() {
        let mut c = compositor(Encoding::Utf8);
        let id = small(&mut c, 20, 1);
        c.print_str(id, "ab\tc").unwrap();
        let tabstop = c.tabstop();
        assert_eq!(c.area(id).unwrap().cell(tabstop, 0).unwrap().base(), 'c');
        c.print_str(id, "\r\t").unwrap();
        assert_eq!(c.area(id).unwrap().cursor.x as usize, tabstop + 1);
    }

    #[test]
    fn backspace_stops_at_the_first_column() {
        let mut c = compositor(Encoding::Utf8);
        let id = small(&mut c, 4, 1);
        c.print_str(id, "ab\u{8}\u{8}\u{8}z").unwrap();
        assert_eq!(row(&c, id, 0), "zb  ");
    }

    #[test]
    fn bell_reaches_the_terminal() {
        let mut c = compositor(Encoding::Utf8);
        let id = small(&mut c, 4, 1);
        c.print_char(id, '\u{7}').unwrap();
        assert!(c.output().queue().sink().contains(&0x07));
    }

    #[test]
    fn print_cells_keeps_their_style() {
        let mut c = compositor(Encoding::Utf8);
        let id = small(&mut c, 4, 2);
        let cells = [
            Cell::styled('q', Color::GREEN, Color::Default, Attr::empty()),
            Cell::new('\n'),
            Cell::new('r'),
        ];
        assert_eq!(c.print_cells(id, &cells).unwrap(), 3);
        assert_eq!(c.area(id).unwrap().cell(0, 0).unwrap().fg, Color::GREEN);
        assert_eq!(row(&c, id, 1), "r   ");
    }

    // ── Cursor ───────────────────────────────────────────────────────────

    #[test]
    fn cursor_is_in_terminal_coordinates() {
        let mut c = compositor(Encoding::Utf8);
        let id = c.create_area(Rect::new(5, 2, 6, 2), Size::default()).unwrap();
        c.set_cursor(id, Point::new(8, 4)).unwrap();
        assert_eq!(c.area(id).unwrap().cursor, Point::new(3, 2));
        c.print_char(id, 'k').unwrap();
        assert_eq!(c.area(id).unwrap().cell(2, 1).unwrap().base(), 'k');
        assert_eq!(c.print_cursor(id).unwrap(), Point::new(9, 4));
    }
}
