// SPDX-License-Identifier: MIT
//
// Terminal output engine.
//
// Walks the dirty ranges of the virtual terminal and turns them into the
// shortest byte stream the terminal understands: a cursor move per run of
// changed cells, only the attribute and color changes that differ from
// what the terminal already shows, then the encoded glyphs.
//
// The engine mirrors the physical terminal in `TermState`. Every escape it
// sends updates the mirror, so a cell whose style matches the previous one
// costs exactly its glyph bytes. Unknown state (`None`) is never assumed to
// match anything.
//
// Style changes happen in a fixed order:
//
//   1. attributes that must go off: dedicated exit sequences where the
//      terminal has them, otherwise `sgr0`, which drops everything
//   2. colors, reduced to what the terminal can show
//   3. attributes that must come on, including any `sgr0` dropped
//
// The bottom-right cell needs care on terminals with automatic margins:
// printing there would scroll the screen. It is written with the margin
// switched off (`rmam`/`smam`) or, failing that, by printing one column to
// the left and pushing it right with an inserted character.

use std::io::{self, Write};

use crate::area::TermArea;
use crate::caps::Capabilities;
use crate::cell::{Attr, Cell, CellFlags};
use crate::color::{Color, vga_to_ansi};
use crate::detect::TermKind;
use crate::encoding::{Charset, Encoder, Encoding};
use crate::geometry::{Point, Size};
use crate::optimize::CursorOptimizer;
use crate::output::OutputQueue;
use crate::profile::TermProfile;
use crate::terminfo::{BoolCap, NumCap, StrCap};

/// Attributes that describe the look of a glyph. Charset bits are
/// handled by the encoder.
const STYLE_ATTRS: Attr = Attr::all().difference(Attr::ALT_CHARSET.union(Attr::PC_CHARSET));

/// Attributes in the order they are switched.
const ATTR_ORDER: [Attr; 11] = [
    Attr::BOLD,
    Attr::DIM,
    Attr::ITALIC,
    Attr::UNDERLINE,
    Attr::DBL_UNDERLINE,
    Attr::BLINK,
    Attr::REVERSE,
    Attr::STANDOUT,
    Attr::INVISIBLE,
    Attr::PROTECTED,
    Attr::CROSSED_OUT,
];

// ─── TermState ───────────────────────────────────────────────────────────────

/// What the physical terminal currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermState {
    /// `None` after a wrap on a terminal with the newline glitch, or
    /// before the first move.
    pub cursor: Option<Point>,
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub attrs: Attr,
    pub charset: Charset,
    pub cursor_hidden: Option<bool>,
}

impl Default for TermState {
    fn default() -> Self {
        Self {
            cursor: None,
            fg: None,
            bg: None,
            attrs: Attr::empty(),
            charset: Charset::Normal,
            cursor_hidden: None,
        }
    }
}

// ─── FlushStats ──────────────────────────────────────────────────────────────

/// Counters from one terminal update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushStats {
    /// Cells whose glyph was sent.
    pub cells_printed: usize,
    /// Dirty cells skipped because the terminal already showed them.
    pub cells_skipped: usize,
    /// Bytes queued during the update.
    pub bytes: usize,
}

// ─── TermOutput ──────────────────────────────────────────────────────────────

/// Byte producer for one terminal.
pub struct TermOutput<W: Write> {
    caps: Capabilities,
    kind: TermKind,
    encoder: Encoder,
    optimizer: CursorOptimizer,
    queue: OutputQueue<W>,
    state: TermState,
    size: Size,
    max_colors: u16,
    /// Attributes the terminal cannot combine with colors.
    no_color_video: Attr,
}

impl<W: Write> TermOutput<W> {
    /// Output engine for `profile` on a terminal of `size` running at
    /// `baud` (0 when unknown).
    #[must_use]
    pub fn new(profile: &TermProfile, size: Size, baud: u32, sink: W) -> Self {
        let caps = profile.caps.clone();
        Self {
            optimizer: CursorOptimizer::new(&caps, size, profile.tabstop, baud),
            encoder: profile.encoder(),
            kind: profile.kind(),
            max_colors: caps.max_colors(),
            no_color_video: caps.number(NumCap::NoColorVideo).map_or(Attr::empty(), ncv_attrs),
            caps,
            queue: OutputQueue::new(sink),
            state: TermState::default(),
            size,
        }
    }

    // ─── Accessors ────────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub const fn caps(&self) -> &Capabilities {
        &self.caps
    }

    #[inline]
    #[must_use]
    pub const fn kind(&self) -> TermKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub const fn encoding(&self) -> Encoding {
        self.encoder.encoding()
    }

    #[inline]
    #[must_use]
    pub const fn size(&self) -> Size {
        self.size
    }

    /// Adopt a new terminal size. The cursor position becomes unknown.
    pub fn set_size(&mut self, size: Size) {
        self.size = size;
        self.optimizer.set_size(size);
        self.state.cursor = None;
    }

    #[inline]
    #[must_use]
    pub const fn state(&self) -> &TermState {
        &self.state
    }

    /// Forget everything known about the terminal, e.g. after another
    /// program has written to it.
    pub fn invalidate(&mut self) {
        self.state = TermState {
            charset: self.state.charset,
            ..TermState::default()
        };
    }

    #[inline]
    #[must_use]
    pub const fn queue(&self) -> &OutputQueue<W> {
        &self.queue
    }

    #[inline]
    pub fn queue_mut(&mut self) -> &mut OutputQueue<W> {
        &mut self.queue
    }

    /// Write all queued bytes to the terminal.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the sink fails.
    pub fn flush(&mut self) -> io::Result<()> {
        self.queue.flush_queue()
    }

    // ─── Update pass ──────────────────────────────────────────────────────

    /// Send every dirty cell of `vterm` to the terminal and flush.
    ///
    /// Cells flagged as unchanged and padding companions are skipped.
    /// Printed cells get the `printed` flag and every handled row's dirty
    /// range is reset. Afterwards the hardware cursor is placed at the
    /// vterm's input cursor, or hidden.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the sink fails.
    pub fn update_terminal(&mut self, vterm: &mut TermArea) -> io::Result<FlushStats> {
        let mut stats = FlushStats::default();
        let start = self.queue.bytes_written() + self.queue.len() as u64;
        let width = vterm.full_width().min(self.size.width);
        let height = vterm.full_height().min(self.size.height);
        let full_width = vterm.full_width();

        for y in 0..height {
            let line = *vterm.changes(y);
            if !line.is_dirty() {
                continue;
            }
            let xmax = line.xmax.min(width.saturating_sub(1));
            for x in line.xmin..=xmax {
                let Some(&cell) = vterm.cell(x, y) else { break };
                if cell.is_padding() {
                    continue;
                }
                if cell.has_no_changes() {
                    stats.cells_skipped += 1;
                    if let Some(c) = vterm.cell_mut(x, y) {
                        c.flags.remove(CellFlags::NO_CHANGES);
                    }
                    continue;
                }
                if x + 1 == self.size.width && y + 1 == self.size.height {
                    let left = x.checked_sub(1).and_then(|lx| vterm.cell(lx, y)).copied();
                    self.append_lower_right(&cell, left.as_ref(), Point::new(x as i32, y as i32))?;
                } else {
                    self.move_to(Point::new(x as i32, y as i32))?;
                    self.append_cell(&cell)?;
                }
                if let Some(c) = vterm.cell_mut(x, y) {
                    c.flags.insert(CellFlags::PRINTED);
                }
                stats.cells_printed += 1;
            }
            vterm.changes_mut(y).reset(full_width);
        }
        vterm.has_changes = false;

        self.place_cursor(vterm)?;
        stats.bytes = usize::try_from(self.queue.bytes_written() + self.queue.len() as u64 - start)
            .unwrap_or(usize::MAX);
        self.queue.flush_queue()?;
        tracing::trace!(
            printed = stats.cells_printed,
            skipped = stats.cells_skipped,
            bytes = stats.bytes,
            "terminal updated"
        );
        Ok(stats)
    }

    /// Show the hardware cursor at the vterm's input cursor, or hide it.
    fn place_cursor(&mut self, vterm: &TermArea) -> io::Result<()> {
        let p = vterm.input_cursor;
        let inside = usize::try_from(p.x).is_ok_and(|x| x < self.size.width)
            && usize::try_from(p.y).is_ok_and(|y| y < self.size.height);
        if vterm.input_cursor_visible && inside {
            self.move_to(p)?;
            self.hide_cursor(false)
        } else {
            self.hide_cursor(true)
        }
    }

    // ─── Cursor ───────────────────────────────────────────────────────────

    /// Move the hardware cursor to the 0-based terminal position `to`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the sink fails.
    pub fn move_to(&mut self, to: Point) -> io::Result<()> {
        let target = self.optimizer.normalize(to);
        if self.state.cursor == Some(target) {
            return Ok(());
        }
        let bytes = self.optimizer.move_cursor(self.state.cursor, target);
        if bytes.is_empty() {
            return Ok(());
        }
        if !self.state.attrs.is_empty() && !self.caps.flag(BoolCap::MoveStandoutMode) {
            self.reset_attributes()?;
        }
        self.queue.push(&bytes)?;
        self.state.cursor = Some(target);
        Ok(())
    }

    /// Hide or show the hardware cursor.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the sink fails.
    pub fn hide_cursor(&mut self, hide: bool) -> io::Result<()> {
        if self.state.cursor_hidden == Some(hide) {
            return Ok(());
        }
        let bytes = if hide {
            self.caps
                .bytes(StrCap::CursorInvisible)
                .unwrap_or_else(|| b"\x1b[?25l".to_vec())
        } else if let Some(normal) = self.caps.bytes(StrCap::CursorNormal) {
            normal
        } else if self.caps.has(StrCap::CursorInvisible) {
            b"\x1b[?12;25h".to_vec()
        } else {
            b"\x1b[?25h".to_vec()
        };
        self.queue.push(&bytes)?;
        self.state.cursor_hidden = Some(hide);
        Ok(())
    }

    // ─── Cells ────────────────────────────────────────────────────────────

    fn append_cell(&mut self, cell: &Cell) -> io::Result<()> {
        self.apply_style(cell)?;
        let glyph_len = cell.chars().count().max(1);
        let encoded = if cell.attrs.contains(Attr::ALT_CHARSET) {
            self.encoder.encode_alt_charset(cell.base())
        } else {
            self.encoder.encode(&cell.ch[..glyph_len])
        };
        self.set_charset(encoded.charset)?;
        self.queue.push(&encoded.bytes)?;

        let columns = if self.encoder.encoding() == Encoding::Utf8 {
            usize::from(cell.width.max(1))
        } else {
            1
        };
        self.state.cursor = self
            .state
            .cursor
            .and_then(|at| self.optimizer.after_print(at, columns));
        Ok(())
    }

    /// Write the bottom-right cell without scrolling the screen.
    fn append_lower_right(&mut self, cell: &Cell, left: Option<&Cell>, at: Point) -> io::Result<()> {
        if !self.optimizer.has_auto_right_margin() {
            self.move_to(at)?;
            return self.append_cell(cell);
        }
        if let (Some(rmam), Some(smam)) = (
            self.caps.bytes(StrCap::ExitAmMode),
            self.caps.bytes(StrCap::EnterAmMode),
        ) {
            self.move_to(at)?;
            self.queue.push(&rmam)?;
            self.append_cell(cell)?;
            return self.queue.push(&smam);
        }

        // Print the corner glyph one column to the left, then insert the
        // real left neighbour in front of it.
        let Some(left) = left.filter(|c| !c.is_padding() && at.x > 0) else {
            tracing::debug!("bottom-right cell left blank: no way to avoid scrolling");
            return Ok(());
        };
        let before = Point::new(at.x - 1, at.y);
        self.move_to(before)?;
        self.append_cell(cell)?;
        self.move_to(before)?;

        if let Some(ich) = self.caps.format(StrCap::ParmIch, &[1]) {
            self.queue.push(&ich)?;
            self.append_cell(left)?;
        } else if let (Some(smir), Some(rmir)) = (
            self.caps.bytes(StrCap::EnterInsertMode),
            self.caps.bytes(StrCap::ExitInsertMode),
        ) {
            self.queue.push(&smir)?;
            self.append_cell(left)?;
            self.push_cap(StrCap::InsertPadding)?;
            self.queue.push(&rmir)?;
        } else if let Some(ich1) = self.caps.bytes(StrCap::InsertCharacter) {
            self.queue.push(&ich1)?;
            self.append_cell(left)?;
            self.push_cap(StrCap::InsertPadding)?;
        } else {
            tracing::debug!("no insert capability for the bottom-right cell");
        }
        self.state.cursor = Some(at);
        Ok(())
    }

    // ─── Style ────────────────────────────────────────────────────────────

    fn apply_style(&mut self, cell: &Cell) -> io::Result<()> {
        let (fg, bg) = if self.max_colors == 0 {
            (Color::Default, Color::Default)
        } else {
            (cell.fg.reduce(self.max_colors), cell.bg.reduce(self.max_colors))
        };
        let mut want = cell.attrs & STYLE_ATTRS;
        if !(fg.is_default() && bg.is_default()) {
            want -= self.no_color_video;
        }

        let off = self.state.attrs - want;
        if !off.is_empty() {
            let all_have_exits = ATTR_ORDER
                .iter()
                .filter(|a| off.contains(**a))
                .all(|a| self.exit_cap(*a).is_some());
            if all_have_exits {
                for attr in ATTR_ORDER.into_iter().filter(|a| off.contains(*a)) {
                    if let Some(cap) = self.exit_cap(attr) {
                        self.push_cap(cap)?;
                    }
                    self.state.attrs.remove(attr);
                }
                // Underline and standout exits may share a sequence with
                // other attributes.
                self.state.attrs &= want;
            } else {
                self.reset_attributes()?;
            }
        }

        if self.max_colors > 0 {
            self.set_colors(fg, bg)?;
        }

        let on = want - self.state.attrs;
        for attr in ATTR_ORDER.into_iter().filter(|a| on.contains(*a)) {
            match enter_cap(attr) {
                Some(cap) if self.caps.has(cap) => {
                    self.push_cap(cap)?;
                    self.state.attrs.insert(attr);
                }
                _ => tracing::trace!(?attr, "attribute not supported by the terminal"),
            }
        }
        Ok(())
    }

    /// Dedicated exit sequence for `attr`, if one exists that does not
    /// reset everything.
    fn exit_cap(&self, attr: Attr) -> Option<StrCap> {
        let cap = if attr == Attr::ITALIC {
            StrCap::ExitItalicsMode
        } else if attr == Attr::UNDERLINE || attr == Attr::DBL_UNDERLINE {
            StrCap::ExitUnderlineMode
        } else if attr == Attr::REVERSE || attr == Attr::STANDOUT {
            StrCap::ExitStandoutMode
        } else if attr == Attr::CROSSED_OUT {
            StrCap::ExitCrossedOutMode
        } else {
            return None;
        };
        let seq = self.caps.get(cap)?;
        let full_reset = seq == "\x1b[m" || self.caps.get(StrCap::ExitAttributeMode) == Some(seq);
        (!full_reset).then_some(cap)
    }

    /// `sgr0`: every attribute off, default colors.
    fn reset_attributes(&mut self) -> io::Result<()> {
        let Some(sgr0) = self.caps.bytes(StrCap::ExitAttributeMode) else {
            tracing::debug!("terminal has no sgr0; attributes stay on");
            return Ok(());
        };
        self.queue.push(&sgr0)?;
        self.state.attrs = Attr::empty();
        self.state.fg = Some(Color::Default);
        self.state.bg = Some(Color::Default);
        let resets_charset = self
            .caps
            .bytes(StrCap::ExitAltCharsetMode)
            .is_some_and(|rmacs| contains_seq(&sgr0, &rmacs));
        if resets_charset {
            self.state.charset = Charset::Normal;
        }
        Ok(())
    }

    fn set_colors(&mut self, fg: Color, bg: Color) -> io::Result<()> {
        if self.state.fg == Some(fg) && self.state.bg == Some(bg) {
            return Ok(());
        }
        let to_default = (fg.is_default() && self.state.fg != Some(Color::Default))
            || (bg.is_default() && self.state.bg != Some(Color::Default));
        if to_default {
            if let Some(op) = self.caps.bytes(StrCap::OrigPair) {
                self.queue.push(&op)?;
                self.state.fg = Some(Color::Default);
                self.state.bg = Some(Color::Default);
            } else {
                // Attributes dropped here are turned back on after the
                // colors.
                self.reset_attributes()?;
            }
        }

        let fg_index = fg.index().filter(|_| self.state.fg != Some(fg));
        let bg_index = bg.index().filter(|_| self.state.bg != Some(bg));
        if fg_index.is_none() && bg_index.is_none() {
            return Ok(());
        }

        if self.caps.has(StrCap::SetAForeground) && self.caps.has(StrCap::SetABackground) {
            if let Some(i) = fg_index {
                self.push_format(StrCap::SetAForeground, i32::from(vga_to_ansi(i)))?;
            }
            if let Some(i) = bg_index {
                self.push_format(StrCap::SetABackground, i32::from(vga_to_ansi(i)))?;
            }
        } else if self.caps.has(StrCap::SetForeground) && self.caps.has(StrCap::SetBackground) {
            if let Some(i) = fg_index {
                self.push_format(StrCap::SetForeground, i32::from(i))?;
            }
            if let Some(i) = bg_index {
                self.push_format(StrCap::SetBackground, i32::from(i))?;
            }
        } else if let (Some(f), Some(b)) = (fg.index(), bg.index()) {
            let args = [i32::from(vga_to_ansi(f)), i32::from(vga_to_ansi(b))];
            match self.caps.format(StrCap::SetColorPair, &args) {
                Some(bytes) => self.queue.push(&bytes)?,
                None => tracing::trace!("terminal cannot set colors"),
            }
        }
        self.state.fg = Some(fg);
        self.state.bg = Some(bg);
        Ok(())
    }

    fn set_charset(&mut self, charset: Charset) -> io::Result<()> {
        if self.state.charset == charset {
            return Ok(());
        }
        match self.state.charset {
            Charset::Alternate => {
                self.push_cap(StrCap::ExitAltCharsetMode)?;
            }
            Charset::Pc => {
                self.push_cap(StrCap::ExitPcCharsetMode)?;
            }
            Charset::Normal => {}
        }
        match charset {
            Charset::Alternate => {
                self.push_cap(StrCap::EnterAltCharsetMode)?;
            }
            Charset::Pc => {
                self.push_cap(StrCap::EnterPcCharsetMode)?;
            }
            Charset::Normal => {}
        }
        self.state.charset = charset;
        Ok(())
    }

    // ─── Whole-terminal operations ────────────────────────────────────────

    /// Put the terminal into the state drawing expects: keypad transmit
    /// mode, saved cursor, alternate screen, alternate charset enabled,
    /// cursor hidden.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the sink fails.
    pub fn init_terminal(&mut self) -> io::Result<()> {
        self.push_cap(StrCap::KeypadXmit)?;
        self.push_cap(StrCap::SaveCursor)?;
        self.push_cap(StrCap::EnterCaMode)?;
        self.push_cap(StrCap::EnaAcs)?;
        self.state = TermState::default();
        self.hide_cursor(true)?;
        self.queue.flush_queue()
    }

    /// Undo [`init_terminal`](Self::init_terminal) and restore the
    /// original palette.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the sink fails.
    pub fn finish_terminal(&mut self) -> io::Result<()> {
        self.set_charset(Charset::Normal)?;
        self.reset_attributes()?;
        self.hide_cursor(false)?;
        self.push_cap(StrCap::ExitCaMode)?;
        self.push_cap(StrCap::RestoreCursor)?;
        self.push_cap(StrCap::KeypadLocal)?;
        self.reset_color_map()?;
        self.state.cursor = None;
        self.queue.flush_queue()
    }

    /// Clear the whole screen with `fill`'s style. Only a space fill can
    /// be cleared this way, and colored fills need background color
    /// erase. Returns whether the screen was cleared; the cursor ends up
    /// at the top-left.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the sink fails.
    pub fn clear_term(&mut self, fill: &Cell) -> io::Result<bool> {
        let plain = fill.bg.is_default() && (fill.attrs & STYLE_ATTRS).is_empty();
        if fill.base() != ' ' || !(plain || self.caps.flag(BoolCap::BackColorErase)) {
            return Ok(false);
        }
        let cleared = if let Some(clear) = self.caps.bytes(StrCap::ClearScreen) {
            self.apply_style(fill)?;
            self.queue.push(&clear)?;
            true
        } else if let Some(ed) = self.caps.bytes(StrCap::ClrEos) {
            self.move_to(Point::new(0, 0))?;
            self.apply_style(fill)?;
            self.queue.push(&ed)?;
            true
        } else if let Some(el) = self.caps.bytes(StrCap::ClrEol) {
            self.apply_style(fill)?;
            for y in 0..self.size.height {
                self.move_to(Point::new(0, y as i32))?;
                self.queue.push(&el)?;
            }
            true
        } else {
            false
        };
        if cleared {
            self.state.cursor = None;
            self.move_to(Point::new(0, 0))?;
            self.queue.flush_queue()?;
        }
        Ok(cleared)
    }

    /// Scroll the whole screen up one line with `ind` at the bottom row.
    /// Returns `false` when the terminal cannot.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the sink fails.
    pub fn scroll_forward(&mut self) -> io::Result<bool> {
        let Some(ind) = self.caps.bytes(StrCap::ScrollForward) else {
            return Ok(false);
        };
        let last = i32::try_from(self.size.height.saturating_sub(1)).unwrap_or(0);
        self.move_to(Point::new(0, last))?;
        self.queue.push(&ind)?;
        Ok(true)
    }

    /// Scroll the whole screen down one line with `ri` at the top row.
    /// Returns `false` when the terminal cannot.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the sink fails.
    pub fn scroll_reverse(&mut self) -> io::Result<bool> {
        let Some(ri) = self.caps.bytes(StrCap::ScrollReverse) else {
            return Ok(false);
        };
        self.move_to(Point::new(0, 0))?;
        self.queue.push(&ri)?;
        Ok(true)
    }

    /// Ring the bell.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the sink fails.
    pub fn beep(&mut self) -> io::Result<()> {
        if self.push_cap(StrCap::Bell)? {
            self.queue.flush_queue()?;
        }
        Ok(())
    }

    /// Redefine palette entry `index` (VGA numbering) as `r`, `g`, `b`.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the sink fails.
    pub fn set_palette(&mut self, index: u8, r: u8, g: u8, b: u8) -> io::Result<()> {
        let ansi = vga_to_ansi(index);
        let scale = |c: u8| i32::from(c) * 1001 / 256;
        if let Some(bytes) =
            self.caps
                .format(StrCap::InitializeColor, &[i32::from(ansi), scale(r), scale(g), scale(b)])
        {
            self.queue.push(&bytes)?;
        } else if self
            .kind
            .intersects(TermKind::XTERM | TermKind::MINTTY | TermKind::RXVT | TermKind::URXVT)
            && !self.kind.contains(TermKind::LINUX)
        {
            write!(self.queue, "\x1b]4;{ansi};#{r:02x}{g:02x}{b:02x}\x1b\\")?;
            match ansi {
                0 => write!(self.queue, "\x1b]11;#{r:02x}{g:02x}{b:02x}\x1b\\")?,
                7 => write!(self.queue, "\x1b]10;#{r:02x}{g:02x}{b:02x}\x1b\\")?,
                _ => {}
            }
        } else if self.kind.contains(TermKind::LINUX) {
            write!(self.queue, "\x1b]P{ansi:x}{r:02x}{g:02x}{b:02x}")?;
        } else {
            tracing::debug!(index, "terminal palette cannot be changed");
            return Ok(());
        }
        self.queue.flush_queue()
    }

    /// Restore the terminal's own palette (`oc`, or `op` for the color
    /// pair alone).
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the sink fails.
    pub fn reset_color_map(&mut self) -> io::Result<()> {
        if !self.push_cap(StrCap::OrigColors)? && self.push_cap(StrCap::OrigPair)? {
            self.state.fg = Some(Color::Default);
            self.state.bg = Some(Color::Default);
        }
        Ok(())
    }

    // ─── Helpers ──────────────────────────────────────────────────────────

    /// Queue a capability without parameters. Returns whether it exists.
    fn push_cap(&mut self, cap: StrCap) -> io::Result<bool> {
        match self.caps.bytes(cap) {
            Some(bytes) => {
                self.queue.push(&bytes)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn push_format(&mut self, cap: StrCap, arg: i32) -> io::Result<()> {
        if let Some(bytes) = self.caps.format(cap, &[arg]) {
            self.queue.push(&bytes)?;
        }
        Ok(())
    }
}

impl<W: Write> std::fmt::Debug for TermOutput<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TermOutput")
            .field("terminal", &self.caps.name())
            .field("size", &self.size)
            .field("state", &self.state)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

fn enter_cap(attr: Attr) -> Option<StrCap> {
    Some(match attr {
        a if a == Attr::BOLD => StrCap::EnterBoldMode,
        a if a == Attr::DIM => StrCap::EnterDimMode,
        a if a == Attr::ITALIC => StrCap::EnterItalicsMode,
        a if a == Attr::UNDERLINE || a == Attr::DBL_UNDERLINE => StrCap::EnterUnderlineMode,
        a if a == Attr::BLINK => StrCap::EnterBlinkMode,
        a if a == Attr::REVERSE => StrCap::EnterReverseMode,
        a if a == Attr::STANDOUT => StrCap::EnterStandoutMode,
        a if a == Attr::INVISIBLE => StrCap::EnterSecureMode,
        a if a == Attr::PROTECTED => StrCap::EnterProtectedMode,
        a if a == Attr::CROSSED_OUT => StrCap::EnterCrossedOutMode,
        _ => return None,
    })
}

/// Decode the terminfo `ncv` bit mask.
fn ncv_attrs(ncv: i32) -> Attr {
    const BITS: [(i32, Attr); 8] = [
        (1, Attr::STANDOUT),
        (2, Attr::UNDERLINE),
        (4, Attr::REVERSE),
        (8, Attr::BLINK),
        (16, Attr::DIM),
        (32, Attr::BOLD),
        (64, Attr::INVISIBLE),
        (0x8000, Attr::ITALIC),
    ];
    BITS.iter()
        .filter(|(bit, _)| ncv & bit != 0)
        .fold(Attr::empty(), |acc, (_, attr)| acc | *attr)
}

fn contains_seq(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use pretty_assertions::assert_eq;

    fn output(name: &str, size: Size) -> TermOutput<Vec<u8>> {
        let profile = TermProfile::for_terminal(name, Encoding::Utf8).unwrap();
        TermOutput::new(&profile, size, 0, Vec::new())
    }

    fn vterm(size: Size) -> TermArea {
        TermArea::new(Rect::new(0, 0, size.width, size.height), Size::new(0, 0)).unwrap()
    }

    fn take(out: &mut TermOutput<Vec<u8>>) -> String {
        out.flush().unwrap();
        let bytes = std::mem::take(out.queue_mut().sink_mut());
        String::from_utf8_lossy(&bytes).into_owned()
    }

    // ── Update pass ──────────────────────────────────────────────────────

    #[test]
    fn prints_dirty_cells_with_colors() {
        let size = Size::new(4, 2);
        let mut out = output("xterm", size);
        let mut vt = vterm(size);
        vt.put_cell(0, 0, &Cell::new('a').with_fg(Color::RED));
        let stats = out.update_terminal(&mut vt).unwrap();
        assert_eq!(take(&mut out), "\x1b[H\x1b[39;49m\x1b[31ma\x1b[?25l");
        assert_eq!(stats.cells_printed, 1);
        assert!(vt.cell(0, 0).unwrap().is_printed());
        assert!(!vt.changes(0).is_dirty());
    }

    #[test]
    fn unchanged_style_costs_only_glyphs() {
        let size = Size::new(10, 2);
        let mut out = output("xterm", size);
        let mut vt = vterm(size);
        for (x, ch) in "abc".chars().enumerate() {
            vt.put_cell(x, 1, &Cell::new(ch));
        }
        out.update_terminal(&mut vt).unwrap();
        let first = take(&mut out);
        assert!(first.ends_with("abc\x1b[?25l"), "{first:?}");

        vt.put_cell(1, 1, &Cell::new('X'));
        out.update_terminal(&mut vt).unwrap();
        // Cursor sits after 'c'; two cub1 beat every other move.
        assert_eq!(take(&mut out), "\x08\x08X");
    }

    #[test]
    fn no_changes_cells_are_skipped() {
        let size = Size::new(6, 1);
        let mut out = output("xterm", size);
        let mut vt = vterm(size);
        vt.put_cell(0, 0, &Cell::new('a'));
        vt.put_cell(1, 0, &Cell::new('b').with_flags(CellFlags::NO_CHANGES));
        vt.put_cell(2, 0, &Cell::new('c'));
        let stats = out.update_terminal(&mut vt).unwrap();
        assert_eq!(stats.cells_skipped, 1);
        let text = take(&mut out);
        assert!(text.contains('a') && text.contains('c') && !text.contains('b'), "{text:?}");
        assert!(!vt.cell(1, 0).unwrap().has_no_changes());
    }

    #[test]
    fn line_drawing_switches_the_charset_and_back() {
        let size = Size::new(4, 1);
        let mut out = output("xterm", size);
        let mut vt = vterm(size);
        vt.put_cell(0, 0, &Cell::styled('q', Color::Default, Color::Default, Attr::ALT_CHARSET));
        vt.put_cell(1, 0, &Cell::new('a'));
        out.update_terminal(&mut vt).unwrap();
        let text = take(&mut out);
        let line = text.find("\x1b(0q").unwrap();
        let rest = &text[line + 4..];
        let back = rest.find("\x1b(B").unwrap();
        assert!(rest[back..].contains('a'), "{text:?}");
        assert_eq!(out.state().charset, Charset::Normal);
    }

    #[test]
    fn wide_glyph_skips_padding() {
        let size = Size::new(4, 1);
        let mut out = output("xterm", size);
        let mut vt = vterm(size);
        vt.print_cell(&Cell::new('中'), true).unwrap();
        vt.print_cell(&Cell::new('x'), true).unwrap();
        out.update_terminal(&mut vt).unwrap();
        let text = take(&mut out);
        assert!(text.contains("中x"), "{text:?}");
        assert_eq!(out.state().cursor, Some(Point::new(3, 0)));
    }

    #[test]
    fn visible_input_cursor_is_placed() {
        let size = Size::new(10, 3);
        let mut out = output("xterm", size);
        let mut vt = vterm(size);
        vt.input_cursor = Point::new(0, 2);
        vt.input_cursor_visible = true;
        out.update_terminal(&mut vt).unwrap();
        assert_eq!(take(&mut out), "\x1b[H\n\n\x1b[?12l\x1b[?25h");
    }

    // ── Attributes ───────────────────────────────────────────────────────

    #[test]
    fn attribute_with_exit_sequence_is_turned_off_alone() {
        let size = Size::new(10, 1);
        let mut out = output("xterm", size);
        let mut vt = vterm(size);
        vt.put_cell(0, 0, &Cell::new('a').with_attrs(Attr::UNDERLINE | Attr::BOLD));
        vt.put_cell(1, 0, &Cell::new('b').with_attrs(Attr::BOLD));
        out.update_terminal(&mut vt).unwrap();
        let text = take(&mut out);
        assert!(text.contains("\x1b[1m\x1b[4ma\x1b[24mb"), "{text:?}");
    }

    #[test]
    fn attribute_without_exit_uses_sgr0_and_reasserts() {
        let size = Size::new(10, 1);
        let mut out = output("xterm", size);
        let mut vt = vterm(size);
        let blue = Color::BLUE;
        vt.put_cell(0, 0, &Cell::new('a').with_fg(blue).with_attrs(Attr::BOLD | Attr::ITALIC));
        vt.put_cell(1, 0, &Cell::new('b').with_fg(blue).with_attrs(Attr::ITALIC));
        out.update_terminal(&mut vt).unwrap();
        let text = take(&mut out);
        // Bold has no exit: reset, then color and italic again.
        assert!(text.contains("a\x1b(B\x1b[m\x1b[34m\x1b[3mb"), "{text:?}");
    }

    #[test]
    fn colors_are_reduced_to_the_terminal() {
        let size = Size::new(4, 1);
        let mut out = output("xterm", size);
        let mut vt = vterm(size);
        vt.put_cell(0, 0, &Cell::new('a').with_fg(Color::LIGHT_RED));
        out.update_terminal(&mut vt).unwrap();
        let text = take(&mut out);
        // 8 colors: light red loses its intensity bit.
        assert!(text.contains("\x1b[31ma"), "{text:?}");
    }

    #[test]
    fn monochrome_terminal_sends_no_colors() {
        let size = Size::new(4, 1);
        let mut out = output("dumb", size);
        let mut vt = vterm(size);
        vt.put_cell(0, 0, &Cell::new('a').with_fg(Color::RED).with_bg(Color::BLUE));
        out.update_terminal(&mut vt).unwrap();
        // Only cursor motion and visibility; no SGR sequence at all.
        assert!(!take(&mut out).contains('m'));
    }

    #[test]
    fn ncv_mask_decodes() {
        assert_eq!(ncv_attrs(18), Attr::UNDERLINE | Attr::DIM);
        assert_eq!(ncv_attrs(0), Attr::empty());
    }

    // ── Lower-right corner ───────────────────────────────────────────────

    #[test]
    fn lower_right_uses_margin_toggle() {
        let size = Size::new(3, 1);
        let mut out = output("xterm", size);
        let mut vt = vterm(size);
        vt.put_cell(2, 0, &Cell::new('z'));
        out.update_terminal(&mut vt).unwrap();
        let text = take(&mut out);
        assert!(text.starts_with("\x1b[1;3H\x1b[?7l"), "{text:?}");
        assert!(text.contains("z\x1b[?7h"), "{text:?}");
        assert_eq!(out.state().cursor, Some(Point::new(2, 0)));
    }

    #[test]
    fn lower_right_falls_back_to_insert() {
        let size = Size::new(3, 1);
        let profile = TermProfile::for_terminal("xterm", Encoding::Utf8).unwrap();
        let mut caps = profile.caps.clone();
        caps.set(StrCap::ExitAmMode, None);
        let profile = TermProfile::from_parts("xterm", profile.kind(), caps, Encoding::Utf8);
        let mut out = TermOutput::new(&profile, size, 0, Vec::new());
        let mut vt = vterm(size);
        vt.put_cell(1, 0, &Cell::new('y'));
        vt.put_cell(2, 0, &Cell::new('z'));
        vt.clear_changes();
        vt.changes_mut(0).mark(2);
        out.update_terminal(&mut vt).unwrap();
        let text = take(&mut out);
        assert!(text.contains("z\x08\x1b[1@y"), "{text:?}");
    }

    // ── Terminal operations ──────────────────────────────────────────────

    #[test]
    fn init_and_finish_bracket_the_session() {
        let mut out = output("xterm", Size::new(80, 24));
        out.init_terminal().unwrap();
        assert_eq!(
            take(&mut out),
            "\x1b[?1h\x1b=\x1b7\x1b[?1049h\x1b[22;0;0t\x1b[?25l"
        );
        out.finish_terminal().unwrap();
        let text = take(&mut out);
        assert!(text.starts_with("\x1b(B\x1b[m\x1b[?12l\x1b[?25h\x1b[?1049l"), "{text:?}");
        assert!(text.contains("\x1b8\x1b[?1l\x1b>"));
    }

    #[test]
    fn clear_term_needs_space_fill() {
        let mut out = output("xterm", Size::new(80, 24));
        assert!(!out.clear_term(&Cell::new('#')).unwrap());
        assert!(out.clear_term(&Cell::EMPTY).unwrap());
        let text = take(&mut out);
        assert!(text.contains("\x1b[H\x1b[2J"), "{text:?}");
        assert_eq!(out.state().cursor, Some(Point::new(0, 0)));
    }

    #[test]
    fn scrolling_uses_ind_and_ri() {
        let mut out = output("xterm", Size::new(80, 24));
        assert!(out.scroll_forward().unwrap());
        assert_eq!(take(&mut out), "\x1b[24;1H\n");
        assert!(out.scroll_reverse().unwrap());
        assert_eq!(take(&mut out), "\x1b[H\x1bM");
    }

    #[test]
    fn beep_flushes_bell() {
        let mut out = output("xterm", Size::new(80, 24));
        out.beep().unwrap();
        assert_eq!(out.queue().sink().as_slice(), b"\x07");
    }

    #[test]
    fn palette_on_linux_console() {
        let mut out = output("linux", Size::new(80, 25));
        out.set_palette(Color::RED.index().unwrap(), 0xff, 0x10, 0x00).unwrap();
        // initc scales to 0..1000 and back, losing a little.
        assert_eq!(take(&mut out), "\x1b]P1fe0f00");
    }

    #[test]
    fn cursor_visibility_is_tracked() {
        let mut out = output("xterm", Size::new(80, 24));
        out.hide_cursor(true).unwrap();
        out.hide_cursor(true).unwrap();
        assert_eq!(take(&mut out), "\x1b[?25l");
    }
}
