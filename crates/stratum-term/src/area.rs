// SPDX-License-Identifier: MIT
//
// TermArea — a rectangular cell buffer with per-row dirty tracking.
//
// Windows, the desktop and the virtual terminal itself are all areas.
// An area covers `(width + right_shadow) × (height + bottom_shadow)` cells;
// the shadow margins belong to the area but sit outside its content
// rectangle. Its offset places the top-left corner in terminal
// coordinates, and may be negative on the left when a window hangs off
// the screen.
//
// Dirty tracking is per row: `xmin..=xmax` spans every column written
// since the row was last merged, `xmin > xmax` meaning nothing changed.
// Each row also counts its cells that carry a transparency class, so the
// compositor can skip the layer walk for fully opaque rows.
//
// Buffers are allocated with fallible reservation: a failed resize
// reports `TermError::Allocation` and leaves the area exactly as it was.

use crate::cell::{Cell, CellFlags};
use crate::error::{EndOfArea, Result, TermError};
use crate::geometry::{Point, Rect, Size};

// ─── LineChanges ─────────────────────────────────────────────────────────────

/// Dirty range and transparency count of one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineChanges {
    pub xmin: usize,
    pub xmax: usize,
    /// Cells of the row with a transparency class.
    pub trans_count: usize,
}

impl LineChanges {
    /// A row with no changes.
    #[inline]
    #[must_use]
    pub const fn clean(full_width: usize) -> Self {
        Self {
            xmin: full_width,
            xmax: 0,
            trans_count: 0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.xmin <= self.xmax
    }

    /// Widen the dirty range to include `x`.
    #[inline]
    pub fn mark(&mut self, x: usize) {
        self.xmin = self.xmin.min(x);
        self.xmax = self.xmax.max(x);
    }

    /// Widen the dirty range to include `from..=to`.
    #[inline]
    pub fn mark_range(&mut self, from: usize, to: usize) {
        self.xmin = self.xmin.min(from);
        self.xmax = self.xmax.max(to);
    }

    /// Forget the dirty range, keeping the transparency count.
    #[inline]
    pub fn reset(&mut self, full_width: usize) {
        self.xmin = full_width;
        self.xmax = 0;
    }
}

/// Whether moving from `from` to `to` adds a transparency flag.
fn gained_transparency(from: &Cell, to: &Cell) -> bool {
    !(to.flags & CellFlags::TRANSPARENCY & !from.flags).is_empty()
}

// ─── Compositing rule ────────────────────────────────────────────────────────

/// The cell seen when `over` lies on top of `under`.
///
/// A transparent cell shows `under` as is. A color-overlay cell shows
/// `under` recolored with its own colors. An inherit-background cell shows
/// its own glyph on `under`'s background. Anything else hides `under`.
#[must_use]
pub fn composite(under: &Cell, over: &Cell) -> Cell {
    if over.is_transparent() {
        *under
    } else if over.is_color_overlay() {
        under.shaded(over.fg, over.bg)
    } else if over.is_inherit_background() {
        let mut cell = over.with_bg(under.bg);
        cell.flags.remove(CellFlags::INHERIT_BACKGROUND);
        cell
    } else {
        *over
    }
}

// ─── TermArea ────────────────────────────────────────────────────────────────

/// A rectangular buffer of cells.
#[derive(Debug, Clone)]
pub struct TermArea {
    offset: Point,
    width: usize,
    height: usize,
    right_shadow: usize,
    bottom_shadow: usize,
    /// Rows still shown while minimized.
    pub min_height: usize,
    /// Print cursor, 1-based area coordinates.
    pub cursor: Point,
    /// Input cursor, 0-based area coordinates.
    pub input_cursor: Point,
    pub input_cursor_visible: bool,
    pub has_changes: bool,
    pub visible: bool,
    pub minimized: bool,
    changes: Vec<LineChanges>,
    data: Vec<Cell>,
}

fn cell_count(width: usize, height: usize) -> Result<usize> {
    width
        .checked_mul(height)
        .ok_or(TermError::Allocation { cells: usize::MAX })
}

fn alloc<T: Clone>(len: usize, value: T) -> Result<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| TermError::Allocation { cells: len })?;
    v.resize(len, value);
    Ok(v)
}

impl TermArea {
    /// Allocate an area at `bounds` with the given shadow margins.
    ///
    /// # Errors
    ///
    /// [`TermError::Allocation`] when the buffers cannot be allocated.
    pub fn new(bounds: Rect, shadow: Size) -> Result<Self> {
        let full_width = bounds.width + shadow.width;
        let full_height = bounds.height + shadow.height;
        let cells = cell_count(full_width, full_height)?;
        Ok(Self {
            offset: bounds.origin(),
            width: bounds.width,
            height: bounds.height,
            right_shadow: shadow.width,
            bottom_shadow: shadow.height,
            min_height: 1,
            cursor: Point::new(1, 1),
            input_cursor: Point::new(0, 0),
            input_cursor_visible: false,
            has_changes: false,
            visible: false,
            minimized: false,
            changes: alloc(full_height, LineChanges::clean(full_width))?,
            data: alloc(cells, Cell::EMPTY)?,
        })
    }

    /// Move and resize the area. Content is cleared unless only the
    /// offset changes.
    ///
    /// # Errors
    ///
    /// [`TermError::Allocation`] when new buffers are needed and cannot be
    /// allocated; the area is left untouched.
    pub fn resize(&mut self, bounds: Rect, shadow: Size) -> Result<()> {
        if bounds.size() == self.size() && shadow == self.shadow() {
            self.offset = bounds.origin();
            return Ok(());
        }
        let full_width = bounds.width + shadow.width;
        let full_height = bounds.height + shadow.height;
        let cells = cell_count(full_width, full_height)?;

        let new_changes = if full_height == self.changes.len() {
            None
        } else {
            Some(alloc(full_height, LineChanges::clean(full_width))?)
        };
        let new_data = if cells == self.data.len() {
            None
        } else {
            Some(alloc(cells, Cell::EMPTY)?)
        };
        if let Some(changes) = new_changes {
            self.changes = changes;
        }
        if let Some(data) = new_data {
            self.data = data;
        }

        self.offset = bounds.origin();
        self.width = bounds.width;
        self.height = bounds.height;
        self.right_shadow = shadow.width;
        self.bottom_shadow = shadow.height;
        self.data.fill(Cell::EMPTY);
        self.changes.fill(LineChanges::clean(full_width));
        self.has_changes = false;
        tracing::trace!(width = full_width, height = full_height, "area resized");
        Ok(())
    }

    // ─── Geometry ─────────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub const fn offset(&self) -> Point {
        self.offset
    }

    #[inline]
    pub fn set_offset(&mut self, offset: Point) {
        self.offset = offset;
    }

    #[inline]
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    #[inline]
    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    /// Content size, without shadow.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    #[inline]
    #[must_use]
    pub const fn shadow(&self) -> Size {
        Size::new(self.right_shadow, self.bottom_shadow)
    }

    #[inline]
    #[must_use]
    pub const fn full_width(&self) -> usize {
        self.width + self.right_shadow
    }

    #[inline]
    #[must_use]
    pub const fn full_height(&self) -> usize {
        self.height + self.bottom_shadow
    }

    /// Rows currently occupied on screen.
    #[inline]
    #[must_use]
    pub const fn visible_height(&self) -> usize {
        if self.minimized {
            self.min_height
        } else {
            self.full_height()
        }
    }

    /// Whether the terminal position `pos` falls on this area.
    #[must_use]
    pub fn contains(&self, pos: Point) -> bool {
        Rect::new(self.offset.x, self.offset.y, self.full_width(), self.visible_height())
            .contains(pos)
    }

    /// Whether the 0-based area position `pos` is inside the buffer.
    #[must_use]
    pub fn is_inside(&self, pos: Point) -> bool {
        usize::try_from(pos.x).is_ok_and(|x| x < self.full_width())
            && usize::try_from(pos.y).is_ok_and(|y| y < self.full_height())
    }

    // ─── Cells ────────────────────────────────────────────────────────────

    #[inline]
    fn index(&self, x: usize, y: usize) -> usize {
        y * self.full_width() + x
    }

    #[must_use]
    pub fn cell(&self, x: usize, y: usize) -> Option<&Cell> {
        (x < self.full_width() && y < self.full_height()).then(|| &self.data[self.index(x, y)])
    }

    pub fn cell_mut(&mut self, x: usize, y: usize) -> Option<&mut Cell> {
        if x < self.full_width() && y < self.full_height() {
            let i = self.index(x, y);
            Some(&mut self.data[i])
        } else {
            None
        }
    }

    /// Cells of row `y`, shadow included.
    #[must_use]
    pub fn row(&self, y: usize) -> &[Cell] {
        let w = self.full_width();
        &self.data[y * w..(y + 1) * w]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [Cell] {
        let w = self.full_width();
        &mut self.data[y * w..(y + 1) * w]
    }

    #[inline]
    #[must_use]
    pub fn data(&self) -> &[Cell] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [Cell] {
        &mut self.data
    }

    #[inline]
    #[must_use]
    pub fn changes(&self, y: usize) -> &LineChanges {
        &self.changes[y]
    }

    #[inline]
    pub fn changes_mut(&mut self, y: usize) -> &mut LineChanges {
        &mut self.changes[y]
    }

    #[must_use]
    pub fn line_changes(&self) -> &[LineChanges] {
        &self.changes
    }

    /// Store `cell` at the 0-based position, updating dirty range and
    /// transparency count when the stored cell actually changes. Returns
    /// whether it did.
    pub fn put_cell(&mut self, x: usize, y: usize, cell: &Cell) -> bool {
        if x >= self.full_width() || y >= self.full_height() {
            return false;
        }
        let i = self.index(x, y);
        let current = self.data[i];
        if current == *cell && current.flags == cell.flags && current.width == cell.width {
            return false;
        }
        let line = &mut self.changes[y];
        if gained_transparency(&current, cell) {
            line.trans_count += 1;
        }
        if gained_transparency(cell, &current) {
            line.trans_count = line.trans_count.saturating_sub(1);
        }
        line.mark(x);
        self.data[i] = *cell;
        true
    }

    // ─── Printing ─────────────────────────────────────────────────────────

    /// Print `cell` at the print cursor and advance it.
    ///
    /// The width of a cell with no stored width is measured. Zero-width
    /// cells other than padding are skipped (`Ok(0)`). A wide glyph is
    /// followed by a padding companion in UTF-8 mode or a `.` filler
    /// otherwise. Passing the right edge wraps to the next row; passing
    /// the last row pulls the cursor back and reports [`EndOfArea`] after
    /// the cell was written.
    ///
    /// # Errors
    ///
    /// [`EndOfArea`] once the cursor has moved past the last row.
    pub fn print_cell(&mut self, cell: &Cell, utf8: bool) -> std::result::Result<usize, EndOfArea> {
        let mut cell = *cell;
        if cell.width == 0 && !cell.is_padding() {
            cell.width = cell.measured_width();
        }
        if cell.width == 0 && !cell.is_padding() {
            return Ok(0);
        }

        if self.cursor.x > 0 && self.cursor.y > 0 {
            let x = (self.cursor.x - 1) as usize;
            let y = (self.cursor.y - 1) as usize;
            self.put_cell(x, y, &cell);
        }
        self.cursor.x += 1;
        self.has_changes = true;

        if self.cursor.x > self.full_width() as i32 {
            self.cursor = Point::new(1, self.cursor.y + 1);
        } else if cell.width == 2 {
            let padding = if utf8 {
                Cell::padding(cell.fg, cell.bg, cell.attrs).with_flags(
                    CellFlags::FULLWIDTH_PADDING | (cell.flags & CellFlags::TRANSPARENCY),
                )
            } else {
                cell.with_char('.')
            };
            self.print_cell(&padding, utf8)?;
        }

        if self.cursor.y > self.full_height() as i32 {
            self.cursor.y -= 1;
            return Err(EndOfArea);
        }
        Ok(1)
    }

    /// Apply the right-margin wrap and bottom check to the print cursor
    /// after a control character moved it.
    ///
    /// # Errors
    ///
    /// [`EndOfArea`] when the cursor is past the last row.
    pub fn wrap_cursor(&mut self) -> std::result::Result<(), EndOfArea> {
        if self.cursor.x > self.full_width() as i32 {
            self.cursor = Point::new(1, self.cursor.y + 1);
        }
        if self.cursor.y > self.full_height() as i32 {
            self.cursor.y -= 1;
            return Err(EndOfArea);
        }
        Ok(())
    }

    // ─── Bulk operations ──────────────────────────────────────────────────

    /// Mark every row fully dirty.
    pub fn mark_all_dirty(&mut self) {
        let last = self.full_width().saturating_sub(1);
        for line in &mut self.changes {
            line.mark_range(0, last);
        }
        self.has_changes = true;
    }

    /// Forget every dirty range.
    pub fn clear_changes(&mut self) {
        let w = self.full_width();
        for line in &mut self.changes {
            line.reset(w);
        }
        self.has_changes = false;
    }

    /// Recount the transparent cells of every row.
    pub fn recount_transparency(&mut self) {
        let w = self.full_width();
        for (y, line) in self.changes.iter_mut().enumerate() {
            line.trans_count = self.data[y * w..(y + 1) * w]
                .iter()
                .filter(|c| c.has_transparency())
                .count();
        }
    }

    /// Overwrite every cell with `cell` and mark everything dirty.
    pub fn fill(&mut self, cell: &Cell) {
        self.data.fill(*cell);
        self.recount_transparency();
        self.mark_all_dirty();
    }

    /// Composite `src` onto this area with its top-left corner at the
    /// 1-based position `pos`. Transparency classes of `src` cells are
    /// honored; the touched ranges become dirty.
    pub fn copy_from(&mut self, pos: Point, src: &Self) {
        let ox = pos.x - 1;
        let oy = pos.y - 1;
        for sy in 0..src.full_height() {
            let Ok(y) = usize::try_from(oy + sy as i32) else {
                continue;
            };
            if y >= self.full_height() {
                break;
            }
            for sx in 0..src.full_width() {
                let Ok(x) = usize::try_from(ox + sx as i32) else {
                    continue;
                };
                if x >= self.full_width() {
                    break;
                }
                let over = src.data[src.index(sx, sy)];
                let merged = composite(&self.data[self.index(x, y)], &over);
                self.put_cell(x, y, &merged);
            }
        }
        self.has_changes = true;
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
