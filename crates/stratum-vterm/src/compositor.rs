// SPDX-License-Identifier: MIT
//
// Compositor — layered areas merged into one virtual terminal.
//
// The desktop is the bottom layer and always exists. Windows stack above
// it in list order, last one on top. Widgets draw into their own areas;
// a composite pass merges every area's dirty rows into the virtual
// terminal (`vterm`), and the output engine then sends the vterm's dirty
// rows to the physical terminal.
//
// Merging one cell looks at what lies above and below it:
//
//   Full      an opaque cell of a higher window hides it, nothing is merged
//   Half      a color-overlay cell of a higher window tints it
//   otherwise the cell's own transparency class decides how much of the
//             layers below shows through
//
// A window is only ever hidden by windows stacked above it, never by
// itself or by anything below.
//
// Areas live in a generational arena and are addressed by `AreaId`
// handles, so a handle to a removed area is refused instead of reaching a
// recycled slot.

use std::fmt;
use std::io::Write;

use stratum_term::area::composite;
use stratum_term::painter::FlushStats;
use stratum_term::{Cell, CellFlags, Point, Rect, Size, TermArea, TermOutput, TermProfile};

use crate::attribute::TextStyle;
use crate::error::{AreaError, Result};

/// Rows a minimized window keeps on screen.
pub const DEFAULT_MINIMIZED_HEIGHT: usize = 1;

/// Flags that only describe the vterm's relation to the screen.
const SCREEN_FLAGS: CellFlags = CellFlags::PRINTED.union(CellFlags::NO_CHANGES);

// ─── Handles ─────────────────────────────────────────────────────────────────

/// Handle of an area owned by a [`Compositor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AreaId {
    index: usize,
    generation: u32,
}

impl fmt::Display for AreaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

struct Slot {
    generation: u32,
    area: Option<TermArea>,
}

fn lookup(slots: &[Slot], id: AreaId) -> Option<&TermArea> {
    slots
        .get(id.index)
        .filter(|s| s.generation == id.generation)
        .and_then(|s| s.area.as_ref())
}

fn lookup_mut(slots: &mut [Slot], id: AreaId) -> Option<&mut TermArea> {
    slots
        .get_mut(id.index)
        .filter(|s| s.generation == id.generation)
        .and_then(|s| s.area.as_mut())
}

/// Cell of `area` at the 0-based terminal position `pos`.
fn cell_at(area: &TermArea, pos: Point) -> Option<&Cell> {
    let x = usize::try_from(pos.x - area.offset().x).ok()?;
    let y = usize::try_from(pos.y - area.offset().y).ok()?;
    area.cell(x, y)
}

/// Screen rectangle of an area in 1-based terminal coordinates.
fn footprint(area: &TermArea) -> Rect {
    let offset = area.offset();
    Rect::new(offset.x + 1, offset.y + 1, area.full_width(), area.visible_height())
}

/// A space in `cell`'s style, without any bookkeeping flags.
fn blank_like(cell: &Cell) -> Cell {
    let mut blank = cell.with_char(' ');
    blank.flags.remove(CellFlags::FULLWIDTH_PADDING | SCREEN_FLAGS);
    blank
}

/// Store a merged cell in the vterm. It is flagged as unchanged when the
/// terminal already shows exactly this.
fn store_vterm_cell(vterm: &mut TermArea, x: usize, y: usize, mut cell: Cell) {
    let Some(tc) = vterm.cell_mut(x, y) else {
        return;
    };
    cell.flags &= CellFlags::FULLWIDTH_PADDING;
    if tc.is_printed() && *tc == cell {
        cell.flags |= SCREEN_FLAGS;
    }
    *tc = cell;
}

// ─── Public enums ────────────────────────────────────────────────────────────

/// How much of a position the windows above an area hide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    None,
    /// Tinted by a color-overlay cell.
    Half,
    /// Hidden by an opaque cell.
    Full,
}

/// Argument of [`Compositor::set_terminal_updates`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalUpdates {
    /// Suspend flushing to the terminal.
    Stop,
    /// Resume flushing at the next update.
    Continue,
    /// Resume and flush right away.
    Start,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Lookup {
    /// Layers at or below the area.
    Covered,
    /// Layers above the area.
    Overlapped,
}

/// Pulls a child area's content into its parent right before the parent
/// is composited.
pub type Preprocessor = Box<dyn FnMut(&mut TermArea, &TermArea)>;

struct Preprocessing {
    target: AreaId,
    child: AreaId,
    handler: Preprocessor,
}

// ─── Compositor ──────────────────────────────────────────────────────────────

/// Owner of the virtual terminal, the desktop, every window area and the
/// output engine.
pub struct Compositor<W: Write> {
    output: TermOutput<W>,
    vterm: TermArea,
    slots: Vec<Slot>,
    free: Vec<usize>,
    desktop: AreaId,
    /// Bottom to top.
    windows: Vec<AreaId>,
    active: AreaId,
    preprocessing: Vec<Preprocessing>,
    style: TextStyle,
    tabstop: usize,
    updates_suspended: bool,
    force_update: bool,
    draw_completed: bool,
    resize_pending: bool,
    initialized: bool,
    finished: bool,
}

impl<W: Write> Compositor<W> {
    /// Compositor for `profile` on a terminal of `size`, writing to `sink`.
    ///
    /// # Errors
    ///
    /// [`AreaError::Term`] when the vterm or desktop cannot be allocated.
    pub fn new(profile: &TermProfile, size: Size, baud: u32, sink: W) -> Result<Self> {
        Self::with_output(TermOutput::new(profile, size, baud, sink), profile.tabstop)
    }

    /// Compositor around an existing output engine. The vterm and the
    /// desktop take the engine's terminal size.
    ///
    /// # Errors
    ///
    /// [`AreaError::Term`] when the vterm or desktop cannot be allocated.
    pub fn with_output(output: TermOutput<W>, tabstop: usize) -> Result<Self> {
        let size = output.size();
        let bounds = Rect::new(0, 0, size.width, size.height);
        let mut vterm = TermArea::new(bounds, Size::default()).inspect_err(|e| {
            tracing::error!(%e, width = size.width, height = size.height, "cannot allocate the virtual terminal");
        })?;
        vterm.visible = true;
        let mut desktop = TermArea::new(bounds, Size::default())?;
        desktop.visible = true;

        let desktop_id = AreaId {
            index: 0,
            generation: 0,
        };
        tracing::debug!(width = size.width, height = size.height, tabstop, "compositor ready");
        Ok(Self {
            output,
            vterm,
            slots: vec![Slot {
                generation: 0,
                area: Some(desktop),
            }],
            free: Vec::new(),
            desktop: desktop_id,
            windows: Vec::new(),
            active: desktop_id,
            preprocessing: Vec::new(),
            style: TextStyle::NORMAL,
            tabstop: tabstop.max(1),
            updates_suspended: false,
            force_update: false,
            draw_completed: true,
            resize_pending: false,
            initialized: false,
            finished: false,
        })
    }

    // ─── Accessors ────────────────────────────────────────────────────────

    #[inline]
    #[must_use]
    pub const fn vterm(&self) -> &TermArea {
        &self.vterm
    }

    #[inline]
    #[must_use]
    pub const fn desktop(&self) -> AreaId {
        self.desktop
    }

    /// Window stack, bottom to top.
    #[inline]
    #[must_use]
    pub fn windows(&self) -> &[AreaId] {
        &self.windows
    }

    #[inline]
    #[must_use]
    pub const fn active_area(&self) -> AreaId {
        self.active
    }

    #[inline]
    #[must_use]
    pub const fn output(&self) -> &TermOutput<W> {
        &self.output
    }

    #[inline]
    pub fn output_mut(&mut self) -> &mut TermOutput<W> {
        &mut self.output
    }

    /// Style of the next printed glyph.
    #[inline]
    #[must_use]
    pub const fn style(&self) -> &TextStyle {
        &self.style
    }

    #[inline]
    pub fn style_mut(&mut self) -> &mut TextStyle {
        &mut self.style
    }

    #[inline]
    #[must_use]
    pub const fn tabstop(&self) -> usize {
        self.tabstop
    }

    #[inline]
    #[must_use]
    pub const fn is_updates_suspended(&self) -> bool {
        self.updates_suspended
    }

    #[must_use]
    pub fn area(&self, id: AreaId) -> Option<&TermArea> {
        lookup(&self.slots, id)
    }

    pub fn area_mut(&mut self, id: AreaId) -> Option<&mut TermArea> {
        lookup_mut(&mut self.slots, id)
    }

    pub(crate) fn get(&self, id: AreaId) -> Result<&TermArea> {
        self.area(id).ok_or(AreaError::UnknownArea(id))
    }

    pub(crate) fn get_mut(&mut self, id: AreaId) -> Result<&mut TermArea> {
        self.area_mut(id).ok_or(AreaError::UnknownArea(id))
    }

    /// Mutable `target` and shared `child` at once.
    fn pair_mut(&mut self, target: AreaId, child: AreaId) -> Option<(&mut TermArea, &TermArea)> {
        if target.index == child.index {
            return None;
        }
        self.area(target)?;
        self.area(child)?;
        let (lo, hi) = self.slots.split_at_mut(target.index.max(child.index));
        let (t, c) = if target.index < child.index {
            (&mut lo[target.index], &hi[0])
        } else {
            (&mut hi[0], &lo[child.index])
        };
        Some((t.area.as_mut()?, c.area.as_ref()?))
    }

    /// Stacking layer: 0 for the desktop and areas outside the window
    /// stack, 1 for the bottom window and so on.
    #[must_use]
    pub fn layer(&self, id: AreaId) -> usize {
        self.windows.iter().position(|&w| w == id).map_or(0, |i| i + 1)
    }

    // ─── Area lifecycle ───────────────────────────────────────────────────

    /// Allocate a hidden area at `bounds` (0-based terminal offset) with
    /// the given shadow margins.
    ///
    /// # Errors
    ///
    /// [`AreaError::Term`] when the buffers cannot be allocated.
    pub fn create_area(&mut self, bounds: Rect, shadow: Size) -> Result<AreaId> {
        let area = TermArea::new(bounds, shadow).inspect_err(|e| {
            tracing::error!(%e, ?bounds, "cannot allocate area");
        })?;
        let id = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index];
            slot.area = Some(area);
            AreaId {
                index,
                generation: slot.generation,
            }
        } else {
            self.slots.push(Slot {
                generation: 0,
                area: Some(area),
            });
            AreaId {
                index: self.slots.len() - 1,
                generation: 0,
            }
        };
        tracing::trace!(%id, ?bounds, ?shadow, "area created");
        Ok(id)
    }

    /// Move and resize an area. Its content is cleared unless only the
    /// offset changes. For a visible area the screen region it occupied
    /// is regenerated and the new one merged at the next pass.
    ///
    /// # Errors
    ///
    /// [`AreaError::UnknownArea`] for a stale handle, [`AreaError::Term`]
    /// when new buffers cannot be allocated (the area keeps its old ones).
    pub fn resize_area(&mut self, id: AreaId, bounds: Rect, shadow: Size) -> Result<()> {
        let area = self.get_mut(id)?;
        let old = footprint(area);
        area.resize(bounds, shadow).inspect_err(|e| {
            tracing::error!(%e, %id, ?bounds, "cannot resize area");
        })?;
        area.min_height = DEFAULT_MINIMIZED_HEIGHT;
        if area.visible {
            area.mark_all_dirty();
            self.restore_vterm(old);
        }
        Ok(())
    }

    /// Free an area. A visible window's screen region is regenerated from
    /// the remaining layers.
    ///
    /// # Errors
    ///
    /// [`AreaError::Desktop`] for the desktop, [`AreaError::UnknownArea`]
    /// for a stale handle.
    pub fn remove_area(&mut self, id: AreaId) -> Result<TermArea> {
        if id == self.desktop {
            return Err(AreaError::Desktop);
        }
        self.get(id)?;
        let was_window = self.take_window(id);
        let slot = &mut self.slots[id.index];
        let area = slot.area.take().ok_or(AreaError::UnknownArea(id))?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);

        self.preprocessing.retain(|p| p.target != id && p.child != id);
        if self.active == id {
            self.active = self.desktop;
        }
        if was_window && area.visible {
            self.restore_vterm(footprint(&area));
        }
        tracing::trace!(%id, "area removed");
        Ok(area)
    }

    /// Show or hide an area. Hiding regenerates the screen region it
    /// occupied; showing marks it for a full merge.
    ///
    /// # Errors
    ///
    /// [`AreaError::UnknownArea`] for a stale handle.
    pub fn set_visible(&mut self, id: AreaId, visible: bool) -> Result<()> {
        let area = self.get_mut(id)?;
        if area.visible == visible {
            return Ok(());
        }
        area.visible = visible;
        if visible {
            area.mark_all_dirty();
        } else {
            let old = footprint(area);
            self.restore_vterm(old);
            if self.active == id {
                self.vterm.input_cursor_visible = false;
            }
        }
        Ok(())
    }

    /// Move an area to the 0-based terminal `offset`, keeping its content.
    ///
    /// # Errors
    ///
    /// [`AreaError::UnknownArea`] for a stale handle.
    pub fn move_area(&mut self, id: AreaId, offset: Point) -> Result<()> {
        let area = self.get_mut(id)?;
        if area.offset() == offset {
            return Ok(());
        }
        let old = footprint(area);
        let visible = area.visible;
        area.set_offset(offset);
        area.mark_all_dirty();
        if visible {
            self.restore_vterm(old);
        }
        Ok(())
    }

    // ─── Window stack ─────────────────────────────────────────────────────

    /// Put an area on top of the window stack.
    ///
    /// # Errors
    ///
    /// [`AreaError::Desktop`] for the desktop, [`AreaError::UnknownArea`]
    /// for a stale handle.
    pub fn insert_window(&mut self, id: AreaId) -> Result<()> {
        if id == self.desktop {
            return Err(AreaError::Desktop);
        }
        let area = self.get_mut(id)?;
        area.mark_all_dirty();
        if !self.windows.contains(&id) {
            self.windows.push(id);
        }
        Ok(())
    }

    /// Take an area off the window stack, regenerating its screen region.
    /// Returns whether it was stacked.
    ///
    /// # Errors
    ///
    /// [`AreaError::UnknownArea`] for a stale handle.
    pub fn remove_window(&mut self, id: AreaId) -> Result<bool> {
        let region = footprint(self.get(id)?);
        let visible = self.get(id)?.visible;
        if !self.take_window(id) {
            return Ok(false);
        }
        if visible {
            self.restore_vterm(region);
        }
        Ok(true)
    }

    fn take_window(&mut self, id: AreaId) -> bool {
        match self.windows.iter().position(|&w| w == id) {
            Some(i) => {
                self.windows.remove(i);
                true
            }
            None => false,
        }
    }

    /// Move a stacked window to the top. Returns whether the order
    /// changed.
    ///
    /// # Errors
    ///
    /// [`AreaError::UnknownArea`] for a stale handle.
    pub fn raise_window(&mut self, id: AreaId) -> Result<bool> {
        self.get(id)?;
        if self.windows.last() == Some(&id) || !self.take_window(id) {
            return Ok(false);
        }
        self.windows.push(id);
        self.get_mut(id)?.mark_all_dirty();
        Ok(true)
    }

    /// Move a stacked window to the bottom, just above the desktop.
    /// Returns whether the order changed.
    ///
    /// # Errors
    ///
    /// [`AreaError::UnknownArea`] for a stale handle.
    pub fn lower_window(&mut self, id: AreaId) -> Result<bool> {
        let area = self.get(id)?;
        let region = footprint(area);
        let visible = area.visible;
        if self.windows.first() == Some(&id) || !self.take_window(id) {
            return Ok(false);
        }
        self.windows.insert(0, id);
        if visible {
            self.restore_vterm(region);
        }
        Ok(true)
    }

    /// Make `id` the area whose input cursor is shown.
    ///
    /// # Errors
    ///
    /// [`AreaError::UnknownArea`] for a stale handle.
    pub fn set_active_area(&mut self, id: AreaId) -> Result<()> {
        self.get(id)?;
        self.active = id;
        self.update_vterm_cursor(id);
        Ok(())
    }

    // ─── Coverage ─────────────────────────────────────────────────────────

    /// How much of the 0-based terminal position `pos` the windows above
    /// `id` hide. Only windows stacked above count; for the desktop that
    /// is every window.
    #[must_use]
    pub fn is_covered(&self, pos: Point, id: AreaId) -> Coverage {
        let mut above = id == self.desktop;
        let mut coverage = Coverage::None;
        for &win_id in &self.windows {
            let Some(win) = self.area(win_id).filter(|w| w.visible) else {
                continue;
            };
            if above && win.contains(pos) {
                if let Some(cell) = cell_at(win, pos) {
                    if cell.is_color_overlay() {
                        coverage = Coverage::Half;
                    } else if !cell.is_transparent() {
                        return Coverage::Full;
                    }
                }
            }
            if win_id == id {
                above = true;
            }
        }
        coverage
    }

    /// Desktop cell at `pos`, clamped into the terminal.
    fn desktop_cell(&self, pos: Point) -> Cell {
        let max_x = i32::try_from(self.vterm.width()).unwrap_or(i32::MAX) - 1;
        let max_y = i32::try_from(self.vterm.height()).unwrap_or(i32::MAX) - 1;
        let x = pos.x.min(max_x).max(0);
        let y = pos.y.min(max_y).max(0);
        self.area(self.desktop)
            .and_then(|d| cell_at(d, Point::new(x, y)))
            .copied()
            .unwrap_or(Cell::EMPTY)
    }

    fn layered_character(&self, lookup: Lookup, pos: Point, id: AreaId) -> Cell {
        let mut cell = self.desktop_cell(pos);
        let layer = self.layer(id);
        for (i, &win_id) in self.windows.iter().enumerate() {
            let significant = match lookup {
                Lookup::Covered => layer > i,
                Lookup::Overlapped => layer < i + 1,
            };
            if win_id != id && significant {
                let Some(win) = self.area(win_id).filter(|w| w.visible) else {
                    continue;
                };
                if win.contains(pos) {
                    if let Some(over) = cell_at(win, pos) {
                        cell = composite(&cell, over);
                    }
                }
            } else if lookup == Lookup::Covered {
                break;
            }
        }
        cell
    }

    /// What the layers below `id` show at the 0-based terminal position
    /// `pos`: the desktop and every window stacked under `id`.
    #[must_use]
    pub fn covered_character(&self, pos: Point, id: AreaId) -> Cell {
        self.layered_character(Lookup::Covered, pos, id)
    }

    /// The desktop at `pos` with every window stacked above `id` on top.
    #[must_use]
    pub fn overlapped_character(&self, pos: Point, id: AreaId) -> Cell {
        self.layered_character(Lookup::Overlapped, pos, id)
    }

    /// The cell every visible layer together shows at the 0-based
    /// terminal position `pos`.
    #[must_use]
    pub fn generate_character(&self, pos: Point) -> Cell {
        let mut cell = self
            .area(self.desktop)
            .and_then(|d| cell_at(d, pos))
            .copied()
            .unwrap_or(Cell::EMPTY);
        for &win_id in &self.windows {
            let Some(win) = self.area(win_id).filter(|w| w.visible) else {
                continue;
            };
            if win.contains(pos) {
                if let Some(over) = cell_at(win, pos) {
                    cell = composite(&cell, over);
                }
            }
        }
        cell
    }

    // ─── Merging ──────────────────────────────────────────────────────────

    /// The cell area `id` contributes at `terminal_pos`, or `None` when a
    /// higher window hides it.
    fn merged_character(&self, area: &TermArea, id: AreaId, x: usize, y: usize, terminal_pos: Point) -> Option<Cell> {
        let ac = *area.cell(x, y)?;
        match self.is_covered(terminal_pos, id) {
            Coverage::Full => None,
            Coverage::Half => {
                let oc = self.overlapped_character(terminal_pos, id);
                let base = if ac.has_transparency() {
                    composite(&self.covered_character(terminal_pos, id), &ac)
                } else {
                    ac
                };
                Some(base.shaded(oc.fg, oc.bg))
            }
            Coverage::None if ac.has_transparency() => {
                Some(composite(&self.covered_character(terminal_pos, id), &ac))
            }
            Coverage::None => Some(ac),
        }
    }

    /// Merge cell `(x, y)` of area `id` into the vterm at `terminal_pos`.
    /// Returns `false` when the position is hidden by a higher window.
    pub fn update_vterm_character(&mut self, id: AreaId, x: usize, y: usize, terminal_pos: Point) -> bool {
        let Some(area) = self.area(id) else {
            return false;
        };
        let Some(cell) = self.merged_character(area, id, x, y, terminal_pos) else {
            return false;
        };
        let (Ok(tx), Ok(ty)) = (usize::try_from(terminal_pos.x), usize::try_from(terminal_pos.y)) else {
            return false;
        };
        store_vterm_cell(&mut self.vterm, tx, ty, cell);
        true
    }

    /// Merge every dirty row of area `id` into the vterm.
    ///
    /// Preprocessing handlers run first. Rows and columns outside the
    /// terminal are clipped, including the part of a window hanging off
    /// the left edge. Leading hidden cells do not widen the vterm's dirty
    /// range. Every merged area row comes out clean.
    ///
    /// # Errors
    ///
    /// [`AreaError::UnknownArea`] for a stale handle.
    pub fn put_area(&mut self, id: AreaId) -> Result<()> {
        if !self.get(id)?.visible {
            return Ok(());
        }
        self.call_preprocessing_handlers(id);

        let area = self.get(id)?;
        let offset = area.offset();
        let full_width = area.full_width();
        let width = i32::try_from(full_width).unwrap_or(i32::MAX);
        let height = i32::try_from(area.visible_height()).unwrap_or(i32::MAX);
        let vw = i32::try_from(self.vterm.width()).unwrap_or(i32::MAX);
        let vh = i32::try_from(self.vterm.height()).unwrap_or(i32::MAX);

        // Columns hanging off the left edge.
        let outside_left = (-offset.x).max(0);
        let ax = offset.x.max(0);
        let ay = offset.y;
        let y_end = height.min(vh - ay);

        for y in 0..y_end.max(0) {
            let row = y as usize;
            let ty = ay + y;
            let Some(line) = self.area(id).map(|a| *a.changes(row)) else {
                break;
            };
            if ty >= 0 && line.is_dirty() {
                let mut xmin = line.xmin as i32;
                let mut xmax = line.xmax as i32;
                if ax == 0 {
                    xmin = xmin.max(outside_left);
                }
                if width + ax - outside_left >= vw {
                    xmax = xmax.min(vw + outside_left - ax - 1);
                }
                if ax + xmin - outside_left < vw && xmin <= xmax {
                    let mut first = None;
                    for x in xmin..=xmax {
                        let tx = ax + x - outside_left;
                        if self.update_vterm_character(id, x as usize, row, Point::new(tx, ty)) && first.is_none() {
                            first = Some(tx);
                        }
                    }
                    if let Some(from) = first {
                        let to = (ax + xmax - outside_left).min(vw - 1);
                        self.vterm.changes_mut(ty as usize).mark_range(from as usize, to as usize);
                    }
                }
            }
            if let Some(area) = self.area_mut(id) {
                area.changes_mut(row).reset(full_width);
            }
        }

        self.vterm.has_changes = true;
        self.update_vterm_cursor(id);
        Ok(())
    }

    /// Copy all of area `id` onto the vterm with its top-left corner at
    /// the 1-based terminal position `pos`, regardless of its offset and
    /// dirty ranges. Rows without transparent cells are copied as they
    /// are; the others see the layers below through their transparent
    /// cells.
    ///
    /// # Errors
    ///
    /// [`AreaError::UnknownArea`] for a stale handle.
    pub fn put_area_at(&mut self, pos: Point, id: AreaId) -> Result<()> {
        let area = self.get(id)?;
        if !area.visible {
            return Ok(());
        }
        let origin = pos.offset(-1, -1);
        let mut rows = Vec::with_capacity(area.visible_height());
        for y in 0..area.visible_height() {
            let Ok(ty) = usize::try_from(origin.y + y as i32) else {
                continue;
            };
            if ty >= self.vterm.height() {
                break;
            }
            let opaque = area.changes(y).trans_count == 0;
            let mut cells = Vec::with_capacity(area.full_width());
            for (x, cell) in area.row(y).iter().enumerate() {
                let tx = origin.x + x as i32;
                let Ok(tx) = usize::try_from(tx) else {
                    continue;
                };
                if tx >= self.vterm.width() {
                    break;
                }
                let merged = if opaque || !cell.has_transparency() {
                    *cell
                } else {
                    composite(&self.covered_character(Point::new(tx as i32, ty as i32), id), cell)
                };
                cells.push((tx, merged));
            }
            rows.push((ty, cells));
        }

        for (ty, cells) in rows {
            let (Some(&(from, _)), Some(&(to, _))) = (cells.first(), cells.last()) else {
                continue;
            };
            for (tx, cell) in cells {
                store_vterm_cell(&mut self.vterm, tx, ty, cell);
            }
            self.vterm.changes_mut(ty).mark_range(from, to);
        }
        self.vterm.has_changes = true;
        Ok(())
    }

    /// Merge every changed area into the vterm: the desktop first, then
    /// each visible window from the bottom up. A window whose own content
    /// is unchanged is still merged when one of its child areas changed.
    ///
    /// # Errors
    ///
    /// [`AreaError::UnknownArea`] if the desktop vanished.
    pub fn update_vterm(&mut self) -> Result<()> {
        let desktop = self.desktop;
        if self.get(desktop)?.has_changes {
            self.put_area(desktop)?;
            self.get_mut(desktop)?.has_changes = false;
        }

        for i in 0..self.windows.len() {
            let id = self.windows[i];
            let Some(win) = self.area(id).filter(|w| w.visible) else {
                continue;
            };
            if win.has_changes {
                self.put_area(id)?;
                self.get_mut(id)?.has_changes = false;
            } else if self.has_child_area_changes(id) {
                self.put_area(id)?;
                self.clear_child_area_changes(id);
            }
        }
        Ok(())
    }

    // ─── Cursor ───────────────────────────────────────────────────────────

    /// Set area `id`'s input cursor to the 1-based area position `pos`.
    ///
    /// # Errors
    ///
    /// [`AreaError::UnknownArea`] for a stale handle.
    pub fn set_area_cursor(&mut self, id: AreaId, pos: Point, visible: bool) -> Result<()> {
        let area = self.get_mut(id)?;
        area.input_cursor = pos.offset(-1, -1);
        area.input_cursor_visible = visible;
        self.update_vterm_cursor(id);
        Ok(())
    }

    /// Carry the active area's input cursor over to the vterm. It is shown
    /// only when it lies inside the area and the terminal and no window
    /// above covers it.
    fn update_vterm_cursor(&mut self, id: AreaId) {
        if id != self.active {
            return;
        }
        let Some(area) = self.area(id) else {
            return;
        };
        if !(area.visible && area.input_cursor_visible) {
            self.vterm.input_cursor_visible = false;
            return;
        }
        let cursor = area.input_cursor;
        let pos = Point::new(area.offset().x + cursor.x, area.offset().y + cursor.y);
        let in_area = Rect::new(0, 0, area.width(), area.height()).contains(cursor);
        if in_area && self.vterm.is_inside(pos) && self.is_covered(pos, id) == Coverage::None {
            self.vterm.input_cursor = pos;
            self.vterm.input_cursor_visible = true;
        } else {
            self.vterm.input_cursor_visible = false;
        }
    }

    // ─── Scrolling ────────────────────────────────────────────────────────

    /// Scroll the content of area `id` up one row. The new bottom row is
    /// blank in the style of the row above it. When the area is the
    /// undisturbed full-screen desktop the terminal is scrolled too.
    ///
    /// # Errors
    ///
    /// [`AreaError::UnknownArea`] for a stale handle, [`AreaError::Io`]
    /// if the scroll sequence cannot be written.
    pub fn scroll_area_forward(&mut self, id: AreaId) -> Result<()> {
        let area = self.get_mut(id)?;
        let height = area.height();
        let width = area.width();
        if height <= 1 || width == 0 {
            return Ok(());
        }
        let total = area.full_width();
        let data = area.data_mut();
        for y in 0..height - 1 {
            let src = (y + 1) * total;
            data.copy_within(src..src + width, y * total);
        }
        let edge = blank_like(&data[(height - 2) * total + width - 1]);
        data[(height - 1) * total..(height - 1) * total + width].fill(edge);
        finish_scroll(area);

        if self.terminal_unobstructed(id) && self.output.scroll_forward()? {
            self.shift_vterm_up();
        }
        Ok(())
    }

    /// Scroll the content of area `id` down one row. The new top row is
    /// blank in the style of the row below it.
    ///
    /// # Errors
    ///
    /// [`AreaError::UnknownArea`] for a stale handle, [`AreaError::Io`]
    /// if the scroll sequence cannot be written.
    pub fn scroll_area_reverse(&mut self, id: AreaId) -> Result<()> {
        let area = self.get_mut(id)?;
        let height = area.height();
        let width = area.width();
        if height <= 1 || width == 0 {
            return Ok(());
        }
        let total = area.full_width();
        let data = area.data_mut();
        for y in (1..height).rev() {
            let src = (y - 1) * total;
            data.copy_within(src..src + width, y * total);
        }
        let edge = blank_like(&data[total]);
        data[..width].fill(edge);
        finish_scroll(area);

        if self.terminal_unobstructed(id) && self.output.scroll_reverse()? {
            self.shift_vterm_down();
        }
        Ok(())
    }

    /// Whether `id` is the desktop, it covers the whole terminal and no
    /// window is showing, so the screen can be changed wholesale.
    fn terminal_unobstructed(&self, id: AreaId) -> bool {
        id == self.desktop
            && self.area(id).is_some_and(|d| {
                d.offset() == Point::default() && d.size() == self.vterm.size()
            })
            && !self
                .windows
                .iter()
                .any(|&w| self.area(w).is_some_and(|a| a.visible))
    }

    /// Mirror a hardware scroll up in the vterm. The row that scrolled in
    /// is unknown and left unprinted.
    fn shift_vterm_up(&mut self) {
        let width = self.vterm.full_width();
        let height = self.vterm.height();
        if height == 0 {
            return;
        }
        self.vterm.data_mut().copy_within(width.., 0);
        for y in 0..height - 1 {
            let below = *self.vterm.changes(y + 1);
            *self.vterm.changes_mut(y) = below;
        }
        self.vterm.row_mut(height - 1).fill(Cell::EMPTY);
        self.vterm.changes_mut(height - 1).reset(width);
    }

    /// Mirror a hardware scroll down in the vterm.
    fn shift_vterm_down(&mut self) {
        let width = self.vterm.full_width();
        let height = self.vterm.height();
        if height == 0 {
            return;
        }
        let len = self.vterm.data().len();
        self.vterm.data_mut().copy_within(..len - width, width);
        for y in (1..height).rev() {
            let above = *self.vterm.changes(y - 1);
            *self.vterm.changes_mut(y) = above;
        }
        self.vterm.row_mut(0).fill(Cell::EMPTY);
        self.vterm.changes_mut(0).reset(width);
    }

    // ─── Clearing and restoring ───────────────────────────────────────────

    /// Fill area `id` with `fill` in the current text style. Shadow
    /// margins become transparent. Clearing the undisturbed full-screen
    /// desktop with a blank clears the terminal directly.
    ///
    /// # Errors
    ///
    /// [`AreaError::UnknownArea`] for a stale handle, [`AreaError::Io`]
    /// if the clear sequence cannot be written.
    pub fn clear_area(&mut self, id: AreaId, fill: char) -> Result<()> {
        let nc = self.style.cell(fill);
        let unobstructed = self.terminal_unobstructed(id) && !nc.has_transparency();
        let Self {
            slots, output, vterm, ..
        } = self;
        let area = lookup_mut(slots, id).ok_or(AreaError::UnknownArea(id))?;
        let shadow = area.shadow();

        if shadow == Size::default() {
            area.data_mut().fill(nc);
            if unobstructed && output.clear_term(&nc)? {
                let mut printed = nc;
                printed.flags = CellFlags::PRINTED;
                vterm.data_mut().fill(printed);
                vterm.clear_changes();
                area.recount_transparency();
                area.clear_changes();
                tracing::trace!("terminal cleared");
                return Ok(());
            }
        } else {
            let width = area.width();
            let clear = nc.with_flags(CellFlags::TRANSPARENT);
            for y in 0..area.height() {
                let row = area.row_mut(y);
                row[..width].fill(nc);
                row[width..].fill(clear);
            }
            let start = area.height() * area.full_width();
            area.data_mut()[start..].fill(clear);
        }

        let total = area.full_width();
        let content_rows = area.height();
        let in_content = if nc.has_transparency() { total } else { shadow.width };
        for y in 0..area.full_height() {
            let line = area.changes_mut(y);
            line.mark_range(0, total.saturating_sub(1));
            line.trans_count = if y < content_rows { in_content } else { total };
        }
        area.has_changes = true;
        Ok(())
    }

    /// Regenerate the vterm inside `rect` (1-based terminal coordinates)
    /// from every visible layer and mark it dirty.
    pub fn restore_vterm(&mut self, rect: Rect) {
        let x = usize::try_from(rect.x - 1).unwrap_or(0);
        let y = usize::try_from(rect.y - 1).unwrap_or(0);
        let vw = self.vterm.width();
        let vh = self.vterm.height();
        if x >= vw || y >= vh {
            return;
        }
        let w = rect.width.min(vw - x);
        let h = rect.height.min(vh - y);
        if w == 0 || h == 0 {
            return;
        }
        for ty in y..y + h {
            for tx in x..x + w {
                let cell = self.generate_character(Point::new(tx as i32, ty as i32));
                store_vterm_cell(&mut self.vterm, tx, ty, cell);
            }
            self.vterm.changes_mut(ty).mark_range(x, x + w - 1);
        }
        self.vterm.has_changes = true;
    }

    /// Redraw the whole terminal from the vterm, forgetting what the
    /// screen was believed to show.
    ///
    /// # Errors
    ///
    /// [`AreaError::Io`] if writing to the terminal fails.
    pub fn put_vterm(&mut self) -> Result<Option<FlushStats>> {
        for cell in self.vterm.data_mut() {
            cell.flags.remove(SCREEN_FLAGS);
        }
        self.vterm.mark_all_dirty();
        self.output.invalidate();
        self.update_terminal()
    }

    /// Copy the vterm into area `id`, starting at the 1-based terminal
    /// position `pos`, as far as the area's content reaches.
    ///
    /// # Errors
    ///
    /// [`AreaError::UnknownArea`] for a stale handle.
    pub fn get_area(&mut self, id: AreaId, pos: Point) -> Result<()> {
        let size = self.get(id)?.size();
        let src = Rect::new(pos.x - 1, pos.y - 1, size.width, size.height);
        self.copy_from_vterm(id, src, Point::default())
    }

    /// Copy the vterm inside `rect` (1-based terminal coordinates) into
    /// the matching part of area `id`.
    ///
    /// # Errors
    ///
    /// [`AreaError::UnknownArea`] for a stale handle.
    pub fn get_area_rect(&mut self, id: AreaId, rect: Rect) -> Result<()> {
        let offset = self.get(id)?.offset();
        let src = Rect::new(rect.x - 1, rect.y - 1, rect.width, rect.height);
        let dst = Point::new(src.x - offset.x, src.y - offset.y);
        self.copy_from_vterm(id, src, dst)
    }

    fn copy_from_vterm(&mut self, id: AreaId, src: Rect, dst: Point) -> Result<()> {
        let Self { vterm, slots, .. } = self;
        let area = lookup_mut(slots, id).ok_or(AreaError::UnknownArea(id))?;
        for dy in 0..src.height {
            for dx in 0..src.width {
                let (dx, dy) = (dx as i32, dy as i32);
                let (Ok(tx), Ok(ty)) = (usize::try_from(src.x + dx), usize::try_from(src.y + dy)) else {
                    continue;
                };
                let (Ok(ax), Ok(ay)) = (usize::try_from(dst.x + dx), usize::try_from(dst.y + dy)) else {
                    continue;
                };
                if ax >= area.width() || ay >= area.height() {
                    continue;
                }
                let Some(&cell) = vterm.cell(tx, ty) else {
                    continue;
                };
                let mut cell = cell;
                cell.flags.remove(SCREEN_FLAGS);
                area.put_cell(ax, ay, &cell);
            }
        }
        area.has_changes = true;
        Ok(())
    }

    // ─── Preprocessing ────────────────────────────────────────────────────

    /// Run `handler` with area `target` and its child area `child` every
    /// time `target` is merged into the vterm. A child has at most one
    /// handler per target; registering again replaces it.
    ///
    /// # Errors
    ///
    /// [`AreaError::UnknownArea`] when either handle is stale.
    pub fn add_preprocessing_handler(
        &mut self,
        target: AreaId,
        child: AreaId,
        handler: impl FnMut(&mut TermArea, &TermArea) + 'static,
    ) -> Result<()> {
        self.get(target)?;
        self.get(child)?;
        self.preprocessing.retain(|p| !(p.target == target && p.child == child));
        self.preprocessing.push(Preprocessing {
            target,
            child,
            handler: Box::new(handler),
        });
        Ok(())
    }

    /// Drop every handler registered for `child`. Returns whether there
    /// was one.
    pub fn del_preprocessing_handler(&mut self, child: AreaId) -> bool {
        let before = self.preprocessing.len();
        self.preprocessing.retain(|p| p.child != child);
        self.preprocessing.len() != before
    }

    fn call_preprocessing_handlers(&mut self, id: AreaId) {
        if !self.preprocessing.iter().any(|p| p.target == id) {
            return;
        }
        let mut list = std::mem::take(&mut self.preprocessing);
        for p in list.iter_mut().filter(|p| p.target == id) {
            if let Some((target, child)) = self.pair_mut(p.target, p.child) {
                (p.handler)(target, child);
            }
        }
        self.preprocessing = list;
    }

    fn has_child_area_changes(&self, id: AreaId) -> bool {
        self.preprocessing
            .iter()
            .filter(|p| p.target == id)
            .any(|p| self.area(p.child).is_some_and(|c| c.has_changes))
    }

    fn clear_child_area_changes(&mut self, id: AreaId) {
        let Self {
            preprocessing, slots, ..
        } = self;
        for p in preprocessing.iter().filter(|p| p.target == id) {
            if let Some(child) = lookup_mut(slots, p.child) {
                child.has_changes = false;
            }
        }
    }

    // ─── Terminal updates ─────────────────────────────────────────────────

    /// Suspend or resume flushing to the terminal.
    ///
    /// # Errors
    ///
    /// [`AreaError::Io`] if the flush triggered by
    /// [`TerminalUpdates::Start`] fails.
    pub fn set_terminal_updates(&mut self, mode: TerminalUpdates) -> Result<()> {
        match mode {
            TerminalUpdates::Stop => self.updates_suspended = true,
            TerminalUpdates::Continue => self.updates_suspended = false,
            TerminalUpdates::Start => {
                self.updates_suspended = false;
                self.update_terminal()?;
            }
        }
        Ok(())
    }

    /// Hold back terminal updates while a widget prints.
    #[inline]
    pub fn start_drawing(&mut self) {
        self.draw_completed = false;
    }

    #[inline]
    pub fn finish_drawing(&mut self) {
        self.draw_completed = true;
    }

    /// Send the vterm's dirty cells to the terminal. Skipped (`None`)
    /// while updates are suspended or a print phase is open, unless
    /// forced.
    ///
    /// # Errors
    ///
    /// [`AreaError::Io`] if writing to the terminal fails.
    pub fn update_terminal(&mut self) -> Result<Option<FlushStats>> {
        if !self.force_update && (self.updates_suspended || !self.draw_completed) {
            return Ok(None);
        }
        Ok(Some(self.output.update_terminal(&mut self.vterm)?))
    }

    /// One full pass: merge the areas, then flush. Skipped while a
    /// terminal resize is pending.
    ///
    /// # Errors
    ///
    /// [`AreaError::Io`] if writing to the terminal fails.
    pub fn process_terminal_update(&mut self) -> Result<Option<FlushStats>> {
        if self.resize_pending {
            return Ok(None);
        }
        self.update_vterm()?;
        self.update_terminal()
    }

    /// [`process_terminal_update`](Self::process_terminal_update), ignoring
    /// suspension and open print phases.
    ///
    /// # Errors
    ///
    /// [`AreaError::Io`] if writing to the terminal fails.
    pub fn force_terminal_update(&mut self) -> Result<Option<FlushStats>> {
        self.force_update = true;
        let stats = self.process_terminal_update();
        self.force_update = false;
        let stats = stats?;
        self.output.flush()?;
        Ok(stats)
    }

    /// Note that the terminal size changed; passes are skipped until
    /// [`resize_terminal`](Self::resize_terminal).
    #[inline]
    pub fn notify_resize(&mut self) {
        self.resize_pending = true;
    }

    /// Adopt a new terminal size. The vterm and the desktop are resized
    /// and cleared, every window is merged again at the next pass.
    ///
    /// # Errors
    ///
    /// [`AreaError::Term`] when the new buffers cannot be allocated.
    pub fn resize_terminal(&mut self, size: Size) -> Result<()> {
        let bounds = Rect::new(0, 0, size.width, size.height);
        self.vterm.resize(bounds, Size::default()).inspect_err(|e| {
            tracing::error!(%e, width = size.width, height = size.height, "cannot resize the virtual terminal");
        })?;
        let desktop = self.desktop;
        let area = self.get_mut(desktop)?;
        area.resize(bounds, Size::default())?;
        area.mark_all_dirty();
        for i in 0..self.windows.len() {
            let id = self.windows[i];
            if let Some(win) = self.area_mut(id) {
                win.mark_all_dirty();
            }
        }
        self.output.set_size(size);
        self.output.invalidate();
        self.resize_pending = false;
        tracing::debug!(width = size.width, height = size.height, "terminal resized");
        Ok(())
    }

    // ─── Terminal lifecycle ───────────────────────────────────────────────

    /// Prepare the terminal for drawing.
    ///
    /// # Errors
    ///
    /// [`AreaError::Io`] if writing to the terminal fails.
    pub fn init_terminal(&mut self) -> Result<()> {
        self.output.init_terminal()?;
        self.initialized = true;
        self.finished = false;
        Ok(())
    }

    /// Ring the terminal bell.
    ///
    /// # Errors
    ///
    /// [`AreaError::Io`] if writing to the terminal fails.
    pub fn beep(&mut self) -> Result<()> {
        self.output.beep()?;
        Ok(())
    }

    /// Flush everything still pending and hand the terminal back in the
    /// state it was found. Runs at most once.
    ///
    /// # Errors
    ///
    /// [`AreaError::Io`] if writing to the terminal fails.
    pub fn finish(&mut self) -> Result<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.style.set_normal();
        self.force_terminal_update()?;
        self.output.finish_terminal()?;
        tracing::debug!("terminal restored");
        Ok(())
    }
}

/// Every content row of a scrolled area is dirty.
fn finish_scroll(area: &mut TermArea) {
    let last = area.width().saturating_sub(1);
    for y in 0..area.height() {
        area.changes_mut(y).mark_range(0, last);
    }
    area.recount_transparency();
    area.has_changes = true;
}

impl<W: Write> Drop for Compositor<W> {
    fn drop(&mut self) {
        if self.initialized && !self.finished {
            if let Err(e) = self.finish() {
                tracing::warn!(%e, "cannot restore the terminal");
            }
        }
    }
}

impl<W: Write> fmt::Debug for Compositor<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compositor")
            .field("size", &self.vterm.size())
            .field("windows", &self.windows)
            .field("active", &self.active)
            .field("suspended", &self.updates_suspended)
            .finish_non_exhaustive()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use stratum_term::encoding::Encoding;
    use stratum_term::{Color, LineChanges};

    fn compositor(w: usize, h: usize) -> Compositor<Vec<u8>> {
        let profile = TermProfile::for_terminal("xterm-256color", Encoding::Utf8).unwrap();
        Compositor::new(&profile, Size::new(w, h), 0, Vec::new()).unwrap()
    }

    fn screen(c: &Compositor<Vec<u8>>) -> Vec<String> {
        (0..c.vterm().height())
            .map(|y| c.vterm().row(y).iter().map(Cell::base).collect())
            .collect()
    }

    fn fill(c: &mut Compositor<Vec<u8>>, id: AreaId, ch: char) {
        let cell = Cell::new(ch);
        c.area_mut(id).unwrap().fill(&cell);
    }

    fn window(c: &mut Compositor<Vec<u8>>, bounds: Rect, ch: char) -> AreaId {
        let id = c.create_area(bounds, Size::default()).unwrap();
        fill(c, id, ch);
        c.area_mut(id).unwrap().visible = true;
        c.insert_window(id).unwrap();
        id
    }

    fn written(c: &Compositor<Vec<u8>>) -> String {
        String::from_utf8_lossy(c.output().queue().sink()).into_owned()
    }

    // ── Arena ────────────────────────────────────────────────────────────

    #[test]
    fn stale_handles_are_refused() {
        let mut c = compositor(4, 2);
        let id = c.create_area(Rect::new(0, 0, 2, 1), Size::default()).unwrap();
        c.remove_area(id).unwrap();
        let reused = c.create_area(Rect::new(0, 0, 2, 1), Size::default()).unwrap();
        assert_ne!(id, reused);
        assert!(c.area(id).is_none());
        assert!(matches!(c.put_area(id), Err(AreaError::UnknownArea(_))));
    }

    #[test]
    fn desktop_cannot_be_removed_or_stacked() {
        let mut c = compositor(4, 2);
        let desktop = c.desktop();
        assert!(matches!(c.remove_area(desktop), Err(AreaError::Desktop)));
        assert!(matches!(c.insert_window(desktop), Err(AreaError::Desktop)));
    }

    #[test]
    fn layers_follow_the_stack() {
        let mut c = compositor(4, 2);
        let a = window(&mut c, Rect::new(0, 0, 1, 1), 'a');
        let b = window(&mut c, Rect::new(0, 0, 1, 1), 'b');
        assert_eq!((c.layer(c.desktop()), c.layer(a), c.layer(b)), (0, 1, 2));
        assert!(c.raise_window(a).unwrap());
        assert_eq!(c.windows(), &[b, a]);
        assert!(!c.raise_window(a).unwrap());
        assert!(c.lower_window(a).unwrap());
        assert_eq!(c.windows(), &[a, b]);
    }

    // ── Coverage ─────────────────────────────────────────────────────────

    #[test]
    fn window_is_not_covered_by_itself_or_below() {
        let mut c = compositor(6, 3);
        let low = window(&mut c, Rect::new(0, 0, 4, 2), 'l');
        let high = window(&mut c, Rect::new(1, 0, 4, 2), 'h');
        let p = Point::new(2, 1);
        assert_eq!(c.is_covered(p, high), Coverage::None);
        assert_eq!(c.is_covered(p, low), Coverage::Full);
        assert_eq!(c.is_covered(p, c.desktop()), Coverage::Full);
        assert_eq!(c.is_covered(Point::new(0, 0), low), Coverage::None);
    }

    #[test]
    fn transparent_and_overlay_cells_cover_differently() {
        let mut c = compositor(4, 1);
        let low = window(&mut c, Rect::new(0, 0, 4, 1), 'l');
        let high = window(&mut c, Rect::new(0, 0, 2, 1), 'h');
        let area = c.area_mut(high).unwrap();
        area.put_cell(0, 0, &Cell::EMPTY.with_flags(CellFlags::TRANSPARENT));
        area.put_cell(1, 0, &Cell::EMPTY.with_flags(CellFlags::COLOR_OVERLAY));
        assert_eq!(c.is_covered(Point::new(0, 0), low), Coverage::None);
        assert_eq!(c.is_covered(Point::new(1, 0), low), Coverage::Half);
    }

    #[test]
    fn covered_character_stops_at_the_area() {
        let mut c = compositor(3, 1);
        let desktop = c.desktop();
        fill(&mut c, desktop, 'd');
        let a = window(&mut c, Rect::new(0, 0, 2, 1), 'a');
        let b = window(&mut c, Rect::new(1, 0, 2, 1), 'b');
        assert_eq!(c.covered_character(Point::new(1, 0), b).base(), 'a');
        assert_eq!(c.covered_character(Point::new(1, 0), a).base(), 'd');
        assert_eq!(c.overlapped_character(Point::new(1, 0), a).base(), 'b');
        assert_eq!(c.generate_character(Point::new(1, 0)).base(), 'b');
        assert_eq!(c.generate_character(Point::new(0, 0)).base(), 'a');
    }

    // ── Merging ──────────────────────────────────────────────────────────

    #[test]
    fn desktop_print_reaches_the_terminal() {
        let mut c = compositor(4, 2);
        let desktop = c.desktop();
        c.print_str(desktop, "hi").unwrap();
        let stats = c.process_terminal_update().unwrap().unwrap();
        assert_eq!(screen(&c), vec!["hi  ", "    "]);
        assert_eq!(stats.cells_printed, 2);
        assert!(c.vterm().line_changes().iter().all(|l| !l.is_dirty()));
        assert!(c.vterm().cell(1, 0).unwrap().is_printed());
    }

    #[test]
    fn second_pass_prints_nothing() {
        let mut c = compositor(4, 2);
        let desktop = c.desktop();
        c.print_str(desktop, "abcd").unwrap();
        // Paint the whole screen once, blank row included.
        c.area_mut(desktop).unwrap().mark_all_dirty();
        let first = c.process_terminal_update().unwrap().unwrap();
        assert_eq!(first.cells_printed, 8);
        c.area_mut(desktop).unwrap().mark_all_dirty();
        let stats = c.process_terminal_update().unwrap().unwrap();
        assert_eq!(stats.cells_printed, 0);
        assert_eq!(stats.cells_skipped, 8);
    }

    #[test]
    fn hidden_cells_do_not_widen_the_dirty_range() {
        let mut c = compositor(6, 1);
        window(&mut c, Rect::new(0, 0, 3, 1), 'w');
        c.process_terminal_update().unwrap();
        let desktop = c.desktop();
        fill(&mut c, desktop, 'd');
        c.update_vterm().unwrap();
        assert_eq!(screen(&c), vec!["wwwddd"]);
        let line = *c.vterm().changes(0);
        assert_eq!((line.xmin, line.xmax), (3, 5));
    }

    #[test]
    fn window_off_the_left_edge_is_clipped() {
        let mut c = compositor(5, 1);
        let id = c.create_area(Rect::new(-2, 0, 4, 2), Size::default()).unwrap();
        c.area_mut(id).unwrap().visible = true;
        c.insert_window(id).unwrap();
        c.print_str(id, "abcd").unwrap();
        c.update_vterm().unwrap();
        assert_eq!(screen(&c), vec!["cd   "]);
        let line = *c.vterm().changes(0);
        assert_eq!((line.xmin, line.xmax), (0, 1));
        assert!(!c.area(id).unwrap().changes(0).is_dirty());
    }

    #[test]
    fn overlay_tints_and_inherit_keeps_background() {
        let mut c = compositor(3, 1);
        let desktop = c.desktop();
        c.area_mut(desktop)
            .unwrap()
            .fill(&Cell::styled('d', Color::WHITE, Color::BLUE, stratum_term::Attr::empty()));
        let top = window(&mut c, Rect::new(0, 0, 2, 1), 't');
        let area = c.area_mut(top).unwrap();
        area.put_cell(
            0,
            0,
            &Cell::styled(' ', Color::BLACK, Color::DARK_GRAY, stratum_term::Attr::empty())
                .with_flags(CellFlags::COLOR_OVERLAY),
        );
        area.put_cell(
            1,
            0,
            &Cell::styled('i', Color::RED, Color::GREEN, stratum_term::Attr::empty())
                .with_flags(CellFlags::INHERIT_BACKGROUND),
        );
        c.update_vterm().unwrap();
        let tinted = *c.vterm().cell(0, 0).unwrap();
        assert_eq!(tinted.base(), 'd');
        assert_eq!((tinted.fg, tinted.bg), (Color::BLACK, Color::DARK_GRAY));
        let inherited = *c.vterm().cell(1, 0).unwrap();
        assert_eq!(inherited.base(), 'i');
        assert_eq!((inherited.fg, inherited.bg), (Color::RED, Color::BLUE));
        assert!(!inherited.has_transparency());
    }

    #[test]
    fn half_covered_cell_takes_the_overlay_colors() {
        let mut c = compositor(2, 1);
        window(&mut c, Rect::new(0, 0, 2, 1), 'x');
        let shade = c.create_area(Rect::new(0, 0, 1, 1), Size::default()).unwrap();
        c.area_mut(shade).unwrap().fill(
            &Cell::styled(' ', Color::LIGHT_GRAY, Color::BLACK, stratum_term::Attr::empty())
                .with_flags(CellFlags::COLOR_OVERLAY),
        );
        c.area_mut(shade).unwrap().visible = true;
        c.insert_window(shade).unwrap();
        c.update_vterm().unwrap();
        let cell = *c.vterm().cell(0, 0).unwrap();
        assert_eq!(cell.base(), 'x');
        assert_eq!((cell.fg, cell.bg), (Color::LIGHT_GRAY, Color::BLACK));
        assert_eq!(c.vterm().cell(1, 0).unwrap().fg, Color::Default);
    }

    #[test]
    fn put_area_at_ignores_offset() {
        let mut c = compositor(4, 2);
        let id = c.create_area(Rect::new(0, 0, 2, 1), Size::default()).unwrap();
        fill(&mut c, id, 'p');
        c.area_mut(id).unwrap().visible = true;
        c.put_area_at(Point::new(3, 2), id).unwrap();
        assert_eq!(screen(&c), vec!["    ", "  pp"]);
        assert_eq!(*c.vterm().changes(1), LineChanges { xmin: 2, xmax: 3, trans_count: 0 });
    }

    // ── Window changes ───────────────────────────────────────────────────

    #[test]
    fn removing_a_window_restores_what_it_hid() {
        let mut c = compositor(4, 2);
        let desktop = c.desktop();
        fill(&mut c, desktop, '.');
        let w = window(&mut c, Rect::new(1, 0, 2, 2), 'w');
        c.process_terminal_update().unwrap();
        assert_eq!(screen(&c), vec![".ww.", ".ww."]);
        c.remove_area(w).unwrap();
        assert_eq!(screen(&c), vec!["....", "...."]);
        let stats = c.process_terminal_update().unwrap().unwrap();
        assert_eq!(stats.cells_printed, 4);
    }

    #[test]
    fn moving_a_window_regenerates_the_old_place() {
        let mut c = compositor(4, 1);
        let desktop = c.desktop();
        fill(&mut c, desktop, '.');
        let w = window(&mut c, Rect::new(0, 0, 1, 1), 'w');
        c.process_terminal_update().unwrap();
        c.move_area(w, Point::new(3, 0)).unwrap();
        c.process_terminal_update().unwrap();
        assert_eq!(screen(&c), vec!["...w"]);
    }

    #[test]
    fn shrinking_a_window_regenerates_what_it_left() {
        let mut c = compositor(6, 1);
        let desktop = c.desktop();
        fill(&mut c, desktop, '.');
        let w = window(&mut c, Rect::new(0, 0, 4, 1), 'w');
        c.process_terminal_update().unwrap();
        assert_eq!(screen(&c), vec!["wwww.."]);

        c.resize_area(w, Rect::new(0, 0, 2, 1), Size::default()).unwrap();
        fill(&mut c, w, 'v');
        c.process_terminal_update().unwrap();
        assert_eq!(screen(&c), vec!["vv...."]);
        for x in 0..6 {
            let expected = c.generate_character(Point::new(x, 0));
            assert_eq!(*c.vterm().cell(x as usize, 0).unwrap(), expected);
        }
    }

    #[test]
    fn resizing_a_hidden_area_leaves_the_screen_alone() {
        let mut c = compositor(4, 1);
        let desktop = c.desktop();
        fill(&mut c, desktop, '.');
        let w = c.create_area(Rect::new(0, 0, 4, 1), Size::default()).unwrap();
        c.process_terminal_update().unwrap();
        c.resize_area(w, Rect::new(0, 0, 2, 1), Size::default()).unwrap();
        assert!(!c.vterm().changes(0).is_dirty());
        assert!(!c.area(w).unwrap().has_changes);
    }

    #[test]
    fn hiding_a_window_restores_below() {
        let mut c = compositor(2, 1);
        let w = window(&mut c, Rect::new(0, 0, 2, 1), 'w');
        c.process_terminal_update().unwrap();
        c.set_visible(w, false).unwrap();
        assert_eq!(screen(&c), vec!["  "]);
        c.set_visible(w, true).unwrap();
        c.process_terminal_update().unwrap();
        assert_eq!(screen(&c), vec!["ww"]);
    }

    // ── Preprocessing ────────────────────────────────────────────────────

    #[test]
    fn child_changes_trigger_a_merge() {
        let mut c = compositor(4, 1);
        let parent = window(&mut c, Rect::new(0, 0, 4, 1), ' ');
        let child = c.create_area(Rect::new(0, 0, 3, 1), Size::default()).unwrap();
        c.add_preprocessing_handler(parent, child, |parent, child| {
            parent.copy_from(Point::new(2, 1), child);
        })
        .unwrap();
        c.process_terminal_update().unwrap();

        c.print_str(child, "ok").unwrap();
        assert!(c.area(child).unwrap().has_changes);
        c.process_terminal_update().unwrap();
        assert_eq!(screen(&c), vec![" ok "]);
        assert!(!c.area(child).unwrap().has_changes);

        assert!(c.del_preprocessing_handler(child));
        assert!(!c.del_preprocessing_handler(child));
    }

    // ── Cursor ───────────────────────────────────────────────────────────

    #[test]
    fn input_cursor_follows_the_active_area() {
        let mut c = compositor(6, 3);
        let w = window(&mut c, Rect::new(2, 1, 3, 2), ' ');
        c.set_active_area(w).unwrap();
        c.set_area_cursor(w, Point::new(2, 1), true).unwrap();
        assert!(c.vterm().input_cursor_visible);
        assert_eq!(c.vterm().input_cursor, Point::new(3, 1));

        c.set_area_cursor(w, Point::new(9, 1), true).unwrap();
        assert!(!c.vterm().input_cursor_visible);
    }

    #[test]
    fn covered_cursor_is_hidden() {
        let mut c = compositor(4, 2);
        let desktop = c.desktop();
        window(&mut c, Rect::new(0, 0, 1, 1), 'w');
        c.set_area_cursor(desktop, Point::new(1, 1), true).unwrap();
        assert!(!c.vterm().input_cursor_visible);
        c.set_area_cursor(desktop, Point::new(2, 1), true).unwrap();
        assert!(c.vterm().input_cursor_visible);
    }

    // ── Scrolling ────────────────────────────────────────────────────────

    #[test]
    fn hardware_scroll_keeps_printed_rows() {
        let mut c = compositor(3, 3);
        let desktop = c.desktop();
        c.print_str(desktop, "abcdefghi").unwrap_err();
        c.process_terminal_update().unwrap();
        c.scroll_area_forward(desktop).unwrap();
        assert_eq!(screen(&c), vec!["def", "ghi", "   "]);
        let stats = c.process_terminal_update().unwrap().unwrap();
        assert_eq!(stats.cells_printed, 3);
        assert_eq!(stats.cells_skipped, 6);
    }

    #[test]
    fn window_scroll_never_touches_the_terminal() {
        let mut c = compositor(3, 3);
        let w = window(&mut c, Rect::new(0, 0, 3, 2), 'x');
        c.process_terminal_update().unwrap();
        let before = c.output().queue().bytes_written();
        c.scroll_area_reverse(w).unwrap();
        assert_eq!(c.output().queue().bytes_written(), before);
        assert_eq!(c.output().queue().len(), 0);
    }

    // ── Clearing ─────────────────────────────────────────────────────────

    #[test]
    fn clearing_the_bare_desktop_clears_the_terminal() {
        let mut c = compositor(3, 2);
        let desktop = c.desktop();
        c.print_str(desktop, "xyz").unwrap();
        c.process_terminal_update().unwrap();
        c.clear_area(desktop, ' ').unwrap();
        assert!(written(&c).contains("\x1b[H\x1b[2J"));
        assert_eq!(screen(&c), vec!["   ", "   "]);
        assert!(c.vterm().data().iter().all(Cell::is_printed));
        let stats = c.process_terminal_update().unwrap().unwrap();
        assert_eq!(stats.cells_printed, 0);
    }

    #[test]
    fn clear_with_shadow_makes_margins_transparent() {
        let mut c = compositor(6, 4);
        let id = c.create_area(Rect::new(0, 0, 3, 2), Size::new(1, 1)).unwrap();
        c.clear_area(id, '-').unwrap();
        let area = c.area(id).unwrap();
        assert_eq!(area.cell(2, 1).unwrap().base(), '-');
        assert!(area.cell(3, 0).unwrap().is_transparent());
        assert!(area.cell(0, 2).unwrap().is_transparent());
        let counts: Vec<usize> = area.line_changes().iter().map(|l| l.trans_count).collect();
        assert_eq!(counts, vec![1, 1, 4]);
        assert!(area.has_changes);
    }

    // ── Update control ───────────────────────────────────────────────────

    #[test]
    fn suspended_updates_wait_for_start() {
        let mut c = compositor(4, 1);
        let desktop = c.desktop();
        c.set_terminal_updates(TerminalUpdates::Stop).unwrap();
        c.print_str(desktop, "ab").unwrap();
        assert_eq!(c.process_terminal_update().unwrap(), None);
        assert!(c.vterm().changes(0).is_dirty());
        c.set_terminal_updates(TerminalUpdates::Start).unwrap();
        assert!(!c.vterm().changes(0).is_dirty());
        assert!(written(&c).contains("ab"));
    }

    #[test]
    fn open_print_phase_defers_flush_unless_forced() {
        let mut c = compositor(4, 1);
        let desktop = c.desktop();
        c.start_drawing();
        c.print_str(desktop, "ab").unwrap();
        assert_eq!(c.process_terminal_update().unwrap(), None);
        assert!(c.force_terminal_update().unwrap().is_some());
        c.finish_drawing();
    }

    #[test]
    fn pending_resize_skips_passes() {
        let mut c = compositor(2, 1);
        c.notify_resize();
        assert_eq!(c.process_terminal_update().unwrap(), None);
        c.resize_terminal(Size::new(3, 2)).unwrap();
        assert_eq!(c.vterm().size(), Size::new(3, 2));
        assert_eq!(c.area(c.desktop()).unwrap().size(), Size::new(3, 2));
        assert!(c.process_terminal_update().unwrap().is_some());
    }

    #[test]
    fn get_area_copies_the_screen_back() {
        let mut c = compositor(4, 2);
        let desktop = c.desktop();
        c.print_str(desktop, "abcdefgh").unwrap_err();
        c.update_vterm().unwrap();
        let id = c.create_area(Rect::new(1, 0, 2, 2), Size::default()).unwrap();
        c.get_area(id, Point::new(2, 1)).unwrap();
        let area = c.area(id).unwrap();
        let rows: Vec<String> = (0..2).map(|y| area.row(y).iter().map(Cell::base).collect()).collect();
        assert_eq!(rows, vec!["bc", "fg"]);
        assert!(!area.cell(0, 0).unwrap().is_printed());

        let other = c.create_area(Rect::new(2, 1, 2, 1), Size::default()).unwrap();
        c.get_area_rect(other, Rect::new(3, 2, 5, 5)).unwrap();
        let row: String = c.area(other).unwrap().row(0).iter().map(Cell::base).collect();
        assert_eq!(row, "gh");
    }
}
