// SPDX-License-Identifier: MIT
//
// Geometry — points, sizes and rectangles in character cells.
//
// Terminal coordinates are signed: a window dragged past the left edge has
// a negative offset, and the compositor clips it ("outside left") instead
// of refusing the move. Sizes are always non-negative.

// ─── Point ───────────────────────────────────────────────────────────────────

/// A position in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Component-wise offset.
    #[inline]
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

// ─── Size ────────────────────────────────────────────────────────────────────

/// Dimensions in character cells. Also used for shadow margins
/// (`width` = right shadow, `height` = bottom shadow).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Size {
    pub width: usize,
    pub height: usize,
}

impl Size {
    #[inline]
    #[must_use]
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    /// Total number of cells (`width × height`).
    #[inline]
    #[must_use]
    pub const fn area(self) -> usize {
        self.width * self.height
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

// ─── Rect ────────────────────────────────────────────────────────────────────

/// A rectangle: top-left corner plus size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: usize,
    pub height: usize,
}

impl Rect {
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[inline]
    #[must_use]
    pub const fn origin(self) -> Point {
        Point::new(self.x, self.y)
    }

    #[inline]
    #[must_use]
    pub const fn size(self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Exclusive right edge.
    #[inline]
    #[must_use]
    pub const fn right(self) -> i32 {
        self.x + self.width as i32
    }

    /// Exclusive bottom edge.
    #[inline]
    #[must_use]
    pub const fn bottom(self) -> i32 {
        self.y + self.height as i32
    }

    #[inline]
    #[must_use]
    pub const fn contains(self, p: Point) -> bool {
        p.x >= self.x && p.x < self.right() && p.y >= self.y && p.y < self.bottom()
    }

    /// Overlapping part of two rectangles, `None` if they are disjoint.
    #[must_use]
    pub fn intersection(self, other: Self) -> Option<Self> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        if right <= x || bottom <= y {
            return None;
        }
        Some(Self::new(x, y, (right - x) as usize, (bottom - y) as usize))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
