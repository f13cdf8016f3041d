// SPDX-License-Identifier: MIT
//
// Cursor-motion optimizer.
//
// Moving the cursor is most of what a redraw sends besides the glyphs
// themselves, so every move is priced. Candidates:
//
//   relative            row motion + column motion from where we are
//   cr + relative       carriage return first, useful for moving left
//   cup                 absolute addressing
//   home + relative     from the top-left corner
//   ll + relative       from the bottom-left corner
//
// Row motion is `vpa`, parameterized `cuu`/`cud`, or repeated
// `cuu1`/`cud1`. Column motion is `hpa`, parameterized `cub`/`cuf`,
// repeated `cub1`/`cuf1`, or hardware tabs (`ht` forward, `cbt` back)
// finished off with single steps.
//
// A sequence costs its length times the time one character takes at the
// line speed, plus any padding it demands. Without a known line speed the
// cost is the plain byte count. When the current position is unknown only
// the absolute candidates qualify.

use crate::caps::Capabilities;
use crate::geometry::{Point, Size};
use crate::param;
use crate::terminfo::{BoolCap, StrCap};

/// A candidate motion and its price.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Seq {
    bytes: Vec<u8>,
    cost: u64,
}

impl Seq {
    fn then(mut self, other: Self) -> Self {
        self.bytes.extend_from_slice(&other.bytes);
        self.cost += other.cost;
        self
    }
}

fn cheapest(options: impl IntoIterator<Item = Option<Seq>>) -> Option<Seq> {
    options.into_iter().flatten().min_by_key(|s| s.cost)
}

/// Chooses the cheapest byte sequence between two cursor positions.
#[derive(Debug, Clone)]
pub struct CursorOptimizer {
    caps: Capabilities,
    size: Size,
    tabstop: usize,
    auto_left_margin: bool,
    auto_right_margin: bool,
    eat_newline_glitch: bool,
    /// Microseconds per character; 0 when the line speed is unknown.
    char_us: u64,
}

impl CursorOptimizer {
    /// Optimizer for a terminal of `size` at `baud` bits per second
    /// (0 when unknown).
    #[must_use]
    pub fn new(caps: &Capabilities, size: Size, tabstop: usize, baud: u32) -> Self {
        Self {
            auto_left_margin: caps.flag(BoolCap::AutoLeftMargin),
            auto_right_margin: caps.flag(BoolCap::AutoRightMargin),
            eat_newline_glitch: caps.flag(BoolCap::EatNewlineGlitch),
            caps: caps.clone(),
            size,
            tabstop: tabstop.max(1),
            char_us: if baud == 0 { 0 } else { 9_000_000 / u64::from(baud) },
        }
    }

    pub fn set_size(&mut self, size: Size) {
        self.size = size;
    }

    #[inline]
    #[must_use]
    pub const fn size(&self) -> Size {
        self.size
    }

    #[inline]
    #[must_use]
    pub const fn has_auto_right_margin(&self) -> bool {
        self.auto_right_margin
    }

    #[inline]
    #[must_use]
    pub const fn has_newline_glitch(&self) -> bool {
        self.eat_newline_glitch
    }

    /// Clamp a target into the screen: columns past the right edge wrap
    /// onto the following rows, rows past the bottom stick to the last
    /// row.
    #[must_use]
    pub fn normalize(&self, to: Point) -> Point {
        let w = i32::try_from(self.size.width.max(1)).unwrap_or(i32::MAX);
        let h = i32::try_from(self.size.height.max(1)).unwrap_or(i32::MAX);
        let mut x = to.x.max(0);
        let mut y = to.y.max(0);
        if x >= w {
            y = y.saturating_add(x / w);
            x %= w;
        }
        Point::new(x, y.min(h - 1))
    }

    /// Bytes that move the cursor from `from` (`None` when unknown) to
    /// `to`. Empty when the cursor is already there or no capability can
    /// get it there.
    #[must_use]
    pub fn move_cursor(&self, from: Option<Point>, to: Point) -> Vec<u8> {
        let to = self.normalize(to);
        let from = from.filter(|p| self.on_screen(*p));
        if from == Some(to) {
            return Vec::new();
        }

        let mut candidates = Vec::with_capacity(6);
        if let Some(from) = from {
            candidates.push(self.relative(from, to));
            if to.x < from.x {
                candidates.push(
                    self.cap(StrCap::CarriageReturn, &[])
                        .zip(self.relative(Point::new(0, from.y), to))
                        .map(|(cr, rest)| cr.then(rest)),
                );
            }
            candidates.push(self.wrap_left(from, to));
        }
        candidates.push(self.cap(StrCap::CursorAddress, &[to.y, to.x]));
        candidates.push(
            self.cap(StrCap::CursorHome, &[])
                .zip(self.relative(Point::new(0, 0), to))
                .map(|(home, rest)| home.then(rest)),
        );
        let last_row = i32::try_from(self.size.height.saturating_sub(1)).unwrap_or(0);
        candidates.push(
            self.cap(StrCap::CursorToLl, &[])
                .zip(self.relative(Point::new(0, last_row), to))
                .map(|(ll, rest)| ll.then(rest)),
        );

        match cheapest(candidates) {
            Some(seq) => seq.bytes,
            None => {
                tracing::debug!(?from, ?to, "no capability reaches the cursor target");
                Vec::new()
            }
        }
    }

    /// Where the cursor ends up after printing `width` columns at `at`.
    /// `None` when the terminal leaves it somewhere unpredictable.
    #[must_use]
    pub fn after_print(&self, at: Point, width: usize) -> Option<Point> {
        let w = i32::try_from(self.size.width).unwrap_or(i32::MAX);
        let h = i32::try_from(self.size.height).unwrap_or(i32::MAX);
        let x = at.x.saturating_add(i32::try_from(width).unwrap_or(0));
        if x < w {
            return Some(Point::new(x, at.y));
        }
        if at.y >= h - 1 {
            Some(Point::new(w - 1, at.y))
        } else if self.eat_newline_glitch {
            None
        } else if self.auto_right_margin {
            Some(Point::new(0, at.y + 1))
        } else {
            Some(Point::new(w - 1, at.y))
        }
    }

    // ─── Pricing ──────────────────────────────────────────────────────────

    fn on_screen(&self, p: Point) -> bool {
        p.x >= 0
            && p.y >= 0
            && usize::try_from(p.x).is_ok_and(|x| x < self.size.width)
            && usize::try_from(p.y).is_ok_and(|y| y < self.size.height)
    }

    fn cost(&self, len: usize, template: &str) -> u64 {
        let len = len as u64;
        if self.char_us == 0 {
            len
        } else {
            len * self.char_us + u64::from(param::padding_ms(template)) * 1000
        }
    }

    fn cap(&self, cap: StrCap, args: &[i32]) -> Option<Seq> {
        let template = self.caps.get(cap)?;
        let bytes = self.caps.format(cap, args)?;
        let cost = self.cost(bytes.len(), template);
        Some(Seq { bytes, cost })
    }

    fn repeat(&self, cap: StrCap, n: usize) -> Option<Seq> {
        let one = self.cap(cap, &[])?;
        Some(Seq {
            bytes: one.bytes.repeat(n),
            cost: one.cost * n as u64,
        })
    }

    // ─── Relative motion ──────────────────────────────────────────────────

    fn relative(&self, from: Point, to: Point) -> Option<Seq> {
        let rows = self.row_motion(from.y, to.y)?;
        let cols = self.col_motion(from.x, to.x)?;
        Some(rows.then(cols))
    }

    fn row_motion(&self, from: i32, to: i32) -> Option<Seq> {
        if from == to {
            return Some(Seq::default());
        }
        let n = from.abs_diff(to);
        let (parm, single) = if to < from {
            (StrCap::ParmUpCursor, StrCap::CursorUp)
        } else {
            (StrCap::ParmDownCursor, StrCap::CursorDown)
        };
        cheapest([
            self.cap(StrCap::RowAddress, &[to]),
            self.cap(parm, &[n as i32]),
            self.repeat(single, n as usize),
        ])
    }

    fn col_motion(&self, from: i32, to: i32) -> Option<Seq> {
        if from == to {
            return Some(Seq::default());
        }
        cheapest([
            self.cap(StrCap::ColumnAddress, &[to]),
            self.steps(from, to),
            if to > from {
                self.tabs_forward(from, to)
            } else {
                self.tabs_backward(from, to)
            },
        ])
    }

    /// Parameterized or repeated single steps, no tabs.
    fn steps(&self, from: i32, to: i32) -> Option<Seq> {
        if from == to {
            return Some(Seq::default());
        }
        let n = from.abs_diff(to);
        let (parm, single) = if to < from {
            (StrCap::ParmLeftCursor, StrCap::CursorLeft)
        } else {
            (StrCap::ParmRightCursor, StrCap::CursorRight)
        };
        cheapest([self.cap(parm, &[n as i32]), self.repeat(single, n as usize)])
    }

    fn tabs_forward(&self, from: i32, to: i32) -> Option<Seq> {
        let ts = i32::try_from(self.tabstop).ok()?;
        let width = i32::try_from(self.size.width).ok()?;
        let mut pos = from;
        let mut n = 0;
        loop {
            let next = (pos / ts + 1) * ts;
            if next > to || next >= width {
                break;
            }
            pos = next;
            n += 1;
        }
        if n == 0 {
            return None;
        }
        Some(self.repeat(StrCap::Tab, n)?.then(self.steps(pos, to)?))
    }

    fn tabs_backward(&self, from: i32, to: i32) -> Option<Seq> {
        let ts = i32::try_from(self.tabstop).ok()?;
        let mut pos = from;
        let mut n = 0;
        while pos > 0 {
            let prev = if pos % ts == 0 { pos - ts } else { pos - pos % ts };
            if prev < to {
                break;
            }
            pos = prev;
            n += 1;
        }
        if n == 0 {
            return None;
        }
        Some(self.repeat(StrCap::BackTab, n)?.then(self.steps(pos, to)?))
    }

    /// `cub1` at the left margin wraps to the end of the previous row on
    /// terminals with an automatic left margin.
    fn wrap_left(&self, from: Point, to: Point) -> Option<Seq> {
        let last_col = i32::try_from(self.size.width).ok()? - 1;
        if !self.auto_left_margin || from.x != 0 || to.y != from.y - 1 || to.x != last_col {
            return None;
        }
        self.cap(StrCap::CursorLeft, &[])
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::TermKind;
    use crate::terminfo::TermInfo;
    use pretty_assertions::assert_eq;

    fn optimizer(name: &str, baud: u32) -> CursorOptimizer {
        let caps = Capabilities::from_terminfo(&TermInfo::builtin(name).unwrap(), TermKind::empty());
        CursorOptimizer::new(&caps, Size::new(80, 24), 8, baud)
    }

    fn mv(opt: &CursorOptimizer, from: Option<(i32, i32)>, to: (i32, i32)) -> String {
        let from = from.map(|(x, y)| Point::new(x, y));
        String::from_utf8(opt.move_cursor(from, Point::new(to.0, to.1))).unwrap()
    }

    // ── Choice of motion ─────────────────────────────────────────────────

    #[test]
    fn same_position_emits_nothing() {
        let opt = optimizer("xterm", 0);
        assert_eq!(mv(&opt, Some((7, 3)), (7, 3)), "");
    }

    #[test]
    fn single_step_right() {
        let opt = optimizer("xterm", 0);
        assert_eq!(mv(&opt, Some((5, 5)), (6, 5)), "\x1b[C");
    }

    #[test]
    fn carriage_return_to_column_zero() {
        let opt = optimizer("xterm", 0);
        assert_eq!(mv(&opt, Some((10, 5)), (0, 5)), "\r");
        assert_eq!(mv(&opt, Some((79, 10)), (0, 11)), "\r\n");
    }

    #[test]
    fn newline_for_one_row_down() {
        let opt = optimizer("xterm", 0);
        assert_eq!(mv(&opt, Some((10, 5)), (10, 6)), "\n");
    }

    #[test]
    fn far_jump_uses_cup() {
        let opt = optimizer("xterm", 0);
        assert_eq!(mv(&opt, Some((0, 0)), (40, 12)), "\x1b[13;41H");
    }

    #[test]
    fn unknown_position_forces_absolute() {
        let opt = optimizer("xterm", 0);
        assert_eq!(mv(&opt, None, (3, 2)), "\x1b[3;4H");
        assert_eq!(mv(&opt, None, (0, 0)), "\x1b[H");
    }

    #[test]
    fn tabs_move_right_cheaply() {
        let mut caps = Capabilities::from_terminfo(&TermInfo::builtin("vt100").unwrap(), TermKind::empty());
        caps.set(StrCap::ParmRightCursor, None);
        let opt = CursorOptimizer::new(&caps, Size::new(80, 24), 8, 0);
        // Two tabs reach column 16, one more step lands on 17.
        assert_eq!(mv(&opt, Some((0, 3)), (17, 3)), "\t\t\x1b[C");
    }

    #[test]
    fn backtab_moves_left() {
        let mut caps = Capabilities::from_terminfo(&TermInfo::builtin("xterm").unwrap(), TermKind::empty());
        for cap in [
            StrCap::ParmLeftCursor,
            StrCap::ColumnAddress,
            StrCap::CursorAddress,
            StrCap::CarriageReturn,
        ] {
            caps.set(cap, None);
        }
        let opt = CursorOptimizer::new(&caps, Size::new(80, 24), 8, 0);
        assert_eq!(mv(&opt, Some((40, 3)), (24, 3)), "\x1b[Z\x1b[Z");
    }

    #[test]
    fn padding_changes_the_winner() {
        // Without a line speed only bytes count: cup (8) beats cud + cuf (9).
        let slow_unknown = optimizer("vt100", 0);
        assert_eq!(mv(&slow_unknown, Some((10, 10)), (20, 15)), "\x1b[16;21H");
        // At 9600 baud the 5 ms of cup padding tips it the other way.
        let slow = optimizer("vt100", 9600);
        assert_eq!(mv(&slow, Some((10, 10)), (20, 15)), "\x1b[5B\x1b[10C");
    }

    #[test]
    fn auto_left_margin_wrap() {
        let mut info = TermInfo::builtin("xterm").unwrap();
        info.set_flag(BoolCap::AutoLeftMargin, true);
        let caps = Capabilities::from_terminfo(&info, TermKind::empty());
        let opt = CursorOptimizer::new(&caps, Size::new(80, 24), 8, 0);
        assert_eq!(mv(&opt, Some((0, 5)), (79, 4)), "\x08");
    }

    // ── Target normalization ─────────────────────────────────────────────

    #[test]
    fn target_wraps_and_clamps() {
        let opt = optimizer("xterm", 0);
        assert_eq!(opt.normalize(Point::new(85, 3)), Point::new(5, 4));
        assert_eq!(opt.normalize(Point::new(0, 100)), Point::new(0, 23));
        assert_eq!(opt.normalize(Point::new(-3, -1)), Point::new(0, 0));
        // (80, 0) is (0, 1): home plus a line feed beats cup.
        assert_eq!(mv(&opt, None, (80, 0)), "\x1b[H\n");
    }

    #[test]
    fn off_screen_origin_counts_as_unknown() {
        let opt = optimizer("xterm", 0);
        assert_eq!(mv(&opt, Some((80, 0)), (1, 0)), "\x1b[1;2H");
    }

    #[test]
    fn dumb_terminal_cannot_address() {
        let mut caps = Capabilities::from_terminfo(&TermInfo::builtin("dumb").unwrap(), TermKind::empty());
        caps.set(StrCap::CursorAddress, None);
        let opt = CursorOptimizer::new(&caps, Size::new(80, 24), 8, 0);
        assert_eq!(mv(&opt, None, (5, 5)), "");
        // Carriage return and line feed still work relatively.
        assert_eq!(mv(&opt, Some((5, 1)), (0, 2)), "\r\n");
    }

    // ── After print ──────────────────────────────────────────────────────

    #[test]
    fn after_print_wrap_rules() {
        let xterm = optimizer("xterm", 0);
        assert_eq!(xterm.after_print(Point::new(3, 3), 1), Some(Point::new(4, 3)));
        // xterm has the newline glitch: position is unknown after the edge.
        assert_eq!(xterm.after_print(Point::new(79, 3), 1), None);
        assert_eq!(xterm.after_print(Point::new(79, 23), 1), Some(Point::new(79, 23)));

        let mut info = TermInfo::builtin("ansi").unwrap();
        info.set_flag(BoolCap::EatNewlineGlitch, false);
        let caps = Capabilities::from_terminfo(&info, TermKind::empty());
        let ansi = CursorOptimizer::new(&caps, Size::new(80, 24), 8, 0);
        assert_eq!(ansi.after_print(Point::new(78, 3), 2), Some(Point::new(0, 4)));
    }

    // ── Properties ───────────────────────────────────────────────────────

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn on_screen() -> impl Strategy<Value = Point> {
            (0..80i32, 0..24i32).prop_map(|(x, y)| Point::new(x, y))
        }

        proptest! {
            #[test]
            fn staying_put_is_free(p in on_screen()) {
                let opt = optimizer("xterm", 0);
                prop_assert!(opt.move_cursor(Some(p), p).is_empty());
            }

            #[test]
            fn known_origin_is_never_dearer(from in on_screen(), to in on_screen()) {
                let opt = optimizer("xterm", 0);
                let relative = opt.move_cursor(Some(from), to);
                let absolute = opt.move_cursor(None, to);
                prop_assert!(!absolute.is_empty());
                prop_assert!(relative.len() <= absolute.len());
                prop_assert_eq!(relative.is_empty(), from == to);
            }
        }
    }
}
