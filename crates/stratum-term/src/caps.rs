// SPDX-License-Identifier: MIT
//
// Capabilities — the resolved capability set the output engine works from.
//
// Starts as a copy of the terminfo description, then gets corrected for
// the emulator detection found. Terminfo entries are often generic or
// stale: a GNOME terminal announcing itself as plain `xterm`, a Linux
// console whose entry lacks the PC charset switches, an emulator that
// supports crossed-out text nobody wrote down. The fixups below patch
// those gaps so the rest of the crate can trust what it reads here.

use std::collections::{HashMap, HashSet};

use crate::detect::TermKind;
use crate::param;
use crate::terminfo::{self, BoolCap, NumCap, StrCap, TermInfo};

const SETAF_256: &str = "\x1b[%?%p1%{8}%<%t3%p1%d%e%p1%{16}%<%t9%p1%{8}%-%d%e38;5;%p1%d%;m";
const SETAB_256: &str = "\x1b[%?%p1%{8}%<%t4%p1%d%e%p1%{16}%<%t10%p1%{8}%-%d%e48;5;%p1%d%;m";

/// Capability values in effect for the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    name: String,
    strings: HashMap<StrCap, String>,
    flags: HashSet<BoolCap>,
    numbers: HashMap<NumCap, i32>,
}

impl Capabilities {
    /// Copy a terminfo description and apply the fixups for `kind`.
    #[must_use]
    pub fn from_terminfo(info: &TermInfo, kind: TermKind) -> Self {
        let mut caps = Self {
            name: info.name().to_string(),
            ..Self::default()
        };
        for &cap in StrCap::ALL {
            if let Some(value) = info.string(cap) {
                caps.strings.insert(cap, value.to_string());
            }
        }
        for &cap in BoolCap::ALL {
            if info.flag(cap) {
                caps.flags.insert(cap);
            }
        }
        for &cap in NumCap::ALL {
            if let Some(value) = info.number(cap) {
                caps.numbers.insert(cap, value);
            }
        }
        caps.apply_fixups(kind);
        caps
    }

    /// Terminal name the description was loaded for.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn get(&self, cap: StrCap) -> Option<&str> {
        self.strings.get(&cap).map(String::as_str)
    }

    #[must_use]
    pub fn has(&self, cap: StrCap) -> bool {
        self.strings.contains_key(&cap)
    }

    #[must_use]
    pub fn flag(&self, cap: BoolCap) -> bool {
        self.flags.contains(&cap)
    }

    #[must_use]
    pub fn number(&self, cap: NumCap) -> Option<i32> {
        self.numbers.get(&cap).copied()
    }

    /// Bytes of a capability, with parameters substituted.
    ///
    /// `None` when the capability is absent or its program is malformed;
    /// the latter is traced and otherwise treated as absent.
    #[must_use]
    pub fn format(&self, cap: StrCap, args: &[i32]) -> Option<Vec<u8>> {
        let template = self.get(cap)?;
        if !template.contains('%') {
            return Some(terminfo::cap_bytes(&param::strip_padding(template)));
        }
        match param::format(template, args) {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                tracing::debug!(cap = cap.code(), %err, "malformed capability string");
                None
            }
        }
    }

    /// Bytes of a capability that takes no parameters.
    #[must_use]
    pub fn bytes(&self, cap: StrCap) -> Option<Vec<u8>> {
        self.format(cap, &[])
    }

    /// Number of colors, 0 for a monochrome terminal.
    #[must_use]
    pub fn max_colors(&self) -> u16 {
        self.number(NumCap::MaxColors)
            .map_or(0, |n| u16::try_from(n.clamp(0, 256)).unwrap_or(256))
    }

    /// Hardware tab width.
    #[must_use]
    pub fn tabstop(&self) -> usize {
        self.number(NumCap::InitTabs)
            .and_then(|n| usize::try_from(n).ok())
            .filter(|&n| n > 0)
            .unwrap_or(8)
    }

    pub fn set(&mut self, cap: StrCap, value: Option<&str>) {
        match value {
            Some(v) => {
                self.strings.insert(cap, v.to_string());
            }
            None => {
                self.strings.remove(&cap);
            }
        }
    }

    pub fn set_flag(&mut self, cap: BoolCap, value: bool) {
        if value {
            self.flags.insert(cap);
        } else {
            self.flags.remove(&cap);
        }
    }

    pub fn set_number(&mut self, cap: NumCap, value: Option<i32>) {
        match value {
            Some(v) => {
                self.numbers.insert(cap, v);
            }
            None => {
                self.numbers.remove(&cap);
            }
        }
    }

    fn set_default(&mut self, cap: StrCap, value: &str) {
        self.strings.entry(cap).or_insert_with(|| value.to_string());
    }

    // ─── Fixups ───────────────────────────────────────────────────────────

    fn apply_fixups(&mut self, kind: TermKind) {
        let xterm_like = kind.intersects(
            TermKind::XTERM
                | TermKind::GNOME
                | TermKind::KDE
                | TermKind::MINTTY
                | TermKind::MLTERM
                | TermKind::URXVT
                | TermKind::TMUX,
        );

        if kind.contains(TermKind::COLOR_256)
            && self.max_colors() < 256
            && !kind.intersects(TermKind::LINUX | TermKind::CYGWIN)
        {
            self.set_number(NumCap::MaxColors, Some(256));
            self.set_number(NumCap::MaxPairs, Some(65536));
            self.set(StrCap::SetAForeground, Some(SETAF_256));
            self.set(StrCap::SetABackground, Some(SETAB_256));
        }

        if xterm_like {
            self.set_default(StrCap::EnterCrossedOutMode, "\x1b[9m");
            self.set_default(StrCap::ExitCrossedOutMode, "\x1b[29m");
            self.set_default(StrCap::EnterItalicsMode, "\x1b[3m");
            self.set_default(StrCap::ExitItalicsMode, "\x1b[23m");
            self.set_default(StrCap::OrigPair, "\x1b[39;49m");
        }

        if kind.contains(TermKind::GNOME) {
            self.set(StrCap::ExitUnderlineMode, Some("\x1b[24m"));
        }

        if kind.contains(TermKind::CYGWIN) {
            self.set_default(StrCap::EnterBlinkMode, "\x1b[5m");
        }

        if kind.intersects(TermKind::LINUX | TermKind::CYGWIN) {
            self.set(StrCap::EnterPcCharsetMode, Some("\x1b[11m"));
            self.set(StrCap::ExitPcCharsetMode, Some("\x1b[10m"));
            if self.max_colors() > 8 {
                // Intensity through bold (foreground) and blink (background).
                self.set(
                    StrCap::SetAForeground,
                    Some("\x1b[3%p1%{8}%m%d%?%p1%{7}%>%t;1%e;22%;m"),
                );
                self.set(
                    StrCap::SetABackground,
                    Some("\x1b[4%p1%{8}%m%d%?%p1%{7}%>%t;5%e;25%;m"),
                );
            }
            // Both consoles render underline as a color change.
            self.set(StrCap::EnterUnderlineMode, None);
            self.set(StrCap::ExitUnderlineMode, None);
        }

        if kind.contains(TermKind::LINUX) {
            self.set_default(StrCap::OrigColors, "\x1b]R");
        }

        if kind.intersects(TermKind::RXVT | TermKind::URXVT) {
            self.set_default(StrCap::EnaAcs, "\x1b(B\x1b)0");
        }

        if kind.contains(TermKind::FORCE_VT100) {
            self.set(StrCap::EnterAltCharsetMode, Some("\x1b(0"));
            self.set(StrCap::ExitAltCharsetMode, Some("\x1b(B"));
            self.set(StrCap::EnaAcs, None);
        }

        if kind.contains(TermKind::PUTTY) {
            self.set_default(StrCap::EnterPcCharsetMode, "\x1b[11m");
            self.set_default(StrCap::ExitPcCharsetMode, "\x1b[10m");
            self.set(StrCap::SetAForeground, Some(SETAF_256));
            self.set(StrCap::SetABackground, Some(SETAB_256));
        }

        if kind.contains(TermKind::TERA) {
            self.set_default(StrCap::EnterPcCharsetMode, "\x1b[11m");
            self.set_default(StrCap::ExitPcCharsetMode, "\x1b[10m");
            if self.max_colors() >= 256 {
                self.set(StrCap::SetAForeground, Some("\x1b[38;5;%p1%dm"));
                self.set(StrCap::SetABackground, Some("\x1b[48;5;%p1%dm"));
            }
        }

        if kind.intersects(TermKind::SCREEN | TermKind::TMUX) {
            // Multiplexers pass the palette through only via their own
            // escape wrappers.
            self.set(StrCap::InitializeColor, None);
            self.set_flag(BoolCap::CanChange, false);
        }

        self.set_default(StrCap::SetAForeground, "\x1b[3%p1%dm");
        self.set_default(StrCap::SetABackground, "\x1b[4%p1%dm");
        self.set_default(StrCap::EnterCaMode, "\x1b7\x1b[?47h");
        self.set_default(StrCap::ExitCaMode, "\x1b[?47l\x1b8\x1b[m");
        self.set_default(StrCap::CursorAddress, "\x1b[%i%p1%d;%p2%dH");
        self.set_default(StrCap::CursorInvisible, "\x1b[?25l");
        self.set_default(StrCap::CursorNormal, "\x1b[?25h");

        tracing::debug!(
            terminal = %self.name,
            ?kind,
            colors = self.max_colors(),
            strings = self.strings.len(),
            "capabilities resolved"
        );
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn caps(name: &str, kind: TermKind) -> Capabilities {
        Capabilities::from_terminfo(&TermInfo::builtin(name).unwrap(), kind)
    }

    #[test]
    fn copies_terminfo_values() {
        let c = caps("xterm", TermKind::empty());
        assert_eq!(c.name(), "xterm");
        assert_eq!(c.get(StrCap::CursorHome), Some("\x1b[H"));
        assert!(c.flag(BoolCap::AutoRightMargin));
        assert_eq!(c.max_colors(), 8);
        assert_eq!(c.tabstop(), 8);
    }

    #[test]
    fn format_substitutes_and_strips_padding() {
        let c = caps("vt100", TermKind::empty());
        assert_eq!(c.format(StrCap::CursorAddress, &[2, 3]), Some(b"\x1b[3;4H".to_vec()));
        assert_eq!(c.bytes(StrCap::ClearScreen), Some(b"\x1b[H\x1b[J".to_vec()));
        assert_eq!(c.bytes(StrCap::EnterItalicsMode), None);
    }

    #[test]
    fn malformed_capability_is_absent() {
        let mut c = caps("xterm", TermKind::empty());
        c.set(StrCap::CursorAddress, Some("%p1%z"));
        assert_eq!(c.format(StrCap::CursorAddress, &[1, 1]), None);
    }

    #[test]
    fn monochrome_has_zero_colors() {
        assert_eq!(caps("vt100", TermKind::empty()).max_colors(), 0);
    }

    // ── Fixups ───────────────────────────────────────────────────────────

    #[test]
    fn color_256_upgrade() {
        let c = caps("xterm", TermKind::XTERM | TermKind::COLOR_256);
        assert_eq!(c.max_colors(), 256);
        assert_eq!(c.format(StrCap::SetAForeground, &[100]), Some(b"\x1b[38;5;100m".to_vec()));
    }

    #[test]
    fn xterm_gets_crossed_out() {
        let c = caps("xterm", TermKind::XTERM);
        assert_eq!(c.get(StrCap::EnterCrossedOutMode), Some("\x1b[9m"));
        assert_eq!(c.get(StrCap::ExitCrossedOutMode), Some("\x1b[29m"));
        assert!(!caps("vt100", TermKind::empty()).has(StrCap::EnterCrossedOutMode));
    }

    #[test]
    fn linux_console() {
        let c = caps("linux", TermKind::LINUX);
        assert_eq!(c.get(StrCap::EnterPcCharsetMode), Some("\x1b[11m"));
        assert!(!c.has(StrCap::EnterUnderlineMode));
        assert!(!c.has(StrCap::ExitUnderlineMode));
        // No 256-color upgrade on the console.
        let c = caps("linux", TermKind::LINUX | TermKind::COLOR_256);
        assert_eq!(c.max_colors(), 8);
    }

    #[test]
    fn linux_sixteen_colors_use_bold_and_blink() {
        let mut info = TermInfo::builtin("linux").unwrap();
        info.set_number(NumCap::MaxColors, Some(16));
        let c = Capabilities::from_terminfo(&info, TermKind::LINUX);
        assert_eq!(c.format(StrCap::SetAForeground, &[9]), Some(b"\x1b[31;1m".to_vec()));
        assert_eq!(c.format(StrCap::SetABackground, &[2]), Some(b"\x1b[42;25m".to_vec()));
    }

    #[test]
    fn forced_vt100_charset() {
        let c = caps("rxvt-16color", TermKind::RXVT | TermKind::FORCE_VT100);
        assert_eq!(c.get(StrCap::EnterAltCharsetMode), Some("\x1b(0"));
        assert!(!c.has(StrCap::EnaAcs));
    }

    #[test]
    fn missing_basics_are_synthesized() {
        let c = caps("dumb", TermKind::empty());
        assert_eq!(c.format(StrCap::CursorAddress, &[0, 4]), Some(b"\x1b[1;5H".to_vec()));
        assert_eq!(c.get(StrCap::CursorInvisible), Some("\x1b[?25l"));
        assert_eq!(c.get(StrCap::EnterCaMode), Some("\x1b7\x1b[?47h"));
        assert_eq!(c.format(StrCap::SetABackground, &[3]), Some(b"\x1b[43m".to_vec()));
        // Still monochrome: the color templates exist but are never used.
        assert_eq!(c.max_colors(), 0);
    }

    #[test]
    fn gnome_and_cygwin_patches() {
        let c = caps("xterm", TermKind::XTERM | TermKind::GNOME);
        assert_eq!(c.get(StrCap::ExitUnderlineMode), Some("\x1b[24m"));
        let c = caps("cygwin", TermKind::CYGWIN);
        assert_eq!(c.get(StrCap::EnterBlinkMode), Some("\x1b[5m"));
        assert!(!c.has(StrCap::EnterUnderlineMode));
    }

    #[test]
    fn putty_split_color_template() {
        let c = caps("putty", TermKind::PUTTY);
        assert_eq!(c.format(StrCap::SetAForeground, &[12]), Some(b"\x1b[94m".to_vec()));
        assert_eq!(c.format(StrCap::SetAForeground, &[3]), Some(b"\x1b[33m".to_vec()));
    }

    #[test]
    fn multiplexers_drop_palette_changes() {
        let c = caps("screen", TermKind::SCREEN);
        assert!(!c.has(StrCap::InitializeColor));
        assert!(!c.flag(BoolCap::CanChange));
    }
}
