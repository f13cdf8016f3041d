// SPDX-License-Identifier: MIT
//
// Detect — work out which emulator is on the other end.
//
// `TERM` alone is unreliable: most emulators claim to be `xterm`, many
// undersell their color support, and multiplexers hide what is behind
// them. Detection combines three sources, cheapest first:
//
//   1. the terminal type and emulator-specific environment variables
//   2. the answerback string (`ENQ`), which only PuTTY answers usefully
//   3. the secondary device attributes (`CSI > c`), whose first number
//      identifies most emulators
//
// Probes go through the `TerminalProbe` trait so detection runs against a
// scripted fake in tests and against the tty in production. A probe that
// times out simply contributes nothing.

use std::time::Duration;

use crate::caps::Capabilities;
use crate::config::TermConfig;
use crate::encoding::Encoding;
use crate::terminfo::StrCap;

/// How long a probe waits for the terminal to answer.
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(150);

const ENQ: &[u8] = b"\x05";
const SECONDARY_DA: &[u8] = b"\x1b[>c";

bitflags::bitflags! {
    /// Emulator families and traits found by detection.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
    pub struct TermKind: u32 {
        const XTERM       = 1 << 0;
        const ANSI        = 1 << 1;
        const RXVT        = 1 << 2;
        const URXVT       = 1 << 3;
        const MLTERM      = 1 << 4;
        const PUTTY       = 1 << 5;
        const KDE         = 1 << 6;
        const GNOME       = 1 << 7;
        const KTERM       = 1 << 8;
        const TERA        = 1 << 9;
        const CYGWIN      = 1 << 10;
        const MINTTY      = 1 << 11;
        const LINUX       = 1 << 12;
        const SCREEN      = 1 << 13;
        const TMUX        = 1 << 14;
        const COLOR_256   = 1 << 15;
        /// Alternate charset through `ESC ( 0` regardless of terminfo.
        const FORCE_VT100 = 1 << 16;
    }
}

/// Result of terminal detection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    /// Normalized terminal type, used for the terminfo lookup and
    /// exported back into `TERM`.
    pub name: String,
    pub kind: TermKind,
}

/// Sends a query to the terminal and collects the reply.
pub trait TerminalProbe {
    /// Write `request` and return whatever arrives within `timeout`, or
    /// `None` when nothing does.
    fn query(&mut self, request: &[u8], timeout: Duration) -> Option<Vec<u8>>;
}

/// A probe that never gets an answer. Used when stdin is not a terminal
/// or probing is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProbe;

impl TerminalProbe for NoProbe {
    fn query(&mut self, _request: &[u8], _timeout: Duration) -> Option<Vec<u8>> {
        None
    }
}

// ─── Detection ───────────────────────────────────────────────────────────────

/// Determine the terminal type and emulator family.
pub fn detect(config: &TermConfig, probe: &mut dyn TerminalProbe) -> Detection {
    let mut name = config.term.clone().unwrap_or_else(|| "vt100".to_string());
    let mut kind = kind_from_name(&name);

    if config.is_konsole() {
        kind |= TermKind::KDE;
    }
    if config.tmux.is_some() && name.starts_with("screen") {
        kind |= TermKind::TMUX;
    }
    if config.has_color_hint() {
        name = upgrade_to_256(&name, config);
    }
    if name.ends_with("256color") {
        kind |= TermKind::COLOR_256;
    }
    if config.is_vte() && name.starts_with("xterm") {
        kind |= TermKind::GNOME;
        name = with_colors(kind, "gnome", "gnome-256color");
    }

    let console = kind.intersects(TermKind::LINUX | TermKind::CYGWIN);
    if !config.no_probe && !console {
        identify_by_probe(probe, &mut name, &mut kind);
    }

    kind |= kind_from_name(&name);
    if name.ends_with("256color") {
        kind |= TermKind::COLOR_256;
    }
    tracing::info!(terminal = %name, ?kind, "terminal detected");
    Detection { name, kind }
}

fn identify_by_probe(probe: &mut dyn TerminalProbe, name: &mut String, kind: &mut TermKind) {
    if let Some(answer) = probe.query(ENQ, PROBE_TIMEOUT) {
        tracing::debug!(answer = %String::from_utf8_lossy(&answer).escape_debug(), "answerback");
        if answer == b"PuTTY" {
            *kind |= TermKind::PUTTY;
            *name = with_colors(*kind, "putty", "putty-256color");
            return;
        }
    }

    let Some(reply) = probe.query(SECONDARY_DA, PROBE_TIMEOUT) else {
        tracing::debug!("no secondary device attributes");
        return;
    };
    let Some((class, version)) = parse_secondary_da(&reply) else {
        tracing::debug!(reply = %String::from_utf8_lossy(&reply).escape_debug(), "unparsable device attributes");
        return;
    };
    tracing::debug!(class, version, "secondary device attributes");

    match class {
        0 if version == 136 => {
            *kind |= TermKind::PUTTY;
            *name = with_colors(*kind, "putty", "putty-256color");
        }
        1 if version == 2 => {
            *kind |= TermKind::KTERM;
            *name = "kterm".to_string();
        }
        1 => {
            *kind |= TermKind::GNOME;
            *name = with_colors(*kind, "gnome", "gnome-256color");
        }
        32 => {
            *kind |= TermKind::TERA;
            *name = "teraterm".to_string();
        }
        77 => {
            *kind |= TermKind::MINTTY | TermKind::COLOR_256;
            *name = "xterm-256color".to_string();
        }
        82 => {
            *kind |= TermKind::RXVT | TermKind::FORCE_VT100;
            *name = "rxvt-16color".to_string();
        }
        83 => {
            *kind |= TermKind::SCREEN;
            if !name.starts_with("screen") {
                *name = with_colors(*kind, "screen", "screen-256color");
            }
        }
        84 => {
            *kind |= TermKind::TMUX;
            *name = with_colors(*kind, "tmux", "tmux-256color");
        }
        85 => {
            *kind |= TermKind::RXVT | TermKind::URXVT;
            *name = with_colors(*kind, "rxvt", "rxvt-256color");
        }
        19 | 24 | 41 => {
            *kind |= TermKind::XTERM;
            if !name.starts_with("xterm") {
                *name = with_colors(*kind, "xterm", "xterm-256color");
            }
        }
        _ => {}
    }
}

fn with_colors(kind: TermKind, plain: &str, rich: &str) -> String {
    if kind.contains(TermKind::COLOR_256) {
        rich.to_string()
    } else {
        plain.to_string()
    }
}

/// Family flags implied by the terminal type alone.
#[must_use]
pub fn kind_from_name(name: &str) -> TermKind {
    let mut kind = TermKind::empty();
    let starts = |prefix: &str| name.starts_with(prefix);
    if starts("xterm") || starts("Eterm") {
        kind |= TermKind::XTERM;
    }
    if starts("linux") || starts("con") {
        kind |= TermKind::LINUX;
    }
    if starts("cygwin") {
        kind |= TermKind::CYGWIN;
    }
    if starts("screen") {
        kind |= TermKind::SCREEN;
    }
    if starts("tmux") {
        kind |= TermKind::TMUX;
    }
    if starts("rxvt") {
        kind |= TermKind::RXVT;
    }
    if starts("rxvt-unicode") {
        kind |= TermKind::URXVT;
    }
    if starts("putty") {
        kind |= TermKind::PUTTY;
    }
    if starts("kterm") {
        kind |= TermKind::KTERM;
    }
    if starts("mlterm") {
        kind |= TermKind::MLTERM;
    }
    if starts("ansi") {
        kind |= TermKind::ANSI;
    }
    if starts("teraterm") {
        kind |= TermKind::TERA;
    }
    if starts("mintty") {
        kind |= TermKind::MINTTY;
    }
    if starts("gnome") {
        kind |= TermKind::GNOME;
    }
    kind
}

fn upgrade_to_256(name: &str, config: &TermConfig) -> String {
    if name.ends_with("256color") {
        return name.to_string();
    }
    let upgraded = if name.starts_with("xterm") {
        "xterm-256color"
    } else if name.starts_with("screen") {
        if config.tmux.is_some() {
            "tmux-256color"
        } else {
            "screen-256color"
        }
    } else if name.starts_with("Eterm") {
        "Eterm-256color"
    } else if name.starts_with("mlterm") {
        "mlterm-256color"
    } else if config.colorterm.as_deref() == Some("rxvt-xpm") {
        "rxvt-256color"
    } else {
        return name.to_string();
    };
    tracing::debug!(from = name, to = upgraded, "256-color upgrade");
    upgraded.to_string()
}

/// Parse a secondary device attributes reply, `ESC [ > Pp ; Pv ; Pc c`.
/// Returns the terminal class and version.
#[must_use]
pub fn parse_secondary_da(reply: &[u8]) -> Option<(u32, u32)> {
    let text = std::str::from_utf8(reply).ok()?;
    let start = text.find("\x1b[>")?;
    let body = text[start + 3..].strip_suffix('c')?;
    let mut fields = body.split(';');
    let class = fields.next()?.trim().parse().ok()?;
    let version = fields.next().map_or(Some(0), |v| v.trim().parse().ok())?;
    Some((class, version))
}

// ─── Encoding ────────────────────────────────────────────────────────────────

/// Choose the output encoding.
///
/// An explicit `STRATUM_ENCODING` wins. Consoles that draw boxes from
/// their own font (Linux, Cygwin, Tera Term, PuTTY outside UTF-8) use the
/// PC code page, rxvt the VT100 alternate charset. Otherwise a UTF-8
/// locale means UTF-8, a terminal with an alternate charset means VT100,
/// and everything else is plain ASCII.
#[must_use]
pub fn detect_encoding(config: &TermConfig, kind: TermKind, caps: &Capabilities) -> Encoding {
    if let Some(requested) = &config.encoding {
        match requested.parse::<Encoding>() {
            Ok(encoding) => return encoding,
            Err(err) => tracing::warn!(%err, "ignoring STRATUM_ENCODING"),
        }
    }
    let utf8 = config.is_utf8_locale();
    let encoding = if kind.intersects(TermKind::LINUX | TermKind::CYGWIN | TermKind::TERA)
        || (kind.contains(TermKind::PUTTY) && !utf8)
    {
        Encoding::Pc
    } else if kind.contains(TermKind::RXVT) && !kind.contains(TermKind::URXVT) {
        Encoding::Vt100
    } else if utf8 {
        Encoding::Utf8
    } else if caps.has(StrCap::ExitAltCharsetMode) {
        Encoding::Vt100
    } else {
        Encoding::Ascii
    };
    tracing::debug!(%encoding, "encoding selected");
    encoding
}

// ─── Tests ───────────────────────────────────────────────────────────────────
