// SPDX-License-Identifier: MIT
//
// Built-in terminal descriptions.
//
// Used when the terminfo database has no entry for the terminal type
// (minimal containers, rescue shells). Each entry may name a parent whose
// capabilities it starts from, overriding and cancelling on top.

use super::{BoolCap as B, NumCap as N, StrCap as S, TermInfo};

struct Entry {
    names: &'static [&'static str],
    parent: Option<&'static str>,
    flags: &'static [B],
    numbers: &'static [(N, i32)],
    strings: &'static [(S, &'static str)],
    cancel: &'static [S],
}

impl Entry {
    const BLANK: Self = Self {
        names: &[],
        parent: None,
        flags: &[],
        numbers: &[],
        strings: &[],
        cancel: &[],
    };
}

const XTERM_ACSC: &str = "``aaffggiijjkkllmmnnooppqqrrssttuuvvwwxxyyzz{{||}}~~";
const VT100_ACSC: &str = "``aaffggjjkkllmmnnooppqqrrssttuuvvwwxxyyzz{{||}}~~";
const LINUX_ACSC: &str = "++,,--..00__``aaffgghhiijjkkllmmnnooppqqrrssttuuvvwwxxyyzz{{||}c~~";
const PC_ACSC: &str = "+\u{10},\u{11}-\u{18}.\u{19}0\u{db}`\u{04}a\u{b1}f\u{f8}g\u{f1}h\u{b0}\
                       j\u{d9}k\u{bf}l\u{da}m\u{c0}n\u{c5}o~p\u{c4}q\u{c4}r\u{c4}s_t\u{c3}\
                       u\u{b4}v\u{c1}w\u{c2}x\u{b3}y\u{f3}z\u{f2}{\u{e3}|\u{d8}}\u{9c}~\u{fe}";

const SETAF_256: &str =
    "\x1b[%?%p1%{8}%<%t3%p1%d%e%p1%{16}%<%t9%p1%{8}%-%d%e38;5;%p1%d%;m";
const SETAB_256: &str =
    "\x1b[%?%p1%{8}%<%t4%p1%d%e%p1%{16}%<%t10%p1%{8}%-%d%e48;5;%p1%d%;m";
const XTERM_INITC: &str = "\x1b]4;%p1%d;rgb:%p2%{255}%*%{1000}%/%2.2X/\
                           %p3%{255}%*%{1000}%/%2.2X/%p4%{255}%*%{1000}%/%2.2X\x1b\\";
const LINUX_INITC: &str = "\x1b]P%p1%x%p2%{255}%*%{1000}%/%02x\
                           %p3%{255}%*%{1000}%/%02x%p4%{255}%*%{1000}%/%02x";

/// Cursor motion and editing shared by the ECMA-48 style entries.
const ANSI_MOTION: &[(S, &str)] = &[
    (S::Bell, "\x07"),
    (S::CarriageReturn, "\r"),
    (S::ChangeScrollRegion, "\x1b[%i%p1%d;%p2%dr"),
    (S::ClrEol, "\x1b[K"),
    (S::ClrEos, "\x1b[J"),
    (S::ClrBol, "\x1b[1K"),
    (S::CursorAddress, "\x1b[%i%p1%d;%p2%dH"),
    (S::CursorDown, "\n"),
    (S::CursorHome, "\x1b[H"),
    (S::CursorLeft, "\x08"),
    (S::CursorRight, "\x1b[C"),
    (S::CursorUp, "\x1b[A"),
    (S::ParmDownCursor, "\x1b[%p1%dB"),
    (S::ParmLeftCursor, "\x1b[%p1%dD"),
    (S::ParmRightCursor, "\x1b[%p1%dC"),
    (S::ParmUpCursor, "\x1b[%p1%dA"),
    (S::ParmIch, "\x1b[%p1%d@"),
    (S::EraseChars, "\x1b[%p1%dX"),
    (S::ColumnAddress, "\x1b[%i%p1%dG"),
    (S::RowAddress, "\x1b[%i%p1%dd"),
    (S::SaveCursor, "\x1b7"),
    (S::RestoreCursor, "\x1b8"),
    (S::ScrollForward, "\n"),
    (S::ScrollReverse, "\x1bM"),
    (S::Tab, "\t"),
    (S::BackTab, "\x1b[Z"),
    (S::EnterInsertMode, "\x1b[4h"),
    (S::ExitInsertMode, "\x1b[4l"),
    (S::EnterBlinkMode, "\x1b[5m"),
    (S::EnterBoldMode, "\x1b[1m"),
    (S::EnterDimMode, "\x1b[2m"),
    (S::EnterSecureMode, "\x1b[8m"),
    (S::EnterReverseMode, "\x1b[7m"),
    (S::EnterStandoutMode, "\x1b[7m"),
    (S::ExitStandoutMode, "\x1b[27m"),
    (S::EnterUnderlineMode, "\x1b[4m"),
    (S::ExitUnderlineMode, "\x1b[24m"),
    (S::OrigPair, "\x1b[39;49m"),
    (S::SetAForeground, "\x1b[3%p1%dm"),
    (S::SetABackground, "\x1b[4%p1%dm"),
];

const COLOR_8: &[(N, i32)] = &[
    (N::Columns, 80),
    (N::Lines, 24),
    (N::InitTabs, 8),
    (N::MaxColors, 8),
    (N::MaxPairs, 64),
];

const COLOR_256: &[(N, i32)] = &[(N::MaxColors, 256), (N::MaxPairs, 65536)];

const COLOR_256_STRINGS: &[(S, &str)] = &[
    (S::SetAForeground, SETAF_256),
    (S::SetABackground, SETAB_256),
];

static ENTRIES: &[Entry] = &[
    // ── ECMA-48 base layer, inherited by most entries ──
    Entry {
        names: &["stratum-ansi-base"],
        numbers: COLOR_8,
        strings: ANSI_MOTION,
        ..Entry::BLANK
    },
    Entry {
        names: &["xterm", "xterm-color", "xterm-new", "kterm", "mlterm", "teraterm", "gnome"],
        parent: Some("stratum-ansi-base"),
        flags: &[B::AutoRightMargin, B::BackColorErase, B::CanChange, B::EatNewlineGlitch,
                 B::MoveInsertMode, B::MoveStandoutMode],
        strings: &[
            (S::ClearScreen, "\x1b[H\x1b[2J"),
            (S::CursorInvisible, "\x1b[?25l"),
            (S::CursorNormal, "\x1b[?12l\x1b[?25h"),
            (S::CursorVisible, "\x1b[?12;25h"),
            (S::EnterAltCharsetMode, "\x1b(0"),
            (S::ExitAltCharsetMode, "\x1b(B"),
            (S::ExitAttributeMode, "\x1b(B\x1b[m"),
            (S::EnterCaMode, "\x1b[?1049h\x1b[22;0;0t"),
            (S::ExitCaMode, "\x1b[?1049l\x1b[23;0;0t"),
            (S::EnterItalicsMode, "\x1b[3m"),
            (S::ExitItalicsMode, "\x1b[23m"),
            (S::KeypadXmit, "\x1b[?1h\x1b="),
            (S::KeypadLocal, "\x1b[?1l\x1b>"),
            (S::EnterAmMode, "\x1b[?7h"),
            (S::ExitAmMode, "\x1b[?7l"),
            (S::AcsChars, XTERM_ACSC),
            (S::InitializeColor, XTERM_INITC),
            (S::SetAttributes, "%?%p9%t\x1b(0%e\x1b(B%;\x1b[0%?%p6%t;1%;%?%p5%t;2%;%?%p2%t;4%;\
                                %?%p1%p3%|%t;7%;%?%p4%t;5%;%?%p7%t;8%;m"),
        ],
        ..Entry::BLANK
    },
    Entry {
        names: &["xterm-256color", "gnome-256color", "mintty"],
        parent: Some("xterm"),
        numbers: COLOR_256,
        strings: COLOR_256_STRINGS,
        ..Entry::BLANK
    },
    Entry {
        names: &["screen", "tmux"],
        parent: Some("stratum-ansi-base"),
        flags: &[B::AutoRightMargin, B::EatNewlineGlitch, B::MoveInsertMode, B::MoveStandoutMode],
        strings: &[
            (S::ClearScreen, "\x1b[H\x1b[J"),
            (S::CursorUp, "\x1bM"),
            (S::CursorInvisible, "\x1b[?25l"),
            (S::CursorNormal, "\x1b[34h\x1b[?25h"),
            (S::CursorVisible, "\x1b[34l"),
            (S::EnterAltCharsetMode, "\x1b(0"),
            (S::ExitAltCharsetMode, "\x1b(B"),
            (S::EnaAcs, "\x1b(B\x1b)0"),
            (S::AcsChars, XTERM_ACSC),
            (S::ExitAttributeMode, "\x1b[m\x0f"),
            (S::EnterStandoutMode, "\x1b[3m"),
            (S::ExitStandoutMode, "\x1b[23m"),
            (S::EnterCaMode, "\x1b[?1049h"),
            (S::ExitCaMode, "\x1b[?1049l"),
            (S::KeypadXmit, "\x1b[?1h\x1b="),
            (S::KeypadLocal, "\x1b[?1l\x1b>"),
        ],
        cancel: &[S::ColumnAddress, S::RowAddress, S::EraseChars],
        ..Entry::BLANK
    },
    Entry {
        names: &["screen-256color"],
        parent: Some("screen"),
        numbers: COLOR_256,
        strings: COLOR_256_STRINGS,
        ..Entry::BLANK
    },
    Entry {
        names: &["tmux-256color"],
        parent: Some("screen-256color"),
        strings: &[
            (S::EnterItalicsMode, "\x1b[3m"),
            (S::ExitItalicsMode, "\x1b[23m"),
            (S::EnterStandoutMode, "\x1b[7m"),
            (S::ExitStandoutMode, "\x1b[27m"),
        ],
        ..Entry::BLANK
    },
    Entry {
        names: &["linux", "linux-16color"],
        parent: Some("stratum-ansi-base"),
        flags: &[B::AutoRightMargin, B::BackColorErase, B::CanChange, B::EatNewlineGlitch,
                 B::MoveInsertMode, B::MoveStandoutMode],
        numbers: &[(N::NoColorVideo, 18)],
        strings: &[
            (S::ClearScreen, "\x1b[H\x1b[J"),
            (S::CursorInvisible, "\x1b[?25l\x1b[?1c"),
            (S::CursorNormal, "\x1b[?25h\x1b[?0c"),
            (S::CursorVisible, "\x1b[?25h\x1b[?8c"),
            (S::EnterAltCharsetMode, "\x1b[11m"),
            (S::ExitAltCharsetMode, "\x1b[10m"),
            (S::EnterPcCharsetMode, "\x1b[11m"),
            (S::ExitPcCharsetMode, "\x1b[10m"),
            (S::AcsChars, LINUX_ACSC),
            (S::ExitAttributeMode, "\x1b[m\x0f"),
            (S::OrigColors, "\x1b]R"),
            (S::InitializeColor, LINUX_INITC),
        ],
        cancel: &[S::BackTab],
        ..Entry::BLANK
    },
    Entry {
        names: &["vt100", "vt100-am"],
        flags: &[B::AutoRightMargin, B::EatNewlineGlitch, B::MoveStandoutMode],
        numbers: &[(N::Columns, 80), (N::Lines, 24), (N::InitTabs, 8)],
        strings: &[
            (S::Bell, "\x07"),
            (S::CarriageReturn, "\r"),
            (S::ChangeScrollRegion, "\x1b[%i%p1%d;%p2%dr"),
            (S::ClearScreen, "\x1b[H\x1b[J$<50>"),
            (S::ClrEol, "\x1b[K$<3>"),
            (S::ClrEos, "\x1b[J$<50>"),
            (S::ClrBol, "\x1b[1K$<3>"),
            (S::CursorAddress, "\x1b[%i%p1%d;%p2%dH$<5>"),
            (S::CursorDown, "\n"),
            (S::CursorHome, "\x1b[H"),
            (S::CursorLeft, "\x08"),
            (S::CursorRight, "\x1b[C$<2>"),
            (S::CursorUp, "\x1b[A$<2>"),
            (S::ParmDownCursor, "\x1b[%p1%dB"),
            (S::ParmLeftCursor, "\x1b[%p1%dD"),
            (S::ParmRightCursor, "\x1b[%p1%dC"),
            (S::ParmUpCursor, "\x1b[%p1%dA"),
            (S::EnterAltCharsetMode, "\x0e"),
            (S::ExitAltCharsetMode, "\x0f"),
            (S::EnaAcs, "\x1b(B\x1b)0"),
            (S::AcsChars, VT100_ACSC),
            (S::EnterBlinkMode, "\x1b[5m$<2>"),
            (S::EnterBoldMode, "\x1b[1m$<2>"),
            (S::EnterReverseMode, "\x1b[7m$<2>"),
            (S::EnterStandoutMode, "\x1b[7m$<2>"),
            (S::EnterUnderlineMode, "\x1b[4m$<2>"),
            (S::ExitAttributeMode, "\x1b[m\x0f$<2>"),
            (S::ExitStandoutMode, "\x1b[m$<2>"),
            (S::ExitUnderlineMode, "\x1b[m$<2>"),
            (S::SaveCursor, "\x1b7"),
            (S::RestoreCursor, "\x1b8"),
            (S::ScrollForward, "\n"),
            (S::ScrollReverse, "\x1bM$<5>"),
            (S::Tab, "\t"),
            (S::EnterAmMode, "\x1b[?7h"),
            (S::ExitAmMode, "\x1b[?7l"),
            (S::KeypadXmit, "\x1b[?1h\x1b="),
            (S::KeypadLocal, "\x1b[?1l\x1b>"),
        ],
        ..Entry::BLANK
    },
    Entry {
        names: &["vt220", "vt200"],
        parent: Some("vt100"),
        flags: &[B::MoveInsertMode],
        strings: &[
            (S::ClearScreen, "\x1b[H\x1b[J"),
            (S::ClrEol, "\x1b[K"),
            (S::ClrEos, "\x1b[J"),
            (S::ClrBol, "\x1b[1K"),
            (S::CursorAddress, "\x1b[%i%p1%d;%p2%dH"),
            (S::CursorRight, "\x1b[C"),
            (S::CursorUp, "\x1b[A"),
            (S::EnterAltCharsetMode, "\x1b(0"),
            (S::ExitAltCharsetMode, "\x1b(B"),
            (S::EnterBlinkMode, "\x1b[5m"),
            (S::EnterBoldMode, "\x1b[1m"),
            (S::EnterReverseMode, "\x1b[7m"),
            (S::EnterStandoutMode, "\x1b[7m"),
            (S::EnterUnderlineMode, "\x1b[4m"),
            (S::ExitAttributeMode, "\x1b[m\x1b(B"),
            (S::ExitStandoutMode, "\x1b[27m"),
            (S::ExitUnderlineMode, "\x1b[24m"),
            (S::ScrollReverse, "\x1bM"),
            (S::EnterInsertMode, "\x1b[4h"),
            (S::ExitInsertMode, "\x1b[4l"),
            (S::ParmIch, "\x1b[%p1%d@"),
            (S::EraseChars, "\x1b[%p1%dX"),
        ],
        cancel: &[S::EnaAcs],
        ..Entry::BLANK
    },
    Entry {
        names: &["ansi", "ansi-generic"],
        parent: Some("stratum-ansi-base"),
        flags: &[B::AutoRightMargin, B::MoveInsertMode, B::MoveStandoutMode],
        strings: &[
            (S::ClearScreen, "\x1b[H\x1b[J"),
            (S::CursorDown, "\x1b[B"),
            (S::CursorLeft, "\x1b[D"),
            (S::InsertCharacter, "\x1b[@"),
            (S::EnterAltCharsetMode, "\x1b[11m"),
            (S::ExitAltCharsetMode, "\x1b[10m"),
            (S::EnterPcCharsetMode, "\x1b[11m"),
            (S::ExitPcCharsetMode, "\x1b[10m"),
            (S::AcsChars, PC_ACSC),
            (S::ExitAttributeMode, "\x1b[0;10m"),
            (S::ExitStandoutMode, "\x1b[m"),
            (S::ExitUnderlineMode, "\x1b[m"),
            (S::ScrollReverse, "\x1b[T"),
            (S::Tab, "\x1b[I"),
        ],
        cancel: &[S::ChangeScrollRegion, S::SaveCursor, S::RestoreCursor, S::ClrBol,
                  S::EnterDimMode, S::EnterInsertMode, S::ExitInsertMode],
        ..Entry::BLANK
    },
    Entry {
        names: &["rxvt", "rxvt-unicode"],
        parent: Some("stratum-ansi-base"),
        flags: &[B::AutoRightMargin, B::BackColorErase, B::EatNewlineGlitch,
                 B::MoveInsertMode, B::MoveStandoutMode],
        strings: &[
            (S::ClearScreen, "\x1b[H\x1b[2J"),
            (S::CursorInvisible, "\x1b[?25l"),
            (S::CursorNormal, "\x1b[?25h"),
            (S::CursorVisible, "\x1b[?25h"),
            (S::EnterAltCharsetMode, "\x0e"),
            (S::ExitAltCharsetMode, "\x0f"),
            (S::EnaAcs, "\x1b(B\x1b)0"),
            (S::AcsChars, VT100_ACSC),
            (S::ExitAttributeMode, "\x1b[m\x0f"),
            (S::EnterCaMode, "\x1b7\x1b[?47h"),
            (S::ExitCaMode, "\x1b[2J\x1b[?47l\x1b8"),
            (S::InsertCharacter, "\x1b[@"),
            (S::KeypadXmit, "\x1b="),
            (S::KeypadLocal, "\x1b>"),
        ],
        cancel: &[S::EraseChars, S::EnterDimMode],
        ..Entry::BLANK
    },
    Entry {
        names: &["rxvt-256color", "rxvt-unicode-256color"],
        parent: Some("rxvt"),
        numbers: COLOR_256,
        strings: &[
            (S::SetAForeground, "\x1b[38;5;%p1%dm"),
            (S::SetABackground, "\x1b[48;5;%p1%dm"),
            (S::EnterItalicsMode, "\x1b[3m"),
            (S::ExitItalicsMode, "\x1b[23m"),
        ],
        ..Entry::BLANK
    },
    Entry {
        names: &["rxvt-16color"],
        parent: Some("rxvt"),
        numbers: &[(N::MaxColors, 16), (N::MaxPairs, 256)],
        strings: &[
            (S::SetAForeground, "%?%p1%{8}%<%t\x1b[%p1%{30}%+%dm%e\x1b[%p1%{82}%+%dm%;"),
            (S::SetABackground, "%?%p1%{8}%<%t\x1b[%p1%{40}%+%dm%e\x1b[%p1%{92}%+%dm%;"),
        ],
        ..Entry::BLANK
    },
    Entry {
        names: &["putty"],
        parent: Some("xterm"),
        strings: &[
            (S::CursorNormal, "\x1b[?25h"),
            (S::CursorVisible, "\x1b[?25h"),
            (S::EnterCaMode, "\x1b[?1049h"),
            (S::ExitCaMode, "\x1b[?1049l"),
            (S::EnterAltCharsetMode, "\x0e"),
            (S::ExitAltCharsetMode, "\x0f"),
            (S::EnaAcs, "\x1b(B\x1b)0"),
            (S::ExitAttributeMode, "\x1b[m\x0f"),
            (S::EnterPcCharsetMode, "\x1b[11m"),
            (S::ExitPcCharsetMode, "\x1b[10m"),
            (S::OrigColors, "\x1b]R"),
            (S::InitializeColor, LINUX_INITC),
        ],
        cancel: &[S::SetAttributes, S::EnterItalicsMode, S::ExitItalicsMode],
        ..Entry::BLANK
    },
    Entry {
        names: &["putty-256color"],
        parent: Some("putty"),
        numbers: COLOR_256,
        strings: COLOR_256_STRINGS,
        ..Entry::BLANK
    },
    Entry {
        names: &["cygwin"],
        parent: Some("stratum-ansi-base"),
        flags: &[B::AutoRightMargin, B::MoveInsertMode, B::MoveStandoutMode],
        strings: &[
            (S::ClearScreen, "\x1b[H\x1b[J"),
            (S::CursorDown, "\x1b[B"),
            (S::EnterAltCharsetMode, "\x1b[11m"),
            (S::ExitAltCharsetMode, "\x1b[10m"),
            (S::EnterPcCharsetMode, "\x1b[11m"),
            (S::ExitPcCharsetMode, "\x1b[10m"),
            (S::AcsChars, PC_ACSC),
            (S::ExitAttributeMode, "\x1b[0;10m"),
            (S::EnterCaMode, "\x1b7\x1b[?47h"),
            (S::ExitCaMode, "\x1b[2J\x1b[?47l\x1b8"),
        ],
        cancel: &[S::BackTab, S::EnterDimMode, S::EnterBlinkMode, S::EraseChars],
        ..Entry::BLANK
    },
    Entry {
        names: &["dumb"],
        flags: &[B::AutoRightMargin],
        numbers: &[(N::Columns, 80)],
        strings: &[
            (S::Bell, "\x07"),
            (S::CarriageReturn, "\r"),
            (S::CursorDown, "\n"),
            (S::ScrollForward, "\n"),
        ],
        ..Entry::BLANK
    },
];

/// Resolve `name` and its parents into a description.
pub(super) fn lookup(name: &str) -> Option<TermInfo> {
    let mut info = resolve(name, 0)?;
    info.names = vec![name.to_string(), "built-in description".to_string()];
    Some(info)
}

/// Names of all built-in descriptions.
#[cfg(test)]
fn all_names() -> impl Iterator<Item = &'static str> {
    ENTRIES.iter().flat_map(|e| e.names.iter().copied())
}

const MAX_DEPTH: usize = 8;

fn resolve(name: &str, depth: usize) -> Option<TermInfo> {
    if depth > MAX_DEPTH {
        return None;
    }
    let entry = ENTRIES.iter().find(|e| e.names.contains(&name))?;
    let mut info = match entry.parent {
        Some(parent) => resolve(parent, depth + 1)?,
        None => TermInfo::default(),
    };
    for &cap in entry.flags {
        info.set_flag(cap, true);
    }
    for &(cap, value) in entry.numbers {
        info.set_number(cap, Some(value));
    }
    for &(cap, value) in entry.strings {
        info.set_string(cap, Some(value));
    }
    for &cap in entry.cancel {
        info.set_string(cap, None);
    }
    Some(info)
}
