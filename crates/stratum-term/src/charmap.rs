// SPDX-License-Identifier: MIT
//
// Character maps — logical glyphs per output encoding.
//
// Widgets draw with Unicode: box drawing, blocks, arrows, a few math
// symbols. Terminals that are not in UTF-8 mode cannot show those code
// points directly, so each special glyph carries a substitute for every
// other encoding:
//
//   VT100  the DEC special graphics key (`q` is a horizontal line) that
//          selects the glyph once the alternate character set is active;
//          the terminal's own `acsc` capability then says which byte it
//          really wants for that key
//   PC     the code page 437 byte
//   ASCII  a lossy approximation (`+`, `-`, `|`, `#`, ...)
//
// Code points without an entry pass through unchanged.

// ─── Substitution table ──────────────────────────────────────────────────────

/// One special glyph and its substitutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharMapping {
    pub unicode: char,
    /// DEC special graphics key, if the glyph exists there.
    pub vt100: Option<u8>,
    /// Code page 437 byte.
    pub pc: Option<u8>,
    pub ascii: u8,
}

const fn map(unicode: char, vt100: u8, pc: u8, ascii: u8) -> CharMapping {
    CharMapping {
        unicode,
        vt100: if vt100 == 0 { None } else { Some(vt100) },
        pc: if pc == 0 { None } else { Some(pc) },
        ascii,
    }
}

#[rustfmt::skip]
pub const CHAR_MAP: &[CharMapping] = &[
    map('\u{20ac}', 0,    0xee, b'E'), // € euro (epsilon in cp437)
    map('\u{25c6}', b'`', 0x04, b'*'), // ◆ diamond
    map('\u{2592}', b'a', 0xb1, b'#'), // ▒ medium shade
    map('\u{2409}', b'b', 0,    b'_'), // ␉ HT symbol
    map('\u{240c}', b'c', 0,    b'_'), // ␌ FF symbol
    map('\u{240d}', b'd', 0,    b'_'), // ␍ CR symbol
    map('\u{240a}', b'e', 0,    b'_'), // ␊ LF symbol
    map('\u{00b0}', b'f', 0xf8, b'o'), // ° degree
    map('\u{00b1}', b'g', 0xf1, b'#'), // ± plus-minus
    map('\u{2424}', b'h', 0,    b'#'), // ␤ NL symbol
    map('\u{240b}', b'i', 0,    b'_'), // ␋ VT symbol
    map('\u{2518}', b'j', 0xd9, b'+'), // ┘
    map('\u{2510}', b'k', 0xbf, b'+'), // ┐
    map('\u{250c}', b'l', 0xda, b'.'), // ┌
    map('\u{2514}', b'm', 0xc0, b'`'), // └
    map('\u{253c}', b'n', 0xc5, b'+'), // ┼
    map('\u{23ba}', b'o', 0,    b'~'), // ⎺ scan line 1
    map('\u{23bb}', b'p', 0,    b'-'), // ⎻ scan line 3
    map('\u{2500}', b'q', 0xc4, b'-'), // ─
    map('\u{23bc}', b'r', 0,    b'-'), // ⎼ scan line 7
    map('\u{23bd}', b's', b'_', b'_'), // ⎽ scan line 9
    map('\u{251c}', b't', 0xc3, b'+'), // ├
    map('\u{2524}', b'u', 0xb4, b'+'), // ┤
    map('\u{2534}', b'v', 0xc1, b'+'), // ┴
    map('\u{252c}', b'w', 0xc2, b'+'), // ┬
    map('\u{2502}', b'x', 0xb3, b'|'), // │
    map('\u{2264}', b'y', 0xf3, b'<'), // ≤
    map('\u{2265}', b'z', 0xf2, b'>'), // ≥
    map('\u{03c0}', b'{', 0xe3, b'n'), // π
    map('\u{2260}', b'|', 0,    b'!'), // ≠
    map('\u{00a3}', b'}', 0x9c, b'E'), // £
    map('\u{00b7}', b'~', 0xfa, b'.'), // · middle dot
    map('\u{2192}', b'+', 0x1a, b'>'), // → arrow right
    map('\u{2190}', b',', 0x1b, b'<'), // ← arrow left
    map('\u{2191}', b'-', 0x18, b'^'), // ↑ arrow up
    map('\u{2193}', b'.', 0x19, b'v'), // ↓ arrow down
    map('\u{25ba}', b'+', 0x10, b'>'), // ► pointer right
    map('\u{25c4}', b',', 0x11, b'<'), // ◄ pointer left
    map('\u{25b2}', b'-', 0x1e, b'^'), // ▲ triangle up
    map('\u{25bc}', b'.', 0x1f, b'v'), // ▼ triangle down
    map('\u{2588}', b'0', 0xdb, b'#'), // █ full block
    map('\u{2593}', 0,    0xb2, b'#'), // ▓ dark shade
    map('\u{2591}', 0,    0xb0, b'#'), // ░ light shade
    map('\u{2580}', 0,    0xdf, b'~'), // ▀ upper half block
    map('\u{2584}', 0,    0xdc, b'_'), // ▄ lower half block
    map('\u{258c}', 0,    0xdd, b' '), // ▌ left half block
    map('\u{2590}', 0,    0xde, b' '), // ▐ right half block
    map('\u{2550}', 0,    0xcd, b'='), // ═
    map('\u{2551}', 0,    0xba, b'"'), // ║
    map('\u{2554}', 0,    0xc9, b'+'), // ╔
    map('\u{2557}', 0,    0xbb, b'+'), // ╗
    map('\u{255a}', 0,    0xc8, b'+'), // ╚
    map('\u{255d}', 0,    0xbc, b'+'), // ╝
    map('\u{2022}', b'`', 0x07, b'*'), // • bullet
    map('\u{25cf}', b'`', 0x09, b'*'), // ● black circle
    map('\u{25a0}', 0,    0xfe, b'#'), // ■ black square
    map('\u{2666}', b'`', 0x04, b'*'), // ♦ diamond suit
    map('\u{2713}', 0,    0xfb, b'v'), // ✓ check mark
    map('\u{00bd}', 0,    0xab, b'%'), // ½
    map('\u{00bc}', 0,    0xac, b'%'), // ¼
    map('\u{00a7}', 0,    0x15, b'$'), // § section
    map('\u{00b6}', 0,    0x14, b'P'), // ¶ pilcrow
];

/// The table entry for `ch`, if it is a special glyph.
#[must_use]
pub fn lookup(ch: char) -> Option<&'static CharMapping> {
    CHAR_MAP.iter().find(|m| m.unicode == ch)
}

// ─── Code page 437 ───────────────────────────────────────────────────────────

/// Upper half (0x80..=0xff) of code page 437.
#[rustfmt::skip]
const CP437_HIGH: [char; 128] = [
    'Ç', 'ü', 'é', 'â', 'ä', 'à', 'å', 'ç', 'ê', 'ë', 'è', 'ï', 'î', 'ì', 'Ä', 'Å',
    'É', 'æ', 'Æ', 'ô', 'ö', 'ò', 'û', 'ù', 'ÿ', 'Ö', 'Ü', '¢', '£', '¥', '₧', 'ƒ',
    'á', 'í', 'ó', 'ú', 'ñ', 'Ñ', 'ª', 'º', '¿', '⌐', '¬', '½', '¼', '¡', '«', '»',
    '░', '▒', '▓', '│', '┤', '╡', '╢', '╖', '╕', '╣', '║', '╗', '╝', '╜', '╛', '┐',
    '└', '┴', '┬', '├', '─', '┼', '╞', '╟', '╚', '╔', '╩', '╦', '╠', '═', '╬', '╧',
    '╨', '╤', '╥', '╙', '╘', '╒', '╓', '╫', '╪', '┘', '┌', '█', '▄', '▌', '▐', '▀',
    'α', 'ß', 'Γ', 'π', 'Σ', 'σ', 'µ', 'τ', 'Φ', 'Θ', 'Ω', 'δ', '∞', 'φ', 'ε', '∩',
    '≡', '±', '≥', '≤', '⌠', '⌡', '÷', '≈', '°', '∙', '·', '√', 'ⁿ', '²', '■', '\u{a0}',
];

/// Glyphs code page 437 puts in the control range.
#[rustfmt::skip]
const CP437_LOW: [(u8, char); 20] = [
    (0x01, '☺'), (0x02, '☻'), (0x03, '♥'), (0x04, '♦'), (0x05, '♣'),
    (0x06, '♠'), (0x07, '•'), (0x08, '◘'), (0x09, '○'), (0x0a, '◙'),
    (0x0b, '♂'), (0x0c, '♀'), (0x0e, '♫'), (0x0f, '☼'), (0x10, '►'),
    (0x11, '◄'), (0x12, '↕'), (0x18, '↑'), (0x19, '↓'), (0x1e, '▲'),
];

/// Unicode code point shown for a code page 437 byte.
#[must_use]
pub fn cp437_to_unicode(byte: u8) -> char {
    if byte >= 0x80 {
        return CP437_HIGH[usize::from(byte - 0x80)];
    }
    CP437_LOW
        .iter()
        .find(|(b, _)| *b == byte)
        .map_or(char::from(byte), |&(_, c)| c)
}

/// Code page 437 byte for a Unicode code point, if the code page has it.
#[must_use]
pub fn unicode_to_cp437(ch: char) -> Option<u8> {
    if ch.is_ascii() && !ch.is_ascii_control() {
        return Some(ch as u8);
    }
    if let Some(pc) = lookup(ch).and_then(|m| m.pc) {
        return Some(pc);
    }
    if let Some(pos) = CP437_HIGH.iter().position(|&c| c == ch) {
        return Some(0x80 + pos as u8);
    }
    CP437_LOW.iter().find(|(_, c)| *c == ch).map(|&(b, _)| b)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_no_duplicate_code_points() {
        for (i, a) in CHAR_MAP.iter().enumerate() {
            for b in &CHAR_MAP[i + 1..] {
                assert_ne!(a.unicode, b.unicode, "duplicate {:?}", a.unicode);
            }
        }
    }

    #[test]
    fn box_drawing_substitutes() {
        let h = lookup('─').unwrap();
        assert_eq!(h.vt100, Some(b'q'));
        assert_eq!(h.pc, Some(0xc4));
        assert_eq!(h.ascii, b'-');

        let corner = lookup('┌').unwrap();
        assert_eq!(corner.vt100, Some(b'l'));
        assert_eq!(corner.pc, Some(0xda));
    }

    #[test]
    fn unmapped_code_points_have_no_entry() {
        assert!(lookup('A').is_none());
        assert!(lookup('中').is_none());
    }

    #[test]
    fn ascii_substitutes_are_printable_ascii() {
        for m in CHAR_MAP {
            assert!(m.ascii.is_ascii_graphic() || m.ascii == b' ', "{:?}", m.unicode);
        }
    }

    // ── Code page 437 ────────────────────────────────────────────────────

    #[test]
    fn cp437_round_trip_high_half() {
        for byte in 0x80..=0xffu8 {
            let ch = cp437_to_unicode(byte);
            assert_eq!(unicode_to_cp437(ch), Some(byte), "byte {byte:#x}");
        }
    }

    #[test]
    fn cp437_ascii_is_identity() {
        assert_eq!(cp437_to_unicode(b'A'), 'A');
        assert_eq!(unicode_to_cp437('A'), Some(b'A'));
    }

    #[test]
    fn cp437_low_glyphs() {
        assert_eq!(cp437_to_unicode(0x10), '►');
        assert_eq!(unicode_to_cp437('↑'), Some(0x18));
    }

    #[test]
    fn table_pc_bytes_agree_with_code_page() {
        for m in CHAR_MAP {
            if let Some(pc) = m.pc {
                if pc >= 0x80 && !matches!(m.unicode, '€' | '·' | '✓') {
                    assert_eq!(cp437_to_unicode(pc), m.unicode, "{:?}", m.unicode);
                }
            }
        }
    }
}
