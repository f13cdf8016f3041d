// SPDX-License-Identifier: MIT
//
// Output encodings.
//
// The encoding is chosen once at startup and decides how a cell glyph
// becomes bytes on the wire:
//
//   Utf8   the glyph's UTF-8 bytes
//   Vt100  ASCII as is; special glyphs become their DEC graphics key,
//          translated through the terminal's `acsc` pairs and sent while
//          the alternate character set is active; everything else falls
//          back to the ASCII substitute
//   Pc     code page 437 bytes, sent while the PC charset is active
//   Ascii  ASCII as is, substitutes for special glyphs, `?` otherwise
//
// `Encoder::encode` reports which character set a glyph needs. The output
// engine switches sets only when that changes, so a run of line-drawing
// characters costs a single `smacs`/`rmacs` pair.

use std::fmt;
use std::str::FromStr;

use crate::charmap;

// ─── Encoding ────────────────────────────────────────────────────────────────

/// Glyph transmission scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Vt100,
    Pc,
    Ascii,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Utf8 => "UTF8",
            Self::Vt100 => "VT100",
            Self::Pc => "PC",
            Self::Ascii => "ASCII",
        })
    }
}

/// Error for an unrecognised encoding name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown encoding '{0}' (expected utf8, vt100, pc or ascii)")]
pub struct UnknownEncoding(pub String);

impl FromStr for Encoding {
    type Err = UnknownEncoding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(Self::Utf8),
            "vt100" => Ok(Self::Vt100),
            "pc" | "cp437" => Ok(Self::Pc),
            "ascii" => Ok(Self::Ascii),
            _ => Err(UnknownEncoding(s.to_string())),
        }
    }
}

// ─── Encoded glyph ───────────────────────────────────────────────────────────

/// Character set a glyph must be sent in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    Normal,
    /// VT100 alternate character set (`smacs`/`rmacs`).
    Alternate,
    /// PC code page (`smpch`/`rmpch`).
    Pc,
}

/// The bytes for one glyph plus the character set they need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub bytes: Vec<u8>,
    pub charset: Charset,
}

impl Encoded {
    fn normal(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            charset: Charset::Normal,
        }
    }
}

// ─── Encoder ─────────────────────────────────────────────────────────────────

/// Turns glyphs into bytes for the active encoding.
#[derive(Debug, Clone)]
pub struct Encoder {
    encoding: Encoding,
    /// DEC graphics key → byte the terminal wants, from `acsc`.
    acs: [Option<u8>; 128],
}

impl Encoder {
    /// Encoder for `encoding`, using the terminal's `acsc` pairs for the
    /// alternate character set.
    #[must_use]
    pub fn new(encoding: Encoding, acsc: Option<&str>) -> Self {
        let mut acs = [None; 128];
        if let Some(pairs) = acsc {
            let chars: Vec<char> = pairs.chars().collect();
            for pair in chars.chunks_exact(2) {
                let key = u32::from(pair[0]);
                if let (true, Ok(value)) = (key < 128, u8::try_from(u32::from(pair[1]))) {
                    acs[key as usize] = Some(value);
                }
            }
        }
        Self { encoding, acs }
    }

    #[inline]
    #[must_use]
    pub const fn encoding(&self) -> Encoding {
        self.encoding
    }

    /// Map a logical code point to the code point the active encoding
    /// sends. Unmapped code points pass through unchanged.
    #[must_use]
    pub fn char_encode(&self, ch: char) -> char {
        let Some(entry) = charmap::lookup(ch) else {
            return ch;
        };
        match self.encoding {
            Encoding::Utf8 => ch,
            Encoding::Vt100 => entry.vt100.map_or(ch, char::from),
            Encoding::Pc => entry.pc.map_or(ch, charmap::cp437_to_unicode),
            Encoding::Ascii => char::from(entry.ascii),
        }
    }

    /// Bytes and character set for a glyph.
    #[must_use]
    pub fn encode(&self, glyph: &[char]) -> Encoded {
        let Some(&base) = glyph.first() else {
            return Encoded::normal(vec![b' ']);
        };
        match self.encoding {
            Encoding::Utf8 => {
                let mut bytes = Vec::with_capacity(glyph.len() * 4);
                let mut buf = [0u8; 4];
                for &c in glyph {
                    bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                }
                Encoded::normal(bytes)
            }
            Encoding::Vt100 => self.encode_vt100(base),
            Encoding::Pc => Self::encode_pc(base),
            Encoding::Ascii => Encoded::normal(vec![ascii_fallback(base)]),
        }
    }

    /// Bytes for a glyph already given as a DEC graphics key.
    #[must_use]
    pub fn encode_alt_charset(&self, key: char) -> Encoded {
        let byte = u8::try_from(key)
            .ok()
            .filter(|b| *b < 128)
            .and_then(|b| self.acs[usize::from(b)].or(Some(b)))
            .unwrap_or(b' ');
        Encoded {
            bytes: vec![byte],
            charset: Charset::Alternate,
        }
    }

    fn encode_vt100(&self, ch: char) -> Encoded {
        if ch.is_ascii() {
            return Encoded::normal(vec![ch as u8]);
        }
        let key = charmap::lookup(ch).and_then(|m| m.vt100);
        match key.and_then(|k| self.acs[usize::from(k & 0x7f)]) {
            Some(byte) => Encoded {
                bytes: vec![byte],
                charset: Charset::Alternate,
            },
            None => Encoded::normal(vec![ascii_fallback(ch)]),
        }
    }

    fn encode_pc(ch: char) -> Encoded {
        if ch.is_ascii() {
            return Encoded::normal(vec![ch as u8]);
        }
        match charmap::unicode_to_cp437(ch) {
            Some(byte) => Encoded {
                bytes: vec![byte],
                charset: Charset::Pc,
            },
            None => Encoded::normal(vec![ascii_fallback(ch)]),
        }
    }
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new(Encoding::Utf8, None)
    }
}

/// Lossy single-byte rendering of a code point.
fn ascii_fallback(ch: char) -> u8 {
    if ch.is_ascii() {
        return ch as u8;
    }
    charmap::lookup(ch).map_or(b'?', |m| m.ascii)
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const XTERM_ACSC: &str = "``aaffggiijjkkllmmnnooppqqrrssttuuvvwwxxyyzz{{||}}~~";

    fn bytes(enc: &Encoder, ch: char) -> (Vec<u8>, Charset) {
        let e = enc.encode(&[ch]);
        (e.bytes, e.charset)
    }

    #[test]
    fn parse_names() {
        assert_eq!("UTF-8".parse::<Encoding>(), Ok(Encoding::Utf8));
        assert_eq!("vt100".parse::<Encoding>(), Ok(Encoding::Vt100));
        assert_eq!("cp437".parse::<Encoding>(), Ok(Encoding::Pc));
        assert_eq!(" ascii ".parse::<Encoding>(), Ok(Encoding::Ascii));
        assert!("ebcdic".parse::<Encoding>().is_err());
    }

    // ── UTF-8 ────────────────────────────────────────────────────────────

    #[test]
    fn utf8_round_trips_every_scalar_sample() {
        let enc = Encoder::new(Encoding::Utf8, None);
        for ch in ['A', 'é', '─', '中', '😀', '\u{10ffff}'] {
            let (b, cs) = bytes(&enc, ch);
            assert_eq!(cs, Charset::Normal);
            let decoded: Vec<char> = std::str::from_utf8(&b).unwrap().chars().collect();
            assert_eq!(decoded, vec![ch]);
        }
    }

    #[test]
    fn utf8_includes_combining_marks() {
        let enc = Encoder::new(Encoding::Utf8, None);
        let e = enc.encode(&['e', '\u{0301}']);
        assert_eq!(e.bytes, "e\u{0301}".as_bytes());
    }

    // ── VT100 ────────────────────────────────────────────────────────────

    #[test]
    fn vt100_line_drawing_uses_alternate_charset() {
        let enc = Encoder::new(Encoding::Vt100, Some(XTERM_ACSC));
        assert_eq!(bytes(&enc, '─'), (vec![b'q'], Charset::Alternate));
        assert_eq!(bytes(&enc, '┌'), (vec![b'l'], Charset::Alternate));
        assert_eq!(bytes(&enc, 'A'), (vec![b'A'], Charset::Normal));
    }

    #[test]
    fn vt100_honours_terminal_acsc_translation() {
        // A terminal that wants `Q` for the horizontal line.
        let enc = Encoder::new(Encoding::Vt100, Some("qQ"));
        assert_eq!(bytes(&enc, '─'), (vec![b'Q'], Charset::Alternate));
    }

    #[test]
    fn vt100_missing_acs_key_falls_back_to_ascii() {
        let enc = Encoder::new(Encoding::Vt100, Some("qq"));
        assert_eq!(bytes(&enc, '│'), (vec![b'|'], Charset::Normal));
        assert_eq!(bytes(&enc, '中'), (vec![b'?'], Charset::Normal));
    }

    #[test]
    fn acsc_values_may_be_high_bytes() {
        let enc = Encoder::new(Encoding::Vt100, Some("q\u{c4}"));
        assert_eq!(bytes(&enc, '─'), (vec![0xc4], Charset::Alternate));
    }

    #[test]
    fn alt_charset_attribute_glyphs() {
        let enc = Encoder::new(Encoding::Utf8, Some("jX"));
        assert_eq!(enc.encode_alt_charset('j').bytes, vec![b'X']);
        assert_eq!(enc.encode_alt_charset('k').bytes, vec![b'k']);
    }

    // ── PC ───────────────────────────────────────────────────────────────

    #[test]
    fn pc_uses_code_page_bytes() {
        let enc = Encoder::new(Encoding::Pc, None);
        assert_eq!(bytes(&enc, '─'), (vec![0xc4], Charset::Pc));
        assert_eq!(bytes(&enc, '█'), (vec![0xdb], Charset::Pc));
        assert_eq!(bytes(&enc, 'x'), (vec![b'x'], Charset::Normal));
        assert_eq!(bytes(&enc, '中'), (vec![b'?'], Charset::Normal));
    }

    // ── ASCII ────────────────────────────────────────────────────────────

    #[test]
    fn ascii_substitutes_and_loses() {
        let enc = Encoder::new(Encoding::Ascii, None);
        assert_eq!(bytes(&enc, '┼'), (vec![b'+'], Charset::Normal));
        assert_eq!(bytes(&enc, '→'), (vec![b'>'], Charset::Normal));
        assert_eq!(bytes(&enc, 'ß'), (vec![b'?'], Charset::Normal));
    }

    // ── char_encode ──────────────────────────────────────────────────────

    #[test]
    fn char_encode_per_encoding() {
        assert_eq!(Encoder::new(Encoding::Utf8, None).char_encode('─'), '─');
        assert_eq!(Encoder::new(Encoding::Vt100, None).char_encode('─'), 'q');
        assert_eq!(Encoder::new(Encoding::Pc, None).char_encode('─'), '─');
        assert_eq!(Encoder::new(Encoding::Ascii, None).char_encode('─'), '-');
        assert_eq!(Encoder::new(Encoding::Ascii, None).char_encode('Z'), 'Z');
    }

    #[test]
    fn empty_glyph_is_space() {
        let enc = Encoder::default();
        assert_eq!(enc.encode(&[]).bytes, vec![b' ']);
    }
}
