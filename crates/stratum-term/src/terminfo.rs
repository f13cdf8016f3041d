// SPDX-License-Identifier: MIT
//
// Terminfo — compiled capability database reader.
//
// A compiled entry is a small binary file:
//
//   header   six little-endian i16: magic, names size, boolean count,
//            number count, string count, string table size
//   names    `xterm-256color|xterm with 256 colors\0`
//   bools    one byte each, then a pad byte to reach an even offset
//   numbers  i16 each (legacy magic 0o432) or i32 each (magic 0o1036)
//   strings  i16 offsets into the string table, -1 absent, -2 cancelled
//   table    NUL-terminated capability strings
//
// Capabilities are addressed by their fixed position in that layout,
// which the enums below record. Two capabilities (crossed-out on/off)
// have no standard position; they are only ever filled in by the fixups
// in `caps`.
//
// Entries are looked up in the usual directories, in both the
// `x/xterm` and hex `78/xterm` layouts. When the database has no entry
// the built-in descriptions in `builtin` are used. A terminal type that
// is in neither is fatal.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::TermConfig;
use crate::error::{Result, TermError};

mod builtin;

// ─── Capability names ────────────────────────────────────────────────────────

macro_rules! capabilities {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $index:expr, $code:literal; )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )*
        }

        impl $name {
            /// Every capability of this kind.
            pub const ALL: &'static [Self] = &[ $( Self::$variant, )* ];

            /// Position in a compiled terminfo entry.
            #[must_use]
            pub const fn index(self) -> Option<usize> {
                match self {
                    $( Self::$variant => $index, )*
                }
            }

            /// The terminfo short name (`cup`, `am`, `colors`).
            #[must_use]
            pub const fn code(self) -> &'static str {
                match self {
                    $( Self::$variant => $code, )*
                }
            }
        }
    };
}

capabilities! {
    /// Boolean capabilities.
    pub enum BoolCap {
        AutoLeftMargin = Some(0), "bw";
        AutoRightMargin = Some(1), "am";
        EatNewlineGlitch = Some(4), "xenl";
        MoveInsertMode = Some(13), "mir";
        MoveStandoutMode = Some(14), "msgr";
        CanChange = Some(27), "ccc";
        BackColorErase = Some(28), "bce";
    }
}

capabilities! {
    /// Numeric capabilities.
    pub enum NumCap {
        Columns = Some(0), "cols";
        InitTabs = Some(1), "it";
        Lines = Some(2), "lines";
        MaxColors = Some(13), "colors";
        MaxPairs = Some(14), "pairs";
        NoColorVideo = Some(15), "ncv";
    }
}

capabilities! {
    /// String capabilities.
    pub enum StrCap {
        BackTab = Some(0), "cbt";
        Bell = Some(1), "bel";
        CarriageReturn = Some(2), "cr";
        ChangeScrollRegion = Some(3), "csr";
        ClearScreen = Some(5), "clear";
        ClrEol = Some(6), "el";
        ClrEos = Some(7), "ed";
        ColumnAddress = Some(8), "hpa";
        CursorAddress = Some(10), "cup";
        CursorDown = Some(11), "cud1";
        CursorHome = Some(12), "home";
        CursorInvisible = Some(13), "civis";
        CursorLeft = Some(14), "cub1";
        CursorNormal = Some(16), "cnorm";
        CursorRight = Some(17), "cuf1";
        CursorToLl = Some(18), "ll";
        CursorUp = Some(19), "cuu1";
        CursorVisible = Some(20), "cvvis";
        EnterAltCharsetMode = Some(25), "smacs";
        EnterBlinkMode = Some(26), "blink";
        EnterBoldMode = Some(27), "bold";
        EnterCaMode = Some(28), "smcup";
        EnterDimMode = Some(30), "dim";
        EnterInsertMode = Some(31), "smir";
        EnterSecureMode = Some(32), "invis";
        EnterProtectedMode = Some(33), "prot";
        EnterReverseMode = Some(34), "rev";
        EnterStandoutMode = Some(35), "smso";
        EnterUnderlineMode = Some(36), "smul";
        EraseChars = Some(37), "ech";
        ExitAltCharsetMode = Some(38), "rmacs";
        ExitAttributeMode = Some(39), "sgr0";
        ExitCaMode = Some(40), "rmcup";
        ExitInsertMode = Some(42), "rmir";
        ExitStandoutMode = Some(43), "rmso";
        ExitUnderlineMode = Some(44), "rmul";
        InsertCharacter = Some(52), "ich1";
        InsertPadding = Some(54), "ip";
        KeypadLocal = Some(88), "rmkx";
        KeypadXmit = Some(89), "smkx";
        ParmDownCursor = Some(107), "cud";
        ParmIch = Some(108), "ich";
        ParmLeftCursor = Some(111), "cub";
        ParmRightCursor = Some(112), "cuf";
        ParmUpCursor = Some(114), "cuu";
        RestoreCursor = Some(126), "rc";
        RowAddress = Some(127), "vpa";
        SaveCursor = Some(128), "sc";
        ScrollForward = Some(129), "ind";
        ScrollReverse = Some(130), "ri";
        SetAttributes = Some(131), "sgr";
        Tab = Some(134), "ht";
        AcsChars = Some(146), "acsc";
        EnterAmMode = Some(151), "smam";
        ExitAmMode = Some(152), "rmam";
        EnaAcs = Some(155), "enacs";
        ClrBol = Some(269), "el1";
        OrigPair = Some(297), "op";
        OrigColors = Some(298), "oc";
        InitializeColor = Some(299), "initc";
        SetColorPair = Some(301), "scp";
        SetForeground = Some(302), "setf";
        SetBackground = Some(303), "setb";
        EnterItalicsMode = Some(311), "sitm";
        ExitItalicsMode = Some(321), "ritm";
        SetAForeground = Some(359), "setaf";
        SetABackground = Some(360), "setab";
        EnterPcCharsetMode = Some(379), "smpch";
        ExitPcCharsetMode = Some(380), "rmpch";
        EnterCrossedOutMode = None, "smxx";
        ExitCrossedOutMode = None, "rmxx";
    }
}

// ─── TermInfo ────────────────────────────────────────────────────────────────

const MAGIC_LEGACY: i16 = 0o432;
const MAGIC_32BIT: i16 = 0o1036;

/// A decoded terminal description.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermInfo {
    names: Vec<String>,
    bools: Vec<bool>,
    numbers: Vec<Option<i32>>,
    strings: Vec<Option<String>>,
}

impl TermInfo {
    /// An empty description carrying only names.
    #[must_use]
    pub fn with_names(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|n| (*n).to_string()).collect(),
            ..Self::default()
        }
    }

    /// Decode a compiled terminfo entry.
    ///
    /// # Errors
    ///
    /// Returns a short reason when the data is not a valid entry.
    pub fn parse(data: &[u8]) -> std::result::Result<Self, &'static str> {
        let mut r = Reader::new(data);
        let magic = r.i16().ok_or("truncated header")?;
        let number_size = match magic {
            MAGIC_LEGACY => 2,
            MAGIC_32BIT => 4,
            _ => return Err("bad magic number"),
        };
        let mut header = [0usize; 5];
        for slot in &mut header {
            let v = r.i16().ok_or("truncated header")?;
            *slot = usize::try_from(v).map_err(|_| "negative section size")?;
        }
        let [names_size, bool_count, num_count, str_count, table_size] = header;

        let names_raw = r.bytes(names_size).ok_or("truncated names")?;
        let names_end = names_raw.iter().position(|&b| b == 0).unwrap_or(names_raw.len());
        let names = String::from_utf8_lossy(&names_raw[..names_end])
            .split('|')
            .map(str::to_string)
            .collect();

        let bools = r
            .bytes(bool_count)
            .ok_or("truncated booleans")?
            .iter()
            .map(|&b| b == 1)
            .collect();
        if (names_size + bool_count) % 2 == 1 {
            r.bytes(1).ok_or("truncated padding")?;
        }

        let mut numbers = Vec::with_capacity(num_count);
        for _ in 0..num_count {
            let v = if number_size == 2 {
                r.i16().map(i32::from)
            } else {
                r.i32()
            }
            .ok_or("truncated numbers")?;
            numbers.push((v >= 0).then_some(v));
        }

        let mut offsets = Vec::with_capacity(str_count);
        for _ in 0..str_count {
            offsets.push(r.i16().ok_or("truncated string offsets")?);
        }
        let table = r.bytes(table_size).ok_or("truncated string table")?;

        let mut strings = Vec::with_capacity(str_count);
        for off in offsets {
            if off < 0 {
                strings.push(None);
                continue;
            }
            let start = usize::try_from(off).map_err(|_| "bad string offset")?;
            let rest = table.get(start..).ok_or("string offset out of range")?;
            let end = rest.iter().position(|&b| b == 0).ok_or("unterminated string")?;
            strings.push(Some(latin1(&rest[..end])));
        }

        Ok(Self {
            names,
            bools,
            numbers,
            strings,
        })
    }

    /// Find and decode the description for `name`.
    ///
    /// The terminfo directories are searched first, then the built-in
    /// descriptions.
    ///
    /// # Errors
    ///
    /// [`TermError::UnknownTerminal`] when no description exists,
    /// [`TermError::BadTerminfo`] when a database file is corrupt.
    pub fn load(name: &str, config: &TermConfig) -> Result<Self> {
        for dir in search_dirs(config) {
            if let Some(path) = entry_path(&dir, name) {
                let data = fs::read(&path)?;
                let info = Self::parse(&data)
                    .map_err(|reason| TermError::BadTerminfo { path: path.clone(), reason })?;
                tracing::debug!(terminal = name, path = %path.display(), "loaded terminfo entry");
                return Ok(info);
            }
        }
        if let Some(info) = Self::builtin(name) {
            tracing::debug!(terminal = name, "using built-in terminal description");
            return Ok(info);
        }
        tracing::error!(terminal = name, "no terminal description found");
        Err(TermError::UnknownTerminal {
            name: name.to_string(),
        })
    }

    /// The built-in description for `name`, if there is one.
    #[must_use]
    pub fn builtin(name: &str) -> Option<Self> {
        builtin::lookup(name)
    }

    /// Primary terminal name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.names.first().map_or("", String::as_str)
    }

    /// All names, the last usually being a description.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn flag(&self, cap: BoolCap) -> bool {
        cap.index()
            .and_then(|i| self.bools.get(i))
            .copied()
            .unwrap_or(false)
    }

    #[must_use]
    pub fn number(&self, cap: NumCap) -> Option<i32> {
        cap.index().and_then(|i| self.numbers.get(i)).copied().flatten()
    }

    #[must_use]
    pub fn string(&self, cap: StrCap) -> Option<&str> {
        cap.index()
            .and_then(|i| self.strings.get(i))
            .and_then(Option::as_deref)
    }

    pub fn set_flag(&mut self, cap: BoolCap, value: bool) {
        if let Some(i) = cap.index() {
            grow(&mut self.bools, i);
            self.bools[i] = value;
        }
    }

    pub fn set_number(&mut self, cap: NumCap, value: Option<i32>) {
        if let Some(i) = cap.index() {
            grow(&mut self.numbers, i);
            self.numbers[i] = value;
        }
    }

    pub fn set_string(&mut self, cap: StrCap, value: Option<&str>) {
        if let Some(i) = cap.index() {
            grow(&mut self.strings, i);
            self.strings[i] = value.map(str::to_string);
        }
    }
}

/// Capability strings are byte strings; each byte becomes the code point
/// of the same value so nothing is lost on the way back out.
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Bytes of a capability string built by [`latin1`]. Code points above
/// 0xff (only possible in hand-written strings) are sent as UTF-8.
#[must_use]
pub fn cap_bytes(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(s.len());
    for ch in s.chars() {
        match u8::try_from(u32::from(ch)) {
            Ok(b) => out.push(b),
            Err(_) => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out
}

fn grow<T: Default + Clone>(v: &mut Vec<T>, index: usize) {
    if v.len() <= index {
        v.resize(index + 1, T::default());
    }
}

// ─── Database search ─────────────────────────────────────────────────────────

const SYSTEM_DIRS: [&str; 4] = [
    "/etc/terminfo",
    "/lib/terminfo",
    "/usr/share/terminfo",
    "/usr/lib/terminfo",
];

/// Directories searched for compiled entries, in order.
#[must_use]
pub fn search_dirs(config: &TermConfig) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Some(dir) = &config.terminfo {
        dirs.push(PathBuf::from(dir));
    }
    if let Some(home) = &config.home {
        dirs.push(Path::new(home).join(".terminfo"));
    }
    if let Some(list) = &config.terminfo_dirs {
        for dir in list.split(':') {
            if dir.is_empty() {
                dirs.push(PathBuf::from("/usr/share/terminfo"));
            } else {
                dirs.push(PathBuf::from(dir));
            }
        }
    }
    dirs.extend(SYSTEM_DIRS.iter().map(PathBuf::from));
    dirs
}

/// Path of the entry for `name` inside `dir`, if a file exists there.
fn entry_path(dir: &Path, name: &str) -> Option<PathBuf> {
    let first = name.chars().next()?;
    if name.contains('/') {
        return None;
    }
    let by_char = dir.join(first.to_string()).join(name);
    if by_char.is_file() {
        return Some(by_char);
    }
    let by_hex = dir.join(format!("{:02x}", u32::from(first))).join(name);
    by_hex.is_file().then_some(by_hex)
}

// ─── Byte reader ─────────────────────────────────────────────────────────────

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    const fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn bytes(&mut self, n: usize) -> Option<&'a [u8]> {
        let slice = self.data.get(self.pos..self.pos.checked_add(n)?)?;
        self.pos += n;
        Some(slice)
    }

    fn i16(&mut self) -> Option<i16> {
        self.bytes(2).map(|b| i16::from_le_bytes([b[0], b[1]]))
    }

    fn i32(&mut self) -> Option<i32> {
        self.bytes(4).map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
