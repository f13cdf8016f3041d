// SPDX-License-Identifier: MIT
//
// stratum-term — terminal layer of the stratum compositor.
//
// Everything between a grid of character cells and the bytes a real
// terminal needs to show it. The terminal is identified from the
// environment and a couple of startup probes, its capabilities are read
// from the terminfo database (or a built-in description), and glyphs are
// encoded for whatever the terminal can display: UTF-8, the VT100
// graphics set, the PC code page or plain ASCII.
//
// Drawing happens in cell buffers (`TermArea`) that remember which
// columns of each row changed. The output engine walks those ranges and
// sends only the attribute, color and cursor changes the terminal does
// not already have, picking the cheapest cursor motion the capabilities
// allow. Bytes are queued and written in large chunks.
//
// The crate talks to the terminal through termios and a handful of
// ioctls directly, and to everything else through `std::io::Write`.

pub mod area;
pub mod caps;
pub mod cell;
pub mod charmap;
pub mod color;
pub mod config;
pub mod detect;
pub mod encoding;
pub mod error;
pub mod geometry;
pub mod optimize;
pub mod output;
pub mod painter;
pub mod param;
pub mod profile;
pub mod signal;
pub mod terminal;
pub mod terminfo;

pub use area::{LineChanges, TermArea};
pub use cell::{Attr, Cell, CellFlags};
pub use color::Color;
pub use config::TermConfig;
pub use encoding::Encoding;
pub use error::{EndOfArea, TermError};
pub use geometry::{Point, Rect, Size};
pub use painter::TermOutput;
pub use profile::TermProfile;
