// SPDX-License-Identifier: MIT
//
// stratum-vterm — window compositor of stratum.
//
// Widgets draw into areas: the desktop at the bottom, windows stacked
// above it, child areas pulled into their windows by preprocessing
// handlers. A composite pass merges every changed area into the virtual
// terminal, honoring what each layer hides or lets through (opaque cells,
// transparent cells, tinted drop shadows, inherited backgrounds), and the
// output engine of `stratum-term` sends the result to the screen.
//
//   let mut ui = Compositor::new(&profile, size, baud, io::stdout())?;
//   let win = ui.create_area(Rect::new(4, 2, 30, 8), Size::new(2, 1))?;
//   ui.insert_window(win)?;
//   ui.print_str(win, "hello")?;
//   ui.process_terminal_update()?;

pub mod attribute;
pub mod compositor;
pub mod error;
pub mod print;

pub use attribute::TextStyle;
pub use compositor::{AreaId, Compositor, Coverage, Preprocessor, TerminalUpdates};
pub use error::AreaError;
