// SPDX-License-Identifier: MIT
//
// stratum — demo driver for the layered terminal compositor.
//
// Wires the two crates together on the real terminal:
//
//   stratum-term  → detection, capabilities, raw mode, signals, output
//   stratum-vterm → areas, window stack, compositing
//
// The screen is a patterned desktop, two windows with drop shadows and a
// status line. One window drifts across the desktop so that every pass
// exercises coverage, shadow tinting and region restore. Resizing the
// terminal rebuilds the layout; SIGINT/SIGTERM/SIGQUIT end the demo.
//
// Trace output goes to the file named by STRATUM_LOG, filtered by
// RUST_LOG. Nothing is logged to the terminal being drawn.
//
//   ┌──────────────────────────────────────┐
//   │ desktop pattern                      │
//   │   ┌────────────┐                     │
//   │   │ window     │▒▒     ┌──────────┐  │
//   │   └────────────┘▒▒     │ drifting │▒▒│
//   │     ▒▒▒▒▒▒▒▒▒▒▒▒▒▒     └──────────┘▒▒│
//   ├──────────────────────────────────────┤
//   │ status line                          │
//   └──────────────────────────────────────┘

use std::fs::File;
use std::io::{self, Stdout};
use std::process;
use std::sync::Arc;
use std::time::Duration;

use stratum_term::signal::{SignalWatcher, TermSignal};
use stratum_term::terminal::{self, Terminal, TtyProbe};
use stratum_term::{Color, Point, Rect, Size, TermConfig, TermProfile};
use stratum_vterm::{AreaError, AreaId, Compositor};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Interval between animation steps.
const TICK: Duration = Duration::from_millis(120);

/// Shadow margins of the demo windows: two columns, one row.
const SHADOW: Size = Size::new(2, 1);

type Ui = Compositor<Stdout>;

// ─── Logging ────────────────────────────────────────────────────────────────

/// Install the file logger when `STRATUM_LOG` names a writable file.
fn init_logging(config: &TermConfig) {
    let Some(path) = config.log_file.as_deref() else {
        return;
    };
    let file = match File::create(path) {
        Ok(file) => file,
        Err(e) => {
            eprintln!("stratum: cannot open log file {path}: {e}");
            return;
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let layer = fmt::layer().with_writer(Arc::new(file)).with_ansi(false);
    let _ = tracing_subscriber::registry().with(layer).with(filter).try_init();
}

// ─── Layout ─────────────────────────────────────────────────────────────────

/// Screen regions for a terminal of `size`, all 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Layout {
    about: Rect,
    drifter: Rect,
    status: Rect,
}

impl Layout {
    fn new(size: Size) -> Self {
        let body = size.height.saturating_sub(1);
        let about = Rect::new(2, 1, (size.width / 2).clamp(1, 36), (body / 2).clamp(1, 7));
        let drifter = Rect::new(0, i32_of(body / 2 + 1), 16.min(size.width.max(1)), 4.min(body.max(1)));
        let status = Rect::new(0, i32_of(body), size.width.max(1), 1);
        Self {
            about,
            drifter,
            status,
        }
    }

    /// Column of the drifting window at animation step `tick`: left to
    /// right and back.
    fn drift_x(&self, size: Size, tick: usize) -> i32 {
        let span = size.width.saturating_sub(self.drifter.width + SHADOW.width);
        if span == 0 {
            return 0;
        }
        let phase = tick % (2 * span);
        i32_of(if phase < span { phase } else { 2 * span - phase })
    }
}

fn i32_of(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

fn status_text(size: Size, tick: usize, encoding: stratum_term::Encoding) -> String {
    format!(" stratum  {}x{}  {encoding:?}  frame {tick}  ^C quits", size.width, size.height)
}

// ─── Scene ──────────────────────────────────────────────────────────────────

struct Scene {
    about: AreaId,
    drifter: AreaId,
    status: AreaId,
    layout: Layout,
    tick: usize,
}

/// Paint the desktop with a light dot pattern.
fn paint_desktop(ui: &mut Ui) -> Result<(), AreaError> {
    let desktop = ui.desktop();
    ui.style_mut().set_normal();
    ui.style_mut().set_color(Color::DARK_GRAY, Color::BLUE);
    ui.clear_area(desktop, ' ')?;
    let size = ui.vterm().size();
    for y in (0..size.height).step_by(2) {
        let row: String = (0..size.width).map(|x| if (x + y) % 4 == 0 { '·' } else { ' ' }).collect();
        ui.set_cursor(desktop, Point::new(1, i32_of(y) + 1))?;
        // The last row may run into the end of the desktop.
        match ui.print_str(desktop, &row) {
            Ok(_) | Err(AreaError::EndOfArea(_)) => {}
            Err(e) => return Err(e),
        }
    }
    ui.style_mut().set_normal();
    Ok(())
}

/// Window with a drop shadow: opaque body, dark overlay margins on the
/// right and bottom, transparent corners.
fn shadowed_window(ui: &mut Ui, bounds: Rect, fg: Color, bg: Color) -> Result<AreaId, AreaError> {
    let id = ui.create_area(bounds, SHADOW)?;
    ui.style_mut().set_normal();
    ui.style_mut().set_color(fg, bg);
    ui.clear_area(id, ' ')?;

    ui.style_mut().set_color(Color::DARK_GRAY, Color::BLACK);
    ui.style_mut().set_color_overlay(true);
    let shade = ui.style().cell(' ');
    ui.style_mut().set_normal();

    let area = ui.area_mut(id).ok_or(AreaError::UnknownArea(id))?;
    let (w, h) = (area.width(), area.height());
    for y in 1..area.full_height() {
        for x in w..area.full_width() {
            area.put_cell(x, y, &shade);
        }
    }
    for x in SHADOW.width..w {
        area.put_cell(x, h, &shade);
    }
    area.recount_transparency();
    area.has_changes = true;

    ui.set_visible(id, true)?;
    ui.insert_window(id)?;
    Ok(id)
}

fn print_lines(ui: &mut Ui, id: AreaId, lines: &[&str]) -> Result<(), AreaError> {
    let origin = ui.area(id).ok_or(AreaError::UnknownArea(id))?.offset();
    for (row, line) in lines.iter().enumerate() {
        ui.set_cursor(id, Point::new(origin.x + 2, origin.y + i32_of(row) + 1))?;
        match ui.print_str(id, line) {
            Ok(_) | Err(AreaError::EndOfArea(_)) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

impl Scene {
    fn build(ui: &mut Ui) -> Result<Self, AreaError> {
        let size = ui.vterm().size();
        let layout = Layout::new(size);
        paint_desktop(ui)?;

        let about = shadowed_window(ui, layout.about, Color::BLACK, Color::LIGHT_GRAY)?;
        print_lines(ui, about, &["stratum", "", "windows, shadows and", "a virtual terminal"])?;

        let drifter = shadowed_window(ui, layout.drifter, Color::WHITE, Color::CYAN)?;
        print_lines(ui, drifter, &["drifting", "window 日本"])?;

        let status = ui.create_area(layout.status, Size::default())?;
        ui.set_visible(status, true)?;
        ui.insert_window(status)?;

        let scene = Self {
            about,
            drifter,
            status,
            layout,
            tick: 0,
        };
        scene.draw_status(ui)?;
        ui.set_active_area(about)?;
        Ok(scene)
    }

    /// Remove every window, leaving the desktop.
    fn tear_down(&self, ui: &mut Ui) -> Result<(), AreaError> {
        for id in [self.status, self.drifter, self.about] {
            ui.remove_area(id)?;
        }
        Ok(())
    }

    fn draw_status(&self, ui: &mut Ui) -> Result<(), AreaError> {
        let size = ui.vterm().size();
        let text = status_text(size, self.tick, ui.output().encoding());
        ui.style_mut().set_color(Color::BLACK, Color::LIGHT_GRAY);
        ui.clear_area(self.status, ' ')?;
        ui.set_cursor(self.status, Point::new(1, self.layout.status.y + 1))?;
        let printed = ui.print_str(self.status, &text);
        ui.style_mut().set_normal();
        match printed {
            Ok(_) | Err(AreaError::EndOfArea(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn step(&mut self, ui: &mut Ui) -> Result<(), AreaError> {
        self.tick += 1;
        let size = ui.vterm().size();
        let x = self.layout.drift_x(size, self.tick);
        ui.move_area(self.drifter, Point::new(x, self.layout.drifter.y))?;
        self.draw_status(ui)
    }
}

// ─── Main loop ──────────────────────────────────────────────────────────────

fn run() -> Result<(), AreaError> {
    let config = TermConfig::from_env();
    init_logging(&config);

    let mut term = Terminal::new()?;
    term.enter()?;
    let profile = TermProfile::probe(&config, &mut TtyProbe::default())?;
    tracing::debug!(name = profile.name(), encoding = ?profile.encoding, "terminal profile");
    // Still single-threaded here: the signal watcher starts below.
    terminal::export_term(profile.name());

    let signals = SignalWatcher::new()?;
    let mut ui = Compositor::new(&profile, term.size(), terminal::baud_rate(), io::stdout())?;
    ui.init_terminal()?;
    let mut scene = Scene::build(&mut ui)?;
    ui.force_terminal_update()?;

    'frames: loop {
        match signals.recv_timeout(TICK) {
            Some(TermSignal::Resize) => {
                ui.notify_resize();
                let size = term.refresh_size();
                scene.tear_down(&mut ui)?;
                ui.resize_terminal(size)?;
                scene = Scene::build(&mut ui)?;
            }
            Some(signal) if signal.is_termination() => {
                tracing::debug!(?signal, "shutting down");
                break 'frames;
            }
            _ => scene.step(&mut ui)?,
        }
        ui.process_terminal_update()?;
    }

    ui.finish()?;
    term.leave()?;
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("stratum: {e}");
        process::exit(1);
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn layout_keeps_the_status_line_at_the_bottom() {
        let layout = Layout::new(Size::new(80, 24));
        assert_eq!(layout.status, Rect::new(0, 23, 80, 1));
        assert_eq!(layout.about, Rect::new(2, 1, 36, 7));
        assert_eq!(layout.drifter.y, 12);
    }

    #[test]
    fn layout_survives_a_tiny_terminal() {
        let layout = Layout::new(Size::new(1, 1));
        assert_eq!(layout.status, Rect::new(0, 0, 1, 1));
        assert_eq!(layout.about.width, 1);
        assert_eq!(layout.drift_x(Size::new(1, 1), 7), 0);
    }

    #[test]
    fn drift_bounces_between_the_edges() {
        let size = Size::new(28, 10);
        let layout = Layout::new(size);
        // span = 28 - 16 - 2
        let xs: Vec<i32> = [0, 5, 10, 15, 20].iter().map(|&t| layout.drift_x(size, t)).collect();
        assert_eq!(xs, vec![0, 5, 10, 5, 0]);
    }

    #[test]
    fn status_names_size_and_frame() {
        let text = status_text(Size::new(100, 30), 42, stratum_term::Encoding::Utf8);
        assert!(text.contains("100x30"));
        assert!(text.contains("frame 42"));
    }
}
