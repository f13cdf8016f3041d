// SPDX-License-Identifier: MIT
//
// Terminal device control: raw mode, size and line speed queries, startup
// probes, and RAII cleanup.
//
// Safety: This module necessarily uses `unsafe` for termios (tcgetattr,
// tcsetattr, cfgetospeed), ioctl (TIOCGWINSZ), isatty, poll, and raw fd
// reads and writes. These are the standard POSIX interfaces for terminal
// control. Each unsafe block is minimal.
#![allow(unsafe_code)]
//
// Escape sequences that set up the screen (alternate screen, keypad mode,
// cursor visibility) come from the terminal description and are sent by
// the output engine. This module owns only the device state underneath:
// the termios settings. They are restored on drop and, through a panic
// hook, when the program panics while drawing. The hook writes a fixed
// restore sequence straight to fd 1 so a panic while stdout is locked
// cannot deadlock.

use std::io::{self, Write};
use std::sync::{Mutex, Once};
use std::time::{Duration, Instant};

use crate::detect::TerminalProbe;
use crate::geometry::Size;

/// Used when the size cannot be queried.
pub const FALLBACK_SIZE: Size = Size::new(80, 24);

// ─── Terminal queries ───────────────────────────────────────────────────────

/// Query the current terminal size via `ioctl(TIOCGWINSZ)`.
///
/// Returns `None` if stdout is not a terminal or the query fails.
#[cfg(unix)]
#[must_use]
pub fn get_size() -> Option<Size> {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let result = unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &mut ws) };

    if result == 0 && ws.ws_col > 0 && ws.ws_row > 0 {
        Some(Size::new(usize::from(ws.ws_col), usize::from(ws.ws_row)))
    } else {
        None
    }
}

#[cfg(not(unix))]
#[must_use]
pub fn get_size() -> Option<Size> {
    None
}

/// Check whether stdin is connected to a terminal (TTY).
#[cfg(unix)]
#[must_use]
pub fn is_tty() -> bool {
    unsafe { libc::isatty(libc::STDIN_FILENO) != 0 }
}

#[cfg(not(unix))]
#[must_use]
pub fn is_tty() -> bool {
    false
}

/// Output line speed of the terminal in bits per second, 0 when unknown.
/// Pseudo terminals usually report 38400.
#[cfg(unix)]
#[must_use]
pub fn baud_rate() -> u32 {
    let mut termios: libc::termios = unsafe { std::mem::zeroed() };
    if unsafe { libc::tcgetattr(libc::STDOUT_FILENO, &raw mut termios) } != 0 {
        return 0;
    }
    let speed = unsafe { libc::cfgetospeed(&raw const termios) };
    speed_to_baud(speed)
}

#[cfg(not(unix))]
#[must_use]
pub fn baud_rate() -> u32 {
    0
}

#[cfg(unix)]
fn speed_to_baud(speed: libc::speed_t) -> u32 {
    const TABLE: &[(libc::speed_t, u32)] = &[
        (libc::B50, 50),
        (libc::B75, 75),
        (libc::B110, 110),
        (libc::B134, 134),
        (libc::B150, 150),
        (libc::B200, 200),
        (libc::B300, 300),
        (libc::B600, 600),
        (libc::B1200, 1200),
        (libc::B1800, 1800),
        (libc::B2400, 2400),
        (libc::B4800, 4800),
        (libc::B9600, 9600),
        (libc::B19200, 19200),
        (libc::B38400, 38400),
        (libc::B57600, 57600),
        (libc::B115200, 115_200),
        (libc::B230400, 230_400),
    ];
    TABLE
        .iter()
        .find(|(s, _)| *s == speed)
        .map_or(0, |(_, baud)| *baud)
}

/// Publish the detected terminal type as `TERM` for child processes.
///
/// Must be called before any other thread is started, since the process
/// environment is not synchronized.
pub fn export_term(name: &str) {
    if std::env::var("TERM").is_ok_and(|t| t == name) {
        return;
    }
    tracing::debug!(term = name, "exporting TERM");
    // SAFETY: single-threaded startup; see the function documentation.
    unsafe { std::env::set_var("TERM", name) };
}

// ─── Probe ───────────────────────────────────────────────────────────────────

/// Queries the real terminal on stdout/stdin.
///
/// Only meaningful in raw mode: a cooked terminal holds the reply back
/// until a newline arrives.
#[derive(Debug, Clone, Copy)]
pub struct TtyProbe {
    /// Quiet time after the last received byte that ends a reply.
    pub settle: Duration,
}

impl Default for TtyProbe {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(20),
        }
    }
}

impl TerminalProbe for TtyProbe {
    fn query(&mut self, request: &[u8], timeout: Duration) -> Option<Vec<u8>> {
        if !is_tty() {
            return None;
        }
        let mut out = io::stdout().lock();
        if let Err(err) = out.write_all(request).and_then(|()| out.flush()) {
            tracing::warn!(%err, "terminal probe could not be sent");
            return None;
        }
        drop(out);

        let deadline = Instant::now() + timeout;
        let mut reply = Vec::new();
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let wait = if reply.is_empty() {
                deadline - now
            } else {
                self.settle.min(deadline - now)
            };
            match read_stdin(wait) {
                Ok(Some(bytes)) => reply.extend_from_slice(&bytes),
                Ok(None) if reply.is_empty() => continue,
                Ok(None) => break,
                Err(err) => {
                    tracing::warn!(%err, "terminal probe reply could not be read");
                    break;
                }
            }
        }
        (!reply.is_empty()).then_some(reply)
    }
}

/// Wait up to `wait` for stdin to become readable and read what is there.
#[cfg(unix)]
fn read_stdin(wait: Duration) -> io::Result<Option<Vec<u8>>> {
    let mut pfd = libc::pollfd {
        fd: libc::STDIN_FILENO,
        events: libc::POLLIN,
        revents: 0,
    };
    let ms = libc::c_int::try_from(wait.as_millis()).unwrap_or(libc::c_int::MAX);
    let ready = unsafe { libc::poll(&raw mut pfd, 1, ms) };
    if ready < 0 {
        let err = io::Error::last_os_error();
        return if err.kind() == io::ErrorKind::Interrupted {
            Ok(None)
        } else {
            Err(err)
        };
    }
    if ready == 0 || pfd.revents & libc::POLLIN == 0 {
        return Ok(None);
    }
    let mut buf = [0u8; 64];
    let n = unsafe { libc::read(libc::STDIN_FILENO, buf.as_mut_ptr().cast(), buf.len()) };
    match usize::try_from(n) {
        Ok(0) => Ok(None),
        Ok(n) => Ok(Some(buf[..n].to_vec())),
        Err(_) => Err(io::Error::last_os_error()),
    }
}

#[cfg(not(unix))]
fn read_stdin(wait: Duration) -> io::Result<Option<Vec<u8>>> {
    std::thread::sleep(wait);
    Ok(None)
}

// ─── Saved device mode ──────────────────────────────────────────────────────

/// Line discipline in effect before raw mode, for the panic hook. The
/// [`Terminal`] that switched to raw mode keeps its own copy.
#[cfg(unix)]
static COOKED_MODE: Mutex<Option<libc::termios>> = Mutex::new(None);

#[cfg(unix)]
fn stdin_mode() -> io::Result<libc::termios> {
    // SAFETY: tcgetattr fills the zeroed struct or fails without touching it.
    let mut mode: libc::termios = unsafe { std::mem::zeroed() };
    if unsafe { libc::tcgetattr(libc::STDIN_FILENO, &raw mut mode) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(mode)
}

/// Apply `mode` to stdin. `TCSAFLUSH` discards pending input, so a probe
/// reply that arrives late cannot leak into the next mode.
#[cfg(unix)]
fn set_stdin_mode(mode: &libc::termios, when: libc::c_int) -> io::Result<()> {
    if unsafe { libc::tcsetattr(libc::STDIN_FILENO, when, mode) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Byte-at-a-time input, no echo, no signal keys, no output processing.
#[cfg(unix)]
fn raw_from(cooked: &libc::termios) -> libc::termios {
    let mut mode = *cooked;
    // SAFETY: cfmakeraw only rewrites flag fields of the struct it is given.
    unsafe { libc::cfmakeraw(&raw mut mode) };
    mode.c_cc[libc::VMIN] = 1;
    mode.c_cc[libc::VTIME] = 0;
    mode
}

/// Sent when the terminal description may not be at hand: attributes
/// off, ASCII charset, palette reset, keypad and margins back to normal,
/// cursor shown, alternate screen left last.
#[rustfmt::skip]
const PANIC_RESET: &[u8] = b"\
    \x1b[0m\
    \x1b(B\
    \x1b]104\x07\
    \x1b[?1l\x1b>\
    \x1b[?7h\
    \x1b[?25h\
    \x1b[?1049l";

static HOOK: Once = Once::new();

/// Chain a panic hook that puts the screen and the line discipline back
/// before the panic message is printed.
fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            write_panic_reset();
            #[cfg(unix)]
            if let Some(cooked) = COOKED_MODE.lock().ok().and_then(|saved| *saved) {
                let _ = set_stdin_mode(&cooked, libc::TCSANOW);
            }
            previous(info);
        }));
    });
}

/// Write [`PANIC_RESET`] on fd 1 directly; stdout may be locked by the
/// panicking thread.
fn write_panic_reset() {
    #[cfg(unix)]
    // SAFETY: the pointer and length describe a static byte string.
    unsafe {
        let _ = libc::write(libc::STDOUT_FILENO, PANIC_RESET.as_ptr().cast(), PANIC_RESET.len());
    }

    #[cfg(not(unix))]
    {
        let mut out = io::stdout();
        let _ = out.write_all(PANIC_RESET).and_then(|()| out.flush());
    }
}

// ─── Terminal ───────────────────────────────────────────────────────────────

/// The terminal device: size, and raw mode for the lifetime of the
/// drawing session.
///
/// [`enter`](Self::enter) switches stdin to raw mode. Leaving, dropping
/// the handle or panicking puts the saved line discipline back.
pub struct Terminal {
    #[cfg(unix)]
    cooked: Option<libc::termios>,
    size: Size,
    raw: bool,
}

impl Terminal {
    /// Handle for the controlling terminal. The size falls back to 80x24
    /// when it cannot be queried.
    ///
    /// # Errors
    ///
    /// Never fails on Unix; the `Result` is for consoles that need setup.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            cooked: None,
            size: get_size().unwrap_or(FALLBACK_SIZE),
            raw: false,
        })
    }

    #[inline]
    #[must_use]
    pub const fn size(&self) -> Size {
        self.size
    }

    /// Query the size again after `SIGWINCH`. Keeps the old size when the
    /// query fails.
    pub fn refresh_size(&mut self) -> Size {
        self.size = get_size().unwrap_or(self.size);
        tracing::debug!(width = self.size.width, height = self.size.height, "terminal size");
        self.size
    }

    /// Whether raw mode is on.
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.raw
    }

    /// Switch to raw mode. A second call does nothing. Without a tty the
    /// handle only records the state.
    ///
    /// # Errors
    ///
    /// Returns an error if the line discipline cannot be read or changed.
    pub fn enter(&mut self) -> io::Result<()> {
        if self.raw {
            return Ok(());
        }
        install_panic_hook();
        #[cfg(unix)]
        if is_tty() {
            let cooked = stdin_mode()?;
            if let Ok(mut saved) = COOKED_MODE.lock() {
                *saved = Some(cooked);
            }
            set_stdin_mode(&raw_from(&cooked), libc::TCSAFLUSH)?;
            self.cooked = Some(cooked);
            tracing::debug!("terminal in raw mode");
        }
        self.raw = true;
        Ok(())
    }

    /// Put the saved line discipline back. A second call does nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the line discipline cannot be restored; the
    /// handle stays in raw mode then.
    pub fn leave(&mut self) -> io::Result<()> {
        if !self.raw {
            return Ok(());
        }
        #[cfg(unix)]
        if let Some(cooked) = self.cooked.take() {
            if let Err(e) = set_stdin_mode(&cooked, libc::TCSAFLUSH) {
                self.cooked = Some(cooked);
                return Err(e);
            }
            if let Ok(mut saved) = COOKED_MODE.lock() {
                *saved = None;
            }
            tracing::debug!("terminal back in cooked mode");
        }
        self.raw = false;
        Ok(())
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

impl std::fmt::Debug for Terminal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Terminal")
            .field("size", &self.size)
            .field("raw", &self.raw)
            .finish_non_exhaustive()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
