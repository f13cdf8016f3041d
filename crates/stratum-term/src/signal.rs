// SPDX-License-Identifier: MIT
//
// Signal watcher.
//
// Window-size changes and termination requests arrive as POSIX signals.
// A background thread registered through `signal-hook` turns them into
// `TermSignal` values on a bounded channel; the drawing loop polls the
// channel between composite passes, so no compositor state is ever
// touched from a signal context. Signals that arrive while the channel is
// full are dropped: a pending `Resize` already covers later ones.

use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::thread::JoinHandle;
use std::time::Duration;

/// Capacity of the signal channel.
pub const SIGNAL_QUEUE: usize = 16;

/// A signal the drawing loop has to react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TermSignal {
    /// `SIGWINCH`: re-query the size and resize the virtual terminal.
    Resize,
    /// `SIGTERM`
    Terminate,
    /// `SIGINT`
    Interrupt,
    /// `SIGQUIT`
    Quit,
}

impl TermSignal {
    #[cfg(unix)]
    const fn from_raw(signal: libc::c_int) -> Option<Self> {
        match signal {
            libc::SIGWINCH => Some(Self::Resize),
            libc::SIGTERM => Some(Self::Terminate),
            libc::SIGINT => Some(Self::Interrupt),
            libc::SIGQUIT => Some(Self::Quit),
            _ => None,
        }
    }

    /// Whether the program should shut down.
    #[must_use]
    pub const fn is_termination(self) -> bool {
        !matches!(self, Self::Resize)
    }
}

/// Owns the watcher thread. Dropping it unregisters the handlers.
pub struct SignalWatcher {
    rx: Receiver<TermSignal>,
    #[cfg(unix)]
    handle: signal_hook::iterator::Handle,
    thread: Option<JoinHandle<()>>,
}

impl SignalWatcher {
    /// Register the handlers and start the watcher thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the handlers cannot be registered or the thread
    /// cannot be spawned.
    #[cfg(unix)]
    pub fn new() -> io::Result<Self> {
        use signal_hook::iterator::Signals;

        let mut signals = Signals::new([libc::SIGWINCH, libc::SIGTERM, libc::SIGINT, libc::SIGQUIT])?;
        let handle = signals.handle();
        let (tx, rx) = mpsc::sync_channel(SIGNAL_QUEUE);
        let thread = std::thread::Builder::new()
            .name("stratum-signals".into())
            .spawn(move || {
                for raw in signals.forever() {
                    if let Some(signal) = TermSignal::from_raw(raw) {
                        if !forward(&tx, signal) {
                            break;
                        }
                    }
                }
            })?;
        Ok(Self {
            rx,
            handle,
            thread: Some(thread),
        })
    }

    /// A watcher that never reports anything, for platforms without POSIX
    /// signals.
    ///
    /// # Errors
    ///
    /// Infallible on these platforms.
    #[cfg(not(unix))]
    pub fn new() -> io::Result<Self> {
        let (_tx, rx) = mpsc::sync_channel(SIGNAL_QUEUE);
        Ok(Self { rx, thread: None })
    }

    /// The next pending signal, without waiting.
    #[must_use]
    pub fn try_recv(&self) -> Option<TermSignal> {
        self.rx.try_recv().ok()
    }

    /// Wait up to `timeout` for a signal.
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<TermSignal> {
        match self.rx.recv_timeout(timeout) {
            Ok(signal) => Some(signal),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Everything pending right now, oldest first.
    pub fn drain(&self) -> impl Iterator<Item = TermSignal> + '_ {
        self.rx.try_iter()
    }
}

/// Hand a signal to the loop. Returns `false` once the loop is gone.
fn forward(tx: &SyncSender<TermSignal>, signal: TermSignal) -> bool {
    match tx.try_send(signal) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            tracing::trace!(?signal, "signal queue full, dropping");
            true
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}

impl Drop for SignalWatcher {
    fn drop(&mut self) {
        #[cfg(unix)]
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl std::fmt::Debug for SignalWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalWatcher")
            .field("running", &self.thread.is_some())
            .finish_non_exhaustive()
    }
}
