// SPDX-License-Identifier: MIT
//
// Output queue.
//
// Every byte the output engine produces (cursor motion, attribute changes,
// glyphs) goes into this queue first. Once it holds `FLUSH_THRESHOLD`
// bytes it is written to the sink in one `write_all`, and whatever is left
// at the end of a terminal update is written by an explicit `flush`. This
// keeps a full-screen redraw down to a handful of syscalls without letting
// the buffer grow with the screen size.

use std::io::{self, Write};

/// Queue size that triggers a write to the sink.
pub const FLUSH_THRESHOLD: usize = 2048;

/// Byte queue in front of a writer.
pub struct OutputQueue<W: Write> {
    buf: Vec<u8>,
    sink: W,
    threshold: usize,
    written: u64,
}

impl<W: Write> OutputQueue<W> {
    /// Queue in front of `sink` with the default threshold.
    #[must_use]
    pub fn new(sink: W) -> Self {
        Self::with_threshold(sink, FLUSH_THRESHOLD)
    }

    #[must_use]
    pub fn with_threshold(sink: W, threshold: usize) -> Self {
        Self {
            buf: Vec::with_capacity(threshold + 64),
            sink,
            threshold: threshold.max(1),
            written: 0,
        }
    }

    /// Bytes waiting in the queue.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Queued bytes, for tests and debugging.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Total bytes handed to the sink so far.
    #[inline]
    #[must_use]
    pub const fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Append bytes, writing the queue out once it is over the threshold.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the sink fails.
    pub fn push(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.buf.extend_from_slice(bytes);
        if self.buf.len() >= self.threshold {
            self.flush_queue()?;
        }
        Ok(())
    }

    /// Write everything queued and flush the sink.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to the sink fails. The queue keeps its
    /// contents in that case.
    pub fn flush_queue(&mut self) -> io::Result<()> {
        if !self.buf.is_empty() {
            self.sink.write_all(&self.buf)?;
            self.written += self.buf.len() as u64;
            self.buf.clear();
        }
        self.sink.flush()
    }

    /// Drop queued bytes without writing them.
    #[inline]
    pub fn discard(&mut self) {
        self.buf.clear();
    }

    #[inline]
    #[must_use]
    pub const fn sink(&self) -> &W {
        &self.sink
    }

    #[inline]
    pub fn sink_mut(&mut self) -> &mut W {
        &mut self.sink
    }
}

impl<W: Write> Write for OutputQueue<W> {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.push(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_queue()
    }
}

impl<W: Write> std::fmt::Debug for OutputQueue<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputQueue")
            .field("queued", &self.buf.len())
            .field("threshold", &self.threshold)
            .field("written", &self.written)
            .finish_non_exhaustive()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
