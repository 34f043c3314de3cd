//! Read-ahead buffer over one sorted run.

use crate::error::{ShuffleError, ShuffleResult};
use crate::frame::Frame;
use crate::reader::Reader;
use tokio_util::sync::CancellationToken;

/// A window of unread rows from one source, refilled on demand.
///
/// The buffer is exhausted when `off == frame.len()`; it must be refilled
/// before its current row is looked at again.
pub struct FrameBuffer {
    frame: Frame,
    reader: Box<dyn Reader>,
    off: usize,
    index: usize,
    fills: usize,
    failed: Option<ShuffleError>,
}

impl FrameBuffer {
    /// Wrap `reader`, reading into `frame`. The buffer starts exhausted.
    pub fn new(frame: Frame, reader: Box<dyn Reader>) -> Self {
        let frame = frame.slice(0, 0);
        Self {
            frame,
            reader,
            off: 0,
            index: 0,
            fills: 0,
            failed: None,
        }
    }

    /// Refill the window from the source.
    ///
    /// A read of zero rows is reported as [`ShuffleError::Eof`]. Any other
    /// error leaves the buffer failed, and every later fill returns it.
    pub fn fill(&mut self, ctx: &CancellationToken) -> ShuffleResult<()> {
        self.fills += 1;
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }
        let cap = self.frame.cap();
        if self.frame.len() < cap {
            self.frame.reslice(0, cap);
        }
        self.off = 0;
        match self.reader.read(ctx, &mut self.frame) {
            Ok(0) | Err(ShuffleError::Eof) => {
                self.frame.reslice(0, 0);
                Err(ShuffleError::Eof)
            }
            Ok(n) => {
                self.frame.reslice(0, n);
                Ok(())
            }
            Err(err) => {
                self.frame.reslice(0, 0);
                self.failed = Some(err.clone());
                Err(err)
            }
        }
    }

    /// The frame and offset of the next unread row.
    pub fn current(&self) -> (&Frame, usize) {
        (&self.frame, self.off)
    }

    pub fn advance(&mut self) {
        debug_assert!(self.off < self.frame.len());
        self.off += 1;
    }

    pub fn is_exhausted(&self) -> bool {
        self.off == self.frame.len()
    }

    /// Rows left in the window.
    pub fn remaining(&self) -> usize {
        self.frame.len() - self.off
    }

    /// Number of fill attempts so far, counting those that hit the end of
    /// the run or failed.
    pub fn fills(&self) -> usize {
        self.fills
    }

    /// Position of this buffer in its heap.
    pub fn index(&self) -> usize {
        self.index
    }

    pub(super) fn set_index(&mut self, index: usize) {
        self.index = index;
    }
}
