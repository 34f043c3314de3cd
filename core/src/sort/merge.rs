//! K-way merge over sorted runs.

use super::frame_buffer::FrameBuffer;
use super::heap::FrameBufferHeap;
use crate::error::{ShuffleError, ShuffleResult};
use crate::frame::Frame;
use crate::reader::Reader;
use crate::sorter::Sorter;
use crate::types::Schema;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Streams the rows of several sorted readers in sorted order.
///
/// At most one window of `window_rows` rows per run is resident at a time.
/// Once the reader returns an error, including end of stream, it returns
/// the same error on every later call.
pub struct MergeReader {
    heap: FrameBufferHeap,
    err: Option<ShuffleError>,
}

impl MergeReader {
    /// Prime one read-ahead buffer per reader. Readers that are empty from
    /// the start are dropped; any other error aborts construction.
    pub fn new(
        ctx: &CancellationToken,
        schema: &Schema,
        sorter: Arc<dyn Sorter>,
        readers: Vec<Box<dyn Reader>>,
        window_rows: usize,
    ) -> ShuffleResult<Self> {
        let runs = readers.len();
        let mut buffers = Vec::with_capacity(runs);
        for reader in readers {
            let mut buf = FrameBuffer::new(Frame::new(schema.clone(), window_rows.max(1)), reader);
            match buf.fill(ctx) {
                Ok(()) => buffers.push(buf),
                Err(ShuffleError::Eof) => {}
                Err(err) => return Err(err),
            }
        }
        debug!(
            runs,
            live = buffers.len(),
            dropped = runs - buffers.len(),
            "Built merge reader"
        );
        Ok(Self {
            heap: FrameBufferHeap::new(sorter, buffers),
            err: None,
        })
    }

    /// Number of runs not yet drained.
    pub fn live_runs(&self) -> usize {
        self.heap.len()
    }

    fn fail(&mut self, err: ShuffleError) -> ShuffleError {
        self.err = Some(err.clone());
        err
    }
}

impl Reader for MergeReader {
    fn read(&mut self, ctx: &CancellationToken, out: &mut Frame) -> ShuffleResult<usize> {
        if let Some(err) = &self.err {
            return Err(err.clone());
        }
        if ctx.is_cancelled() {
            return Err(self.fail(ShuffleError::Cancelled));
        }
        let max = out.len();
        let mut n = 0;
        while n < max {
            let Some(head) = self.heap.peek_mut() else {
                break;
            };
            let (frame, off) = head.current();
            if let Err(err) = out.copy_row(n, frame, off) {
                return Err(self.fail(err));
            }
            n += 1;
            head.advance();
            if !head.is_exhausted() {
                self.heap.fix(0);
                continue;
            }
            match head.fill(ctx) {
                Ok(()) => self.heap.fix(0),
                Err(ShuffleError::Eof) => {
                    self.heap.remove(0);
                }
                // Rows already copied by this call are discarded.
                Err(err) => return Err(self.fail(err)),
            }
        }
        if n == 0 {
            return Err(self.fail(ShuffleError::Eof));
        }
        Ok(n)
    }
}
