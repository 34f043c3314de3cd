//! External sorting.
//!
//! [`sort_reader`] reads an unsorted stream in batches, sorts each batch in
//! memory and spills it as a run, then merges the runs with a
//! [`MergeReader`]. Batches are sized so that each run is close to the
//! configured spill target: the first batch is a fixed canary, and the batch
//! size is recalibrated from the observed bytes per row after every spill.

pub mod frame_buffer;
pub mod heap;
pub mod merge;

pub use frame_buffer::FrameBuffer;
pub use heap::FrameBufferHeap;
pub use merge::MergeReader;

use crate::config::SortConfig;
use crate::error::{ShuffleError, ShuffleResult};
use crate::frame::Frame;
use crate::reader::{Reader, read_full};
use crate::sorter::Sorter;
use crate::spill::{FrameSpiller, SpillGuard, Spiller};
use crate::types::Schema;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Sort the rows of `reader`, spilling runs to the storage named in
/// `config`.
///
/// Spilled runs are released before this returns, whether or not the sort
/// succeeded; the returned reader holds its own handles on them.
pub fn sort_reader(
    ctx: &CancellationToken,
    sorter: Arc<dyn Sorter>,
    config: &SortConfig,
    schema: &Schema,
    reader: &mut dyn Reader,
) -> ShuffleResult<MergeReader> {
    config.validate()?;
    let spiller = FrameSpiller::new(schema.clone(), config.storage.clone(), config.min_batch_rows)?;
    sort_reader_with_spiller(ctx, sorter, config, schema, reader, Box::new(spiller))
}

/// Like [`sort_reader`], spilling through the given spiller.
pub fn sort_reader_with_spiller(
    ctx: &CancellationToken,
    sorter: Arc<dyn Sorter>,
    config: &SortConfig,
    schema: &Schema,
    reader: &mut dyn Reader,
    spiller: Box<dyn Spiller>,
) -> ShuffleResult<MergeReader> {
    config.validate()?;
    let mut spill = SpillGuard::new(spiller);
    let mut frame = Frame::new(schema.clone(), config.canary_rows);
    let mut runs = 0usize;
    let mut total_rows = 0usize;
    let mut total_bytes = 0usize;
    loop {
        if ctx.is_cancelled() {
            return Err(ShuffleError::Cancelled);
        }
        let (n, eof) = read_full(ctx, reader, &mut frame)?;
        let len = frame.len();
        frame.reslice(0, n);
        sorter.sort(&mut frame);
        let spilled = spill.spill(&frame);
        frame.reslice(0, len);
        let bytes = spilled?;
        runs += 1;
        total_rows += n;
        total_bytes += bytes;
        debug!(run = runs, rows = n, bytes, "Spilled sorted batch");
        if eof {
            break;
        }

        let bytes_per_row = (bytes / n.max(1)).max(1);
        let target = (config.spill_target_bytes / bytes_per_row).max(config.min_batch_rows);
        let deviation = (len as f64 - target as f64).abs() / target as f64;
        if deviation > config.tolerance {
            debug!(from = len, to = target, bytes_per_row, "Resizing sort batch");
            if target <= frame.cap() {
                frame.reslice(0, target);
            } else {
                frame = Frame::new(schema.clone(), target);
            }
        }
    }
    info!(runs, rows = total_rows, bytes = total_bytes, "Merging sorted runs");
    let readers = spill.readers()?;
    MergeReader::new(ctx, schema, sorter, readers, config.min_batch_rows)
}
