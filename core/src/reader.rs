//! Sequential frame readers.
//!
//! A [`Reader`] fills caller supplied frames with rows. End of stream is
//! reported as [`ShuffleError::Eof`], distinct from every failure; a read
//! that returns `Ok(0)` is not a valid way to signal it, and consumers treat
//! it as end of stream.

use crate::error::{ShuffleError, ShuffleResult};
use crate::frame::Frame;
use crate::types::{Schema, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A source of rows.
pub trait Reader: Send {
    /// Read up to `frame.len()` rows into the start of `frame`, returning the
    /// number of rows written.
    fn read(&mut self, ctx: &CancellationToken, frame: &mut Frame) -> ShuffleResult<usize>;
}

impl<R: Reader + ?Sized> Reader for Box<R> {
    fn read(&mut self, ctx: &CancellationToken, frame: &mut Frame) -> ShuffleResult<usize> {
        (**self).read(ctx, frame)
    }
}

/// Read until `frame` is full or the reader is exhausted.
///
/// Returns the number of rows read and whether the end of the stream was
/// reached. Errors other than end of stream are returned unchanged.
pub fn read_full(
    ctx: &CancellationToken,
    reader: &mut dyn Reader,
    frame: &mut Frame,
) -> ShuffleResult<(usize, bool)> {
    let (base, len) = frame.window();
    let mut n = 0;
    while n < len {
        frame.reslice(n, len);
        let read = reader.read(ctx, frame);
        frame.set_window(base, len);
        match read {
            Ok(0) | Err(ShuffleError::Eof) => return Ok((n, true)),
            Ok(m) => n += m,
            Err(err) => return Err(err),
        }
    }
    Ok((n, false))
}

/// Drain a reader into rows of values, reading `batch` rows at a time.
pub fn read_all(
    ctx: &CancellationToken,
    reader: &mut dyn Reader,
    schema: &Schema,
    batch: usize,
) -> ShuffleResult<Vec<Vec<Value>>> {
    let mut frame = Frame::new(schema.clone(), batch.max(1));
    let mut rows = Vec::new();
    loop {
        match reader.read(ctx, &mut frame) {
            Ok(0) | Err(ShuffleError::Eof) => return Ok(rows),
            Ok(n) => rows.extend((0..n).map(|i| frame.row(i))),
            Err(err) => return Err(err),
        }
    }
}

/// Reads rows `[off, end)` of a shared frame.
#[derive(Debug)]
pub struct FrameReader {
    frame: Arc<Frame>,
    off: usize,
    end: usize,
}

impl FrameReader {
    pub fn new(frame: Frame) -> Self {
        let end = frame.len();
        Self {
            frame: Arc::new(frame),
            off: 0,
            end,
        }
    }

    /// Read a sub-range of a shared frame without copying it.
    pub fn with_range(frame: Arc<Frame>, lo: usize, hi: usize) -> Self {
        assert!(lo <= hi && hi <= frame.len(), "range [{}, {}) out of bounds", lo, hi);
        Self {
            frame,
            off: lo,
            end: hi,
        }
    }
}

impl Reader for FrameReader {
    fn read(&mut self, ctx: &CancellationToken, out: &mut Frame) -> ShuffleResult<usize> {
        if ctx.is_cancelled() {
            return Err(ShuffleError::Cancelled);
        }
        if self.off == self.end {
            return Err(ShuffleError::Eof);
        }
        let n = out.len().min(self.end - self.off);
        for i in 0..n {
            out.copy_row(i, &self.frame, self.off + i)?;
        }
        self.off += n;
        Ok(n)
    }
}

/// A reader with no rows.
#[derive(Debug, Default)]
pub struct EmptyReader;

impl Reader for EmptyReader {
    fn read(&mut self, _ctx: &CancellationToken, _out: &mut Frame) -> ShuffleResult<usize> {
        Err(ShuffleError::Eof)
    }
}

/// A reader that always fails with the same error.
#[derive(Debug)]
pub struct ErrReader(pub ShuffleError);

impl Reader for ErrReader {
    fn read(&mut self, _ctx: &CancellationToken, _out: &mut Frame) -> ShuffleResult<usize> {
        Err(self.0.clone())
    }
}

/// Reads each of its readers to completion, in order.
pub struct MultiReader {
    readers: Vec<Box<dyn Reader>>,
    current: usize,
}

impl MultiReader {
    pub fn new(readers: Vec<Box<dyn Reader>>) -> Self {
        Self {
            readers,
            current: 0,
        }
    }
}

impl Reader for MultiReader {
    fn read(&mut self, ctx: &CancellationToken, out: &mut Frame) -> ShuffleResult<usize> {
        while self.current < self.readers.len() {
            match self.readers[self.current].read(ctx, out) {
                Ok(0) | Err(ShuffleError::Eof) => self.current += 1,
                other => return other,
            }
        }
        Err(ShuffleError::Eof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ColumnType;

    fn int_frame(values: &[i64]) -> Frame {
        let rows: Vec<Vec<Value>> = values.iter().map(|&v| vec![Value::Int64(v)]).collect();
        Frame::from_rows(int_schema(), &rows).unwrap()
    }

    fn int_schema() -> Schema {
        Schema::new(vec![ColumnType::Int64])
    }

    /// Hands out at most `step` rows per call.
    struct Trickle {
        values: Vec<i64>,
        pos: usize,
        step: usize,
    }

    impl Reader for Trickle {
        fn read(&mut self, _ctx: &CancellationToken, out: &mut Frame) -> ShuffleResult<usize> {
            if self.pos == self.values.len() {
                return Err(ShuffleError::Eof);
            }
            let n = self.step.min(out.len()).min(self.values.len() - self.pos);
            for i in 0..n {
                out.set_row(i, &[Value::Int64(self.values[self.pos + i])])?;
            }
            self.pos += n;
            Ok(n)
        }
    }

    #[test]
    fn test_frame_reader() {
        let ctx = CancellationToken::new();
        let mut reader = FrameReader::new(int_frame(&[1, 2, 3]));
        let mut out = Frame::new(int_schema(), 2);
        assert_eq!(reader.read(&ctx, &mut out).unwrap(), 2);
        assert_eq!(out.int64s(0).unwrap(), &[1, 2]);
        assert_eq!(reader.read(&ctx, &mut out).unwrap(), 1);
        assert_eq!(out.int64s(0).unwrap()[0], 3);
        assert!(reader.read(&ctx, &mut out).unwrap_err().is_eof());
        assert!(reader.read(&ctx, &mut out).unwrap_err().is_eof());
    }

    #[test]
    fn test_read_full_across_short_reads() {
        let ctx = CancellationToken::new();
        let mut reader = Trickle {
            values: vec![1, 2, 3, 4, 5],
            pos: 0,
            step: 2,
        };
        let mut frame = Frame::new(int_schema(), 4);
        let (n, eof) = read_full(&ctx, &mut reader, &mut frame).unwrap();
        assert_eq!((n, eof), (4, false));
        assert_eq!(frame.len(), 4);
        assert_eq!(frame.int64s(0).unwrap(), &[1, 2, 3, 4]);

        let (n, eof) = read_full(&ctx, &mut reader, &mut frame).unwrap();
        assert_eq!((n, eof), (1, true));
        assert_eq!(frame.int64s(0).unwrap()[0], 5);
        assert_eq!(frame.len(), 4);
    }

    #[test]
    fn test_read_full_propagates_errors() {
        let ctx = CancellationToken::new();
        let mut reader = ErrReader(ShuffleError::Source("boom".into()));
        let mut frame = Frame::new(int_schema(), 4);
        let err = read_full(&ctx, &mut reader, &mut frame).unwrap_err();
        assert!(matches!(err, ShuffleError::Source(_)));
    }

    #[test]
    fn test_cancelled_frame_reader() {
        let ctx = CancellationToken::new();
        ctx.cancel();
        let mut reader = FrameReader::new(int_frame(&[1]));
        let mut out = Frame::new(int_schema(), 1);
        assert!(matches!(
            reader.read(&ctx, &mut out),
            Err(ShuffleError::Cancelled)
        ));
    }

    #[test]
    fn test_multi_reader_and_read_all() {
        let ctx = CancellationToken::new();
        let mut reader = MultiReader::new(vec![
            Box::new(FrameReader::new(int_frame(&[1, 2]))),
            Box::new(EmptyReader),
            Box::new(FrameReader::new(int_frame(&[3]))),
        ]);
        let rows = read_all(&ctx, &mut reader, &int_schema(), 2).unwrap();
        assert_eq!(
            rows,
            vec![
                vec![Value::Int64(1)],
                vec![Value::Int64(2)],
                vec![Value::Int64(3)]
            ]
        );
    }
}
