//! Priority queue of read-ahead buffers.

use super::frame_buffer::FrameBuffer;
use crate::sorter::Sorter;
use std::sync::Arc;

/// A binary min-heap of [`FrameBuffer`]s ordered by each buffer's current
/// row. Every buffer records its own position, so a buffer can be fixed or
/// removed in O(log n) once its offset moves.
///
/// Buffers in the heap must not be exhausted.
pub struct FrameBufferHeap {
    buffers: Vec<FrameBuffer>,
    sorter: Arc<dyn Sorter>,
}

impl FrameBufferHeap {
    /// Build a heap over `buffers`.
    pub fn new(sorter: Arc<dyn Sorter>, buffers: Vec<FrameBuffer>) -> Self {
        let mut heap = Self { buffers, sorter };
        heap.init();
        heap
    }

    fn init(&mut self) {
        for (i, buf) in self.buffers.iter_mut().enumerate() {
            buf.set_index(i);
        }
        let n = self.buffers.len();
        for i in (0..n / 2).rev() {
            self.down(i, n);
        }
    }

    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// The buffer holding the smallest current row.
    pub fn peek(&self) -> Option<&FrameBuffer> {
        self.buffers.first()
    }

    /// Mutable access to the head. Call [`FrameBufferHeap::fix`] with index
    /// 0 after moving its offset.
    pub fn peek_mut(&mut self) -> Option<&mut FrameBuffer> {
        self.buffers.first_mut()
    }

    pub fn push(&mut self, mut buf: FrameBuffer) {
        let n = self.buffers.len();
        buf.set_index(n);
        self.buffers.push(buf);
        self.up(n);
    }

    /// Remove and return the buffer at position `i`.
    pub fn remove(&mut self, i: usize) -> FrameBuffer {
        assert!(i < self.buffers.len(), "heap index {} out of range", i);
        let n = self.buffers.len() - 1;
        if n != i {
            self.swap(i, n);
            if !self.down(i, n) {
                self.up(i);
            }
        }
        let mut buf = self.buffers.swap_remove(n);
        buf.set_index(usize::MAX);
        buf
    }

    /// Restore the heap order after the buffer at position `i` changed.
    pub fn fix(&mut self, i: usize) {
        let n = self.buffers.len();
        if !self.down(i, n) {
            self.up(i);
        }
    }

    fn less(&self, i: usize, j: usize) -> bool {
        let (a, ai) = self.buffers[i].current();
        let (b, bj) = self.buffers[j].current();
        self.sorter.less(a, ai, b, bj)
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.buffers.swap(i, j);
        self.buffers[i].set_index(i);
        self.buffers[j].set_index(j);
    }

    fn up(&mut self, mut j: usize) {
        while j > 0 {
            let i = (j - 1) / 2;
            if !self.less(j, i) {
                break;
            }
            self.swap(i, j);
            j = i;
        }
    }

    /// Sift position `i0` down within the first `n` entries. Returns whether
    /// the entry moved.
    fn down(&mut self, i0: usize, n: usize) -> bool {
        let mut i = i0;
        loop {
            let left = 2 * i + 1;
            if left >= n {
                break;
            }
            let mut j = left;
            let right = left + 1;
            if right < n && self.less(right, left) {
                j = right;
            }
            if !self.less(j, i) {
                break;
            }
            self.swap(i, j);
            i = j;
        }
        i > i0
    }
}
