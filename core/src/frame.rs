//! Columnar record frames.
//!
//! A [`Frame`] is a fixed-schema batch of rows stored column by column. Its
//! columns are allocated once with a fixed capacity; the frame exposes a
//! window `[off, off + len)` over them. Slicing moves the window and never
//! copies, and a frame may be resliced past its current length up to its
//! capacity, which is how buffers are restored to full size before a refill.

use crate::error::{ShuffleError, ShuffleResult};
use crate::types::{ColumnType, Schema, Value};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// Vector backed storage for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Column {
    Bool(Vec<bool>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt64(Vec<u64>),
    Float64(Vec<f64>),
    Utf8(Vec<String>),
    Binary(Vec<Vec<u8>>),
}

macro_rules! with_column {
    ($col:expr, $v:ident => $body:expr) => {
        match $col {
            Column::Bool($v) => $body,
            Column::Int32($v) => $body,
            Column::Int64($v) => $body,
            Column::UInt64($v) => $body,
            Column::Float64($v) => $body,
            Column::Utf8($v) => $body,
            Column::Binary($v) => $body,
        }
    };
}

macro_rules! map_column {
    ($col:expr, $v:ident => $body:expr) => {
        match $col {
            Column::Bool($v) => Column::Bool($body),
            Column::Int32($v) => Column::Int32($body),
            Column::Int64($v) => Column::Int64($body),
            Column::UInt64($v) => Column::UInt64($body),
            Column::Float64($v) => Column::Float64($body),
            Column::Utf8($v) => Column::Utf8($body),
            Column::Binary($v) => Column::Binary($body),
        }
    };
}

impl Column {
    /// Allocate a column of `len` default values.
    pub fn zeroed(typ: ColumnType, len: usize) -> Self {
        match typ {
            ColumnType::Bool => Column::Bool(vec![false; len]),
            ColumnType::Int32 => Column::Int32(vec![0; len]),
            ColumnType::Int64 => Column::Int64(vec![0; len]),
            ColumnType::UInt64 => Column::UInt64(vec![0; len]),
            ColumnType::Float64 => Column::Float64(vec![0.0; len]),
            ColumnType::Utf8 => Column::Utf8(vec![String::new(); len]),
            ColumnType::Binary => Column::Binary(vec![Vec::new(); len]),
        }
    }

    pub fn column_type(&self) -> ColumnType {
        match self {
            Column::Bool(_) => ColumnType::Bool,
            Column::Int32(_) => ColumnType::Int32,
            Column::Int64(_) => ColumnType::Int64,
            Column::UInt64(_) => ColumnType::UInt64,
            Column::Float64(_) => ColumnType::Float64,
            Column::Utf8(_) => ColumnType::Utf8,
            Column::Binary(_) => ColumnType::Binary,
        }
    }

    pub fn len(&self) -> usize {
        with_column!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn value(&self, i: usize) -> Value {
        match self {
            Column::Bool(v) => Value::Bool(v[i]),
            Column::Int32(v) => Value::Int32(v[i]),
            Column::Int64(v) => Value::Int64(v[i]),
            Column::UInt64(v) => Value::UInt64(v[i]),
            Column::Float64(v) => Value::Float64(v[i]),
            Column::Utf8(v) => Value::Utf8(v[i].clone()),
            Column::Binary(v) => Value::Binary(v[i].clone()),
        }
    }

    fn set(&mut self, i: usize, value: &Value) -> ShuffleResult<()> {
        match (self, value) {
            (Column::Bool(v), Value::Bool(x)) => v[i] = *x,
            (Column::Int32(v), Value::Int32(x)) => v[i] = *x,
            (Column::Int64(v), Value::Int64(x)) => v[i] = *x,
            (Column::UInt64(v), Value::UInt64(x)) => v[i] = *x,
            (Column::Float64(v), Value::Float64(x)) => v[i] = *x,
            (Column::Utf8(v), Value::Utf8(x)) => v[i].clone_from(x),
            (Column::Binary(v), Value::Binary(x)) => v[i].clone_from(x),
            (col, value) => {
                return Err(ShuffleError::precondition(format!(
                    "cannot store a {} value in a {} column",
                    value.column_type(),
                    col.column_type()
                )));
            }
        }
        Ok(())
    }

    fn copy_from(&mut self, i: usize, src: &Column, j: usize) -> ShuffleResult<()> {
        match (self, src) {
            (Column::Bool(d), Column::Bool(s)) => d[i] = s[j],
            (Column::Int32(d), Column::Int32(s)) => d[i] = s[j],
            (Column::Int64(d), Column::Int64(s)) => d[i] = s[j],
            (Column::UInt64(d), Column::UInt64(s)) => d[i] = s[j],
            (Column::Float64(d), Column::Float64(s)) => d[i] = s[j],
            (Column::Utf8(d), Column::Utf8(s)) => d[i].clone_from(&s[j]),
            (Column::Binary(d), Column::Binary(s)) => d[i].clone_from(&s[j]),
            (dst, src) => {
                return Err(ShuffleError::precondition(format!(
                    "cannot copy a {} column into a {} column",
                    src.column_type(),
                    dst.column_type()
                )));
            }
        }
        Ok(())
    }

    fn swap(&mut self, i: usize, j: usize) {
        with_column!(self, v => v.swap(i, j))
    }

    fn range(&self, lo: usize, hi: usize) -> Column {
        map_column!(self, v => v[lo..hi].to_vec())
    }

    fn cmp_rows(&self, i: usize, other: &Column, j: usize) -> Ordering {
        match (self, other) {
            (Column::Bool(a), Column::Bool(b)) => a[i].cmp(&b[j]),
            (Column::Int32(a), Column::Int32(b)) => a[i].cmp(&b[j]),
            (Column::Int64(a), Column::Int64(b)) => a[i].cmp(&b[j]),
            (Column::UInt64(a), Column::UInt64(b)) => a[i].cmp(&b[j]),
            (Column::Float64(a), Column::Float64(b)) => a[i].total_cmp(&b[j]),
            (Column::Utf8(a), Column::Utf8(b)) => a[i].cmp(&b[j]),
            (Column::Binary(a), Column::Binary(b)) => a[i].cmp(&b[j]),
            (a, b) => a.column_type().cmp(&b.column_type()),
        }
    }

    fn hash_row<H: Hasher>(&self, i: usize, state: &mut H) {
        match self {
            Column::Bool(v) => v[i].hash(state),
            Column::Int32(v) => v[i].hash(state),
            Column::Int64(v) => v[i].hash(state),
            Column::UInt64(v) => v[i].hash(state),
            Column::Float64(v) => v[i].to_bits().hash(state),
            Column::Utf8(v) => v[i].hash(state),
            Column::Binary(v) => v[i].hash(state),
        }
    }
}

/// A batch of rows with a fixed schema.
#[derive(Debug, Clone)]
pub struct Frame {
    schema: Schema,
    columns: Vec<Column>,
    capacity: usize,
    off: usize,
    len: usize,
}

impl Frame {
    /// Allocate a frame with `len` rows of default values.
    pub fn new(schema: Schema, len: usize) -> Self {
        Self::with_capacity(schema, len, len)
    }

    /// Allocate a frame of `len` rows backed by storage for `cap` rows.
    pub fn with_capacity(schema: Schema, len: usize, cap: usize) -> Self {
        assert!(len <= cap, "frame length {} exceeds capacity {}", len, cap);
        let columns = schema
            .columns()
            .iter()
            .map(|&typ| Column::zeroed(typ, cap))
            .collect();
        Self {
            schema,
            columns,
            capacity: cap,
            off: 0,
            len,
        }
    }

    /// An empty frame.
    pub fn empty(schema: Schema) -> Self {
        Self::new(schema, 0)
    }

    /// Build a frame from whole columns, checking them against `schema`.
    pub fn from_columns(schema: Schema, columns: Vec<Column>) -> ShuffleResult<Self> {
        if columns.len() != schema.len() {
            return Err(ShuffleError::precondition(format!(
                "schema {} has {} columns, got {}",
                schema,
                schema.len(),
                columns.len()
            )));
        }
        for (i, col) in columns.iter().enumerate() {
            if col.column_type() != schema.column(i) {
                return Err(ShuffleError::precondition(format!(
                    "column {} of schema {} is {}, got {}",
                    i,
                    schema,
                    schema.column(i),
                    col.column_type()
                )));
            }
        }
        let len = columns.first().map(Column::len).unwrap_or(0);
        if columns.iter().any(|c| c.len() != len) {
            return Err(ShuffleError::precondition("columns have different lengths"));
        }
        Ok(Self {
            schema,
            columns,
            capacity: len,
            off: 0,
            len,
        })
    }

    /// Build a frame from rows of values.
    pub fn from_rows(schema: Schema, rows: &[Vec<Value>]) -> ShuffleResult<Self> {
        let mut frame = Self::new(schema, rows.len());
        for (i, row) in rows.iter().enumerate() {
            frame.set_row(i, row)?;
        }
        Ok(frame)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Number of rows in the window.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of rows available from the start of the window to the end of
    /// the underlying storage.
    pub fn cap(&self) -> usize {
        self.capacity - self.off
    }

    /// Narrow (or, up to capacity, widen) the window to rows `[lo, hi)`
    /// relative to the current window. No data is copied.
    pub fn slice(mut self, lo: usize, hi: usize) -> Self {
        self.reslice(lo, hi);
        self
    }

    /// In-place form of [`Frame::slice`].
    pub fn reslice(&mut self, lo: usize, hi: usize) {
        assert!(
            lo <= hi && hi <= self.cap(),
            "slice [{}, {}) out of range for frame with capacity {}",
            lo,
            hi,
            self.cap()
        );
        self.off += lo;
        self.len = hi - lo;
    }

    /// The absolute window `(off, len)` over the underlying storage.
    pub(crate) fn window(&self) -> (usize, usize) {
        (self.off, self.len)
    }

    /// Reset the window to an absolute position previously returned by
    /// [`Frame::window`].
    pub(crate) fn set_window(&mut self, off: usize, len: usize) {
        assert!(off + len <= self.capacity, "window out of range");
        self.off = off;
        self.len = len;
    }

    fn check_row(&self, row: usize) {
        assert!(
            row < self.len,
            "row {} out of range for frame of length {}",
            row,
            self.len
        );
    }

    pub fn value(&self, col: usize, row: usize) -> Value {
        self.check_row(row);
        self.columns[col].value(self.off + row)
    }

    /// Copy out the values of one row.
    pub fn row(&self, row: usize) -> Vec<Value> {
        self.check_row(row);
        self.columns
            .iter()
            .map(|c| c.value(self.off + row))
            .collect()
    }

    /// Copy out every row in the window.
    pub fn rows(&self) -> Vec<Vec<Value>> {
        (0..self.len).map(|i| self.row(i)).collect()
    }

    /// Overwrite one row with the given values.
    pub fn set_row(&mut self, row: usize, values: &[Value]) -> ShuffleResult<()> {
        self.check_row(row);
        if values.len() != self.columns.len() {
            return Err(ShuffleError::precondition(format!(
                "row has {} values, frame has {} columns",
                values.len(),
                self.columns.len()
            )));
        }
        let off = self.off;
        for (col, value) in self.columns.iter_mut().zip(values) {
            col.set(off + row, value)?;
        }
        Ok(())
    }

    /// Copy row `src_row` of `src` into row `dst` of this frame. Frames whose
    /// column kinds differ are rejected before anything is written; the key
    /// prefix may differ.
    pub fn copy_row(&mut self, dst: usize, src: &Frame, src_row: usize) -> ShuffleResult<()> {
        self.check_row(dst);
        src.check_row(src_row);
        if src.schema.columns() != self.schema.columns() {
            return Err(ShuffleError::precondition(format!(
                "cannot copy a row of {} into a frame of {}",
                src.schema, self.schema
            )));
        }
        let (off, src_off) = (self.off, src.off);
        for (d, s) in self.columns.iter_mut().zip(&src.columns) {
            d.copy_from(off + dst, s, src_off + src_row)?;
        }
        Ok(())
    }

    pub fn swap_rows(&mut self, i: usize, j: usize) {
        self.check_row(i);
        self.check_row(j);
        let off = self.off;
        for col in self.columns.iter_mut() {
            col.swap(off + i, off + j);
        }
    }

    /// Reorder the window so that row `k` becomes the old row `perm[k]`.
    pub fn permute(&mut self, perm: &[usize]) {
        assert_eq!(perm.len(), self.len, "permutation length mismatch");
        let mut visited = vec![false; perm.len()];
        for start in 0..perm.len() {
            if visited[start] {
                continue;
            }
            let mut k = start;
            loop {
                visited[k] = true;
                let next = perm[k];
                if next == start {
                    break;
                }
                self.swap_rows(k, next);
                k = next;
            }
        }
    }

    /// Compare one column of row `i` against the same column of row `j` in
    /// `other`.
    pub fn cmp_value(&self, col: usize, i: usize, other: &Frame, j: usize) -> Ordering {
        self.columns[col].cmp_rows(self.off + i, &other.columns[col], other.off + j)
    }

    /// Feed the key columns of `row` into `state`.
    pub fn hash_key<H: Hasher>(&self, row: usize, state: &mut H) {
        self.check_row(row);
        for col in &self.columns[..self.schema.prefix().min(self.columns.len())] {
            col.hash_row(self.off + row, state);
        }
    }

    /// Copy rows `[lo, hi)` of the window out as standalone columns.
    pub fn columns_range(&self, lo: usize, hi: usize) -> Vec<Column> {
        assert!(lo <= hi && hi <= self.len, "range [{}, {}) out of bounds", lo, hi);
        self.columns
            .iter()
            .map(|c| c.range(self.off + lo, self.off + hi))
            .collect()
    }

    /// The window of an `int64` column, if column `col` has that type.
    pub fn int64s(&self, col: usize) -> Option<&[i64]> {
        match &self.columns[col] {
            Column::Int64(v) => Some(&v[self.off..self.off + self.len]),
            _ => None,
        }
    }

    /// The window of a `utf8` column, if column `col` has that type.
    pub fn strings(&self, col: usize) -> Option<&[String]> {
        match &self.columns[col] {
            Column::Utf8(v) => Some(&v[self.off..self.off + self.len]),
            _ => None,
        }
    }
}
