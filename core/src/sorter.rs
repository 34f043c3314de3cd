//! Row ordering for frames.

use crate::frame::Frame;
use crate::types::Schema;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::fmt::Debug;

/// Orders rows within and across frames.
///
/// `less` must describe a total preorder, and `sort` must reorder a frame
/// consistently with it. Sorting is not stable.
pub trait Sorter: Send + Sync + Debug {
    /// Whether row `i` of `a` sorts before row `j` of `b`.
    fn less(&self, a: &Frame, i: usize, b: &Frame, j: usize) -> bool;

    /// Sort the rows of `frame` in place.
    fn sort(&self, frame: &mut Frame) {
        let mut perm: Vec<usize> = (0..frame.len()).collect();
        {
            let f: &Frame = frame;
            perm.par_sort_unstable_by(|&i, &j| {
                if self.less(f, i, f, j) {
                    Ordering::Less
                } else if self.less(f, j, f, i) {
                    Ordering::Greater
                } else {
                    Ordering::Equal
                }
            });
        }
        frame.permute(&perm);
    }
}

/// One column of a sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub column: usize,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(column: usize) -> Self {
        Self {
            column,
            descending: false,
        }
    }

    pub fn desc(column: usize) -> Self {
        Self {
            column,
            descending: true,
        }
    }
}

/// Sorts lexicographically by a list of key columns.
#[derive(Debug, Clone)]
pub struct KeySorter {
    keys: Vec<SortKey>,
}

impl KeySorter {
    pub fn new(keys: Vec<SortKey>) -> Self {
        Self { keys }
    }

    /// Ascending order on the key prefix of `schema`.
    pub fn for_schema(schema: &Schema) -> Self {
        Self::new((0..schema.key_columns().len()).map(SortKey::asc).collect())
    }

    fn compare(&self, a: &Frame, i: usize, b: &Frame, j: usize) -> Ordering {
        for key in &self.keys {
            let ord = a.cmp_value(key.column, i, b, j);
            let ord = if key.descending { ord.reverse() } else { ord };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl Sorter for KeySorter {
    fn less(&self, a: &Frame, i: usize, b: &Frame, j: usize) -> bool {
        self.compare(a, i, b, j) == Ordering::Less
    }

    fn sort(&self, frame: &mut Frame) {
        let mut perm: Vec<usize> = (0..frame.len()).collect();
        {
            let f: &Frame = frame;
            perm.par_sort_unstable_by(|&i, &j| self.compare(f, i, f, j));
        }
        frame.permute(&perm);
    }
}

/// Wraps a row comparison function.
pub struct FnSorter<F> {
    less: F,
}

impl<F> FnSorter<F>
where
    F: Fn(&Frame, usize, &Frame, usize) -> bool + Send + Sync,
{
    pub fn new(less: F) -> Self {
        Self { less }
    }
}

impl<F> Debug for FnSorter<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FnSorter")
    }
}

impl<F> Sorter for FnSorter<F>
where
    F: Fn(&Frame, usize, &Frame, usize) -> bool + Send + Sync,
{
    fn less(&self, a: &Frame, i: usize, b: &Frame, j: usize) -> bool {
        (self.less)(a, i, b, j)
    }
}
