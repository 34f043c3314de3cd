//! Operator graph nodes.
//!
//! A [`Slice`] is a sharded, typed stream of rows. Slices are immutable once
//! built; execution asks a slice for the reader of one shard, handing it one
//! reader per dependency.

pub mod reshuffle;

pub use reshuffle::{Reshuffle, reshuffle};

use crate::error::{ShuffleError, ShuffleResult};
use crate::frame::Frame;
use crate::reader::{FrameReader, Reader};
use crate::types::Schema;
use std::fmt::{Debug, Display};
use std::sync::Arc;
use uuid::Uuid;

/// Process-unique identity of a slice.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name {
    op: String,
    id: Uuid,
}

impl Name {
    pub fn new(op: &str) -> Self {
        Self {
            op: op.to_string(),
            id: Uuid::new_v4(),
        }
    }

    /// The operator that created the slice.
    pub fn op(&self) -> &str {
        &self.op
    }
}

impl Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.op, self.id.simple())
    }
}

/// Merges rows with equal keys before they are shuffled.
pub trait Combiner: Send + Sync + Debug {
    /// Fold row `j` of `src` into row `i` of `acc`.
    fn combine(&self, acc: &mut Frame, i: usize, src: &Frame, j: usize) -> ShuffleResult<()>;
}

/// An edge from a slice to one of its inputs.
#[derive(Clone)]
pub struct Dependency {
    pub slice: Arc<dyn Slice>,
    /// Every output shard may read from every input shard, so the input must
    /// be repartitioned by key first.
    pub shuffle: bool,
    pub combiner: Option<Arc<dyn Combiner>>,
}

impl Debug for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dependency")
            .field("slice", &self.slice.name().to_string())
            .field("shuffle", &self.shuffle)
            .field("combiner", &self.combiner)
            .finish()
    }
}

/// A node in the operator graph.
pub trait Slice: Send + Sync {
    fn name(&self) -> &Name;

    /// Schema of the rows this slice produces.
    fn schema(&self) -> &Schema;

    fn num_shards(&self) -> usize;

    fn num_deps(&self) -> usize;

    /// Dependency `i`, for `i < num_deps()`.
    fn dep(&self, i: usize) -> Option<Dependency>;

    /// The combiner applied to this slice's own output, if any.
    fn combiner(&self) -> Option<Arc<dyn Combiner>> {
        None
    }

    /// The reader for `shard`, given one reader per dependency.
    fn reader(&self, shard: usize, deps: Vec<Box<dyn Reader>>) -> ShuffleResult<Box<dyn Reader>>;
}

/// A source slice over rows held in memory. Rows are dealt to shards
/// round-robin.
pub struct ConstSlice {
    name: Name,
    schema: Schema,
    shards: Vec<Arc<Frame>>,
}

impl ConstSlice {
    pub fn new(num_shards: usize, frame: Frame) -> ShuffleResult<Self> {
        if num_shards == 0 {
            return Err(ShuffleError::precondition("const slice needs at least one shard"));
        }
        let schema = frame.schema().clone();
        let mut shards = Vec::with_capacity(num_shards);
        for shard in 0..num_shards {
            let rows: Vec<usize> = (shard..frame.len()).step_by(num_shards).collect();
            let mut out = Frame::new(schema.clone(), rows.len());
            for (i, &row) in rows.iter().enumerate() {
                out.copy_row(i, &frame, row)?;
            }
            shards.push(Arc::new(out));
        }
        Ok(Self {
            name: Name::new("const"),
            schema,
            shards,
        })
    }
}

impl Slice for ConstSlice {
    fn name(&self) -> &Name {
        &self.name
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn num_shards(&self) -> usize {
        self.shards.len()
    }

    fn num_deps(&self) -> usize {
        0
    }

    fn dep(&self, _i: usize) -> Option<Dependency> {
        None
    }

    fn reader(&self, shard: usize, deps: Vec<Box<dyn Reader>>) -> ShuffleResult<Box<dyn Reader>> {
        if !deps.is_empty() {
            return Err(ShuffleError::precondition(format!(
                "{}: expected no deps, got {}",
                self.name,
                deps.len()
            )));
        }
        let frame = self.shards.get(shard).ok_or_else(|| {
            ShuffleError::precondition(format!(
                "{}: shard {} out of range for {} shards",
                self.name,
                shard,
                self.shards.len()
            ))
        })?;
        let len = frame.len();
        Ok(Box::new(FrameReader::with_range(frame.clone(), 0, len)))
    }
}
