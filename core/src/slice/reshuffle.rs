//! Repartitioning by key.

use super::{Combiner, Dependency, Name, Slice};
use crate::error::{ShuffleError, ShuffleResult};
use crate::reader::Reader;
use crate::types::{Schema, check_combinable};
use std::sync::Arc;
use tracing::info;

/// A slice whose rows are shuffled by key so that all rows with equal keys
/// land in the same shard. Rows are not sorted within a shard.
pub struct Reshuffle {
    name: Name,
    upstream: Arc<dyn Slice>,
}

/// Reshuffle `upstream` by its key columns.
///
/// Fails with [`ShuffleError::Type`] when the upstream schema cannot be
/// partitioned by key; no node is created in that case.
pub fn reshuffle(upstream: Arc<dyn Slice>) -> ShuffleResult<Arc<Reshuffle>> {
    check_combinable(upstream.schema()).map_err(|message| ShuffleError::Type {
        op: "reshuffle".to_string(),
        message,
    })?;
    let name = Name::new("reshuffle");
    info!(
        name = %name,
        upstream = %upstream.name(),
        schema = %upstream.schema(),
        "Created reshuffle"
    );
    Ok(Arc::new(Reshuffle { name, upstream }))
}

impl Slice for Reshuffle {
    fn name(&self) -> &Name {
        &self.name
    }

    fn schema(&self) -> &Schema {
        self.upstream.schema()
    }

    fn num_shards(&self) -> usize {
        self.upstream.num_shards()
    }

    fn num_deps(&self) -> usize {
        1
    }

    fn dep(&self, i: usize) -> Option<Dependency> {
        (i == 0).then(|| Dependency {
            slice: self.upstream.clone(),
            shuffle: true,
            combiner: None,
        })
    }

    fn combiner(&self) -> Option<Arc<dyn Combiner>> {
        None
    }

    /// The shard's input has already been repartitioned, so it is returned
    /// as is.
    fn reader(&self, _shard: usize, deps: Vec<Box<dyn Reader>>) -> ShuffleResult<Box<dyn Reader>> {
        let n = deps.len();
        let mut deps = deps.into_iter();
        match (deps.next(), deps.next()) {
            (Some(dep), None) => Ok(dep),
            _ => Err(ShuffleError::precondition(format!(
                "{}: expected one dep, got {}",
                self.name, n
            ))),
        }
    }
}
