//! Demonstration of the external sort and reshuffle
//!
//! This example reshuffles a small keyed dataset into shards, then sorts
//! each shard with a spill target small enough to force several runs to
//! disk. Debug logs show each spill, resize and merge.

use spillway_core::{
    CancellationToken, ColumnType, ConstSlice, Frame, HashPartitioner, KeySorter, MultiReader,
    Partitioner, Reader, Schema, Scope, Slice, SortConfig, TaskBuffer, Value, read_all,
    reshuffle, sort_reader,
};
use std::sync::Arc;
use tracing::Level;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(Level::DEBUG).init();

    println!("=== Spillway: Reshuffle and External Sort Demo ===\n");
    let ctx = CancellationToken::new();

    let schema = Schema::new(vec![ColumnType::Utf8, ColumnType::Int64]);
    let words = ["pear", "apple", "fig", "kiwi", "plum", "date", "lime", "yuzu"];
    let rows: Vec<Vec<Value>> = (0..2_000i64)
        .map(|i| {
            let word = words[(i * 7 % words.len() as i64) as usize];
            vec![Value::from(word), Value::Int64(i)]
        })
        .collect();
    let input = Frame::from_rows(schema.clone(), &rows)?;

    // 1. Build the graph.
    let upstream: Arc<dyn Slice> = Arc::new(ConstSlice::new(4, input)?);
    let node = reshuffle(upstream.clone())?;
    println!("1. Built {} over {}", node.name(), upstream.name());

    // 2. Map side: partition each upstream shard by key.
    let partitioner = HashPartitioner::new(node.num_shards());
    let mut tasks = Vec::new();
    for shard in 0..upstream.num_shards() {
        let mut reader = upstream.reader(shard, Vec::new())?;
        let frame = Frame::from_rows(schema.clone(), &read_all(&ctx, &mut reader, &schema, 256)?)?;
        let mut buffer = TaskBuffer::new(partitioner.num_partitions());
        for (p, part) in partitioner.partition_frame(&frame)?.into_iter().enumerate() {
            buffer.append(p, part)?;
        }
        tasks.push(buffer);
    }
    println!("2. Partitioned {} upstream shards", tasks.len());

    // 3. Reduce side: read each shard's partitions and sort them.
    let config = SortConfig::builder()
        .canary_rows(64)
        .min_batch_rows(32)
        .spill_target_bytes(2 << 10)
        .build()?;
    for shard in 0..node.num_shards() {
        let mut parts: Vec<Box<dyn Reader>> = Vec::new();
        for task in &tasks {
            parts.push(Box::new(task.reader(Scope::Partition(shard))?));
        }
        let mut reader = node.reader(shard, vec![Box::new(MultiReader::new(parts))])?;
        let sorter = Arc::new(KeySorter::for_schema(&schema));
        let mut sorted = sort_reader(&ctx, sorter, &config, &schema, &mut reader)?;
        let out = read_all(&ctx, &mut sorted, &schema, 128)?;
        let mut keys: Vec<String> = out.iter().map(|r| format!("{:?}", r[0])).collect();
        keys.dedup();
        println!("3. Shard {}: {} rows, keys {:?}", shard, out.len(), keys);
    }

    println!("\n=== Demo completed ===");
    Ok(())
}
