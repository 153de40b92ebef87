//! Edge table loaders producing a [`CompressedGraph`](crate::graph::CompressedGraph)

pub mod csv;
pub mod parquet;
