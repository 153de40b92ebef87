//! Parquet file handling for graph data

use std::path::Path;

use anyhow::{anyhow, Result};
use polars::prelude::*;

use crate::graph::{CompressedGraph, GraphBuilder};

/// Load an undirected graph from two columns of a Parquet file.
///
/// Both columns are cast to strings, so integer identifiers work as well.
/// Rows with a missing endpoint are skipped.
pub fn load_edge_table(path: impl AsRef<Path>, source_col: &str, target_col: &str) -> Result<CompressedGraph> {
    let path = path.as_ref();
    log::info!("Reading parquet file: {}", path.display());

    if !path.exists() {
        return Err(anyhow!("File not found: {}", path.display()));
    }

    let df = LazyFrame::scan_parquet(path, Default::default())?
        .select([col(source_col), col(target_col)])
        .collect()?;

    log::debug!("File schema: {:?}", df.schema());

    let sources = df.column(source_col)?.cast(&DataType::String)?;
    let targets = df.column(target_col)?.cast(&DataType::String)?;
    let sources = sources.str()?;
    let targets = targets.str()?;

    let mut builder = GraphBuilder::default();
    let mut skipped = 0usize;
    for (source, target) in sources.into_iter().zip(targets) {
        match (source, target) {
            (Some(source), Some(target)) => builder.add_edge(source, target),
            _ => skipped += 1,
        }
    }

    if skipped > 0 {
        log::warn!("Skipped {} rows with a missing endpoint", skipped);
    }

    let graph = builder.build();
    log::info!(
        "Loaded {} rows into a graph with {} nodes and {} edges",
        df.height(),
        graph.node_count,
        graph.edge_count()
    );

    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    #[test]
    fn loads_integer_columns_as_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edges.parquet");

        let mut df = polars::df!(
            "Fid" => [1i64, 2, 3, 1],
            "TargetFid" => [2i64, 3, 1, 2],
            "Ignored" => ["x", "y", "z", "w"]
        )
        .unwrap();
        ParquetWriter::new(File::create(&path).unwrap())
            .finish(&mut df)
            .unwrap();

        let graph = load_edge_table(&path, "Fid", "TargetFid").unwrap();
        assert_eq!(graph.node_count, 3);
        assert_eq!(graph.edge_count(), 3);
        assert!(graph.index_of("3").is_some());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_edge_table("/nonexistent/edges.parquet", "a", "b").is_err());
    }
}
