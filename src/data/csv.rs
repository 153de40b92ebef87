//! CSV edge list handling

use std::path::Path;

use anyhow::{anyhow, Result};

use crate::graph::{CompressedGraph, GraphBuilder};

/// Load an undirected graph from a two-column `source,target` edge list.
///
/// Node names are taken verbatim (trimmed); repeated edges and self loops are
/// dropped by the builder. Rows with fewer than two fields are an error.
pub fn load_edge_list(path: impl AsRef<Path>, has_headers: bool) -> Result<CompressedGraph> {
    let path = path.as_ref();
    log::info!("Reading edge list: {}", path.display());

    if !path.exists() {
        return Err(anyhow!("File not found: {}", path.display()));
    }

    let mut reader = ::csv::ReaderBuilder::new()
        .has_headers(has_headers)
        .trim(::csv::Trim::All)
        .flexible(true)
        .from_path(path)?;

    let mut builder = GraphBuilder::default();
    let mut row_count = 0usize;
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        match (record.get(0), record.get(1)) {
            (Some(source), Some(target)) if !source.is_empty() && !target.is_empty() => {
                builder.add_edge(source, target);
                row_count += 1;
            }
            _ => return Err(anyhow!("{}: row {} is not a source,target pair", path.display(), line + 1)),
        }
    }

    let graph = builder.build();
    log::info!(
        "Loaded {} rows into a graph with {} nodes and {} edges",
        row_count,
        graph.node_count,
        graph.edge_count()
    );

    Ok(graph)
}
