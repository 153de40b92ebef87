//! Results persistence module

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::Result;
use serde_json::{json, to_string_pretty, Value};

use crate::engine::ClusteringRun;
use crate::graph::{CompressedGraph, Node};
use crate::ranking::RankProvider;

/// Save a finished run to the specified directory
pub fn save_results(run: &ClusteringRun, graph: &CompressedGraph, output_dir: impl AsRef<Path>) -> Result<()> {
    let output_dir = output_dir.as_ref();
    log::info!(
        "Saving cluster of {} nodes to {}",
        run.cluster.len(),
        output_dir.display()
    );

    fs::create_dir_all(output_dir)?;

    save_summary(run, graph, output_dir)?;
    save_cluster(run, output_dir)?;
    save_history(run, output_dir)?;

    log::info!("Results saved successfully");

    Ok(())
}

fn write_json(path: &Path, value: &Value) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(to_string_pretty(value)?.as_bytes())?;
    Ok(())
}

fn names<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Vec<String> {
    nodes.into_iter().map(|node| node.name().to_string()).collect()
}

/// Save run level information
fn save_summary(run: &ClusteringRun, graph: &CompressedGraph, output_dir: &Path) -> Result<()> {
    let cluster = &run.cluster;
    let average_degree = if cluster.is_empty() {
        0.0
    } else {
        cluster.aggregate_degree() as f64 / cluster.len() as f64
    };

    let summary = json!({
        "graph_stats": {
            "node_count": graph.node_count,
            "edge_count": graph.edge_count(),
        },
        "cluster_stats": {
            "size": cluster.len(),
            "source_node_count": cluster.number_of_source_nodes(),
            "neighbor_count": cluster.number_of_neighbors(),
            "aggregate_degree": cluster.aggregate_degree(),
            "avg_member_degree": average_degree,
        },
        "run": {
            "step_count": run.history.len(),
            "source_nodes_in_result": run.history.source_nodes_in_result(),
            "termination": run.termination,
        }
    });

    write_json(&output_dir.join("summary.json"), &summary)
}

/// Save the members ordered by rank, the boundary and the seeds
fn save_cluster(run: &ClusteringRun, output_dir: &Path) -> Result<()> {
    let ranks = run.rank_provider();
    let members: Vec<Node> = run.cluster.nodes().cloned().collect();

    let members: Vec<Value> = ranks
        .sort_nodes_by_rank(&members, true)
        .iter()
        .map(|node| {
            json!({
                "name": node.name(),
                "rank": ranks.node_rank(node),
            })
        })
        .collect();

    let cluster_json = json!({
        "source_nodes": names(run.history.source_nodes()),
        "members": members,
        "neighbors": names(&run.cluster.neighborhood()),
    });

    write_json(&output_dir.join("cluster.json"), &cluster_json)
}

/// Save the added and removed nodes of every step
fn save_history(run: &ClusteringRun, output_dir: &Path) -> Result<()> {
    let steps: Vec<Value> = run
        .history
        .iter()
        .enumerate()
        .map(|(index, step)| {
            json!({
                "step": index,
                "added": names(&step.added_nodes()),
                "removed": names(&step.removed_nodes()),
                "not_added_count": step.not_added_gain_descriptors().count(),
                "not_removed_count": step.not_removed_gain_descriptors().count(),
            })
        })
        .collect();

    write_json(&output_dir.join("history.json"), &json!({ "steps": steps }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ClusterEngine, LocalClusterEngine};
    use crate::graph::{GraphBuilder, LazyGraph};

    #[test]
    fn writes_summary_cluster_and_history() {
        let source = GraphBuilder::from_index_pairs(4, &[(0, 1), (1, 2), (0, 2), (2, 3)]);
        let graph = LazyGraph::new(source.clone());
        let run = LocalClusterEngine::default().cluster_by_index(&graph, &[0]).unwrap();
        let dir = tempfile::tempdir().unwrap();

        save_results(&run, &source, dir.path()).unwrap();

        let read = |name: &str| -> Value {
            serde_json::from_str(&fs::read_to_string(dir.path().join(name)).unwrap()).unwrap()
        };

        let summary = read("summary.json");
        assert_eq!(summary["graph_stats"]["edge_count"], 4);
        assert_eq!(summary["cluster_stats"]["size"], run.cluster.len());
        assert_eq!(summary["run"]["termination"]["reason"], "deadlock");

        let cluster = read("cluster.json");
        assert_eq!(cluster["source_nodes"], json!(["0"]));
        assert_eq!(cluster["members"].as_array().unwrap().len(), run.cluster.len());

        let history = read("history.json");
        assert_eq!(history["steps"].as_array().unwrap().len(), run.history.len());
        assert_eq!(history["steps"][0]["added"], json!(["1", "2"]));
    }
}
