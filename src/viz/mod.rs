//! Visualization generation module
//!
//! [`to_export`] walks outward from a cluster and produces a node/edge view
//! for external graph tools; [`generate_visualizations`] writes that view to
//! disk as JSON, GraphML and a node table.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::cluster::Cluster;
use crate::error::Result;
use crate::graph::{Graph, Node, NodeIndex};
use crate::ranking::RankProvider;

pub const SOURCE_COLOR: &str = "#ff9999";
pub const CLUSTER_COLOR: &str = "#cc9999";
pub const NEIGHBOR_COLOR: &str = "#99dd99";
pub const OUTER_COLOR: &str = "#9999dd";

/// A node of the exported view
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportNode {
    pub id: String,
    pub label: String,
    pub color: &'static str,
    pub group: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportEdge {
    pub from: String,
    pub to: String,
}

/// Subgraph around a cluster, ready to be handed to visualization tools
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClusterExport {
    pub nodes: Vec<ExportNode>,
    pub edges: Vec<ExportEdge>,
}

impl ClusterExport {
    pub fn node(&self, id: &str) -> Option<&ExportNode> {
        self.nodes.iter().find(|node| node.id == id)
    }
}

/// Nodes and edges emitted so far, edges deduplicated.
#[derive(Default)]
struct ExportBuilder {
    export: ClusterExport,
    ids: BTreeMap<NodeIndex, String>,
    edges: BTreeSet<(NodeIndex, NodeIndex)>,
}

impl ExportBuilder {
    fn add_node(&mut self, node: &Node, group: &str, color: &'static str, rank: Option<f64>) {
        if self.ids.contains_key(&node.index()) {
            return;
        }
        self.ids.insert(node.index(), node.name().to_string());
        self.export.nodes.push(ExportNode {
            id: node.name().to_string(),
            label: node.name().to_string(),
            color,
            group: group.to_string(),
            rank,
        });
    }

    fn add_edge(&mut self, from: &Node, to: &Node) {
        let key = (from.index().min(to.index()), from.index().max(to.index()));
        if !self.edges.insert(key) {
            return;
        }
        self.export.edges.push(ExportEdge {
            from: from.name().to_string(),
            to: to.name().to_string(),
        });
    }

    fn is_exported(&self, node: &Node) -> bool {
        self.ids.contains_key(&node.index())
    }
}

/// Export the cluster and its surroundings up to `max_distance` hops away.
///
/// Source nodes are exported first, then the members, the boundary
/// (distance 1) and the outer shells `group_0`, `group_1`, ... Ranks are only
/// attached up to distance 1. With `lazy` set, edges between nodes of the
/// farthest shell are left out, which avoids visiting nodes beyond it.
///
/// Walking the shells reveals adjacency in lazily loaded graphs; call
/// [`Cluster::refresh`] before editing the cluster again.
pub fn to_export(
    graph: &dyn Graph,
    cluster: &Cluster,
    max_distance: usize,
    rank_provider: Option<&dyn RankProvider>,
    lazy: bool,
) -> Result<ClusterExport> {
    let mut builder = ExportBuilder::default();

    for source in cluster.source_nodes() {
        let rank = rank_provider.map(|provider| provider.node_rank(source));
        builder.add_node(source, "source", SOURCE_COLOR, rank);

        for neighbor in graph.neighbors(source) {
            if builder.is_exported(&neighbor) {
                builder.add_edge(source, &neighbor);
            }
        }
    }

    let mut shell: BTreeMap<NodeIndex, Node> = cluster.nodes().map(|node| (node.index(), node.clone())).collect();

    for distance in 0..=max_distance {
        let (group, color) = match distance {
            0 => ("cluster".to_string(), CLUSTER_COLOR),
            1 => ("neighbors".to_string(), NEIGHBOR_COLOR),
            _ => (format!("group_{}", distance - 2), OUTER_COLOR),
        };
        let provider = rank_provider.filter(|_| distance <= 1);
        let inner_edges = distance < 2 || distance < max_distance || !lazy;

        let mut next: BTreeMap<NodeIndex, Node> = BTreeMap::new();
        for node in shell.values() {
            builder.add_node(node, &group, color, provider.map(|p| p.node_rank(node)));

            for neighbor in graph.neighbors(node) {
                if !builder.is_exported(&neighbor) {
                    if !shell.contains_key(&neighbor.index()) {
                        next.insert(neighbor.index(), neighbor);
                    }
                    continue;
                }

                if inner_edges || !shell.contains_key(&neighbor.index()) {
                    builder.add_edge(node, &neighbor);
                }
            }
        }

        shell = next;
    }

    log::debug!(
        "Exported {} nodes and {} edges around a cluster of {}",
        builder.export.nodes.len(),
        builder.export.edges.len(),
        cluster.len()
    );

    Ok(builder.export)
}

/// Generate visualization files from an export
pub fn generate_visualizations(export: &ClusterExport, output_dir: impl AsRef<Path>) -> anyhow::Result<()> {
    let viz_dir = output_dir.as_ref().join("visualizations");
    log::info!(
        "Generating visualizations for {} nodes in {}",
        export.nodes.len(),
        viz_dir.display()
    );

    fs::create_dir_all(&viz_dir)?;

    let json_path = viz_dir.join("cluster_graph.json");
    fs::write(&json_path, serde_json::to_string_pretty(export)?)?;

    generate_graphml(export, &viz_dir.join("cluster_graph.graphml"))?;
    generate_node_table(export, &viz_dir.join("nodes.csv"))?;

    log::info!("Visualizations generated successfully");

    Ok(())
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Write the export as an undirected GraphML graph
fn generate_graphml(export: &ClusterExport, path: &Path) -> anyhow::Result<()> {
    let mut file = File::create(path)?;

    writeln!(file, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>")?;
    writeln!(file, "<graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\">")?;
    writeln!(file, "  <key id=\"label\" for=\"node\" attr.name=\"label\" attr.type=\"string\"/>")?;
    writeln!(file, "  <key id=\"group\" for=\"node\" attr.name=\"group\" attr.type=\"string\"/>")?;
    writeln!(file, "  <key id=\"color\" for=\"node\" attr.name=\"color\" attr.type=\"string\"/>")?;
    writeln!(file, "  <key id=\"rank\" for=\"node\" attr.name=\"rank\" attr.type=\"double\"/>")?;
    writeln!(file, "  <graph id=\"G\" edgedefault=\"undirected\">")?;

    for node in &export.nodes {
        writeln!(file, "    <node id=\"{}\">", escape_xml(&node.id))?;
        writeln!(file, "      <data key=\"label\">{}</data>", escape_xml(&node.label))?;
        writeln!(file, "      <data key=\"group\">{}</data>", escape_xml(&node.group))?;
        writeln!(file, "      <data key=\"color\">{}</data>", node.color)?;
        if let Some(rank) = node.rank {
            writeln!(file, "      <data key=\"rank\">{}</data>", rank)?;
        }
        writeln!(file, "    </node>")?;
    }

    for (edge_id, edge) in export.edges.iter().enumerate() {
        writeln!(
            file,
            "    <edge id=\"e{}\" source=\"{}\" target=\"{}\"/>",
            edge_id,
            escape_xml(&edge.from),
            escape_xml(&edge.to)
        )?;
    }

    writeln!(file, "  </graph>")?;
    writeln!(file, "</graphml>")?;

    Ok(())
}

/// Write one row per exported node
fn generate_node_table(export: &ClusterExport, path: &Path) -> anyhow::Result<()> {
    let mut writer = ::csv::Writer::from_path(path)?;
    writer.write_record(["id", "label", "group", "color", "rank"])?;

    for node in &export.nodes {
        let rank = node.rank.map(|rank| rank.to_string()).unwrap_or_default();
        writer.write_record([
            node.id.as_str(),
            node.label.as_str(),
            node.group.as_str(),
            node.color,
            rank.as_str(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ClusterEngine, LocalClusterEngine};
    use crate::graph::{GraphBuilder, LazyGraph};
    use crate::ranking::StepHistoryRankProvider;
    use approx::assert_relative_eq;

    fn two_cliques() -> LazyGraph {
        let mut edges = Vec::new();
        for offset in [0, 5] {
            for a in 0..5 {
                for b in a + 1..5 {
                    edges.push((offset + a, offset + b));
                }
            }
        }
        edges.push((4, 5));
        LazyGraph::new(GraphBuilder::from_index_pairs(10, &edges))
    }

    #[test]
    fn shells_are_grouped_and_colored() {
        let graph = two_cliques();
        let run = LocalClusterEngine::default().cluster_by_index(&graph, &[0]).unwrap();
        let ranks = run.rank_provider();

        let export = to_export(&graph, &run.cluster, 2, Some(&ranks), true).unwrap();

        assert_eq!(export.nodes.len(), 10);
        assert_eq!(export.node("0").unwrap().group, "source");
        assert_eq!(export.node("0").unwrap().color, SOURCE_COLOR);
        assert_eq!(export.node("3").unwrap().group, "cluster");
        assert_eq!(export.node("5").unwrap().group, "neighbors");
        assert_eq!(export.node("8").unwrap().group, "group_0");
        assert_eq!(export.node("8").unwrap().color, OUTER_COLOR);

        assert_relative_eq!(export.node("5").unwrap().rank.unwrap(), 2.0 / 1.275, epsilon = 1e-9);
        assert!(export.node("3").unwrap().rank.is_some());
        assert!(export.node("8").unwrap().rank.is_none());

        // Both cliques' inner edges minus the six among the farthest shell
        assert_eq!(export.edges.len(), 15);
    }

    #[test]
    fn eager_export_keeps_outer_edges() {
        let graph = two_cliques();
        let run = LocalClusterEngine::default().cluster_by_index(&graph, &[0]).unwrap();

        let export = to_export(&graph, &run.cluster, 2, None, false).unwrap();
        assert_eq!(export.edges.len(), 21);
        assert!(export.nodes.iter().all(|node| node.rank.is_none()));

        let edges: BTreeSet<(String, String)> = export
            .edges
            .iter()
            .map(|edge| (edge.from.clone().min(edge.to.clone()), edge.from.clone().max(edge.to.clone())))
            .collect();
        assert_eq!(edges.len(), 21);
    }

    #[test]
    fn distance_zero_exports_members_only() {
        let graph = two_cliques();
        let run = LocalClusterEngine::default().cluster_by_index(&graph, &[0]).unwrap();
        let provider = StepHistoryRankProvider::new(None);

        let export = to_export(&graph, &run.cluster, 0, Some(&provider), true).unwrap();
        assert_eq!(export.nodes.len(), 5);
        assert_eq!(export.edges.len(), 10);
        assert_eq!(export.node("1").unwrap().rank, Some(crate::ranking::RANK_NO_HISTORY));
    }

    #[test]
    fn writes_visualization_files() {
        let graph = two_cliques();
        let run = LocalClusterEngine::default().cluster_by_index(&graph, &[0]).unwrap();
        let export = to_export(&graph, &run.cluster, 1, None, true).unwrap();
        let dir = tempfile::tempdir().unwrap();

        generate_visualizations(&export, dir.path()).unwrap();

        let viz_dir = dir.path().join("visualizations");
        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(viz_dir.join("cluster_graph.json")).unwrap()).unwrap();
        assert_eq!(json["nodes"].as_array().unwrap().len(), 6);
        assert_eq!(json["edges"].as_array().unwrap().len(), 11);

        let graphml = fs::read_to_string(viz_dir.join("cluster_graph.graphml")).unwrap();
        assert_eq!(graphml.matches("<edge ").count(), 11);

        let table = fs::read_to_string(viz_dir.join("nodes.csv")).unwrap();
        assert_eq!(table.lines().count(), 7);
    }
}
