//! Memory-efficient adjacency store backing the graph providers

use std::collections::HashMap;
use std::mem;

use serde::{Deserialize, Serialize};

use crate::graph::NodeIndex;

/// Compressed sparse representation of an undirected graph
///
/// Every edge is stored in both endpoints' adjacency lists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressedGraph {
    /// Number of nodes in the graph
    pub node_count: usize,

    /// Offset array: index where each node's edges begin
    /// offsets[i] to offsets[i+1] defines the edge range for node i
    pub offsets: Vec<u32>,

    /// Edge array: concatenated, sorted lists of adjacent nodes
    pub edges: Vec<NodeIndex>,

    /// Display name of every node, by index
    pub node_names: Vec<String>,

    #[serde(skip)]
    name_to_index: HashMap<String, NodeIndex>,
}

impl CompressedGraph {
    /// Assemble a graph from finished CSR arrays and node names
    pub(crate) fn from_parts(offsets: Vec<u32>, edges: Vec<NodeIndex>, node_names: Vec<String>) -> Self {
        let name_to_index = node_names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i as NodeIndex))
            .collect();

        let mut graph = Self {
            node_count: node_names.len(),
            offsets,
            edges,
            node_names,
            name_to_index,
        };
        graph.sort_adjacency_lists();
        graph
    }

    /// Number of undirected edges
    pub fn edge_count(&self) -> usize {
        self.edges.len() / 2
    }

    /// Adjacent nodes of a node
    pub fn neighbors(&self, node: usize) -> &[NodeIndex] {
        if node >= self.node_count {
            return &[];
        }
        let start = self.offsets[node] as usize;
        let end = self.offsets[node + 1] as usize;
        &self.edges[start..end]
    }

    /// Sort all adjacency lists (improves binary search performance)
    pub fn sort_adjacency_lists(&mut self) {
        for node in 0..self.node_count {
            let start = self.offsets[node] as usize;
            let end = self.offsets[node + 1] as usize;
            if start < end {
                self.edges[start..end].sort_unstable();
            }
        }
    }

    /// Check if there's an edge between a and b
    pub fn has_edge(&self, a: usize, b: NodeIndex) -> bool {
        self.neighbors(a).binary_search(&b).is_ok()
    }

    /// Get the degree of a node
    pub fn degree(&self, node: usize) -> usize {
        self.neighbors(node).len()
    }

    pub fn node_name(&self, node: usize) -> Option<&str> {
        self.node_names.get(node).map(String::as_str)
    }

    pub fn index_of(&self, name: &str) -> Option<NodeIndex> {
        self.name_to_index.get(name).copied()
    }

    /// Estimate memory usage in bytes
    pub fn memory_usage(&self) -> usize {
        let base = mem::size_of::<Self>();
        let offsets = self.offsets.capacity() * mem::size_of::<u32>();
        let edges = self.edges.capacity() * mem::size_of::<NodeIndex>();
        let names = self.node_names.iter().map(|s| s.capacity()).sum::<usize>();

        base + offsets + edges + 2 * names
    }
}
