//! Graph construction module

use std::collections::HashMap;

use crate::graph::{CompressedGraph, NodeIndex};

/// Builder for incrementally constructing an undirected CompressedGraph
#[derive(Debug, Default)]
pub struct GraphBuilder {
    /// Mapping from node names to node indices
    name_to_index: HashMap<String, NodeIndex>,

    /// Node names, by index
    node_names: Vec<String>,

    /// Adjacency lists for each node
    adjacency_lists: Vec<Vec<NodeIndex>>,
}

impl GraphBuilder {
    /// Create a new graph builder with the given capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            name_to_index: HashMap::with_capacity(capacity),
            node_names: Vec::with_capacity(capacity),
            adjacency_lists: Vec::with_capacity(capacity),
        }
    }

    /// Build a graph whose node names are the decimal indices `0..node_count`
    pub fn from_index_pairs(node_count: usize, edges: &[(NodeIndex, NodeIndex)]) -> CompressedGraph {
        let mut builder = Self::with_capacity(node_count);
        for i in 0..node_count {
            builder.get_or_create_node(&i.to_string());
        }
        for &(a, b) in edges {
            builder.add_edge(&a.to_string(), &b.to_string());
        }
        builder.build()
    }

    /// Get or create a node index for the given name
    pub fn get_or_create_node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.name_to_index.get(name) {
            return idx;
        }

        let idx = self.node_names.len() as NodeIndex;
        self.name_to_index.insert(name.to_string(), idx);
        self.node_names.push(name.to_string());
        self.adjacency_lists.push(Vec::new());

        idx
    }

    /// Add an undirected edge between two nodes.
    ///
    /// Self loops are ignored. Repeated edges are dropped by [`GraphBuilder::build`].
    pub fn add_edge(&mut self, a: &str, b: &str) {
        let a_idx = self.get_or_create_node(a);
        let b_idx = self.get_or_create_node(b);

        if a_idx == b_idx {
            return;
        }

        self.adjacency_lists[a_idx as usize].push(b_idx);
        self.adjacency_lists[b_idx as usize].push(a_idx);
    }

    /// Build the compressed graph
    pub fn build(mut self) -> CompressedGraph {
        for list in &mut self.adjacency_lists {
            list.sort_unstable();
            list.dedup();
        }

        let edge_count: usize = self.adjacency_lists.iter().map(Vec::len).sum();

        let mut offsets = Vec::with_capacity(self.node_names.len() + 1);
        offsets.push(0);

        let mut offset = 0;
        for list in &self.adjacency_lists {
            offset += list.len() as u32;
            offsets.push(offset);
        }

        let mut edges = Vec::with_capacity(edge_count);
        for list in &self.adjacency_lists {
            edges.extend_from_slice(list);
        }

        CompressedGraph::from_parts(offsets, edges, self.node_names)
    }
}
