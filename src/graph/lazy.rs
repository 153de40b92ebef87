//! Graph provider that reveals adjacency on demand
//!
//! A [`LazyGraph`] wraps a [`CompressedGraph`] that plays the role of an
//! external edge source. Nothing about a node's adjacency is known until the
//! node is visited; visiting it reveals all of its edges, which also grows the
//! known adjacency of the nodes at the other end. Subscribers of a grown node
//! receive a [`NeighborAdded`] notification for every revealed edge.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::error::{ClusterError, Result};
use crate::graph::{CompressedGraph, Graph, NeighborAdded, NeighborListener, Node, NodeIndex};

#[derive(Debug, Default)]
struct LoadState {
    loaded: Vec<bool>,
    adjacency: Vec<Vec<NodeIndex>>,

    /// Known edges as `(min, max)` index pairs
    revealed: HashSet<(NodeIndex, NodeIndex)>,

    listeners: HashMap<NodeIndex, Vec<NeighborListener>>,
}

impl LoadState {
    /// Record the undirected edge `a - b`. Returns false if it was known.
    fn reveal(&mut self, a: NodeIndex, b: NodeIndex) -> bool {
        if !self.revealed.insert((a.min(b), a.max(b))) {
            return false;
        }
        self.adjacency[a as usize].push(b);
        self.adjacency[b as usize].push(a);
        true
    }
}

/// Lazily loaded, arena-style [`Graph`] implementation
#[derive(Debug)]
pub struct LazyGraph {
    source: CompressedGraph,
    nodes: Vec<Node>,
    state: RefCell<LoadState>,
}

impl LazyGraph {
    /// Wrap an edge source. No adjacency is known yet.
    pub fn new(source: CompressedGraph) -> Self {
        let nodes = (0..source.node_count)
            .map(|i| Node::new(i as NodeIndex, source.node_name(i).unwrap_or_default()))
            .collect::<Vec<_>>();
        let state = LoadState {
            loaded: vec![false; nodes.len()],
            adjacency: vec![Vec::new(); nodes.len()],
            revealed: HashSet::new(),
            listeners: HashMap::new(),
        };

        Self {
            source,
            nodes,
            state: RefCell::new(state),
        }
    }

    /// Wrap an edge source and reveal the whole graph immediately.
    pub fn eager(source: CompressedGraph) -> Self {
        let graph = Self::new(source);
        for index in 0..graph.nodes.len() {
            graph.load(index as NodeIndex);
        }
        graph
    }

    pub fn source(&self) -> &CompressedGraph {
        &self.source
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, index: NodeIndex) -> Option<Node> {
        self.nodes.get(index as usize).cloned()
    }

    pub fn node_by_name(&self, name: &str) -> Option<Node> {
        self.source.index_of(name).and_then(|index| self.node(index))
    }

    /// Look up nodes by index, failing on the first unknown one.
    pub fn resolve_indices(&self, indices: &[NodeIndex]) -> Result<Vec<Node>> {
        indices
            .iter()
            .map(|&index| {
                self.node(index)
                    .ok_or_else(|| ClusterError::NullArgument(format!("no node with index {}", index)))
            })
            .collect()
    }

    /// Look up nodes by name, failing on the first unknown one.
    pub fn resolve_names<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<Node>> {
        names
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.node_by_name(name)
                    .ok_or_else(|| ClusterError::NullArgument(format!("no node named {:?}", name)))
            })
            .collect()
    }

    pub fn is_loaded(&self, index: NodeIndex) -> bool {
        self.state
            .borrow()
            .loaded
            .get(index as usize)
            .copied()
            .unwrap_or(false)
    }

    /// Number of nodes whose adjacency has been revealed
    pub fn loaded_count(&self) -> usize {
        self.state.borrow().loaded.iter().filter(|&&loaded| loaded).count()
    }

    /// Record an edge discovered after the fact, e.g. reported by the
    /// external source. Returns false if the edge is already known or invalid.
    pub fn insert_edge(&self, a: NodeIndex, b: NodeIndex) -> bool {
        let (a_idx, b_idx) = (a as usize, b as usize);
        if a == b || a_idx >= self.nodes.len() || b_idx >= self.nodes.len() {
            return false;
        }

        let mut state = self.state.borrow_mut();
        if !state.reveal(a, b) {
            return false;
        }

        Self::notify(&mut state, &self.nodes[a_idx], &self.nodes[b_idx]);
        Self::notify(&mut state, &self.nodes[b_idx], &self.nodes[a_idx]);
        true
    }

    /// Reveal every edge of `index` that is not known yet
    fn load(&self, index: NodeIndex) {
        let idx = index as usize;
        let mut state = self.state.borrow_mut();
        if idx >= state.loaded.len() || state.loaded[idx] {
            return;
        }
        state.loaded[idx] = true;

        for &other in self.source.neighbors(idx) {
            if !state.reveal(index, other) {
                continue;
            }

            Self::notify(&mut state, &self.nodes[idx], &self.nodes[other as usize]);
            Self::notify(&mut state, &self.nodes[other as usize], &self.nodes[idx]);
        }
    }

    fn notify(state: &mut LoadState, node: &Node, neighbor: &Node) {
        if let Some(listeners) = state.listeners.get_mut(&node.index()) {
            listeners.retain(|listener| {
                listener.notify(NeighborAdded {
                    node: node.clone(),
                    neighbor: neighbor.clone(),
                })
            });
        }
    }
}

impl Graph for LazyGraph {
    fn neighbors(&self, node: &Node) -> Vec<Node> {
        self.load(node.index());
        let state = self.state.borrow();
        state
            .adjacency
            .get(node.index() as usize)
            .map(|adjacent| adjacent.iter().map(|&i| self.nodes[i as usize].clone()).collect())
            .unwrap_or_default()
    }

    fn degree(&self, node: &Node) -> usize {
        self.load(node.index());
        self.state
            .borrow()
            .adjacency
            .get(node.index() as usize)
            .map_or(0, Vec::len)
    }

    fn subscribe(&self, node: &Node, listener: &NeighborListener) {
        let mut state = self.state.borrow_mut();
        let listeners = state.listeners.entry(node.index()).or_default();
        if listeners.iter().all(|l| l.id() != listener.id()) {
            listeners.push(listener.clone());
        }
    }

    fn unsubscribe(&self, node: &Node, listener: &NeighborListener) {
        let mut state = self.state.borrow_mut();
        if let Some(listeners) = state.listeners.get_mut(&node.index()) {
            listeners.retain(|l| l.id() != listener.id());
            if listeners.is_empty() {
                state.listeners.remove(&node.index());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;

    fn path_graph() -> LazyGraph {
        // 0 - 1 - 2
        LazyGraph::new(GraphBuilder::from_index_pairs(3, &[(0, 1), (1, 2)]))
    }

    #[test]
    fn adjacency_is_revealed_on_visit() {
        let graph = path_graph();
        let n0 = graph.node(0).unwrap();
        let n1 = graph.node(1).unwrap();

        assert!(!graph.is_loaded(1));
        assert_eq!(graph.neighbors(&n0).len(), 1);
        // Only the 0-1 edge is known from node 1's side so far.
        assert!(!graph.is_loaded(1));
        assert_eq!(graph.state.borrow().adjacency[1], vec![0]);

        assert_eq!(graph.degree(&n1), 2);
        assert!(graph.is_loaded(1));
        assert_eq!(graph.loaded_count(), 2);
    }

    #[test]
    fn subscribers_are_notified_of_revealed_edges() {
        let graph = path_graph();
        let n0 = graph.node(0).unwrap();
        let n1 = graph.node(1).unwrap();
        let (listener, receiver) = NeighborListener::channel();

        graph.subscribe(&n1, &listener);
        graph.neighbors(&n0);
        let events: Vec<_> = receiver.try_iter().collect();
        assert_eq!(events.len(), 1);
        assert!(events[0].node.same_object(&n1));
        assert!(events[0].neighbor.same_object(&n0));

        graph.unsubscribe(&n1, &listener);
        graph.neighbors(&graph.node(2).unwrap());
        assert_eq!(receiver.try_iter().count(), 0);
    }

    #[test]
    fn handles_are_shared_per_index() {
        let graph = path_graph();
        let a = graph.node(2).unwrap();
        let b = graph.node_by_name("2").unwrap();
        assert!(a.same_object(&b));
    }

    #[test]
    fn unknown_seeds_are_reported() {
        let graph = path_graph();
        assert!(matches!(graph.resolve_indices(&[0, 9]), Err(ClusterError::NullArgument(_))));
        assert!(matches!(graph.resolve_names(&["nope"]), Err(ClusterError::NullArgument(_))));
        assert_eq!(graph.resolve_names(&["0", "2"]).unwrap().len(), 2);
    }

    #[test]
    fn eager_graph_knows_everything() {
        let graph = LazyGraph::eager(GraphBuilder::from_index_pairs(3, &[(0, 1), (1, 2)]));
        assert_eq!(graph.loaded_count(), 3);
        assert_eq!(graph.state.borrow().adjacency[1].len(), 2);
    }

    #[test]
    fn inserted_edges_are_not_revealed_twice() {
        let graph = path_graph();
        assert!(graph.insert_edge(2, 1));
        assert!(!graph.insert_edge(1, 2));
        assert!(!graph.insert_edge(1, 1));

        // Visiting 1 reveals only the 0-1 edge, 1-2 is already known.
        assert_eq!(graph.degree(&graph.node(1).unwrap()), 2);
        assert_eq!(graph.degree(&graph.node(2).unwrap()), 1);
    }

    #[test]
    fn hub_is_revealed_once_per_edge() {
        let spokes = 20_000;
        let edges: Vec<_> = (1..=spokes).map(|i| (0, i)).collect();
        let graph = LazyGraph::new(GraphBuilder::from_index_pairs(spokes as usize + 1, &edges));
        let (listener, receiver) = NeighborListener::channel();
        let spoke = graph.node(7).unwrap();

        graph.subscribe(&spoke, &listener);
        let hub = graph.node(0).unwrap();
        assert_eq!(graph.degree(&hub), spokes as usize);
        assert_eq!(graph.degree(&spoke), 1);
        assert_eq!(receiver.try_iter().count(), 1);
    }
}
