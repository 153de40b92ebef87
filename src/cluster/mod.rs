//! Incrementally maintained cluster of nodes
//!
//! A [`Cluster`] tracks three identity-keyed node sets:
//!
//! * source nodes: protected members that only `remove_source_node` can evict,
//! * nodes: every member of the cluster, source nodes included,
//! * neighborhood: non-members adjacent to at least one member.
//!
//! It also keeps the aggregate degree of its members up to date, including
//! edges the graph provider reveals after a node joined the cluster. Growth
//! notifications are applied before every read of the neighborhood or the
//! aggregate degree, so both always reflect the adjacency revealed so far.

use std::cell::{RefCell, RefMut};
use std::collections::BTreeMap;
use std::fmt;

use crossbeam::channel::Receiver;

use crate::error::{ClusterError, Result};
use crate::graph::{Graph, NeighborAdded, NeighborListener, Node, NodeIndex};

/// State derived from the members and the adjacency revealed so far
#[derive(Debug, Default)]
struct Tracking {
    /// Non-members adjacent to the cluster
    neighbors: BTreeMap<NodeIndex, Node>,

    /// Sum of the members' degrees
    degree: usize,

    /// First notification that could not be applied, reported by `refresh`
    conflict: Option<ClusterError>,
}

impl Tracking {
    /// Track `node` as a boundary node unless it is a member or already tracked.
    ///
    /// The caller guarantees that `node` is adjacent to the cluster.
    fn add_candidate(&mut self, nodes: &BTreeMap<NodeIndex, Node>, node: &Node) -> Result<()> {
        if lookup(nodes, node, "contained by the cluster")?
            || lookup(&self.neighbors, node, "in the neighborhood of the cluster")?
        {
            return Ok(());
        }
        self.neighbors.insert(node.index(), node.clone());
        Ok(())
    }

    fn apply(&mut self, nodes: &BTreeMap<NodeIndex, Node>, event: &NeighborAdded) -> Result<()> {
        if !lookup(nodes, &event.node, "contained by the cluster")? {
            return Ok(());
        }
        let neighbor = &event.neighbor;
        let tracked = lookup(nodes, neighbor, "contained by the cluster")?
            || lookup(&self.neighbors, neighbor, "in the neighborhood of the cluster")?;

        self.degree += 1;
        if !tracked {
            self.neighbors.insert(neighbor.index(), neighbor.clone());
        }
        Ok(())
    }

    /// Apply every pending notification. A conflict is kept for `refresh` and
    /// leaves the tracked state untouched.
    fn drain(&mut self, notifications: &Receiver<NeighborAdded>, nodes: &BTreeMap<NodeIndex, Node>) {
        for event in notifications.try_iter() {
            if let Err(err) = self.apply(nodes, &event) {
                if self.conflict.is_none() {
                    self.conflict = Some(err);
                }
            }
        }
    }
}

/// An editable cluster. See the module documentation for the tracked sets.
pub struct Cluster {
    /// Protected members
    source_nodes: BTreeMap<NodeIndex, Node>,

    /// All members, source nodes included
    nodes: BTreeMap<NodeIndex, Node>,

    tracking: RefCell<Tracking>,
    listener: NeighborListener,
    notifications: Receiver<NeighborAdded>,
}

impl Default for Cluster {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tracking = self.sync();
        f.debug_struct("Cluster")
            .field("source_nodes", &self.source_nodes.keys().collect::<Vec<_>>())
            .field("nodes", &self.nodes.keys().collect::<Vec<_>>())
            .field("neighbors", &tracking.neighbors.keys().collect::<Vec<_>>())
            .field("degree", &tracking.degree)
            .finish()
    }
}

fn conflict(location: &'static str, existing: &Node, incoming: &Node) -> ClusterError {
    ClusterError::IdentityConflict {
        index: existing.index(),
        location,
        existing: existing.name().to_string(),
        incoming: incoming.name().to_string(),
    }
}

/// Look `node` up in `map`, rejecting a different object with the same index.
fn lookup(map: &BTreeMap<NodeIndex, Node>, node: &Node, location: &'static str) -> Result<bool> {
    match map.get(&node.index()) {
        Some(other) if other.same_object(node) => Ok(true),
        Some(other) => Err(conflict(location, other, node)),
        None => Ok(false),
    }
}

impl Cluster {
    pub fn new() -> Self {
        let (listener, notifications) = NeighborListener::channel();
        Self {
            source_nodes: BTreeMap::new(),
            nodes: BTreeMap::new(),
            tracking: RefCell::new(Tracking::default()),
            listener,
            notifications,
        }
    }

    /// Tracked state with every pending notification applied.
    ///
    /// The returned guard must be dropped before the graph is queried again.
    fn sync(&self) -> RefMut<'_, Tracking> {
        let mut tracking = self.tracking.borrow_mut();
        tracking.drain(&self.notifications, &self.nodes);
        tracking
    }

    /// Number of member nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn number_of_source_nodes(&self) -> usize {
        self.source_nodes.len()
    }

    pub fn number_of_neighbors(&self) -> usize {
        self.sync().neighbors.len()
    }

    /// Sum of the degrees of the member nodes
    pub fn aggregate_degree(&self) -> usize {
        self.sync().degree
    }

    /// Members, ordered by index
    pub fn nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.nodes.values()
    }

    /// Source nodes, ordered by index
    pub fn source_nodes(&self) -> impl Iterator<Item = &Node> + '_ {
        self.source_nodes.values()
    }

    /// Boundary nodes, ordered by index
    pub fn neighborhood(&self) -> Vec<Node> {
        self.sync().neighbors.values().cloned().collect()
    }

    /// Whether `node` is a member of the cluster.
    pub fn contains(&self, node: &Node) -> Result<bool> {
        lookup(&self.nodes, node, "contained by the cluster")
    }

    pub fn is_source_node(&self, node: &Node) -> Result<bool> {
        lookup(&self.source_nodes, node, "a source node of the cluster")
    }

    /// Whether `node` is tracked in the neighborhood of the cluster.
    ///
    /// Only accurate between public operations, use
    /// [`Cluster::is_adjacent_to_members`] while the sets are being updated.
    pub fn is_neighbor(&self, node: &Node) -> Result<bool> {
        lookup(&self.sync().neighbors, node, "in the neighborhood of the cluster")
    }

    pub fn add_source_node(&mut self, graph: &dyn Graph, node: &Node) -> Result<()> {
        if self.is_source_node(node)? {
            return Ok(());
        }

        if !self.contains(node)? {
            self.add_node(graph, node)?;
        }
        self.source_nodes.insert(node.index(), node.clone());

        Ok(())
    }

    pub fn add_source_nodes<'a, I>(&mut self, graph: &dyn Graph, nodes: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Node>,
    {
        for node in nodes {
            self.add_source_node(graph, node)?;
        }
        Ok(())
    }

    pub fn add_node(&mut self, graph: &dyn Graph, node: &Node) -> Result<()> {
        if self.contains(node)? {
            return Ok(());
        }

        // Reveals the node's adjacency before it starts listening, so edges
        // revealed now are counted once through graph.degree() below.
        let adjacent = graph.neighbors(node);
        self.is_neighbor(node)?;
        self.is_source_node(node)?;
        for neighbor in &adjacent {
            self.check_identity(neighbor)?;
        }
        self.refresh()?;

        self.nodes.insert(node.index(), node.clone());
        graph.subscribe(node, &self.listener);
        let degree = graph.degree(node);

        let tracking = self.tracking.get_mut();
        tracking.degree += degree;
        for neighbor in &adjacent {
            tracking.add_candidate(&self.nodes, neighbor)?;
        }
        tracking.neighbors.remove(&node.index());

        self.refresh()
    }

    pub fn add_nodes<'a, I>(&mut self, graph: &dyn Graph, nodes: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Node>,
    {
        for node in nodes {
            self.add_node(graph, node)?;
        }
        Ok(())
    }

    /// Remove `node` if it is one of the source nodes.
    pub fn remove_source_node(&mut self, graph: &dyn Graph, node: &Node) -> Result<()> {
        if !self.contains(node)? || !self.is_source_node(node)? {
            return Ok(());
        }

        self.prepare_removal(graph, node)?;
        self.source_nodes.remove(&node.index());
        self.remove_node_internal(graph, node)
    }

    pub fn remove_source_nodes<'a, I>(&mut self, graph: &dyn Graph, nodes: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Node>,
    {
        for node in nodes {
            self.remove_source_node(graph, node)?;
        }
        Ok(())
    }

    /// Remove `node` unless it is a source node.
    pub fn remove_node(&mut self, graph: &dyn Graph, node: &Node) -> Result<()> {
        if !self.contains(node)? || self.is_source_node(node)? {
            return Ok(());
        }

        self.prepare_removal(graph, node)?;
        self.remove_node_internal(graph, node)
    }

    pub fn remove_nodes<'a, I>(&mut self, graph: &dyn Graph, nodes: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Node>,
    {
        for node in nodes {
            self.remove_node(graph, node)?;
        }
        Ok(())
    }

    /// Apply pending neighbor-growth notifications and report the first one
    /// that named a node conflicting with a member.
    ///
    /// Reads apply notifications on their own. Every mutating operation calls
    /// this on entry and exit, and engines call it before scoring a phase so a
    /// conflict surfaces as an error.
    pub fn refresh(&mut self) -> Result<()> {
        let tracking = self.tracking.get_mut();
        tracking.drain(&self.notifications, &self.nodes);
        match tracking.conflict.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Whether `node` is a non-member adjacent to at least one member.
    ///
    /// Scans the node's adjacency, so it stays correct while the tracked
    /// neighborhood is being updated.
    pub fn is_adjacent_to_members(&self, graph: &dyn Graph, node: &Node) -> Result<bool> {
        if self.contains(node)? {
            return Ok(false);
        }

        for neighbor in graph.neighbors(node) {
            if self.contains(&neighbor)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Check the internal consistency of the cluster.
    ///
    /// Returns one message per problem found, an empty list when the cluster
    /// is consistent. A notification that could not be applied is reported
    /// and left for the next [`Cluster::refresh`].
    pub fn validate(&self, graph: &dyn Graph) -> Vec<String> {
        let mut result = Vec::new();
        if let Some(err) = &self.sync().conflict {
            result.push(format!("Pending notification could not be applied: {}", err));
        }

        result.extend(self.validate_source_nodes());
        result.extend(self.validate_neighborhood(graph));
        result.extend(self.validate_nodes(graph));

        result
    }

    fn validate_source_nodes(&self) -> Vec<String> {
        let mut result = Vec::new();

        for (key, node) in &self.source_nodes {
            match self.nodes.get(key) {
                None => result.push(format!("No node with key [{}] found in the cluster.", key)),
                Some(other) if !other.same_object(node) => result.push(format!(
                    "The source and contained nodes with the same key [{}] are different.",
                    key
                )),
                Some(_) => {}
            }
        }

        result
    }

    fn validate_nodes(&self, graph: &dyn Graph) -> Vec<String> {
        let mut result = Vec::new();
        let mut cluster_degree = 0;

        for node in self.nodes.values() {
            cluster_degree += graph.degree(node);
            for neighbor in graph.neighbors(node) {
                let tracked = self.contains(&neighbor).unwrap_or(false)
                    || self.is_neighbor(&neighbor).unwrap_or(false);
                if !tracked {
                    result.push(format!(
                        "Neighbor [{}] of node [{}] is neither in the cluster nor in its neighborhood.",
                        neighbor.name(),
                        node.name()
                    ));
                }
            }
        }

        let degree = self.aggregate_degree();
        if cluster_degree != degree {
            result.push(format!(
                "Incorrect cluster degree, {} instead of {}.",
                degree, cluster_degree
            ));
        }

        result
    }

    fn validate_neighborhood(&self, graph: &dyn Graph) -> Vec<String> {
        let mut result = Vec::new();

        for neighbor in self.neighborhood() {
            if self.nodes.contains_key(&neighbor.index()) {
                result.push(format!(
                    "Node [{}] is both in the cluster and in its neighborhood.",
                    neighbor.name()
                ));
            } else if !self.is_adjacent_to_members(graph, &neighbor).unwrap_or(false) {
                result.push(format!(
                    "Node [{}] in the neighborhood is not a neighbor of the cluster.",
                    neighbor.name()
                ));
            }
        }

        result
    }

    /// Reject `node` if a different object with its index is tracked anywhere.
    fn check_identity(&self, node: &Node) -> Result<()> {
        self.contains(node)?;
        self.is_neighbor(node)?;
        self.is_source_node(node)?;
        Ok(())
    }

    /// Identity checks that must pass before a removal touches any state.
    fn prepare_removal(&mut self, graph: &dyn Graph, node: &Node) -> Result<()> {
        for neighbor in graph.neighbors(node) {
            self.check_identity(&neighbor)?;
        }
        self.refresh()
    }

    fn remove_node_internal(&mut self, graph: &dyn Graph, node: &Node) -> Result<()> {
        // is_neighbor() is inaccurate from here until the neighborhood is
        // rebuilt, use is_adjacent_to_members() instead.
        self.nodes.remove(&node.index());
        graph.unsubscribe(node, &self.listener);
        let degree = graph.degree(node);
        let tracking = self.tracking.get_mut();
        tracking.degree = tracking.degree.saturating_sub(degree);

        for neighbor in graph.neighbors(node) {
            if self.tracking.get_mut().neighbors.contains_key(&neighbor.index())
                && !self.is_adjacent_to_members(graph, &neighbor)?
            {
                self.tracking.get_mut().neighbors.remove(&neighbor.index());
            }
        }

        if self.is_adjacent_to_members(graph, node)? {
            self.tracking.get_mut().add_candidate(&self.nodes, node)?;
        }

        self.refresh()
    }
}
