//! Node ranking derived from a step history

use std::cmp::Ordering;

use itertools::Itertools;

use crate::graph::Node;
use crate::history::StepHistory;

/// Rank reported when no history is available
pub const RANK_NO_HISTORY: f64 = -3.0;

/// Rank reported when the history has no steps
pub const RANK_EMPTY_HISTORY: f64 = -2.0;

/// Rank reported for nodes the last step did not evaluate
pub const RANK_UNKNOWN_NODE: f64 = -1.0;

/// Assigns a score to nodes, higher is more strongly connected to the cluster.
pub trait RankProvider {
    fn node_rank(&self, node: &Node) -> f64;

    fn ranks_for_nodes(&self, nodes: &[Node]) -> Vec<f64> {
        nodes.iter().map(|node| self.node_rank(node)).collect()
    }

    /// Sort `nodes` by rank. Nodes of equal rank are ordered by name.
    fn sort_nodes_by_rank(&self, nodes: &[Node], descending: bool) -> Vec<Node> {
        let by_name = nodes.iter().sorted_by(|a, b| a.name().cmp(b.name()));
        let mut ranked: Vec<(f64, &Node)> = by_name.map(|node| (self.node_rank(node), node)).collect();

        // Stable sort, ties keep the name order.
        ranked.sort_by(|(a, _), (b, _)| {
            let ordering: Ordering = a.total_cmp(b);
            if descending {
                ordering.reverse()
            } else {
                ordering
            }
        });

        ranked.into_iter().map(|(_, node)| node.clone()).collect()
    }
}

/// Ranks nodes by the decisions recorded in the last step of a history.
#[derive(Debug, Clone, Copy)]
pub struct StepHistoryRankProvider<'a> {
    history: Option<&'a StepHistory>,
}

impl<'a> StepHistoryRankProvider<'a> {
    pub fn new(history: Option<&'a StepHistory>) -> Self {
        Self { history }
    }
}

impl RankProvider for StepHistoryRankProvider<'_> {
    fn node_rank(&self, node: &Node) -> f64 {
        let Some(history) = self.history else {
            return RANK_NO_HISTORY;
        };
        let Some(step) = history.last_step() else {
            return RANK_EMPTY_HISTORY;
        };

        step.gain_descriptor_for_node(node)
            .map_or(RANK_UNKNOWN_NODE, |descriptor| descriptor.rank())
    }
}
