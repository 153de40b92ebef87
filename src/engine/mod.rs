//! Cluster engines: the expansion/reduction loop and its hierarchical wrapper

pub mod hierarchical;
pub mod local;

use std::fmt;

use serde::Serialize;

use crate::cluster::Cluster;
use crate::error::Result;
use crate::graph::{Graph, LazyGraph, Node, NodeIndex};
use crate::history::StepHistory;
use crate::ranking::StepHistoryRankProvider;

pub use hierarchical::HierarchicalClusterEngine;
pub use local::LocalClusterEngine;

/// Why an engine run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Termination {
    /// The cluster had no members, nothing was recorded.
    EmptyCluster,

    /// The cluster reached the maximum cluster size.
    SizeLimit,

    /// The last step added exactly the nodes it removed.
    Deadlock,

    /// The last step repeated an earlier one; `length` steps form the loop.
    Loop { length: usize },

    /// The hierarchical engine reached its minimum cluster size.
    MinimumSizeReached { levels: usize },

    /// The hierarchical engine could not relax its definition any further.
    EscalationSaturated { levels: usize },
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::EmptyCluster => write!(f, "empty cluster"),
            Termination::SizeLimit => write!(f, "size limit reached"),
            Termination::Deadlock => write!(f, "deadlock"),
            Termination::Loop { length } => write!(f, "loop of {} steps", length),
            Termination::MinimumSizeReached { levels } => {
                write!(f, "minimum size reached after {} levels", levels)
            }
            Termination::EscalationSaturated { levels } => {
                write!(f, "escalation saturated after {} levels", levels)
            }
        }
    }
}

/// Result of [`ClusterEngine::cluster`].
#[derive(Debug)]
pub struct ClusteringRun {
    pub cluster: Cluster,
    pub history: StepHistory,
    pub termination: Termination,
}

impl ClusteringRun {
    /// Rank provider over the decisions of the last recorded step.
    pub fn rank_provider(&self) -> StepHistoryRankProvider<'_> {
        StepHistoryRankProvider::new(Some(&self.history))
    }
}

/// Common interface of the cluster engines.
pub trait ClusterEngine {
    /// Whether seeds are added as protected source nodes.
    fn source_nodes_in_result(&self) -> bool;

    /// Drive `cluster` to a stable state, recording every step in `history`.
    fn execute_on(&self, graph: &dyn Graph, cluster: &mut Cluster, history: &mut StepHistory) -> Result<Termination>;

    /// Create a cluster containing `seeds`, as source nodes if seeds must
    /// stay in the result. An empty seed list gives an empty cluster.
    fn create_cluster(&self, graph: &dyn Graph, seeds: &[Node]) -> Result<Cluster> {
        let mut cluster = Cluster::new();
        if self.source_nodes_in_result() {
            cluster.add_source_nodes(graph, seeds)?;
        } else {
            cluster.add_nodes(graph, seeds)?;
        }
        Ok(cluster)
    }

    fn create_step_history(&self, seeds: &[Node]) -> StepHistory {
        StepHistory::new(seeds.to_vec(), self.source_nodes_in_result())
    }

    /// Execute on `cluster` with a fresh history tagged with its source nodes.
    fn run(&self, graph: &dyn Graph, cluster: &mut Cluster) -> Result<(StepHistory, Termination)> {
        let seeds: Vec<Node> = cluster.source_nodes().cloned().collect();
        let mut history = self.create_step_history(&seeds);
        let termination = self.execute_on(graph, cluster, &mut history)?;
        Ok((history, termination))
    }

    /// Find the cluster of `seeds`.
    fn cluster(&self, graph: &dyn Graph, seeds: &[Node]) -> Result<ClusteringRun> {
        let mut cluster = self.create_cluster(graph, seeds)?;
        let mut history = self.create_step_history(seeds);
        let termination = self.execute_on(graph, &mut cluster, &mut history)?;

        Ok(ClusteringRun {
            cluster,
            history,
            termination,
        })
    }

    /// Find the cluster of the nodes with the given indices.
    ///
    /// Fails with [`ClusterError::NullArgument`](crate::error::ClusterError::NullArgument)
    /// if `graph` has no node with one of the indices.
    fn cluster_by_index(&self, graph: &LazyGraph, seeds: &[NodeIndex]) -> Result<ClusteringRun> {
        let seeds = graph.resolve_indices(seeds)?;
        self.cluster(graph, &seeds)
    }
}
