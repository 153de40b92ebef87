//! Local cluster engine
//!
//! Grows a cluster from its current members by alternating expansion and
//! reduction phases until the cluster reaches the size cap or the step history
//! shows a deadlock or a loop.
//!
//! Every phase evaluates the whole candidate set against the cluster as it was
//! when the phase started and applies the decisions afterwards, so the outcome
//! does not depend on evaluation order. An expansion phase may admit any number
//! of nodes, so the final cluster can be larger than the size cap.

use crate::cluster::Cluster;
use crate::definition::{ClusterDefinition, ConnectivityClusterDefinition, GainDescriptor};
use crate::engine::{ClusterEngine, Termination};
use crate::error::{ClusterError, Result};
use crate::graph::{Graph, Node};
use crate::history::{StepDescriptor, StepHistory, DEFAULT_LOOP_LOOKBACK};

/// Default upper limit of the cluster size
pub const DEFAULT_MAX_CLUSTER_SIZE: usize = 100;

/// Expansion/reduction engine, optionally running several phases of each kind
/// per iteration.
#[derive(Debug, Clone)]
pub struct LocalClusterEngine<D = ConnectivityClusterDefinition> {
    definition: D,
    source_nodes_in_result: bool,
    max_cluster_size: usize,
    expansion_step_count: usize,
    reduction_step_count: usize,
    loop_lookback: usize,
}

impl Default for LocalClusterEngine<ConnectivityClusterDefinition> {
    fn default() -> Self {
        Self::new(ConnectivityClusterDefinition::default(), true, DEFAULT_MAX_CLUSTER_SIZE)
    }
}

impl<D: ClusterDefinition> LocalClusterEngine<D> {
    /// Engine running one expansion and one reduction phase per iteration.
    pub fn new(definition: D, source_nodes_in_result: bool, max_cluster_size: usize) -> Self {
        Self {
            definition,
            source_nodes_in_result,
            max_cluster_size,
            expansion_step_count: 1,
            reduction_step_count: 1,
            loop_lookback: DEFAULT_LOOP_LOOKBACK,
        }
    }

    /// Engine running up to `expansion_step_count` expansion phases, then up to
    /// `reduction_step_count` reduction phases per iteration. A run of phases
    /// ends early once a phase changes nothing.
    pub fn multi_step(
        definition: D,
        source_nodes_in_result: bool,
        max_cluster_size: usize,
        expansion_step_count: usize,
        reduction_step_count: usize,
    ) -> Result<Self> {
        if expansion_step_count == 0 || reduction_step_count == 0 {
            return Err(ClusterError::InvalidParameter(format!(
                "step counts must be at least 1, got {} expansion and {} reduction steps",
                expansion_step_count, reduction_step_count
            )));
        }

        Ok(Self {
            expansion_step_count,
            reduction_step_count,
            ..Self::new(definition, source_nodes_in_result, max_cluster_size)
        })
    }

    /// Number of earlier steps compared against the last one for loop detection
    pub fn with_loop_lookback(mut self, loop_lookback: usize) -> Self {
        self.loop_lookback = loop_lookback;
        self
    }

    pub fn definition(&self) -> &D {
        &self.definition
    }

    pub fn definition_mut(&mut self) -> &mut D {
        &mut self.definition
    }

    pub fn max_cluster_size(&self) -> usize {
        self.max_cluster_size
    }

    pub fn expansion_step_count(&self) -> usize {
        self.expansion_step_count
    }

    pub fn reduction_step_count(&self) -> usize {
        self.reduction_step_count
    }

    pub fn loop_lookback(&self) -> usize {
        self.loop_lookback
    }

    /// Run one expansion phase. Returns the number of admitted nodes.
    fn expand(&self, graph: &dyn Graph, cluster: &mut Cluster, step: &mut StepDescriptor) -> Result<usize> {
        cluster.refresh()?;
        let candidates = cluster.neighborhood();
        let descriptors = candidates
            .iter()
            .map(|node| self.definition.gain_of_inclusion(graph, node, cluster))
            .collect::<Result<Vec<_>>>()?;

        let added = accepted(&descriptors);
        step.record_expansion_result(descriptors);
        cluster.add_nodes(graph, &added)?;

        Ok(added.len())
    }

    /// Run one reduction phase. Returns the number of nodes actually removed,
    /// source nodes flagged for removal stay in the cluster.
    fn reduce(&self, graph: &dyn Graph, cluster: &mut Cluster, step: &mut StepDescriptor) -> Result<usize> {
        cluster.refresh()?;
        let size = cluster.len();
        let members: Vec<Node> = cluster.nodes().cloned().collect();
        let descriptors = members
            .iter()
            .map(|node| self.definition.gain_of_exclusion(graph, node, cluster))
            .collect::<Result<Vec<_>>>()?;

        let removed = accepted(&descriptors);
        step.record_reduction_result(descriptors);
        cluster.remove_nodes(graph, &removed)?;

        Ok(size - cluster.len())
    }
}

fn accepted(descriptors: &[GainDescriptor]) -> Vec<Node> {
    descriptors
        .iter()
        .filter(|descriptor| descriptor.result())
        .map(|descriptor| descriptor.node().clone())
        .collect()
}

impl<D: ClusterDefinition> ClusterEngine for LocalClusterEngine<D> {
    fn source_nodes_in_result(&self) -> bool {
        self.source_nodes_in_result
    }

    fn execute_on(&self, graph: &dyn Graph, cluster: &mut Cluster, history: &mut StepHistory) -> Result<Termination> {
        if cluster.is_empty() {
            return Ok(Termination::EmptyCluster);
        }

        log::info!(
            "Running local cluster engine from {} nodes ({} definition, max size {})",
            cluster.len(),
            self.definition.kind(),
            self.max_cluster_size
        );

        loop {
            let step = history.step();

            for _ in 0..self.expansion_step_count {
                if self.expand(graph, cluster, step)? == 0 {
                    break;
                }
            }
            for _ in 0..self.reduction_step_count {
                if self.reduce(graph, cluster, step)? == 0 {
                    break;
                }
            }

            log::debug!(
                "Step {}: +{} -{} nodes, cluster size {}, degree {}",
                history.len() - 1,
                history[history.len() - 1].number_of_added_nodes(),
                history[history.len() - 1].number_of_removed_nodes(),
                cluster.len(),
                cluster.aggregate_degree()
            );

            // The size cap and the loop detector are the only exits. A run that
            // keeps changing without repeating a step inside the lookback
            // window does not terminate.
            let termination = if cluster.len() >= self.max_cluster_size {
                Some(Termination::SizeLimit)
            } else {
                history.find_loop(self.loop_lookback).map(|cycle| match cycle.len() {
                    1 => Termination::Deadlock,
                    length => Termination::Loop { length },
                })
            };

            if let Some(termination) = termination {
                log::info!(
                    "Local cluster engine stopped after {} steps ({}), cluster size {}",
                    history.len(),
                    termination,
                    cluster.len()
                );
                return Ok(termination);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphBuilder, LazyGraph, NodeIndex};
    use crate::ranking::RankProvider;
    use approx::assert_relative_eq;
    use std::any::Any;
    use std::cell::Cell;

    fn indices<'a>(nodes: impl Iterator<Item = &'a Node>) -> Vec<NodeIndex> {
        nodes.map(Node::index).collect()
    }

    /// Triangles {0,1,2} and {3,4,5} joined by the edge 2-3.
    fn two_triangles() -> LazyGraph {
        LazyGraph::new(GraphBuilder::from_index_pairs(
            6,
            &[(0, 1), (0, 2), (1, 2), (2, 3), (3, 4), (3, 5), (4, 5)],
        ))
    }

    /// Cliques {0..4} and {5..9} joined by the edge 4-5.
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

    fn added_removed(history: &StepHistory) -> Vec<(Vec<NodeIndex>, Vec<NodeIndex>)> {
        history
            .iter()
            .map(|step| {
                (
                    indices(step.added_nodes().iter()),
                    indices(step.removed_nodes().iter()),
                )
            })
            .collect()
    }

    #[test]
    fn two_triangles_are_absorbed_through_the_bridge() {
        // With size 3 the threshold is at most 0.85, below the quality of any
        // single edge, so the bridge node 3 is admitted and pulls in its triangle.
        let graph = two_triangles();
        let engine = LocalClusterEngine::new(ConnectivityClusterDefinition::new(2.0, 0.85).unwrap(), true, 100);
        let run = engine.cluster(&graph, &graph.resolve_indices(&[0]).unwrap()).unwrap();

        assert_eq!(run.termination, Termination::Deadlock);
        assert_eq!(indices(run.cluster.nodes()), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(
            added_removed(&run.history),
            vec![
                (vec![1, 2], vec![]),
                (vec![3], vec![]),
                (vec![4, 5], vec![]),
                (vec![], vec![]),
            ]
        );
        assert!(run.cluster.validate(&graph).is_empty());
    }

    #[test]
    fn bridge_between_cliques_is_not_crossed() {
        let graph = two_cliques();
        let engine = LocalClusterEngine::default();
        let run = engine.cluster(&graph, &graph.resolve_indices(&[0]).unwrap()).unwrap();

        assert_eq!(run.termination, Termination::Deadlock);
        assert_eq!(indices(run.cluster.nodes()), vec![0, 1, 2, 3, 4]);
        assert_eq!(indices(run.cluster.neighborhood().iter()), vec![5]);
        assert_eq!(run.cluster.aggregate_degree(), 21);
        assert_eq!(run.history.len(), 2);

        // quality 2 against 0.85 * min(3, 5, 21/5)
        let bridge = graph.node(5).unwrap();
        let gain = run.history[1].gain_descriptor_for_node(&bridge).unwrap();
        assert!(!gain.result());
        assert_relative_eq!(gain.coefficient_multiplier(), 0.85 * 3.0 / 2.0);
        assert_relative_eq!(run.rank_provider().node_rank(&bridge), 2.0 / (0.85 * 3.0 / 2.0));

        // The far clique was never visited.
        assert!(!graph.is_loaded(6));
        assert!(run.cluster.validate(&graph).is_empty());

        // Growth reported after the run shows up on the next read.
        assert!(graph.insert_edge(0, 9));
        assert_eq!(run.cluster.aggregate_degree(), 22);
        assert_eq!(indices(run.cluster.neighborhood().iter()), vec![5, 9]);
        assert!(run.cluster.validate(&graph).is_empty());
    }

    #[test]
    fn runs_are_deterministic() {
        let first = two_cliques();
        let second = two_cliques();
        let engine = LocalClusterEngine::default();

        let a = engine.cluster(&first, &first.resolve_indices(&[7]).unwrap()).unwrap();
        let b = engine.cluster(&second, &second.resolve_indices(&[7]).unwrap()).unwrap();

        assert_eq!(added_removed(&a.history), added_removed(&b.history));
        assert_eq!(a.history.to_string(), b.history.to_string());
    }

    #[test]
    fn size_cap_may_be_overshot() {
        let graph = two_triangles();
        let engine = LocalClusterEngine::new(ConnectivityClusterDefinition::default(), true, 2);
        let run = engine.cluster(&graph, &graph.resolve_indices(&[0]).unwrap()).unwrap();

        assert_eq!(run.termination, Termination::SizeLimit);
        assert_eq!(run.history.len(), 1);
        assert_eq!(run.cluster.len(), 3);
    }

    #[test]
    fn protected_isolated_seed_ends_in_a_loop() {
        let graph = LazyGraph::new(GraphBuilder::from_index_pairs(3, &[(1, 2)]));
        let seeds = graph.resolve_indices(&[0]).unwrap();

        let engine = LocalClusterEngine::default();
        let run = engine.cluster(&graph, &seeds).unwrap();
        assert_eq!(run.termination, Termination::Loop { length: 2 });
        assert_eq!(indices(run.cluster.nodes()), vec![0]);

        let engine = LocalClusterEngine::new(ConnectivityClusterDefinition::default(), false, 100);
        let run = engine.cluster(&graph, &seeds).unwrap();
        assert_eq!(run.termination, Termination::Deadlock);
        assert!(run.cluster.is_empty());
        assert_eq!(run.history.len(), 2);
        assert!(!run.history.source_nodes_in_result());
    }

    /// Connectivity definition that counts its exclusion evaluations.
    #[derive(Debug, Default)]
    struct CountingDefinition {
        inner: ConnectivityClusterDefinition,
        exclusions: Cell<usize>,
    }

    impl ClusterDefinition for CountingDefinition {
        fn kind(&self) -> &'static str {
            "counting"
        }
        fn gain_of_inclusion(&self, graph: &dyn Graph, node: &Node, cluster: &Cluster) -> Result<GainDescriptor> {
            self.inner.gain_of_inclusion(graph, node, cluster)
        }
        fn gain_of_exclusion(&self, graph: &dyn Graph, node: &Node, cluster: &Cluster) -> Result<GainDescriptor> {
            self.exclusions.set(self.exclusions.get() + 1);
            self.inner.gain_of_exclusion(graph, node, cluster)
        }
        fn clone_into_target(&self, target: &mut dyn ClusterDefinition) -> Result<()> {
            self.inner.clone_into_target(target)
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn protected_seed_does_not_prolong_reduction() {
        let graph = LazyGraph::new(GraphBuilder::from_index_pairs(3, &[(1, 2)]));
        let engine = LocalClusterEngine::multi_step(CountingDefinition::default(), true, 100, 1, 3).unwrap();

        let run = engine.cluster_by_index(&graph, &[0]).unwrap();
        assert_eq!(run.termination, Termination::Loop { length: 2 });
        assert_eq!(run.history.len(), 2);
        // One reduction phase per step: flagging the seed removes nothing.
        assert_eq!(engine.definition().exclusions.get(), 2);
        assert_eq!(run.history[0].number_of_removed_nodes(), 1);
    }

    #[test]
    fn empty_cluster_records_nothing() {
        let graph = two_triangles();
        let engine = LocalClusterEngine::default();

        let run = engine.cluster(&graph, &[]).unwrap();
        assert_eq!(run.termination, Termination::EmptyCluster);
        assert!(run.cluster.is_empty());
        assert!(run.history.is_empty());
    }

    #[test]
    fn multi_step_runs_phases_back_to_back() {
        let graph = two_cliques();
        let engine =
            LocalClusterEngine::multi_step(ConnectivityClusterDefinition::default(), true, 100, 3, 3).unwrap();
        let run = engine.cluster(&graph, &graph.resolve_indices(&[0]).unwrap()).unwrap();

        assert_eq!(run.termination, Termination::Deadlock);
        assert_eq!(indices(run.cluster.nodes()), vec![0, 1, 2, 3, 4]);
        // The second expansion phase of the first step already evaluated the bridge.
        assert_eq!(run.history.len(), 2);
        assert_eq!(run.history[0].not_added_gain_descriptors().count(), 1);
    }

    #[test]
    fn unknown_seed_index_is_rejected() {
        let graph = two_triangles();
        let engine = LocalClusterEngine::default();

        let result = engine.cluster_by_index(&graph, &[0, 42]);
        assert!(matches!(result, Err(ClusterError::NullArgument(_))));
        assert_eq!(graph.loaded_count(), 0);

        let run = engine.cluster_by_index(&graph, &[5]).unwrap();
        assert_eq!(run.cluster.len(), 6);
    }

    #[test]
    fn multi_step_rejects_zero_step_counts() {
        let result = LocalClusterEngine::multi_step(ConnectivityClusterDefinition::default(), true, 10, 0, 1);
        assert!(matches!(result, Err(ClusterError::InvalidParameter(_))));
    }

    #[test]
    fn execute_on_without_history_tags_source_nodes() {
        let graph = two_cliques();
        let engine = LocalClusterEngine::default();
        let mut cluster = engine
            .create_cluster(&graph, &graph.resolve_indices(&[1, 2]).unwrap())
            .unwrap();

        let (history, termination) = engine.run(&graph, &mut cluster).unwrap();
        assert_eq!(termination, Termination::Deadlock);
        assert_eq!(indices(history.source_nodes().iter()), vec![1, 2]);
        assert_eq!(cluster.number_of_source_nodes(), 2);
    }
}
