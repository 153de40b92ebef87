//! Hierarchical cluster engine
//!
//! Repeats local clustering with a progressively relaxed definition until the
//! cluster reaches a minimum size. Each repetition is a hierarchy level.

use crate::cluster::Cluster;
use crate::definition::{ConnectivityClusterDefinition, GainDescriptor, HierarchicalClusterDefinition};
use crate::engine::{ClusterEngine, LocalClusterEngine, Termination};
use crate::error::Result;
use crate::graph::Graph;
use crate::history::StepHistory;

/// Default lower limit of the cluster size
pub const DEFAULT_MIN_CLUSTER_SIZE: usize = 15;

#[derive(Debug, Clone)]
pub struct HierarchicalClusterEngine<D = ConnectivityClusterDefinition> {
    engine: LocalClusterEngine<D>,
    min_cluster_size: usize,
}

impl Default for HierarchicalClusterEngine<ConnectivityClusterDefinition> {
    fn default() -> Self {
        Self::new(LocalClusterEngine::default(), DEFAULT_MIN_CLUSTER_SIZE)
    }
}

impl<D: HierarchicalClusterDefinition + Clone> HierarchicalClusterEngine<D> {
    /// Wrap `engine`, whose definition is the starting point of every run.
    pub fn new(engine: LocalClusterEngine<D>, min_cluster_size: usize) -> Self {
        Self {
            engine,
            min_cluster_size,
        }
    }

    pub fn engine(&self) -> &LocalClusterEngine<D> {
        &self.engine
    }

    pub fn min_cluster_size(&self) -> usize {
        self.min_cluster_size
    }

    /// Run local clustering level by level on a private copy of the engine.
    ///
    /// Returns the termination reason and the definition in effect at the
    /// last level. The definition of this engine is never modified.
    pub fn escalate(
        &self,
        graph: &dyn Graph,
        cluster: &mut Cluster,
        history: &mut StepHistory,
    ) -> Result<(Termination, D)> {
        let mut engine = self.engine.clone();
        let mut levels = 0;

        while cluster.len() < self.min_cluster_size {
            if engine.execute_on(graph, cluster, history)? == Termination::EmptyCluster {
                return Ok((Termination::EmptyCluster, engine.definition().clone()));
            }
            levels += 1;

            if cluster.len() >= self.min_cluster_size {
                break;
            }

            let descriptors: Vec<&GainDescriptor> = match history.last_step() {
                Some(step) => step
                    .removed_gain_descriptors()
                    .chain(step.not_added_gain_descriptors())
                    .collect(),
                None => Vec::new(),
            };

            if !engine.definition_mut().adjust_for_next_level(&descriptors) {
                log::warn!(
                    "Cluster definition saturated after {} levels, cluster size {} is below the minimum of {}",
                    levels,
                    cluster.len(),
                    self.min_cluster_size
                );
                return Ok((
                    Termination::EscalationSaturated { levels },
                    engine.definition().clone(),
                ));
            }

            log::info!(
                "Escalating to level {} with cluster size {}: {:?}",
                levels,
                cluster.len(),
                engine.definition()
            );
        }

        Ok((Termination::MinimumSizeReached { levels }, engine.definition().clone()))
    }
}

impl<D: HierarchicalClusterDefinition + Clone> ClusterEngine for HierarchicalClusterEngine<D> {
    fn source_nodes_in_result(&self) -> bool {
        self.engine.source_nodes_in_result()
    }

    fn execute_on(&self, graph: &dyn Graph, cluster: &mut Cluster, history: &mut StepHistory) -> Result<Termination> {
        self.escalate(graph, cluster, history).map(|(termination, _)| termination)
    }
}
