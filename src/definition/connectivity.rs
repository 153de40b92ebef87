//! Connectivity based cluster definition

use std::any::Any;

use serde::{Deserialize, Serialize};

use crate::cluster::Cluster;
use crate::definition::{ClusterDefinition, GainDescriptor, GainPayload, HierarchicalClusterDefinition};
use crate::error::{ClusterError, Result};
use crate::graph::{Graph, Node};

/// Smallest factor applied to the weighting coefficient per hierarchy level
pub const MIN_LEVEL_MULTIPLIER: f64 = 1.05;

/// Scores a node by the number of its edges into the cluster.
///
/// The quality of a node is `weighting_coefficient` times its number of member
/// neighbors. It is compared against
/// `threshold_modifier * min(max(size - 2, 0), node degree, average member degree)`.
/// The threshold is intentionally not halved: the weighting coefficient
/// counts as twice the weight of an edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivityClusterDefinition {
    weighting_coefficient: f64,
    threshold_modifier: f64,
}

impl Default for ConnectivityClusterDefinition {
    fn default() -> Self {
        Self {
            weighting_coefficient: 2.0,
            threshold_modifier: 0.85,
        }
    }
}

impl ConnectivityClusterDefinition {
    /// Both parameters must be positive.
    pub fn new(weighting_coefficient: f64, threshold_modifier: f64) -> Result<Self> {
        if !(weighting_coefficient > 0.0) {
            return Err(ClusterError::InvalidParameter(format!(
                "weighting coefficient must be positive, got {}",
                weighting_coefficient
            )));
        }
        if !(threshold_modifier > 0.0) {
            return Err(ClusterError::InvalidParameter(format!(
                "threshold modifier must be positive, got {}",
                threshold_modifier
            )));
        }

        Ok(Self {
            weighting_coefficient,
            threshold_modifier,
        })
    }

    pub fn weighting_coefficient(&self) -> f64 {
        self.weighting_coefficient
    }

    pub fn threshold_modifier(&self) -> f64 {
        self.threshold_modifier
    }

    /// Returns `(quality, threshold)` for `node`, threshold is None if the node
    /// has no edge into the cluster.
    fn evaluate(&self, graph: &dyn Graph, node: &Node, cluster: &Cluster) -> Result<(f64, Option<f64>)> {
        let mut connections = 0usize;
        for neighbor in graph.neighbors(node) {
            if cluster.contains(&neighbor)? {
                connections += 1;
            }
        }

        let quality = self.weighting_coefficient * connections as f64;
        if quality <= 0.0 {
            return Ok((quality, None));
        }

        let cluster_size = cluster.len();
        let average_degree = cluster.aggregate_degree() as f64 / cluster_size as f64;
        let threshold = self.threshold_modifier
            * (cluster_size.saturating_sub(2) as f64)
                .min(graph.degree(node) as f64)
                .min(average_degree);

        Ok((quality, Some(threshold)))
    }

    fn descriptor(&self, node: &Node, result: bool, coefficient_multiplier: f64) -> GainDescriptor {
        GainDescriptor::new(
            node.clone(),
            result,
            GainPayload::Connectivity {
                weighting_coefficient: self.weighting_coefficient,
                coefficient_multiplier,
            },
        )
    }
}

impl ClusterDefinition for ConnectivityClusterDefinition {
    fn kind(&self) -> &'static str {
        "connectivity"
    }

    fn gain_of_inclusion(&self, graph: &dyn Graph, node: &Node, cluster: &Cluster) -> Result<GainDescriptor> {
        Ok(match self.evaluate(graph, node, cluster)? {
            (quality, Some(threshold)) => self.descriptor(node, quality >= threshold, threshold / quality),
            (_, None) => self.descriptor(node, false, 0.0),
        })
    }

    fn gain_of_exclusion(&self, graph: &dyn Graph, node: &Node, cluster: &Cluster) -> Result<GainDescriptor> {
        // Strict comparison: a node exactly on the threshold stays once admitted.
        Ok(match self.evaluate(graph, node, cluster)? {
            (quality, Some(threshold)) => self.descriptor(node, quality < threshold, threshold / quality),
            (_, None) => self.descriptor(node, true, 0.0),
        })
    }

    fn clone_into_target(&self, target: &mut dyn ClusterDefinition) -> Result<()> {
        let found = target.kind();
        match target.as_any_mut().downcast_mut::<Self>() {
            Some(target) => {
                target.weighting_coefficient = self.weighting_coefficient;
                target.threshold_modifier = self.threshold_modifier;
                Ok(())
            }
            None => Err(ClusterError::IncompatibleTarget {
                expected: self.kind(),
                found,
            }),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl HierarchicalClusterDefinition for ConnectivityClusterDefinition {
    fn adjust_for_next_level(&mut self, descriptors: &[&GainDescriptor]) -> bool {
        // TODO: pick the next level from the multiplier distribution instead of
        // the smallest multiplier, large graphs escalate one node at a time.
        let multiplier = descriptors
            .iter()
            .map(|descriptor| descriptor.coefficient_multiplier())
            .filter(|&multiplier| multiplier > 1.0)
            .min_by(f64::total_cmp);

        match multiplier {
            Some(multiplier) => {
                self.weighting_coefficient *= multiplier.max(MIN_LEVEL_MULTIPLIER);
                true
            }
            None => false,
        }
    }
}
