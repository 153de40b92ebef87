//! Cluster definitions: the scoring policies that drive the cluster engines

pub mod connectivity;

use std::any::Any;
use std::fmt;

use crate::cluster::Cluster;
use crate::error::Result;
use crate::graph::{Graph, Node};

pub use connectivity::ConnectivityClusterDefinition;

/// Policy-specific data recorded with a decision.
#[derive(Debug, Clone, PartialEq)]
pub enum GainPayload {
    /// The policy does not record anything beyond the decision.
    None,

    /// Recorded by [`ConnectivityClusterDefinition`].
    Connectivity {
        /// Edge weighting coefficient in effect when the decision was made
        weighting_coefficient: f64,

        /// Factor the weighting coefficient has to be multiplied with for the
        /// node to pass the threshold, 0 when the node has no edge into the cluster
        coefficient_multiplier: f64,
    },
}

/// Outcome of one inclusion or exclusion evaluation.
#[derive(Debug, Clone)]
pub struct GainDescriptor {
    node: Node,
    result: bool,
    payload: GainPayload,
}

impl GainDescriptor {
    pub fn new(node: Node, result: bool, payload: GainPayload) -> Self {
        Self {
            node,
            result,
            payload,
        }
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Whether including (or excluding) the node improves the cluster.
    pub fn result(&self) -> bool {
        self.result
    }

    pub fn payload(&self) -> &GainPayload {
        &self.payload
    }

    /// Multiplier recorded by the connectivity policy, 0 for other payloads.
    pub fn coefficient_multiplier(&self) -> f64 {
        match self.payload {
            GainPayload::Connectivity {
                coefficient_multiplier,
                ..
            } => coefficient_multiplier,
            GainPayload::None => 0.0,
        }
    }

    /// Score of the node derived from this decision, 0 if the policy cannot rank.
    pub fn rank(&self) -> f64 {
        match self.payload {
            GainPayload::Connectivity {
                weighting_coefficient,
                coefficient_multiplier,
            } if coefficient_multiplier > 0.0 => weighting_coefficient / coefficient_multiplier,
            _ => 0.0,
        }
    }
}

/// Scoring policy consulted by the cluster engines.
///
/// Implementations must be deterministic: the decision may depend only on the
/// node, the graph and the cluster passed in.
pub trait ClusterDefinition: Any + fmt::Debug {
    /// Short, human-readable name of the concrete policy
    fn kind(&self) -> &'static str;

    /// Whether adding `node` to `cluster` would improve it.
    fn gain_of_inclusion(&self, graph: &dyn Graph, node: &Node, cluster: &Cluster) -> Result<GainDescriptor>;

    /// Whether removing `node` from `cluster` would improve it.
    fn gain_of_exclusion(&self, graph: &dyn Graph, node: &Node, cluster: &Cluster) -> Result<GainDescriptor>;

    /// Copy the policy parameters into `target`, which must be the same
    /// concrete policy type.
    fn clone_into_target(&self, target: &mut dyn ClusterDefinition) -> Result<()>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Policy that can relax itself between hierarchy levels.
pub trait HierarchicalClusterDefinition: ClusterDefinition {
    /// Adjust the policy for the next hierarchy level based on the decisions of
    /// the last step. Returns false when no further adjustment is possible.
    fn adjust_for_next_level(&mut self, descriptors: &[&GainDescriptor]) -> bool;
}
