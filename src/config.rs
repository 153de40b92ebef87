//! Configuration management for the local cluster engines

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::definition::ConnectivityClusterDefinition;
use crate::engine::hierarchical::DEFAULT_MIN_CLUSTER_SIZE;
use crate::engine::local::DEFAULT_MAX_CLUSTER_SIZE;
use crate::engine::{HierarchicalClusterEngine, LocalClusterEngine};
use crate::error::{ClusterError, Result};
use crate::history::DEFAULT_LOOP_LOOKBACK;

/// Every tunable of the cluster engines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Weight of an edge into the cluster
    pub weighting_coefficient: f64,

    /// Scaling factor of the admission threshold
    pub threshold_modifier: f64,

    /// Whether the seeds are protected source nodes
    pub source_nodes_in_result: bool,

    /// Size at which the local engine stops
    pub max_cluster_size: usize,

    /// Size the hierarchical engine escalates towards
    pub min_cluster_size: usize,

    /// Expansion phases per iteration
    pub expansion_step_count: usize,

    /// Reduction phases per iteration
    pub reduction_step_count: usize,

    /// Earlier steps compared against the last one for loop detection
    pub loop_lookback: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            weighting_coefficient: 2.0,
            threshold_modifier: 0.85,
            source_nodes_in_result: true,
            max_cluster_size: DEFAULT_MAX_CLUSTER_SIZE,
            min_cluster_size: DEFAULT_MIN_CLUSTER_SIZE,
            expansion_step_count: 1,
            reduction_step_count: 1,
            loop_lookback: DEFAULT_LOOP_LOOKBACK,
        }
    }
}

impl Config {
    /// Load a configuration file; missing fields keep their default values.
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        log::info!("Reading configuration: {}", path.display());

        let config: Config = serde_json::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.definition()?;

        let counts = [
            ("max_cluster_size", self.max_cluster_size),
            ("expansion_step_count", self.expansion_step_count),
            ("reduction_step_count", self.reduction_step_count),
        ];
        if let Some((name, _)) = counts.iter().find(|(_, value)| *value == 0) {
            return Err(ClusterError::InvalidParameter(format!("{} must be at least 1", name)));
        }

        Ok(())
    }

    pub fn definition(&self) -> Result<ConnectivityClusterDefinition> {
        ConnectivityClusterDefinition::new(self.weighting_coefficient, self.threshold_modifier)
    }

    pub fn local_engine(&self) -> Result<LocalClusterEngine> {
        self.validate()?;
        let engine = LocalClusterEngine::multi_step(
            self.definition()?,
            self.source_nodes_in_result,
            self.max_cluster_size,
            self.expansion_step_count,
            self.reduction_step_count,
        )?;
        Ok(engine.with_loop_lookback(self.loop_lookback))
    }

    pub fn hierarchical_engine(&self) -> Result<HierarchicalClusterEngine> {
        Ok(HierarchicalClusterEngine::new(self.local_engine()?, self.min_cluster_size))
    }
}
