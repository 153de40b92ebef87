//! Local graph clustering
//!
//! Grows a cluster around seed nodes of a lazily discovered graph by
//! alternating expansion and reduction steps driven by a pluggable cluster
//! definition, optionally relaxing the definition level by level until the
//! cluster reaches a minimum size.

pub mod cluster;
pub mod config;
pub mod data;
pub mod definition;
pub mod engine;
pub mod error;
pub mod graph;
pub mod history;
pub mod ranking;
pub mod storage;
pub mod viz;

pub use cluster::Cluster;
pub use config::Config;
pub use definition::{ClusterDefinition, ConnectivityClusterDefinition, GainDescriptor, HierarchicalClusterDefinition};
pub use engine::{ClusterEngine, ClusteringRun, HierarchicalClusterEngine, LocalClusterEngine, Termination};
pub use error::{ClusterError, Result};
pub use graph::{CompressedGraph, Graph, GraphBuilder, LazyGraph, Node, NodeIndex};
pub use history::{StepDescriptor, StepHistory};
pub use ranking::{RankProvider, StepHistoryRankProvider};
