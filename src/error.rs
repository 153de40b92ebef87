//! Error types shared by the clustering core

use thiserror::Error;

use crate::graph::NodeIndex;

/// Consistency violations surfaced by the clustering core.
///
/// None of these are expected control flow: they signal a caller or graph
/// provider bug and are returned to the caller as soon as they are detected.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// A required node could not be found.
    #[error("required node is missing: {0}")]
    NullArgument(String),

    /// Two distinct node handles claim the same index.
    #[error("a different node with the same index ({index}) is already {location}: {existing} - {incoming}")]
    IdentityConflict {
        index: NodeIndex,
        location: &'static str,
        existing: String,
        incoming: String,
    },

    /// A cluster definition was cloned into an instance of another type.
    #[error("cannot clone a {expected} cluster definition into a {found}")]
    IncompatibleTarget {
        expected: &'static str,
        found: &'static str,
    },

    /// A policy or engine parameter is out of range.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, ClusterError>;
