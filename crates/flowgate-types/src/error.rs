use thiserror::Error;

use crate::execution::StepStatus;

/// The workflow document is not even shape-valid.
///
/// Raised only when the root is not an object or when the node/edge
/// collections are missing or not arrays. Semantic problems are reported by
/// the validator instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedInputError {
    #[error("workflow document must be a JSON object")]
    NotAnObject,

    #[error("workflow document has no '{0}' array")]
    MissingCollection(&'static str),
}

impl MalformedInputError {
    /// Document path the error points at.
    pub fn path(&self) -> &'static str {
        match self {
            MalformedInputError::NotAnObject => "root",
            MalformedInputError::MissingCollection(name) => name,
        }
    }
}

/// A node class tag that is not part of the closed set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown node class '{0}'")]
pub struct UnknownNodeClass(pub String);

/// An execution step was asked to make an illegal state transition.
///
/// Only reachable through an engine defect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("step '{node_id}' cannot move from {from} to {to}")]
pub struct StepTransitionError {
    pub node_id: String,
    pub from: StepStatus,
    pub to: StepStatus,
}
