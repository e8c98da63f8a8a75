//! Error taxonomy for closure operations.

use crate::closure::assembler::AssembleError;
use crate::model::tree::{NameError, NodeId, TreeId};
use crate::repo::closure_repo::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type used by closure maintenance and tree services.
pub type ClosureResult<T> = Result<T, ClosureError>;

/// Caller-facing failure category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Referenced tree, node, or parent is absent.
    NotFound,
    /// Request breaks a structural or naming rule.
    InvalidOperation,
    /// Request collided with concurrent or existing state.
    Conflict,
    /// Store failure or corrupted persisted structure.
    Unexpected,
}

impl ErrorKind {
    /// Stable lowercase label used in log lines and CLI output.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidOperation => "invalid_operation",
            Self::Conflict => "conflict",
            Self::Unexpected => "unexpected",
        }
    }
}

/// Errors from closure maintenance and tree service operations.
#[derive(Debug)]
pub enum ClosureError {
    /// Tree does not exist.
    TreeNotFound(TreeId),
    /// Target node does not exist.
    NodeNotFound(NodeId),
    /// Requested parent node does not exist.
    ParentNotFound(NodeId),
    /// Tree or node name failed validation.
    InvalidName(NameError),
    /// Target node has no parent edge.
    CannotDeleteRoot(NodeId),
    /// Target node still has direct children.
    NodeHasChildren(NodeId),
    /// Root creation requested for a tree that already has nodes.
    RootAlreadyExists(TreeId),
    /// Root creation requested without naming a tree.
    TreeRequired,
    /// Parent belongs to a different tree than the one requested.
    CrossTreeParent {
        parent_id: NodeId,
        parent_tree_id: TreeId,
        requested_tree_id: TreeId,
    },
    /// Another tree already uses this name.
    DuplicateTreeName(String),
    /// Stored closure rows contradict the closure invariants for one node.
    InconsistentClosure { node_id: NodeId, reason: String },
    /// Stored rows of one tree do not assemble into a single rooted tree.
    CorruptHierarchy {
        tree_id: TreeId,
        source: AssembleError,
    },
    /// Repository-level failure.
    Store(StoreError),
}

impl ClosureError {
    /// Maps this error onto its caller-facing category.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TreeNotFound(_) | Self::NodeNotFound(_) | Self::ParentNotFound(_) => {
                ErrorKind::NotFound
            }
            Self::InvalidName(_)
            | Self::CannotDeleteRoot(_)
            | Self::NodeHasChildren(_)
            | Self::RootAlreadyExists(_)
            | Self::TreeRequired
            | Self::CrossTreeParent { .. } => ErrorKind::InvalidOperation,
            Self::DuplicateTreeName(_)
            | Self::Store(StoreError::UniqueViolation(_))
            | Self::Store(StoreError::Busy(_)) => ErrorKind::Conflict,
            Self::InconsistentClosure { .. } | Self::CorruptHierarchy { .. } | Self::Store(_) => {
                ErrorKind::Unexpected
            }
        }
    }
}

impl Display for ClosureError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TreeNotFound(id) => write!(f, "tree not found: {id}"),
            Self::NodeNotFound(id) => write!(f, "node not found: {id}"),
            Self::ParentNotFound(id) => write!(f, "parent node not found: {id}"),
            Self::InvalidName(err) => write!(f, "invalid name: {err}"),
            Self::CannotDeleteRoot(id) => write!(f, "cannot delete root node {id}"),
            Self::NodeHasChildren(id) => {
                write!(f, "node {id} has children; delete all child nodes first")
            }
            Self::RootAlreadyExists(id) => write!(f, "tree {id} already has a root node"),
            Self::TreeRequired => write!(f, "a tree id is required when no parent is given"),
            Self::CrossTreeParent {
                parent_id,
                parent_tree_id,
                requested_tree_id,
            } => write!(
                f,
                "parent node {parent_id} belongs to tree {parent_tree_id}, not tree {requested_tree_id}"
            ),
            Self::DuplicateTreeName(name) => write!(f, "tree name already exists: {name}"),
            Self::InconsistentClosure { node_id, reason } => {
                write!(f, "inconsistent closure rows for node {node_id}: {reason}")
            }
            Self::CorruptHierarchy { tree_id, source } => {
                write!(f, "tree {tree_id} cannot be assembled: {source}")
            }
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ClosureError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidName(err) => Some(err),
            Self::CorruptHierarchy { source, .. } => Some(source),
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for ClosureError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NodeNotFound(node_id) => Self::NodeNotFound(node_id),
            other => Self::Store(other),
        }
    }
}

impl From<NameError> for ClosureError {
    fn from(value: NameError) -> Self {
        Self::InvalidName(value)
    }
}
