//! Tree, node, and closure-row records.
//!
//! # Responsibility
//! - Define the stored records the closure store reads and writes.
//! - Own name normalization shared by trees, nodes, and renames.
//!
//! # Invariants
//! - `depth == 0` if and only if `ancestor_id == descendant_id`.
//! - `depth == 1` marks the direct parent edge of `descendant_id`.
//! - Names are trimmed, non-blank, and at most `MAX_NAME_CHARS` chars.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-generated tree identifier.
pub type TreeId = i64;

/// Store-generated node identifier.
pub type NodeId = i64;

/// Upper bound for tree and node names, in characters.
pub const MAX_NAME_CHARS: usize = 256;

/// Name given to the node created alongside every new tree.
pub const ROOT_NODE_NAME: &str = "Root";

/// Named tree. Names are globally unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    pub id: TreeId,
    pub name: String,
}

/// Stored node record.
///
/// Carries no parent or child links; structure lives in closure rows only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Owning tree.
    pub tree_id: TreeId,
    pub name: String,
}

/// One materialized ancestor/descendant pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClosureRow {
    pub tree_id: TreeId,
    pub ancestor_id: NodeId,
    pub descendant_id: NodeId,
    /// Path length from ancestor to descendant.
    pub depth: u32,
}

impl ClosureRow {
    /// Builds the depth-0 row every node owns for its whole lifetime.
    pub fn self_row(tree_id: TreeId, node_id: NodeId) -> Self {
        Self {
            tree_id,
            ancestor_id: node_id,
            descendant_id: node_id,
            depth: 0,
        }
    }

    /// Returns whether this is a node's self row.
    pub fn is_self(&self) -> bool {
        self.depth == 0
    }

    /// Returns whether this row is a direct parent -> child edge.
    pub fn is_direct_edge(&self) -> bool {
        self.depth == 1
    }
}

/// Name validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    /// Name is empty after trim.
    Blank,
    /// Name exceeds `MAX_NAME_CHARS` after trim.
    TooLong { chars: usize },
}

impl Display for NameError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blank => write!(f, "name must not be blank"),
            Self::TooLong { chars } => write!(
                f,
                "name must be at most {MAX_NAME_CHARS} characters, got {chars}"
            ),
        }
    }
}

impl Error for NameError {}

/// Normalizes a tree or node name.
///
/// Returns the trimmed name when it is non-blank and within bounds.
pub fn validate_name(value: &str) -> Result<String, NameError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(NameError::Blank);
    }
    let chars = trimmed.chars().count();
    if chars > MAX_NAME_CHARS {
        return Err(NameError::TooLong { chars });
    }
    Ok(trimmed.to_string())
}
