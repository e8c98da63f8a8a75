//! Computed nested views over one tree.

use crate::model::tree::{Node, NodeId, TreeId};
use serde::Serialize;

/// One node with its children populated to full depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HierarchyNode {
    pub id: NodeId,
    pub name: String,
    /// Direct children ordered by id.
    pub children: Vec<HierarchyNode>,
}

impl HierarchyNode {
    /// Counts this node and every node below it.
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(HierarchyNode::node_count)
            .sum::<usize>()
    }

    /// Finds a node in this subtree by id.
    pub fn find(&self, id: NodeId) -> Option<&HierarchyNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }
}

/// Nested tree returned to callers: `{id, name, root: {id, name, children}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeHierarchy {
    pub id: TreeId,
    pub name: String,
    pub root: HierarchyNode,
}

/// One entry of a node's ancestor chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AncestorEntry {
    pub node: Node,
    /// Distance from the queried node; 0 is the node itself.
    pub depth: u32,
}
