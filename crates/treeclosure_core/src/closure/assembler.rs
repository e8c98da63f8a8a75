//! Nested hierarchy assembly from flat closure rows.
//!
//! Children are linked through depth-1 rows only, which are relative to the
//! parent rather than the root, so one pass over the rows fills every level.

use crate::model::hierarchy::HierarchyNode;
use crate::model::tree::{ClosureRow, Node, NodeId};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Reasons flat rows fail to form one rooted tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssembleError {
    /// Every node has a parent edge (or there are no nodes).
    NoRoot,
    /// More than one node lacks a parent edge.
    MultipleRoots(Vec<NodeId>),
    /// A node is named as descendant by more than one depth-1 row.
    MultipleParents(NodeId),
    /// Nodes not reachable from the root.
    Disconnected(Vec<NodeId>),
}

impl Display for AssembleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoRoot => write!(f, "no root node found"),
            Self::MultipleRoots(ids) => write!(f, "multiple root nodes: {ids:?}"),
            Self::MultipleParents(id) => write!(f, "node {id} has more than one parent"),
            Self::Disconnected(ids) => write!(f, "nodes unreachable from root: {ids:?}"),
        }
    }
}

impl Error for AssembleError {}

/// Builds the nested hierarchy of one tree.
///
/// Depth-1 rows that mention nodes absent from `nodes` are skipped. Children
/// are ordered by node id, so repeated calls on the same input yield the same
/// output.
///
/// # Errors
/// - `NoRoot` / `MultipleRoots` unless exactly one node lacks a parent edge.
/// - `MultipleParents` when a node has two depth-1 incoming rows.
/// - `Disconnected` when some nodes cannot be reached from the root.
pub fn build_hierarchy(
    nodes: &[Node],
    closures: &[ClosureRow],
) -> Result<HierarchyNode, AssembleError> {
    let by_id: HashMap<NodeId, &Node> = nodes.iter().map(|node| (node.id, node)).collect();

    let mut parent_of: HashMap<NodeId, NodeId> = HashMap::new();
    let mut children: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    for row in closures.iter().filter(|row| row.is_direct_edge()) {
        if !by_id.contains_key(&row.ancestor_id) || !by_id.contains_key(&row.descendant_id) {
            continue;
        }
        if parent_of.insert(row.descendant_id, row.ancestor_id).is_some() {
            return Err(AssembleError::MultipleParents(row.descendant_id));
        }
        children
            .entry(row.ancestor_id)
            .or_default()
            .push(row.descendant_id);
    }
    for list in children.values_mut() {
        list.sort_unstable();
    }

    let mut roots: Vec<NodeId> = by_id
        .keys()
        .copied()
        .filter(|id| !parent_of.contains_key(id))
        .collect();
    roots.sort_unstable();
    let root_id = match roots.as_slice() {
        [] => return Err(AssembleError::NoRoot),
        [only] => *only,
        _ => return Err(AssembleError::MultipleRoots(roots)),
    };

    // Pre-order walk; a parent always precedes its children in `order`.
    let mut order = Vec::with_capacity(by_id.len());
    let mut stack = vec![root_id];
    while let Some(id) = stack.pop() {
        order.push(id);
        if let Some(kids) = children.get(&id) {
            stack.extend(kids.iter().copied());
        }
    }

    if order.len() != by_id.len() {
        let reached: HashSet<NodeId> = order.iter().copied().collect();
        let mut missing: Vec<NodeId> = by_id
            .keys()
            .copied()
            .filter(|id| !reached.contains(id))
            .collect();
        missing.sort_unstable();
        return Err(AssembleError::Disconnected(missing));
    }

    let mut built: HashMap<NodeId, HierarchyNode> = HashMap::with_capacity(order.len());
    for &id in order.iter().rev() {
        let kids: Vec<HierarchyNode> = children
            .get(&id)
            .map(|kids| kids.iter().filter_map(|kid| built.remove(kid)).collect())
            .unwrap_or_default();
        let name = by_id
            .get(&id)
            .map(|node| node.name.clone())
            .unwrap_or_default();
        built.insert(
            id,
            HierarchyNode {
                id,
                name,
                children: kids,
            },
        );
    }

    built.remove(&root_id).ok_or(AssembleError::NoRoot)
}
