//! Closure row maintenance for node creation and deletion.
//!
//! # Responsibility
//! - Insert a node together with its self row and inherited ancestor rows.
//! - Delete a leaf node together with every row that references it.
//! - Read a node's ancestor chain without recursive traversal.
//!
//! # Invariants
//! - Functions here run inside a caller-owned transaction and never commit.
//! - Validation happens before the first write of each operation.

use crate::closure::error::{ClosureError, ClosureResult};
use crate::model::hierarchy::AncestorEntry;
use crate::model::tree::{validate_name, ClosureRow, Node, NodeId, TreeId};
use crate::repo::closure_repo::StoreTransaction;
use log::debug;

/// Computes the closure rows a new node needs.
///
/// `parent_chain` is every row naming the parent as descendant, including
/// the parent's own self row. Each `(A, parent, d)` becomes `(A, node, d + 1)`,
/// so the parent's self row yields the direct depth-1 edge.
///
/// # Errors
/// - `InconsistentClosure` when an inherited depth does not fit in `u32`.
pub fn plan_inherited_rows(
    tree_id: TreeId,
    node_id: NodeId,
    parent_chain: &[ClosureRow],
) -> ClosureResult<Vec<ClosureRow>> {
    let mut rows = Vec::with_capacity(parent_chain.len() + 1);
    rows.push(ClosureRow::self_row(tree_id, node_id));
    for ancestor in parent_chain {
        let depth = ancestor.depth.checked_add(1).ok_or_else(|| {
            ClosureError::InconsistentClosure {
                node_id: ancestor.descendant_id,
                reason: format!("depth overflow on row from ancestor {}", ancestor.ancestor_id),
            }
        })?;
        rows.push(ClosureRow {
            tree_id,
            ancestor_id: ancestor.ancestor_id,
            descendant_id: node_id,
            depth,
        });
    }
    Ok(rows)
}

/// Creates one node and its closure rows.
///
/// With a parent, the node joins the parent's tree; a `tree_id` that names a
/// different tree is rejected. Without a parent, the node becomes the root of
/// `tree_id`, which must exist and hold no nodes yet.
///
/// # Errors
/// - `InvalidName` for blank or oversized names.
/// - `ParentNotFound`, `TreeNotFound` for missing references.
/// - `CrossTreeParent`, `TreeRequired`, `RootAlreadyExists` for invalid shapes.
pub fn insert_node<T: StoreTransaction + ?Sized>(
    tx: &T,
    tree_id: Option<TreeId>,
    name: &str,
    parent_id: Option<NodeId>,
) -> ClosureResult<Node> {
    let name = validate_name(name)?;

    let (tree_id, parent_chain) = match parent_id {
        Some(parent_id) => {
            let parent = tx
                .get_node(parent_id)?
                .ok_or(ClosureError::ParentNotFound(parent_id))?;
            if let Some(requested_tree_id) = tree_id {
                if requested_tree_id != parent.tree_id {
                    return Err(ClosureError::CrossTreeParent {
                        parent_id,
                        parent_tree_id: parent.tree_id,
                        requested_tree_id,
                    });
                }
            }
            let chain = tx.list_ancestor_rows(parent_id)?;
            if !chain
                .iter()
                .any(|row| row.is_self() && row.ancestor_id == parent_id)
            {
                return Err(ClosureError::InconsistentClosure {
                    node_id: parent_id,
                    reason: "missing self row".to_string(),
                });
            }
            (parent.tree_id, chain)
        }
        None => {
            let tree_id = tree_id.ok_or(ClosureError::TreeRequired)?;
            tx.get_tree(tree_id)?
                .ok_or(ClosureError::TreeNotFound(tree_id))?;
            if !tx.list_nodes_by_tree(tree_id)?.is_empty() {
                return Err(ClosureError::RootAlreadyExists(tree_id));
            }
            (tree_id, Vec::new())
        }
    };

    let node_id = tx.put_node(tree_id, &name)?;
    let rows = plan_inherited_rows(tree_id, node_id, &parent_chain)?;
    for row in &rows {
        tx.put_closure_row(row)?;
    }
    debug!(
        "event=closure_insert module=closure node_id={} tree_id={} rows={}",
        node_id,
        tree_id,
        rows.len()
    );

    Ok(Node {
        id: node_id,
        tree_id,
        name,
    })
}

/// Deletes one childless, non-root node and every closure row naming it.
///
/// The root check and the leaf check are independent; both are evaluated
/// before any row is touched.
///
/// # Errors
/// - `NodeNotFound` when the node is absent.
/// - `CannotDeleteRoot` when the node has no depth-1 incoming row.
/// - `NodeHasChildren` when the node has a depth-1 outgoing row.
pub fn remove_leaf_node<T: StoreTransaction + ?Sized>(
    tx: &T,
    node_id: NodeId,
) -> ClosureResult<Node> {
    let node = tx
        .get_node(node_id)?
        .ok_or(ClosureError::NodeNotFound(node_id))?;

    let is_root = !tx.has_incoming_edge(node_id)?;
    let has_children = tx.has_outgoing_edge(node_id)?;
    if is_root {
        return Err(ClosureError::CannotDeleteRoot(node_id));
    }
    if has_children {
        return Err(ClosureError::NodeHasChildren(node_id));
    }

    // Childless, so every row is either the self row or an ancestor row.
    let rows = tx.list_closure_rows_by_node(node_id)?;
    if let Some(stray) = rows
        .iter()
        .find(|row| row.ancestor_id == node_id && row.descendant_id != node_id)
    {
        return Err(ClosureError::InconsistentClosure {
            node_id,
            reason: format!(
                "descendant {} at depth {} without a direct child edge",
                stray.descendant_id, stray.depth
            ),
        });
    }

    let removed = tx.delete_closure_rows(&rows)?;
    tx.delete_node(node_id)?;
    debug!(
        "event=closure_remove module=closure node_id={} tree_id={} rows={}",
        node_id, node.tree_id, removed
    );

    Ok(node)
}

/// Lists a node's ancestor chain, the node itself first at depth 0.
pub fn ancestors_of<T: StoreTransaction + ?Sized>(
    tx: &T,
    node_id: NodeId,
) -> ClosureResult<Vec<AncestorEntry>> {
    tx.get_node(node_id)?
        .ok_or(ClosureError::NodeNotFound(node_id))?;

    tx.list_ancestor_rows(node_id)?
        .into_iter()
        .map(|row| -> ClosureResult<AncestorEntry> {
            let node = tx
                .get_node(row.ancestor_id)?
                .ok_or_else(|| ClosureError::InconsistentClosure {
                    node_id,
                    reason: format!("ancestor {} has no node row", row.ancestor_id),
                })?;
            Ok(AncestorEntry {
                node,
                depth: row.depth,
            })
        })
        .collect()
}
