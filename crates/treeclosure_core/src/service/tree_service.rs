//! Tree use-case service.
//!
//! # Responsibility
//! - Provide get-or-create, node create/delete/rename, and read operations.
//! - Run each operation as one transaction through `TransactionCoordinator`;
//!   read-only operations use a read transaction.
//!
//! # Invariants
//! - Every tree has exactly one root, created together with the tree.
//! - Nested views are assembled per call and never written back.
//! - Duplicate tree names surface as `DuplicateTreeName`; nothing is retried.

use crate::closure::assembler::build_hierarchy;
use crate::closure::error::{ClosureError, ClosureResult};
use crate::closure::maintenance::{ancestors_of, insert_node, remove_leaf_node};
use crate::model::hierarchy::{AncestorEntry, TreeHierarchy};
use crate::model::tree::{validate_name, Node, NodeId, Tree, TreeId, ROOT_NODE_NAME};
use crate::repo::closure_repo::{StoreError, StoreTransaction, TreeStore};
use crate::service::coordinator::TransactionCoordinator;

/// Tree service facade.
pub struct TreeService<S: TreeStore> {
    coordinator: TransactionCoordinator<S>,
}

impl<S: TreeStore> TreeService<S> {
    /// Creates service from store implementation.
    pub fn new(store: S) -> Self {
        Self {
            coordinator: TransactionCoordinator::new(store),
        }
    }

    /// Loads the tree named `name`, creating it with a "Root" node first
    /// when it does not exist yet.
    pub fn get_or_create_tree(&self, name: &str) -> ClosureResult<TreeHierarchy> {
        let name = validate_name(name)?;
        self.coordinator.run("get_or_create_tree", "", |tx| {
            let tree = match tx.get_tree_by_name(&name)? {
                Some(tree) => tree,
                None => create_tree_with_root(tx, &name)?,
            };
            load_hierarchy(tx, tree)
        })
    }

    /// Loads an existing tree by id.
    pub fn get_tree(&self, tree_id: TreeId) -> ClosureResult<TreeHierarchy> {
        let ids = format!("tree_id={tree_id}");
        self.coordinator.run_read("get_tree", &ids, |tx| {
            let tree = tx
                .get_tree(tree_id)?
                .ok_or(ClosureError::TreeNotFound(tree_id))?;
            load_hierarchy(tx, tree)
        })
    }

    /// Creates one node under `parent_id`, or as the root of `tree_id` when no
    /// parent is given.
    pub fn create_node(
        &self,
        tree_id: Option<TreeId>,
        name: &str,
        parent_id: Option<NodeId>,
    ) -> ClosureResult<Node> {
        let ids = format!(
            "tree_id={} parent_id={}",
            display_id(tree_id),
            display_id(parent_id)
        );
        self.coordinator.run("create_node", &ids, |tx| {
            insert_node(tx, tree_id, name, parent_id)
        })
    }

    /// Deletes one childless, non-root node and returns it.
    pub fn delete_node(&self, node_id: NodeId) -> ClosureResult<Node> {
        let ids = format!("node_id={node_id}");
        self.coordinator
            .run("delete_node", &ids, |tx| remove_leaf_node(tx, node_id))
    }

    /// Renames one node and returns the updated record.
    pub fn rename_node(&self, node_id: NodeId, name: &str) -> ClosureResult<Node> {
        let name = validate_name(name)?;
        let ids = format!("node_id={node_id}");
        self.coordinator.run("rename_node", &ids, |tx| {
            tx.rename_node(node_id, &name)?;
            tx.get_node(node_id)?
                .ok_or(ClosureError::NodeNotFound(node_id))
        })
    }

    /// Lists the ancestor chain of one node, nearest first.
    pub fn list_ancestors(&self, node_id: NodeId) -> ClosureResult<Vec<AncestorEntry>> {
        let ids = format!("node_id={node_id}");
        self.coordinator
            .run_read("list_ancestors", &ids, |tx| ancestors_of(tx, node_id))
    }
}

fn create_tree_with_root<T: StoreTransaction>(tx: &T, name: &str) -> ClosureResult<Tree> {
    let tree_id = match tx.put_tree(name) {
        Ok(tree_id) => tree_id,
        Err(StoreError::UniqueViolation(_)) => {
            return Err(ClosureError::DuplicateTreeName(name.to_string()));
        }
        Err(err) => return Err(err.into()),
    };
    insert_node(tx, Some(tree_id), ROOT_NODE_NAME, None)?;
    Ok(Tree {
        id: tree_id,
        name: name.to_string(),
    })
}

fn load_hierarchy<T: StoreTransaction>(tx: &T, tree: Tree) -> ClosureResult<TreeHierarchy> {
    let nodes = tx.list_nodes_by_tree(tree.id)?;
    let closures = tx.list_closure_rows_by_tree(tree.id)?;
    let root =
        build_hierarchy(&nodes, &closures).map_err(|source| ClosureError::CorruptHierarchy {
            tree_id: tree.id,
            source,
        })?;
    Ok(TreeHierarchy {
        id: tree.id,
        name: tree.name,
        root,
    })
}

fn display_id(id: Option<i64>) -> String {
    id.map_or_else(|| "none".to_string(), |id| id.to_string())
}
