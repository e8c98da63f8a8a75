use rusqlite::Connection;
use std::cell::Cell;
use treeclosure_core::db::open_db_in_memory;
use treeclosure_core::{
    ClosureError, ClosureRow, ErrorKind, Node, NodeId, SqliteStoreTransaction, SqliteTreeStore,
    StoreError, StoreResult, StoreTransaction, Tree, TreeId, TreeService, TreeStore,
};

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn closure_rows(conn: &Connection) -> Vec<(i64, i64, i64)> {
    let mut stmt = conn
        .prepare(
            "SELECT ancestor_id, descendant_id, depth
             FROM closure_rows
             ORDER BY descendant_id ASC, depth ASC;",
        )
        .unwrap();
    let rows = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .unwrap();
    let collected = rows.map(Result::unwrap).collect();
    collected
}

fn count(conn: &Connection, sql: &str) -> i64 {
    conn.query_row(sql, [], |row| row.get(0)).unwrap()
}

/// Checks the closure invariants that must hold after every operation.
fn assert_closure_invariants(conn: &Connection) {
    let nodes = count(conn, "SELECT COUNT(*) FROM nodes;");
    let self_rows = count(conn, "SELECT COUNT(*) FROM closure_rows WHERE depth = 0;");
    assert_eq!(nodes, self_rows, "one self row per node");

    let multi_parent = count(
        conn,
        "SELECT COUNT(*) FROM (
            SELECT descendant_id FROM closure_rows
            WHERE depth = 1
            GROUP BY descendant_id
            HAVING COUNT(*) > 1
        );",
    );
    assert_eq!(multi_parent, 0, "at most one parent edge per node");

    let roots_per_tree_ok = count(
        conn,
        "SELECT COUNT(*) FROM (
            SELECT n.tree_id, COUNT(*) AS roots
            FROM nodes n
            WHERE NOT EXISTS (
                SELECT 1 FROM closure_rows c
                WHERE c.descendant_id = n.id AND c.depth = 1
            )
            GROUP BY n.tree_id
            HAVING roots != 1
        );",
    );
    assert_eq!(roots_per_tree_ok, 0, "exactly one root per tree");

    let orphan_rows = count(
        conn,
        "SELECT COUNT(*) FROM closure_rows c
         WHERE NOT EXISTS (SELECT 1 FROM nodes n WHERE n.id = c.ancestor_id)
            OR NOT EXISTS (SELECT 1 FROM nodes n WHERE n.id = c.descendant_id);",
    );
    assert_eq!(orphan_rows, 0, "rows only reference stored nodes");
}

#[test]
fn sales_scenario_maintains_closure_rows_step_by_step() {
    let conn = setup();
    let service = TreeService::new(SqliteTreeStore::try_new(&conn).unwrap());

    let tree = service.get_or_create_tree("Sales").unwrap();
    assert_eq!(tree.id, 1);
    assert_eq!(tree.root.id, 1);
    assert_eq!(tree.root.name, "Root");
    assert_eq!(closure_rows(&conn), vec![(1, 1, 0)]);

    let eu = service.create_node(None, "EU", Some(1)).unwrap();
    assert_eq!(eu.id, 2);
    assert_eq!(eu.tree_id, 1);
    assert_eq!(closure_rows(&conn), vec![(1, 1, 0), (2, 2, 0), (1, 2, 1)]);

    let germany = service.create_node(Some(1), "Germany", Some(2)).unwrap();
    assert_eq!(germany.id, 3);
    assert_eq!(
        closure_rows(&conn),
        vec![
            (1, 1, 0),
            (2, 2, 0),
            (1, 2, 1),
            (3, 3, 0),
            (2, 3, 1),
            (1, 3, 2)
        ]
    );
    assert_closure_invariants(&conn);

    let err = service.delete_node(2).unwrap_err();
    assert!(matches!(err, ClosureError::NodeHasChildren(2)));
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);

    let deleted = service.delete_node(3).unwrap();
    assert_eq!(deleted.name, "Germany");
    assert_eq!(closure_rows(&conn), vec![(1, 1, 0), (2, 2, 0), (1, 2, 1)]);

    service.delete_node(2).unwrap();
    assert_eq!(closure_rows(&conn), vec![(1, 1, 0)]);

    let err = service.delete_node(1).unwrap_err();
    assert!(matches!(err, ClosureError::CannotDeleteRoot(1)));
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    assert_closure_invariants(&conn);
}

#[test]
fn new_node_inherits_parent_ancestors_at_depth_plus_one() {
    let conn = setup();
    let service = TreeService::new(SqliteTreeStore::try_new(&conn).unwrap());

    let tree = service.get_or_create_tree("Deep").unwrap();
    let mut parent = tree.root.id;
    for level in 0..5 {
        parent = service
            .create_node(None, &format!("level-{level}"), Some(parent))
            .unwrap()
            .id;
    }

    let parent_chain = service.list_ancestors(parent).unwrap();
    let leaf = service.create_node(None, "leaf", Some(parent)).unwrap();
    let leaf_chain = service.list_ancestors(leaf.id).unwrap();

    assert_eq!(leaf_chain.len(), parent_chain.len() + 1);
    assert_eq!(leaf_chain[0].node.id, leaf.id);
    assert_eq!(leaf_chain[0].depth, 0);
    for (inherited, original) in leaf_chain[1..].iter().zip(parent_chain.iter()) {
        assert_eq!(inherited.node.id, original.node.id);
        assert_eq!(inherited.depth, original.depth + 1);
    }
    assert_eq!(leaf_chain.last().unwrap().node.id, tree.root.id);
    assert_closure_invariants(&conn);
}

#[test]
fn delete_checks_are_independent_of_order() {
    let conn = setup();
    let service = TreeService::new(SqliteTreeStore::try_new(&conn).unwrap());

    let tree = service.get_or_create_tree("Checks").unwrap();
    service.create_node(None, "child", Some(tree.root.id)).unwrap();

    // Root with children: the root check still wins.
    let err = service.delete_node(tree.root.id).unwrap_err();
    assert!(matches!(err, ClosureError::CannotDeleteRoot(id) if id == tree.root.id));

    let err = service.delete_node(999).unwrap_err();
    assert!(matches!(err, ClosureError::NodeNotFound(999)));
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn create_rejects_missing_parent_and_cross_tree_parent() {
    let conn = setup();
    let service = TreeService::new(SqliteTreeStore::try_new(&conn).unwrap());

    let first = service.get_or_create_tree("First").unwrap();
    let second = service.get_or_create_tree("Second").unwrap();

    let err = service.create_node(None, "x", Some(404)).unwrap_err();
    assert!(matches!(err, ClosureError::ParentNotFound(404)));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = service
        .create_node(Some(second.id), "x", Some(first.root.id))
        .unwrap_err();
    assert!(matches!(
        err,
        ClosureError::CrossTreeParent {
            parent_id,
            parent_tree_id,
            requested_tree_id,
        } if parent_id == first.root.id
            && parent_tree_id == first.id
            && requested_tree_id == second.id
    ));
    assert_eq!(err.kind(), ErrorKind::InvalidOperation);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM nodes;"), 2);
}

#[test]
fn create_without_parent_only_allowed_for_empty_tree() {
    let conn = setup();
    let service = TreeService::new(SqliteTreeStore::try_new(&conn).unwrap());

    let tree = service.get_or_create_tree("Rooted").unwrap();

    let err = service.create_node(Some(tree.id), "second root", None).unwrap_err();
    assert!(matches!(err, ClosureError::RootAlreadyExists(id) if id == tree.id));

    let err = service.create_node(None, "floating", None).unwrap_err();
    assert!(matches!(err, ClosureError::TreeRequired));

    let err = service.create_node(Some(77), "ghost", None).unwrap_err();
    assert!(matches!(err, ClosureError::TreeNotFound(77)));
    assert_closure_invariants(&conn);
}

#[test]
fn create_rejects_blank_name_before_touching_store() {
    let conn = setup();
    let service = TreeService::new(SqliteTreeStore::try_new(&conn).unwrap());
    let tree = service.get_or_create_tree("Names").unwrap();

    let err = service.create_node(None, "   ", Some(tree.root.id)).unwrap_err();
    assert!(matches!(err, ClosureError::InvalidName(_)));
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM nodes;"), 1);
}

#[derive(Debug, Clone, Copy, Default)]
struct Faults {
    /// Pretend no tree exists, as a caller that lost a creation race would.
    hide_trees: bool,
    /// Fail the n-th closure insert (1-based) of each transaction.
    fail_closure_insert_at: Option<usize>,
    /// Fail the node row delete that follows closure row removal.
    fail_node_delete: bool,
}

struct FaultyStore<'conn> {
    inner: SqliteTreeStore<'conn>,
    faults: Faults,
}

struct FaultyTx<'conn> {
    inner: SqliteStoreTransaction<'conn>,
    faults: Faults,
    closure_inserts: Cell<usize>,
}

impl<'conn> TreeStore for FaultyStore<'conn> {
    type Tx = FaultyTx<'conn>;

    fn begin(&self) -> StoreResult<Self::Tx> {
        Ok(self.wrap(self.inner.begin()?))
    }

    fn begin_read(&self) -> StoreResult<Self::Tx> {
        Ok(self.wrap(self.inner.begin_read()?))
    }
}

impl<'conn> FaultyStore<'conn> {
    fn wrap(&self, inner: SqliteStoreTransaction<'conn>) -> FaultyTx<'conn> {
        FaultyTx {
            inner,
            faults: self.faults,
            closure_inserts: Cell::new(0),
        }
    }
}

impl StoreTransaction for FaultyTx<'_> {
    fn put_tree(&self, name: &str) -> StoreResult<TreeId> {
        self.inner.put_tree(name)
    }
    fn get_tree(&self, tree_id: TreeId) -> StoreResult<Option<Tree>> {
        self.inner.get_tree(tree_id)
    }
    fn get_tree_by_name(&self, name: &str) -> StoreResult<Option<Tree>> {
        if self.faults.hide_trees {
            return Ok(None);
        }
        self.inner.get_tree_by_name(name)
    }
    fn put_node(&self, tree_id: TreeId, name: &str) -> StoreResult<NodeId> {
        self.inner.put_node(tree_id, name)
    }
    fn get_node(&self, node_id: NodeId) -> StoreResult<Option<Node>> {
        self.inner.get_node(node_id)
    }
    fn rename_node(&self, node_id: NodeId, name: &str) -> StoreResult<()> {
        self.inner.rename_node(node_id, name)
    }
    fn delete_node(&self, node_id: NodeId) -> StoreResult<()> {
        if self.faults.fail_node_delete {
            return Err(StoreError::InvalidData("injected node delete failure".into()));
        }
        self.inner.delete_node(node_id)
    }
    fn list_nodes_by_tree(&self, tree_id: TreeId) -> StoreResult<Vec<Node>> {
        self.inner.list_nodes_by_tree(tree_id)
    }
    fn put_closure_row(&self, row: &ClosureRow) -> StoreResult<()> {
        let attempt = self.closure_inserts.get() + 1;
        self.closure_inserts.set(attempt);
        if self.faults.fail_closure_insert_at == Some(attempt) {
            return Err(StoreError::InvalidData("injected closure insert failure".into()));
        }
        self.inner.put_closure_row(row)
    }
    fn delete_closure_rows(&self, rows: &[ClosureRow]) -> StoreResult<usize> {
        self.inner.delete_closure_rows(rows)
    }
    fn list_closure_rows_by_tree(&self, tree_id: TreeId) -> StoreResult<Vec<ClosureRow>> {
        self.inner.list_closure_rows_by_tree(tree_id)
    }
    fn list_closure_rows_by_node(&self, node_id: NodeId) -> StoreResult<Vec<ClosureRow>> {
        self.inner.list_closure_rows_by_node(node_id)
    }
    fn list_ancestor_rows(&self, node_id: NodeId) -> StoreResult<Vec<ClosureRow>> {
        self.inner.list_ancestor_rows(node_id)
    }
    fn has_incoming_edge(&self, node_id: NodeId) -> StoreResult<bool> {
        self.inner.has_incoming_edge(node_id)
    }
    fn has_outgoing_edge(&self, node_id: NodeId) -> StoreResult<bool> {
        self.inner.has_outgoing_edge(node_id)
    }
    fn commit(self) -> StoreResult<()> {
        self.inner.commit()
    }
    fn rollback(self) -> StoreResult<()> {
        self.inner.rollback()
    }
}

#[test]
fn failed_closure_insert_rolls_back_the_new_node() {
    let conn = setup();
    let healthy = TreeService::new(SqliteTreeStore::try_new(&conn).unwrap());
    let tree = healthy.get_or_create_tree("Atomic").unwrap();
    let eu = healthy.create_node(None, "EU", Some(tree.root.id)).unwrap();
    let rows_before = closure_rows(&conn);

    let faulty = TreeService::new(FaultyStore {
        inner: SqliteTreeStore::try_new(&conn).unwrap(),
        faults: Faults {
            fail_closure_insert_at: Some(2),
            ..Faults::default()
        },
    });
    let err = faulty.create_node(None, "Germany", Some(eu.id)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unexpected);

    assert_eq!(count(&conn, "SELECT COUNT(*) FROM nodes;"), 2);
    assert_eq!(closure_rows(&conn), rows_before);
    assert_closure_invariants(&conn);
}

#[test]
fn failed_root_insert_rolls_back_the_new_tree() {
    let conn = setup();
    let faulty = TreeService::new(FaultyStore {
        inner: SqliteTreeStore::try_new(&conn).unwrap(),
        faults: Faults {
            fail_closure_insert_at: Some(1),
            ..Faults::default()
        },
    });

    faulty.get_or_create_tree("Never").unwrap_err();
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM trees;"), 0);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM nodes;"), 0);
}

#[test]
fn failed_node_delete_restores_its_closure_rows() {
    let conn = setup();
    let healthy = TreeService::new(SqliteTreeStore::try_new(&conn).unwrap());
    let tree = healthy.get_or_create_tree("Atomic").unwrap();
    let eu = healthy.create_node(None, "EU", Some(tree.root.id)).unwrap();
    let germany = healthy.create_node(None, "Germany", Some(eu.id)).unwrap();
    let rows_before = closure_rows(&conn);

    let faulty = TreeService::new(FaultyStore {
        inner: SqliteTreeStore::try_new(&conn).unwrap(),
        faults: Faults {
            fail_node_delete: true,
            ..Faults::default()
        },
    });
    let err = faulty.delete_node(germany.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unexpected);

    assert_eq!(count(&conn, "SELECT COUNT(*) FROM nodes;"), 3);
    assert_eq!(
        count(
            &conn,
            &format!(
                "SELECT COUNT(*) FROM closure_rows WHERE descendant_id = {};",
                germany.id
            )
        ),
        3
    );
    assert_eq!(closure_rows(&conn), rows_before);
    assert_closure_invariants(&conn);

    healthy.delete_node(germany.id).unwrap();
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM nodes;"), 2);
}

#[test]
fn losing_tree_creation_race_reports_conflict() {
    let conn = setup();
    let winner = TreeService::new(SqliteTreeStore::try_new(&conn).unwrap());
    winner.get_or_create_tree("Contested").unwrap();

    let stale_reader = TreeService::new(FaultyStore {
        inner: SqliteTreeStore::try_new(&conn).unwrap(),
        faults: Faults {
            hide_trees: true,
            ..Faults::default()
        },
    });
    let err = stale_reader.get_or_create_tree("Contested").unwrap_err();
    assert!(matches!(err, ClosureError::DuplicateTreeName(ref name) if name == "Contested"));
    assert_eq!(err.kind(), ErrorKind::Conflict);

    assert_eq!(count(&conn, "SELECT COUNT(*) FROM trees;"), 1);
    assert_eq!(count(&conn, "SELECT COUNT(*) FROM nodes;"), 1);
}
