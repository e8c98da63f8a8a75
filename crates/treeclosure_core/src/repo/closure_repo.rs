//! Closure-table store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide transactional put/get/delete/list APIs for trees, nodes, and
//!   closure rows.
//! - Keep SQL details and ordering behavior inside the repository boundary.
//!
//! # Invariants
//! - Node listing is ordered by `id ASC`.
//! - Ancestor listing is ordered by `depth ASC`.
//! - An uncommitted transaction is rolled back when dropped.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::tree::{ClosureRow, Node, NodeId, Tree, TreeId};
use rusqlite::{ffi, params, ErrorCode, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type used by store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors from closure store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Insert collided with a unique key (tree name or closure pair).
    UniqueViolation(String),
    /// Another connection held the database lock past the busy timeout.
    Busy(String),
    /// Target node does not exist.
    NodeNotFound(NodeId),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid record.
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::UniqueViolation(message) => write!(f, "unique constraint violated: {message}"),
            Self::Busy(message) => write!(f, "store is busy: {message}"),
            Self::NodeNotFound(id) => write!(f, "node not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "closure store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "closure store requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "closure store requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid closure data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        if is_unique_violation(&value) {
            return Self::UniqueViolation(value.to_string());
        }
        if is_lock_contention(&value) {
            return Self::Busy(value.to_string());
        }
        Self::Db(DbError::Sqlite(value))
    }
}

/// Entry point of the persistence port: opens transactions.
pub trait TreeStore {
    /// Transaction handle scoping the calls of one core operation.
    type Tx: StoreTransaction;

    /// Begins a transaction that may write.
    fn begin(&self) -> StoreResult<Self::Tx>;

    /// Begins a transaction for read-only operations.
    fn begin_read(&self) -> StoreResult<Self::Tx>;
}

/// Data access available inside one transaction.
pub trait StoreTransaction {
    /// Inserts a tree and returns its generated id.
    fn put_tree(&self, name: &str) -> StoreResult<TreeId>;
    /// Loads one tree by id.
    fn get_tree(&self, tree_id: TreeId) -> StoreResult<Option<Tree>>;
    /// Loads one tree by its unique name.
    fn get_tree_by_name(&self, name: &str) -> StoreResult<Option<Tree>>;

    /// Inserts a node and returns its generated id.
    fn put_node(&self, tree_id: TreeId, name: &str) -> StoreResult<NodeId>;
    /// Loads one node by id.
    fn get_node(&self, node_id: NodeId) -> StoreResult<Option<Node>>;
    /// Replaces one node name.
    fn rename_node(&self, node_id: NodeId, name: &str) -> StoreResult<()>;
    /// Deletes one node row. Closure rows referencing it must be gone first.
    fn delete_node(&self, node_id: NodeId) -> StoreResult<()>;
    /// Lists every node of one tree.
    fn list_nodes_by_tree(&self, tree_id: TreeId) -> StoreResult<Vec<Node>>;

    /// Inserts one closure row.
    fn put_closure_row(&self, row: &ClosureRow) -> StoreResult<()>;
    /// Deletes closure rows by `(ancestor_id, descendant_id)` and returns the
    /// number removed.
    fn delete_closure_rows(&self, rows: &[ClosureRow]) -> StoreResult<usize>;
    /// Lists every closure row of one tree.
    fn list_closure_rows_by_tree(&self, tree_id: TreeId) -> StoreResult<Vec<ClosureRow>>;
    /// Lists rows naming the node as ancestor or descendant.
    fn list_closure_rows_by_node(&self, node_id: NodeId) -> StoreResult<Vec<ClosureRow>>;
    /// Lists rows naming the node as descendant, nearest ancestor first.
    fn list_ancestor_rows(&self, node_id: NodeId) -> StoreResult<Vec<ClosureRow>>;
    /// Returns whether the node has a direct parent edge.
    fn has_incoming_edge(&self, node_id: NodeId) -> StoreResult<bool>;
    /// Returns whether the node has at least one direct child edge.
    fn has_outgoing_edge(&self, node_id: NodeId) -> StoreResult<bool>;

    /// Makes every write of this transaction durable.
    fn commit(self) -> StoreResult<()>;
    /// Discards every write of this transaction.
    fn rollback(self) -> StoreResult<()>;
}

/// SQLite-backed closure store.
pub struct SqliteTreeStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTreeStore<'conn> {
    /// Creates store from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> StoreResult<Self> {
        ensure_closure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl<'conn> TreeStore for SqliteTreeStore<'conn> {
    type Tx = SqliteStoreTransaction<'conn>;

    fn begin(&self) -> StoreResult<Self::Tx> {
        // IMMEDIATE takes the write lock up front so read-then-write steps
        // of one operation cannot interleave with another writer.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        Ok(SqliteStoreTransaction { tx })
    }

    fn begin_read(&self) -> StoreResult<Self::Tx> {
        // DEFERRED takes a shared lock on first read; a pending writer does
        // not block it until that writer commits.
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Deferred)?;
        Ok(SqliteStoreTransaction { tx })
    }
}

/// One SQLite transaction (IMMEDIATE for writes, DEFERRED for reads).
pub struct SqliteStoreTransaction<'conn> {
    tx: Transaction<'conn>,
}

impl StoreTransaction for SqliteStoreTransaction<'_> {
    fn put_tree(&self, name: &str) -> StoreResult<TreeId> {
        self.tx
            .execute("INSERT INTO trees (name) VALUES (?1);", [name])?;
        Ok(self.tx.last_insert_rowid())
    }

    fn get_tree(&self, tree_id: TreeId) -> StoreResult<Option<Tree>> {
        let tree = self
            .tx
            .query_row(
                "SELECT id, name FROM trees WHERE id = ?1;",
                [tree_id],
                parse_tree_row,
            )
            .optional()?;
        Ok(tree)
    }

    fn get_tree_by_name(&self, name: &str) -> StoreResult<Option<Tree>> {
        let tree = self
            .tx
            .query_row(
                "SELECT id, name FROM trees WHERE name = ?1;",
                [name],
                parse_tree_row,
            )
            .optional()?;
        Ok(tree)
    }

    fn put_node(&self, tree_id: TreeId, name: &str) -> StoreResult<NodeId> {
        self.tx.execute(
            "INSERT INTO nodes (tree_id, name) VALUES (?1, ?2);",
            params![tree_id, name],
        )?;
        Ok(self.tx.last_insert_rowid())
    }

    fn get_node(&self, node_id: NodeId) -> StoreResult<Option<Node>> {
        let node = self
            .tx
            .query_row(
                "SELECT id, tree_id, name FROM nodes WHERE id = ?1;",
                [node_id],
                parse_node_row,
            )
            .optional()?;
        Ok(node)
    }

    fn rename_node(&self, node_id: NodeId, name: &str) -> StoreResult<()> {
        let changed = self.tx.execute(
            "UPDATE nodes SET name = ?2 WHERE id = ?1;",
            params![node_id, name],
        )?;
        if changed == 0 {
            return Err(StoreError::NodeNotFound(node_id));
        }
        Ok(())
    }

    fn delete_node(&self, node_id: NodeId) -> StoreResult<()> {
        let changed = self
            .tx
            .execute("DELETE FROM nodes WHERE id = ?1;", [node_id])?;
        if changed == 0 {
            return Err(StoreError::NodeNotFound(node_id));
        }
        Ok(())
    }

    fn list_nodes_by_tree(&self, tree_id: TreeId) -> StoreResult<Vec<Node>> {
        let mut stmt = self.tx.prepare(
            "SELECT id, tree_id, name
             FROM nodes
             WHERE tree_id = ?1
             ORDER BY id ASC;",
        )?;
        let nodes = stmt
            .query_map([tree_id], parse_node_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(nodes)
    }

    fn put_closure_row(&self, row: &ClosureRow) -> StoreResult<()> {
        self.tx.execute(
            "INSERT INTO closure_rows (tree_id, ancestor_id, descendant_id, depth)
             VALUES (?1, ?2, ?3, ?4);",
            params![row.tree_id, row.ancestor_id, row.descendant_id, row.depth],
        )?;
        Ok(())
    }

    fn delete_closure_rows(&self, rows: &[ClosureRow]) -> StoreResult<usize> {
        let mut stmt = self.tx.prepare(
            "DELETE FROM closure_rows
             WHERE ancestor_id = ?1
               AND descendant_id = ?2;",
        )?;
        let mut removed = 0;
        for row in rows {
            removed += stmt.execute(params![row.ancestor_id, row.descendant_id])?;
        }
        Ok(removed)
    }

    fn list_closure_rows_by_tree(&self, tree_id: TreeId) -> StoreResult<Vec<ClosureRow>> {
        self.query_closure_rows(
            "SELECT tree_id, ancestor_id, descendant_id, depth
             FROM closure_rows
             WHERE tree_id = ?1
             ORDER BY ancestor_id ASC, descendant_id ASC;",
            tree_id,
        )
    }

    fn list_closure_rows_by_node(&self, node_id: NodeId) -> StoreResult<Vec<ClosureRow>> {
        self.query_closure_rows(
            "SELECT tree_id, ancestor_id, descendant_id, depth
             FROM closure_rows
             WHERE ancestor_id = ?1
                OR descendant_id = ?1
             ORDER BY depth ASC, ancestor_id ASC, descendant_id ASC;",
            node_id,
        )
    }

    fn list_ancestor_rows(&self, node_id: NodeId) -> StoreResult<Vec<ClosureRow>> {
        self.query_closure_rows(
            "SELECT tree_id, ancestor_id, descendant_id, depth
             FROM closure_rows
             WHERE descendant_id = ?1
             ORDER BY depth ASC;",
            node_id,
        )
    }

    fn has_incoming_edge(&self, node_id: NodeId) -> StoreResult<bool> {
        self.exists(
            "SELECT EXISTS(
                SELECT 1
                FROM closure_rows
                WHERE descendant_id = ?1
                  AND depth = 1
            );",
            node_id,
        )
    }

    fn has_outgoing_edge(&self, node_id: NodeId) -> StoreResult<bool> {
        self.exists(
            "SELECT EXISTS(
                SELECT 1
                FROM closure_rows
                WHERE ancestor_id = ?1
                  AND depth = 1
            );",
            node_id,
        )
    }

    fn commit(self) -> StoreResult<()> {
        self.tx.commit()?;
        Ok(())
    }

    fn rollback(self) -> StoreResult<()> {
        self.tx.rollback()?;
        Ok(())
    }
}

impl SqliteStoreTransaction<'_> {
    fn query_closure_rows(&self, sql: &str, key: i64) -> StoreResult<Vec<ClosureRow>> {
        let mut stmt = self.tx.prepare(sql)?;
        let mut rows = stmt.query([key])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_closure_row(row)?);
        }
        Ok(items)
    }

    fn exists(&self, sql: &str, key: i64) -> StoreResult<bool> {
        let exists: i64 = self.tx.query_row(sql, [key], |row| row.get(0))?;
        Ok(exists == 1)
    }
}

fn parse_tree_row(row: &Row<'_>) -> rusqlite::Result<Tree> {
    Ok(Tree {
        id: row.get("id")?,
        name: row.get("name")?,
    })
}

fn parse_node_row(row: &Row<'_>) -> rusqlite::Result<Node> {
    Ok(Node {
        id: row.get("id")?,
        tree_id: row.get("tree_id")?,
        name: row.get("name")?,
    })
}

fn parse_closure_row(row: &Row<'_>) -> StoreResult<ClosureRow> {
    let depth: i64 = row.get("depth")?;
    let depth = u32::try_from(depth).map_err(|_| {
        StoreError::InvalidData(format!("invalid depth `{depth}` in closure_rows.depth"))
    })?;
    let closure = ClosureRow {
        tree_id: row.get("tree_id")?,
        ancestor_id: row.get("ancestor_id")?,
        descendant_id: row.get("descendant_id")?,
        depth,
    };
    if closure.is_self() != (closure.ancestor_id == closure.descendant_id) {
        return Err(StoreError::InvalidData(format!(
            "closure row ({}, {}) has depth {} inconsistent with its endpoints",
            closure.ancestor_id, closure.descendant_id, closure.depth
        )));
    }
    Ok(closure)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(inner, _) => matches!(
            inner.extended_code,
            ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        ),
        _ => false,
    }
}

fn is_lock_contention(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

fn ensure_closure_connection_ready(conn: &Connection) -> StoreResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(StoreError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    const REQUIRED: &[(&str, &[&str])] = &[
        ("trees", &["id", "name"]),
        ("nodes", &["id", "tree_id", "name"]),
        (
            "closure_rows",
            &["tree_id", "ancestor_id", "descendant_id", "depth"],
        ),
    ];

    for &(table, columns) in REQUIRED {
        if !table_exists(conn, table)? {
            return Err(StoreError::MissingRequiredTable(table));
        }
        for &column in columns {
            if !table_has_column(conn, table, column)? {
                return Err(StoreError::MissingRequiredColumn { table, column });
            }
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> StoreResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
