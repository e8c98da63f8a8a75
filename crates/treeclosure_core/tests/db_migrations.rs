use rusqlite::Connection;
use treeclosure_core::db::migrations::latest_version;
use treeclosure_core::db::{open_db, open_db_in_memory, open_store, DbError, StoreLocation};
use treeclosure_core::{SqliteTreeStore, StoreError};

#[test]
fn open_db_in_memory_applies_all_migrations() {
    let conn = open_db_in_memory().unwrap();

    assert_eq!(schema_version(&conn), latest_version());
    assert_table_exists(&conn, "trees");
    assert_table_exists(&conn, "nodes");
    assert_table_exists(&conn, "closure_rows");
}

#[test]
fn opening_same_database_twice_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trees.sqlite3");

    let conn_first = open_db(&path).unwrap();
    assert_eq!(schema_version(&conn_first), latest_version());
    drop(conn_first);

    let conn_second = open_store(&StoreLocation::File(path)).unwrap();
    assert_eq!(schema_version(&conn_second), latest_version());
    assert_table_exists(&conn_second, "closure_rows");
}

#[test]
fn opening_database_with_newer_schema_version_returns_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");

    let conn = Connection::open(&path).unwrap();
    conn.execute_batch("PRAGMA user_version = 999;").unwrap();
    drop(conn);

    let err = open_db(&path).unwrap_err();
    match err {
        DbError::UnsupportedSchemaVersion {
            db_version,
            latest_supported,
        } => {
            assert_eq!(db_version, 999);
            assert_eq!(latest_supported, latest_version());
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn store_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqliteTreeStore::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        StoreError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}

#[test]
fn schema_rejects_closure_row_with_mismatched_depth() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO trees (name) VALUES ('t');
         INSERT INTO nodes (tree_id, name) VALUES (1, 'Root');
         INSERT INTO nodes (tree_id, name) VALUES (1, 'Child');",
    )
    .unwrap();

    assert!(conn
        .execute(
            "INSERT INTO closure_rows (tree_id, ancestor_id, descendant_id, depth)
             VALUES (1, 1, 1, 1);",
            [],
        )
        .is_err());
    assert!(conn
        .execute(
            "INSERT INTO closure_rows (tree_id, ancestor_id, descendant_id, depth)
             VALUES (1, 1, 2, 0);",
            [],
        )
        .is_err());
}

#[test]
fn schema_rejects_deleting_node_still_referenced_by_closure_rows() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO trees (name) VALUES ('t');
         INSERT INTO nodes (tree_id, name) VALUES (1, 'Root');
         INSERT INTO closure_rows (tree_id, ancestor_id, descendant_id, depth)
         VALUES (1, 1, 1, 0);",
    )
    .unwrap();

    assert!(conn.execute("DELETE FROM nodes WHERE id = 1;", []).is_err());
}

fn schema_version(conn: &Connection) -> u32 {
    conn.query_row("PRAGMA user_version;", [], |row| row.get(0))
        .unwrap()
}

fn assert_table_exists(conn: &Connection, table_name: &str) {
    let exists: i64 = conn
        .query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table_name],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(exists, 1, "table {table_name} does not exist");
}
