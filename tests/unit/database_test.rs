//! Unit tests for the database layer (connection + migrations).

use linkshelf::database::migrations::{get_schema_version, run_all, CURRENT_SCHEMA_VERSION};
use linkshelf::database::Database;
use tempfile::TempDir;

#[test]
fn test_open_in_memory_succeeds() {
    let db = Database::open_in_memory();
    assert!(db.is_ok(), "open_in_memory should succeed");
}

#[test]
fn test_migrations_create_bookmarks_table_and_index() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    let conn = db.connection();

    for (kind, name) in [("table", "bookmarks"), ("index", "idx_bookmarks_owner_created")] {
        let exists: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type=?1 AND name=?2",
                [kind, name],
                |row| row.get(0),
            )
            .unwrap_or(false);
        assert!(exists, "{} '{}' should exist after migrations", kind, name);
    }
}

#[test]
fn test_schema_version_is_current() {
    let db = Database::open_in_memory().unwrap();
    assert_eq!(get_schema_version(db.connection()), CURRENT_SCHEMA_VERSION);
}

#[test]
fn test_migrations_are_idempotent() {
    let db = Database::open_in_memory().unwrap();
    run_all(db.connection()).expect("second run should succeed");

    let rows: i64 = db
        .connection()
        .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, CURRENT_SCHEMA_VERSION as i64);
}

#[test]
fn test_open_file_database_persists_rows() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("linkshelf.db");

    {
        let db = Database::open(&path).unwrap();
        db.connection()
            .execute(
                "INSERT INTO bookmarks (id, owner, title, url, created_at) VALUES ('1', 'u1', 'Docs', 'example.com', 1)",
                [],
            )
            .unwrap();
    }

    let db = Database::open(&path).unwrap();
    let note: String = db
        .connection()
        .query_row("SELECT note FROM bookmarks WHERE id = '1'", [], |row| row.get(0))
        .unwrap();
    assert_eq!(note, "", "note defaults to empty");
}
