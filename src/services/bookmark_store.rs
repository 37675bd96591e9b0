//! Durable bookmark store.
//!
//! [`BookmarkStore`] is the contract the view relies on; [`SqliteStore`]
//! implements it on `rusqlite` and announces every commit on a
//! [`ChangeFeed`].

use std::sync::Mutex;

use rusqlite::params;
use tracing::debug;
use uuid::Uuid;

use crate::database::Database;
use crate::services::change_feed::ChangeFeed;
use crate::types::bookmark::{Bookmark, BookmarkDraft};
use crate::types::errors::StoreError;

/// Authoritative record-of-truth for bookmarks.
///
/// Calls may block; the view runs them off its own task.
pub trait BookmarkStore: Send + Sync {
    /// Persists a new bookmark for `owner` and returns it with its assigned
    /// `id` and `created_at`.
    fn create(&self, owner: &str, draft: &BookmarkDraft) -> Result<Bookmark, StoreError>;
    /// Deletes `id` if it belongs to `owner`.
    fn delete(&self, owner: &str, id: &str) -> Result<(), StoreError>;
    /// Every bookmark `owner` holds, in no guaranteed order.
    fn list_by_owner(&self, owner: &str) -> Result<Vec<Bookmark>, StoreError>;
}

/// Bookmark store backed by SQLite.
pub struct SqliteStore {
    db: Mutex<Database>,
    feed: Option<ChangeFeed>,
}

impl SqliteStore {
    /// Creates a store that does not announce its commits.
    pub fn new(db: Database) -> Self {
        Self {
            db: Mutex::new(db),
            feed: None,
        }
    }

    /// Creates a store that publishes every committed change on `feed`.
    pub fn with_feed(db: Database, feed: ChangeFeed) -> Self {
        Self {
            db: Mutex::new(db),
            feed: Some(feed),
        }
    }

    /// Returns the current UNIX timestamp in milliseconds.
    fn now() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn row_to_bookmark(row: &rusqlite::Row) -> rusqlite::Result<Bookmark> {
        Ok(Bookmark {
            id: row.get(0)?,
            owner: row.get(1)?,
            title: row.get(2)?,
            target: row.get(3)?,
            note: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn with_db<T>(
        &self,
        f: impl FnOnce(&Database) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let db = self
            .db
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        f(&db)
    }
}

impl BookmarkStore for SqliteStore {
    fn create(&self, owner: &str, draft: &BookmarkDraft) -> Result<Bookmark, StoreError> {
        let bookmark = Bookmark {
            id: Uuid::new_v4().to_string(),
            owner: owner.to_string(),
            title: draft.title.clone(),
            target: draft.target.clone(),
            note: draft.note.clone(),
            created_at: Self::now(),
        };

        self.with_db(|db| {
            db.connection()
                .execute(
                    "INSERT INTO bookmarks (id, owner, title, url, note, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        bookmark.id,
                        bookmark.owner,
                        bookmark.title,
                        bookmark.target,
                        bookmark.note,
                        bookmark.created_at
                    ],
                )
                .map_err(|e| StoreError::DatabaseError(e.to_string()))
        })?;
        debug!(id = %bookmark.id, owner, "bookmark row inserted");

        if let Some(feed) = &self.feed {
            feed.publish_created(&bookmark);
        }
        Ok(bookmark)
    }

    fn delete(&self, owner: &str, id: &str) -> Result<(), StoreError> {
        let affected = self.with_db(|db| {
            db.connection()
                .execute(
                    "DELETE FROM bookmarks WHERE id = ?1 AND owner = ?2",
                    params![id, owner],
                )
                .map_err(|e| StoreError::DatabaseError(e.to_string()))
        })?;

        if affected == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        debug!(id, owner, "bookmark row deleted");

        if let Some(feed) = &self.feed {
            feed.publish_deleted(owner, id);
        }
        Ok(())
    }

    fn list_by_owner(&self, owner: &str) -> Result<Vec<Bookmark>, StoreError> {
        self.with_db(|db| {
            let mut stmt = db
                .connection()
                .prepare(
                    "SELECT id, owner, title, url, note, created_at \
                     FROM bookmarks WHERE owner = ?1 ORDER BY created_at DESC, rowid DESC",
                )
                .map_err(|e| StoreError::DatabaseError(e.to_string()))?;

            let rows = stmt
                .query_map(params![owner], Self::row_to_bookmark)
                .map_err(|e| StoreError::DatabaseError(e.to_string()))?;

            let mut results = Vec::new();
            for row in rows {
                results.push(row.map_err(|e| StoreError::DatabaseError(e.to_string()))?);
            }
            Ok(results)
        })
    }
}
